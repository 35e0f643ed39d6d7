//! Image compression via the `image` crate.
//!
//! PNG is always re-encoded losslessly at the best compression level. JPEG is
//! re-encoded at a fixed quality only when a quality is configured (release
//! builds). Everything else is copied as-is.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, ImageResult};

use super::{Artifact, Transform, TransformError};

pub struct CompressImage {
    jpeg_quality: Option<u8>,
}

impl CompressImage {
    /// Lossless only.
    pub fn lossless() -> Self {
        Self { jpeg_quality: None }
    }

    /// Lossless PNG plus lossy JPEG at `quality` (1..=100).
    pub fn with_jpeg_quality(quality: u8) -> Self {
        Self {
            jpeg_quality: Some(quality),
        }
    }

    fn recompress(&self, bytes: &[u8], format: ImageFormat) -> ImageResult<Option<Vec<u8>>> {
        match format {
            ImageFormat::Png => {
                let image = image::load_from_memory_with_format(bytes, format)?;
                encode_png(&image).map(Some)
            }
            ImageFormat::Jpeg => match self.jpeg_quality {
                Some(quality) => {
                    let image = image::load_from_memory_with_format(bytes, format)?;
                    encode_jpeg(&image, quality).map(Some)
                }
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }
}

fn encode_png(image: &DynamicImage) -> ImageResult<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive).write_image(
        image.as_bytes(),
        image.width(),
        image.height(),
        image.color().into(),
    )?;
    Ok(out)
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> ImageResult<Vec<u8>> {
    let mut out = Vec::new();
    let rgb = image.to_rgb8();
    JpegEncoder::new_with_quality(&mut out, quality).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}

impl Transform for CompressImage {
    fn name(&self) -> &'static str {
        "compress-image"
    }

    fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
        let format = artifact
            .extension()
            .and_then(|ext| ImageFormat::from_extension(ext));
        let Some(format) = format else {
            return Ok(vec![artifact]);
        };

        let compressed = self
            .recompress(&artifact.bytes, format)
            .map_err(|e| TransformError::new(self.name(), e.to_string()))?;

        match compressed {
            Some(bytes) if bytes.len() < artifact.bytes.len() => {
                crate::debug!("images"; "{}: {} -> {} bytes", artifact.rel.display(), artifact.bytes.len(), bytes.len());
                Ok(vec![artifact.derive(&artifact.rel, bytes)])
            }
            _ => Ok(vec![artifact]),
        }
    }
}
