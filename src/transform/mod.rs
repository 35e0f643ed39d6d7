//! Content transforms applied to each file a step reads.
//!
//! A step owns an ordered chain of transforms. Every file enters the chain as
//! one [`Artifact`]; each transform may rewrite it, rename it, drop it or emit
//! extra artifacts (a source map next to a stylesheet).
//!
//! | Transform            | Backed by        | Steps          |
//! |----------------------|------------------|----------------|
//! | `PageTemplate`       | handlebars       | html           |
//! | `CollapseWhitespace` | regex            | html (release) |
//! | `CompileScss`        | grass            | css            |
//! | `Autoprefix`         | lightningcss     | css            |
//! | `MinifyJs`           | oxc              | js (release)   |
//! | `CompressImage`      | image            | images         |

mod image;
mod minify;
mod prefix;
mod scss;
mod template;

pub use image::CompressImage;
pub use minify::{CollapseWhitespace, MinifyJs};
pub use prefix::Autoprefix;
pub use scss::CompileScss;
pub use template::PageTemplate;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// A file travelling through a transform chain.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Path relative to the step's output directory.
    pub rel: PathBuf,
    /// Absolute path of the source file this artifact came from.
    pub origin: PathBuf,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(rel: impl Into<PathBuf>, origin: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            rel: rel.into(),
            origin: origin.into(),
            bytes,
        }
    }

    /// Lowercased extension of the output path.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.rel)
    }

    /// Interpret the content as UTF-8 text.
    pub fn text(&self, transform: &'static str) -> Result<&str, TransformError> {
        std::str::from_utf8(&self.bytes)
            .map_err(|e| TransformError::new(transform, format!("not valid UTF-8: {e}")))
    }

    /// Same origin, new path and content.
    pub fn derive(&self, rel: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self::new(rel, self.origin.clone(), bytes)
    }
}

pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// A single file failed a transform. The file's output is withheld.
#[derive(Debug, Clone, Error)]
#[error("{transform}: {message}")]
pub struct TransformError {
    pub transform: &'static str,
    pub message: String,
}

impl TransformError {
    pub fn new(transform: &'static str, message: impl Into<String>) -> Self {
        Self {
            transform,
            message: message.into(),
        }
    }
}

/// One link of a step's transform chain.
pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called once at the start of every step run, before any file.
    fn prepare(&self) -> Result<(), TransformError> {
        Ok(())
    }

    fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError>;
}

/// Push one artifact through a chain, stopping at the first failure.
pub fn apply_chain(
    chain: &[Box<dyn Transform>],
    artifact: Artifact,
) -> Result<Vec<Artifact>, TransformError> {
    let mut artifacts = vec![artifact];
    for transform in chain {
        let mut next = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            next.extend(transform.apply(artifact)?);
        }
        artifacts = next;
    }
    Ok(artifacts)
}
