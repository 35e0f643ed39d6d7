//! `[images]` section configuration.
//!
//! ```toml
//! [images]
//! jpeg_quality = 80   # lossy re-encode quality for release builds (1-100)
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { jpeg_quality: 80 }
    }
}

impl ImagesConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !(1..=100).contains(&self.jpeg_quality) {
            diag.error(
                FieldPath::new("images.jpeg_quality"),
                format!("quality must be within 1-100, got {}", self.jpeg_quality),
            );
        }
    }
}
