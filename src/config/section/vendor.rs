//! `[[vendor]]` entries: third-party files copied from the dependency cache.
//!
//! # Example
//!
//! ```toml
//! [[vendor]]
//! from = "bootstrap/dist/css/bootstrap.min.css"   # glob, relative to paths.vendor
//! to = "css/assets"                               # dir, relative to the output root
//!
//! [[vendor]]
//! from = "@fortawesome/fontawesome-free/webfonts/*"
//! to = "fonts/fontawesome"
//! ```
//!
//! Declaring any entry replaces the default list. Matched files land flat
//! in `to` under their file name.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::config::{ConfigDiagnostics, FieldPath};

/// Output sub-directories reserved for vendored files.
pub const VENDOR_DIRS: [&str; 3] = ["css/assets", "fonts/fontawesome", "js/assets"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorEntry {
    /// Glob relative to the dependency cache.
    pub from: String,
    /// Destination directory relative to the output root.
    pub to: PathBuf,
}

impl VendorEntry {
    pub fn new(from: impl Into<String>, to: impl Into<PathBuf>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

pub fn default_entries() -> Vec<VendorEntry> {
    vec![
        VendorEntry::new("bootstrap/dist/css/bootstrap.min.css", "css/assets"),
        VendorEntry::new("@fortawesome/fontawesome-free/css/all.min.css", "css/assets"),
        VendorEntry::new("@fortawesome/fontawesome-free/webfonts/*", "fonts/fontawesome"),
        VendorEntry::new("bootstrap/dist/js/bootstrap.bundle.min.js", "js/assets"),
        VendorEntry::new("jquery/dist/jquery.min.js", "js/assets"),
    ]
}

pub fn validate(entries: &[VendorEntry], diag: &mut ConfigDiagnostics) {
    let field = FieldPath::new("vendor.to");
    for entry in entries {
        if !is_plain_relative(&entry.to) {
            diag.error(
                field,
                format!("`{}` must be a relative path without `..`", entry.to.display()),
            );
            continue;
        }
        if !VENDOR_DIRS.iter().any(|dir| entry.to.starts_with(dir)) {
            diag.error_with_hint(
                field,
                format!("`{}` is outside the vendor directories", entry.to.display()),
                format!("use one of: {}", VENDOR_DIRS.join(", ")),
            );
        }
        if glob::Pattern::new(&entry.from).is_err() {
            diag.error(
                FieldPath::new("vendor.from"),
                format!("`{}` is not a valid glob", entry.from),
            );
        }
    }
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}
