//! `[paths]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [paths]
//! source = "src"            # Development source tree
//! output = "dist"           # Incremental dev output root
//! release = "build"         # Release output root
//! vendor = "node_modules"   # Dependency cache for vendored files
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::utils::path::{nested, normalize_path};

/// Project directories. Relative values resolve against the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub source: PathBuf,
    pub output: PathBuf,
    pub release: PathBuf,
    pub vendor: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: "src".into(),
            output: "dist".into(),
            release: "build".into(),
            vendor: "node_modules".into(),
        }
    }
}

impl PathsConfig {
    pub fn normalize(&mut self, root: &Path) {
        for dir in [
            &mut self.source,
            &mut self.output,
            &mut self.release,
            &mut self.vendor,
        ] {
            *dir = normalize_path(&root.join(&*dir));
        }
    }

    /// The release root must live apart from the dev output and the sources,
    /// since the release build clears it.
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if nested(&self.release, &self.output) {
            diag.error_with_hint(
                FieldPath::new("paths.release"),
                "release root overlaps the dev output root",
                "use separate directories, e.g. `dist` and `build`",
            );
        }
        if nested(&self.release, &self.source) {
            diag.error(
                FieldPath::new("paths.release"),
                "release root overlaps the source tree",
            );
        }
        if nested(&self.output, &self.source) {
            diag.error(
                FieldPath::new("paths.output"),
                "output root overlaps the source tree",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_paths_override() {
        let config = test_parse_config("[paths]\nsource = \"site\"\nrelease = \"public\"");
        assert_eq!(config.paths.source, PathBuf::from("site"));
        assert_eq!(config.paths.release, PathBuf::from("public"));
        assert_eq!(config.paths.output, PathBuf::from("dist"));
    }

    #[test]
    fn test_nested_release_rejected() {
        let mut paths = PathsConfig::default();
        paths.normalize(Path::new("/site"));
        paths.release = PathBuf::from("/site/dist/release");

        let mut diag = ConfigDiagnostics::new();
        paths.validate(&mut diag);
        assert_eq!(diag.len(), 1);
    }

    #[test]
    fn test_output_inside_source_rejected() {
        let mut paths = PathsConfig::default();
        paths.normalize(Path::new("/site"));
        paths.output = PathBuf::from("/site/src/out");

        let mut diag = ConfigDiagnostics::new();
        paths.validate(&mut diag);
        assert!(diag.has_errors());
    }

    #[test]
    fn test_defaults_valid() {
        let mut paths = PathsConfig::default();
        paths.normalize(Path::new("/site"));

        let mut diag = ConfigDiagnostics::new();
        paths.validate(&mut diag);
        assert!(diag.is_empty());
    }
}
