//! SCSS compilation via grass.

use std::path::PathBuf;

use grass::{Options, OutputStyle};

use super::{Artifact, Transform, TransformError};

/// Compile `.scss` artifacts to `.css`.
///
/// `@import`/`@use` resolve against the importing file's directory first,
/// then each configured load path in order.
pub struct CompileScss {
    compressed: bool,
    load_paths: Vec<PathBuf>,
}

impl CompileScss {
    pub fn new(compressed: bool, load_paths: Vec<PathBuf>) -> Self {
        Self {
            compressed,
            load_paths,
        }
    }
}

impl Transform for CompileScss {
    fn name(&self) -> &'static str {
        "scss"
    }

    fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
        if artifact.extension().as_deref() != Some("scss") {
            return Ok(vec![artifact]);
        }

        let style = if self.compressed {
            OutputStyle::Compressed
        } else {
            OutputStyle::Expanded
        };
        let mut options = Options::default().style(style).quiet(true);
        if let Some(dir) = artifact.origin.parent() {
            options = options.load_path(dir);
        }
        for path in &self.load_paths {
            options = options.load_path(path);
        }

        let input = artifact.text(self.name())?.to_owned();
        let css = grass::from_string(input, &options)
            .map_err(|e| TransformError::new(self.name(), e.to_string()))?;

        Ok(vec![artifact.derive(artifact.rel.with_extension("css"), css.into_bytes())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn artifact(origin: &Path, source: &str) -> Artifact {
        Artifact::new("main.scss", origin, source.as_bytes().to_vec())
    }

    #[test]
    fn test_compiles_and_renames() {
        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("main.scss");
        let scss = "$brand: #336699;\n.nav { a { color: $brand; } }\n";

        let out = CompileScss::new(false, vec![]).apply(artifact(&origin, scss)).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rel, PathBuf::from("main.css"));
        let css = String::from_utf8(out[0].bytes.clone()).unwrap();
        assert!(css.contains(".nav a"));
        assert!(css.contains("#336699"));
    }

    #[test]
    fn test_resolves_sibling_partials() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("_settings.scss"), "$gap: 4px;").unwrap();
        let origin = temp.path().join("main.scss");

        let out = CompileScss::new(true, vec![])
            .apply(artifact(&origin, "@import 'settings';\n.row { margin: $gap; }"))
            .unwrap();

        let css = String::from_utf8(out[0].bytes.clone()).unwrap();
        assert!(css.contains("margin:4px"));
    }

    #[test]
    fn test_resolves_load_paths() {
        let temp = TempDir::new().unwrap();
        let vendor = temp.path().join("node_modules/theme");
        fs::create_dir_all(&vendor).unwrap();
        fs::write(vendor.join("_colors.scss"), "$ink: #111;").unwrap();
        let origin = temp.path().join("src/scss/main.scss");

        let out = CompileScss::new(false, vec![temp.path().join("node_modules")])
            .apply(artifact(&origin, "@import 'theme/colors';\nbody { color: $ink; }"))
            .unwrap();

        assert!(String::from_utf8_lossy(&out[0].bytes).contains("#111"));
    }

    #[test]
    fn test_syntax_error_is_transform_error() {
        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("main.scss");

        let err = CompileScss::new(false, vec![])
            .apply(artifact(&origin, ".a { color: red;"))
            .unwrap_err();
        assert_eq!(err.transform, "scss");
    }

    #[test]
    fn test_plain_css_passes_through() {
        let out = CompileScss::new(false, vec![])
            .apply(Artifact::new("reset.css", "/x/reset.css", b"a{}".to_vec()))
            .unwrap();
        assert_eq!(out[0].rel, PathBuf::from("reset.css"));
    }
}
