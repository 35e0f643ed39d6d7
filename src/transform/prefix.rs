//! Vendor prefixing and optional minification via lightningcss.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;

use super::{Artifact, Transform, TransformError};

/// Add the vendor prefixes the configured browsers need.
///
/// In development a `.css.map` is emitted next to each stylesheet; in release
/// the output is minified and no map is written.
pub struct Autoprefix {
    browsers: Browsers,
    minify: bool,
    source_map: bool,
}

impl Autoprefix {
    pub fn new(browsers: Browsers, minify: bool, source_map: bool) -> Self {
        Self {
            browsers,
            minify,
            source_map,
        }
    }

    fn error(&self, message: impl ToString) -> TransformError {
        TransformError::new(self.name(), message.to_string())
    }
}

impl Transform for Autoprefix {
    fn name(&self) -> &'static str {
        "autoprefix"
    }

    fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
        if artifact.extension().as_deref() != Some("css") {
            return Ok(vec![artifact]);
        }

        let code = artifact.text(self.name())?;
        let filename = artifact.rel.to_string_lossy().replace('\\', "/");
        let targets = Targets::from(self.browsers);

        let mut sheet = StyleSheet::parse(
            code,
            ParserOptions {
                filename: filename.clone(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| self.error(e))?;
        sheet
            .minify(MinifyOptions {
                targets,
                ..MinifyOptions::default()
            })
            .map_err(|e| self.error(e))?;

        let mut map = if self.source_map {
            let mut map = SourceMap::new("/");
            map.add_source(&filename);
            map.set_source_content(0, code).map_err(|e| self.error(e))?;
            Some(map)
        } else {
            None
        };

        let result = sheet
            .to_css(PrinterOptions {
                minify: self.minify,
                source_map: map.as_mut(),
                targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| self.error(e))?;
        let mut css = result.code;

        let Some(mut map) = map else {
            return Ok(vec![artifact.derive(&artifact.rel, css.into_bytes())]);
        };

        let map_json = map.to_json(None).map_err(|e| self.error(e))?;
        let map_rel = {
            let mut name = artifact.rel.clone().into_os_string();
            name.push(".map");
            std::path::PathBuf::from(name)
        };
        let map_name = map_rel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !css.ends_with('\n') {
            css.push('\n');
        }
        css.push_str(&format!("/*# sourceMappingURL={map_name} */\n"));

        Ok(vec![
            artifact.derive(&artifact.rel, css.into_bytes()),
            artifact.derive(map_rel, map_json.into_bytes()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn old_safari() -> Browsers {
        Browsers {
            safari: Some(8 << 16),
            ..Browsers::default()
        }
    }

    fn css(source: &str) -> Artifact {
        Artifact::new("main.css", "/site/src/scss/main.scss", source.as_bytes().to_vec())
    }

    #[test]
    fn test_adds_prefixes_for_old_browsers() {
        let out = Autoprefix::new(old_safari(), false, false)
            .apply(css(".a { user-select: none; }"))
            .unwrap();

        assert_eq!(out.len(), 1);
        let text = String::from_utf8(out[0].bytes.clone()).unwrap();
        assert!(text.contains("-webkit-user-select"));
    }

    #[test]
    fn test_dev_emits_source_map() {
        let out = Autoprefix::new(old_safari(), false, true)
            .apply(css(".a {\n  color: red;\n}\n"))
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[1].rel, PathBuf::from("main.css.map"));
        let text = String::from_utf8(out[0].bytes.clone()).unwrap();
        assert!(text.trim_end().ends_with("/*# sourceMappingURL=main.css.map */"));

        let map: serde_json::Value = serde_json::from_slice(&out[1].bytes).unwrap();
        assert_eq!(map["version"], 3);
        assert!(map["sources"].as_array().is_some_and(|s| !s.is_empty()));
    }

    #[test]
    fn test_release_minifies_without_map() {
        let out = Autoprefix::new(Browsers::default(), true, false)
            .apply(css(".a {\n  color: red;\n}\n\n.b {\n  margin: 0 0 0 0;\n}\n"))
            .unwrap();

        assert_eq!(out.len(), 1);
        let text = String::from_utf8(out[0].bytes.clone()).unwrap();
        assert!(!text.contains('\n'));
        assert!(!text.contains("sourceMappingURL"));
    }

    #[test]
    fn test_invalid_css_is_transform_error() {
        let err = Autoprefix::new(Browsers::default(), false, false)
            .apply(css("..a { color: red; }"))
            .unwrap_err();
        assert_eq!(err.transform, "autoprefix");
    }
}
