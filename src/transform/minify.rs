//! Release minification for scripts and pages.
//!
//! Uses oxc for JavaScript and a token-level whitespace collapse for HTML.

use std::sync::LazyLock;

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use regex::Regex;

use super::{Artifact, Transform, TransformError};
use crate::utils::html::{is_inline_element, is_whitespace_sensitive};

// ============================================================================
// JavaScript
// ============================================================================

/// Minify JavaScript source code.
///
/// Sources are parsed as classic scripts: top-level names stay untouched so
/// globals shared between `<script>` tags keep working.
pub fn minify_js(source: &str) -> Result<String, String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::script()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(error.to_string());
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions {
            top_level: Some(false),
            ..MangleOptions::default()
        }),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

/// Minify `.js` artifacts. Files already named `*.min.js` pass through.
pub struct MinifyJs;

impl Transform for MinifyJs {
    fn name(&self) -> &'static str {
        "minify-js"
    }

    fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
        let is_js = artifact.extension().as_deref() == Some("js");
        let is_minified = artifact
            .rel
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".min.js"));
        if !is_js || is_minified {
            return Ok(vec![artifact]);
        }

        let code = minify_js(artifact.text(self.name())?)
            .map_err(|e| TransformError::new(self.name(), e))?;
        Ok(vec![artifact.derive(&artifact.rel, code.into_bytes())])
    }
}

// ============================================================================
// HTML
// ============================================================================

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<![^>]*>|</?([A-Za-z][A-Za-z0-9-]*)[^>]*>|[^<]+|<")
        .expect("valid token regex")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

enum Token<'a> {
    Tag {
        raw: &'a str,
        name: String,
        closing: bool,
    },
    Text(&'a str),
    Other(&'a str),
}

impl Token<'_> {
    fn is_inline(&self) -> bool {
        matches!(self, Token::Tag { name, .. } if is_inline_element(name))
    }
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    TOKEN
        .captures_iter(html)
        .filter_map(|caps| {
            let raw = caps.get(0)?.as_str();
            Some(match caps.get(1) {
                Some(name) => Token::Tag {
                    raw,
                    name: name.as_str().to_ascii_lowercase(),
                    closing: raw.starts_with("</"),
                },
                None if raw.starts_with('<') && raw.len() > 1 => Token::Other(raw),
                None => Token::Text(raw),
            })
        })
        .collect()
}

/// Collapse insignificant whitespace in an HTML document.
///
/// - Runs of whitespace in text become one space
/// - Whitespace next to block-level tags is removed
/// - Content of `pre`, `textarea`, `script` and `style` is left untouched
pub fn collapse_whitespace(html: &str) -> String {
    let tokens = tokenize(html);
    let mut out = String::with_capacity(html.len());
    let mut verbatim: Option<&str> = None;

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Tag { raw, name, closing } => {
                match verbatim {
                    Some(open) if *closing && name == open => verbatim = None,
                    None if !closing && is_whitespace_sensitive(name) && !raw.ends_with("/>") => {
                        verbatim = Some(name.as_str());
                    }
                    _ => {}
                }
                out.push_str(raw);
            }
            Token::Text(text) if verbatim.is_none() => {
                let collapsed = WHITESPACE.replace_all(text, " ");
                let mut text: &str = &collapsed;
                if !(i > 0 && tokens[i - 1].is_inline()) {
                    text = text.trim_start();
                }
                if !tokens.get(i + 1).is_some_and(Token::is_inline) {
                    text = text.trim_end();
                }
                out.push_str(text);
            }
            Token::Text(raw) | Token::Other(raw) => out.push_str(raw),
        }
    }
    out
}

/// Collapse whitespace in `.html` artifacts.
pub struct CollapseWhitespace;

impl Transform for CollapseWhitespace {
    fn name(&self) -> &'static str {
        "collapse-whitespace"
    }

    fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
        if !matches!(artifact.extension().as_deref(), Some("html" | "htm")) {
            return Ok(vec![artifact]);
        }
        let html = collapse_whitespace(artifact.text(self.name())?);
        Ok(vec![artifact.derive(&artifact.rel, html.into_bytes())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_js_shrinks() {
        let source = "function add(first, second) {\n    // sum\n    return first + second;\n}\n";
        let minified = minify_js(source).unwrap();
        assert!(minified.len() < source.len());
        assert!(!minified.contains("// sum"));
    }

    #[test]
    fn test_minify_js_keeps_top_level_globals() {
        let minified = minify_js("function greet(name) {\n  return 'hi ' + name;\n}\n").unwrap();
        assert!(minified.contains("function greet("));

        let minified = minify_js("var counter = 0;\nfunction bump() { counter++; }\n").unwrap();
        assert!(minified.contains("counter"));
        assert!(minified.contains("bump"));

        let minified = minify_js("var api = { version: 1 };\n").unwrap();
        assert!(minified.contains("api"));
    }

    #[test]
    fn test_minify_js_reports_syntax_error() {
        assert!(minify_js("function (").is_err());
    }

    #[test]
    fn test_minify_transform_skips_min_files() {
        let source = b"var a = 1 ;".to_vec();
        let artifact = Artifact::new("assets/jquery.min.js", "/x/jquery.min.js", source.clone());
        let out = MinifyJs.apply(artifact).unwrap();
        assert_eq!(out[0].bytes, source);
    }

    #[test]
    fn test_minify_transform_error_is_per_file() {
        let artifact = Artifact::new("broken.js", "/x/broken.js", b"let = ;".to_vec());
        let err = MinifyJs.apply(artifact).unwrap_err();
        assert_eq!(err.transform, "minify-js");
    }

    #[test]
    fn test_collapse_between_blocks() {
        let html = "<html>\n  <body>\n    <div>\n      <p>Hello   world</p>\n    </div>\n  </body>\n</html>\n";
        assert_eq!(
            collapse_whitespace(html),
            "<html><body><div><p>Hello world</p></div></body></html>"
        );
    }

    #[test]
    fn test_collapse_keeps_inline_spacing() {
        let html = "<p>\n  Read <b>this</b> <i>now</i>\n</p>";
        assert_eq!(collapse_whitespace(html), "<p>Read <b>this</b> <i>now</i></p>");
    }

    #[test]
    fn test_collapse_preserves_verbatim_elements() {
        let html = "<div>\n<pre>  a\n    b</pre>\n<script>\n  if (a < b) {\n  }\n</script>\n</div>";
        let out = collapse_whitespace(html);
        assert!(out.contains("<pre>  a\n    b</pre>"));
        assert!(out.contains("<script>\n  if (a < b) {\n  }\n</script>"));
        assert!(out.starts_with("<div><pre>"));
    }

    #[test]
    fn test_collapse_keeps_comments_and_doctype() {
        let html = "<!DOCTYPE html>\n<!-- note -->\n<p>x</p>";
        assert_eq!(collapse_whitespace(html), "<!DOCTYPE html><!-- note --><p>x</p>");
    }

    #[test]
    fn test_collapse_transform_ignores_other_files() {
        let artifact = Artifact::new("robots.txt", "/x/robots.txt", b"a   b".to_vec());
        let out = CollapseWhitespace.apply(artifact).unwrap();
        assert_eq!(out[0].bytes, b"a   b");
    }
}
