//! Page composition with layouts and partials.
//!
//! ```text
//! html/
//! ├── pages/       # one output file per page, front matter on top
//! ├── layouts/     # wrap pages; `{{> body}}` marks the page slot
//! └── partials/    # reusable fragments, `{{> header}}` by file stem
//! ```
//!
//! Templates use handlebars syntax. Layouts and partials are reloaded from
//! disk by [`Transform::prepare`] at the start of every run, so an edit to a
//! partial shows up in the next html run without restarting.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use handlebars::Handlebars;
use jwalk::WalkDir;
use regex::Regex;
use serde_json::{Map, Value};

use super::{Artifact, Transform, TransformError};

const TEMPLATE_EXTENSIONS: [&str; 3] = ["html", "hbs", "handlebars"];

/// Layout slot syntax rewritten to a raw `body` variable.
static BODY_SLOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{>\s*body\s*\}\}").expect("valid body slot regex"));

/// Leading `---` YAML block.
static FRONT_MATTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---[ \t]*\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|\z)")
        .expect("valid front matter regex")
});

pub struct PageTemplate {
    layouts: PathBuf,
    partials: PathBuf,
    default_layout: String,
    registry: ArcSwap<Handlebars<'static>>,
}

impl PageTemplate {
    /// `html_dir` holds the `layouts/` and `partials/` directories.
    pub fn new(html_dir: &Path, default_layout: impl Into<String>) -> Self {
        Self {
            layouts: html_dir.join("layouts"),
            partials: html_dir.join("partials"),
            default_layout: default_layout.into(),
            registry: ArcSwap::from_pointee(Handlebars::new()),
        }
    }

    fn error(&self, message: impl Into<String>) -> TransformError {
        TransformError::new(self.name(), message)
    }

    fn load_registry(&self) -> Result<Handlebars<'static>, TransformError> {
        let mut registry = Handlebars::new();
        let partials = template_files(&self.partials);
        let layouts = template_files(&self.layouts);

        for (name, path) in &partials {
            let source = read_template(path).map_err(|e| self.error(e))?;
            registry
                .register_partial(name, source)
                .map_err(|e| self.error(format!("partial `{name}`: {e}")))?;
        }

        for (name, path) in &layouts {
            let source = read_template(path).map_err(|e| self.error(e))?;
            let source = BODY_SLOT.replace_all(&source, "{{{body}}}");
            registry
                .register_template_string(&layout_key(name), source.as_ref())
                .map_err(|e| self.error(format!("layout `{name}`: {e}")))?;
        }

        crate::debug!("html"; "loaded {} layouts, {} partials", layouts.len(), partials.len());
        Ok(registry)
    }
}

impl Transform for PageTemplate {
    fn name(&self) -> &'static str {
        "template"
    }

    fn prepare(&self) -> Result<(), TransformError> {
        let registry = self.load_registry()?;
        self.registry.store(Arc::new(registry));
        Ok(())
    }

    fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
        let text = artifact.text(self.name())?;
        let (front, body) = split_front_matter(text).map_err(|e| self.error(e))?;

        let mut data = front;
        data.insert("page".into(), Value::String(page_name(&artifact.rel)));
        data.insert("root".into(), Value::String(root_prefix(&artifact.rel)));

        let layout = match data.get("layout") {
            Some(Value::String(name)) => Some((name.clone(), true)),
            Some(Value::Bool(false)) => None,
            _ => Some((self.default_layout.clone(), false)),
        };

        let registry = self.registry.load();
        let rendered = registry
            .render_template(body, &data)
            .map_err(|e| self.error(e.to_string()))?;

        let html = match layout {
            Some((name, _)) if registry.has_template(&layout_key(&name)) => {
                data.insert("body".into(), Value::String(rendered));
                registry
                    .render(&layout_key(&name), &data)
                    .map_err(|e| self.error(e.to_string()))?
            }
            Some((name, true)) => {
                return Err(self.error(format!("layout `{name}` not found")));
            }
            _ => rendered,
        };

        Ok(vec![artifact.derive(&artifact.rel, html.into_bytes())])
    }
}

fn layout_key(name: &str) -> String {
    format!("layout/{name}")
}

fn read_template(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("cannot read `{}`: {e}", path.display()))
}

/// `(stem, path)` of every template file below `dir`, sorted by path.
fn template_files(dir: &Path) -> Vec<(String, PathBuf)> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<_> = WalkDir::new(dir)
        .sort(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&e))
        })
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?.to_owned();
            Some((stem, path))
        })
        .collect();
    files.sort_by(|a, b| a.1.cmp(&b.1));
    files
}

/// Split a leading YAML block off the page. Pages without one get empty data.
fn split_front_matter(text: &str) -> Result<(Map<String, Value>, &str), String> {
    let Some(caps) = FRONT_MATTER.captures(text) else {
        return Ok((Map::new(), text));
    };
    let (Some(all), Some(yaml)) = (caps.get(0), caps.get(1)) else {
        return Ok((Map::new(), text));
    };

    let data = match serde_yaml::from_str::<Value>(yaml.as_str()) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Map::new(),
        Ok(_) => return Err("front matter must be a mapping".into()),
        Err(e) => return Err(format!("front matter: {e}")),
    };
    Ok((data, &text[all.end()..]))
}

fn page_name(rel: &Path) -> String {
    rel.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Relative path from the page's directory back to the output root.
fn root_prefix(rel: &Path) -> String {
    let depth = rel.components().count().saturating_sub(1);
    "../".repeat(depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site(layouts: &[(&str, &str)], partials: &[(&str, &str)]) -> TempDir {
        let temp = TempDir::new().unwrap();
        let html = temp.path().join("html");
        fs::create_dir_all(html.join("layouts")).unwrap();
        fs::create_dir_all(html.join("partials")).unwrap();
        for (name, body) in layouts {
            fs::write(html.join("layouts").join(name), body).unwrap();
        }
        for (name, body) in partials {
            fs::write(html.join("partials").join(name), body).unwrap();
        }
        temp
    }

    fn render(template: &PageTemplate, rel: &str, page: &str) -> Result<String, TransformError> {
        template.prepare()?;
        let out = template.apply(Artifact::new(rel, format!("/src/html/pages/{rel}"), page.as_bytes().to_vec()))?;
        Ok(String::from_utf8(out[0].bytes.clone()).unwrap())
    }

    #[test]
    fn test_layout_and_partial_composed() {
        let temp = site(
            &[("default.html", "<html><body>{{> header}}{{> body}}</body></html>")],
            &[("header.html", "<header>{{title}}</header>")],
        );
        let template = PageTemplate::new(&temp.path().join("html"), "default");

        let html = render(&template, "index.html", "---\ntitle: Home\n---\n<main>Hi</main>").unwrap();

        assert_eq!(html, "<html><body><header>Home</header><main>Hi</main></body></html>");
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_named_layout_selected() {
        let temp = site(
            &[
                ("default.html", "D:{{> body}}"),
                ("plain.html", "P:{{> body}}"),
            ],
            &[],
        );
        let template = PageTemplate::new(&temp.path().join("html"), "default");

        assert_eq!(render(&template, "a.html", "---\nlayout: plain\n---\nx").unwrap(), "P:x");
        assert_eq!(render(&template, "b.html", "y").unwrap(), "D:y");
        assert_eq!(render(&template, "c.html", "---\nlayout: false\n---\nz").unwrap(), "z");
    }

    #[test]
    fn test_missing_named_layout_fails() {
        let temp = site(&[], &[]);
        let template = PageTemplate::new(&temp.path().join("html"), "default");

        let err = render(&template, "a.html", "---\nlayout: fancy\n---\nx").unwrap_err();
        assert!(err.message.contains("fancy"));
    }

    #[test]
    fn test_missing_default_layout_renders_bare_page() {
        let temp = site(&[], &[]);
        let template = PageTemplate::new(&temp.path().join("html"), "default");
        assert_eq!(render(&template, "a.html", "<p>{{page}}</p>").unwrap(), "<p>a</p>");
    }

    #[test]
    fn test_missing_partial_fails_file() {
        let temp = site(&[], &[]);
        let template = PageTemplate::new(&temp.path().join("html"), "default");
        assert!(render(&template, "a.html", "{{> nav}}").is_err());
    }

    #[test]
    fn test_partials_reloaded_each_run() {
        let temp = site(&[], &[("nav.html", "one")]);
        let template = PageTemplate::new(&temp.path().join("html"), "default");
        assert_eq!(render(&template, "a.html", "{{> nav}}").unwrap(), "one");

        fs::write(temp.path().join("html/partials/nav.html"), "two").unwrap();
        assert_eq!(render(&template, "a.html", "{{> nav}}").unwrap(), "two");
    }

    #[test]
    fn test_broken_partial_fails_prepare() {
        let temp = site(&[], &[("nav.html", "{{#if}}")]);
        let template = PageTemplate::new(&temp.path().join("html"), "default");
        assert!(template.prepare().is_err());
    }

    #[test]
    fn test_root_prefix() {
        assert_eq!(root_prefix(Path::new("index.html")), "");
        assert_eq!(root_prefix(Path::new("blog/post.html")), "../");
        assert_eq!(root_prefix(Path::new("a/b/c.html")), "../../");
    }

    #[test]
    fn test_root_variable_in_nested_page() {
        let temp = site(&[], &[]);
        let template = PageTemplate::new(&temp.path().join("html"), "default");
        let html = render(&template, "blog/post.html", "<link href=\"{{root}}css/app.css\">").unwrap();
        assert_eq!(html, "<link href=\"../css/app.css\">");
    }

    #[test]
    fn test_front_matter_split() {
        let (data, body) = split_front_matter("---\ntitle: T\ntags: [a, b]\n---\nbody").unwrap();
        assert_eq!(data["title"], "T");
        assert_eq!(data["tags"][1], "b");
        assert_eq!(body, "body");

        let (data, body) = split_front_matter("no front matter").unwrap();
        assert!(data.is_empty());
        assert_eq!(body, "no front matter");

        assert!(split_front_matter("---\n- a\n---\nx").is_err());
    }
}
