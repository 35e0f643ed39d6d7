//! `[html]` section configuration.
//!
//! ```toml
//! [html]
//! default_layout = "default"   # layout used when a page names none
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlConfig {
    /// Layout file stem in `html/layouts/` applied to pages without a
    /// `layout` front matter key.
    pub default_layout: String,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            default_layout: "default".into(),
        }
    }
}
