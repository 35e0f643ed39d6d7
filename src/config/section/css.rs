//! `[css]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [css]
//! source_map = true          # Emit `.css.map` next to dev stylesheets
//!
//! [css.browsers]             # Oldest versions to add vendor prefixes for
//! chrome = "100"
//! safari = "15.4"
//! ```
//!
//! Release builds never emit source maps.

use lightningcss::targets::Browsers;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CssConfig {
    pub source_map: bool,
    pub browsers: BrowserTargets,
}

impl Default for CssConfig {
    fn default() -> Self {
        Self {
            source_map: true,
            browsers: BrowserTargets::default(),
        }
    }
}

impl CssConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if let Err(message) = self.browsers.to_browsers() {
            diag.error(FieldPath::new("css.browsers"), message);
        }
    }
}

/// Minimum browser versions, as `major[.minor[.patch]]` strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserTargets {
    pub android: Option<String>,
    pub chrome: Option<String>,
    pub edge: Option<String>,
    pub firefox: Option<String>,
    pub ie: Option<String>,
    pub ios_saf: Option<String>,
    pub opera: Option<String>,
    pub safari: Option<String>,
    pub samsung: Option<String>,
}

impl Default for BrowserTargets {
    fn default() -> Self {
        Self {
            android: None,
            chrome: Some("100".into()),
            edge: Some("100".into()),
            firefox: Some("100".into()),
            ie: None,
            ios_saf: Some("15".into()),
            opera: None,
            safari: Some("15".into()),
            samsung: None,
        }
    }
}

impl BrowserTargets {
    /// Convert to lightningcss targets.
    pub fn to_browsers(&self) -> Result<Browsers, String> {
        let parse = |name: &str, value: &Option<String>| -> Result<Option<u32>, String> {
            value
                .as_deref()
                .map(|v| parse_version(v).ok_or_else(|| format!("invalid {name} version `{v}`")))
                .transpose()
        };

        Ok(Browsers {
            android: parse("android", &self.android)?,
            chrome: parse("chrome", &self.chrome)?,
            edge: parse("edge", &self.edge)?,
            firefox: parse("firefox", &self.firefox)?,
            ie: parse("ie", &self.ie)?,
            ios_saf: parse("ios_saf", &self.ios_saf)?,
            opera: parse("opera", &self.opera)?,
            safari: parse("safari", &self.safari)?,
            samsung: parse("samsung", &self.samsung)?,
        })
    }
}

/// Encode `major[.minor[.patch]]` the way lightningcss expects:
/// `major << 16 | minor << 8 | patch`.
fn parse_version(version: &str) -> Option<u32> {
    let mut parts = version.trim().split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    let patch: u32 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    if parts.next().is_some() || minor > 255 || patch > 255 {
        return None;
    }
    Some((major << 16) | (minor << 8) | patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("15"), Some(15 << 16));
        assert_eq!(parse_version("15.4"), Some((15 << 16) | (4 << 8)));
        assert_eq!(parse_version("1.2.3"), Some((1 << 16) | (2 << 8) | 3));
        assert_eq!(parse_version("latest"), None);
        assert_eq!(parse_version("1.2.3.4"), None);
    }

    #[test]
    fn test_browsers_section() {
        let config = test_parse_config("[css]\nsource_map = false\n[css.browsers]\nie = \"11\"");
        assert!(!config.css.source_map);
        let browsers = config.css.browsers.to_browsers().unwrap();
        assert_eq!(browsers.ie, Some(11 << 16));
        assert_eq!(browsers.chrome, Some(100 << 16));
    }

    #[test]
    fn test_invalid_browser_reported() {
        let mut config = CssConfig::default();
        config.browsers.safari = Some("next".into());

        let mut diag = ConfigDiagnostics::new();
        config.validate(&mut diag);
        assert_eq!(diag.len(), 1);
    }
}
