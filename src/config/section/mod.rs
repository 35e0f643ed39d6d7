//! Configuration section definitions.
//!
//! Each module corresponds to a section in `sitepipe.toml`:
//!
//! | Module   | TOML Section | Purpose                                  |
//! |----------|--------------|------------------------------------------|
//! | `paths`  | `[paths]`    | Source, output, release, vendor dirs     |
//! | `serve`  | `[serve]`    | Development server and reload channel    |
//! | `html`   | `[html]`     | Page templating                          |
//! | `css`    | `[css]`      | Browser targets, source maps             |
//! | `images` | `[images]`   | Release image compression                |
//! | `vendor` | `[[vendor]]` | Files vendored from the dependency cache |

mod css;
mod html;
mod images;
mod paths;
mod serve;
pub mod vendor;

pub use css::{BrowserTargets, CssConfig};
pub use html::HtmlConfig;
pub use images::ImagesConfig;
pub use paths::PathsConfig;
pub use serve::ServeConfig;
pub use vendor::VendorEntry;
