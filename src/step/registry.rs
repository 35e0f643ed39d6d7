//! Step registry and the standard step set.
//!
//! | Step     | Source (under `paths.source`)  | Output            | Reserves                      |
//! |----------|--------------------------------|-------------------|-------------------------------|
//! | `html`   | `html/pages/**/*.html`         | `<out>/`          | `css/ js/ images/ fonts/`     |
//! | `css`    | `scss/**/*.scss` (no partials) | `<out>/css/`      | `css/assets/`                 |
//! | `js`     | `js/**/*.js`                   | `<out>/js/`       | `js/assets/`                  |
//! | `images` | `images/**/*`                  | `<out>/images/`   |                               |
//! | `fonts`  | `fonts/**/*`                   | `<out>/fonts/`    | `fonts/fontawesome/`          |
//! | `assets` | `[[vendor]]` entries           | vendor dirs       |                               |

use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::{BuildStep, Source, StepError, StepName, StepReport, Territory};
use crate::config::PipelineConfig;
use crate::config::section::vendor::VENDOR_DIRS;
use crate::core::BuildMode;
use crate::transform::{
    Autoprefix, CollapseWhitespace, CompileScss, CompressImage, MinifyJs, PageTemplate, Transform,
};

/// Top-level output directories owned by the asset steps.
const CSS_DIR: &str = "css";
const JS_DIR: &str = "js";
const IMAGES_DIR: &str = "images";
const FONTS_DIR: &str = "fonts";

/// Registered steps, keyed by name.
///
/// Registration rejects a step whose territory overlaps one already
/// registered, so every pair of steps can run concurrently.
#[derive(Debug)]
pub struct StepRegistry {
    mode: BuildMode,
    steps: FxHashMap<StepName, Arc<BuildStep>>,
}

impl StepRegistry {
    pub fn new(mode: BuildMode) -> Self {
        Self {
            mode,
            steps: FxHashMap::default(),
        }
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Register a step. Returns a shareable handle to it.
    pub fn register(
        &mut self,
        name: StepName,
        source: Source,
        output: impl Into<std::path::PathBuf>,
        territory: Territory,
        transforms: Vec<Box<dyn Transform>>,
    ) -> Result<Arc<BuildStep>, StepError> {
        for (other, step) in &self.steps {
            if *other == name {
                continue;
            }
            if let Some(path) = territory.overlap(&step.territory) {
                return Err(StepError::Overlap {
                    a: name,
                    b: *other,
                    path,
                });
            }
        }

        let step = Arc::new(BuildStep {
            name,
            source,
            output: output.into(),
            territory,
            transforms,
            strict: self.mode.is_release(),
        });
        self.steps.insert(name, Arc::clone(&step));
        Ok(step)
    }

    pub fn get(&self, name: StepName) -> Option<&Arc<BuildStep>> {
        self.steps.get(&name)
    }

    /// Run a registered step once.
    pub fn run(&self, name: StepName) -> Result<StepReport, StepError> {
        self.get(name)
            .ok_or_else(|| StepError::UnknownStep(name.to_string()))?
            .run()
    }

    /// Registered step names, in full-build order.
    pub fn names(&self) -> Vec<StepName> {
        StepName::ALL
            .into_iter()
            .filter(|name| self.steps.contains_key(name))
            .collect()
    }
}

/// Build the standard step set writing under `output_root`.
///
/// Release mode swaps in the minifying transform variants and makes
/// transform failures fail their step.
pub fn init(
    config: &PipelineConfig,
    mode: BuildMode,
    output_root: &Path,
) -> Result<StepRegistry, StepError> {
    let src = config.source_dir();
    let out = output_root;
    let release = mode.is_release();
    let mut registry = StepRegistry::new(mode);

    // html
    let mut html: Vec<Box<dyn Transform>> = vec![Box::new(PageTemplate::new(
        &src.join("html"),
        config.html.default_layout.clone(),
    ))];
    if release {
        html.push(Box::new(CollapseWhitespace));
    }
    registry.register(
        StepName::Html,
        Source::glob(src.join("html/pages"), "**/*.html"),
        out,
        Territory::dir(out)
            .reserving(out.join(CSS_DIR))
            .reserving(out.join(JS_DIR))
            .reserving(out.join(IMAGES_DIR))
            .reserving(out.join(FONTS_DIR)),
        html,
    )?;

    // css
    let browsers = config
        .css
        .browsers
        .to_browsers()
        .unwrap_or_default();
    let css: Vec<Box<dyn Transform>> = vec![
        Box::new(CompileScss::new(
            release,
            vec![src.join("scss"), config.vendor_dir().to_path_buf()],
        )),
        Box::new(Autoprefix::new(
            browsers,
            release,
            config.css.source_map && !release,
        )),
    ];
    registry.register(
        StepName::Css,
        Source::glob_without_partials(src.join("scss"), "**/*.scss"),
        out.join(CSS_DIR),
        Territory::dir(out.join(CSS_DIR)).reserving(out.join("css/assets")),
        css,
    )?;

    // js
    let js: Vec<Box<dyn Transform>> = if release {
        vec![Box::new(MinifyJs)]
    } else {
        Vec::new()
    };
    registry.register(
        StepName::Js,
        Source::glob(src.join("js"), "**/*.js"),
        out.join(JS_DIR),
        Territory::dir(out.join(JS_DIR)).reserving(out.join("js/assets")),
        js,
    )?;

    // images
    let compress = if release {
        CompressImage::with_jpeg_quality(config.images.jpeg_quality)
    } else {
        CompressImage::lossless()
    };
    registry.register(
        StepName::Images,
        Source::glob(src.join("images"), "**/*"),
        out.join(IMAGES_DIR),
        Territory::dir(out.join(IMAGES_DIR)),
        vec![Box::new(compress)],
    )?;

    // fonts
    registry.register(
        StepName::Fonts,
        Source::glob(src.join("fonts"), "**/*"),
        out.join(FONTS_DIR),
        Territory::dir(out.join(FONTS_DIR)).reserving(out.join("fonts/fontawesome")),
        Vec::new(),
    )?;

    // assets
    registry.register(
        StepName::Assets,
        Source::vendor(config.vendor_dir(), config.vendor.clone()),
        out,
        Territory::dirs(VENDOR_DIRS.iter().map(|dir| out.join(dir))),
        Vec::new(),
    )?;

    Ok(registry)
}
