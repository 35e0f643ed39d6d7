//! Build steps: read matching sources, transform, write into a territory.
//!
//! # Module Structure
//!
//! ```text
//! step/
//! ├── source      # Glob and vendor inputs
//! ├── territory   # Owned output directories and their carve-outs
//! ├── runner      # One step run: parallel per-file processing
//! ├── registry    # StepRegistry and the standard step set
//! └── mod.rs      # StepName, BuildStep, StepError (this file)
//! ```

mod registry;
mod runner;
mod source;
mod territory;


pub use registry::{StepRegistry, init};
pub use runner::StepReport;
pub use source::{Source, SourceFile};
pub use territory::Territory;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::transform::{Transform, TransformError};

/// The build steps a pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepName {
    Html,
    Css,
    Js,
    Images,
    Fonts,
    Assets,
}

impl StepName {
    /// Every step, in the order full builds run them.
    pub const ALL: [StepName; 6] = [
        StepName::Assets,
        StepName::Fonts,
        StepName::Images,
        StepName::Js,
        StepName::Css,
        StepName::Html,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::Js => "js",
            Self::Images => "images",
            Self::Fonts => "fonts",
            Self::Assets => "assets",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepName {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| StepError::UnknownStep(s.to_owned()))
    }
}

/// Step-level failures. Per-file transform errors are not among them; those
/// land in [`StepReport::failures`].
#[derive(Debug, Error)]
pub enum StepError {
    #[error("[{step}] cannot write `{}`", path.display())]
    Filesystem {
        step: StepName,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[{step}] {source}")]
    Prepare {
        step: StepName,
        #[source]
        source: TransformError,
    },

    #[error("[{step}] invalid source pattern `{pattern}`")]
    Pattern {
        step: StepName,
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("[{a}] and [{b}] both write `{}`", path.display())]
    Overlap {
        a: StepName,
        b: StepName,
        path: PathBuf,
    },

    #[error("unknown step `{0}`")]
    UnknownStep(String),

    #[error("[{step}] {count} file(s) failed")]
    Failed { step: StepName, count: usize },
}

/// A registered step: where it reads, where it may write, what it does.
pub struct BuildStep {
    name: StepName,
    source: Source,
    output: PathBuf,
    territory: Territory,
    transforms: Vec<Box<dyn Transform>>,
    /// Transform failures fail the whole step (release builds).
    strict: bool,
}

impl BuildStep {
    #[cfg(test)]
    pub fn territory(&self) -> &Territory {
        &self.territory
    }
}

impl fmt::Debug for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildStep")
            .field("name", &self.name)
            .field("source", &self.source.describe())
            .field("output", &self.output)
            .field(
                "transforms",
                &self.transforms.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("strict", &self.strict)
            .finish()
    }
}
