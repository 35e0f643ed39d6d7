//! Build mode: incremental development output or minified release output.

/// Selects the transform variants a step is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Readable output with source maps, rebuilt per change.
    Development,
    /// Minified/compressed output written to the release root.
    Release,
}

impl BuildMode {
    #[inline]
    pub const fn is_release(self) -> bool {
        matches!(self, Self::Release)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Development => "dev",
            Self::Release => "release",
        }
    }
}
