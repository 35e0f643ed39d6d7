//! Where a step's input files come from.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern, PatternError};

use crate::config::VendorEntry;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// A matched input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the step's output directory.
    pub rel: PathBuf,
}

#[derive(Debug, Clone)]
pub enum Source {
    /// Files matching `pattern` below `base`; output mirrors the tree.
    Glob {
        base: PathBuf,
        pattern: String,
        /// Skip `_`-prefixed files (SCSS partials).
        skip_partials: bool,
    },
    /// Vendored files: each entry's matches land flat in its `to` directory.
    Vendor {
        base: PathBuf,
        entries: Vec<VendorEntry>,
    },
}

impl Source {
    pub fn glob(base: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self::Glob {
            base: base.into(),
            pattern: pattern.into(),
            skip_partials: false,
        }
    }

    pub fn glob_without_partials(base: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self::Glob {
            base: base.into(),
            pattern: pattern.into(),
            skip_partials: true,
        }
    }

    pub fn vendor(base: impl Into<PathBuf>, entries: Vec<VendorEntry>) -> Self {
        Self::Vendor {
            base: base.into(),
            entries,
        }
    }

    /// Human-readable pattern list for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            Self::Glob { base, pattern, .. } => base.join(pattern).display().to_string(),
            Self::Vendor { entries, .. } => entries
                .iter()
                .map(|e| e.from.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Collect matching files, sorted by output path.
    ///
    /// A missing base directory yields an empty list.
    pub fn collect(&self) -> Result<Vec<SourceFile>, PatternError> {
        let mut files = match self {
            Self::Glob {
                base,
                pattern,
                skip_partials,
            } => glob_files(base, pattern)?
                .into_iter()
                .filter(|path| !(*skip_partials && is_partial(path)))
                .filter_map(|path| {
                    let rel = path.strip_prefix(base).ok()?.to_path_buf();
                    Some(SourceFile { path, rel })
                })
                .collect::<Vec<_>>(),
            Self::Vendor { base, entries } => {
                let mut files = Vec::new();
                for entry in entries {
                    for path in glob_files(base, &entry.from)? {
                        let Some(name) = path.file_name() else {
                            continue;
                        };
                        let rel = entry.to.join(name);
                        files.push(SourceFile { path, rel });
                    }
                }
                files
            }
        };
        files.sort_by(|a, b| a.rel.cmp(&b.rel));
        Ok(files)
    }
}

fn glob_files(base: &Path, pattern: &str) -> Result<Vec<PathBuf>, PatternError> {
    Pattern::new(pattern)?;
    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let full = format!(
        "{}/{}",
        Pattern::escape(&base.to_string_lossy()),
        pattern
    );
    let files = glob::glob_with(&full, MATCH_OPTIONS)?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                crate::debug!("source"; "skipping unreadable {}: {}", e.path().display(), e.error());
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    Ok(files)
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}
