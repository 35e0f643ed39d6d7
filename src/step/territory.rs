//! Output territories: the part of the output tree a step may write.
//!
//! A territory is one or more owned directories minus reserved
//! sub-directories that belong to other steps. Two territories conflict when
//! some path would be writable by both.

use std::path::{Path, PathBuf};

use crate::utils::path::clean_path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Territory {
    owned: Vec<PathBuf>,
    reserved: Vec<PathBuf>,
}

impl Territory {
    /// Own a single directory.
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            owned: vec![path.into()],
            reserved: Vec::new(),
        }
    }

    /// Own several directories.
    pub fn dirs(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            owned: paths.into_iter().collect(),
            reserved: Vec::new(),
        }
    }

    /// Carve a sub-directory out for another step.
    pub fn reserving(mut self, path: impl Into<PathBuf>) -> Self {
        self.reserved.push(path.into());
        self
    }

    /// Whether this territory may write `path`.
    pub fn contains(&self, path: &Path) -> bool {
        let path = clean_path(path);
        self.owned.iter().any(|dir| path.starts_with(dir))
            && !self.reserved.iter().any(|dir| path.starts_with(dir))
    }

    /// A directory writable by both territories, if any.
    pub fn overlap(&self, other: &Territory) -> Option<PathBuf> {
        for a in &self.owned {
            for b in &other.owned {
                // The shared region of two nested dirs is the inner one.
                let inner = if b.starts_with(a) {
                    b
                } else if a.starts_with(b) {
                    a
                } else {
                    continue;
                };
                let carved = |reserved: &[PathBuf]| reserved.iter().any(|r| inner.starts_with(r));
                if !carved(&self.reserved) && !carved(&other.reserved) {
                    return Some(inner.clone());
                }
            }
        }
        None
    }
}
