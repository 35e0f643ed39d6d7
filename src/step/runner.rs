//! Executing a single step.
//!
//! ```text
//! prepare transforms ─► collect sources ─► par_iter(read → chain → write)
//! ```
//!
//! Every output is written to a temporary sibling and renamed into place, so
//! readers (the dev server, a concurrent run of the same step) only ever see
//! complete files. All writes finish before `run` returns.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::{BuildStep, SourceFile, StepError, StepName};
use crate::transform::{Artifact, TransformError, apply_chain};
use crate::utils::path::clean_path;
use crate::utils::plural::plural_count;
use crate::{debug, log};

/// A file whose output was withheld.
#[derive(Debug, Clone)]
pub struct FileFailure {
    /// Source path relative to the step's base.
    pub path: PathBuf,
    pub error: TransformError,
}

/// Outcome of one step run.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: StepName,
    /// Source files matched.
    pub files: usize,
    /// Output files (re)written.
    pub written: usize,
    /// Output files already up to date.
    pub unchanged: usize,
    pub failures: Vec<FileFailure>,
    pub elapsed: Duration,
}

impl StepReport {
    fn new(step: StepName) -> Self {
        Self {
            step,
            files: 0,
            written: 0,
            unchanged: 0,
            failures: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line summary, e.g. `3 files, 1 failure (12ms)`.
    pub fn summary(&self) -> String {
        let mut summary = plural_count(self.files, "file");
        if self.unchanged > 0 {
            summary.push_str(&format!(" ({} unchanged)", self.unchanged));
        }
        if !self.failures.is_empty() {
            summary.push_str(&format!(", {}", plural_count(self.failures.len(), "failure")));
        }
        summary.push_str(&format!(" ({}ms)", self.elapsed.as_millis()));
        summary
    }

    /// Failure lines, one per withheld file.
    pub fn failure_detail(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("{}: {}", f.path.display(), f.error))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

enum FileOutcome {
    Done { written: usize, unchanged: usize },
    Failed(FileFailure),
}

impl BuildStep {
    /// Run the step once over every matching source.
    pub fn run(&self) -> Result<StepReport, StepError> {
        let started = Instant::now();
        let step = self.name;

        for transform in &self.transforms {
            transform
                .prepare()
                .map_err(|source| StepError::Prepare { step, source })?;
        }

        let files = self.source.collect().map_err(|source| StepError::Pattern {
            step,
            pattern: self.source.describe(),
            source,
        })?;

        let mut report = StepReport::new(step);
        if files.is_empty() {
            debug!(step.as_str(); "no files match {}", self.source.describe());
            report.elapsed = started.elapsed();
            return Ok(report);
        }
        report.files = files.len();

        fs::create_dir_all(&self.output).map_err(|source| self.fs_error(&self.output, source))?;

        let outcomes: Vec<_> = files.par_iter().map(|file| self.process(file)).collect();
        for outcome in outcomes {
            match outcome? {
                FileOutcome::Done { written, unchanged } => {
                    report.written += written;
                    report.unchanged += unchanged;
                }
                FileOutcome::Failed(failure) => report.failures.push(failure),
            }
        }
        report.elapsed = started.elapsed();

        for failure in &report.failures {
            log!(step.as_str(); "{}: {}", failure.path.display(), failure.error);
        }
        log!(step.as_str(); "{}", report.summary());

        if self.strict && !report.failures.is_empty() {
            return Err(StepError::Failed {
                step,
                count: report.failures.len(),
            });
        }
        Ok(report)
    }

    fn process(&self, file: &SourceFile) -> Result<FileOutcome, StepError> {
        let failed = |error: TransformError| -> Result<FileOutcome, StepError> {
            Ok(FileOutcome::Failed(FileFailure {
                path: file.rel.clone(),
                error,
            }))
        };

        let bytes = match fs::read(&file.path) {
            Ok(bytes) => bytes,
            Err(e) => return failed(TransformError::new("read", e.to_string())),
        };
        let artifacts = match apply_chain(&self.transforms, Artifact::new(&file.rel, &file.path, bytes)) {
            Ok(artifacts) => artifacts,
            Err(error) => return failed(error),
        };

        // Check every output first so a file is written completely or not at all.
        let mut targets = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let dest = clean_path(&self.output.join(&artifact.rel));
            if !self.territory.contains(&dest) {
                return failed(TransformError::new(
                    "territory",
                    format!("`{}` is outside the {} output", artifact.rel.display(), self.name),
                ));
            }
            targets.push((dest, artifact.bytes));
        }

        let (mut written, mut unchanged) = (0, 0);
        for (dest, bytes) in targets {
            if write_if_changed(&dest, &bytes).map_err(|source| self.fs_error(&dest, source))? {
                written += 1;
            } else {
                unchanged += 1;
            }
        }
        Ok(FileOutcome::Done { written, unchanged })
    }

    fn fs_error(&self, path: &Path, source: std::io::Error) -> StepError {
        StepError::Filesystem {
            step: self.name,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Write `bytes` to `dest` unless it already holds exactly them.
///
/// Returns whether the file was written.
fn write_if_changed(dest: &Path, bytes: &[u8]) -> std::io::Result<bool> {
    if fs::read(dest).is_ok_and(|existing| existing == bytes) {
        return Ok(false);
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dest.with_file_name(format!(
        ".{name}.{}.{}.tmp",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&temp, bytes)?;
    if let Err(e) = fs::rename(&temp, dest) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_if_changed() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("css/main.css");

        assert!(write_if_changed(&dest, b"a{}").unwrap());
        assert!(!write_if_changed(&dest, b"a{}").unwrap());
        assert!(write_if_changed(&dest, b"b{}").unwrap());
        assert_eq!(fs::read(&dest).unwrap(), b"b{}");

        let leftovers: Vec<_> = fs::read_dir(temp.path().join("css"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_summary() {
        let mut report = StepReport::new(StepName::Css);
        report.files = 3;
        report.unchanged = 1;
        report.failures.push(FileFailure {
            path: PathBuf::from("broken.scss"),
            error: TransformError::new("scss", "expected \"}\""),
        });
        report.elapsed = Duration::from_millis(12);

        assert_eq!(report.summary(), "3 files (1 unchanged), 1 failure (12ms)");
        assert!(report.failure_detail().starts_with("broken.scss: scss:"));
        assert!(!report.is_clean());
    }
}
