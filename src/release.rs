//! Release build: every step once, minified, into the release root.
//!
//! ```text
//! .build.staging/  ◄── all steps (release variants), in order
//!        │ success
//!        ▼
//! build/ ──rename──► .build.old ──remove
//! .build.staging/ ──rename──► build/
//! ```
//!
//! A failed build removes the staging tree and leaves the previous release
//! output exactly as it was.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::BuildMode;
use crate::step::{StepError, StepName, StepReport, init};
use crate::utils::plural::plural_count;
use crate::{debug, log};

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("failed to prepare staging directory `{path}`: {source}")]
    Staging { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Step(#[from] StepError),

    #[error("failed to move release output into `{path}`: {source}")]
    Swap { path: PathBuf, source: io::Error },
}

/// Outcome of a successful release build.
#[derive(Debug)]
pub struct ReleaseReport {
    pub output: PathBuf,
    /// One report per step, in run order.
    pub reports: Vec<StepReport>,
    pub elapsed: Duration,
}

impl ReleaseReport {
    /// Source files processed across all steps.
    pub fn files(&self) -> usize {
        self.reports.iter().map(|r| r.files).sum()
    }

    /// `3 files in 120ms`
    pub fn summary(&self) -> String {
        format!("{} in {}ms", plural_count(self.files(), "file"), self.elapsed.as_millis())
    }
}

/// Run the release build for `config`.
pub fn build(config: &PipelineConfig) -> Result<ReleaseReport, ReleaseError> {
    let started = Instant::now();
    let output = config.release_dir().to_path_buf();
    let staging = sibling(&output, "staging");

    reset_dir(&staging)?;
    debug!("release"; "staging into {}", staging.display());

    let reports = match run_steps(config, &staging) {
        Ok(reports) => reports,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
    };

    swap(&staging, &output)?;

    let report = ReleaseReport {
        output,
        reports,
        elapsed: started.elapsed(),
    };
    log!("release"; "{} into {}", report.summary(), report.output.display());
    Ok(report)
}

/// Every step, sequentially, stopping at the first failure.
fn run_steps(config: &PipelineConfig, staging: &Path) -> Result<Vec<StepReport>, ReleaseError> {
    let registry = init(config, BuildMode::Release, staging)?;
    let mut reports = Vec::with_capacity(StepName::ALL.len());
    for name in registry.names() {
        reports.push(registry.run(name)?);
    }
    Ok(reports)
}

/// `.build.<suffix>` next to `build`.
fn sibling(output: &Path, suffix: &str) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "build".to_owned());
    output.with_file_name(format!(".{name}.{suffix}"))
}

fn reset_dir(dir: &Path) -> Result<(), ReleaseError> {
    let staging_error = |source| ReleaseError::Staging {
        path: dir.to_path_buf(),
        source,
    };
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(staging_error(e)),
    }
    fs::create_dir_all(dir).map_err(staging_error)
}

/// Replace `output` with `staging`, keeping the old tree until the new one is in.
fn swap(staging: &Path, output: &Path) -> Result<(), ReleaseError> {
    let swap_error = |source| ReleaseError::Swap {
        path: output.to_path_buf(),
        source,
    };

    let old = sibling(output, "old");
    let _ = fs::remove_dir_all(&old);

    let had_previous = output.exists();
    if had_previous {
        fs::rename(output, &old).map_err(swap_error)?;
    }

    if let Err(e) = fs::rename(staging, output) {
        if had_previous {
            let _ = fs::rename(&old, output);
        }
        let _ = fs::remove_dir_all(staging);
        return Err(swap_error(e));
    }

    if had_previous && let Err(e) = fs::remove_dir_all(&old) {
        log!("release"; "could not remove {}: {}", old.display(), e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;
    use crate::config::test_config_at;

    fn write(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn png() -> Vec<u8> {
        use image::codecs::png::{CompressionType, FilterType, PngEncoder};
        use image::{ExtendedColorType, ImageEncoder};

        let pixels = vec![200u8; 64 * 64 * 3];
        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter)
            .write_image(&pixels, 64, 64, ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    fn project() -> (TempDir, PipelineConfig) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "src/html/layouts/default.html", "<html>\n  <body>\n    {{> body}}\n  </body>\n</html>\n");
        write(root, "src/html/pages/index.html", "<main>\n  <p>Hi</p>\n</main>\n");
        write(root, "src/scss/main.scss", ".nav {\n  a { color: red; }\n}\n");
        write(root, "src/images/photo.png", png());
        write(root, "src/js/app.js", "function greet(name) {\n  return 'hi ' + name;\n}\n");
        let config = test_config_at(root);
        (temp, config)
    }

    fn dev_build(config: &PipelineConfig) {
        let registry = init(config, BuildMode::Development, config.output_dir()).unwrap();
        for name in registry.names() {
            registry.run(name).unwrap();
        }
    }

    fn listing(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files: Vec<_> = jwalk::WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let path = e.path();
                (path.strip_prefix(dir).unwrap().to_path_buf(), fs::read(&path).unwrap())
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_release_build_minifies_and_leaves_dev_output() {
        let (temp, config) = project();
        dev_build(&config);
        let dev_before = listing(config.output_dir());

        let report = build(&config).unwrap();
        let out = config.release_dir();

        assert_eq!(report.output, out);
        assert_eq!(report.reports.len(), StepName::ALL.len());

        let html = fs::read_to_string(out.join("index.html")).unwrap();
        assert_eq!(html.trim(), "<html><body><main><p>Hi</p></main></body></html>");

        let css = fs::read_to_string(out.join("css/main.css")).unwrap();
        assert!(!css.contains('\n'));
        assert!(!css.contains("sourceMappingURL"));
        assert!(!out.join("css/main.css.map").exists());

        let js = fs::read_to_string(out.join("js/app.js")).unwrap();
        assert!(js.contains("function greet("));

        let image = fs::read(out.join("images/photo.png")).unwrap();
        assert!(image.len() < png().len());

        assert_eq!(dev_before, listing(config.output_dir()));
        assert!(!temp.path().join(".build.staging").exists());
        assert!(!temp.path().join(".build.old").exists());
    }

    #[test]
    fn test_release_build_replaces_previous_output() {
        let (temp, config) = project();
        write(temp.path(), "build/stale.html", "old");

        build(&config).unwrap();

        assert!(!config.release_dir().join("stale.html").exists());
        assert!(config.release_dir().join("index.html").is_file());
    }

    #[test]
    fn test_failed_build_keeps_previous_release() {
        let (temp, config) = project();
        build(&config).unwrap();
        let before = listing(config.release_dir());

        write(temp.path(), "src/scss/broken.scss", ".a { color: $missing; }");
        let err = build(&config).unwrap_err();

        assert!(matches!(
            err,
            ReleaseError::Step(StepError::Failed { step: StepName::Css, count: 1 })
        ));
        assert_eq!(before, listing(config.release_dir()));
        assert!(!temp.path().join(".build.staging").exists());
    }

    #[test]
    fn test_failure_aborts_remaining_steps() {
        let (temp, config) = project();
        write(temp.path(), "src/scss/broken.scss", ".a { color: $missing; }");

        assert!(build(&config).is_err());
        // Html runs after css and never started.
        assert!(!config.release_dir().exists());
    }

    #[test]
    fn test_summary_counts_files() {
        let report = |files: &[usize]| ReleaseReport {
            output: PathBuf::from("build"),
            reports: files
                .iter()
                .zip(StepName::ALL)
                .map(|(&files, step)| StepReport {
                    step,
                    files,
                    written: files,
                    unchanged: 0,
                    failures: Vec::new(),
                    elapsed: Duration::ZERO,
                })
                .collect(),
            elapsed: Duration::from_millis(42),
        };

        assert_eq!(report(&[1]).summary(), "1 file in 42ms");
        assert_eq!(report(&[0, 1, 0]).summary(), "1 file in 42ms");
        assert_eq!(report(&[2, 3]).summary(), "5 files in 42ms");
        assert_eq!(report(&[]).summary(), "0 files in 42ms");
    }

    #[test]
    fn test_sibling_names() {
        assert_eq!(
            sibling(Path::new("/site/build"), "staging"),
            PathBuf::from("/site/.build.staging")
        );
        assert_eq!(sibling(Path::new("/site/out"), "old"), PathBuf::from("/site/.out.old"));
    }
}
