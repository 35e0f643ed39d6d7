//! One-shot step tasks: `sitepipe css`, `sitepipe html`, ...

use anyhow::{Result, bail};

use crate::config::PipelineConfig;
use crate::core::BuildMode;
use crate::step::{StepName, init};

/// Run a single dev step into the dev output root.
///
/// Fails when the step fails or any of its files was withheld.
pub fn run_step(config: &PipelineConfig, name: StepName) -> Result<()> {
    let registry = init(config, BuildMode::Development, config.output_dir())?;
    let report = registry.run(name)?;

    if !report.is_clean() {
        bail!(
            "{}: {} of {} files failed",
            name,
            report.failures.len(),
            report.files
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::config::test_config_at;

    #[test]
    fn test_run_step() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/js")).unwrap();
        fs::write(temp.path().join("src/js/app.js"), "var a = 1;").unwrap();
        let config = test_config_at(temp.path());

        run_step(&config, StepName::Js).unwrap();
        assert!(config.output_dir().join("js/app.js").is_file());
    }

    #[test]
    fn test_file_failure_fails_task() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/scss")).unwrap();
        fs::write(temp.path().join("src/scss/a.scss"), ".a { color: $nope; }").unwrap();
        let config = test_config_at(temp.path());

        let err = run_step(&config, StepName::Css).unwrap_err();
        assert!(err.to_string().contains("1 of 1 files failed"));
    }
}
