//! `sitepipe build`: the release build.

use anyhow::Result;

use crate::config::PipelineConfig;
use crate::logger::status_success;
use crate::release;

pub fn build_release(config: &PipelineConfig) -> Result<()> {
    let report = release::build(config)?;
    status_success(&format!("release: {}", report.summary()));
    Ok(())
}
