use anyhow::Result;
use std::path::PathBuf;

const REPORTFLOW_DIR: &str = ".reportflow";
const LOGS_DIR: &str = "logs";
const OUTPUT_DIR: &str = "output";
const ARTIFACTS_DIR: &str = "artifacts";

/// Environment variable to override the ReportFlow directory.
const REPORTFLOW_DIR_ENV: &str = "REPORTFLOW_DIR";

/// Resolve the ReportFlow working directory.
/// Priority: REPORTFLOW_DIR env var > ~/.reportflow/
pub fn resolve_reportflow_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(REPORTFLOW_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|h| h.join(REPORTFLOW_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))
}

/// Get the logs directory: ~/.reportflow/logs/
pub fn logs_dir() -> Result<PathBuf> {
    let dir = resolve_reportflow_dir()?.join(LOGS_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Default destination for finished documents: ~/.reportflow/output/
pub fn output_dir() -> Result<PathBuf> {
    let dir = resolve_reportflow_dir()?.join(OUTPUT_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Browser downloads and driver scratch files: ~/.reportflow/artifacts/
pub fn artifacts_dir() -> Result<PathBuf> {
    let dir = resolve_reportflow_dir()?.join(ARTIFACTS_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
