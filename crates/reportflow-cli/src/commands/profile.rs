use anyhow::{Context, Result};
use reportflow_core::SiteProfile;
use std::path::Path;

pub fn run(path: Option<&Path>) -> Result<()> {
    let profile = load(path)?;
    print!("{}", profile.to_toml()?);
    Ok(())
}

/// The profile at `path`, or the built-in one.
pub fn load(path: Option<&Path>) -> Result<SiteProfile> {
    match path {
        Some(path) => SiteProfile::load(path)
            .with_context(|| format!("Failed to load site profile {}", path.display())),
        None => Ok(SiteProfile::builtin()),
    }
}
