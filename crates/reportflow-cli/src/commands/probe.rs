use anyhow::Result;
use reportflow_browser::probe_runtime;

use crate::cli::ProbeArgs;
use crate::config::CliConfig;
use crate::output::{OutputFormat, json::print_json};

pub async fn run(args: ProbeArgs, config: &CliConfig, format: OutputFormat) -> Result<()> {
    let node_dir = args.node_dir.or_else(|| config.default.node_dir.clone());
    let probe = probe_runtime(node_dir.as_deref()).await?;

    if format.is_json() {
        return print_json(&probe);
    }

    println!("ReportFlow Runtime");
    println!(
        "Node.js: {}",
        probe.node_version.as_deref().unwrap_or("not found")
    );
    println!(
        "Playwright package: {}",
        if probe.playwright_package_available { "available" } else { "missing" }
    );
    println!(
        "Chromium cache: {}",
        if probe.chromium_cache_detected { "detected" } else { "not detected" }
    );
    println!("Ready: {}", if probe.ready { "yes" } else { "no" });
    for note in &probe.notes {
        println!("  - {note}");
    }
    Ok(())
}
