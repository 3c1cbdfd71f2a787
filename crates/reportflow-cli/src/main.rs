mod cli;
mod commands;
mod completions;
mod config;
mod error;
mod logging;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use reportflow_core::paths;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error::handle_error(err);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::Completions { shell }) = cli.command {
        completions::generate_completions(shell);
        return Ok(());
    }

    let config = config::CliConfig::load();
    let profile_path = cli.profile.clone().or_else(|| config.default.profile.clone());

    if let Some(Commands::Profile) = cli.command {
        return commands::profile::run(profile_path.as_deref());
    }

    let log_dir = match &config.default.log_dir {
        Some(dir) => dir.clone(),
        None => paths::logs_dir()?,
    };
    let _guard = logging::init(cli.verbose, &log_dir)?;

    match cli.command {
        Some(Commands::Probe(args)) => commands::probe::run(args, &config, cli.format).await,
        Some(Commands::Run(args)) => {
            commands::run::run(args, &config, profile_path.as_deref(), cli.format).await
        }
        None => commands::run::run(cli.run, &config, profile_path.as_deref(), cli.format).await,
        Some(Commands::Profile) | Some(Commands::Completions { .. }) => Ok(()),
    }
}
