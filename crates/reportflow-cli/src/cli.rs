use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "reportflow")]
#[command(version, about = "ReportFlow - resilient web report extraction")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Arguments for the default `run` workflow
    #[command(flatten)]
    pub run: RunArgs,

    /// Site profile (TOML); the built-in profile is used when omitted
    #[arg(long, global = true, env = "REPORTFLOW_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in, extract every configured report and deliver the documents
    Run(RunArgs),

    /// Check that Node.js and Playwright are ready
    Probe(ProbeArgs),

    /// Print the active site profile as TOML
    Profile,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Login page of the report site
    #[arg(long, env = "LOGIN_URL")]
    pub login_url: Option<String>,

    #[arg(long, env = "USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Operator role to pick after login
    #[arg(long, env = "ROLE_NAME")]
    pub role: Option<String>,

    /// Label for the first configured run
    #[arg(long, env = "REPORT_A_NAME")]
    pub report_a_name: Option<String>,

    /// Label for the second configured run
    #[arg(long, env = "REPORT_B_NAME")]
    pub report_b_name: Option<String>,

    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    pub telegram_chat_id: Option<String>,

    /// Where finished documents are written (defaults to ~/.reportflow/output)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Directory holding node_modules/playwright
    #[arg(long, env = "REPORTFLOW_NODE_DIR")]
    pub node_dir: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Skip delivery even when a channel is configured
    #[arg(long)]
    pub no_deliver: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ProbeArgs {
    /// Directory holding node_modules/playwright
    #[arg(long, env = "REPORTFLOW_NODE_DIR")]
    pub node_dir: Option<PathBuf>,
}
