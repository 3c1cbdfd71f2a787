use anyhow::{Result, bail};
use reportflow_browser::{LaunchOptions, PlaywrightPage, ReportPage, ensure_probe_ready, probe_runtime};
use reportflow_core::{
    Credentials, DeliverySink, ExtractionReport, ReportRunner, SessionBootstrap, SiteProfile,
    TelegramConfig, TelegramSink, paths,
};
use std::path::Path;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::commands::profile;
use crate::config::CliConfig;
use crate::output::{OutputFormat, json::print_json, table};

pub async fn run(
    args: RunArgs,
    config: &CliConfig,
    profile_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let profile = profile::load(profile_path)?.with_run_labels(&[
        args.report_a_name.clone(),
        args.report_b_name.clone(),
    ]);
    let credentials = credentials(&args)?;
    let output_dir = match args.output_dir.clone().or_else(|| config.default.output_dir.clone()) {
        Some(dir) => dir,
        None => paths::output_dir()?,
    };
    let node_dir = args.node_dir.clone().or_else(|| config.default.node_dir.clone());

    let probe = probe_runtime(node_dir.as_deref()).await?;
    ensure_probe_ready(&probe)?;

    let page = PlaywrightPage::launch(LaunchOptions {
        headless: !args.headed && config.headless(),
        artifacts_dir: paths::artifacts_dir()?,
        node_workdir: node_dir,
        document_patterns: profile.acquisition.document_patterns.clone(),
        ..Default::default()
    })
    .await?;
    info!(profile = %profile.name, runs = profile.runs.len(), "Browser session started");

    let extracted = extract(&page, &profile, &credentials, &output_dir).await;
    if let Err(err) = page.close().await {
        warn!(error = %err, "Browser did not close cleanly");
    }
    let mut report = extracted?;

    if !args.no_deliver {
        let telegram = TelegramConfig::from_parts(
            args.telegram_bot_token.clone().or_else(|| config.telegram.bot_token.clone()),
            args.telegram_chat_id.clone().or_else(|| config.telegram.chat_id.clone()),
        );
        match telegram {
            Some(telegram) => {
                let sink = TelegramSink::new(telegram);
                report.delivery = sink.deliver(&report.saved_paths()).await;
            }
            None => info!("No delivery channel configured"),
        }
    }

    print_report(&report, format)?;

    let failed = report.runs.iter().filter(|run| !run.ok).count();
    if failed > 0 {
        bail!("{} of {} runs failed", failed, report.runs.len());
    }
    Ok(())
}

/// Log in once, then execute every run over the same session.
async fn extract(
    page: &dyn ReportPage,
    profile: &SiteProfile,
    credentials: &Credentials,
    output_dir: &Path,
) -> Result<ExtractionReport> {
    SessionBootstrap::new(page, profile)
        .login(credentials)
        .await?;
    let runs = ReportRunner::new(page, profile, output_dir.to_path_buf())
        .run_all()
        .await;
    Ok(ExtractionReport {
        runs,
        delivery: Vec::new(),
    })
}

fn credentials(args: &RunArgs) -> Result<Credentials> {
    let mut missing = Vec::new();
    if args.login_url.is_none() {
        missing.push("LOGIN_URL");
    }
    if args.username.is_none() {
        missing.push("USERNAME");
    }
    if args.password.is_none() {
        missing.push("PASSWORD");
    }
    if !missing.is_empty() {
        bail!("Missing login settings: {}", missing.join(", "));
    }
    Ok(Credentials {
        login_url: args.login_url.clone().unwrap_or_default(),
        username: args.username.clone().unwrap_or_default(),
        password: args.password.clone().unwrap_or_default(),
        role: args.role.clone().filter(|role| !role.trim().is_empty()),
    })
}

fn print_report(report: &ExtractionReport, format: OutputFormat) -> Result<()> {
    if format.is_json() {
        return print_json(&serde_json::json!({
            "finished_at": chrono::Utc::now().to_rfc3339(),
            "ok": report.all_ok(),
            "report": report,
        }));
    }

    table::print_table(table::run_table(report))?;
    for run in report.runs.iter().filter(|run| !run.ok) {
        println!(
            "{}: {}",
            run.label,
            run.error.as_deref().unwrap_or("failed")
        );
        for failure in &run.field_failures {
            println!("  {} tried: {}", failure.field, failure.attempted.join(", "));
        }
    }
    if !report.delivery.is_empty() {
        table::print_table(table::delivery_table(report))?;
    }
    Ok(())
}
