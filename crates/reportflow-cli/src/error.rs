use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{err:#}").to_lowercase();

    if msg.contains("node.js is required") || msg.contains("playwright") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Install the browser runtime with:");
        eprintln!("  {} npm i -D playwright && npx playwright install chromium", "$".dimmed());
        eprintln!("  Then check it with:");
        eprintln!("  {} reportflow probe", "$".dimmed());
    }

    if msg.contains("missing login") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Set LOGIN_URL, USERNAME and PASSWORD, or pass --login-url/--username/--password.");
    }

    if msg.contains("control not found") || msg.contains("invalid site profile") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Review the site profile. Print the active one with:");
        eprintln!("  {} reportflow profile", "$".dimmed());
    }

    if msg.contains("runs failed") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Rerun with --verbose, or read the log file under ~/.reportflow/logs.");
    }

    if msg.contains("connection refused") || msg.contains("network") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check your internet connection and try again.");
    }

    std::process::exit(1);
}
