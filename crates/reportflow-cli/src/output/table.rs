use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use reportflow_core::ExtractionReport;

pub fn print_table(table: Table) -> Result<()> {
    println!("{table}");
    Ok(())
}

/// One row per run: outcome, strategy that won, and where the file went.
pub fn run_table(report: &ExtractionReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Run", "Status", "Result", "Tries", "Readiness", "Strategy", "Size", "File"]);

    for run in &report.runs {
        let result = if run.ok {
            Cell::new("ok").fg(Color::Green)
        } else {
            Cell::new(run.error_kind.as_deref().unwrap_or("failed")).fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(&run.label),
            Cell::new(&run.status),
            result,
            Cell::new(run.attempts),
            Cell::new(
                run.readiness
                    .map(|readiness| format!("{readiness:?}"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(
                run.strategy
                    .map(|strategy| strategy.as_str().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(format_size(run.size)),
            Cell::new(
                run.saved_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }
    table
}

pub fn delivery_table(report: &ExtractionReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["File", "Delivered", "Error"]);
    for result in &report.delivery {
        table.add_row(vec![
            Cell::new(result.path.display()),
            Cell::new(if result.delivered { "yes" } else { "no" }),
            Cell::new(result.error.as_deref().unwrap_or("")),
        ]);
    }
    table
}

fn format_size(bytes: u64) -> String {
    match bytes {
        0 => "-".to_string(),
        b if b < 1024 => format!("{b} B"),
        b if b < 1024 * 1024 => format!("{:.1} KiB", b as f64 / 1024.0),
        b => format!("{:.1} MiB", b as f64 / (1024.0 * 1024.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportflow_core::{AcquisitionStrategy, Readiness, RunReport};
    use std::path::PathBuf;

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(0), "-");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(60 * 1024), "60.0 KiB");
    }

    #[test]
    fn run_table_shows_outcome_per_run() {
        let report = ExtractionReport {
            runs: vec![
                RunReport {
                    label: "Delayed Works".to_string(),
                    status: "DELAYED".to_string(),
                    ok: true,
                    readiness: Some(Readiness::Data),
                    strategy: Some(AcquisitionStrategy::NetworkReplay),
                    saved_path: Some(PathBuf::from("/out/Delayed Works 2026-10-16.pdf")),
                    size: 61_440,
                    ..Default::default()
                },
                RunReport {
                    label: "Pending Works".to_string(),
                    status: "PENDING".to_string(),
                    error_kind: Some("readiness_timeout".to_string()),
                    ..Default::default()
                },
            ],
            delivery: Vec::new(),
        };

        let rendered = run_table(&report).to_string();
        assert!(rendered.contains("network_replay"));
        assert!(rendered.contains("readiness_timeout"));
        assert!(rendered.contains("60.0 KiB"));
    }
}
