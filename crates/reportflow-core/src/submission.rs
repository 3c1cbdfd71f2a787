//! Submission & Readiness Verifier

use anyhow::Result;
use reportflow_browser::{ReportPage, ReportProbe};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::models::ReadinessSignal;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionSettings {
    pub submit_selector: String,
    /// URL substring of the report request fired by the submit button.
    #[serde(default)]
    pub response_hint: Option<String>,
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Settle delay of the single retry before moving to the next date format.
    #[serde(default = "default_retry_settle_ms")]
    pub retry_settle_ms: u64,
    pub probe: ReportProbe,
}

impl SubmissionSettings {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn retry_settle(&self) -> Duration {
        Duration::from_millis(self.retry_settle_ms)
    }
}

fn default_response_timeout_ms() -> u64 {
    15_000
}

fn default_settle_ms() -> u64 {
    3_000
}

fn default_retry_settle_ms() -> u64 {
    1_500
}

pub struct SubmissionVerifier<'a> {
    page: &'a dyn ReportPage,
    settings: &'a SubmissionSettings,
}

impl<'a> SubmissionVerifier<'a> {
    pub fn new(page: &'a dyn ReportPage, settings: &'a SubmissionSettings) -> Self {
        Self { page, settings }
    }

    /// Trigger report generation and let the page settle for `settle`.
    ///
    /// The response wait is registered before the click so a fast server
    /// cannot slip past it; its outcome is informational only.
    pub async fn submit(&self, settle: Duration) -> Result<()> {
        let click = self.page.click(&self.settings.submit_selector);
        match &self.settings.response_hint {
            Some(hint) => {
                let wait = self.page.wait_for_response(
                    hint,
                    Duration::from_millis(self.settings.response_timeout_ms),
                );
                let (seen, clicked) = tokio::join!(wait, click);
                clicked?;
                match seen {
                    Ok(true) => debug!(hint = %hint, "Report response observed"),
                    Ok(false) => info!(hint = %hint, "No report response before timeout"),
                    Err(err) => debug!(error = %err, "Report response wait failed"),
                }
            }
            None => click.await?,
        }
        tokio::time::sleep(settle).await;
        Ok(())
    }

    /// Read the report area into a readiness signal.
    pub async fn check(&self) -> Result<ReadinessSignal> {
        let snapshot = self.page.report_snapshot(&self.settings.probe).await?;
        let signal = ReadinessSignal::from_snapshot(&snapshot);
        debug!(
            rows = snapshot.data_rows,
            empty = signal.has_explicit_empty_marker,
            period = ?signal.period_text,
            verdict = ?signal.verdict(),
            "Readiness checked"
        );
        Ok(signal)
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> SubmissionSettings {
    SubmissionSettings {
        submit_selector: "#btnShow".to_string(),
        response_hint: Some("ReportView".to_string()),
        response_timeout_ms: 500,
        settle_ms: 10,
        retry_settle_ms: 5,
        probe: ReportProbe {
            table_selector: "#gvReport".to_string(),
            empty_markers: vec!["No records".to_string()],
            period_selector: Some("#lblPeriod".to_string()),
            region_selector: None,
        },
    }
}
