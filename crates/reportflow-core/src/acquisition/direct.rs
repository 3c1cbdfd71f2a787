use anyhow::Result;
use async_trait::async_trait;
use reportflow_browser::ExportOutcome;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::{AcquisitionContext, AcquisitionStep, Produced};
use crate::models::AcquisitionStrategy;

/// Click the page's export control and keep the downloaded file.
///
/// The export outcome is stored on the context so the popup strategy can
/// follow a window opened instead of a download.
pub struct DirectDownload;

#[async_trait]
impl AcquisitionStep for DirectDownload {
    fn strategy(&self) -> AcquisitionStrategy {
        AcquisitionStrategy::DirectDownload
    }

    async fn produce(&self, ctx: &mut AcquisitionContext<'_>, staging: &Path) -> Result<Produced> {
        let Some(selector) = ctx.settings.export_selector.as_deref() else {
            return Ok(Produced::Nothing("no export control configured".to_string()));
        };

        let outcome = ctx
            .page
            .trigger_export(selector, Duration::from_millis(ctx.settings.export_timeout_ms))
            .await?;
        debug!(?outcome, "Export triggered");
        ctx.export = Some(outcome.clone());

        match outcome {
            ExportOutcome::Download { path, .. } => {
                tokio::fs::copy(&path, staging).await?;
                Ok(Produced::File { has_content: true })
            }
            ExportOutcome::Popup { .. } => {
                Ok(Produced::Nothing("export opened a window".to_string()))
            }
            ExportOutcome::Nothing => Ok(Produced::Nothing("export produced nothing".to_string())),
        }
    }
}
