use anyhow::Result;
use async_trait::async_trait;
use reportflow_browser::ExportOutcome;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::{AcquisitionContext, AcquisitionStep, Produced};
use crate::models::AcquisitionStrategy;

/// Follow a document link inside the window the export opened.
pub struct PopupWindow;

#[async_trait]
impl AcquisitionStep for PopupWindow {
    fn strategy(&self) -> AcquisitionStrategy {
        AcquisitionStrategy::PopupWindow
    }

    async fn produce(&self, ctx: &mut AcquisitionContext<'_>, staging: &Path) -> Result<Produced> {
        let Some(ExportOutcome::Popup { popup, url }) = ctx.export.clone() else {
            return Ok(Produced::Nothing("export did not open a window".to_string()));
        };
        debug!(popup = %popup, url = ?url, "Searching popup for a document link");

        let saved = ctx
            .page
            .popup_document(
                &popup,
                &ctx.settings.document_patterns,
                staging,
                Duration::from_millis(ctx.settings.popup_timeout_ms),
            )
            .await?;
        match saved {
            Some(path) if path != staging => {
                tokio::fs::copy(&path, staging).await?;
                Ok(Produced::File { has_content: true })
            }
            Some(_) => Ok(Produced::File { has_content: true }),
            None => Ok(Produced::Nothing("no document link in window".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::AcquisitionSettings;
    use crate::testing::{ExportFixture, FixturePage};
    use reportflow_browser::{ReportPage, ReportProbe};

    fn probe() -> ReportProbe {
        ReportProbe {
            table_selector: "#gvReport".to_string(),
            empty_markers: Vec::new(),
            period_selector: None,
            region_selector: None,
        }
    }

    #[tokio::test]
    async fn saves_document_from_popup() {
        let temp = tempfile::tempdir().unwrap();
        let staging = temp.path().join("doc.part");
        let page = FixturePage::new().with_export(ExportFixture::Popup {
            document: Some(vec![1; 30_000]),
        });
        let settings = AcquisitionSettings::default();
        let probe = probe();
        let mut ctx = AcquisitionContext::new(&page, &settings, &probe).unwrap();
        ctx.export = Some(
            page.trigger_export("#btnExport", Duration::from_secs(1))
                .await
                .unwrap(),
        );

        let produced = PopupWindow.produce(&mut ctx, &staging).await.unwrap();
        assert_eq!(produced, Produced::File { has_content: true });
        assert_eq!(std::fs::read(&staging).unwrap().len(), 30_000);
    }

    #[tokio::test]
    async fn nothing_without_popup() {
        let temp = tempfile::tempdir().unwrap();
        let page = FixturePage::new();
        let settings = AcquisitionSettings::default();
        let probe = probe();
        let mut ctx = AcquisitionContext::new(&page, &settings, &probe).unwrap();

        let produced = PopupWindow
            .produce(&mut ctx, &temp.path().join("doc.part"))
            .await
            .unwrap();
        assert!(matches!(produced, Produced::Nothing(_)));
    }
}
