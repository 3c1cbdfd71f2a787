//! Artifact Acquisition Cascade
//!
//! Obtains the final document through strictly ordered strategies. Every
//! strategy writes to its own staging file; the first output passing the
//! content-aware validity check is moved into place and ends the cascade.

mod direct;
mod popup;
mod render;
mod replay;
mod screenshot;

pub use direct::DirectDownload;
pub use popup::PopupWindow;
pub use render::{DomRender, extract_table};
pub use replay::{NetworkReplay, is_document_body};
pub use screenshot::{ScreenshotRender, png_to_pdf};

use anyhow::Result;
use async_trait::async_trait;
use reportflow_browser::{ControlHandle, ExportOutcome, ReportPage, ReportProbe};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::models::{AcquisitionAttempt, AcquisitionOutcome, AcquisitionStrategy, Readiness};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcquisitionSettings {
    /// Native export control; without one the served strategies are skipped.
    #[serde(default)]
    pub export_selector: Option<String>,
    #[serde(default = "default_export_timeout_ms")]
    pub export_timeout_ms: u64,
    #[serde(default = "default_export_timeout_ms")]
    pub popup_timeout_ms: u64,
    #[serde(default = "default_replay_timeout_ms")]
    pub replay_timeout_ms: u64,
    /// URL substrings identifying document responses.
    #[serde(default = "default_document_patterns")]
    pub document_patterns: Vec<String>,
    #[serde(default = "default_min_document_bytes")]
    pub min_document_bytes: u64,
    /// Region rasterized by the screenshot fallback; the report table when unset.
    #[serde(default)]
    pub screenshot_selector: Option<String>,
    #[serde(default = "default_empty_message")]
    pub empty_message: String,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            export_selector: None,
            export_timeout_ms: default_export_timeout_ms(),
            popup_timeout_ms: default_export_timeout_ms(),
            replay_timeout_ms: default_replay_timeout_ms(),
            document_patterns: default_document_patterns(),
            min_document_bytes: default_min_document_bytes(),
            screenshot_selector: None,
            empty_message: default_empty_message(),
        }
    }
}

fn default_export_timeout_ms() -> u64 {
    30_000
}

fn default_replay_timeout_ms() -> u64 {
    60_000
}

fn default_document_patterns() -> Vec<String> {
    [".pdf", "export", "download", "format=pdf"]
        .iter()
        .map(|pattern| pattern.to_string())
        .collect()
}

fn default_min_document_bytes() -> u64 {
    10 * 1024
}

fn default_empty_message() -> String {
    "No records found for the selected filters.".to_string()
}

/// A filter shown in the rendered summary, read back at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryField {
    pub label: String,
    /// The list or input that carries the value (the backing list for overlays).
    pub handle: ControlHandle,
}

/// Shared state of one acquisition cycle.
pub struct AcquisitionContext<'a> {
    pub page: &'a dyn ReportPage,
    pub settings: &'a AcquisitionSettings,
    pub probe: &'a ReportProbe,
    pub title: String,
    pub period: String,
    pub readiness: Readiness,
    pub summary: Vec<SummaryField>,
    /// What the native export did, once triggered.
    pub export: Option<ExportOutcome>,
    /// First exchange index recorded by this run; older traffic belongs to
    /// earlier runs on the same session.
    pub exchange_floor: usize,
    pub http: reqwest::Client,
}

impl<'a> AcquisitionContext<'a> {
    pub fn new(
        page: &'a dyn ReportPage,
        settings: &'a AcquisitionSettings,
        probe: &'a ReportProbe,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.replay_timeout_ms))
            .build()?;
        Ok(Self {
            page,
            settings,
            probe,
            title: String::new(),
            period: String::new(),
            readiness: Readiness::Data,
            summary: Vec::new(),
            export: None,
            exchange_floor: 0,
            http,
        })
    }
}

/// What a strategy left in its staging file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Produced {
    File { has_content: bool },
    Nothing(String),
}

#[async_trait]
pub trait AcquisitionStep: Send + Sync {
    fn strategy(&self) -> AcquisitionStrategy;

    /// Try to write a document to `staging`.
    async fn produce(&self, ctx: &mut AcquisitionContext<'_>, staging: &Path) -> Result<Produced>;
}

pub struct AcquisitionCascade {
    steps: Vec<Box<dyn AcquisitionStep>>,
}

impl Default for AcquisitionCascade {
    fn default() -> Self {
        Self::standard()
    }
}

impl AcquisitionCascade {
    /// Every strategy in [`AcquisitionStrategy::ORDER`].
    pub fn standard() -> Self {
        Self::with_steps(vec![
            Box::new(DirectDownload),
            Box::new(PopupWindow),
            Box::new(NetworkReplay),
            Box::new(DomRender),
            Box::new(ScreenshotRender),
        ])
    }

    pub fn with_steps(steps: Vec<Box<dyn AcquisitionStep>>) -> Self {
        Self { steps }
    }

    pub async fn acquire(
        &self,
        ctx: &mut AcquisitionContext<'_>,
        save_path: &Path,
    ) -> std::result::Result<AcquisitionOutcome, ExtractionError> {
        if let Some(parent) = save_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let min_bytes = ctx.settings.min_document_bytes;
        let mut attempts = Vec::new();

        for step in &self.steps {
            let strategy = step.strategy();
            let staging = staging_path(save_path, strategy);
            let _ = tokio::fs::remove_file(&staging).await;

            let (has_content, note) = match step.produce(ctx, &staging).await {
                Ok(Produced::File { has_content }) => (has_content, None),
                Ok(Produced::Nothing(reason)) => (false, Some(reason)),
                Err(err) => {
                    warn!(strategy = %strategy, error = %err, "Acquisition strategy failed");
                    (false, Some(err.to_string()))
                }
            };
            let byte_size = tokio::fs::metadata(&staging)
                .await
                .map(|meta| meta.len())
                .unwrap_or(0);
            let valid = strategy.accepts(byte_size, has_content, min_bytes);
            debug!(strategy = %strategy, bytes = byte_size, valid, ?note, "Acquisition attempt");
            attempts.push(AcquisitionAttempt {
                strategy,
                byte_size,
                valid,
                note,
            });

            if valid {
                tokio::fs::rename(&staging, save_path).await?;
                info!(
                    strategy = %strategy,
                    bytes = byte_size,
                    path = %save_path.display(),
                    "Document acquired"
                );
                return Ok(AcquisitionOutcome {
                    ok: true,
                    size: byte_size,
                    strategy: Some(strategy),
                    path: Some(save_path.to_path_buf()),
                    attempts,
                });
            }
            let _ = tokio::fs::remove_file(&staging).await;
        }

        Err(ExtractionError::AcquisitionExhausted { attempts })
    }
}

fn staging_path(save_path: &Path, strategy: AcquisitionStrategy) -> PathBuf {
    let mut name = save_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.part", strategy.as_str()));
    save_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixturePage;

    struct Stub {
        strategy: AcquisitionStrategy,
        bytes: usize,
        has_content: bool,
    }

    #[async_trait]
    impl AcquisitionStep for Stub {
        fn strategy(&self) -> AcquisitionStrategy {
            self.strategy
        }

        async fn produce(&self, _ctx: &mut AcquisitionContext<'_>, staging: &Path) -> Result<Produced> {
            tokio::fs::write(staging, vec![b'x'; self.bytes]).await?;
            Ok(Produced::File {
                has_content: self.has_content,
            })
        }
    }

    struct Failing(AcquisitionStrategy);

    #[async_trait]
    impl AcquisitionStep for Failing {
        fn strategy(&self) -> AcquisitionStrategy {
            self.0
        }

        async fn produce(&self, _ctx: &mut AcquisitionContext<'_>, _staging: &Path) -> Result<Produced> {
            anyhow::bail!("export control missing")
        }
    }

    fn stub(strategy: AcquisitionStrategy, bytes: usize) -> Box<dyn AcquisitionStep> {
        Box::new(Stub {
            strategy,
            bytes,
            has_content: true,
        })
    }

    fn probe() -> ReportProbe {
        ReportProbe {
            table_selector: "#gvReport".to_string(),
            empty_markers: Vec::new(),
            period_selector: None,
            region_selector: None,
        }
    }

    #[tokio::test]
    async fn undersized_download_falls_through_to_next_strategy() {
        let temp = tempfile::tempdir().unwrap();
        let save = temp.path().join("out").join("Report 2026-10-16.pdf");
        let page = FixturePage::new();
        let settings = AcquisitionSettings::default();
        let probe = probe();
        let mut ctx = AcquisitionContext::new(&page, &settings, &probe).unwrap();

        let cascade = AcquisitionCascade::with_steps(vec![
            stub(AcquisitionStrategy::DirectDownload, 2 * 1024),
            stub(AcquisitionStrategy::PopupWindow, 60 * 1024),
            stub(AcquisitionStrategy::NetworkReplay, 90 * 1024),
        ]);
        let outcome = cascade.acquire(&mut ctx, &save).await.unwrap();

        assert!(outcome.ok);
        assert_eq!(outcome.strategy, Some(AcquisitionStrategy::PopupWindow));
        assert_eq!(outcome.size, 60 * 1024);
        assert_eq!(outcome.attempts.len(), 2);
        assert!(!outcome.attempts[0].valid);
        assert_eq!(std::fs::metadata(&save).unwrap().len(), 60 * 1024);
        // Staging files never linger.
        assert_eq!(std::fs::read_dir(save.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn accepted_output_meets_threshold_or_is_a_screenshot() {
        let temp = tempfile::tempdir().unwrap();
        let page = FixturePage::new();
        let settings = AcquisitionSettings::default();
        let probe = probe();
        let threshold = settings.min_document_bytes as usize;

        for sizes in [[0, 100, 9_000, 12_000, 500], [1, 2, 3, 4, 5], [20_000, 0, 0, 0, 0]] {
            let steps = AcquisitionStrategy::ORDER
                .iter()
                .zip(sizes)
                .map(|(strategy, bytes)| stub(*strategy, bytes))
                .collect();
            let save = temp.path().join(format!("{}.pdf", sizes[0]));
            let mut ctx = AcquisitionContext::new(&page, &settings, &probe).unwrap();

            let outcome = AcquisitionCascade::with_steps(steps)
                .acquire(&mut ctx, &save)
                .await
                .unwrap();
            assert!(
                outcome.size as usize >= threshold
                    || outcome.strategy == Some(AcquisitionStrategy::ScreenshotRender)
            );
        }
    }

    #[tokio::test]
    async fn errors_are_recorded_and_skipped() {
        let temp = tempfile::tempdir().unwrap();
        let save = temp.path().join("doc.pdf");
        let page = FixturePage::new();
        let settings = AcquisitionSettings::default();
        let probe = probe();
        let mut ctx = AcquisitionContext::new(&page, &settings, &probe).unwrap();

        let cascade = AcquisitionCascade::with_steps(vec![
            Box::new(Failing(AcquisitionStrategy::DirectDownload)),
            stub(AcquisitionStrategy::DomRender, 15_000),
        ]);
        let outcome = cascade.acquire(&mut ctx, &save).await.unwrap();
        assert_eq!(
            outcome.attempts[0].note.as_deref(),
            Some("export control missing")
        );
        assert_eq!(outcome.strategy, Some(AcquisitionStrategy::DomRender));
    }

    #[tokio::test]
    async fn exhaustion_lists_every_attempt() {
        let temp = tempfile::tempdir().unwrap();
        let save = temp.path().join("doc.pdf");
        let page = FixturePage::new();
        let settings = AcquisitionSettings::default();
        let probe = probe();
        let mut ctx = AcquisitionContext::new(&page, &settings, &probe).unwrap();

        let cascade = AcquisitionCascade::with_steps(vec![
            stub(AcquisitionStrategy::DirectDownload, 10),
            Box::new(Stub {
                strategy: AcquisitionStrategy::ScreenshotRender,
                bytes: 0,
                has_content: false,
            }),
        ]);
        let err = cascade.acquire(&mut ctx, &save).await.unwrap_err();
        match err {
            ExtractionError::AcquisitionExhausted { attempts } => assert_eq!(attempts.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!save.exists());
    }

    #[test]
    fn staging_path_keeps_directory() {
        let staging = staging_path(
            Path::new("/tmp/out/Report 2026-10-16.pdf"),
            AcquisitionStrategy::NetworkReplay,
        );
        assert_eq!(
            staging,
            PathBuf::from("/tmp/out/Report 2026-10-16.pdf.network_replay.part")
        );
    }
}
