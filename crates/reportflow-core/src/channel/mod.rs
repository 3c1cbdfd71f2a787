//! Delivery Sink
//!
//! Ships finished documents to a notification channel. Delivery is
//! best-effort: a failed upload is reported per file and never invalidates
//! the document already on disk.

mod telegram;

pub use telegram::{TelegramConfig, TelegramSink};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of delivering one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryResult {
    pub path: PathBuf,
    pub delivered: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait DeliverySink: Send + Sync {
    fn name(&self) -> &str;

    async fn send_document(&self, path: &Path) -> anyhow::Result<()>;

    /// Deliver every file, recording each outcome.
    async fn deliver(&self, paths: &[PathBuf]) -> Vec<DeliveryResult> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            match self.send_document(path).await {
                Ok(()) => {
                    info!(sink = self.name(), path = %path.display(), "Document delivered");
                    results.push(DeliveryResult {
                        path: path.clone(),
                        delivered: true,
                        error: None,
                    });
                }
                Err(err) => {
                    warn!(sink = self.name(), path = %path.display(), error = %err, "Delivery failed");
                    results.push(DeliveryResult {
                        path: path.clone(),
                        delivered: false,
                        error: Some(err.to_string()),
                    });
                }
            }
        }
        results
    }
}
