//! Telegram delivery via the Bot API `sendDocument` method.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::DeliverySink;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
/// Uploads can be several megabytes.
const UPLOAD_TIMEOUT_SECS: u64 = 120;

/// Telegram sink configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    TELEGRAM_API_BASE.to_string()
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: default_api_base(),
        }
    }

    /// Both values present and non-blank, or nothing to deliver to.
    pub fn from_parts(bot_token: Option<String>, chat_id: Option<String>) -> Option<Self> {
        let bot_token = bot_token.filter(|value| !value.trim().is_empty())?;
        let chat_id = chat_id.filter(|value| !value.trim().is_empty())?;
        Some(Self::new(bot_token, chat_id))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

pub struct TelegramSink {
    config: TelegramConfig,
    client: Client,
}

impl TelegramSink {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }
}

#[async_trait]
impl DeliverySink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_document(&self, path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.pdf".to_string());
        debug!(file = %file_name, bytes = bytes.len(), "Uploading document to Telegram");

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = Form::new()
            .text("chat_id", self.config.chat_id.clone())
            .part("document", part);

        let response = self
            .client
            .post(self.api_url("sendDocument"))
            .multipart(form)
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .send()
            .await?;

        let status = response.status();
        let body: TelegramResponse = response
            .json()
            .await
            .map_err(|err| anyhow!("Telegram returned HTTP {} with unreadable body: {}", status, err))?;
        if status.is_success() && body.ok {
            Ok(())
        } else {
            Err(anyhow!(
                "Telegram API error (HTTP {}): {}",
                status,
                body.description.unwrap_or_default()
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}
