//! JSON-lines protocol between [`crate::PlaywrightPage`] and the Node driver.
//!
//! Each command is written to the driver's stdin as one JSON object carrying
//! a numeric `id`. Replies come back on stdout as single lines prefixed with
//! [`DRIVER_MARKER`]; anything else the driver prints is diagnostic output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DRIVER_MARKER: &str = "__REPORTFLOW_DRIVER__=";

/// Reply id the driver uses to announce it is ready (or failed to start).
pub const READY_ID: u64 = 0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverCommand {
    Goto {
        url: String,
        #[serde(default)]
        wait_until: Option<String>,
    },
    WaitForLoad {
        timeout_ms: u64,
    },
    Exists {
        selector: String,
    },
    Click {
        selector: String,
        timeout_ms: u64,
    },
    FillSelector {
        selector: String,
        text: String,
        timeout_ms: u64,
    },
    Controls,
    ReadControl {
        handle: String,
    },
    SelectOptions {
        handle: String,
        values: Vec<String>,
        all: bool,
    },
    Fill {
        handle: String,
        text: String,
    },
    OpenOverlay {
        handle: String,
    },
    OverlayItems,
    ClickOverlayItem {
        item: String,
    },
    ClickSelectAll,
    CloseOverlay,
    WaitForResponse {
        url_fragment: String,
        timeout_ms: u64,
    },
    ReportSnapshot {
        table_selector: String,
        empty_markers: Vec<String>,
        #[serde(default)]
        period_selector: Option<String>,
        #[serde(default)]
        region_selector: Option<String>,
    },
    TriggerExport {
        selector: String,
        timeout_ms: u64,
    },
    PopupDocument {
        popup: String,
        patterns: Vec<String>,
        dest: String,
        timeout_ms: u64,
    },
    Exchanges,
    ExchangeBody {
        index: usize,
    },
    Cookies,
    RenderPdf {
        html: String,
        dest: String,
    },
    Screenshot {
        #[serde(default)]
        selector: Option<String>,
        dest: String,
    },
    Close,
}

impl DriverCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Goto { .. } => "goto",
            Self::WaitForLoad { .. } => "wait_for_load",
            Self::Exists { .. } => "exists",
            Self::Click { .. } => "click",
            Self::FillSelector { .. } => "fill_selector",
            Self::Controls => "controls",
            Self::ReadControl { .. } => "read_control",
            Self::SelectOptions { .. } => "select_options",
            Self::Fill { .. } => "fill",
            Self::OpenOverlay { .. } => "open_overlay",
            Self::OverlayItems => "overlay_items",
            Self::ClickOverlayItem { .. } => "click_overlay_item",
            Self::ClickSelectAll => "click_select_all",
            Self::CloseOverlay => "close_overlay",
            Self::WaitForResponse { .. } => "wait_for_response",
            Self::ReportSnapshot { .. } => "report_snapshot",
            Self::TriggerExport { .. } => "trigger_export",
            Self::PopupDocument { .. } => "popup_document",
            Self::Exchanges => "exchanges",
            Self::ExchangeBody { .. } => "exchange_body",
            Self::Cookies => "cookies",
            Self::RenderPdf { .. } => "render_pdf",
            Self::Screenshot { .. } => "screenshot",
            Self::Close => "close",
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CommandEnvelope<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub command: &'a DriverCommand,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DriverReply {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl DriverReply {
    pub fn failed_message(&self) -> String {
        self.error
            .clone()
            .filter(|error| !error.trim().is_empty())
            .unwrap_or_else(|| format!("Driver command {} failed", self.id))
    }
}

/// Parse a stdout line from the driver. Returns `None` for diagnostic lines.
pub fn parse_reply_line(line: &str) -> Option<DriverReply> {
    let rest = line.strip_prefix(DRIVER_MARKER)?;
    serde_json::from_str::<DriverReply>(rest.trim()).ok()
}
