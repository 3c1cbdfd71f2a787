use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{
    BrowserCookie, ControlHandle, ControlInfo, ExportOutcome, OverlayItem, RecordedExchange,
    ReportProbe, ReportSnapshot,
};

/// A single live page driven by the extraction engine.
///
/// Every interaction with the host page goes through this trait, so the
/// engine can run against [`crate::PlaywrightPage`] in production and a
/// synthetic fixture in tests. Calls may be issued concurrently (the
/// dependent-field wait races two of them), but a page is never shared
/// between runs.
#[async_trait]
pub trait ReportPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    /// Wait for the network to go quiet after a navigation or submit.
    async fn wait_for_load(&self) -> Result<()>;

    async fn exists(&self, selector: &str) -> Result<bool>;

    async fn click(&self, selector: &str) -> Result<()>;

    async fn fill_selector(&self, selector: &str, text: &str) -> Result<()>;

    /// Every form control currently in the document.
    async fn controls(&self) -> Result<Vec<ControlInfo>>;

    async fn read_control(&self, handle: &ControlHandle) -> Result<ControlInfo>;

    /// Set the selection of a native control and raise input/change events.
    ///
    /// `values` are option values; `all` selects every enabled option.
    async fn select_options(
        &self,
        handle: &ControlHandle,
        values: &[String],
        all: bool,
    ) -> Result<ControlInfo>;

    async fn fill(&self, handle: &ControlHandle, text: &str) -> Result<()>;

    async fn open_overlay(&self, handle: &ControlHandle) -> Result<()>;

    /// Items of the currently open overlay menu.
    async fn overlay_items(&self) -> Result<Vec<OverlayItem>>;

    async fn click_overlay_item(&self, item: &str) -> Result<()>;

    /// Click a "select all" affordance in the open menu, if the widget has one.
    async fn click_select_all(&self) -> Result<bool>;

    /// Escape plus an off-menu click; some menus never close on their own.
    async fn close_overlay(&self) -> Result<()>;

    /// Resolve `true` once a response whose URL contains `url_fragment`
    /// arrives, `false` at timeout.
    async fn wait_for_response(&self, url_fragment: &str, timeout: Duration) -> Result<bool>;

    async fn report_snapshot(&self, probe: &ReportProbe) -> Result<ReportSnapshot>;

    /// Click the native export control and report what happened.
    async fn trigger_export(&self, selector: &str, timeout: Duration) -> Result<ExportOutcome>;

    /// Locate a document link inside a popup window and save it to `dest`.
    async fn popup_document(
        &self,
        popup: &str,
        patterns: &[String],
        dest: &Path,
        timeout: Duration,
    ) -> Result<Option<PathBuf>>;

    async fn recorded_exchanges(&self) -> Result<Vec<RecordedExchange>>;

    async fn exchange_body(&self, index: usize) -> Result<Option<Vec<u8>>>;

    async fn cookies(&self) -> Result<Vec<BrowserCookie>>;

    /// Print `html` to a PDF at `dest` using the browser's print pipeline.
    async fn render_pdf(&self, html: &str, dest: &Path) -> Result<()>;

    /// PNG of the element matched by `selector`, or the full page.
    async fn screenshot(&self, selector: Option<&str>, dest: &Path) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
