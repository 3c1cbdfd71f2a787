//! Synthetic report page for exercising the engine without a browser.
//!
//! [`FixturePage`] models both widget families, dependent option lists that
//! fill in after a delay, a date parser that only accepts one encoding, and
//! the export/network behaviors the acquisition cascade has to cope with.

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use reportflow_browser::{
    BrowserCookie, ControlHandle, ControlInfo, ControlKind, ExportOutcome, OptionInfo,
    OverlayItem, RecordedExchange, ReportPage, ReportProbe, ReportSnapshot,
};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Downstream options that appear once an upstream choice is made.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub upstream: ControlHandle,
    pub upstream_text: String,
    pub downstream: ControlHandle,
    pub options: Vec<String>,
    pub delay: Duration,
    /// URL of the request the page fires to fetch the options.
    pub response_url: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ReportOutcome {
    Rows {
        rows: usize,
        table_html: String,
        period_text: Option<String>,
    },
    Empty(String),
}

/// How the page reacts to the submit button.
#[derive(Debug, Clone)]
pub struct ReportFixture {
    pub submit_selector: String,
    /// Input whose value decides whether the page parses the dates.
    pub from_input: ControlHandle,
    pub accepted_from: String,
    pub outcome: ReportOutcome,
    /// Accepted submissions that still read as not ready.
    pub slow_submissions: usize,
    pub response_url: String,
}

#[derive(Debug, Clone, Default)]
pub enum ExportFixture {
    #[default]
    Nothing,
    Download(Vec<u8>),
    Popup { document: Option<Vec<u8>> },
}

#[derive(Default)]
struct FixtureState {
    controls: Vec<ControlInfo>,
    open_overlay: Option<ControlHandle>,
    select_all_affordance: bool,
    dependencies: Vec<Dependency>,
    pending: Vec<(Instant, ControlHandle, Vec<String>)>,
    responses: Vec<(Instant, String)>,
    clear_once: Vec<ControlHandle>,
    report: Option<ReportFixture>,
    accepted_submissions: usize,
    submissions: usize,
    snapshot: ReportSnapshot,
    export: ExportFixture,
    exchanges: Vec<(RecordedExchange, Option<Vec<u8>>)>,
    export_traffic: VecDeque<(RecordedExchange, Option<Vec<u8>>)>,
    download_url: Option<String>,
    failing_clicks: Vec<String>,
    cookies: Vec<BrowserCookie>,
    present: HashSet<String>,
    actions: Vec<String>,
    rendered_html: Vec<String>,
    scratch: Option<PathBuf>,
}

impl FixtureState {
    fn settle(&mut self) {
        let now = Instant::now();
        let (ready, waiting): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|(ready_at, _, _)| *ready_at <= now);
        self.pending = waiting;
        for (_, handle, options) in ready {
            if let Ok(control) = self.find_mut(&handle) {
                control.options = options.into_iter().map(OptionInfo::new).collect();
            }
        }
    }

    fn find_mut(&mut self, handle: &ControlHandle) -> Result<&mut ControlInfo> {
        self.controls
            .iter_mut()
            .find(|control| &control.handle == handle)
            .ok_or_else(|| anyhow!("No control with handle {}", handle))
    }

    fn after_selection(&mut self, handle: &ControlHandle) {
        let Some(selected) = self
            .controls
            .iter()
            .find(|control| &control.handle == handle)
            .map(ControlInfo::selected_texts)
        else {
            return;
        };

        if let Some(trigger) = self
            .controls
            .iter()
            .find(|control| &control.handle == handle)
            .and_then(|control| control.overlay_trigger.clone())
            && let Ok(trigger) = self.find_mut(&trigger)
        {
            trigger.display_text = Some(selected.join(", "));
        }

        let now = Instant::now();
        let fired: Vec<Dependency> = self
            .dependencies
            .iter()
            .filter(|dep| &dep.upstream == handle && selected.contains(&dep.upstream_text))
            .cloned()
            .collect();
        for dep in fired {
            if let Ok(downstream) = self.find_mut(&dep.downstream) {
                downstream.options.clear();
            }
            self.pending
                .push((now + dep.delay, dep.downstream.clone(), dep.options.clone()));
            if let Some(url) = dep.response_url {
                self.responses.push((now + dep.delay / 2, url));
            }
        }
    }

    fn submit(&mut self) {
        self.submissions += 1;
        let Some(report) = self.report.clone() else {
            return;
        };
        self.responses
            .push((Instant::now() + Duration::from_millis(30), report.response_url.clone()));

        let from = self
            .controls
            .iter()
            .find(|control| control.handle == report.from_input)
            .and_then(|control| control.value.clone());
        if from.as_deref() != Some(report.accepted_from.as_str()) {
            self.snapshot = ReportSnapshot::default();
            return;
        }

        self.accepted_submissions += 1;
        if self.accepted_submissions <= report.slow_submissions {
            self.snapshot = ReportSnapshot::default();
            return;
        }
        self.snapshot = match report.outcome {
            ReportOutcome::Rows {
                rows,
                table_html,
                period_text,
            } => ReportSnapshot {
                data_rows: rows,
                empty_marker: None,
                period_text,
                table_html: Some(table_html),
            },
            ReportOutcome::Empty(marker) => ReportSnapshot {
                empty_marker: Some(marker),
                ..Default::default()
            },
        };
    }

    fn scratch_dir(&mut self) -> Result<PathBuf> {
        if let Some(dir) = &self.scratch {
            return Ok(dir.clone());
        }
        let dir = std::env::temp_dir().join(format!(
            "reportflow-fixture-{}-{}",
            std::process::id(),
            SCRATCH_COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::create_dir_all(&dir)?;
        self.scratch = Some(dir.clone());
        Ok(dir)
    }
}

pub struct FixturePage {
    state: Mutex<FixtureState>,
}

impl Default for FixturePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FixturePage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FixtureState::default()),
        }
    }

    fn with_state(self, apply: impl FnOnce(&mut FixtureState)) -> Self {
        apply(&mut self.lock());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FixtureState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_control(self, control: ControlInfo) -> Self {
        self.with_state(|state| state.controls.push(control))
    }

    /// Visible native list labelled `label`.
    pub fn with_native(self, handle: &str, label: &str, options: &[&str]) -> Self {
        let mut control = ControlInfo::new(handle, ControlKind::Select);
        control.label = Some(label.to_string());
        control.options = options.iter().map(|text| OptionInfo::new(*text)).collect();
        self.with_control(control)
    }

    /// Hidden native list fronted by a visible overlay trigger.
    pub fn with_overlay(
        self,
        backing: &str,
        trigger: &str,
        label: &str,
        options: &[&str],
        multiple: bool,
    ) -> Self {
        let mut native = ControlInfo::new(backing, ControlKind::Select);
        native.label = Some(label.to_string());
        native.visible = false;
        native.multiple = multiple;
        native.options = options.iter().map(|text| OptionInfo::new(*text)).collect();
        native.overlay_trigger = Some(ControlHandle::new(trigger));

        let mut overlay = ControlInfo::new(trigger, ControlKind::OverlayTrigger);
        overlay.group_text = Some(label.to_string());
        overlay.backing = Some(ControlHandle::new(backing));
        overlay.display_text = Some(String::new());

        self.with_control(native).with_control(overlay)
    }

    pub fn with_input(self, handle: &str, label: &str) -> Self {
        let mut control = ControlInfo::new(handle, ControlKind::Input);
        control.label = Some(label.to_string());
        self.with_control(control)
    }

    pub fn with_select_all_affordance(self) -> Self {
        self.with_state(|state| state.select_all_affordance = true)
    }

    pub fn with_dependency(self, dependency: Dependency) -> Self {
        self.with_state(|state| state.dependencies.push(dependency))
    }

    pub fn with_report(self, report: ReportFixture) -> Self {
        self.with_state(|state| state.report = Some(report))
    }

    pub fn with_export(self, export: ExportFixture) -> Self {
        self.with_state(|state| state.export = export)
    }

    pub fn with_exchange(self, exchange: RecordedExchange, body: Option<Vec<u8>>) -> Self {
        self.with_state(|state| state.exchanges.push((exchange, body)))
    }

    /// Response the page records on the next export click, indexed at that point.
    pub fn with_export_traffic(self, exchange: RecordedExchange, body: Option<Vec<u8>>) -> Self {
        self.with_state(|state| state.export_traffic.push_back((exchange, body)))
    }

    /// Request URL reported for downloads.
    pub fn with_download_url(self, url: &str) -> Self {
        self.with_state(|state| state.download_url = Some(url.to_string()))
    }

    pub fn with_cookie(self, name: &str, value: &str) -> Self {
        self.with_state(|state| {
            state.cookies.push(BrowserCookie {
                name: name.to_string(),
                value: value.to_string(),
                domain: "localhost".to_string(),
                path: "/".to_string(),
            })
        })
    }

    /// Make `selector` report as present for [`ReportPage::exists`].
    pub fn with_selector(self, selector: &str) -> Self {
        self.with_state(|state| {
            state.present.insert(selector.to_string());
        })
    }

    /// The page wipes this control's selection once, shortly after it is set.
    pub fn clear_once(self, handle: &str) -> Self {
        self.with_state(|state| state.clear_once.push(ControlHandle::new(handle)))
    }

    /// The first click on `selector` fails as if the postback crashed.
    pub fn fail_click_once(self, selector: &str) -> Self {
        self.with_state(|state| state.failing_clicks.push(selector.to_string()))
    }

    pub fn actions(&self) -> Vec<String> {
        self.lock().actions.clone()
    }

    pub fn submissions(&self) -> usize {
        self.lock().submissions
    }

    pub fn rendered_html(&self) -> Vec<String> {
        self.lock().rendered_html.clone()
    }

    pub fn control(&self, handle: &str) -> Option<ControlInfo> {
        self.lock()
            .controls
            .iter()
            .find(|control| control.handle.as_str() == handle)
            .cloned()
    }
}

#[async_trait]
impl ReportPage for FixturePage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.lock().actions.push(format!("goto {}", url));
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<()> {
        Ok(())
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        Ok(self.lock().present.contains(selector))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let mut state = self.lock();
        state.actions.push(format!("click {}", selector));
        if let Some(position) = state.failing_clicks.iter().position(|failing| failing == selector) {
            state.failing_clicks.remove(position);
            bail!("Postback failed after clicking {}", selector);
        }
        let is_submit = state
            .report
            .as_ref()
            .is_some_and(|report| report.submit_selector == selector);
        if is_submit {
            state.submit();
        }
        Ok(())
    }

    async fn fill_selector(&self, selector: &str, text: &str) -> Result<()> {
        self.lock()
            .actions
            .push(format!("fill {} {}", selector, text));
        Ok(())
    }

    async fn controls(&self) -> Result<Vec<ControlInfo>> {
        let mut state = self.lock();
        state.settle();

        let cleared: Vec<ControlHandle> = state
            .clear_once
            .iter()
            .filter(|handle| {
                state
                    .controls
                    .iter()
                    .any(|control| &control.handle == *handle && !control.selected_texts().is_empty())
            })
            .cloned()
            .collect();
        for handle in cleared {
            state.clear_once.retain(|pending| pending != &handle);
            if let Ok(control) = state.find_mut(&handle) {
                for option in &mut control.options {
                    option.selected = false;
                }
            }
        }

        Ok(state.controls.clone())
    }

    async fn read_control(&self, handle: &ControlHandle) -> Result<ControlInfo> {
        let mut state = self.lock();
        state.settle();
        Ok(state.find_mut(handle)?.clone())
    }

    async fn select_options(
        &self,
        handle: &ControlHandle,
        values: &[String],
        all: bool,
    ) -> Result<ControlInfo> {
        let mut state = self.lock();
        state.settle();
        let control = state.find_mut(handle)?;
        if control.kind != ControlKind::Select {
            bail!("Control {} is not a list", handle);
        }
        let multiple = control.multiple;
        let mut picked = false;
        for option in &mut control.options {
            let wanted = if all {
                !option.disabled && (multiple || !picked)
            } else {
                values.contains(&option.value) && (multiple || !picked)
            };
            option.selected = wanted;
            picked |= wanted;
        }
        let updated = control.clone();
        state.after_selection(handle);
        Ok(updated)
    }

    async fn fill(&self, handle: &ControlHandle, text: &str) -> Result<()> {
        let mut state = self.lock();
        state.find_mut(handle)?.value = Some(text.to_string());
        state.actions.push(format!("fill {} {}", handle, text));
        Ok(())
    }

    async fn open_overlay(&self, handle: &ControlHandle) -> Result<()> {
        let mut state = self.lock();
        if state.find_mut(handle)?.kind != ControlKind::OverlayTrigger {
            bail!("Control {} is not an overlay trigger", handle);
        }
        state.open_overlay = Some(handle.clone());
        Ok(())
    }

    async fn overlay_items(&self) -> Result<Vec<OverlayItem>> {
        let mut state = self.lock();
        state.settle();
        let Some(trigger) = state.open_overlay.clone() else {
            return Ok(Vec::new());
        };
        let Some(backing) = state.find_mut(&trigger)?.backing.clone() else {
            return Ok(Vec::new());
        };
        let native = state.find_mut(&backing)?;
        Ok(native
            .options
            .iter()
            .enumerate()
            .map(|(index, option)| OverlayItem {
                item: format!("{}:{}", backing, index),
                text: option.text.clone(),
                disabled: option.disabled,
                selected: option.selected,
                visible: true,
            })
            .collect())
    }

    async fn click_overlay_item(&self, item: &str) -> Result<()> {
        let mut state = self.lock();
        let (backing, index) = item
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("Malformed item id {}", item))?;
        let index: usize = index.parse()?;
        let backing = ControlHandle::new(backing);
        let native = state.find_mut(&backing)?;
        let multiple = native.multiple;
        let option = native
            .options
            .get(index)
            .ok_or_else(|| anyhow!("No item {}", item))?;
        if option.disabled {
            bail!("Item {} is disabled", item);
        }
        if multiple {
            let option = &mut native.options[index];
            option.selected = !option.selected;
        } else {
            for (position, option) in native.options.iter_mut().enumerate() {
                option.selected = position == index;
            }
            state.open_overlay = None;
        }
        state.after_selection(&backing);
        Ok(())
    }

    async fn click_select_all(&self) -> Result<bool> {
        let mut state = self.lock();
        if !state.select_all_affordance {
            return Ok(false);
        }
        let Some(trigger) = state.open_overlay.clone() else {
            return Ok(false);
        };
        let Some(backing) = state.find_mut(&trigger)?.backing.clone() else {
            return Ok(false);
        };
        for option in &mut state.find_mut(&backing)?.options {
            option.selected = !option.disabled;
        }
        state.after_selection(&backing);
        Ok(true)
    }

    async fn close_overlay(&self) -> Result<()> {
        self.lock().open_overlay = None;
        Ok(())
    }

    async fn wait_for_response(&self, url_fragment: &str, timeout: Duration) -> Result<bool> {
        let start = Instant::now();
        loop {
            let now = Instant::now();
            let seen = self
                .lock()
                .responses
                .iter()
                .any(|(at, url)| *at >= start && *at <= now && url.contains(url_fragment));
            if seen {
                return Ok(true);
            }
            if now.duration_since(start) >= timeout {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn report_snapshot(&self, _probe: &ReportProbe) -> Result<ReportSnapshot> {
        Ok(self.lock().snapshot.clone())
    }

    async fn trigger_export(&self, selector: &str, _timeout: Duration) -> Result<ExportOutcome> {
        let mut state = self.lock();
        state.actions.push(format!("export {}", selector));
        if let Some((mut exchange, body)) = state.export_traffic.pop_front() {
            exchange.index = state.exchanges.len();
            state.exchanges.push((exchange, body));
        }
        match state.export.clone() {
            ExportFixture::Nothing => Ok(ExportOutcome::Nothing),
            ExportFixture::Download(bytes) => {
                let path = state.scratch_dir()?.join("export.pdf");
                std::fs::write(&path, bytes)?;
                Ok(ExportOutcome::Download {
                    path,
                    suggested_name: Some("export.pdf".to_string()),
                    url: state.download_url.clone(),
                })
            }
            ExportFixture::Popup { .. } => Ok(ExportOutcome::Popup {
                popup: "popup-1".to_string(),
                url: Some("about:blank".to_string()),
            }),
        }
    }

    async fn popup_document(
        &self,
        _popup: &str,
        _patterns: &[String],
        dest: &Path,
        _timeout: Duration,
    ) -> Result<Option<PathBuf>> {
        let document = match &self.lock().export {
            ExportFixture::Popup { document } => document.clone(),
            _ => None,
        };
        match document {
            Some(bytes) => {
                std::fs::write(dest, bytes)?;
                Ok(Some(dest.to_path_buf()))
            }
            None => Ok(None),
        }
    }

    async fn recorded_exchanges(&self) -> Result<Vec<RecordedExchange>> {
        Ok(self
            .lock()
            .exchanges
            .iter()
            .map(|(exchange, _)| exchange.clone())
            .collect())
    }

    async fn exchange_body(&self, index: usize) -> Result<Option<Vec<u8>>> {
        Ok(self
            .lock()
            .exchanges
            .iter()
            .find(|(exchange, _)| exchange.index == index)
            .and_then(|(_, body)| body.clone()))
    }

    async fn cookies(&self) -> Result<Vec<BrowserCookie>> {
        Ok(self.lock().cookies.clone())
    }

    async fn render_pdf(&self, html: &str, dest: &Path) -> Result<()> {
        self.lock().rendered_html.push(html.to_string());
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend_from_slice(html.as_bytes());
        bytes.extend_from_slice(b"\n%%EOF\n");
        std::fs::write(dest, bytes)?;
        Ok(())
    }

    async fn screenshot(&self, _selector: Option<&str>, dest: &Path) -> Result<()> {
        let image = image::RgbImage::from_pixel(64, 32, image::Rgb([250, 250, 250]));
        image.save_with_format(dest, image::ImageFormat::Png)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
