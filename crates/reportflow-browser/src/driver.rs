use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::page::ReportPage;
use crate::probe::{ensure_probe_ready, probe_runtime};
use crate::protocol::{
    CommandEnvelope, DRIVER_MARKER, DriverCommand, DriverReply, READY_ID, parse_reply_line,
};
use crate::types::{
    BrowserCookie, ControlHandle, ControlInfo, ExportOutcome, OverlayItem, RecordedExchange,
    ReportProbe, ReportSnapshot,
};

const DRIVER_BODY: &str = include_str!("../assets/driver.mjs");
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LAUNCH_TIMEOUT_SECS: u64 = 90;
const DEFAULT_BODY_LIMIT: u64 = 32 * 1024 * 1024;
/// Slack added on top of a command's own timeout before the call is abandoned.
const WAIT_SLACK: Duration = Duration::from_secs(5);

type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<DriverReply>>>>;

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Root directory for downloads and rendered artifacts.
    pub artifacts_dir: PathBuf,
    /// Directory the driver script is written to; Playwright is resolved
    /// from here, so point it at a project with `node_modules/playwright`.
    pub node_workdir: Option<PathBuf>,
    pub call_timeout_secs: u64,
    pub launch_timeout_secs: u64,
    /// Largest response body the driver keeps in memory for replay.
    pub body_limit_bytes: u64,
    /// URL fragments that mark a response as document-like.
    pub document_patterns: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            artifacts_dir: std::env::temp_dir().join("reportflow"),
            node_workdir: None,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            launch_timeout_secs: DEFAULT_LAUNCH_TIMEOUT_SECS,
            body_limit_bytes: DEFAULT_BODY_LIMIT,
            document_patterns: vec![".pdf".to_string(), "export".to_string()],
        }
    }
}

/// A Chromium page kept alive for a whole extraction session.
///
/// The page lives inside a Node.js process running Playwright. Commands are
/// written to its stdin as JSON lines and answered out of order by id, so
/// independent waits can overlap.
pub struct PlaywrightPage {
    session_id: String,
    artifacts_dir: PathBuf,
    call_timeout: Duration,
    child: AsyncMutex<Child>,
    stdin: AsyncMutex<ChildStdin>,
    pending: PendingReplies,
    next_id: AtomicU64,
    readers: Vec<JoinHandle<()>>,
    _script: NamedTempFile,
}

impl PlaywrightPage {
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let probe = probe_runtime(options.node_workdir.as_deref()).await?;
        ensure_probe_ready(&probe)?;

        let session_id = Uuid::new_v4().to_string();
        let artifacts_dir = options.artifacts_dir.join(&session_id);
        std::fs::create_dir_all(&artifacts_dir)?;

        let script_dir = match &options.node_workdir {
            Some(dir) => {
                if !dir.is_dir() {
                    bail!("Invalid node working directory: {}", dir.display());
                }
                dir.clone()
            }
            None => std::env::temp_dir(),
        };
        let mut script = tempfile::Builder::new()
            .prefix(".reportflow-driver-")
            .suffix(".mjs")
            .tempfile_in(&script_dir)?;
        std::io::Write::write_all(
            &mut script,
            build_driver_script(&options, &artifacts_dir)?.as_bytes(),
        )?;

        let mut command = Command::new("node");
        command
            .arg(script.path())
            .current_dir(&script_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().context("Failed to start node driver")?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("Driver stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Driver stdout unavailable"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("Driver stderr unavailable"))?;

        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let (ready_tx, ready_rx) = oneshot::channel();
        pending
            .lock()
            .map_err(|_| anyhow!("Driver reply table poisoned"))?
            .insert(READY_ID, ready_tx);

        let stdout_pending = pending.clone();
        let stdout_reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match parse_reply_line(&line) {
                    Some(reply) => {
                        let sender = stdout_pending
                            .lock()
                            .ok()
                            .and_then(|mut pending| pending.remove(&reply.id));
                        if let Some(sender) = sender {
                            let _ = sender.send(reply);
                        }
                    }
                    None if line.starts_with(DRIVER_MARKER) => {
                        warn!(line = %line, "Unparseable driver reply");
                    }
                    None => debug!(target: "reportflow_browser::driver", "{}", line),
                }
            }
            // Dropping the senders wakes every waiter with an error.
            if let Ok(mut pending) = stdout_pending.lock() {
                pending.clear();
            }
        });

        let stderr_reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "reportflow_browser::driver", stderr = %line);
            }
        });

        let started = Instant::now();
        let ready = match timeout(Duration::from_secs(options.launch_timeout_secs), ready_rx).await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => bail!("Node driver exited before becoming ready"),
            Err(_) => bail!(
                "Node driver did not become ready within {} seconds",
                options.launch_timeout_secs
            ),
        };
        if !ready.ok {
            bail!("Node driver failed to start: {}", ready.failed_message());
        }

        info!(
            session_id = %session_id,
            headless = options.headless,
            startup_ms = started.elapsed().as_millis() as u64,
            "Browser session started"
        );

        Ok(Self {
            session_id,
            artifacts_dir,
            call_timeout: Duration::from_secs(options.call_timeout_secs.max(1)),
            child: AsyncMutex::new(child),
            stdin: AsyncMutex::new(stdin),
            pending,
            next_id: AtomicU64::new(READY_ID + 1),
            readers: vec![stdout_reader, stderr_reader],
            _script: script,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    async fn call(&self, command: DriverCommand, limit: Duration) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| anyhow!("Driver reply table poisoned"))?
            .insert(id, tx);

        let mut line = serde_json::to_string(&CommandEnvelope {
            id,
            command: &command,
        })?;
        line.push('\n');

        {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await?;
        }

        let reply = match timeout(limit, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => bail!("Browser driver exited during '{}'", command.name()),
            Err(_) => {
                if let Ok(mut pending) = self.pending.lock() {
                    pending.remove(&id);
                }
                bail!(
                    "Browser command '{}' timed out after {} ms",
                    command.name(),
                    limit.as_millis()
                )
            }
        };

        if !reply.ok {
            bail!("{} failed: {}", command.name(), reply.failed_message());
        }
        Ok(reply.result)
    }

    async fn call_default(&self, command: DriverCommand) -> Result<Value> {
        self.call(command, self.call_timeout).await
    }

    async fn call_as<T: DeserializeOwned>(&self, command: DriverCommand) -> Result<T> {
        let name = command.name();
        let value = self.call_default(command).await?;
        serde_json::from_value(value).with_context(|| format!("Malformed '{}' reply", name))
    }

    fn timeout_ms(&self) -> u64 {
        self.call_timeout.as_millis() as u64
    }
}

#[async_trait]
impl ReportPage for PlaywrightPage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.call_default(DriverCommand::Goto {
            url: url.to_string(),
            wait_until: None,
        })
        .await?;
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<()> {
        self.call_default(DriverCommand::WaitForLoad {
            timeout_ms: self.timeout_ms(),
        })
        .await?;
        Ok(())
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        self.call_as(DriverCommand::Exists {
            selector: selector.to_string(),
        })
        .await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.call_default(DriverCommand::Click {
            selector: selector.to_string(),
            timeout_ms: self.timeout_ms(),
        })
        .await?;
        Ok(())
    }

    async fn fill_selector(&self, selector: &str, text: &str) -> Result<()> {
        self.call_default(DriverCommand::FillSelector {
            selector: selector.to_string(),
            text: text.to_string(),
            timeout_ms: self.timeout_ms(),
        })
        .await?;
        Ok(())
    }

    async fn controls(&self) -> Result<Vec<ControlInfo>> {
        self.call_as(DriverCommand::Controls).await
    }

    async fn read_control(&self, handle: &ControlHandle) -> Result<ControlInfo> {
        self.call_as(DriverCommand::ReadControl {
            handle: handle.to_string(),
        })
        .await
    }

    async fn select_options(
        &self,
        handle: &ControlHandle,
        values: &[String],
        all: bool,
    ) -> Result<ControlInfo> {
        self.call_as(DriverCommand::SelectOptions {
            handle: handle.to_string(),
            values: values.to_vec(),
            all,
        })
        .await
    }

    async fn fill(&self, handle: &ControlHandle, text: &str) -> Result<()> {
        self.call_default(DriverCommand::Fill {
            handle: handle.to_string(),
            text: text.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn open_overlay(&self, handle: &ControlHandle) -> Result<()> {
        self.call_default(DriverCommand::OpenOverlay {
            handle: handle.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn overlay_items(&self) -> Result<Vec<OverlayItem>> {
        self.call_as(DriverCommand::OverlayItems).await
    }

    async fn click_overlay_item(&self, item: &str) -> Result<()> {
        self.call_default(DriverCommand::ClickOverlayItem {
            item: item.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn click_select_all(&self) -> Result<bool> {
        self.call_as(DriverCommand::ClickSelectAll).await
    }

    async fn close_overlay(&self) -> Result<()> {
        self.call_default(DriverCommand::CloseOverlay).await?;
        Ok(())
    }

    async fn wait_for_response(&self, url_fragment: &str, wait: Duration) -> Result<bool> {
        let value = self
            .call(
                DriverCommand::WaitForResponse {
                    url_fragment: url_fragment.to_string(),
                    timeout_ms: wait.as_millis() as u64,
                },
                wait + WAIT_SLACK,
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn report_snapshot(&self, probe: &ReportProbe) -> Result<ReportSnapshot> {
        self.call_as(DriverCommand::ReportSnapshot {
            table_selector: probe.table_selector.clone(),
            empty_markers: probe.empty_markers.clone(),
            period_selector: probe.period_selector.clone(),
            region_selector: probe.region_selector.clone(),
        })
        .await
    }

    async fn trigger_export(&self, selector: &str, wait: Duration) -> Result<ExportOutcome> {
        let value = self
            .call(
                DriverCommand::TriggerExport {
                    selector: selector.to_string(),
                    timeout_ms: wait.as_millis() as u64,
                },
                wait * 2 + WAIT_SLACK,
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn popup_document(
        &self,
        popup: &str,
        patterns: &[String],
        dest: &Path,
        wait: Duration,
    ) -> Result<Option<PathBuf>> {
        let value = self
            .call(
                DriverCommand::PopupDocument {
                    popup: popup.to_string(),
                    patterns: patterns.to_vec(),
                    dest: dest.display().to_string(),
                    timeout_ms: wait.as_millis() as u64,
                },
                wait * 4 + WAIT_SLACK,
            )
            .await?;
        Ok(value.as_str().map(PathBuf::from))
    }

    async fn recorded_exchanges(&self) -> Result<Vec<RecordedExchange>> {
        self.call_as(DriverCommand::Exchanges).await
    }

    async fn exchange_body(&self, index: usize) -> Result<Option<Vec<u8>>> {
        let value = self
            .call_default(DriverCommand::ExchangeBody { index })
            .await?;
        match value.as_str() {
            Some(encoded) => Ok(Some(
                base64::engine::general_purpose::STANDARD.decode(encoded)?,
            )),
            None => Ok(None),
        }
    }

    async fn cookies(&self) -> Result<Vec<BrowserCookie>> {
        self.call_as(DriverCommand::Cookies).await
    }

    async fn render_pdf(&self, html: &str, dest: &Path) -> Result<()> {
        self.call_default(DriverCommand::RenderPdf {
            html: html.to_string(),
            dest: dest.display().to_string(),
        })
        .await?;
        Ok(())
    }

    async fn screenshot(&self, selector: Option<&str>, dest: &Path) -> Result<()> {
        self.call_default(DriverCommand::Screenshot {
            selector: selector.map(str::to_string),
            dest: dest.display().to_string(),
        })
        .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Err(err) = self
            .call(DriverCommand::Close, Duration::from_secs(10))
            .await
        {
            warn!(error = %err, "Driver did not acknowledge close");
        }
        let mut child = self.child.lock().await;
        match timeout(Duration::from_secs(10), child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                child.kill().await.ok();
            }
        }
        info!(session_id = %self.session_id, "Browser session closed");
        Ok(())
    }
}

impl Drop for PlaywrightPage {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}

fn build_driver_script(options: &LaunchOptions, artifacts_dir: &Path) -> Result<String> {
    let session_literal = json!({
        "headless": options.headless,
        "artifactsDir": artifacts_dir.display().to_string(),
        "bodyLimit": options.body_limit_bytes,
        "documentPatterns": options.document_patterns,
    })
    .to_string();

    let mut script = String::new();
    script.push_str("import fs from 'node:fs';\n");
    script.push_str("import path from 'node:path';\n");
    script.push_str("import readline from 'node:readline';\n\n");
    script.push_str(&format!("const RESULT_MARKER = '{}';\n", DRIVER_MARKER));
    script.push_str(&format!("const session = {};\n\n", session_literal));
    script.push_str(DRIVER_BODY);

    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_script_embeds_session_and_commands() {
        let options = LaunchOptions {
            document_patterns: vec!["ExportPdf".to_string()],
            ..LaunchOptions::default()
        };
        let script = build_driver_script(&options, Path::new("/tmp/rf/s1")).unwrap();

        assert!(script.starts_with("import fs from 'node:fs';"));
        assert!(script.contains("const RESULT_MARKER = '__REPORTFLOW_DRIVER__=';"));
        assert!(script.contains("\"documentPatterns\":[\"ExportPdf\"]"));
        assert!(script.contains("case 'wait_for_response'"));
        assert!(script.contains("case 'trigger_export'"));
        assert!(script.contains("case 'render_pdf'"));
    }

    #[test]
    fn every_command_has_a_driver_case() {
        let script = build_driver_script(&LaunchOptions::default(), Path::new("/tmp")).unwrap();
        let commands = [
            DriverCommand::Controls,
            DriverCommand::OverlayItems,
            DriverCommand::ClickSelectAll,
            DriverCommand::CloseOverlay,
            DriverCommand::Exchanges,
            DriverCommand::Cookies,
            DriverCommand::Close,
            DriverCommand::ExchangeBody { index: 0 },
            DriverCommand::ReadControl {
                handle: "c1".to_string(),
            },
            DriverCommand::PopupDocument {
                popup: "p1".to_string(),
                patterns: Vec::new(),
                dest: "/tmp/x.pdf".to_string(),
                timeout_ms: 1,
            },
        ];
        for command in commands {
            let case = format!("case '{}'", command.name());
            assert!(script.contains(&case), "missing {case}");
        }
    }

    #[test]
    fn default_launch_options_are_headless() {
        let options = LaunchOptions::default();
        assert!(options.headless);
        assert_eq!(options.call_timeout_secs, DEFAULT_CALL_TIMEOUT_SECS);
    }
}
