//! Playwright browser automation
//!
//! Each [`PlaywrightSession`] owns one Node process running `bridge.js`,
//! which holds a single browser context and page. Requests and replies are
//! newline-delimited JSON tagged with an id, so several requests can be in
//! flight at once (the login confirmation races two waits against each
//! other).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::page::{LoadState, Page};

const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::InvalidConfig(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Default timeout for actions without an explicit one
    pub action_timeout: Duration,

    /// How long the bridge may take to open its first page
    pub launch_timeout: Duration,

    /// `node_modules` directory that provides the `playwright` package
    pub node_modules: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            action_timeout: Duration::from_secs(30),
            launch_timeout: Duration::from_secs(60),
            node_modules: PathBuf::from("node_modules"),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BridgeOptions<'a> {
    browser: &'a str,
    headless: bool,
    base_url: &'a str,
    viewport_width: u32,
    viewport_height: u32,
    action_timeout: u64,
}

#[derive(Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    op: &'a str,
    args: Value,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    timeout: bool,
    #[serde(default)]
    error: Option<String>,
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<BridgeResponse>>>>;

/// A live browser page driven through the Playwright bridge
pub struct PlaywrightSession {
    child: Child,
    outgoing: mpsc::UnboundedSender<String>,
    pending: Pending,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    _script_dir: tempfile::TempDir,
}

impl PlaywrightSession {
    /// Start the bridge and wait until its page is open
    ///
    /// Callers run [`PlaywrightSession::check_playwright_installed`] once
    /// beforehand; a missing package otherwise shows up as a startup error.
    pub async fn launch(config: &PlaywrightConfig) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let options = serde_json::to_string(&BridgeOptions {
            browser: config.browser.as_str(),
            headless: config.headless,
            base_url: &config.base_url,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            action_timeout: config.action_timeout.as_millis() as u64,
        })?;
        info!("Launching {} against {}", config.browser.as_str(), config.base_url);

        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .env("AUTHFLOW_BRIDGE_OPTIONS", options)
            .env("NODE_PATH", node_path(&config.node_modules))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::BridgeStartup(format!("failed to spawn node: {}", e)))?;

        let stdin = child.stdin.take()
            .ok_or_else(|| E2eError::BridgeStartup("stdin not captured".to_string()))?;
        let stdout = child.stdout.take()
            .ok_or_else(|| E2eError::BridgeStartup("stdout not captured".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("[bridge] {}", line);
                }
            });
        }

        let mut lines = BufReader::new(stdout).lines();
        match tokio::time::timeout(config.launch_timeout, lines.next_line()).await {
            Ok(Ok(Some(line))) if is_ready(&line) => {}
            Ok(Ok(Some(line))) => {
                return Err(E2eError::BridgeStartup(format!("unexpected handshake: {}", line)));
            }
            Ok(Ok(None)) => {
                return Err(E2eError::BridgeStartup("bridge exited before the page opened".to_string()));
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(E2eError::BridgeStartup(format!(
                    "page not ready after {} ms",
                    config.launch_timeout.as_millis()
                )));
            }
        }

        let pending: Pending = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_responses(lines, pending.clone(), closed.clone()));

        let (outgoing, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_requests(stdin, rx));

        debug!("Bridge ready (pid: {:?})", child.id());

        Ok(Self {
            child,
            outgoing,
            pending,
            closed,
            next_id: AtomicU64::new(1),
            reader,
            writer,
            _script_dir: script_dir,
        })
    }

    /// Check that node can load the `playwright` package the way the bridge does
    ///
    /// The bridge script runs from a temporary directory with `NODE_PATH`
    /// pointing at `node_modules`, so the check resolves from the same place.
    pub async fn check_playwright_installed(node_modules: &Path) -> E2eResult<()> {
        let status = TokioCommand::new("node")
            .args(["-e", "require.resolve('playwright')"])
            .env("NODE_PATH", node_path(node_modules))
            .current_dir(std::env::temp_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => {
                debug!("playwright not resolvable from {} ({})", node_modules.display(), status);
                Err(E2eError::PlaywrightNotFound)
            }
            Err(e) => {
                debug!("node not runnable: {}", e);
                Err(E2eError::PlaywrightNotFound)
            }
        }
    }

    async fn request(&self, op: &str, args: Value) -> E2eResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if self.closed.load(Ordering::SeqCst) {
            self.pending.lock().remove(&id);
            return Err(E2eError::Playwright("browser bridge has exited".to_string()));
        }

        let line = serde_json::to_string(&BridgeRequest { id, op, args })?;
        if self.outgoing.send(line).is_err() {
            self.pending.lock().remove(&id);
            return Err(E2eError::Playwright("browser bridge is not accepting requests".to_string()));
        }
        debug!("bridge <- #{} {}", id, op);

        let resp = rx.await
            .map_err(|_| E2eError::Playwright(format!("browser bridge exited during {}", op)))?;

        if resp.ok {
            return Ok(resp.value);
        }
        let message = resp.error.unwrap_or_else(|| "unknown error".to_string());
        if resp.timeout {
            Err(E2eError::Timeout(format!("{}: {}", op, message)))
        } else {
            Err(E2eError::Playwright(format!("{} failed: {}", op, message)))
        }
    }

    async fn request_as<T: serde::de::DeserializeOwned>(&self, op: &str, args: Value) -> E2eResult<T> {
        let value = self.request(op, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Close the browser and stop the bridge process
    pub async fn close(mut self) -> E2eResult<()> {
        info!("Closing browser (pid: {:?})", self.child.id());

        let reply = tokio::time::timeout(Duration::from_secs(5), self.request("close", json!({}))).await;
        if let Some(problem) = close_problem(reply.ok()) {
            warn!("{}", problem);
        }

        if tokio::time::timeout(Duration::from_secs(2), self.child.wait()).await.is_ok() {
            return Ok(());
        }

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && tokio::time::timeout(Duration::from_millis(500), self.child.wait()).await.is_ok()
                {
                    return Ok(());
                }
            }
        }

        self.child.kill().await?;
        Ok(())
    }
}

impl Drop for PlaywrightSession {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Warning for a `close` reply that did not come back clean; `None` reply means it timed out
fn close_problem(reply: Option<E2eResult<Value>>) -> Option<String> {
    match reply {
        Some(Ok(_)) => None,
        Some(Err(e)) => Some(format!("Browser close failed: {}", e)),
        None => Some("Browser did not close in time".to_string()),
    }
}

fn node_path(node_modules: &Path) -> PathBuf {
    std::fs::canonicalize(node_modules).unwrap_or_else(|_| node_modules.to_path_buf())
}

fn is_ready(line: &str) -> bool {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|v| v.get("ready").and_then(Value::as_bool))
        .unwrap_or(false)
}

async fn read_responses(mut lines: Lines<BufReader<ChildStdout>>, pending: Pending, closed: Arc<AtomicBool>) {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match serde_json::from_str::<BridgeResponse>(&line) {
                Ok(resp) => {
                    debug!("bridge -> #{} ok={}", resp.id, resp.ok);
                    if let Some(tx) = pending.lock().remove(&resp.id) {
                        // Receiver is gone when the caller stopped waiting
                        let _ = tx.send(resp);
                    }
                }
                Err(_) => debug!("[bridge stdout] {}", line),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Bridge read error: {}", e);
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    pending.lock().clear();
}

async fn write_requests(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            warn!("Bridge write error: {}", e);
            break;
        }
        if let Err(e) = stdin.flush().await {
            warn!("Bridge flush error: {}", e);
            break;
        }
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

#[async_trait]
impl Page for PlaywrightSession {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.request("goto", json!({ "url": url })).await.map(|_| ())
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.request("fill", json!({ "selector": selector, "value": value })).await.map(|_| ())
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        self.request("click", json!({ "selector": selector })).await.map(|_| ())
    }

    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> E2eResult<()> {
        self.request("waitForVisible", json!({ "selector": selector, "timeout": millis(timeout) }))
            .await
            .map(|_| ())
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        self.request_as("isVisible", json!({ "selector": selector })).await
    }

    async fn is_disabled(&self, selector: &str) -> E2eResult<bool> {
        self.request_as("isDisabled", json!({ "selector": selector })).await
    }

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>> {
        self.request_as("textContent", json!({ "selector": selector })).await
    }

    async fn all_text_contents(&self, selector: &str) -> E2eResult<Vec<String>> {
        self.request_as("allTextContents", json!({ "selector": selector })).await
    }

    async fn input_value(&self, selector: &str) -> E2eResult<String> {
        self.request_as("inputValue", json!({ "selector": selector })).await
    }

    async fn validation_message(&self, selector: &str) -> E2eResult<String> {
        self.request_as("validationMessage", json!({ "selector": selector })).await
    }

    async fn wait_for_url(&self, pattern: &Regex, timeout: Duration) -> E2eResult<()> {
        self.request("waitForUrl", json!({ "pattern": pattern.as_str(), "timeout": millis(timeout) }))
            .await
            .map(|_| ())
    }

    async fn url(&self) -> E2eResult<String> {
        self.request_as("url", json!({})).await
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> E2eResult<()> {
        self.request("waitForLoadState", json!({ "state": state.as_str(), "timeout": millis(timeout) }))
            .await
            .map(|_| ())
    }
}
