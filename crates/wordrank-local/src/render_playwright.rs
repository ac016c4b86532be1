use crate::visibility;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};
use wordrank_core::{
    Error, NavigateOptions, RenderSession, RenderedElement, Renderer, Result, TextSource,
};

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_truthy(key: &str) -> bool {
    matches!(
        env(key).unwrap_or_default().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Global module roots where `npm i -g playwright` commonly lands.
fn node_module_roots() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        out.push(home.join(".npm-global").join("lib").join("node_modules"));
    }
    out.push(PathBuf::from("/opt/homebrew/lib/node_modules"));
    out.push(PathBuf::from("/usr/local/lib/node_modules"));
    out.push(PathBuf::from("/usr/lib/node_modules"));
    out
}

fn has_playwright(node_path: &str) -> bool {
    node_path
        .split(':')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .any(|p| PathBuf::from(p).join("playwright").is_dir())
}

/// NODE_PATH value that lets `require('playwright')` resolve, if one needs to be set.
pub fn detect_node_path() -> Option<String> {
    if let Some(v) = env("WORDRANK_NODE_PATH") {
        return Some(v);
    }
    let existing = env("NODE_PATH").unwrap_or_default();
    if has_playwright(&existing) {
        return None;
    }
    let found = node_module_roots()
        .into_iter()
        .find(|root| root.join("playwright").is_dir())?
        .to_string_lossy()
        .to_string();
    if existing.is_empty() {
        Some(found)
    } else {
        Some(format!("{existing}:{found}"))
    }
}

#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    /// Node.js binary (`WORDRANK_NODE`, default `node`).
    pub node_bin: String,
    /// Extra NODE_PATH for resolving the `playwright` package.
    pub node_path: Option<String>,
    /// Refuse to spawn anything (`WORDRANK_RENDER_DISABLE`).
    pub disabled: bool,
    /// Slack on top of each driver command's own timeout before the child is considered hung.
    pub grace: Duration,
    /// How long browser launch may take before `open` gives up.
    pub launch_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            node_bin: "node".to_string(),
            node_path: None,
            disabled: false,
            grace: Duration::from_secs(10),
            launch_timeout: Duration::from_secs(30),
        }
    }
}

impl PlaywrightConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            node_bin: env("WORDRANK_NODE").unwrap_or(d.node_bin),
            node_path: detect_node_path(),
            disabled: env_truthy("WORDRANK_RENDER_DISABLE"),
            grace: env("WORDRANK_RENDER_GRACE_MS")
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(d.grace),
            launch_timeout: d.launch_timeout,
        }
    }
}

// Line-delimited JSON driver. One process per session: one browser, one context, one page.
// Every request gets exactly one JSON line back on stdout.
const DRIVER_JS: &str = r#"
const readline = require('readline');

function send(obj) { process.stdout.write(JSON.stringify(obj) + '\n'); }
function fail(code, message) { send({ ok: false, error: { code, message } }); }

async function main() {
  let pw;
  try { pw = require('playwright'); } catch (e) {
    return fail('not_configured',
      'Playwright is not installed for Node.js. Install it with `npm i -g playwright` and `npx playwright install chromium`.');
  }

  let browser;
  let page;
  try {
    browser = await pw.chromium.launch({ headless: true, args: ['--no-sandbox', '--disable-setuid-sandbox'] });
    const context = await browser.newContext();
    page = await context.newPage();
  } catch (e) {
    try { if (browser) await browser.close(); } catch (_) {}
    return fail('launch_failed', String(e && e.message ? e.message : e));
  }
  send({ ok: true, ready: true });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    let req;
    try { req = JSON.parse(line); } catch (_) { fail('invalid_params', 'bad JSON command'); continue; }
    try {
      if (req.op === 'goto') {
        const waitUntil = req.network_idle ? 'networkidle' : 'domcontentloaded';
        const resp = await page.goto(req.url, { waitUntil, timeout: Number(req.timeout_ms || 30000) });
        send({ ok: true, status: resp ? resp.status() : null, final_url: page.url() });
      } else if (req.op === 'snapshot') {
        const elements = await page.evaluate(() => Array.from(document.querySelectorAll('body *')).map((el) => {
          const style = window.getComputedStyle(el);
          const leaf = el.childElementCount === 0;
          return {
            display: style.display,
            visibility: style.visibility,
            opacity: style.opacity,
            child_element_count: el.childElementCount,
            inner_text: leaf && typeof el.innerText === 'string' ? el.innerText : null,
          };
        }));
        send({ ok: true, elements });
      } else if (req.op === 'close') {
        break;
      } else {
        fail('invalid_params', 'unknown op: ' + String(req.op));
      }
    } catch (e) {
      const timeout = e && e.name === 'TimeoutError';
      fail(timeout ? 'timeout' : 'render_failed', String(e && e.message ? e.message : e));
    }
  }
  try { await browser.close(); } catch (_) {}
  send({ ok: true, closed: true });
  process.exit(0);
}

main().catch((e) => { fail('render_failed', String(e && e.message ? e.message : e)); process.exit(1); });
"#;

/// Map a driver `{ok:false, error:{code,message}}` reply onto the error taxonomy.
fn driver_error(v: &Value, timeout_ms: u64) -> Error {
    let code = v
        .pointer("/error/code")
        .and_then(|x| x.as_str())
        .unwrap_or("render_failed");
    let message = v
        .pointer("/error/message")
        .and_then(|x| x.as_str())
        .unwrap_or("Playwright driver failed")
        .to_string();
    match code {
        "not_configured" => Error::NotConfigured(message),
        "timeout" => Error::Timeout(timeout_ms),
        _ => Error::Render(message),
    }
}

fn parse_reply(line: &str, timeout_ms: u64) -> Result<Value> {
    let v: Value = serde_json::from_str(line.trim())
        .map_err(|e| Error::Render(format!("Playwright driver returned invalid JSON: {e}")))?;
    if v.get("ok").and_then(|x| x.as_bool()) == Some(true) {
        Ok(v)
    } else {
        Err(driver_error(&v, timeout_ms))
    }
}

fn parse_snapshot(mut v: Value) -> Result<Vec<RenderedElement>> {
    let elements = v
        .get_mut("elements")
        .map(Value::take)
        .ok_or_else(|| Error::Render("snapshot reply is missing `elements`".to_string()))?;
    serde_json::from_value(elements)
        .map_err(|e| Error::Render(format!("snapshot reply has unexpected shape: {e}")))
}

/// Renders pages with headless Chromium via a Node.js Playwright driver.
///
/// Expected setup: `node` on PATH (or `WORDRANK_NODE`), the `playwright` npm package
/// resolvable from Node, and a Chromium build (`npx playwright install chromium`).
#[derive(Debug, Clone)]
pub struct PlaywrightRenderer {
    cfg: PlaywrightConfig,
}

impl PlaywrightRenderer {
    pub fn new(cfg: PlaywrightConfig) -> Self {
        Self { cfg }
    }

    pub fn from_env() -> Self {
        Self::new(PlaywrightConfig::from_env())
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.cfg
    }
}

#[async_trait::async_trait]
impl Renderer for PlaywrightRenderer {
    fn name(&self) -> &'static str {
        "playwright"
    }

    async fn open(&self) -> Result<Box<dyn RenderSession>> {
        if self.cfg.disabled {
            return Err(Error::NotConfigured(
                "render backend disabled (WORDRANK_RENDER_DISABLE)".to_string(),
            ));
        }

        let mut cmd = tokio::process::Command::new(&self.cfg.node_bin);
        if let Some(node_path) = &self.cfg.node_path {
            cmd.env("NODE_PATH", node_path);
        }
        let mut child = cmd
            .arg("-e")
            .arg(DRIVER_JS)
            .kill_on_drop(true)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::NotConfigured(format!(
                    "Playwright rendering requires Node.js (`{}`): {e}",
                    self.cfg.node_bin
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Render("Playwright driver: missing stdin pipe".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Render("Playwright driver: missing stdout pipe".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            // Driver noise goes to the log instead of filling the pipe.
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "wordrank::playwright", "{line}");
                }
            });
        }

        let mut session = PlaywrightSession {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            grace: self.cfg.grace,
            closed: false,
        };
        let launch_ms = u64::try_from(self.cfg.launch_timeout.as_millis()).unwrap_or(u64::MAX);
        if let Err(e) = session.read_reply(self.cfg.launch_timeout, launch_ms).await {
            let _ = session.close().await;
            return Err(e);
        }
        tracing::debug!(pid = ?session.child.id(), "playwright session ready");
        Ok(Box::new(session))
    }
}

/// One driver process. Dropping it kills the process (and with it the browser).
pub struct PlaywrightSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    grace: Duration,
    closed: bool,
}

impl PlaywrightSession {
    async fn send(&mut self, cmd: &Value) -> Result<()> {
        let mut line = cmd.to_string();
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Render(format!("Playwright driver stdin closed: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| Error::Render(format!("Playwright driver stdin closed: {e}")))
    }

    async fn read_reply(&mut self, wait: Duration, timeout_ms: u64) -> Result<Value> {
        match tokio::time::timeout(wait, self.stdout.next_line()).await {
            Ok(Ok(Some(line))) => parse_reply(&line, timeout_ms),
            Ok(Ok(None)) => Err(Error::Render(
                "Playwright driver exited unexpectedly".to_string(),
            )),
            Ok(Err(e)) => Err(Error::Render(format!("Playwright driver read failed: {e}"))),
            Err(_) => Err(Error::Timeout(timeout_ms)),
        }
    }

    async fn request(&mut self, cmd: Value, timeout: Duration) -> Result<Value> {
        if self.closed {
            return Err(Error::Render("session already closed".to_string()));
        }
        self.send(&cmd).await?;
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.read_reply(timeout.saturating_add(self.grace), timeout_ms)
            .await
    }
}

#[async_trait::async_trait]
impl TextSource for PlaywrightSession {
    async fn collect_visible_leaf_text(&mut self) -> Result<String> {
        let reply = self
            .request(serde_json::json!({ "op": "snapshot" }), self.grace)
            .await?;
        let elements = parse_snapshot(reply)?;
        Ok(visibility::collect_visible_text(&elements))
    }
}

#[async_trait::async_trait]
impl RenderSession for PlaywrightSession {
    async fn navigate(&mut self, url: &str, opts: &NavigateOptions) -> Result<()> {
        let reply = self
            .request(
                serde_json::json!({
                    "op": "goto",
                    "url": url,
                    "network_idle": opts.wait_until_network_idle,
                    "timeout_ms": opts.timeout_ms(),
                }),
                opts.timeout,
            )
            .await?;
        tracing::debug!(
            url,
            status = ?reply.get("status").and_then(|x| x.as_u64()),
            final_url = ?reply.get("final_url").and_then(|x| x.as_str()),
            "navigated"
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // Polite shutdown first so the browser exits cleanly; kill if it does not.
        let _ = self.send(&serde_json::json!({ "op": "close" })).await;
        match tokio::time::timeout(self.grace, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(Error::Render(format!("Playwright driver wait failed: {e}"))),
            Err(_) => {
                let _ = self.child.kill().await;
                let _ = self.child.wait().await;
                Ok(())
            }
        }
    }
}
