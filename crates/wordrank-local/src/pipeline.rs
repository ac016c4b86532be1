//! URL → rendered visible text → refined text → ranked words.

use crate::{rank, refine};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use wordrank_core::{
    AnalyzeRequest, Error, NavigateOptions, RankedWord, RenderSession, Renderer, Result,
};

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:https?|chrome)://[^\s$.?#]\S*$").expect("static url pattern"))
}

/// `http://`, `https://` or `chrome://` followed by a whitespace-free remainder.
///
/// The remainder may not start with `$`, `.`, `?` or `#`.
pub fn validate_url(url: &str) -> Result<()> {
    if url_re().is_match(url) {
        Ok(())
    } else {
        Err(Error::InvalidUrl(url.to_string()))
    }
}

/// Decode a loosely-typed request body, judging `url` before anything else.
///
/// A missing or non-string `url` is an invalid URL; only a body whose URL passes can fail
/// as an invalid body (bad `n`, malformed `stopWords`).
pub fn parse_request(body: serde_json::Value) -> Result<AnalyzeRequest> {
    let url = body.get("url").and_then(serde_json::Value::as_str).unwrap_or_default();
    validate_url(url)?;
    serde_json::from_value(body).map_err(|e| Error::InvalidInput(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub navigate: NavigateOptions,
    /// Budget for reading the visible text once navigation has finished.
    pub collect_timeout: Duration,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            navigate: NavigateOptions::default(),
            collect_timeout: Duration::from_secs(10),
        }
    }
}

impl AnalyzeOptions {
    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigate.timeout = timeout;
        self
    }
}

/// Refine then rank already-collected text.
pub fn analyze_text<S: AsRef<str>>(raw: &str, n: usize, stop_words: &[S]) -> Vec<RankedWord> {
    let refined = refine::refine(raw);
    rank::rank(&refined, n, stop_words)
}

/// Runs the whole pipeline against a renderer.
///
/// Holds no per-request state, so one instance can serve concurrent requests; each call
/// opens its own session.
#[derive(Clone)]
pub struct Analyzer {
    renderer: Arc<dyn Renderer>,
    opts: AnalyzeOptions,
}

impl Analyzer {
    pub fn new(renderer: Arc<dyn Renderer>, opts: AnalyzeOptions) -> Self {
        Self { renderer, opts }
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    pub fn options(&self) -> &AnalyzeOptions {
        &self.opts
    }

    pub async fn analyze(&self, req: &AnalyzeRequest) -> Result<Vec<RankedWord>> {
        validate_url(&req.url)?;
        let t0 = Instant::now();
        let raw = self.visible_text(&req.url).await?;
        let words = analyze_text(&raw, req.limit(), &req.stop_words);
        tracing::info!(
            url = %req.url,
            n = req.n,
            raw_chars = raw.len(),
            returned = words.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "analyzed page"
        );
        Ok(words)
    }

    /// Open a session, collect, and close it on every exit path.
    async fn visible_text(&self, url: &str) -> Result<String> {
        let mut session = self.renderer.open().await?;
        let out = self.collect(session.as_mut(), url).await;
        if let Err(e) = session.close().await {
            tracing::warn!(renderer = self.renderer.name(), error = %e, "session close failed");
        }
        out
    }

    async fn collect(&self, session: &mut dyn RenderSession, url: &str) -> Result<String> {
        let nav = &self.opts.navigate;
        match tokio::time::timeout(nav.timeout, session.navigate(url, nav)).await {
            Ok(r) => r?,
            Err(_) => return Err(Error::Timeout(nav.timeout_ms())),
        }
        let budget = self.opts.collect_timeout;
        match tokio::time::timeout(budget, session.collect_visible_leaf_text()).await {
            Ok(r) => r,
            Err(_) => Err(Error::Timeout(
                u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }
}
