use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("render failed: {0}")]
    Render(String),
    #[error("render timed out after {0}ms")]
    Timeout(u64),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("processing failed: {0}")]
    Processing(String),
}

/// Coarse failure classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected before any external call; retrying will not help.
    InvalidInput,
    /// Navigation timeout, network error, missing tooling, or a crashed renderer.
    RenderFailure,
    /// Unexpected failure after the page text was obtained.
    InternalProcessing,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidUrl(_) | Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Render(_) | Error::Timeout(_) | Error::NotConfigured(_) => {
                ErrorKind::RenderFailure
            }
            Error::Processing(_) => ErrorKind::InternalProcessing,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Wire shape of an analyze request: `{ url, n, stopWords? }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub url: String,
    /// Signed so that negative counts are representable; they yield an empty result.
    ///
    /// Browser forms post number inputs as strings, so `"5"` is accepted as well as `5`.
    #[serde(deserialize_with = "integer_or_numeric_string")]
    pub n: i64,
    #[serde(default)]
    pub stop_words: Vec<String>,
}

fn integer_or_numeric_string<'de, D>(d: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }
    match Raw::deserialize(d)? {
        Raw::Int(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("n is not an integer: {s:?}"))),
    }
}

impl AnalyzeRequest {
    /// `n` clamped into a slice length (`n <= 0` becomes 0).
    pub fn limit(&self) -> usize {
        usize::try_from(self.n).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankedWord {
    pub word: String,
    pub count: u64,
}

/// One element of a rendered document, as reported by the rendering engine.
///
/// Style values are the engine's computed strings, compared verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderedElement {
    pub display: String,
    pub visibility: String,
    pub opacity: String,
    pub child_element_count: u32,
    /// innerText equivalent; engines may omit it for non-leaf elements.
    #[serde(default)]
    pub inner_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NavigateOptions {
    /// Wait until the network is judged idle, not just until DOM content is loaded.
    pub wait_until_network_idle: bool,
    pub timeout: Duration,
}

pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            wait_until_network_idle: true,
            timeout: DEFAULT_NAVIGATION_TIMEOUT,
        }
    }
}

impl NavigateOptions {
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Anything that can produce the visible text of a rendered page.
///
/// The returned string is already leaf-filtered, space-joined, collapsed and trimmed.
#[async_trait::async_trait]
pub trait TextSource: Send {
    async fn collect_visible_leaf_text(&mut self) -> Result<String>;
}

/// One isolated page/context inside a renderer.
///
/// `close` must be idempotent and safe to call after any earlier failure.
#[async_trait::async_trait]
pub trait RenderSession: TextSource {
    async fn navigate(&mut self, url: &str, opts: &NavigateOptions) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;
    async fn open(&self) -> Result<Box<dyn RenderSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_follow_the_three_way_taxonomy() {
        assert_eq!(
            Error::InvalidUrl("x".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(Error::Timeout(30_000).kind(), ErrorKind::RenderFailure);
        assert_eq!(
            Error::NotConfigured("node".into()).kind(),
            ErrorKind::RenderFailure
        );
        assert_eq!(
            Error::Processing("boom".into()).kind(),
            ErrorKind::InternalProcessing
        );
    }

    #[test]
    fn analyze_request_uses_camel_case_and_defaults_stop_words() {
        let r: AnalyzeRequest =
            serde_json::from_str(r#"{"url":"https://example.com","n":5}"#).unwrap();
        assert_eq!(r.n, 5);
        assert!(r.stop_words.is_empty());

        let r: AnalyzeRequest = serde_json::from_str(
            r#"{"url":"https://example.com","n":2,"stopWords":["Foo","bar"]}"#,
        )
        .unwrap();
        assert_eq!(r.stop_words, vec!["Foo".to_string(), "bar".to_string()]);
    }

    #[test]
    fn analyze_request_rejects_non_numeric_n() {
        let r = serde_json::from_str::<AnalyzeRequest>(r#"{"url":"https://x.y","n":"ten"}"#);
        assert!(r.is_err());
        let r = serde_json::from_str::<AnalyzeRequest>(r#"{"url":"https://x.y"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn analyze_request_accepts_n_as_numeric_string() {
        let r: AnalyzeRequest =
            serde_json::from_str(r#"{"url":"https://x.y","n":"5"}"#).unwrap();
        assert_eq!(r.n, 5);
        let r: AnalyzeRequest =
            serde_json::from_str(r#"{"url":"https://x.y","n":" -2 "}"#).unwrap();
        assert_eq!(r.limit(), 0);
        for bad in [r#""""#, r#""5.5""#, "5.5", "true", "null"] {
            let body = format!(r#"{{"url":"https://x.y","n":{bad}}}"#);
            assert!(
                serde_json::from_str::<AnalyzeRequest>(&body).is_err(),
                "expected rejection of n={bad}"
            );
        }
    }

    #[test]
    fn negative_n_limits_to_zero() {
        let r = AnalyzeRequest {
            url: "https://example.com".into(),
            n: -3,
            stop_words: vec![],
        };
        assert_eq!(r.limit(), 0);
    }

    #[test]
    fn rendered_element_tolerates_missing_inner_text() {
        let e: RenderedElement = serde_json::from_str(
            r#"{"display":"block","visibility":"visible","opacity":"1","child_element_count":2}"#,
        )
        .unwrap();
        assert_eq!(e.inner_text, None);
        assert_eq!(e.child_element_count, 2);
    }

    #[test]
    fn navigate_options_default_to_network_idle_and_thirty_seconds() {
        let o = NavigateOptions::default();
        assert!(o.wait_until_network_idle);
        assert_eq!(o.timeout_ms(), 30_000);
    }
}
