//! `wordrank` HTTP surface.
//!
//! The binary wires this router to a Playwright renderer; tests wire it to fakes.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use wordrank_core::{Error, ErrorKind};
use wordrank_local::Analyzer;

pub const INVALID_URL_MESSAGE: &str = "Invalid URL format";
pub const INVALID_BODY_MESSAGE: &str = "Invalid request body";
pub const FAILURE_MESSAGE: &str = "Failed to fetch or process the page content";

/// Origin the bundled frontend is served from during development.
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Analyzer,
}

impl AppState {
    pub fn new(analyzer: Analyzer) -> Self {
        Self { analyzer }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

/// Client-facing status and message; details stay in the log.
pub fn error_status(e: &Error) -> (StatusCode, &'static str) {
    match (e.kind(), e) {
        (ErrorKind::InvalidInput, Error::InvalidUrl(_)) => {
            (StatusCode::BAD_REQUEST, INVALID_URL_MESSAGE)
        }
        (ErrorKind::InvalidInput, _) => (StatusCode::BAD_REQUEST, INVALID_BODY_MESSAGE),
        (ErrorKind::RenderFailure | ErrorKind::InternalProcessing, _) => {
            (StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE)
        }
    }
}

fn error_response(e: &Error) -> Response {
    let (status, error) = error_status(e);
    (status, Json(ErrorBody { error })).into_response()
}

/// CORS for a single allowed origin, `GET`/`POST`, `Content-Type` only.
pub fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = origin
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid CORS origin {origin:?}: {e}"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let parsed = match payload {
        Ok(Json(body)) => wordrank_local::parse_request(body),
        Err(rejection) => Err(Error::InvalidInput(rejection.body_text())),
    };
    let req = match parsed {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(error = %e, "rejected analyze request body");
            return error_response(&e);
        }
    };

    // Run on its own task so a panic inside the pipeline becomes a 500, not a dropped connection.
    let analyzer = state.analyzer.clone();
    let url = req.url.clone();
    let res = tokio::spawn(async move { analyzer.analyze(&req).await })
        .await
        .unwrap_or_else(|e| Err(Error::Processing(format!("analyze task failed: {e}"))));

    match res {
        Ok(words) => Json(words).into_response(),
        Err(e) => {
            match e.kind() {
                ErrorKind::InvalidInput => tracing::info!(url = %url, error = %e, "analyze rejected"),
                _ => tracing::error!(url = %url, error = %e, "analyze failed"),
            }
            error_response(&e)
        }
    }
}

/// Serve until Ctrl-C.
pub async fn serve(addr: &str, state: AppState, cors: CorsLayer) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        renderer = state.analyzer.renderer_name(),
        navigation_timeout_ms = state.analyzer.options().navigate.timeout_ms(),
        "wordrank listening"
    );
    axum::serve(listener, build_router(state, cors))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

/// Log to stderr so stdout stays machine-readable.
///
/// Filter comes from `WORDRANK_LOG`, then `RUST_LOG`, then `info`.
pub fn init_tracing() {
    let filter = std::env::var("WORDRANK_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_fixed_client_messages() {
        assert_eq!(
            error_status(&Error::InvalidUrl("nope".into())),
            (StatusCode::BAD_REQUEST, INVALID_URL_MESSAGE)
        );
        assert_eq!(
            error_status(&Error::InvalidInput("missing field `n`".into())),
            (StatusCode::BAD_REQUEST, INVALID_BODY_MESSAGE)
        );
        for e in [
            Error::Timeout(30_000),
            Error::Render("net::ERR_FAILED".into()),
            Error::NotConfigured("node".into()),
            Error::Processing("panic".into()),
        ] {
            assert_eq!(
                error_status(&e),
                (StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE)
            );
        }
    }

    #[test]
    fn cors_layer_rejects_unparseable_origins() {
        assert!(cors_layer(DEFAULT_CORS_ORIGIN).is_ok());
        assert!(cors_layer("http://bad\norigin").is_err());
    }
}
