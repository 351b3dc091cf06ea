//! # auth — API Key Middleware
//!
//! Guards every endpoint with the `X-API-Key` header.
//!
//! ## Mode
//! - `API_KEY` unset (or empty) → **Allow All** (dev mode)
//! - `API_KEY` set → every request needs `X-API-Key: <key>`
//!
//! ## Exempt
//! `/api/health`
//!
//! ```bash
//! curl -H "X-API-Key: super-secret-key-here" http://localhost:3000/api/snapshot
//! ```

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

pub const HEALTH_PATH: &str = "/api/health";

/// Expected key, shared with the middleware through `from_fn_with_state`.
#[derive(Clone, Default)]
pub struct ApiKey(pub Option<Arc<str>>);

impl ApiKey {
    pub fn new(key: Option<String>) -> Self {
        Self(key.filter(|k| !k.is_empty()).map(Arc::from))
    }
}

pub async fn require_api_key(State(expected): State<ApiKey>, request: Request<Body>, next: Next) -> Response {
    // ── Dev mode ──────────────────────────────────────────────────────────────
    let Some(expected) = expected.0 else {
        return next.run(request).await;
    };

    let path = request.uri().path();
    if path == HEALTH_PATH {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided == &*expected {
        next.run(request).await
    } else {
        warn!(path, "❌ Unauthorized request, invalid or missing X-API-Key");
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "ok":    false,
                "error": "Unauthorized: invalid or missing X-API-Key header",
                "hint":  "Set X-API-Key header with your API key"
            })),
        )
            .into_response()
    }
}
