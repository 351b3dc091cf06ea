//! # routes
//!
//! Axum router for the desk.  Handlers are thin: they parse the request, call
//! into [`crate::engine::trading`] or read the ledger, and wrap the result in
//! `{ "ok": true, ... }`.  Errors render through [`crate::error::AppError`].

pub mod market;
pub mod monitor;
pub mod orders;
pub mod positions;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::{require_api_key, ApiKey, HEALTH_PATH};
use crate::state::SharedState;

pub fn router(state: SharedState, api_key: ApiKey) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Health ────────────────────────────────────────────────────────────
        .route(HEALTH_PATH,                   get(market::health_check))
        // ── Market / symbols ──────────────────────────────────────────────────
        .route("/api/symbols",                get(market::list_symbols))
        .route("/api/symbol",                 put(market::set_symbol))
        // ── Orders ────────────────────────────────────────────────────────────
        .route("/api/orders",                 get(orders::list_orders))
        .route("/api/orders/market",          post(orders::market_order))
        .route("/api/orders/limit",           post(orders::limit_order))
        .route("/api/orders/:id",             delete(orders::cancel_order))
        // ── Positions ─────────────────────────────────────────────────────────
        .route("/api/positions",              get(positions::list_positions))
        .route("/api/positions/:id/close",    post(positions::close_position))
        .route("/api/positions/:id/exit",     post(positions::place_exit))
        // ── Monitor ───────────────────────────────────────────────────────────
        .route("/ws/monitor",                 get(monitor::ws_monitor))
        .route("/api/snapshot",               get(monitor::get_snapshot))
        .route("/api/history",                get(monitor::get_history))
        .route("/api/stats",                  get(monitor::get_stats))
        // ── Middleware ────────────────────────────────────────────────────────
        .layer(axum::middleware::from_fn_with_state(api_key, require_api_key))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::engine::testkit::{harness, Harness};

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn app(h: &Harness) -> Router {
        router(h.state.clone(), ApiKey::default())
    }

    #[tokio::test]
    async fn test_market_order_then_close_over_http() {
        let h = harness();
        let app = app(&h);

        let (status, body) = call(
            &app,
            "POST",
            "/api/orders/market",
            Some(serde_json::json!({ "symbol": "BTCUSDT", "side": "buy", "qty": 1.0, "price": 50000.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["position"]["id"].as_str().unwrap().to_string();
        assert!((body["position"]["open_fee"].as_f64().unwrap() - 20.0).abs() < 1e-9);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/positions/{id}/close"),
            Some(serde_json::json!({ "price": 51000.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!((body["record"]["net_pnl"].as_f64().unwrap() - 959.6).abs() < 1e-6);

        let (_, body) = call(&app, "GET", "/api/history", None).await;
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_malformed_close_body_is_rejected_and_position_kept() {
        let h = harness();
        h.market.quote("BTCUSDT", "40000", "40000");
        let app = app(&h);
        let (_, body) = call(
            &app,
            "POST",
            "/api/orders/market",
            Some(serde_json::json!({ "symbol": "BTCUSDT", "side": "BUY", "qty": 1.0, "price": 50000.0 })),
        )
        .await;
        let uri = format!("/api/positions/{}/close", body["position"]["id"].as_str().unwrap());

        for bad in [
            serde_json::json!({ "price": "51000" }),
            serde_json::json!({ "prcie": 51000.0 }),
            serde_json::json!({ "fee_rate": 0.0001 }),
            serde_json::json!({ "price": 51000.0, "fee_rate": -0.5 }),
        ] {
            let (status, body) = call(&app, "POST", &uri, Some(bad.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{bad} -> {body}");
        }

        let request = Request::builder()
            .method("POST")
            .uri(&uri)
            .header("content-type", "application/json")
            .body(Body::from("{\"price\": 51000"))
            .unwrap();
        assert_eq!(app.clone().oneshot(request).await.unwrap().status(), StatusCode::BAD_REQUEST);

        assert_eq!(h.state.ledger.lock().await.open_positions().len(), 1);
        assert!(h.state.ledger.lock().await.history().is_empty());

        // No body at all closes at the mark.
        let (status, body) = call(&app, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["record"]["close_price"], 40000.0);
    }

    #[tokio::test]
    async fn test_unknown_position_is_404() {
        let h = harness();
        let (status, body) = call(&app(&h), "POST", "/api/positions/BTCUSDT-ffffff/close", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_bad_side_is_400() {
        let h = harness();
        let (status, _) = call(
            &app(&h),
            "POST",
            "/api/orders/limit",
            Some(serde_json::json!({ "symbol": "BTCUSDT", "side": "up", "qty": 1.0, "price": 1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cancel_unknown_order_is_ok() {
        let h = harness();
        let (status, body) = call(&app(&h), "DELETE", "/api/orders/BTCUSDT-123456", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cancelled"], false);
    }

    #[tokio::test]
    async fn test_api_key_guards_all_but_health() {
        let h = harness();
        let app = router(h.state.clone(), ApiKey::new(Some("secret".into())));

        let (status, _) = call(&app, "GET", "/api/snapshot", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, "GET", HEALTH_PATH, None).await;
        assert_eq!(status, StatusCode::OK);

        let request = Request::builder()
            .uri("/api/snapshot")
            .header("X-API-Key", "secret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(request).await.unwrap().status(), StatusCode::OK);
    }
}
