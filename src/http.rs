//! # HTTP Surface
//!
//! Thin axum router translating browser requests into bridge actions.
//!
//! | Route | Action |
//! |-------|--------|
//! | `GET /F` `/B` `/L` `/R` | hold that direction (browser-arbitrated) |
//! | `GET /S` | stop, release all |
//! | `GET /X` `/Y` | U-turn codes resolved by the browser |
//! | `GET /0`-`/9` | speed level |
//! | `GET /G` `/T` | one-shot autonomous triggers |
//! | `GET /press/{K}` `/release/{K}` | server-side press/release edges |
//! | `GET /metrics`, `/metrics.json` | status report |
//! | `GET /events.tail` | last bytes of the event stream |
//! | `POST /ingest/{topic}` | record an external sensor payload |
//!
//! Action routes always answer `200 OK`, whatever happened on the serial link.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::warn;

use crate::bridge::{Bridge, KeyEdge};
use crate::drive::{DirectionKey, OperatorAction};
use crate::recorder::EventPayload;

/// Shared router state
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<Bridge>,
    /// Size of the `/events.tail` window
    pub tail_bytes: u64,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/index.html", get(index))
        .route("/metrics", get(metrics_html))
        .route("/metrics.json", get(metrics_json))
        .route("/events.tail", get(events_tail))
        .route("/press/:key", get(press))
        .route("/release/:key", get(release))
        .route("/ingest/*topic", post(ingest))
        .route("/:code", get(action))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), record_request))
        .with_state(state)
}

/// Record every request as an `http_get` event
async fn record_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    state.bridge.record(EventPayload::HttpGet { path, client });
    next.run(request).await
}

fn ok() -> Response {
    (StatusCode::OK, "OK").into_response()
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

async fn index(State(state): State<AppState>) -> Response {
    let session = state.bridge.recorder().session().id().to_string();
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("rover-bridge session {}\n", session),
    )
        .into_response()
}

async fn action(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    match OperatorAction::from_route(&code) {
        Some(action) => {
            state.bridge.apply(action).await;
            ok()
        }
        None => not_found().await,
    }
}

fn parse_key(key: &str) -> Option<DirectionKey> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => DirectionKey::from_code(c),
        _ => None,
    }
}

async fn press(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match parse_key(&key) {
        Some(key) => {
            state.bridge.apply_edge(KeyEdge::Press(key)).await;
            ok()
        }
        None => not_found().await,
    }
}

async fn release(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match parse_key(&key) {
        Some(key) => {
            state.bridge.apply_edge(KeyEdge::Release(key)).await;
            ok()
        }
        None => not_found().await,
    }
}

async fn metrics_json(State(state): State<AppState>) -> Response {
    Json(state.bridge.status()).into_response()
}

async fn metrics_html(State(state): State<AppState>) -> Response {
    match serde_json::to_string_pretty(&state.bridge.status()) {
        Ok(pretty) => Html(format!("<h1>Metrics</h1><pre>{}</pre>", escape_html(&pretty))).into_response(),
        Err(e) => {
            warn!("Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "error").into_response()
        }
    }
}

async fn events_tail(State(state): State<AppState>) -> Response {
    match state.bridge.recorder().tail(state.tail_bytes) {
        Ok(data) => Html(format!("<pre>{}</pre>", escape_html(&data))).into_response(),
        Err(e) => {
            warn!("Failed to read event tail: {}", e);
            state.bridge.record(EventPayload::error("events.tail", &e));
            (StatusCode::INTERNAL_SERVER_ERROR, "error").into_response()
        }
    }
}

async fn ingest(State(state): State<AppState>, Path(topic): Path<String>, body: Bytes) -> Response {
    state.bridge.ingest(&topic, &body);
    ok()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
