// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the admission guard service.
//!
//! Every `POST /security` request is keyed, checked against the limiter,
//! and only then validated and sanitized.

use crate::config::Config;
use crate::error::{GuardError, StartupError};
use crate::identity::resolve_key;
use crate::limiter::RateLimiter;
use crate::metrics::GuardMetrics;
use crate::sanitizer;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Shared application state.
pub struct AppState {
    pub limiter: RateLimiter,
    pub metrics: GuardMetrics,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, StartupError> {
        let limiter =
            RateLimiter::new(config.rate_limit.clone())?.with_eviction(config.eviction.clone())?;
        Ok(Self {
            limiter,
            metrics: GuardMetrics::new()?,
            config,
        })
    }
}

/// Body of every `POST /security` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityResponse {
    pub blocked: bool,
    pub reason: &'static str,
    pub sanitized_output: Option<String>,
    pub confidence: f64,
}

impl SecurityResponse {
    pub fn passed(sanitized_output: String) -> Self {
        Self {
            blocked: false,
            reason: "Input passed all security checks",
            sanitized_output: Some(sanitized_output),
            confidence: 0.95,
        }
    }

    pub fn blocked(reason: &'static str, confidence: f64) -> Self {
        Self {
            blocked: true,
            reason,
            sanitized_output: None,
            confidence,
        }
    }
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]);

    let mut router = Router::new()
        .route("/", get(health))
        .route("/security", post(security));

    if state.config.metrics.enabled {
        router = router.route(&state.config.metrics.path, get(metrics));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "Service running"
}

/// Rate-limit, validate and sanitize one input.
pub async fn security(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Response {
    match evaluate(&state, addr, &body) {
        Ok(sanitized) => {
            state.metrics.record("admitted");
            (StatusCode::OK, Json(SecurityResponse::passed(sanitized))).into_response()
        }
        Err(err) => {
            state.metrics.record(err.outcome());
            err.into_response()
        }
    }
}

fn evaluate(state: &AppState, addr: SocketAddr, body: &[u8]) -> Result<String, GuardError> {
    let body = parse_body(body)?;
    let key = resolve_key(&body, addr.ip());

    let decision = state.limiter.check(&key);
    if let Some(err) = GuardError::from_decision(&decision) {
        info!(key = %key, reason = %decision.reason, retry_after_secs = ?decision.retry_after_secs, "Request blocked");
        return Err(err);
    }
    debug!(key = %key, "Request admitted");

    sanitizer::process(&body).map_err(|err| {
        if let GuardError::Processing(detail) = &err {
            error!(key = %key, error = %detail, "Processing error");
        }
        err
    })
}

/// Parse a JSON body; an empty body reads as `{}`.
fn parse_body(body: &[u8]) -> Result<Value, GuardError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body).map_err(|err| {
        warn!(error = %err, "Malformed request body");
        GuardError::Validation(err.to_string())
    })
}

/// Prometheus exposition endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.set_tracked_keys(state.limiter.tracked_keys());
    match state.metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
