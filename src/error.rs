// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the admission guard.

use crate::config::ConfigError;
use crate::handlers::SecurityResponse;
use crate::limiter::{Decision, DecisionReason};
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Request-level failures, each rendered as a structured decision body.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GuardError {
    /// Malformed request, or a limiter fault reported as one.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing required fields")]
    MissingFields,

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The downstream transform could not handle the input.
    #[error("Processing error: {0}")]
    Processing(String),
}

impl GuardError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Validation(_) | Self::MissingFields | Self::Processing(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Reason string shown to the caller.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation error",
            Self::MissingFields => "Missing required fields",
            Self::RateLimited { .. } => "Rate limit exceeded",
            Self::Processing(_) => "Processing error",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::Validation(_) => 0.8,
            Self::MissingFields => 0.9,
            Self::RateLimited { .. } => 0.99,
            Self::Processing(_) => 0.7,
        }
    }

    /// Metrics label for this failure.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::MissingFields => "missing_fields",
            Self::RateLimited { .. } => "rate_limited",
            Self::Processing(_) => "processing_error",
        }
    }

    /// The error a denied decision turns into, or `None` when admitted.
    pub fn from_decision(decision: &Decision) -> Option<Self> {
        match decision.reason {
            DecisionReason::Admitted => None,
            DecisionReason::RateLimited => Some(Self::RateLimited {
                retry_after_secs: decision.retry_after_secs.unwrap_or(1),
            }),
            DecisionReason::ValidationError => {
                Some(Self::Validation("limiter rejected request".to_string()))
            }
        }
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let body = Json(SecurityResponse::blocked(self.reason(), self.confidence()));
        match self {
            Self::RateLimited { retry_after_secs } => (
                self.status(),
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response(),
            _ => (self.status(), body).into_response(),
        }
    }
}

/// Failures while assembling the service.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
