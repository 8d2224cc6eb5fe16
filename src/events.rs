// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Security events emitted by the limiter.

use crate::identity::RateKey;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// Kind of security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventType {
    RateLimitBlock,
}

/// A structured fact about a blocked request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityEvent {
    #[serde(rename = "type")]
    pub event_type: SecurityEventType,
    pub key: String,
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn rate_limit_block(key: &RateKey) -> Self {
        Self {
            event_type: SecurityEventType::RateLimitBlock,
            key: key.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Destination for security events.
///
/// Emission is fire-and-forget: a sink must absorb its own failures.
pub trait SecurityEventSink: Send + Sync {
    fn emit(&self, event: SecurityEvent);
}

/// Writes events to the `security` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl SecurityEventSink for TracingEventSink {
    fn emit(&self, event: SecurityEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => warn!(
                target: "security",
                event = %json,
                key = %event.key,
                "SECURITY EVENT"
            ),
            Err(err) => warn!(target: "security", key = %event.key, error = %err, "SECURITY EVENT"),
        }
    }
}
