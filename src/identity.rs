// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Caller identity resolution.
//!
//! A caller is keyed on the `userId` it claims in the request body, or on
//! its network origin when it claims none. The claim is not verified and
//! not normalized: `Alice` and `alice` are different callers.

use serde_json::Value;
use std::fmt;
use std::net::IpAddr;

/// Opaque identity a limiting decision is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RateKey(String);

impl RateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RateKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<IpAddr> for RateKey {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

/// Derive the rate key for a request body received from `origin`.
pub fn resolve_key(body: &Value, origin: IpAddr) -> RateKey {
    claimed_identity(body).unwrap_or_else(|| RateKey::from(origin))
}

fn claimed_identity(body: &Value) -> Option<RateKey> {
    match body.get("userId")? {
        Value::String(id) if !id.is_empty() => Some(RateKey::new(id.as_str())),
        // Zero is falsy and counts as no claim
        Value::Number(id) if id.as_f64() != Some(0.0) => Some(RateKey::new(id.to_string())),
        _ => None,
    }
}
