// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Admission Guard
//!
//! This crate decides, per caller, whether a request to the sanitization
//! endpoint may proceed, and how long a refused caller should wait:
//!
//! - Caller identity from the claimed `userId`, else the network origin
//! - Token bucket per caller (burst 10, 31 rpm sustained by default)
//! - Optional per-second sub-bucket for stricter burst control
//! - Idle caller eviction and a bound on tracked callers
//! - Structured security events for every refusal
//! - `<script>` stripping for admitted input

pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod identity;
pub mod limiter;
pub mod metrics;
pub mod sanitizer;

pub use config::Config;
pub use error::GuardError;
pub use identity::{resolve_key, RateKey};
pub use limiter::{Decision, DecisionReason, LimiterStore, RateLimiter};
