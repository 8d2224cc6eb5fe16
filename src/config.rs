// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the admission guard.
//!
//! Defaults reproduce the production policy: a burst of 10 requests and a
//! sustained rate of 31 requests per minute per caller.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Invalid configuration detected at startup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least 1, got {value}")]
    TooSmall { field: &'static str, value: u64 },

    #[error("idle_ttl_secs must be at least {minimum}, got {value}")]
    IdleTtlTooShort { value: u64, minimum: u64 },
}

/// Idle state is never dropped sooner than one minute window.
pub const MIN_IDLE_TTL_SECS: u64 = 60;

/// Configuration for the admission guard service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:3000)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Idle key eviction
    #[serde(default)]
    pub eviction: EvictionConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Token bucket parameters applied to every caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum instantaneous allowance (default: 10)
    #[serde(default = "default_burst_capacity")]
    pub burst_capacity: u32,

    /// Sustained refill rate in requests per minute (default: 31)
    #[serde(default = "default_sustained_per_minute")]
    pub sustained_per_minute: u32,

    /// Optional cap on requests within any one second, enforced by a
    /// second bucket refilled over 1000 ms.
    #[serde(default)]
    pub burst_per_second: Option<u32>,
}

/// Eviction of usage state for callers that went quiet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// Idle time after which a caller's state is dropped (default: 300)
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,

    /// Interval of the background sweep (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Upper bound on tracked callers (default: 100000)
    #[serde(default = "default_max_tracked_keys")]
    pub max_tracked_keys: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_burst_capacity() -> u32 {
    10
}

fn default_sustained_per_minute() -> u32 {
    31
}

fn default_idle_ttl_secs() -> u64 {
    300 // five minute windows
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_max_tracked_keys() -> usize {
    100_000
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitConfig::default(),
            eviction: EvictionConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst_capacity: default_burst_capacity(),
            sustained_per_minute: default_sustained_per_minute(),
            burst_per_second: None,
        }
    }
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_tracked_keys: default_max_tracked_keys(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// Tokens added per elapsed millisecond.
    pub fn refill_per_ms(&self) -> f64 {
        self.sustained_per_minute as f64 / 60_000.0
    }

    /// Whole seconds for an empty sustained bucket to fill back up.
    pub fn full_refill_secs(&self) -> u64 {
        let burst = self.burst_capacity as u64 * 60;
        let rate = (self.sustained_per_minute as u64).max(1);
        burst.div_ceil(rate)
    }

    /// Reject values that would make the bucket unable to ever admit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.burst_capacity < 1 {
            return Err(ConfigError::TooSmall {
                field: "burst_capacity",
                value: self.burst_capacity as u64,
            });
        }
        if self.sustained_per_minute < 1 {
            return Err(ConfigError::TooSmall {
                field: "sustained_per_minute",
                value: self.sustained_per_minute as u64,
            });
        }
        if let Some(per_second) = self.burst_per_second {
            if per_second < 1 {
                return Err(ConfigError::TooSmall {
                    field: "burst_per_second",
                    value: per_second as u64,
                });
            }
        }
        Ok(())
    }
}

impl EvictionConfig {
    /// Get the idle time-to-live
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    /// Get the sweep interval
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Shortest idle TTL that cannot hand a drained caller a fresh bucket.
    pub fn min_idle_ttl_secs(rate_limit: &RateLimitConfig) -> u64 {
        rate_limit.full_refill_secs().max(MIN_IDLE_TTL_SECS)
    }

    /// Reject eviction settings that would weaken `rate_limit`.
    ///
    /// Evicting a caller before its bucket has refilled resets it to full,
    /// so the idle TTL must cover a complete refill.
    pub fn validate(&self, rate_limit: &RateLimitConfig) -> Result<(), ConfigError> {
        let minimum = Self::min_idle_ttl_secs(rate_limit);
        if self.idle_ttl_secs < minimum {
            return Err(ConfigError::IdleTtlTooShort {
                value: self.idle_ttl_secs,
                minimum,
            });
        }
        if self.max_tracked_keys < 1 {
            return Err(ConfigError::TooSmall {
                field: "max_tracked_keys",
                value: 0,
            });
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from the process environment, honouring `.env`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let bind_addr = match (lookup("BIND_ADDR"), lookup("PORT")) {
            (Some(addr), _) => addr,
            (None, Some(port)) => format!("0.0.0.0:{}", port.trim()),
            (None, None) => defaults.bind_addr,
        };

        Self {
            bind_addr,
            rate_limit: RateLimitConfig {
                burst_capacity: parse_or(
                    &lookup,
                    "RATE_BURST_CAPACITY",
                    defaults.rate_limit.burst_capacity,
                ),
                sustained_per_minute: parse_or(
                    &lookup,
                    "RATE_PER_MINUTE",
                    defaults.rate_limit.sustained_per_minute,
                ),
                burst_per_second: lookup("RATE_BURST_PER_SECOND")
                    .and_then(|raw| parse_logged("RATE_BURST_PER_SECOND", &raw)),
            },
            eviction: EvictionConfig {
                idle_ttl_secs: parse_or(
                    &lookup,
                    "KEY_IDLE_TTL_SECS",
                    defaults.eviction.idle_ttl_secs,
                ),
                sweep_interval_secs: parse_or(
                    &lookup,
                    "KEY_SWEEP_INTERVAL_SECS",
                    defaults.eviction.sweep_interval_secs,
                ),
                max_tracked_keys: parse_or(
                    &lookup,
                    "MAX_TRACKED_KEYS",
                    defaults.eviction.max_tracked_keys,
                ),
            },
            metrics: MetricsConfig {
                enabled: parse_or(&lookup, "METRICS_ENABLED", defaults.metrics.enabled),
                ..defaults.metrics
            },
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(name)
        .and_then(|raw| parse_logged(name, &raw))
        .unwrap_or(default)
}

fn parse_logged<T: FromStr>(name: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = raw, "Ignoring unparseable value, using default");
            None
        }
    }
}
