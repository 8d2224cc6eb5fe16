// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Token bucket rate limiter keyed on caller identity.
//!
//! Every caller owns a bucket holding up to `burst_capacity` tokens that
//! refills continuously at `sustained_per_minute`. An admitted request
//! consumes one token. When `burst_per_second` is configured a second,
//! smaller bucket refilled over one second is checked as well, and a
//! request must find a token in both.
//!
//! State lives in a [`LimiterStore`]. The store's map is only locked long
//! enough to find or insert a caller's entry; the refill and consume steps
//! run under that caller's own mutex, so callers never wait on each other.
//! Callers idle for longer than `idle_ttl_secs` are swept out. A new caller
//! meeting a full store triggers at most one extra sweep per second; the
//! rest are refused without scanning the store.

use crate::config::{ConfigError, EvictionConfig, RateLimitConfig};
use crate::events::{SecurityEvent, SecurityEventSink, TracingEventSink};
use crate::identity::RateKey;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

/// A bucket holding at least this much counts as holding one token.
const TOKEN_EPSILON: f64 = 1e-9;

/// Minimum spacing between sweeps triggered by a full store.
const LAZY_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Faults inside the limiter. Never returned to callers: they surface as a
/// [`DecisionReason::ValidationError`] decision.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimiterError {
    #[error("rate key is empty")]
    EmptyKey,

    #[error("limiter store is full ({capacity} tracked keys)")]
    StoreFull { capacity: usize },
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    Admitted,
    RateLimited,
    ValidationError,
}

impl DecisionReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Admitted => "ADMITTED",
            Self::RateLimited => "RATE_LIMITED",
            Self::ValidationError => "VALIDATION_ERROR",
        }
    }

    /// Confidence reported alongside the decision.
    pub fn confidence(&self) -> f64 {
        match self {
            Self::Admitted => 0.95,
            Self::RateLimited => 0.99,
            Self::ValidationError => 0.8,
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub admitted: bool,
    pub reason: DecisionReason,
    /// Seconds until one unit of capacity is available again (denials only).
    pub retry_after_secs: Option<u64>,
}

impl Decision {
    pub fn admit() -> Self {
        Self {
            admitted: true,
            reason: DecisionReason::Admitted,
            retry_after_secs: None,
        }
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            admitted: false,
            reason: DecisionReason::RateLimited,
            retry_after_secs: Some(retry_after_secs),
        }
    }

    pub fn validation_error() -> Self {
        Self {
            admitted: false,
            reason: DecisionReason::ValidationError,
            retry_after_secs: None,
        }
    }
}

/// Continuously refilling token bucket.
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_ms: f64,
}

impl TokenBucket {
    fn full(capacity: u32, refill_per_ms: f64) -> Self {
        Self {
            tokens: capacity as f64,
            capacity: capacity as f64,
            refill_per_ms,
        }
    }

    fn refill(&mut self, elapsed: Duration) {
        let added = elapsed.as_secs_f64() * 1000.0 * self.refill_per_ms;
        self.tokens = (self.tokens + added).clamp(0.0, self.capacity);
    }

    fn has_token(&self) -> bool {
        self.tokens >= 1.0 - TOKEN_EPSILON
    }

    fn consume(&mut self) {
        self.tokens = (self.tokens - 1.0).max(0.0);
    }

    /// Whole seconds until the bucket holds one token, rounded up.
    fn retry_after_secs(&self) -> u64 {
        let missing = (1.0 - self.tokens).max(0.0);
        let secs = (missing / self.refill_per_ms / 1000.0).ceil();
        (secs as u64).max(1)
    }
}

/// Per-caller usage record.
#[derive(Debug, Clone)]
pub struct UsageState {
    sustained: TokenBucket,
    per_second: Option<TokenBucket>,
    last_refill: Instant,
}

impl UsageState {
    fn new(config: &RateLimitConfig, now: Instant) -> Self {
        Self {
            sustained: TokenBucket::full(config.burst_capacity, config.refill_per_ms()),
            per_second: config
                .burst_per_second
                .map(|cap| TokenBucket::full(cap, cap as f64 / 1000.0)),
            last_refill: now,
        }
    }

    /// Tokens currently held by the sustained bucket.
    pub fn tokens(&self) -> f64 {
        self.sustained.tokens
    }

    /// Tokens currently held by the per-second bucket, if configured.
    pub fn per_second_tokens(&self) -> Option<f64> {
        self.per_second.as_ref().map(|b| b.tokens)
    }

    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }

    /// Refill for the time since the last call. A `now` that lies before
    /// the last refill adds nothing and leaves the refill mark in place.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.sustained.refill(elapsed);
        if let Some(bucket) = self.per_second.as_mut() {
            bucket.refill(elapsed);
        }
        self.last_refill = self.last_refill.max(now);
    }

    /// Refill, then consume from every bucket if every bucket has a token.
    /// Returns the retry delay on denial.
    fn try_acquire(&mut self, now: Instant) -> Result<(), u64> {
        self.refill(now);

        let buckets = std::iter::once(&self.sustained).chain(self.per_second.as_ref());
        let retry_after = buckets
            .filter(|b| !b.has_token())
            .map(TokenBucket::retry_after_secs)
            .max();

        if let Some(secs) = retry_after {
            return Err(secs);
        }

        self.sustained.consume();
        if let Some(bucket) = self.per_second.as_mut() {
            bucket.consume();
        }
        Ok(())
    }
}

/// Shared mapping from caller to usage state.
#[derive(Debug, Default)]
pub struct LimiterStore {
    states: DashMap<RateKey, Arc<Mutex<UsageState>>>,
}

impl LimiterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked callers.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn contains(&self, key: &RateKey) -> bool {
        self.states.contains_key(key)
    }

    /// Snapshot of a caller's state.
    pub fn snapshot(&self, key: &RateKey) -> Option<UsageState> {
        let state = self.states.get(key).map(|entry| Arc::clone(entry.value()))?;
        let snapshot = state.lock().clone();
        Some(snapshot)
    }

    fn get(&self, key: &RateKey) -> Option<Arc<Mutex<UsageState>>> {
        self.states.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn get_or_insert_with<F>(&self, key: &RateKey, init: F) -> Arc<Mutex<UsageState>>
    where
        F: FnOnce() -> UsageState,
    {
        let entry = self
            .states
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(init())));
        Arc::clone(entry.value())
    }

    /// Drop callers idle for at least `ttl`. Entries a decision is holding
    /// are always kept. Returns the number removed.
    fn evict_idle(&self, now: Instant, ttl: Duration) -> usize {
        let before = self.states.len();
        self.states.retain(|_, state| {
            // Handles are only cloned under the shard lock `retain` holds,
            // so a count of one means nobody is mid-decision.
            Arc::strong_count(state) > 1
                || now.saturating_duration_since(state.lock().last_refill) < ttl
        });
        before.saturating_sub(self.states.len())
    }
}

/// Thread-safe admission engine.
pub struct RateLimiter {
    config: RateLimitConfig,
    eviction: EvictionConfig,
    store: Arc<LimiterStore>,
    sink: Arc<dyn SecurityEventSink>,
    last_lazy_sweep: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter with a fresh store that logs events via tracing.
    pub fn new(config: RateLimitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let eviction = EvictionConfig::default();
        eviction.validate(&config)?;
        Ok(Self {
            config,
            eviction,
            store: Arc::new(LimiterStore::new()),
            sink: Arc::new(TracingEventSink),
            last_lazy_sweep: Mutex::new(None),
        })
    }

    /// Replace the eviction settings, checked against the rate policy.
    pub fn with_eviction(mut self, eviction: EvictionConfig) -> Result<Self, ConfigError> {
        eviction.validate(&self.config)?;
        self.eviction = eviction;
        Ok(self)
    }

    pub fn with_store(mut self, store: Arc<LimiterStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn SecurityEventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<LimiterStore> {
        &self.store
    }

    /// Number of callers currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }

    /// Decide whether `key` may proceed now.
    pub fn check(&self, key: &RateKey) -> Decision {
        self.check_at(key, Instant::now())
    }

    /// Decide whether `key` may proceed at `now`.
    ///
    /// Never fails: internal faults produce a validation-error decision.
    pub fn check_at(&self, key: &RateKey, now: Instant) -> Decision {
        let decision = match self.try_check(key, now) {
            Ok(decision) => decision,
            Err(err) => {
                error!(key = %key, error = %err, "Validation error");
                return Decision::validation_error();
            }
        };

        if let Some(retry_after_secs) = decision.retry_after_secs {
            debug!(key = %key, retry_after_secs, "Rate limit exceeded");
            self.sink.emit(SecurityEvent::rate_limit_block(key));
        }

        decision
    }

    fn try_check(&self, key: &RateKey, now: Instant) -> Result<Decision, LimiterError> {
        if key.is_empty() {
            return Err(LimiterError::EmptyKey);
        }

        let state = match self.store.get(key) {
            Some(state) => state,
            None => {
                self.ensure_capacity(now)?;
                self.store.get_or_insert_with(key, || {
                    debug!(
                        key = %key,
                        burst_capacity = self.config.burst_capacity,
                        sustained_per_minute = self.config.sustained_per_minute,
                        "Creating usage state"
                    );
                    UsageState::new(&self.config, now)
                })
            }
        };

        let outcome = state.lock().try_acquire(now);
        Ok(match outcome {
            Ok(()) => Decision::admit(),
            Err(retry_after_secs) => Decision::rate_limited(retry_after_secs),
        })
    }

    /// Make room for a new caller, sweeping idle state if the store is full.
    /// The bound is soft: concurrent first requests may overshoot it slightly.
    fn ensure_capacity(&self, now: Instant) -> Result<(), LimiterError> {
        let capacity = self.eviction.max_tracked_keys;
        if self.store.len() < capacity {
            return Ok(());
        }
        if self.claim_lazy_sweep(now) {
            self.sweep_at(now);
            if self.store.len() < capacity {
                return Ok(());
            }
        }
        Err(LimiterError::StoreFull { capacity })
    }

    /// True for the one caller allowed to sweep within `LAZY_SWEEP_INTERVAL`.
    fn claim_lazy_sweep(&self, now: Instant) -> bool {
        let Some(mut last) = self.last_lazy_sweep.try_lock() else {
            return false;
        };
        let previous = *last;
        if previous.is_some_and(|at| now.saturating_duration_since(at) < LAZY_SWEEP_INTERVAL) {
            return false;
        }
        *last = Some(now);
        true
    }

    /// Remove callers idle for longer than the configured TTL.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let removed = self.store.evict_idle(now, self.eviction.idle_ttl());
        if removed > 0 {
            info!(removed, remaining = self.store.len(), "Evicted idle usage state");
        }
        removed
    }
}
