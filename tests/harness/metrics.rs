// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Metrics collection for attack simulation results.

use std::collections::HashMap;
use std::time::Duration;

/// Collects metrics during attack simulation.
#[derive(Debug, Default)]
pub struct AttackMetrics {
    /// Count of requests by outcome
    outcomes: HashMap<Outcome, usize>,
    /// Count of requests by rate key
    requests_per_key: HashMap<String, usize>,
    /// Largest retry delay handed out
    max_retry_after_secs: u64,
    /// Latency samples (nanoseconds)
    latencies: Vec<u64>,
}

/// Possible outcomes for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Allowed,
    RateLimited,
    ValidationError,
}

impl AttackMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request outcome.
    pub fn record(
        &mut self,
        outcome: Outcome,
        key: &str,
        retry_after_secs: Option<u64>,
        latency: Duration,
    ) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        *self.requests_per_key.entry(key.to_string()).or_insert(0) += 1;
        if let Some(secs) = retry_after_secs {
            self.max_retry_after_secs = self.max_retry_after_secs.max(secs);
        }
        self.latencies.push(latency.as_nanos() as u64);
    }

    /// Get total request count.
    pub fn total_requests(&self) -> usize {
        self.outcomes.values().sum()
    }

    /// Get count for a specific outcome.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Get block rate (ratio of blocked to total).
    pub fn block_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        let allowed = self.count(Outcome::Allowed);
        (total - allowed) as f64 / total as f64
    }

    /// Get median latency in nanoseconds.
    pub fn median_latency_ns(&self) -> u64 {
        if self.latencies.is_empty() {
            return 0;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();
        sorted[sorted.len() / 2]
    }

    /// Get number of distinct rate keys seen.
    pub fn unique_keys(&self) -> usize {
        self.requests_per_key.len()
    }

    /// Generate a summary report.
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            total_requests: self.total_requests(),
            allowed: self.count(Outcome::Allowed),
            rate_limited: self.count(Outcome::RateLimited),
            validation_errors: self.count(Outcome::ValidationError),
            block_rate: self.block_rate(),
            max_retry_after_secs: self.max_retry_after_secs,
            median_latency_ns: self.median_latency_ns(),
            unique_keys: self.unique_keys(),
        }
    }
}

/// Summary report of attack metrics.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub total_requests: usize,
    pub allowed: usize,
    pub rate_limited: usize,
    pub validation_errors: usize,
    pub block_rate: f64,
    pub max_retry_after_secs: u64,
    pub median_latency_ns: u64,
    pub unique_keys: usize,
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Attack Metrics Report ===")?;
        writeln!(f, "Total Requests:    {}", self.total_requests)?;
        writeln!(f)?;
        writeln!(f, "--- Outcomes ---")?;
        writeln!(f, "Allowed:           {}", self.allowed)?;
        writeln!(f, "Rate Limited:      {}", self.rate_limited)?;
        writeln!(f, "Validation Errors: {}", self.validation_errors)?;
        writeln!(f, "Block Rate:        {:.1}%", self.block_rate * 100.0)?;
        writeln!(f, "Max Retry-After:   {} s", self.max_retry_after_secs)?;
        writeln!(f)?;
        writeln!(f, "--- Latency ---")?;
        writeln!(f, "Median:            {} ns", self.median_latency_ns)?;
        writeln!(f)?;
        writeln!(f, "--- Distribution ---")?;
        writeln!(f, "Unique Keys:       {}", self.unique_keys)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_rate() {
        let mut metrics = AttackMetrics::new();
        for _ in 0..3 {
            metrics.record(Outcome::Allowed, "u1", None, Duration::ZERO);
        }
        for _ in 0..7 {
            metrics.record(Outcome::RateLimited, "u1", Some(2), Duration::ZERO);
        }

        assert!((metrics.block_rate() - 0.7).abs() < 0.01);
        assert_eq!(metrics.report().max_retry_after_secs, 2);
        assert_eq!(metrics.unique_keys(), 1);
    }
}
