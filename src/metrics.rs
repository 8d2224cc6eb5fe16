// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for admission decisions.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Decision counters and store gauge, registered on a private registry.
pub struct GuardMetrics {
    registry: Registry,
    decisions: IntCounterVec,
    tracked_keys: IntGauge,
}

impl GuardMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let decisions = IntCounterVec::new(
            Opts::new(
                "admission_decisions_total",
                "Requests to /security by outcome",
            ),
            &["outcome"],
        )?;
        let tracked_keys = IntGauge::new(
            "admission_tracked_keys",
            "Callers with live usage state",
        )?;

        registry.register(Box::new(decisions.clone()))?;
        registry.register(Box::new(tracked_keys.clone()))?;

        Ok(Self {
            registry,
            decisions,
            tracked_keys,
        })
    }

    /// Count one request with the given outcome label.
    pub fn record(&self, outcome: &str) {
        self.decisions.with_label_values(&[outcome]).inc();
    }

    pub fn set_tracked_keys(&self, count: usize) {
        self.tracked_keys.set(count as i64);
    }

    pub fn decisions(&self, outcome: &str) -> u64 {
        self.decisions.with_label_values(&[outcome]).get()
    }

    /// Render all metrics in the text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}
