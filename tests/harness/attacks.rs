// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Attack simulation patterns for security testing.

use std::time::Duration;

/// How an attacker presents its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    /// No `userId`; keyed on origin address
    Anonymous,
    /// A fixed pool of claimed identities, used round-robin
    Claimed,
    /// A fresh `userId` on every request
    Rotating,
}

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of requests to send
    pub total_requests: usize,
    /// Simulated requests per second
    pub requests_per_second: f64,
    /// Number of origin addresses
    pub unique_ips: usize,
    /// Size of the claimed identity pool
    pub unique_users: usize,
    pub identity: IdentityMode,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            requests_per_second: 10.0,
            unique_ips: 1,
            unique_users: 1,
            identity: IdentityMode::Claimed,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// One identity flooding from one address.
    pub fn single_user_flood() -> Self {
        Self {
            total_requests: 200,
            requests_per_second: 100.0,
            ..Default::default()
        }
    }

    /// No identity claimed, one address.
    pub fn anonymous_flood() -> Self {
        Self {
            total_requests: 200,
            requests_per_second: 100.0,
            identity: IdentityMode::Anonymous,
            ..Default::default()
        }
    }

    /// Many addresses without identity, low rate each.
    pub fn distributed_attack() -> Self {
        Self {
            total_requests: 500,
            requests_per_second: 50.0,
            unique_ips: 100,
            identity: IdentityMode::Anonymous,
            ..Default::default()
        }
    }

    /// One address claiming a new identity on every request.
    pub fn identity_rotation() -> Self {
        Self {
            total_requests: 200,
            requests_per_second: 100.0,
            identity: IdentityMode::Rotating,
            ..Default::default()
        }
    }

    /// Stay just under the sustained rate.
    pub fn slow_drip() -> Self {
        Self {
            total_requests: 100,
            requests_per_second: 0.5, // 30/min < 31 limit
            ..Default::default()
        }
    }

    /// Gap between consecutive simulated requests.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second)
    }

    /// Calculate expected duration for the attack.
    pub fn expected_duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_requests as f64 / self.requests_per_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_duration() {
        let config = AttackConfig::slow_drip();
        assert_eq!(config.interval(), Duration::from_secs(2));
        assert_eq!(config.expected_duration(), Duration::from_secs(200));
    }
}
