// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for admission guard attack simulation.
//!
//! Attacks are replayed against the limiter on a simulated clock, so a
//! minute of traffic runs in microseconds and outcomes are deterministic.

pub mod attacks;
pub mod generators;
pub mod metrics;
