// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Admission Guard Service
//!
//! Serves `POST /security`, which rate-limits each caller with a token
//! bucket before stripping `<script>` blocks from the submitted input.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (or a `.env` file):
//!
//! - `PORT`: Listening port (default: 3000), or `BIND_ADDR` for a full address
//! - `RATE_BURST_CAPACITY`: Maximum burst per caller (default: 10)
//! - `RATE_PER_MINUTE`: Sustained requests per minute per caller (default: 31)
//! - `RATE_BURST_PER_SECOND`: Optional cap within any one second
//! - `KEY_IDLE_TTL_SECS`: Idle time before a caller is forgotten (default: 300)
//! - `KEY_SWEEP_INTERVAL_SECS`: Eviction sweep interval (default: 60)
//! - `MAX_TRACKED_KEYS`: Upper bound on tracked callers (default: 100000)
//! - `METRICS_ENABLED`: Serve Prometheus metrics (default: true)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use admission_guard::{
    config::Config,
    handlers::{router, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        burst_capacity = config.rate_limit.burst_capacity,
        sustained_per_minute = config.rate_limit.sustained_per_minute,
        burst_per_second = ?config.rate_limit.burst_per_second,
        idle_ttl_secs = config.eviction.idle_ttl_secs,
        max_tracked_keys = config.eviction.max_tracked_keys,
        "Starting admission guard"
    );

    let state = Arc::new(AppState::new(config.clone())?);

    // Spawn eviction sweep
    let sweep_state = state.clone();
    let sweep_interval = config.eviction.sweep_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            sweep_state.limiter.sweep();
        }
    });

    let app = router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
