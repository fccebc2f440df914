//! Background expiry sweeper
//!
//! Periodically releases lapsed checkout holds so abandoned checkouts never
//! strand capacity. The same sweep is also reachable on demand through the
//! admin API.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::engine::ReservationEngine;

/// Spawn the sweep loop on the current runtime
pub fn spawn_sweeper(engine: Arc<ReservationEngine>, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        // The first tick fires immediately; skip straight to the cadence
        interval.tick().await;
        info!(interval_secs, "expiry sweeper started");
        loop {
            interval.tick().await;
            if let Err(e) = engine.sweep_expired().await {
                error!(error = %e, "expiry sweep failed");
            }
        }
    })
}
