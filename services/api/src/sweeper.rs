//! services/api/src/sweeper.rs
//!
//! Background task that deletes expired refresh-token records.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use genfuze_core::ports::DatabaseService;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs one sweep immediately and then every `interval` until `cancel` fires.
pub fn spawn_session_sweeper(
    db: Arc<dyn DatabaseService>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Session sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match db.delete_expired_user_sessions(Utc::now()).await {
                        Ok(0) => {}
                        Ok(n) => info!("Swept {} expired refresh tokens", n),
                        Err(e) => error!("Refresh token sweep failed: {}", e),
                    }
                }
            }
        }
    })
}
