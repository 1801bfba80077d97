//! Periodic removal of stale sessions.

use crate::session::{SessionId, SessionStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Removes sessions past the age ceiling, and finished sessions while the
/// store is over its soft limit.
#[derive(Debug, Clone)]
pub struct ExpirySweeper {
    store: Arc<SessionStore>,
    period: Duration,
    max_age: Duration,
}

impl ExpirySweeper {
    /// Creates a sweeper running every `period`.
    pub fn new(store: Arc<SessionStore>, period: Duration, max_age: Duration) -> Self {
        Self {
            store,
            period,
            max_age,
        }
    }

    /// Runs one sweep now.
    #[instrument(skip(self))]
    pub fn run_once(&self) -> Vec<SessionId> {
        self.store.sweep(Utc::now(), self.max_age)
    }

    /// Sweeps on every period until `cancel` fires. The first sweep happens
    /// one period after start.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately once
            ticker.tick().await;
            info!(period = ?self.period, max_age = ?self.max_age, "Expiry sweeper started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        debug!("Sweep tick");
                        self.run_once();
                    }
                }
            }
            info!("Expiry sweeper stopped");
        })
    }
}
