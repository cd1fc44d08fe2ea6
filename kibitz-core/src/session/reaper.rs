//! Background eviction of idle sessions

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::registry::SessionRegistry;
use crate::config::ReaperConfig;

/// Periodically disposes sessions nobody has used for a while
pub struct IdleReaper {
    registry: Arc<SessionRegistry>,
    config: ReaperConfig,
}

impl IdleReaper {
    pub fn new(registry: Arc<SessionRegistry>, config: ReaperConfig) -> Self {
        Self { registry, config }
    }

    /// Run one sweep now, returning the evicted session ids
    pub async fn sweep(&self) -> Vec<String> {
        self.registry
            .sweep_idle(Instant::now(), self.config.idle_timeout)
            .await
    }

    /// Run the sweep loop on a background task until `shutdown` fires
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: CancellationToken) {
        let period = self.config.sweep_interval.max(Duration::from_millis(1));
        // First tick one period out; a freshly started manager has nothing to reap
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            idle_timeout_secs = self.config.idle_timeout.as_secs(),
            sweep_interval_secs = period.as_secs(),
            "Idle reaper started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Idle reaper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = self.sweep().await;
                    if !evicted.is_empty() {
                        info!(count = evicted.len(), sessions = ?evicted, "Idle sessions evicted");
                    }
                }
            }
        }

        info!("Idle reaper stopped");
    }
}
