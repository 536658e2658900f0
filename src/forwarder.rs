use std::time::Duration;

use sqlx::SqlitePool;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    collector::{Collector, Envelope},
    db::{mark_readings_delivered, select_pending_readings},
};

pub const DEFAULT_BATCH_SIZE: u32 = 10;

pub const DEFAULT_FORWARD_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ForwarderSettings {
    pub api_key: String,

    pub device_id: String,

    pub batch_size: u32,

    pub interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was pending.
    Idle,
    /// The collector accepted this many readings and they are now delivered.
    Delivered(usize),
    /// Selection, delivery or acknowledgement failed; the rows stay pending.
    Failed,
}

/// Drains pending readings to the remote collector on a fixed interval.
///
/// There is no backoff and no cap on the backlog: every tick retries from
/// the oldest pending reading.
pub struct Forwarder<C> {
    pool: SqlitePool,
    collector: C,
    settings: ForwarderSettings,
}

impl<C: Collector> Forwarder<C> {
    pub fn new(pool: SqlitePool, collector: C, settings: ForwarderSettings) -> Self {
        Self {
            pool,
            collector,
            settings,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            batch_size = self.settings.batch_size,
            interval = ?self.settings.interval,
            "forwarder started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Ticks run to completion; delivery is bounded by the client timeout.
            self.tick().await;
        }

        info!("forwarder stopped");
    }

    pub async fn tick(&self) -> TickOutcome {
        let batch = match select_pending_readings(&self.pool, self.settings.batch_size).await {
            Ok(batch) => batch,
            Err(err) => {
                error!(error = ?err, "forward tick aborted");
                return TickOutcome::Failed;
            }
        };

        if batch.is_empty() {
            debug!("no pending readings");
            return TickOutcome::Idle;
        }

        let envelope = Envelope::new(&self.settings.api_key, &self.settings.device_id, &batch);
        if let Err(err) = self.collector.deliver(&envelope).await {
            warn!(pending = batch.len(), "{err}");
            return TickOutcome::Failed;
        }

        let ids: Vec<i64> = batch.iter().map(|r| r.id).collect();
        match mark_readings_delivered(&self.pool, &ids).await {
            Ok(_) => {
                info!(count = ids.len(), "readings delivered to collector");
                TickOutcome::Delivered(ids.len())
            }
            Err(err) => {
                // The collector already has these; they will be sent again next tick.
                error!(count = ids.len(), error = ?err, "delivered batch left pending");
                TickOutcome::Failed
            }
        }
    }
}
