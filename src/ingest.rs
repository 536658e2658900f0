use chrono::Utc;
use chrono_tz::Tz;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::{
    actuation::{Actuator, ControlPublisher},
    db::insert_reading,
    error::{RelayError, Result},
    telemetry::{NewReading, decode_payload},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Decode,
    Validation,
    Persistence,
    /// A failure kind the ingest path does not produce itself.
    Unexpected,
}

impl From<&RelayError> for DropReason {
    fn from(err: &RelayError) -> Self {
        match err {
            RelayError::Decode(_) => DropReason::Decode,
            RelayError::Validation(_) => DropReason::Validation,
            RelayError::Persistence { .. } => DropReason::Persistence,
            RelayError::Actuation(_) | RelayError::Delivery(_) => DropReason::Unexpected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Persisted { id: i64, command: String },
    Dropped(DropReason),
}

/// Turns inbound telemetry into stored readings, issuing a control command
/// for each one on the way.
///
/// Messages are handled one at a time by the caller; nothing here waits on
/// the forwarder or the remote collector.
pub struct IngestListener<P> {
    pool: SqlitePool,
    actuator: Actuator<P>,
    timezone: Tz,
}

impl<P: ControlPublisher> IngestListener<P> {
    pub fn new(pool: SqlitePool, actuator: Actuator<P>, timezone: Tz) -> Self {
        Self {
            pool,
            actuator,
            timezone,
        }
    }

    /// Never fails: every error is logged here and reported as a drop.
    pub async fn handle_message(&self, payload: &[u8]) -> IngestOutcome {
        debug!(payload = %String::from_utf8_lossy(payload), "telemetry received");

        match self.process(payload).await {
            Ok((id, reading)) => {
                info!(
                    id,
                    client_id = %reading.client_id,
                    temperature = reading.temperature,
                    humidity = reading.humidity,
                    command = %reading.command,
                    "reading persisted"
                );
                IngestOutcome::Persisted {
                    id,
                    command: reading.command,
                }
            }
            Err(err) => {
                let reason = DropReason::from(&err);
                match reason {
                    DropReason::Validation => warn!("{err}"),
                    _ => error!(?reason, error = ?err, "dropping message"),
                }
                IngestOutcome::Dropped(reason)
            }
        }
    }

    async fn process(&self, payload: &[u8]) -> Result<(i64, NewReading)> {
        let decoded = decode_payload(payload)?;
        if decoded.repaired {
            info!(client_id = %decoded.client_id, "telemetry decoded after quoting bare tokens");
        }

        let (Some(temperature), Some(humidity)) = (decoded.temperature, decoded.humidity) else {
            return Err(RelayError::Validation("missing temperature or humidity"));
        };

        let command = self.actuator.decide(temperature);
        let command = if self.actuator.actuate(&decoded.client_id, command) {
            command.as_str().to_owned()
        } else {
            decoded.fan_status
        };

        let reading = NewReading {
            client_id: decoded.client_id,
            temperature,
            humidity,
            command,
            timestamp: Utc::now().with_timezone(&self.timezone).fixed_offset(),
        };

        let id = insert_reading(&self.pool, &reading).await?;

        Ok((id, reading))
    }
}
