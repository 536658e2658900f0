use tracing::{error, info};

use crate::{
    error::{RelayError, Result},
    telemetry::{Command, ControlMessage},
};

/// Something that can hand a control payload to the broker.
///
/// Implementations must not wait for the broker to acknowledge; the ingest
/// path calls this inline and must keep moving.
pub trait ControlPublisher {
    fn publish_control(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// `ON` strictly above `threshold`, otherwise `OFF`.
pub fn decide(temperature: f64, threshold: f64) -> Command {
    if temperature > threshold {
        Command::On
    } else {
        Command::Off
    }
}

#[derive(Debug)]
pub struct Actuator<P> {
    publisher: P,
    control_topic: String,
    threshold: f64,
}

impl<P: ControlPublisher> Actuator<P> {
    pub fn new(publisher: P, control_topic: impl Into<String>, threshold: f64) -> Self {
        Self {
            publisher,
            control_topic: control_topic.into(),
            threshold,
        }
    }

    pub fn decide(&self, temperature: f64) -> Command {
        decide(temperature, self.threshold)
    }

    /// Publishes `command` for `client_id`. Returns whether the publish went out.
    pub fn actuate(&self, client_id: &str, command: Command) -> bool {
        match self.try_actuate(client_id, command) {
            Ok(()) => {
                info!(client_id, %command, topic = %self.control_topic, "control command sent");
                true
            }
            Err(err) => {
                error!(client_id, %command, "{err}");
                false
            }
        }
    }

    fn try_actuate(&self, client_id: &str, command: Command) -> Result<()> {
        let message = ControlMessage {
            target_client_id: client_id,
            command,
        };
        let payload =
            serde_json::to_vec(&message).map_err(|e| RelayError::Actuation(e.to_string()))?;

        self.publisher.publish_control(&self.control_topic, payload)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;

    /// Records every publish; flip `fail` to simulate a broker outage.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingPublisher {
        pub sent: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
        pub fail: Arc<AtomicBool>,
    }

    impl ControlPublisher for RecordingPublisher {
        fn publish_control(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(RelayError::Actuation("request channel full".to_owned()));
            }
            let body = serde_json::from_slice(&payload).unwrap();
            self.sent.lock().unwrap().push((topic.to_owned(), body));
            Ok(())
        }
    }

    #[test]
    fn threshold_comparison_is_strict() {
        assert_eq!(decide(30.1, 30.0), Command::On);
        assert_eq!(decide(30.0, 30.0), Command::Off);
        assert_eq!(decide(-5.0, 30.0), Command::Off);
    }

    #[test]
    fn actuate_publishes_control_message() {
        let publisher = RecordingPublisher::default();
        let actuator = Actuator::new(publisher.clone(), "fan/control", 30.0);

        let command = actuator.decide(35.0);
        assert!(actuator.actuate("dev-1", command));

        let sent = publisher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "fan/control");
        assert_eq!(
            sent[0].1,
            serde_json::json!({"target_client_id": "dev-1", "command": "ON"})
        );
    }

    #[test]
    fn actuate_reports_publish_failure() {
        let publisher = RecordingPublisher::default();
        publisher.fail.store(true, Ordering::SeqCst);
        let actuator = Actuator::new(publisher.clone(), "fan/control", 30.0);

        assert!(!actuator.actuate("dev-1", Command::Off));
        assert!(publisher.sent.lock().unwrap().is_empty());
    }
}
