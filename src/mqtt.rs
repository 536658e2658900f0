use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    actuation::ControlPublisher,
    error::{RelayError, Result},
    ingest::IngestListener,
};

const REQUEST_CAPACITY: usize = 64;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub host: String,

    pub port: u16,

    pub client_id: String,

    pub keep_alive: Duration,

    pub username: Option<String>,

    pub password: Option<String>,
}

pub fn connect(settings: &BrokerSettings) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
    options.set_keep_alive(settings.keep_alive);

    if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
        options.set_credentials(username, password);
    }

    AsyncClient::new(options, REQUEST_CAPACITY)
}

/// Publishes control commands through the broker session's request queue.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

impl ControlPublisher for MqttPublisher {
    fn publish_control(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        // The event loop is driven by the same task that calls this, so never await here.
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| RelayError::Actuation(e.to_string()))
    }
}

/// Drives the broker session and feeds every telemetry message to `listener`
/// in arrival order until `shutdown` fires.
pub async fn run_ingest<P: ControlPublisher>(
    client: &AsyncClient,
    mut eventloop: EventLoop,
    telemetry_topic: &str,
    listener: &IngestListener<P>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("connected to broker");
                match client.try_subscribe(telemetry_topic, QoS::AtMostOnce) {
                    Ok(()) => info!(topic = telemetry_topic, "subscribed to telemetry"),
                    Err(err) => error!(topic = telemetry_topic, "failed to subscribe: {err}"),
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if rumqttc::matches(&publish.topic, telemetry_topic) {
                    listener.handle_message(&publish.payload).await;
                } else {
                    debug!(topic = %publish.topic, "ignoring message on unexpected topic");
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!("broker connection error: {err}");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(RECONNECT_DELAY) => {}
                }
            }
        }
    }

    disconnect(client, &mut eventloop).await;
}

async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    if client.try_disconnect().is_err() {
        return;
    }

    let flushed = timeout(DISCONNECT_GRACE, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;

    if flushed.is_err() {
        debug!("broker disconnect timed out");
    }
}
