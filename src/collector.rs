use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;

use crate::{
    error::{RelayError, Result},
    telemetry::Reading,
};

pub const DEFAULT_DEVICE_ID: &str = "edge-device-001";

/// Batch body expected by the remote collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub api_key: String,

    pub device_id: String,

    pub records: Vec<EnvelopeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeRecord {
    pub id: i64,

    pub client_id: String,

    pub temperature: f64,

    pub humidity: f64,

    pub fan_status: String,

    pub timestamp: DateTime<FixedOffset>,
}

impl From<&Reading> for EnvelopeRecord {
    fn from(reading: &Reading) -> Self {
        Self {
            id: reading.id,
            client_id: reading.client_id.clone(),
            temperature: reading.temperature,
            humidity: reading.humidity,
            fan_status: reading.command.clone(),
            timestamp: reading.timestamp,
        }
    }
}

impl Envelope {
    pub fn new(api_key: &str, device_id: &str, readings: &[Reading]) -> Self {
        Self {
            api_key: api_key.to_owned(),
            device_id: device_id.to_owned(),
            records: readings.iter().map(EnvelopeRecord::from).collect(),
        }
    }
}

#[async_trait]
pub trait Collector: Send + Sync {
    /// `Ok` only when the collector acknowledged the whole batch.
    async fn deliver(&self, envelope: &Envelope) -> Result<()>;
}

pub fn is_accepted(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200..=202)
}

#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: Client,
    url: Url,
}

impl HttpCollector {
    pub fn new(url: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl Collector for HttpCollector {
    async fn deliver(&self, envelope: &Envelope) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(envelope)
            .send()
            .await
            .map_err(|e| RelayError::Delivery(e.to_string()))?;

        let status = response.status();
        if is_accepted(status) {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(RelayError::Delivery(format!("HTTP {status}: {body}")))
    }
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt as _, AsyncWriteExt as _},
        net::{TcpListener, TcpStream},
    };

    use super::*;

    async fn local_listener() -> (TcpListener, Url) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api/iot/webhook", listener.local_addr().unwrap());
        (listener, Url::parse(&url).unwrap())
    }

    /// Reads one request head plus its `content-length` body.
    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + body_len {
                return;
            }
        }
    }

    #[test]
    fn accepts_only_200_through_202() {
        assert!(is_accepted(StatusCode::OK));
        assert!(is_accepted(StatusCode::CREATED));
        assert!(is_accepted(StatusCode::ACCEPTED));
        assert!(!is_accepted(StatusCode::NO_CONTENT));
        assert!(!is_accepted(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_accepted(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn envelope_wire_shape() {
        let reading = Reading {
            id: 42,
            client_id: "dev-1".to_owned(),
            temperature: 35.5,
            humidity: 40.0,
            command: "ON".to_owned(),
            timestamp: DateTime::parse_from_rfc3339("2025-06-01T12:00:00+07:00").unwrap(),
            delivered: false,
        };

        let envelope = Envelope::new("secret", DEFAULT_DEVICE_ID, &[reading]);

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            serde_json::json!({
                "apiKey": "secret",
                "deviceId": "edge-device-001",
                "records": [{
                    "id": 42,
                    "clientId": "dev-1",
                    "temperature": 35.5,
                    "humidity": 40.0,
                    "fanStatus": "ON",
                    "timestamp": "2025-06-01T12:00:00+07:00"
                }]
            })
        );
    }

    #[tokio::test]
    async fn unreachable_collector_is_a_delivery_error() {
        let collector = HttpCollector::new(
            Url::parse("http://127.0.0.1:9/api/iot/webhook").unwrap(),
            Duration::from_millis(500),
        )
        .unwrap();
        let envelope = Envelope::new("secret", DEFAULT_DEVICE_ID, &[]);

        let result = collector.deliver(&envelope).await;

        assert!(matches!(result, Err(RelayError::Delivery(_))));
    }

    #[tokio::test]
    async fn silent_collector_times_out_as_delivery_error() {
        let (listener, url) = local_listener().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });
        let collector = HttpCollector::new(url, Duration::from_millis(200)).unwrap();
        let envelope = Envelope::new("secret", DEFAULT_DEVICE_ID, &[]);

        let result = tokio::time::timeout(Duration::from_secs(3), collector.deliver(&envelope))
            .await
            .expect("client timeout did not fire");

        assert!(matches!(result, Err(RelayError::Delivery(_))));
        server.abort();
    }

    #[tokio::test]
    async fn server_error_status_is_a_delivery_error() {
        let (listener, url) = local_listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            stream
                .write_all(
                    b"HTTP/1.1 500 Internal Server Error\r\n\
                      content-length: 4\r\n\
                      connection: close\r\n\r\n\
                      oops",
                )
                .await
                .unwrap();
            stream.shutdown().await.unwrap();
        });
        let collector = HttpCollector::new(url, Duration::from_secs(5)).unwrap();
        let envelope = Envelope::new("secret", DEFAULT_DEVICE_ID, &[]);

        let result = collector.deliver(&envelope).await;

        let Err(RelayError::Delivery(message)) = result else {
            panic!("expected a delivery error, got {result:?}");
        };
        assert!(message.contains("500"), "{message}");
        assert!(message.contains("oops"), "{message}");
        server.await.unwrap();
    }
}
