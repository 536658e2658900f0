use std::path::PathBuf;

use chrono_tz::Tz;
use clap::Parser;
use edge_relay::{
    collector::DEFAULT_DEVICE_ID,
    forwarder::{DEFAULT_BATCH_SIZE, DEFAULT_FORWARD_INTERVAL},
};
use reqwest::Url;
use tracing::Level;

#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long, env = "DATABASE_PATH", default_value = "data/sensor_data.db")]
    pub database_path: PathBuf,

    #[arg(long, env = "TZ", default_value = "UTC")]
    pub timezone: Tz,

    #[arg(long, env = "MQTT_HOST")]
    pub mqtt_host: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    pub mqtt_port: u16,

    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "edge-relay")]
    pub mqtt_client_id: String,

    #[arg(long, env = "MQTT_KEEP_ALIVE_SECS", default_value_t = 60)]
    pub mqtt_keep_alive_secs: u64,

    #[arg(long, env = "MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    #[arg(long, env = "TELEMETRY_TOPIC", default_value = "sensor/data")]
    pub telemetry_topic: String,

    #[arg(long, env = "CONTROL_TOPIC", default_value = "fan/control")]
    pub control_topic: String,

    #[arg(long, env = "TEMPERATURE_THRESHOLD", default_value_t = 30.0)]
    pub temperature_threshold: f64,

    #[arg(long, env = "COLLECTOR_URL")]
    pub collector_url: Url,

    #[arg(long, env = "COLLECTOR_API_KEY", hide_env_values = true)]
    pub collector_api_key: String,

    #[arg(long, env = "COLLECTOR_TIMEOUT_SECS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub collector_timeout_secs: u64,

    #[arg(long, env = "DEVICE_ID", default_value = DEFAULT_DEVICE_ID)]
    pub device_id: String,

    #[arg(long, env = "BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: u32,

    #[arg(long, env = "FORWARD_INTERVAL_SECS", default_value_t = DEFAULT_FORWARD_INTERVAL.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub forward_interval_secs: u64,

    #[arg(long, env = "LOG_LEVEL", default_value_t = Level::INFO)]
    pub log_level: Level,

    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,
}
