//! Edge relay for sensor telemetry.
//!
//! Readings arrive over MQTT, trigger a fan command, and land in a local
//! SQLite store. A separate task forwards pending readings to a remote
//! collector in batches and marks them delivered once the collector accepts
//! them, so the relay keeps working through long collector outages.

pub mod actuation;
pub mod collector;
pub mod db;
pub mod error;
pub mod forwarder;
pub mod ingest;
pub mod logging;
pub mod mqtt;
pub mod telemetry;
