use chrono::{DateTime, FixedOffset};

/// A reading that has passed validation but has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub client_id: String,

    pub temperature: f64,

    pub humidity: f64,

    pub command: String,

    pub timestamp: DateTime<FixedOffset>,
}

/// A reading as persisted in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub id: i64,

    pub client_id: String,

    pub temperature: f64,

    pub humidity: f64,

    pub command: String,

    pub timestamp: DateTime<FixedOffset>,

    pub delivered: bool,
}
