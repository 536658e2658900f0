use std::{path::Path, time::Duration};

use anyhow::{Context as _, Result};
use sqlx::{
    QueryBuilder, Row, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
};

use crate::{
    error::RelayError,
    telemetry::{NewReading, Reading},
};

const MAX_CONNECTIONS: u32 = 4;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub total: i64,

    pub pending: i64,

    pub delivered: i64,

    pub oldest_pending: Option<Reading>,
}

/// Opens (creating if needed) the reading store at `path` and applies the schema.
///
/// The pool is cheap to clone; the ingest and forward tasks each hold a clone
/// and SQLite's WAL mode plus the busy timeout serialize their writes.
pub async fn new_pool(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory: {parent:?}"))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database: {path:?}"))?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    Ok(pool)
}

pub async fn insert_reading(pool: &SqlitePool, reading: &NewReading) -> Result<i64, RelayError> {
    let result = sqlx::query(
        r#"
        INSERT INTO readings (client_id, temperature, humidity, command, timestamp, delivered)
        VALUES (?, ?, ?, ?, ?, 0)
        "#,
    )
    .bind(&reading.client_id)
    .bind(reading.temperature)
    .bind(reading.humidity)
    .bind(&reading.command)
    .bind(reading.timestamp)
    .execute(pool)
    .await
    .map_err(RelayError::persistence("failed to insert reading"))?;

    Ok(result.last_insert_rowid())
}

/// Returns up to `limit` undelivered readings, oldest first.
pub async fn select_pending_readings(
    pool: &SqlitePool,
    limit: u32,
) -> Result<Vec<Reading>, RelayError> {
    let rows = sqlx::query(
        r#"
        SELECT id, client_id, temperature, humidity, command, timestamp, delivered
        FROM readings
        WHERE delivered = 0
        ORDER BY id ASC
        LIMIT ?
        "#,
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await
    .map_err(RelayError::persistence("failed to select pending readings"))?;

    rows.iter()
        .map(row_to_reading)
        .collect::<Result<_, _>>()
        .map_err(RelayError::persistence("failed to decode pending reading"))
}

/// Flags exactly `ids` as delivered in one transaction.
///
/// Rows already delivered are left alone, so repeating a call is harmless.
/// Returns how many rows changed state.
pub async fn mark_readings_delivered(pool: &SqlitePool, ids: &[i64]) -> Result<u64, RelayError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(RelayError::persistence("failed to begin transaction"))?;

    let mut query = QueryBuilder::<Sqlite>::new(
        "UPDATE readings SET delivered = 1 WHERE delivered = 0 AND id IN (",
    );
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let result = query
        .build()
        .execute(&mut *tx)
        .await
        .map_err(RelayError::persistence("failed to mark readings delivered"))?;

    tx.commit()
        .await
        .map_err(RelayError::persistence("failed to commit transaction"))?;

    Ok(result.rows_affected())
}

pub async fn get_store_stats(pool: &SqlitePool) -> Result<StoreStats, RelayError> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(CASE WHEN delivered = 0 THEN 1 ELSE 0 END), 0) AS pending,
            COALESCE(SUM(CASE WHEN delivered = 1 THEN 1 ELSE 0 END), 0) AS delivered
        FROM readings
        "#,
    )
    .fetch_one(pool)
    .await
    .map_err(RelayError::persistence("failed to count readings"))?;

    let oldest_pending = select_pending_readings(pool, 1).await?.into_iter().next();

    let count = |column: &str| -> Result<i64, RelayError> {
        row.try_get(column)
            .map_err(RelayError::persistence("failed to decode reading counts"))
    };

    Ok(StoreStats {
        total: count("total")?,
        pending: count("pending")?,
        delivered: count("delivered")?,
        oldest_pending,
    })
}

fn row_to_reading(row: &SqliteRow) -> Result<Reading, sqlx::Error> {
    Ok(Reading {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        temperature: row.try_get("temperature")?,
        humidity: row.try_get("humidity")?,
        command: row.try_get("command")?,
        timestamp: row.try_get("timestamp")?,
        delivered: row.try_get("delivered")?,
    })
}
