//! Storage layer for adtflow.
//!
//! Visits and encounters are append/update-only: records are voided with an
//! audit reason, never hard-deleted.

mod schema;
mod encounters;
mod locations;
mod patients;
mod providers;
mod visits;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed timestamp in {column}: {value}")]
    Timestamp { column: &'static str, value: String },

    #[error("Record not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Serialize a timestamp for a TEXT column.
pub(crate) fn ts_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse a timestamp read from a TEXT column.
pub(crate) fn ts_from_sql(column: &'static str, value: String) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| DbError::Timestamp { column, value })
}

/// Parse a nullable timestamp read from a TEXT column.
pub(crate) fn opt_ts_from_sql(
    column: &'static str,
    value: Option<String>,
) -> DbResult<Option<DateTime<Utc>>> {
    value.map(|v| ts_from_sql(column, v)).transpose()
}
