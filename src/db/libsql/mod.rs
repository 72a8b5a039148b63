//! libSQL backend: one local database file per office.
//!
//! Connections run with `PRAGMA foreign_keys = ON` so the schema's
//! restrict/cascade rules are live; migrations are idempotent and run at
//! startup via [`crate::db::connect_from_config`].

mod office;

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use libsql::Builder;
use rust_decimal::Decimal;

use crate::error::DatabaseError;

pub(crate) const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS persons (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        specialization TEXT,
        license_number TEXT,
        hourly_rate TEXT,
        organization TEXT,
        notes TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    )",
    "CREATE TABLE IF NOT EXISTS cases (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL,
        opening_date TEXT NOT NULL,
        closing_date TEXT,
        deadline_date TEXT NOT NULL,
        client_id INTEGER NOT NULL REFERENCES persons (id) ON DELETE RESTRICT,
        lawyer_id INTEGER NOT NULL REFERENCES persons (id) ON DELETE RESTRICT,
        costs_accrued TEXT NOT NULL DEFAULT '0'
    )",
    "CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        case_id INTEGER NOT NULL REFERENCES cases (id) ON DELETE CASCADE,
        category TEXT NOT NULL,
        title TEXT NOT NULL,
        importance TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS invoices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        number TEXT NOT NULL UNIQUE,
        case_id INTEGER NOT NULL REFERENCES cases (id) ON DELETE RESTRICT,
        client_id INTEGER NOT NULL REFERENCES persons (id) ON DELETE RESTRICT,
        amount TEXT NOT NULL,
        issue_date TEXT NOT NULL,
        paid INTEGER NOT NULL DEFAULT 0,
        payment_date TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_cases_status ON cases (status)",
    "CREATE INDEX IF NOT EXISTS idx_cases_deadline ON cases (deadline_date)",
    "CREATE INDEX IF NOT EXISTS idx_documents_case ON documents (case_id)",
    "CREATE INDEX IF NOT EXISTS idx_invoices_case ON invoices (case_id)",
];

pub struct LibSqlBackend {
    db: libsql::Database,
}

impl LibSqlBackend {
    /// Open (or create) the local database file, creating parent
    /// directories as needed.
    pub async fn new_local(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        }
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        Ok(Self { db })
    }

    pub(crate) async fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        conn.execute("PRAGMA foreign_keys = ON", ()).await?;
        Ok(conn)
    }
}

pub(crate) fn get_text(row: &libsql::Row, idx: i32) -> String {
    row.get::<String>(idx).unwrap_or_default()
}

pub(crate) fn get_opt_text(row: &libsql::Row, idx: i32) -> Option<String> {
    match row.get_value(idx) {
        Ok(libsql::Value::Text(text)) => Some(text),
        _ => None,
    }
}

pub(crate) fn get_i64(row: &libsql::Row, idx: i32) -> i64 {
    row.get::<i64>(idx).unwrap_or_default()
}

pub(crate) fn opt_text(value: Option<&str>) -> libsql::Value {
    match value {
        Some(text) => libsql::Value::Text(text.to_string()),
        None => libsql::Value::Null,
    }
}

pub(crate) fn opt_text_owned(value: Option<String>) -> libsql::Value {
    match value {
        Some(text) => libsql::Value::Text(text),
        None => libsql::Value::Null,
    }
}

/// Fixed-width UTC format so text comparison orders like the timestamps.
pub(crate) fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(DatabaseError::Serialization(format!(
        "invalid timestamp '{raw}'"
    )))
}

pub(crate) fn parse_decimal(raw: &str, field: &str) -> Result<Decimal, DatabaseError> {
    Decimal::from_str(raw)
        .map_err(|e| DatabaseError::Serialization(format!("invalid {field} decimal: {e}")))
}
