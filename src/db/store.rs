//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::*;
use crate::extract::CanonicalState;
use crate::scheduler::SourceResult;

mod embedded {
    refinery::embed_migrations!("migrations");
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let mut conn = self.conn.lock().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let report = embedded::migrations::runner()
            .run(&mut *conn)
            .map_err(|e| DbError::Migration(e.to_string()))?;
        for migration in report.applied_migrations() {
            tracing::info!("Applied migration {}", migration);
        }
        Ok(())
    }

    // --- Health checks ---

    /// Store the outcome of one check: upsert the source row, then replace its
    /// components. Returns the row id.
    pub fn upsert_health_check(&self, result: &SourceResult) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        let now = format_db_time(Utc::now());

        let id: i64 = tx.query_row(
            "INSERT INTO health_checks
                (source_name, source_url, source_type, status_code, is_error, response_time_ms, error_message, check_timestamp, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(source_name) DO UPDATE SET
                source_url = excluded.source_url,
                source_type = excluded.source_type,
                status_code = excluded.status_code,
                is_error = excluded.is_error,
                response_time_ms = excluded.response_time_ms,
                error_message = excluded.error_message,
                check_timestamp = excluded.check_timestamp,
                updated_at = excluded.updated_at
             RETURNING id",
            params![
                result.name,
                result.url,
                result.source_type,
                result.status_code,
                result.is_error,
                result.response_time_ms,
                result.error_message,
                format_db_time(result.checked_at),
                now,
            ],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM components WHERE health_check_id = ?1", params![id])?;

        if let Some(report) = &result.report {
            let mut stmt = tx.prepare(
                "INSERT INTO components
                    (health_check_id, component_name, component_status, is_error, raw_indicator, status_text, error_messages, details, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            for c in report.components() {
                let messages = serde_json::to_string(c.messages()).unwrap_or_else(|_| "[]".to_string());
                let details = c.detail().map(|d| d.to_string());
                stmt.execute(params![
                    id,
                    c.name(),
                    c.state().as_str(),
                    c.is_error(),
                    c.raw_indicator(),
                    c.status_text(),
                    messages,
                    details,
                    now,
                ])?;
            }
        } else {
            tracing::debug!("No components to store for {}", result.name);
        }

        tx.commit()?;
        Ok(id)
    }

    /// Get all health checks ordered by source name.
    pub fn get_health_checks(&self) -> Result<Vec<HealthCheck>, DbError> {
        let conn = self.conn.lock().unwrap();
        query_health_checks(&conn)
    }

    /// Get a health check by source name.
    pub fn get_health_check(&self, source_name: &str) -> Result<HealthCheck, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("{} WHERE source_name = ?1", SELECT_HEALTH_CHECK),
            params![source_name],
            health_check_from_row,
        )
        .optional()?
        .ok_or(DbError::NotFound)
    }

    /// Get the components of one health check.
    pub fn get_components(&self, health_check_id: i64) -> Result<Vec<StoredComponent>, DbError> {
        let conn = self.conn.lock().unwrap();
        query_components(&conn, health_check_id)
    }

    /// Every stored check with its components, ordered by source name.
    pub fn get_latest_health_data(&self) -> Result<Vec<SourceHealth>, DbError> {
        let conn = self.conn.lock().unwrap();
        query_health_checks(&conn)?
            .into_iter()
            .map(|check| -> Result<SourceHealth, DbError> {
                let components = query_components(&conn, check.id)?;
                Ok(SourceHealth { check, components })
            })
            .collect()
    }

    /// Delete a source's check and its components. Returns whether a row existed.
    pub fn delete_health_check(&self, source_name: &str) -> Result<bool, DbError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM health_checks WHERE source_name = ?1",
            params![source_name],
        )?;
        Ok(deleted > 0)
    }
}

const SELECT_HEALTH_CHECK: &str = "SELECT id, source_name, source_url, source_type, status_code, is_error, response_time_ms, error_message, check_timestamp, updated_at FROM health_checks";

fn query_health_checks(conn: &Connection) -> Result<Vec<HealthCheck>, DbError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY source_name ASC", SELECT_HEALTH_CHECK))?;
    let checks = stmt
        .query_map([], health_check_from_row)?
        .collect::<SqlResult<Vec<_>>>()?;
    Ok(checks)
}

fn health_check_from_row(row: &Row<'_>) -> SqlResult<HealthCheck> {
    let checked_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;
    Ok(HealthCheck {
        id: row.get(0)?,
        source_name: row.get(1)?,
        source_url: row.get(2)?,
        source_type: row.get(3)?,
        status_code: row.get(4)?,
        is_error: row.get(5)?,
        response_time_ms: row.get(6)?,
        error_message: row.get(7)?,
        checked_at: parse_db_time(&checked_at).unwrap_or_else(Utc::now),
        updated_at: parse_db_time(&updated_at).unwrap_or_else(Utc::now),
    })
}

fn query_components(conn: &Connection, health_check_id: i64) -> Result<Vec<StoredComponent>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, health_check_id, component_name, component_status, is_error, raw_indicator, status_text, error_messages, details
         FROM components WHERE health_check_id = ?1 ORDER BY id ASC",
    )?;

    let components = stmt
        .query_map(params![health_check_id], |row| {
            let state: String = row.get(3)?;
            let messages: String = row.get(7)?;
            let details: Option<String> = row.get(8)?;
            Ok(StoredComponent {
                id: row.get(0)?,
                health_check_id: row.get(1)?,
                name: row.get(2)?,
                state: state.parse().unwrap_or(CanonicalState::Unknown),
                is_error: row.get(4)?,
                raw_indicator: row.get(5)?,
                status_text: row.get(6)?,
                error_messages: serde_json::from_str(&messages).unwrap_or_default(),
                details: details.and_then(|d| serde_json::from_str(&d).ok()),
            })
        })?
        .collect::<SqlResult<Vec<_>>>()?;

    Ok(components)
}

fn format_db_time(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    // Try various formats
    let formats = [
        "%Y-%m-%d %H:%M:%S%.9f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.9fZ",
        "%Y-%m-%dT%H:%M:%SZ",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
