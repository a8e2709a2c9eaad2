//! Run-history database.
//!
//! A SQLite file next to the dataset artifacts records one row per
//! conversion run: the summary counters, a provenance hash of the input
//! table, and timestamps. Recording is best-effort from the pipeline's
//! point of view; this module only defines the storage itself.

use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Error type for run-database operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },
}

/// Convenience result type for DB operations.
pub type DbResult<T> = Result<T, DbError>;

/// Outcome of a recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every surviving block was processed and written.
    Succeeded,
    /// The artifact was written but some blocks failed tool invocation.
    Partial,
    /// The run aborted on a fatal error.
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<RunStatus> {
        match s.to_lowercase().as_str() {
            "succeeded" => Some(RunStatus::Succeeded),
            "partial" => Some(RunStatus::Partial),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// One conversion run as stored in the database.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConversionRunRecord {
    pub arch: String,
    pub status: RunStatus,
    pub blocks_read: u64,
    pub blocks_excluded: u64,
    pub rows_malformed: u64,
    pub duplicate_ids: u64,
    pub tool_failures: u64,
    pub blocks_written: u64,
    /// Requested block limit; 0 means unlimited.
    pub block_limit: u64,
    pub workers: Option<u64>,
    pub dataset_path: Option<String>,
    pub table_sha256: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

/// SQLite-backed run history.
///
/// A thin wrapper around `rusqlite::Connection` responsible for:
/// - Opening/creating the DB file.
/// - Applying schema migrations.
/// - Inserting and listing run records.
#[derive(Debug)]
pub struct RunDb {
    conn: Connection,
}

impl RunDb {
    /// Open (or create) the run database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Expose a reference to the underlying connection for advanced callers.
    /// For most code, prefer the higher-level helpers.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert a run record and return its row id.
    pub fn insert_run(&self, record: &ConversionRunRecord) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO conversion_runs (
                arch, status, blocks_read, blocks_excluded, rows_malformed,
                duplicate_ids, tool_failures, blocks_written, block_limit,
                workers, dataset_path, table_sha256, started_at, finished_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                record.arch,
                record.status.as_str(),
                record.blocks_read as i64,
                record.blocks_excluded as i64,
                record.rows_malformed as i64,
                record.duplicate_ids as i64,
                record.tool_failures as i64,
                record.blocks_written as i64,
                record.block_limit as i64,
                record.workers.map(|w| w as i64),
                record.dataset_path,
                record.table_sha256,
                record.started_at,
                record.finished_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// List recorded runs in insertion order, optionally filtered by
    /// architecture code.
    pub fn list_runs(&self, arch: Option<&str>) -> DbResult<Vec<ConversionRunRecord>> {
        fn map_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversionRunRecord> {
            let status_str: String = row.get(1)?;
            let status = RunStatus::parse(&status_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Text,
                    format!("unknown run status '{status_str}'").into(),
                )
            })?;
            Ok(ConversionRunRecord {
                arch: row.get(0)?,
                status,
                blocks_read: row.get::<_, i64>(2)? as u64,
                blocks_excluded: row.get::<_, i64>(3)? as u64,
                rows_malformed: row.get::<_, i64>(4)? as u64,
                duplicate_ids: row.get::<_, i64>(5)? as u64,
                tool_failures: row.get::<_, i64>(6)? as u64,
                blocks_written: row.get::<_, i64>(7)? as u64,
                block_limit: row.get::<_, i64>(8)? as u64,
                workers: row.get::<_, Option<i64>>(9)?.map(|w| w as u64),
                dataset_path: row.get(10)?,
                table_sha256: row.get(11)?,
                started_at: row.get(12)?,
                finished_at: row.get(13)?,
            })
        }

        const SELECT_RUNS: &str = r#"
            SELECT arch, status, blocks_read, blocks_excluded, rows_malformed,
                   duplicate_ids, tool_failures, blocks_written, block_limit,
                   workers, dataset_path, table_sha256, started_at, finished_at
            FROM conversion_runs
        "#;

        let mut stmt = if arch.is_some() {
            self.conn.prepare(&format!("{SELECT_RUNS} WHERE arch = ?1 ORDER BY id"))?
        } else {
            self.conn.prepare(&format!("{SELECT_RUNS} ORDER BY id"))?
        };

        let rows = if let Some(code) = arch {
            stmt.query_map(params![code], map_run)?
        } else {
            stmt.query_map([], map_run)?
        };

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

/// Apply schema migrations to bring the database to the latest version.
///
/// We use `PRAGMA user_version` as the schema version indicator.
///
/// Version map:
/// - 0: no schema
/// - 1: conversion_runs table
fn apply_migrations(conn: &Connection) -> DbResult<()> {
    let current_version = current_schema_version(conn)?;

    // Reject DBs created with a newer schema than we support.
    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        // Initial schema.
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS conversion_runs (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                arch            TEXT NOT NULL,
                status          TEXT NOT NULL,
                blocks_read     INTEGER NOT NULL,
                blocks_excluded INTEGER NOT NULL,
                rows_malformed  INTEGER NOT NULL,
                duplicate_ids   INTEGER NOT NULL,
                tool_failures   INTEGER NOT NULL,
                blocks_written  INTEGER NOT NULL,
                block_limit     INTEGER NOT NULL,
                workers         INTEGER,
                dataset_path    TEXT,
                table_sha256    TEXT,
                started_at      TEXT NOT NULL,
                finished_at     TEXT NOT NULL
            );

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
