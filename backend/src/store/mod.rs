//! SQLite-backed relational store: job records, staging area and the
//! canonical company / entity / holding tables.
//!
//! All functions in the submodules take a `&Connection` (or `&mut` when they
//! need a transaction) so callers decide how calls are grouped. `Database`
//! owns the single connection and serializes access to it.

pub mod aggregate;
pub mod jobs;
pub mod merge;
pub mod staging;

use crate::error::{ImportError, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS import_jobs (
    id              TEXT PRIMARY KEY,
    owner_id        TEXT NOT NULL,
    source_location TEXT NOT NULL,
    source_format   TEXT NOT NULL,
    mode            TEXT NOT NULL,
    year            INTEGER NOT NULL,
    mapping_json    TEXT NOT NULL,
    chunk_size      INTEGER NOT NULL,
    source_md5      TEXT,
    status          TEXT NOT NULL,
    total_rows      INTEGER NOT NULL DEFAULT 0,
    total_known     INTEGER NOT NULL DEFAULT 0,
    rows_loaded     INTEGER NOT NULL DEFAULT 0,
    source_offset   INTEGER NOT NULL DEFAULT 0,
    rejected_rows   INTEGER NOT NULL DEFAULT 0,
    error_message   TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    finished_at     TEXT
);
CREATE INDEX IF NOT EXISTS idx_import_jobs_owner ON import_jobs (owner_id, status);

CREATE TABLE IF NOT EXISTS import_job_errors (
    job_id     TEXT NOT NULL REFERENCES import_jobs (id) ON DELETE CASCADE,
    source_row INTEGER NOT NULL,
    reason     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_import_job_errors_job ON import_job_errors (job_id);

CREATE TABLE IF NOT EXISTS staging_rows (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id          TEXT NOT NULL,
    org_number        TEXT NOT NULL,
    company_name      TEXT NOT NULL,
    holder_name       TEXT NOT NULL,
    holder_key        TEXT NOT NULL,
    holder_kind       TEXT NOT NULL,
    holder_org_number TEXT,
    holder_birth_year INTEGER,
    country_code      TEXT NOT NULL,
    share_class       TEXT NOT NULL,
    share_count       INTEGER NOT NULL,
    year              INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_staging_rows_owner ON staging_rows (owner_id);

CREATE TABLE IF NOT EXISTS companies (
    org_number   TEXT NOT NULL,
    year         INTEGER NOT NULL,
    owner_id     TEXT NOT NULL,
    name         TEXT NOT NULL,
    total_shares INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (org_number, year, owner_id)
);

CREATE TABLE IF NOT EXISTS entities (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id     TEXT NOT NULL,
    natural_key  TEXT NOT NULL,
    entity_type  TEXT NOT NULL,
    name         TEXT NOT NULL,
    org_number   TEXT,
    birth_year   INTEGER,
    country_code TEXT NOT NULL,
    UNIQUE (owner_id, natural_key)
);

CREATE TABLE IF NOT EXISTS holdings (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    company_org_number TEXT NOT NULL,
    holder_entity_id   INTEGER NOT NULL REFERENCES entities (id),
    share_class        TEXT NOT NULL,
    year               INTEGER NOT NULL,
    owner_id           TEXT NOT NULL,
    share_count        INTEGER NOT NULL,
    UNIQUE (company_org_number, holder_entity_id, share_class, year, owner_id)
);
CREATE INDEX IF NOT EXISTS idx_holdings_company ON holdings (owner_id, year, company_org_number);
"#;

/// Shared handle to the SQLite database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| ImportError::Persistence("database mutex poisoned".to_string()))?;
        f(&mut conn)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use registry_common::model::shareholder::{HolderIdentifier, ShareholderRow};

    pub fn row(org: &str, holder: &str, holder_id: Option<HolderIdentifier>, class: &str, count: i64) -> ShareholderRow {
        ShareholderRow {
            org_number: org.to_string(),
            company_name: format!("Company {}", org),
            holder_name: holder.to_string(),
            holder_id,
            country_code: "NO".to_string(),
            share_class: class.to_string(),
            share_count: count,
            year: 2024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("registry.sqlite");
        drop(Database::open(&path).unwrap());
        let db = Database::open(&path).unwrap();
        let tables: i64 = db
            .with_conn(|c| {
                Ok(c.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('companies', 'entities', 'holdings', 'staging_rows', 'import_jobs')",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(tables, 5);
    }
}
