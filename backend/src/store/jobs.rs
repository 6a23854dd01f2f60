//! Persistence of `import_jobs` rows and their rejected-row samples.
//!
//! These functions only read and write; the lifecycle rules live in
//! `job_controller::manager`.

use crate::error::{ImportError, Result};
use chrono::{DateTime, Utc};
use registry_common::jobs::{JobState, JobStatus, RejectionSample};
use registry_common::model::import::{ImportMode, SourceFormat};
use registry_common::model::mapping::FieldMapping;
use rusqlite::{params, Connection, OptionalExtension, Row};

#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub owner_id: String,
    pub source_location: String,
    pub format: SourceFormat,
    pub mode: ImportMode,
    pub year: i32,
    pub mapping: FieldMapping,
    pub chunk_size: usize,
    /// MD5 of the source as first read; later reads must match it.
    pub source_md5: Option<String>,
    pub status: JobState,
    pub total_rows: u64,
    pub total_known: bool,
    /// Rows merged into the canonical tables.
    pub rows_loaded: u64,
    /// Source rows consumed (merged or rejected). Authoritative for resume.
    pub source_offset: u64,
    pub rejected_rows: u64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn is_exhausted(&self) -> bool {
        self.total_known && self.source_offset >= self.total_rows
    }

    pub fn to_status(&self) -> JobStatus {
        JobStatus {
            job_id: self.id.clone(),
            status: self.status,
            total_rows: self.total_rows,
            rows_loaded: self.rows_loaded,
            next_offset: self.source_offset,
            done: self.status.is_terminal() || self.is_exhausted(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Fields fixed at job creation.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub owner_id: String,
    pub source_location: String,
    pub format: SourceFormat,
    pub mode: ImportMode,
    pub year: i32,
    pub mapping: FieldMapping,
    pub chunk_size: usize,
}

/// Progress persisted after a batch has been merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub source_offset: u64,
    pub rows_loaded: u64,
    pub rejected_rows: u64,
    /// `Some` once the total row count of the source is known.
    pub total_rows: Option<u64>,
}

const JOB_COLUMNS: &str = "id, owner_id, source_location, source_format, mode, year, mapping_json,
    chunk_size, source_md5, status, total_rows, total_known, rows_loaded, source_offset,
    rejected_rows, error_message, created_at, updated_at, finished_at";

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn parse_time(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn invalid_column(column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("invalid {} value: {}", column, value).into(),
    )
}

fn job_from_row(row: &Row) -> rusqlite::Result<JobRecord> {
    let format: String = row.get(3)?;
    let mode: String = row.get(4)?;
    let mapping_json: String = row.get(6)?;
    let status: String = row.get(9)?;
    let created_at: String = row.get(16)?;
    let updated_at: String = row.get(17)?;
    let finished_at: Option<String> = row.get(18)?;

    Ok(JobRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        source_location: row.get(2)?,
        format: SourceFormat::parse(&format).ok_or_else(|| invalid_column("source_format", &format))?,
        mode: ImportMode::parse(&mode).ok_or_else(|| invalid_column("mode", &mode))?,
        year: row.get(5)?,
        mapping: serde_json::from_str(&mapping_json)
            .map_err(|_| invalid_column("mapping_json", &mapping_json))?,
        chunk_size: row.get::<_, i64>(7)? as usize,
        source_md5: row.get(8)?,
        status: JobState::parse(&status).ok_or_else(|| invalid_column("status", &status))?,
        total_rows: row.get::<_, i64>(10)? as u64,
        total_known: row.get::<_, i64>(11)? != 0,
        rows_loaded: row.get::<_, i64>(12)? as u64,
        source_offset: row.get::<_, i64>(13)? as u64,
        rejected_rows: row.get::<_, i64>(14)? as u64,
        error_message: row.get(15)?,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
        finished_at: finished_at.as_deref().map(parse_time).transpose()?,
    })
}

pub fn insert_job(conn: &Connection, job: &NewJob) -> Result<()> {
    let mapping_json = serde_json::to_string(&job.mapping)
        .map_err(|e| ImportError::Persistence(e.to_string()))?;
    let ts = now();
    conn.execute(
        "INSERT INTO import_jobs (
            id, owner_id, source_location, source_format, mode, year, mapping_json,
            chunk_size, status, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            job.id,
            job.owner_id,
            job.source_location,
            job.format.as_str(),
            job.mode.as_str(),
            job.year,
            mapping_json,
            job.chunk_size as i64,
            JobState::Pending.as_str(),
            ts,
        ],
    )?;
    Ok(())
}

pub fn get_job(conn: &Connection, job_id: &str) -> Result<Option<JobRecord>> {
    let sql = format!("SELECT {} FROM import_jobs WHERE id = ?1", JOB_COLUMNS);
    Ok(conn.query_row(&sql, params![job_id], job_from_row).optional()?)
}

pub fn list_jobs(conn: &Connection, owner_id: &str) -> Result<Vec<JobRecord>> {
    let sql = format!(
        "SELECT {} FROM import_jobs WHERE owner_id = ?1 ORDER BY created_at DESC, id",
        JOB_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let jobs = stmt
        .query_map(params![owner_id], job_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(jobs)
}

/// Jobs left `running`, across all owners.
pub fn running_jobs(conn: &Connection) -> Result<Vec<JobRecord>> {
    let sql = format!(
        "SELECT {} FROM import_jobs WHERE status = 'running' ORDER BY created_at",
        JOB_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let jobs = stmt
        .query_map([], job_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(jobs)
}

pub fn active_job_for_owner(conn: &Connection, owner_id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT id FROM import_jobs WHERE owner_id = ?1 AND status IN ('pending', 'running') LIMIT 1",
            params![owner_id],
            |r| r.get(0),
        )
        .optional()?)
}

pub fn set_status(
    conn: &Connection,
    job_id: &str,
    status: JobState,
    error_message: Option<&str>,
) -> Result<()> {
    let ts = now();
    let finished = status.is_terminal().then(|| ts.clone());
    conn.execute(
        "UPDATE import_jobs
         SET status = ?2, error_message = COALESCE(?3, error_message), updated_at = ?4,
             finished_at = COALESCE(?5, finished_at)
         WHERE id = ?1",
        params![job_id, status.as_str(), error_message, ts, finished],
    )?;
    Ok(())
}

pub fn set_source(conn: &Connection, job_id: &str, md5: &str, total_rows: u64) -> Result<()> {
    conn.execute(
        "UPDATE import_jobs SET source_md5 = ?2, total_rows = ?3, total_known = 1, updated_at = ?4
         WHERE id = ?1",
        params![job_id, md5, total_rows as i64, now()],
    )?;
    Ok(())
}

pub fn write_checkpoint(conn: &Connection, job_id: &str, checkpoint: &Checkpoint) -> Result<()> {
    match checkpoint.total_rows {
        Some(total) => conn.execute(
            "UPDATE import_jobs
             SET source_offset = ?2, rows_loaded = ?3, rejected_rows = ?4,
                 total_rows = ?5, total_known = 1, updated_at = ?6
             WHERE id = ?1",
            params![
                job_id,
                checkpoint.source_offset as i64,
                checkpoint.rows_loaded as i64,
                checkpoint.rejected_rows as i64,
                total as i64,
                now()
            ],
        )?,
        None => conn.execute(
            "UPDATE import_jobs
             SET source_offset = ?2, rows_loaded = ?3, rejected_rows = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                job_id,
                checkpoint.source_offset as i64,
                checkpoint.rows_loaded as i64,
                checkpoint.rejected_rows as i64,
                now()
            ],
        )?,
    };
    Ok(())
}

/// Append rejection samples while the job holds fewer than `cap`.
pub fn insert_rejections(
    conn: &Connection,
    job_id: &str,
    samples: &[RejectionSample],
    cap: usize,
) -> Result<usize> {
    let stored: i64 = conn.query_row(
        "SELECT COUNT(*) FROM import_job_errors WHERE job_id = ?1",
        params![job_id],
        |r| r.get(0),
    )?;
    let room = cap.saturating_sub(stored as usize);
    let mut stmt = conn.prepare_cached(
        "INSERT INTO import_job_errors (job_id, source_row, reason) VALUES (?1, ?2, ?3)",
    )?;
    for sample in samples.iter().take(room) {
        stmt.execute(params![job_id, sample.source_row as i64, sample.reason])?;
    }
    Ok(samples.len().min(room))
}

pub fn rejection_sample(conn: &Connection, job_id: &str) -> Result<Vec<RejectionSample>> {
    let mut stmt = conn.prepare(
        "SELECT source_row, reason FROM import_job_errors WHERE job_id = ?1 ORDER BY source_row",
    )?;
    let samples = stmt
        .query_map(params![job_id], |r| {
            Ok(RejectionSample {
                source_row: r.get::<_, i64>(0)? as u64,
                reason: r.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(samples)
}
