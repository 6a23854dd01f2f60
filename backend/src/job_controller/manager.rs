//! Lifecycle rules for import jobs.
//!
//! `pending -> running -> completed` or `running -> error`; nothing else.
//! Terminal calls repeated with the same outcome are no-ops, and progress
//! counters only move forward.

use crate::error::{ImportError, Result};
use crate::store::jobs::{self, Checkpoint, JobRecord, NewJob};
use crate::store::Database;
use log::{info, warn};
use registry_common::jobs::{JobState, RejectionSample, ValidationReport};
use registry_common::model::import::{ImportMode, SourceFormat};
use registry_common::model::mapping::FieldMapping;
use rusqlite::Connection;
use std::sync::Arc;

/// Everything needed to create a job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub owner_id: String,
    pub source_location: String,
    pub format: SourceFormat,
    pub mode: ImportMode,
    pub year: i32,
    pub mapping: FieldMapping,
    pub chunk_size: usize,
}

#[derive(Clone)]
pub struct JobManager {
    db: Arc<Database>,
    max_error_samples: usize,
}

fn load(conn: &Connection, job_id: &str) -> Result<JobRecord> {
    jobs::get_job(conn, job_id)?.ok_or_else(|| ImportError::NotFound(job_id.to_string()))
}

fn transition(conn: &Connection, job_id: &str, to: JobState, message: Option<&str>) -> Result<JobRecord> {
    let job = load(conn, job_id)?;
    if job.status == to {
        return Ok(job);
    }
    if !job.status.can_transition_to(to) {
        return Err(ImportError::InvalidTransition {
            from: job.status.as_str(),
            to: to.as_str(),
        });
    }
    jobs::set_status(conn, job_id, to, message)?;
    load(conn, job_id)
}

fn require_running(job: &JobRecord) -> Result<()> {
    if job.status == JobState::Running {
        Ok(())
    } else {
        Err(ImportError::InvalidTransition {
            from: job.status.as_str(),
            to: JobState::Running.as_str(),
        })
    }
}

impl JobManager {
    pub fn new(db: Arc<Database>, max_error_samples: usize) -> Self {
        Self {
            db,
            max_error_samples,
        }
    }

    /// Register a job and start it. Fails with `Conflict` while the owner
    /// already has an active job, since staging is shared per owner.
    pub fn create(&self, spec: JobSpec) -> Result<JobRecord> {
        let job_id = uuid::Uuid::new_v4().to_string();
        let job = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            if let Some(active) = jobs::active_job_for_owner(&tx, &spec.owner_id)? {
                return Err(ImportError::Conflict(format!(
                    "owner {} already has an active import job {}",
                    spec.owner_id, active
                )));
            }
            jobs::insert_job(
                &tx,
                &NewJob {
                    id: job_id.clone(),
                    owner_id: spec.owner_id.clone(),
                    source_location: spec.source_location.clone(),
                    format: spec.format,
                    mode: spec.mode,
                    year: spec.year,
                    mapping: spec.mapping.clone(),
                    chunk_size: spec.chunk_size,
                },
            )?;
            let job = transition(&tx, &job_id, JobState::Running, None)?;
            tx.commit()?;
            Ok(job)
        })?;
        info!(
            "Created import job {} for owner {} ({}, {})",
            job.id,
            job.owner_id,
            job.source_location,
            job.mode.as_str()
        );
        Ok(job)
    }

    /// Fetch a job on behalf of `owner_id`.
    pub fn get(&self, job_id: &str, owner_id: &str) -> Result<JobRecord> {
        let job = self.find(job_id)?;
        if job.owner_id != owner_id {
            return Err(ImportError::Forbidden(format!(
                "job {} belongs to another owner",
                job_id
            )));
        }
        Ok(job)
    }

    pub fn find(&self, job_id: &str) -> Result<JobRecord> {
        self.db.with_conn(|conn| load(conn, job_id))
    }

    pub fn list(&self, owner_id: &str) -> Result<Vec<JobRecord>> {
        self.db.with_conn(|conn| jobs::list_jobs(conn, owner_id))
    }

    pub fn running(&self) -> Result<Vec<JobRecord>> {
        self.db.with_conn(|conn| jobs::running_jobs(conn))
    }

    /// Pin the source hash and total row count on first read.
    pub fn record_source(&self, job_id: &str, md5: &str, total_rows: u64) -> Result<JobRecord> {
        self.db.with_conn(|conn| {
            let job = load(conn, job_id)?;
            require_running(&job)?;
            match job.source_md5.as_deref() {
                Some(existing) if existing != md5 => Err(ImportError::SourceChanged {
                    expected: existing.to_string(),
                    found: md5.to_string(),
                }),
                Some(_) => Ok(job),
                None => {
                    jobs::set_source(conn, job_id, md5, total_rows)?;
                    load(conn, job_id)
                }
            }
        })
    }

    /// Report merged rows. The source offset is left alone: a smaller
    /// `rows_loaded` than already recorded is rejected, as is a count beyond
    /// the rows consumed so far or a known total.
    pub fn update_progress(&self, job_id: &str, rows_loaded: u64, total_rows: Option<u64>) -> Result<JobRecord> {
        self.db.with_conn(|conn| {
            let job = load(conn, job_id)?;
            require_running(&job)?;
            let checkpoint = Checkpoint {
                source_offset: job.source_offset,
                rows_loaded,
                rejected_rows: job.rejected_rows,
                total_rows: total_rows.or(job.total_known.then_some(job.total_rows)),
            };
            validate_checkpoint(&job, &checkpoint)?;
            jobs::write_checkpoint(conn, job_id, &checkpoint)?;
            load(conn, job_id)
        })
    }

    /// Persist the progress of one merged batch together with its rejected
    /// row samples.
    pub fn record_chunk(
        &self,
        job_id: &str,
        checkpoint: &Checkpoint,
        rejections: &[RejectionSample],
    ) -> Result<JobRecord> {
        let cap = self.max_error_samples;
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let job = load(&tx, job_id)?;
            require_running(&job)?;
            validate_checkpoint(&job, checkpoint)?;
            jobs::write_checkpoint(&tx, job_id, checkpoint)?;
            jobs::insert_rejections(&tx, job_id, rejections, cap)?;
            let job = load(&tx, job_id)?;
            tx.commit()?;
            Ok(job)
        })
    }

    pub fn complete(&self, job_id: &str) -> Result<JobRecord> {
        let job = self
            .db
            .with_conn(|conn| transition(conn, job_id, JobState::Completed, None))?;
        info!(
            "Import job {} completed: {} rows loaded, {} rejected",
            job.id, job.rows_loaded, job.rejected_rows
        );
        Ok(job)
    }

    /// Move a job to `error`. Failing an already failed job keeps the first
    /// message.
    pub fn fail(&self, job_id: &str, message: &str) -> Result<JobRecord> {
        let job = self
            .db
            .with_conn(|conn| transition(conn, job_id, JobState::Error, Some(message)))?;
        warn!("Import job {} failed: {}", job.id, job.error_message.as_deref().unwrap_or(message));
        Ok(job)
    }

    pub fn validation_report(&self, job_id: &str, owner_id: &str) -> Result<ValidationReport> {
        let job = self.get(job_id, owner_id)?;
        let sample = self.db.with_conn(|conn| jobs::rejection_sample(conn, job_id))?;
        Ok(ValidationReport {
            job_id: job.id,
            rejected_rows: job.rejected_rows,
            sample,
        })
    }
}

fn validate_checkpoint(job: &JobRecord, next: &Checkpoint) -> Result<()> {
    if next.rows_loaded < job.rows_loaded {
        return Err(ImportError::InvalidProgress(format!(
            "rows loaded cannot go back from {} to {}",
            job.rows_loaded, next.rows_loaded
        )));
    }
    if next.source_offset < job.source_offset {
        return Err(ImportError::InvalidProgress(format!(
            "source offset cannot go back from {} to {}",
            job.source_offset, next.source_offset
        )));
    }
    if next.rows_loaded > next.source_offset {
        return Err(ImportError::InvalidProgress(format!(
            "rows loaded {} exceed rows consumed {}",
            next.rows_loaded, next.source_offset
        )));
    }
    if let Some(total) = next.total_rows {
        if next.source_offset > total {
            return Err(ImportError::InvalidProgress(format!(
                "rows consumed {} exceed total rows {}",
                next.source_offset, total
            )));
        }
    }
    Ok(())
}
