//! Manages the in-process state of import jobs that run outside the
//! request/response cycle.
//!
//! The durable job record lives in the database (see `manager`); this module
//! only tracks what cannot be persisted:
//! - `JobsState`: a clonable, thread-safe registry shared with the Actix
//!   application as `web::Data`. It holds the control handles of background and
//!   streaming jobs and one processing lock per owner.
//! - `JobUpdate`: a message background workers send after each batch.
//! - `start_job_updater`: a long-running task that consumes `JobUpdate`s and
//!   drops the control handle of jobs that have finished.

use crate::error::{ImportError, Result};
use crate::pipeline::stream::StreamHandle;
use log::{debug, info};
use registry_common::jobs::JobStatus;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify, OwnedMutexGuard, RwLock};

/// Cooperative control flags of a self-driving job. The driver checks them
/// between batches.
#[derive(Default)]
pub struct JobControl {
    cancelled: AtomicBool,
    paused: AtomicBool,
    wake: Notify,
}

impl JobControl {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Block until the job is resumed or cancelled.
    pub async fn wait_while_paused(&self) {
        loop {
            let notified = self.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_paused() || self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Control handle of a job that is being processed by the server itself.
#[derive(Clone)]
pub enum LiveJob {
    Background(Arc<JobControl>),
    Stream(StreamHandle),
}

/// A thread-safe, shareable registry of running jobs.
///
/// Created in `main.rs` and shared across the Actix application as
/// `web::Data`.
#[derive(Clone)]
pub struct JobsState {
    /// Control handles keyed by job id. Caller-iterated jobs never appear
    /// here: the client drives them.
    pub live: Arc<RwLock<HashMap<String, LiveJob>>>,

    /// One lock per owner. Staging is scoped by owner, so at most one
    /// batch of an owner may be in flight.
    owner_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,

    /// Background workers push `JobUpdate`s into this channel after every
    /// batch. `blocking_send` is used from worker threads.
    pub tx: mpsc::Sender<JobUpdate>,
}

/// Status update for one job, sent by background workers.
#[derive(Debug)]
pub struct JobUpdate {
    pub job_id: String,
    pub status: JobStatus,
}

impl JobsState {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<JobUpdate>) {
        let (tx, rx) = mpsc::channel(capacity);
        let state = Self {
            live: Arc::new(RwLock::new(HashMap::new())),
            owner_locks: Arc::new(Mutex::new(HashMap::new())),
            tx,
        };
        (state, rx)
    }

    fn owner_lock(&self, owner_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .owner_locks
            .lock()
            .map_err(|_| ImportError::Persistence("owner lock table poisoned".to_string()))?;
        Ok(locks
            .entry(owner_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    /// Take the owner's processing lock without waiting.
    ///
    /// Returns `Conflict` when another batch of the same owner is running.
    pub fn try_lock_owner(&self, owner_id: &str) -> Result<OwnedMutexGuard<()>> {
        self.owner_lock(owner_id)?.try_lock_owned().map_err(|_| {
            ImportError::Conflict(format!(
                "another import step for owner {} is in progress",
                owner_id
            ))
        })
    }

    /// Wait for the owner's processing lock. Used by server-side workers,
    /// which may start while the previous worker of the owner winds down.
    pub async fn lock_owner(&self, owner_id: &str) -> Result<OwnedMutexGuard<()>> {
        Ok(self.owner_lock(owner_id)?.lock_owned().await)
    }

    pub async fn register(&self, job_id: &str, job: LiveJob) {
        self.live.write().await.insert(job_id.to_string(), job);
    }

    async fn live_job(&self, job_id: &str) -> Result<LiveJob> {
        self.live.read().await.get(job_id).cloned().ok_or_else(|| {
            ImportError::InvalidRequest(format!(
                "job {} is not processed by the server; pause a caller-iterated job by not calling it",
                job_id
            ))
        })
    }

    pub async fn pause(&self, job_id: &str) -> Result<()> {
        match self.live_job(job_id).await? {
            LiveJob::Background(control) => control.pause(),
            LiveJob::Stream(handle) => handle.pause()?,
        }
        info!("Pause requested for job {}", job_id);
        Ok(())
    }

    pub async fn resume(&self, job_id: &str) -> Result<()> {
        match self.live_job(job_id).await? {
            LiveJob::Background(control) => control.resume(),
            LiveJob::Stream(handle) => handle.resume()?,
        }
        info!("Resume requested for job {}", job_id);
        Ok(())
    }

    /// Signal cancellation to a live job. Returns `false` when the job has no
    /// worker, in which case the caller fails the job record directly.
    pub async fn cancel(&self, job_id: &str) -> bool {
        let job = self.live.read().await.get(job_id).cloned();
        match job {
            Some(LiveJob::Background(control)) => {
                control.cancel();
                true
            }
            Some(LiveJob::Stream(handle)) => handle.cancel().is_ok(),
            None => false,
        }
    }
}

/// Starts the central job updater task.
///
/// Spawned once in `main.rs`. Every `JobUpdate` is logged; once an update
/// reports a finished job its control handle is dropped from `live`.
pub async fn start_job_updater(state: JobsState, mut rx: mpsc::Receiver<JobUpdate>) {
    while let Some(update) = rx.recv().await {
        debug!(
            "Job {}: {} rows loaded, offset {} of {}",
            update.job_id, update.status.rows_loaded, update.status.next_offset, update.status.total_rows
        );
        if update.status.done {
            state.live.write().await.remove(&update.job_id);
            info!(
                "Job {} finished with status {}",
                update.job_id,
                update.status.status.as_str()
            );
        }
    }
}
