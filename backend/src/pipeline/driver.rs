//! Orchestration of chunk processing: the caller-iterated step, the
//! server-driven background loop and job finalization.

use super::normalize::{normalize_batch, ColumnResolver};
use super::reader::ChunkReader;
use super::stream;
use super::{Pipeline, CANCELLED_MESSAGE};
use crate::error::{ImportError, Result};
use crate::job_controller::manager::JobSpec;
use crate::job_controller::state::{JobControl, JobUpdate, JobsState, LiveJob};
use crate::storage::authorize_location;
use crate::store::jobs::{Checkpoint, JobRecord};
use crate::store::{aggregate, merge, staging};
use log::{error, info, warn};
use registry_common::jobs::{ChunkOutcome, JobState, JobStatus};
use registry_common::model::import::{ImportMode, MergeCounts, SourceFormat};
use registry_common::model::mapping::CanonicalField;
use registry_common::model::shareholder::ShareholderRow;
use registry_common::requests::StartImportRequest;
use std::sync::Arc;
use std::time::Duration;

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

fn outcome(job: &JobRecord, processed: u64, rejected: u64) -> ChunkOutcome {
    let status = job.to_status();
    ChunkOutcome {
        next_offset: job.source_offset,
        processed_in_chunk: processed,
        rejected_in_chunk: rejected,
        done: status.done,
        job: status,
    }
}

/// Fail with `Parse` unless every required field has a column.
pub(crate) fn require_columns(resolver: &ColumnResolver) -> Result<()> {
    let missing = resolver.missing_required();
    if missing.is_empty() {
        return Ok(());
    }
    let names: Vec<&str> = missing.iter().map(CanonicalField::as_str).collect();
    Err(ImportError::Parse(format!(
        "no column found for required field(s): {}",
        names.join(", ")
    )))
}

impl Pipeline {
    /// Validate a start request, create the job and clear the owner's
    /// staging area.
    pub fn start_job(&self, owner_id: &str, request: &StartImportRequest) -> Result<JobRecord> {
        authorize_location(owner_id, &request.source_location)?;

        let format = request
            .format
            .or_else(|| SourceFormat::from_path(&request.source_location))
            .ok_or_else(|| ImportError::UnsupportedFormat(request.source_location.clone()))?;
        if request.mode == ImportMode::Stream && format != SourceFormat::Delimited {
            return Err(ImportError::UnsupportedFormat(
                "streaming imports accept delimited sources only".to_string(),
            ));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&request.year) {
            return Err(ImportError::InvalidRequest(format!(
                "year {} is out of range",
                request.year
            )));
        }

        let chunk_size = match request.mode {
            ImportMode::Stream => stream::batch_size(request.chunk_size, &self.settings),
            _ => request
                .chunk_size
                .unwrap_or(self.settings.default_chunk_size)
                .clamp(1, self.settings.max_chunk_size.max(1)),
        };

        let job = self.jobs.create(JobSpec {
            owner_id: owner_id.to_string(),
            source_location: request.source_location.clone(),
            format,
            mode: request.mode,
            year: request.year,
            mapping: request.mapping.clone().unwrap_or_default(),
            chunk_size,
        })?;

        let cleared = self.retry.run("clear staging", || {
            self.db.with_conn(|conn| staging::clear_staging(conn, owner_id))
        });
        match cleared {
            Ok(0) => Ok(job),
            Ok(stale) => {
                warn!("Discarded {} stale staged rows of owner {}", stale, owner_id);
                Ok(job)
            }
            Err(e) => {
                self.fail_job(&job.id, &e.to_string())?;
                Err(e)
            }
        }
    }

    /// The caller-iterated step. `offset` must be the `nextOffset` returned
    /// by the previous call; smaller offsets replay the current checkpoint.
    pub fn process_chunk(
        &self,
        job_id: &str,
        owner_id: &str,
        offset: u64,
        limit: Option<usize>,
    ) -> Result<ChunkOutcome> {
        let job = self.jobs.get(job_id, owner_id)?;
        if job.mode != ImportMode::Iterated {
            return Err(ImportError::InvalidRequest(format!(
                "job {} is processed by the server ({} mode)",
                job_id,
                job.mode.as_str()
            )));
        }
        if job.status.is_terminal() || offset < job.source_offset {
            return Ok(outcome(&job, 0, 0));
        }
        if offset > job.source_offset {
            return Err(ImportError::InvalidRequest(format!(
                "offset {} is ahead of the job checkpoint {}",
                offset, job.source_offset
            )));
        }
        let limit = limit
            .unwrap_or(job.chunk_size)
            .clamp(1, self.settings.max_chunk_size.max(1));
        self.advance(&job, limit)
    }

    /// Process the batch after the job's checkpoint, for server-driven jobs.
    pub fn process_next(&self, job_id: &str) -> Result<ChunkOutcome> {
        let job = self.jobs.find(job_id)?;
        if job.status.is_terminal() {
            return Ok(outcome(&job, 0, 0));
        }
        let limit = job.chunk_size.clamp(1, self.settings.max_chunk_size.max(1));
        self.advance(&job, limit)
    }

    fn advance(&self, job: &JobRecord, limit: usize) -> Result<ChunkOutcome> {
        match self.run_chunk(job, limit) {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.fails_job() => {
                if let Err(fail_err) = self.fail_job(&job.id, &e.to_string()) {
                    error!("Could not mark job {} as failed: {}", job.id, fail_err);
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn run_chunk(&self, job: &JobRecord, limit: usize) -> Result<ChunkOutcome> {
        let reader = ChunkReader::new(self.storage.as_ref(), &self.cache);
        let chunk = self.retry.run("read source", || {
            reader.read_chunk(
                &job.source_location,
                job.format,
                job.source_md5.as_deref(),
                job.source_offset,
                limit,
            )
        })?;
        let job = self.jobs.record_source(&job.id, &chunk.md5, chunk.total_rows)?;

        let resolver = ColumnResolver::new(&chunk.headers, &job.mapping);
        require_columns(&resolver)?;
        let batch = normalize_batch(
            &resolver,
            &chunk.rows,
            job.year,
            self.settings.max_error_samples,
        );
        let loaded = batch.rows.len() as u64;
        let counts = self.load_batch(&job.owner_id, &batch.rows)?;

        let checkpoint = Checkpoint {
            source_offset: job.source_offset + chunk.rows.len() as u64,
            rows_loaded: job.rows_loaded + loaded,
            rejected_rows: job.rejected_rows + batch.rejected,
            total_rows: Some(chunk.total_rows),
        };
        let mut job = self.jobs.record_chunk(&job.id, &checkpoint, &batch.rejections)?;
        info!(
            "Job {}: offset {} of {}, {} rows merged ({} companies, {} entities, {} holdings), {} rejected",
            job.id,
            job.source_offset,
            job.total_rows,
            loaded,
            counts.companies,
            counts.entities,
            counts.holdings,
            batch.rejected
        );

        if chunk.done {
            job = self.finalize(&job)?;
        }
        Ok(outcome(&job, loaded, batch.rejected))
    }

    /// Stage and merge one batch, retrying transient failures. Staging and
    /// merging are repeatable, so a retry after a partial failure converges.
    pub(crate) fn load_batch(&self, owner_id: &str, rows: &[ShareholderRow]) -> Result<MergeCounts> {
        if rows.is_empty() {
            return Ok(MergeCounts::default());
        }
        self.retry.run("stage and merge batch", || {
            self.db.with_conn(|conn| {
                staging::stage_batch(conn, owner_id, rows)?;
                merge::merge_batch(conn, owner_id)
            })
        })
    }

    /// Recompute company totals and complete the job.
    pub(crate) fn finalize(&self, job: &JobRecord) -> Result<JobRecord> {
        let owner_id = job.owner_id.as_str();
        let companies = self.retry.run("recompute totals", || {
            self.db.with_conn(|conn| {
                let mut companies = 0;
                for year in aggregate::years_for_owner(conn, owner_id)? {
                    companies += aggregate::recompute_totals(conn, year, owner_id)?;
                }
                Ok(companies)
            })
        })?;
        info!("Recomputed share totals of {} companies for owner {}", companies, owner_id);
        let job = self.jobs.complete(&job.id)?;
        self.forget_source(&job);
        Ok(job)
    }

    /// Move a job to `error` and drop its cached source.
    pub fn fail_job(&self, job_id: &str, message: &str) -> Result<JobRecord> {
        let job = self.jobs.fail(job_id, message)?;
        self.forget_source(&job);
        Ok(job)
    }

    fn forget_source(&self, job: &JobRecord) {
        if let Some(md5) = &job.source_md5 {
            if let Err(e) = self.cache.evict(md5) {
                warn!("Could not evict cached source {}: {}", md5, e);
            }
        }
    }

    /// Cancel a job nobody is processing right now. Batches already merged
    /// stay in place.
    pub fn cancel_job(&self, job_id: &str, owner_id: &str) -> Result<JobRecord> {
        let job = self.jobs.get(job_id, owner_id)?;
        if job.status == JobState::Completed {
            return Err(ImportError::InvalidTransition {
                from: job.status.as_str(),
                to: JobState::Error.as_str(),
            });
        }
        self.fail_job(job_id, CANCELLED_MESSAGE)
    }

    fn current_status(&self, job_id: &str) -> Option<JobStatus> {
        match self.jobs.find(job_id) {
            Ok(job) => Some(job.to_status()),
            Err(e) => {
                error!("Could not load job {}: {}", job_id, e);
                None
            }
        }
    }

    /// Drive a background job to the end, one batch per blocking task.
    ///
    /// Between batches the loop yields, honours pause and stops on cancel.
    /// Every batch is reported through `state.tx`.
    pub async fn run_background(self, state: JobsState, job_id: String, control: Arc<JobControl>) {
        let pause_poll = Duration::from_millis(self.settings.yield_interval_ms);
        loop {
            if control.is_paused() {
                info!("Job {} paused", job_id);
                control.wait_while_paused().await;
                info!("Job {} resumed", job_id);
            }

            if control.is_cancelled() {
                let pipeline = self.clone();
                let id = job_id.clone();
                let cancelled =
                    tokio::task::spawn_blocking(move || pipeline.fail_job(&id, CANCELLED_MESSAGE)).await;
                let status = match cancelled {
                    Ok(Ok(job)) => Some(job.to_status()),
                    Ok(Err(e)) => {
                        error!("Could not cancel job {}: {}", job_id, e);
                        self.current_status(&job_id)
                    }
                    Err(e) => {
                        error!("Cancel task of job {} panicked: {}", job_id, e);
                        None
                    }
                };
                if let Some(status) = status {
                    let _ = state.tx.send(JobUpdate { job_id: job_id.clone(), status }).await;
                }
                break;
            }

            let pipeline = self.clone();
            let id = job_id.clone();
            let step = tokio::task::spawn_blocking(move || pipeline.process_next(&id)).await;
            let status = match step {
                Ok(Ok(outcome)) => outcome.job,
                Ok(Err(e)) => {
                    error!("Background job {} stopped: {}", job_id, e);
                    let pipeline = self.clone();
                    let id = job_id.clone();
                    let status = tokio::task::spawn_blocking(move || pipeline.current_status(&id))
                        .await
                        .ok()
                        .flatten();
                    if let Some(status) = status {
                        let _ = state.tx.send(JobUpdate { job_id: job_id.clone(), status }).await;
                    }
                    break;
                }
                Err(e) => {
                    error!("Worker of job {} panicked: {}", job_id, e);
                    break;
                }
            };

            let done = status.done;
            if state
                .tx
                .send(JobUpdate {
                    job_id: job_id.clone(),
                    status,
                })
                .await
                .is_err()
            {
                warn!("Job updater is gone; job {} keeps running unobserved", job_id);
            }
            if done {
                break;
            }
            tokio::time::sleep(pause_poll).await;
        }
    }
}

/// Start the server-side worker of a background or stream job.
///
/// The worker holds the owner's processing lock until it exits.
pub async fn spawn_worker(pipeline: Pipeline, state: JobsState, job: &JobRecord) -> Result<()> {
    let owner_id = job.owner_id.clone();
    let job_id = job.id.clone();
    match job.mode {
        ImportMode::Background => {
            let control = Arc::new(JobControl::default());
            state
                .register(&job_id, LiveJob::Background(control.clone()))
                .await;
            tokio::spawn(async move {
                let _guard = match state.lock_owner(&owner_id).await {
                    Ok(guard) => guard,
                    Err(e) => {
                        error!("Job {} could not take the owner lock: {}", job_id, e);
                        return;
                    }
                };
                pipeline.run_background(state, job_id, control).await;
            });
        }
        ImportMode::Stream => {
            let (handle, control) = stream::channel();
            state.register(&job_id, LiveJob::Stream(handle)).await;
            tokio::spawn(async move {
                let _guard = match state.lock_owner(&owner_id).await {
                    Ok(guard) => guard,
                    Err(e) => {
                        error!("Job {} could not take the owner lock: {}", job_id, e);
                        return;
                    }
                };
                stream::run_worker(pipeline, state, job_id, control).await;
            });
        }
        ImportMode::Iterated => {
            return Err(ImportError::InvalidRequest(format!(
                "job {} is driven by the caller",
                job.id
            )))
        }
    }
    Ok(())
}

/// Restart workers of background and stream jobs left running by a
/// previous process. Caller-iterated jobs wait for their caller.
pub async fn resume_orphaned(pipeline: Pipeline, state: JobsState) -> Result<usize> {
    let lookup = pipeline.clone();
    let running = tokio::task::spawn_blocking(move || lookup.jobs().running()).await??;
    let mut resumed = 0;
    for job in running.iter().filter(|j| j.mode != ImportMode::Iterated) {
        match spawn_worker(pipeline.clone(), state.clone(), job).await {
            Ok(()) => {
                info!(
                    "Resuming {} job {} at offset {}",
                    job.mode.as_str(),
                    job.id,
                    job.source_offset
                );
                resumed += 1;
            }
            Err(e) => warn!("Could not resume job {}: {}", job.id, e),
        }
    }
    Ok(resumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::storage::LocalStorage;
    use crate::store::Database;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "Orgnr;Selskap;Aksjeklasse;Navn aksjonær;Fødselsår/orgnr;Landkode;Antall aksjer\n";

    fn fixture(files: &[(&str, String)]) -> (TempDir, Pipeline) {
        let dir = TempDir::new().unwrap();
        for (location, content) in files {
            let path = dir.path().join(location);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let mut config = AppConfig::default();
        config.retry.base_delay_ms = 1;
        config.retry.max_delay_ms = 2;
        let pipeline = Pipeline::new(
            &config,
            Arc::new(Database::open_in_memory().unwrap()),
            Arc::new(LocalStorage::new(dir.path().to_path_buf())),
        );
        (dir, pipeline)
    }

    fn registry(rows: &[&str]) -> String {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    fn request(location: &str, chunk_size: usize) -> StartImportRequest {
        StartImportRequest {
            source_location: location.to_string(),
            year: 2024,
            format: None,
            mapping: None,
            chunk_size: Some(chunk_size),
            mode: ImportMode::Iterated,
        }
    }

    fn totals(pipeline: &Pipeline, owner: &str) -> Vec<(String, i64)> {
        pipeline
            .db()
            .with_conn(|conn| aggregate::company_totals(conn, 2024, owner))
            .unwrap()
            .into_iter()
            .map(|c| (c.org_number, c.total_shares))
            .collect()
    }

    #[test]
    fn iterated_job_runs_to_completion() {
        let source = registry(&[
            "91234567;Test AS;A;Ola Nordmann;1980;NO;100",
            "91234567;Test AS;A;Kari Nordmann;1982;NO;50",
            "912345678;Annet AS;A;Holding AS;987654321;NO;0",
            "912345678;Annet AS;B;Holding AS;987654321;NO;900",
        ]);
        let (_dir, pipeline) = fixture(&[("o1/registry.csv", source)]);
        let job = pipeline.start_job("o1", &request("o1/registry.csv", 3)).unwrap();
        assert_eq!(job.status, JobState::Running);
        assert_eq!(job.total_rows, 0);

        let first = pipeline.process_chunk(&job.id, "o1", 0, None).unwrap();
        assert_eq!(first.next_offset, 3);
        assert_eq!(first.processed_in_chunk, 2);
        assert_eq!(first.rejected_in_chunk, 1);
        assert_eq!(first.job.total_rows, 4);
        assert!(!first.done);

        let last = pipeline.process_chunk(&job.id, "o1", 3, None).unwrap();
        assert!(last.done);
        assert_eq!(last.job.status, JobState::Completed);
        assert_eq!(last.job.rows_loaded, 3);
        assert_eq!(
            totals(&pipeline, "o1"),
            vec![("091234567".to_string(), 150), ("912345678".to_string(), 900)]
        );

        let report = pipeline.jobs().validation_report(&job.id, "o1").unwrap();
        assert_eq!(report.rejected_rows, 1);
        assert_eq!(report.sample[0].source_row, 3);
    }

    #[test]
    fn replayed_offsets_do_not_merge_twice() {
        let source = registry(&[
            "912345678;Test AS;A;Ola;1980;NO;10",
            "912345678;Test AS;A;Kari;1981;NO;20",
            "912345678;Test AS;A;Per;1982;NO;30",
        ]);
        let (_dir, pipeline) = fixture(&[("o1/r.csv", source)]);
        let job = pipeline.start_job("o1", &request("o1/r.csv", 2)).unwrap();

        let first = pipeline.process_chunk(&job.id, "o1", 0, None).unwrap();
        let replay = pipeline.process_chunk(&job.id, "o1", 0, None).unwrap();
        assert_eq!(replay.processed_in_chunk, 0);
        assert_eq!(replay.job.rows_loaded, first.job.rows_loaded);
        assert_eq!(replay.next_offset, 2);

        assert!(matches!(
            pipeline.process_chunk(&job.id, "o1", 5, None),
            Err(ImportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn importing_twice_keeps_the_same_totals() {
        let source = registry(&[
            "912345678;Test AS;A;Ola;1980;NO;10",
            "912345678;Test AS;B;Ola;1980;NO;5",
            "987654321;Other AS;A;Holding AS;912345678;SE;7",
        ]);
        let (_dir, pipeline) = fixture(&[("o1/r.csv", source)]);
        for _ in 0..2 {
            let job = pipeline.start_job("o1", &request("o1/r.csv", 2)).unwrap();
            let mut offset = 0;
            loop {
                let step = pipeline.process_chunk(&job.id, "o1", offset, None).unwrap();
                offset = step.next_offset;
                if step.done {
                    break;
                }
            }
        }
        assert_eq!(
            totals(&pipeline, "o1"),
            vec![("912345678".to_string(), 15), ("987654321".to_string(), 7)]
        );
    }

    #[test]
    fn foreign_locations_are_refused_before_any_job_exists() {
        let (_dir, pipeline) = fixture(&[]);
        assert!(matches!(
            pipeline.start_job("o1", &request("o2/r.csv", 10)),
            Err(ImportError::Forbidden(_))
        ));
        assert!(pipeline.jobs().list("o1").unwrap().is_empty());
    }

    #[test]
    fn unknown_extensions_are_unsupported() {
        let (_dir, pipeline) = fixture(&[]);
        assert!(matches!(
            pipeline.start_job("o1", &request("o1/r.pdf", 10)),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn missing_columns_fail_the_job() {
        let (_dir, pipeline) = fixture(&[("o1/r.csv", "Orgnr;Selskap\n912345678;Test AS\n".to_string())]);
        let job = pipeline.start_job("o1", &request("o1/r.csv", 10)).unwrap();
        let err = pipeline.process_chunk(&job.id, "o1", 0, None).unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));

        let job = pipeline.jobs().find(&job.id).unwrap();
        assert_eq!(job.status, JobState::Error);
        assert_eq!(job.rows_loaded, 0);
        assert!(job.error_message.unwrap().contains("holderName"));
    }

    #[test]
    fn missing_source_fails_the_job() {
        let (_dir, pipeline) = fixture(&[]);
        let job = pipeline.start_job("o1", &request("o1/gone.csv", 10)).unwrap();
        assert!(pipeline.process_chunk(&job.id, "o1", 0, None).is_err());
        assert_eq!(pipeline.jobs().find(&job.id).unwrap().status, JobState::Error);
    }

    #[test]
    fn cancelling_keeps_merged_batches() {
        let source = registry(&[
            "912345678;Test AS;A;Ola;1980;NO;10",
            "912345678;Test AS;A;Kari;1981;NO;20",
        ]);
        let (_dir, pipeline) = fixture(&[("o1/r.csv", source)]);
        let job = pipeline.start_job("o1", &request("o1/r.csv", 1)).unwrap();
        pipeline.process_chunk(&job.id, "o1", 0, None).unwrap();

        let cancelled = pipeline.cancel_job(&job.id, "o1").unwrap();
        assert_eq!(cancelled.status, JobState::Error);
        assert_eq!(cancelled.error_message.as_deref(), Some(CANCELLED_MESSAGE));
        assert_eq!(cancelled.rows_loaded, 1);

        let holdings = pipeline
            .db()
            .with_conn(|conn| merge::holdings_for_owner(conn, "o1"))
            .unwrap();
        assert_eq!(holdings.len(), 1);
    }

    #[tokio::test]
    async fn background_job_reports_through_the_updater() {
        let source = registry(&[
            "912345678;Test AS;A;Ola;1980;NO;10",
            "912345678;Test AS;A;Kari;1981;NO;20",
            "912345678;Test AS;A;Per;1982;NO;30",
        ]);
        let (_dir, pipeline) = fixture(&[("o1/r.csv", source)]);
        let mut req = request("o1/r.csv", 1);
        req.mode = ImportMode::Background;
        let job = pipeline.start_job("o1", &req).unwrap();

        let (state, mut rx) = JobsState::new(16);
        spawn_worker(pipeline.clone(), state.clone(), &job).await.unwrap();

        let mut last = None;
        while let Some(update) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
        {
            let done = update.status.done;
            last = Some(update.status);
            if done {
                break;
            }
        }
        let last = last.unwrap();
        assert_eq!(last.status, JobState::Completed);
        assert_eq!(last.rows_loaded, 3);
        assert_eq!(totals(&pipeline, "o1"), vec![("912345678".to_string(), 60)]);
    }

    #[tokio::test]
    async fn cancelling_a_paused_background_job_keeps_merged_batches() {
        let source = registry(&[
            "912345678;Test AS;A;Ola;1980;NO;10",
            "912345678;Test AS;A;Kari;1981;NO;20",
            "912345678;Test AS;A;Per;1982;NO;30",
        ]);
        let (_dir, pipeline) = fixture(&[("o1/r.csv", source)]);
        let mut req = request("o1/r.csv", 1);
        req.mode = ImportMode::Background;
        let job = pipeline.start_job("o1", &req).unwrap();
        let first = pipeline.process_next(&job.id).unwrap();
        assert_eq!(first.job.rows_loaded, 1);

        let (state, mut rx) = JobsState::new(16);
        let control = Arc::new(JobControl::default());
        control.pause();
        let worker = tokio::spawn(pipeline.clone().run_background(state, job.id.clone(), control.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(pipeline.jobs().find(&job.id).unwrap().rows_loaded, 1);

        control.cancel();
        let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        worker.await.unwrap();

        assert_eq!(update.status.status, JobState::Error);
        assert_eq!(update.status.error_message.as_deref(), Some(CANCELLED_MESSAGE));
        assert_eq!(update.status.rows_loaded, 1);
        assert_eq!(pipeline.jobs().find(&job.id).unwrap().status, JobState::Error);
        let holdings = pipeline
            .db()
            .with_conn(|conn| merge::holdings_for_owner(conn, "o1"))
            .unwrap();
        assert_eq!(holdings.len(), 1);
    }
}
