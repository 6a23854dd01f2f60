//! Streaming front end for delimited sources.
//!
//! Records are pulled from the parser one at a time and buffered into a
//! batch of `job.chunk_size` rows. Parsing stops while a full batch is
//! staged and merged, so memory stays bounded by the batch size whatever
//! the size of the source.
//!
//! The stream is controlled through a `StreamHandle`: `pause`, `resume`
//! and `cancel` commands travel over a channel and take effect at the next
//! row boundary.

use super::driver::require_columns;
use super::normalize::{normalize_batch, ColumnResolver};
use super::reader::{align, decode_field, decode_text, detect_delimiter, is_blank, RawRow};
use super::{Pipeline, CANCELLED_MESSAGE};
use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::job_controller::state::{JobUpdate, JobsState};
use crate::store::jobs::{Checkpoint, JobRecord};
use log::{error, info, warn};
use registry_common::jobs::JobState;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

pub const MIN_BATCH_SIZE: usize = 2_000;
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Batch size of a new stream job.
pub fn batch_size(requested: Option<usize>, settings: &ImportConfig) -> usize {
    requested
        .unwrap_or(settings.stream_batch_size)
        .clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
    Paused,
    Cancelled,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCommand {
    Pause,
    Resume,
    Cancel,
}

/// Sending side of a stream's control channel. Cheap to clone.
#[derive(Clone)]
pub struct StreamHandle {
    commands: Sender<StreamCommand>,
    state: Arc<Mutex<StreamState>>,
}

impl StreamHandle {
    fn send(&self, command: StreamCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ImportError::InvalidRequest("stream has already finished".to_string()))
    }

    pub fn pause(&self) -> Result<()> {
        self.send(StreamCommand::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(StreamCommand::Resume)
    }

    pub fn cancel(&self) -> Result<()> {
        self.send(StreamCommand::Cancel)
    }

    pub fn state(&self) -> StreamState {
        self.state.lock().map(|s| *s).unwrap_or(StreamState::Done)
    }
}

/// Receiving side, owned by the thread that parses the stream.
pub struct StreamControl {
    commands: Receiver<StreamCommand>,
    state: Arc<Mutex<StreamState>>,
}

pub fn channel() -> (StreamHandle, StreamControl) {
    let (tx, rx) = mpsc::channel();
    let state = Arc::new(Mutex::new(StreamState::Idle));
    (
        StreamHandle {
            commands: tx,
            state: state.clone(),
        },
        StreamControl {
            commands: rx,
            state,
        },
    )
}

impl StreamControl {
    pub fn state(&self) -> StreamState {
        self.state.lock().map(|s| *s).unwrap_or(StreamState::Done)
    }

    fn set(&self, next: StreamState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    fn apply(&self, command: StreamCommand) {
        let next = match (self.state(), command) {
            (StreamState::Done, _) | (StreamState::Cancelled, _) => return,
            (_, StreamCommand::Cancel) => StreamState::Cancelled,
            (StreamState::Streaming, StreamCommand::Pause) => StreamState::Paused,
            (StreamState::Paused, StreamCommand::Resume) => StreamState::Streaming,
            _ => return,
        };
        self.set(next);
    }

    /// Apply pending commands at a row boundary, blocking while paused.
    /// Returns `false` once the stream is cancelled.
    pub fn proceed(&self) -> bool {
        if self.state() == StreamState::Idle {
            self.set(StreamState::Streaming);
        }
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.apply(command),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        while self.state() == StreamState::Paused {
            match self.commands.recv() {
                Ok(command) => self.apply(command),
                Err(_) => {
                    warn!("Stream paused with no controller left; cancelling");
                    self.set(StreamState::Cancelled);
                }
            }
        }
        self.state() != StreamState::Cancelled
    }
}

struct BatchWriter<'a> {
    pipeline: &'a Pipeline,
    resolver: ColumnResolver,
    job: JobRecord,
    buffer: Vec<RawRow>,
    batch_size: usize,
}

impl BatchWriter<'_> {
    /// Merge the buffered rows and checkpoint `consumed` rows.
    fn flush(&mut self, consumed: u64, total_rows: Option<u64>) -> Result<()> {
        let batch = normalize_batch(
            &self.resolver,
            &self.buffer,
            self.job.year,
            self.pipeline.settings().max_error_samples,
        );
        let loaded = batch.rows.len() as u64;
        let counts = self.pipeline.load_batch(&self.job.owner_id, &batch.rows)?;
        let checkpoint = Checkpoint {
            source_offset: consumed,
            rows_loaded: self.job.rows_loaded + loaded,
            rejected_rows: self.job.rejected_rows + batch.rejected,
            total_rows,
        };
        self.job = self
            .pipeline
            .jobs()
            .record_chunk(&self.job.id, &checkpoint, &batch.rejections)?;
        info!(
            "Stream job {}: {} rows consumed, {} merged ({} holdings), {} rejected",
            self.job.id, consumed, loaded, counts.holdings, batch.rejected
        );
        self.buffer.clear();
        Ok(())
    }
}

fn stream_rows<R: Read>(pipeline: &Pipeline, job_id: &str, source: R, control: &StreamControl) -> Result<JobRecord> {
    let job = pipeline.jobs().find(job_id)?;
    if job.status != JobState::Running {
        return Ok(job);
    }

    let mut input = BufReader::new(source);
    let mut header = Vec::new();
    input.read_until(b'\n', &mut header)?;
    if let Some(stripped) = header.strip_prefix(b"\xEF\xBB\xBF") {
        header = stripped.to_vec();
    }
    let delimiter = {
        let header_text = decode_text(&header);
        if header_text.trim().is_empty() {
            return Err(ImportError::Parse("source has no header row".to_string()));
        }
        detect_delimiter(&header_text)
    };

    let mut csv = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(Cursor::new(header).chain(input));
    let headers: Vec<String> = csv
        .byte_headers()?
        .iter()
        .map(|h| decode_field(h).trim().to_string())
        .collect();

    let resolver = ColumnResolver::new(&headers, &job.mapping);
    require_columns(&resolver)?;

    let skip = job.source_offset;
    if skip > 0 {
        info!("Stream job {} resumes after {} rows", job.id, skip);
    }
    let batch_size = job.chunk_size.max(1);
    let mut writer = BatchWriter {
        pipeline,
        resolver,
        buffer: Vec::with_capacity(batch_size),
        batch_size,
        job,
    };

    let mut record = csv::ByteRecord::new();
    let mut consumed: u64 = 0;
    loop {
        if !control.proceed() {
            info!(
                "Stream job {} cancelled after {} rows; {} buffered rows dropped",
                writer.job.id,
                consumed,
                writer.buffer.len()
            );
            return pipeline.fail_job(&writer.job.id, CANCELLED_MESSAGE);
        }
        if !csv.read_byte_record(&mut record)? {
            break;
        }
        let values: Vec<String> = record.iter().map(decode_field).collect();
        if is_blank(&values) {
            continue;
        }
        consumed += 1;
        if consumed <= skip {
            continue;
        }
        writer.buffer.push(RawRow {
            source_row: consumed,
            values: align(values, headers.len()),
        });
        if writer.buffer.len() >= writer.batch_size {
            writer.flush(consumed, None)?;
        }
    }

    if consumed < skip {
        return Err(ImportError::Parse(format!(
            "source has {} rows but {} were already consumed",
            consumed, skip
        )));
    }
    writer.flush(consumed, Some(consumed))?;
    control.set(StreamState::Done);
    pipeline.finalize(&writer.job)
}

fn fail_on_error(pipeline: &Pipeline, job_id: &str, result: Result<JobRecord>) -> Result<JobRecord> {
    match result {
        Err(e) if e.fails_job() => {
            if let Err(fail_err) = pipeline.fail_job(job_id, &e.to_string()) {
                error!("Could not mark job {} as failed: {}", job_id, fail_err);
            }
            Err(e)
        }
        other => other,
    }
}

/// Stream `source` into the job's owner tables. Blocks until the stream is
/// done or cancelled. Fatal errors move the job to `error`.
pub fn run_stream<R: Read>(pipeline: &Pipeline, job_id: &str, source: R, control: &StreamControl) -> Result<JobRecord> {
    let result = stream_rows(pipeline, job_id, source, control);
    fail_on_error(pipeline, job_id, result)
}

/// Open the job's source from storage and stream it.
pub fn run_from_storage(pipeline: &Pipeline, job_id: &str, control: &StreamControl) -> Result<JobRecord> {
    let result = pipeline
        .jobs()
        .find(job_id)
        .and_then(|job| pipeline.storage().open(&job.source_location))
        .and_then(|source| stream_rows(pipeline, job_id, source, control));
    fail_on_error(pipeline, job_id, result)
}

/// Worker task of a stream job: runs the stream on a blocking thread and
/// reports the final status.
pub async fn run_worker(pipeline: Pipeline, state: JobsState, job_id: String, control: StreamControl) {
    let worker = pipeline.clone();
    let id = job_id.clone();
    let finished = tokio::task::spawn_blocking(move || run_from_storage(&worker, &id, &control)).await;
    let status = match finished {
        Ok(Ok(job)) => job.to_status(),
        Ok(Err(e)) => {
            error!("Stream job {} stopped: {}", job_id, e);
            let lookup = pipeline.clone();
            let id = job_id.clone();
            match tokio::task::spawn_blocking(move || lookup.jobs().find(&id)).await {
                Ok(Ok(job)) => job.to_status(),
                _ => return,
            }
        }
        Err(e) => {
            error!("Stream worker of job {} panicked: {}", job_id, e);
            return;
        }
    };
    if state.tx.send(JobUpdate { job_id, status }).await.is_err() {
        warn!("Job updater is gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::job_controller::manager::JobSpec;
    use crate::storage::LocalStorage;
    use crate::store::merge::{self, HoldingRecord};
    use crate::store::Database;
    use registry_common::model::import::{ImportMode, SourceFormat};
    use registry_common::model::mapping::FieldMapping;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    const SOURCE: &str = "Orgnr;Selskap;Aksjeklasse;Navn aksjonær;Fødselsår/orgnr;Landkode;Antall aksjer\n\
        912345678;Test AS;A;Ola;1980;NO;10\n\
        912345678;Test AS;A;Kari;1981;NO;20\n\
        912345678;Test AS;B;Per;1982;NO;30\n\
        \n\
        987654321;Other AS;A;Holding AS;912345678;NO;40\n\
        987654321;Other AS;A;Nils;1990;NO;0\n";

    /// Hands out one line per `read` call and fires a command when a given
    /// line is handed out.
    struct LineReader {
        lines: Vec<Vec<u8>>,
        next: usize,
        trigger: Option<(usize, StreamHandle, StreamCommand)>,
    }

    impl LineReader {
        fn new(text: &str, trigger: Option<(usize, StreamHandle, StreamCommand)>) -> Self {
            Self {
                lines: text.split_inclusive('\n').map(|l| l.as_bytes().to_vec()).collect(),
                next: 0,
                trigger,
            }
        }
    }

    impl Read for LineReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let Some(line) = self.lines.get(self.next) else {
                return Ok(0);
            };
            if let Some((at, handle, command)) = &self.trigger {
                if *at == self.next {
                    let _ = match command {
                        StreamCommand::Pause => handle.pause(),
                        StreamCommand::Resume => handle.resume(),
                        StreamCommand::Cancel => handle.cancel(),
                    };
                }
            }
            assert!(buf.len() >= line.len());
            buf[..line.len()].copy_from_slice(line);
            self.next += 1;
            Ok(line.len())
        }
    }

    fn pipeline() -> (TempDir, Pipeline) {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            &AppConfig::default(),
            Arc::new(Database::open_in_memory().unwrap()),
            Arc::new(LocalStorage::new(dir.path().to_path_buf())),
        );
        (dir, pipeline)
    }

    fn stream_job(pipeline: &Pipeline, owner: &str) -> JobRecord {
        pipeline
            .jobs()
            .create(JobSpec {
                owner_id: owner.to_string(),
                source_location: format!("{}/registry.csv", owner),
                format: SourceFormat::Delimited,
                mode: ImportMode::Stream,
                year: 2024,
                mapping: FieldMapping::new(),
                chunk_size: 2,
            })
            .unwrap()
    }

    fn holdings(pipeline: &Pipeline, owner: &str) -> Vec<HoldingRecord> {
        pipeline
            .db()
            .with_conn(|conn| merge::holdings_for_owner(conn, owner))
            .unwrap()
    }

    fn wait_for(handle: &StreamHandle, wanted: StreamState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.state() != wanted {
            assert!(Instant::now() < deadline, "stream never reached {:?}", wanted);
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn uninterrupted_stream_completes() {
        let (_dir, pipeline) = pipeline();
        let job = stream_job(&pipeline, "o1");
        let (handle, control) = channel();
        let done = run_stream(&pipeline, &job.id, LineReader::new(SOURCE, None), &control).unwrap();

        assert_eq!(done.status, JobState::Completed);
        assert_eq!(done.total_rows, 5);
        assert_eq!(done.source_offset, 5);
        assert_eq!(done.rows_loaded, 4);
        assert_eq!(done.rejected_rows, 1);
        assert_eq!(handle.state(), StreamState::Done);
        assert_eq!(holdings(&pipeline, "o1").len(), 4);
    }

    #[test]
    fn pause_and_resume_match_an_uninterrupted_run() {
        let (_dir, pipeline) = pipeline();
        let plain = stream_job(&pipeline, "plain");
        let (_plain_handle, plain_control) = channel();
        run_stream(&pipeline, &plain.id, LineReader::new(SOURCE, None), &plain_control).unwrap();

        let job = stream_job(&pipeline, "paused");
        let (handle, control) = channel();
        // Line 3 is the first row of the second batch.
        let reader = LineReader::new(SOURCE, Some((3, handle.clone(), StreamCommand::Pause)));
        let worker = {
            let pipeline = pipeline.clone();
            let job_id = job.id.clone();
            thread::spawn(move || run_stream(&pipeline, &job_id, reader, &control))
        };

        wait_for(&handle, StreamState::Paused);
        let paused = pipeline.jobs().find(&job.id).unwrap();
        assert_eq!(paused.status, JobState::Running);
        assert_eq!(paused.source_offset, 2);
        assert!(!paused.to_status().done);

        handle.resume().unwrap();
        let done = worker.join().unwrap().unwrap();
        assert_eq!(done.status, JobState::Completed);
        assert_eq!(holdings(&pipeline, "paused"), holdings(&pipeline, "plain"));
    }

    #[test]
    fn cancel_keeps_merged_batches() {
        let (_dir, pipeline) = pipeline();
        let job = stream_job(&pipeline, "o1");
        let (handle, control) = channel();
        let reader = LineReader::new(SOURCE, Some((3, handle.clone(), StreamCommand::Cancel)));

        let cancelled = run_stream(&pipeline, &job.id, reader, &control).unwrap();
        assert_eq!(cancelled.status, JobState::Error);
        assert_eq!(cancelled.error_message.as_deref(), Some(CANCELLED_MESSAGE));
        assert_eq!(cancelled.rows_loaded, 2);
        assert_eq!(handle.state(), StreamState::Cancelled);
        assert_eq!(holdings(&pipeline, "o1").len(), 2);
    }

    #[test]
    fn resumed_stream_skips_consumed_rows() {
        let (_dir, pipeline) = pipeline();
        let job = stream_job(&pipeline, "o1");
        pipeline
            .jobs()
            .record_chunk(
                &job.id,
                &Checkpoint {
                    source_offset: 3,
                    rows_loaded: 3,
                    rejected_rows: 0,
                    total_rows: None,
                },
                &[],
            )
            .unwrap();

        let (_handle, control) = channel();
        let done = run_stream(&pipeline, &job.id, LineReader::new(SOURCE, None), &control).unwrap();
        assert_eq!(done.status, JobState::Completed);
        assert_eq!(done.rows_loaded, 4);
        // Only rows after the checkpoint were merged by this run.
        assert_eq!(holdings(&pipeline, "o1").len(), 1);
    }

    #[test]
    fn missing_columns_fail_the_stream_job() {
        let (_dir, pipeline) = pipeline();
        let job = stream_job(&pipeline, "o1");
        let (_handle, control) = channel();
        let result = run_stream(&pipeline, &job.id, "Orgnr,Selskap\n1,2\n".as_bytes(), &control);
        assert!(matches!(result, Err(ImportError::Parse(_))));
        assert_eq!(pipeline.jobs().find(&job.id).unwrap().status, JobState::Error);
    }

    #[test]
    fn batch_size_is_clamped() {
        let settings = ImportConfig::default();
        assert_eq!(batch_size(None, &settings), settings.stream_batch_size);
        assert_eq!(batch_size(Some(10), &settings), MIN_BATCH_SIZE);
        assert_eq!(batch_size(Some(1_000_000), &settings), MAX_BATCH_SIZE);
    }
}
