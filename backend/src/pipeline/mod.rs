//! The import pipeline: read a chunk of the source, normalize it, stage it
//! and merge it into the canonical tables, then checkpoint the job.

pub mod driver;
pub mod normalize;
pub mod reader;
pub mod retry;
pub mod stream;

use crate::config::{AppConfig, ImportConfig};
use crate::job_controller::manager::JobManager;
use crate::storage::SourceStorage;
use crate::store::Database;
use reader::SourceCache;
use retry::RetryPolicy;
use std::sync::Arc;

/// Message stored on jobs stopped by a cancel request.
pub const CANCELLED_MESSAGE: &str = "import cancelled";

/// Shared, clonable entry point used by the HTTP handlers and the
/// background workers. All methods block; call them from
/// `spawn_blocking` in async code.
#[derive(Clone)]
pub struct Pipeline {
    db: Arc<Database>,
    storage: Arc<dyn SourceStorage>,
    cache: Arc<SourceCache>,
    jobs: JobManager,
    retry: RetryPolicy,
    settings: ImportConfig,
}

impl Pipeline {
    pub fn new(config: &AppConfig, db: Arc<Database>, storage: Arc<dyn SourceStorage>) -> Self {
        Self {
            jobs: JobManager::new(db.clone(), config.import.max_error_samples),
            cache: Arc::new(SourceCache::new(config.import.source_cache_entries)),
            retry: RetryPolicy::from(&config.retry),
            settings: config.import.clone(),
            db,
            storage,
        }
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn storage(&self) -> &dyn SourceStorage {
        self.storage.as_ref()
    }

    pub fn settings(&self) -> &ImportConfig {
        &self.settings
    }
}
