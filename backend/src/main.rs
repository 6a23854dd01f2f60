use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::{info, warn};
use registry_backend::config::AppConfig;
use registry_backend::job_controller::state::{start_job_updater, JobsState};
use registry_backend::pipeline::{driver, Pipeline};
use registry_backend::services;
use registry_backend::storage::{LocalStorage, SourceStorage};
use registry_backend::store::Database;
use std::fs;
use std::io;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = AppConfig::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    env_logger::init_from_env(Env::default().default_filter_or(config.log_level.as_str()));

    if let Some(parent) = config.database.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir_all(&config.storage.root)?;

    let db = Database::open(&config.database.path).map_err(io::Error::other)?;
    let storage: Arc<dyn SourceStorage> = Arc::new(LocalStorage::new(config.storage.root.clone()));
    let pipeline = Pipeline::new(&config, Arc::new(db), storage);

    // Job controller state and its updater task
    let (jobs_state, rx) = JobsState::new(100);
    tokio::spawn(start_job_updater(jobs_state.clone(), rx));

    match driver::resume_orphaned(pipeline.clone(), jobs_state.clone()).await {
        Ok(0) => {}
        Ok(n) => info!("Resumed {} interrupted import jobs", n),
        Err(e) => warn!("Could not resume interrupted import jobs: {}", e),
    }

    let host = config.server.host.clone();
    let port = config.server.port;
    let json_limit = config.server.json_limit_bytes;
    info!(
        "Server running at http://{}:{} (database {}, storage {})",
        host,
        port,
        config.database.path.display(),
        config.storage.root.display()
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(json_limit))
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::new(jobs_state.clone()))
            .configure(services::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
