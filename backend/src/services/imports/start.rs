use crate::error::ImportError;
use crate::job_controller::state::JobsState;
use crate::pipeline::{driver, Pipeline};
use crate::services::owner::OwnerId;
use actix_web::{web, HttpResponse};
use log::error;
use registry_common::model::import::ImportMode;
use registry_common::requests::StartImportRequest;

/// The Actix web handler for `POST /api/imports/start`.
///
/// Creates an import job for a previously uploaded source. Caller-iterated
/// jobs then wait for chunk calls; background and stream jobs are picked up
/// by a worker right away.
///
/// # Arguments
/// * `owner` - Caller identity from the `X-Owner-Id` header.
/// * `body` - The `StartImportRequest` naming the source, year and mode.
/// * `pipeline` - Shared import pipeline.
/// * `state` - The shared `JobsState`, for registering the worker.
///
/// # Returns
/// The new job's `JobStatus`, or `409` when the owner already has a
/// running job.
pub(crate) async fn process(
    owner: OwnerId,
    body: web::Json<StartImportRequest>,
    pipeline: web::Data<Pipeline>,
    state: web::Data<JobsState>,
) -> Result<HttpResponse, ImportError> {
    start_import(owner, body.into_inner(), pipeline, state).await
}

/// The Actix web handler for `POST /api/imports/stream`.
///
/// Same as `/start` with the mode forced to `stream`; only delimited
/// sources are accepted.
pub(crate) async fn stream(
    owner: OwnerId,
    body: web::Json<StartImportRequest>,
    pipeline: web::Data<Pipeline>,
    state: web::Data<JobsState>,
) -> Result<HttpResponse, ImportError> {
    let mut request = body.into_inner();
    request.mode = ImportMode::Stream;
    start_import(owner, request, pipeline, state).await
}

/// Create the job and, for server-driven modes, hand it to a worker.
///
/// A job whose worker cannot be started is failed before the error is
/// returned, so the owner is not left with a running job nobody drives.
async fn start_import(
    owner: OwnerId,
    request: StartImportRequest,
    pipeline: web::Data<Pipeline>,
    state: web::Data<JobsState>,
) -> Result<HttpResponse, ImportError> {
    let worker = pipeline.get_ref().clone();
    let job = web::block(move || worker.start_job(owner.as_str(), &request)).await??;

    if job.mode != ImportMode::Iterated {
        if let Err(e) = driver::spawn_worker(pipeline.get_ref().clone(), state.get_ref().clone(), &job).await {
            error!("Could not start worker for job {}: {}", job.id, e);
            let failing = pipeline.get_ref().clone();
            let job_id = job.id.clone();
            let message = e.to_string();
            web::block(move || failing.fail_job(&job_id, &message)).await??;
            return Err(e);
        }
    }
    Ok(HttpResponse::Ok().json(job.to_status()))
}
