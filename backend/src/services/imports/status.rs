use crate::error::ImportError;
use crate::pipeline::Pipeline;
use crate::services::owner::OwnerId;
use actix_web::{web, HttpResponse};
use registry_common::jobs::JobStatus;

/// The Actix web handler for `GET /api/imports/{job_id}`.
///
/// Clients poll this while a background or stream job runs.
///
/// # Arguments
/// * `owner` - Caller identity; jobs of other owners are `403`.
/// * `job_id` - Id of the job to inspect.
/// * `pipeline` - Shared import pipeline.
///
/// # Returns
/// The job's `JobStatus`, or `404` for an unknown id.
pub(crate) async fn process(
    owner: OwnerId,
    job_id: web::Path<String>,
    pipeline: web::Data<Pipeline>,
) -> Result<HttpResponse, ImportError> {
    let pipeline = pipeline.get_ref().clone();
    let job_id = job_id.into_inner();
    let job = web::block(move || pipeline.jobs().get(&job_id, owner.as_str())).await??;
    Ok(HttpResponse::Ok().json(job.to_status()))
}

/// `GET /api/imports`: every job of the caller, newest first.
pub(crate) async fn list(owner: OwnerId, pipeline: web::Data<Pipeline>) -> Result<HttpResponse, ImportError> {
    let pipeline = pipeline.get_ref().clone();
    let jobs = web::block(move || pipeline.jobs().list(owner.as_str())).await??;
    let statuses: Vec<JobStatus> = jobs.iter().map(|job| job.to_status()).collect();
    Ok(HttpResponse::Ok().json(statuses))
}

/// The Actix web handler for `GET /api/imports/{job_id}/errors`.
///
/// # Returns
/// A `ValidationReport` with the number of rejected rows and a capped
/// sample of their row numbers and reasons.
pub(crate) async fn errors(
    owner: OwnerId,
    job_id: web::Path<String>,
    pipeline: web::Data<Pipeline>,
) -> Result<HttpResponse, ImportError> {
    let pipeline = pipeline.get_ref().clone();
    let job_id = job_id.into_inner();
    let report =
        web::block(move || pipeline.jobs().validation_report(&job_id, owner.as_str())).await??;
    Ok(HttpResponse::Ok().json(report))
}
