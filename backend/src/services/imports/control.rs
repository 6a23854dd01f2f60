//! Pause, resume and cancel. Pause and resume only apply to jobs the
//! server is processing; a caller-iterated job is paused by not calling
//! `/chunk`.

use crate::error::ImportError;
use crate::job_controller::state::JobsState;
use crate::pipeline::Pipeline;
use crate::services::owner::OwnerId;
use actix_web::{web, HttpResponse};
use log::info;

async fn owned_job(pipeline: &Pipeline, owner: &OwnerId, job_id: &str) -> Result<(), ImportError> {
    let pipeline = pipeline.clone();
    let owner_id = owner.0.clone();
    let job_id = job_id.to_string();
    web::block(move || pipeline.jobs().get(&job_id, &owner_id)).await??;
    Ok(())
}

async fn status_response(pipeline: &Pipeline, job_id: String) -> Result<HttpResponse, ImportError> {
    let pipeline = pipeline.clone();
    let job = web::block(move || pipeline.jobs().find(&job_id)).await??;
    Ok(HttpResponse::Ok().json(job.to_status()))
}

/// `POST /api/imports/{job_id}/pause`
pub(crate) async fn pause(
    owner: OwnerId,
    job_id: web::Path<String>,
    pipeline: web::Data<Pipeline>,
    state: web::Data<JobsState>,
) -> Result<HttpResponse, ImportError> {
    let job_id = job_id.into_inner();
    owned_job(&pipeline, &owner, &job_id).await?;
    state.pause(&job_id).await?;
    status_response(&pipeline, job_id).await
}

/// `POST /api/imports/{job_id}/resume`
pub(crate) async fn resume(
    owner: OwnerId,
    job_id: web::Path<String>,
    pipeline: web::Data<Pipeline>,
    state: web::Data<JobsState>,
) -> Result<HttpResponse, ImportError> {
    let job_id = job_id.into_inner();
    owned_job(&pipeline, &owner, &job_id).await?;
    state.resume(&job_id).await?;
    status_response(&pipeline, job_id).await
}

/// `POST /api/imports/{job_id}/cancel`
///
/// A live job is signalled and fails itself at its next row or batch
/// boundary; any other job is failed here.
pub(crate) async fn cancel(
    owner: OwnerId,
    job_id: web::Path<String>,
    pipeline: web::Data<Pipeline>,
    state: web::Data<JobsState>,
) -> Result<HttpResponse, ImportError> {
    let job_id = job_id.into_inner();
    owned_job(&pipeline, &owner, &job_id).await?;
    if state.cancel(&job_id).await {
        info!("Cancel signalled to job {}", job_id);
        return status_response(&pipeline, job_id).await;
    }
    let worker = pipeline.get_ref().clone();
    let job = web::block(move || worker.cancel_job(&job_id, owner.as_str())).await??;
    Ok(HttpResponse::Ok().json(job.to_status()))
}
