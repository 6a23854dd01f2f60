use crate::error::ImportError;
use crate::job_controller::state::JobsState;
use crate::pipeline::Pipeline;
use crate::services::owner::OwnerId;
use actix_web::{web, HttpResponse};
use registry_common::requests::ProcessChunkRequest;

/// The Actix web handler for `POST /api/imports/{job_id}/chunk`.
///
/// Processes one batch of a caller-iterated job starting at `offset`. The
/// caller feeds the returned `next_offset` into its next call until `done`.
/// An offset that was already processed returns the current checkpoint
/// without merging again. The owner's processing lock is held for the whole
/// step, so a concurrent step of the same owner gets `409`.
///
/// # Arguments
/// * `owner` - Caller identity from the `X-Owner-Id` header.
/// * `job_id` - Id of a caller-iterated job owned by the caller.
/// * `body` - `ProcessChunkRequest` with the offset and an optional limit.
/// * `pipeline` - Shared import pipeline.
/// * `state` - The shared `JobsState` holding the per-owner locks.
///
/// # Returns
/// A `ChunkOutcome` with the next offset, the rows processed in this step
/// and the job status.
pub(crate) async fn process(
    owner: OwnerId,
    job_id: web::Path<String>,
    body: web::Json<ProcessChunkRequest>,
    pipeline: web::Data<Pipeline>,
    state: web::Data<JobsState>,
) -> Result<HttpResponse, ImportError> {
    let _guard = state.try_lock_owner(owner.as_str())?;
    let job_id = job_id.into_inner();
    let ProcessChunkRequest { offset, limit } = body.into_inner();
    let pipeline = pipeline.get_ref().clone();
    let outcome =
        web::block(move || pipeline.process_chunk(&job_id, owner.as_str(), offset, limit)).await??;
    Ok(HttpResponse::Ok().json(outcome))
}
