//! HTTP API of the import pipeline.
//!
//! Every route requires the `X-Owner-Id` header (see `services::owner`);
//! jobs and sources of other owners are refused with `403`.
//!
//! - `POST /api/imports/upload`: multipart upload of a registry file
//!   (`file` field). The file is stored under the owner's prefix with a
//!   name derived from its MD5 hash.
//! - `POST /api/imports/start`: creates a job for an uploaded source. In
//!   `background` and `stream` mode the server processes it right away;
//!   in `iterated` mode the client drives it through `/chunk`.
//! - `POST /api/imports/stream`: same as `/start` with `mode = stream`.
//! - `POST /api/imports/{job_id}/chunk`: processes one chunk at the
//!   offset returned by the previous call.
//! - `GET /api/imports`, `GET /api/imports/{job_id}`: job status.
//! - `GET /api/imports/{job_id}/errors`: rejected row count and sample.
//! - `POST /api/imports/{job_id}/pause|resume|cancel`: control of
//!   server-driven jobs. `cancel` also stops caller-iterated jobs.

use actix_web::web::{get, post, scope};
use actix_web::Scope;

mod chunk;
mod control;
mod start;
mod status;
mod upload;

const API_PATH: &str = "/api/imports";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(status::list))
        .route("/upload", post().to(upload::process))
        .route("/start", post().to(start::process))
        .route("/stream", post().to(start::stream))
        .route("/{job_id}", get().to(status::process))
        .route("/{job_id}/errors", get().to(status::errors))
        .route("/{job_id}/chunk", post().to(chunk::process))
        .route("/{job_id}/pause", post().to(control::pause))
        .route("/{job_id}/resume", post().to(control::resume))
        .route("/{job_id}/cancel", post().to(control::cancel))
}
