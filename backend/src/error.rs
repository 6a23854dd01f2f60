//! Error type shared by the pipeline, the store and the HTTP handlers.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use rusqlite::ErrorCode;
use thiserror::Error;

/// Coarse classification used for retry and job-failure decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Transient,
    Persistence,
    Authorization,
    State,
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Source changed since the job started (expected md5 {expected}, found {found})")]
    SourceChanged { expected: String, found: String },

    #[error("Transient storage error: {0}")]
    Transient(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Invalid progress: {0}")]
    InvalidProgress(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Import cancelled")]
    Cancelled,
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::Parse(_)
            | ImportError::UnsupportedFormat(_)
            | ImportError::SourceNotFound(_)
            | ImportError::SourceChanged { .. } => ErrorKind::Parse,
            ImportError::Transient(_) => ErrorKind::Transient,
            ImportError::Persistence(_) => ErrorKind::Persistence,
            ImportError::Unauthorized | ImportError::Forbidden(_) => ErrorKind::Authorization,
            ImportError::NotFound(_)
            | ImportError::InvalidTransition { .. }
            | ImportError::InvalidProgress(_)
            | ImportError::Conflict(_)
            | ImportError::InvalidRequest(_)
            | ImportError::Cancelled => ErrorKind::State,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Whether a job hitting this error must move to `error`.
    ///
    /// Caller mistakes (bad offset, lock contention, ...) leave the job untouched.
    pub fn fails_job(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Parse | ErrorKind::Transient | ErrorKind::Persistence
        )
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) =>
            {
                ImportError::Transient(e.to_string())
            }
            _ => ImportError::Persistence(e.to_string()),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        match e.kind() {
            Io::NotFound => ImportError::SourceNotFound(e.to_string()),
            Io::Interrupted | Io::TimedOut | Io::WouldBlock => ImportError::Transient(e.to_string()),
            _ => ImportError::Persistence(e.to_string()),
        }
    }
}

impl From<csv::Error> for ImportError {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            match e.into_kind() {
                csv::ErrorKind::Io(io) => io.into(),
                other => ImportError::Parse(format!("{:?}", other)),
            }
        } else {
            ImportError::Parse(e.to_string())
        }
    }
}

impl From<calamine::Error> for ImportError {
    fn from(e: calamine::Error) -> Self {
        ImportError::Parse(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ImportError {
    fn from(e: tokio::task::JoinError) -> Self {
        ImportError::Persistence(format!("worker task failed: {}", e))
    }
}

impl From<actix_web::error::BlockingError> for ImportError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        ImportError::Persistence(format!("blocking task failed: {}", e))
    }
}

impl ResponseError for ImportError {
    fn status_code(&self) -> StatusCode {
        match self {
            ImportError::Parse(_)
            | ImportError::UnsupportedFormat(_)
            | ImportError::SourceChanged { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ImportError::SourceNotFound(_) | ImportError::NotFound(_) => StatusCode::NOT_FOUND,
            ImportError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            ImportError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ImportError::Unauthorized => StatusCode::UNAUTHORIZED,
            ImportError::Forbidden(_) => StatusCode::FORBIDDEN,
            ImportError::InvalidTransition { .. }
            | ImportError::InvalidProgress(_)
            | ImportError::Conflict(_)
            | ImportError::Cancelled => StatusCode::CONFLICT,
            ImportError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ImportError::Persistence(_) => "Internal storage error".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_database_is_transient() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        let err: ImportError = busy.into();
        assert!(err.is_transient());
        assert!(err.fails_job());

        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("UNIQUE constraint failed".to_string()),
        );
        let err: ImportError = constraint.into();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn caller_mistakes_do_not_fail_jobs() {
        assert!(!ImportError::Conflict("busy".into()).fails_job());
        assert!(!ImportError::InvalidRequest("gap".into()).fails_job());
        assert!(!ImportError::Forbidden("o2".into()).fails_job());
        assert!(ImportError::Parse("bad".into()).fails_job());
    }

    #[test]
    fn io_errors_are_classified() {
        let err: ImportError = std::io::Error::from(std::io::ErrorKind::TimedOut).into();
        assert!(err.is_transient());
        let err: ImportError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
