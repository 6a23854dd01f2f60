//! Types shared between the import service and its clients.

pub mod jobs;
pub mod model;
pub mod requests;
