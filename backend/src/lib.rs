//! Bulk import of shareholder-registry files into per-owner company,
//! entity and holding tables.

pub mod config;
pub mod error;
pub mod job_controller;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod store;
