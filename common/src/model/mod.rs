pub mod import;
pub mod mapping;
pub mod shareholder;
