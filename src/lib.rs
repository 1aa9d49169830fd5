//! Faculty performance tracking: record storage, zone classification,
//! list and report derivation, CSV template/import and the HTTP API that
//! serves them.

pub mod api;
pub mod config;
pub mod db;
pub mod env_file;
pub mod error;
pub mod listing;
pub mod models;
pub mod report;
pub mod store;
pub mod template;
pub mod upload;
pub mod zone;
