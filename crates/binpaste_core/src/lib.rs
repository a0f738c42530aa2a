//! Core domain library for binpaste (paste lifecycle, storage, background jobs).

/// One-time paste burn.
pub mod burn;
/// Configuration loading and defaults.
pub mod config;
/// Shared constants.
pub mod constants;
/// Database access layer.
pub mod db;
/// Application error types (storage/domain).
pub mod error;
/// Paste id generation and validation.
pub mod id;
/// Data models for API requests and persistence.
pub mod models;
/// Optimistic versioned mutation with bounded retry.
pub mod mutation;
/// Expiry and retention sweeps.
pub mod reaper;
/// Full-text search providers and fallback chain.
pub mod search;
/// Operations exposed to the HTTP layer.
pub mod service;
/// Durable view-tracking pipeline.
pub mod tracking;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use constants::DEFAULT_PORT;
pub use db::Database;
pub use error::AppError;
pub use service::PasteService;
