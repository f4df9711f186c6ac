//! Cronocam Core Library
//!
//! This crate provides the configuration, domain models, supported-format policy
//! and error metadata that are shared across all cronocam components.

pub mod config;
pub mod error;
pub mod formats;
pub mod models;

// Re-export commonly used types
pub use config::{Config, UploaderConfig};
pub use error::{ErrorMetadata, LogLevel};
pub use formats::{content_type_for, FormatPolicy};
pub use models::{UploadFailure, UploadRecord, UploadStats};
