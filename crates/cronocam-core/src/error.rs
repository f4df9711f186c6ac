//! Error metadata shared by the typed errors of the library crates.
//!
//! Each crate keeps its own `thiserror` enum; this module only describes how a
//! failure should be classified and reported so the run pipeline can treat
//! ledger, transfer and rate-limit failures uniformly.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected outcomes like an already-recorded fingerprint
    Debug,
    /// Warning level - for per-file failures the run recovers from
    Warn,
    /// Error level - for unexpected failures (storage, protocol violations)
    Error,
}

/// Metadata describing how an error should be treated by callers
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "SESSION_START_FAILED")
    fn error_code(&self) -> &'static str;

    /// Whether work can go on after this error; `false` ends the whole run
    fn is_recoverable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}
