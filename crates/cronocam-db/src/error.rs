//! Ledger error types

use cronocam_core::{ErrorMetadata, LogLevel};
use thiserror::Error;

/// Ledger operation errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The fingerprint is already recorded. This is an admission signal, not a fault.
    #[error("Content fingerprint already recorded: {0}")]
    Duplicate(String),

    #[error("Ledger storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Ledger migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Map an insert failure, turning a uniqueness violation into `Duplicate`.
    pub(crate) fn from_insert(err: sqlx::Error, content_hash: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                LedgerError::Duplicate(content_hash.to_string())
            }
            _ => LedgerError::Storage(err),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, LedgerError::Duplicate(_))
    }
}

impl ErrorMetadata for LedgerError {
    fn error_code(&self) -> &'static str {
        match self {
            LedgerError::Duplicate(_) => "DUPLICATE_FINGERPRINT",
            LedgerError::Storage(_) => "LEDGER_STORAGE_ERROR",
            LedgerError::Migration(_) => "LEDGER_MIGRATION_ERROR",
            LedgerError::Io(_) => "LEDGER_IO_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, LedgerError::Duplicate(_) | LedgerError::Storage(_))
    }

    fn log_level(&self) -> LogLevel {
        match self {
            LedgerError::Duplicate(_) => LogLevel::Debug,
            _ => LogLevel::Error,
        }
    }
}
