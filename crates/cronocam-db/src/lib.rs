//! Cronocam Database Layer
//!
//! This crate provides the deduplication ledger: a persistent mapping from file
//! content fingerprints to remote media identifiers, plus a log of failed
//! upload attempts.

pub mod db;
pub mod error;

pub use db::{connect, UploadLedger, MIGRATOR};
pub use error::LedgerError;
