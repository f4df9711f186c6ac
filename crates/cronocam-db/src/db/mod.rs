//! Database repositories for the data access layer
//
// Connection setup and migrations
mod pool;
//
// Upload ledger (records + failure log)
mod ledger;

pub use ledger::UploadLedger;
pub use pool::{connect, MIGRATOR};
