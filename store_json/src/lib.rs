//! JSON file storage backend for the sanka points ledger.
//!
//! Implements all storage traits from `sanka-store` on top of a data
//! directory:
//!
//! - `state.json`: members, activities, participations and verification
//!   requests, rewritten atomically (temp file + rename) after each change.
//! - `transactions.jsonl`: the append-only ledger, one JSON object per line.
//! - `uploads/`: evidence attachments.
//!
//! The transaction log is authoritative for balances. On open the cached
//! balances in `state.json` are re-derived from it and any disagreement is
//! reported by the integrity check.

pub mod environment;
pub mod error;
pub mod integrity;
mod log;
mod store;

pub use environment::JsonFileStore;
pub use error::JsonStoreError;
pub use integrity::IntegrityReport;
