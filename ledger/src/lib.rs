//! Points ledger.
//!
//! The transaction log is the source of truth for every balance. Each
//! mutation carries a dedupe key and the ledger applies at most one
//! transaction per key, so a retried call is a no-op that reports
//! [`Posting::Duplicate`] instead of moving points twice.

pub mod audit;
pub mod error;
pub mod ledger;
pub mod posting;

pub use audit::AuditReport;
pub use error::LedgerError;
pub use ledger::PointsLedger;
pub use posting::Posting;
