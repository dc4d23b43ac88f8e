//! Participation tracker.
//!
//! Owns the join protocol: charge the member, take a seat, record the
//! participation. The three writes succeed together or are compensated
//! together; a debit is never left standing without its participation.

pub mod error;
pub mod tracker;

pub use error::ParticipationError;
pub use tracker::ParticipationTracker;
