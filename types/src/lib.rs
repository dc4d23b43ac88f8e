//! Fundamental types for the sanka points ledger.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! member/activity/request identifiers, point amounts, timestamps and clocks,
//! deduplication keys, service parameters, state enums, and the member view.

pub mod amount;
pub mod dedupe;
pub mod error;
pub mod hash;
pub mod ids;
pub mod params;
pub mod state;
pub mod time;
pub mod view;

pub use amount::Points;
pub use dedupe::DedupeKey;
pub use error::TypesError;
pub use hash::{blake2b_256, TxId};
pub use ids::{ActivityId, MemberId, RequestId};
pub use params::PointsParams;
pub use state::{Outcome, TransactionReason, VerificationKind, VerificationStatus};
pub use time::{Clock, SystemClock, Timestamp};
pub use view::MemberView;
