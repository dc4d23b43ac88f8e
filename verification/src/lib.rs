//! Verification workflow.
//!
//! A member submits evidence that they attended an activity (earning a fixed
//! award) or could not attend one they joined (refunding its cost). Each
//! request moves from `pending` to exactly one terminal status, and an
//! approval credits the ledger under a key derived from the request id, so
//! a resolution can be retried without paying twice.
//!
//! Deciding the outcome is delegated to a pluggable [`DecisionService`].

pub mod decision;
pub mod error;
pub mod evidence;
pub mod workflow;

pub use decision::{
    Decision, DecisionService, LogDecisionService, NullDecisionService, WebhookDecisionService,
};
pub use error::{DecisionError, VerificationError};
pub use evidence::validate_evidence;
pub use workflow::{Resolution, Submission, SubmitRequest, VerificationWorkflow};
