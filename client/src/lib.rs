//! Client library for the sanka API.
//!
//! Keeps a local projection of the signed-in member (balance and joined
//! activities) for a responsive front end:
//! - [`Reconciler`]: confirmed server view plus provisional tickets
//! - [`Session`]: signed-in / signed-out lifecycle around a reconciler
//! - [`PointsApi`]: the server calls, with an HTTP implementation
//! - [`SessionClient`]: provisional update, call, then confirm or roll back

pub mod api;
pub mod client;
pub mod error;
pub mod reconciler;
pub mod session;

pub use api::{HttpPointsApi, PointsApi, Submitted, VerificationForm};
pub use client::SessionClient;
pub use error::ClientError;
pub use reconciler::{Change, Reconciler, TicketId};
pub use session::Session;
