//! HTTP API for the sanka service.
//!
//! Provides endpoints for:
//! - Activities: list, create, inspect, join
//! - Members: registration, balance, ledger history
//! - Verification requests: multipart submission with a photo, review, resolution
//! - Liveness and Prometheus metrics
//!
//! Errors are returned as `{"error": <code>, "message": <text>}` with the
//! HTTP status chosen by the error's class.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::RpcError;
pub use router::build_router;
pub use server::RpcServer;
