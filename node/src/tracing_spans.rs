//! Pre-built [`tracing::Span`] constructors for service operations.
//!
//! Using consistent span names and field sets across the codebase makes it
//! easy to filter, search, and correlate traces.

use tracing::{info_span, Span};

/// Span covering one service operation on behalf of a member.
pub fn member_op_span(operation: &str, member: &str) -> Span {
    info_span!("member_op", op = %operation, member = %member)
}

/// Span covering a join attempt.
pub fn join_span(member: &str, activity: u64) -> Span {
    info_span!("join", member = %member, activity = activity)
}

/// Span covering a verification submission and its hand-off for review.
pub fn submit_span(member: &str, kind: &str) -> Span {
    info_span!("verification_submit", member = %member, kind = %kind)
}

/// Span covering the resolution of a verification request.
pub fn resolve_span(request: u64, outcome: &str) -> Span {
    info_span!("verification_resolve", request = request, outcome = %outcome)
}

/// Span covering a single HTTP request handled by the API server.
pub fn rpc_span(method: &str, route: &str) -> Span {
    info_span!("rpc", method = %method, route = %route)
}
