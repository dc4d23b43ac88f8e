//! Route table.

use axum::extract::{DefaultBodyLimit, Request};
use axum::routing::{get, post};
use axum::Router;
use sanka_node::tracing_spans::rpc_span;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{self, AppState};

/// Room for the multipart envelope and text fields around the photo.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the API router over `service`.
///
/// CORS is permissive: the API is meant to be called from a browser front
/// end served from another origin.
pub fn build_router(service: AppState) -> Router {
    let body_limit = service
        .params()
        .max_evidence_bytes
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route(
            "/activities",
            get(handlers::list_activities).post(handlers::create_activity),
        )
        .route("/activities/:id", get(handlers::get_activity))
        .route("/activities/:id/join", post(handlers::join_activity))
        .route("/activities/:id/participants", get(handlers::participants))
        .route("/members", post(handlers::register_member))
        .route("/members/:id", get(handlers::get_member))
        .route("/members/:id/balance", get(handlers::get_balance))
        .route("/members/:id/transactions", get(handlers::transactions))
        .route(
            "/verifications",
            get(handlers::list_verifications)
                .post(handlers::submit_verification)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/verifications/:id", get(handlers::get_verification))
        .route(
            "/verifications/:id/evidence",
            get(handlers::verification_evidence),
        )
        .route(
            "/verifications/:id/resolve",
            post(handlers::resolve_verification),
        )
        .route("/audit", get(handlers::audit))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| rpc_span(req.method().as_str(), req.uri().path())),
        )
        .layer(CorsLayer::permissive())
        .with_state(service)
}
