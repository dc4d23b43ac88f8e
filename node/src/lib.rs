//! The sanka points service.
//!
//! [`PointsService`] is the single entry point for every operation. It wires
//! the ledger, catalog, participation tracker and verification workflow over
//! one store and adds what they leave to the caller:
//! - all mutations for one member run one at a time; different members run
//!   in parallel, bounded by a semaphore
//! - resolutions run one at a time per request
//! - every operation is bounded by a timeout
//! - outcomes are published on an [`EventBus`] that feeds [`ServiceMetrics`]

pub mod config;
pub mod error;
pub mod events;
pub mod keyed_locks;
pub mod logging;
pub mod metrics;
pub mod service;
pub mod shutdown;
pub mod tracing_spans;

pub use config::ServiceConfig;
pub use error::{ErrorClass, ServiceError};
pub use events::{EventBus, ServiceEvent};
pub use keyed_locks::KeyedLocks;
pub use logging::{init_logging, LogFormat};
pub use metrics::ServiceMetrics;
pub use service::PointsService;
pub use shutdown::ShutdownController;
