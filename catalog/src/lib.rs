//! Activity catalog.
//!
//! Activities are created from an untrusted [`ActivitySpec`], validated into
//! a [`sanka_store::NewActivity`], and stored with a server-assigned id. After
//! creation only the participant count changes, and only through the join
//! protocol.

pub mod catalog;
pub mod error;
pub mod spec;

pub use catalog::ActivityCatalog;
pub use error::CatalogError;
pub use spec::{ActivitySpec, DEFAULT_ORGANIZER};
