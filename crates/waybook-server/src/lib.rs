//! HTTP delivery server for waybook.
//!
//! A thin axum layer over `waybook-engine`: extract the session, lock the
//! shared database handle, call the engine, serialize the page. All
//! progression and pagination semantics live in the engine; this crate owns
//! transport, auth, and error mapping only.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, DbHandle};

/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;
