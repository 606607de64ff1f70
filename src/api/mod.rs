//! HTTP API layer.

mod routes;

pub use routes::{router, serve, AppState};
