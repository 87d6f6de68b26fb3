//! API Module
//!
//! HTTP handlers and routing for the cache service REST API.
//! See [`routes::create_router`] for the endpoint list.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
