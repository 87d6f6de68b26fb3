//! Models Module
//!
//! Request and response DTOs for the HTTP API.

mod requests;
mod responses;

pub use requests::{CreateCacheRequest, SetRequest};
pub use responses::{CacheListResponse, FlushResponse, GetResponse, HealthResponse, MessageResponse};
