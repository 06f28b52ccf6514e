//! HTTP API server for the Ferry remote-file proxy.
//!
//! This crate provides the HTTP control plane:
//! - Registration create/delete endpoints
//! - Proxied fetch of the registered upstream resource
//! - Lazy expiry enforcement on the read path
//! - Per-IP rate limiting

pub mod error;
pub mod fetch;
pub mod handlers;
pub mod lifecycle;
pub mod pages;
pub mod ratelimit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use fetch::FetchEngine;
pub use lifecycle::Lifecycle;
pub use ratelimit::RateLimitState;
pub use routes::create_router;
pub use state::AppState;
