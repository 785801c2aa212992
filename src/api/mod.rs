//! HTTP client for the remote HerSync REST service.
//!
//! [`ApiClient`] wraps one configured `reqwest::Client`. Every request reads
//! the bearer token from the persisted session right before it is sent, so
//! a login or logout takes effect on the next call without rebuilding the
//! client. Endpoint methods live in `endpoints.rs`, one per route.

mod client;
mod endpoints;
mod error;

pub use client::{Ack, ApiClient};
pub use error::ApiError;
