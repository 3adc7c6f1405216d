//! HTTP dispatch to the gateway.

pub mod http;

pub use http::{ApiClient, ApiResponse};
