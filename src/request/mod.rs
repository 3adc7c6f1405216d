//! Signed request construction.

pub mod builder;
pub mod params;

pub use builder::{RequestBuilder, SignedRequest};
pub use params::serialize_params;
