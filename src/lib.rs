//! # Apigate
//!
//! **Signed-request builder for form-encoded HTTP API gateways.**
//!
//! Apigate turns an API name, a version and serializable parameters into a
//! signed `POST` request: parameters become JSON, a stable per-installation
//! device id is resolved, and an MD5 signature binds the caller's secret to
//! every field the gateway will see.
//!
//! ## Features
//!
//! - **Deterministic signatures** - the gateway recomputes the same digest from the same fields
//! - **Single timestamp per request** - body and signature can never disagree
//! - **Persistent device id** - generated once, stored as raw bytes, never overwritten
//! - **Configurable field names** - every header and body key comes from [`ApigateConfig`]
//! - **Injected logging** - no global logger; defaults to [`NoopLogger`]
//!
//! ## Quickstart
//!
//! ```no_run
//! use apigate::{ApiClient, ApigateConfig, Credential};
//! use serde_json::json;
//!
//! fn main() -> Result<(), apigate::ApigateError> {
//!     let config = ApigateConfig {
//!         gateway_path: "/gateway".to_string(),
//!         app_version_value: "1.0.0".to_string(),
//!         ..ApigateConfig::new("api.example.com")
//!     };
//!     let client = ApiClient::new(config, Credential::new("app-key", "app-secret"))?;
//!
//!     let response = client.call_api("user.login", "1.0", Some(&json!({"user": "alice"})))?;
//!     println!("{} {}", response.status, response.body_str()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Signature
//!
//! ```text
//! md5_hex(secret + device_id + session_id + api + version + params_json + timestamp)
//! ```
//!
//! The timestamp is microseconds since the Unix epoch. The secret is never
//! sent and never logged.

#![deny(warnings)]
#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod credential;
pub mod errors;
pub mod log;

// Signing
pub mod crypto;

// Identity
pub mod device;

// Request assembly
pub mod request;

// Dispatch
pub mod client;

// Re-exports for public API
pub use client::{ApiClient, ApiResponse};
pub use clock::{Clock, SystemClock};
pub use config::ApigateConfig;
pub use credential::Credential;
pub use crypto::signing::sign;
pub use device::DeviceIdStore;
pub use errors::ApigateError;
pub use log::{Logger, NoopLogger, TracingLogger};
pub use request::{serialize_params, RequestBuilder, SignedRequest};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
