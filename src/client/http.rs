//! Reqwest-based HTTP client for the API gateway.
//!
//! Thin dispatch around [`RequestBuilder`]: build, send, read the body.
//! Interpreting the gateway's JSON envelope is left to the caller.

use crate::config::ApigateConfig;
use crate::credential::Credential;
use crate::log::Logger;
use crate::request::{RequestBuilder, SignedRequest};
use crate::ApigateError;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw gateway response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Get the body as a UTF-8 string.
    pub fn body_str(&self) -> Result<&str, ApigateError> {
        std::str::from_utf8(&self.body)
            .map_err(|e| ApigateError::ProtocolError(format!("Invalid UTF-8 in body: {}", e)))
    }

    /// Decode the JSON body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApigateError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApigateError::ProtocolError(format!("Json decode failed: {}", e)))
    }
}

/// Gateway client holding the session credential.
///
/// The credential sits behind a lock so a session id obtained at login can
/// be swapped in while other threads keep calling; each call signs with a
/// snapshot taken at its start.
pub struct ApiClient {
    client: Client,
    builder: RequestBuilder,
    credential: RwLock<Credential>,
    timeout: Duration,
}

impl ApiClient {
    /// Create a new client from config and credential.
    pub fn new(config: ApigateConfig, credential: Credential) -> Result<Self, ApigateError> {
        Self::with_builder(RequestBuilder::new(config)?, credential)
    }

    /// Create a client around a preconfigured builder (custom logger or clock).
    pub fn with_builder(
        builder: RequestBuilder,
        credential: Credential,
    ) -> Result<Self, ApigateError> {
        Ok(Self {
            client: build_http_client(DEFAULT_TIMEOUT)?,
            builder,
            credential: RwLock::new(credential),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Route builder diagnostics to `logger`.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.builder = self.builder.with_logger(logger);
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ApigateError> {
        self.client = build_http_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Snapshot of the current credential.
    pub fn credential(&self) -> Credential {
        self.credential
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the credential.
    pub fn set_credential(&self, credential: Credential) {
        *self
            .credential
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = credential;
    }

    /// Replace the session id, e.g. after a login call.
    pub fn set_session_id(&self, session_id: impl Into<String>) {
        self.credential
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .session_id = session_id.into();
    }

    /// Build a signed request with the current credential without sending it.
    pub fn build_request<P>(
        &self,
        api: &str,
        version: &str,
        params: Option<&P>,
    ) -> Result<SignedRequest, ApigateError>
    where
        P: Serialize + ?Sized,
    {
        let credential = self.credential();
        self.builder.build(&credential, api, version, params)
    }

    /// Call an API: build, sign, send and return the raw response.
    ///
    /// # Errors
    /// - Any build error (`Encoding`, `Storage`, `TransportConstruction`)
    /// - `Transport` - sending or reading the response failed
    pub fn call_api<P>(
        &self,
        api: &str,
        version: &str,
        params: Option<&P>,
    ) -> Result<ApiResponse, ApigateError>
    where
        P: Serialize + ?Sized,
    {
        let request = self.build_request(api, version, params)?.into_request();
        let logger = self.builder.logger();

        let response = self
            .dispatch(request)
            .inspect_err(|e| logger.error(&e.to_string()))?;
        logger.debug(&format!("Response status for {}: {}", api, response.status));
        Ok(response)
    }

    fn dispatch(&self, request: reqwest::blocking::Request) -> Result<ApiResponse, ApigateError> {
        let response = self
            .client
            .execute(request)
            .map_err(|e| ApigateError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| ApigateError::Transport(format!("Failed to read body: {}", e)))?
            .to_vec();

        Ok(ApiResponse { status, body })
    }

    /// The request builder.
    pub fn builder(&self) -> &RequestBuilder {
        &self.builder
    }
}

fn build_http_client(timeout: Duration) -> Result<Client, ApigateError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ApigateError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}
