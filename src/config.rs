//! Apigate configuration.

use crate::ApigateError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_DEVICE_ID_FILE: &str = "apigate_device_id";

/// Configuration for the gateway endpoint and the request field names.
///
/// Created once at startup and shared read-only by every request. Field
/// names are configurable because each gateway deployment chooses its own
/// header and body keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApigateConfig {
    /// Gateway host name (e.g. "api.example.com")
    pub gateway_host: String,

    /// Gateway port; 0 means the scheme default.
    pub gateway_port: u16,

    /// Gateway path (e.g. "/gateway")
    pub gateway_path: String,

    /// Use plain http instead of https.
    #[serde(rename = "disableSSL")]
    pub disable_ssl: bool,

    /// Where the generated device id is persisted.
    pub device_id_file_path: PathBuf,

    /// Body field carrying the API name.
    pub api_field_name: String,

    /// Body field carrying the API version.
    pub version_field_name: String,

    /// Body field carrying the request timestamp.
    pub timestamp_field_name: String,

    /// Body field carrying the JSON-encoded parameters.
    pub params_field_name: String,

    /// Header carrying the app key.
    pub app_key_field_name: String,

    /// Header carrying the app market id.
    pub app_market_id_field_name: String,

    /// Fixed app market id value.
    pub app_market_id_value: String,

    /// Header carrying the app version.
    pub app_version_field_name: String,

    /// Fixed app version value.
    pub app_version_value: String,

    /// Header carrying the device id.
    pub device_id_field_name: String,

    /// Header carrying the session id.
    pub session_id_field_name: String,

    /// Header carrying the request signature.
    pub sign_field_name: String,
}

impl Default for ApigateConfig {
    fn default() -> Self {
        Self {
            gateway_host: String::new(),
            gateway_port: 0,
            gateway_path: "/".to_string(),
            disable_ssl: false,
            device_id_file_path: default_device_id_path(),
            api_field_name: "api".to_string(),
            version_field_name: "v".to_string(),
            timestamp_field_name: "timestamp".to_string(),
            params_field_name: "params".to_string(),
            app_key_field_name: "OA-App-Key".to_string(),
            app_market_id_field_name: "OA-App-Market-ID".to_string(),
            app_market_id_value: String::new(),
            app_version_field_name: "OA-App-Version".to_string(),
            app_version_value: String::new(),
            device_id_field_name: "OA-Device-Id".to_string(),
            session_id_field_name: "OA-Session-Id".to_string(),
            sign_field_name: "OA-Sign".to_string(),
        }
    }
}

impl ApigateConfig {
    /// Default configuration pointing at `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            gateway_host: host.into(),
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ApigateError> {
        serde_json::from_str(json)
            .map_err(|e| ApigateError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Load a configuration file in JSON format.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ApigateError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            ApigateError::ConfigError(format!(
                "Failed to read config file [{}]: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&json)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), ApigateError> {
        if self.gateway_host.is_empty() {
            return Err(ApigateError::ConfigError(
                "gateway_host cannot be empty".to_string(),
            ));
        }
        // An empty path targets the host root.
        if !self.gateway_path.is_empty() && !self.gateway_path.starts_with('/') {
            return Err(ApigateError::ConfigError(format!(
                "gateway_path must be empty or start with '/', got {:?}",
                self.gateway_path
            )));
        }
        if self.device_id_file_path.as_os_str().is_empty() {
            return Err(ApigateError::ConfigError(
                "device_id_file_path cannot be empty".to_string(),
            ));
        }

        for (what, name) in self.body_field_names().into_iter().chain(self.header_field_names()) {
            if name.is_empty() {
                return Err(ApigateError::ConfigError(format!(
                    "{} cannot be empty",
                    what
                )));
            }
        }

        let mut seen = HashSet::new();
        for (what, name) in self.header_field_names() {
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(ApigateError::ConfigError(format!(
                    "{} duplicates another header name: {}",
                    what, name
                )));
            }
        }
        let mut seen = HashSet::new();
        for (what, name) in self.body_field_names() {
            if !seen.insert(name) {
                return Err(ApigateError::ConfigError(format!(
                    "{} duplicates another body field: {}",
                    what, name
                )));
            }
        }
        Ok(())
    }

    /// Destination URL: scheme, `host[:port]` and path, no query string.
    pub fn gateway_url(&self) -> String {
        let scheme = if self.disable_ssl { "http" } else { "https" };
        if self.gateway_port != 0 {
            format!(
                "{}://{}:{}{}",
                scheme, self.gateway_host, self.gateway_port, self.gateway_path
            )
        } else {
            format!("{}://{}{}", scheme, self.gateway_host, self.gateway_path)
        }
    }

    fn body_field_names(&self) -> [(&'static str, &str); 4] {
        [
            ("api_field_name", &self.api_field_name),
            ("version_field_name", &self.version_field_name),
            ("timestamp_field_name", &self.timestamp_field_name),
            ("params_field_name", &self.params_field_name),
        ]
    }

    fn header_field_names(&self) -> [(&'static str, &str); 6] {
        [
            ("app_key_field_name", &self.app_key_field_name),
            ("app_market_id_field_name", &self.app_market_id_field_name),
            ("app_version_field_name", &self.app_version_field_name),
            ("device_id_field_name", &self.device_id_field_name),
            ("session_id_field_name", &self.session_id_field_name),
            ("sign_field_name", &self.sign_field_name),
        ]
    }
}

/// `<data_dir>/apigate_device_id`, or the working directory when the
/// platform has no data directory. Parent directories are not created.
fn default_device_id_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(DEFAULT_DEVICE_ID_FILE))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DEVICE_ID_FILE))
}
