//! Request assembly: URL, form body, signed headers.
//!
//! Build order is fixed:
//! 1. Encode params as JSON
//! 2. Resolve the device id (may create the device id file)
//! 3. Take one timestamp, shared by body and signature
//! 4. Encode the form body
//! 5. Sign and attach headers

use crate::clock::{Clock, SystemClock};
use crate::config::ApigateConfig;
use crate::credential::Credential;
use crate::crypto::signing::sign;
use crate::device::DeviceIdStore;
use crate::log::{Logger, NoopLogger};
use crate::request::params::serialize_params;
use crate::ApigateError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::Serialize;
use std::sync::Arc;

/// Content type of every gateway request body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A fully signed gateway request, ready for dispatch.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// Always POST.
    pub method: Method,

    /// Gateway URL.
    pub url: Url,

    /// Content type plus the configured identity and signature headers.
    pub headers: HeaderMap,

    /// Form-urlencoded body, keys sorted.
    pub body: String,

    /// Timestamp sent in the body and covered by the signature.
    pub timestamp: String,
}

impl SignedRequest {
    /// Convert into a `reqwest` blocking request.
    pub fn into_request(self) -> reqwest::blocking::Request {
        let mut request = reqwest::blocking::Request::new(self.method, self.url);
        *request.headers_mut() = self.headers;
        *request.body_mut() = Some(self.body.into());
        request
    }
}

/// Builds signed requests for one gateway configuration.
///
/// Cheap to share across threads; each `build` call takes its own
/// credential snapshot.
pub struct RequestBuilder {
    config: Arc<ApigateConfig>,
    device_ids: DeviceIdStore,
    clock: Arc<dyn Clock>,
    logger: Arc<dyn Logger>,
}

impl RequestBuilder {
    /// Create a builder with the system clock and no logging.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration does not validate.
    pub fn new(config: ApigateConfig) -> Result<Self, ApigateError> {
        Self::from_shared(Arc::new(config))
    }

    /// Create a builder over a configuration shared with other components.
    pub fn from_shared(config: Arc<ApigateConfig>) -> Result<Self, ApigateError> {
        config.validate()?;
        let device_ids = DeviceIdStore::new(config.device_id_file_path.clone());

        Ok(Self {
            config,
            device_ids,
            clock: Arc::new(SystemClock),
            logger: Arc::new(NoopLogger),
        })
    }

    /// Send diagnostics to `logger`.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Take timestamps from `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build a signed request.
    ///
    /// `params` of `None` is sent and signed as `null`.
    ///
    /// # Errors
    /// - `Encoding` - params cannot be represented as JSON
    /// - `Storage` - the device id file cannot be read or created
    /// - `TransportConstruction` - the URL or a header is malformed
    pub fn build<P>(
        &self,
        credential: &Credential,
        api: &str,
        version: &str,
        params: Option<&P>,
    ) -> Result<SignedRequest, ApigateError>
    where
        P: Serialize + ?Sized,
    {
        self.try_build(credential, api, version, params)
            .inspect_err(|e| self.logger.error(&e.to_string()))
    }

    fn try_build<P>(
        &self,
        credential: &Credential,
        api: &str,
        version: &str,
        params: Option<&P>,
    ) -> Result<SignedRequest, ApigateError>
    where
        P: Serialize + ?Sized,
    {
        let params_json = serialize_params(params)?;
        let device_id = self.device_ids.resolve(credential)?;
        let timestamp = self.timestamp();

        let gateway_url = self.config.gateway_url();
        let url = Url::parse(&gateway_url).map_err(|e| {
            ApigateError::TransportConstruction(format!("invalid gateway url {}: {}", gateway_url, e))
        })?;
        let body = self.form_body(api, version, &timestamp, &params_json);

        self.logger.debug(&format!("Gateway url: {}", gateway_url));
        self.logger.debug(&format!("Api: {} {}", api, version));
        self.logger.debug(&format!("Timestamp: {}", timestamp));
        self.logger.debug(&format!("Request param: {}", params_json));

        let signature = sign(
            &credential.secret,
            &device_id,
            &credential.session_id,
            api,
            version,
            &params_json,
            &timestamp,
        );

        let config = &self.config;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        set_header(&mut headers, &config.app_key_field_name, &credential.app_key)?;
        set_header(&mut headers, &config.app_market_id_field_name, &config.app_market_id_value)?;
        set_header(&mut headers, &config.app_version_field_name, &config.app_version_value)?;
        set_header(&mut headers, &config.device_id_field_name, &device_id)?;
        set_header(&mut headers, &config.session_id_field_name, &credential.session_id)?;
        set_header(&mut headers, &config.sign_field_name, &signature)?;

        Ok(SignedRequest {
            method: Method::POST,
            url,
            headers,
            body,
            timestamp,
        })
    }

    /// Microseconds since the epoch, as a decimal string.
    fn timestamp(&self) -> String {
        self.clock.unix_micros().to_string()
    }

    fn form_body(&self, api: &str, version: &str, timestamp: &str, params_json: &str) -> String {
        let config = &self.config;
        let mut pairs = [
            (config.api_field_name.as_str(), api),
            (config.version_field_name.as_str(), version),
            (config.timestamp_field_name.as_str(), timestamp),
            (config.params_field_name.as_str(), params_json),
        ];
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// The configuration requests are built from.
    pub fn config(&self) -> &ApigateConfig {
        &self.config
    }

    /// Diagnostics sink, shared with the dispatching client.
    pub(crate) fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    /// The device id store backing this builder.
    pub fn device_ids(&self) -> &DeviceIdStore {
        &self.device_ids
    }
}

/// Insert a header under a configured name. Values are not echoed in the
/// error since one of them is the signature.
fn set_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), ApigateError> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
        ApigateError::TransportConstruction(format!("invalid header name {:?}: {}", name, e))
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| {
        ApigateError::TransportConstruction(format!("invalid value for header {}: {}", name, e))
    })?;
    headers.insert(header_name, header_value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::log::testing::RecordingLogger;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const TS: i64 = 1_736_942_400_123_456;

    fn test_config(dir: &TempDir) -> ApigateConfig {
        ApigateConfig {
            gateway_path: "/gw".to_string(),
            device_id_file_path: dir.path().join("device_id"),
            app_market_id_value: "market-1".to_string(),
            app_version_value: "3.2.1".to_string(),
            ..ApigateConfig::new("api.example.com")
        }
    }

    fn test_builder(config: ApigateConfig) -> RequestBuilder {
        RequestBuilder::new(config)
            .unwrap()
            .with_clock(Arc::new(MockClock::from_unix_micros(TS)))
    }

    fn header<'a>(request: &'a SignedRequest, name: &str) -> &'a str {
        request.headers.get(name).unwrap().to_str().unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = RequestBuilder::new(ApigateConfig::default());
        assert!(matches!(result, Err(ApigateError::ConfigError(_))));
    }

    #[test]
    fn test_login_fixture_signature() {
        let dir = TempDir::new().unwrap();
        let builder = test_builder(test_config(&dir));
        let credential = Credential::new("app-key", "s").with_device_id("d");

        let request = builder
            .build(&credential, "user.login", "1.0", Some(&json!({"a": 1})))
            .unwrap();

        assert_eq!(request.timestamp, TS.to_string());
        assert_eq!(header(&request, "OA-Sign"), "e1e89a47b15ea4b872e59bfba7c79b24");
    }

    #[test]
    fn test_url_method_and_headers() {
        let dir = TempDir::new().unwrap();
        let builder = test_builder(test_config(&dir));
        let credential = Credential::new("app-key", "s")
            .with_session_id("sess-9")
            .with_device_id("dev-1");

        let request = builder
            .build(&credential, "user.info", "2.0", None::<&()>)
            .unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url.as_str(), "https://api.example.com/gw");
        assert_eq!(header(&request, "content-type"), FORM_CONTENT_TYPE);
        assert_eq!(header(&request, "OA-App-Key"), "app-key");
        assert_eq!(header(&request, "OA-App-Market-ID"), "market-1");
        assert_eq!(header(&request, "OA-App-Version"), "3.2.1");
        assert_eq!(header(&request, "OA-Device-Id"), "dev-1");
        assert_eq!(header(&request, "OA-Session-Id"), "sess-9");
        assert_eq!(request.headers.len(), 7);
        assert!(!dir.path().join("device_id").exists());
    }

    #[test]
    fn test_body_sorted_and_encoded() {
        let dir = TempDir::new().unwrap();
        let builder = test_builder(test_config(&dir));
        let credential = Credential::new("k", "s").with_device_id("d");

        let request = builder
            .build(&credential, "user.login", "1.0", Some(&json!({"a": 1})))
            .unwrap();

        assert_eq!(
            request.body,
            "api=user.login&params=%7B%22a%22%3A1%7D&timestamp=1736942400123456&v=1.0"
        );
    }

    #[test]
    fn test_body_and_signature_share_timestamp() {
        let dir = TempDir::new().unwrap();
        let builder = RequestBuilder::new(test_config(&dir)).unwrap();
        let credential = Credential::new("k", "secret").with_device_id("d");

        let request = builder
            .build(&credential, "user.login", "1.0", None::<&()>)
            .unwrap();

        let fields: Vec<(String, String)> =
            url::form_urlencoded::parse(request.body.as_bytes()).into_owned().collect();
        let body_ts = &fields.iter().find(|(k, _)| k == "timestamp").unwrap().1;
        assert_eq!(body_ts, &request.timestamp);

        let expected = sign("secret", "d", "", "user.login", "1.0", "null", body_ts);
        assert_eq!(header(&request, "OA-Sign"), expected);
    }

    #[test]
    fn test_custom_field_names() {
        let dir = TempDir::new().unwrap();
        let config = ApigateConfig {
            api_field_name: "method".to_string(),
            version_field_name: "ver".to_string(),
            timestamp_field_name: "ts".to_string(),
            params_field_name: "biz".to_string(),
            app_key_field_name: "X-Key".to_string(),
            sign_field_name: "X-Signature".to_string(),
            ..test_config(&dir)
        };
        let builder = test_builder(config);
        let credential = Credential::new("k", "s").with_device_id("d");

        let request = builder
            .build(&credential, "a.b", "1", None::<&()>)
            .unwrap();

        assert_eq!(request.body, "biz=null&method=a.b&ts=1736942400123456&ver=1");
        assert_eq!(header(&request, "X-Key"), "k");
        assert_eq!(
            header(&request, "X-Signature"),
            sign("s", "d", "", "a.b", "1", "null", "1736942400123456")
        );
        assert!(request.headers.get("OA-Sign").is_none());
    }

    #[test]
    fn test_device_id_file_created_and_reused() {
        let dir = TempDir::new().unwrap();
        let credential = Credential::new("k", "s");

        let first = test_builder(test_config(&dir))
            .build(&credential, "user.login", "1.0", None::<&()>)
            .unwrap();
        let stored = fs::read_to_string(dir.path().join("device_id")).unwrap();
        assert_eq!(header(&first, "OA-Device-Id"), stored);

        let second = test_builder(test_config(&dir))
            .build(&credential, "user.login", "1.0", None::<&()>)
            .unwrap();
        assert_eq!(header(&second, "OA-Device-Id"), stored);
        assert_eq!(header(&first, "OA-Sign"), header(&second, "OA-Sign"));
    }

    #[test]
    fn test_encoding_error_aborts_before_storage() {
        let dir = TempDir::new().unwrap();
        let builder = test_builder(test_config(&dir));
        let mut bad = std::collections::BTreeMap::new();
        bad.insert(vec![1u8], 1u8);

        let result = builder.build(&Credential::new("k", "s"), "a", "1", Some(&bad));

        assert!(matches!(result, Err(ApigateError::Encoding(_))));
        assert!(!dir.path().join("device_id").exists());
    }

    #[test]
    fn test_storage_error_aborts() {
        let dir = TempDir::new().unwrap();
        let config = ApigateConfig {
            device_id_file_path: dir.path().join("missing").join("device_id"),
            ..test_config(&dir)
        };
        let builder = test_builder(config);

        let result = builder.build(&Credential::new("k", "s"), "a", "1", None::<&()>);
        assert!(matches!(result, Err(ApigateError::Storage { .. })));
    }

    #[test]
    fn test_malformed_host_is_construction_error() {
        let dir = TempDir::new().unwrap();
        let config = ApigateConfig {
            gateway_host: "bad host".to_string(),
            ..test_config(&dir)
        };
        let builder = test_builder(config);
        let credential = Credential::new("k", "s").with_device_id("d");

        let result = builder.build(&credential, "a", "1", None::<&()>);
        assert!(matches!(result, Err(ApigateError::TransportConstruction(_))));
    }

    #[test]
    fn test_empty_gateway_path_builds_root_url() {
        let dir = TempDir::new().unwrap();
        let config = ApigateConfig {
            gateway_path: String::new(),
            ..test_config(&dir)
        };
        let builder = test_builder(config);
        let credential = Credential::new("k", "s").with_device_id("d");

        let request = builder.build(&credential, "a", "1", None::<&()>).unwrap();
        assert_eq!(request.url.as_str(), "https://api.example.com/");
    }

    #[test]
    fn test_invalid_header_name_is_construction_error() {
        let dir = TempDir::new().unwrap();
        let config = ApigateConfig {
            app_key_field_name: "bad header".to_string(),
            ..test_config(&dir)
        };
        let builder = test_builder(config);
        let credential = Credential::new("k", "s").with_device_id("d");

        let result = builder.build(&credential, "a", "1", None::<&()>);
        assert!(matches!(result, Err(ApigateError::TransportConstruction(_))));
    }

    #[test]
    fn test_device_id_with_newline_is_rejected_not_trimmed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("device_id"), "abc\n").unwrap();
        let builder = test_builder(test_config(&dir));

        let result = builder.build(&Credential::new("k", "s"), "a", "1", None::<&()>);
        match result {
            Err(ApigateError::TransportConstruction(msg)) => assert!(msg.contains("OA-Device-Id")),
            other => panic!("expected construction error, got {:?}", other),
        }
    }

    #[test]
    fn test_logs_trace_without_secret() {
        let dir = TempDir::new().unwrap();
        let logger = Arc::new(RecordingLogger::default());
        let builder = test_builder(test_config(&dir)).with_logger(logger.clone());
        let credential = Credential::new("k", "very-secret-value").with_device_id("d");

        builder
            .build(&credential, "user.login", "1.0", Some(&json!({"a": 1})))
            .unwrap();

        let log = logger.joined();
        assert!(log.contains("DEBUG Gateway url: https://api.example.com/gw"));
        assert!(log.contains("DEBUG Api: user.login 1.0"));
        assert!(log.contains("DEBUG Timestamp: 1736942400123456"));
        assert!(log.contains(r#"DEBUG Request param: {"a":1}"#));
        assert!(!log.contains("very-secret-value"));
    }

    #[test]
    fn test_errors_are_logged() {
        let dir = TempDir::new().unwrap();
        let logger = Arc::new(RecordingLogger::default());
        let config = ApigateConfig {
            device_id_file_path: dir.path().join("missing").join("device_id"),
            ..test_config(&dir)
        };
        let builder = test_builder(config).with_logger(logger.clone());

        let _ = builder.build(&Credential::new("k", "s"), "a", "1", None::<&()>);
        assert!(logger.joined().contains("ERROR Device id storage error"));
    }

    #[test]
    fn test_into_request_keeps_parts() {
        let dir = TempDir::new().unwrap();
        let builder = test_builder(test_config(&dir));
        let credential = Credential::new("k", "s").with_device_id("d");

        let signed = builder
            .build(&credential, "user.login", "1.0", None::<&()>)
            .unwrap();
        let body = signed.body.clone();
        let request = signed.into_request();

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.url().as_str(), "https://api.example.com/gw");
        assert_eq!(request.headers().len(), 7);
        let sent = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(sent, body.as_bytes());
    }
}
