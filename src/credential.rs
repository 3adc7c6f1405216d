//! Per-session caller identity.

use std::fmt;

/// Caller credentials used to sign a request.
///
/// The secret only feeds the signature; it is never sent and never
/// printed (see the `Debug` impl).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    /// Application key, sent as a header.
    pub app_key: String,

    /// Signing secret.
    pub secret: String,

    /// Session id, empty before login.
    pub session_id: String,

    /// Pre-supplied device id. Empty means resolve from the device id file.
    pub device_id: String,
}

impl Credential {
    /// Credential with an app key and secret and no session yet.
    pub fn new(app_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            secret: secret.into(),
            ..Self::default()
        }
    }

    /// Set the session id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Set an explicit device id, bypassing the device id file.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("app_key", &self.app_key)
            .field("secret", &"<redacted>")
            .field("session_id", &self.session_id)
            .field("device_id", &self.device_id)
            .finish()
    }
}
