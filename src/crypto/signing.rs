//! Request signature computation.
//!
//! The gateway recomputes the signature from the same fields and compares,
//! so the input layout is fixed:
//! ```text
//! <secret><device id><session id><api><version><params json><timestamp>
//! ```
//! concatenated without separators, MD5 over the UTF-8 bytes, lowercase hex.

/// Build the string the signature is computed over.
///
/// Contains the secret; callers must never log it.
pub fn build_signing_string(
    secret: &str,
    device_id: &str,
    session_id: &str,
    api: &str,
    version: &str,
    params_json: &str,
    timestamp: &str,
) -> String {
    let parts = [secret, device_id, session_id, api, version, params_json, timestamp];
    let mut out = String::with_capacity(parts.iter().map(|p| p.len()).sum());
    for part in parts {
        out.push_str(part);
    }
    out
}

/// Compute the request signature as 32 lowercase hex characters.
pub fn sign(
    secret: &str,
    device_id: &str,
    session_id: &str,
    api: &str,
    version: &str,
    params_json: &str,
    timestamp: &str,
) -> String {
    let signing_string =
        build_signing_string(secret, device_id, session_id, api, version, params_json, timestamp);
    hex::encode(md5::compute(signing_string.as_bytes()).0)
}
