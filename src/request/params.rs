//! API parameter encoding.

use crate::ApigateError;
use serde::Serialize;

/// JSON literal sent when a call has no parameters.
pub const NULL_PARAMS: &str = "null";

/// Encode API parameters as the JSON string that is both sent and signed.
///
/// `None` encodes as `null`.
pub fn serialize_params<P>(params: Option<&P>) -> Result<String, ApigateError>
where
    P: Serialize + ?Sized,
{
    match params {
        None => Ok(NULL_PARAMS.to_string()),
        Some(params) => {
            serde_json::to_string(params).map_err(|e| ApigateError::Encoding(e.to_string()))
        }
    }
}
