//! Basic gateway call example.
//!
//! Logs in, stores the returned session id, then makes an authenticated
//! call with it.
//!
//! # Running
//!
//! ```bash
//! export APIGATE_CONFIG=apigate.json
//! export APP_KEY="your-app-key"
//! export APP_SECRET="your-app-secret"
//! cargo run --example basic_call
//! ```

use apigate::{ApiClient, ApigateConfig, ApigateError, Credential, TracingLogger};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(rename = "errorCode", default)]
    error_code: String,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

fn main() {
    let config_path = std::env::var("APIGATE_CONFIG").unwrap_or_else(|_| "apigate.json".into());
    let app_key = std::env::var("APP_KEY").expect("Set APP_KEY environment variable");
    let app_secret = std::env::var("APP_SECRET").expect("Set APP_SECRET environment variable");

    if let Err(e) = run(&config_path, Credential::new(app_key, app_secret)) {
        match &e {
            ApigateError::Storage { path, .. } => {
                eprintln!("Can not persist device id at {}", path.display());
            }
            ApigateError::Transport(_) => {
                eprintln!("Network error talking to the gateway: {}", e);
            }
            _ => eprintln!("Call failed: {}", e),
        }
        std::process::exit(1);
    }
}

fn run(config_path: &str, credential: Credential) -> Result<(), ApigateError> {
    let config = ApigateConfig::from_json_file(config_path)?;
    let client = ApiClient::new(config, credential)?.with_logger(Arc::new(TracingLogger));

    let login: Envelope<LoginData> = client
        .call_api("user.login", "1.0", Some(&json!({"remember": true})))?
        .json()?;
    if !login.success {
        eprintln!("Login rejected: {} {}", login.error_code, login.message);
        return Ok(());
    }
    if let Some(data) = login.data {
        client.set_session_id(data.session_id);
    }

    let info = client.call_api("user.info", "1.0", None::<&()>)?;
    println!("user.info -> {} {}", info.status, info.body_str()?);
    Ok(())
}
