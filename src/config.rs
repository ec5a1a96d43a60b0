// src/config.rs
use std::env;

use crate::errors::KisskinError;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.openai.com/v1";

pub fn bind_addr() -> String {
    env::var("KISSKIN_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
}

pub fn provider_base_url() -> String {
    env::var("OPENAI_BASE_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_PROVIDER_BASE_URL.to_string())
}

// Looked up on every request so key rotation needs no restart; a missing key
// is a per-request configuration error, not a startup failure.
pub fn provider_api_key() -> Result<String, KisskinError> {
    match env::var("OPENAI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(KisskinError::Config("API key not configured".to_string())),
    }
}

// Process-wide env vars are shared by every test thread; tests that touch
// them must hold this lock.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_config_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe { env::remove_var("OPENAI_API_KEY") };

        let err = provider_api_key().unwrap_err();
        assert_eq!(err.to_string(), "API key not configured");
    }

    #[test]
    fn base_url_default_and_trailing_slash() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe { env::remove_var("OPENAI_BASE_URL") };
        assert_eq!(provider_base_url(), DEFAULT_PROVIDER_BASE_URL);

        unsafe { env::set_var("OPENAI_BASE_URL", "http://127.0.0.1:9901/v1/") };
        assert_eq!(provider_base_url(), "http://127.0.0.1:9901/v1");
        unsafe { env::remove_var("OPENAI_BASE_URL") };
    }
}
