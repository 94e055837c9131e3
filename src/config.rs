use std::env;

use crate::error::SafewalkError;

/// Injected provider credentials and wiring, loaded once at startup. The
/// scoring pipeline never reads the environment itself.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tomtom_api_key: String,
    pub openweather_api_key: String,
    pub reports_base_url: String,
    pub bind_addr: String,
}

impl Settings {
    /// Reads `.env` (if present) and the process environment. Missing
    /// provider credentials are fatal; the caller cannot proceed without
    /// them.
    pub fn from_env() -> Result<Self, SafewalkError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            tomtom_api_key: require("TOMTOM_API_KEY")?,
            openweather_api_key: require("OPENWEATHER_API_KEY")?,
            reports_base_url: env::var("REPORTS_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        })
    }
}

fn require(key: &'static str) -> Result<String, SafewalkError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SafewalkError::Configuration(key)),
    }
}
