use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Application configuration loaded from environment variables.
/// Nothing is strictly required: without `GENAI_API_KEY` the service runs in mock mode.
#[derive(Debug, Clone)]
pub struct Config {
    /// Process-wide default credential for the generation service.
    pub genai_api_key: Option<String>,
    pub genai_api_url: String,
    pub genai_model: String,
    pub genai_max_attempts: u32,
    pub genai_timeout_secs: u64,
    /// Shared passcode gating the whole API. `None` disables the gate.
    pub passcode: Option<String>,
    pub template_dir: Option<PathBuf>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            genai_api_key: optional_env("GENAI_API_KEY"),
            genai_api_url: optional_env("GENAI_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            genai_model: optional_env("GENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            genai_max_attempts: parse_env("GENAI_MAX_ATTEMPTS", 1)?,
            genai_timeout_secs: parse_env("GENAI_TIMEOUT_SECS", 120)?,
            passcode: optional_env("APP_PASSCODE"),
            template_dir: optional_env("TEMPLATE_DIR").map(PathBuf::from),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            genai_api_key: None,
            genai_api_url: DEFAULT_API_URL.to_string(),
            genai_model: DEFAULT_MODEL.to_string(),
            genai_max_attempts: 1,
            genai_timeout_secs: 120,
            passcode: None,
            template_dir: None,
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}

/// Reads a variable, treating an empty or whitespace-only value as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
