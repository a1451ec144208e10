//! Startup configuration read from the environment
//!
//! Everything is read once before the server binds. A missing credential is
//! fatal: the process never reaches a servable state without it.

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_PORT: u16 = 8000;

/// Configuration problems detected at startup
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set (export it or add it to .env)")]
    MissingApiKey,
    #[error("TRUSTEDBOT_PORT must be a port number, got {0:?}")]
    InvalidPort(String),
    #[error("TRUSTEDBOT_TEMPERATURE must be a number between 0 and 2, got {0:?}")]
    InvalidTemperature(String),
}

/// Configuration for the completion endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub api_key: String,
    /// Root of an OpenAI-compatible API, without the `/chat/completions` suffix
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

/// Whole-process configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("OPENAI_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let base_url = lookup("OPENAI_BASE_URL")
            .filter(|u| !u.trim().is_empty())
            .map_or_else(|| DEFAULT_BASE_URL.to_string(), |u| u.trim_end_matches('/').to_string());

        let model = lookup("TRUSTEDBOT_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = match lookup("TRUSTEDBOT_TEMPERATURE") {
            Some(raw) => parse_temperature(&raw)?,
            None => 0.0,
        };

        let port = match lookup("TRUSTEDBOT_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            llm: LlmConfig {
                api_key,
                base_url,
                model,
                temperature,
            },
            port,
        })
    }
}

fn parse_temperature(raw: &str) -> Result<f32, ConfigError> {
    let value: f32 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidTemperature(raw.to_string()))?;
    if (0.0..=2.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidTemperature(raw.to_string()))
    }
}
