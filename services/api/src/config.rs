//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use research_assistant_core::script::{FAST_TICK, PRO_TICK};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which provider answers questions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerProvider {
    Gemini,
    OpenAi,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub answer_provider: AnswerProvider,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    /// Postgres persistence is used when set, the JSON file otherwise.
    pub database_url: Option<String>,
    pub sessions_path: PathBuf,
    pub cors_origin: String,
    pub fast_tick: Duration,
    pub pro_tick: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load Provider Settings ---
        let answer_provider = parse_provider(
            &std::env::var("ANSWER_PROVIDER").unwrap_or_else(|_| "gemini".to_string()),
        )?;
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        match answer_provider {
            AnswerProvider::Gemini if gemini_api_key.is_none() => {
                return Err(ConfigError::MissingVar("GEMINI_API_KEY".to_string()))
            }
            AnswerProvider::OpenAi if openai_api_key.is_none() => {
                return Err(ConfigError::MissingVar("OPENAI_API_KEY".to_string()))
            }
            _ => {}
        }
        let openai_model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        // --- Load Persistence Settings ---
        let database_url = std::env::var("DATABASE_URL").ok();
        let sessions_path = std::env::var("SESSIONS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/sessions.json"));

        // --- Load Simulator Cadence ---
        let fast_tick = parse_millis("FAST_TICK_MS", FAST_TICK)?;
        let pro_tick = parse_millis("PRO_TICK_MS", PRO_TICK)?;

        Ok(Self {
            bind_address,
            log_level,
            answer_provider,
            gemini_api_key,
            openai_api_key,
            openai_model,
            database_url,
            sessions_path,
            cors_origin,
            fast_tick,
            pro_tick,
        })
    }

    /// Tick period of the thinking simulator for the given mode.
    pub fn tick_period(&self, pro_mode: bool) -> Duration {
        if pro_mode {
            self.pro_tick
        } else {
            self.fast_tick
        }
    }
}

fn parse_provider(value: &str) -> Result<AnswerProvider, ConfigError> {
    match value.to_lowercase().as_str() {
        "gemini" => Ok(AnswerProvider::Gemini),
        "openai" => Ok(AnswerProvider::OpenAi),
        other => Err(ConfigError::InvalidValue(
            "ANSWER_PROVIDER".to_string(),
            format!("'{}' is not one of gemini, openai", other),
        )),
    }
}

fn parse_millis(var: &str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_are_case_insensitive() {
        assert_eq!(parse_provider("Gemini").unwrap(), AnswerProvider::Gemini);
        assert_eq!(parse_provider("OPENAI").unwrap(), AnswerProvider::OpenAi);
        assert!(matches!(
            parse_provider("claude"),
            Err(ConfigError::InvalidValue(var, _)) if var == "ANSWER_PROVIDER"
        ));
    }
}
