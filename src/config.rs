use std::time::Duration;

use rand::distr::{Alphanumeric, SampleString};

use crate::briefing::BriefingSettings;
use crate::briefing::generator::OpenAiSettings;

/// Runtime configuration, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub public_base_url: String,
    pub session_key: Option<String>,
    pub registration_password: String,
    pub openai: OpenAiSettings,
    pub briefing: BriefingSettings,
    pub scheduler_tick: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{key} must be set"),
            ConfigError::Invalid { key, value } => write!(f, "{key} has invalid value '{value}'"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Failed to load .env: {e}");
            }
        }

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let bind_addr = var_or("BIND_ADDR", "127.0.0.1:8080");
        let public_base_url = var_or("PUBLIC_BASE_URL", &format!("http://{bind_addr}"))
            .trim_end_matches('/')
            .to_string();

        let registration_password = match std::env::var("REGISTRATION_PASSWORD") {
            Ok(val) if !val.trim().is_empty() => val,
            _ => {
                let generated = Alphanumeric.sample_string(&mut rand::rng(), 12);
                log::warn!("No REGISTRATION_PASSWORD set, generated one for this run: {generated}");
                generated
            }
        };

        let openai = OpenAiSettings {
            api_key: var_or("OPENAI_API_KEY", ""),
            base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: var_or("OPENAI_MODEL", "gpt-4.1-nano"),
            max_tokens: parse_or("OPENAI_MAX_TOKENS", 1500)?,
            timeout: Duration::from_secs(parse_or("OPENAI_TIMEOUT_SECS", 120)?),
        };
        if openai.api_key.is_empty() {
            log::warn!("No OPENAI_API_KEY set, every generation will fail");
        }

        let briefing = BriefingSettings {
            debounce: Duration::from_secs(parse_or("FEEDBACK_PROCESSING_INTERVAL", 30)?),
            client_refresh: Duration::from_secs(parse_or("CLIENT_REFRESH_INTERVAL", 20)?),
            claim_lease: Duration::from_secs(parse_or("CLAIM_LEASE_SECS", 300)?),
            resolve_poll: Duration::from_millis(500),
            retry_limit: parse_or("REGENERATION_RETRY_LIMIT", 0)?,
            retry_delay: Duration::from_secs(parse_or("REGENERATION_RETRY_DELAY_SECS", 60)?),
        };

        Ok(Self {
            database_url,
            bind_addr,
            public_base_url,
            session_key: std::env::var("SESSION_KEY").ok(),
            registration_password,
            openai,
            briefing,
            scheduler_tick: Duration::from_secs(parse_or("SCHEDULER_TICK_SECS", 10)?),
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: val }),
        Err(_) => Ok(default),
    }
}
