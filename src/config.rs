use secrecy::Secret;
use serde::Deserialize;
use std::num::NonZeroU32;

use crate::services::{
    check_in::{CheckInSettings, MAX_TTL_SECONDS, MIN_TTL_SECONDS},
    identity::IdentitySettings,
};

/// Upper bound for bearer token lifetime (one year)
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,

    // Bearer tokens
    pub token_secret: Secret<String>,
    pub token_ttl_hours: i64,
    pub password_iterations: u32,

    // Check-in tokens
    pub check_in_base_url: String,
    pub check_in_ttl_seconds: i64,
    pub check_in_single_use: bool,

    /// Cron expression for the expired-token sweeper; `None` disables it.
    pub sweep_schedule: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Self::from_config(&config)
    }

    pub fn from_config(config: &config::Config) -> Result<Self, config::ConfigError> {
        let check_in_base_url: String = config
            .get("check_in_base_url")
            .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
        url::Url::parse(&check_in_base_url).map_err(|e| {
            config::ConfigError::Message(format!("check_in_base_url is not a valid URL: {e}"))
        })?;

        let password_iterations: u32 = config.get("password_iterations").unwrap_or(100_000);
        if password_iterations == 0 {
            return Err(config::ConfigError::Message(
                "password_iterations must be greater than zero".to_string(),
            ));
        }

        let token_ttl_hours: i64 = config.get("token_ttl_hours").unwrap_or(24);
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
            return Err(config::ConfigError::Message(format!(
                "token_ttl_hours must be between 1 and {}",
                MAX_TOKEN_TTL_HOURS
            )));
        }

        let check_in_ttl_seconds: i64 = config.get("check_in_ttl_seconds").unwrap_or(600);
        if !(MIN_TTL_SECONDS..=MAX_TTL_SECONDS).contains(&check_in_ttl_seconds) {
            return Err(config::ConfigError::Message(format!(
                "check_in_ttl_seconds must be between {} and {}",
                MIN_TTL_SECONDS, MAX_TTL_SECONDS
            )));
        }

        let sweep_schedule = match config.get::<String>("sweep_schedule") {
            Ok(s) if s.trim().is_empty() => None,
            Ok(s) => Some(s),
            Err(_) => Some("0 */5 * * * *".to_string()),
        };

        Ok(Self {
            database_url: config
                .get("database_url")
                .unwrap_or_else(|_| "sqlite://chamada.db?mode=rwc".to_string()),
            db_max_connections: config.get("db_max_connections").unwrap_or(5),
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port").unwrap_or(8000),

            token_secret: Secret::new(config.get("token_secret")?),
            token_ttl_hours,
            password_iterations,

            check_in_base_url,
            check_in_ttl_seconds,
            check_in_single_use: config.get("check_in_single_use").unwrap_or(false),

            sweep_schedule,
        })
    }

    pub fn identity_settings(&self) -> IdentitySettings {
        IdentitySettings {
            token_secret: self.token_secret.clone(),
            token_ttl: chrono::Duration::hours(
                self.token_ttl_hours.clamp(1, MAX_TOKEN_TTL_HOURS),
            ),
            password_iterations: NonZeroU32::new(self.password_iterations)
                .unwrap_or(NonZeroU32::MIN),
        }
    }

    pub fn check_in_settings(&self) -> CheckInSettings {
        CheckInSettings {
            default_ttl: chrono::Duration::seconds(
                self.check_in_ttl_seconds.clamp(MIN_TTL_SECONDS, MAX_TTL_SECONDS),
            ),
            single_use: self.check_in_single_use,
            base_url: self.check_in_base_url.clone(),
        }
    }
}
