use std::env;

use crate::error::NivaariError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Session cookie verification
    pub session_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, NivaariError> {
        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| NivaariError::Config("WEB_PORT must be a number".into()))?,
            session_secret: required_env("SESSION_SECRET")?,
        })
    }
}

fn required_env(key: &str) -> Result<String, NivaariError> {
    env::var(key).map_err(|_| NivaariError::Config(format!("{key} environment variable is required")))
}
