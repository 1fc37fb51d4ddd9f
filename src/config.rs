//! Runtime configuration, resolved once at startup.

use std::env;

/// Deployment knobs. Fingerprinting parameters are deliberately not here:
/// they live as constants in [`crate::fingerprint`], since catalogue entries
/// written with one geometry can never match queries made with another.
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:catalogue.db?mode=rwc".to_string()),
        }
    }
}
