//! Environment-driven configuration, grounded on `wrldbldr-engine-adapters`'s
//! `infrastructure/config.rs`: optional fields fall back to a default via
//! `unwrap_or_else`, mandatory fields fail fast via `anyhow::Context`.

use std::env;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string for the world/account document store, e.g.
    /// `sqlite:./data/gaia.db?mode=rwc`.
    pub database_url: String,

    pub telnet_port: u16,
    pub websocket_port: u16,

    /// Directory tree of YAML/JSON/`.g` world-definition files, loaded once
    /// at startup.
    pub world_files_dir: String,

    /// Bootstrap admin account created on first run if no account with this
    /// login exists yet.
    pub default_admin_login: String,
    pub default_admin_password: String,

    pub write_back_interval_secs: u64,
    pub dirty_threshold: usize,
    pub tick_interval_ms: u64,

    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("GAIA_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/gaia.db?mode=rwc".to_string()),

            telnet_port: env::var("GAIA_TELNET_PORT")
                .unwrap_or_else(|_| "8888".to_string())
                .parse()
                .context("GAIA_TELNET_PORT must be a valid port number")?,

            websocket_port: env::var("GAIA_WEBSOCKET_PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .context("GAIA_WEBSOCKET_PORT must be a valid port number")?,

            world_files_dir: env::var("GAIA_WORLD_FILES_DIR")
                .unwrap_or_else(|_| "./world".to_string()),

            default_admin_login: env::var("GAIA_DEFAULT_ADMIN_LOGIN")
                .unwrap_or_else(|_| "admin".to_string()),
            default_admin_password: env::var("GAIA_DEFAULT_ADMIN_PASSWORD")
                .context("GAIA_DEFAULT_ADMIN_PASSWORD environment variable is required")?,

            write_back_interval_secs: env::var("GAIA_WRITE_BACK_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            dirty_threshold: env::var("GAIA_DIRTY_THRESHOLD")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .unwrap_or(200),
            tick_interval_ms: env::var("GAIA_TICK_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),

            cors_allowed_origins: env::var("GAIA_CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_admin_password_is_an_error() {
        for key in [
            "GAIA_DATABASE_URL",
            "GAIA_TELNET_PORT",
            "GAIA_WEBSOCKET_PORT",
            "GAIA_WORLD_FILES_DIR",
            "GAIA_DEFAULT_ADMIN_LOGIN",
            "GAIA_DEFAULT_ADMIN_PASSWORD",
            "GAIA_WRITE_BACK_INTERVAL_SECS",
            "GAIA_DIRTY_THRESHOLD",
            "GAIA_TICK_INTERVAL_MS",
            "GAIA_CORS_ALLOWED_ORIGINS",
        ] {
            env::remove_var(key);
        }
        assert!(AppConfig::from_env().is_err());
    }
}
