//! Application configuration module
//!
//! Handles loading configuration from `.env`, an optional `pgconverge`
//! settings file and `PGCONVERGE__*` environment variables.

use crate::error::{Error, Result};
use crate::pipeline::SyncOptions;
use serde::Deserialize;
use std::path::PathBuf;

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Connect over TLS
    pub ssl: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            ssl: false,
        }
    }
}

impl DatabaseConfig {
    /// Parse a DATABASE_URL connection string (postgresql://...)
    pub fn from_url(raw: &str) -> Result<Self> {
        let parsed = url::Url::parse(raw).map_err(|_| {
            Error::Config("Invalid DATABASE_URL format (expected postgresql://...)".to_string())
        })?;

        let host = parsed
            .host_str()
            .ok_or_else(|| Error::Config("Missing host in DATABASE_URL".to_string()))?
            .to_string();

        let ssl = parsed
            .query_pairs()
            .any(|(key, value)| key == "sslmode" && matches!(value.as_ref(), "require" | "verify-ca" | "verify-full"));

        Ok(Self {
            host,
            port: parsed.port().unwrap_or(5432),
            user: parsed.username().to_string(),
            password: parsed.password().map(str::to_string).unwrap_or_default(),
            database: parsed.path().trim_start_matches('/').to_string(),
            ssl,
        })
    }

    /// Fall back to individual DB_* environment variables
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            user: std::env::var("DB_USER").unwrap_or(defaults.user),
            password: std::env::var("DB_PASSWORD").unwrap_or_default(),
            database: std::env::var("DB_NAME").unwrap_or(defaults.database),
            ssl: std::env::var("DB_SSL")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

/// Engine settings read through the `config` crate
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Schema used for names declared without one
    pub default_schema: String,
    /// Schema documents loaded by the binary
    pub schema_paths: Vec<PathBuf>,
    pub sync: SyncOptions,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_schema: "public".to_string(),
            schema_paths: Vec::new(),
            sync: SyncOptions::default(),
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub engine: EngineSettings,
}

impl Settings {
    /// Load settings from `.env`, the optional settings file and the environment
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let database = match std::env::var("DATABASE_URL") {
            Ok(url) => DatabaseConfig::from_url(&url)?,
            Err(_) => DatabaseConfig::from_env(),
        };

        let engine = config::Config::builder()
            .add_source(config::File::with_name("pgconverge").required(false))
            .add_source(
                config::Environment::with_prefix("PGCONVERGE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("schema_paths")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize::<EngineSettings>())
            .map_err(|e| Error::Config(format!("Failed to parse configuration: {}", e)))?;

        Ok(Self { database, engine })
    }
}
