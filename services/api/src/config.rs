//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use resource_board_core::Coordinates;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";
const DEFAULT_USER_AGENT: &str = concat!("resource-board/", env!("CARGO_PKG_VERSION"));

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where the board's slots are kept.
#[derive(Clone, Debug, PartialEq)]
pub enum StorageBackend {
    /// A single JSON document inside this directory.
    File { data_dir: PathBuf },
    Postgres { database_url: String },
    /// Nothing survives a restart; useful for demos.
    Memory,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub storage: StorageBackend,
    pub log_level: Level,
    pub geocoder_url: String,
    pub geocoder_timeout: Duration,
    pub geocoder_user_agent: String,
    /// Starting device location: used for new posts and as the geocoding fallback.
    pub device_location: Coordinates,
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server ---
        let bind_address: SocketAddr =
            parse_or(&lookup, "BIND_ADDRESS", "127.0.0.1:3000".parse().ok())?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Storage ---
        let backend = lookup("STORAGE_BACKEND").unwrap_or_else(|| "file".to_string());
        let storage = match backend.trim().to_lowercase().as_str() {
            "file" => StorageBackend::File {
                data_dir: lookup("DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./data")),
            },
            "postgres" => StorageBackend::Postgres {
                database_url: lookup("DATABASE_URL")
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
            },
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORAGE_BACKEND".to_string(),
                    format!("'{other}' is not one of file, postgres, memory"),
                ))
            }
        };

        // --- Geocoding ---
        let geocoder_url =
            lookup("GEOCODER_URL").unwrap_or_else(|| DEFAULT_GEOCODER_URL.to_string());
        let timeout_secs: u64 = parse_or(&lookup, "GEOCODER_TIMEOUT_SECS", Some(6))?;
        let geocoder_user_agent =
            lookup("GEOCODER_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        // --- Device location ---
        let device_location = Coordinates::new(
            parse_or(&lookup, "DEVICE_LATITUDE", Some(51.5209))?,
            parse_or(&lookup, "DEVICE_LONGITUDE", Some(-0.0550))?,
        );
        if !device_location.is_valid() {
            return Err(ConfigError::InvalidValue(
                "DEVICE_LATITUDE/DEVICE_LONGITUDE".to_string(),
                "coordinates out of range".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            storage,
            log_level,
            geocoder_url,
            geocoder_timeout: Duration::from_secs(timeout_secs),
            geocoder_user_agent,
            device_location,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: Option<T>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVar(key.to_string())),
    }
}
