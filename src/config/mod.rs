//! Configuration management for datafetch
//!
//! Settings are layered from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use datafetch::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Manifest file: {}", config.staging.manifest_file);
//! ```
//!
//! # Environment Variables
//!
//! Any setting can be overridden with `DATAFETCH__<section>__<key>`:
//! - `DATAFETCH__HTTP__MAX_RETRIES=1`
//! - `DATAFETCH__HTTP__MAX_DOWNLOAD_BYTES=10GB`
//! - `DATAFETCH__FETCH__MAX_CONCURRENT_TARGETS=8`
//!
//! # Configuration File
//!
//! By default the file is `config/datafetch.toml`; `DATAFETCH_CONFIG` or the
//! `--config` flag point elsewhere. A missing file is not an error.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{Config, FetchSettings, HttpSettings, StagingSettings};
pub use validation::ValidationError;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from the default file location and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Load configuration, reading `path` instead of the default file when given
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path without consulting `.env`
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
