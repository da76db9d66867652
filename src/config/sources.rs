use super::models::Config;
use config::{ConfigError, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "DATAFETCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/datafetch.toml";
const ENV_PREFIX: &str = "DATAFETCH";
const ENV_SEPARATOR: &str = "__";

/// Path of the TOML file used when none is given explicitly
pub fn default_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration with priority (lowest to highest):
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if it exists)
/// 3. `.env` file (via dotenvy)
/// 4. `DATAFETCH__*` environment variables
pub fn load(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    // Missing .env is the common case
    let _ = dotenvy::dotenv();

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_path);

    load_from_sources(&path)
}

/// Load from a specific TOML path plus the process environment
pub fn load_from_sources(config_path: &Path) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Loading configuration file");
        builder = builder.add_source(File::from(config_path).format(FileFormat::Toml));
    } else {
        tracing::debug!(
            path = %config_path.display(),
            "Configuration file not found, using defaults and environment overrides"
        );
    }

    // DATAFETCH__HTTP__MAX_RETRIES -> http.max_retries
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
