use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be positive")]
    NonPositive { field: &'static str },

    #[error("http.max_retries must allow at least one attempt")]
    NoAttempts,

    #[error("http.user_agent must not be empty")]
    EmptyUserAgent,

    #[error("staging.{field} '{value}' must be a single non-empty path component")]
    InvalidFileName { field: &'static str, value: String },

    #[error("staging.dir_name and staging.manifest_file must differ")]
    ManifestInsideStaging,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_http(config)?;
    validate_fetch(config)?;
    validate_staging(config)?;
    Ok(())
}

fn validate_http(config: &Config) -> Result<(), ValidationError> {
    let http = &config.http;

    if http.connect_timeout_secs == 0 {
        return Err(ValidationError::NonPositive {
            field: "http.connect_timeout_secs",
        });
    }

    if http.request_timeout_secs == 0 {
        return Err(ValidationError::NonPositive {
            field: "http.request_timeout_secs",
        });
    }

    if http.max_retries == 0 {
        return Err(ValidationError::NoAttempts);
    }

    if http.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }

    if http.max_download_bytes.as_u64() == 0 {
        return Err(ValidationError::NonPositive {
            field: "http.max_download_bytes",
        });
    }

    Ok(())
}

fn validate_fetch(config: &Config) -> Result<(), ValidationError> {
    let fetch = &config.fetch;

    if fetch.element_deadline_secs == 0 {
        return Err(ValidationError::NonPositive {
            field: "fetch.element_deadline_secs",
        });
    }

    if fetch.max_concurrent_targets == 0 {
        return Err(ValidationError::NonPositive {
            field: "fetch.max_concurrent_targets",
        });
    }

    if fetch.max_elements_per_request == 0 {
        return Err(ValidationError::NonPositive {
            field: "fetch.max_elements_per_request",
        });
    }

    Ok(())
}

fn validate_staging(config: &Config) -> Result<(), ValidationError> {
    let staging = &config.staging;

    check_file_name("dir_name", &staging.dir_name)?;
    check_file_name("manifest_file", &staging.manifest_file)?;

    if staging.dir_name == staging.manifest_file {
        return Err(ValidationError::ManifestInsideStaging);
    }

    Ok(())
}

fn check_file_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\');

    if invalid {
        return Err(ValidationError::InvalidFileName {
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}
