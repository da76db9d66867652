use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub staging: StagingSettings,
}

/// Outbound HTTP behaviour for `src: url` elements
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSettings {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Total attempts per URL, including the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay, doubled after every failed attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: ByteSize,
}

impl HttpSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
            max_download_bytes: default_max_download_bytes(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    format!("datafetch/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_download_bytes() -> ByteSize {
    ByteSize::gib(50)
}

/// Limits on how a request is walked
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchSettings {
    /// Upper bound on resolving a single element, fetch and checks included
    #[serde(default = "default_element_deadline_secs")]
    pub element_deadline_secs: u64,
    #[serde(default = "default_max_concurrent_targets")]
    pub max_concurrent_targets: usize,
    /// Counts every element declared in the request, nested ones included
    #[serde(default = "default_max_elements_per_request")]
    pub max_elements_per_request: usize,
}

impl FetchSettings {
    pub fn element_deadline(&self) -> Duration {
        Duration::from_secs(self.element_deadline_secs)
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            element_deadline_secs: default_element_deadline_secs(),
            max_concurrent_targets: default_max_concurrent_targets(),
            max_elements_per_request: default_max_elements_per_request(),
        }
    }
}

fn default_element_deadline_secs() -> u64 {
    3600
}

fn default_max_concurrent_targets() -> usize {
    4
}

fn default_max_elements_per_request() -> usize {
    10_000
}

/// Layout of the job working directory
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StagingSettings {
    #[serde(default = "default_staging_dir")]
    pub dir_name: String,
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self {
            dir_name: default_staging_dir(),
            manifest_file: default_manifest_file(),
        }
    }
}

fn default_staging_dir() -> String {
    "staging".to_string()
}

fn default_manifest_file() -> String {
    "galaxy.json".to_string()
}
