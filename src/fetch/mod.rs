//! Remote retrieval of element content.
//!
//! The [`Fetcher`] trait is the seam between the staging engine and the
//! network; [`HttpFetcher`] is the production implementation and tests swap
//! in their own.

mod http;

pub use http::HttpFetcher;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::config::ByteSize;

/// A failed fetch; the message always starts with `Failed to fetch url <url>`
#[derive(Debug, Error)]
#[error("Failed to fetch url {url}: {reason}")]
pub struct FetchError {
    pub url: String,
    pub reason: FetchFailure,
}

impl FetchError {
    pub fn new(url: impl Into<String>, reason: FetchFailure) -> Self {
        Self {
            url: url.into(),
            reason,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("connection timeout")]
    Timeout,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("HTTP {code}: {reason}")]
    Status { code: u16, reason: String },

    #[error("response exceeds the {limit} download limit")]
    TooLarge { limit: ByteSize },

    #[error("failed to write response body: {0}")]
    Write(#[source] std::io::Error),
}

impl FetchFailure {
    /// Transport trouble and server-side statuses are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchFailure::RequestFailed(_) | FetchFailure::Timeout => true,
            FetchFailure::Status { code, .. } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

/// Retrieves one URL into a local file, returning the number of bytes written
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}
