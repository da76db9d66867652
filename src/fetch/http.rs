//! reqwest-backed fetcher for `src: url` elements

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Url};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{FetchError, FetchFailure, Fetcher};
use crate::config::{ByteSize, HttpSettings};

/// HTTP(S) downloader with retry and a response size cap
pub struct HttpFetcher {
    client: Client,
    max_attempts: u32,
    retry_backoff: Duration,
    max_bytes: ByteSize,
}

impl HttpFetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .user_agent(&settings.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            max_attempts: settings.max_retries.max(1),
            retry_backoff: settings.retry_backoff(),
            max_bytes: settings.max_download_bytes,
        })
    }

    async fn download_once(&self, url: Url, dest: &Path) -> Result<u64, FetchFailure> {
        debug!(%url, "Starting download");

        let mut response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchFailure::Timeout
            } else if e.is_redirect() {
                FetchFailure::TooManyRedirects
            } else {
                FetchFailure::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes.as_u64() {
                return Err(FetchFailure::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(FetchFailure::Write)?;
        let mut written: u64 = 0;

        loop {
            let chunk: Option<Bytes> = response.chunk().await.map_err(|e| {
                if e.is_timeout() {
                    FetchFailure::Timeout
                } else {
                    FetchFailure::RequestFailed(format!("Failed to read body: {e}"))
                }
            })?;

            let Some(chunk) = chunk else {
                break;
            };

            written += chunk.len() as u64;
            if written > self.max_bytes.as_u64() {
                return Err(FetchFailure::TooLarge {
                    limit: self.max_bytes,
                });
            }

            file.write_all(&chunk).await.map_err(FetchFailure::Write)?;
        }

        file.flush().await.map_err(FetchFailure::Write)?;

        debug!(%url, size = written, "Download completed");
        Ok(written)
    }
}

fn parse_url(raw: &str) -> Result<Url, FetchFailure> {
    let url = Url::parse(raw).map_err(|e| FetchFailure::InvalidUrl(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchFailure::UnsupportedScheme(other.to_string())),
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let parsed = parse_url(url).map_err(|reason| FetchError::new(url, reason))?;
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.download_once(parsed.clone(), dest).await {
                Ok(size) => {
                    if attempts > 1 {
                        debug!(url, attempts, "Download succeeded after retry");
                    }
                    return Ok(size);
                }
                Err(reason) => {
                    // Never leave a truncated body behind
                    let _ = tokio::fs::remove_file(dest).await;

                    if !reason.is_retryable() || attempts >= self.max_attempts {
                        warn!(url, attempts, error = %reason, "Download failed");
                        return Err(FetchError::new(url, reason));
                    }

                    warn!(url, attempts, error = %reason, "Download failed, retrying");

                    let backoff = self.retry_backoff * 2u32.saturating_pow(attempts - 1);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
