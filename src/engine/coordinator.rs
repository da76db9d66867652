use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::TargetMaterializer;
use crate::config::Config;
use crate::expand::ElementExpander;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::manifest::{Manifest, ManifestError, write_manifest};
use crate::observability::FetchStats;
use crate::request::{FetchRequest, RequestValidationError, validate_request};
use crate::resolve::SourceResolver;
use crate::staging::{JobDirectory, StagingError};

/// Errors that end a run without a manifest
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("failed to read request {}: {source}", .path.display())]
    ReadRequest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed request {}: {source}", .path.display())]
    MalformedRequest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestValidationError),
}

/// Runs a whole fetch request against one job directory
pub struct BatchCoordinator {
    config: Config,
    fetcher: Arc<dyn Fetcher>,
    stats: Arc<FetchStats>,
}

impl BatchCoordinator {
    pub fn new(config: Config, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            fetcher,
            stats: Arc::new(FetchStats::new()),
        }
    }

    /// Coordinator backed by an [`HttpFetcher`] built from `config.http`
    pub fn from_config(config: Config) -> Result<Self, RunError> {
        let fetcher = HttpFetcher::new(&config.http)?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    /// Read the request, materialize it into `working_directory` and write
    /// the manifest.
    ///
    /// Fails without touching the directory if it is unusable, already holds
    /// a manifest, or the request is invalid.
    pub async fn execute(
        &self,
        request_path: &Path,
        working_directory: &Path,
    ) -> Result<Manifest, RunError> {
        let job = JobDirectory::locate(working_directory, &self.config.staging)?;
        if job.manifest_path().exists() {
            return Err(ManifestError::ManifestExists(job.manifest_path().to_path_buf()).into());
        }

        let request = self.read_request(request_path).await?;
        validate_request(&request, &self.config.fetch)?;

        job.create_staging()?;
        let job = Arc::new(job);

        info!(
            request = %request_path.display(),
            targets = request.targets.len(),
            allow_failed_collections = request.allow_failed_collections,
            "Processing fetch request"
        );

        let manifest = self.run(&request, job.clone()).await;
        write_manifest(&manifest, job.manifest_path())?;

        self.stats.snapshot().log();
        Ok(manifest)
    }

    /// Materialize every target. Never fails: target and element errors are
    /// recorded in the manifest. Outcomes keep request order.
    pub async fn run(&self, request: &FetchRequest, job: Arc<JobDirectory>) -> Manifest {
        let materializer = TargetMaterializer::new(
            SourceResolver::new(
                self.fetcher.clone(),
                job.clone(),
                self.config.fetch.element_deadline(),
            ),
            ElementExpander::new(job, self.fetcher.clone()),
            self.stats.clone(),
        );

        let allow_failed = request.allow_failed_collections;
        let unnamed_outputs = stream::iter(&request.targets)
            .map(|target| materializer.materialize(target, allow_failed))
            .buffered(self.config.fetch.max_concurrent_targets)
            .collect()
            .await;

        Manifest { unnamed_outputs }
    }

    async fn read_request(&self, path: &Path) -> Result<FetchRequest, RunError> {
        let body = tokio::fs::read(path)
            .await
            .map_err(|source| RunError::ReadRequest {
                path: path.to_path_buf(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|source| RunError::MalformedRequest {
            path: path.to_path_buf(),
            source,
        })
    }
}
