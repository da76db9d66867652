//! Expansion of `elements_from` sources into child element specs.
//!
//! | strategy        | source                  | children                      |
//! |-----------------|-------------------------|-------------------------------|
//! | `bagit`         | bag directory           | payload under `data/`         |
//! | `bagit_archive` | archive holding a bag   | payload under `data/`         |
//! | `archive`       | zip, tar or tar.gz      | every extracted file          |
//! | `directory`     | directory               | every file, nested as groups  |
//!
//! An expansion either yields its complete child list or fails as a whole.

mod archive;
mod bagit;
mod directory;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::fetch::{FetchError, Fetcher};
use crate::request::{ElementMetadata, ElementSpec, ExpansionStrategy};
use crate::staging::{JobDirectory, StagingError};

#[derive(Debug, Error)]
pub enum ExpansionError {
    #[error("Expected bagit.txt does not exist: {}", .0.display())]
    MissingBagDeclaration(PathBuf),

    #[error("Bag validation failed: {0}")]
    InvalidBag(String),

    #[error("Failed to extract archive {}: {reason}", .archive.display())]
    Archive { archive: PathBuf, reason: String },

    #[error("Path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExpansionError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> ExpansionError + '_ {
        move |source| ExpansionError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExpansionError>;

/// Runs an expansion strategy against an already resolved source
#[derive(Clone)]
pub struct ElementExpander {
    job: Arc<JobDirectory>,
    fetcher: Arc<dyn Fetcher>,
}

impl ElementExpander {
    pub fn new(job: Arc<JobDirectory>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { job, fetcher }
    }

    /// Child specs for `source`; children inherit format settings from `metadata`
    pub async fn expand(
        &self,
        strategy: ExpansionStrategy,
        source: &Path,
        metadata: &ElementMetadata,
    ) -> Result<Vec<ElementSpec>> {
        debug!(%strategy, source = %source.display(), "Expanding element");

        let root = match strategy {
            ExpansionStrategy::Directory => source.to_path_buf(),
            ExpansionStrategy::Archive => self.extract(source, "archive").await?,
            ExpansionStrategy::Bagit => bagit::prepare(source, self.fetcher.as_ref()).await?,
            ExpansionStrategy::BagitArchive => {
                let extracted = self.extract(source, "bagit").await?;
                let bag = bagit::locate_root(&extracted)?;
                bagit::prepare(&bag, self.fetcher.as_ref()).await?
            }
        };

        let template = metadata.inherited();
        let children = tokio::task::spawn_blocking(move || directory::to_specs(&root, &template))
            .await
            .map_err(|e| ExpansionError::io(source)(std::io::Error::other(e)))??;

        info!(%strategy, children = children.len(), "Expanded element");
        Ok(children)
    }

    async fn extract(&self, archive_path: &Path, label: &str) -> Result<PathBuf> {
        let dest = self.job.scratch_dir(label).await?;

        let source = archive_path.to_path_buf();
        let target = dest.clone();
        tokio::task::spawn_blocking(move || archive::extract(&source, &target))
            .await
            .map_err(|e| ExpansionError::io(archive_path)(std::io::Error::other(e)))??;

        Ok(dest)
    }
}
