//! Job working directory layout
//!
//! ```text
//! <working-directory>/
//!   galaxy.json                 manifest, written once
//!   staging/
//!     dataset_<uuid>.dat        one file per staged element
//!     scratch-<label>-<uuid>/   archive extractions
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::StagingSettings;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("working directory {} does not exist or is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StagingError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StagingError + '_ {
    move |source| StagingError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// The working directory of one job, owned for the duration of one request
#[derive(Debug, Clone)]
pub struct JobDirectory {
    root: PathBuf,
    staging: PathBuf,
    manifest: PathBuf,
}

impl JobDirectory {
    /// Open an existing working directory and create its staging area
    pub fn open(root: &Path, settings: &StagingSettings) -> Result<Self> {
        let job = Self::locate(root, settings)?;
        job.create_staging()?;
        Ok(job)
    }

    /// Lay out an existing working directory without creating anything in it
    pub fn locate(root: &Path, settings: &StagingSettings) -> Result<Self> {
        if !root.is_dir() {
            return Err(StagingError::NotADirectory(root.to_path_buf()));
        }

        let root = root.canonicalize().map_err(io_error(root))?;

        Ok(Self {
            staging: root.join(&settings.dir_name),
            manifest: root.join(&settings.manifest_file),
            root,
        })
    }

    pub fn create_staging(&self) -> Result<()> {
        std::fs::create_dir_all(&self.staging).map_err(io_error(&self.staging))?;
        debug!(root = %self.root.display(), "Opened job directory");
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest
    }

    /// Fresh, not yet existing path for one staged dataset
    pub fn allocate(&self) -> PathBuf {
        self.staging.join(format!("dataset_{}.dat", Uuid::new_v4()))
    }

    /// Create an empty scratch directory for archive extraction
    pub async fn scratch_dir(&self, label: &str) -> Result<PathBuf> {
        let path = self
            .staging
            .join(format!("scratch-{}-{}", label, Uuid::new_v4()));
        tokio::fs::create_dir(&path).await.map_err(io_error(&path))?;
        Ok(path)
    }
}
