use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use super::Manifest;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest {} already exists, refusing to overwrite", .0.display())]
    ManifestExists(PathBuf),

    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write manifest {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Write `manifest` to `path`. The file must not exist yet.
pub fn write_manifest(manifest: &Manifest, path: &Path) -> Result<(), ManifestError> {
    let body = serde_json::to_vec_pretty(manifest)?;

    let io_error = |source: std::io::Error| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => ManifestError::ManifestExists(path.to_path_buf()),
            _ => io_error(e),
        })?;

    file.write_all(&body).map_err(io_error)?;
    file.sync_all().map_err(io_error)?;

    info!(
        path = %path.display(),
        targets = manifest.unnamed_outputs.len(),
        "Manifest written"
    );
    Ok(())
}
