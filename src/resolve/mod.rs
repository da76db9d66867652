//! Source resolution: one element source in, one local file out.

pub mod hashes;
mod source;
pub mod transform;

pub use source::SourceResolver;

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::fetch::FetchError;
use crate::request::HashFunction;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Path {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("Path {} is not a regular file", .0.display())]
    NotAFile(PathBuf),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to validate upload with [{function}] - expected [{expected}] got [{actual}]")]
    HashMismatch {
        function: HashFunction,
        expected: String,
        actual: String,
    },

    #[error("Element resolution exceeded the {0:?} deadline")]
    Deadline(Duration),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ResolveError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> ResolveError + '_ {
        move |source| ResolveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A successfully materialized element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub size: u64,
    /// The file is the caller's original, not a copy in the staging area
    pub linked: bool,
}
