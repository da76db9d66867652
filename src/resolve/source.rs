use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ResolveError, StagedFile, hashes, transform};
use crate::fetch::{FetchError, FetchFailure, Fetcher};
use crate::request::{ElementMetadata, HashSpec, LinkMode, Source};
use crate::staging::JobDirectory;

/// Turns element sources into local files inside the job directory
#[derive(Clone)]
pub struct SourceResolver {
    fetcher: Arc<dyn Fetcher>,
    job: Arc<JobDirectory>,
    deadline: Duration,
}

impl SourceResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, job: Arc<JobDirectory>, deadline: Duration) -> Self {
        Self {
            fetcher,
            job,
            deadline,
        }
    }

    pub fn job(&self) -> &JobDirectory {
        &self.job
    }

    /// Materialize a leaf: stage it, apply requested rewrites, verify hashes
    pub async fn resolve(
        &self,
        source: &Source,
        metadata: &ElementMetadata,
    ) -> Result<StagedFile, ResolveError> {
        let dest = self.job.allocate();
        self.with_deadline(source, &dest, self.stage(source, metadata, &dest))
            .await
    }

    /// Local path of an expandable source; directories are accepted and
    /// nothing is copied for `src: path`
    pub async fn resolve_to_path(&self, source: &Source) -> Result<PathBuf, ResolveError> {
        let dest = self.job.allocate();
        self.with_deadline(source, &dest, async {
            match source {
                Source::Path { path, .. } => {
                    if tokio::fs::metadata(path).await.is_err() {
                        return Err(ResolveError::NotFound(path.clone()));
                    }
                    Ok(path.clone())
                }
                Source::Url { url } => {
                    self.fetcher.fetch(url, &dest).await?;
                    Ok(dest.clone())
                }
                Source::Pasted { content } => {
                    write_pasted(&dest, content).await?;
                    Ok(dest.clone())
                }
            }
        })
        .await
    }

    /// Run `work` under the element deadline. `dest` is the staging path the
    /// work may write to; it is removed when the element fails.
    async fn with_deadline<T>(
        &self,
        source: &Source,
        dest: &Path,
        work: impl Future<Output = Result<T, ResolveError>>,
    ) -> Result<T, ResolveError> {
        let result = match tokio::time::timeout(self.deadline, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(deadline = ?self.deadline, "Element resolution timed out");
                Err(match source {
                    Source::Url { url } => {
                        ResolveError::Fetch(FetchError::new(url.as_str(), FetchFailure::Timeout))
                    }
                    _ => ResolveError::Deadline(self.deadline),
                })
            }
        };

        if result.is_err() {
            discard(dest).await;
        }
        result
    }

    async fn stage(
        &self,
        source: &Source,
        metadata: &ElementMetadata,
        dest: &Path,
    ) -> Result<StagedFile, ResolveError> {
        let rewrite = metadata.to_posix_lines || metadata.space_to_tab;

        let mut staged = match source {
            Source::Path { path, link } => self.stage_path(path, *link, dest).await?,
            Source::Url { url } => {
                let size = self.fetcher.fetch(url, dest).await?;
                info!(url, size, "Fetched url");
                StagedFile {
                    path: dest.to_path_buf(),
                    size,
                    linked: false,
                }
            }
            Source::Pasted { content } => {
                write_pasted(dest, content).await?;
                StagedFile {
                    path: dest.to_path_buf(),
                    size: content.len() as u64,
                    linked: false,
                }
            }
        };

        if rewrite {
            if staged.linked {
                warn!(
                    path = %staged.path.display(),
                    "Skipping content rewrite for a linked file"
                );
            } else {
                let path = staged.path.clone();
                let (posix, tabs) = (metadata.to_posix_lines, metadata.space_to_tab);
                let size =
                    blocking(&staged.path, move || transform::apply(&path, posix, tabs)).await?;
                staged.size = size;
            }
        }

        verify_hashes(&staged.path, &metadata.hashes).await?;

        Ok(staged)
    }

    async fn stage_path(
        &self,
        path: &Path,
        link: LinkMode,
        dest: &Path,
    ) -> Result<StagedFile, ResolveError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|_| ResolveError::NotFound(path.to_path_buf()))?;

        if !meta.is_file() {
            return Err(ResolveError::NotAFile(path.to_path_buf()));
        }

        match link {
            LinkMode::LinkToFiles => {
                debug!(path = %path.display(), "Linking file in place");
                Ok(StagedFile {
                    path: path.to_path_buf(),
                    size: meta.len(),
                    linked: true,
                })
            }
            LinkMode::CopyFiles => {
                let size = tokio::fs::copy(path, dest)
                    .await
                    .map_err(ResolveError::io(path))?;
                debug!(from = %path.display(), to = %dest.display(), size, "Copied file");
                Ok(StagedFile {
                    path: dest.to_path_buf(),
                    size,
                    linked: false,
                })
            }
        }
    }
}

/// Remove a partially staged file, if any
async fn discard(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => debug!(path = %dest.display(), "Removed partial staged file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %dest.display(), error = %e, "Failed to remove partial staged file"),
    }
}

async fn write_pasted(dest: &Path, content: &str) -> Result<(), ResolveError> {
    tokio::fs::write(dest, content.as_bytes())
        .await
        .map_err(ResolveError::io(dest))
}

async fn blocking<T, F>(path: &Path, work: F) -> Result<T, ResolveError>
where
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ResolveError::io(path)(std::io::Error::other(e)))?
        .map_err(ResolveError::io(path))
}

async fn verify_hashes(path: &Path, declared: &[HashSpec]) -> Result<(), ResolveError> {
    for hash in declared {
        let file = path.to_path_buf();
        let function = hash.hash_function;
        let actual = blocking(path, move || hashes::digest_file(&file, function)).await?;

        if !actual.eq_ignore_ascii_case(&hash.hash_value) {
            return Err(ResolveError::HashMismatch {
                function,
                expected: hash.hash_value.clone(),
                actual,
            });
        }
        debug!(path = %path.display(), %function, "Hash verified");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpSettings, StagingSettings};
    use crate::fetch::HttpFetcher;
    use crate::request::HashFunction;
    use crate::test_support::{StallingFetcher, spawn_server};
    use tempfile::TempDir;

    fn resolver(dir: &TempDir) -> SourceResolver {
        let job = JobDirectory::open(dir.path(), &StagingSettings::default()).unwrap();
        let fetcher = HttpFetcher::new(&HttpSettings {
            max_retries: 1,
            ..HttpSettings::default()
        })
        .unwrap();
        SourceResolver::new(Arc::new(fetcher), Arc::new(job), Duration::from_secs(30))
    }

    /// Resolver whose fetches write a few bytes and then outlive `deadline`
    fn stalling_resolver(dir: &TempDir, deadline: Duration) -> SourceResolver {
        let job = JobDirectory::open(dir.path(), &StagingSettings::default()).unwrap();
        let fetcher = StallingFetcher {
            partial: b"partial".to_vec(),
            stall: Duration::from_secs(5),
        };
        SourceResolver::new(Arc::new(fetcher), Arc::new(job), deadline)
    }

    fn staged_files(resolver: &SourceResolver) -> Vec<PathBuf> {
        std::fs::read_dir(resolver.job().staging_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    fn path_source(path: PathBuf) -> Source {
        Source::Path {
            path,
            link: LinkMode::CopyFiles,
        }
    }

    #[tokio::test]
    async fn test_path_is_copied() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.txt");
        std::fs::write(&input, b"chr1\t1\t2\n").unwrap();

        let resolver = resolver(&dir);
        let staged = resolver
            .resolve(&path_source(input.clone()), &ElementMetadata::default())
            .await
            .unwrap();

        assert_ne!(staged.path, input);
        assert!(staged.path.starts_with(resolver.job().staging_dir()));
        assert_eq!(std::fs::read(&staged.path).unwrap(), b"chr1\t1\t2\n");
        assert_eq!(staged.size, 9);
        assert!(!staged.linked);
    }

    #[tokio::test]
    async fn test_missing_path() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir);

        let err = resolver
            .resolve(
                &path_source(dir.path().join("absent.txt")),
                &ElementMetadata::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_directory_is_not_a_leaf() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir);

        let err = resolver
            .resolve(&path_source(dir.path().to_path_buf()), &ElementMetadata::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::NotAFile(_)));
        assert!(
            resolver
                .resolve_to_path(&path_source(dir.path().to_path_buf()))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_linked_file_skips_rewrite() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input.txt");
        std::fs::write(&input, b"a b\r\n").unwrap();

        let resolver = resolver(&dir);
        let metadata = ElementMetadata {
            to_posix_lines: true,
            ..ElementMetadata::default()
        };
        let staged = resolver
            .resolve(
                &Source::Path {
                    path: input.clone(),
                    link: LinkMode::LinkToFiles,
                },
                &metadata,
            )
            .await
            .unwrap();

        assert!(staged.linked);
        assert_eq!(staged.path, input);
        assert_eq!(std::fs::read(&input).unwrap(), b"a b\r\n");
    }

    #[tokio::test]
    async fn test_pasted_with_rewrites() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir);
        let metadata = ElementMetadata {
            to_posix_lines: true,
            space_to_tab: true,
            ..ElementMetadata::default()
        };

        let staged = resolver
            .resolve(
                &Source::Pasted {
                    content: "a  b\r\nc d".to_string(),
                },
                &metadata,
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read(&staged.path).unwrap(), b"a\tb\nc\td\n");
        assert_eq!(staged.size, 8);
    }

    #[tokio::test]
    async fn test_hash_mismatch() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir);
        let metadata = ElementMetadata {
            hashes: vec![HashSpec {
                hash_function: HashFunction::Md5,
                hash_value: "00000000000000000000000000000000".to_string(),
            }],
            ..ElementMetadata::default()
        };

        let err = resolver
            .resolve(
                &Source::Pasted {
                    content: "abc".to_string(),
                },
                &metadata,
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to validate upload with [MD5] - expected [00000000000000000000000000000000] got [900150983cd24fb0d6963f7d28e17f72]"
        );
    }

    #[tokio::test]
    async fn test_url_fetch_and_hash() {
        let server = spawn_server(vec![("abc.txt", b"abc".to_vec())]).await;
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir);
        let metadata = ElementMetadata {
            hashes: vec![HashSpec {
                hash_function: HashFunction::Md5,
                hash_value: "900150983CD24FB0D6963F7D28E17F72".to_string(),
            }],
            ..ElementMetadata::default()
        };

        let staged = resolver
            .resolve(
                &Source::Url {
                    url: server.url("files/abc.txt"),
                },
                &metadata,
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read(&staged.path).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_url_failure_message() {
        let server = spawn_server(vec![]).await;
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir);
        let url = server.url("files/nothing");

        let err = resolver
            .resolve(&Source::Url { url: url.clone() }, &ElementMetadata::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains(&format!("Failed to fetch url {url}")));
    }

    #[tokio::test]
    async fn test_deadline_removes_partial_download() {
        let dir = TempDir::new().unwrap();
        let resolver = stalling_resolver(&dir, Duration::from_millis(200));
        let url = "https://example.org/slow.dat".to_string();

        let err = resolver
            .resolve(&Source::Url { url: url.clone() }, &ElementMetadata::default())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            format!("Failed to fetch url {url}: connection timeout")
        );
        assert!(staged_files(&resolver).is_empty());
    }

    #[tokio::test]
    async fn test_deadline_on_expandable_source() {
        let dir = TempDir::new().unwrap();
        let resolver = stalling_resolver(&dir, Duration::from_millis(200));

        let err = resolver
            .resolve_to_path(&Source::Url {
                url: "https://example.org/bag.zip".to_string(),
            })
            .await
            .unwrap_err();

        assert!(
            err.to_string()
                .starts_with("Failed to fetch url https://example.org/bag.zip")
        );
        assert!(staged_files(&resolver).is_empty());
    }

    #[tokio::test]
    async fn test_failed_hash_leaves_no_staged_file() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir);
        let metadata = ElementMetadata {
            hashes: vec![HashSpec {
                hash_function: HashFunction::Md5,
                hash_value: "00000000000000000000000000000000".to_string(),
            }],
            ..ElementMetadata::default()
        };

        resolver
            .resolve(
                &Source::Pasted {
                    content: "abc".to_string(),
                },
                &metadata,
            )
            .await
            .unwrap_err();

        assert!(staged_files(&resolver).is_empty());
    }
}
