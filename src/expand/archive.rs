//! Archive extraction for `archive` and `bagit_archive` expansions.
//!
//! Staged files carry no extension, so the format is sniffed from the
//! leading bytes: zip, plain tar or gzip-compressed tar.

use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use super::{ExpansionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

/// Offset of the `ustar` magic in a tar header block
const TAR_MAGIC_OFFSET: usize = 257;

fn archive_error(archive_path: &Path, reason: impl Into<String>) -> ExpansionError {
    ExpansionError::Archive {
        archive: archive_path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Detect the archive format from the first header block. Blocking.
pub fn sniff(archive_path: &Path) -> Result<Option<ArchiveFormat>> {
    let file = File::open(archive_path).map_err(ExpansionError::io(archive_path))?;
    let mut block = Vec::with_capacity(512);
    file.take(512)
        .read_to_end(&mut block)
        .map_err(ExpansionError::io(archive_path))?;

    let format = if block.starts_with(b"PK\x03\x04") || block.starts_with(b"PK\x05\x06") {
        Some(ArchiveFormat::Zip)
    } else if block.starts_with(&[0x1f, 0x8b]) {
        Some(ArchiveFormat::TarGz)
    } else if block.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5) == Some(&b"ustar"[..]) {
        Some(ArchiveFormat::Tar)
    } else {
        None
    };
    Ok(format)
}

/// Extract a zip, tar or tar.gz archive into `dest`, skipping entries that
/// would escape it. Returns the number of files written. Blocking.
pub fn extract(archive_path: &Path, dest: &Path) -> Result<usize> {
    let extracted = match sniff(archive_path)? {
        Some(ArchiveFormat::Zip) => extract_zip(archive_path, dest)?,
        Some(ArchiveFormat::Tar) => {
            let file = File::open(archive_path).map_err(ExpansionError::io(archive_path))?;
            extract_tar(BufReader::new(file), archive_path, dest)?
        }
        Some(ArchiveFormat::TarGz) => {
            let file = File::open(archive_path).map_err(ExpansionError::io(archive_path))?;
            extract_tar(GzDecoder::new(BufReader::new(file)), archive_path, dest)?
        }
        None => {
            return Err(archive_error(
                archive_path,
                "unsupported archive format, expected zip, tar or tar.gz",
            ));
        }
    };

    debug!(archive = %archive_path.display(), files = extracted, "Extracted archive");
    Ok(extracted)
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive_path).map_err(ExpansionError::io(archive_path))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        archive_error(archive_path, format!("not a readable zip archive: {e}"))
    })?;

    let mut extracted = 0;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| {
            archive_error(archive_path, format!("failed to read entry {index}: {e}"))
        })?;

        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };

        if is_resource_fork(&relative) {
            continue;
        }

        let out_path = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(ExpansionError::io(&out_path))?;
            continue;
        }

        write_entry(&mut entry, &out_path)?;
        extracted += 1;
    }

    Ok(extracted)
}

fn extract_tar<R: Read>(reader: R, archive_path: &Path, dest: &Path) -> Result<usize> {
    let mut archive = tar::Archive::new(reader);
    let entries = archive.entries().map_err(|e| {
        archive_error(archive_path, format!("not a readable tar archive: {e}"))
    })?;

    let mut extracted = 0;

    for entry in entries {
        let mut entry = entry
            .map_err(|e| archive_error(archive_path, format!("failed to read entry: {e}")))?;
        let raw = entry
            .path()
            .map_err(|e| archive_error(archive_path, format!("invalid entry path: {e}")))?
            .into_owned();

        let Some(relative) = enclosed(&raw) else {
            warn!(entry = %raw.display(), "Skipping archive entry with unsafe path");
            continue;
        };

        if is_resource_fork(&relative) {
            continue;
        }

        let out_path = dest.join(&relative);
        let kind = entry.header().entry_type();

        if kind.is_dir() {
            fs::create_dir_all(&out_path).map_err(ExpansionError::io(&out_path))?;
        } else if kind.is_file() {
            write_entry(&mut entry, &out_path)?;
            extracted += 1;
        } else {
            debug!(entry = %raw.display(), kind = ?kind, "Skipping non-regular archive entry");
        }
    }

    Ok(extracted)
}

fn write_entry(entry: &mut impl Read, out_path: &Path) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(ExpansionError::io(parent))?;
    }

    let mut out = File::create(out_path).map_err(ExpansionError::io(out_path))?;
    io::copy(entry, &mut out).map_err(ExpansionError::io(out_path))?;
    Ok(())
}

/// Entry path relative to the extraction root, or `None` if it is absolute
/// or climbs out of it. Leading `./` is dropped.
fn enclosed(raw: &Path) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }

    (!relative.as_os_str().is_empty()).then_some(relative)
}

/// macOS archivers add `__MACOSX/` shadow entries that are not payload
fn is_resource_fork(relative: &Path) -> bool {
    matches!(
        relative.components().next(),
        Some(Component::Normal(first)) if first == "__MACOSX"
    )
}
