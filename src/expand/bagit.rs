//! BagIt bags: `bagit.txt` declaration, optional `fetch.txt`, payload
//! manifests and the `data/` payload directory.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{ExpansionError, Result};
use crate::fetch::Fetcher;
use crate::resolve::hashes;

pub const DECLARATION: &str = "bagit.txt";
const FETCH_FILE: &str = "fetch.txt";
const PAYLOAD_DIR: &str = "data";

/// Check the declaration, complete the bag from `fetch.txt`, validate payload
/// manifests and return the payload directory
pub async fn prepare(bag: &Path, fetcher: &dyn Fetcher) -> Result<PathBuf> {
    let declaration = bag.join(DECLARATION);
    if !declaration.is_file() {
        return Err(ExpansionError::MissingBagDeclaration(declaration));
    }

    resolve_fetch(bag, fetcher).await?;

    let root = bag.to_path_buf();
    tokio::task::spawn_blocking(move || validate_payload(&root))
        .await
        .map_err(|e| ExpansionError::io(bag)(std::io::Error::other(e)))??;

    let payload = bag.join(PAYLOAD_DIR);
    if !payload.is_dir() {
        return Err(ExpansionError::InvalidBag(format!(
            "payload directory {} is missing",
            payload.display()
        )));
    }

    Ok(payload)
}

/// Locate the bag inside an extracted archive: either the extraction root
/// or its single top-level directory
pub fn locate_root(extracted: &Path) -> Result<PathBuf> {
    if extracted.join(DECLARATION).is_file() {
        return Ok(extracted.to_path_buf());
    }

    let entries: Vec<PathBuf> = fs::read_dir(extracted)
        .map_err(ExpansionError::io(extracted))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();

    match entries.as_slice() {
        [single] if single.is_dir() && single.join(DECLARATION).is_file() => Ok(single.clone()),
        _ => Err(ExpansionError::MissingBagDeclaration(
            extracted.join(DECLARATION),
        )),
    }
}

/// Relative payload path from a bag file, rejecting anything that leaves the bag
fn bag_relative(bag: &Path, raw: &str, listed_in: &str) -> Result<PathBuf> {
    let relative = Path::new(raw.trim());
    let safe = !relative.as_os_str().is_empty()
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

    if !safe {
        return Err(ExpansionError::InvalidBag(format!(
            "{listed_in} lists unsafe path '{raw}'"
        )));
    }

    Ok(bag.join(relative))
}

async fn resolve_fetch(bag: &Path, fetcher: &dyn Fetcher) -> Result<()> {
    let fetch_file = bag.join(FETCH_FILE);
    if !fetch_file.is_file() {
        return Ok(());
    }

    let content = tokio::fs::read_to_string(&fetch_file)
        .await
        .map_err(ExpansionError::io(&fetch_file))?;

    for line in content.lines().filter(|line| !line.trim().is_empty()) {
        let fields = line.trim().split_once(char::is_whitespace).and_then(|(url, rest)| {
            rest.trim_start()
                .split_once(char::is_whitespace)
                .map(|(length, path)| (url, length, path))
        });
        let Some((url, length, raw_path)) = fields else {
            return Err(ExpansionError::InvalidBag(format!(
                "malformed {FETCH_FILE} line '{line}'"
            )));
        };

        let dest = bag_relative(bag, raw_path, FETCH_FILE)?;
        if dest.exists() {
            debug!(path = %dest.display(), "Fetch entry already present");
            continue;
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ExpansionError::io(parent))?;
        }

        let size = fetcher.fetch(url, &dest).await?;
        info!(url, size, "Fetched bag payload entry");

        if let Ok(expected) = length.parse::<u64>() {
            if expected != size {
                return Err(ExpansionError::InvalidBag(format!(
                    "{} is {size} bytes, {FETCH_FILE} declares {expected}",
                    dest.display()
                )));
            }
        }
    }

    Ok(())
}

/// Verify every supported `manifest-<alg>.txt` and check that each payload
/// file is listed in one of them. Blocking.
fn validate_payload(bag: &Path) -> Result<()> {
    let mut manifests: Vec<(String, PathBuf)> = fs::read_dir(bag)
        .map_err(ExpansionError::io(bag))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let algorithm = name.strip_prefix("manifest-")?.strip_suffix(".txt")?.to_string();
            Some((algorithm, entry.path()))
        })
        .collect();
    manifests.sort();

    if manifests.is_empty() {
        return Err(ExpansionError::InvalidBag(format!(
            "no payload manifest found in {}",
            bag.display()
        )));
    }

    let mut listed = HashSet::new();
    let mut verified = 0;

    for (algorithm, manifest) in &manifests {
        let Some(function) = hashes::from_bagit_name(algorithm) else {
            warn!(algorithm = %algorithm, "Skipping payload manifest with unsupported algorithm");
            continue;
        };

        let listed_in = manifest
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = fs::read_to_string(manifest).map_err(ExpansionError::io(manifest))?;

        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            let Some((expected, raw_path)) = line.trim().split_once(char::is_whitespace) else {
                return Err(ExpansionError::InvalidBag(format!(
                    "malformed {listed_in} line '{line}'"
                )));
            };

            let payload_file = bag_relative(bag, raw_path, &listed_in)?;
            if !payload_file.is_file() {
                return Err(ExpansionError::InvalidBag(format!(
                    "payload file {} listed in {listed_in} is missing",
                    raw_path.trim()
                )));
            }

            let actual = hashes::digest_file(&payload_file, function)
                .map_err(ExpansionError::io(&payload_file))?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(ExpansionError::InvalidBag(format!(
                    "checksum mismatch for {} in {listed_in}",
                    raw_path.trim()
                )));
            }

            listed.insert(payload_file);
        }

        verified += 1;
        debug!(manifest = %manifest.display(), "Payload manifest verified");
    }

    if verified == 0 {
        return Err(ExpansionError::InvalidBag(format!(
            "no payload manifest with a supported algorithm in {}",
            bag.display()
        )));
    }

    check_complete(bag, &listed)
}

/// Every file under `data/` must appear in a payload manifest
fn check_complete(bag: &Path, listed: &HashSet<PathBuf>) -> Result<()> {
    let payload = bag.join(PAYLOAD_DIR);
    if !payload.is_dir() {
        return Ok(());
    }

    for entry in WalkDir::new(&payload).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && !listed.contains(entry.path()) {
            let relative = entry.path().strip_prefix(bag).unwrap_or(entry.path());
            return Err(ExpansionError::InvalidBag(format!(
                "payload file {} is not listed in any manifest",
                relative.display()
            )));
        }
    }

    Ok(())
}
