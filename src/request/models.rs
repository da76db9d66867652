//! Request models consumed by the staging engine.
//!
//! A request is a JSON document handed over by the orchestrator:
//!
//! ```json
//! {
//!   "allow_failed_collections": false,
//!   "targets": [
//!     {
//!       "destination": {"type": "hdca", "object_id": 76},
//!       "collection_type": "list",
//!       "elements": [
//!         {"src": "path", "path": "/data/reads_1.fastq", "name": "reads_1", "ext": "fastqsanger"},
//!         {"src": "url", "url": "https://example.org/reads_2.fastq", "hashes": [
//!           {"hash_function": "SHA-256", "hash_value": "9f86d0..."}
//!         ]}
//!       ]
//!     },
//!     {
//!       "destination": {"type": "hdas"},
//!       "elements_from": "bagit",
//!       "src": "path",
//!       "path": "/data/my_bag"
//!     }
//!   ]
//! }
//! ```
//!
//! Every tag (`destination.type`, `src`, `elements_from`, `hash_function`,
//! `link_data_only`) deserializes into a closed enum; unknown values make
//! the whole request malformed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::raw::{RawElement, RawTarget};

#[derive(Debug, Clone, Deserialize)]
pub struct FetchRequest {
    pub targets: Vec<Target>,
    #[serde(default)]
    pub allow_failed_collections: bool,
}

/// Where the outputs of a target end up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Destination {
    /// N independent unnamed datasets
    Hdas,
    /// One collection, optionally bound to an existing object
    Hdca {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        object_id: Option<i64>,
    },
}

impl Destination {
    pub fn is_collection(&self) -> bool {
        matches!(self, Destination::Hdca { .. })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawTarget")]
pub struct Target {
    pub destination: Destination,
    pub name: Option<String>,
    pub collection_type: Option<String>,
    pub contents: TargetContents,
}

#[derive(Debug, Clone)]
pub enum TargetContents {
    Elements(Vec<ElementSpec>),
    /// The whole target is generated from one expandable source
    ElementsFrom(Expandable),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawElement")]
pub enum ElementSpec {
    Leaf(Leaf),
    Expandable(Expandable),
    Group(Group),
}

impl ElementSpec {
    /// Number of specs in this subtree, the spec itself included
    pub fn count(&self) -> usize {
        match self {
            ElementSpec::Group(group) => {
                1 + group.elements.iter().map(ElementSpec::count).sum::<usize>()
            }
            _ => 1,
        }
    }

    /// Explicit name, if the request gave one
    pub fn name(&self) -> Option<&str> {
        match self {
            ElementSpec::Leaf(leaf) => leaf.metadata.name.as_deref(),
            ElementSpec::Expandable(expandable) => expandable.metadata.name.as_deref(),
            ElementSpec::Group(group) => Some(group.name.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Leaf {
    pub source: Source,
    pub metadata: ElementMetadata,
}

#[derive(Debug, Clone)]
pub struct Expandable {
    pub strategy: ExpansionStrategy,
    pub source: Source,
    pub metadata: ElementMetadata,
}

#[derive(Debug, Clone)]
pub struct Group {
    pub name: String,
    pub elements: Vec<ElementSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path { path: PathBuf, link: LinkMode },
    Url { url: String },
    Pasted { content: String },
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Path { .. } => SourceKind::Path,
            Source::Url { .. } => SourceKind::Url,
            Source::Pasted { .. } => SourceKind::Pasted,
        }
    }

    /// File name suggested by the source itself
    pub fn basename(&self) -> Option<String> {
        match self {
            Source::Path { path, .. } => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            Source::Url { url } => url
                .split(['?', '#'])
                .next()
                .and_then(|without_query| without_query.rsplit('/').next())
                .filter(|segment| !segment.is_empty() && !segment.contains(':'))
                .map(str::to_owned),
            Source::Pasted { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Path,
    Url,
    Pasted,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Path => "path",
            SourceKind::Url => "url",
            SourceKind::Pasted => "pasted",
        })
    }
}

/// How a `src: path` element reaches the staging area
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    #[default]
    CopyFiles,
    /// Reference the original file in place
    LinkToFiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionStrategy {
    /// A bag directory
    Bagit,
    /// A zip or tar(.gz) archive containing a bag
    BagitArchive,
    /// A zip or tar(.gz) archive whose entries become elements
    Archive,
    /// A directory whose files become elements
    Directory,
}

impl fmt::Display for ExpansionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExpansionStrategy::Bagit => "bagit",
            ExpansionStrategy::BagitArchive => "bagit_archive",
            ExpansionStrategy::Archive => "archive",
            ExpansionStrategy::Directory => "directory",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashFunction {
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl fmt::Display for HashFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HashFunction::Md5 => "MD5",
            HashFunction::Sha256 => "SHA-256",
            HashFunction::Sha512 => "SHA-512",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashSpec {
    pub hash_function: HashFunction,
    pub hash_value: String,
}

/// Per-element metadata echoed into the manifest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElementMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_ext")]
    pub ext: String,
    #[serde(default = "default_dbkey")]
    pub dbkey: String,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub hashes: Vec<HashSpec>,
    #[serde(default)]
    pub to_posix_lines: bool,
    #[serde(default)]
    pub space_to_tab: bool,
}

impl Default for ElementMetadata {
    fn default() -> Self {
        Self {
            name: None,
            ext: default_ext(),
            dbkey: default_dbkey(),
            info: None,
            tags: Vec::new(),
            hashes: Vec::new(),
            to_posix_lines: false,
            space_to_tab: false,
        }
    }
}

impl ElementMetadata {
    /// Metadata for a child produced by expanding `self`.
    ///
    /// Format-level settings carry over; identity (name, hashes, info) does not.
    pub fn inherited(&self) -> Self {
        Self {
            ext: self.ext.clone(),
            dbkey: self.dbkey.clone(),
            to_posix_lines: self.to_posix_lines,
            space_to_tab: self.space_to_tab,
            ..Self::default()
        }
    }
}

fn default_ext() -> String {
    "auto".to_string()
}

fn default_dbkey() -> String {
    "?".to_string()
}
