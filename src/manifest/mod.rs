//! Result manifest handed back to the orchestrator.
//!
//! ```json
//! {
//!   "__unnamed_outputs": [
//!     {
//!       "destination": {"type": "hdca", "object_id": 76},
//!       "elements": [
//!         {"filename": "/job/staging/dataset_1f0c.dat", "name": "reads_1", "ext": "fastqsanger",
//!          "dbkey": "?", "tags": [], "src": "path", "size": 1024},
//!         {"error_message": "Failed to fetch url https://example.org/missing: HTTP 404: Not Found"}
//!       ],
//!       "error_message": "1 collection element(s) failed: ..."
//!     }
//!   ]
//! }
//! ```
//!
//! See [`ResolvedElement`] for the three element shapes.

mod writer;

pub use writer::{ManifestError, write_manifest};

use serde::Serialize;

use crate::request::{Destination, SourceKind};

#[derive(Debug, Clone, Default, Serialize)]
pub struct Manifest {
    #[serde(rename = "__unnamed_outputs")]
    pub unnamed_outputs: Vec<TargetOutcome>,
}

/// Result of one target, in request order
#[derive(Debug, Clone, Serialize)]
pub struct TargetOutcome {
    pub destination: Destination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_type: Option<String>,
    pub elements: Vec<ResolvedElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Outcome of one element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResolvedElement {
    Staged(StagedElement),
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        error_message: String,
    },
    /// Nested collection level, from a request group or an expansion
    Group {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        elements: Vec<ResolvedElement>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedElement {
    pub filename: String,
    pub name: String,
    pub ext: String,
    pub dbkey: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    pub tags: Vec<String>,
    pub src: SourceKind,
    pub size: u64,
}

impl ResolvedElement {
    pub fn failed(name: Option<String>, error: impl ToString) -> Self {
        ResolvedElement::Failed {
            name,
            error_message: error.to_string(),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ResolvedElement::Staged(_) => None,
            ResolvedElement::Failed { error_message, .. } => Some(error_message),
            ResolvedElement::Group { error_message, .. } => error_message.as_deref(),
        }
    }

    /// Error messages of this element and everything below it, depth first
    pub fn collect_errors<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(message) = self.error_message() {
            out.push(message);
        }
        if let ResolvedElement::Group { elements, .. } = self {
            for element in elements {
                element.collect_errors(out);
            }
        }
    }
}
