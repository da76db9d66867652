use std::collections::HashSet;
use thiserror::Error;

use super::models::{ElementSpec, FetchRequest, HashFunction, HashSpec, Source, TargetContents};
use crate::config::FetchSettings;

#[derive(Debug, Error)]
pub enum RequestValidationError {
    #[error("request declares {count} elements, limit is {limit}")]
    TooManyElements { count: usize, limit: usize },
    #[error("target {target}: {function} hash value '{value}' is not a valid hex digest")]
    InvalidHashValue {
        target: usize,
        function: HashFunction,
        value: String,
    },
    #[error("target {target}: empty {field} in element source")]
    EmptySourceField { target: usize, field: &'static str },
}

/// Structural checks that serde cannot express
pub fn validate_request(
    request: &FetchRequest,
    limits: &FetchSettings,
) -> Result<(), RequestValidationError> {
    let count: usize = request
        .targets
        .iter()
        .map(|target| match &target.contents {
            TargetContents::Elements(elements) => elements.iter().map(ElementSpec::count).sum(),
            TargetContents::ElementsFrom(_) => 1,
        })
        .sum();

    if count > limits.max_elements_per_request {
        return Err(RequestValidationError::TooManyElements {
            count,
            limit: limits.max_elements_per_request,
        });
    }

    for (index, target) in request.targets.iter().enumerate() {
        match &target.contents {
            TargetContents::Elements(elements) => validate_level(index, elements)?,
            TargetContents::ElementsFrom(expandable) => {
                validate_source(index, &expandable.source)?;
                validate_hashes(index, &expandable.metadata.hashes)?;
            }
        }
    }

    Ok(())
}

fn validate_level(target: usize, elements: &[ElementSpec]) -> Result<(), RequestValidationError> {
    for element in elements {
        match element {
            ElementSpec::Leaf(leaf) => {
                validate_source(target, &leaf.source)?;
                validate_hashes(target, &leaf.metadata.hashes)?;
            }
            ElementSpec::Expandable(expandable) => {
                validate_source(target, &expandable.source)?;
                validate_hashes(target, &expandable.metadata.hashes)?;
            }
            ElementSpec::Group(group) => validate_level(target, &group.elements)?,
        }
    }

    Ok(())
}

/// First name declared twice within one level of `elements`, searching
/// nested groups too. Collections need unique element identifiers.
pub fn duplicate_name(elements: &[ElementSpec]) -> Option<&str> {
    let mut seen = HashSet::new();

    for element in elements {
        if let Some(name) = element.name() {
            if !seen.insert(name) {
                return Some(name);
            }
        }
    }

    elements.iter().find_map(|element| match element {
        ElementSpec::Group(group) => duplicate_name(&group.elements),
        _ => None,
    })
}

fn validate_source(target: usize, source: &Source) -> Result<(), RequestValidationError> {
    match source {
        Source::Path { path, .. } if path.as_os_str().is_empty() => {
            Err(RequestValidationError::EmptySourceField {
                target,
                field: "path",
            })
        }
        Source::Url { url } if url.trim().is_empty() => {
            Err(RequestValidationError::EmptySourceField { target, field: "url" })
        }
        _ => Ok(()),
    }
}

fn validate_hashes(target: usize, hashes: &[HashSpec]) -> Result<(), RequestValidationError> {
    for hash in hashes {
        let expected_len = match hash.hash_function {
            HashFunction::Md5 => 32,
            HashFunction::Sha256 => 64,
            HashFunction::Sha512 => 128,
        };

        let valid = hash.hash_value.len() == expected_len
            && hash.hash_value.chars().all(|c| c.is_ascii_hexdigit());

        if !valid {
            return Err(RequestValidationError::InvalidHashValue {
                target,
                function: hash.hash_function,
                value: hash.hash_value.clone(),
            });
        }
    }

    Ok(())
}
