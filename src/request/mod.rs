//! Fetch request model: targets, element trees and their sources.

pub mod models;
mod raw;
mod validation;

pub use models::{
    Destination, ElementMetadata, ElementSpec, Expandable, ExpansionStrategy, FetchRequest,
    Group, HashFunction, HashSpec, Leaf, LinkMode, Source, SourceKind, Target, TargetContents,
};
pub use raw::ShapeError;
pub use validation::{RequestValidationError, duplicate_name, validate_request};
