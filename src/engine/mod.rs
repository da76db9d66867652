//! Request execution: per-target element walks and the batch run around them.

mod coordinator;
mod materializer;

pub use coordinator::{BatchCoordinator, RunError};
pub use materializer::TargetMaterializer;
