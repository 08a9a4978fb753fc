pub mod catalog;
pub mod extractors;
pub mod generic;
pub mod handler;
pub mod handlers;
pub mod registry;
pub mod scoring;
pub mod sections;
pub mod types;

pub use catalog::builtin_registry;
pub use generic::{ExtractorPlugin, GenericHandler};
pub use handler::ReportHandler;
pub use registry::{Candidate, Detection, Resolved, TypeRegistry};
pub use types::*;

use thiserror::Error;

use crate::config::ConfigError;
use crate::pipeline::extraction::ExtractionError;
use crate::pipeline::measurements::RangeDefinitionError;

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Invalid extraction input: {0}")]
    Input(#[from] ExtractionError),

    #[error("Unknown report type: {0}")]
    UnknownType(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bundled reference ranges are invalid: {0}")]
    RangeDefinition(#[from] RangeDefinitionError),
}
