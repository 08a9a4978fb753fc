pub mod types;
pub mod demographics;

pub use types::*;
pub use demographics::*;

use thiserror::Error;

/// Structurally invalid extraction input. Wrong content (no keywords, no
/// numbers) is never an error; only a malformed shape is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Page numbers start at 1")]
    InvalidPageNumber,

    #[error("Page {0} appears more than once")]
    DuplicatePage(usize),

    #[error("Page {page} listed after page {after}")]
    UnorderedPages { page: usize, after: usize },

    #[error("Page {page} has confidence {confidence} outside [0, 1]")]
    ConfidenceOutOfRange { page: usize, confidence: f32 },

    #[error("Table {table_index} references missing page {page}")]
    OrphanTable { table_index: usize, page: usize },

    #[error("Page type given for missing page {0}")]
    OrphanPageType(usize),
}
