//! Compound report handling: one upload that is really several reports
//! (an echo and a lab panel scanned into one PDF, say).
//!
//! Detection is a heuristic and never fails. Any doubt resolves to "not
//! compound", because splitting one coherent report separates findings from
//! the measurements they describe.

pub mod detector;
pub mod splitter;

pub use detector::CompoundDetector;
pub use splitter::{segment_extraction, split_extraction_result};

use serde::Serialize;

use crate::pipeline::extraction::{ExtractedTable, PageExtraction};

/// One report carved out of a compound document.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub start_page: usize,
    pub end_page: usize,
    pub text: String,
    #[serde(skip)]
    pub pages: Vec<PageExtraction>,
    #[serde(skip)]
    pub tables: Vec<ExtractedTable>,
    pub detected_type: Option<String>,
    pub confidence: f32,
}

impl Segment {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompoundDetectionResult {
    pub is_compound: bool,
    /// Empty unless `is_compound`.
    pub segments: Vec<Segment>,
    /// Signals that fired, kept even when the split was abandoned.
    pub reasons: Vec<String>,
}

impl CompoundDetectionResult {
    pub fn single(reasons: Vec<String>) -> Self {
        Self {
            is_compound: false,
            segments: Vec::new(),
            reasons,
        }
    }
}
