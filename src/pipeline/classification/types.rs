use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::{AbnormalityDirection, Category, HandlerKind, SeverityStatus};
use crate::pipeline::measurements::{ClassificationResult, RawMeasurement};

pub const NO_MEASUREMENTS_WARNING: &str =
    "No measurements could be extracted. The report format may not be supported.";

/// A measurement after severity classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedMeasurement {
    pub name: String,
    pub abbreviation: String,
    pub value: f64,
    pub unit: String,
    pub status: SeverityStatus,
    pub direction: AbnormalityDirection,
    /// Formatted normal range, or "No reference range available".
    pub reference_range: String,
    pub raw_text: String,
    pub offset: Option<usize>,
    pub page_number: Option<usize>,
}

impl ParsedMeasurement {
    pub fn from_raw(raw: RawMeasurement, classification: ClassificationResult) -> Self {
        Self {
            name: raw.name,
            abbreviation: raw.abbreviation,
            value: raw.value,
            unit: raw.unit,
            status: classification.status,
            direction: classification.direction,
            reference_range: classification.reference_range,
            raw_text: raw.raw_text,
            offset: raw.offset,
            page_number: raw.page_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub name: String,
    pub content: String,
}

/// Structured output of a handler's `parse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedReport {
    pub document_id: Uuid,
    pub test_type: String,
    pub test_type_display: String,
    pub detection_confidence: f32,
    pub measurements: Vec<ParsedMeasurement>,
    pub sections: Vec<ReportSection>,
    pub findings: Vec<String>,
    pub warnings: Vec<String>,
    /// Other types the registry also scored above the multi-detect threshold.
    #[serde(default)]
    pub secondary_test_types: Vec<String>,
}

impl ParsedReport {
    pub fn abnormal_measurements(&self) -> impl Iterator<Item = &ParsedMeasurement> {
        self.measurements.iter().filter(|m| m.status.is_abnormal())
    }
}

/// Handler-specific guidance for the explanation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    pub specialty: String,
    pub test_type: String,
    pub category: Category,
    pub guidelines: Option<String>,
    pub explanation_style: String,
    pub interpretation_rules: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// A concrete variant owned by a family handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubtypeInfo {
    pub id: &'static str,
    pub display_name: &'static str,
}

/// Listing entry returned by `TypeRegistry::list_types`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerMetadata {
    pub test_type_id: String,
    pub display_name: String,
    pub category: Category,
    pub kind: HandlerKind,
    pub keywords: Vec<String>,
    /// Set for subtype entries: the family handler that parses them.
    pub family: Option<String>,
}
