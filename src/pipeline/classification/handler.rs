use std::collections::BTreeMap;

use crate::models::enums::{Category, HandlerKind, Sex};
use crate::pipeline::extraction::ExtractionResult;
use crate::pipeline::measurements::{RangeTable, RawMeasurement, ReferenceRangeInfo};

use super::types::{
    HandlerMetadata, ParsedMeasurement, ParsedReport, PromptContext, ReportSection, SubtypeInfo,
    NO_MEASUREMENTS_WARNING,
};

/// One report type: detection, parsing, and the static context the
/// explanation stage needs.
///
/// Handlers are registered once and shared across threads, so every method
/// takes `&self` and keeps per-call state on the stack.
pub trait ReportHandler: Send + Sync {
    /// Stable identifier; never reused for a different meaning.
    fn test_type_id(&self) -> &str;

    fn display_name(&self) -> &str;

    fn category(&self) -> Category;

    fn keywords(&self) -> &[&'static str];

    /// Terms that may name this type at the start of a "Report Type:" label.
    /// Handlers with broad scoring vocabulary narrow this to identifying terms.
    fn header_terms(&self) -> &[&'static str] {
        self.keywords()
    }

    fn kind(&self) -> HandlerKind;

    /// Confidence in [0, 1] that `extraction` is this report type.
    fn detect(&self, extraction: &ExtractionResult) -> f32;

    fn parse(
        &self,
        extraction: &ExtractionResult,
        sex: Option<Sex>,
        age: Option<u32>,
    ) -> ParsedReport;

    fn reference_ranges(&self) -> BTreeMap<String, ReferenceRangeInfo>;

    fn glossary(&self) -> BTreeMap<String, String>;

    fn prompt_context(&self, extraction: Option<&ExtractionResult>) -> PromptContext;

    /// Concrete variants of a family handler. Empty for ordinary handlers.
    fn subtypes(&self) -> &[SubtypeInfo] {
        &[]
    }

    /// Pick the subtype that matches `extraction`, if the text allows it.
    fn resolve_subtype(&self, _extraction: &ExtractionResult) -> Option<&'static str> {
        None
    }

    fn is_family(&self) -> bool {
        !self.subtypes().is_empty()
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            test_type_id: self.test_type_id().to_string(),
            display_name: self.display_name().to_string(),
            category: self.category(),
            kind: self.kind(),
            keywords: self.keywords().iter().map(|k| k.to_string()).collect(),
            family: None,
        }
    }
}

/// Classify raw matches against a range table.
pub fn classify_all(
    table: &RangeTable,
    raw: Vec<RawMeasurement>,
    sex: Option<Sex>,
) -> Vec<ParsedMeasurement> {
    raw.into_iter()
        .map(|m| {
            let classification = table.classify(&m.abbreviation, m.value, sex);
            ParsedMeasurement::from_raw(m, classification)
        })
        .collect()
}

/// Assemble the terminal report, adding the empty-measurement warning.
pub fn assemble_report(
    handler: &dyn ReportHandler,
    extraction: &ExtractionResult,
    measurements: Vec<ParsedMeasurement>,
    sections: Vec<ReportSection>,
    findings: Vec<String>,
) -> ParsedReport {
    let mut warnings = Vec::new();
    if measurements.is_empty() {
        warnings.push(NO_MEASUREMENTS_WARNING.to_string());
    }
    ParsedReport {
        document_id: extraction.document_id,
        test_type: handler.test_type_id().to_string(),
        test_type_display: handler.display_name().to_string(),
        detection_confidence: handler.detect(extraction),
        measurements,
        sections,
        findings,
        warnings,
        secondary_test_types: Vec::new(),
    }
}

/// Build an owned glossary map from static pairs.
pub fn glossary_map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(term, meaning)| (term.to_string(), meaning.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn ReportHandler) {}

    #[test]
    fn glossary_map_preserves_entries() {
        let map = glossary_map(&[("LVEF", "Pumping strength"), ("TAPSE", "RV motion")]);
        assert_eq!(map.len(), 2);
        assert_eq!(map["LVEF"], "Pumping strength");
    }
}
