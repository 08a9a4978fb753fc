//! Keyword-only handler for report types without a hand-written parser.
//!
//! Detection weighs each keyword hit by its length (longer phrases are more
//! specific) and caps the total below the specialized strong base, so a
//! generic handler can never outrank a confident specialized one.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::config::ScoringWeights;
use crate::models::enums::{Category, HandlerKind, Sex};
use crate::pipeline::extraction::ExtractionResult;
use crate::pipeline::measurements::ReferenceRangeInfo;

use super::handler::{glossary_map, ReportHandler};
use super::scoring::{apply_negative_penalty, TextZones};
use super::sections::{extract_findings, SectionSplitter};
use super::types::{ParsedMeasurement, ParsedReport, PromptContext, NO_MEASUREMENTS_WARNING};

static GENERIC_SECTIONS: LazyLock<SectionSplitter> = LazyLock::new(|| {
    SectionSplitter::new(&[
        r"FINDINGS",
        r"IMPRESSION",
        r"CONCLUSIONS?",
        r"INDICATIONS?",
        r"TECHNIQUE",
        r"COMPARISON",
        r"CLINICAL\s+(?:HISTORY|INFORMATION|CONTEXT)",
        r"HISTORY",
        r"PROCEDURE",
        r"RESULTS",
        r"INTERPRETATION",
        r"SUMMARY",
        r"MEASUREMENTS",
        r"EXAMINATION",
        r"DESCRIPTION",
    ])
});

/// Pluggable measurement extraction for a generic type.
pub type MeasurementExtractor = fn(&ExtractionResult, Option<Sex>) -> Vec<ParsedMeasurement>;

#[derive(Clone, Copy)]
pub struct ExtractorPlugin {
    pub extract: MeasurementExtractor,
    pub reference_ranges: fn() -> BTreeMap<String, ReferenceRangeInfo>,
    pub glossary: &'static [(&'static str, &'static str)],
}

pub struct GenericHandler {
    id: String,
    display_name: String,
    category: Category,
    specialty: String,
    keywords: Vec<&'static str>,
    negative_keywords: Vec<&'static str>,
    extractor: Option<ExtractorPlugin>,
    weights: ScoringWeights,
}

impl GenericHandler {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        category: Category,
        keywords: &[&'static str],
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            category,
            specialty: "cardiology".to_string(),
            keywords: keywords.to_vec(),
            negative_keywords: Vec::new(),
            extractor: None,
            weights: ScoringWeights::default(),
        }
    }

    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = specialty.into();
        self
    }

    pub fn with_negative_keywords(mut self, negative: &[&'static str]) -> Self {
        self.negative_keywords = negative.to_vec();
        self
    }

    pub fn with_extractor(mut self, extractor: ExtractorPlugin) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Hit weight grows with keyword length: "tee" counts half, a long
    /// phrase like "myocardial perfusion" counts one and a half.
    fn keyword_weight(keyword: &str) -> f32 {
        (keyword.chars().count() as f32 / 10.0).clamp(0.5, 1.5)
    }

    pub fn score(&self, zones: &TextZones) -> f32 {
        let weighted: f32 = self
            .keywords
            .iter()
            .filter(|k| zones.in_primary(k))
            .map(|k| Self::keyword_weight(k))
            .sum();
        if weighted == 0.0 {
            return 0.0;
        }
        let w = &self.weights;
        let score = (w.generic_base + w.generic_per_hit * weighted).min(w.generic_cap);
        let negative = self
            .negative_keywords
            .iter()
            .filter(|k| zones.in_primary(k))
            .count();
        apply_negative_penalty(score, negative, w)
    }
}

impl ReportHandler for GenericHandler {
    fn test_type_id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn category(&self) -> Category {
        self.category
    }

    fn keywords(&self) -> &[&'static str] {
        &self.keywords
    }

    fn kind(&self) -> HandlerKind {
        HandlerKind::Generic
    }

    fn detect(&self, extraction: &ExtractionResult) -> f32 {
        self.score(&TextZones::split(&extraction.full_text, &self.weights))
    }

    fn parse(
        &self,
        extraction: &ExtractionResult,
        sex: Option<Sex>,
        _age: Option<u32>,
    ) -> ParsedReport {
        let text = &extraction.full_text;
        let mut warnings = Vec::new();
        let measurements = match &self.extractor {
            Some(plugin) => {
                let found = (plugin.extract)(extraction, sex);
                if found.is_empty() {
                    warnings.push(NO_MEASUREMENTS_WARNING.to_string());
                }
                found
            }
            None => Vec::new(),
        };

        ParsedReport {
            document_id: extraction.document_id,
            test_type: self.id.clone(),
            test_type_display: self.display_name.clone(),
            detection_confidence: self.detect(extraction),
            measurements,
            sections: GENERIC_SECTIONS.split(text),
            findings: extract_findings(text),
            warnings,
            secondary_test_types: Vec::new(),
        }
    }

    fn reference_ranges(&self) -> BTreeMap<String, ReferenceRangeInfo> {
        self.extractor
            .map(|plugin| (plugin.reference_ranges)())
            .unwrap_or_default()
    }

    fn glossary(&self) -> BTreeMap<String, String> {
        self.extractor
            .map(|plugin| glossary_map(plugin.glossary))
            .unwrap_or_default()
    }

    fn prompt_context(&self, _extraction: Option<&ExtractionResult>) -> PromptContext {
        PromptContext {
            specialty: self.specialty.clone(),
            test_type: self.id.clone(),
            category: self.category,
            guidelines: None,
            explanation_style: format!(
                "This is a {} report. Explain the findings in plain language and \
                 highlight anything the report marks as abnormal.",
                self.display_name
            ),
            interpretation_rules: None,
            notes: Vec::new(),
        }
    }
}
