//! Single entry point tying the pipeline stages together.
//!
//! `analyze` validates the extraction, splits compound documents, then runs
//! detection and parsing on each part. Unknown report types are data, not
//! errors: the segment carries its detection and no parsed report.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::ClassifierConfig;
use crate::models::enums::Sex;
use crate::pipeline::classification::{
    builtin_registry, ClassificationError, Detection, ParsedReport, TypeRegistry,
};
use crate::pipeline::compound::{split_extraction_result, CompoundDetector};
use crate::pipeline::extraction::{extract_demographics, Demographics, ExtractionResult};
use crate::pipeline::normalcy::{assess_normalcy, NormalcyAssessment};

/// One analysed report. A non-compound document yields exactly one.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentReport {
    pub index: usize,
    pub start_page: usize,
    pub end_page: usize,
    pub detection: Detection,
    /// Age and sex actually used for classification.
    pub demographics: Demographics,
    pub report: Option<ParsedReport>,
    pub normalcy: Option<NormalcyAssessment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub document_id: Uuid,
    pub is_compound: bool,
    pub reasons: Vec<String>,
    pub segments: Vec<SegmentReport>,
}

impl AnalysisOutcome {
    /// Parsed reports in document order, skipping unknown segments.
    pub fn reports(&self) -> impl Iterator<Item = &ParsedReport> {
        self.segments.iter().filter_map(|s| s.report.as_ref())
    }
}

pub struct ReportEngine {
    registry: TypeRegistry,
    config: ClassifierConfig,
    /// Anchor for DOB-based ages; `None` means the current UTC date.
    reference_date: Option<NaiveDate>,
}

impl ReportEngine {
    /// Engine over the built-in handler set.
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassificationError> {
        let registry = builtin_registry(&config)?;
        Ok(Self::with_registry(registry, config))
    }

    /// Engine over a caller-assembled registry.
    pub fn with_registry(registry: TypeRegistry, config: ClassifierConfig) -> Self {
        Self {
            registry,
            config,
            reference_date: None,
        }
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Full analysis. `sex` and `age` from the caller win over anything
    /// found in the report text.
    pub fn analyze(
        &self,
        extraction: &ExtractionResult,
        sex: Option<Sex>,
        age: Option<u32>,
    ) -> Result<AnalysisOutcome, ClassificationError> {
        extraction.validate()?;

        let compound =
            CompoundDetector::new(&self.registry, self.config.compound.clone()).detect(extraction);

        let segments = if compound.is_compound {
            split_extraction_result(extraction, &compound.segments)
                .iter()
                .zip(&compound.segments)
                .enumerate()
                .map(|(index, (part, seg))| {
                    self.analyze_part(part, index, (seg.start_page, seg.end_page), sex, age)
                })
                .collect()
        } else {
            let first = extraction.pages.first().map_or(1, |p| p.page_number);
            let last = extraction.pages.last().map_or(first, |p| p.page_number);
            vec![self.analyze_part(extraction, 0, (first, last), sex, age)]
        };

        tracing::info!(
            document_id = %extraction.document_id,
            is_compound = compound.is_compound,
            segments = segments.len(),
            "Document analysed"
        );

        Ok(AnalysisOutcome {
            document_id: extraction.document_id,
            is_compound: compound.is_compound,
            reasons: compound.reasons,
            segments,
        })
    }

    /// Parse `extraction` as an explicitly named type, bypassing detection.
    pub fn parse_as(
        &self,
        extraction: &ExtractionResult,
        type_id: &str,
        sex: Option<Sex>,
        age: Option<u32>,
    ) -> Result<ParsedReport, ClassificationError> {
        extraction.validate()?;
        let resolved = self
            .registry
            .resolve(type_id)
            .ok_or_else(|| ClassificationError::UnknownType(type_id.to_string()))?;
        let demographics = self.demographics(extraction, sex, age);
        Ok(resolved
            .handler
            .parse(extraction, demographics.sex, demographics.age))
    }

    fn analyze_part(
        &self,
        part: &ExtractionResult,
        index: usize,
        (start_page, end_page): (usize, usize),
        sex: Option<Sex>,
        age: Option<u32>,
    ) -> SegmentReport {
        let detection = self.registry.detect(part);
        let demographics = self.demographics(part, sex, age);

        let report = detection
            .type_id
            .as_deref()
            .and_then(|type_id| self.parse_detected(part, type_id, &detection, demographics));
        let normalcy = report.as_ref().map(|r| assess_normalcy(r, &part.full_text));

        SegmentReport {
            index,
            start_page,
            end_page,
            detection,
            demographics,
            report,
            normalcy,
        }
    }

    fn parse_detected(
        &self,
        part: &ExtractionResult,
        type_id: &str,
        detection: &Detection,
        demographics: Demographics,
    ) -> Option<ParsedReport> {
        let Some(resolved) = self.registry.resolve(type_id) else {
            tracing::warn!(type_id = %type_id, "Detected type has no resolvable handler");
            return None;
        };
        let mut report = resolved
            .handler
            .parse(part, demographics.sex, demographics.age);
        report.detection_confidence = detection.confidence;
        report.secondary_test_types = self
            .registry
            .detect_multi(part, None)
            .into_iter()
            .map(|c| c.type_id)
            .filter(|id| id != &report.test_type && id != type_id)
            .collect();

        tracing::debug!(
            type_id = %report.test_type,
            measurements = report.measurements.len(),
            secondary = report.secondary_test_types.len(),
            "Segment parsed"
        );
        Some(report)
    }

    /// Caller-supplied values first, then whatever the text states.
    fn demographics(
        &self,
        extraction: &ExtractionResult,
        sex: Option<Sex>,
        age: Option<u32>,
    ) -> Demographics {
        if sex.is_some() && age.is_some() {
            return Demographics { age, sex };
        }
        let today = self.reference_date.unwrap_or_else(|| Utc::now().date_naive());
        let found = extract_demographics(&extraction.full_text, today);
        Demographics {
            age: age.or(found.age),
            sex: sex.or(found.sex),
        }
    }
}
