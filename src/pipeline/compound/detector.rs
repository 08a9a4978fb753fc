use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::CompoundConfig;
use crate::pipeline::classification::registry::{prefix_chars, Candidate, TypeRegistry};
use crate::pipeline::extraction::ExtractionResult;

use super::splitter::{segment_extraction, split_by_pages, split_by_text};
use super::CompoundDetectionResult;

/// Patient identification block: "Patient Name:", "MRN -", "Medical Record:".
pub(super) static PATIENT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Patient\s*(?:Name)?|MRN|Medical\s+Record)\s*[:\-]\s*\S")
        .expect("Invalid patient header regex pattern")
});

/// Titles that open a new report when they stand alone on a line.
const REPORT_TYPE_HEADERS: &[&str] = &[
    "ECHOCARDIOGRAM",
    "ELECTROCARDIOGRAM",
    "EKG",
    "ECG",
    "LABORATORY",
    "LAB RESULTS",
    "STRESS TEST",
    "NUCLEAR STRESS",
    "CARDIAC CATHETERIZATION",
    "CATHETERIZATION REPORT",
    "HOLTER MONITOR",
    "PULMONARY FUNCTION",
    "CHEST X-RAY",
    "CT SCAN",
    "MRI",
    "ULTRASOUND",
    "DOPPLER",
    "PATHOLOGY",
    "OPERATIVE REPORT",
];

pub(super) static REPORT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = REPORT_TYPE_HEADERS
        .iter()
        .map(|h| regex::escape(h))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"(?im)^[ \t]*(?:{alternatives})[ \t]*(?:REPORT|STUDY|RESULTS?)?[ \t]*$"
    ))
    .expect("Invalid report header regex pattern")
});

/// Byte offsets of every patient header block.
pub(super) fn patient_header_offsets(text: &str) -> Vec<usize> {
    PATIENT_HEADER.find_iter(text).map(|m| m.start()).collect()
}

/// Header blocks that start more than `min_spacing` characters after the
/// previous one. Adjacent form fields ("Patient Name", then "MRN") don't count.
fn spaced_patient_headers(text: &str, min_spacing: usize) -> usize {
    patient_header_offsets(text)
        .windows(2)
        .filter(|pair| text[pair[0]..pair[1]].chars().count() > min_spacing)
        .count()
}

/// Pages after the first whose opening lines carry a report-type title.
fn later_report_header_pages(extraction: &ExtractionResult, snippet_chars: usize) -> Vec<usize> {
    extraction
        .pages
        .iter()
        .skip(1)
        .filter(|page| REPORT_HEADER.is_match(prefix_chars(&page.text, snippet_chars)))
        .map(|page| page.page_number)
        .collect()
}

/// Splits a document into its constituent reports when the evidence is
/// strong enough, and detects each part's type.
pub struct CompoundDetector<'r> {
    registry: &'r TypeRegistry,
    config: CompoundConfig,
}

impl<'r> CompoundDetector<'r> {
    pub fn new(registry: &'r TypeRegistry, config: CompoundConfig) -> Self {
        Self { registry, config }
    }

    /// Compound when patient header blocks repeat far apart, or when a later
    /// page opens a new report and the registry sees strong candidates from
    /// more than one category. A split that leaves fewer than two non-empty
    /// segments is dropped.
    pub fn detect(&self, extraction: &ExtractionResult) -> CompoundDetectionResult {
        let mut reasons = Vec::new();
        let multi_page = extraction.pages.len() >= 2;

        let header_pages = if multi_page {
            later_report_header_pages(extraction, self.config.report_header_snippet)
        } else {
            Vec::new()
        };
        if !header_pages.is_empty() {
            reasons.push(format!("Report-type headers found on pages: {header_pages:?}"));
        }

        let spaced = spaced_patient_headers(&extraction.full_text, self.config.min_header_spacing);
        if spaced > 0 {
            reasons.push(format!(
                "Patient header blocks found at {} distinct locations",
                spaced + 1
            ));
        }

        let divergent = self.divergent_candidates(extraction);
        if let Some(strong) = &divergent {
            let listed = strong
                .iter()
                .take(4)
                .map(|c| format!("{}({:.2})", c.type_id, c.confidence))
                .collect::<Vec<_>>()
                .join(", ");
            reasons.push(format!("Multiple divergent type detections: {listed}"));
        }

        let triggered = spaced > 0 || (!header_pages.is_empty() && divergent.is_some());
        if !triggered {
            if !reasons.is_empty() {
                tracing::debug!(?reasons, "Compound signals below decision threshold");
            }
            return CompoundDetectionResult::single(reasons);
        }

        let mut segments = if multi_page {
            split_by_pages(extraction, &self.config)
        } else {
            split_by_text(extraction, &self.config)
        };
        segments.retain(|s| !s.text.trim().is_empty());
        if segments.len() < 2 {
            tracing::info!(
                segments = segments.len(),
                ?reasons,
                "Compound signals found but no usable split; treating as one report"
            );
            return CompoundDetectionResult::single(reasons);
        }

        for (index, segment) in segments.iter_mut().enumerate() {
            let detection = self.registry.detect(&segment_extraction(extraction, segment, index));
            segment.detected_type = detection.type_id;
            segment.confidence = detection.confidence;
        }

        tracing::info!(
            segments = segments.len(),
            types = ?segments.iter().map(|s| s.detected_type.as_deref()).collect::<Vec<_>>(),
            "Compound report split"
        );
        CompoundDetectionResult {
            is_compound: true,
            segments,
            reasons,
        }
    }

    /// Candidates at or above the divergence threshold, if they span at
    /// least two categories.
    fn divergent_candidates(&self, extraction: &ExtractionResult) -> Option<Vec<Candidate>> {
        let strong: Vec<Candidate> = self
            .registry
            .detect_multi(extraction, None)
            .into_iter()
            .filter(|c| c.confidence >= self.config.divergence_threshold)
            .collect();
        let categories: BTreeSet<&str> = strong.iter().map(|c| c.category.as_str()).collect();
        (categories.len() >= 2).then_some(strong)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::models::enums::{ExtractionMethod, InputMode};
    use crate::pipeline::classification::builtin_registry;
    use crate::pipeline::extraction::PageExtraction;

    const ECHO: &str = "Patient Name: Jane Roe\n\
        MRN: 448120\n\
        TRANSTHORACIC ECHOCARDIOGRAM\n\
        Indication: shortness of breath on exertion.\n\
        LEFT VENTRICLE: Normal cavity size. LVIDd 4.8 cm. LVEF 60%. No regional wall motion abnormalities.\n\
        DIASTOLIC FUNCTION: Normal for age. E/A ratio 1.2.\n\
        RIGHT VENTRICLE: Normal size and systolic function. TAPSE 2.2 cm.\n\
        MITRAL VALVE: Structurally normal with trace regurgitation.\n\
        AORTIC VALVE: Trileaflet without stenosis.\n\
        PERICARDIUM: No effusion.\n\
        \n\
        IMPRESSION:\n\
        1. Normal left ventricular size and systolic function.\n\
        2. Normal diastolic function for age.\n\
        3. No significant valvular disease.\n\n";

    const LABS: &str = "Patient Name: Jane Roe\n\
        MRN: 448120\n\
        COMPREHENSIVE METABOLIC PANEL\n\
        Glucose: 98 mg/dL\n\
        BUN: 14 mg/dL\n\
        Creatinine: 0.9 mg/dL\n\
        Sodium: 140 mEq/L\n\
        Potassium: 4.1 mEq/L\n";

    fn registry() -> TypeRegistry {
        builtin_registry(&ClassifierConfig::default()).unwrap()
    }

    fn page(page_number: usize, text: &str) -> PageExtraction {
        PageExtraction {
            page_number,
            text: text.to_string(),
            extraction_method: ExtractionMethod::PdfDirect,
            confidence: 0.97,
        }
    }

    #[test]
    fn pasted_echo_and_lab_panel_round_trip() {
        assert!(ECHO.len() > 500);
        let r = registry();
        let er = ExtractionResult::from_text(format!("{ECHO}{LABS}"));
        let result = CompoundDetector::new(&r, CompoundConfig::default()).detect(&er);

        assert!(result.is_compound, "reasons: {:?}", result.reasons);
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments[0].detected_type.as_deref(), Some("echocardiogram"));
        assert_eq!(result.segments[1].detected_type.as_deref(), Some("lab_results"));
        assert!(result.segments[1].text.starts_with("Patient Name"));
        assert!(result
            .reasons
            .iter()
            .any(|r| r.starts_with("Patient header blocks found at 2")));
    }

    #[test]
    fn single_report_with_adjacent_fields_is_not_compound() {
        let r = registry();
        let er = ExtractionResult::from_text(ECHO);
        let result = CompoundDetector::new(&r, CompoundConfig::default()).detect(&er);
        assert!(!result.is_compound);
        assert!(result.segments.is_empty());
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn paged_report_header_with_divergent_types_splits() {
        let r = registry();
        let er = ExtractionResult::from_pages(
            InputMode::Pdf,
            vec![
                page(1, "ECHOCARDIOGRAM REPORT\nTransthoracic study. LVEF 60%. Wall motion normal."),
                page(
                    2,
                    "LABORATORY RESULTS\nComprehensive metabolic panel\nGlucose 98 mg/dL\nSodium 140",
                ),
            ],
        );
        let result = CompoundDetector::new(&r, CompoundConfig::default()).detect(&er);
        assert!(result.is_compound, "reasons: {:?}", result.reasons);
        assert_eq!(result.segments[0].detected_type.as_deref(), Some("echocardiogram"));
        assert_eq!(result.segments[1].detected_type.as_deref(), Some("lab_results"));
        assert_eq!(result.segments[1].start_page, 2);
        assert!(result.reasons.iter().any(|r| r.contains("divergent")));
    }

    #[test]
    fn same_category_pages_stay_together() {
        let r = registry();
        let er = ExtractionResult::from_pages(
            InputMode::Pdf,
            vec![
                page(1, "TRANSTHORACIC ECHOCARDIOGRAM\nLVEF 60%."),
                page(2, "DOPPLER\nMitral inflow E/A ratio 1.1. Diastolic function normal."),
            ],
        );
        let result = CompoundDetector::new(&r, CompoundConfig::default()).detect(&er);
        assert!(!result.is_compound);
        assert_eq!(result.reasons, vec!["Report-type headers found on pages: [2]".to_string()]);
    }

    #[test]
    fn signal_without_usable_split_keeps_reasons() {
        let filler = "Narrative continues. ".repeat(30);
        let first = format!("Patient Name: A\n{filler}\nPatient Name: A (continued)\nMore text.");
        let r = registry();
        let er = ExtractionResult::from_pages(
            InputMode::Pdf,
            vec![page(1, &first), page(2, "Signed electronically.")],
        );
        let result = CompoundDetector::new(&r, CompoundConfig::default()).detect(&er);
        assert!(!result.is_compound);
        assert!(!result.reasons.is_empty());
    }

    #[test]
    fn report_header_must_stand_alone() {
        assert!(REPORT_HEADER.is_match("intro\n  Lab Results  \n"));
        assert!(REPORT_HEADER.is_match("CHEST X-RAY REPORT"));
        assert!(!REPORT_HEADER.is_match("The echocardiogram showed normal function."));
    }

    #[test]
    fn spacing_counts_only_distant_headers() {
        let near = "Patient Name: A\nMRN: 1\n";
        assert_eq!(spaced_patient_headers(near, 500), 0);
        let far = format!("Patient: A\n{}\nPatient: B", "z".repeat(600));
        assert_eq!(spaced_patient_headers(&far, 500), 1);
    }
}
