//! Likely-normal screening.
//!
//! A report qualifies only when every signal agrees: measurements exist,
//! none is abnormal, and the narrative neither compares against a prior
//! study nor describes progression or new findings. Any doubt is "no".

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::pipeline::classification::types::ParsedReport;

/// Types whose normal values can still hide clinically relevant content.
const EXCLUDED_TYPES: &[&str] = &["lab_results", "pathology"];

static ABNORMAL_LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)",
        r"(?:dilated\s+(?:ascending\s+aorta|aortic\s+root|aorta|atri|ventricl))",
        r"|(?:compared\s+(?:with|to)\s+(?:the\s+)?(?:prior|previous)\s+(?:study|exam|report|echocardiogram|echo|test))",
        r"|(?:(?:has|have)\s+(?:increased|worsened|deteriorated|decreased|declined|progressed))",
        r"|(?:(?:interval|since\s+prior)\s+(?:increase|decrease|worsening|progression|deterioration|change))",
        r"|(?:since\s+prior\s+(?:study|exam|echo|test|report)\b)",
        r"|(?:(?:worse|worsened|increased|new)\s+(?:compared\s+(?:to|with)|since|from)\s+(?:the\s+)?(?:prior|previous))",
        r"|(?:new\s+(?:finding|abnormality|wall\s+motion\s+abnormality|pericardial\s+effusion|pleural\s+effusion))",
        r"|(?:\b(?:mildly|moderately|severely)\s+(?:abnormal|reduced|dilated|depressed|elevated|enlarged)\b)",
        r"|(?:\babnormal\s+(?:study|exam|result|finding|ecg|ekg)s?\b)",
    ))
    .expect("Invalid abnormal language regex pattern")
});

/// Why a report did not qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotNormalReason {
    ExcludedType,
    NoMeasurements,
    AbnormalMeasurement,
    AbnormalLanguage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NormalcyAssessment {
    pub likely_normal: bool,
    pub reason: Option<NotNormalReason>,
}

impl NormalcyAssessment {
    fn normal() -> Self {
        Self {
            likely_normal: true,
            reason: None,
        }
    }

    fn rejected(reason: NotNormalReason) -> Self {
        Self {
            likely_normal: false,
            reason: Some(reason),
        }
    }
}

/// Screen a parsed report together with the text it was parsed from.
pub fn assess_normalcy(report: &ParsedReport, text: &str) -> NormalcyAssessment {
    if EXCLUDED_TYPES.contains(&report.test_type.as_str()) {
        return NormalcyAssessment::rejected(NotNormalReason::ExcludedType);
    }
    if ABNORMAL_LANGUAGE.is_match(text) {
        return NormalcyAssessment::rejected(NotNormalReason::AbnormalLanguage);
    }
    if report.measurements.is_empty() {
        return NormalcyAssessment::rejected(NotNormalReason::NoMeasurements);
    }
    if report.measurements.iter().any(|m| m.status.is_abnormal()) {
        return NormalcyAssessment::rejected(NotNormalReason::AbnormalMeasurement);
    }
    NormalcyAssessment::normal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{AbnormalityDirection, SeverityStatus};
    use crate::pipeline::classification::types::ParsedMeasurement;
    use uuid::Uuid;

    fn measurement(status: SeverityStatus) -> ParsedMeasurement {
        ParsedMeasurement {
            name: "Left Ventricular Ejection Fraction".into(),
            abbreviation: "LVEF".into(),
            value: 60.0,
            unit: "%".into(),
            status,
            direction: AbnormalityDirection::Normal,
            reference_range: "52-72 %".into(),
            raw_text: "LVEF 60%".into(),
            offset: Some(0),
            page_number: None,
        }
    }

    fn report(test_type: &str, statuses: &[SeverityStatus]) -> ParsedReport {
        ParsedReport {
            document_id: Uuid::nil(),
            test_type: test_type.into(),
            test_type_display: test_type.into(),
            detection_confidence: 0.8,
            measurements: statuses.iter().map(|s| measurement(*s)).collect(),
            sections: Vec::new(),
            findings: Vec::new(),
            warnings: Vec::new(),
            secondary_test_types: Vec::new(),
        }
    }

    #[test]
    fn normal_echo_qualifies() {
        let r = report(
            "echocardiogram",
            &[SeverityStatus::Normal, SeverityStatus::Undetermined],
        );
        let verdict = assess_normalcy(&r, "LVEF 60%. No regional wall motion abnormalities.");
        assert!(verdict.likely_normal);
        assert_eq!(verdict.reason, None);
    }

    #[test]
    fn abnormal_measurement_disqualifies() {
        let r = report(
            "echocardiogram",
            &[SeverityStatus::Normal, SeverityStatus::MildlyAbnormal],
        );
        assert_eq!(
            assess_normalcy(&r, "LVEF 48%").reason,
            Some(NotNormalReason::AbnormalMeasurement)
        );
    }

    #[test]
    fn comparison_language_disqualifies() {
        let r = report("echocardiogram", &[SeverityStatus::Normal]);
        for text in [
            "LVEF 60%. Compared to the prior study, unchanged.",
            "The effusion has increased.",
            "New pericardial effusion.",
            "Interval worsening of RV function.",
            "Mildly dilated left atrium.",
        ] {
            assert_eq!(
                assess_normalcy(&r, text).reason,
                Some(NotNormalReason::AbnormalLanguage),
                "{text}"
            );
        }
    }

    #[test]
    fn labs_and_pathology_never_qualify() {
        for t in ["lab_results", "pathology"] {
            let r = report(t, &[SeverityStatus::Normal]);
            assert_eq!(
                assess_normalcy(&r, "All values within range.").reason,
                Some(NotNormalReason::ExcludedType)
            );
        }
    }

    #[test]
    fn no_measurements_means_no_verdict() {
        let r = report("chest_xray", &[]);
        assert_eq!(
            assess_normalcy(&r, "Lungs are clear.").reason,
            Some(NotNormalReason::NoMeasurements)
        );
    }
}
