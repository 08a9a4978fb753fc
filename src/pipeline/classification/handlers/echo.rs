//! Transthoracic / transesophageal echocardiogram reports.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::config::ScoringWeights;
use crate::models::enums::{Category, HandlerKind, Sex};
use crate::pipeline::classification::handler::{
    assemble_report, classify_all, glossary_map, ReportHandler,
};
use crate::pipeline::classification::scoring::{KeywordTiers, TextZones, TierBases};
use crate::pipeline::classification::sections::{extract_findings, SectionSplitter};
use crate::pipeline::classification::types::{ParsedReport, PromptContext};
use crate::pipeline::extraction::ExtractionResult;
use crate::pipeline::measurements::{
    BundledRanges, MeasurementDef, MeasurementTable, RangeDefinitionError, RangeTable,
    ReferenceRangeInfo,
};

const KEYWORDS: &[&str] = &[
    "echocardiogram",
    "echocardiography",
    "transthoracic",
    "transesophageal",
    "2d echo",
    "doppler",
    "ejection fraction",
    "lvef",
    "left ventricle",
    "left ventricular",
    "mitral valve",
    "aortic valve",
    "tricuspid",
    "diastolic function",
    "wall motion",
    "lvidd",
    "lvids",
    "ivsd",
    "lvpwd",
];

const TIERS: KeywordTiers = KeywordTiers {
    strong: &[
        "echocardiogram",
        "echocardiography",
        "transthoracic echocardiogram",
        "transesophageal echocardiogram",
        "2d echo",
    ],
    moderate: &[
        "ejection fraction",
        "lvef",
        "left ventricular",
        "diastolic function",
        "wall motion",
        "lvidd",
        "lvids",
        "mitral valve",
        "aortic valve",
        "tricuspid valve",
        "e/a ratio",
        "e/e'",
        "rvsp",
    ],
    weak: &[
        "left ventricle",
        "right ventricle",
        "left atrium",
        "pericardial",
        "doppler",
        "regurgitation",
        "stenosis",
    ],
    negative: &[
        "stress echocardiogram",
        "stress echocardiography",
        "stress echo",
        "dobutamine",
        "myocardial perfusion",
        "spect",
        "sestamibi",
        "tetrofosmin",
        "regadenoson",
        "lexiscan",
        "bruce protocol",
    ],
    bases: TierBases::STANDARD,
};

static MEASUREMENTS: &[MeasurementDef] = &[
    MeasurementDef {
        name: "Left Ventricular Ejection Fraction",
        abbreviation: "LVEF",
        unit: "%",
        patterns: &[
            r"\b(?:LVEF|EF|ejection\s+fraction){SEP}(?:(?:is|of|estimated(?:\s+at)?)\s+)?{RANGE}\s*%",
            r"\b(?:LVEF|EF|ejection\s+fraction){SEP}(?:(?:is|of|estimated(?:\s+at)?)\s+)?{NUM}\s*%?",
        ],
        min: 5.0,
        max: 95.0,
    },
    MeasurementDef {
        name: "LV Internal Diameter (diastole)",
        abbreviation: "LVIDd",
        unit: "cm",
        patterns: &[
            r"\bLVID\s*\(?d\)?{SEP}{NUM}",
            r"\bLV\s+(?:internal\s+)?(?:end[- ]?)?diastolic\s+(?:dimension|diameter){SEP}{NUM}",
        ],
        min: 2.0,
        max: 9.0,
    },
    MeasurementDef {
        name: "LV Internal Diameter (systole)",
        abbreviation: "LVIDs",
        unit: "cm",
        patterns: &[
            r"\bLVID\s*\(?s\)?{SEP}{NUM}",
            r"\bLV\s+(?:internal\s+)?(?:end[- ]?)?systolic\s+(?:dimension|diameter){SEP}{NUM}",
        ],
        min: 1.0,
        max: 7.0,
    },
    MeasurementDef {
        name: "Interventricular Septum (diastole)",
        abbreviation: "IVSd",
        unit: "cm",
        patterns: &[
            r"\bIVS\s*\(?d\)?{SEP}{NUM}",
            r"\binterventricular\s+septum(?:\s+thickness)?{SEP}{NUM}",
        ],
        min: 0.3,
        max: 3.0,
    },
    MeasurementDef {
        name: "LV Posterior Wall (diastole)",
        abbreviation: "LVPWd",
        unit: "cm",
        patterns: &[
            r"\bLVPW\s*\(?d\)?{SEP}{NUM}",
            r"\b(?:LV\s+)?posterior\s+wall(?:\s+thickness)?{SEP}{NUM}",
        ],
        min: 0.3,
        max: 3.0,
    },
    MeasurementDef {
        name: "Fractional Shortening",
        abbreviation: "FS",
        unit: "%",
        patterns: &[
            r"\bFS{SEP}{NUM}\s*%?",
            r"\bfractional\s+shortening{SEP}{NUM}",
        ],
        min: 5.0,
        max: 70.0,
    },
    MeasurementDef {
        name: "Left Atrial Diameter",
        abbreviation: "LA",
        unit: "cm",
        patterns: &[
            r"\bLA\s+(?:diameter|dimension|size){SEP}{NUM}",
            r"\bleft\s+atri(?:um|al)\s+(?:diameter|dimension|size){SEP}{NUM}",
            r"\bLA{SEP}{NUM}\s*cm\b",
        ],
        min: 1.5,
        max: 8.0,
    },
    MeasurementDef {
        name: "LA Volume Index",
        abbreviation: "LAVI",
        unit: "mL/m2",
        patterns: &[
            r"\bLAVI{SEP}{NUM}",
            r"\bLA\s+volume\s+index(?:ed)?{SEP}{NUM}",
            r"\bleft\s+atrial\s+volume\s+index{SEP}{NUM}",
        ],
        min: 10.0,
        max: 100.0,
    },
    MeasurementDef {
        name: "RV Basal Diameter",
        abbreviation: "RVD",
        unit: "cm",
        patterns: &[
            r"\bRV\s*D{SEP}{NUM}",
            r"\bRV\s+(?:basal\s+)?(?:diameter|dimension){SEP}{NUM}",
        ],
        min: 1.5,
        max: 7.0,
    },
    MeasurementDef {
        name: "Right Atrial Area",
        abbreviation: "RAA",
        unit: "cm2",
        patterns: &[
            r"\bRA\s+area{SEP}{NUM}",
            r"\bright\s+atrial\s+area{SEP}{NUM}",
        ],
        min: 5.0,
        max: 50.0,
    },
    MeasurementDef {
        name: "Aortic Root Diameter",
        abbreviation: "AoRoot",
        unit: "cm",
        patterns: &[r"\bao(?:rtic)?\s+root(?:\s+diameter)?{SEP}{NUM}"],
        min: 1.5,
        max: 7.0,
    },
    MeasurementDef {
        name: "Aortic Valve Area",
        abbreviation: "AVA",
        unit: "cm2",
        patterns: &[r"\bAVA{SEP}{NUM}", r"\baortic\s+valve\s+area{SEP}{NUM}"],
        min: 0.2,
        max: 6.0,
    },
    MeasurementDef {
        name: "E/A Ratio",
        abbreviation: "E/A",
        unit: "",
        patterns: &[r"\bE\s*/\s*A(?:\s+ratio)?{SEP}{NUM}"],
        min: 0.2,
        max: 5.0,
    },
    MeasurementDef {
        name: "E/e' Ratio",
        abbreviation: "E/e'",
        unit: "",
        patterns: &[r"\bE\s*/\s*e['’](?:\s*(?:ratio|average|avg))?{SEP}{NUM}"],
        min: 2.0,
        max: 40.0,
    },
    MeasurementDef {
        name: "Tricuspid Regurgitation Velocity",
        abbreviation: "TRV",
        unit: "m/s",
        patterns: &[
            r"\b(?:TRV(?:max)?|TR\s+(?:peak\s+)?velocity|tricuspid\s+regurgitant\s+(?:jet\s+)?velocity){SEP}{NUM}\s*m/s",
        ],
        min: 0.5,
        max: 7.0,
    },
    MeasurementDef {
        name: "RV Systolic Pressure",
        abbreviation: "RVSP",
        unit: "mmHg",
        patterns: &[
            r"\bRVSP{SEP}{NUM}",
            r"\bRV\s+systolic\s+pressure{SEP}{NUM}",
            r"\b(?:estimated\s+)?(?:PA|pulmonary\s+artery)\s+systolic\s+pressure{SEP}{NUM}",
        ],
        min: 10.0,
        max: 150.0,
    },
    MeasurementDef {
        name: "Mitral E Deceleration Time",
        abbreviation: "DT",
        unit: "ms",
        patterns: &[r"\b(?:DT|(?:E\s+)?decel(?:eration)?\s+time){SEP}{NUM}\s*ms"],
        min: 50.0,
        max: 500.0,
    },
    MeasurementDef {
        name: "Isovolumic Relaxation Time",
        abbreviation: "IVRT",
        unit: "ms",
        patterns: &[r"\bIVRT{SEP}{NUM}"],
        min: 20.0,
        max: 200.0,
    },
    MeasurementDef {
        name: "Septal e' Velocity",
        abbreviation: "e'_septal",
        unit: "cm/s",
        patterns: &[
            r"\bseptal\s+e['’]{SEP}{NUM}",
            r"\be['’]\s*\(?septal\)?{SEP}{NUM}",
        ],
        min: 1.0,
        max: 25.0,
    },
    MeasurementDef {
        name: "Lateral e' Velocity",
        abbreviation: "e'_lateral",
        unit: "cm/s",
        patterns: &[
            r"\blateral\s+e['’]{SEP}{NUM}",
            r"\be['’]\s*\(?lateral\)?{SEP}{NUM}",
        ],
        min: 1.0,
        max: 30.0,
    },
    MeasurementDef {
        name: "Tricuspid Annular Plane Systolic Excursion",
        abbreviation: "TAPSE",
        unit: "cm",
        patterns: &[r"\bTAPSE{SEP}{NUM}"],
        min: 0.5,
        max: 4.0,
    },
];

static TABLE: LazyLock<MeasurementTable> = LazyLock::new(|| MeasurementTable::compile(MEASUREMENTS));

static SECTIONS: LazyLock<SectionSplitter> = LazyLock::new(|| {
    SectionSplitter::new(&[
        r"LEFT\s+VENTRICLE|LV\s+DIMENSIONS?",
        r"RIGHT\s+VENTRICLE|RV\b",
        r"LEFT\s+ATRIUM|LA\b",
        r"RIGHT\s+ATRIUM|RA\b",
        r"AORTIC\s+(?:ROOT|VALVE)",
        r"MITRAL\s+VALVE",
        r"TRICUSPID\s+VALVE",
        r"PULMON(?:ARY|IC)\s+VALVE",
        r"PERICARDI(?:UM|AL)",
        r"DIASTOLIC\s+FUNCTION",
        r"WALL\s+MOTION",
        r"CONCLUSIONS?|IMPRESSION|SUMMARY|FINDINGS",
    ])
});

const GLOSSARY: &[(&str, &str)] = &[
    (
        "Echocardiogram",
        "An ultrasound of the heart. Sound waves create moving pictures that show \
         the size of the heart chambers, how well the heart pumps and how the valves work.",
    ),
    (
        "Ejection Fraction (EF)",
        "The share of blood the main pumping chamber pushes out with each beat. \
         A normal value is roughly 52 to 72 percent.",
    ),
    (
        "Left Ventricle",
        "The heart's main pumping chamber. It sends oxygen-rich blood to the whole body.",
    ),
    (
        "Diastolic Function",
        "How well the heart muscle relaxes and fills with blood between beats.",
    ),
    (
        "Wall Motion",
        "How each segment of the heart wall moves during a beat. A segment that moves \
         poorly can point to past or current damage.",
    ),
    (
        "Regurgitation",
        "A valve that does not close fully and lets some blood leak backward.",
    ),
    (
        "Stenosis",
        "A valve that is narrowed or stiff, so blood has a harder time passing through.",
    ),
    (
        "TAPSE",
        "How far the base of the right ventricle moves toward the tip with each beat. \
         It is a simple measure of right heart pumping.",
    ),
    (
        "RVSP",
        "An estimate of the pressure in the right ventricle, used to screen for high \
         blood pressure in the lungs.",
    ),
    (
        "E/e' Ratio",
        "Compares blood flow into the heart with the speed of the heart muscle relaxing. \
         Higher values suggest higher filling pressure.",
    ),
    (
        "Pericardial Effusion",
        "Extra fluid in the sac that surrounds the heart.",
    ),
];

pub struct EchoHandler {
    ranges: RangeTable,
    weights: ScoringWeights,
}

impl EchoHandler {
    pub fn new(weights: ScoringWeights) -> Result<Self, RangeDefinitionError> {
        Ok(Self {
            ranges: BundledRanges::Echo.load()?,
            weights,
        })
    }
}

impl ReportHandler for EchoHandler {
    fn test_type_id(&self) -> &str {
        "echocardiogram"
    }

    fn display_name(&self) -> &str {
        "Echocardiogram"
    }

    fn category(&self) -> Category {
        Category::Cardiac
    }

    fn keywords(&self) -> &[&'static str] {
        KEYWORDS
    }

    fn header_terms(&self) -> &[&'static str] {
        TIERS.strong
    }

    fn kind(&self) -> HandlerKind {
        HandlerKind::Specialized
    }

    fn detect(&self, extraction: &ExtractionResult) -> f32 {
        let zones = TextZones::split(&extraction.full_text, &self.weights);
        TIERS.score(&zones, &self.weights)
    }

    fn parse(
        &self,
        extraction: &ExtractionResult,
        sex: Option<Sex>,
        _age: Option<u32>,
    ) -> ParsedReport {
        let text = &extraction.full_text;
        let raw = TABLE.extract(text, extraction);
        let measurements = classify_all(&self.ranges, raw, sex);
        assemble_report(
            self,
            extraction,
            measurements,
            SECTIONS.split(text),
            extract_findings(text),
        )
    }

    fn reference_ranges(&self) -> BTreeMap<String, ReferenceRangeInfo> {
        self.ranges.reference_info()
    }

    fn glossary(&self) -> BTreeMap<String, String> {
        glossary_map(GLOSSARY)
    }

    fn prompt_context(&self, _extraction: Option<&ExtractionResult>) -> PromptContext {
        PromptContext {
            specialty: "cardiology".into(),
            test_type: "echocardiogram".into(),
            category: Category::Cardiac,
            guidelines: Some("ASE 2015 Chamber Quantification Guidelines".into()),
            explanation_style: "Explain each measurement in plain language. Compare to \
                                normal ranges. Highlight any abnormalities. Avoid medical \
                                jargon where possible."
                .into(),
            interpretation_rules: Some(
                "Organize findings in this order: LV systolic function first, then \
                 diastolic function, then chamber sizes, then valvular findings, then \
                 right heart, then pericardium."
                    .into(),
            ),
            notes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{AbnormalityDirection, SeverityStatus};
    use crate::pipeline::classification::types::NO_MEASUREMENTS_WARNING;

    const REPORT: &str = "TRANSTHORACIC ECHOCARDIOGRAM\n\
        Indication: dyspnea\n\
        LEFT VENTRICLE: Normal size. LVIDd 4.9 cm, LVIDs 3.1 cm. IVSd 0.9 cm, LVPWd 0.9 cm.\n\
        LVEF 55-60%. No regional wall motion abnormalities.\n\
        DIASTOLIC FUNCTION: E/A ratio 1.1, E/e' 9, DT 190 ms.\n\
        LEFT ATRIUM: LA volume index 38 mL/m2.\n\
        TRICUSPID VALVE: trace TR. TR velocity 2.4 m/s. RVSP 28 mmHg. TAPSE 2.1 cm.\n\
        \n\
        IMPRESSION:\n\
        1. Normal left ventricular size and systolic function.\n\
        2. Mildly dilated left atrium.\n";

    fn handler() -> EchoHandler {
        EchoHandler::new(ScoringWeights::default()).unwrap()
    }

    #[test]
    fn transthoracic_echo_with_lvef_scores_strong() {
        let er = ExtractionResult::from_text("Transthoracic Echocardiogram\nLVEF 55%");
        let h = handler();
        assert!(h.detect(&er) >= 0.7);

        let report = h.parse(&er, None, None);
        assert_eq!(report.measurements.len(), 1);
        let lvef = &report.measurements[0];
        assert_eq!(lvef.abbreviation, "LVEF");
        assert_eq!(lvef.value, 55.0);
        assert_eq!(lvef.status, SeverityStatus::Normal);
    }

    #[test]
    fn parses_full_report() {
        let er = ExtractionResult::from_text(REPORT);
        let report = handler().parse(&er, Some(Sex::Male), None);
        let by_abbr = |a: &str| report.measurements.iter().find(|m| m.abbreviation == a);

        assert_eq!(by_abbr("LVEF").map(|m| m.value), Some(57.5));
        assert_eq!(by_abbr("LVIDd").map(|m| m.value), Some(4.9));
        assert_eq!(by_abbr("LVIDs").map(|m| m.value), Some(3.1));
        assert_eq!(by_abbr("E/A").map(|m| m.value), Some(1.1));
        assert_eq!(by_abbr("E/e'").map(|m| m.value), Some(9.0));
        assert_eq!(by_abbr("DT").map(|m| m.value), Some(190.0));
        assert_eq!(by_abbr("TRV").map(|m| m.value), Some(2.4));
        assert_eq!(by_abbr("RVSP").map(|m| m.value), Some(28.0));
        assert_eq!(by_abbr("TAPSE").map(|m| m.value), Some(2.1));

        let lavi = by_abbr("LAVI").unwrap();
        assert_eq!(lavi.status, SeverityStatus::MildlyAbnormal);
        assert_eq!(lavi.direction, AbnormalityDirection::AboveNormal);

        assert!(report.warnings.is_empty());
        assert_eq!(report.findings.len(), 2);
        let names: Vec<_> = report.sections.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"LEFT VENTRICLE"));
        assert!(names.contains(&"IMPRESSION"));
    }

    #[test]
    fn reduced_ef_is_abnormal() {
        let er = ExtractionResult::from_text("Echocardiogram. Ejection fraction is 35%.");
        let report = handler().parse(&er, None, None);
        assert_eq!(report.measurements[0].status, SeverityStatus::ModeratelyAbnormal);
        assert_eq!(report.measurements[0].direction, AbnormalityDirection::BelowNormal);
    }

    #[test]
    fn tapse_in_millimetres_is_rejected_by_bounds() {
        let er = ExtractionResult::from_text("Echocardiogram. TAPSE 22 mm.");
        let report = handler().parse(&er, None, None);
        assert!(report.measurements.is_empty());
        assert_eq!(report.warnings, vec![NO_MEASUREMENTS_WARNING.to_string()]);
    }

    #[test]
    fn comparison_only_mention_is_weak() {
        let er = ExtractionResult::from_text(
            "CT CHEST WITHOUT CONTRAST\n\nComparison: Echocardiogram from 2021.\n\nLungs are clear.",
        );
        assert!(handler().detect(&er) <= 0.2);
    }

    #[test]
    fn comparison_only_mention_stays_weak_with_body_vocabulary() {
        let er = ExtractionResult::from_text(
            "CT CHEST WITHOUT CONTRAST

             Comparison: Echocardiogram 2021.

             Findings: Calcified aortic stenosis. Small pericardial effusion.              Left ventricle normal in size. Lungs are clear.",
        );
        let score = handler().detect(&er);
        assert!(score > 0.0 && score <= 0.2, "got {score}");
    }

    #[test]
    fn stress_protocol_terms_penalize() {
        let h = handler();
        let plain = h.detect(&ExtractionResult::from_text("ECHOCARDIOGRAM
LVEF 60%"));
        let stress = h.detect(&ExtractionResult::from_text(
            "PHARMACOLOGIC STRESS ECHOCARDIOGRAM
Dobutamine infused to peak dose. LVEF 60%",
        ));
        assert!((plain - 0.75).abs() < 1e-6, "got {plain}");
        assert!((stress - 0.75 * 0.4).abs() < 1e-6, "got {stress}");
    }

    #[test]
    fn moderate_terms_alone_score_mid_band() {
        let er = ExtractionResult::from_text("LVEF 60%, wall motion normal, diastolic function normal");
        let score = handler().detect(&er);
        assert!((score - 0.55).abs() < 1e-6, "got {score}");
    }

    #[test]
    fn exposes_ranges_glossary_and_context() {
        let h = handler();
        assert!(h.reference_ranges().contains_key("LVEF"));
        assert!(h.glossary().contains_key("Ejection Fraction (EF)"));
        let ctx = h.prompt_context(None);
        assert_eq!(ctx.specialty, "cardiology");
        assert!(ctx.interpretation_rules.unwrap().starts_with("Organize"));
    }
}
