//! Cardiac magnetic resonance reports.
//!
//! Shares most of its vocabulary with echocardiography (EF, LV volumes), so
//! echo-only terms in the title or body count against it.

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
    "cardiac mri",
    "cardiac magnetic resonance",
    "cmr",
    "mr cardiac",
    "mri cardiac",
    "cine imaging",
    "late gadolinium enhancement",
    "lge",
    "t1 mapping",
    "t2 mapping",
    "myocardial perfusion mri",
    "delayed enhancement",
    "gadolinium",
    "t2 stir",
    "strain imaging",
    "native t1",
    "extracellular volume",
    "ecv",
    "myocardial fibrosis",
];

const TIERS: KeywordTiers = KeywordTiers {
    strong: &[
        "cardiac mri",
        "cardiac magnetic resonance",
        "cmr",
        "mr cardiac",
        "mri cardiac",
        "cardiac magnetic resonance imaging",
    ],
    moderate: &[
        "late gadolinium enhancement",
        "lge",
        "t1 mapping",
        "t2 mapping",
        "cine imaging",
        "delayed enhancement",
        "native t1",
        "extracellular volume",
        "strain imaging",
        "myocardial perfusion",
    ],
    weak: &[
        "gadolinium",
        "t2 stir",
        "myocardial fibrosis",
        "scar burden",
        "edema",
    ],
    negative: &[
        "echocardiogram",
        "echocardiography",
        "transthoracic",
        "2d echo",
        "doppler",
        "spect",
        "sestamibi",
        "tetrofosmin",
        "thallium",
        "rb-82",
        "rubidium",
        "nuclear stress",
        "treadmill",
        "bruce protocol",
        "stress echocardiogram",
    ],
    bases: TierBases::STANDARD,
};

static MEASUREMENTS: &[MeasurementDef] = &[
    MeasurementDef {
        name: "Left Ventricular Ejection Fraction",
        abbreviation: "LVEF",
        unit: "%",
        patterns: &[
            r"\b(?:LVEF|EF|ejection\s+fraction){SEP}{RANGE}\s*%",
            r"\b(?:LVEF|EF|ejection\s+fraction){SEP}(?:(?:is|of|estimated(?:\s+at)?)\s+)?{NUM}\s*%?",
        ],
        min: 5.0,
        max: 95.0,
    },
    MeasurementDef {
        name: "LV End-Diastolic Volume",
        abbreviation: "LVEDV",
        unit: "mL",
        patterns: &[
            r"\bLVEDV{SEP}{NUM}\s*(?:mL|ml)?",
            r"\bLV\s+end[- ]?diastolic\s+volume{SEP}{NUM}\s*(?:mL|ml)?",
            r"\bLV\s+EDV{SEP}{NUM}\s*(?:mL|ml)?",
        ],
        min: 50.0,
        max: 400.0,
    },
    MeasurementDef {
        name: "LV End-Systolic Volume",
        abbreviation: "LVESV",
        unit: "mL",
        patterns: &[
            r"\bLVESV{SEP}{NUM}\s*(?:mL|ml)?",
            r"\bLV\s+end[- ]?systolic\s+volume{SEP}{NUM}\s*(?:mL|ml)?",
            r"\bLV\s+ESV{SEP}{NUM}\s*(?:mL|ml)?",
        ],
        min: 10.0,
        max: 250.0,
    },
    MeasurementDef {
        name: "LV End-Diastolic Volume Index",
        abbreviation: "LVEDVi",
        unit: "mL/m2",
        patterns: &[
            r"\bLVEDVi{SEP}{NUM}\s*(?:mL/m2|ml/m2|mL/m²)?",
            r"\bLV\s*EDV\s+index{SEP}{NUM}\s*(?:mL/m2|ml/m2|mL/m²)?",
        ],
        min: 30.0,
        max: 200.0,
    },
    MeasurementDef {
        name: "LV End-Systolic Volume Index",
        abbreviation: "LVESVi",
        unit: "mL/m2",
        patterns: &[
            r"\bLVESVi{SEP}{NUM}\s*(?:mL/m2|ml/m2|mL/m²)?",
            r"\bLV\s*ESV\s+index{SEP}{NUM}\s*(?:mL/m2|ml/m2|mL/m²)?",
        ],
        min: 10.0,
        max: 120.0,
    },
    MeasurementDef {
        name: "LV Mass",
        abbreviation: "LVMass",
        unit: "g",
        patterns: &[
            r"\bLV\s+mass{SEP}{NUM}\s*(?:g|grams?)?\b",
            r"\bleft\s+ventricular\s+mass{SEP}{NUM}\s*(?:g|grams?)?\b",
        ],
        min: 50.0,
        max: 400.0,
    },
    MeasurementDef {
        name: "LV Mass Index",
        abbreviation: "LVMi",
        unit: "g/m2",
        patterns: &[
            r"\bLV\s+mass\s+index{SEP}{NUM}",
            r"\bLVMi{SEP}{NUM}",
        ],
        min: 25.0,
        max: 200.0,
    },
    MeasurementDef {
        name: "RV Ejection Fraction",
        abbreviation: "RVEF",
        unit: "%",
        patterns: &[
            r"\bRVEF{SEP}{NUM}\s*%?",
            r"\bRV\s+ejection\s+fraction{SEP}{NUM}\s*%?",
        ],
        min: 10.0,
        max: 80.0,
    },
    MeasurementDef {
        name: "RV End-Diastolic Volume",
        abbreviation: "RVEDV",
        unit: "mL",
        patterns: &[
            r"\bRVEDV{SEP}{NUM}\s*(?:mL|ml)?",
            r"\bRV\s+end[- ]?diastolic\s+volume{SEP}{NUM}\s*(?:mL|ml)?",
        ],
        min: 50.0,
        max: 400.0,
    },
    MeasurementDef {
        name: "RV End-Systolic Volume",
        abbreviation: "RVESV",
        unit: "mL",
        patterns: &[
            r"\bRVESV{SEP}{NUM}\s*(?:mL|ml)?",
            r"\bRV\s+end[- ]?systolic\s+volume{SEP}{NUM}\s*(?:mL|ml)?",
        ],
        min: 10.0,
        max: 200.0,
    },
    MeasurementDef {
        name: "Native T1",
        abbreviation: "NativeT1",
        unit: "ms",
        patterns: &[
            r"\bnative\s+T1{SEP}{NUM}",
            r"\bT1\s+(?:value|mapping){SEP}{NUM}",
        ],
        min: 800.0,
        max: 1400.0,
    },
    MeasurementDef {
        name: "T2 Value",
        abbreviation: "T2",
        unit: "ms",
        patterns: &[r"\bT2\s+(?:value|mapping|time){SEP}{NUM}"],
        min: 30.0,
        max: 80.0,
    },
    MeasurementDef {
        name: "Extracellular Volume",
        abbreviation: "ECV",
        unit: "%",
        patterns: &[
            r"\bECV{SEP}{NUM}\s*%?",
            r"\bextracellular\s+volume{SEP}{NUM}\s*%?",
        ],
        min: 15.0,
        max: 60.0,
    },
    MeasurementDef {
        name: "Scar Burden",
        abbreviation: "ScarBurden",
        unit: "%",
        patterns: &[
            r"\bscar\s+burden{SEP}{NUM}\s*%?",
            r"%\s*(?:scar|LGE){SEP}{NUM}\s*%?",
            r"\bLGE[^\n%]{0,60}?\b{NUM}\s*%",
        ],
        min: 0.0,
        max: 100.0,
    },
    MeasurementDef {
        name: "LA Volume Index",
        abbreviation: "LAVI",
        unit: "mL/m2",
        patterns: &[
            r"\b(?:LA\s+volume\s+index|LAVI){SEP}{NUM}",
            r"\bleft\s+atrial\s+volume\s+index{SEP}{NUM}",
        ],
        min: 10.0,
        max: 80.0,
    },
];

static TABLE: LazyLock<MeasurementTable> = LazyLock::new(|| MeasurementTable::compile(MEASUREMENTS));

static SECTIONS: LazyLock<SectionSplitter> = LazyLock::new(|| {
    SectionSplitter::new(&[
        r"LEFT\s+VENTRICLE|LV\s+(?:FUNCTION|DIMENSIONS?|VOLUMES?)",
        r"RIGHT\s+VENTRICLE|RV\s+(?:FUNCTION|VOLUMES?)",
        r"LEFT\s+ATRIUM|LA\b",
        r"RIGHT\s+ATRIUM|RA\b",
        r"TISSUE\s+CHARACTERIZATION",
        r"LATE\s+GADOLINIUM\s+ENHANCEMENT|LGE",
        r"T1\s+MAPPING|NATIVE\s+T1",
        r"T2\s+MAPPING",
        r"PERFUSION",
        r"CINE\s+IMAGING",
        r"VALV(?:E|ULAR)\s+(?:FUNCTION|ASSESSMENT)",
        r"AORT(?:A|IC)",
        r"PERICARDI(?:UM|AL)",
        r"CONCLUSIONS?|IMPRESSION|SUMMARY|FINDINGS",
    ])
});

const GLOSSARY: &[(&str, &str)] = &[
    (
        "Cardiac MRI",
        "An imaging test that uses a strong magnet and radio waves to make detailed \
         pictures of the heart without radiation.",
    ),
    (
        "Late Gadolinium Enhancement (LGE)",
        "Part of the scan that highlights scarred or damaged heart muscle. Damaged \
         areas hold on to the contrast dye and show up bright.",
    ),
    (
        "Native T1",
        "A tissue value measured before contrast. Higher values can point to swelling \
         or scarring of the heart muscle.",
    ),
    (
        "T2 Mapping",
        "Measures water in the heart muscle. High values suggest swelling or active \
         inflammation.",
    ),
    (
        "Extracellular Volume (ECV)",
        "An estimate of the space between heart muscle cells. More space usually means \
         more scar tissue or deposits.",
    ),
    (
        "Scar Burden",
        "The share of heart muscle that shows scarring on the contrast images.",
    ),
    (
        "LVEDV",
        "How much blood the main pumping chamber holds when it is fully relaxed.",
    ),
    (
        "LVESV",
        "How much blood is left in the main pumping chamber after it squeezes.",
    ),
    (
        "LV Mass",
        "The weight of the main pumping chamber's muscle. A high value can mean the \
         wall has thickened.",
    ),
    (
        "RVEF",
        "The share of blood the right ventricle pushes to the lungs with each beat.",
    ),
    (
        "Myocarditis",
        "Inflammation of the heart muscle, often after a viral infection.",
    ),
];

pub struct CardiacMriHandler {
    ranges: RangeTable,
    weights: ScoringWeights,
}

impl CardiacMriHandler {
    pub fn new(weights: ScoringWeights) -> Result<Self, RangeDefinitionError> {
        Ok(Self {
            ranges: BundledRanges::CardiacMri.load()?,
            weights,
        })
    }
}

impl ReportHandler for CardiacMriHandler {
    fn test_type_id(&self) -> &str {
        "cardiac_mri"
    }

    fn display_name(&self) -> &str {
        "Cardiac MRI"
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
            test_type: "cardiac_mri".into(),
            category: Category::Cardiac,
            guidelines: Some("SCMR 2020 Standardized CMR Protocols".into()),
            explanation_style: "Explain each measurement in plain language. Focus on \
                                tissue characterization findings (scar, fibrosis, edema), \
                                scar quantification and volumetric analysis. Compare to \
                                normal ranges and highlight any abnormalities."
                .into(),
            interpretation_rules: Some(
                "Report LVEF and volumes first, then tissue characterization (LGE \
                 pattern and extent), then T1/T2 mapping if available, then perfusion \
                 findings, then any additional findings."
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

    fn handler() -> CardiacMriHandler {
        CardiacMriHandler::new(ScoringWeights::default()).unwrap()
    }

    const REPORT: &str = "CARDIAC MRI WITH AND WITHOUT CONTRAST\n\
        LV FUNCTION: LVEF 48%. LVEDV 210 mL. LVESV 109 mL. LV mass 150 g.\n\
        RV FUNCTION: RVEF 52%.\n\
        TISSUE CHARACTERIZATION: Native T1 1080 ms. ECV 31%.\n\
        LATE GADOLINIUM ENHANCEMENT: Mid-wall LGE involving 8% of the myocardium.\n\
        \n\
        IMPRESSION:\n\
        1. Mildly reduced LV systolic function.\n\
        2. Mid-wall fibrosis pattern suggesting prior myocarditis.\n";

    #[test]
    fn parses_volumes_and_tissue_values() {
        let er = ExtractionResult::from_text(REPORT);
        let report = handler().parse(&er, Some(Sex::Female), None);
        let get = |a: &str| report.measurements.iter().find(|m| m.abbreviation == a);

        assert_eq!(get("LVEF").map(|m| m.value), Some(48.0));
        assert_eq!(get("LVEDV").map(|m| m.value), Some(210.0));
        assert_eq!(get("LVMass").map(|m| m.value), Some(150.0));
        assert_eq!(get("NativeT1").map(|m| m.value), Some(1080.0));
        assert_eq!(get("ECV").map(|m| m.value), Some(31.0));
        assert_eq!(get("ScarBurden").map(|m| m.value), Some(8.0));

        // Female LVEDV upper limit is 150 mL; 210 is past the 200 mL moderate limit.
        let lvedv = get("LVEDV").unwrap();
        assert_eq!(lvedv.status, SeverityStatus::SeverelyAbnormal);
        assert_eq!(lvedv.direction, AbnormalityDirection::AboveNormal);
        assert_eq!(report.findings.len(), 2);
    }

    #[test]
    fn lvedv_classification_depends_on_sex() {
        let er = ExtractionResult::from_text("Cardiac MRI. LVEDV 180 mL.");
        let male = handler().parse(&er, Some(Sex::Male), None);
        let female = handler().parse(&er, Some(Sex::Female), None);
        assert_eq!(male.measurements[0].status, SeverityStatus::Normal);
        assert_eq!(female.measurements[0].status, SeverityStatus::ModeratelyAbnormal);
    }

    #[test]
    fn strong_title_scores_high() {
        let er = ExtractionResult::from_text(REPORT);
        assert!(handler().detect(&er) >= 0.7);
    }

    #[test]
    fn echo_terms_penalize() {
        let plain = ExtractionResult::from_text("Cardiac MRI\nLVEF 55%");
        let mixed = ExtractionResult::from_text("Cardiac MRI\nTransthoracic echocardiogram, LVEF 55%");
        let h = handler();
        let base = h.detect(&plain);
        let penalized = h.detect(&mixed);
        assert!((penalized - base * 0.4).abs() < 1e-6, "{base} {penalized}");
    }

    #[test]
    fn nuclear_perfusion_study_stays_low() {
        let er = ExtractionResult::from_text(
            "MYOCARDIAL PERFUSION SPECT\nTc-99m sestamibi rest and stress images.",
        );
        let score = handler().detect(&er);
        assert!(score > 0.0 && score < 0.2, "{score}");
    }

    #[test]
    fn comparison_mention_is_discounted() {
        let er = ExtractionResult::from_text(
            "CT CORONARY ANGIOGRAM\n\nComparison: Cardiac MRI 2022.\n\nNo stenosis.",
        );
        assert!(handler().detect(&er) <= 0.2);
    }
}
