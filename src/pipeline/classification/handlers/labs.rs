//! Blood laboratory panels (chemistry, CBC, lipids, thyroid, iron).
//!
//! Lab PDFs carry printed commentary ("High LDL, consider lifestyle
//! changes") that must not be forwarded as findings, so findings are always
//! empty and interpretive headers are not split out as sections.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::config::ScoringWeights;
use crate::models::enums::{Category, HandlerKind, Sex};
use crate::pipeline::classification::handler::{
    assemble_report, classify_all, glossary_map, ReportHandler,
};
use crate::pipeline::classification::scoring::{KeywordTiers, TextZones, TierBases};
use crate::pipeline::classification::sections::SectionSplitter;
use crate::pipeline::classification::types::{ParsedReport, PromptContext};
use crate::pipeline::extraction::ExtractionResult;
use crate::pipeline::measurements::{
    BundledRanges, MeasurementDef, MeasurementTable, RangeDefinitionError, RangeTable,
    ReferenceRangeInfo,
};

const KEYWORDS: &[&str] = &[
    "laboratory results",
    "lab results",
    "complete blood count",
    "comprehensive metabolic panel",
    "basic metabolic panel",
    "lipid panel",
    "cbc",
    "cmp",
    "bmp",
    "glucose",
    "creatinine",
    "hemoglobin",
    "hematocrit",
    "cholesterol",
    "triglycerides",
    "tsh",
    "hba1c",
    "ferritin",
    "blood test",
    "blood work",
    "blood panel",
    "serum chemistry",
    "coagulation",
    "pt/inr",
    "vitamin d",
    "vitamin b12",
    "troponin",
    "bnp",
    "psa",
    "sed rate",
    "esr",
    "crp",
    "hemogram",
];

const TIERS: KeywordTiers = KeywordTiers {
    strong: &[
        "laboratory results",
        "lab results",
        "lab report",
        "complete blood count",
        "comprehensive metabolic panel",
        "basic metabolic panel",
        "lipid panel",
        "chemistry panel",
        "metabolic panel",
        "thyroid panel",
        "iron studies",
        "hematology",
        "haematology",
        "cbc with differential",
        "complete haemogram",
        "complete hemogram",
    ],
    moderate: &[
        "cbc",
        "cmp",
        "bmp",
        "glucose",
        "creatinine",
        "hemoglobin",
        "haemoglobin",
        "hematocrit",
        "haematocrit",
        "wbc",
        "rbc",
        "potassium",
        "sodium",
        "cholesterol",
        "triglycerides",
        "tsh",
        "hba1c",
        "a1c",
        "alt",
        "ast",
        "bun",
        "egfr",
        "ferritin",
        "albumin",
        "bilirubin",
        "platelet",
        "hdl",
        "ldl",
        "alkaline phosphatase",
        "haemogram",
        "leucocyte",
        "erythrocyte",
    ],
    weak: &[
        "mg/dl",
        "g/dl",
        "meq/l",
        "k/ul",
        "u/l",
        "ng/ml",
        "ng/dl",
        "gm/dl",
        "gm/ dl",
        "reference range",
        "flag",
        "abnormal",
        "out of range",
        "/cumm",
        "lakh/",
    ],
    // Imaging vocabulary: a radiology report quoting a creatinine value is
    // still a radiology report.
    negative: &[
        "calcium score",
        "agatston",
        "coronary artery calcium",
        "coronary calcium",
        "ct scan",
        "ct chest",
        "computed tomography",
        "axial images",
        "non-contrast",
        "gated ct",
        "cardiac ct",
        "hounsfield",
        "lung fields",
        "pulmonary",
        "cardiac mri",
        "echocardiogram",
        "ultrasound",
        "doppler",
        "x-ray",
        "xray",
        "radiograph",
        "mri",
        "magnetic resonance",
        "nuclear medicine",
        "perfusion",
        "angiography",
        "catheterization",
    ],
    bases: TierBases::STANDARD,
};

static MEASUREMENTS: &[MeasurementDef] = &[
    // Chemistry
    MeasurementDef {
        name: "Glucose",
        abbreviation: "GLU",
        unit: "mg/dL",
        patterns: &[
            r"\bglucose(?:,?\s*(?:fasting|serum|plasma|random))?{SEP}{NUM}",
            r"\bGLU{SEP}{NUM}",
        ],
        min: 10.0,
        max: 1000.0,
    },
    MeasurementDef {
        name: "Blood Urea Nitrogen",
        abbreviation: "BUN",
        unit: "mg/dL",
        patterns: &[r"\b(?:BUN|(?:blood\s+)?urea\s+nitrogen){SEP}{NUM}"],
        min: 1.0,
        max: 200.0,
    },
    MeasurementDef {
        name: "Creatinine",
        abbreviation: "CREAT",
        unit: "mg/dL",
        patterns: &[r"\b(?:creatinine|CREAT)(?:,?\s*serum)?{SEP}{NUM}"],
        min: 0.1,
        max: 20.0,
    },
    MeasurementDef {
        name: "Estimated GFR",
        abbreviation: "EGFR",
        unit: "mL/min/1.73m2",
        patterns: &[r"\be?GFR(?:\s*\([^)\n]{0,30}\))?{SEP}(?:>\s*)?{NUM}"],
        min: 1.0,
        max: 200.0,
    },
    MeasurementDef {
        name: "Sodium",
        abbreviation: "NA",
        unit: "mEq/L",
        patterns: &[r"\bsodium{SEP}{NUM}", r"\bNa{SEP}{NUM}\s*(?:mEq|mmol)"],
        min: 100.0,
        max: 180.0,
    },
    MeasurementDef {
        name: "Potassium",
        abbreviation: "K",
        unit: "mEq/L",
        patterns: &[r"\bpotassium{SEP}{NUM}", r"\bK{SEP}{NUM}\s*(?:mEq|mmol)"],
        min: 1.5,
        max: 9.0,
    },
    MeasurementDef {
        name: "Chloride",
        abbreviation: "CL",
        unit: "mEq/L",
        patterns: &[r"\bchloride{SEP}{NUM}", r"\bCl{SEP}{NUM}\s*(?:mEq|mmol)"],
        min: 70.0,
        max: 130.0,
    },
    MeasurementDef {
        name: "Carbon Dioxide",
        abbreviation: "CO2",
        unit: "mEq/L",
        patterns: &[r"\b(?:total\s+)?(?:CO2|carbon\s+dioxide|bicarbonate|HCO3){SEP}{NUM}"],
        min: 5.0,
        max: 50.0,
    },
    MeasurementDef {
        name: "Calcium",
        abbreviation: "CA",
        unit: "mg/dL",
        patterns: &[r"\bcalcium(?:,?\s*(?:serum|total))?{SEP}{NUM}"],
        min: 4.0,
        max: 16.0,
    },
    MeasurementDef {
        name: "Total Protein",
        abbreviation: "TP",
        unit: "g/dL",
        patterns: &[r"\b(?:total\s+protein|protein,?\s+total){SEP}{NUM}"],
        min: 2.0,
        max: 12.0,
    },
    MeasurementDef {
        name: "Albumin",
        abbreviation: "ALB",
        unit: "g/dL",
        patterns: &[r"\balbumin{SEP}{NUM}"],
        min: 1.0,
        max: 7.0,
    },
    MeasurementDef {
        name: "Total Bilirubin",
        abbreviation: "TBILI",
        unit: "mg/dL",
        patterns: &[
            r"\b(?:total\s+bilirubin|bilirubin,?\s+total|T\.?\s?bili){SEP}{NUM}",
            r"(?m)^[ \t]*bilirubin{SEP}{NUM}",
        ],
        min: 0.0,
        max: 30.0,
    },
    MeasurementDef {
        name: "Aspartate Aminotransferase",
        abbreviation: "AST",
        unit: "U/L",
        patterns: &[r"\b(?:AST|SGOT|aspartate\s+aminotransferase)(?:\s*\(SGOT\))?{SEP}{NUM}"],
        min: 1.0,
        max: 5000.0,
    },
    MeasurementDef {
        name: "Alanine Aminotransferase",
        abbreviation: "ALT",
        unit: "U/L",
        patterns: &[r"\b(?:ALT|SGPT|alanine\s+aminotransferase)(?:\s*\(SGPT\))?{SEP}{NUM}"],
        min: 1.0,
        max: 5000.0,
    },
    MeasurementDef {
        name: "Alkaline Phosphatase",
        abbreviation: "ALP",
        unit: "U/L",
        patterns: &[r"\b(?:ALP|alk(?:aline)?\.?\s+phos(?:phatase)?){SEP}{NUM}"],
        min: 5.0,
        max: 2000.0,
    },
    // Complete blood count
    MeasurementDef {
        name: "White Blood Cell Count",
        abbreviation: "WBC",
        unit: "K/uL",
        patterns: &[
            r"\b(?:WBC|white\s+blood\s+cells?(?:\s+count)?|total\s+leu[ck]ocyte\s+count|TLC){SEP}{NUM}",
        ],
        min: 0.1,
        max: 200.0,
    },
    MeasurementDef {
        name: "Red Blood Cell Count",
        abbreviation: "RBC",
        unit: "M/uL",
        patterns: &[r"\b(?:RBC|red\s+blood\s+cells?(?:\s+count)?|erythrocyte\s+count){SEP}{NUM}"],
        min: 1.0,
        max: 9.0,
    },
    MeasurementDef {
        name: "Hemoglobin",
        abbreviation: "HGB",
        unit: "g/dL",
        patterns: &[r"\b(?:ha?emoglobin|HGB|Hb){SEP}{NUM}"],
        min: 3.0,
        max: 25.0,
    },
    MeasurementDef {
        name: "Hematocrit",
        abbreviation: "HCT",
        unit: "%",
        patterns: &[r"\b(?:ha?ematocrit|HCT|PCV|packed\s+cell\s+volume){SEP}{NUM}"],
        min: 10.0,
        max: 75.0,
    },
    MeasurementDef {
        name: "Mean Corpuscular Volume",
        abbreviation: "MCV",
        unit: "fL",
        patterns: &[r"\bMCV{SEP}{NUM}"],
        min: 50.0,
        max: 150.0,
    },
    MeasurementDef {
        name: "Mean Corpuscular Hemoglobin",
        abbreviation: "MCH",
        unit: "pg",
        patterns: &[r"\bMCH{SEP}{NUM}"],
        min: 10.0,
        max: 50.0,
    },
    MeasurementDef {
        name: "Mean Corpuscular Hemoglobin Concentration",
        abbreviation: "MCHC",
        unit: "g/dL",
        patterns: &[r"\bMCHC{SEP}{NUM}"],
        min: 20.0,
        max: 45.0,
    },
    MeasurementDef {
        name: "Red Cell Distribution Width",
        abbreviation: "RDW",
        unit: "%",
        patterns: &[r"\bRDW(?:-CV)?{SEP}{NUM}"],
        min: 5.0,
        max: 30.0,
    },
    MeasurementDef {
        name: "Platelet Count",
        abbreviation: "PLT",
        unit: "K/uL",
        patterns: &[r"\b(?:platelets?(?:\s+count)?|PLT){SEP}{NUM}"],
        min: 5.0,
        max: 2000.0,
    },
    // Lipids
    MeasurementDef {
        name: "Total Cholesterol",
        abbreviation: "CHOL",
        unit: "mg/dL",
        patterns: &[
            r"(?m)^[ \t]*(?:total\s+)?cholesterol(?:,?\s*total)?{SEP}{NUM}",
            r"\bCHOL{SEP}{NUM}",
        ],
        min: 50.0,
        max: 1000.0,
    },
    MeasurementDef {
        name: "HDL Cholesterol",
        abbreviation: "HDL",
        unit: "mg/dL",
        patterns: &[r"\bHDL(?:[\s-]*(?:cholesterol|C))?{SEP}{NUM}"],
        min: 5.0,
        max: 150.0,
    },
    MeasurementDef {
        name: "LDL Cholesterol",
        abbreviation: "LDL",
        unit: "mg/dL",
        patterns: &[r"\bLDL(?:[\s-]*(?:cholesterol|C))?(?:\s*\(calc(?:ulated)?\))?{SEP}{NUM}"],
        min: 5.0,
        max: 400.0,
    },
    MeasurementDef {
        name: "Triglycerides",
        abbreviation: "TRIG",
        unit: "mg/dL",
        patterns: &[r"\b(?:triglycerides?|TRIG){SEP}{NUM}"],
        min: 10.0,
        max: 5000.0,
    },
    // Thyroid
    MeasurementDef {
        name: "Thyroid Stimulating Hormone",
        abbreviation: "TSH",
        unit: "uIU/mL",
        patterns: &[r"\b(?:TSH|thyroid\s+stimulating\s+hormone){SEP}{NUM}"],
        min: 0.001,
        max: 100.0,
    },
    MeasurementDef {
        name: "Free T4",
        abbreviation: "FT4",
        unit: "ng/dL",
        patterns: &[r"\b(?:free\s+T4|FT4|free\s+thyroxine){SEP}{NUM}"],
        min: 0.1,
        max: 10.0,
    },
    // Iron studies
    MeasurementDef {
        name: "Iron",
        abbreviation: "FE",
        unit: "ug/dL",
        patterns: &[r"(?m)^[ \t]*(?:serum\s+)?iron{SEP}{NUM}"],
        min: 5.0,
        max: 500.0,
    },
    MeasurementDef {
        name: "Total Iron Binding Capacity",
        abbreviation: "TIBC",
        unit: "ug/dL",
        patterns: &[r"\b(?:TIBC|total\s+iron\s+binding\s+capacity){SEP}{NUM}"],
        min: 50.0,
        max: 800.0,
    },
    MeasurementDef {
        name: "Ferritin",
        abbreviation: "FERR",
        unit: "ng/mL",
        patterns: &[r"\bferritin{SEP}{NUM}"],
        min: 1.0,
        max: 5000.0,
    },
    MeasurementDef {
        name: "Transferrin Saturation",
        abbreviation: "TSAT",
        unit: "%",
        patterns: &[r"\b(?:transferrin\s+saturation|iron\s+saturation|TSAT){SEP}{NUM}"],
        min: 1.0,
        max: 100.0,
    },
    MeasurementDef {
        name: "Hemoglobin A1c",
        abbreviation: "A1C",
        unit: "%",
        patterns: &[
            r"\b(?:ha?emoglobin\s+A1c|HbA1c|A1c|glycated\s+ha?emoglobin|glycohemoglobin){SEP}{NUM}",
        ],
        min: 3.0,
        max: 20.0,
    },
];

static TABLE: LazyLock<MeasurementTable> = LazyLock::new(|| MeasurementTable::compile(MEASUREMENTS));

// Interpretive headers (COMMENT, INTERPRETATION, IMPRESSION) are left out on
// purpose; see the module docs.
static SECTIONS: LazyLock<SectionSplitter> = LazyLock::new(|| {
    SectionSplitter::new(&[
        r"CHEMISTRY|CHEM\s+PANEL",
        r"HA?EMATOLOGY",
        r"(?:COMPLETE\s+)?(?:BLOOD\s+COUNT|HA?EMOGRAM)|CBC",
        r"(?:COMPREHENSIVE|BASIC)\s+METABOLIC\s+PANEL|CMP|BMP",
        r"LIPID\s+(?:PANEL|PROFILE)",
        r"THYROID\s+(?:PANEL|FUNCTION|STUDIES)",
        r"IRON\s+(?:STUDIES|PANEL)",
        r"LIVER\s+(?:FUNCTION|PANEL|ENZYMES)|HEPATIC\s+(?:FUNCTION|PANEL)",
        r"RENAL\s+(?:FUNCTION|PANEL)|KIDNEY\s+FUNCTION",
        r"URINALYSIS|UA\b",
        r"DIFFERENTIAL\s+LEU?COCYTE\s+COUNT",
        r"PERIPHERAL\s+SMEAR",
        r"INDICATIONS?(?:\s+FOR\s+(?:TEST|STUDY|PROCEDURE))?",
        r"REASON\s+FOR\s+(?:TEST|STUDY|ORDER|REFERRAL)",
        r"CLINICAL\s+(?:HISTORY|INDICATION|INFORMATION|CONTEXT)",
        r"CONCLUSIONS?",
    ])
});

const GLOSSARY: &[(&str, &str)] = &[
    ("Glucose", "The main sugar in the blood and the body's main source of energy."),
    (
        "Creatinine",
        "A waste product filtered out by the kidneys. Higher levels can mean the \
         kidneys are not filtering as well as they should.",
    ),
    (
        "eGFR",
        "An estimate of how much blood the kidneys filter each minute. Lower numbers \
         mean lower kidney function.",
    ),
    (
        "Hemoglobin",
        "The protein in red blood cells that carries oxygen. Low levels are called anemia.",
    ),
    (
        "White Blood Cells",
        "Cells that fight infection. High counts can mean infection or inflammation.",
    ),
    ("Platelets", "Small cell fragments that help the blood clot."),
    (
        "LDL Cholesterol",
        "Often called bad cholesterol. High levels can build up in the artery walls.",
    ),
    (
        "HDL Cholesterol",
        "Often called good cholesterol. It helps remove other cholesterol from the blood.",
    ),
    (
        "A1C",
        "Shows the average blood sugar over the past two to three months.",
    ),
    (
        "TSH",
        "A hormone that tells the thyroid how hard to work. High levels suggest an \
         underactive thyroid; low levels suggest an overactive one.",
    ),
    ("Ferritin", "A protein that stores iron. Low levels mean the body's iron stores are low."),
    (
        "AST / ALT",
        "Liver enzymes. When liver cells are irritated or damaged, these leak into the blood.",
    ),
];

pub struct LabResultsHandler {
    ranges: RangeTable,
    weights: ScoringWeights,
}

impl LabResultsHandler {
    pub fn new(weights: ScoringWeights) -> Result<Self, RangeDefinitionError> {
        Ok(Self {
            ranges: BundledRanges::Labs.load()?,
            weights,
        })
    }
}

impl ReportHandler for LabResultsHandler {
    fn test_type_id(&self) -> &str {
        "lab_results"
    }

    fn display_name(&self) -> &str {
        "Blood Lab Results"
    }

    fn category(&self) -> Category {
        Category::Lab
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
        let mut raw = TABLE.extract(text, extraction);
        TABLE.extract_from_tables(extraction, &mut raw);
        let measurements = classify_all(&self.ranges, raw, sex);
        assemble_report(self, extraction, measurements, SECTIONS.split(text), Vec::new())
    }

    fn reference_ranges(&self) -> BTreeMap<String, ReferenceRangeInfo> {
        self.ranges.reference_info()
    }

    fn glossary(&self) -> BTreeMap<String, String> {
        glossary_map(GLOSSARY)
    }

    fn prompt_context(&self, _extraction: Option<&ExtractionResult>) -> PromptContext {
        PromptContext {
            specialty: "laboratory medicine".into(),
            test_type: "lab_results".into(),
            category: Category::Lab,
            guidelines: Some("Standard clinical laboratory reference ranges for adult patients".into()),
            explanation_style: "Group related analytes (kidney: BUN, creatinine and eGFR; \
                                liver: AST, ALT, ALP and bilirubin; blood sugar: glucose \
                                and A1C). Highlight abnormal values and explain patterns \
                                when several related values are abnormal."
                .into(),
            interpretation_rules: Some(
                "Group findings by organ system: kidney function first, then liver \
                 panel, then glucose metabolism, then lipids, then thyroid, then iron \
                 studies, then CBC."
                    .into(),
            ),
            notes: vec![
                "Ignore pre-printed interpretations or suggestions from the lab report \
                 itself; interpret only the structured measurements and their statuses."
                    .into(),
            ],
        }
    }
}
