//! Cardiac stress testing: one family handler for treadmill, stress echo,
//! SPECT and PET studies.
//!
//! The variants share vocabulary and measurements, so a single parser serves
//! all of them. [`StressTestHandler::resolve_subtype`] narrows the family to
//! the concrete study from the stress modality (exercise or a pharmacologic
//! agent) and the imaging modality.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::config::ScoringWeights;
use crate::models::enums::{Category, HandlerKind, Sex};
use crate::pipeline::classification::extractors::CARDIAC_PET;
use crate::pipeline::classification::handler::{
    assemble_report, classify_all, glossary_map, ReportHandler,
};
use crate::pipeline::classification::scoring::{contains_term, KeywordTiers, TextZones, TierBases};
use crate::pipeline::classification::sections::{extract_findings, SectionSplitter};
use crate::pipeline::classification::types::{ParsedReport, PromptContext, SubtypeInfo};
use crate::pipeline::extraction::ExtractionResult;
use crate::pipeline::measurements::{
    BundledRanges, MeasurementDef, MeasurementTable, RangeDefinitionError, RangeTable,
    ReferenceRangeInfo,
};

pub const FAMILY_ID: &str = "stress_test";

pub const EXERCISE_TREADMILL: &str = "exercise_treadmill_test";
pub const EXERCISE_STRESS_ECHO: &str = "exercise_stress_echo";
pub const PHARMA_STRESS_ECHO: &str = "pharma_stress_echo";
pub const EXERCISE_SPECT: &str = "exercise_spect_stress";
pub const PHARMA_SPECT: &str = "pharma_spect_stress";
pub const PHARMA_PET: &str = "pharma_pet_stress";

static SUBTYPES: &[SubtypeInfo] = &[
    SubtypeInfo { id: EXERCISE_TREADMILL, display_name: "Exercise Treadmill Test" },
    SubtypeInfo { id: EXERCISE_STRESS_ECHO, display_name: "Exercise Stress Echocardiogram" },
    SubtypeInfo { id: PHARMA_STRESS_ECHO, display_name: "Pharmacologic Stress Echocardiogram" },
    SubtypeInfo { id: EXERCISE_SPECT, display_name: "Exercise SPECT Myocardial Perfusion" },
    SubtypeInfo { id: PHARMA_SPECT, display_name: "Pharmacologic SPECT Myocardial Perfusion" },
    SubtypeInfo { id: PHARMA_PET, display_name: "Pharmacologic PET Stress" },
];

const PHARMA_AGENTS: &[&str] = &[
    "lexiscan",
    "adenosine",
    "regadenoson",
    "dobutamine",
    "dipyridamole",
    "persantine",
];

const EXERCISE_TERMS: &[&str] = &["treadmill", "bruce", "exercise", "bicycle ergometer"];

const PET_TERMS: &[&str] = &["pet", "pet/ct", "rubidium", "rb-82", "n-13 ammonia"];

const SPECT_TERMS: &[&str] = &[
    "spect",
    "sestamibi",
    "myoview",
    "tetrofosmin",
    "thallium",
    "technetium",
    "nuclear",
    "myocardial perfusion",
];

const ECHO_TERMS: &[&str] = &["stress echo", "echocardiogram", "echocardiography"];

const KEYWORDS: &[&str] = &[
    "stress test",
    "exercise stress",
    "treadmill test",
    "exercise tolerance test",
    "bruce protocol",
    "modified bruce",
    "exercise treadmill",
    "cardiac stress",
    "exercise ecg",
    "exercise ekg",
    "exercise electrocardiogram",
    "graded exercise test",
    "mets",
    "peak heart rate",
    "target heart rate",
    "st depression",
    "st segment",
    "duke treadmill",
    "chronotropic",
    "rate pressure product",
    "exercise capacity",
    "stress echocardiogram",
    "stress echo",
    "dobutamine stress",
    "pharmacologic stress",
    "myocardial perfusion imaging",
    "nuclear stress",
    "spect",
    "lexiscan",
    "regadenoson",
    "cardiac pet",
    "rb-82",
];

const TIERS: KeywordTiers = KeywordTiers {
    strong: &[
        "stress test",
        "exercise stress test",
        "exercise treadmill test",
        "exercise tolerance test",
        "treadmill stress",
        "cardiac stress test",
        "exercise stress echocardiogram",
        "bruce protocol",
        "modified bruce protocol",
        "graded exercise test",
        "exercise ecg",
        "exercise ekg",
        "exercise electrocardiogram",
        "treadmill exercise test",
        "stress echocardiogram",
        "stress echocardiography",
        "stress echo",
        "dobutamine stress",
        "pharmacologic stress",
        "pharmacological stress",
        "myocardial perfusion",
        "myocardial perfusion imaging",
        "spect",
        "nuclear stress",
        "lexiscan",
        "regadenoson",
        "rb-82",
        "rubidium-82",
        "cardiac pet",
        "n-13 ammonia",
    ],
    moderate: &[
        "mets achieved",
        "mets attained",
        "metabolic equivalents",
        "peak heart rate",
        "target heart rate",
        "max predicted heart rate",
        "mphr",
        "% predicted",
        "st depression",
        "st elevation",
        "st segment changes",
        "st changes",
        "duke treadmill score",
        "rate pressure product",
        "double product",
        "chronotropic",
        "exercise capacity",
        "exercise duration",
        "treadmill time",
        "exercise stage",
        "recovery phase",
        "peak exercise",
        "sestamibi",
        "tetrofosmin",
        "myoview",
        "thallium",
        "adenosine",
        "dobutamine",
        "dipyridamole",
        "pet/ct",
        "perfusion defect",
        "reversible defect",
        "fixed defect",
        "summed stress score",
        "transient ischemic dilation",
        "myocardial blood flow",
        "coronary flow reserve",
        "wall motion at peak",
    ],
    weak: &[
        "treadmill",
        "bruce",
        "angina",
        "chest pain during exercise",
        "dyspnea on exertion",
        "exercise",
        "mets",
        "arrhythmia",
        "pvcs",
        "perfusion",
        "ischemia",
        "infusion",
        "rest images",
    ],
    negative: &[
        "cardiac mri",
        "cardiac magnetic resonance",
        "cmr",
        "late gadolinium enhancement",
    ],
    bases: TierBases::STANDARD,
};

static MEASUREMENTS: &[MeasurementDef] = &[
    MeasurementDef {
        name: "Metabolic Equivalents Achieved",
        abbreviation: "METS",
        unit: "METs",
        patterns: &[
            r"\bMETs?(?:\s+(?:achieved|attained))?{SEP}{NUM}",
            r"{NUM}\s*METs?\b",
        ],
        min: 1.0,
        max: 25.0,
    },
    MeasurementDef {
        name: "Peak Heart Rate",
        abbreviation: "PeakHR",
        unit: "bpm",
        patterns: &[
            r"\b(?:peak|max(?:imum|imal)?)\s+(?:heart\s+rate|HR){SEP}{NUM}",
            r"\bHR\s+at\s+peak(?:\s+exercise)?{SEP}{NUM}",
        ],
        min: 40.0,
        max: 250.0,
    },
    MeasurementDef {
        name: "Percent of Maximum Predicted Heart Rate",
        abbreviation: "MPHR_PCT",
        unit: "%",
        patterns: &[
            r"{NUM}\s*%\s*(?:of\s+)?(?:the\s+)?(?:age[- ]predicted\s+)?(?:max(?:imum|imal)?\s+)?(?:predicted|MPHR|APMHR)",
            r"\b%\s*MPHR{SEP}{NUM}",
            r"\bpercent\s+(?:of\s+)?(?:max(?:imum)?\s+)?predicted(?:\s+heart\s+rate)?{SEP}{NUM}",
        ],
        min: 20.0,
        max: 150.0,
    },
    MeasurementDef {
        name: "Resting Heart Rate",
        abbreviation: "RestHR",
        unit: "bpm",
        patterns: &[
            r"\b(?:resting|rest|baseline)\s+(?:heart\s+rate|HR){SEP}{NUM}",
            r"\bHR\s+at\s+rest{SEP}{NUM}",
        ],
        min: 25.0,
        max: 200.0,
    },
    MeasurementDef {
        name: "Peak Systolic Blood Pressure",
        abbreviation: "PeakSBP",
        unit: "mmHg",
        patterns: &[
            r"\b(?:peak|max(?:imum)?)\s+(?:exercise\s+)?(?:BP|blood\s+pressure){SEP}{NUM}\s*/\s*\d+",
            r"\bpeak\s+(?:SBP|systolic(?:\s+blood\s+pressure)?){SEP}{NUM}",
        ],
        min: 60.0,
        max: 300.0,
    },
    MeasurementDef {
        name: "Duke Treadmill Score",
        abbreviation: "DTS",
        unit: "",
        patterns: &[
            r"\bDuke\s+(?:treadmill\s+)?score{SEP}{SNUM}",
            r"\bDTS{SEP}{SNUM}",
        ],
        min: -50.0,
        max: 20.0,
    },
    MeasurementDef {
        name: "Exercise Duration",
        abbreviation: "ExDur",
        unit: "min",
        patterns: &[
            r"\b(?:exercise\s+(?:duration|time)|treadmill\s+time|total\s+exercise\s+time){SEP}{NUM}\s*min",
            r"\bexercised\s+for\s+{NUM}\s*min",
        ],
        min: 0.5,
        max: 40.0,
    },
    MeasurementDef {
        name: "Left Ventricular Ejection Fraction",
        abbreviation: "LVEF",
        unit: "%",
        patterns: &[
            r"\b(?:LVEF|EF|ejection\s+fraction){SEP}(?:(?:is|of|estimated(?:\s+at)?)\s+)?{RANGE}\s*%",
            r"\b(?:LVEF|EF|ejection\s+fraction){SEP}(?:(?:is|of|estimated(?:\s+at)?)\s+)?{NUM}\s*%",
        ],
        min: 5.0,
        max: 95.0,
    },
];

static TABLE: LazyLock<MeasurementTable> = LazyLock::new(|| MeasurementTable::compile(MEASUREMENTS));

static SECTIONS: LazyLock<SectionSplitter> = LazyLock::new(|| {
    SectionSplitter::new(&[
        r"INDICATION|REASON\s+FOR\s+(?:TEST|STUDY)",
        r"PROTOCOL|EXERCISE\s+PROTOCOL|PROCEDURE",
        r"BASELINE|RESTING|PRE[- ]?EXERCISE",
        r"EXERCISE\s+(?:DATA|RESPONSE|RESULTS|PHASE)",
        r"HEMODYNAMIC\s+(?:DATA|RESPONSE)",
        r"(?:ECG|EKG|ELECTROCARDIOGRAPHIC)\s+(?:FINDINGS|CHANGES|RESPONSE|INTERPRETATION)",
        r"ST\s+(?:SEGMENT\s+)?(?:ANALYSIS|CHANGES)",
        r"SYMPTOMS|SYMPTOM\s+RESPONSE",
        r"ARRHYTHMIAS?|RHYTHM",
        r"RECOVERY|POST[- ]?EXERCISE",
        r"CONCLUSIONS?|IMPRESSION|SUMMARY|INTERPRETATION|FINDINGS",
    ])
});

const GLOSSARY: &[(&str, &str)] = &[
    (
        "Stress Test",
        "A test that watches the heart while it works harder, either from walking on a \
         treadmill or from a medicine that mimics exercise.",
    ),
    (
        "METs",
        "Metabolic equivalents. A measure of how much work the body did during exercise. \
         One MET is the energy used sitting at rest.",
    ),
    (
        "Maximum Predicted Heart Rate (MPHR)",
        "The highest heart rate expected for your age, roughly 220 minus your age. \
         Reaching 85 percent of it makes an exercise test more reliable.",
    ),
    (
        "ST Depression",
        "A dip in one part of the heart tracing during exercise. It can be a sign that \
         the heart muscle is not getting enough blood.",
    ),
    (
        "Duke Treadmill Score",
        "A score that combines exercise time, ST changes and chest pain to estimate risk. \
         5 or higher is low risk.",
    ),
    (
        "Bruce Protocol",
        "A standard treadmill program where speed and incline increase every three minutes.",
    ),
    (
        "Pharmacologic Stress",
        "A stress test that uses a medicine such as regadenoson or dobutamine instead of \
         exercise, for people who cannot walk on a treadmill.",
    ),
    (
        "Perfusion Defect",
        "An area of heart muscle that receives less blood flow than the rest, seen on \
         nuclear or PET images.",
    ),
    (
        "Rate Pressure Product",
        "Peak heart rate multiplied by peak systolic blood pressure. It reflects how hard \
         the heart worked.",
    ),
];

/// Stress modality inferred from the report text.
fn is_pharmacologic(text: &str) -> bool {
    PHARMA_AGENTS.iter().any(|agent| contains_term(text, agent))
}

fn mentions_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| contains_term(text, term))
}

pub struct StressTestHandler {
    ranges: RangeTable,
    weights: ScoringWeights,
}

impl StressTestHandler {
    pub fn new(weights: ScoringWeights) -> Result<Self, RangeDefinitionError> {
        Ok(Self {
            ranges: BundledRanges::Stress.load()?,
            weights,
        })
    }

    pub fn subtype_display_name(id: &str) -> Option<&'static str> {
        SUBTYPES.iter().find(|s| s.id == id).map(|s| s.display_name)
    }
}

impl ReportHandler for StressTestHandler {
    fn test_type_id(&self) -> &str {
        FAMILY_ID
    }

    fn display_name(&self) -> &str {
        "Stress Test"
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
        let mut measurements = classify_all(&self.ranges, raw, sex);
        let subtype = self.resolve_subtype(extraction);
        if subtype == Some(PHARMA_PET) {
            for pet in (CARDIAC_PET.extract)(extraction, sex) {
                if !measurements.iter().any(|m| m.abbreviation == pet.abbreviation) {
                    measurements.push(pet);
                }
            }
        }
        let mut report = assemble_report(
            self,
            extraction,
            measurements,
            SECTIONS.split(text),
            extract_findings(text),
        );
        // Reports name the concrete protocol, not the hidden family.
        if let Some(subtype) = subtype {
            report.test_type = subtype.to_string();
            if let Some(name) = Self::subtype_display_name(subtype) {
                report.test_type_display = name.to_string();
            }
        }
        report
    }

    fn reference_ranges(&self) -> BTreeMap<String, ReferenceRangeInfo> {
        let mut ranges = (CARDIAC_PET.reference_ranges)();
        ranges.extend(self.ranges.reference_info());
        ranges
    }

    fn glossary(&self) -> BTreeMap<String, String> {
        let mut glossary = glossary_map(CARDIAC_PET.glossary);
        glossary.extend(glossary_map(GLOSSARY));
        glossary
    }

    fn prompt_context(&self, extraction: Option<&ExtractionResult>) -> PromptContext {
        let pharma = extraction
            .map(|er| is_pharmacologic(&er.full_text.to_lowercase()))
            .unwrap_or(false);

        let (test_type, explanation_style) = if pharma {
            (
                "pharmacological_stress_test",
                "This is a pharmacological stress test, not an exercise test. Do not \
                 mention heart rate response, target heart rate or percent of maximum \
                 predicted heart rate: heart rate does not rise meaningfully with a \
                 pharmacologic agent, so those measures do not apply. If the ECG portion \
                 is inconclusive because of baseline ST/T abnormalities, say so without \
                 attributing it to heart rate response. Focus on perfusion findings, wall \
                 motion, ejection fraction, ECG changes and the overall interpretation \
                 (normal, abnormal or equivocal).",
            )
        } else {
            (
                "exercise_stress_test",
                "Focus on exercise capacity (METs), heart rate response (percent of \
                 maximum predicted), blood pressure response, ECG changes (ST depression \
                 or elevation) and the overall interpretation (positive, negative, \
                 equivocal or non-diagnostic). Explain what the results mean for the \
                 patient's heart health.",
            )
        };

        PromptContext {
            specialty: "cardiology".into(),
            test_type: test_type.into(),
            category: Category::Cardiac,
            guidelines: Some("ACC/AHA 2002 Guideline Update for Exercise Testing".into()),
            explanation_style: explanation_style.into(),
            interpretation_rules: None,
            notes: Vec::new(),
        }
    }

    fn subtypes(&self) -> &[SubtypeInfo] {
        SUBTYPES
    }

    fn resolve_subtype(&self, extraction: &ExtractionResult) -> Option<&'static str> {
        let text = extraction.full_text.to_lowercase();
        let pharma = is_pharmacologic(&text);

        if mentions_any(&text, PET_TERMS) {
            return Some(PHARMA_PET);
        }
        if mentions_any(&text, SPECT_TERMS) {
            return Some(if pharma { PHARMA_SPECT } else { EXERCISE_SPECT });
        }
        if mentions_any(&text, ECHO_TERMS) {
            return Some(if pharma { PHARMA_STRESS_ECHO } else { EXERCISE_STRESS_ECHO });
        }
        // A pharmacologic study without imaging is not a recognised variant.
        if !pharma && mentions_any(&text, EXERCISE_TERMS) {
            return Some(EXERCISE_TREADMILL);
        }
        None
    }
}
