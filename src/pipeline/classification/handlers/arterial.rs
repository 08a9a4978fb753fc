//! Lower extremity arterial duplex and ankle-brachial index studies.

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

pub const TYPE_ID: &str = "arterial_doppler";

const KEYWORDS: &[&str] = &[
    "arterial ultrasound",
    "arterial doppler",
    "arterial duplex",
    "lower extremity arterial",
    "ankle-brachial index",
    "abi",
    "claudication",
    "peripheral arterial",
    "pad",
    "femoral artery",
    "popliteal",
    "triphasic",
    "biphasic",
    "monophasic",
    "cfa",
    "pfa",
    "pta",
    "pop a",
];

const TIERS: KeywordTiers = KeywordTiers {
    strong: &[
        "lower extremity arterial ultrasound",
        "lower extremity arterial",
        "arterial doppler",
        "arterial duplex",
        "arterial ultrasound report",
    ],
    moderate: &[
        "ankle-brachial index",
        "ankle brachial index",
        "toe-brachial index",
        "claudication",
        "peripheral arterial",
        "triphasic",
        "biphasic",
        "monophasic",
        "cfa",
        "pfa",
        "prox femoral",
        "mid femoral",
        "dist femoral",
        "pop a",
        "popliteal artery",
    ],
    weak: &["femoral", "artery", "arterial", "patent", "velocity", "waveform", "lumen"],
    negative: &["carotid", "venous duplex", "deep vein thrombosis"],
    bases: TierBases::STANDARD,
};

static MEASUREMENTS: &[MeasurementDef] = &[
    MeasurementDef {
        name: "Right Ankle-Brachial Index",
        abbreviation: "ABI_R",
        unit: "",
        patterns: &[
            r"\b(?:right|rt\.?)\s+(?:ABI|ankle[- ]brachial\s+index){SEP}{NUM}",
            r"\b(?:ABI|ankle[- ]brachial\s+index)\s*[,(]?\s*(?:right|rt\.?)\)?{SEP}{NUM}",
        ],
        min: 0.1,
        max: 2.0,
    },
    MeasurementDef {
        name: "Left Ankle-Brachial Index",
        abbreviation: "ABI_L",
        unit: "",
        patterns: &[
            r"\b(?:left|lt\.?)\s+(?:ABI|ankle[- ]brachial\s+index){SEP}{NUM}",
            r"\b(?:ABI|ankle[- ]brachial\s+index)\s*[,(]?\s*(?:left|lt\.?)\)?{SEP}{NUM}",
        ],
        min: 0.1,
        max: 2.0,
    },
    MeasurementDef {
        name: "Ankle-Brachial Index",
        abbreviation: "ABI",
        unit: "",
        // Line-leading only, so sided values are not counted twice.
        patterns: &[r"(?m)^[ \t]*(?:ABI|ankle[- ]brachial\s+index){SEP}(?:(?:is|of)\s+)?{NUM}"],
        min: 0.1,
        max: 2.0,
    },
    MeasurementDef {
        name: "Toe-Brachial Index",
        abbreviation: "TBI",
        unit: "",
        patterns: &[r"\b(?:TBI|toe[- ]brachial\s+index){SEP}{NUM}"],
        min: 0.05,
        max: 1.5,
    },
];

static TABLE: LazyLock<MeasurementTable> = LazyLock::new(|| MeasurementTable::compile(MEASUREMENTS));

static SECTIONS: LazyLock<SectionSplitter> = LazyLock::new(|| {
    SectionSplitter::new(&[
        r"INDICATIONS?|CLINICAL\s+HISTORY",
        r"TECHNIQUE",
        r"RIGHT\s+(?:LEG|LOWER\s+EXTREMITY)",
        r"LEFT\s+(?:LEG|LOWER\s+EXTREMITY)",
        r"FINDINGS?",
        r"IMPRESSIONS?|CONCLUSIONS?|INTERPRETATION|SUMMARY",
    ])
});

const GLOSSARY: &[(&str, &str)] = &[
    (
        "ABI",
        "Ankle-brachial index. Blood pressure at the ankle divided by blood pressure in \
         the arm. Between 1.0 and 1.4 is normal; lower values mean reduced blood flow \
         to the legs.",
    ),
    (
        "TBI",
        "Toe-brachial index. Like the ABI but measured at the big toe. Useful when ankle \
         arteries are too stiff to compress.",
    ),
    (
        "Triphasic",
        "A normal, healthy arterial waveform with three parts per heartbeat.",
    ),
    (
        "Biphasic",
        "A waveform with two parts. It can be normal in older adults or an early sign of \
         narrowing upstream.",
    ),
    (
        "Monophasic",
        "A single-phase waveform, usually a sign of significant narrowing or blockage \
         upstream.",
    ),
    (
        "Claudication",
        "Cramping leg pain when walking that goes away with rest, caused by poor blood \
         flow.",
    ),
    (
        "PAD",
        "Peripheral artery disease. Narrowing of the arteries that supply the legs.",
    ),
    (
        "Noncompressible",
        "Arteries too stiff from calcium to squeeze with a cuff, which makes the ABI read \
         falsely high.",
    ),
];

pub struct ArterialDopplerHandler {
    ranges: RangeTable,
    weights: ScoringWeights,
}

impl ArterialDopplerHandler {
    pub fn new(weights: ScoringWeights) -> Result<Self, RangeDefinitionError> {
        Ok(Self {
            ranges: BundledRanges::Arterial.load()?,
            weights,
        })
    }
}

impl ReportHandler for ArterialDopplerHandler {
    fn test_type_id(&self) -> &str {
        TYPE_ID
    }

    fn display_name(&self) -> &str {
        "Lower Extremity Arterial Ultrasound"
    }

    fn category(&self) -> Category {
        Category::Vascular
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
            specialty: "vascular medicine / cardiology".into(),
            test_type: TYPE_ID.into(),
            category: Category::Vascular,
            guidelines: Some("ACC/AHA 2016 PAD Guidelines".into()),
            explanation_style: "Explain the blood flow in each leg in plain language. \
                                Interpret the waveform types (triphasic, biphasic, \
                                monophasic) and what they mean. Explain the ankle-brachial \
                                index and whether it is normal, then discuss any narrowing \
                                or blockage found."
                .into(),
            interpretation_rules: Some(
                "An ABI above 1.4 means the arteries could not be compressed; do not call \
                 it better than normal."
                    .into(),
            ),
            notes: Vec::new(),
        }
    }
}
