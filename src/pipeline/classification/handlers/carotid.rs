//! Carotid duplex ultrasound, graded by velocity criteria.

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

pub const TYPE_ID: &str = "carotid_doppler";

const KEYWORDS: &[&str] = &[
    "carotid",
    "carotid doppler",
    "carotid ultrasound",
    "carotid duplex",
    "cerebrovascular duplex",
    "carotid artery",
    "internal carotid",
    "common carotid",
    "ica/cca",
    "peak systolic velocity",
    "psv",
    "end diastolic velocity",
    "edv",
    "vertebral artery",
    "plaque",
    "intima-media",
];

const TIERS: KeywordTiers = KeywordTiers {
    strong: &[
        "carotid doppler",
        "carotid duplex",
        "carotid ultrasound",
        "cerebrovascular duplex",
        "carotid artery duplex",
        "carotid artery ultrasound",
    ],
    moderate: &[
        "internal carotid",
        "common carotid",
        "ica/cca",
        "ica/cca ratio",
        "peak systolic velocity",
        "end diastolic velocity",
        "vertebral artery",
        "carotid stenosis",
        "carotid plaque",
        "prox ica",
        "mid ica",
        "dist ica",
        "dist cca",
    ],
    weak: &["carotid", "stenosis", "plaque", "psv", "edv", "antegrade flow", "patent"],
    negative: &["echocardiogram", "venous duplex", "lower extremity"],
    bases: TierBases::STANDARD,
};

static MEASUREMENTS: &[MeasurementDef] = &[
    MeasurementDef {
        name: "ICA Peak Systolic Velocity",
        abbreviation: "ICA_PSV",
        unit: "cm/s",
        patterns: &[
            r"\b(?:ICA|internal\s+carotid(?:\s+artery)?)\s+(?:(?:prox(?:imal)?|mid|dist(?:al)?)\s+)?(?:PSV|peak\s+systolic(?:\s+velocity)?){SEP}{NUM}",
            r"\bpeak\s+systolic\s+velocity\s+(?:in\s+the\s+)?ICA{SEP}(?:(?:is|of)\s+)?{NUM}",
        ],
        min: 10.0,
        max: 700.0,
    },
    MeasurementDef {
        name: "ICA End-Diastolic Velocity",
        abbreviation: "ICA_EDV",
        unit: "cm/s",
        patterns: &[
            r"\b(?:ICA|internal\s+carotid(?:\s+artery)?)\s+(?:(?:prox(?:imal)?|mid|dist(?:al)?)\s+)?(?:EDV|end[- ]diastolic(?:\s+velocity)?){SEP}{NUM}",
            r"\bend[- ]diastolic\s+velocity\s+(?:in\s+the\s+)?ICA{SEP}(?:(?:is|of)\s+)?{NUM}",
        ],
        min: 0.0,
        max: 400.0,
    },
    MeasurementDef {
        name: "ICA/CCA Velocity Ratio",
        abbreviation: "ICA_CCA",
        unit: "",
        patterns: &[r"\bICA\s*/\s*CCA(?:\s+(?:PSV\s+)?(?:velocity\s+)?ratio)?{SEP}{NUM}"],
        min: 0.2,
        max: 15.0,
    },
    MeasurementDef {
        name: "Percent Diameter Stenosis",
        abbreviation: "STENOSIS_PCT",
        unit: "%",
        // Upper-bounded grades ("<50%", "less than 50%") match without a
        // value and are skipped.
        patterns: &[
            r"(?:(?:less\s+than|under|<)\s*\d+|(?:^|[\s(:,])(?:{RANGE}|{NUM}))\s*%\s*(?:diameter\s+)?(?:stenosis|narrowing)",
            r"\bstenosis{SEP}(?:of\s+)?(?:{RANGE}|{NUM})\s*%",
        ],
        min: 1.0,
        max: 100.0,
    },
];

static TABLE: LazyLock<MeasurementTable> = LazyLock::new(|| MeasurementTable::compile(MEASUREMENTS));

static SECTIONS: LazyLock<SectionSplitter> = LazyLock::new(|| {
    SectionSplitter::new(&[
        r"INDICATIONS?|CLINICAL\s+HISTORY",
        r"TECHNIQUE",
        r"RIGHT\s+CAROTID",
        r"LEFT\s+CAROTID",
        r"RIGHT\s+VERTEBRAL",
        r"LEFT\s+VERTEBRAL",
        r"VERTEBRAL\s+ARTER(?:Y|IES)",
        r"FINDINGS?",
        r"IMPRESSIONS?|CONCLUSIONS?|INTERPRETATION|SUMMARY",
    ])
});

const GLOSSARY: &[(&str, &str)] = &[
    (
        "Carotid Arteries",
        "The two large arteries in the neck that carry blood to the brain.",
    ),
    (
        "ICA",
        "Internal carotid artery. The branch that feeds the brain, and the one whose \
         narrowing matters most for stroke risk.",
    ),
    (
        "CCA",
        "Common carotid artery. The main neck artery before it splits into internal and \
         external branches.",
    ),
    (
        "PSV",
        "Peak systolic velocity. The fastest blood speed during a heartbeat. Blood speeds \
         up where an artery narrows, so a high PSV suggests a blockage.",
    ),
    (
        "EDV",
        "End-diastolic velocity. Blood speed between heartbeats. A high value points to a \
         tighter narrowing.",
    ),
    (
        "ICA/CCA Ratio",
        "The internal carotid speed divided by the common carotid speed. It corrects for \
         people whose blood simply flows faster everywhere.",
    ),
    (
        "Plaque",
        "A build-up of fat, cholesterol and calcium in the artery wall.",
    ),
    (
        "Stenosis",
        "Narrowing of an artery, reported as the percentage of the diameter that is \
         blocked.",
    ),
    (
        "Antegrade Flow",
        "Blood moving in the normal direction, toward the brain.",
    ),
];

pub struct CarotidDopplerHandler {
    ranges: RangeTable,
    weights: ScoringWeights,
}

impl CarotidDopplerHandler {
    pub fn new(weights: ScoringWeights) -> Result<Self, RangeDefinitionError> {
        Ok(Self {
            ranges: BundledRanges::Carotid.load()?,
            weights,
        })
    }
}

impl ReportHandler for CarotidDopplerHandler {
    fn test_type_id(&self) -> &str {
        TYPE_ID
    }

    fn display_name(&self) -> &str {
        "Carotid Doppler Ultrasound"
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
            guidelines: Some("SRU Consensus Criteria for Carotid Stenosis".into()),
            explanation_style: "Explain the degree of carotid narrowing, if any, in plain \
                                language. Interpret the flow velocities (PSV, EDV) and the \
                                ICA/CCA ratio and what they mean for stroke risk. Describe \
                                plaque if noted, compare the right and left sides, and say \
                                whether the findings are hemodynamically significant."
                .into(),
            interpretation_rules: None,
            notes: Vec::new(),
        }
    }
}
