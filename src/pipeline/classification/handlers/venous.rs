//! Lower extremity venous duplex: thrombosis screening and reflux studies.

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

pub const TYPE_ID: &str = "venous_duplex";

const KEYWORDS: &[&str] = &[
    "venous duplex",
    "venous ultrasound",
    "venous color duplex",
    "dvt",
    "deep vein thrombosis",
    "venous reflux",
    "saphenous vein",
    "gsv",
    "greater saphenous",
    "lesser saphenous",
    "compressibility",
    "augmentation",
    "reflux time",
];

const TIERS: KeywordTiers = KeywordTiers {
    strong: &[
        "venous color duplex",
        "venous duplex scan",
        "venous duplex",
        "lower extremity venous",
        "venous ultrasound",
        "duplex scan of extremity veins",
    ],
    moderate: &[
        "deep vein thrombosis",
        "dvt",
        "venous reflux",
        "greater saphenous vein",
        "great saphenous vein",
        "gsv prox",
        "gsv mid",
        "gsv dist",
        "reflux time",
        "compressibility",
        "augmentation",
        "93970",
        "93971",
        "saphenous",
    ],
    weak: &["venous", "vein", "reflux", "phasic", "spontaneous flow", "compression"],
    negative: &["carotid", "arterial doppler", "ankle-brachial index"],
    bases: TierBases::STANDARD,
};

static MEASUREMENTS: &[MeasurementDef] = &[
    MeasurementDef {
        name: "Superficial Vein Reflux Time",
        abbreviation: "REFLUX_SUP",
        unit: "s",
        patterns: &[
            r"\b(?:GSV|SSV|great(?:er)?\s+saphenous(?:\s+vein)?|(?:small|lesser)\s+saphenous(?:\s+vein)?)\b[^\n]{0,40}?\breflux(?:\s+time)?{SEP}(?:of\s+)?{NUM}\s*(?:s|sec|seconds)\b",
        ],
        min: 0.0,
        max: 10.0,
    },
    MeasurementDef {
        name: "Deep Vein Reflux Time",
        abbreviation: "REFLUX_DEEP",
        unit: "s",
        patterns: &[
            r"\b(?:common\s+femoral|femoral|popliteal|CFV|FV)(?:\s+vein)?\b[^\n]{0,40}?\breflux(?:\s+time)?{SEP}(?:of\s+)?{NUM}\s*(?:s|sec|seconds)\b",
        ],
        min: 0.0,
        max: 10.0,
    },
    MeasurementDef {
        name: "Great Saphenous Vein Diameter",
        abbreviation: "GSV_DIAM",
        unit: "mm",
        patterns: &[
            r"\b(?:GSV|great(?:er)?\s+saphenous(?:\s+vein)?)\b[^\n]{0,30}?\bdiameter{SEP}(?:of\s+)?{NUM}\s*mm",
            r"\b(?:GSV|great(?:er)?\s+saphenous(?:\s+vein)?)\s+(?:measures\s+)?{NUM}\s*mm",
        ],
        min: 1.0,
        max: 30.0,
    },
];

static TABLE: LazyLock<MeasurementTable> = LazyLock::new(|| MeasurementTable::compile(MEASUREMENTS));

static SECTIONS: LazyLock<SectionSplitter> = LazyLock::new(|| {
    SectionSplitter::new(&[
        r"INDICATIONS?|CLINICAL\s+HISTORY",
        r"TECHNIQUE",
        r"(?:FINDINGS?:?\s*)?RIGHT\s+(?:LEG|LOWER\s+EXTREMITY)",
        r"(?:FINDINGS?:?\s*)?LEFT\s+(?:LEG|LOWER\s+EXTREMITY)",
        r"FINDINGS?",
        r"IMPRESSIONS?|CONCLUSIONS?|INTERPRETATION|SUMMARY",
    ])
});

const GLOSSARY: &[(&str, &str)] = &[
    (
        "DVT",
        "Deep vein thrombosis. A blood clot in one of the deep veins, usually in the leg.",
    ),
    (
        "Compressibility",
        "Whether the vein flattens when the ultrasound transducer presses on it. A healthy vein collapses \
         completely; a vein holding a clot does not.",
    ),
    (
        "Augmentation",
        "The surge of blood flow seen when the calf is squeezed. A normal surge means the \
         vein is open between the calf and the transducer.",
    ),
    (
        "Reflux",
        "Blood flowing backward in a vein because its valves do not close properly.",
    ),
    (
        "Reflux Time",
        "How long blood flows backward after a squeeze. More than half a second in a \
         surface vein, or one second in a deep vein, is abnormal.",
    ),
    (
        "GSV",
        "Great saphenous vein. The long surface vein on the inside of the leg, a common \
         source of varicose veins.",
    ),
    (
        "Phasic Flow",
        "Blood flow that rises and falls with breathing, a sign of an open path back to \
         the heart.",
    ),
];

pub struct VenousDuplexHandler {
    ranges: RangeTable,
    weights: ScoringWeights,
}

impl VenousDuplexHandler {
    pub fn new(weights: ScoringWeights) -> Result<Self, RangeDefinitionError> {
        Ok(Self {
            ranges: BundledRanges::Venous.load()?,
            weights,
        })
    }
}

impl ReportHandler for VenousDuplexHandler {
    fn test_type_id(&self) -> &str {
        TYPE_ID
    }

    fn display_name(&self) -> &str {
        "Lower Extremity Venous Duplex Scan"
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
            guidelines: Some("SVS/AVF Clinical Practice Guidelines".into()),
            explanation_style: "Say first whether any blood clot (DVT) was found. Then \
                                interpret the reflux times and vein diameters, discuss \
                                compressibility and flow patterns, and compare the right and \
                                left legs in plain language."
                .into(),
            interpretation_rules: None,
            notes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::SeverityStatus;

    const REPORT: &str = "LOWER EXTREMITY VENOUS DUPLEX SCAN\n\
        Indication: leg swelling, varicose veins.\n\
        RIGHT LEG: Common femoral vein fully compressible with phasic flow. \
        Common femoral vein reflux time 0.4 s.\n\
        GSV at the knee: diameter 7.8 mm. GSV prox reflux time: 2.1 seconds.\n\
        LEFT LEG: No evidence of deep vein thrombosis.\n\
        \n\
        IMPRESSION:\n\
        1. No deep vein thrombosis in either leg.\n\
        2. Right great saphenous vein reflux.\n";

    fn handler() -> VenousDuplexHandler {
        VenousDuplexHandler::new(ScoringWeights::default()).unwrap()
    }

    #[test]
    fn duplex_title_scores_strong() {
        let er = ExtractionResult::from_text(REPORT);
        assert!(handler().detect(&er) >= 0.7);
    }

    #[test]
    fn parses_reflux_and_diameter() {
        let er = ExtractionResult::from_text(REPORT);
        let report = handler().parse(&er, None, None);
        let get = |a: &str| report.measurements.iter().find(|m| m.abbreviation == a);

        let sup = get("REFLUX_SUP").unwrap();
        assert_eq!(sup.value, 2.1);
        assert_eq!(sup.status, SeverityStatus::ModeratelyAbnormal);

        let deep = get("REFLUX_DEEP").unwrap();
        assert_eq!(deep.value, 0.4);
        assert_eq!(deep.status, SeverityStatus::Normal);

        let diameter = get("GSV_DIAM").unwrap();
        assert_eq!(diameter.value, 7.8);
        assert_eq!(diameter.status, SeverityStatus::ModeratelyAbnormal);

        assert_eq!(report.findings.len(), 2);
    }

    #[test]
    fn thrombosis_screen_without_numbers_warns() {
        let er = ExtractionResult::from_text(
            "Venous duplex, left leg. Veins fully compressible. No DVT.",
        );
        let report = handler().parse(&er, None, None);
        assert!(report.measurements.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }
}
