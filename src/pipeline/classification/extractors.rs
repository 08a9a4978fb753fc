//! Measurement plugins: bone density (WHO T-score classes), mammography
//! (BI-RADS assessment category) and cardiac PET flow quantification.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::enums::{AbnormalityDirection, SeverityStatus, Sex};
use crate::pipeline::extraction::ExtractionResult;
use crate::pipeline::measurements::{
    BundledRanges, ClassificationResult, MeasurementDef, MeasurementTable, RangeTable,
    RawMeasurement, ReferenceRangeInfo,
};

use super::generic::ExtractorPlugin;
use super::handler::classify_all;
use super::types::ParsedMeasurement;

// ═══════════════════════════════════════════
// DEXA
// ═══════════════════════════════════════════

const WHO_SOURCE: &str = "WHO Classification";
const T_SCORE_RANGE: &str = ">= -1.0";
const Z_SCORE_RANGE: &str = ">= -2.0";

static DEXA_SITES: &[MeasurementDef] = &[
    MeasurementDef {
        name: "Lumbar Spine T-Score",
        abbreviation: "T_SCORE_SPINE",
        unit: "",
        patterns: &[
            r"\b(?:lumbar\s+spine|L1[- ]?L4|spine)(?:\s*\([^)\n]{0,20}\))?\s*(?:t[- ]?score|t\s*=)[\s:]*{SNUM}",
        ],
        min: -10.0,
        max: 10.0,
    },
    MeasurementDef {
        name: "Femoral Neck T-Score",
        abbreviation: "T_SCORE_FEMORAL_NECK",
        unit: "",
        patterns: &[
            r"\b(?:femoral\s+neck|fem\.?\s*neck)(?:\s*\([^)\n]{0,20}\))?\s*(?:t[- ]?score|t\s*=)[\s:]*{SNUM}",
        ],
        min: -10.0,
        max: 10.0,
    },
    MeasurementDef {
        name: "Total Hip T-Score",
        abbreviation: "T_SCORE_TOTAL_HIP",
        unit: "",
        patterns: &[
            r"\b(?:total\s+hip|hip)(?:\s*\([^)\n]{0,20}\))?\s*(?:t[- ]?score|t\s*=)[\s:]*{SNUM}",
        ],
        min: -10.0,
        max: 10.0,
    },
];

static DEXA_GENERIC_T: &[MeasurementDef] = &[MeasurementDef {
    name: "T-Score",
    abbreviation: "T_SCORE",
    unit: "",
    patterns: &[r"\bt[- ]?score[\s:]*{SNUM}"],
    min: -10.0,
    max: 10.0,
}];

static DEXA_OTHER: &[MeasurementDef] = &[
    MeasurementDef {
        name: "Z-Score",
        abbreviation: "Z_SCORE",
        unit: "",
        patterns: &[r"\bz[- ]?score[\s:]*{SNUM}"],
        min: -10.0,
        max: 10.0,
    },
    MeasurementDef {
        name: "Bone Mineral Density",
        abbreviation: "BMD",
        unit: "g/cm²",
        patterns: &[r"\bBMD[\s:]*{NUM}(?:\s*g/cm(?:2|²))?"],
        min: 0.1,
        max: 3.0,
    },
];

static SITE_TABLE: LazyLock<MeasurementTable> =
    LazyLock::new(|| MeasurementTable::compile(DEXA_SITES));
static GENERIC_T_TABLE: LazyLock<MeasurementTable> =
    LazyLock::new(|| MeasurementTable::compile(DEXA_GENERIC_T));
static OTHER_TABLE: LazyLock<MeasurementTable> =
    LazyLock::new(|| MeasurementTable::compile(DEXA_OTHER));

const DEXA_GLOSSARY: &[(&str, &str)] = &[
    (
        "T-score",
        "Compares your bone density to the average healthy young adult. 0 means equal \
         to the average; negative numbers mean lower bone density.",
    ),
    (
        "Z-score",
        "Compares your bone density to people of your age, sex and body size. A low \
         Z-score can point to a cause of bone loss other than aging.",
    ),
    ("BMD", "Bone mineral density: how much calcium and other minerals a section of bone holds."),
    (
        "Osteopenia",
        "Bone density lower than normal but not low enough to be osteoporosis. \
         T-score between -1.0 and -2.5.",
    ),
    ("Osteoporosis", "Weak, brittle bones. T-score of -2.5 or lower."),
    ("Lumbar spine", "The lower back region of the spine (L1-L4)."),
    ("Femoral neck", "The narrow part of the thigh bone just below the ball of the hip joint."),
    ("Total hip", "The whole hip region, including the femoral neck."),
];

/// WHO classes: normal at or above -1.0, osteopenia above -2.5,
/// osteoporosis at or below -2.5.
pub fn classify_t_score(value: f64) -> ClassificationResult {
    let (status, direction) = if value >= -1.0 {
        (SeverityStatus::Normal, AbnormalityDirection::Normal)
    } else if value > -2.5 {
        (SeverityStatus::MildlyAbnormal, AbnormalityDirection::BelowNormal)
    } else {
        (SeverityStatus::ModeratelyAbnormal, AbnormalityDirection::BelowNormal)
    };
    ClassificationResult {
        status,
        direction,
        reference_range: T_SCORE_RANGE.to_string(),
    }
}

pub fn classify_z_score(value: f64) -> ClassificationResult {
    let (status, direction) = if value >= -2.0 {
        (SeverityStatus::Normal, AbnormalityDirection::Normal)
    } else {
        (SeverityStatus::MildlyAbnormal, AbnormalityDirection::BelowNormal)
    };
    ClassificationResult {
        status,
        direction,
        reference_range: Z_SCORE_RANGE.to_string(),
    }
}

fn classify_dexa(raw: RawMeasurement) -> ParsedMeasurement {
    let classification = match raw.abbreviation.as_str() {
        "Z_SCORE" => classify_z_score(raw.value),
        "BMD" => ClassificationResult {
            status: SeverityStatus::Undetermined,
            direction: AbnormalityDirection::Normal,
            reference_range: "Varies by site and demographics".to_string(),
        },
        _ => classify_t_score(raw.value),
    };
    ParsedMeasurement::from_raw(raw, classification)
}

/// Site-specific T-scores, or a bare T-score when no site is named, then the
/// Z-score and BMD.
pub fn extract_dexa(extraction: &ExtractionResult, _sex: Option<Sex>) -> Vec<ParsedMeasurement> {
    let text = &extraction.full_text;
    let mut raw = SITE_TABLE.extract(text, extraction);
    if raw.is_empty() {
        raw = GENERIC_T_TABLE.extract(text, extraction);
    }
    raw.extend(OTHER_TABLE.extract(text, extraction));
    raw.into_iter().map(classify_dexa).collect()
}

fn dexa_ranges() -> BTreeMap<String, ReferenceRangeInfo> {
    let t_score = || ReferenceRangeInfo {
        normal_min: Some(-1.0),
        normal_max: None,
        unit: String::new(),
        source: WHO_SOURCE.to_string(),
    };
    let mut ranges = BTreeMap::new();
    for abbreviation in ["T_SCORE_SPINE", "T_SCORE_FEMORAL_NECK", "T_SCORE_TOTAL_HIP", "T_SCORE"] {
        ranges.insert(abbreviation.to_string(), t_score());
    }
    ranges.insert(
        "Z_SCORE".to_string(),
        ReferenceRangeInfo {
            normal_min: Some(-2.0),
            normal_max: None,
            unit: String::new(),
            source: "Age-matched reference".to_string(),
        },
    );
    ranges
}

pub const DEXA: ExtractorPlugin = ExtractorPlugin {
    extract: extract_dexa,
    reference_ranges: dexa_ranges,
    glossary: DEXA_GLOSSARY,
};

// ═══════════════════════════════════════════
// Mammography
// ═══════════════════════════════════════════

const BIRADS_RANGE: &str = "1-2 (normal)";

/// Tried in order; the first pattern with a usable match wins.
static BIRADS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bbi[- ]?rads\s*(?:category|cat\.?)?[\s:]*(?P<category>[0-6])(?:\s*(?P<sub>[abc])\b)?",
        r"(?i)\b(?:final\s+)?assessment[\s:]*(?:category\s*)?(?P<category>[0-6])(?:\s*(?P<sub>[abc])\b)?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid BI-RADS pattern"))
    .collect()
});

const MAMMOGRAPHY_GLOSSARY: &[(&str, &str)] = &[
    (
        "BI-RADS",
        "Breast Imaging Reporting and Data System: a standard way to describe mammogram \
         findings and recommend next steps.",
    ),
    ("BI-RADS 0", "Incomplete. More imaging is needed for a full assessment."),
    ("BI-RADS 1", "Negative. No significant findings; routine screening."),
    ("BI-RADS 2", "Benign. A non-cancerous finding such as a simple cyst; routine screening."),
    (
        "BI-RADS 3",
        "Probably benign. Very low chance of cancer (under 2%); short-interval follow-up.",
    ),
    (
        "BI-RADS 4",
        "Suspicious. Biopsy recommended. Split into 4A (low), 4B (moderate) and 4C (high \
         suspicion).",
    ),
    ("BI-RADS 5", "Highly suggestive of malignancy (over 95%). Biopsy strongly recommended."),
    ("BI-RADS 6", "Known cancer, confirmed by an earlier biopsy."),
    (
        "Calcifications",
        "Small calcium deposits in breast tissue. Most are benign, though some patterns \
         need a closer look.",
    ),
    (
        "Architectural distortion",
        "Breast tissue pulled into an unusual arrangement, which can signal an underlying \
         abnormality.",
    ),
];

/// Category 0 is incomplete, 1 and 2 are normal, 3 is probably benign,
/// 4 suspicious, 5 and 6 malignant.
pub fn classify_birads(category: u8) -> ClassificationResult {
    let (status, direction) = match category {
        1 | 2 => (SeverityStatus::Normal, AbnormalityDirection::Normal),
        3 => (SeverityStatus::MildlyAbnormal, AbnormalityDirection::AboveNormal),
        4 => (SeverityStatus::ModeratelyAbnormal, AbnormalityDirection::AboveNormal),
        5 | 6 => (SeverityStatus::SeverelyAbnormal, AbnormalityDirection::AboveNormal),
        _ => (SeverityStatus::Undetermined, AbnormalityDirection::Normal),
    };
    ClassificationResult {
        status,
        direction,
        reference_range: BIRADS_RANGE.to_string(),
    }
}

/// The first BI-RADS category in the report. Subcategories 4A/4B/4C are
/// encoded as 4.1/4.2/4.3.
pub fn extract_mammography(
    extraction: &ExtractionResult,
    _sex: Option<Sex>,
) -> Vec<ParsedMeasurement> {
    let text = &extraction.full_text;
    for pattern in BIRADS_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            let (Some(whole), Some(category)) = (caps.get(0), caps.name("category")) else {
                continue;
            };
            // "Assessment 2021" is a year, not category 2.
            if text[whole.end()..].starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            let Ok(category) = category.as_str().parse::<u8>() else {
                continue;
            };
            let sub = caps
                .name("sub")
                .and_then(|s| s.as_str().chars().next())
                .map(|c| c.to_ascii_uppercase());

            let (name, value) = match sub {
                Some(letter) => (
                    format!("BI-RADS {category}{letter}"),
                    f64::from(category) + f64::from(letter as u8 - b'A' + 1) / 10.0,
                ),
                None => (format!("BI-RADS {category}"), f64::from(category)),
            };
            let raw_text = whole.as_str().trim().to_string();
            let raw = RawMeasurement {
                name,
                abbreviation: "BIRADS".to_string(),
                value,
                unit: String::new(),
                page_number: extraction.page_containing(&raw_text),
                raw_text,
                offset: Some(whole.start()),
            };
            return vec![ParsedMeasurement::from_raw(raw, classify_birads(category))];
        }
    }
    Vec::new()
}

fn mammography_ranges() -> BTreeMap<String, ReferenceRangeInfo> {
    BTreeMap::from([(
        "BIRADS".to_string(),
        ReferenceRangeInfo {
            normal_min: None,
            normal_max: Some(2.0),
            unit: String::new(),
            source: "ACR BI-RADS 5th Edition".to_string(),
        },
    )])
}

pub const MAMMOGRAPHY: ExtractorPlugin = ExtractorPlugin {
    extract: extract_mammography,
    reference_ranges: mammography_ranges,
    glossary: MAMMOGRAPHY_GLOSSARY,
};

// ═══════════════════════════════════════════
// Cardiac PET
// ═══════════════════════════════════════════

static PET_MEASUREMENTS: &[MeasurementDef] = &[
    MeasurementDef {
        name: "Global MBF (Rest)",
        abbreviation: "MBF_Rest",
        unit: "mL/min/g",
        patterns: &[
            r"\b(?:global|overall)\s+rest(?:ing)?\s+(?:MBF|myocardial\s+blood\s+flow){SEP}{NUM}",
            r"\brest(?:ing)?\s+(?:global\s+)?(?:MBF|myocardial\s+blood\s+flow){SEP}{NUM}",
            r"\bMBF\s+(?:at\s+)?rest{SEP}{NUM}",
        ],
        min: 0.1,
        max: 5.0,
    },
    MeasurementDef {
        name: "Global MBF (Stress)",
        abbreviation: "MBF_Stress",
        unit: "mL/min/g",
        patterns: &[
            r"\b(?:global|overall)\s+stress\s+(?:MBF|myocardial\s+blood\s+flow){SEP}{NUM}",
            r"\bstress\s+(?:global\s+)?(?:MBF|myocardial\s+blood\s+flow){SEP}{NUM}",
            r"\bMBF\s+(?:at\s+)?stress{SEP}{NUM}",
        ],
        min: 0.1,
        max: 8.0,
    },
    MeasurementDef {
        name: "Global CFR",
        abbreviation: "CFR_Global",
        unit: "",
        // A bare "CFR" only counts at the start of a line or sentence, so a
        // territorial "LAD CFR" is not read as the global value.
        patterns: &[
            r"\b(?:global|overall)\s+(?:CFR|coronary\s+flow\s+(?:reserve|capacity)){SEP}{NUM}",
            r"(?m)(?:^|[.;])[ \t]*(?:CFR|coronary\s+flow\s+(?:reserve|capacity)){SEP}{NUM}",
        ],
        min: 0.5,
        max: 6.0,
    },
    MeasurementDef {
        name: "LAD CFR",
        abbreviation: "CFR_LAD",
        unit: "",
        patterns: &[
            r"\bLAD\s+(?:territory\s+)?(?:CFR|coronary\s+flow\s+(?:reserve|capacity)){SEP}{NUM}",
            r"\bleft\s+anterior\s+descending\s+(?:CFR|flow\s+reserve){SEP}{NUM}",
        ],
        min: 0.5,
        max: 6.0,
    },
    MeasurementDef {
        name: "LCx CFR",
        abbreviation: "CFR_LCx",
        unit: "",
        patterns: &[
            r"\b(?:LCx|circumflex)\s+(?:territory\s+)?(?:CFR|coronary\s+flow\s+(?:reserve|capacity)){SEP}{NUM}",
        ],
        min: 0.5,
        max: 6.0,
    },
    MeasurementDef {
        name: "RCA CFR",
        abbreviation: "CFR_RCA",
        unit: "",
        patterns: &[
            r"\b(?:RCA|right\s+coronary)\s+(?:territory\s+)?(?:CFR|coronary\s+flow\s+(?:reserve|capacity)){SEP}{NUM}",
        ],
        min: 0.5,
        max: 6.0,
    },
    MeasurementDef {
        name: "Summed Stress Score",
        abbreviation: "SSS",
        unit: "",
        patterns: &[r"\b(?:summed\s+stress\s+score|SSS){SEP}{NUM}"],
        min: 0.0,
        max: 80.0,
    },
    MeasurementDef {
        name: "Summed Rest Score",
        abbreviation: "SRS",
        unit: "",
        patterns: &[r"\b(?:summed\s+rest\s+score|SRS){SEP}{NUM}"],
        min: 0.0,
        max: 80.0,
    },
    MeasurementDef {
        name: "Summed Difference Score",
        abbreviation: "SDS",
        unit: "",
        patterns: &[r"\b(?:summed\s+difference\s+score|SDS){SEP}{NUM}"],
        min: 0.0,
        max: 80.0,
    },
    MeasurementDef {
        name: "TID Ratio",
        abbreviation: "TID",
        unit: "",
        patterns: &[r"\b(?:TID|transient\s+ischemic\s+dilation)(?:\s+ratio)?{SEP}{NUM}"],
        min: 0.5,
        max: 2.5,
    },
];

static PET_TABLE: LazyLock<MeasurementTable> =
    LazyLock::new(|| MeasurementTable::compile(PET_MEASUREMENTS));

static PET_RANGES: LazyLock<Option<RangeTable>> = LazyLock::new(|| {
    BundledRanges::CardiacPet
        .load()
        .inspect_err(|e| tracing::error!(error = %e, "Cardiac PET reference table rejected"))
        .ok()
});

const CARDIAC_PET_GLOSSARY: &[(&str, &str)] = &[
    (
        "MBF",
        "Myocardial blood flow: how much blood reaches each gram of heart muscle per \
         minute, in mL/min/g. Measured at rest and again under stress.",
    ),
    (
        "CFR",
        "Coronary flow reserve: stress blood flow divided by resting blood flow. Above \
         2.0 is generally normal; lower values suggest narrowed arteries or small-vessel \
         disease.",
    ),
    (
        "Coronary Flow Capacity",
        "A combined grade built from stress flow and flow reserve together. It predicts \
         outcomes better than either number alone.",
    ),
    (
        "Rb-82",
        "Rubidium-82, a radioactive tracer injected into a vein. Heart muscle takes it up \
         in proportion to its blood supply.",
    ),
    (
        "N-13 Ammonia",
        "Another PET tracer for measuring heart blood flow, with a longer half-life than \
         rubidium.",
    ),
    (
        "PET/CT",
        "A PET scan for blood flow combined with a CT scan for anatomy. The CT part may \
         also give a coronary calcium score.",
    ),
    (
        "Perfusion Defect",
        "An area of heart muscle receiving less blood than normal.",
    ),
    (
        "Reversible Defect",
        "A defect seen under stress but not at rest: living muscle that is short of blood \
         during exertion (ischemia).",
    ),
    (
        "Fixed Defect",
        "A defect seen at rest and under stress, which may mean scar from an old heart \
         attack.",
    ),
    (
        "SSS",
        "Summed stress score. Adds up how abnormal each heart segment looks under stress. \
         0 to 3 is normal.",
    ),
    ("SRS", "Summed rest score. The same tally at rest; higher values suggest scar."),
    (
        "SDS",
        "Summed difference score: stress minus rest. Higher values mean more ischemia.",
    ),
    (
        "TID",
        "Transient ischemic dilation. The heart chamber looks larger under stress than at \
         rest; a ratio above 1.2 can point to widespread coronary disease.",
    ),
    (
        "Polar Map",
        "A bull's-eye picture showing blood flow to every region of the heart at once.",
    ),
];

/// Flow, reserve and perfusion scores, classified against the bundled PET
/// table. Values stay undetermined if that table cannot be loaded.
pub fn extract_cardiac_pet(
    extraction: &ExtractionResult,
    sex: Option<Sex>,
) -> Vec<ParsedMeasurement> {
    let raw = PET_TABLE.extract(&extraction.full_text, extraction);
    match PET_RANGES.as_ref() {
        Some(ranges) => classify_all(ranges, raw, sex),
        None => raw
            .into_iter()
            .map(|m| ParsedMeasurement::from_raw(m, ClassificationResult::undetermined()))
            .collect(),
    }
}

fn cardiac_pet_ranges() -> BTreeMap<String, ReferenceRangeInfo> {
    PET_RANGES
        .as_ref()
        .map(RangeTable::reference_info)
        .unwrap_or_default()
}

pub const CARDIAC_PET: ExtractorPlugin = ExtractorPlugin {
    extract: extract_cardiac_pet,
    reference_ranges: cardiac_pet_ranges,
    glossary: CARDIAC_PET_GLOSSARY,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn dexa(text: &str) -> Vec<ParsedMeasurement> {
        extract_dexa(&ExtractionResult::from_text(text), None)
    }

    fn birads(text: &str) -> Option<ParsedMeasurement> {
        extract_mammography(&ExtractionResult::from_text(text), None)
            .into_iter()
            .next()
    }

    #[test]
    fn t_score_who_classes() {
        assert_eq!(classify_t_score(-1.0).status, SeverityStatus::Normal);
        assert_eq!(classify_t_score(-1.8).status, SeverityStatus::MildlyAbnormal);
        assert_eq!(classify_t_score(-2.5).status, SeverityStatus::ModeratelyAbnormal);
        assert_eq!(classify_t_score(-3.2).direction, AbnormalityDirection::BelowNormal);
        assert_eq!(classify_t_score(0.4).reference_range, ">= -1.0");
    }

    #[test]
    fn z_score_below_minus_two_is_mild() {
        assert_eq!(classify_z_score(-2.0).status, SeverityStatus::Normal);
        assert_eq!(classify_z_score(-2.1).status, SeverityStatus::MildlyAbnormal);
    }

    #[test]
    fn extracts_site_scores_and_skips_generic() {
        let found = dexa(
            "DEXA BONE DENSITY\n\
             Lumbar spine (L1-L4) T-score: -2.7\n\
             Femoral neck T-score: -1.8\n\
             Total hip T-score -0.5\n\
             Z-score: -1.2\n\
             BMD: 0.812 g/cm2\n",
        );
        let abbrs: Vec<_> = found.iter().map(|m| m.abbreviation.as_str()).collect();
        assert_eq!(
            abbrs,
            vec!["T_SCORE_SPINE", "T_SCORE_FEMORAL_NECK", "T_SCORE_TOTAL_HIP", "Z_SCORE", "BMD"]
        );
        assert_eq!(found[0].value, -2.7);
        assert_eq!(found[0].status, SeverityStatus::ModeratelyAbnormal);
        assert_eq!(found[1].status, SeverityStatus::MildlyAbnormal);
        assert_eq!(found[2].status, SeverityStatus::Normal);
        assert_eq!(found[3].status, SeverityStatus::Normal);
        assert_eq!(found[4].status, SeverityStatus::Undetermined);
        assert_eq!(found[4].unit, "g/cm²");
    }

    #[test]
    fn bare_t_score_used_without_site() {
        let found = dexa("Bone densitometry. T-score - 3.1 consistent with osteoporosis.");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].abbreviation, "T_SCORE");
        assert_eq!(found[0].value, -3.1);
    }

    #[test]
    fn birads_category_with_subcategory() {
        let m = birads("SCREENING MAMMOGRAM\nIMPRESSION: BI-RADS Category 4B: Suspicious abnormality.")
            .unwrap();
        assert_eq!(m.name, "BI-RADS 4B");
        assert!((m.value - 4.2).abs() < 1e-9);
        assert_eq!(m.status, SeverityStatus::ModeratelyAbnormal);
        assert_eq!(m.reference_range, "1-2 (normal)");
    }

    #[test]
    fn benign_word_is_not_a_subcategory() {
        let m = birads("Mammogram. BI-RADS 2 benign findings.").unwrap();
        assert_eq!(m.name, "BI-RADS 2");
        assert_eq!(m.status, SeverityStatus::Normal);
    }

    #[test]
    fn assessment_fallback_and_incomplete() {
        let m = birads("Diagnostic mammogram.\nFinal assessment: 0, additional imaging needed.").unwrap();
        assert_eq!(m.value, 0.0);
        assert_eq!(m.status, SeverityStatus::Undetermined);
    }

    #[test]
    fn year_after_assessment_is_ignored() {
        assert!(birads("Assessment 2021 reviewed.").is_none());
        let m = birads("BIRADS: 5").unwrap();
        assert_eq!(m.status, SeverityStatus::SeverelyAbnormal);
    }

    #[test]
    fn cardiac_pet_flow_and_reserve() {
        let found = extract_cardiac_pet(
            &ExtractionResult::from_text(
                "Rb-82 PET/CT MYOCARDIAL PERFUSION\n\
                 Global rest MBF 0.9 mL/min/g. Global stress MBF 1.7 mL/min/g.\n\
                 Coronary flow reserve: 1.9\n\
                 LAD CFR 1.3, LCx CFR 2.2, RCA CFR 2.4\n\
                 Summed stress score: 6. SDS 3. TID ratio 1.05\n",
            ),
            None,
        );
        let get = |a: &str| found.iter().find(|m| m.abbreviation == a).unwrap();

        assert_eq!(get("MBF_Rest").status, SeverityStatus::Normal);
        assert_eq!(get("MBF_Stress").value, 1.7);
        assert_eq!(get("MBF_Stress").status, SeverityStatus::MildlyAbnormal);
        assert_eq!(get("CFR_Global").value, 1.9);
        assert_eq!(get("CFR_LAD").value, 1.3);
        assert_eq!(get("CFR_LAD").status, SeverityStatus::ModeratelyAbnormal);
        assert_eq!(get("CFR_LAD").direction, AbnormalityDirection::BelowNormal);
        assert_eq!(get("CFR_RCA").status, SeverityStatus::Normal);
        assert_eq!(get("SSS").status, SeverityStatus::MildlyAbnormal);
        assert_eq!(get("TID").status, SeverityStatus::Normal);
    }

    #[test]
    fn territorial_reserve_is_not_global() {
        let found = extract_cardiac_pet(
            &ExtractionResult::from_text("Regional values: LAD CFR 1.4. RCA CFR 2.3."),
            None,
        );
        assert!(found.iter().all(|m| m.abbreviation != "CFR_Global"));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn plugins_expose_ranges_and_glossary() {
        assert_eq!((DEXA.reference_ranges)()["T_SCORE"].normal_min, Some(-1.0));
        assert_eq!((MAMMOGRAPHY.reference_ranges)()["BIRADS"].normal_max, Some(2.0));
        assert!(MAMMOGRAPHY.glossary.iter().any(|(term, _)| *term == "BI-RADS 4"));
        assert_eq!((CARDIAC_PET.reference_ranges)()["CFR_Global"].normal_min, Some(2.0));
        assert!(CARDIAC_PET.glossary.iter().any(|(term, _)| *term == "MBF"));
    }
}
