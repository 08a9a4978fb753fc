//! Tiered severity classification against clinical reference ranges.
//!
//! A table holds one union range per abbreviation and optional sex-specific
//! overrides. Lookups try the patient's sex first and fall back to the union
//! range; an abbreviation with no range at all is `Undetermined`, never
//! silently normal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::enums::{AbnormalityDirection, SeverityStatus, Sex};

pub const NO_REFERENCE_RANGE: &str = "No reference range available";

/// A reference table whose thresholds break the tier ordering. This is a bug
/// in the bundled data, never a runtime condition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RangeDefinitionError {
    #[error("Malformed reference table {0}: {1}")]
    Parse(String, String),

    #[error("{abbreviation}: {field} is not a finite number")]
    NotFinite {
        abbreviation: String,
        field: &'static str,
    },

    #[error("{abbreviation}: {lower} ({lower_value}) exceeds {upper} ({upper_value})")]
    OutOfOrder {
        abbreviation: String,
        lower: &'static str,
        lower_value: f64,
        upper: &'static str,
        upper_value: f64,
    },
}

/// Per-abbreviation classification bounds.
///
/// Values inside `[normal_min, normal_max]` are normal. Above the normal band
/// `mild_max`, `moderate_max` and `severe_high` step the severity up; below it
/// `mild_min`, `moderate_min` and `severe_low` do the same.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeThresholds {
    pub normal_min: Option<f64>,
    pub normal_max: Option<f64>,
    pub mild_min: Option<f64>,
    pub mild_max: Option<f64>,
    pub moderate_min: Option<f64>,
    pub moderate_max: Option<f64>,
    pub severe_low: Option<f64>,
    pub severe_high: Option<f64>,
    pub unit: String,
}

impl RangeThresholds {
    /// Thresholds in ascending order. Every present value must be
    /// non-decreasing along this chain for classification to be monotonic.
    fn chain(&self) -> [(&'static str, Option<f64>); 8] {
        [
            ("severe_low", self.severe_low),
            ("moderate_min", self.moderate_min),
            ("mild_min", self.mild_min),
            ("normal_min", self.normal_min),
            ("normal_max", self.normal_max),
            ("mild_max", self.mild_max),
            ("moderate_max", self.moderate_max),
            ("severe_high", self.severe_high),
        ]
    }

    /// Check the normal ⊆ mild ⊆ moderate ⊆ severe nesting.
    pub fn validate(&self, abbreviation: &str) -> Result<(), RangeDefinitionError> {
        let mut previous: Option<(&'static str, f64)> = None;
        for (field, value) in self.chain() {
            let Some(value) = value else { continue };
            if !value.is_finite() {
                return Err(RangeDefinitionError::NotFinite {
                    abbreviation: abbreviation.to_string(),
                    field,
                });
            }
            if let Some((lower, lower_value)) = previous {
                if lower_value > value {
                    return Err(RangeDefinitionError::OutOfOrder {
                        abbreviation: abbreviation.to_string(),
                        lower,
                        lower_value,
                        upper: field,
                        upper_value: value,
                    });
                }
            }
            previous = Some((field, value));
        }
        Ok(())
    }

    /// Human-readable normal range: "3.8-5.8 cm", ">= 52 %", "<= 34 mL/m2".
    pub fn format_range(&self) -> String {
        let unit = if self.unit.is_empty() {
            String::new()
        } else {
            format!(" {}", self.unit)
        };
        match (self.normal_min, self.normal_max) {
            (Some(min), Some(max)) => format!("{min}-{max}{unit}"),
            (Some(min), None) => format!(">= {min}{unit}"),
            (None, Some(max)) => format!("<= {max}{unit}"),
            (None, None) => "N/A".to_string(),
        }
    }

    pub fn classify(&self, value: f64) -> (SeverityStatus, AbnormalityDirection) {
        if self.normal_max.is_some_and(|max| value > max) {
            return (self.classify_above(value), AbnormalityDirection::AboveNormal);
        }
        if self.normal_min.is_some_and(|min| value < min) {
            return (self.classify_below(value), AbnormalityDirection::BelowNormal);
        }
        (SeverityStatus::Normal, AbnormalityDirection::Normal)
    }

    fn classify_above(&self, value: f64) -> SeverityStatus {
        if self.severe_high.is_some_and(|t| value >= t)
            || self.moderate_max.is_some_and(|t| value > t)
        {
            SeverityStatus::SeverelyAbnormal
        } else if self.mild_max.is_some_and(|t| value > t) {
            SeverityStatus::ModeratelyAbnormal
        } else {
            SeverityStatus::MildlyAbnormal
        }
    }

    fn classify_below(&self, value: f64) -> SeverityStatus {
        if self.severe_low.is_some_and(|t| value <= t)
            || self.moderate_min.is_some_and(|t| value < t)
        {
            SeverityStatus::SeverelyAbnormal
        } else if self.mild_min.is_some_and(|t| value < t) {
            SeverityStatus::ModeratelyAbnormal
        } else {
            SeverityStatus::MildlyAbnormal
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SexRanges {
    #[serde(default)]
    pub male: Option<RangeThresholds>,
    #[serde(default)]
    pub female: Option<RangeThresholds>,
}

impl SexRanges {
    fn for_sex(&self, sex: Sex) -> Option<&RangeThresholds> {
        match sex {
            Sex::Male => self.male.as_ref(),
            Sex::Female => self.female.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub status: SeverityStatus,
    pub direction: AbnormalityDirection,
    pub reference_range: String,
}

impl ClassificationResult {
    pub fn undetermined() -> Self {
        Self {
            status: SeverityStatus::Undetermined,
            direction: AbnormalityDirection::Normal,
            reference_range: NO_REFERENCE_RANGE.to_string(),
        }
    }
}

/// Normal bounds exposed to the explanation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRangeInfo {
    pub normal_min: Option<f64>,
    pub normal_max: Option<f64>,
    pub unit: String,
    pub source: String,
}

/// Reference ranges for one report family, loaded from bundled JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeTable {
    pub source: String,
    pub ranges: BTreeMap<String, RangeThresholds>,
    #[serde(default)]
    pub sex_stratified: BTreeMap<String, SexRanges>,
}

impl RangeTable {
    /// Parse and validate a bundled table.
    pub fn from_json(name: &str, json: &str) -> Result<Self, RangeDefinitionError> {
        let table: Self = serde_json::from_str(json)
            .map_err(|e| RangeDefinitionError::Parse(name.to_string(), e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), RangeDefinitionError> {
        for (abbreviation, range) in &self.ranges {
            range.validate(abbreviation)?;
        }
        for (abbreviation, by_sex) in &self.sex_stratified {
            for range in [&by_sex.male, &by_sex.female].into_iter().flatten() {
                range.validate(abbreviation)?;
            }
        }
        Ok(())
    }

    /// Sex-specific range when one exists, else the union range.
    pub fn lookup(&self, abbreviation: &str, sex: Option<Sex>) -> Option<&RangeThresholds> {
        sex.and_then(|sex| {
            self.sex_stratified
                .get(abbreviation)
                .and_then(|by_sex| by_sex.for_sex(sex))
        })
        .or_else(|| self.ranges.get(abbreviation))
    }

    pub fn classify(&self, abbreviation: &str, value: f64, sex: Option<Sex>) -> ClassificationResult {
        match self.lookup(abbreviation, sex) {
            Some(range) => {
                let (status, direction) = range.classify(value);
                ClassificationResult {
                    status,
                    direction,
                    reference_range: range.format_range(),
                }
            }
            None => ClassificationResult::undetermined(),
        }
    }

    /// Union ranges keyed by abbreviation.
    pub fn reference_info(&self) -> BTreeMap<String, ReferenceRangeInfo> {
        self.ranges
            .iter()
            .map(|(abbreviation, range)| {
                (
                    abbreviation.clone(),
                    ReferenceRangeInfo {
                        normal_min: range.normal_min,
                        normal_max: range.normal_max,
                        unit: range.unit.clone(),
                        source: self.source.clone(),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lvidd() -> RangeThresholds {
        RangeThresholds {
            normal_min: Some(3.8),
            normal_max: Some(5.8),
            mild_min: Some(3.5),
            mild_max: Some(6.1),
            moderate_min: Some(3.2),
            moderate_max: Some(6.8),
            severe_low: Some(3.2),
            severe_high: Some(6.8),
            unit: "cm".into(),
        }
    }

    fn lvef_table() -> RangeTable {
        RangeTable::from_json(
            "test",
            r#"{
                "source": "test",
                "ranges": {
                    "LVEF": {"unit": "%", "normal_min": 52.0, "mild_min": 41.0, "moderate_min": 30.0, "severe_low": 30.0}
                },
                "sex_stratified": {
                    "LVEF": {
                        "male": {"unit": "%", "normal_min": 52.0, "mild_min": 41.0, "moderate_min": 30.0, "severe_low": 30.0},
                        "female": {"unit": "%", "normal_min": 54.0, "mild_min": 41.0, "moderate_min": 30.0, "severe_low": 30.0}
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn classify_normal_value() {
        let (status, direction) = lvidd().classify(4.8);
        assert_eq!(status, SeverityStatus::Normal);
        assert_eq!(direction, AbnormalityDirection::Normal);
    }

    #[test]
    fn classify_bounds_are_inclusive_normal() {
        assert_eq!(lvidd().classify(3.8).0, SeverityStatus::Normal);
        assert_eq!(lvidd().classify(5.8).0, SeverityStatus::Normal);
    }

    #[test]
    fn classify_above_tiers() {
        let r = lvidd();
        assert_eq!(r.classify(6.0), (SeverityStatus::MildlyAbnormal, AbnormalityDirection::AboveNormal));
        assert_eq!(r.classify(6.5).0, SeverityStatus::ModeratelyAbnormal);
        assert_eq!(r.classify(6.8).0, SeverityStatus::SeverelyAbnormal);
        assert_eq!(r.classify(9.0).0, SeverityStatus::SeverelyAbnormal);
    }

    #[test]
    fn classify_below_tiers() {
        let r = lvidd();
        assert_eq!(r.classify(3.6), (SeverityStatus::MildlyAbnormal, AbnormalityDirection::BelowNormal));
        assert_eq!(r.classify(3.3).0, SeverityStatus::ModeratelyAbnormal);
        assert_eq!(r.classify(3.2).0, SeverityStatus::SeverelyAbnormal);
    }

    #[test]
    fn one_sided_range_only_flags_one_direction() {
        let lavi = RangeThresholds {
            normal_max: Some(34.0),
            mild_max: Some(41.0),
            moderate_max: Some(48.0),
            severe_high: Some(48.0),
            unit: "mL/m2".into(),
            ..Default::default()
        };
        assert_eq!(lavi.classify(5.0).0, SeverityStatus::Normal);
        assert_eq!(lavi.classify(45.0).0, SeverityStatus::ModeratelyAbnormal);
    }

    #[test]
    fn format_range_variants() {
        assert_eq!(lvidd().format_range(), "3.8-5.8 cm");
        let lower = RangeThresholds {
            normal_min: Some(52.0),
            unit: "%".into(),
            ..Default::default()
        };
        assert_eq!(lower.format_range(), ">= 52 %");
        let upper = RangeThresholds {
            normal_max: Some(8.0),
            ..Default::default()
        };
        assert_eq!(upper.format_range(), "<= 8");
        assert_eq!(RangeThresholds::default().format_range(), "N/A");
    }

    #[test]
    fn validate_accepts_nested_ranges() {
        assert!(lvidd().validate("LVIDd").is_ok());
    }

    #[test]
    fn validate_rejects_inverted_tiers() {
        let broken = RangeThresholds {
            normal_max: Some(5.8),
            mild_max: Some(5.0),
            ..Default::default()
        };
        match broken.validate("LVIDd") {
            Err(RangeDefinitionError::OutOfOrder { lower, upper, .. }) => {
                assert_eq!(lower, "normal_max");
                assert_eq!(upper, "mild_max");
            }
            other => panic!("expected OutOfOrder, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_nan() {
        let broken = RangeThresholds {
            normal_min: Some(f64::NAN),
            ..Default::default()
        };
        assert!(matches!(
            broken.validate("X"),
            Err(RangeDefinitionError::NotFinite { field: "normal_min", .. })
        ));
    }

    #[test]
    fn from_json_rejects_malformed() {
        let err = RangeTable::from_json("bad", "{ not json").unwrap_err();
        assert!(matches!(err, RangeDefinitionError::Parse(name, _) if name == "bad"));
    }

    #[test]
    fn sex_stratified_lookup_differs() {
        let table = lvef_table();
        let male = table.classify("LVEF", 53.0, Some(Sex::Male));
        let female = table.classify("LVEF", 53.0, Some(Sex::Female));
        let unknown = table.classify("LVEF", 53.0, None);
        assert_eq!(male.status, SeverityStatus::Normal);
        assert_eq!(female.status, SeverityStatus::MildlyAbnormal);
        assert_eq!(female.reference_range, ">= 54 %");
        assert_eq!(unknown.status, SeverityStatus::Normal);
        assert_eq!(unknown.reference_range, ">= 52 %");
    }

    #[test]
    fn missing_range_is_undetermined() {
        let result = lvef_table().classify("XYZ", 10.0, Some(Sex::Male));
        assert_eq!(result.status, SeverityStatus::Undetermined);
        assert_eq!(result.direction, AbnormalityDirection::Normal);
        assert_eq!(result.reference_range, NO_REFERENCE_RANGE);
    }

    #[test]
    fn reference_info_uses_union_ranges() {
        let info = lvef_table().reference_info();
        let lvef = &info["LVEF"];
        assert_eq!(lvef.normal_min, Some(52.0));
        assert_eq!(lvef.normal_max, None);
        assert_eq!(lvef.source, "test");
    }

    proptest! {
        #[test]
        fn severity_never_decreases_away_from_normal(a in 5.8f64..12.0, b in 5.8f64..12.0) {
            let r = lvidd();
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(r.classify(near).0.rank() <= r.classify(far).0.rank());
        }

        #[test]
        fn severity_never_decreases_below_normal(a in 0.0f64..3.8, b in 0.0f64..3.8) {
            let r = lvidd();
            let (near, far) = if a >= b { (a, b) } else { (b, a) };
            prop_assert!(r.classify(near).0.rank() <= r.classify(far).0.rank());
        }
    }
}
