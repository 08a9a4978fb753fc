//! Reference range tables bundled with the crate.

use super::severity::{RangeDefinitionError, RangeTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundledRanges {
    Echo,
    CardiacMri,
    Labs,
    Stress,
    Carotid,
    Arterial,
    Venous,
    CardiacPet,
}

impl BundledRanges {
    pub const ALL: [BundledRanges; 8] = [
        Self::Echo,
        Self::CardiacMri,
        Self::Labs,
        Self::Stress,
        Self::Carotid,
        Self::Arterial,
        Self::Venous,
        Self::CardiacPet,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Echo => "echo.json",
            Self::CardiacMri => "cardiac_mri.json",
            Self::Labs => "labs.json",
            Self::Stress => "stress.json",
            Self::Carotid => "carotid.json",
            Self::Arterial => "arterial.json",
            Self::Venous => "venous.json",
            Self::CardiacPet => "cardiac_pet.json",
        }
    }

    fn json(self) -> &'static str {
        match self {
            Self::Echo => include_str!("../../../resources/reference_ranges/echo.json"),
            Self::CardiacMri => include_str!("../../../resources/reference_ranges/cardiac_mri.json"),
            Self::Labs => include_str!("../../../resources/reference_ranges/labs.json"),
            Self::Stress => include_str!("../../../resources/reference_ranges/stress.json"),
            Self::Carotid => include_str!("../../../resources/reference_ranges/carotid.json"),
            Self::Arterial => include_str!("../../../resources/reference_ranges/arterial.json"),
            Self::Venous => include_str!("../../../resources/reference_ranges/venous.json"),
            Self::CardiacPet => {
                include_str!("../../../resources/reference_ranges/cardiac_pet.json")
            }
        }
    }

    /// Parse and validate the table.
    pub fn load(self) -> Result<RangeTable, RangeDefinitionError> {
        RangeTable::from_json(self.file_name(), self.json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{SeverityStatus, Sex};

    #[test]
    fn every_bundled_table_satisfies_tier_ordering() {
        for table in BundledRanges::ALL {
            let loaded = table.load();
            assert!(loaded.is_ok(), "{}: {:?}", table.file_name(), loaded.err());
            assert!(!loaded.unwrap().ranges.is_empty());
        }
    }

    #[test]
    fn echo_lvef_is_sex_stratified() {
        let echo = BundledRanges::Echo.load().unwrap();
        assert_eq!(echo.classify("LVEF", 53.0, Some(Sex::Male)).status, SeverityStatus::Normal);
        assert_eq!(
            echo.classify("LVEF", 53.0, Some(Sex::Female)).status,
            SeverityStatus::MildlyAbnormal
        );
        assert_eq!(echo.classify("LVEF", 53.0, None).status, SeverityStatus::Normal);
    }

    #[test]
    fn labs_ast_tiers() {
        let labs = BundledRanges::Labs.load().unwrap();
        assert_eq!(labs.classify("AST", 35.0, None).status, SeverityStatus::Normal);
        assert_eq!(labs.classify("AST", 60.0, None).status, SeverityStatus::MildlyAbnormal);
        assert_eq!(labs.classify("AST", 150.0, None).status, SeverityStatus::ModeratelyAbnormal);
        assert_eq!(labs.classify("AST", 650.0, None).status, SeverityStatus::SeverelyAbnormal);
    }

    #[test]
    fn labs_hemoglobin_female_threshold() {
        let labs = BundledRanges::Labs.load().unwrap();
        assert_eq!(labs.classify("HGB", 13.0, Some(Sex::Male)).status, SeverityStatus::MildlyAbnormal);
        assert_eq!(labs.classify("HGB", 13.0, Some(Sex::Female)).status, SeverityStatus::Normal);
    }

    #[test]
    fn duke_score_below_five_is_not_normal() {
        let stress = BundledRanges::Stress.load().unwrap();
        assert_eq!(stress.classify("DTS", 6.0, None).status, SeverityStatus::Normal);
        assert_eq!(stress.classify("DTS", -4.0, None).status, SeverityStatus::ModeratelyAbnormal);
        assert_eq!(stress.classify("DTS", -12.0, None).status, SeverityStatus::SeverelyAbnormal);
    }

    #[test]
    fn carotid_velocity_grades() {
        let carotid = BundledRanges::Carotid.load().unwrap();
        assert_eq!(carotid.classify("ICA_PSV", 95.0, None).status, SeverityStatus::Normal);
        assert_eq!(
            carotid.classify("ICA_PSV", 180.0, None).status,
            SeverityStatus::ModeratelyAbnormal
        );
        assert_eq!(
            carotid.classify("ICA_PSV", 260.0, None).status,
            SeverityStatus::SeverelyAbnormal
        );
    }

    #[test]
    fn ankle_brachial_index_bands() {
        let arterial = BundledRanges::Arterial.load().unwrap();
        assert_eq!(arterial.classify("ABI", 1.1, None).status, SeverityStatus::Normal);
        assert_eq!(arterial.classify("ABI", 0.82, None).status, SeverityStatus::MildlyAbnormal);
        assert_eq!(
            arterial.classify("ABI", 0.55, None).status,
            SeverityStatus::ModeratelyAbnormal
        );
        assert_eq!(
            arterial.classify("ABI", 0.35, None).status,
            SeverityStatus::SeverelyAbnormal
        );
        assert_eq!(
            arterial.classify("ABI", 1.5, None).status,
            SeverityStatus::ModeratelyAbnormal
        );
    }

    #[test]
    fn cardiac_mri_source_is_set() {
        let cmr = BundledRanges::CardiacMri.load().unwrap();
        assert!(cmr.source.contains("SCMR"));
        assert!(cmr.ranges.contains_key("ECV"));
    }
}
