pub mod extractor;
pub mod reference;
pub mod severity;

pub use extractor::{parse_number, MeasurementDef, MeasurementTable, RawMeasurement};
pub use reference::BundledRanges;
pub use severity::{
    ClassificationResult, RangeDefinitionError, RangeTable, RangeThresholds, ReferenceRangeInfo,
    SexRanges, NO_REFERENCE_RANGE,
};
