pub mod classification;
pub mod compound;
pub mod engine;
pub mod extraction;
pub mod measurements;
pub mod normalcy;

pub use engine::{AnalysisOutcome, ReportEngine, SegmentReport};
