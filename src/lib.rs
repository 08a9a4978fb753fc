//! Medical report classification engine.
//!
//! Detects which kind of clinical report a block of extracted text is,
//! pulls numeric measurements out of it and grades each one against
//! published reference ranges. Documents that bundle several reports are
//! split first. Start with [`ReportEngine`].

pub mod config;
pub mod models;
pub mod pipeline;

pub use config::ClassifierConfig;
pub use pipeline::classification::{ClassificationError, ParsedReport, TypeRegistry};
pub use pipeline::extraction::ExtractionResult;
pub use pipeline::{AnalysisOutcome, ReportEngine, SegmentReport};

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` wins over the crate default.
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok() {
        tracing::info!("{} v{} logging initialised", config::APP_NAME, config::APP_VERSION);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
