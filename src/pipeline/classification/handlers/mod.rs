//! Specialized handlers: hand-written vocabularies, measurement tables and
//! reference ranges.

pub mod arterial;
pub mod cardiac_mri;
pub mod carotid;
pub mod echo;
pub mod labs;
pub mod stress;
pub mod venous;

pub use arterial::ArterialDopplerHandler;
pub use cardiac_mri::CardiacMriHandler;
pub use carotid::CarotidDopplerHandler;
pub use echo::EchoHandler;
pub use labs::LabResultsHandler;
pub use stress::StressTestHandler;
pub use venous::VenousDuplexHandler;
