//! Crate-level constants and classifier tuning.
//!
//! Every score constant the detection pipeline uses lives here rather than in
//! the handlers. The defaults are hand-tuned; deployments that re-tune against
//! a labeled corpus load a JSON override with [`ClassifierConfig::load`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "medreport";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medreport=info"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read classifier config {0}: {1}")]
    Read(String, String),

    #[error("Malformed classifier config: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {value}")]
    OutOfRange { field: &'static str, value: f32 },
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Weights for the three-tier / three-zone keyword scorer and the generic
/// keyword scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Base score when a strong keyword appears only in the comparison zone.
    pub comparison_only_base: f32,
    /// Ceiling for a score whose only strong evidence is in the comparison zone.
    pub comparison_only_cap: f32,
    /// Moderate hits needed to earn the "many moderate" base.
    pub moderate_many_threshold: usize,
    pub bonus_cap: f32,
    pub moderate_bonus: f32,
    pub weak_bonus: f32,
    /// Multiplicative penalty per negative keyword hit.
    pub negative_penalty: f32,
    /// Ceiling for keyword-only (generic) handlers.
    pub generic_cap: f32,
    pub generic_base: f32,
    pub generic_per_hit: f32,
    /// Non-empty lines that form the title zone.
    pub title_lines: usize,
    /// Hard cap on title zone length in bytes.
    pub title_max_chars: usize,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            comparison_only_base: 0.15,
            comparison_only_cap: 0.2,
            moderate_many_threshold: 3,
            bonus_cap: 0.3,
            moderate_bonus: 0.05,
            weak_bonus: 0.02,
            negative_penalty: 0.3,
            generic_cap: 0.55,
            generic_base: 0.2,
            generic_per_hit: 0.15,
            title_lines: 3,
            title_max_chars: 300,
        }
    }
}

/// Registry-level detection constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Leading characters scanned for an explicit "Report Type:" label.
    pub header_window_chars: usize,
    pub header_confidence: f32,
    /// Maximum score gap at which a specialized runner-up beats a generic leader.
    pub tie_break_margin: f32,
    /// A specialized runner-up scoring below this never wins the near tie.
    /// Keep it above `comparison_only_cap`.
    pub tie_break_floor: f32,
    pub multi_threshold: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            header_window_chars: 500,
            header_confidence: 0.85,
            tie_break_margin: 0.15,
            tie_break_floor: 0.25,
            multi_threshold: 0.3,
        }
    }
}

/// Compound report splitting constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompoundConfig {
    /// Minimum distance between two patient header blocks.
    pub min_header_spacing: usize,
    /// Candidates below this score are not counted as divergent evidence.
    pub divergence_threshold: f32,
    pub report_header_snippet: usize,
    pub patient_header_snippet: usize,
}

impl Default for CompoundConfig {
    fn default() -> Self {
        Self {
            min_header_spacing: 500,
            divergence_threshold: 0.35,
            report_header_snippet: 200,
            patient_header_snippet: 300,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub scoring: ScoringWeights,
    pub detection: DetectionConfig,
    pub compound: CompoundConfig,
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl ClassifierConfig {
    /// Parse a JSON override. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON override from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e.to_string()))?;
        let config = Self::from_json_str(&json)?;
        tracing::info!(path = %path.display(), "Loaded classifier config");
        Ok(config)
    }

    /// Reject values that would push confidences outside [0, 1].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit_fields = [
            ("scoring.comparison_only_base", self.scoring.comparison_only_base),
            ("scoring.comparison_only_cap", self.scoring.comparison_only_cap),
            ("scoring.bonus_cap", self.scoring.bonus_cap),
            ("scoring.moderate_bonus", self.scoring.moderate_bonus),
            ("scoring.weak_bonus", self.scoring.weak_bonus),
            ("scoring.negative_penalty", self.scoring.negative_penalty),
            ("scoring.generic_cap", self.scoring.generic_cap),
            ("scoring.generic_base", self.scoring.generic_base),
            ("scoring.generic_per_hit", self.scoring.generic_per_hit),
            ("detection.header_confidence", self.detection.header_confidence),
            ("detection.tie_break_margin", self.detection.tie_break_margin),
            ("detection.tie_break_floor", self.detection.tie_break_floor),
            ("detection.multi_threshold", self.detection.multi_threshold),
            ("compound.divergence_threshold", self.compound.divergence_threshold),
        ];
        for (field, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        Ok(())
    }
}
