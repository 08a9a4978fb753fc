//! Handler registry: detection ranking, multi-detection and name resolution.
//!
//! Built once at startup and shared read-only afterwards. Handlers are kept in
//! registration order, which makes equal-score ranking deterministic.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::config::DetectionConfig;
use crate::models::enums::{Category, HandlerKind};
use crate::pipeline::extraction::ExtractionResult;

use super::handler::ReportHandler;
use super::scoring::contains_term;
use super::types::HandlerMetadata;

/// Explicit self-declared report type near the top of a document.
static HEADER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:report\s+type|type\s+of\s+(?:report|study|exam)|procedure|exam(?:ination)?|study(?:\s+type)?|test(?:\s+type)?)[ \t]*:[ \t]*(?P<label>[^\n]{3,80})",
    )
    .expect("Invalid header label regex pattern")
});

/// Retired type IDs still accepted by `resolve`.
const DEPRECATED_ALIASES: &[(&str, &str)] = &[
    ("stress_test", "exercise_treadmill_test"),
    ("nuclear_stress", "pharma_spect_stress"),
    ("pharmacological_stress_test", "pharma_spect_stress"),
    ("cardiac_pet", "pharma_pet_stress"),
];

/// Queries shorter than this never match as a substring of a keyword.
const MIN_REVERSE_QUERY_LEN: usize = 3;

/// Outcome of [`TypeRegistry::detect`]. `type_id` is `None` when nothing
/// scored above zero; that is "unknown type", not a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub type_id: Option<String>,
    pub confidence: f32,
}

impl Detection {
    pub fn unknown() -> Self {
        Self {
            type_id: None,
            confidence: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.type_id.is_none()
    }
}

/// One entry of [`TypeRegistry::detect_multi`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub type_id: String,
    pub confidence: f32,
    pub category: Category,
    /// Came from an explicit header label rather than scoring.
    pub from_header: bool,
}

/// A handler found by [`TypeRegistry::resolve`]. `type_id` may be a subtype
/// ID owned by `handler`.
#[derive(Clone)]
pub struct Resolved {
    pub type_id: String,
    pub handler: Arc<dyn ReportHandler>,
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("type_id", &self.type_id)
            .field("handler", &self.handler.test_type_id())
            .finish()
    }
}

pub struct TypeRegistry {
    handlers: Vec<Arc<dyn ReportHandler>>,
    index: HashMap<String, usize>,
    /// Subtype ID → index of the owning family handler.
    subtypes: HashMap<String, usize>,
    config: DetectionConfig,
}

impl TypeRegistry {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            handlers: Vec::new(),
            index: HashMap::new(),
            subtypes: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Add a handler. A handler with an existing ID replaces the old one in
    /// place, keeping its position in the ranking order.
    pub fn register(&mut self, handler: Arc<dyn ReportHandler>) {
        let id = handler.test_type_id().to_string();
        let slot = match self.index.get(&id) {
            Some(&existing) => {
                tracing::warn!(type_id = %id, "Overwriting existing report handler");
                self.subtypes.retain(|_, owner| *owner != existing);
                self.handlers[existing] = handler;
                existing
            }
            None => {
                self.handlers.push(handler);
                let slot = self.handlers.len() - 1;
                self.index.insert(id.clone(), slot);
                slot
            }
        };

        for subtype in self.handlers[slot].subtypes() {
            self.subtypes.insert(subtype.id.to_string(), slot);
        }
        tracing::info!(
            type_id = %id,
            kind = %self.handlers[slot].kind(),
            subtypes = self.handlers[slot].subtypes().len(),
            "Registered report handler"
        );
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler by exact ID or by subtype ID.
    pub fn get(&self, type_id: &str) -> Option<Arc<dyn ReportHandler>> {
        self.index
            .get(type_id)
            .or_else(|| self.subtypes.get(type_id))
            .map(|&i| Arc::clone(&self.handlers[i]))
    }

    /// Category of a handler or subtype ID.
    pub fn category_of(&self, type_id: &str) -> Option<Category> {
        self.get(type_id).map(|h| h.category())
    }

    // ═══════════════════════════════════════════════════════════
    // Detection
    // ═══════════════════════════════════════════════════════════

    pub fn detect(&self, extraction: &ExtractionResult) -> Detection {
        if let Some((slot, label)) = self.header_match(extraction) {
            let type_id = self.report_id(slot, extraction);
            tracing::info!(
                type_id = %type_id,
                label = %label,
                confidence = self.config.header_confidence,
                "Report type taken from header label"
            );
            return Detection {
                type_id: Some(type_id),
                confidence: self.config.header_confidence,
            };
        }

        let ranked = self.rank(extraction);
        let Some(&(leader_slot, leader_score)) = ranked.first() else {
            tracing::debug!("No report handler matched");
            return Detection::unknown();
        };
        let (mut winner, mut confidence) = (leader_slot, leader_score);

        if let Some(&(runner_up, runner_score)) = ranked.get(1) {
            let leader = &self.handlers[winner];
            let challenger = &self.handlers[runner_up];
            if leader.kind() == HandlerKind::Generic
                && challenger.kind() == HandlerKind::Specialized
                && confidence - runner_score <= self.config.tie_break_margin
                && runner_score >= self.config.tie_break_floor
            {
                tracing::info!(
                    generic = %leader.test_type_id(),
                    specialized = %challenger.test_type_id(),
                    generic_score = confidence,
                    specialized_score = runner_score,
                    "Near tie resolved in favour of specialized handler"
                );
                winner = runner_up;
                confidence = runner_score;
            }
        }

        let type_id = self.report_id(winner, extraction);
        tracing::debug!(type_id = %type_id, confidence, "Detected report type");
        Detection {
            type_id: Some(type_id),
            confidence,
        }
    }

    /// Every handler scoring at or above `threshold` (default from config),
    /// best first. A header-label match is prepended and not repeated.
    pub fn detect_multi(
        &self,
        extraction: &ExtractionResult,
        threshold: Option<f32>,
    ) -> Vec<Candidate> {
        let threshold = threshold.unwrap_or(self.config.multi_threshold);
        let mut candidates = Vec::new();
        let mut header_slot = None;

        if let Some((slot, _)) = self.header_match(extraction) {
            header_slot = Some(slot);
            candidates.push(Candidate {
                type_id: self.report_id(slot, extraction),
                confidence: self.config.header_confidence,
                category: self.handlers[slot].category(),
                from_header: true,
            });
        }

        for (slot, score) in self.rank(extraction) {
            if score < threshold || Some(slot) == header_slot {
                continue;
            }
            candidates.push(Candidate {
                type_id: self.report_id(slot, extraction),
                confidence: score,
                category: self.handlers[slot].category(),
                from_header: false,
            });
        }
        candidates
    }

    /// Positive scores, descending. The sort is stable so ties keep
    /// registration order.
    fn rank(&self, extraction: &ExtractionResult) -> Vec<(usize, f32)> {
        let mut ranked: Vec<(usize, f32)> = self
            .handlers
            .iter()
            .enumerate()
            .map(|(slot, h)| (slot, h.detect(extraction)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Family handlers report the resolved subtype when the text allows it.
    fn report_id(&self, slot: usize, extraction: &ExtractionResult) -> String {
        let handler = &self.handlers[slot];
        if handler.is_family() {
            if let Some(subtype) = handler.resolve_subtype(extraction) {
                return subtype.to_string();
            }
        }
        handler.test_type_id().to_string()
    }

    /// Handler named by a "Report Type:" style label in the header window.
    ///
    /// The label must open with one of a handler's header terms, its display
    /// name, its ID or a subtype name. A term buried mid-label ("Exam: heart
    /// regular, no doppler needed") does not count. Longest term wins.
    fn header_match(&self, extraction: &ExtractionResult) -> Option<(usize, String)> {
        let window = prefix_chars(&extraction.full_text, self.config.header_window_chars);
        let caps = HEADER_LABEL.captures(window)?;
        let label = caps.name("label")?.as_str().trim().to_lowercase();

        let mut best: Option<(usize, usize)> = None;
        for (slot, handler) in self.handlers.iter().enumerate() {
            let named = [
                handler.display_name().to_lowercase(),
                handler.test_type_id().replace('_', " "),
            ];
            let subtype_names = handler
                .subtypes()
                .iter()
                .map(|s| s.display_name.to_lowercase());
            let terms = handler
                .header_terms()
                .iter()
                .map(|t| t.to_string())
                .chain(named)
                .chain(subtype_names);

            for term in terms {
                if leads_label(&label, &term) && best.map_or(true, |(_, len)| term.len() > len) {
                    best = Some((slot, term.len()));
                }
            }
        }
        best.map(|(slot, _)| (slot, label))
    }

    // ═══════════════════════════════════════════════════════════
    // Resolution and listing
    // ═══════════════════════════════════════════════════════════

    /// Look up a type ID or free-text name.
    ///
    /// Order: exact ID of a listed handler, subtype ID, deprecated alias,
    /// hidden family ID, then keyword match (longest keyword wins).
    pub fn resolve(&self, name_or_id: &str) -> Option<Resolved> {
        let query = name_or_id.trim();
        if query.is_empty() {
            return None;
        }

        if let Some(&slot) = self.index.get(query) {
            if !self.handlers[slot].is_family() {
                return Some(self.resolved(query, slot));
            }
        }

        if let Some(&slot) = self.subtypes.get(query) {
            return Some(self.resolved(query, slot));
        }

        if let Some((_, target)) = DEPRECATED_ALIASES.iter().find(|(alias, _)| *alias == query) {
            if let Some(&slot) = self.index.get(*target).or_else(|| self.subtypes.get(*target)) {
                tracing::debug!(alias = %query, type_id = %target, "Resolved deprecated type ID");
                return Some(self.resolved(target, slot));
            }
        }

        if let Some(&slot) = self.index.get(query) {
            return Some(self.resolved(query, slot));
        }

        self.resolve_by_keyword(&query.to_lowercase())
    }

    fn resolve_by_keyword(&self, query: &str) -> Option<Resolved> {
        let mut best: Option<(usize, usize)> = None;
        for (slot, handler) in self.handlers.iter().enumerate() {
            for keyword in handler.keywords() {
                let matches = contains_term(query, keyword)
                    || (query.chars().count() >= MIN_REVERSE_QUERY_LEN
                        && keyword.contains(query));
                if matches && best.map_or(true, |(_, len)| keyword.len() > len) {
                    best = Some((slot, keyword.len()));
                }
            }
        }
        best.map(|(slot, _)| {
            let id = self.handlers[slot].test_type_id().to_string();
            self.resolved(&id, slot)
        })
    }

    fn resolved(&self, type_id: &str, slot: usize) -> Resolved {
        Resolved {
            type_id: type_id.to_string(),
            handler: Arc::clone(&self.handlers[slot]),
        }
    }

    /// Metadata for every listed type. Family handlers are hidden; each of
    /// their subtypes is listed instead.
    pub fn list_types(&self) -> Vec<HandlerMetadata> {
        let mut listed = Vec::new();
        for handler in &self.handlers {
            if !handler.is_family() {
                listed.push(handler.metadata());
                continue;
            }
            let base = handler.metadata();
            for subtype in handler.subtypes() {
                listed.push(HandlerMetadata {
                    test_type_id: subtype.id.to_string(),
                    display_name: subtype.display_name.to_string(),
                    family: Some(base.test_type_id.clone()),
                    ..base.clone()
                });
            }
        }
        listed
    }
}

/// `label` starts with `term`, ending on a word boundary.
fn leads_label(label: &str, term: &str) -> bool {
    !term.is_empty()
        && label
            .strip_prefix(term)
            .is_some_and(|rest| !rest.chars().next().is_some_and(char::is_alphanumeric))
}

/// Leading `max_chars` characters of `text`, on a char boundary.
pub(crate) fn prefix_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::ScoringWeights;
    use crate::models::enums::Sex;
    use crate::pipeline::classification::generic::GenericHandler;
    use crate::pipeline::classification::types::{ParsedReport, PromptContext, SubtypeInfo};
    use crate::pipeline::measurements::ReferenceRangeInfo;

    /// Scores a fixed value when its trigger word is present.
    struct Fixed {
        id: &'static str,
        kind: HandlerKind,
        category: Category,
        trigger: &'static str,
        score: f32,
        keywords: &'static [&'static str],
        subtypes: &'static [SubtypeInfo],
    }

    impl Fixed {
        fn new(id: &'static str, trigger: &'static str, score: f32) -> Self {
            Self {
                id,
                kind: HandlerKind::Specialized,
                category: Category::Cardiac,
                trigger,
                score,
                keywords: &[],
                subtypes: &[],
            }
        }
    }

    impl ReportHandler for Fixed {
        fn test_type_id(&self) -> &str {
            self.id
        }
        fn display_name(&self) -> &str {
            self.id
        }
        fn category(&self) -> Category {
            self.category
        }
        fn keywords(&self) -> &[&'static str] {
            self.keywords
        }
        fn kind(&self) -> HandlerKind {
            self.kind
        }
        fn detect(&self, extraction: &ExtractionResult) -> f32 {
            if extraction.full_text.to_lowercase().contains(self.trigger) {
                self.score
            } else {
                0.0
            }
        }
        fn parse(&self, extraction: &ExtractionResult, _: Option<Sex>, _: Option<u32>) -> ParsedReport {
            ParsedReport {
                document_id: extraction.document_id,
                test_type: self.id.into(),
                test_type_display: self.id.into(),
                detection_confidence: self.detect(extraction),
                measurements: vec![],
                sections: vec![],
                findings: vec![],
                warnings: vec![],
                secondary_test_types: vec![],
            }
        }
        fn reference_ranges(&self) -> BTreeMap<String, ReferenceRangeInfo> {
            BTreeMap::new()
        }
        fn glossary(&self) -> BTreeMap<String, String> {
            BTreeMap::new()
        }
        fn prompt_context(&self, _: Option<&ExtractionResult>) -> PromptContext {
            PromptContext {
                specialty: "cardiology".into(),
                test_type: self.id.into(),
                category: self.category,
                guidelines: None,
                explanation_style: String::new(),
                interpretation_rules: None,
                notes: vec![],
            }
        }
        fn subtypes(&self) -> &[SubtypeInfo] {
            self.subtypes
        }
        fn resolve_subtype(&self, extraction: &ExtractionResult) -> Option<&'static str> {
            if extraction.full_text.contains("treadmill") {
                Some("exercise_treadmill_test")
            } else {
                None
            }
        }
    }

    const STRESS_SUBTYPES: &[SubtypeInfo] = &[
        SubtypeInfo {
            id: "exercise_treadmill_test",
            display_name: "Exercise Treadmill Test",
        },
        SubtypeInfo {
            id: "pharma_spect_stress",
            display_name: "Pharmacologic SPECT Stress",
        },
    ];

    fn registry(handlers: Vec<Arc<dyn ReportHandler>>) -> TypeRegistry {
        let mut registry = TypeRegistry::new(DetectionConfig::default());
        for h in handlers {
            registry.register(h);
        }
        registry
    }

    fn text(t: &str) -> ExtractionResult {
        ExtractionResult::from_text(t)
    }

    #[test]
    fn unknown_text_detects_nothing() {
        let reg = registry(vec![Arc::new(Fixed::new("echo", "echo", 0.8))]);
        let detection = reg.detect(&text("Grocery list: milk, eggs"));
        assert_eq!(detection, Detection::unknown());
        assert!(detection.is_unknown());
    }

    #[test]
    fn highest_score_wins() {
        let reg = registry(vec![
            Arc::new(Fixed::new("low", "report", 0.3)),
            Arc::new(Fixed::new("high", "report", 0.75)),
        ]);
        let detection = reg.detect(&text("report"));
        assert_eq!(detection.type_id.as_deref(), Some("high"));
        assert!((detection.confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn equal_scores_keep_registration_order() {
        let reg = registry(vec![
            Arc::new(Fixed::new("first", "report", 0.5)),
            Arc::new(Fixed::new("second", "report", 0.5)),
        ]);
        assert_eq!(reg.detect(&text("report")).type_id.as_deref(), Some("first"));
    }

    #[test]
    fn near_tie_prefers_specialized_over_generic() {
        let generic = Fixed {
            kind: HandlerKind::Generic,
            ..Fixed::new("generic", "scan", 0.55)
        };
        let reg = registry(vec![
            Arc::new(generic),
            Arc::new(Fixed::new("specialized", "scan", 0.45)),
        ]);
        let detection = reg.detect(&text("scan"));
        assert_eq!(detection.type_id.as_deref(), Some("specialized"));
        assert!((detection.confidence - 0.45).abs() < 1e-6);
    }

    #[test]
    fn wide_gap_keeps_generic_leader() {
        let generic = Fixed {
            kind: HandlerKind::Generic,
            ..Fixed::new("generic", "scan", 0.55)
        };
        let reg = registry(vec![
            Arc::new(generic),
            Arc::new(Fixed::new("specialized", "scan", 0.3)),
        ]);
        assert_eq!(reg.detect(&text("scan")).type_id.as_deref(), Some("generic"));
    }

    #[test]
    fn weak_specialized_runner_up_keeps_generic_leader() {
        let generic = Fixed {
            kind: HandlerKind::Generic,
            ..Fixed::new("ct_chest", "chest", 0.32)
        };
        let reg = registry(vec![
            Arc::new(generic),
            Arc::new(Fixed::new("echocardiogram", "chest", 0.2)),
        ]);
        let detection = reg.detect(&text("ct chest"));
        assert_eq!(detection.type_id.as_deref(), Some("ct_chest"));
        assert!((detection.confidence - 0.32).abs() < 1e-6);
    }

    #[test]
    fn generic_handler_loses_close_contest_to_specialized() {
        let generic = GenericHandler::new(
            "holter_monitor",
            "Holter Monitor",
            Category::Cardiac,
            &["holter", "ambulatory ecg monitoring"],
        )
        .with_weights(ScoringWeights::default());
        let reg = registry(vec![
            Arc::new(generic),
            Arc::new(Fixed::new("ecg_special", "holter", 0.42)),
        ]);
        let er = text("Holter and ambulatory ecg monitoring summary");
        let generic_score = reg.get("holter_monitor").unwrap().detect(&er);
        assert!(generic_score > 0.42 && generic_score - 0.42 <= 0.15);
        assert_eq!(reg.detect(&er).type_id.as_deref(), Some("ecg_special"));
    }

    #[test]
    fn family_winner_reports_subtype() {
        let family = Fixed {
            subtypes: STRESS_SUBTYPES,
            ..Fixed::new("stress_test", "stress", 0.8)
        };
        let reg = registry(vec![Arc::new(family)]);
        let detection = reg.detect(&text("Exercise stress test on treadmill"));
        assert_eq!(detection.type_id.as_deref(), Some("exercise_treadmill_test"));

        let unresolved = reg.detect(&text("Pharmacologic stress test"));
        assert_eq!(unresolved.type_id.as_deref(), Some("stress_test"));
    }

    #[test]
    fn header_label_short_circuits_scoring() {
        let labs = Fixed {
            keywords: &["lab results", "lipid panel"],
            ..Fixed::new("lab_results", "glucose", 0.4)
        };
        let echo = Fixed {
            keywords: &["echocardiogram"],
            ..Fixed::new("echocardiogram", "lvef", 0.9)
        };
        let reg = registry(vec![Arc::new(labs), Arc::new(echo)]);

        let er = text("Report Type: Lipid Panel\nLVEF mentioned in history.\nGlucose 90");
        let detection = reg.detect(&er);
        assert_eq!(detection.type_id.as_deref(), Some("lab_results"));
        assert!((detection.confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn header_label_outside_window_is_ignored() {
        let labs = Fixed {
            keywords: &["lipid panel"],
            ..Fixed::new("lab_results", "glucose", 0.4)
        };
        let reg = registry(vec![Arc::new(labs)]);
        let er = text(&format!("{}\nReport Type: Lipid Panel", "x".repeat(600)));
        assert_eq!(reg.detect(&er), Detection::unknown());
    }

    #[test]
    fn header_label_without_known_keyword_falls_through() {
        let echo = Fixed {
            keywords: &["echocardiogram"],
            ..Fixed::new("echocardiogram", "lvef", 0.8)
        };
        let reg = registry(vec![Arc::new(echo)]);
        let detection = reg.detect(&text("Procedure: Knee arthroscopy\nLVEF 60%"));
        assert_eq!(detection.type_id.as_deref(), Some("echocardiogram"));
        assert!((detection.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn header_label_must_open_with_identifying_term() {
        let echo = Fixed {
            keywords: &["echocardiogram", "doppler"],
            ..Fixed::new("echocardiogram", "echocardiogram", 0.8)
        };
        let reg = registry(vec![Arc::new(echo)]);

        let note = text("Clinic note\nExam: heart regular, no doppler needed\nPlan: follow up");
        assert_eq!(reg.detect(&note), Detection::unknown());
        assert!(reg.detect_multi(&note, Some(0.0)).is_empty());

        let labelled = reg.detect(&text("Exam: Doppler study of the heart"));
        assert!((labelled.confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn header_label_matches_display_name_and_subtype_name() {
        let family = Fixed {
            subtypes: STRESS_SUBTYPES,
            ..Fixed::new("stress_test", "never", 0.8)
        };
        let reg = registry(vec![Arc::new(family)]);

        let named = reg.detect(&text("Study Type: Pharmacologic SPECT Stress\nRegadenoson given."));
        assert_eq!(named.type_id.as_deref(), Some("stress_test"));
        assert!((named.confidence - 0.85).abs() < 1e-6);

        let by_id = reg.detect(&text("Report Type: Stress test, treadmill"));
        assert_eq!(by_id.type_id.as_deref(), Some("exercise_treadmill_test"));
    }

    #[test]
    fn leading_term_needs_word_boundary() {
        assert!(leads_label("echocardiogram, limited", "echocardiogram"));
        assert!(leads_label("ct chest", "ct chest"));
        assert!(!leads_label("ctx review", "ct"));
        assert!(!leads_label("limited echocardiogram", "echocardiogram"));
        assert!(!leads_label("anything", ""));
    }

    #[test]
    fn detect_multi_filters_and_prepends_header() {
        let labs = Fixed {
            category: Category::Lab,
            keywords: &["lab report"],
            ..Fixed::new("lab_results", "glucose", 0.5)
        };
        let echo = Fixed::new("echocardiogram", "lvef", 0.8);
        let weak = Fixed::new("weak", "lvef", 0.1);
        let reg = registry(vec![Arc::new(labs), Arc::new(echo), Arc::new(weak)]);

        let er = text("Report Type: Lab Report\nLVEF 55%\nGlucose 100");
        let found = reg.detect_multi(&er, None);
        let ids: Vec<_> = found.iter().map(|c| c.type_id.as_str()).collect();
        assert_eq!(ids, vec!["lab_results", "echocardiogram"]);
        assert!(found[0].from_header);
        assert_eq!(found[0].category, Category::Lab);

        let all = reg.detect_multi(&er, Some(0.05));
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn resolve_tiers() {
        let family = Fixed {
            subtypes: STRESS_SUBTYPES,
            keywords: &["stress test", "bruce protocol"],
            ..Fixed::new("stress_test", "stress", 0.8)
        };
        let echo = Fixed {
            keywords: &["echocardiogram", "echo"],
            ..Fixed::new("echocardiogram", "lvef", 0.8)
        };
        let reg = registry(vec![Arc::new(family), Arc::new(echo)]);

        assert_eq!(reg.resolve("echocardiogram").unwrap().type_id, "echocardiogram");

        let sub = reg.resolve("pharma_spect_stress").unwrap();
        assert_eq!(sub.type_id, "pharma_spect_stress");
        assert_eq!(sub.handler.test_type_id(), "stress_test");

        // A retired ID routes to its replacement subtype.
        let alias = reg.resolve("stress_test").unwrap();
        assert_eq!(alias.type_id, "exercise_treadmill_test");
        assert_eq!(alias.handler.test_type_id(), "stress_test");

        let by_keyword = reg.resolve("Transthoracic Echocardiogram").unwrap();
        assert_eq!(by_keyword.type_id, "echocardiogram");

        let partial = reg.resolve("bruce").unwrap();
        assert_eq!(partial.type_id, "stress_test");

        assert!(reg.resolve("colonoscopy").is_none());
        assert!(reg.resolve("  ").is_none());
    }

    #[test]
    fn alias_to_missing_target_falls_back_to_family_id() {
        let family = Fixed {
            subtypes: &[SubtypeInfo {
                id: "pharma_spect_stress",
                display_name: "Pharmacologic SPECT Stress",
            }],
            ..Fixed::new("stress_test", "stress", 0.8)
        };
        let reg = registry(vec![Arc::new(family)]);
        let resolved = reg.resolve("stress_test").unwrap();
        assert_eq!(resolved.type_id, "stress_test");
    }

    #[test]
    fn list_types_hides_family_and_lists_subtypes() {
        let family = Fixed {
            subtypes: STRESS_SUBTYPES,
            ..Fixed::new("stress_test", "stress", 0.8)
        };
        let reg = registry(vec![
            Arc::new(Fixed::new("echocardiogram", "lvef", 0.8)),
            Arc::new(family),
        ]);
        let listed = reg.list_types();
        let ids: Vec<_> = listed.iter().map(|m| m.test_type_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["echocardiogram", "exercise_treadmill_test", "pharma_spect_stress"]
        );
        assert_eq!(listed[1].family.as_deref(), Some("stress_test"));
        assert_eq!(listed[1].display_name, "Exercise Treadmill Test");
        assert_eq!(listed[0].family, None);
    }

    #[test]
    fn re_registration_replaces_in_place() {
        let mut reg = registry(vec![
            Arc::new(Fixed::new("a", "x", 0.5)),
            Arc::new(Fixed::new("b", "x", 0.5)),
        ]);
        reg.register(Arc::new(Fixed::new("a", "y", 0.9)));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.detect(&text("x")).type_id.as_deref(), Some("b"));
        assert_eq!(reg.detect(&text("y")).type_id.as_deref(), Some("a"));
    }

    #[test]
    fn get_accepts_subtype_ids() {
        let family = Fixed {
            subtypes: STRESS_SUBTYPES,
            ..Fixed::new("stress_test", "stress", 0.8)
        };
        let reg = registry(vec![Arc::new(family)]);
        assert_eq!(
            reg.get("exercise_treadmill_test").unwrap().test_type_id(),
            "stress_test"
        );
        assert_eq!(reg.category_of("pharma_spect_stress"), Some(Category::Cardiac));
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn prefix_respects_char_boundaries() {
        assert_eq!(prefix_chars("ééé", 2), "éé");
        assert_eq!(prefix_chars("ab", 10), "ab");
    }
}
