//! Three-tier / three-zone keyword scoring shared by every specialized handler.
//!
//! Text is split into a title zone, a comparison zone (anything after a
//! "Comparison:" label, which describes a prior study) and the body. Strong
//! keywords only earn the strong base in title or body; a strong keyword seen
//! only in the comparison zone is a weak positive.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::ScoringWeights;

static COMPARISON_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcomparisons?(?:\s+stud(?:y|ies))?\s*:")
        .expect("Invalid comparison label regex")
});

/// End of a comparison clause: blank line or the next "Header:" line.
static CLAUSE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n[ \t]*\n|\n[ \t]*[A-Z][A-Za-z /]{2,40}:").expect("Invalid clause end regex")
});

/// Lower-cased positional zones of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextZones {
    pub title: String,
    pub comparison: String,
    pub body: String,
}

/// Where a term was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneHit {
    /// Title or body.
    Primary,
    ComparisonOnly,
    Absent,
}

impl TextZones {
    pub fn split(text: &str, weights: &ScoringWeights) -> Self {
        let spans = comparison_spans(text);
        let title_end = title_end(text, weights);

        let mut zones = TextZones::default();
        let mut cursor = 0;
        for span in spans.iter().cloned().chain(std::iter::once(text.len()..text.len())) {
            if span.start > cursor {
                zones.push_primary(text, cursor..span.start, title_end);
            }
            if !span.is_empty() {
                zones.comparison.push_str(&text[span.clone()]);
                zones.comparison.push('\n');
            }
            cursor = cursor.max(span.end);
        }

        zones.title = zones.title.to_lowercase();
        zones.comparison = zones.comparison.to_lowercase();
        zones.body = zones.body.to_lowercase();
        zones
    }

    fn push_primary(&mut self, text: &str, range: Range<usize>, title_end: usize) {
        if range.start < title_end {
            let cut = title_end.min(range.end);
            self.title.push_str(&text[range.start..cut]);
            self.title.push('\n');
            if cut < range.end {
                self.body.push_str(&text[cut..range.end]);
                self.body.push('\n');
            }
        } else {
            self.body.push_str(&text[range]);
            self.body.push('\n');
        }
    }

    /// Locate a lower-case term.
    pub fn locate(&self, term: &str) -> ZoneHit {
        if contains_term(&self.title, term) || contains_term(&self.body, term) {
            ZoneHit::Primary
        } else if contains_term(&self.comparison, term) {
            ZoneHit::ComparisonOnly
        } else {
            ZoneHit::Absent
        }
    }

    pub fn in_primary(&self, term: &str) -> bool {
        self.locate(term) == ZoneHit::Primary
    }
}

/// Byte ranges covered by "Comparison:" clauses, in document order.
fn comparison_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = Vec::new();
    for label in COMPARISON_LABEL.find_iter(text) {
        if spans.last().is_some_and(|s| label.start() < s.end) {
            continue;
        }
        let rest = &text[label.end()..];
        let end = CLAUSE_END
            .find(rest)
            .map(|m| label.end() + m.start())
            .unwrap_or(text.len());
        spans.push(label.start()..end);
    }
    spans
}

/// Byte offset where the title zone ends.
fn title_end(text: &str, weights: &ScoringWeights) -> usize {
    let mut end = 0;
    let mut lines = 0;
    for line in text.split_inclusive('\n') {
        if lines >= weights.title_lines {
            break;
        }
        end += line.len();
        if !line.trim().is_empty() {
            lines += 1;
        }
    }
    let mut end = end.min(weights.title_max_chars).min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Case-sensitive containment with word boundaries on alphanumeric edges.
/// Both arguments are expected lower-case.
pub fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    let starts_alnum = term.chars().next().is_some_and(char::is_alphanumeric);
    let ends_alnum = term.chars().next_back().is_some_and(char::is_alphanumeric);

    haystack.match_indices(term).any(|(start, matched)| {
        let before_ok = !starts_alnum
            || haystack[..start]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = !ends_alnum
            || haystack[start + matched.len()..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

/// Base scores of one handler. Handlers tune these within the bands
/// strong 0.7–0.8, many-moderate 0.4–0.5, any-moderate 0.2–0.3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierBases {
    pub strong: f32,
    pub moderate_many: f32,
    pub moderate_any: f32,
}

impl TierBases {
    pub const STANDARD: TierBases = TierBases {
        strong: 0.7,
        moderate_many: 0.4,
        moderate_any: 0.2,
    };
}

/// A handler's keyword vocabulary partitioned by evidential weight.
#[derive(Debug, Clone)]
pub struct KeywordTiers {
    pub strong: &'static [&'static str],
    pub moderate: &'static [&'static str],
    pub weak: &'static [&'static str],
    /// Terms of a competing modality.
    pub negative: &'static [&'static str],
    pub bases: TierBases,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCounts {
    pub strong_primary: usize,
    pub strong_comparison_only: usize,
    pub moderate: usize,
    pub weak: usize,
    pub negative: usize,
}

impl KeywordTiers {
    pub fn count(&self, zones: &TextZones) -> TierCounts {
        let mut counts = TierCounts::default();
        for term in self.strong {
            match zones.locate(term) {
                ZoneHit::Primary => counts.strong_primary += 1,
                ZoneHit::ComparisonOnly => counts.strong_comparison_only += 1,
                ZoneHit::Absent => {}
            }
        }
        counts.moderate = self.moderate.iter().filter(|t| zones.in_primary(t)).count();
        counts.weak = self.weak.iter().filter(|t| zones.in_primary(t)).count();
        counts.negative = self.negative.iter().filter(|t| zones.in_primary(t)).count();
        counts
    }

    pub fn score(&self, zones: &TextZones, weights: &ScoringWeights) -> f32 {
        let counts = self.count(zones);

        let mut ceiling = 1.0;
        let base = if counts.strong_primary > 0 {
            self.bases.strong
        } else if counts.moderate >= weights.moderate_many_threshold {
            self.bases.moderate_many
        } else if counts.moderate >= 1 {
            self.bases.moderate_any
        } else if counts.strong_comparison_only > 0 {
            ceiling = weights.comparison_only_cap;
            weights.comparison_only_base
        } else {
            0.0
        };

        let bonus = (counts.moderate as f32 * weights.moderate_bonus
            + counts.weak as f32 * weights.weak_bonus)
            .min(weights.bonus_cap);
        let score = (base + bonus).min(ceiling);

        apply_negative_penalty(score, counts.negative, weights)
    }
}

/// `score *= max(0, 1 - penalty * hits)`, clamped to [0, 1].
pub fn apply_negative_penalty(score: f32, hits: usize, weights: &ScoringWeights) -> f32 {
    let scaled = if hits > 0 {
        score * (1.0 - weights.negative_penalty * hits as f32).max(0.0)
    } else {
        score
    };
    scaled.clamp(0.0, 1.0)
}
