//! Header-delimited section splitting and findings extraction.

use std::sync::LazyLock;

use regex::Regex;

use super::types::ReportSection;

/// Headers every report family shares.
pub const COMMON_HEADERS: &[&str] = &[
    r"INDICATIONS?",
    r"CLINICAL\s+(?:HISTORY|INDICATION|INFORMATION)",
    r"TECHNIQUE|PROCEDURE",
    r"COMPARISON",
    r"FINDINGS",
    r"CONCLUSIONS?|IMPRESSION|SUMMARY",
];

static FINDINGS_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:CONCLUSIONS?|IMPRESSION|SUMMARY|FINDINGS)\s*[:\-]?[ \t]*\n([\s\S]*?)(?:\n\s*\n|\z)")
        .expect("Invalid findings regex pattern")
});

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n\s*(?:\d+[\.\)]\s*|[-*•]\s*)").expect("Invalid list marker regex pattern")
});

/// Findings shorter than this are list debris ("None.", "See above").
const MIN_FINDING_LEN: usize = 11;

/// Splits text at known section headers. Each header must start a line.
pub struct SectionSplitter {
    header: Regex,
}

impl SectionSplitter {
    pub fn new(headers: &[&str]) -> Self {
        let combined = headers
            .iter()
            .map(|h| format!("(?:{h})"))
            .collect::<Vec<_>>()
            .join("|");
        let header = Regex::new(&format!(r"(?im)^[ \t]*({combined})[ \t]*[:\-]?[ \t]*"))
            .expect("Invalid section header pattern");
        Self { header }
    }

    /// Sections in document order. Headers with no content are dropped.
    pub fn split(&self, text: &str) -> Vec<ReportSection> {
        let matches: Vec<_> = self.header.captures_iter(text).collect();
        let mut sections = Vec::new();
        for (i, caps) in matches.iter().enumerate() {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let end = matches
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(text.len(), |m| m.start());
            let content = text[whole.end()..end].trim();
            if content.is_empty() {
                continue;
            }
            let name = name
                .as_str()
                .trim()
                .trim_end_matches([':', '-'])
                .trim();
            sections.push(ReportSection {
                name: collapse(name).to_uppercase(),
                content: content.to_string(),
            });
        }
        sections
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Numbered or bulleted lines under CONCLUSION / IMPRESSION / SUMMARY /
/// FINDINGS headings.
pub fn extract_findings(text: &str) -> Vec<String> {
    let mut findings = Vec::new();
    for caps in FINDINGS_BLOCK.captures_iter(text) {
        let Some(block) = caps.get(1) else { continue };
        let block = format!("\n{}", block.as_str().trim());
        for line in LIST_MARKER.split(&block) {
            let line = line.trim();
            if line.len() >= MIN_FINDING_LEN {
                findings.push(collapse(line));
            }
        }
    }
    findings
}
