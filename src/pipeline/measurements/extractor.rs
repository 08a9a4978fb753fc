//! Declarative measurement extraction.
//!
//! Each [`MeasurementDef`] lists patterns in priority order. Patterns are
//! written with placeholders that expand to named captures:
//!
//! | Placeholder | Expands to                                   |
//! |-------------|----------------------------------------------|
//! | `{NUM}`     | unsigned decimal, captured as `value`        |
//! | `{SNUM}`    | signed decimal, captured as `value`          |
//! | `{RANGE}`   | `low`-`high` pair; the midpoint is the value |
//! | `{SEP}`     | label/value separator (`:`, `=`, spaces)     |
//!
//! A match whose value falls outside the definition's sanity bounds is
//! skipped (page numbers and dates otherwise leak in as lab values).

use std::collections::HashSet;

use regex::{Captures, Match, Regex};
use serde::{Deserialize, Serialize};

use crate::pipeline::extraction::ExtractionResult;

const NUM: &str = r"(?P<value>\d+(?:\.\d+)?)";
const SNUM: &str = r"(?P<value>[-−]?\s?\d+(?:\.\d+)?)";
const RANGE: &str = r"(?P<low>\d+(?:\.\d+)?)\s*(?:-|–|to)\s*(?P<high>\d+(?:\.\d+)?)";
const SEP: &str = r"[\s:=]+";

/// One measurement the extractor knows how to find.
#[derive(Debug, Clone, Copy)]
pub struct MeasurementDef {
    pub name: &'static str,
    pub abbreviation: &'static str,
    pub unit: &'static str,
    pub patterns: &'static [&'static str],
    /// Inclusive sanity bounds.
    pub min: f64,
    pub max: f64,
}

/// A numeric match before severity classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub name: String,
    pub abbreviation: String,
    pub value: f64,
    pub unit: String,
    pub raw_text: String,
    /// Byte offset into the scanned text; `None` for table cells.
    pub offset: Option<usize>,
    pub page_number: Option<usize>,
}

struct CompiledDef {
    def: &'static MeasurementDef,
    patterns: Vec<Regex>,
}

/// Compiled form of a definition list. Build once inside a `LazyLock`.
pub struct MeasurementTable {
    entries: Vec<CompiledDef>,
}

/// Substitute placeholders and make the pattern case-insensitive.
pub fn expand_pattern(pattern: &str) -> String {
    let expanded = pattern
        .replace("{NUM}", NUM)
        .replace("{SNUM}", SNUM)
        .replace("{RANGE}", RANGE)
        .replace("{SEP}", SEP);
    format!("(?i){expanded}")
}

impl MeasurementTable {
    /// Compile static definitions. Patterns are compile-time constants, so a
    /// bad one is a programming error.
    pub fn compile(defs: &'static [MeasurementDef]) -> Self {
        let entries = defs
            .iter()
            .map(|def| CompiledDef {
                def,
                patterns: def
                    .patterns
                    .iter()
                    .map(|p| Regex::new(&expand_pattern(p)).expect("Invalid measurement pattern"))
                    .collect(),
            })
            .collect();
        Self { entries }
    }

    pub fn defs(&self) -> impl Iterator<Item = &'static MeasurementDef> + '_ {
        self.entries.iter().map(|e| e.def)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scan `text` for every definition. At most one result per abbreviation,
    /// in definition order. Page numbers are resolved against `extraction`:
    /// by match offset when `text` is its full text, otherwise by searching
    /// the pages for the matched snippet.
    pub fn extract(&self, text: &str, extraction: &ExtractionResult) -> Vec<RawMeasurement> {
        let scanning_full_text = text == extraction.full_text;
        self.entries
            .iter()
            .filter_map(|entry| {
                entry.first_match(text).map(|(value, m)| {
                    let raw_text = m.as_str().trim().to_string();
                    let page_number = scanning_full_text
                        .then(|| extraction.page_at_offset(m.start()))
                        .flatten()
                        .or_else(|| extraction.page_containing(&raw_text));
                    RawMeasurement {
                        name: entry.def.name.to_string(),
                        abbreviation: entry.def.abbreviation.to_string(),
                        value,
                        unit: entry.def.unit.to_string(),
                        page_number,
                        raw_text,
                        offset: Some(m.start()),
                    }
                })
            })
            .collect()
    }

    /// Run the same patterns over table rows (cells joined by spaces) for
    /// abbreviations not already present in `found`.
    pub fn extract_from_tables(&self, extraction: &ExtractionResult, found: &mut Vec<RawMeasurement>) {
        let mut seen: HashSet<String> = found.iter().map(|m| m.abbreviation.clone()).collect();

        for table in &extraction.tables {
            for row in &table.rows {
                let line = row
                    .iter()
                    .map(|cell| cell.trim())
                    .filter(|cell| !cell.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                if line.is_empty() {
                    continue;
                }
                for entry in &self.entries {
                    if seen.contains(entry.def.abbreviation) {
                        continue;
                    }
                    if let Some((value, m)) = entry.first_match(&line) {
                        seen.insert(entry.def.abbreviation.to_string());
                        found.push(RawMeasurement {
                            name: entry.def.name.to_string(),
                            abbreviation: entry.def.abbreviation.to_string(),
                            value,
                            unit: entry.def.unit.to_string(),
                            raw_text: m.as_str().trim().to_string(),
                            offset: None,
                            page_number: Some(table.page_number),
                        });
                    }
                }
            }
        }
    }
}

impl CompiledDef {
    fn first_match<'t>(&self, text: &'t str) -> Option<(f64, Match<'t>)> {
        for pattern in &self.patterns {
            for caps in pattern.captures_iter(text) {
                let Some(value) = captured_value(&caps) else {
                    continue;
                };
                if value < self.def.min || value > self.def.max {
                    continue;
                }
                return caps.get(0).map(|whole| (value, whole));
            }
        }
        None
    }
}

fn captured_value(caps: &Captures<'_>) -> Option<f64> {
    if let (Some(low), Some(high)) = (caps.name("low"), caps.name("high")) {
        let low = parse_number(low.as_str())?;
        let high = parse_number(high.as_str())?;
        if low >= high {
            return None;
        }
        return Some(((low + high) / 2.0 * 10.0).round() / 10.0);
    }
    caps.name("value").and_then(|v| parse_number(v.as_str()))
}

/// Parse a captured number, accepting a Unicode minus and a stray space after
/// the sign ("- 1.8" is common in OCR output).
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '−' { '-' } else { c })
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
