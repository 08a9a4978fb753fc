use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ExtractionError;
use crate::models::enums::{ExtractionMethod, InputMode, PageType};

/// Text extracted from a single document, as handed over by the OCR/PDF stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub document_id: Uuid,
    pub input_mode: InputMode,
    pub full_text: String,
    pub pages: Vec<PageExtraction>,
    #[serde(default)]
    pub tables: Vec<ExtractedTable>,
    /// Optional per-page text/scanned classification.
    #[serde(default)]
    pub page_types: Vec<PageDetection>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Per-page extraction result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtraction {
    pub page_number: usize,
    pub text: String,
    pub extraction_method: ExtractionMethod,
    pub confidence: f32,
}

/// Table found on a page, headers plus row cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub page_number: usize,
    pub table_index: usize,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageDetection {
    pub page_number: usize,
    pub page_type: PageType,
}

impl ExtractionResult {
    /// Wrap pasted text as a single-page document.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            document_id: Uuid::new_v4(),
            input_mode: InputMode::Text,
            pages: vec![PageExtraction {
                page_number: 1,
                text: text.clone(),
                extraction_method: ExtractionMethod::PlainText,
                confidence: 1.0,
            }],
            full_text: text,
            tables: Vec::new(),
            page_types: Vec::new(),
            filename: None,
        }
    }

    /// Build from ordered pages; `full_text` is the pages joined by blank lines.
    pub fn from_pages(input_mode: InputMode, pages: Vec<PageExtraction>) -> Self {
        let full_text = join_page_text(&pages);
        Self {
            document_id: Uuid::new_v4(),
            input_mode,
            full_text,
            pages,
            tables: Vec::new(),
            page_types: Vec::new(),
            filename: None,
        }
    }

    /// Structural validation. Content is never judged here: an empty or
    /// unrecognisable document is valid input that simply detects as unknown.
    pub fn validate(&self) -> Result<(), ExtractionError> {
        let mut seen = BTreeSet::new();
        let mut previous = 0usize;
        for page in &self.pages {
            if page.page_number == 0 {
                return Err(ExtractionError::InvalidPageNumber);
            }
            if !seen.insert(page.page_number) {
                return Err(ExtractionError::DuplicatePage(page.page_number));
            }
            if page.page_number < previous {
                return Err(ExtractionError::UnorderedPages {
                    page: page.page_number,
                    after: previous,
                });
            }
            previous = page.page_number;
            if !(0.0..=1.0).contains(&page.confidence) {
                return Err(ExtractionError::ConfidenceOutOfRange {
                    page: page.page_number,
                    confidence: page.confidence,
                });
            }
        }

        for table in &self.tables {
            if !seen.contains(&table.page_number) {
                return Err(ExtractionError::OrphanTable {
                    table_index: table.table_index,
                    page: table.page_number,
                });
            }
        }

        for detection in &self.page_types {
            if !seen.contains(&detection.page_number) {
                return Err(ExtractionError::OrphanPageType(detection.page_number));
            }
        }

        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page holding byte `offset` of `full_text`. Only answers when
    /// `full_text` is laid out as the pages joined by [`PAGE_SEPARATOR`];
    /// an offset inside a separator belongs to the page that follows.
    pub fn page_at_offset(&self, offset: usize) -> Option<usize> {
        let mut cursor = 0;
        for page in self.pages.iter().filter(|p| !p.text.is_empty()) {
            let end = cursor + page.text.len();
            if self.full_text.get(cursor..end) != Some(page.text.as_str()) {
                return None;
            }
            if offset < end {
                return Some(page.page_number);
            }
            cursor = end + PAGE_SEPARATOR.len();
        }
        None
    }

    /// Page number whose text contains `snippet`, if any. Whitespace runs are
    /// collapsed on both sides since OCR line breaks rarely survive intact.
    pub fn page_containing(&self, snippet: &str) -> Option<usize> {
        let needle = collapse_whitespace(snippet);
        if needle.is_empty() {
            return None;
        }
        self.pages
            .iter()
            .find(|p| collapse_whitespace(&p.text).contains(&needle))
            .map(|p| p.page_number)
    }
}

pub const PAGE_SEPARATOR: &str = "\n\n";

/// Join page texts the way the extraction stage builds `full_text`.
pub fn join_page_text(pages: &[PageExtraction]) -> String {
    pages
        .iter()
        .filter(|p| !p.text.is_empty())
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
