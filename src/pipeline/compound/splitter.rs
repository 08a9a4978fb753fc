//! Cutting a compound document into segments, and turning segments back
//! into standalone extraction results.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::config::CompoundConfig;
use crate::models::enums::ExtractionMethod;
use crate::pipeline::classification::registry::prefix_chars;
use crate::pipeline::extraction::{join_page_text, ExtractionResult, PageExtraction};

use super::detector::{patient_header_offsets, PATIENT_HEADER, REPORT_HEADER};
use super::Segment;

/// Split a multi-page document where a later page opens with a report-type
/// header or a patient header block. Returns nothing when no page qualifies.
pub(super) fn split_by_pages(extraction: &ExtractionResult, config: &CompoundConfig) -> Vec<Segment> {
    let mut pages: Vec<&PageExtraction> = extraction.pages.iter().collect();
    pages.sort_by_key(|p| p.page_number);
    let (Some(first), Some(last)) = (pages.first(), pages.last()) else {
        return Vec::new();
    };
    let (first_page, last_page) = (first.page_number, last.page_number);

    let split_pages: BTreeSet<usize> = pages
        .iter()
        .skip(1)
        .filter(|page| {
            REPORT_HEADER.is_match(prefix_chars(&page.text, config.report_header_snippet))
                || PATIENT_HEADER.is_match(prefix_chars(&page.text, config.patient_header_snippet))
        })
        .map(|page| page.page_number)
        .collect();
    if split_pages.is_empty() {
        return Vec::new();
    }

    let by_number: BTreeMap<usize, &PageExtraction> =
        pages.iter().map(|p| (p.page_number, *p)).collect();
    let mut boundaries = vec![first_page];
    boundaries.extend(split_pages);
    boundaries.push(last_page + 1);

    boundaries
        .windows(2)
        .filter_map(|window| {
            let (start, end) = (window[0], window[1]);
            let seg_pages: Vec<PageExtraction> = by_number
                .range(start..end)
                .map(|(_, page)| (*page).clone())
                .collect();
            if seg_pages.is_empty() {
                return None;
            }
            let tables = extraction
                .tables
                .iter()
                .filter(|t| (start..end).contains(&t.page_number))
                .cloned()
                .collect();
            Some(Segment {
                start_page: start,
                end_page: end - 1,
                text: join_page_text(&seg_pages),
                pages: seg_pages,
                tables,
                detected_type: None,
                confidence: 0.0,
            })
        })
        .collect()
}

/// Split pasted or single-page text at patient header blocks that sit more
/// than `min_header_spacing` characters after the previous cut.
pub(super) fn split_by_text(extraction: &ExtractionResult, config: &CompoundConfig) -> Vec<Segment> {
    let text = &extraction.full_text;
    let mut boundaries = vec![0usize];
    for offset in patient_header_offsets(text) {
        let previous = boundaries[boundaries.len() - 1];
        if text[previous..offset].chars().count() > config.min_header_spacing {
            boundaries.push(offset);
        }
    }
    if boundaries.len() < 2 {
        return Vec::new();
    }
    boundaries.push(text.len());

    let page_number = extraction.pages.first().map_or(1, |p| p.page_number);
    let confidence = extraction.pages.first().map_or(1.0, |p| p.confidence);

    boundaries
        .windows(2)
        .filter_map(|window| {
            let slice = text[window[0]..window[1]].trim();
            if slice.is_empty() {
                return None;
            }
            Some(Segment {
                start_page: page_number,
                end_page: page_number,
                text: slice.to_string(),
                pages: vec![PageExtraction {
                    page_number,
                    text: slice.to_string(),
                    extraction_method: ExtractionMethod::Split,
                    confidence,
                }],
                tables: Vec::new(),
                detected_type: None,
                confidence: 0.0,
            })
        })
        .collect()
}

/// A standalone extraction result for one segment. The document ID is
/// derived from the parent's, so re-splitting the same upload is stable.
pub fn segment_extraction(parent: &ExtractionResult, segment: &Segment, index: usize) -> ExtractionResult {
    let pages = if segment.pages.is_empty() {
        vec![PageExtraction {
            page_number: 1,
            text: segment.text.clone(),
            extraction_method: ExtractionMethod::Split,
            confidence: 1.0,
        }]
    } else {
        segment.pages.clone()
    };
    let page_numbers: BTreeSet<usize> = pages.iter().map(|p| p.page_number).collect();

    ExtractionResult {
        document_id: Uuid::new_v5(&parent.document_id, format!("segment:{index}").as_bytes()),
        input_mode: parent.input_mode,
        full_text: segment.text.clone(),
        pages,
        tables: segment.tables.clone(),
        page_types: parent
            .page_types
            .iter()
            .filter(|d| page_numbers.contains(&d.page_number))
            .cloned()
            .collect(),
        filename: parent.filename.clone(),
    }
}

/// Every segment as its own extraction result, in document order.
pub fn split_extraction_result(parent: &ExtractionResult, segments: &[Segment]) -> Vec<ExtractionResult> {
    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| segment_extraction(parent, segment, index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{InputMode, PageType};
    use crate::pipeline::extraction::{ExtractedTable, PageDetection};

    fn page(page_number: usize, text: &str) -> PageExtraction {
        PageExtraction {
            page_number,
            text: text.to_string(),
            extraction_method: ExtractionMethod::PdfDirect,
            confidence: 0.95,
        }
    }

    fn table(page_number: usize) -> ExtractedTable {
        ExtractedTable {
            page_number,
            table_index: 0,
            headers: vec!["Test".into(), "Result".into()],
            rows: vec![vec!["Glucose".into(), "98".into()]],
        }
    }

    #[test]
    fn pages_split_at_report_headers() {
        let mut er = ExtractionResult::from_pages(
            InputMode::Pdf,
            vec![
                page(1, "ECHOCARDIOGRAM REPORT\nLVEF 60%"),
                page(2, "Wall motion normal."),
                page(3, "LABORATORY RESULTS\nGlucose 98"),
            ],
        );
        er.tables = vec![table(3)];
        let segments = split_by_pages(&er, &CompoundConfig::default());
        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].start_page, segments[0].end_page), (1, 2));
        assert_eq!((segments[1].start_page, segments[1].end_page), (3, 3));
        assert!(segments[0].text.contains("Wall motion"));
        assert!(segments[0].tables.is_empty());
        assert_eq!(segments[1].tables.len(), 1);
    }

    #[test]
    fn pages_split_at_patient_header() {
        let er = ExtractionResult::from_pages(
            InputMode::Pdf,
            vec![page(1, "Report one"), page(2, "Patient Name: Jane Roe\nReport two")],
        );
        let segments = split_by_pages(&er, &CompoundConfig::default());
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn header_deep_in_page_does_not_split() {
        let filler = "x".repeat(250);
        let er = ExtractionResult::from_pages(
            InputMode::Pdf,
            vec![page(1, "Report"), page(2, &format!("{filler}\nECHOCARDIOGRAM\n"))],
        );
        assert!(split_by_pages(&er, &CompoundConfig::default()).is_empty());
    }

    #[test]
    fn text_split_ignores_close_headers() {
        let body = "Narrative text. ".repeat(40);
        let text = format!(
            "Patient Name: A\nMRN: 1\n{body}\nPatient Name: B\nMRN: 2\n{body}"
        );
        let er = ExtractionResult::from_text(text);
        let segments = split_by_text(&er, &CompoundConfig::default());
        assert_eq!(segments.len(), 2);
        assert!(segments[0].text.starts_with("Patient Name: A"));
        assert!(segments[1].text.starts_with("Patient Name: B"));
        assert_eq!(segments[1].pages[0].extraction_method, ExtractionMethod::Split);
    }

    #[test]
    fn text_without_spaced_headers_yields_nothing() {
        let er = ExtractionResult::from_text("Patient Name: A\nMRN: 1\nShort report.");
        assert!(split_by_text(&er, &CompoundConfig::default()).is_empty());
    }

    #[test]
    fn segment_results_are_standalone_and_stable() {
        let mut er = ExtractionResult::from_pages(
            InputMode::Pdf,
            vec![page(1, "ECHOCARDIOGRAM\nLVEF 60%"), page(2, "LAB RESULTS\nGlucose 98")],
        );
        er.tables = vec![table(2)];
        er.page_types = vec![
            PageDetection { page_number: 1, page_type: PageType::Text },
            PageDetection { page_number: 2, page_type: PageType::Scanned },
        ];
        er.filename = Some("bundle.pdf".into());

        let segments = split_by_pages(&er, &CompoundConfig::default());
        let parts = split_extraction_result(&er, &segments);
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.validate().is_ok()));
        assert_eq!(parts[1].full_text, "LAB RESULTS\nGlucose 98");
        assert_eq!(parts[1].page_types.len(), 1);
        assert_eq!(parts[1].tables.len(), 1);
        assert_eq!(parts[0].filename.as_deref(), Some("bundle.pdf"));
        assert_ne!(parts[0].document_id, parts[1].document_id);
        let again = split_extraction_result(&er, &segments);
        assert_eq!(parts[0].document_id, again[0].document_id);
    }
}
