//! Filings laid out around a "Cross Reference Index": a table mapping each
//! item to printed page numbers instead of inline item headers.

use ego_tree::NodeId;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::blocks::{collapse_whitespace, extract_segments, flatten_text, row_cells, table_rows};
use super::classify::{item_header_id, ItemPattern};
use super::compress::compress_blocks;
use super::normalize::CleanDocument;
use super::section::Section;
use super::text::blocks_to_text;
use crate::edgar::structure::{FilingStructure, Strategy};

static CROSS_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)cross[\s-]*reference\s+index").unwrap());
static PAGES_CELL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:pages?\s+)?\d{1,3}(?:\s*(?:-|–|—|to|through)\s*\d{1,3})?(?:\s*(?:,|;|and)\s*\d{1,3}(?:\s*(?:-|–|—|to|through)\s*\d{1,3})?)*$",
    )
    .unwrap()
});
static PAGE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{1,3})(?:\s*(?:-|–|—|to|through)\s*(\d{1,3}))?").unwrap());

const MIN_INDEX_ROWS: usize = 3;
const MAX_RANGE: u32 = 500;

/// Printed pages listed in an index cell, ranges expanded, in order.
pub fn parse_page_refs(cell: &str) -> Vec<u32> {
    let cell = cell.trim();
    if !PAGES_CELL.is_match(cell) {
        return Vec::new();
    }
    let mut pages = Vec::new();
    for caps in PAGE_RANGE.captures_iter(cell) {
        let start: u32 = match caps[1].parse() {
            Ok(start) => start,
            Err(_) => continue,
        };
        let end = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|end| *end >= start && end - start <= MAX_RANGE)
            .unwrap_or(start);
        pages.extend(start..=end);
    }
    pages
}

/// `(item, pages)` rows of the first table that reads as a cross reference index.
fn index_rows(doc: &CleanDocument, max_depth: usize) -> Vec<(String, Vec<u32>)> {
    for table in doc.visible_nodes(max_depth) {
        if !table.value().as_element().map(|e| e.name() == "table").unwrap_or(false) {
            continue;
        }
        let rows: Vec<(String, Vec<u32>)> = table_rows(table, max_depth)
            .into_iter()
            .filter_map(|row| {
                let cells: Vec<String> = row_cells(row)
                    .into_iter()
                    .map(|c| collapse_whitespace(&flatten_text(doc, c, max_depth), false).trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect();
                let position = cells
                    .iter()
                    .position(|c| item_header_id(c, ItemPattern::Generic).is_some())?;
                let item = item_header_id(&cells[position], ItemPattern::Generic)?;
                let pages = cells[position + 1..]
                    .iter()
                    .rev()
                    .map(|c| parse_page_refs(c))
                    .find(|pages| !pages.is_empty())?;
                Some((item, pages))
            })
            .collect();
        if rows.len() >= MIN_INDEX_ROWS {
            return rows;
        }
    }
    Vec::new()
}

/// Rendered content of each printed page, keyed by page number.
fn page_texts(doc: &CleanDocument, max_depth: usize) -> HashMap<u32, String> {
    let markers = doc.page_numbers();
    let boundaries = markers.iter().map(|(id, _)| *id).collect();
    let position: HashMap<NodeId, usize> = markers.iter().enumerate().map(|(i, (id, _))| (*id, i)).collect();

    let mut pages = HashMap::new();
    for segment in extract_segments(doc, max_depth, &boundaries) {
        // A folio closes its page: content before marker k is page k.
        let next = match segment.start {
            None => Some(0),
            Some(start) => position.get(&start).map(|i| i + 1),
        };
        let page = match next {
            Some(next) if next < markers.len() => markers[next].1,
            Some(_) => match markers.last() {
                Some((_, last)) => last + 1,
                None => continue,
            },
            None => continue,
        };
        let text = blocks_to_text(&compress_blocks(segment.blocks)).trim().to_string();
        if !text.is_empty() {
            pages.entry(page).or_insert(text);
        }
    }
    pages
}

/// Sections assembled from the pages a cross reference index lists per item.
pub fn cross_reference_sections(
    doc: &CleanDocument,
    structure: &FilingStructure,
    max_depth: usize,
) -> Vec<Section> {
    if doc.page_numbers().is_empty() {
        return Vec::new();
    }
    let heading = collapse_whitespace(&flatten_text(doc, doc.root(), max_depth), false);
    if !CROSS_REFERENCE.is_match(&heading) {
        return Vec::new();
    }
    let rows = index_rows(doc, max_depth);
    if rows.is_empty() {
        log::debug!("Cross reference index mentioned but no index table found");
        return Vec::new();
    }

    let pages = page_texts(doc, max_depth);
    let sections: Vec<Section> = rows
        .into_iter()
        .filter_map(|(item, numbers)| {
            let texts: Vec<&str> = numbers
                .iter()
                .filter_map(|n| pages.get(n).map(String::as_str))
                .collect();
            if texts.is_empty() {
                return None;
            }
            Some(Section {
                part: structure.part_of(&item).map(str::to_string),
                item,
                text: texts.join("\n"),
                strategy: Strategy::CrossReferenceIndex,
            })
        })
        .collect();

    log::debug!("Cross reference index resolved {} sections", sections.len());
    sections
}
