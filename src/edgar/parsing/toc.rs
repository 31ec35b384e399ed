//! Section recovery through a filing's internal table of contents.
//!
//! Rows that carry both an `#anchor` link and a page number are resolved to
//! items, each anchor target is widened to the element that owns it, and the
//! document is sliced at those elements.

use ego_tree::{NodeId, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Node;
use std::collections::{HashMap, HashSet};

use super::blocks::{collapse_whitespace, extract_segments, flatten_text, is_inline_element, row_cells};
use super::classify::{item_header_id, normalize_item, normalize_part, part_header_id, ItemPattern};
use super::compress::compress_blocks;
use super::normalize::CleanDocument;
use super::section::Section;
use super::text::blocks_to_text;
use crate::edgar::structure::{FilingStructure, Strategy};

static PAGE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:page\s+)?(?:\d{1,3}|[ivxlc]{1,7}|F-\s?\d{1,3})$").unwrap());
static COMBINED_ITEMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^items?\s+(\d{1,2}[A-Z]?)\.?\s*(?:and|&|,)\s*(?:items?\s+)?(\d{1,2}[A-Z]?)\b").unwrap()
});
static PART_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^part\s+([IVX]+)\s*[,.:\-–—]?\s*item\s+(\d{1,2}(?:\.\s?\d{2})?[A-Z]?)\b").unwrap()
});
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Fewer resolved rows than this is a stray internal link, not a contents table.
const MIN_ENTRIES: usize = 2;

struct TocRow {
    text: String,
    target: Option<String>,
    has_page: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    part: Option<String>,
    item: String,
    target: String,
}

fn cell_text(doc: &CleanDocument, node: NodeRef<'_, Node>, max_depth: usize) -> String {
    collapse_whitespace(&flatten_text(doc, node, max_depth), false)
        .trim()
        .to_string()
}

fn internal_link(doc: &CleanDocument, row: NodeRef<'_, Node>) -> Option<String> {
    row.descendants()
        .filter(|n| !doc.is_removed(n.id()))
        .filter_map(|n| n.value().as_element())
        .filter(|e| e.name() == "a")
        .filter_map(|e| e.attr("href"))
        .find_map(|href| {
            let target = href.trim().strip_prefix('#')?;
            if target.is_empty() {
                None
            } else {
                Some(target.to_string())
            }
        })
}

fn toc_rows(doc: &CleanDocument, max_depth: usize) -> Vec<TocRow> {
    doc.visible_nodes(max_depth)
        .into_iter()
        .filter(|n| n.value().as_element().map(|e| e.name() == "tr").unwrap_or(false))
        .filter_map(|row| {
            let cells: Vec<String> = row_cells(row)
                .into_iter()
                .map(|cell| cell_text(doc, cell, max_depth))
                .filter(|text| !text.is_empty())
                .collect();
            let has_page = cells.iter().any(|c| PAGE_REF.is_match(c));
            let text = cells
                .iter()
                .filter(|c| !PAGE_REF.is_match(c))
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            if text.is_empty() {
                return None;
            }
            Some(TocRow {
                text,
                target: internal_link(doc, row),
                has_page,
            })
        })
        .collect()
}

fn normalized_words(text: &str) -> String {
    NON_WORD
        .replace_all(&text.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Catalog item whose title the row text spells out.
fn title_match(
    text: &str,
    structure: &FilingStructure,
    part: Option<&str>,
) -> Option<(Option<String>, String)> {
    let words = normalized_words(text);
    if words.is_empty() {
        return None;
    }
    structure
        .items()
        .filter(|(p, _)| match (part, p) {
            (Some(wanted), Some(p)) if structure.part_qualified => wanted == *p,
            _ => true,
        })
        .filter_map(|(p, description)| {
            let title = normalized_words(description.title);
            if title.is_empty() || !(words == title || words.starts_with(&format!("{} ", title))) {
                return None;
            }
            Some((title.len(), p, description.item))
        })
        .max_by_key(|(len, _, _)| *len)
        .map(|(_, p, item)| (p.map(str::to_string), item.to_string()))
}

enum RowMeaning {
    Items(Vec<(Option<String>, String)>),
    Part(String),
    Nothing,
}

fn interpret(text: &str, structure: &FilingStructure, current_part: Option<&str>) -> RowMeaning {
    if let Some(caps) = COMBINED_ITEMS.captures(text) {
        return RowMeaning::Items(vec![
            (None, normalize_item(&caps[1])),
            (None, normalize_item(&caps[2])),
        ]);
    }
    if let Some(caps) = PART_ITEM.captures(text) {
        return RowMeaning::Items(vec![(Some(normalize_part(&caps[1])), normalize_item(&caps[2]))]);
    }
    if let Some(item) = item_header_id(text, ItemPattern::Generic) {
        return RowMeaning::Items(vec![(None, item)]);
    }
    if let Some(part) = part_header_id(text) {
        return RowMeaning::Part(part);
    }
    match title_match(text, structure, current_part) {
        Some(found) => RowMeaning::Items(vec![found]),
        None => RowMeaning::Nothing,
    }
}

fn toc_entries(
    rows: &[TocRow],
    structure: &FilingStructure,
) -> (Vec<Entry>, Vec<String>) {
    let mut entries: Vec<Entry> = Vec::new();
    let mut part_targets = Vec::new();
    let mut current_part: Option<String> = None;

    for row in rows {
        match interpret(&row.text, structure, current_part.as_deref()) {
            RowMeaning::Part(part) => {
                current_part = Some(part);
                if let Some(target) = &row.target {
                    part_targets.push(target.clone());
                }
            }
            RowMeaning::Items(items) => {
                let target = match (&row.target, row.has_page) {
                    (Some(target), true) => target,
                    _ => continue,
                };
                for (part, item) in items {
                    if part.is_some() {
                        current_part = part.clone();
                    }
                    let part = part
                        .or_else(|| current_part.clone())
                        .or_else(|| structure.part_of(&item).map(str::to_string));
                    let qualifier = if structure.part_qualified { part.as_deref() } else { None };
                    if !structure.parts.is_empty() && !structure.is_valid_item(&item, qualifier) {
                        log::debug!("Contents row names unknown item {}: {}", item, row.text);
                        continue;
                    }
                    let duplicate = entries.iter().any(|e| {
                        e.item == item && (!structure.part_qualified || e.part == part)
                    });
                    if !duplicate {
                        entries.push(Entry {
                            part,
                            item,
                            target: target.clone(),
                        });
                    }
                }
            }
            RowMeaning::Nothing => {}
        }
    }

    (entries, part_targets)
}

fn anchor_index(doc: &CleanDocument, max_depth: usize) -> HashMap<String, NodeId> {
    let mut index = HashMap::new();
    for node in doc.visible_nodes(max_depth) {
        if let Some(element) = node.value().as_element() {
            let name = if element.name() == "a" { element.attr("name") } else { None };
            for key in element.id().into_iter().chain(name) {
                index.entry(key.to_string()).or_insert(node.id());
            }
        }
    }
    index
}

fn targets_within(node: NodeRef<'_, Node>, targets: &HashSet<NodeId>) -> usize {
    node.descendants().filter(|d| targets.contains(&d.id())).count()
}

fn is_element_named(node: NodeRef<'_, Node>, name: &str) -> bool {
    node.value().as_element().map(|e| e.name() == name).unwrap_or(false)
}

/// Widens an anchor target to the block that owns it, never to a container
/// shared with another target.
fn owning_block(target: NodeRef<'_, Node>, targets: &HashSet<NodeId>, root: NodeId) -> NodeId {
    let mut node = target;
    while node.value().as_element().map(is_inline_element).unwrap_or(true) {
        let parent = match node.parent() {
            Some(parent) if parent.id() != root => parent,
            _ => break,
        };
        if targets_within(parent, targets) > 1 {
            break;
        }
        node = parent;
    }

    let outer_table = node
        .ancestors()
        .take_while(|a| a.id() != root)
        .filter(|a| is_element_named(*a, "table"))
        .last();
    match outer_table {
        Some(table) if targets_within(table, targets) <= 1 => table.id(),
        _ => node.id(),
    }
}

/// Sections recovered from an internal table of contents; empty when the
/// filing has none.
pub fn anchor_sections(doc: &CleanDocument, structure: &FilingStructure, max_depth: usize) -> Vec<Section> {
    let rows = toc_rows(doc, max_depth);
    let (entries, part_targets) = toc_entries(&rows, structure);
    if entries.len() < MIN_ENTRIES {
        log::debug!("No usable table of contents ({} linked items)", entries.len());
        return Vec::new();
    }

    let index = anchor_index(doc, max_depth);
    let resolve = |target: &str| index.get(target).copied();
    let targets: HashSet<NodeId> = entries
        .iter()
        .map(|e| e.target.as_str())
        .chain(part_targets.iter().map(String::as_str))
        .filter_map(resolve)
        .collect();

    let root = doc.root().id();
    let mut owners: HashMap<NodeId, NodeId> = HashMap::new();
    for target in &targets {
        if let Some(node) = doc.html().tree.get(*target) {
            owners.insert(*target, owning_block(node, &targets, root));
        }
    }
    let boundaries: HashSet<NodeId> = owners.values().copied().collect();

    let segments = extract_segments(doc, max_depth, &boundaries);
    let texts: HashMap<NodeId, String> = segments
        .into_iter()
        .filter_map(|segment| {
            let start = segment.start?;
            let text = blocks_to_text(&compress_blocks(segment.blocks)).trim().to_string();
            Some((start, text))
        })
        .collect();

    let sections: Vec<Section> = entries
        .into_iter()
        .filter_map(|entry| {
            let owner = resolve(&entry.target).and_then(|t| owners.get(&t));
            let text = match owner.and_then(|o| texts.get(o)) {
                Some(text) if !text.is_empty() => text.clone(),
                _ => {
                    log::debug!("Anchor #{} for item {} has no content", entry.target, entry.item);
                    return None;
                }
            };
            Some(Section {
                part: entry.part,
                item: entry.item,
                text,
                strategy: Strategy::TocAnchors,
            })
        })
        .collect();

    log::debug!("Table of contents resolved {} sections", sections.len());
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ParseConfig;
    use crate::edgar::parsing::normalize::normalize;
    use crate::edgar::structure::{ANNUAL_REPORT, QUARTERLY_REPORT};

    const ANNUAL: &str = r##"<html><body>
        <p>ACME CORP ANNUAL REPORT</p>
        <table>
          <tr><td>PART I</td><td></td></tr>
          <tr><td><a href="#i1">Item 1.</a></td><td>Business</td><td>3</td></tr>
          <tr><td><a href="#i1a">Risk Factors</a></td><td>5</td></tr>
          <tr><td><a href="#i2">Items 2 and 3.</a></td><td>Properties; Legal Proceedings</td><td>7</td></tr>
          <tr><td>PART II</td></tr>
          <tr><td><a href="#i7">Item 7.</a></td><td>MD&amp;A</td><td>9</td></tr>
        </table>
        <p><a name="i1"></a>Item 1. Business</p>
        <p>We sell widgets.</p>
        <div id="i1a"><p>Item 1A. Risk Factors</p><p>Widgets can break.</p></div>
        <p><a name="i2"></a>Items 2 and 3. Properties; Legal Proceedings</p>
        <p>We own a plant. No litigation.</p>
        <p><a name="i7"></a>Item 7. Management's Discussion</p>
        <p>Revenue grew.</p>
    </body></html>"##;

    fn sections(html: &str, structure: &FilingStructure) -> Vec<Section> {
        let doc = normalize(html, &ParseConfig::default()).unwrap();
        anchor_sections(&doc, structure, 256)
    }

    fn text_of<'a>(sections: &'a [Section], item: &str) -> Option<&'a str> {
        sections.iter().find(|s| s.item == item).map(|s| s.text.as_str())
    }

    #[test]
    fn test_items_resolved_through_anchors() {
        let found = sections(ANNUAL, &ANNUAL_REPORT);
        let items: Vec<&str> = found.iter().map(|s| s.item.as_str()).collect();
        assert_eq!(items, vec!["1", "1A", "2", "3", "7"]);
        assert_eq!(text_of(&found, "1"), Some("Item 1. Business\nWe sell widgets."));
        assert_eq!(text_of(&found, "1A"), Some("Item 1A. Risk Factors\nWidgets can break."));
        assert_eq!(text_of(&found, "2"), text_of(&found, "3"));
        assert_eq!(text_of(&found, "7"), Some("Item 7. Management's Discussion\nRevenue grew."));
        assert!(found.iter().all(|s| s.strategy == Strategy::TocAnchors));
        assert_eq!(found[4].part.as_deref(), Some("II"));
    }

    #[test]
    fn test_part_qualified_rows() {
        let html = r##"<html><body><table>
            <tr><td><a href="#p1i1">Part I, Item 1</a></td><td>Financial Statements</td><td>2</td></tr>
            <tr><td><a href="#p2i1">Part II, Item 1</a></td><td>Legal Proceedings</td><td>20</td></tr>
            </table>
            <h2 id="p1i1">Item 1. Financial Statements</h2><p>Balance sheet.</p>
            <h2 id="p2i1">Item 1. Legal Proceedings</h2><p>None.</p>
            </body></html>"##;
        let found = sections(html, &QUARTERLY_REPORT);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].part.as_deref(), Some("I"));
        assert_eq!(found[1].part.as_deref(), Some("II"));
        assert_eq!(found[1].text, "Item 1. Legal Proceedings\nNone.");
    }

    #[test]
    fn test_without_contents_table_nothing_is_found() {
        let html = r##"<html><body><p><a href="#x">see below</a></p><p id="x">Item 1. Business</p></body></html>"##;
        assert!(sections(html, &ANNUAL_REPORT).is_empty());
    }
}
