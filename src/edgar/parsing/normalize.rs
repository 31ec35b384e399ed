//! Filing markup clean-up ahead of block extraction.
//!
//! The parsed tree is never mutated. Cleaning produces a set of node ids the
//! later passes must skip, which keeps the original tree available for the
//! anchor-based strategies that need page numbers and link targets.

use ego_tree::{NodeId, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};
use std::collections::HashSet;

use super::blocks::is_inline_element;
use super::header::unwrap_text;
use crate::core::config::ParseConfig;

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(?:html|body|div|p|table|font|span|br|center|h[1-6])[\s>/]").unwrap()
});
static TOC_LINK_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:back\s+to\s+|return\s+to\s+)?table\s+of\s+contents\s*$").unwrap()
});
static PAGE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:page\s+)?-?\s*(\d{1,3})\s*-?\s*$").unwrap());

const STRIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "head", "title", "meta", "link", "noscript", "ix:header", "xml",
];
/// Upper bound of nodes inspected when testing whether an ancestor still holds only a page number.
const PAGE_NUMBER_SCAN_LIMIT: usize = 64;

/// Cleaned filing markup: the parsed tree plus the nodes removed from it.
pub struct CleanDocument {
    html: Html,
    removed: HashSet<NodeId>,
    page_numbers: Vec<(NodeId, u32)>,
    root: NodeId,
}

impl CleanDocument {
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// The `<body>` element, or the document element when there is none.
    pub fn root(&self) -> NodeRef<'_, Node> {
        self.html
            .tree
            .get(self.root)
            .unwrap_or_else(|| self.html.tree.root())
    }

    pub fn is_removed(&self, id: NodeId) -> bool {
        self.removed.contains(&id)
    }

    /// Removed page-number elements with their printed values, in document order.
    pub fn page_numbers(&self) -> &[(NodeId, u32)] {
        &self.page_numbers
    }

    /// Nodes below the root that survived cleaning, in document order.
    pub fn visible_nodes(&self, max_depth: usize) -> Vec<NodeRef<'_, Node>> {
        let mut nodes = Vec::new();
        let mut stack = vec![(self.root(), 0usize)];
        while let Some((node, depth)) = stack.pop() {
            if self.is_removed(node.id()) || depth > max_depth {
                continue;
            }
            nodes.push(node);
            stack.extend(node.children().rev().map(|c| (c, depth + 1)));
        }
        nodes
    }
}

/// Whether the text carries HTML structure at all (legacy filings are plain text in SGML).
pub fn looks_like_html(text: &str) -> bool {
    if text.trim().is_empty() || text.contains('\0') || text.trim_start().starts_with("%PDF") {
        return false;
    }
    MARKUP_TAG.is_match(text)
}

/// Parse and clean a raw filing. `None` means the input is not an HTML document.
pub fn normalize(raw: &str, config: &ParseConfig) -> Option<CleanDocument> {
    let body = unwrap_text(raw, config.wrapper_scan_chars);
    if !looks_like_html(body) {
        log::debug!("Input carries no HTML structure, treating it as plain text");
        return None;
    }

    let html = Html::parse_document(body);
    let root = html
        .select(&BODY)
        .next()
        .map(|b| b.id())
        .unwrap_or_else(|| html.root_element().id());

    let mut removed = HashSet::new();
    let numeric_texts = mark_removed(&html, root, config.max_depth, &mut removed);
    let page_numbers = page_number_runs(&html, root, &numeric_texts);
    log::debug!(
        "Normalizer removed {} nodes and {} page numbers",
        removed.len(),
        page_numbers.len()
    );
    removed.extend(page_numbers.iter().map(|(id, _)| *id));

    Some(CleanDocument {
        html,
        removed,
        page_numbers,
        root,
    })
}

fn is_hidden(element: &scraper::node::Element) -> bool {
    element
        .attr("style")
        .map(|style| {
            let style = style.to_ascii_lowercase().replace(' ', "");
            style.contains("display:none")
        })
        .unwrap_or(false)
}

fn element_text(node: NodeRef<'_, Node>) -> String {
    node.descendants()
        .filter_map(|n| n.value().as_text().map(|t| String::from(&**t)))
        .collect()
}

/// Marks stripped nodes and returns the numeric-looking text nodes found outside tables.
fn mark_removed(
    html: &Html,
    root: NodeId,
    max_depth: usize,
    removed: &mut HashSet<NodeId>,
) -> Vec<NodeId> {
    let mut numeric_texts = Vec::new();
    let root = match html.tree.get(root) {
        Some(root) => root,
        None => return numeric_texts,
    };

    let mut stack = vec![(root, 0usize, false)];
    while let Some((node, depth, in_table)) = stack.pop() {
        match node.value() {
            Node::Comment(_) => {
                removed.insert(node.id());
                continue;
            }
            Node::Text(text) => {
                if !in_table && PAGE_NUMBER.is_match(text) {
                    numeric_texts.push(node.id());
                }
                continue;
            }
            Node::Element(element) => {
                let name = element.name();
                if STRIPPED_ELEMENTS.contains(&name) || is_hidden(element) {
                    removed.insert(node.id());
                    continue;
                }
                if name == "a" && TOC_LINK_TEXT.is_match(&element_text(node)) {
                    removed.insert(node.id());
                    continue;
                }
            }
            _ => {}
        }

        if depth >= max_depth {
            continue;
        }
        let in_table = in_table
            || node
                .value()
                .as_element()
                .map(|e| e.name() == "table")
                .unwrap_or(false);
        let children: Vec<_> = node.children().collect();
        for child in children.into_iter().rev() {
            stack.push((child, depth + 1, in_table));
        }
    }

    numeric_texts
}

/// True when the subtree holds nothing but whitespace and `expected`.
fn holds_only(node: NodeRef<'_, Node>, expected: &str) -> bool {
    let mut seen = String::new();
    for (visited, n) in node.descendants().enumerate() {
        if visited > PAGE_NUMBER_SCAN_LIMIT {
            return false;
        }
        if let Some(text) = n.value().as_text() {
            seen.push_str(text.trim());
            if seen.len() > expected.len() {
                return false;
            }
        }
    }
    seen == expected
}

/// Outermost block-level element around a numeric text node, when that
/// element holds nothing else.
fn page_number_container(text_node: NodeRef<'_, Node>, root: NodeId) -> Option<(NodeId, u32)> {
    let raw = text_node.value().as_text()?;
    let value = PAGE_NUMBER
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())?;
    let expected = raw.trim().to_string();

    let mut container = None;
    let mut current = text_node.parent();
    while let Some(node) = current {
        if node.id() == root || !node.value().is_element() || !holds_only(node, &expected) {
            break;
        }
        container = Some(node);
        current = node.parent();
    }

    let container = container?;
    let element = container.value().as_element()?;
    if is_inline_element(element) {
        return None;
    }
    Some((container.id(), value))
}

/// Page-number elements that belong to runs of two or more consecutive values.
///
/// A lone number is kept: it is as likely to be a real figure as a folio.
fn page_number_runs(html: &Html, root: NodeId, numeric_texts: &[NodeId]) -> Vec<(NodeId, u32)> {
    let mut candidates: Vec<(NodeId, u32)> = Vec::new();
    for id in numeric_texts {
        if let Some(node) = html.tree.get(*id) {
            if let Some(found) = page_number_container(node, root) {
                if candidates.last().map(|(last, _)| *last) != Some(found.0) {
                    candidates.push(found);
                }
            }
        }
    }

    let mut pages = Vec::new();
    let mut run: Vec<(NodeId, u32)> = Vec::new();
    for candidate in candidates {
        let continues = run
            .last()
            .map(|(_, last)| candidate.1 == last + 1)
            .unwrap_or(false);
        if !continues {
            if run.len() >= 2 {
                pages.append(&mut run);
            }
            run.clear();
        }
        run.push(candidate);
    }
    if run.len() >= 2 {
        pages.append(&mut run);
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::ElementRef;

    fn visible_text(doc: &CleanDocument) -> String {
        let mut out = String::new();
        let mut stack = vec![doc.root()];
        while let Some(node) = stack.pop() {
            if doc.is_removed(node.id()) {
                continue;
            }
            if let Some(text) = node.value().as_text() {
                out.push_str(text);
                out.push(' ');
            }
            let children: Vec<_> = node.children().collect();
            stack.extend(children.into_iter().rev());
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_non_markup_is_not_a_document() {
        let config = ParseConfig::default();
        assert!(normalize("", &config).is_none());
        assert!(normalize("%PDF-1.4 binary", &config).is_none());
        assert!(normalize("ITEM 5.  OTHER EVENTS\nNothing to report.", &config).is_none());
        assert!(normalize("<html><body><p>x</p></body></html>", &config).is_some());
    }

    #[test]
    fn test_strips_scripts_comments_and_toc_links() {
        let html = r##"<html><head><title>t</title></head><body>
            <script>var x = 1;</script><style>p {}</style>
            <!-- generated -->
            <div style="display: none"><ix:header>hidden</ix:header></div>
            <p>Item 1. Business</p>
            <a href="#toc">Table of Contents</a>
            <p>We make things.</p>
        </body></html>"##;
        let doc = normalize(html, &ParseConfig::default()).unwrap();
        assert_eq!(visible_text(&doc), "Item 1. Business We make things.");
        assert!(ElementRef::wrap(doc.root()).is_some());
    }

    #[test]
    fn test_sequential_page_numbers_removed_lone_number_kept() {
        let html = r#"<html><body>
            <p>Intro</p><p>7</p>
            <p>Body text</p><p>12</p>
            <p>More text</p><p><font>13</font></p>
            <p>Even more</p><div>14</div>
            <p>Revenue grew <span>3</span> percent</p>
        </body></html>"#;
        let doc = normalize(html, &ParseConfig::default()).unwrap();
        assert_eq!(
            visible_text(&doc),
            "Intro 7 Body text More text Even more Revenue grew 3 percent"
        );
        let pages: Vec<u32> = doc.page_numbers().iter().map(|(_, page)| *page).collect();
        assert_eq!(pages, vec![12, 13, 14]);
    }

    #[test]
    fn test_numbers_inside_tables_are_data() {
        let html = "<html><body><table><tr><td>1</td></tr><tr><td>2</td></tr></table></body></html>";
        let doc = normalize(html, &ParseConfig::default()).unwrap();
        assert_eq!(visible_text(&doc), "1 2");
    }

    #[test]
    fn test_sgml_wrapper_is_unwrapped() {
        let raw = "<DOCUMENT>\n<TYPE>10-K\n<TEXT>\n<html><body><p>Annual report</p></body></html>\n</TEXT>\n</DOCUMENT>";
        let doc = normalize(raw, &ParseConfig::default()).unwrap();
        assert_eq!(visible_text(&doc), "Annual report");
    }
}
