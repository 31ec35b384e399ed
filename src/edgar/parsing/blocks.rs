//! Walks cleaned filing markup in document order and emits typed blocks.

use ego_tree::{NodeId, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Element;
use scraper::Node;
use std::collections::HashSet;

use super::normalize::CleanDocument;
use super::types::Block;

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "big", "cite", "code", "del", "dfn", "em", "font", "i", "img",
    "ins", "kbd", "label", "mark", "q", "s", "samp", "small", "span", "strike", "strong", "sub",
    "sup", "tt", "u", "var", "ix:nonfraction", "ix:nonnumeric",
];

static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static INLINE_SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());

pub fn is_inline_element(element: &Element) -> bool {
    if INLINE_TAGS.contains(&element.name()) {
        return true;
    }
    element
        .attr("style")
        .map(|style| {
            let style = style.to_ascii_lowercase().replace(' ', "");
            style.contains("display:inline")
        })
        .unwrap_or(false)
}

/// Turns `\xa0` into a space and collapses whitespace runs. With
/// `keep_newlines` only runs of non-newline whitespace collapse.
pub fn collapse_whitespace(text: &str, keep_newlines: bool) -> String {
    let text = text.replace('\u{a0}', " ");
    if keep_newlines {
        INLINE_SPACE_RUN.replace_all(&text, " ").into_owned()
    } else {
        SPACE_RUN.replace_all(&text, " ").into_owned()
    }
}

/// Blocks found between one boundary node and the next.
#[derive(Debug, Clone, Default)]
pub struct Segment {
    /// Boundary that opened the segment; `None` for content before the first one.
    pub start: Option<NodeId>,
    pub blocks: Vec<Block>,
}

enum Step<'a> {
    Enter {
        node: NodeRef<'a, Node>,
        depth: usize,
        in_pre: bool,
    },
    Close {
        tag: &'a str,
        segment: usize,
        start: usize,
    },
}

struct Walker<'a> {
    doc: &'a CleanDocument,
    max_depth: usize,
    boundaries: &'a HashSet<NodeId>,
    segments: Vec<Segment>,
    truncated: bool,
}

impl<'a> Walker<'a> {
    fn blocks(&mut self) -> &mut Vec<Block> {
        // A walker always holds at least the leading segment.
        let last = self.segments.len() - 1;
        &mut self.segments[last].blocks
    }

    fn push(&mut self, block: Block) {
        self.blocks().push(block);
    }

    fn last_is_open_text(&mut self) -> bool {
        match self.blocks().last() {
            Some(last) => !last.is_standalone() && !last.ends_with_newline(),
            None => false,
        }
    }

    fn run(mut self) -> Vec<Segment> {
        let mut stack = vec![Step::Enter {
            node: self.doc.root(),
            depth: 0,
            in_pre: false,
        }];

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter {
                    node,
                    depth,
                    in_pre,
                } => self.enter(node, depth, in_pre, &mut stack),
                Step::Close {
                    tag,
                    segment,
                    start,
                } => {
                    let start = if segment == self.segments.len() - 1 { start } else { 0 };
                    if self.blocks().len() > start && self.last_is_open_text() {
                        self.push(Block::line_break(tag));
                    }
                }
            }
        }

        if self.truncated {
            log::warn!(
                "Markup nested deeper than {} levels; deeper content was skipped",
                self.max_depth
            );
        }
        self.segments
    }

    fn enter(
        &mut self,
        node: NodeRef<'a, Node>,
        depth: usize,
        in_pre: bool,
        stack: &mut Vec<Step<'a>>,
    ) {
        if self.boundaries.contains(&node.id()) {
            self.segments.push(Segment {
                start: Some(node.id()),
                blocks: Vec::new(),
            });
        }
        if self.doc.is_removed(node.id()) {
            return;
        }

        match node.value() {
            Node::Text(text) => {
                let (is_inline, tag) = node
                    .parent()
                    .and_then(|p| p.value().as_element().map(|e| (is_inline_element(e), e.name())))
                    .unwrap_or((false, "body"));
                // Whitespace-only nodes outside <pre> are source formatting.
                let keep_newlines = in_pre || !text.trim().is_empty();
                let content = collapse_whitespace(text, keep_newlines);
                if content.trim().is_empty() {
                    let at_line_start = match self.blocks().last() {
                        Some(last) => last.ends_with_newline() || last.is_standalone(),
                        None => true,
                    };
                    if at_line_start || content.is_empty() {
                        return;
                    }
                }
                self.push(Block::text(content, is_inline, tag));
            }
            Node::Element(element) => {
                if depth > self.max_depth {
                    self.truncated = true;
                    return;
                }
                let name = element.name();
                match name {
                    "br" => self.push(Block::line_break(name)),
                    "table" => {
                        if let Some(table) = table_block(self.doc, node, self.max_depth) {
                            self.push(table);
                        }
                    }
                    "ul" | "ol" => {
                        if let Some(list) = list_block(self.doc, node, name == "ol", self.max_depth) {
                            self.push(list);
                        }
                    }
                    "a" if is_external_link(element) => {
                        let content = collapse_whitespace(&flatten_text(self.doc, node, self.max_depth), false);
                        if !content.trim().is_empty() {
                            self.push(Block::Link {
                                content,
                                href: element.attr("href").unwrap_or_default().to_string(),
                                title: element.attr("title").map(str::to_string),
                            });
                        }
                    }
                    _ => {
                        let block_level = !is_inline_element(element);
                        if block_level {
                            if self.last_is_open_text() {
                                self.push(Block::line_break(name));
                            }
                            stack.push(Step::Close {
                                tag: name,
                                segment: self.segments.len() - 1,
                                start: self.blocks().len(),
                            });
                        }
                        let in_pre = in_pre || name == "pre";
                        let children: Vec<_> = node.children().collect();
                        for child in children.into_iter().rev() {
                            stack.push(Step::Enter {
                                node: child,
                                depth: depth + 1,
                                in_pre,
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn is_external_link(element: &Element) -> bool {
    element
        .attr("href")
        .map(|href| !href.trim().is_empty() && !href.trim_start().starts_with('#'))
        .unwrap_or(false)
}

/// All visible text below `node`, block boundaries turned into spaces.
pub fn flatten_text(doc: &CleanDocument, node: NodeRef<'_, Node>, max_depth: usize) -> String {
    let mut out = String::new();
    let mut stack = vec![(node, 0usize)];
    while let Some((current, depth)) = stack.pop() {
        if doc.is_removed(current.id()) || depth > max_depth {
            continue;
        }
        match current.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                if element.name() == "br" || !is_inline_element(element) {
                    out.push(' ');
                }
                let children: Vec<_> = current.children().collect();
                for child in children.into_iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
            _ => {}
        }
    }
    out
}

fn element_named<'a>(node: &NodeRef<'a, Node>, names: &[&str]) -> bool {
    node.value()
        .as_element()
        .map(|e| names.contains(&e.name()))
        .unwrap_or(false)
}

/// Rows of a table, without descending into nested tables.
pub fn table_rows<'a>(table: NodeRef<'a, Node>, max_depth: usize) -> Vec<NodeRef<'a, Node>> {
    let mut rows = Vec::new();
    let mut stack: Vec<(NodeRef<'a, Node>, usize)> = table.children().rev().map(|c| (c, 1)).collect();
    while let Some((node, depth)) = stack.pop() {
        if depth > max_depth {
            continue;
        }
        if element_named(&node, &["tr"]) {
            rows.push(node);
        } else if !element_named(&node, &["table"]) {
            stack.extend(node.children().rev().map(|c| (c, depth + 1)));
        }
    }
    rows
}

pub fn row_cells<'a>(row: NodeRef<'a, Node>) -> Vec<NodeRef<'a, Node>> {
    row.children()
        .filter(|c| element_named(c, &["td", "th"]))
        .collect()
}

fn table_block(doc: &CleanDocument, table: NodeRef<'_, Node>, max_depth: usize) -> Option<Block> {
    let caption = table
        .children()
        .find(|c| element_named(c, &["caption"]))
        .map(|c| collapse_whitespace(&flatten_text(doc, c, max_depth), false).trim().to_string())
        .filter(|c| !c.is_empty());

    let rows: Vec<Vec<String>> = table_rows(table, max_depth)
        .into_iter()
        .filter(|row| !doc.is_removed(row.id()))
        .map(|row| {
            row_cells(row)
                .into_iter()
                .map(|cell| {
                    collapse_whitespace(&flatten_text(doc, cell, max_depth), false)
                        .trim()
                        .to_string()
                })
                .collect::<Vec<_>>()
        })
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .collect();

    if rows.is_empty() && caption.is_none() {
        log::debug!("Skipping table without content");
        return None;
    }
    Some(Block::Table { rows, caption })
}

fn list_block(doc: &CleanDocument, list: NodeRef<'_, Node>, ordered: bool, max_depth: usize) -> Option<Block> {
    let items: Vec<String> = list
        .children()
        .filter(|c| element_named(c, &["li"]) && !doc.is_removed(c.id()))
        .map(|li| collapse_whitespace(&flatten_text(doc, li, max_depth), false).trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();

    if items.is_empty() {
        return None;
    }
    let mut content = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            if ordered {
                format!("{}. {}", i + 1, item)
            } else {
                format!("- {}", item)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    content.push('\n');
    Some(Block::List { ordered, content })
}

/// Ordered blocks of the whole cleaned document.
pub fn extract_blocks(doc: &CleanDocument, max_depth: usize) -> Vec<Block> {
    let none = HashSet::new();
    extract_segments(doc, max_depth, &none)
        .into_iter()
        .flat_map(|s| s.blocks)
        .collect()
}

/// Blocks split at each boundary node, in document order.
pub fn extract_segments(doc: &CleanDocument, max_depth: usize, boundaries: &HashSet<NodeId>) -> Vec<Segment> {
    Walker {
        doc,
        max_depth,
        boundaries,
        segments: vec![Segment::default()],
        truncated: false,
    }
    .run()
}
