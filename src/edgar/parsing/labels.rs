//! Part/Item labels per chunk, forward-filled across the chunk sequence.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

use super::classify::{
    item_header_id, item_label, normalize_item, normalize_part, part_header_id, part_label,
    ItemPattern,
};
use super::types::{Block, Chunk, ChunkFlags, Label, LabeledChunk};

/// Leading characters inspected for a table-of-contents signature.
const TOC_SCAN_CHARS: usize = 100;
const TOC_ITEM_MENTIONS: usize = 10;
const TOC_TABLE_ITEM_CELLS: usize = 3;
const PREVIEW_CHARS: usize = 80;

static ITEM_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bitem").unwrap());
static SIGNATURE_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*SIGNATURES?\b").unwrap());
static SIGNATURE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*signatures?\s*$").unwrap());
static SIGNED_ON_BEHALF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)to\s+be\s+signed\s+on\s+its\s+behalf\s+by\s+the\s+undersigned").unwrap()
});

fn is_toc(chunk: &Chunk, text: &str, pattern: ItemPattern) -> bool {
    if let [Block::Table { rows, .. }] = chunk.blocks() {
        let item_cells = rows
            .iter()
            .flatten()
            .filter(|cell| item_header_id(cell, pattern).is_some())
            .count();
        if item_cells >= TOC_TABLE_ITEM_CELLS {
            return true;
        }
    }
    let head: String = text
        .split_whitespace()
        .join(" ")
        .chars()
        .take(TOC_SCAN_CHARS)
        .collect();
    ITEM_WORD.find_iter(&head).count() > TOC_ITEM_MENTIONS
}

fn is_signature(text: &str) -> bool {
    SIGNATURE_START.is_match(text)
        || text
            .trim_start()
            .lines()
            .next()
            .map(|line| SIGNATURE_LINE.is_match(line))
            .unwrap_or(false)
        || SIGNED_ON_BEHALF.is_match(text)
}

/// Only single-row tables can carry a heading; larger ones are data.
fn detects_headers(chunk: &Chunk) -> bool {
    match chunk.blocks() {
        [Block::Table { rows, .. }] => rows.len() == 1,
        _ => true,
    }
}

fn detect(chunk: &Chunk, pattern: ItemPattern) -> (Label, ChunkFlags, String) {
    let text = chunk.text();
    let headers = detects_headers(chunk);
    let item = if headers { item_header_id(&text, pattern) } else { None };
    let part = if headers { part_header_id(&text) } else { None };
    let flags = ChunkFlags {
        item_header: item.is_some(),
        part_header: part.is_some(),
        toc: is_toc(chunk, &text, pattern),
        signature: is_signature(&text),
        table: chunk.is_table(),
    };
    let label = Label {
        part: part.map(|p| part_label(&p)),
        item: item.map(|i| item_label(&i)),
    };
    (label, flags, text)
}

/// Labels every chunk.
///
/// Part and item are carried independently until a new value is detected.
/// Table-of-contents chunks never contribute a label. Everything from the
/// first signature chunk on is unlabeled.
pub fn label_chunks(chunks: &[Chunk], pattern: ItemPattern) -> Vec<LabeledChunk> {
    let mut labeled = Vec::with_capacity(chunks.len());
    let mut carried = Label::default();
    let mut signed = false;

    for (index, chunk) in chunks.iter().enumerate() {
        let (detected, flags, text) = detect(chunk, pattern);
        signed = signed || flags.signature;

        let label = if signed {
            carried = Label::default();
            Label::default()
        } else if flags.toc {
            Label::default()
        } else {
            if detected.part.is_some() {
                carried.part = detected.part;
            }
            if detected.item.is_some() {
                carried.item = detected.item;
            }
            carried.clone()
        };

        labeled.push(LabeledChunk {
            index,
            label,
            flags,
            text,
        });
    }

    labeled
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        format!("{}...", flat.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        flat
    }
}

fn matches_item(chunk: &LabeledChunk, item: &str) -> bool {
    chunk
        .label
        .item
        .as_deref()
        .map(|found| normalize_item(found) == item)
        .unwrap_or(false)
}

fn matches_part(chunk: &LabeledChunk, part: &str) -> bool {
    chunk
        .label
        .part
        .as_deref()
        .map(|found| normalize_part(found) == part)
        .unwrap_or(false)
}

/// Part and text of the chunks labeled with `item`.
///
/// With `part_qualified` set, hits must also agree on the part; when no part
/// is requested the part of the first hit is used. Scattered hits keep only
/// the longest contiguous run that contains the item's own header; an item
/// carried across a part heading never forms a section in the new part.
pub fn item_text(
    chunks: &[LabeledChunk],
    item: &str,
    part: Option<&str>,
    part_qualified: bool,
) -> Option<(Option<String>, String)> {
    let item = normalize_item(item);
    let mut part = part.map(normalize_part);
    if part_qualified && part.is_none() {
        part = chunks
            .iter()
            .find(|c| matches_item(c, &item))
            .and_then(|c| c.label.part.as_deref())
            .map(normalize_part);
    }

    let hits: Vec<usize> = chunks
        .iter()
        .filter(|c| matches_item(c, &item))
        .filter(|c| match (&part, part_qualified) {
            (Some(part), true) => matches_part(c, part),
            _ => true,
        })
        .map(|c| c.index)
        .collect();
    if hits.is_empty() {
        return None;
    }

    let runs: Vec<Vec<usize>> = hits
        .iter()
        .enumerate()
        .chunk_by(|(position, index)| **index as isize - *position as isize)
        .into_iter()
        .map(|(_, run)| run.map(|(_, index)| *index).collect::<Vec<_>>())
        .filter(|run| run.iter().any(|index| chunks[*index].flags.item_header))
        .collect();
    if runs.is_empty() {
        return None;
    }

    let longest = runs
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.len().cmp(&b.len()).then(ib.cmp(ia)))
        .map(|(i, _)| i)?;

    if runs.len() > 1 {
        for (i, run) in runs.iter().enumerate() {
            if i == longest {
                continue;
            }
            let discarded = run
                .iter()
                .map(|index| &chunks[*index])
                .map(|c| format!("#{}: {}", c.index, preview(&c.text)))
                .join("; ");
            log::warn!(
                "Item {} matched non-contiguous chunks; discarding {:?} ({})",
                item,
                run,
                discarded
            );
        }
    }

    let kept: Vec<&LabeledChunk> = runs[longest]
        .iter()
        .map(|index| &chunks[*index])
        .collect();
    let text = join_chunk_texts(kept.iter().map(|c| c.text.as_str()));
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let part = part.or_else(|| {
        kept.first()
            .and_then(|c| c.label.part.as_deref())
            .map(normalize_part)
    });
    Some((part, text.to_string()))
}

/// Concatenates chunk texts, keeping each chunk on its own line.
pub fn join_chunk_texts<'a>(texts: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for text in texts {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(text);
    }
    out
}

/// Distinct `(part, item)` labels of item-header chunks, in order of first
/// appearance.
pub fn detected_items(chunks: &[LabeledChunk]) -> Vec<(Option<String>, String)> {
    chunks
        .iter()
        .filter(|c| c.flags.item_header)
        .filter_map(|c| {
            c.label
                .item
                .as_deref()
                .map(|item| (c.label.part.as_deref().map(normalize_part), normalize_item(item)))
        })
        .unique()
        .collect()
}
