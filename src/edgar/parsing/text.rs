//! Plain-text rendering and the line-oriented item fallback used for
//! legacy filings that carry no markup.

use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use super::classify::normalize_item;
use super::types::Block;

static LINE_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*Item[ \t]+(\d{1,2}(?:\.[ \t]?\d{2}\b)?[A-Z]?)\b").unwrap()
});
static SIGNATURES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*SIGNATURES?\b").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").unwrap());

/// Renders blocks as plain text, tables through the fixed-width renderer.
pub fn blocks_to_text(blocks: &[Block]) -> String {
    blocks.iter().map(|b| b.get_text()).collect()
}

/// Plain text of a markup-free filing: SGML tags dropped, entities decoded,
/// compatibility characters folded.
pub fn strip_markup(raw: &str) -> String {
    let text = TAG.replace_all(raw, "");
    let text = decode_html_entities(&text);
    let text: String = text.replace("\r\n", "\n").nfkc().collect();
    BLANK_LINES.replace_all(&text, "\n\n").into_owned()
}

struct Occurrence {
    item: String,
    start: usize,
    end: usize,
}

fn occurrences(text: &str) -> Vec<Occurrence> {
    let starts: Vec<(usize, String)> = LINE_ITEM
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let id = caps.get(1)?;
            Some((whole.start(), normalize_item(id.as_str())))
        })
        .collect();
    let signatures: Vec<usize> = SIGNATURES.find_iter(text).map(|m| m.start()).collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, (start, item))| {
            let next_item = starts.get(i + 1).map(|(s, _)| *s).unwrap_or(text.len());
            let next_signature = signatures
                .iter()
                .find(|s| **s > *start)
                .copied()
                .unwrap_or(text.len());
            Occurrence {
                item: item.clone(),
                start: *start,
                end: next_item.min(next_signature),
            }
        })
        .collect()
}

/// Items whose header starts a line, in order of first appearance.
///
/// Mid-line mentions, including the tail of ranges such as `Item 1-Item 4`,
/// are not headers.
pub fn plain_text_items(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for occurrence in occurrences(text) {
        if !seen.contains(&occurrence.item) {
            seen.push(occurrence.item);
        }
    }
    seen
}

/// Text from an item's line-start header to the next item header or the
/// signatures. Repeated headers (a plain-text index) resolve to the longest body.
pub fn plain_text_section(text: &str, item: &str) -> Option<String> {
    let item = normalize_item(item);
    occurrences(text)
        .into_iter()
        .filter(|o| o.item == item)
        .map(|o| text[o.start..o.end].trim().to_string())
        .filter(|body| !body.is_empty())
        .max_by_key(|body| body.len())
}

/// Item spans of a plain-text filing, scanned once and queried by offset.
pub struct ItemSpans {
    occurrences: Vec<Occurrence>,
}

impl ItemSpans {
    pub fn new(text: &str) -> Self {
        ItemSpans {
            occurrences: occurrences(text),
        }
    }

    /// Item whose line-start header governs the text at `offset`.
    ///
    /// Spans are ordered and disjoint, so the candidate is the last span
    /// starting at or before `offset`.
    pub fn item_at(&self, offset: usize) -> Option<&str> {
        let after = self.occurrences.partition_point(|o| o.start <= offset);
        let span = self.occurrences.get(after.checked_sub(1)?)?;
        (offset < span.end).then_some(span.item.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = "ACME CORP\n\nItem 1-Item 4.  Not applicable.\nItem 5.  Other Events\n\nOn May 1 the company sold its plant.\n\nItem 7. Financial Statements and Exhibits\n\n(c) Exhibits: none\n\nSIGNATURES\n\nPursuant to the requirements...";

    #[test]
    fn test_range_items_are_not_expanded() {
        assert_eq!(plain_text_items(LEGACY), vec!["1", "5", "7"]);
        assert_eq!(
            plain_text_section(LEGACY, "Item 1").as_deref(),
            Some("Item 1-Item 4.  Not applicable.")
        );
        assert_eq!(plain_text_section(LEGACY, "3"), None);
        let spans = ItemSpans::new(LEGACY);
        assert_eq!(spans.item_at(LEGACY.find("sold its plant").unwrap()), Some("5"));
        assert_eq!(spans.item_at(LEGACY.find("Pursuant").unwrap()), None);
        assert_eq!(spans.item_at(0), None);
    }

    #[test]
    fn test_section_ends_at_next_item_or_signatures() {
        assert_eq!(
            plain_text_section(LEGACY, "5").as_deref(),
            Some("Item 5.  Other Events\n\nOn May 1 the company sold its plant.")
        );
        assert_eq!(
            plain_text_section(LEGACY, "7.").as_deref(),
            Some("Item 7. Financial Statements and Exhibits\n\n(c) Exhibits: none")
        );
    }

    #[test]
    fn test_decimal_items_and_repeated_headers() {
        let text = "Item 2.02 Results\nItem 9.01 Exhibits\n\nItem 2. 02 Results of Operations\nRevenue rose.\nItem 9.01 Exhibits\n99.1 Press release";
        assert_eq!(plain_text_items(text), vec!["2.02", "9.01"]);
        assert_eq!(
            plain_text_section(text, "2.02").as_deref(),
            Some("Item 2. 02 Results of Operations\nRevenue rose.")
        );
    }

    #[test]
    fn test_item_spans_over_many_items() {
        let text: String = (1..=400)
            .map(|n| format!("Item {}. Heading\nBody of item {} with the usual words.\n", n % 99 + 1, n))
            .collect::<String>()
            + "SIGNATURES\nthe end";
        let spans = ItemSpans::new(&text);
        for n in [1, 57, 250, 400] {
            let offset = text.find(&format!("Body of item {} ", n)).unwrap();
            let expected = (n % 99 + 1).to_string();
            assert_eq!(spans.item_at(offset), Some(expected.as_str()));
        }
        assert_eq!(spans.item_at(text.rfind("the end").unwrap()), None);
    }

    #[test]
    fn test_strip_markup() {
        let raw = "<PAGE>\nAT&amp;T Inc.\r\n\r\n\r\n\r\nItem 5.\u{FB01}nal";
        assert_eq!(strip_markup(raw), "\nAT&T Inc.\n\nItem 5.final");
    }
}
