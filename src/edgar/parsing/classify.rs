//! Pure text heuristics used to recognise headers, item headers and body text.
//!
//! Every function here is deterministic and free of shared mutable state; the
//! compiled patterns are immutable statics.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Blocks with more words than this read as running text rather than headings.
pub const REGULAR_TEXT_MIN_WORDS: usize = 25;
const HEADER_WORD_RATIO: f64 = 0.6;

const COMMON_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "for", "from", "in", "into", "nor", "of", "on",
    "or", "the", "to", "with",
];

static ENUMERATION_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+\.|\w\.\s|\(\d+\)\s)").unwrap());

static GENERIC_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^item\s+(\d{1,2}\.\s?\d{2}|\d{1,2}[A-Z]?)\b").unwrap());

static DECIMAL_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^item\s{1,3}(\d{1,2}\.\s?\d{2})\b").unwrap());

static PART_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*PART\s+([IVXLC]+)\b").unwrap());

static ITEM_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*items?\b\s*").unwrap());
static PART_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*part\b\s*").unwrap());
static SPACE_AROUND_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\.\s*").unwrap());

/// Which item numbering a filing uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemPattern {
    /// `Item 1`, `Item 1A`, `Item 2.02`
    Generic,
    /// Current reports, always `Item N.NN`.
    Decimal,
}

impl ItemPattern {
    fn regex(self) -> &'static Regex {
        match self {
            ItemPattern::Generic => &GENERIC_ITEM,
            ItemPattern::Decimal => &DECIMAL_ITEM,
        }
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn is_regular_text(text: &str) -> bool {
    word_count(text) > REGULAR_TEXT_MIN_WORDS
}

/// Title-case or all-caps heuristic for generic headings.
pub fn is_header(text: &str) -> bool {
    let text = text.trim();
    let text = ENUMERATION_PREFIX.replace(text, "");

    let words: Vec<&str> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty() && w.chars().all(char::is_alphabetic))
        .collect();
    if words.is_empty() {
        return false;
    }

    let total = words.len() as f64;
    let titled = words
        .iter()
        .filter(|w| is_title_word(w) || COMMON_WORDS.contains(&w.to_lowercase().as_str()))
        .count() as f64;
    let upper = words
        .iter()
        .filter(|w| w.chars().all(char::is_uppercase))
        .count() as f64;

    titled / total > HEADER_WORD_RATIO || upper / total > HEADER_WORD_RATIO
}

fn is_title_word(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => chars.all(char::is_lowercase),
        _ => false,
    }
}

pub fn is_item_header(text: &str, pattern: ItemPattern) -> bool {
    pattern.regex().is_match(text.trim_start())
}

/// Normalised item id of a line that opens with an item header.
pub fn item_header_id(text: &str, pattern: ItemPattern) -> Option<String> {
    pattern
        .regex()
        .captures(text.trim_start())
        .and_then(|caps| caps.get(1))
        .map(|m| normalize_item(m.as_str()))
}

/// Roman numeral of a chunk that opens with a `PART` header.
pub fn part_header_id(text: &str) -> Option<String> {
    PART_HEADER
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
}

/// `"Item 2. 02."` -> `"2.02"`, `"item 1a"` -> `"1A"`.
pub fn normalize_item(item: &str) -> String {
    let stripped = ITEM_PREFIX.replace(item.trim(), "");
    let collapsed = SPACE_AROUND_DOT.replace_all(stripped.trim(), ".");
    collapsed
        .trim_end_matches(['.', ':'])
        .trim()
        .to_uppercase()
}

/// `"Part ii."` -> `"II"`.
pub fn normalize_part(part: &str) -> String {
    PART_PREFIX
        .replace(part.trim(), "")
        .trim()
        .trim_end_matches(['.', ',', ':'])
        .to_uppercase()
}

pub fn item_label(id: &str) -> String {
    format!("Item {}", normalize_item(id))
}

pub fn part_label(id: &str) -> String {
    format!("PART {}", normalize_part(id))
}

pub fn roman_value(numeral: &str) -> u32 {
    let digit = |c: char| match c.to_ascii_uppercase() {
        'I' => 1,
        'V' => 5,
        'X' => 10,
        'L' => 50,
        'C' => 100,
        _ => 0,
    };
    let values: Vec<u32> = numeral.chars().map(digit).collect();
    let mut total = 0;
    for (i, value) in values.iter().enumerate() {
        match values.get(i + 1) {
            Some(next) if next > value => total -= *value as i64,
            _ => total += *value as i64,
        }
    }
    total.max(0) as u32
}

fn item_sort_key(id: &str) -> (u32, u32, String) {
    let id = normalize_item(id);
    let digits: String = id.chars().take_while(char::is_ascii_digit).collect();
    let rest = &id[digits.len()..];
    let major = digits.parse().unwrap_or(u32::MAX);
    match rest.strip_prefix('.') {
        Some(minor) => (major, minor.parse().unwrap_or(0), String::new()),
        None => (major, 0, rest.to_string()),
    }
}

/// Natural item order: 1 < 1A < 1B < 2 < 10, and 1.01 < 2.02.
pub fn compare_items(a: &str, b: &str) -> Ordering {
    item_sort_key(a).cmp(&item_sort_key(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_header_recognised_at_start_only() {
        assert!(is_item_header("Item 1. Business", ItemPattern::Generic));
        assert!(is_item_header("ITEM 7A. QUANTITATIVE AND QUALITATIVE", ItemPattern::Generic));
        assert!(is_item_header("  Item 2.02 Results of Operations", ItemPattern::Generic));
        assert!(!is_item_header("See Item 7 for details", ItemPattern::Generic));
        assert!(!is_item_header("Items 1 and 2", ItemPattern::Generic));
        assert_eq!(
            item_header_id("Item 1. Business\nThe Company is engaged in", ItemPattern::Generic),
            Some("1".to_string())
        );
    }

    #[test]
    fn test_decimal_variant() {
        assert!(is_item_header("Item 5.02 Departure of Directors", ItemPattern::Decimal));
        assert!(!is_item_header("Item 5. Other Events", ItemPattern::Decimal));
        assert_eq!(
            item_header_id("Item 2. 02 Results of Operations", ItemPattern::Decimal),
            Some("2.02".to_string())
        );
        assert_eq!(
            item_header_id("Item 2.02 Results of Operations", ItemPattern::Generic),
            Some("2.02".to_string())
        );
    }

    #[test]
    fn test_normalize_item_is_idempotent() {
        for raw in ["Item 2. 02", "Item 2.02.", "item 1a", "ITEM 7A.", "5", "Item 9B:"] {
            let once = normalize_item(raw);
            assert_eq!(normalize_item(&once), once);
        }
        assert_eq!(normalize_item("Item 2. 02"), "2.02");
        assert_eq!(normalize_item("item 1a"), "1A");
        assert_eq!(normalize_part("Part ii."), "II");
    }

    #[test]
    fn test_is_header() {
        assert!(is_header("Management's Discussion and Analysis"));
        assert!(is_header("RISK FACTORS"));
        assert!(is_header("1. Summary of Significant Accounting Policies"));
        assert!(!is_header("the company sells products in many markets"));
        assert!(!is_header("2023 2022"));
        assert!(!is_header(""));
    }

    #[test]
    fn test_classifiers_are_deterministic() {
        let samples = ["Item 1. Business", "RISK FACTORS", "plain words here", ""];
        for s in samples {
            assert_eq!(is_header(s), is_header(s));
            assert_eq!(
                is_item_header(s, ItemPattern::Generic),
                is_item_header(s, ItemPattern::Generic)
            );
            assert_eq!(is_regular_text(s), is_regular_text(s));
        }
    }

    #[test]
    fn test_regular_text_threshold() {
        let words = vec!["word"; 25].join(" ");
        assert!(!is_regular_text(&words));
        assert!(is_regular_text(&format!("{} more", words)));
    }

    #[test]
    fn test_item_ordering_and_parts() {
        let mut items = vec!["10", "2", "1B", "1", "1A"];
        items.sort_by(|a, b| compare_items(a, b));
        assert_eq!(items, vec!["1", "1A", "1B", "2", "10"]);
        assert_eq!(compare_items("1.01", "2.02"), Ordering::Less);
        assert_eq!(roman_value("IV"), 4);
        assert_eq!(part_header_id("PART II - OTHER INFORMATION"), Some("II".to_string()));
        assert_eq!(part_header_id("Partners"), None);
    }
}
