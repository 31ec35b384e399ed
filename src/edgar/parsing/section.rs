use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::classify::{item_label, normalize_item, normalize_part, part_label};
use crate::edgar::structure::{compare_sections, Strategy};

static PART_ITEM_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*part\s+([IVXLC]+)\s*[,.:\-–—]?\s*(?:items?\s+)?(\d{1,2}(?:\.\s?\d{2})?[A-Z]?)\s*[.:]?\s*$")
        .unwrap()
});
static PART_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*part\s+([IVXLC]+)\s*[.:]?\s*$").unwrap());
static ITEM_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:items?\s+)?(\d{1,2}(?:\.\s?\d{2})?[A-Z]?)\s*[.:]?\s*$").unwrap()
});

/// A caller's section request: `"Item 7A"`, `"7A"`, `"Part II"` or `"Part II, Item 1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SectionKey {
    Item { part: Option<String>, item: String },
    Part(String),
}

impl FromStr for SectionKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(caps) = PART_ITEM_KEY.captures(s) {
            return Ok(SectionKey::Item {
                part: Some(normalize_part(&caps[1])),
                item: normalize_item(&caps[2]),
            });
        }
        if let Some(caps) = PART_KEY.captures(s) {
            return Ok(SectionKey::Part(normalize_part(&caps[1])));
        }
        if let Some(caps) = ITEM_KEY.captures(s) {
            return Ok(SectionKey::Item {
                part: None,
                item: normalize_item(&caps[1]),
            });
        }
        Err(anyhow!("Unrecognised section key: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Normalised roman numeral, e.g. `II`.
    pub part: Option<String>,
    /// Normalised item id, e.g. `7A` or `2.02`.
    pub item: String,
    pub text: String,
    pub strategy: Strategy,
}

impl Section {
    pub fn label(&self, part_qualified: bool) -> String {
        match (&self.part, part_qualified) {
            (Some(part), true) => format!("Part {}, {}", part, item_label(&self.item)),
            _ => item_label(&self.item),
        }
    }

    fn is(&self, part: Option<&str>, item: &str) -> bool {
        self.item == item && part.map(|p| self.part.as_deref() == Some(p)).unwrap_or(true)
    }
}

/// Immutable, ordered sections of one parsed filing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMap {
    form: String,
    part_qualified: bool,
    sections: Vec<Section>,
}

impl SectionMap {
    /// Orders sections by part, then natural item order.
    pub fn new(form: impl Into<String>, part_qualified: bool, mut sections: Vec<Section>) -> Self {
        sections.sort_by(|a, b| {
            compare_sections((a.part.as_deref(), &a.item), (b.part.as_deref(), &b.item))
        });
        SectionMap {
            form: form.into(),
            part_qualified,
            sections,
        }
    }

    pub fn form(&self) -> &str {
        &self.form
    }

    pub fn is_part_qualified(&self) -> bool {
        self.part_qualified
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Looks up `"Item 7A"`, `"7A"`, `"Part II"` or `"Part II, Item 1"`.
    pub fn get(&self, key: &str) -> Option<String> {
        match key.parse::<SectionKey>() {
            Ok(SectionKey::Item { part, item }) => self.get_with_part(part.as_deref(), &item),
            Ok(SectionKey::Part(part)) => self.part_text(&part),
            Err(e) => {
                log::debug!("{}", e);
                None
            }
        }
    }

    pub fn get_with_part(&self, part: Option<&str>, item: &str) -> Option<String> {
        self.section(part, item).map(|s| s.text.clone())
    }

    pub fn section(&self, part: Option<&str>, item: &str) -> Option<&Section> {
        let part = part.map(normalize_part);
        let item = normalize_item(item);
        self.sections.iter().find(|s| s.is(part.as_deref(), &item))
    }

    /// All items of one part, joined in order.
    pub fn part_text(&self, part: &str) -> Option<String> {
        let part = normalize_part(part);
        let texts: Vec<&str> = self
            .sections
            .iter()
            .filter(|s| s.part.as_deref() == Some(part.as_str()))
            .map(|s| s.text.as_str())
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n\n"))
        }
    }

    /// Section identifiers in document order.
    pub fn list_items(&self) -> Vec<String> {
        self.sections
            .iter()
            .map(|s| s.label(self.part_qualified))
            .collect()
    }

    /// `(part, item)` pairs as found, for structure reports.
    pub fn identifiers(&self) -> Vec<(Option<String>, String)> {
        self.sections
            .iter()
            .map(|s| (s.part.clone(), s.item.clone()))
            .collect()
    }

    /// Distinct parts in order, as `PART II` labels.
    pub fn parts(&self) -> Vec<String> {
        let mut parts: Vec<String> = Vec::new();
        for part in self.sections.iter().filter_map(|s| s.part.as_deref()) {
            let label = part_label(part);
            if !parts.contains(&label) {
                parts.push(label);
            }
        }
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(part: Option<&str>, item: &str, text: &str) -> Section {
        Section {
            part: part.map(str::to_string),
            item: item.to_string(),
            text: text.to_string(),
            strategy: Strategy::Chunks,
        }
    }

    fn quarterly() -> SectionMap {
        SectionMap::new(
            "10-Q",
            true,
            vec![
                section(Some("II"), "1", "Legal proceedings"),
                section(Some("I"), "2", "MD&A"),
                section(Some("I"), "1", "Financial statements"),
                section(Some("II"), "1A", "Risk factors"),
            ],
        )
    }

    #[test]
    fn test_section_keys() {
        assert_eq!(
            "Part II, Item 1".parse::<SectionKey>().unwrap(),
            SectionKey::Item {
                part: Some("II".into()),
                item: "1".into()
            }
        );
        assert_eq!("Part ii".parse::<SectionKey>().unwrap(), SectionKey::Part("II".into()));
        assert_eq!(
            "item 7a.".parse::<SectionKey>().unwrap(),
            SectionKey::Item {
                part: None,
                item: "7A".into()
            }
        );
        assert_eq!(
            "2.02".parse::<SectionKey>().unwrap(),
            SectionKey::Item {
                part: None,
                item: "2.02".into()
            }
        );
        assert!("Exhibits".parse::<SectionKey>().is_err());
    }

    #[test]
    fn test_ordering_and_listing() {
        let map = quarterly();
        assert_eq!(
            map.list_items(),
            vec!["Part I, Item 1", "Part I, Item 2", "Part II, Item 1", "Part II, Item 1A"]
        );
        assert_eq!(map.parts(), vec!["PART I", "PART II"]);
    }

    #[test]
    fn test_lookups() {
        let map = quarterly();
        assert_eq!(map.get("Item 1").as_deref(), Some("Financial statements"));
        assert_eq!(map.get("Part II, Item 1").as_deref(), Some("Legal proceedings"));
        assert_eq!(map.get_with_part(Some("Part II"), "Item 1A").as_deref(), Some("Risk factors"));
        assert_eq!(map.get("Part II").as_deref(), Some("Legal proceedings\n\nRisk factors"));
        assert_eq!(map.get("Part III"), None);
        assert_eq!(map.get("Item 9"), None);
        assert_eq!(map.get("nonsense"), None);
    }
}
