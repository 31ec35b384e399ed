//! One filing parse session.
//!
//! `Filing` owns the raw input and lazily derives everything else from it:
//! cleaned markup, blocks, chunks, labels and the per-strategy section lists.
//! Each derivation runs at most once per session and is dropped with it.

use anyhow::{anyhow, Context, Result};
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;
use futures::future::join_all;
use once_cell::unsync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::Path;

use super::parsing::blocks::extract_blocks;
use super::parsing::chunks::assemble_chunks;
use super::parsing::classify::{normalize_item, normalize_part, ItemPattern};
use super::parsing::compress::compress_blocks;
use super::parsing::header::{detect_form_type, header_fields, unwrap_text};
use super::parsing::labels::{detected_items, item_text, label_chunks};
use super::parsing::normalize::{normalize, CleanDocument};
use super::parsing::section::{Section, SectionKey, SectionMap};
use super::parsing::text::{
    blocks_to_text, plain_text_items, plain_text_section, strip_markup, ItemSpans,
};
use super::parsing::toc::anchor_sections;
use super::parsing::types::{Block, Chunk, LabeledChunk};
use super::parsing::xref::cross_reference_sections;
use super::report::ReportType;
use super::structure::{FilingStructure, Strategy, StructureReport};
use crate::core::config::ParseConfig;

/// A match of an ad hoc search, located by chunk and label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// `None` for markup-free filings, which have no chunks.
    pub chunk_index: Option<usize>,
    pub part: Option<String>,
    pub item: Option<String>,
    pub matched: String,
}

#[derive(Default)]
struct ParseCache {
    document: OnceCell<Option<CleanDocument>>,
    blocks: OnceCell<Vec<Block>>,
    chunks: OnceCell<Vec<Chunk>>,
    generic_labels: OnceCell<Vec<LabeledChunk>>,
    decimal_labels: OnceCell<Vec<LabeledChunk>>,
    toc: OnceCell<Vec<Section>>,
    xref: OnceCell<Vec<Section>>,
    fallback_text: OnceCell<Option<String>>,
    sections: OnceCell<SectionMap>,
}

pub struct Filing {
    raw: String,
    plain_text: Option<String>,
    report: ReportType,
    structure: &'static FilingStructure,
    config: ParseConfig,
    cache: ParseCache,
}

fn resolve_report(raw: &str, hint: Option<&str>, config: &ParseConfig) -> ReportType {
    hint.map(str::to_string)
        .or_else(|| detect_form_type(raw))
        .or_else(|| config.default_form.clone())
        .and_then(|form| form.parse::<ReportType>().ok())
        .unwrap_or_else(|| ReportType::Other(String::new()))
}

fn find_section(sections: &[Section], part: Option<&str>, item: &str) -> Option<Section> {
    sections
        .iter()
        .find(|s| s.item == item && part.map(|p| s.part.as_deref() == Some(p)).unwrap_or(true))
        .cloned()
}

impl Filing {
    pub fn parse(raw: impl Into<String>, form: Option<&str>) -> Self {
        Self::parse_with_config(raw, form, ParseConfig::default())
    }

    /// Starts a parse session. The form hint wins over the submission header,
    /// which wins over the configured default.
    pub fn parse_with_config(raw: impl Into<String>, form: Option<&str>, config: ParseConfig) -> Self {
        let raw = raw.into();
        let report = resolve_report(&raw, form, &config);
        let structure = FilingStructure::for_report(&report);
        log::debug!("Parsing filing as form '{}'", report);
        Filing {
            raw,
            plain_text: None,
            report,
            structure,
            config,
            cache: ParseCache::default(),
        }
    }

    /// Supplies a plain-text rendering for the line-oriented fallback.
    pub fn with_plain_text(mut self, text: impl Into<String>) -> Self {
        self.plain_text = Some(text.into());
        self.cache.fallback_text = OnceCell::new();
        self.cache.sections = OnceCell::new();
        self
    }

    pub fn report_type(&self) -> &ReportType {
        &self.report
    }

    pub fn structure(&self) -> &'static FilingStructure {
        self.structure
    }

    pub fn header_fields(&self) -> Vec<(String, String)> {
        header_fields(&self.raw)
    }

    fn document(&self) -> Option<&CleanDocument> {
        self.cache
            .document
            .get_or_init(|| normalize(&self.raw, &self.config))
            .as_ref()
    }

    /// Whether the input carries HTML markup at all.
    pub fn is_document(&self) -> bool {
        self.document().is_some()
    }

    /// Compressed blocks in document order; empty for markup-free input.
    pub fn blocks(&self) -> &[Block] {
        self.cache.blocks.get_or_init(|| match self.document() {
            Some(doc) => compress_blocks(extract_blocks(doc, self.config.max_depth)),
            None => Vec::new(),
        })
    }

    pub fn chunks(&self) -> &[Chunk] {
        self.cache
            .chunks
            .get_or_init(|| assemble_chunks(self.blocks().to_vec()))
    }

    fn labels(&self, pattern: ItemPattern) -> &[LabeledChunk] {
        let cell = match pattern {
            ItemPattern::Generic => &self.cache.generic_labels,
            ItemPattern::Decimal => &self.cache.decimal_labels,
        };
        cell.get_or_init(|| label_chunks(self.chunks(), pattern))
    }

    /// Every chunk with its flags and forward-filled label, using the form's item pattern.
    pub fn labeled_chunks(&self) -> &[LabeledChunk] {
        self.labels(self.structure.item_pattern)
    }

    /// Mean number of blocks per chunk.
    pub fn average_chunk_size(&self) -> f64 {
        let chunks = self.chunks();
        if chunks.is_empty() {
            return 0.0;
        }
        chunks.iter().map(Chunk::len).sum::<usize>() as f64 / chunks.len() as f64
    }

    /// The whole filing as plain text.
    pub fn text(&self) -> String {
        if self.is_document() {
            blocks_to_text(self.blocks())
        } else {
            strip_markup(unwrap_text(&self.raw, self.config.wrapper_scan_chars))
        }
    }

    /// Text the line-oriented fallback runs over: the caller's rendering, or
    /// the filing itself when it carries no markup.
    fn fallback_text(&self) -> Option<&str> {
        self.cache
            .fallback_text
            .get_or_init(|| match &self.plain_text {
                Some(text) => Some(text.clone()),
                None if !self.is_document() => Some(self.text()),
                None => None,
            })
            .as_deref()
    }

    fn toc_sections(&self) -> &[Section] {
        self.cache.toc.get_or_init(|| match self.document() {
            Some(doc) => anchor_sections(doc, self.structure, self.config.max_depth),
            None => Vec::new(),
        })
    }

    fn xref_sections(&self) -> &[Section] {
        self.cache.xref.get_or_init(|| match self.document() {
            Some(doc) => cross_reference_sections(doc, self.structure, self.config.max_depth),
            None => Vec::new(),
        })
    }

    fn chunk_pattern(&self, strategy: Strategy) -> ItemPattern {
        match strategy {
            Strategy::ItemPattern => self.structure.item_pattern,
            _ => ItemPattern::Generic,
        }
    }

    fn lookup(&self, strategy: Strategy, part: Option<&str>, item: &str) -> Option<Section> {
        match strategy {
            Strategy::TocAnchors => find_section(self.toc_sections(), part, item),
            Strategy::CrossReferenceIndex => find_section(self.xref_sections(), part, item),
            Strategy::ItemPattern | Strategy::Chunks => {
                let labels = self.labels(self.chunk_pattern(strategy));
                item_text(labels, item, part, self.structure.part_qualified).map(|(part, text)| Section {
                    part,
                    item: item.to_string(),
                    text,
                    strategy,
                })
            }
            Strategy::PlainText => {
                let text = plain_text_section(self.fallback_text()?, item)?;
                Some(Section {
                    part: part.map(str::to_string),
                    item: item.to_string(),
                    text,
                    strategy,
                })
            }
        }
    }

    /// Runs the form's strategies in order; the first non-empty result wins.
    pub fn section(&self, part: Option<&str>, item: &str) -> Option<Section> {
        let item = normalize_item(item);
        let part = part.map(normalize_part);
        for strategy in self.structure.strategies {
            if let Some(mut section) = self.lookup(*strategy, part.as_deref(), &item) {
                if !self.structure.part_qualified {
                    section.part = self
                        .structure
                        .part_of(&item)
                        .map(str::to_string)
                        .or(section.part);
                }
                log::debug!("Item {} resolved by {}", item, strategy);
                return Some(section);
            }
        }
        log::debug!("Item {} not found by any strategy", item);
        None
    }

    pub fn get_with_part(&self, part: Option<&str>, item: &str) -> Option<String> {
        self.section(part, item).map(|s| s.text)
    }

    pub fn get_item(&self, item: &str) -> Option<String> {
        self.get_with_part(None, item)
    }

    /// Looks up `"Item 7A"`, `"7A"`, `"Part II"` or `"Part II, Item 1"`.
    pub fn get(&self, key: &str) -> Option<String> {
        match key.parse::<SectionKey>() {
            Ok(SectionKey::Item { part, item }) => self.get_with_part(part.as_deref(), &item),
            Ok(SectionKey::Part(part)) => self.sections().part_text(&part),
            Err(e) => {
                log::debug!("{}", e);
                None
            }
        }
    }

    fn candidates(&self) -> Vec<(Option<String>, String)> {
        let qualify = |part: Option<String>| if self.structure.part_qualified { part } else { None };

        let mut candidates: Vec<(Option<String>, String)> = self
            .structure
            .items()
            .map(|(part, description)| (qualify(part.map(str::to_string)), description.item.to_string()))
            .collect();

        for strategy in self.structure.strategies {
            let found: Vec<(Option<String>, String)> = match strategy {
                Strategy::TocAnchors => self
                    .toc_sections()
                    .iter()
                    .map(|s| (qualify(s.part.clone()), s.item.clone()))
                    .collect(),
                Strategy::CrossReferenceIndex => self
                    .xref_sections()
                    .iter()
                    .map(|s| (qualify(s.part.clone()), s.item.clone()))
                    .collect(),
                Strategy::ItemPattern | Strategy::Chunks => {
                    detected_items(self.labels(self.chunk_pattern(*strategy)))
                        .into_iter()
                        .map(|(part, item)| (qualify(part), item))
                        .collect()
                }
                Strategy::PlainText => self
                    .fallback_text()
                    .map(plain_text_items)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|item| (None, item))
                    .collect(),
            };
            for candidate in found {
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }
        candidates
    }

    fn build_sections(&self) -> SectionMap {
        let mut sections: Vec<Section> = Vec::new();
        for (part, item) in self.candidates() {
            if let Some(section) = self.section(part.as_deref(), &item) {
                let duplicate = sections.iter().any(|s| {
                    s.item == section.item && (!self.structure.part_qualified || s.part == section.part)
                });
                if !duplicate {
                    sections.push(section);
                }
            }
        }
        log::debug!("Assembled {} sections", sections.len());
        SectionMap::new(self.report.to_string(), self.structure.part_qualified, sections)
    }

    /// Every section any strategy can recover, ordered by part then item.
    pub fn sections(&self) -> &SectionMap {
        self.cache.sections.get_or_init(|| self.build_sections())
    }

    pub fn into_sections(self) -> SectionMap {
        self.sections();
        match self.cache.sections.into_inner() {
            Some(sections) => sections,
            None => SectionMap::new(self.report.to_string(), self.structure.part_qualified, Vec::new()),
        }
    }

    pub fn list_items(&self) -> Vec<String> {
        self.sections().list_items()
    }

    pub fn structure_report(&self) -> StructureReport {
        self.structure.report(&self.sections().identifiers())
    }

    /// Runs a caller-supplied pattern over the filing. A malformed pattern is an error.
    pub fn search(&self, pattern: &str) -> Result<Vec<SearchHit>> {
        let regex = Regex::new(pattern).map_err(|e| anyhow!("Invalid search pattern '{}': {}", pattern, e))?;

        if !self.is_document() {
            let text = self.fallback_text().unwrap_or_default();
            let spans = ItemSpans::new(text);
            let part_of = |item: &Option<String>| {
                item.as_deref()
                    .and_then(|i| self.structure.part_of(i))
                    .map(str::to_string)
            };
            return Ok(regex
                .find_iter(text)
                .map(|m| {
                    let item = spans.item_at(m.start()).map(str::to_string);
                    SearchHit {
                        chunk_index: None,
                        part: part_of(&item),
                        item,
                        matched: m.as_str().to_string(),
                    }
                })
                .collect());
        }

        Ok(self
            .labeled_chunks()
            .iter()
            .flat_map(|chunk| {
                regex.find_iter(&chunk.text).map(move |m| SearchHit {
                    chunk_index: Some(chunk.index),
                    part: chunk.label.part.as_deref().map(normalize_part),
                    item: chunk.label.item.as_deref().map(normalize_item),
                    matched: m.as_str().to_string(),
                })
            })
            .collect())
    }
}

/// Reads a filing from disk, detecting its character set.
pub fn read_filing_text(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    log::debug!("Reading file: {}", path.display());
    let raw = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let charenc = chardet::detect(&raw).0;
    log::debug!("Detected character encoding: {}", charenc);

    // Unknown labels decode as UTF-8 with replacement characters.
    let encoding = Encoding::for_label(chardet::charset2encoding(&charenc).as_bytes()).unwrap_or(UTF_8);
    let mut reader = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .build(raw.as_slice());
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok(text)
}

/// One filing queued for batch parsing.
#[derive(Debug, Clone, Default)]
pub struct FilingInput {
    pub raw: String,
    pub form: Option<String>,
    pub plain_text: Option<String>,
}

/// Parses one filing to completion and keeps only its sections.
pub fn parse_sections(input: FilingInput, config: ParseConfig) -> SectionMap {
    let mut filing = Filing::parse_with_config(input.raw, input.form.as_deref(), config);
    if let Some(text) = input.plain_text {
        filing = filing.with_plain_text(text);
    }
    filing.into_sections()
}

/// Parses independent filings in parallel, one blocking task each.
pub async fn parse_many(inputs: Vec<FilingInput>, config: ParseConfig) -> Vec<Result<SectionMap>> {
    let tasks = inputs.into_iter().map(|input| {
        let config = config.clone();
        tokio::task::spawn_blocking(move || parse_sections(input, config))
    });
    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.context("Filing parse task failed"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::parsing::tests::read_test_file;

    #[test]
    fn test_form_resolution_order() {
        let raw = "<SEC-HEADER>\nCONFORMED SUBMISSION TYPE:\t10-Q\n</SEC-HEADER>";
        assert_eq!(Filing::parse(raw, Some("8-K")).report_type(), &ReportType::Form8K);
        assert_eq!(Filing::parse(raw, None).report_type(), &ReportType::Form10Q);

        let config = ParseConfig {
            default_form: Some("10-K405".into()),
            ..ParseConfig::default()
        };
        let filing = Filing::parse_with_config("<html><body></body></html>", None, config);
        assert_eq!(filing.report_type(), &ReportType::Form10K);
        assert_eq!(Filing::parse("", None).structure().form, "");
    }

    #[test]
    fn test_not_a_document_uses_plain_text_only() {
        let filing = Filing::parse("%PDF-1.4 garbage", Some("10-K"));
        assert!(!filing.is_document());
        assert!(filing.blocks().is_empty());
        assert!(filing.chunks().is_empty());
        assert_eq!(filing.get("Item 1"), None);
        assert_eq!(filing.average_chunk_size(), 0.0);
    }

    #[test]
    fn test_cached_derivations_are_stable() {
        let filing = Filing::parse(read_test_file("current_report.html"), Some("8-K"));
        let first = filing.blocks().as_ptr();
        assert_eq!(filing.blocks().as_ptr(), first);
        assert!(std::ptr::eq(filing.sections(), filing.sections()));
        assert!(filing.average_chunk_size() >= 1.0);
    }

    #[test]
    fn test_search() {
        let filing = Filing::parse(read_test_file("current_report.html"), Some("8-K"));
        let hits = filing.search(r"(?i)revenue").unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().any(|h| h.item.as_deref() == Some("2.02")));

        let err = filing.search("(unclosed").unwrap_err();
        assert!(err.to_string().starts_with("Invalid search pattern '(unclosed'"));
    }

    #[test]
    fn test_search_over_long_plain_text() {
        let mut raw: String = (0..2000)
            .map(|n| format!("Item {}. Heading\nthe body of the section\n", n % 9 + 1))
            .collect();
        raw.push_str("SIGNATURES\nthe signer");
        let filing = Filing::parse(raw, None);
        assert!(!filing.is_document());

        let hits = filing.search("the body").unwrap();
        assert_eq!(hits.len(), 2000);
        assert_eq!(hits[0].item.as_deref(), Some("1"));
        assert_eq!(hits[1234].item.as_deref(), Some("2"));
        assert!(hits.iter().all(|h| h.chunk_index.is_none()));

        let signer = filing.search("signer").unwrap();
        assert_eq!(signer.len(), 1);
        assert_eq!(signer[0].item, None);
    }
}
