use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use super::table::render_table;

/// Minimal typed unit of content produced from filing markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Text {
        content: String,
        is_inline: bool,
        source_tag: String,
    },
    /// Cell text per row; rendering is left to the consumer.
    Table {
        rows: Vec<Vec<String>>,
        caption: Option<String>,
    },
    List {
        ordered: bool,
        content: String,
    },
    Link {
        content: String,
        href: String,
        title: Option<String>,
    },
}

impl Block {
    pub fn text(content: impl Into<String>, is_inline: bool, source_tag: &str) -> Self {
        Block::Text {
            content: content.into(),
            is_inline,
            source_tag: source_tag.to_string(),
        }
    }

    pub fn line_break(source_tag: &str) -> Self {
        Block::text("\n", false, source_tag)
    }

    /// Text as it takes part in chunk assembly and section text.
    pub fn get_text(&self) -> Cow<'_, str> {
        match self {
            Block::Text { content, .. } => Cow::Borrowed(content),
            Block::List { content, .. } => Cow::Borrowed(content),
            Block::Link { content, .. } => Cow::Borrowed(content),
            Block::Table { rows, caption } => Cow::Owned(render_table(rows, caption.as_deref())),
        }
    }

    pub fn is_inline(&self) -> bool {
        match self {
            Block::Text { is_inline, .. } => *is_inline,
            Block::Link { .. } => true,
            Block::Table { .. } | Block::List { .. } => false,
        }
    }

    /// Tables and lists always stand alone in their chunk.
    pub fn is_standalone(&self) -> bool {
        matches!(self, Block::Table { .. } | Block::List { .. })
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Block::Table { .. })
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Block::Table { rows, .. } => rows.iter().flatten().all(|c| c.trim().is_empty()),
            Block::Text { content, .. }
            | Block::List { content, .. }
            | Block::Link { content, .. } => content.trim().is_empty(),
        }
    }

    pub fn ends_with_newline(&self) -> bool {
        match self {
            Block::Text { content, .. } => content.ends_with('\n'),
            _ => false,
        }
    }
}

/// Ordered, non-empty run of blocks treated as one structural unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    blocks: Vec<Block>,
}

impl Chunk {
    /// Returns `None` for empty or whitespace-only block runs, which are never emitted.
    pub fn new(blocks: Vec<Block>) -> Option<Self> {
        if blocks.iter().all(Block::is_blank) {
            None
        } else {
            Some(Chunk { blocks })
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn is_table(&self) -> bool {
        self.blocks.len() == 1 && self.blocks[0].is_table()
    }

    pub fn text(&self) -> String {
        self.blocks.iter().map(|b| b.get_text()).collect()
    }
}

/// Part/Item label attached to a chunk after propagation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub part: Option<String>,
    pub item: Option<String>,
}

/// Structural signals derived from one chunk's own text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFlags {
    pub item_header: bool,
    pub part_header: bool,
    pub toc: bool,
    pub signature: bool,
    pub table: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledChunk {
    pub index: usize,
    pub label: Label,
    pub flags: ChunkFlags,
    pub text: String,
}
