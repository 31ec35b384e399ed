use super::classify::{is_header, is_item_header, is_regular_text, ItemPattern};
use super::types::{Block, Chunk};

#[derive(Debug, Default, Clone, Copy)]
struct State {
    accumulating_regular_text: bool,
    header_detected: bool,
    item_header_detected: bool,
}

struct Assembler {
    chunks: Vec<Chunk>,
    current: Vec<Block>,
    state: State,
}

impl Assembler {
    fn flush(&mut self) {
        let blocks = std::mem::take(&mut self.current);
        if let Some(chunk) = Chunk::new(blocks) {
            self.chunks.push(chunk);
        }
    }

    fn feed(&mut self, block: Block) {
        if block.is_standalone() {
            self.flush();
            self.chunks.extend(Chunk::new(vec![block]));
            self.state = State::default();
            return;
        }

        let text = block.get_text().into_owned();
        if is_item_header(&text, ItemPattern::Generic) {
            self.flush();
            self.current.push(block);
            self.state = State {
                accumulating_regular_text: false,
                header_detected: true,
                item_header_detected: true,
            };
        } else if is_header(&text) {
            if !self.current.is_empty()
                && !self.state.accumulating_regular_text
                && !self.state.item_header_detected
            {
                self.flush();
            }
            self.current.push(block);
            self.state = State {
                accumulating_regular_text: false,
                header_detected: true,
                item_header_detected: false,
            };
        } else if is_regular_text(&text)
            && (self.state.header_detected || self.state.accumulating_regular_text)
        {
            self.current.push(block);
            self.state.accumulating_regular_text = true;
            self.state.item_header_detected = false;
        } else {
            if self.state.accumulating_regular_text || self.state.item_header_detected {
                self.flush();
                self.state = State::default();
            }
            self.current.push(block);
        }
    }
}

/// Groups a compressed block sequence into ordered chunks.
///
/// Tables and lists always form single-block chunks; whitespace-only runs
/// are dropped.
pub fn assemble_chunks(blocks: Vec<Block>) -> Vec<Chunk> {
    let mut assembler = Assembler {
        chunks: Vec::new(),
        current: Vec::new(),
        state: State::default(),
    };
    for block in blocks {
        assembler.feed(block);
    }
    assembler.flush();
    log::debug!("Assembled {} chunks", assembler.chunks.len());
    assembler.chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::parsing::compress::compress_blocks;

    fn table() -> Block {
        Block::Table {
            rows: vec![vec!["Revenue".into(), "100".into()]],
            caption: None,
        }
    }

    fn long_text() -> String {
        vec!["the company sells products"; 10].join(" and ")
    }

    #[test]
    fn test_table_is_never_merged_with_neighbours() {
        let blocks = compress_blocks(vec![
            Block::text("intro", false, "p"),
            table(),
            Block::text("more", false, "p"),
        ]);
        let chunks = assemble_chunks(blocks);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text(), "intro");
        assert!(chunks[1].is_table());
        assert_eq!(chunks[2].text(), "more");
    }

    #[test]
    fn test_item_header_opens_new_chunk() {
        let chunks = assemble_chunks(vec![
            Block::text("cover page", false, "p"),
            Block::text("Item 1. Business", false, "p"),
            Block::text("Item 1A. Risk Factors", false, "p"),
        ]);
        let texts: Vec<String> = chunks.iter().map(Chunk::text).collect();
        assert_eq!(texts, vec!["cover page", "Item 1. Business", "Item 1A. Risk Factors"]);
    }

    #[test]
    fn test_header_keeps_following_regular_text() {
        let body = long_text();
        let chunks = assemble_chunks(vec![
            Block::text("Overview", false, "p"),
            Block::text(body.clone(), false, "p"),
            Block::text(body.clone(), false, "p"),
            Block::text("short note", false, "p"),
        ]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 3);
        assert_eq!(chunks[1].text(), "short note");
    }

    #[test]
    fn test_whitespace_only_chunks_are_dropped() {
        let chunks = assemble_chunks(vec![
            Block::text("Item 7. MD&A", false, "p"),
            Block::line_break("p"),
            Block::text("  ", false, "p"),
            Block::List {
                ordered: false,
                content: "- one\n".into(),
            },
        ]);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| !c.text().trim().is_empty()));
    }

    #[test]
    fn test_standalone_blocks_are_isolated() {
        let blocks = vec![
            Block::text("Item 2. Properties", false, "p"),
            table(),
            Block::List {
                ordered: true,
                content: "1. a\n".into(),
            },
            Block::text(long_text(), false, "p"),
            table(),
        ];
        for chunk in assemble_chunks(blocks) {
            if chunk.blocks().iter().any(Block::is_standalone) {
                assert_eq!(chunk.len(), 1);
            }
        }
    }
}
