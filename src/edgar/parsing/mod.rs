pub mod blocks;
pub mod chunks;
pub mod classify;
pub mod compress;
pub mod header;
pub mod labels;
pub mod normalize;
pub mod section;
pub mod table;
pub mod text;
pub mod toc;
pub mod types;
pub mod xref;

#[cfg(test)]
pub(crate) mod tests;

pub use section::{Section, SectionKey, SectionMap};
pub use types::{Block, Chunk, LabeledChunk};
