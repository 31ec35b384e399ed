use super::types::Block;

fn flush(current: &mut Option<Block>, out: &mut Vec<Block>) {
    if let Some(block) = current.take() {
        if !block.get_text().is_empty() {
            out.push(block);
        }
    }
}

/// Appends `addition` onto the accumulator, adopting its flags while the
/// accumulator still holds only whitespace.
fn append(current: &mut Option<Block>, addition: Block) {
    match current {
        Some(Block::Text {
            content,
            is_inline,
            source_tag,
        }) => {
            if let Block::Text {
                content: extra,
                is_inline: extra_inline,
                source_tag: extra_tag,
            } = addition
            {
                if content.trim().is_empty() && !extra.trim().is_empty() {
                    *is_inline = extra_inline;
                    *source_tag = extra_tag;
                }
                content.push_str(&extra);
            }
        }
        _ => *current = Some(addition),
    }
}

fn as_text(block: Block) -> Block {
    match block {
        Block::Link { content, .. } => Block::text(content, true, "a"),
        other => other,
    }
}

/// Merges whitespace and adjacent inline runs into denser text blocks.
///
/// Compressing an already compressed sequence returns it unchanged.
pub fn compress_blocks(blocks: Vec<Block>) -> Vec<Block> {
    let mut out = Vec::with_capacity(blocks.len());
    let mut current: Option<Block> = None;

    for block in blocks.into_iter().map(as_text) {
        if block.is_standalone() {
            flush(&mut current, &mut out);
            out.push(block);
        } else if block.ends_with_newline() {
            flush(&mut current, &mut out);
            out.push(block);
        } else if block.is_blank() {
            append(&mut current, block);
        } else if current.is_some() {
            append(&mut current, block);
        } else {
            current = Some(block);
        }
    }
    flush(&mut current, &mut out);

    strip_leading(&mut out);
    out
}

fn strip_leading(blocks: &mut Vec<Block>) {
    loop {
        match blocks.first_mut() {
            Some(Block::Text { content, .. }) => {
                let stripped = content.trim_start();
                if stripped.is_empty() {
                    blocks.remove(0);
                    continue;
                }
                if stripped.len() != content.len() {
                    *content = stripped.to_string();
                }
                return;
            }
            _ => return,
        }
    }
}
