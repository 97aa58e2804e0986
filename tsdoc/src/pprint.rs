//! Indented dump of a block tree, for `tsdoc ast` and debugging.

use std::fmt::Write;

use crate::document::{Block, Part};

pub fn pretty(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        write_block(&mut out, block, 0);
    }
    out
}

fn write_block(out: &mut String, block: &Block, depth: usize) {
    let _ = writeln!(out, "{:indent$}{}", "", block.kind, indent = depth * 2);
    for part in &block.parts {
        match part {
            Part::Block(child) => write_block(out, child, depth + 1),
            Part::Text(text) => {
                let _ = writeln!(out, "{:indent$}{:?}", "", text, indent = (depth + 1) * 2);
            }
        }
    }
}
