use crate::document::{Block, Part, Text};

/// Read-only traversal of a block tree.
///
/// Override `visit_block` to act on blocks; call [`walk_block`] from it to
/// keep descending.
pub trait Visitor {
    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_text(&mut self, _text: &Text) {}
}

pub fn walk_block<V: Visitor + ?Sized>(visitor: &mut V, block: &Block) {
    for part in &block.parts {
        match part {
            Part::Block(child) => visitor.visit_block(child),
            Part::Text(text) => visitor.visit_text(text),
        }
    }
}

pub fn walk_blocks<V: Visitor + ?Sized>(visitor: &mut V, blocks: &[Block]) {
    for block in blocks {
        visitor.visit_block(block);
    }
}
