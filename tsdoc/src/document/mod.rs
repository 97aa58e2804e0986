mod text;

pub use text::{Directive, Link, LinkKind, Reference, Text};

use std::fmt;

/// A structural node of a parsed document.
///
/// Blocks own their children in source order. A child is either another
/// block or an inline [`Text`] leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub parts: Vec<Part>,
}

/// A child of a [`Block`].
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Block(Block),
    Text(Text),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Paragraph,
    Header {
        size: usize,
    },
    ListBlock,
    ListEntry {
        level: usize,
    },
    Table,
    TableRow,
    TableCell {
        colspan: u32,
        rowspan: u32,
    },
    BlockQuote,
    Code {
        language: Option<String>,
    },
    CodeListing {
        filename: String,
    },
    Incut {
        style: String,
    },
    Span {
        style: String,
    },
    // Layout blocks for paged backends. The parser never produces them.
    FlowableIncut {
        coords: Coordinates,
    },
    PageSpacer {
        height: f32,
        is_break: bool,
        is_conditional: bool,
        style: Option<String>,
    },
}

/// Placement of a flowable incut on a page, in points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coordinates {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Block {
            kind,
            parts: Vec::new(),
        }
    }

    pub fn with_parts(kind: BlockKind, parts: Vec<Part>) -> Self {
        Block { kind, parts }
    }

    pub fn push(&mut self, part: impl Into<Part>) {
        self.parts.push(part.into());
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Child blocks, skipping inline text.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.parts.iter().filter_map(|part| match part {
            Part::Block(block) => Some(block),
            Part::Text(_) => None,
        })
    }

    /// Inline text leaves directly owned by this block.
    pub fn texts(&self) -> impl Iterator<Item = &Text> {
        self.parts.iter().filter_map(|part| match part {
            Part::Text(text) => Some(text),
            Part::Block(_) => None,
        })
    }

    /// Apply `f` to every text leaf of this block and of all nested blocks.
    pub fn for_each_text_mut(&mut self, f: &mut impl FnMut(&mut Text)) {
        for part in &mut self.parts {
            match part {
                Part::Block(block) => block.for_each_text_mut(f),
                Part::Text(text) => f(text),
            }
        }
    }

    /// Visible text of the block with all markup removed.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Block(block) => out.push_str(&block.plain_text()),
                Part::Text(text) => out.push_str(text.plain_text()),
            }
        }
        out
    }

    /// Content of a code block, if this is one.
    pub fn code(&self) -> Option<&str> {
        match self.kind {
            BlockKind::Code { .. } | BlockKind::CodeListing { .. } => {
                self.texts().find_map(|text| match text {
                    Text::Plain(s) => Some(s.as_str()),
                    _ => None,
                })
            }
            _ => None,
        }
    }

    /// Block kinds a paged layout treats as inline-level.
    pub fn is_inline(&self) -> bool {
        matches!(self.kind, BlockKind::Span { .. })
    }
}

impl BlockKind {
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Paragraph => "Paragraph",
            BlockKind::Header { .. } => "Header",
            BlockKind::ListBlock => "ListBlock",
            BlockKind::ListEntry { .. } => "ListEntry",
            BlockKind::Table => "Table",
            BlockKind::TableRow => "TableRow",
            BlockKind::TableCell { .. } => "TableCell",
            BlockKind::BlockQuote => "BlockQuote",
            BlockKind::Code { .. } => "Code",
            BlockKind::CodeListing { .. } => "CodeListing",
            BlockKind::Incut { .. } => "Incut",
            BlockKind::Span { .. } => "Span",
            BlockKind::FlowableIncut { .. } => "FlowableIncut",
            BlockKind::PageSpacer { .. } => "PageSpacer",
        }
    }
}

impl From<Block> for Part {
    fn from(block: Block) -> Self {
        Part::Block(block)
    }
}

impl From<Text> for Part {
    fn from(text: Text) -> Self {
        Part::Text(text)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        match self {
            BlockKind::Header { size } => write!(f, "(size={})", size),
            BlockKind::ListEntry { level } => write!(f, "(level={})", level),
            BlockKind::TableCell { colspan, rowspan } => {
                write!(f, "(colspan={}, rowspan={})", colspan, rowspan)
            }
            BlockKind::Code {
                language: Some(language),
            } => write!(f, "(language={})", language),
            BlockKind::CodeListing { filename } => write!(f, "(filename={})", filename),
            BlockKind::Incut { style } | BlockKind::Span { style } => {
                write!(f, "(style={})", style)
            }
            BlockKind::FlowableIncut { coords } => write!(
                f,
                "(x={}, y={}, width={}, height={})",
                coords.x, coords.y, coords.width, coords.height
            ),
            BlockKind::PageSpacer {
                height,
                is_break,
                is_conditional,
                ..
            } => write!(
                f,
                "(height={}, break={}, conditional={})",
                height, is_break, is_conditional
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} parts]", self.kind, self.parts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_flattens_nested_blocks() {
        let cell = Block::with_parts(
            BlockKind::TableCell {
                colspan: 1,
                rowspan: 1,
            },
            vec![
                Text::Plain("a ".into()).into(),
                Text::Bold("b".into()).into(),
            ],
        );
        let row = Block::with_parts(BlockKind::TableRow, vec![cell.into()]);
        assert_eq!(row.plain_text(), "a b");
        assert_eq!(row.blocks().count(), 1);
        assert_eq!(row.texts().count(), 0);
    }

    #[test]
    fn for_each_text_mut_reaches_every_leaf() {
        let mut block = Block::with_parts(
            BlockKind::Paragraph,
            vec![
                Text::Plain("x".into()).into(),
                Block::with_parts(
                    BlockKind::Span {
                        style: "small".into(),
                    },
                    vec![Text::Italic("y".into()).into()],
                )
                .into(),
            ],
        );
        let mut seen = 0;
        block.for_each_text_mut(&mut |_| seen += 1);
        assert_eq!(seen, 2);
    }

    #[test]
    fn kind_display_includes_options() {
        assert_eq!(BlockKind::Header { size: 2 }.to_string(), "Header(size=2)");
        assert_eq!(BlockKind::Code { language: None }.to_string(), "Code");
        assert_eq!(
            BlockKind::TableCell {
                colspan: 2,
                rowspan: 1
            }
            .to_string(),
            "TableCell(colspan=2, rowspan=1)"
        );
    }
}
