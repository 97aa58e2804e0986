use std::fmt;

use crate::document::{LinkKind, Part};

/// Terminator of an open frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tail {
    /// Matches wherever it appears.
    Literal(&'static str),
    /// Matches only at the start of a line (after indentation) and swallows
    /// the whole run of the fence character.
    Fence(&'static str),
}

impl Tail {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tail::Literal(s) | Tail::Fence(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Style {
    Italic,
    Bold,
    BoldItalic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkStage {
    /// Reading the bracketed label.
    Label,
    /// Label closed and followed by `[` or `(`: reading the target.
    Target { kind: LinkKind, label: String },
    /// Label closed with nothing following it.
    Reference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LinkState {
    pub image: bool,
    pub stage: LinkStage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Paragraph,
    Header { size: usize },
    ListBlock { level: usize },
    ListEntry { level: usize },
    Table,
    TableRow,
    TableCell { colspan: u32, rowspan: u32 },
    BlockQuote,
    Code { language: Option<String> },
    CodeListing { filename: String },
    Incut { style: String },
    Span { style: String },
    Styled(Style),
    InlineCode,
    Link(LinkState),
    BreakLine,
}

/// Construct classes used by hook lookup and context exclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Class {
    Paragraph,
    Header,
    ListBlock,
    ListEntry,
    Table,
    TableRow,
    TableCell,
    BlockQuote,
    Code,
    CodeListing,
    Incut,
    Span,
    Styled,
    InlineCode,
    Link,
    BreakLine,
}

impl FrameKind {
    pub fn class(&self) -> Class {
        match self {
            FrameKind::Paragraph => Class::Paragraph,
            FrameKind::Header { .. } => Class::Header,
            FrameKind::ListBlock { .. } => Class::ListBlock,
            FrameKind::ListEntry { .. } => Class::ListEntry,
            FrameKind::Table => Class::Table,
            FrameKind::TableRow => Class::TableRow,
            FrameKind::TableCell { .. } => Class::TableCell,
            FrameKind::BlockQuote => Class::BlockQuote,
            FrameKind::Code { .. } => Class::Code,
            FrameKind::CodeListing { .. } => Class::CodeListing,
            FrameKind::Incut { .. } => Class::Incut,
            FrameKind::Span { .. } => Class::Span,
            FrameKind::Styled(_) => Class::Styled,
            FrameKind::InlineCode => Class::InlineCode,
            FrameKind::Link(_) => Class::Link,
            FrameKind::BreakLine => Class::BreakLine,
        }
    }

    /// Whether this frame's node is a block, and thus may hold other blocks.
    pub fn is_block(&self) -> bool {
        !matches!(
            self,
            FrameKind::Styled(_) | FrameKind::InlineCode | FrameKind::Link(_) | FrameKind::BreakLine
        )
    }

    /// Frames whose content is never reinterpreted: only their own tail can
    /// end them.
    pub fn is_literal(&self) -> bool {
        match self {
            FrameKind::Code { .. } | FrameKind::CodeListing { .. } | FrameKind::InlineCode => true,
            FrameKind::Link(state) => matches!(state.stage, LinkStage::Target { .. }),
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FrameKind::Styled(Style::Italic) => "Italic",
            FrameKind::Styled(Style::Bold) => "Bold",
            FrameKind::Styled(Style::BoldItalic) => "BoldItalic",
            FrameKind::Link(LinkState { image: true, .. }) => "Image",
            _ => match self.class() {
                Class::Paragraph => "Paragraph",
                Class::Header => "Header",
                Class::ListBlock => "ListBlock",
                Class::ListEntry => "ListEntry",
                Class::Table => "Table",
                Class::TableRow => "TableRow",
                Class::TableCell => "TableCell",
                Class::BlockQuote => "BlockQuote",
                Class::Code => "Code",
                Class::CodeListing => "CodeListing",
                Class::Incut => "Incut",
                Class::Span => "Span",
                Class::Styled => "Styled",
                Class::InlineCode => "InlineCode",
                Class::Link => "Link",
                Class::BreakLine => "BreakLine",
            },
        }
    }
}

impl Class {
    /// Class membership, honouring the one subclass relation: a code
    /// listing is a code block.
    pub fn is_a(self, other: Class) -> bool {
        self == other || (self == Class::CodeListing && other == Class::Code)
    }
}

/// Accumulated content of an open frame.
#[derive(Debug, Clone)]
pub(crate) enum Piece {
    Text(String),
    Node(Part),
}

/// An open construct on the parser stack.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub kind: FrameKind,
    /// Offset of the construct's opening marker.
    pub origin: usize,
    /// Start of the text not yet moved into `pieces`.
    pub start: usize,
    pub tail: Option<Tail>,
    pub pieces: Vec<Piece>,
}

impl Frame {
    pub fn new(kind: FrameKind, origin: usize, start: usize, tail: Option<Tail>) -> Self {
        Frame {
            kind,
            origin,
            start,
            tail,
            pieces: Vec::new(),
        }
    }

    /// Move `text[start..idx]` into the frame's pieces.
    pub fn flush(&mut self, text: &str, idx: usize) {
        if self.start < idx {
            self.pieces.push(Piece::Text(text[self.start..idx].to_string()));
        }
        self.start = self.start.max(idx);
    }

    /// True when the frame holds nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.pieces.iter().all(|piece| match piece {
            Piece::Text(s) => s.trim().is_empty(),
            Piece::Node(_) => false,
        })
    }

    pub fn class(&self) -> Class {
        self.kind.class()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:5}] {}({} parts", self.origin, self.kind.name(), self.pieces.len())?;
        match &self.kind {
            FrameKind::Header { size } => write!(f, ", size={}", size)?,
            FrameKind::ListBlock { level } | FrameKind::ListEntry { level } => {
                write!(f, ", level={}", level)?
            }
            FrameKind::TableCell { colspan, rowspan } => {
                write!(f, ", colspan={}, rowspan={}", colspan, rowspan)?
            }
            FrameKind::Incut { style } | FrameKind::Span { style } => {
                write!(f, ", style={}", style)?
            }
            FrameKind::Link(state) => write!(f, ", {:?}", state.stage)?,
            _ => {}
        }
        match self.tail {
            Some(tail) => write!(f, ") -> {:?}", tail.as_str()),
            None => write!(f, ") -> None"),
        }
    }
}
