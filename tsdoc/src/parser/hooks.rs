//! Hooks run around frame pops.
//!
//! Pre-pop hooks see the frame being removed and may rewrite it, discard
//! it, or defer the pop and keep it open. Post-pop hooks run for the frame
//! that became the top of the stack after a matched pop.

use std::sync::LazyLock;

use codespan_reporting::diagnostic::Severity;
use regex::Regex;

use super::engine::{Engine, join_text};
use super::error::ErrorKind;
use super::frame::{Class, Frame, FrameKind, LinkStage, Piece, Tail};
use crate::document::{LinkKind, Part};

/// Cell span prefix `<cols>,<rows>` directly after a cell separator.
static CELL_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+),([0-9]+)").expect("cell span pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Proceed,
    /// Keep the frame open and continue scanning at `resume_at`.
    Defer { resume_at: usize },
    /// Drop the frame without producing a node.
    Discard,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PopContext {
    pub idx: usize,
    pub eidx: usize,
    pub forced: bool,
}

pub(crate) struct PrePop {
    pub class: Class,
    pub run: fn(&mut Engine, &mut Frame, &PopContext) -> Outcome,
}

pub(crate) struct PostPop {
    pub class: Class,
    pub run: fn(&mut Engine, usize),
}

pub(crate) const PRE_POP: &[PrePop] = &[
    PrePop {
        class: Class::ListBlock,
        run: list_block,
    },
    PrePop {
        class: Class::Code,
        run: code,
    },
    PrePop {
        class: Class::TableRow,
        run: table_row,
    },
    PrePop {
        class: Class::Link,
        run: link,
    },
];

pub(crate) const POST_POP: &[PostPop] = &[
    PostPop {
        class: Class::Table,
        run: open_row,
    },
    PostPop {
        class: Class::TableRow,
        run: open_cell,
    },
];

/// The level table belongs to the outermost list.
fn list_block(engine: &mut Engine, _frame: &mut Frame, _ctx: &PopContext) -> Outcome {
    let nested = engine
        .stack
        .iter()
        .any(|frame| frame.class() == Class::ListBlock);
    if !nested {
        engine.list_levels.clear();
    }
    Outcome::Proceed
}

/// Code keeps its text verbatim apart from leading blank lines and
/// trailing whitespace.
fn code(_engine: &mut Engine, frame: &mut Frame, _ctx: &PopContext) -> Outcome {
    let content = join_text(&frame.pieces);
    let mut skip = 0;
    for line in content.split_inclusive('\n') {
        if !line.trim().is_empty() || !line.ends_with('\n') {
            break;
        }
        skip += line.len();
    }
    frame.pieces = vec![Piece::Text(content[skip..].trim_end().to_string())];
    Outcome::Proceed
}

fn table_row(_engine: &mut Engine, frame: &mut Frame, _ctx: &PopContext) -> Outcome {
    let empty = frame.pieces.iter().all(|piece| match piece {
        Piece::Node(Part::Block(cell)) => cell.is_empty(),
        Piece::Node(Part::Text(_)) => false,
        Piece::Text(s) => s.trim().is_empty(),
    });
    if empty {
        Outcome::Discard
    } else {
        Outcome::Proceed
    }
}

/// A closed label followed by `[` or `(` becomes a link whose target is
/// read next; otherwise it is a reference.
fn link(engine: &mut Engine, frame: &mut Frame, ctx: &PopContext) -> Outcome {
    let FrameKind::Link(state) = &mut frame.kind else {
        return Outcome::Proceed;
    };
    if state.stage != LinkStage::Label {
        return Outcome::Proceed;
    }

    let label = join_text(&frame.pieces);
    let next = if ctx.forced {
        None
    } else {
        engine.text[ctx.eidx..].chars().next()
    };
    let (kind, tail) = match next {
        Some('[') => (LinkKind::Internal, "]"),
        Some('(') => (LinkKind::External, ")"),
        _ => {
            state.stage = LinkStage::Reference;
            frame.pieces = vec![Piece::Text(label)];
            return Outcome::Proceed;
        }
    };

    state.stage = LinkStage::Target { kind, label };
    frame.pieces.clear();
    frame.tail = Some(Tail::Literal(tail));
    frame.start = ctx.eidx + 1;
    Outcome::Defer {
        resume_at: ctx.eidx + 1,
    }
}

/// Open a table row with its first cell.
pub(crate) fn open_row(engine: &mut Engine, idx: usize) {
    let row = Frame::new(FrameKind::TableRow, idx, idx, Some(Tail::Literal("\n")));
    if engine.push(idx, row) {
        open_cell(engine, idx);
    }
}

/// Open a table cell, reading an optional span prefix.
pub(crate) fn open_cell(engine: &mut Engine, idx: usize) {
    let (mut colspan, mut rowspan, mut start) = (1, 1, idx);
    if let Some(caps) = CELL_SPAN.captures(&engine.text[idx..]) {
        match (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
            (Ok(cols), Ok(rows)) => {
                colspan = cols;
                rowspan = rows;
                start = idx + caps[0].len();
            }
            _ => {
                let span = idx..idx + caps[0].len();
                engine.record(
                    ErrorKind::Construct,
                    Severity::Error,
                    format!("cell span {} is out of range", &caps[0]),
                    span,
                    None,
                );
            }
        }
    }
    let cell = Frame::new(
        FrameKind::TableCell { colspan, rowspan },
        idx,
        start,
        Some(Tail::Literal("|")),
    );
    engine.push(idx, cell);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::NoTrace;

    fn engine(text: &str) -> Engine {
        let mut engine = Engine::new(text.to_string(), "test".into(), 0, None, Box::new(NoTrace));
        engine.stack.push(Frame::new(FrameKind::Table, 0, 0, None));
        engine
    }

    #[test]
    fn cell_span_prefix_is_parsed() {
        let mut engine = engine("2,3 text");
        open_row(&mut engine, 0);
        let cell = engine.stack.last().expect("cell frame");
        assert_eq!(
            cell.kind,
            FrameKind::TableCell {
                colspan: 2,
                rowspan: 3
            }
        );
        assert_eq!(cell.start, 3);
    }

    #[test]
    fn oversized_cell_span_falls_back() {
        let mut engine = engine("99999999999,1 x");
        open_row(&mut engine, 0);
        let cell = engine.stack.last().expect("cell frame");
        assert_eq!(
            cell.kind,
            FrameKind::TableCell {
                colspan: 1,
                rowspan: 1
            }
        );
        assert_eq!(engine.errors.len(), 1);
    }

    #[test]
    fn non_ascii_digits_are_cell_text() {
        let mut engine = engine("١,٢ x");
        open_row(&mut engine, 0);
        let cell = engine.stack.last().expect("cell frame");
        assert_eq!(
            cell.kind,
            FrameKind::TableCell {
                colspan: 1,
                rowspan: 1
            }
        );
        assert_eq!(cell.start, 0);
        assert!(engine.errors.is_empty());
    }

    #[test]
    fn code_drops_leading_blank_lines_only() {
        let mut engine = engine("");
        let mut frame = Frame::new(FrameKind::Code { language: None }, 0, 0, None);
        frame.pieces.push(Piece::Text("\n  \n    indented\nnext\n\n".into()));
        let ctx = PopContext {
            idx: 0,
            eidx: 0,
            forced: false,
        };
        assert_eq!(code(&mut engine, &mut frame, &ctx), Outcome::Proceed);
        assert_eq!(join_text(&frame.pieces), "    indented\nnext");
    }
}
