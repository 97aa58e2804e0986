use std::ops::Range;
use std::path::PathBuf;

use codespan_reporting::diagnostic::Severity;

use super::constructs::{self, Abort, Construct, Match, Precondition, Step};
use super::error::{Error, ErrorKind, ParseError};
use super::frame::{Class, Frame, FrameKind, LinkStage, LinkState, Piece, Style, Tail};
use super::hooks::{self, Outcome, PopContext};
use crate::document::{Block, BlockKind, Link, Part, Reference, Text};
use crate::trace::{TraceEvent, TraceSink};

/// The parser state machine. One engine parses one document.
pub(crate) struct Engine {
    pub text: String,
    pub name: String,
    pub file_id: usize,
    pub base_dir: Option<PathBuf>,
    pub stack: Vec<Frame>,
    pub blocks: Vec<Block>,
    pub errors: Vec<ParseError>,
    /// Indentation width to list level, ordered by width.
    pub list_levels: Vec<(usize, usize)>,
    pub trace: Box<dyn TraceSink>,
}

impl Engine {
    pub fn new(
        text: String,
        name: String,
        file_id: usize,
        base_dir: Option<PathBuf>,
        trace: Box<dyn TraceSink>,
    ) -> Self {
        Engine {
            text,
            name,
            file_id,
            base_dir,
            stack: Vec::new(),
            blocks: Vec::new(),
            errors: Vec::new(),
            list_levels: Vec::new(),
            trace,
        }
    }

    pub fn run(mut self) -> Result<(Vec<Block>, Vec<ParseError>), Error> {
        let len = self.text.len();
        let mut idx = 0;

        while idx < len {
            if self.stack.is_empty() {
                self.stack.push(Frame::new(FrameKind::Paragraph, idx, idx, None));
            }
            if let Some(next) = self.check_tail(idx) {
                idx = next;
                continue;
            }
            idx = self.dispatch(idx)?;
        }

        if !self.stack.is_empty() {
            self.close(0, len, len);
        }
        log::debug!(
            "{}: {} blocks, {} errors",
            self.name,
            self.blocks.len(),
            self.errors.len()
        );
        Ok((self.blocks, self.errors))
    }

    // ---------------------------------------------------------------
    // Scanning
    // ---------------------------------------------------------------

    /// Look for a tail of an open frame at `idx`, innermost first, and
    /// close that frame. A literal frame shields everything beneath it.
    fn check_tail(&mut self, idx: usize) -> Option<usize> {
        let mut found = None;
        for depth in (0..self.stack.len()).rev() {
            let frame = &self.stack[depth];
            if let Some(tail) = frame.tail {
                if let Some(end) = self.match_tail(tail, idx) {
                    found = Some((depth, end, tail));
                    break;
                }
            }
            if frame.kind.is_literal() {
                break;
            }
        }

        let (depth, end, tail) = found?;
        if self.trace.enabled() {
            self.trace.trace(&TraceEvent::Tail {
                idx,
                depth,
                tail: tail.as_str(),
            });
        }
        Some(self.close(depth, idx, end))
    }

    fn match_tail(&self, tail: Tail, idx: usize) -> Option<usize> {
        let rest = &self.text[idx..];
        match tail {
            Tail::Literal(s) => rest.starts_with(s).then_some(idx + s.len()),
            Tail::Fence(s) => {
                if !rest.starts_with(s) || self.line_indent(idx).is_none() {
                    return None;
                }
                Some(idx + self.run_length(idx, &s.as_bytes()[..1]))
            }
        }
    }

    fn dispatch(&mut self, idx: usize) -> Result<usize, Error> {
        let byte = self.text.as_bytes()[idx];
        for construct in constructs::CONSTRUCTS {
            if !construct.chars.contains(&byte) {
                continue;
            }
            let Some(m) = self.match_construct(construct, idx) else {
                continue;
            };
            if self.trace.enabled() {
                let nearby_end = self.floor_boundary((idx + 20).min(self.text.len()));
                let nearby = self.text[idx..nearby_end].to_string();
                self.trace.trace(&TraceEvent::Call {
                    idx,
                    count: m.count,
                    construct: construct.name,
                    nearby: &nearby,
                });
            }
            match (construct.handler)(self, &m) {
                Ok(Step::Applied(next)) => {
                    debug_assert!(next > idx, "{} did not advance", construct.name);
                    return Ok(next.max(self.advance(idx)));
                }
                Ok(Step::Skip) => continue,
                Err(Abort::Recoverable(message)) => {
                    self.record(ErrorKind::Construct, Severity::Error, message, idx..m.end, None);
                    return Ok(self.advance(idx));
                }
                Err(Abort::Fatal(err)) => return Err(err),
            }
        }
        Ok(self.advance(idx))
    }

    fn match_construct(&self, construct: &Construct, idx: usize) -> Option<Match> {
        let count = self.run_length(idx, construct.chars);
        let mut m = Match {
            idx,
            count,
            indent: 0,
            param: idx + count..idx + count,
            end: idx + count,
        };
        for precondition in construct.preconditions {
            match *precondition {
                Precondition::Repeat(n) => {
                    if count != n {
                        return None;
                    }
                }
                Precondition::AtLeast(n) => {
                    if count < n {
                        return None;
                    }
                }
                Precondition::LineStart => m.indent = self.line_indent(idx)?,
                Precondition::Exclude(classes) => {
                    let top = self.stack.last()?.class();
                    if classes.iter().any(|&class| top.is_a(class)) {
                        return None;
                    }
                }
                Precondition::Seek(ch) => {
                    let from = idx + count;
                    match self.text[from..].find(ch) {
                        Some(offset) => {
                            let param = from..from + offset;
                            if ch != '\n' && self.text[param.clone()].contains('\n') {
                                return None;
                            }
                            m.end = param.end + ch.len_utf8();
                            m.param = param;
                        }
                        None if ch == '\n' => {
                            m.param = from..self.text.len();
                            m.end = self.text.len();
                        }
                        None => return None,
                    }
                }
            }
        }
        Some(m)
    }

    /// Number of consecutive bytes from `chars` starting at `idx`.
    pub fn run_length(&self, idx: usize, chars: &[u8]) -> usize {
        self.text.as_bytes()[idx..]
            .iter()
            .take_while(|b| chars.contains(b))
            .count()
    }

    /// Width of the whitespace before `idx` on its line, or `None` when
    /// anything else precedes it.
    pub fn line_indent(&self, idx: usize) -> Option<usize> {
        let line_start = self.text[..idx].rfind('\n').map_or(0, |p| p + 1);
        let prefix = &self.text[line_start..idx];
        prefix
            .bytes()
            .all(|b| b == b' ' || b == b'\t')
            .then_some(prefix.len())
    }

    /// Offset just past the character at `idx`.
    pub fn advance(&self, idx: usize) -> usize {
        idx + self.text[idx..].chars().next().map_or(1, char::len_utf8)
    }

    fn floor_boundary(&self, mut idx: usize) -> usize {
        while !self.text.is_char_boundary(idx) {
            idx -= 1;
        }
        idx
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.text[..offset].matches('\n').count() + 1
    }

    // ---------------------------------------------------------------
    // Stack operations
    // ---------------------------------------------------------------

    pub fn top_is_block(&self) -> bool {
        self.stack.last().is_none_or(|frame| frame.kind.is_block())
    }

    /// Push `frame`, flushing the current top's text up to `idx`.
    /// Only blocks may hold other frames; returns false when refused.
    pub fn push(&mut self, idx: usize, frame: Frame) -> bool {
        if let Some(top) = self.stack.last_mut() {
            if !top.kind.is_block() {
                if self.trace.enabled() {
                    let (frame, top) = (frame.to_string(), top.to_string());
                    self.trace.trace(&TraceEvent::Reject {
                        idx,
                        frame: &frame,
                        top: &top,
                    });
                }
                return false;
            }
            top.flush(&self.text, idx);
        }
        if self.trace.enabled() {
            let desc = frame.to_string();
            self.trace.trace(&TraceEvent::Push { idx, frame: &desc });
        }
        self.stack.push(frame);
        true
    }

    /// Pop every frame above `depth` as unterminated, then pop the frame
    /// at `depth` as matched by text ending at `eidx`. Returns where
    /// scanning resumes.
    pub fn close(&mut self, depth: usize, idx: usize, eidx: usize) -> usize {
        while self.stack.len() > depth + 1 {
            self.pop(idx, idx, true);
        }
        if let Some(resume_at) = self.pop(idx, eidx, false) {
            return resume_at;
        }

        if let Some(top) = self.stack.last() {
            let class = top.class();
            for hook in hooks::POST_POP.iter().filter(|hook| class.is_a(hook.class)) {
                (hook.run)(self, eidx);
            }
        }
        eidx
    }

    /// Pop the top frame, run its pre-pop hooks and attach the finished
    /// node to the new top. Returns the resume offset if a hook deferred.
    pub fn pop(&mut self, idx: usize, eidx: usize, forced: bool) -> Option<usize> {
        let mut frame = self.stack.pop()?;
        frame.flush(&self.text, idx);

        if self.trace.enabled() {
            let desc = frame.to_string();
            self.trace.trace(&TraceEvent::Pop {
                idx,
                frame: &desc,
                forced,
            });
        }

        if forced
            && frame.tail.is_some()
            && !matches!(frame.class(), Class::TableRow | Class::TableCell)
        {
            let message = format!("unterminated {}", frame.kind.name());
            self.record(
                ErrorKind::Unterminated,
                Severity::Warning,
                message,
                frame.origin..idx,
                Some(frame.to_string()),
            );
        }

        let ctx = PopContext { idx, eidx, forced };
        let class = frame.class();
        for hook in hooks::PRE_POP.iter().filter(|hook| class.is_a(hook.class)) {
            match (hook.run)(self, &mut frame, &ctx) {
                Outcome::Proceed => {}
                Outcome::Defer { resume_at } => {
                    if self.trace.enabled() {
                        let desc = frame.to_string();
                        self.trace.trace(&TraceEvent::Defer {
                            idx,
                            frame: &desc,
                            resume_at,
                        });
                    }
                    self.stack.push(frame);
                    return Some(resume_at);
                }
                Outcome::Discard => {
                    self.resume_parent(eidx);
                    return None;
                }
            }
        }

        if let Some(node) = materialize(frame) {
            self.attach(node);
        }
        self.resume_parent(eidx);
        None
    }

    fn resume_parent(&mut self, eidx: usize) {
        if let Some(parent) = self.stack.last_mut() {
            parent.start = eidx;
        }
    }

    /// Add a finished node to the new top of the stack. Blocks finished
    /// directly under a root paragraph that has no content yet become
    /// top-level blocks themselves.
    fn attach(&mut self, node: Part) {
        let promote = self.stack.len() == 1
            && self.stack[0].is_blank()
            && matches!(&node, Part::Block(block) if !block.is_inline());

        match self.stack.last_mut() {
            Some(root) if promote => {
                root.pieces.clear();
                if let Part::Block(block) = node {
                    self.emit(block);
                }
            }
            Some(parent) => parent.pieces.push(Piece::Node(node)),
            None => match node {
                Part::Block(block) => self.emit(block),
                Part::Text(text) => self.emit(Block::with_parts(
                    BlockKind::Paragraph,
                    vec![Part::Text(text)],
                )),
            },
        }
    }

    fn emit(&mut self, block: Block) {
        log::trace!("{}: top-level {}", self.name, block);
        self.blocks.push(block);
        self.check_invariants();
    }

    fn check_invariants(&mut self) {
        let list_open = self
            .stack
            .iter()
            .any(|frame| frame.class() == Class::ListBlock);
        if !self.list_levels.is_empty() && !list_open {
            let offset = self.stack.last().map_or(self.text.len(), |frame| frame.start);
            self.record(
                ErrorKind::Invariant,
                Severity::Bug,
                "list levels left behind by a closed list".to_string(),
                offset..offset,
                None,
            );
            self.list_levels.clear();
        }
    }

    /// Level of a list item indented by `indent`, updating the level table.
    pub fn list_level(&mut self, indent: usize) -> usize {
        let list_open = self
            .stack
            .iter()
            .any(|frame| frame.class() == Class::ListBlock);
        if !list_open {
            self.list_levels.clear();
        }

        self.list_levels.retain(|&(width, _)| width <= indent);
        if let Some(&(_, level)) = self.list_levels.iter().find(|&&(width, _)| width == indent) {
            return level;
        }
        let level = self.list_levels.last().map_or(1, |&(_, level)| level + 1);
        self.list_levels.push((indent, level));
        level
    }

    // ---------------------------------------------------------------
    // Errors
    // ---------------------------------------------------------------

    pub fn record(
        &mut self,
        kind: ErrorKind,
        severity: Severity,
        message: String,
        span: Range<usize>,
        popped: Option<String>,
    ) {
        let line = self.line_of(span.start);
        let mut err = match severity {
            Severity::Warning => ParseError::warning(kind, message, span, self.file_id),
            _ => ParseError {
                severity,
                ..ParseError::error(kind, message, span, self.file_id)
            },
        }
        .in_document(self.name.clone(), line);
        for frame in &self.stack {
            err = err.with_note(frame.to_string());
        }
        if let Some(popped) = popped {
            err = err.with_note(popped);
        }

        if kind == ErrorKind::Invariant {
            log::error!("{}", err);
        } else {
            log::warn!("{}", err);
        }
        self.errors.push(err);
    }
}

// -------------------------------------------------------------------
// Materialization
// -------------------------------------------------------------------

/// Turn a popped frame into its document node. Empty paragraphs vanish.
pub(crate) fn materialize(frame: Frame) -> Option<Part> {
    let kind = match frame.kind {
        FrameKind::Styled(style) => {
            let s = join_text(&frame.pieces);
            let text = match style {
                Style::Italic => Text::Italic(s),
                Style::Bold => Text::Bold(s),
                Style::BoldItalic => Text::BoldItalic(s),
            };
            return Some(text.into());
        }
        FrameKind::InlineCode => return Some(Text::InlineCode(join_text(&frame.pieces)).into()),
        FrameKind::BreakLine => return Some(Text::BreakLine.into()),
        FrameKind::Link(LinkState { image, stage }) => {
            let content = join_text(&frame.pieces);
            let text = match stage {
                LinkStage::Target { kind, label } => {
                    let link = Link::new(kind, label, content.trim());
                    if image {
                        Text::Image(link)
                    } else {
                        Text::Link(link)
                    }
                }
                LinkStage::Label | LinkStage::Reference => Text::Reference(Reference::new(content)),
            };
            return Some(text.into());
        }
        FrameKind::Paragraph => BlockKind::Paragraph,
        FrameKind::Header { size } => BlockKind::Header { size },
        FrameKind::ListBlock { .. } => BlockKind::ListBlock,
        FrameKind::ListEntry { level } => BlockKind::ListEntry { level },
        FrameKind::Table => BlockKind::Table,
        FrameKind::TableRow => BlockKind::TableRow,
        FrameKind::TableCell { colspan, rowspan } => BlockKind::TableCell { colspan, rowspan },
        FrameKind::BlockQuote => BlockKind::BlockQuote,
        FrameKind::Code { language } => BlockKind::Code { language },
        FrameKind::CodeListing { filename } => BlockKind::CodeListing { filename },
        FrameKind::Incut { style } => BlockKind::Incut { style },
        FrameKind::Span { style } => BlockKind::Span { style },
    };

    let trim = !matches!(kind, BlockKind::Code { .. } | BlockKind::CodeListing { .. });
    let parts = block_parts(frame.pieces, trim);
    if kind == BlockKind::Paragraph && parts.is_empty() {
        return None;
    }
    Some(Block::with_parts(kind, parts).into())
}

pub(crate) fn join_text(pieces: &[Piece]) -> String {
    let mut out = String::new();
    for piece in pieces {
        match piece {
            Piece::Text(s) => out.push_str(s),
            Piece::Node(Part::Text(text)) => out.push_str(text.plain_text()),
            Piece::Node(Part::Block(block)) => out.push_str(&block.plain_text()),
        }
    }
    out
}

/// Merge adjacent text pieces; with `trim`, strip whitespace at the block
/// edges and around nested non-inline blocks. Empty text is dropped.
fn block_parts(pieces: Vec<Piece>, trim: bool) -> Vec<Part> {
    let mut parts: Vec<Part> = Vec::new();
    for piece in pieces {
        match piece {
            Piece::Text(s) => match parts.last_mut() {
                Some(Part::Text(Text::Plain(prev))) => prev.push_str(&s),
                _ => parts.push(Part::Text(Text::Plain(s))),
            },
            Piece::Node(part) => parts.push(part),
        }
    }

    if trim {
        let is_flow_block =
            |part: Option<&Part>| matches!(part, Some(Part::Block(block)) if !block.is_inline());
        for i in 0..parts.len() {
            let trim_start = i == 0 || is_flow_block(parts.get(i - 1));
            let trim_end = i + 1 == parts.len() || is_flow_block(parts.get(i + 1));
            if let Part::Text(Text::Plain(s)) = &mut parts[i] {
                if trim_start {
                    *s = s.trim_start().to_string();
                }
                if trim_end {
                    *s = s.trim_end().to_string();
                }
            }
        }
    }
    parts.retain(|part| !matches!(part, Part::Text(Text::Plain(s)) if s.is_empty()));
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::NoTrace;

    fn engine(text: &str) -> Engine {
        Engine::new(text.to_string(), "test".into(), 0, None, Box::new(NoTrace))
    }

    #[test]
    fn list_levels_follow_indentation() {
        let mut engine = engine("");
        engine
            .stack
            .push(Frame::new(FrameKind::ListBlock { level: 1 }, 0, 0, None));
        let levels: Vec<usize> = [0, 2, 2, 0, 4]
            .into_iter()
            .map(|indent| engine.list_level(indent))
            .collect();
        assert_eq!(levels, vec![1, 2, 2, 1, 2]);
    }

    #[test]
    fn list_levels_reset_without_open_list() {
        let mut engine = engine("");
        engine.list_levels = vec![(0, 1), (4, 2)];
        assert_eq!(engine.list_level(4), 1);
    }

    #[test]
    fn line_indent_requires_leading_whitespace_only() {
        let engine = engine("ab\n  * x");
        assert_eq!(engine.line_indent(5), Some(2));
        assert_eq!(engine.line_indent(1), None);
        assert_eq!(engine.line_indent(0), Some(0));
    }

    #[test]
    fn block_parts_merge_and_trim() {
        let parts = block_parts(
            vec![
                Piece::Text("  a".into()),
                Piece::Text("b ".into()),
                Piece::Node(Text::Bold("c".into()).into()),
                Piece::Text("  ".into()),
            ],
            true,
        );
        assert_eq!(
            parts,
            vec![
                Part::Text(Text::Plain("ab ".into())),
                Part::Text(Text::Bold("c".into())),
            ]
        );
    }

    #[test]
    fn empty_paragraph_materializes_to_nothing() {
        let mut frame = Frame::new(FrameKind::Paragraph, 0, 0, None);
        frame.pieces.push(Piece::Text(" \n ".into()));
        assert!(materialize(frame).is_none());
    }

    #[test]
    fn invariant_violation_is_recorded_and_reset() {
        let mut engine = engine("text");
        engine.list_levels = vec![(0, 1)];
        engine.emit(Block::new(BlockKind::Paragraph));
        assert!(engine.list_levels.is_empty());
        assert_eq!(engine.errors.len(), 1);
        assert_eq!(engine.errors[0].kind, ErrorKind::Invariant);
    }
}
