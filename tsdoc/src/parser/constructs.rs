//! The construct table: which characters open which constructs.
//!
//! Entries are tried in order. An entry applies when the character at the
//! scan position is in its character set and all of its preconditions
//! hold; its handler then either consumes input or skips, letting the
//! next entry try.

use std::fs;
use std::ops::Range;
use std::path::PathBuf;

use super::engine::Engine;
use super::error::Error;
use super::frame::{Class, Frame, FrameKind, LinkStage, LinkState, Piece, Style, Tail};
use super::hooks;

pub(crate) struct Construct {
    pub name: &'static str,
    pub chars: &'static [u8],
    pub preconditions: &'static [Precondition],
    pub handler: fn(&mut Engine, &Match) -> Result<Step, Abort>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Precondition {
    /// The run of construct characters has exactly this length.
    Repeat(usize),
    /// The run of construct characters is at least this long.
    AtLeast(usize),
    /// Only whitespace precedes the marker on its line.
    LineStart,
    /// The innermost open frame is none of these classes.
    Exclude(&'static [Class]),
    /// The marker is followed by a parameter ending at this character.
    /// A missing newline terminator means "until end of input".
    Seek(char),
}

/// What the preconditions found at the scan position.
#[derive(Debug, Clone)]
pub(crate) struct Match {
    pub idx: usize,
    /// Length of the run of construct characters.
    pub count: usize,
    /// Indentation width, when `LineStart` was checked.
    pub indent: usize,
    /// Text between the marker and the `Seek` terminator.
    pub param: Range<usize>,
    /// End of the marker, terminator included.
    pub end: usize,
}

pub(crate) enum Step {
    Applied(usize),
    Skip,
}

pub(crate) enum Abort {
    /// Malformed construct; the marker is kept as literal text.
    Recoverable(String),
    Fatal(Error),
}

const CODE: &[Class] = &[Class::Code];
const CODE_INLINE: &[Class] = &[Class::Code, Class::InlineCode];
const CODE_INLINE_LINK: &[Class] = &[Class::Code, Class::InlineCode, Class::Link];

pub(crate) const CONSTRUCTS: &[Construct] = &[
    Construct {
        name: "escape",
        chars: b"\\",
        preconditions: &[Precondition::Exclude(CODE)],
        handler: escape,
    },
    Construct {
        name: "end_paragraph",
        chars: b"\n",
        preconditions: &[],
        handler: end_paragraph,
    },
    Construct {
        name: "break_line",
        chars: b">",
        preconditions: &[Precondition::Repeat(3), Precondition::Exclude(CODE_INLINE)],
        handler: break_line,
    },
    Construct {
        name: "block_quote",
        chars: b">",
        preconditions: &[
            Precondition::LineStart,
            Precondition::Repeat(1),
            Precondition::Exclude(CODE_INLINE),
        ],
        handler: block_quote,
    },
    Construct {
        name: "header",
        chars: b"#",
        preconditions: &[Precondition::LineStart, Precondition::Exclude(CODE_INLINE)],
        handler: header,
    },
    Construct {
        name: "list_entry",
        chars: b"*",
        preconditions: &[
            Precondition::LineStart,
            Precondition::Repeat(1),
            Precondition::Exclude(CODE_INLINE),
        ],
        handler: list_entry,
    },
    Construct {
        name: "span",
        chars: b"_",
        preconditions: &[
            Precondition::Repeat(3),
            Precondition::Exclude(CODE_INLINE_LINK),
            Precondition::Seek(' '),
        ],
        handler: span,
    },
    Construct {
        name: "styled",
        chars: b"_*",
        preconditions: &[Precondition::Exclude(CODE_INLINE_LINK)],
        handler: styled,
    },
    Construct {
        name: "inline_code",
        chars: b"`",
        preconditions: &[Precondition::Repeat(1), Precondition::Exclude(CODE_INLINE)],
        handler: inline_code,
    },
    Construct {
        name: "code",
        chars: b"`",
        preconditions: &[
            Precondition::LineStart,
            Precondition::Repeat(3),
            Precondition::Exclude(CODE_INLINE),
            Precondition::Seek('\n'),
        ],
        handler: code,
    },
    Construct {
        name: "code_listing",
        chars: b"`",
        preconditions: &[
            Precondition::LineStart,
            Precondition::AtLeast(5),
            Precondition::Exclude(CODE_INLINE),
            Precondition::Seek('\n'),
        ],
        handler: code_listing,
    },
    Construct {
        name: "incut",
        chars: b"!",
        preconditions: &[
            Precondition::LineStart,
            Precondition::Repeat(3),
            Precondition::Exclude(CODE_INLINE),
            Precondition::Seek('\n'),
        ],
        handler: incut,
    },
    Construct {
        name: "link",
        chars: b"![",
        preconditions: &[Precondition::Exclude(CODE_INLINE)],
        handler: link,
    },
    Construct {
        name: "table",
        chars: b"-",
        preconditions: &[
            Precondition::LineStart,
            Precondition::Exclude(CODE_INLINE),
            Precondition::Seek('\n'),
        ],
        handler: table,
    },
];

// -------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------

/// `\x` keeps `x` literally and drops the backslash.
fn escape(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    let next = m.idx + 1;
    let end = if next < engine.text.len() {
        engine.advance(next)
    } else {
        next
    };
    if let Some(top) = engine.stack.last_mut() {
        top.flush(&engine.text, m.idx);
        top.start = next;
    }
    Ok(Step::Applied(end))
}

/// Two or more newlines, possibly with blank space between them, close the
/// nearest paragraph and open a new one.
fn end_paragraph(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    let bytes = engine.text.as_bytes();
    let mut pos = m.idx;
    let mut newlines = 0;
    let mut end = m.idx;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\n' => {
                newlines += 1;
                pos += 1;
                end = pos;
            }
            b' ' | b'\t' | b'\r' => pos += 1,
            _ => break,
        }
    }
    if newlines < 2 {
        return Ok(Step::Skip);
    }

    let mut target = None;
    for depth in (0..engine.stack.len()).rev() {
        match engine.stack[depth].class() {
            Class::Paragraph => {
                target = Some(depth);
                break;
            }
            Class::Incut | Class::Code | Class::CodeListing => return Ok(Step::Skip),
            _ => {}
        }
    }
    let Some(depth) = target else {
        return Ok(Step::Skip);
    };

    engine.close(depth, m.idx, m.idx);
    let paragraph = Frame::new(FrameKind::Paragraph, end, end, None);
    if engine.stack.is_empty() {
        engine.stack.push(paragraph);
    } else {
        engine.push(end, paragraph);
    }
    Ok(Step::Applied(end))
}

fn break_line(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    if !engine.push(m.idx, Frame::new(FrameKind::BreakLine, m.idx, m.end, None)) {
        return Ok(Step::Skip);
    }
    engine.pop(m.end, m.end, false);
    Ok(Step::Applied(m.end))
}

/// `>` at line start opens a quote, or continues the open one.
fn block_quote(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    let in_quote = engine
        .stack
        .iter()
        .any(|frame| frame.class() == Class::BlockQuote);
    if in_quote {
        if let Some(top) = engine.stack.last_mut() {
            top.flush(&engine.text, m.idx);
            top.start = m.end;
        }
        return Ok(Step::Applied(m.end));
    }
    if !engine.push(m.idx, Frame::new(FrameKind::BlockQuote, m.idx, m.end, None)) {
        return Ok(Step::Skip);
    }
    Ok(Step::Applied(m.end))
}

/// `#`..`######` opens a header sized by the run length. A header ends
/// with its paragraph or with the next header marker.
fn header(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    if !engine.top_is_block() {
        return Ok(Step::Skip);
    }
    if let Some(depth) = engine
        .stack
        .iter()
        .rposition(|frame| frame.class() == Class::Header)
    {
        engine.close(depth, m.idx, m.idx);
    }
    engine.push(
        m.idx,
        Frame::new(FrameKind::Header { size: m.count }, m.idx, m.end, None),
    );
    Ok(Step::Applied(m.end))
}

/// `* ` at line start. Items of the same level share a list; a deeper
/// indentation opens a nested one.
fn list_entry(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    if !matches!(engine.text.as_bytes().get(m.end), Some(b' ' | b'\t')) {
        return Ok(Step::Skip);
    }
    if !engine.top_is_block() {
        return Ok(Step::Skip);
    }

    let level = engine.list_level(m.indent);
    let open = engine
        .stack
        .iter()
        .rposition(|frame| frame.kind == FrameKind::ListBlock { level });
    match open {
        Some(depth) => {
            while engine.stack.len() > depth + 1 {
                engine.pop(m.idx, m.idx, true);
            }
        }
        None => {
            engine.push(
                m.idx,
                Frame::new(FrameKind::ListBlock { level }, m.idx, m.idx, None),
            );
        }
    }
    engine.push(
        m.idx,
        Frame::new(FrameKind::ListEntry { level }, m.idx, m.end, None),
    );
    Ok(Step::Applied(m.end))
}

/// `___style text___` wraps text in a display hint.
fn span(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    let style = engine.text[m.param.clone()].to_string();
    let frame = Frame::new(
        FrameKind::Span { style },
        m.idx,
        m.end,
        Some(Tail::Literal("___")),
    );
    if !engine.push(m.idx, frame) {
        return Ok(Step::Skip);
    }
    Ok(Step::Applied(m.end))
}

/// `_x_`/`*x*` italic, `__x__`/`**x**` bold, `_*x*_`/`*_x_*` bold italic.
fn styled(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    let before = engine.text[..m.idx].chars().next_back();
    if !before.is_none_or(|c| c.is_whitespace() || c.is_ascii_punctuation()) {
        return Ok(Step::Skip);
    }
    let after = engine.text[m.end..].chars().next();
    if !after.is_some_and(|c| !c.is_whitespace()) {
        return Ok(Step::Skip);
    }

    let (style, tail) = match &engine.text[m.idx..m.end] {
        "_" => (Style::Italic, "_"),
        "*" => (Style::Italic, "*"),
        "__" => (Style::Bold, "__"),
        "**" => (Style::Bold, "**"),
        "_*" => (Style::BoldItalic, "*_"),
        "*_" => (Style::BoldItalic, "_*"),
        _ => return Ok(Step::Skip),
    };
    let frame = Frame::new(
        FrameKind::Styled(style),
        m.idx,
        m.end,
        Some(Tail::Literal(tail)),
    );
    if !engine.push(m.idx, frame) {
        return Ok(Step::Skip);
    }
    Ok(Step::Applied(m.end))
}

fn inline_code(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    let frame = Frame::new(
        FrameKind::InlineCode,
        m.idx,
        m.end,
        Some(Tail::Literal("`")),
    );
    if !engine.push(m.idx, frame) {
        return Ok(Step::Skip);
    }
    Ok(Step::Applied(m.end))
}

/// A fenced code block; the rest of the fence line is the language.
fn code(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    let language = engine.text[m.param.clone()].trim();
    let language = (!language.is_empty()).then(|| language.to_string());
    let frame = Frame::new(
        FrameKind::Code { language },
        m.idx,
        m.end,
        Some(Tail::Fence("```")),
    );
    if !engine.push(m.idx, frame) {
        return Ok(Step::Skip);
    }
    Ok(Step::Applied(m.end))
}

/// `````file.c` includes a source file as a code block.
fn code_listing(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    let filename = engine.text[m.param.clone()].trim().to_string();
    if filename.is_empty() {
        return Err(Abort::Recoverable(
            "code listing without a file name".to_string(),
        ));
    }
    if !engine.top_is_block() {
        return Ok(Step::Skip);
    }

    let path = match &engine.base_dir {
        Some(dir) => dir.join(&filename),
        None => PathBuf::from(&filename),
    };
    let content = fs::read_to_string(&path).map_err(|source| {
        Abort::Fatal(Error::Listing {
            document: engine.name.clone(),
            line: engine.line_of(m.idx),
            offset: m.idx,
            path: path.clone(),
            source,
        })
    })?;
    log::debug!("{}: included listing {}", engine.name, path.display());

    let mut frame = Frame::new(FrameKind::CodeListing { filename }, m.idx, m.end, None);
    frame.pieces.push(Piece::Text(content));
    engine.push(m.idx, frame);
    engine.pop(m.end, m.end, false);
    Ok(Step::Applied(m.end))
}

/// `!!! STYLE` opens an incut holding paragraphs, closed by a bare `!!!`.
fn incut(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    let style = engine.text[m.param.clone()].trim().to_string();
    if style.is_empty() {
        return Err(Abort::Recoverable("incut without a style".to_string()));
    }
    let frame = Frame::new(
        FrameKind::Incut { style },
        m.idx,
        m.end,
        Some(Tail::Fence("!!!")),
    );
    if !engine.push(m.idx, frame) {
        return Ok(Step::Skip);
    }
    engine.push(m.end, Frame::new(FrameKind::Paragraph, m.end, m.end, None));
    Ok(Step::Applied(m.end))
}

/// `[` opens a link or reference, `![` an image. Which one it becomes is
/// decided when the label closes.
fn link(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    let image = match &engine.text.as_bytes()[m.idx..] {
        [b'[', ..] => false,
        [b'!', b'[', ..] => true,
        _ => return Ok(Step::Skip),
    };
    let start = if image { m.idx + 2 } else { m.idx + 1 };
    let frame = Frame::new(
        FrameKind::Link(LinkState {
            image,
            stage: LinkStage::Label,
        }),
        m.idx,
        start,
        Some(Tail::Literal("]")),
    );
    if !engine.push(m.idx, frame) {
        return Ok(Step::Skip);
    }
    Ok(Step::Applied(start))
}

/// A line of three or more dashes opens a table closed by another such
/// line. Rows end at newlines, cells at `|`.
fn table(engine: &mut Engine, m: &Match) -> Result<Step, Abort> {
    if m.count < 3 || !engine.text[m.param.clone()].trim().is_empty() {
        return Ok(Step::Skip);
    }
    let frame = Frame::new(FrameKind::Table, m.idx, m.end, Some(Tail::Fence("---")));
    if !engine.push(m.idx, frame) {
        return Ok(Step::Skip);
    }
    hooks::open_row(engine, m.end);
    Ok(Step::Applied(m.end))
}
