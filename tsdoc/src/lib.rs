pub mod document;
pub mod parser;
pub mod pprint;
pub mod trace;
pub mod visit;

pub use document::{Block, BlockKind, Part, Text};
pub use parser::{Error, ParseError, Parser};

/// A parsed tsdoc document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Top-level blocks in source order.
    pub blocks: Vec<Block>,
    /// Recoverable errors met while parsing.
    pub errors: Vec<ParseError>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
    pub name: String,
}

impl Document {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Parse `source` with default settings.
pub fn parse(source: &str, name: &str) -> Result<Document, Error> {
    Parser::new(source.to_string(), 0).with_name(name).parse()
}
