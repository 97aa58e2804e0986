mod constructs;
mod engine;
pub mod error;
mod frame;
mod hooks;

pub use error::{Error, ErrorKind, ParseError};

use std::path::PathBuf;

use crate::Document;
use crate::trace::{NoTrace, TraceSink};

use engine::Engine;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
    name: String,
    base_dir: Option<PathBuf>,
    trace: Box<dyn TraceSink>,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser {
            source,
            file_id,
            name: String::from("<input>"),
            base_dir: None,
            trace: Box::new(NoTrace),
        }
    }

    /// Document identifier used in diagnostics.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Directory code listing paths are relative to.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_trace(mut self, trace: Box<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    /// Parse the source into a Document.
    ///
    /// Malformed constructs do not stop the parser: they are reported in
    /// [`Document::errors`]. Only an unreadable code listing fails the
    /// whole parse.
    pub fn parse(self) -> Result<Document, Error> {
        let name = self.name.clone();
        let engine = Engine::new(self.source, self.name, self.file_id, self.base_dir, self.trace);
        let (blocks, errors) = engine.run()?;
        Ok(Document {
            blocks,
            errors,
            source_id: self.file_id,
            name,
        })
    }
}
