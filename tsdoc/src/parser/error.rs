use std::fmt;
use std::io;
use std::ops::Range;
use std::path::PathBuf;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

/// What went wrong while parsing; the document is still produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A construct was malformed and its marker was kept as literal text.
    Construct,
    /// A construct was still open when an outer frame or the end of input
    /// closed it.
    Unterminated,
    /// Parser state was found inconsistent and was reset.
    Invariant,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Construct => write!(f, "construct"),
            ErrorKind::Unterminated => write!(f, "unterminated"),
            ErrorKind::Invariant => write!(f, "invariant"),
        }
    }
}

/// Recoverable parse errors with source location information.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Range<usize>,
    pub file_id: usize,
    /// Document identifier the parser was given.
    pub document: String,
    /// 1-based line of `span.start`.
    pub line: usize,
    pub severity: Severity,
    /// Open frames at the time of the error, innermost last.
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn error(
        kind: ErrorKind,
        message: impl Into<String>,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            span,
            file_id,
            document: String::new(),
            line: 0,
            severity: Severity::Error,
            notes: Vec::new(),
        }
    }

    pub fn warning(
        kind: ErrorKind,
        message: impl Into<String>,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        ParseError {
            severity: Severity::Warning,
            ..ParseError::error(kind, message, span, file_id)
        }
    }

    pub fn in_document(mut self, document: impl Into<String>, line: usize) -> Self {
        self.document = document.into();
        self.line = line;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Byte offset the error was raised at.
    pub fn offset(&self) -> usize {
        self.span.start
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::new(self.severity)
            .with_message(&self.message)
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} (offset {}): {}",
            self.document, self.line, self.span.start, self.message
        )?;
        for note in &self.notes {
            write!(f, "\n    {}", note)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Errors that abort parsing of a document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{document}:{line}: cannot read code listing {}: {source}", .path.display())]
    Listing {
        document: String,
        line: usize,
        offset: usize,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn to_diagnostic(&self, file_id: usize) -> Diagnostic<usize> {
        match self {
            Error::Listing {
                offset, path, source, ..
            } => Diagnostic::error()
                .with_message(format!("cannot read code listing {}", path.display()))
                .with_labels(vec![
                    Label::primary(file_id, *offset..*offset + 5).with_message(source.to_string()),
                ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_and_stack() {
        let err = ParseError::warning(ErrorKind::Unterminated, "unterminated Italic", 6..6, 0)
            .in_document("intro", 1)
            .with_note("[    0] Paragraph(1 parts)");
        assert_eq!(
            err.to_string(),
            "intro:1 (offset 6): unterminated Italic\n    [    0] Paragraph(1 parts)"
        );
    }

    #[test]
    fn diagnostic_carries_severity() {
        let err = ParseError::error(ErrorKind::Construct, "incut without style", 0..3, 2);
        let diag = err.to_diagnostic();
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.labels[0].file_id, 2);
    }
}
