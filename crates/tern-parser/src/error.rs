//! Parse error types for the Tern parser.

use std::fmt;

use tern_common::diagnostic::Diagnostic;
use tern_common::error::LexError;
use tern_common::source::SourceMap;
use tern_common::span::Loc;

/// A syntax error with its location and an optional related location
/// (e.g. "function declared here" for a missing body).
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub loc: Loc,
    pub related: Option<(String, Loc)>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, loc: Loc) -> Self {
        Self {
            message: message.into(),
            loc,
            related: None,
        }
    }

    pub fn with_related(
        message: impl Into<String>,
        loc: Loc,
        related_message: impl Into<String>,
        related_loc: Loc,
    ) -> Self {
        Self {
            message: message.into(),
            loc,
            related: Some((related_message.into(), related_loc)),
        }
    }

    pub fn to_diagnostic(&self, files: &SourceMap) -> Diagnostic {
        Diagnostic::error(files.path(self.loc.file), self.loc.row, self.loc.column, &self.message)
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError::new(err.kind.to_string(), err.loc)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.loc.row, self.loc.column, self.message)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_common::span::{FileId, Span};

    fn loc(row: u32, column: u32) -> Loc {
        Loc::new(FileId(0), row, column, Span::new(0, 1))
    }

    #[test]
    fn parse_error_with_related() {
        let err = ParseError::with_related(
            "missing function body",
            loc(4, 1),
            "function declared here",
            loc(1, 1),
        );
        assert_eq!(err.to_string(), "4:1: missing function body");
        let (msg, at) = err.related.unwrap();
        assert_eq!(msg, "function declared here");
        assert_eq!(at.row, 1);
    }

    #[test]
    fn diagnostic_uses_file_path() {
        let mut files = SourceMap::new();
        let file = files.add("src/main.tn", "");
        let err = ParseError::new("invalid expression", Loc::new(file, 2, 9, Span::new(0, 0)));
        let diag = err.to_diagnostic(&files);
        assert_eq!(diag.to_string(), "src/main.tn:2:9: error: invalid expression");
    }
}
