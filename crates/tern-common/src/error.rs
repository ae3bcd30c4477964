use std::fmt;

use serde::Serialize;

use crate::span::Loc;

/// A lexer error with location information.
///
/// The lexer collects these and keeps going, so one pass reports every
/// malformed literal in a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub loc: Loc,
}

impl LexError {
    pub fn new(kind: LexErrorKind, loc: Loc) -> Self {
        Self { kind, loc }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LexErrorKind {
    UnexpectedCharacter(char),
    UnterminatedString,
    UnterminatedRune,
    UnterminatedBlockComment,
    InvalidEscapeSequence(char),
    InvalidNumberLiteral(String),
    /// A rune literal holding zero or several characters.
    InvalidRune(String),
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedCharacter(c) => write!(f, "unexpected character: {c:?}"),
            Self::UnterminatedString => write!(f, "unterminated string literal"),
            Self::UnterminatedRune => write!(f, "unterminated rune literal"),
            Self::UnterminatedBlockComment => write!(f, "unterminated block comment"),
            Self::InvalidEscapeSequence(c) => write!(f, "invalid escape sequence: \\{c}"),
            Self::InvalidNumberLiteral(s) => write!(f, "invalid number literal: {s}"),
            Self::InvalidRune(s) => write!(f, "rune literal must hold exactly one character: {s}"),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for LexError {}
