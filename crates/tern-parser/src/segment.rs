//! Statement segmentation.
//!
//! Tern statements end at the end of a row unless a delimiter is still open,
//! or at an explicit `;`. The segmenter splits a flat token vector into
//! statement-sized slices using only token rows and delimiter depth:
//!
//! * a `;` at depth 0 terminates the statement and is consumed;
//! * a token on a later row than the previous token starts a new statement
//!   when depth is 0, unless the previous row ended in an operator or comma;
//! * depth never drops below 0, so a stray closer cannot swallow the rest
//!   of the input.

use tern_common::token::{Token, TokenKind};

/// Where the statement starting at some index ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    /// Exclusive end of the statement.
    pub end: usize,
    /// The statement was ended by a `;` at index `end`.
    pub terminated: bool,
}

impl Boundary {
    /// Index where the next statement starts.
    pub fn next_start(self) -> usize {
        if self.terminated {
            self.end + 1
        } else {
            self.end
        }
    }
}

/// Find the end of the statement beginning at `start`.
pub fn next_statement_end(tokens: &[Token], start: usize) -> Boundary {
    let mut depth = 0usize;
    for i in start..tokens.len() {
        let tok = &tokens[i];
        if i > start && depth == 0 && starts_new_row(&tokens[i - 1], tok) {
            return Boundary {
                end: i,
                terminated: false,
            };
        }
        match tok.kind {
            TokenKind::Semicolon if depth == 0 => {
                return Boundary {
                    end: i,
                    terminated: true,
                };
            }
            kind if kind.is_open_delim() => depth += 1,
            kind if kind.is_close_delim() => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Boundary {
        end: tokens.len(),
        terminated: false,
    }
}

fn starts_new_row(prev: &Token, tok: &Token) -> bool {
    let prev_last_row = prev.row + prev.text.matches('\n').count() as u32;
    if tok.row <= prev_last_row {
        return false;
    }
    // A row ending in a binary operator, assignment or comma continues.
    let continues = prev.kind.binary_precedence().is_some()
        || (prev.kind.is_assign_op() && !matches!(prev.kind, TokenKind::PlusPlus | TokenKind::MinusMinus))
        || prev.kind == TokenKind::Comma;
    !continues
}

/// Iterator over the non-empty statements of a token slice.
pub struct Segments<'t> {
    tokens: &'t [Token],
    pos: usize,
}

pub fn segments(tokens: &[Token]) -> Segments<'_> {
    Segments { tokens, pos: 0 }
}

impl<'t> Iterator for Segments<'t> {
    type Item = &'t [Token];

    fn next(&mut self) -> Option<&'t [Token]> {
        while self.pos < self.tokens.len() {
            let start = self.pos;
            let boundary = next_statement_end(self.tokens, start);
            self.pos = boundary.next_start();
            if boundary.end > start {
                tracing::trace!(start, end = boundary.end, "statement");
                return Some(&self.tokens[start..boundary.end]);
            }
        }
        None
    }
}
