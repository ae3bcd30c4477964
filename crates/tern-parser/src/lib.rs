//! Tern parser: statement segmentation and tree building.
//!
//! The parser works on the flat token vector produced by `tern-lexer`.
//! [`segment`] cuts it into statements using rows and delimiter depth,
//! [`range`] extracts delimited groups, and the builder turns each slice
//! into an owned syntax tree ([`ast`]). Syntax errors are accumulated; the
//! build only stops early on the structural failures documented on
//! [`Parse::halted`].

pub mod ast;
pub mod error;
mod parser;
pub mod range;
pub mod segment;

use tern_common::diagnostic::Diagnostic;
use tern_common::source::SourceMap;
use tern_common::span::FileId;
use tern_common::token::Token;
use tern_lexer::Lexer;

pub use ast::{debug_expr, SourceTree};
pub use error::ParseError;

use ast::{Expr, TypeNode};
use parser::Builder;

/// Result of building one source file.
#[derive(Debug)]
pub struct Parse {
    tree: SourceTree,
    errors: Vec<ParseError>,
    halted: bool,
}

impl Parse {
    pub fn tree(&self) -> &SourceTree {
        &self.tree
    }

    /// Lexical and syntax errors in source order.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether building stopped before the end of the file, because a
    /// top-level delimiter was never closed or the last function had no
    /// body.
    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn into_parts(self) -> (SourceTree, Vec<ParseError>) {
        (self.tree, self.errors)
    }

    pub fn diagnostics(&self, files: &SourceMap) -> Vec<Diagnostic> {
        self.errors.iter().map(|e| e.to_diagnostic(files)).collect()
    }
}

/// Build a tree from already-lexed tokens.
pub fn build(tokens: &[Token]) -> Parse {
    let file = tokens.first().map_or(FileId::default(), |t| t.file);
    let mut builder = Builder::new();
    let items = builder.build_source(tokens);
    let (errors, halted) = builder.finish();
    tracing::debug!(?file, items = items.len(), errors = errors.len(), "built source tree");
    Parse {
        tree: SourceTree { file, items },
        errors,
        halted,
    }
}

/// Lex and build one file. Lexical errors come first in the error list
/// when they share a position with a syntax error.
pub fn parse(source: &str, file: FileId) -> Parse {
    let (tokens, lex_errors) = Lexer::tokenize(source, file);
    let mut parse = build(&tokens);
    parse.tree.file = file;
    if !lex_errors.is_empty() {
        let mut errors: Vec<ParseError> = lex_errors.into_iter().map(ParseError::from).collect();
        errors.append(&mut parse.errors);
        errors.sort_by_key(|e| (e.loc.row, e.loc.column));
        parse.errors = errors;
    }
    parse
}

/// Build a single expression from source text.
pub fn parse_expr(source: &str) -> Result<Expr, Vec<ParseError>> {
    fragment(source, |builder, tokens| builder.build_expr(tokens))
}

/// Build a single type descriptor from source text.
pub fn parse_type(source: &str) -> Result<TypeNode, Vec<ParseError>> {
    fragment(source, |builder, tokens| builder.build_type(tokens))
}

fn fragment<T>(
    source: &str,
    build: impl FnOnce(&mut Builder, &[Token]) -> Option<T>,
) -> Result<T, Vec<ParseError>> {
    let (tokens, lex_errors) = Lexer::tokenize(source, FileId::default());
    if !lex_errors.is_empty() {
        return Err(lex_errors.into_iter().map(ParseError::from).collect());
    }
    let mut builder = Builder::new();
    let built = build(&mut builder, &tokens);
    let (errors, _) = builder.finish();
    match built {
        Some(value) if errors.is_empty() => Ok(value),
        _ => Err(errors),
    }
}
