//! Tree builder: turns statement-sized token slices into syntax tree nodes.
//!
//! The builder never backtracks over the token vector. Each construct is
//! recognized from the slice the segmenter (or a range extraction) hands
//! it, and every sub-construct is built from a sub-slice. Errors are
//! collected and building continues with the next statement; only an
//! unclosed top-level delimiter or a function body missing at the end of
//! the input halts the pass.

mod expressions;
mod items;
mod params;
mod statements;
mod types;

use tern_common::span::Loc;
use tern_common::token::{Token, TokenKind};

use crate::ast::{Attr, Item};
use crate::error::ParseError;
use crate::range::{self, Imbalance};
use crate::segment::segments;

use params::ParamList;

pub(crate) struct Builder {
    errors: Vec<ParseError>,
    halted: bool,
    /// Doc comment rows waiting for the next attachable declaration.
    docs: Vec<String>,
    /// Where the pending doc comment begins.
    doc_start: Option<Loc>,
    /// Attributes waiting for the next attachable declaration.
    attrs: Vec<Attr>,
    /// Parameter lists queued for concurrent validation.
    param_lists: Vec<ParamList>,
    /// Location of the statement being built; used for errors about
    /// missing (empty) constructs, which have no tokens of their own.
    here: Loc,
}

impl Builder {
    pub(crate) fn new() -> Self {
        Self {
            errors: Vec::new(),
            halted: false,
            docs: Vec::new(),
            doc_start: None,
            attrs: Vec::new(),
            param_lists: Vec::new(),
            here: Loc::default(),
        }
    }

    pub(crate) fn error(&mut self, message: impl Into<String>, loc: Loc) {
        self.errors.push(ParseError::new(message, loc));
    }

    pub(crate) fn error_related(
        &mut self,
        message: impl Into<String>,
        loc: Loc,
        related_message: impl Into<String>,
        related_loc: Loc,
    ) {
        self.errors
            .push(ParseError::with_related(message, loc, related_message, related_loc));
    }

    fn halt(&mut self) {
        tracing::debug!(errors = self.errors.len(), "parse halted");
        self.halted = true;
    }

    /// Run `f` as a trial parse. If it fails or reports anything, its errors
    /// and queued work are discarded and `None` is returned.
    pub(crate) fn speculate<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let errors = self.errors.len();
        let lists = self.param_lists.len();
        let here = self.here;
        let result = f(self);
        self.here = here;
        if result.is_some() && self.errors.len() == errors {
            return result;
        }
        self.errors.truncate(errors);
        self.param_lists.truncate(lists);
        None
    }

    /// Expect `kind` at `tokens[*pos]`, advancing past it.
    pub(crate) fn expect<'t>(
        &mut self,
        tokens: &'t [Token],
        pos: &mut usize,
        kind: TokenKind,
        what: &str,
    ) -> Option<&'t Token> {
        match tokens.get(*pos) {
            Some(tok) if tok.kind == kind => {
                *pos += 1;
                Some(tok)
            }
            Some(tok) => {
                self.error(format!("expected {what}, found `{}`", tok.text), tok.loc());
                None
            }
            None => {
                let at = tokens.last().map_or(self.here, |t| t.loc());
                self.error(format!("expected {what}"), at);
                None
            }
        }
    }

    /// Report a delimiter problem in a top-level statement. Returns `false`
    /// when the statement must be skipped.
    fn check_delimiters(&mut self, tokens: &[Token]) -> bool {
        match range::check_balanced(tokens) {
            Ok(()) => true,
            Err(Imbalance::Unclosed(open)) => {
                let tok = &tokens[open];
                self.error(format!("unclosed `{}`", tok.text), tok.loc());
                self.halt();
                false
            }
            Err(Imbalance::Unexpected(close)) => {
                let tok = &tokens[close];
                self.error(format!("unexpected `{}`", tok.text), tok.loc());
                false
            }
        }
    }

    /// Build every top-level declaration of a file.
    pub(crate) fn build_source(&mut self, tokens: &[Token]) -> Vec<Item> {
        let mut items = Vec::new();
        let mut statements = segments(tokens).peekable();
        while let Some(stmt) = statements.next() {
            if self.halted {
                break;
            }
            self.here = loc_of(stmt);
            if !self.check_delimiters(stmt) {
                continue;
            }
            let at_end = statements.peek().is_none();
            if let Some(item) = self.build_item(stmt, at_end) {
                items.push(item);
            }
        }
        if let Some(attr) = self.attrs.first() {
            let loc = attr.name.loc;
            self.error("attribute is not followed by a declaration", loc);
            self.attrs.clear();
        }
        if let Some(loc) = self.doc_start.take() {
            self.error("doc comment is not followed by a declaration", loc);
            self.docs.clear();
        }
        items
    }

    /// Finish building: run the queued parameter-list validations and
    /// return all errors in source order.
    pub(crate) fn finish(mut self) -> (Vec<ParseError>, bool) {
        let lists = std::mem::take(&mut self.param_lists);
        self.errors.extend(params::validate_all(lists));
        self.errors
            .sort_by_key(|e| (e.loc.file, e.loc.row, e.loc.column));
        (self.errors, self.halted)
    }
}

/// Location covering a whole token slice. Empty slices have no location.
pub(crate) fn loc_of(tokens: &[Token]) -> Loc {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => first.loc().to(last.loc()),
        _ => Loc::default(),
    }
}

/// The token slice with comment tokens removed, borrowing when there are none.
pub(crate) fn without_comments(tokens: &[Token]) -> std::borrow::Cow<'_, [Token]> {
    if tokens.iter().any(|t| t.kind == TokenKind::Comment) {
        std::borrow::Cow::Owned(
            tokens
                .iter()
                .filter(|t| t.kind != TokenKind::Comment)
                .cloned()
                .collect(),
        )
    } else {
        std::borrow::Cow::Borrowed(tokens)
    }
}

/// Text of a comment token without its `//` or `/* */` markers.
pub(crate) fn comment_text(tok: &Token) -> String {
    let text = tok.text.as_str();
    let inner = if let Some(rest) = text.strip_prefix("//") {
        rest
    } else {
        text.strip_prefix("/*")
            .and_then(|t| t.strip_suffix("*/"))
            .unwrap_or(text)
    };
    inner.trim().to_string()
}
