//! Parameter lists: parsing, Go-style type grouping (`a, b: i32`), and the
//! concurrent validation pass that reports parameters left without a type.

use tern_common::diagnostic::DiagnosticSink;
use tern_common::span::Loc;
use tern_common::token::{Token, TokenKind};

use super::{loc_of, without_comments, Builder};
use crate::ast::{Ident, Param, Receiver};
use crate::error::ParseError;
use crate::range::split_commas;

/// Parameter lists handed to each validation worker.
const LISTS_PER_WORKER: usize = 32;

/// A parameter list queued for validation after the tree is built.
pub(crate) struct ParamList {
    function: String,
    /// (name, location, has a type)
    params: Vec<(String, Loc, bool)>,
}

impl ParamList {
    fn validate(&self, sink: &DiagnosticSink<ParseError>) {
        for (i, (name, loc, typed)) in self.params.iter().enumerate() {
            if !typed {
                sink.push(ParseError::new(
                    format!("missing type for parameter `{name}` of `{}`", self.function),
                    *loc,
                ));
            }
            if name != "_" && self.params[..i].iter().any(|(other, _, _)| other == name) {
                sink.push(ParseError::new(format!("duplicate parameter `{name}`"), *loc));
            }
        }
    }
}

/// Validate every queued list, spreading the lists over scoped worker
/// threads. All workers are joined before this returns.
pub(crate) fn validate_all(lists: Vec<ParamList>) -> Vec<ParseError> {
    if lists.is_empty() {
        return Vec::new();
    }
    let sink = DiagnosticSink::new();
    let joined = crossbeam_utils::thread::scope(|scope| {
        for batch in lists.chunks(LISTS_PER_WORKER) {
            let sink = &sink;
            scope.spawn(move |_| batch.iter().for_each(|list| list.validate(sink)));
        }
    });
    if joined.is_err() {
        tracing::warn!("parameter validation worker panicked; validating sequentially");
        let sink = DiagnosticSink::new();
        lists.iter().for_each(|list| list.validate(&sink));
        return sink.into_inner();
    }
    tracing::debug!(lists = lists.len(), errors = sink.len(), "parameter lists validated");
    sink.into_inner()
}

impl Builder {
    /// Build the contents of a declaration's `( ... )`.
    ///
    /// When `methods` is set, a leading `self`/`&self` becomes the receiver.
    /// Untyped names take the type of the next typed parameter to their
    /// right; names with nothing to their right stay untyped and are
    /// reported by the validation pass.
    pub(crate) fn build_params(
        &mut self,
        function: &str,
        inner: &[Token],
        methods: bool,
    ) -> (Option<Receiver>, Vec<Param>) {
        let inner = without_comments(inner);
        let mut receiver = None;
        let mut params: Vec<Param> = Vec::new();

        for (i, part) in split_commas(&inner).into_iter().enumerate() {
            let Some(first) = part.first() else {
                self.error("expected parameter", self.here);
                continue;
            };
            if let Some(recv) = receiver_of(part) {
                if i == 0 && methods {
                    receiver = Some(recv);
                } else {
                    self.error("`self` is only allowed as the first parameter of a method", first.loc());
                }
                continue;
            }
            if first.kind != TokenKind::Ident {
                self.error(format!("expected parameter name, found `{}`", first.text), first.loc());
                continue;
            }
            let name = Ident::new(&first.text, first.loc());
            let loc = loc_of(part);
            if part.len() == 1 {
                params.push(Param {
                    name,
                    ty: None,
                    variadic: false,
                    loc,
                });
                continue;
            }
            if part[1].kind != TokenKind::Colon {
                self.error(
                    format!("expected `:` after parameter `{}`", first.text),
                    part[1].loc(),
                );
                continue;
            }
            let mut rest = &part[2..];
            let variadic = rest.first().is_some_and(|t| t.kind == TokenKind::Ellipsis);
            if variadic {
                rest = &rest[1..];
            }
            let ty = self.build_type(rest);
            params.push(Param {
                name,
                ty,
                variadic,
                loc,
            });
        }

        group_types(&mut params);

        if let Some(pos) = params.iter().position(|p| p.variadic) {
            if pos + 1 != params.len() {
                self.error("variadic parameter must be the last parameter", params[pos].loc);
            }
        }

        self.param_lists.push(ParamList {
            function: function.to_string(),
            params: params
                .iter()
                .map(|p| (p.name.name.clone(), p.name.loc, p.ty.is_some()))
                .collect(),
        });
        (receiver, params)
    }
}

fn receiver_of(part: &[Token]) -> Option<Receiver> {
    match part {
        [tok] if tok.kind == TokenKind::SelfKw => Some(Receiver {
            by_ref: false,
            loc: tok.loc(),
        }),
        [amp, tok] if amp.kind == TokenKind::Amp && tok.kind == TokenKind::SelfKw => Some(Receiver {
            by_ref: true,
            loc: amp.loc().to(tok.loc()),
        }),
        _ => None,
    }
}

/// `a, b: i32` -> both `i32`. A variadic type is never shared leftwards.
fn group_types(params: &mut [Param]) {
    let mut carried = None;
    for param in params.iter_mut().rev() {
        match &param.ty {
            Some(ty) if !param.variadic => carried = Some(ty.clone()),
            Some(_) => carried = None,
            None => param.ty = carried.clone(),
        }
    }
}
