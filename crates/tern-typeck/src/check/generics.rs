//! Generic instantiation.
//!
//! A function body is checked once per distinct generic argument list.
//! The list's canonical encoding is recorded in the function's combines
//! table before the body is checked, so a recursive instantiation with the
//! same arguments is a memo hit rather than a loop. Inference binds the
//! callee's own parameters from argument types; the owner struct's
//! parameters always come from the receiver.

use rustc_hash::FxHashSet;
use tern_common::span::Loc;
use tern_parser::ast::{Block, Expr, ExprKind, FnDecl, LoopKind, Stmt, StmtKind};

use super::{placeholders, Checker, Ctx, Value};
use crate::error::TypeError;
use crate::scope::Local;
use crate::ty::{generics_key, FnId, FnSig, Ty};
use crate::unify::Inference;
use crate::GenericInstance;

impl<'a> Checker<'a> {
    /// Check `id`'s body with its generic parameters bound to `args`.
    /// Returns `false` when this argument list was already instantiated.
    pub(crate) fn instantiate(&mut self, id: FnId, args: &[Ty]) -> bool {
        let key = generics_key(args);
        let name = self.describe_fn(id);
        if self.defs.func(id).combines.contains_key(&key) {
            tracing::trace!(function = %name, generics = %key, "instantiation memo hit");
            return false;
        }
        self.defs.func_mut(id).combines.insert(key.clone(), args.to_vec());
        if !args.is_empty() {
            tracing::debug!(function = %name, generics = %key, "new instantiation");
            if !args.iter().any(Ty::has_generics) {
                self.instances.push(GenericInstance {
                    function: name.clone(),
                    generics: args.to_vec(),
                });
            }
        }

        let sig = self.fn_sig(id, args);
        let def = self.defs.func(id);
        let (decl, origin, owner) = (def.decl, def.origin, def.owner);
        let Some(body) = decl.body.as_ref().filter(|_| !def.linked) else {
            return true;
        };
        let names = def.generic_names(owner.map(|o| self.defs.strukt(o)));
        let mut ctx = Ctx::at(origin).with_bindings(names, args);
        ctx.unsafe_fn = decl.unsafe_;
        if let Some(owner) = owner {
            let count = self.defs.strukt(owner).decl.generics.len();
            let owner_ty = self.struct_type(owner, args.iter().take(count).cloned().collect());
            ctx.self_ty = decl.receiver.as_ref().map(|r| {
                if r.by_ref {
                    Ty::Ref(Box::new(owner_ty.clone()))
                } else {
                    owner_ty.clone()
                }
            });
        }
        self.in_context(ctx, |c| c.check_function_body(&name, decl, &sig, body));
        true
    }

    /// Check a body in the current context. Enclosing locals stay visible,
    /// which is how anonymous functions capture.
    pub(crate) fn check_function_body(&mut self, name: &str, decl: &FnDecl, sig: &FnSig, body: &Block) {
        self.body.ret = Some(sig.ret.clone());
        self.body.labels = FxHashSet::default();
        self.collect_labels(&body.stmts);
        self.scoped(|c| {
            for (i, param) in decl.params.iter().enumerate() {
                let ty = sig.param_binding(i);
                c.record(param.name.loc, &ty);
                c.declare_local(&param.name, Local::param(ty, param.name.loc));
            }
            c.check_stmts(&body.stmts);
        });
        if !matches!(sig.ret, Ty::Void | Ty::Error) && !block_terminates(body) {
            self.error(TypeError::MissingReturn {
                name: name.to_string(),
                loc: decl.name.loc,
            });
        }
    }

    fn collect_labels(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Label(label) => {
                    if !self.body.labels.insert(label.name.clone()) {
                        self.error(TypeError::DuplicateIdent {
                            name: label.name.clone(),
                            loc: label.loc,
                            previous: label.loc,
                        });
                    }
                }
                StmtKind::If(s) => {
                    for (_, block) in &s.branches {
                        self.collect_labels(&block.stmts);
                    }
                    if let Some(block) = &s.else_block {
                        self.collect_labels(&block.stmts);
                    }
                }
                StmtKind::Match(m) => {
                    for case in m.cases.iter().chain(&m.default) {
                        self.collect_labels(&case.body.stmts);
                    }
                }
                StmtKind::Loop(l) => self.collect_labels(&l.body.stmts),
                StmtKind::Block { block, .. } => self.collect_labels(&block.stmts),
                _ => {}
            }
        }
    }

    /// Bind `names` from the argument types of a call against `template`,
    /// a signature holding the names as placeholders. Arguments are
    /// checked here; their values come back in argument order.
    pub(crate) fn infer_from_params(
        &mut self,
        names: &[String],
        template: &FnSig,
        args: &[Expr],
        callee: &str,
        loc: Loc,
    ) -> Option<(Vec<Ty>, Vec<Value>)> {
        for name in names {
            if !template.params.iter().any(|p| p.mentions(name)) {
                self.error(TypeError::CannotInfer {
                    param: name.clone(),
                    callee: callee.to_string(),
                    loc,
                });
                self.check_unchecked_args(args);
                return None;
            }
        }
        let values: Vec<Value> = args.iter().map(|a| self.check_expr(spread_inner(a), None)).collect();
        let mut inference = Inference::new(names);
        for (i, (arg, value)) in args.iter().zip(&values).enumerate() {
            if value.untyped {
                continue;
            }
            let Some(param) = param_at(template, i, is_spread(arg)) else {
                continue;
            };
            if let Err(conflict) = inference.unify(&param, &value.ty) {
                self.error(TypeError::ConflictingGeneric {
                    param: conflict.param,
                    first: conflict.first,
                    second: conflict.second,
                    loc: arg.loc,
                });
                return None;
            }
        }
        // Untyped constants only decide parameters nothing else bound.
        for (i, (arg, value)) in args.iter().zip(&values).enumerate() {
            if let (true, Some(param)) = (value.untyped, param_at(template, i, is_spread(arg))) {
                inference.default_to(&param, &value.ty);
            }
        }
        match inference.finish() {
            Ok(bound) => Some((bound, values)),
            Err(param) => {
                self.error(TypeError::CannotInfer {
                    param,
                    callee: callee.to_string(),
                    loc,
                });
                None
            }
        }
    }

    /// The generic names of `id` as placeholders, with the owner's already
    /// bound to `owner_args`.
    pub(crate) fn template_args(&self, id: FnId, owner_args: &[Ty]) -> (Vec<String>, Vec<Ty>) {
        let own: Vec<String> = self.defs.func(id).decl.generics.iter().map(|g| g.name.clone()).collect();
        let mut args = owner_args.to_vec();
        args.extend(placeholders(&own));
        (own, args)
    }

    /// Arguments of a call that failed before its signature was known.
    pub(crate) fn check_unchecked_args(&mut self, args: &[Expr]) {
        for arg in args {
            self.check_expr(spread_inner(arg), None);
        }
    }
}

/// The parameter type argument `i` is checked against. A spread argument
/// passes the whole variadic slice.
pub(crate) fn param_at(sig: &FnSig, i: usize, spread: bool) -> Option<Ty> {
    let n = sig.params.len();
    if sig.variadic && n > 0 && i + 1 >= n {
        let elem = sig.params[n - 1].clone();
        Some(if spread { Ty::Slice(Box::new(elem)) } else { elem })
    } else {
        sig.params.get(i).cloned()
    }
}

pub(crate) fn is_spread(arg: &Expr) -> bool {
    matches!(arg.kind, ExprKind::Spread(_))
}

pub(crate) fn spread_inner(arg: &Expr) -> &Expr {
    match &arg.kind {
        ExprKind::Spread(inner) => inner,
        _ => arg,
    }
}

/// Whether control cannot fall off the end of `block`.
pub(crate) fn block_terminates(block: &Block) -> bool {
    block
        .stmts
        .iter()
        .rev()
        .find(|s| !matches!(s.kind, StmtKind::Comment(_)))
        .is_some_and(stmt_terminates)
}

fn stmt_terminates(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Ret(_) | StmtKind::Goto(_) => true,
        StmtKind::Expr(expr) => is_panic(expr),
        StmtKind::Loop(l) => matches!(l.kind, LoopKind::Infinite) && !breaks_out(&l.body.stmts, true),
        StmtKind::If(s) => {
            s.else_block.as_ref().is_some_and(block_terminates)
                && s.branches.iter().all(|(_, block)| block_terminates(block))
        }
        StmtKind::Match(m) => {
            m.default.as_ref().is_some_and(|d| block_terminates(&d.body))
                && m.cases
                    .iter()
                    .all(|c| block_terminates(&c.body) || ends_with_fall(&c.body))
        }
        StmtKind::Block { block, .. } => block_terminates(block),
        _ => false,
    }
}

fn is_panic(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { callee, .. } => callee.as_ident() == Some("panic"),
        _ => false,
    }
}

fn ends_with_fall(block: &Block) -> bool {
    block
        .stmts
        .iter()
        .rev()
        .find(|s| !matches!(s.kind, StmtKind::Comment(_)))
        .is_some_and(|s| matches!(s.kind, StmtKind::Fall))
}

/// Whether a `break` in `stmts` leaves the loop they belong to. `direct`
/// is false inside nested loops, where only labelled breaks escape.
fn breaks_out(stmts: &[Stmt], direct: bool) -> bool {
    stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::Break(label) => direct || label.is_some(),
        StmtKind::If(s) => {
            s.branches.iter().any(|(_, b)| breaks_out(&b.stmts, direct))
                || s.else_block.as_ref().is_some_and(|b| breaks_out(&b.stmts, direct))
        }
        StmtKind::Match(m) => m.cases.iter().chain(&m.default).any(|c| breaks_out(&c.body.stmts, direct)),
        StmtKind::Loop(l) => breaks_out(&l.body.stmts, false),
        StmtKind::Block { block, .. } => breaks_out(&block.stmts, direct),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_common::span::FileId;

    fn body(source: &str) -> Block {
        let parse = tern_parser::parse(source, FileId(0));
        assert!(parse.ok(), "{:?}", parse.errors());
        let (tree, _) = parse.into_parts();
        match tree.items.into_iter().next().map(|i| i.kind) {
            Some(tern_parser::ast::ItemKind::Fn(decl)) => decl.body.expect("body"),
            other => panic!("expected a function, found {other:?}"),
        }
    }

    #[test]
    fn return_and_panic_terminate() {
        assert!(block_terminates(&body("fn f() int {\n    ret 1\n}\n")));
        assert!(block_terminates(&body("fn f() int {\n    panic(\"no\")\n}\n")));
        assert!(!block_terminates(&body("fn f() int {\n    x := 1\n}\n")));
    }

    #[test]
    fn if_terminates_only_with_else() {
        let with_else = "fn f(c: bool) int {\n    if c {\n        ret 1\n    } else {\n        ret 2\n    }\n}\n";
        let without = "fn f(c: bool) int {\n    if c {\n        ret 1\n    }\n}\n";
        assert!(block_terminates(&body(with_else)));
        assert!(!block_terminates(&body(without)));
    }

    #[test]
    fn infinite_loop_terminates_unless_it_breaks() {
        let forever = "fn f() int {\n    for {\n    }\n}\n";
        let breaks = "fn f() int {\n    for {\n        break\n    }\n}\n";
        let inner = "fn f() int {\n    for {\n        for {\n            break\n        }\n    }\n}\n";
        assert!(block_terminates(&body(forever)));
        assert!(!block_terminates(&body(breaks)));
        assert!(block_terminates(&body(inner)));
    }
}
