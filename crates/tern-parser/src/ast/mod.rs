//! The owned syntax tree the builder produces.
//!
//! Every node keeps the [`Loc`] of the tokens it was built from: the file,
//! the row/column of its first token, and a span reaching its last token.

pub mod expr;
pub mod item;
pub mod stmt;
pub mod ty;

use tern_common::span::{FileId, Loc};

pub use expr::{BinOp, Entry, Expr, ExprKind, LitKind, Literal, UnaryOp};
pub use item::{
    Attr, EnumDecl, EnumItem, Field, FnDecl, ImplDecl, Item, ItemKind, LinkDecl, Param, Receiver,
    StructDecl, TraitDecl, TypeAliasDecl, UseDecl, UseSelection, VarDecl,
};
pub use stmt::{Assign, AssignOp, Block, Case, IfStmt, LoopKind, LoopStmt, MatchStmt, Stmt, StmtKind};
pub use ty::{ArraySize, FnType, NamedType, PrimType, TypeKind, TypeNode};

/// All declarations of one source file, in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceTree {
    pub file: FileId,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub name: String,
    pub loc: Loc,
}

impl Ident {
    pub fn new(name: impl Into<String>, loc: Loc) -> Self {
        Self {
            name: name.into(),
            loc,
        }
    }

    /// `_`, the discard name.
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

/// Render an expression as a parenthesized prefix form, making grouping
/// explicit: `a - b - c` renders as `(- (- a b) c)`.
pub fn debug_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_sexpr(&mut out, expr);
    out
}

fn write_sexpr(out: &mut String, expr: &Expr) {
    let list = |out: &mut String, head: &str, items: &[&Expr]| {
        out.push('(');
        out.push_str(head);
        for item in items {
            out.push(' ');
            write_sexpr(out, item);
        }
        out.push(')');
    };
    match &expr.kind {
        ExprKind::Binary { op, lhs, rhs } => list(out, op.as_str(), &[lhs.as_ref(), rhs.as_ref()]),
        ExprKind::Unary { op, operand } => list(out, op.as_str(), &[operand.as_ref()]),
        ExprKind::Cast { ty, expr } => list(out, &format!("cast {ty}"), &[expr.as_ref()]),
        ExprKind::Spread(inner) => list(out, "...", &[inner.as_ref()]),
        ExprKind::Call { callee, args } => {
            let mut items: Vec<&Expr> = vec![callee.as_ref()];
            items.extend(args.iter());
            list(out, "call", &items);
        }
        ExprKind::Index { base, args, generics } => {
            let head = match generics {
                Some(tys) => {
                    let tys: Vec<String> = tys.iter().map(|t| t.to_string()).collect();
                    format!("index [{}]", tys.join(", "))
                }
                None => "index".to_string(),
            };
            let mut items: Vec<&Expr> = vec![base.as_ref()];
            items.extend(args.iter());
            list(out, &head, &items);
        }
        ExprKind::Slicing { base, start, end } => {
            out.push_str("(slice ");
            write_sexpr(out, base);
            for bound in [start, end] {
                out.push(' ');
                match bound {
                    Some(b) => write_sexpr(out, b),
                    None => out.push('_'),
                }
            }
            out.push(')');
        }
        ExprKind::Selector { base, name } => list(out, &format!(". {}", name.name), &[base.as_ref()]),
        ExprKind::Composite { ty, entries } => {
            out.push_str(&format!("(composite {ty}"));
            for entry in entries {
                out.push(' ');
                match &entry.key {
                    Some(key) => {
                        out.push('(');
                        write_sexpr(out, key);
                        out.push(' ');
                        write_sexpr(out, &entry.value);
                        out.push(')');
                    }
                    None => write_sexpr(out, &entry.value),
                }
            }
            out.push(')');
        }
        ExprKind::SliceLit(elems) => list(out, "slice-lit", &elems.iter().collect::<Vec<_>>()),
        ExprKind::Tuple(elems) => list(out, "tuple", &elems.iter().collect::<Vec<_>>()),
        ExprKind::Func(decl) => out.push_str(&format!("(fn/{})", decl.params.len())),
        _ => out.push_str(&expr.to_string()),
    }
}
