use tern_common::span::Loc;

use super::expr::{BinOp, Expr};
use super::item::VarDecl;
use super::Ident;

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Var(VarDecl),
    Assign(Assign),
    /// A call evaluated for its effect.
    Expr(Expr),
    Ret(Option<Expr>),
    Break(Option<Ident>),
    Continue(Option<Ident>),
    If(IfStmt),
    Match(MatchStmt),
    Loop(LoopStmt),
    /// `name:` on its own row.
    Label(Ident),
    Goto(Ident),
    Fall,
    Defer(Box<Stmt>),
    /// `co call()`, a concurrent call.
    Co(Expr),
    Block { block: Block, unsafe_: bool },
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub targets: Vec<Expr>,
    pub op: AssignOp,
    /// Empty for `++`/`--`.
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    /// `op=`
    Compound(BinOp),
    Inc,
    Dec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    /// `if` followed by every `else if`, in order.
    pub branches: Vec<(Expr, Block)>,
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchStmt {
    /// `None` for a condition match (`match { case x > 0: ... }`).
    pub subject: Option<Expr>,
    pub cases: Vec<Case>,
    pub default: Option<Case>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    /// Empty for `default`.
    pub values: Vec<Expr>,
    pub body: Block,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopStmt {
    pub kind: LoopKind,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopKind {
    /// `for { }`
    Infinite,
    /// `for cond { }`
    While(Expr),
    /// `for k in e { }` / `for k, v in e { }`. A single name binds the
    /// index (or map key); `_` names are `None`.
    Iter {
        key: Option<Ident>,
        value: Option<Ident>,
        expr: Expr,
    },
}
