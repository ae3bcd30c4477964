use std::fmt;

use tern_common::span::Loc;

use super::item::FnDecl;
use super::ty::TypeNode;
use super::Ident;

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: Loc,
}

impl Expr {
    pub fn new(kind: ExprKind, loc: Loc) -> Self {
        Self { kind, loc }
    }

    /// The identifier this expression consists of, if any.
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Lit(Literal),
    Ident(String),
    SelfValue,
    Nil,
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `(T)(expr)`
    Cast {
        ty: TypeNode,
        expr: Box<Expr>,
    },
    /// `xs...`, only meaningful as the last call argument.
    Spread(Box<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `base[...]`. The bracket contents are read both as index expressions
    /// and as a generic type-argument list; whichever reading failed is
    /// empty/`None`. The checker decides from what `base` names.
    Index {
        base: Box<Expr>,
        args: Vec<Expr>,
        generics: Option<Vec<TypeNode>>,
    },
    /// `base[start:end]`, either bound optional.
    Slicing {
        base: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
    },
    Selector {
        base: Box<Expr>,
        name: Ident,
    },
    /// `ns::name`, at least two segments.
    Path(Vec<Ident>),
    /// `cpp.name`
    Foreign(Ident),
    /// `T{...}`. Keyed entries (`name: v`, `k: v`) carry their key.
    Composite {
        ty: TypeNode,
        entries: Vec<Entry>,
    },
    /// `[a, b, c]`, typed from context.
    SliceLit(Vec<Expr>),
    /// `(a, b)`, at least two elements.
    Tuple(Vec<Expr>),
    /// Anonymous function.
    Func(Box<FnDecl>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Option<Expr>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub kind: LitKind,
    /// Source text of the literal, quotes included.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LitKind {
    Int(u128),
    Float(f64),
    Str(String),
    Rune(char),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    BitOr,
    BitXor,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        use BinOp::*;
        match self {
            Or => "||",
            And => "&&",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
            Add => "+",
            Sub => "-",
            BitOr => "|",
            BitXor => "^",
            Mul => "*",
            Div => "/",
            Rem => "%",
            Shl => "<<",
            Shr => ">>",
            BitAnd => "&",
        }
    }

    pub fn is_comparison(self) -> bool {
        use BinOp::*;
        matches!(self, Eq | Ne | Lt | Gt | Le | Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::Or | BinOp::And)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinOp::Shl | BinOp::Shr)
    }

    /// Operators defined only on integers.
    pub fn is_bitwise(self) -> bool {
        use BinOp::*;
        matches!(self, BitOr | BitXor | BitAnd | Shl | Shr | Rem)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    /// `^x`, bitwise complement.
    BitNot,
    Deref,
    /// `&x`
    AddrOf,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "^",
            UnaryOp::Deref => "*",
            UnaryOp::AddrOf => "&",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Lit(lit) => f.write_str(&lit.text),
            ExprKind::Ident(name) => f.write_str(name),
            ExprKind::SelfValue => f.write_str("self"),
            ExprKind::Nil => f.write_str("nil"),
            ExprKind::Binary { op, lhs, rhs } => {
                write_operand(f, lhs)?;
                write!(f, " {op} ")?;
                write_operand(f, rhs)
            }
            ExprKind::Unary { op, operand } => {
                f.write_str(op.as_str())?;
                write_operand(f, operand)
            }
            ExprKind::Cast { ty, expr } => write!(f, "({ty})({expr})"),
            ExprKind::Spread(inner) => write!(f, "{inner}..."),
            ExprKind::Call { callee, args } => {
                write!(f, "{callee}(")?;
                write_exprs(f, args)?;
                write!(f, ")")
            }
            ExprKind::Index { base, args, generics } => {
                write!(f, "{base}[")?;
                match generics {
                    Some(tys) if args.is_empty() => {
                        for (i, ty) in tys.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{ty}")?;
                        }
                    }
                    _ => write_exprs(f, args)?,
                }
                write!(f, "]")
            }
            ExprKind::Slicing { base, start, end } => {
                write!(f, "{base}[")?;
                if let Some(start) = start {
                    write!(f, "{start}")?;
                }
                write!(f, ":")?;
                if let Some(end) = end {
                    write!(f, "{end}")?;
                }
                write!(f, "]")
            }
            ExprKind::Selector { base, name } => write!(f, "{base}.{}", name.name),
            ExprKind::Path(segments) => {
                let names: Vec<&str> = segments.iter().map(|s| s.name.as_str()).collect();
                f.write_str(&names.join("::"))
            }
            ExprKind::Foreign(name) => write!(f, "cpp.{}", name.name),
            ExprKind::Composite { ty, entries } => {
                write!(f, "{ty}{{")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if let Some(key) = &entry.key {
                        write!(f, "{key}: ")?;
                    }
                    write!(f, "{}", entry.value)?;
                }
                write!(f, "}}")
            }
            ExprKind::SliceLit(elems) => {
                write!(f, "[")?;
                write_exprs(f, elems)?;
                write!(f, "]")
            }
            ExprKind::Tuple(elems) => {
                write!(f, "(")?;
                write_exprs(f, elems)?;
                write!(f, ")")
            }
            ExprKind::Func(_) => f.write_str("fn(..) {..}"),
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    if matches!(expr.kind, ExprKind::Binary { .. }) {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

fn write_exprs(f: &mut fmt::Formatter<'_>, exprs: &[Expr]) -> fmt::Result {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{expr}")?;
    }
    Ok(())
}
