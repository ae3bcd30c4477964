//! Syntactic type descriptors.
//!
//! A [`TypeNode`] renders to a canonical string (its `Display`) that parses
//! back to an equivalent node. Generic instances and memoization keys are
//! built from these strings, so two nodes render equal exactly when they
//! describe the same type.

use std::fmt;

use tern_common::span::Loc;

use super::expr::Expr;
use super::Ident;

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Int,
    Uint,
    Uintptr,
    F32,
    F64,
    Bool,
    Str,
    Any,
}

impl PrimType {
    pub fn from_name(name: &str) -> Option<PrimType> {
        use PrimType::*;
        let prim = match name {
            "i8" => I8,
            "i16" => I16,
            "i32" => I32,
            "i64" => I64,
            "u8" => U8,
            "u16" => U16,
            "u32" => U32,
            "u64" => U64,
            "int" => Int,
            "uint" => Uint,
            "uintptr" => Uintptr,
            "f32" => F32,
            "f64" => F64,
            "bool" => Bool,
            "str" => Str,
            "any" => Any,
            _ => return None,
        };
        Some(prim)
    }

    pub fn name(self) -> &'static str {
        use PrimType::*;
        match self {
            I8 => "i8",
            I16 => "i16",
            I32 => "i32",
            I64 => "i64",
            U8 => "u8",
            U16 => "u16",
            U32 => "u32",
            U64 => "u64",
            Int => "int",
            Uint => "uint",
            Uintptr => "uintptr",
            F32 => "f32",
            F64 => "f64",
            Bool => "bool",
            Str => "str",
            Any => "any",
        }
    }

    /// `(signed, bits)` for integer types. The platform-sized integers are 64-bit.
    pub fn int_info(self) -> Option<(bool, u32)> {
        use PrimType::*;
        match self {
            I8 => Some((true, 8)),
            I16 => Some((true, 16)),
            I32 => Some((true, 32)),
            I64 | Int => Some((true, 64)),
            U8 => Some((false, 8)),
            U16 => Some((false, 16)),
            U32 => Some((false, 32)),
            U64 | Uint | Uintptr => Some((false, 64)),
            _ => None,
        }
    }

    pub fn is_integer(self) -> bool {
        self.int_info().is_some()
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(self.int_info(), Some((true, _)))
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimType::F32 | PrimType::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }
}

impl fmt::Display for PrimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeNode {
    pub kind: TypeKind,
    pub loc: Loc,
}

impl TypeNode {
    pub fn new(kind: TypeKind, loc: Loc) -> Self {
        Self { kind, loc }
    }

    /// The canonical rendering; identical to `to_string()`.
    pub fn repr(&self) -> String {
        self.to_string()
    }

    /// Whether this node names a single identifier with no namespace or generics.
    pub fn as_plain_name(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::Named(named)
                if named.namespace.is_empty() && named.generics.is_empty() && !named.foreign =>
            {
                Some(&named.name.name)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Prim(PrimType),
    /// `*T`
    Ptr(Box<TypeNode>),
    /// `*unsafe`, the untyped raw pointer.
    UnsafePtr,
    /// `&T`
    Ref(Box<TypeNode>),
    /// `[]T`
    Slice(Box<TypeNode>),
    /// `[N]T` or `[...]T`
    Array { size: ArraySize, elem: Box<TypeNode> },
    /// `[K:V]`
    Map { key: Box<TypeNode>, value: Box<TypeNode> },
    /// `(A, B)`, at least two elements.
    Tuple(Vec<TypeNode>),
    Func(FnType),
    Named(NamedType),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArraySize {
    /// `[...]T`: length taken from the initializer.
    Auto,
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnType {
    pub params: Vec<TypeNode>,
    /// The last parameter is variadic.
    pub variadic: bool,
    pub result: Option<Box<TypeNode>>,
}

/// A user-defined or generic-parameter name: `Name`, `ns::Name`,
/// `Name[A, B]` or `cpp.Name`.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedType {
    pub namespace: Vec<Ident>,
    pub name: Ident,
    pub generics: Vec<TypeNode>,
    pub foreign: bool,
}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Prim(p) => write!(f, "{p}"),
            TypeKind::Ptr(inner) => write!(f, "*{inner}"),
            TypeKind::UnsafePtr => write!(f, "*unsafe"),
            TypeKind::Ref(inner) => write!(f, "&{inner}"),
            TypeKind::Slice(elem) => write!(f, "[]{elem}"),
            TypeKind::Array { size, elem } => match size {
                ArraySize::Auto => write!(f, "[...]{elem}"),
                ArraySize::Expr(n) => write!(f, "[{n}]{elem}"),
            },
            TypeKind::Map { key, value } => write!(f, "[{key}:{value}]"),
            TypeKind::Tuple(elems) => {
                write!(f, "(")?;
                write_list(f, elems)?;
                write!(f, ")")
            }
            TypeKind::Func(func) => {
                write!(f, "fn(")?;
                for (i, param) in func.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if func.variadic && i + 1 == func.params.len() {
                        write!(f, "...")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ")")?;
                if let Some(result) = &func.result {
                    write!(f, " {result}")?;
                }
                Ok(())
            }
            TypeKind::Named(named) => {
                if named.foreign {
                    write!(f, "cpp.")?;
                }
                for ns in &named.namespace {
                    write!(f, "{}::", ns.name)?;
                }
                write!(f, "{}", named.name.name)?;
                if !named.generics.is_empty() {
                    write!(f, "[")?;
                    write_list(f, &named.generics)?;
                    write!(f, "]")?;
                }
                Ok(())
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeNode]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prim_names_round_trip() {
        for name in ["i8", "u64", "uintptr", "f32", "str", "any"] {
            assert_eq!(PrimType::from_name(name).unwrap().name(), name);
        }
        assert_eq!(PrimType::from_name("i128"), None);
    }

    #[test]
    fn int_info_widths() {
        assert_eq!(PrimType::I8.int_info(), Some((true, 8)));
        assert_eq!(PrimType::Uint.int_info(), Some((false, 64)));
        assert_eq!(PrimType::F64.int_info(), None);
        assert!(PrimType::Int.is_signed_integer());
        assert!(!PrimType::U16.is_signed_integer());
        assert!(PrimType::F32.is_numeric());
        assert!(!PrimType::Bool.is_numeric());
    }
}
