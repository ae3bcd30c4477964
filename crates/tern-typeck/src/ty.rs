//! Resolved types.
//!
//! A [`Ty`] is what a syntactic type descriptor becomes after lookup:
//! aliases are expanded, array sizes are folded to constants, and named
//! definitions are replaced by their arena ids. Equality is structural.
//! The `Display` rendering is what diagnostics show. Memoization keys use
//! [`generics_key`], which also carries the arena id of every named
//! definition: two packages whose last path segment agree render their
//! types alike, but never key alike.

use std::fmt::{self, Write};

use ena::unify::{EqUnifyValue, UnifyKey};
pub use tern_parser::ast::PrimType;

macro_rules! arena_id {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);

            impl $name {
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

arena_id! {
    /// A function, method, linked function or synthesized constructor.
    FnId,
    /// A struct template; instances are keyed by generic arguments.
    StructId,
    TraitId,
    EnumId,
    AliasId,
    GlobalId,
}

/// A function signature. For variadic functions the last parameter holds
/// the element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnSig {
    pub params: Vec<Ty>,
    pub variadic: bool,
    pub ret: Ty,
}

impl FnSig {
    /// Type of parameter `i` as seen inside the body.
    pub fn param_binding(&self, i: usize) -> Ty {
        let ty = self.params[i].clone();
        if self.variadic && i + 1 == self.params.len() {
            Ty::Slice(Box::new(ty))
        } else {
            ty
        }
    }
}

/// A use of a struct template with concrete generic arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructRef {
    pub id: StructId,
    /// Qualified display name, without generic arguments.
    pub name: String,
    pub generics: Vec<Ty>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Prim(PrimType),
    /// The type of an untyped `nil`.
    Nil,
    /// The result of a call to a function without a result.
    Void,
    Ptr(Box<Ty>),
    UnsafePtr,
    Ref(Box<Ty>),
    Slice(Box<Ty>),
    Array(u64, Box<Ty>),
    Map(Box<Ty>, Box<Ty>),
    Tuple(Vec<Ty>),
    Func(Box<FnSig>),
    Struct(StructRef),
    Trait(TraitId, String),
    Enum(EnumId, String),
    /// A generic parameter that is not bound to a type.
    Generic(String),
    /// A type declared with `cpp type` or written `cpp.Name`.
    Foreign(String),
    /// The type of an expression that already failed to check. Accepted
    /// everywhere so one mistake is reported once.
    Error,
}

impl Ty {
    pub const INT: Ty = Ty::Prim(PrimType::Int);
    pub const BOOL: Ty = Ty::Prim(PrimType::Bool);
    pub const STR: Ty = Ty::Prim(PrimType::Str);
    pub const F64: Ty = Ty::Prim(PrimType::F64);

    pub fn prim(&self) -> Option<PrimType> {
        match self {
            Ty::Prim(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ty::Error)
    }

    pub fn is_integer(&self) -> bool {
        self.prim().is_some_and(PrimType::is_integer)
    }

    pub fn is_float(&self) -> bool {
        self.prim().is_some_and(PrimType::is_float)
    }

    pub fn is_numeric(&self) -> bool {
        self.prim().is_some_and(PrimType::is_numeric)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Ty::Prim(PrimType::Bool))
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Ty::Prim(PrimType::Str))
    }

    /// Kinds that accept `nil`.
    pub fn is_nil_compatible(&self) -> bool {
        matches!(
            self,
            Ty::Ptr(_) | Ty::UnsafePtr | Ty::Slice(_) | Ty::Map(..) | Ty::Func(_) | Ty::Trait(..)
        )
    }

    /// Whether a generic placeholder occurs anywhere inside.
    pub fn has_generics(&self) -> bool {
        match self {
            Ty::Generic(_) => true,
            Ty::Ptr(t) | Ty::Ref(t) | Ty::Slice(t) | Ty::Array(_, t) => t.has_generics(),
            Ty::Map(k, v) => k.has_generics() || v.has_generics(),
            Ty::Tuple(elems) => elems.iter().any(Ty::has_generics),
            Ty::Func(sig) => sig.params.iter().any(Ty::has_generics) || sig.ret.has_generics(),
            Ty::Struct(s) => s.generics.iter().any(Ty::has_generics),
            _ => false,
        }
    }

    /// Whether the generic placeholder `name` occurs anywhere inside.
    pub fn mentions(&self, name: &str) -> bool {
        match self {
            Ty::Generic(g) => g == name,
            Ty::Ptr(t) | Ty::Ref(t) | Ty::Slice(t) | Ty::Array(_, t) => t.mentions(name),
            Ty::Map(k, v) => k.mentions(name) || v.mentions(name),
            Ty::Tuple(elems) => elems.iter().any(|t| t.mentions(name)),
            Ty::Func(sig) => sig.params.iter().any(|t| t.mentions(name)) || sig.ret.mentions(name),
            Ty::Struct(s) => s.generics.iter().any(|t| t.mentions(name)),
            _ => false,
        }
    }

    /// The struct behind a value, pointer or reference.
    pub fn struct_ref(&self) -> Option<&StructRef> {
        match self {
            Ty::Struct(s) => Some(s),
            Ty::Ptr(inner) | Ty::Ref(inner) => match inner.as_ref() {
                Ty::Struct(s) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    /// The type as a list of values: a tuple yields its elements, `Void`
    /// yields nothing.
    pub fn values(&self) -> Vec<Ty> {
        match self {
            Ty::Tuple(elems) => elems.clone(),
            Ty::Void => Vec::new(),
            other => vec![other.clone()],
        }
    }
}

/// Canonical key of a generic argument list: `i32, []Pair#0[str]`.
pub fn generics_key(args: &[Ty]) -> String {
    let mut out = String::new();
    write_keys(args, &mut out);
    out
}

fn write_keys(args: &[Ty], out: &mut String) {
    for (i, ty) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_key(ty, out);
    }
}

fn write_key(ty: &Ty, out: &mut String) {
    match ty {
        Ty::Ptr(t) => {
            out.push('*');
            write_key(t, out);
        }
        Ty::Ref(t) => {
            out.push('&');
            write_key(t, out);
        }
        Ty::Slice(t) => {
            out.push_str("[]");
            write_key(t, out);
        }
        Ty::Array(n, t) => {
            let _ = write!(out, "[{n}]");
            write_key(t, out);
        }
        Ty::Map(k, v) => {
            out.push('[');
            write_key(k, out);
            out.push(':');
            write_key(v, out);
            out.push(']');
        }
        Ty::Tuple(elems) => {
            out.push('(');
            write_keys(elems, out);
            out.push(')');
        }
        Ty::Func(sig) => {
            out.push_str("fn(");
            for (i, param) in sig.params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if sig.variadic && i + 1 == sig.params.len() {
                    out.push_str("...");
                }
                write_key(param, out);
            }
            out.push(')');
            if sig.ret != Ty::Void {
                out.push(' ');
                write_key(&sig.ret, out);
            }
        }
        Ty::Struct(s) => {
            let _ = write!(out, "{}#{}", s.name, s.id.0);
            if !s.generics.is_empty() {
                out.push('[');
                write_keys(&s.generics, out);
                out.push(']');
            }
        }
        Ty::Trait(id, name) => {
            let _ = write!(out, "{name}#{}", id.0);
        }
        Ty::Enum(id, name) => {
            let _ = write!(out, "{name}#{}", id.0);
        }
        other => {
            let _ = write!(out, "{other}");
        }
    }
}

/// Display form of a type list: `i32, []str`.
fn join(args: &[Ty]) -> String {
    args.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Prim(p) => write!(f, "{p}"),
            Ty::Nil => f.write_str("nil"),
            Ty::Void => f.write_str("void"),
            Ty::Ptr(t) => write!(f, "*{t}"),
            Ty::UnsafePtr => f.write_str("*unsafe"),
            Ty::Ref(t) => write!(f, "&{t}"),
            Ty::Slice(t) => write!(f, "[]{t}"),
            Ty::Array(n, t) => write!(f, "[{n}]{t}"),
            Ty::Map(k, v) => write!(f, "[{k}:{v}]"),
            Ty::Tuple(elems) => write!(f, "({})", join(elems)),
            Ty::Func(sig) => {
                f.write_str("fn(")?;
                for (i, param) in sig.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if sig.variadic && i + 1 == sig.params.len() {
                        f.write_str("...")?;
                    }
                    write!(f, "{param}")?;
                }
                f.write_str(")")?;
                match &sig.ret {
                    Ty::Void => Ok(()),
                    ret => write!(f, " {ret}"),
                }
            }
            Ty::Struct(s) if s.generics.is_empty() => f.write_str(&s.name),
            Ty::Struct(s) => write!(f, "{}[{}]", s.name, join(&s.generics)),
            Ty::Trait(_, name) | Ty::Enum(_, name) | Ty::Generic(name) => f.write_str(name),
            Ty::Foreign(name) => write!(f, "cpp.{name}"),
            Ty::Error => f.write_str("{error}"),
        }
    }
}

/// A generic parameter during argument inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericVar(pub u32);

impl UnifyKey for GenericVar {
    type Value = Option<Ty>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(i: u32) -> Self {
        GenericVar(i)
    }

    fn tag() -> &'static str {
        "GenericVar"
    }
}

impl EqUnifyValue for Ty {}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(args: Vec<Ty>) -> Ty {
        Ty::Struct(StructRef {
            id: StructId(0),
            name: "Pair".into(),
            generics: args,
        })
    }

    #[test]
    fn canonical_rendering() {
        let sig = FnSig {
            params: vec![Ty::INT, Ty::STR],
            variadic: true,
            ret: Ty::Tuple(vec![Ty::BOOL, Ty::Ptr(Box::new(Ty::INT))]),
        };
        assert_eq!(Ty::Func(Box::new(sig)).to_string(), "fn(int, ...str) (bool, *int)");
        assert_eq!(
            Ty::Map(Box::new(Ty::STR), Box::new(Ty::Array(4, Box::new(Ty::Prim(PrimType::U8))))).to_string(),
            "[str:[4]u8]"
        );
        assert_eq!(pair(vec![Ty::INT, Ty::Slice(Box::new(Ty::STR))]).to_string(), "Pair[int, []str]");
        assert_eq!(Ty::Ref(Box::new(pair(vec![]))).to_string(), "&Pair");
    }

    #[test]
    fn keys_tell_same_named_definitions_apart() {
        let other = Ty::Struct(StructRef {
            id: StructId(1),
            name: "Pair".into(),
            generics: vec![Ty::INT],
        });
        let ours = pair(vec![Ty::INT]);
        assert_eq!(ours.to_string(), other.to_string());
        assert_ne!(generics_key(&[ours.clone()]), generics_key(&[other]));
        assert_eq!(generics_key(&[ours.clone()]), generics_key(&[ours]));
        assert_eq!(generics_key(&[Ty::INT, Ty::Slice(Box::new(Ty::STR))]), "int, []str");
    }

    #[test]
    fn generics_are_found_structurally() {
        assert!(Ty::Slice(Box::new(Ty::Generic("T".into()))).has_generics());
        assert!(pair(vec![Ty::Map(Box::new(Ty::STR), Box::new(Ty::Generic("V".into())))]).has_generics());
        assert!(!pair(vec![Ty::INT]).has_generics());
    }

    #[test]
    fn variadic_parameter_binds_a_slice() {
        let sig = FnSig {
            params: vec![Ty::STR, Ty::INT],
            variadic: true,
            ret: Ty::Void,
        };
        assert_eq!(sig.param_binding(0), Ty::STR);
        assert_eq!(sig.param_binding(1), Ty::Slice(Box::new(Ty::INT)));
    }
}
