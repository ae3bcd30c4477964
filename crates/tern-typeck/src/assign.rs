//! Assignability between resolved types.
//!
//! [`assignable`] answers whether a value of one type may be stored where
//! another is required. Dispatch is first-match on the destination's kind;
//! primitives fall through to a widening table. An untyped constant source
//! is range-checked against the destination instead of compared nominally.

use crate::consts::{fits, ConstValue};
use crate::ty::{PrimType, StructId, TraitId, Ty};

/// Trait conformance facts the rules need from the definition tables.
pub trait Conformance {
    fn implements(&self, strukt: StructId, tr: TraitId) -> bool;
    /// Whether any method of the trait takes `&self`.
    fn needs_ref(&self, tr: TraitId) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignability {
    Ok,
    Incompatible,
    /// The source is an untyped constant that does not fit the destination.
    Overflow,
}

/// The value side of an assignment.
#[derive(Debug, Clone, Copy)]
pub struct Source<'v> {
    pub ty: &'v Ty,
    /// Present when the source is an untyped constant.
    pub untyped: Option<&'v ConstValue>,
}

impl<'v> Source<'v> {
    pub fn typed(ty: &'v Ty) -> Self {
        Self { ty, untyped: None }
    }
}

pub fn assignable(facts: &dyn Conformance, target: &Ty, source: Source<'_>, implicit_deref: bool) -> Assignability {
    use Assignability::*;
    let from = source.ty;
    if target.is_error() || from.is_error() {
        return Ok;
    }
    if let (Some(value), Some(prim)) = (source.untyped, target.prim()) {
        return constant_into(value, prim);
    }
    if matches!(from, Ty::Void) {
        return Incompatible;
    }
    if matches!(from, Ty::Nil) {
        return verdict(target.is_nil_compatible());
    }
    let result = match (target, from) {
        (Ty::Trait(tr, _), Ty::Trait(other, _)) => verdict(tr == other),
        (Ty::Trait(tr, _), _) => verdict(conforms(facts, *tr, from)),
        (Ty::Ref(t), Ty::Ref(f)) => verdict(t == f),
        (Ty::Ptr(_), Ty::UnsafePtr) => Ok,
        (Ty::Ptr(t), Ty::Ptr(f) | Ty::Ref(f)) => verdict(t == f),
        (Ty::UnsafePtr, Ty::UnsafePtr | Ty::Ptr(_)) => Ok,
        (Ty::Array(n, t), Ty::Array(m, f)) => verdict(n == m && t == f),
        (Ty::Tuple(ts), Ty::Tuple(fs)) if ts.len() == fs.len() => verdict(
            ts.iter()
                .zip(fs)
                .all(|(t, f)| assignable(facts, t, Source::typed(f), implicit_deref) == Ok),
        ),
        (Ty::Slice(_) | Ty::Map(..) | Ty::Func(_) | Ty::Enum(..) | Ty::Struct(_), _) => verdict(target == from),
        (Ty::Generic(a), Ty::Generic(b)) => verdict(a == b),
        (Ty::Foreign(a), Ty::Foreign(b)) => verdict(a == b),
        (Ty::Prim(PrimType::Any), _) => Ok,
        (Ty::Prim(t), Ty::Prim(f)) => verdict(prim_widens(*t, *f)),
        _ => Incompatible,
    };
    if result == Incompatible && implicit_deref {
        match (target, from) {
            (Ty::Ref(t), f) if !matches!(f, Ty::Ref(_)) => {
                return assignable(facts, t, Source { ty: f, ..source }, false)
            }
            (t, Ty::Ref(f)) => return assignable(facts, t, Source::typed(f), false),
            _ => {}
        }
    }
    result
}

fn verdict(ok: bool) -> Assignability {
    if ok {
        Assignability::Ok
    } else {
        Assignability::Incompatible
    }
}

/// A struct satisfies a trait it implements. When the trait has `&self`
/// methods the struct must be behind a reference or pointer.
fn conforms(facts: &dyn Conformance, tr: TraitId, from: &Ty) -> bool {
    let (strukt, indirect) = match from {
        Ty::Struct(s) => (s.id, false),
        Ty::Ref(inner) | Ty::Ptr(inner) => match inner.as_ref() {
            Ty::Struct(s) => (s.id, true),
            _ => return false,
        },
        _ => return false,
    };
    facts.implements(strukt, tr) && (indirect || !facts.needs_ref(tr))
}

fn constant_into(value: &ConstValue, target: PrimType) -> Assignability {
    match (value, target) {
        (_, PrimType::Any) => Assignability::Ok,
        (ConstValue::Bool(_), PrimType::Bool) | (ConstValue::Str(_), PrimType::Str) => Assignability::Ok,
        (ConstValue::Int(_), t) if t.is_numeric() => overflow_unless(fits(value, t)),
        (ConstValue::Float(_), t) if t.is_float() => overflow_unless(fits(value, t)),
        _ => Assignability::Incompatible,
    }
}

fn overflow_unless(ok: bool) -> Assignability {
    if ok {
        Assignability::Ok
    } else {
        Assignability::Overflow
    }
}

/// Integer widening within one signedness class, and `f32` into `f64`.
pub fn prim_widens(target: PrimType, from: PrimType) -> bool {
    if target == from {
        return true;
    }
    match (target.int_info(), from.int_info()) {
        (Some((ts, tb)), Some((fs, fb))) => ts == fs && tb >= fb,
        _ => target == PrimType::F64 && from == PrimType::F32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{FnSig, StructRef};

    /// Struct 0 implements trait 0 (by-value methods) and trait 1 (`&self`).
    struct Facts;

    impl Conformance for Facts {
        fn implements(&self, strukt: StructId, _tr: TraitId) -> bool {
            strukt == StructId(0)
        }

        fn needs_ref(&self, tr: TraitId) -> bool {
            tr == TraitId(1)
        }
    }

    fn strukt(id: u32) -> Ty {
        Ty::Struct(StructRef {
            id: StructId(id),
            name: format!("S{id}"),
            generics: vec![],
        })
    }

    fn check(target: &Ty, from: &Ty) -> Assignability {
        assignable(&Facts, target, Source::typed(from), false)
    }

    fn prim(p: PrimType) -> Ty {
        Ty::Prim(p)
    }

    #[test]
    fn integer_widening_stays_within_class() {
        use PrimType::*;
        assert_eq!(check(&prim(I64), &prim(I8)), Assignability::Ok);
        assert_eq!(check(&prim(Int), &prim(I64)), Assignability::Ok);
        assert_eq!(check(&prim(U16), &prim(U8)), Assignability::Ok);
        assert_eq!(check(&prim(I8), &prim(I16)), Assignability::Incompatible);
        assert_eq!(check(&prim(I64), &prim(U8)), Assignability::Incompatible);
        assert_eq!(check(&prim(F64), &prim(F32)), Assignability::Ok);
        assert_eq!(check(&prim(F32), &prim(F64)), Assignability::Incompatible);
        assert_eq!(check(&prim(F64), &prim(Int)), Assignability::Incompatible);
        assert_eq!(check(&prim(Any), &prim(Str)), Assignability::Ok);
        assert_eq!(check(&prim(Str), &prim(Any)), Assignability::Incompatible);
    }

    #[test]
    fn untyped_constants_are_range_checked() {
        let u8_ty = prim(PrimType::U8);
        let into_u8 = |v: i128| {
            let value = ConstValue::Int(v);
            assignable(
                &Facts,
                &u8_ty,
                Source {
                    ty: &Ty::INT,
                    untyped: Some(&value),
                },
                false,
            )
        };
        assert_eq!(into_u8(200), Assignability::Ok);
        assert_eq!(into_u8(255), Assignability::Ok);
        assert_eq!(into_u8(300), Assignability::Overflow);
        assert_eq!(into_u8(-1), Assignability::Overflow);

        let half = ConstValue::Float(0.5);
        let float_into_int = Source {
            ty: &Ty::F64,
            untyped: Some(&half),
        };
        assert_eq!(assignable(&Facts, &Ty::INT, float_into_int, false), Assignability::Incompatible);
        assert_eq!(assignable(&Facts, &Ty::F64, float_into_int, false), Assignability::Ok);
    }

    #[test]
    fn nil_goes_into_nil_compatible_kinds() {
        let func = Ty::Func(Box::new(FnSig {
            params: vec![],
            variadic: false,
            ret: Ty::Void,
        }));
        for target in [
            Ty::Ptr(Box::new(Ty::INT)),
            Ty::UnsafePtr,
            Ty::Slice(Box::new(Ty::INT)),
            Ty::Map(Box::new(Ty::STR), Box::new(Ty::INT)),
            func,
            Ty::Trait(TraitId(0), "T".into()),
        ] {
            assert_eq!(check(&target, &Ty::Nil), Assignability::Ok, "{target}");
        }
        assert_eq!(check(&Ty::INT, &Ty::Nil), Assignability::Incompatible);
        assert_eq!(check(&strukt(0), &Ty::Nil), Assignability::Incompatible);
    }

    #[test]
    fn trait_conformance() {
        let by_value = Ty::Trait(TraitId(0), "Speaker".into());
        let by_ref = Ty::Trait(TraitId(1), "Writer".into());
        assert_eq!(check(&by_value, &strukt(0)), Assignability::Ok);
        assert_eq!(check(&by_value, &strukt(1)), Assignability::Incompatible);
        assert_eq!(check(&by_ref, &strukt(0)), Assignability::Incompatible);
        assert_eq!(check(&by_ref, &Ty::Ref(Box::new(strukt(0)))), Assignability::Ok);
        assert_eq!(check(&by_ref, &Ty::Ptr(Box::new(strukt(0)))), Assignability::Ok);
    }

    #[test]
    fn pointers_and_references() {
        let ptr = Ty::Ptr(Box::new(Ty::INT));
        let reference = Ty::Ref(Box::new(Ty::INT));
        assert_eq!(check(&ptr, &reference), Assignability::Ok);
        assert_eq!(check(&reference, &ptr), Assignability::Incompatible);
        assert_eq!(check(&ptr, &Ty::UnsafePtr), Assignability::Ok);
        assert_eq!(check(&Ty::UnsafePtr, &ptr), Assignability::Ok);
        assert_eq!(check(&ptr, &Ty::Ptr(Box::new(Ty::STR))), Assignability::Incompatible);
    }

    #[test]
    fn implicit_deref_retries_through_references() {
        let reference = Ty::Ref(Box::new(Ty::INT));
        assert_eq!(check(&Ty::INT, &reference), Assignability::Incompatible);
        assert_eq!(
            assignable(&Facts, &Ty::INT, Source::typed(&reference), true),
            Assignability::Ok
        );
        assert_eq!(
            assignable(&Facts, &reference, Source::typed(&Ty::INT), true),
            Assignability::Ok
        );
    }

    #[test]
    fn arrays_need_equal_lengths() {
        let a3 = Ty::Array(3, Box::new(Ty::INT));
        let a4 = Ty::Array(4, Box::new(Ty::INT));
        assert_eq!(check(&a3, &a3.clone()), Assignability::Ok);
        assert_eq!(check(&a3, &a4), Assignability::Incompatible);
    }

    #[test]
    fn structs_compare_by_identity_and_generics() {
        let pair = |args: Vec<Ty>| {
            Ty::Struct(StructRef {
                id: StructId(7),
                name: "Pair".into(),
                generics: args,
            })
        };
        assert_eq!(check(&pair(vec![Ty::INT]), &pair(vec![Ty::INT])), Assignability::Ok);
        assert_eq!(check(&pair(vec![Ty::INT]), &pair(vec![Ty::STR])), Assignability::Incompatible);
        assert_eq!(check(&strukt(0), &strukt(1)), Assignability::Incompatible);
    }

    #[test]
    fn error_types_are_silently_accepted() {
        assert_eq!(check(&Ty::INT, &Ty::Error), Assignability::Ok);
        assert_eq!(check(&Ty::Error, &Ty::STR), Assignability::Ok);
    }
}
