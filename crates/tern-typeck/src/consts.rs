//! Compile-time constant values and folding.
//!
//! Integer constants are held as `i128`, which covers every value of every
//! integer type so range checks against a destination happen after folding,
//! not during it.

use std::fmt;

use tern_parser::ast::{BinOp, PrimType, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i128),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl ConstValue {
    pub fn as_int(&self) -> Option<i128> {
        match self {
            ConstValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            ConstValue::Int(v) => *v == 0,
            ConstValue::Float(v) => *v == 0.0,
            _ => false,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Float(v) => write!(f, "{v}"),
            ConstValue::Bool(v) => write!(f, "{v}"),
            ConstValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldError {
    Overflow,
    DivisionByZero,
}

/// Inclusive range of an integer type.
pub fn int_range(prim: PrimType) -> Option<(i128, i128)> {
    let (signed, bits) = prim.int_info()?;
    Some(if signed {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    })
}

/// Whether `value` is representable in `prim`. Floats accept any finite
/// value within their magnitude; non-numeric types accept nothing.
pub fn fits(value: &ConstValue, prim: PrimType) -> bool {
    match (value, prim) {
        (ConstValue::Int(v), p) if p.is_integer() => {
            int_range(p).is_some_and(|(min, max)| (min..=max).contains(v))
        }
        (ConstValue::Int(_), PrimType::F32 | PrimType::F64) => true,
        (ConstValue::Float(v), PrimType::F32) => v.abs() <= f32::MAX as f64,
        (ConstValue::Float(_), PrimType::F64) => true,
        _ => false,
    }
}

pub fn fold_unary(op: UnaryOp, value: &ConstValue) -> Result<Option<ConstValue>, FoldError> {
    let folded = match (op, value) {
        (UnaryOp::Plus, v @ (ConstValue::Int(_) | ConstValue::Float(_))) => v.clone(),
        (UnaryOp::Neg, ConstValue::Int(v)) => ConstValue::Int(v.checked_neg().ok_or(FoldError::Overflow)?),
        (UnaryOp::Neg, ConstValue::Float(v)) => ConstValue::Float(-v),
        (UnaryOp::Not, ConstValue::Bool(b)) => ConstValue::Bool(!b),
        (UnaryOp::BitNot, ConstValue::Int(v)) => ConstValue::Int(!v),
        _ => return Ok(None),
    };
    Ok(Some(folded))
}

/// Fold `lhs op rhs`. Returns `Ok(None)` for operand kinds the operator does
/// not fold (the caller has already type-checked the operation).
pub fn fold_binary(op: BinOp, lhs: &ConstValue, rhs: &ConstValue) -> Result<Option<ConstValue>, FoldError> {
    use ConstValue::*;
    let folded = match (lhs, rhs) {
        (Int(a), Int(b)) => fold_ints(op, *a, *b)?,
        (Float(a), Float(b)) => fold_floats(op, *a, *b)?,
        (Int(a), Float(b)) => fold_floats(op, *a as f64, *b)?,
        (Float(a), Int(b)) => fold_floats(op, *a, *b as f64)?,
        (Bool(a), Bool(b)) => match op {
            BinOp::And => Some(Bool(*a && *b)),
            BinOp::Or => Some(Bool(*a || *b)),
            BinOp::Eq => Some(Bool(a == b)),
            BinOp::Ne => Some(Bool(a != b)),
            _ => None,
        },
        (Str(a), Str(b)) => match op {
            BinOp::Add => Some(Str(format!("{a}{b}"))),
            BinOp::Eq => Some(Bool(a == b)),
            BinOp::Ne => Some(Bool(a != b)),
            BinOp::Lt => Some(Bool(a < b)),
            BinOp::Gt => Some(Bool(a > b)),
            BinOp::Le => Some(Bool(a <= b)),
            BinOp::Ge => Some(Bool(a >= b)),
            _ => None,
        },
        _ => None,
    };
    Ok(folded)
}

fn fold_ints(op: BinOp, a: i128, b: i128) -> Result<Option<ConstValue>, FoldError> {
    use BinOp::*;
    let overflow = FoldError::Overflow;
    let value = match op {
        Add => a.checked_add(b).ok_or(overflow)?,
        Sub => a.checked_sub(b).ok_or(overflow)?,
        Mul => a.checked_mul(b).ok_or(overflow)?,
        Div | Rem if b == 0 => return Err(FoldError::DivisionByZero),
        Div => a.checked_div(b).ok_or(overflow)?,
        Rem => a.checked_rem(b).ok_or(overflow)?,
        BitAnd => a & b,
        BitOr => a | b,
        BitXor => a ^ b,
        Shl => {
            if !(0..127).contains(&b) {
                return Err(overflow);
            }
            a.checked_mul(1i128 << b).ok_or(overflow)?
        }
        Shr => {
            if b < 0 {
                return Err(overflow);
            }
            a >> b.min(127)
        }
        Eq => return Ok(Some(ConstValue::Bool(a == b))),
        Ne => return Ok(Some(ConstValue::Bool(a != b))),
        Lt => return Ok(Some(ConstValue::Bool(a < b))),
        Gt => return Ok(Some(ConstValue::Bool(a > b))),
        Le => return Ok(Some(ConstValue::Bool(a <= b))),
        Ge => return Ok(Some(ConstValue::Bool(a >= b))),
        And | Or => return Ok(None),
    };
    Ok(Some(ConstValue::Int(value)))
}

fn fold_floats(op: BinOp, a: f64, b: f64) -> Result<Option<ConstValue>, FoldError> {
    use BinOp::*;
    let value = match op {
        Add => a + b,
        Sub => a - b,
        Mul => a * b,
        Div if b == 0.0 => return Err(FoldError::DivisionByZero),
        Div => a / b,
        Eq => return Ok(Some(ConstValue::Bool(a == b))),
        Ne => return Ok(Some(ConstValue::Bool(a != b))),
        Lt => return Ok(Some(ConstValue::Bool(a < b))),
        Gt => return Ok(Some(ConstValue::Bool(a > b))),
        Le => return Ok(Some(ConstValue::Bool(a <= b))),
        Ge => return Ok(Some(ConstValue::Bool(a >= b))),
        _ => return Ok(None),
    };
    if value.is_finite() {
        Ok(Some(ConstValue::Float(value)))
    } else {
        Err(FoldError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_boundaries_are_inclusive() {
        let cases: &[(PrimType, i128, i128)] = &[
            (PrimType::I8, -128, 127),
            (PrimType::U8, 0, 255),
            (PrimType::I16, -32768, 32767),
            (PrimType::U16, 0, 65535),
            (PrimType::I32, i32::MIN as i128, i32::MAX as i128),
            (PrimType::U32, 0, u32::MAX as i128),
            (PrimType::I64, i64::MIN as i128, i64::MAX as i128),
            (PrimType::Int, i64::MIN as i128, i64::MAX as i128),
            (PrimType::U64, 0, u64::MAX as i128),
            (PrimType::Uintptr, 0, u64::MAX as i128),
        ];
        for &(prim, min, max) in cases {
            assert_eq!(int_range(prim), Some((min, max)), "{prim}");
            assert!(fits(&ConstValue::Int(min), prim), "{prim} min");
            assert!(fits(&ConstValue::Int(max), prim), "{prim} max");
            assert!(!fits(&ConstValue::Int(min - 1), prim), "{prim} below");
            assert!(!fits(&ConstValue::Int(max + 1), prim), "{prim} above");
        }
    }

    #[test]
    fn non_integers_do_not_fit_integer_types() {
        assert!(!fits(&ConstValue::Float(1.0), PrimType::I32));
        assert!(!fits(&ConstValue::Str("1".into()), PrimType::Int));
        assert!(fits(&ConstValue::Int(300), PrimType::F32));
        assert!(!fits(&ConstValue::Float(1e300), PrimType::F32));
        assert!(!fits(&ConstValue::Bool(true), PrimType::Bool));
    }

    #[test]
    fn integer_folding() {
        let int = ConstValue::Int;
        assert_eq!(fold_binary(BinOp::Add, &int(2), &int(3)), Ok(Some(int(5))));
        assert_eq!(fold_binary(BinOp::Sub, &int(2), &int(3)), Ok(Some(int(-1))));
        assert_eq!(fold_binary(BinOp::Shl, &int(1), &int(10)), Ok(Some(int(1024))));
        assert_eq!(fold_binary(BinOp::Rem, &int(7), &int(4)), Ok(Some(int(3))));
        assert_eq!(fold_binary(BinOp::Lt, &int(1), &int(2)), Ok(Some(ConstValue::Bool(true))));
        assert_eq!(fold_binary(BinOp::Div, &int(1), &int(0)), Err(FoldError::DivisionByZero));
        assert_eq!(fold_binary(BinOp::Shl, &int(1), &int(200)), Err(FoldError::Overflow));
        assert_eq!(fold_binary(BinOp::Mul, &int(i128::MAX), &int(2)), Err(FoldError::Overflow));
    }

    #[test]
    fn mixed_and_string_folding() {
        assert_eq!(
            fold_binary(BinOp::Mul, &ConstValue::Int(2), &ConstValue::Float(1.5)),
            Ok(Some(ConstValue::Float(3.0)))
        );
        assert_eq!(
            fold_binary(BinOp::Add, &ConstValue::Str("ab".into()), &ConstValue::Str("c".into())),
            Ok(Some(ConstValue::Str("abc".into())))
        );
        assert_eq!(
            fold_binary(BinOp::Div, &ConstValue::Float(1.0), &ConstValue::Float(0.0)),
            Err(FoldError::DivisionByZero)
        );
    }

    #[test]
    fn unary_folding() {
        assert_eq!(fold_unary(UnaryOp::Neg, &ConstValue::Int(5)), Ok(Some(ConstValue::Int(-5))));
        assert_eq!(fold_unary(UnaryOp::BitNot, &ConstValue::Int(0)), Ok(Some(ConstValue::Int(-1))));
        assert_eq!(fold_unary(UnaryOp::Not, &ConstValue::Bool(true)), Ok(Some(ConstValue::Bool(false))));
        assert_eq!(fold_unary(UnaryOp::Deref, &ConstValue::Int(1)), Ok(None));
    }
}
