//! Expression typing and constant folding.

use rustc_hash::FxHashMap;
use tern_common::span::Loc;
use tern_parser::ast::{
    ArraySize, BinOp, Entry, Expr, ExprKind, FnDecl, Ident, LitKind, Literal, TypeKind, TypeNode, UnaryOp,
};

use super::stmts::convert_const;
use super::{placeholders, Checker, Ctx, Value, RUNE};
use crate::assign::Assignability;
use crate::builtins::Builtin;
use crate::consts::{fits, fold_binary, fold_unary, int_range, ConstValue, FoldError};
use crate::defs::{DefId, Resolution};
use crate::error::TypeError;
use crate::ty::{EnumId, FnId, PrimType, StructId, StructRef, Ty};

impl<'a> Checker<'a> {
    /// Type `expr` and record the result at its location. `expected` only
    /// guides literals whose type is otherwise unknown; assignability is
    /// the caller's concern.
    pub(crate) fn check_expr(&mut self, expr: &Expr, expected: Option<&Ty>) -> Value {
        let value = self.expr_value(expr, expected);
        self.record(expr.loc, &value.ty);
        value
    }

    fn expr_value(&mut self, expr: &Expr, expected: Option<&Ty>) -> Value {
        let loc = expr.loc;
        match &expr.kind {
            ExprKind::Lit(lit) => self.literal(lit, loc),
            ExprKind::Ident(name) => self.ident_value(name, loc),
            ExprKind::SelfValue => match self.ctx.self_ty.clone() {
                Some(ty) => Value::place(ty),
                None => {
                    self.error(TypeError::NotFound {
                        name: "self".into(),
                        loc,
                    });
                    Value::error()
                }
            },
            ExprKind::Nil => Value::of(Ty::Nil),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.check_expr(lhs, None);
                let hint = (!lhs.untyped).then_some(&lhs.ty);
                let rhs = self.check_expr(rhs, hint);
                self.binary_result(*op, &lhs, &rhs, loc)
            }
            ExprKind::Unary { op, operand } => self.unary(*op, operand, loc),
            ExprKind::Cast { ty, expr: inner } => self.cast(ty, inner, loc),
            ExprKind::Spread(inner) => {
                self.check_expr(inner, None);
                self.error(TypeError::SpreadNotAllowed { loc });
                Value::error()
            }
            ExprKind::Call { callee, args } => self.check_call(callee, args, loc),
            ExprKind::Index { base, args, generics } => self.index(base, args, generics.as_deref(), loc),
            ExprKind::Slicing { base, start, end } => self.slicing(base, start.as_deref(), end.as_deref(), loc),
            ExprKind::Selector { base, name } => self.selector(base, name, loc),
            ExprKind::Path(segments) => self.path_value(segments, loc),
            // Foreign names are not checked.
            ExprKind::Foreign(_) => Value::error(),
            ExprKind::Composite { ty, entries } => self.composite(ty, entries, loc),
            ExprKind::SliceLit(elems) => self.slice_lit(elems, expected, loc),
            ExprKind::Tuple(elems) => self.tuple(elems, expected),
            ExprKind::Func(decl) => self.func_lit(decl),
        }
    }

    fn literal(&mut self, lit: &Literal, loc: Loc) -> Value {
        match &lit.kind {
            LitKind::Int(n) => match i128::try_from(*n) {
                Ok(n) => Value::untyped(Ty::INT, ConstValue::Int(n)),
                Err(_) => {
                    self.error(TypeError::Overflow {
                        value: lit.text.clone(),
                        target: Ty::INT,
                        loc,
                    });
                    Value::error()
                }
            },
            LitKind::Float(f) => Value::untyped(Ty::F64, ConstValue::Float(*f)),
            LitKind::Str(s) => Value::untyped(Ty::STR, ConstValue::Str(s.clone())),
            LitKind::Rune(c) => Value::untyped(RUNE, ConstValue::Int(i128::from(u32::from(*c)))),
            LitKind::Bool(b) => Value::untyped(Ty::BOOL, ConstValue::Bool(*b)),
        }
    }

    // ── Names ─────────────────────────────────────────────────────────

    fn ident_value(&mut self, name: &str, loc: Loc) -> Value {
        if name == "_" {
            self.error(TypeError::NotAValue {
                name: name.to_string(),
                loc,
            });
            return Value::error();
        }
        if let Some(local) = self.body.scopes.lookup(name) {
            return Value {
                ty: local.ty.clone(),
                constant: local.constant.clone(),
                untyped: local.untyped,
                addressable: !local.is_const,
            };
        }
        if let Some(def) = self.lookup_def(name) {
            return self.def_value(def, name, loc);
        }
        let err = if Builtin::from_name(name).is_some() || PrimType::from_name(name).is_some() {
            TypeError::NotAValue {
                name: name.to_string(),
                loc,
            }
        } else {
            TypeError::NotFound {
                name: name.to_string(),
                loc,
            }
        };
        self.error(err);
        Value::error()
    }

    /// A top-level definition used as a value.
    pub(crate) fn def_value(&mut self, def: DefId, name: &str, loc: Loc) -> Value {
        match def {
            DefId::Global(id) => {
                self.mark(def);
                let global = self.global_value(id);
                let is_const = self.defs.globals[id.index()].decl.constant;
                Value {
                    ty: global.ty,
                    constant: global.constant,
                    untyped: global.untyped,
                    addressable: !is_const,
                }
            }
            DefId::Fn(id) => {
                let expected = self.defs.func(id).decl.generics.len();
                if expected > 0 {
                    self.error(TypeError::MissingGenerics {
                        name: name.to_string(),
                        expected,
                        found: 0,
                        loc,
                    });
                    return Value::error();
                }
                self.fn_value(id, Vec::new())
            }
            DefId::Struct(_) | DefId::Trait(_) | DefId::Enum(_) | DefId::Alias(_) => {
                self.error(TypeError::NotAValue {
                    name: name.to_string(),
                    loc,
                });
                Value::error()
            }
        }
    }

    /// A function with all generic parameters bound, as a value. Concrete
    /// uses instantiate the body.
    pub(crate) fn fn_value(&mut self, id: FnId, args: Vec<Ty>) -> Value {
        if !args.iter().any(Ty::has_generics) {
            self.instantiate(id, &args);
            self.mark(DefId::Fn(id));
        }
        Value::of(Ty::Func(Box::new(self.fn_sig(id, &args))))
    }

    fn path_value(&mut self, segments: &[Ident], loc: Loc) -> Value {
        match segments {
            [first, item] if self.is_namespace(&first.name) => match self.resolve_qualified(first, item) {
                Some(def) => self.def_value(def, &item.name, item.loc),
                None => Value::error(),
            },
            [first, item] => match self.lookup_def(&first.name) {
                Some(DefId::Enum(id)) => self.enum_item(id, item),
                _ => {
                    self.error(TypeError::NotFound {
                        name: first.name.clone(),
                        loc: first.loc,
                    });
                    Value::error()
                }
            },
            [ns, ty, item] => match self.resolve_qualified(ns, ty) {
                Some(DefId::Enum(id)) => self.enum_item(id, item),
                Some(_) => {
                    self.error(TypeError::NotFound {
                        name: path_string(segments),
                        loc,
                    });
                    Value::error()
                }
                None => Value::error(),
            },
            _ => {
                self.error(TypeError::NotFound {
                    name: path_string(segments),
                    loc,
                });
                Value::error()
            }
        }
    }

    /// `name` refers to an imported namespace and nothing closer.
    pub(crate) fn is_namespace(&self, name: &str) -> bool {
        self.body.scopes.peek(name).is_none() && self.lookup_def(name).is_none() && self.namespace(name).is_some()
    }

    fn enum_item(&mut self, id: EnumId, item: &Ident) -> Value {
        self.ensure_enum(id);
        self.mark(DefId::Enum(id));
        let def = self.defs.enum_def(id);
        let ty = Ty::Enum(id, def.display.clone());
        let found = match &def.values {
            Resolution::Done(values) => values.get(&item.name).map(|v| Some(ConstValue::Int(*v))),
            // Referenced from the enum's own item values.
            _ => def.decl.items.iter().any(|i| i.name.name == item.name).then_some(None),
        };
        match found {
            Some(constant) => Value {
                ty,
                constant,
                untyped: false,
                addressable: false,
            },
            None => {
                self.error(TypeError::NoField {
                    ty,
                    name: item.name.clone(),
                    loc: item.loc,
                });
                Value::error()
            }
        }
    }

    // ── Selectors ─────────────────────────────────────────────────────

    fn selector(&mut self, base: &Expr, name: &Ident, loc: Loc) -> Value {
        if let Some(ident) = base.as_ident() {
            if self.body.scopes.peek(ident).is_none() {
                match self.lookup_def(ident) {
                    Some(DefId::Enum(id)) => return self.enum_item(id, name),
                    Some(DefId::Struct(id)) => {
                        return match self.static_method(id, name, loc) {
                            Some(fid) => self.fn_value(fid, Vec::new()),
                            None => Value::error(),
                        };
                    }
                    Some(_) => {}
                    None if self.namespace(ident).is_some() => {
                        let ns = Ident::new(ident, base.loc);
                        return match self.resolve_qualified(&ns, name) {
                            Some(def) => self.def_value(def, &name.name, name.loc),
                            None => Value::error(),
                        };
                    }
                    None => {}
                }
            }
        }
        let value = self.check_expr(base, None);
        self.member(base, &value, name, loc)
    }

    /// `S.m` for a method without a receiver.
    pub(crate) fn static_method(&mut self, id: StructId, name: &Ident, loc: Loc) -> Option<FnId> {
        let def = self.defs.strukt(id);
        let display = def.display.clone();
        let generics = def.decl.generics.len();
        let Some(fid) = def.methods.get(&name.name).copied() else {
            let ty = Ty::Struct(StructRef {
                id,
                name: display,
                generics: placeholders(&def.generic_names()),
            });
            self.error(TypeError::NoField {
                ty,
                name: name.name.clone(),
                loc: name.loc,
            });
            return None;
        };
        if generics > 0 {
            self.error(TypeError::MissingGenerics {
                name: display,
                expected: generics,
                found: 0,
                loc,
            });
            return None;
        }
        if self.defs.func(fid).decl.receiver.is_some() {
            self.error(TypeError::NotAValue {
                name: format!("{display}.{}", name.name),
                loc,
            });
            return None;
        }
        Some(fid)
    }

    /// Field, method or trait method `name` of a checked value.
    pub(crate) fn member(&mut self, base_expr: &Expr, base: &Value, name: &Ident, loc: Loc) -> Value {
        let ty = &base.ty;
        if ty.is_error() {
            return Value::error();
        }
        if let Some(sref) = ty.struct_ref().cloned() {
            let behind_pointer = !matches!(ty, Ty::Struct(_));
            let fields = self.struct_fields(&sref);
            if let Some(field) = fields.into_iter().find(|f| f.name == name.name) {
                let pkg = self.defs.strukt(sref.id).origin.pkg;
                if !field.public && pkg != self.ctx.pkg {
                    self.error(TypeError::Private {
                        name: name.name.clone(),
                        package: self.packages[pkg.0 as usize].path.clone(),
                        loc: name.loc,
                    });
                }
                return Value {
                    ty: field.ty,
                    constant: None,
                    untyped: false,
                    addressable: base.addressable || behind_pointer,
                };
            }
            if let Some(fid) = self.defs.strukt(sref.id).methods.get(&name.name).copied() {
                self.check_receiver(fid, base_expr, base);
                let own = self.defs.func(fid).decl.generics.len();
                if own > 0 {
                    self.error(TypeError::MissingGenerics {
                        name: self.describe_fn(fid),
                        expected: own,
                        found: 0,
                        loc,
                    });
                    return Value::error();
                }
                return self.fn_value(fid, sref.generics);
            }
        }
        if let Ty::Trait(tr, _) = ty {
            let tdef = self.defs.trait_def(*tr);
            if let Some(method) = tdef.method(&name.name) {
                let names: Vec<String> = tdef.decl.generics.iter().map(|g| g.name.clone()).collect();
                let ctx = Ctx::at(tdef.origin).with_bindings(names.clone(), &placeholders(&names));
                self.mark(DefId::Trait(*tr));
                let sig = self.in_context(ctx, |c| c.sig_of(method));
                return Value::of(Ty::Func(Box::new(sig)));
            }
        }
        self.error(TypeError::NoField {
            ty: ty.clone(),
            name: name.name.clone(),
            loc: name.loc,
        });
        Value::error()
    }

    /// A `&self` method needs an addressable receiver when called on a
    /// struct value; the reference is taken implicitly.
    pub(crate) fn check_receiver(&mut self, fid: FnId, base_expr: &Expr, base: &Value) {
        let by_ref = self.defs.func(fid).decl.receiver.as_ref().is_some_and(|r| r.by_ref);
        if by_ref && matches!(base.ty, Ty::Struct(_)) && !base.addressable {
            self.error(TypeError::NotAddressable {
                expr: base_expr.to_string(),
                loc: base_expr.loc,
            });
        }
    }

    // ── Indexing ──────────────────────────────────────────────────────

    /// A function or struct the bracket suffix on `base` would pass generic
    /// arguments to.
    pub(crate) fn generic_def(&mut self, base: &Expr) -> Option<(DefId, String)> {
        let (def, name) = match &base.kind {
            ExprKind::Ident(name)
                if self.body.scopes.peek(name).is_none() && !self.ctx.bindings.contains_key(name) =>
            {
                (self.lookup_def(name)?, name.clone())
            }
            ExprKind::Path(segments) => match segments.as_slice() {
                [ns, name] if self.is_namespace(&ns.name) => {
                    (self.resolve_qualified(ns, name)?, format!("{}::{}", ns.name, name.name))
                }
                _ => return None,
            },
            _ => return None,
        };
        matches!(def, DefId::Fn(_) | DefId::Struct(_)).then_some((def, name))
    }

    fn index(&mut self, base: &Expr, args: &[Expr], generics: Option<&[TypeNode]>, loc: Loc) -> Value {
        if let Some(generics) = generics {
            if let Some((def, name)) = self.generic_def(base) {
                let explicit: Vec<Ty> = generics.iter().map(|g| self.resolve_type(g)).collect();
                return match def {
                    DefId::Fn(id) => {
                        let expected = self.defs.func(id).decl.generics.len();
                        if !self.generic_count(&name, expected, explicit.len(), loc) {
                            return Value::error();
                        }
                        self.fn_value(id, explicit)
                    }
                    _ => {
                        self.error(TypeError::NotAValue { name, loc });
                        Value::error()
                    }
                };
            }
        }
        let value = self.check_expr(base, None);
        self.index_on(&value, args, loc)
    }

    pub(crate) fn index_on(&mut self, base: &Value, args: &[Expr], loc: Loc) -> Value {
        let [arg] = args else {
            if !base.ty.is_error() {
                self.error(TypeError::NotIndexable {
                    ty: base.ty.clone(),
                    loc,
                });
            }
            self.check_unchecked_args(args);
            return Value::error();
        };
        let array = match &base.ty {
            Ty::Ptr(inner) | Ty::Ref(inner) if matches!(inner.as_ref(), Ty::Array(..)) => Some((inner.as_ref(), true)),
            ty @ Ty::Array(..) => Some((ty, base.addressable)),
            _ => None,
        };
        if let Some((Ty::Array(len, elem), addressable)) = array {
            let (len, elem) = (*len, (**elem).clone());
            if let Some(index) = self.check_index(arg) {
                if index < 0 || index >= i128::from(len) {
                    self.error(TypeError::IndexOutOfRange {
                        index,
                        len,
                        loc: arg.loc,
                    });
                }
            }
            return Value {
                addressable,
                ..Value::of(elem)
            };
        }
        match &base.ty {
            Ty::Slice(elem) => {
                let elem = (**elem).clone();
                self.check_index(arg);
                Value::place(elem)
            }
            Ty::Map(key, value) => {
                let (key, value) = ((**key).clone(), (**value).clone());
                let checked = self.check_expr(arg, Some(&key));
                self.expect_assignable(&key, &checked, arg.loc);
                Value::place(value)
            }
            Ty::Prim(PrimType::Str) => {
                self.check_index(arg);
                Value::of(Ty::Prim(PrimType::U8))
            }
            Ty::Error => {
                self.check_expr(arg, None);
                Value::error()
            }
            other => {
                let ty = other.clone();
                self.check_expr(arg, None);
                self.error(TypeError::NotIndexable { ty, loc });
                Value::error()
            }
        }
    }

    /// Check an index operand; returns its value when constant.
    fn check_index(&mut self, arg: &Expr) -> Option<i128> {
        let value = self.check_expr(arg, Some(&Ty::INT));
        if value.ty.is_error() {
            return None;
        }
        if !value.ty.is_integer() {
            self.error(TypeError::IncompatibleTypes {
                expected: Ty::INT,
                found: value.ty,
                loc: arg.loc,
            });
            return None;
        }
        value.constant.as_ref().and_then(ConstValue::as_int)
    }

    fn slicing(&mut self, base: &Expr, start: Option<&Expr>, end: Option<&Expr>, loc: Loc) -> Value {
        let value = self.check_expr(base, None);
        let bounds: Vec<(i128, Loc)> = [start, end]
            .into_iter()
            .flatten()
            .filter_map(|e| self.check_index(e).map(|i| (i, e.loc)))
            .collect();
        let (result, len) = match &value.ty {
            Ty::Slice(_) => (value.ty.clone(), None),
            Ty::Array(n, elem) => (Ty::Slice(elem.clone()), Some(*n)),
            Ty::Ptr(inner) | Ty::Ref(inner) => match inner.as_ref() {
                Ty::Array(n, elem) => (Ty::Slice(elem.clone()), Some(*n)),
                _ => return self.not_sliceable(&value.ty, loc),
            },
            Ty::Prim(PrimType::Str) => (Ty::STR, None),
            Ty::Error => return Value::error(),
            _ => return self.not_sliceable(&value.ty, loc),
        };
        for (index, at) in bounds {
            let over = len.is_some_and(|len| index > i128::from(len));
            if index < 0 || over {
                self.error(TypeError::IndexOutOfRange {
                    index,
                    len: len.unwrap_or(0),
                    loc: at,
                });
            }
        }
        Value::of(result)
    }

    fn not_sliceable(&mut self, ty: &Ty, loc: Loc) -> Value {
        self.error(TypeError::NotIndexable { ty: ty.clone(), loc });
        Value::error()
    }

    // ── Operators ─────────────────────────────────────────────────────

    fn unary(&mut self, op: UnaryOp, operand: &Expr, loc: Loc) -> Value {
        match op {
            UnaryOp::AddrOf => return self.address_of(operand, loc),
            UnaryOp::Deref => return self.deref(operand, loc),
            UnaryOp::Neg | UnaryOp::Plus | UnaryOp::Not | UnaryOp::BitNot => {}
        }
        let value = self.check_expr(operand, None);
        let ty = value.ty.clone();
        if ty.is_error() {
            return Value::error();
        }
        let ok = match op {
            UnaryOp::Not => ty.is_bool(),
            UnaryOp::BitNot => ty.is_integer(),
            _ => ty.is_numeric(),
        };
        if !ok {
            self.error(TypeError::InvalidOperator {
                op: op.as_str(),
                lhs: ty,
                rhs: None,
                loc,
            });
            return Value::error();
        }
        let Some(constant) = &value.constant else {
            return Value::of(ty);
        };
        // `^x` on a typed unsigned value flips only the type's bits.
        let unsigned_max = match (op, &ty, value.untyped) {
            (UnaryOp::BitNot, Ty::Prim(p), false) if !p.is_signed_integer() => int_range(*p).map(|(_, max)| max),
            _ => None,
        };
        let folded = match (unsigned_max, constant) {
            (Some(max), ConstValue::Int(n)) => Ok(Some(ConstValue::Int(max ^ n))),
            _ => fold_unary(op, constant),
        };
        match folded {
            Ok(Some(folded)) => self.typed_constant(ty, folded, value.untyped, loc),
            Ok(None) => Value::of(ty),
            Err(_) => {
                self.error(TypeError::Overflow {
                    value: format!("{}{constant}", op.as_str()),
                    target: ty,
                    loc,
                });
                Value::error()
            }
        }
    }

    fn address_of(&mut self, operand: &Expr, loc: Loc) -> Value {
        let value = self.check_expr(operand, None);
        if value.ty.is_error() {
            return Value::error();
        }
        if value.addressable || matches!(operand.kind, ExprKind::Composite { .. }) {
            return Value::of(self.reference_to(value.ty, loc));
        }
        self.error(TypeError::NotAddressable {
            expr: operand.to_string(),
            loc,
        });
        Value::error()
    }

    fn deref(&mut self, operand: &Expr, loc: Loc) -> Value {
        let value = self.check_expr(operand, None);
        match value.ty {
            Ty::Ptr(inner) | Ty::Ref(inner) => Value::place(*inner),
            Ty::UnsafePtr => {
                self.error(TypeError::InvalidUnsafePointer {
                    reason: "cannot dereference `*unsafe`; convert it to a typed pointer first",
                    loc,
                });
                Value::error()
            }
            Ty::Error => Value::error(),
            other => {
                self.error(TypeError::InvalidOperator {
                    op: "*",
                    lhs: other,
                    rhs: None,
                    loc,
                });
                Value::error()
            }
        }
    }

    /// Type of `lhs op rhs`, folded when both sides are constant.
    pub(crate) fn binary_result(&mut self, op: BinOp, lhs: &Value, rhs: &Value, loc: Loc) -> Value {
        if lhs.ty.is_error() || rhs.ty.is_error() {
            return Value::error();
        }
        let invalid = |c: &mut Self| {
            c.error(TypeError::InvalidOperator {
                op: op.as_str(),
                lhs: lhs.ty.clone(),
                rhs: Some(rhs.ty.clone()),
                loc,
            });
            Value::error()
        };
        let untyped = lhs.untyped && rhs.untyped;
        if matches!(op, BinOp::Div | BinOp::Rem)
            && rhs.ty.is_numeric()
            && rhs.constant.as_ref().is_some_and(ConstValue::is_zero)
        {
            self.error(TypeError::DivisionByZero { loc });
            return Value::error();
        }
        if op.is_logical() {
            if !lhs.ty.is_bool() || !rhs.ty.is_bool() {
                return invalid(self);
            }
            return self.fold(op, Ty::BOOL, lhs, rhs, untyped, loc);
        }
        if op.is_shift() {
            if !lhs.ty.is_integer() || !rhs.ty.is_integer() {
                return invalid(self);
            }
            return self.fold(op, lhs.ty.clone(), lhs, rhs, untyped, loc);
        }
        if op.is_comparison() {
            if matches!(lhs.ty, Ty::Nil) || matches!(rhs.ty, Ty::Nil) {
                let other = if matches!(lhs.ty, Ty::Nil) { &rhs.ty } else { &lhs.ty };
                let ok = matches!(op, BinOp::Eq | BinOp::Ne) && (other.is_nil_compatible() || matches!(other, Ty::Nil));
                return if ok { Value::of(Ty::BOOL) } else { invalid(self) };
            }
            let Some(common) = self.common_type(lhs, rhs, loc) else {
                return invalid(self);
            };
            if common.is_error() {
                return Value::error();
            }
            let comparable = !matches!(common, Ty::Slice(_) | Ty::Map(..) | Ty::Func(_) | Ty::Void);
            let ordered = common.is_numeric() || common.is_str();
            if !comparable || (!matches!(op, BinOp::Eq | BinOp::Ne) && !ordered) {
                return invalid(self);
            }
            return self.fold(op, Ty::BOOL, lhs, rhs, untyped, loc);
        }
        let Some(common) = self.common_type(lhs, rhs, loc) else {
            return invalid(self);
        };
        if common.is_error() {
            return Value::error();
        }
        let ok = match op {
            BinOp::Add => common.is_numeric() || common.is_str(),
            BinOp::Sub | BinOp::Mul | BinOp::Div => common.is_numeric(),
            _ => common.is_integer(),
        };
        if !ok {
            return invalid(self);
        }
        self.fold(op, common, lhs, rhs, untyped, loc)
    }

    /// The type both operands convert to. An untyped constant takes the
    /// other side's type; two untyped numbers take the wider kind.
    fn common_type(&mut self, lhs: &Value, rhs: &Value, loc: Loc) -> Option<Ty> {
        match (lhs.untyped, rhs.untyped) {
            (true, true) if lhs.ty.is_numeric() && rhs.ty.is_numeric() => Some(if lhs.ty.is_float() || rhs.ty.is_float() {
                Ty::F64
            } else if lhs.ty == RUNE || rhs.ty == RUNE {
                RUNE
            } else {
                Ty::INT
            }),
            (true, false) => self.convert_untyped(lhs, &rhs.ty, loc),
            (false, true) => self.convert_untyped(rhs, &lhs.ty, loc),
            _ => (lhs.ty == rhs.ty).then(|| lhs.ty.clone()),
        }
    }

    fn convert_untyped(&mut self, value: &Value, target: &Ty, loc: Loc) -> Option<Ty> {
        match self.assignability(target, value) {
            Assignability::Ok => Some(target.clone()),
            Assignability::Overflow => {
                self.error(TypeError::Overflow {
                    value: value.constant.as_ref().map_or_else(String::new, |c| c.to_string()),
                    target: target.clone(),
                    loc,
                });
                Some(Ty::Error)
            }
            Assignability::Incompatible => None,
        }
    }

    fn fold(&mut self, op: BinOp, ty: Ty, lhs: &Value, rhs: &Value, untyped: bool, loc: Loc) -> Value {
        let (Some(a), Some(b)) = (&lhs.constant, &rhs.constant) else {
            return Value::of(ty);
        };
        match fold_binary(op, a, b) {
            Ok(Some(folded)) => {
                let folded = convert_const(folded, &ty);
                self.typed_constant(ty, folded, untyped, loc)
            }
            Ok(None) => Value::of(ty),
            Err(FoldError::DivisionByZero) => {
                self.error(TypeError::DivisionByZero { loc });
                Value::error()
            }
            Err(FoldError::Overflow) => {
                self.error(TypeError::Overflow {
                    value: format!("{a} {op} {b}"),
                    target: ty,
                    loc,
                });
                Value::error()
            }
        }
    }

    /// A folded constant. Typed results must fit their type.
    fn typed_constant(&mut self, ty: Ty, constant: ConstValue, untyped: bool, loc: Loc) -> Value {
        if let (false, Some(prim), ConstValue::Int(_) | ConstValue::Float(_)) = (untyped, ty.prim(), &constant) {
            if prim.is_numeric() && !fits(&constant, prim) {
                self.error(TypeError::Overflow {
                    value: constant.to_string(),
                    target: ty,
                    loc,
                });
                return Value::error();
            }
        }
        Value {
            ty,
            constant: Some(constant),
            untyped,
            addressable: false,
        }
    }

    // ── Conversions ───────────────────────────────────────────────────

    fn cast(&mut self, node: &TypeNode, inner: &Expr, loc: Loc) -> Value {
        // `(f)(x)` where `f` is a value is a call.
        if let Some(name) = node.as_plain_name() {
            let is_value = self.body.scopes.peek(name).is_some()
                || (!self.ctx.bindings.contains_key(name)
                    && matches!(self.lookup_def(name), Some(DefId::Fn(_) | DefId::Global(_))));
            if is_value {
                let callee = Expr::new(ExprKind::Ident(name.to_string()), node.loc);
                let args = match &inner.kind {
                    ExprKind::Tuple(elems) => elems.clone(),
                    _ => vec![inner.clone()],
                };
                return self.check_call(&callee, &args, loc);
            }
        }
        let target = self.resolve_type(node);
        let value = self.check_expr(inner, Some(&target));
        if target.is_error() || value.ty.is_error() {
            return Value::of(target);
        }
        if !self.castable(&target, &value, loc) {
            self.error(TypeError::InvalidCast {
                from: value.ty,
                to: target.clone(),
                loc,
            });
            return Value::of(target);
        }
        let Some(constant) = value.constant else {
            return Value::of(target);
        };
        let converted = match (constant, target.prim()) {
            (ConstValue::Int(v), Some(p)) if p.is_float() => ConstValue::Float(v as f64),
            (ConstValue::Float(v), Some(p)) if p.is_integer() => ConstValue::Int(v.trunc() as i128),
            (ConstValue::Int(v), _) if matches!(target, Ty::Enum(..)) => ConstValue::Int(v),
            (c @ (ConstValue::Int(_) | ConstValue::Float(_)), Some(p)) if p.is_numeric() => c,
            (c @ ConstValue::Str(_), Some(PrimType::Str)) | (c @ ConstValue::Bool(_), Some(PrimType::Bool)) => c,
            _ => return Value::of(target),
        };
        self.typed_constant(target, converted, false, loc)
    }

    fn castable(&mut self, target: &Ty, value: &Value, loc: Loc) -> bool {
        let from = &value.ty;
        if let (Ty::Ptr(_), Ty::UnsafePtr) = (target, from) {
            if !self.in_unsafe() {
                self.error(TypeError::InvalidUnsafePointer {
                    reason: "conversion from `*unsafe` requires an unsafe context",
                    loc,
                });
            }
            return true;
        }
        if self.assignability(target, value) == Assignability::Ok {
            return true;
        }
        let byte_or_rune = |t: &Ty| matches!(t, Ty::Prim(PrimType::U8 | PrimType::I32));
        match (target, from) {
            (t, f) if t.is_numeric() && f.is_numeric() => true,
            (Ty::Enum(..), f) if f.is_integer() => true,
            (t, Ty::Enum(..)) if t.is_integer() => true,
            (Ty::Prim(PrimType::Str), Ty::Slice(e)) | (Ty::Slice(e), Ty::Prim(PrimType::Str)) => byte_or_rune(e),
            (Ty::UnsafePtr, Ty::Ptr(_) | Ty::Ref(_)) => true,
            (Ty::Prim(PrimType::Uintptr), Ty::Ptr(_) | Ty::UnsafePtr | Ty::Ref(_)) => true,
            (Ty::Ptr(_) | Ty::UnsafePtr, Ty::Prim(PrimType::Uintptr)) => true,
            _ => false,
        }
    }

    // ── Literals ──────────────────────────────────────────────────────

    fn composite(&mut self, node: &TypeNode, entries: &[Entry], loc: Loc) -> Value {
        let ty = match &node.kind {
            TypeKind::Array {
                size: ArraySize::Auto,
                elem,
            } => {
                let elem = self.resolve_type(elem);
                Ty::Array(entries.len() as u64, Box::new(elem))
            }
            _ => self.resolve_type(node),
        };
        match &ty {
            Ty::Struct(sref) => self.struct_literal(sref, entries, loc),
            Ty::Slice(elem) => self.positional_entries(&ty, elem, entries),
            Ty::Array(len, elem) => {
                if entries.len() as u64 > *len {
                    self.error(TypeError::ValueCount {
                        expected: *len as usize,
                        found: entries.len(),
                        loc,
                    });
                }
                self.positional_entries(&ty, elem, entries);
            }
            Ty::Map(key, value) => {
                for entry in entries {
                    match &entry.key {
                        Some(k) => {
                            let checked = self.check_expr(k, Some(key));
                            self.expect_assignable(key, &checked, k.loc);
                        }
                        None => self.error(TypeError::InvalidComposite {
                            ty: ty.clone(),
                            loc: entry.value.loc,
                        }),
                    }
                    let checked = self.check_expr(&entry.value, Some(value));
                    self.expect_assignable(value, &checked, entry.value.loc);
                }
            }
            Ty::Error => self.unchecked_entries(entries),
            other => {
                self.error(TypeError::InvalidComposite {
                    ty: other.clone(),
                    loc: node.loc,
                });
                self.unchecked_entries(entries);
            }
        }
        Value::of(ty)
    }

    fn positional_entries(&mut self, ty: &Ty, elem: &Ty, entries: &[Entry]) {
        for entry in entries {
            if let Some(key) = &entry.key {
                self.error(TypeError::InvalidComposite {
                    ty: ty.clone(),
                    loc: key.loc,
                });
            }
            let checked = self.check_expr(&entry.value, Some(elem));
            self.expect_assignable(elem, &checked, entry.value.loc);
        }
    }

    fn unchecked_entries(&mut self, entries: &[Entry]) {
        for entry in entries {
            if let Some(key) = &entry.key {
                self.check_expr(key, None);
            }
            self.check_expr(&entry.value, None);
        }
    }

    /// `S{a: 1, b: 2}` or positional `S{1, 2}`.
    fn struct_literal(&mut self, sref: &StructRef, entries: &[Entry], loc: Loc) {
        let fields = self.struct_fields(sref);
        let pkg = self.defs.strukt(sref.id).origin.pkg;
        let outside = pkg != self.ctx.pkg;
        let keyed = entries.iter().filter(|e| e.key.is_some()).count();
        if keyed > 0 && keyed < entries.len() {
            self.error(TypeError::InvalidComposite {
                ty: Ty::Struct(sref.clone()),
                loc,
            });
            return self.unchecked_entries(entries);
        }
        if keyed == 0 && !entries.is_empty() && entries.len() != fields.len() {
            self.error(TypeError::ValueCount {
                expected: fields.len(),
                found: entries.len(),
                loc,
            });
            return self.unchecked_entries(entries);
        }
        let mut seen: FxHashMap<&str, Loc> = FxHashMap::default();
        for (i, entry) in entries.iter().enumerate() {
            let field = match &entry.key {
                None => fields.get(i),
                Some(key) => {
                    let Some(name) = key.as_ident() else {
                        self.error(TypeError::InvalidComposite {
                            ty: Ty::Struct(sref.clone()),
                            loc: key.loc,
                        });
                        self.check_expr(&entry.value, None);
                        continue;
                    };
                    if let Some(previous) = seen.insert(name, key.loc) {
                        self.error(TypeError::DuplicateIdent {
                            name: name.to_string(),
                            loc: key.loc,
                            previous,
                        });
                    }
                    let found = fields.iter().find(|f| f.name == name);
                    if found.is_none() {
                        self.error(TypeError::NoField {
                            ty: Ty::Struct(sref.clone()),
                            name: name.to_string(),
                            loc: key.loc,
                        });
                    }
                    found
                }
            };
            let Some(field) = field else {
                self.check_expr(&entry.value, None);
                continue;
            };
            if outside && !field.public {
                self.error(TypeError::Private {
                    name: field.name.clone(),
                    package: self.packages[pkg.0 as usize].path.clone(),
                    loc: entry.key.as_ref().map_or(entry.value.loc, |k| k.loc),
                });
            }
            let checked = self.check_expr(&entry.value, Some(&field.ty));
            self.expect_assignable(&field.ty, &checked, entry.value.loc);
        }
    }

    fn slice_lit(&mut self, elems: &[Expr], expected: Option<&Ty>, loc: Loc) -> Value {
        match expected {
            Some(ty @ Ty::Slice(elem)) => {
                self.typed_elems(elem, elems);
                return Value::of(ty.clone());
            }
            Some(ty @ Ty::Array(len, elem)) => {
                if elems.len() as u64 > *len {
                    self.error(TypeError::ValueCount {
                        expected: *len as usize,
                        found: elems.len(),
                        loc,
                    });
                }
                self.typed_elems(elem, elems);
                return Value::of(ty.clone());
            }
            _ => {}
        }
        let Some((first, rest)) = elems.split_first() else {
            self.error(TypeError::EmptySliceLiteral { loc });
            return Value::error();
        };
        let value = self.check_expr(first, None);
        let elem = self.default_type(&value, first.loc);
        self.typed_elems(&elem, rest);
        Value::of(Ty::Slice(Box::new(elem)))
    }

    fn typed_elems(&mut self, elem: &Ty, elems: &[Expr]) {
        for e in elems {
            let value = self.check_expr(e, Some(elem));
            self.expect_assignable(elem, &value, e.loc);
        }
    }

    fn tuple(&mut self, elems: &[Expr], expected: Option<&Ty>) -> Value {
        let wanted = match expected {
            Some(Ty::Tuple(tys)) if tys.len() == elems.len() => Some(tys.clone()),
            _ => None,
        };
        let mut tys = Vec::with_capacity(elems.len());
        for (i, e) in elems.iter().enumerate() {
            let want = wanted.as_ref().map(|w| &w[i]);
            let value = self.check_expr(e, want);
            let ty = match want {
                Some(t) if self.assignability(t, &value) == Assignability::Ok => t.clone(),
                _ => self.default_type(&value, e.loc),
            };
            tys.push(ty);
        }
        Value::of(Ty::Tuple(tys))
    }

    /// An anonymous function. Its body sees the enclosing locals but not
    /// the enclosing loops, labels or result.
    fn func_lit(&mut self, decl: &FnDecl) -> Value {
        if !decl.generics.is_empty() {
            self.error(TypeError::GenericsNotAllowed {
                name: "anonymous function".into(),
                loc: decl.loc,
            });
        }
        let sig = self.sig_of(decl);
        if let Some(body) = &decl.body {
            let ret = self.body.ret.take();
            let loops = std::mem::take(&mut self.body.loops);
            let labels = std::mem::take(&mut self.body.labels);
            let unsafe_depth = std::mem::replace(&mut self.body.unsafe_depth, 0);
            self.check_function_body("anonymous function", decl, &sig, body);
            self.body.ret = ret;
            self.body.loops = loops;
            self.body.labels = labels;
            self.body.unsafe_depth = unsafe_depth;
        }
        Value::of(Ty::Func(Box::new(sig)))
    }
}

fn path_string(segments: &[Ident]) -> String {
    segments.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join("::")
}
