//! Calls: functions, methods, constructors, builtins and function values.
//!
//! The callee is resolved first, without checking the arguments, so that a
//! generic function can infer its parameters from them. Arguments are
//! checked exactly once, either during inference or against the final
//! signature.

use tern_common::span::Loc;
use tern_parser::ast::{Expr, ExprKind, Ident, TypeNode};

use super::generics::{is_spread, param_at, spread_inner};
use super::{placeholders, Checker, Value};
use crate::builtins::Builtin;
use crate::consts::ConstValue;
use crate::defs::DefId;
use crate::error::TypeError;
use crate::ty::{FnId, FnSig, PrimType, StructId, StructRef, Ty};

/// What a call expression invokes.
enum Callee {
    Fn {
        id: FnId,
        /// Generic arguments of the owner struct, from the receiver.
        owner_args: Vec<Ty>,
        explicit: Option<Vec<Ty>>,
        name: String,
    },
    Ctor {
        id: StructId,
        explicit: Option<Vec<Ty>>,
        name: String,
    },
    Builtin(Builtin),
    Value(FnSig, String),
    /// Already reported, or not checked at all.
    Unchecked,
}

impl<'a> Checker<'a> {
    pub(crate) fn check_call(&mut self, callee: &Expr, args: &[Expr], loc: Loc) -> Value {
        match self.resolve_callee(callee) {
            Callee::Fn {
                id,
                owner_args,
                explicit,
                name,
            } => self.call_fn(id, owner_args, explicit, args, &name, loc),
            Callee::Ctor { id, explicit, name } => self.construct(id, explicit, args, &name, loc),
            Callee::Builtin(builtin) => self.builtin_call(builtin, args, loc),
            Callee::Value(sig, name) => {
                self.check_args(&name, &sig, args, None, loc);
                Value::of(sig.ret)
            }
            Callee::Unchecked => {
                self.check_unchecked_args(args);
                Value::error()
            }
        }
    }

    fn resolve_callee(&mut self, callee: &Expr) -> Callee {
        match &callee.kind {
            ExprKind::Ident(name) if self.body.scopes.peek(name).is_none() => {
                if let Some(def) = self.lookup_def(name) {
                    return self.def_callee(def, None, name, callee.loc);
                }
                if let Some(builtin) = Builtin::from_name(name) {
                    return Callee::Builtin(builtin);
                }
            }
            ExprKind::Path(segments) => {
                if let [ns, name] = segments.as_slice() {
                    if self.is_namespace(&ns.name) {
                        return match self.resolve_qualified(ns, name) {
                            Some(def) => {
                                let shown = format!("{}::{}", ns.name, name.name);
                                self.def_callee(def, None, &shown, name.loc)
                            }
                            None => Callee::Unchecked,
                        };
                    }
                }
            }
            ExprKind::Selector { base, name } => return self.selector_callee(base, name, callee.loc),
            ExprKind::Index {
                base,
                args,
                generics: Some(generics),
            } => {
                if let Some(resolved) = self.generic_callee(base, args, generics, callee.loc) {
                    return resolved;
                }
            }
            _ => {}
        }
        let value = self.check_expr(callee, None);
        self.value_callee(value, &callee.to_string(), callee.loc)
    }

    /// A struct named by `expr`, unless a local shadows it.
    fn struct_ident(&self, expr: &Expr) -> Option<StructId> {
        let name = expr.as_ident()?;
        if self.body.scopes.peek(name).is_some() {
            return None;
        }
        match self.lookup_def(name)? {
            DefId::Struct(id) => Some(id),
            _ => None,
        }
    }

    fn selector_callee(&mut self, base: &Expr, name: &Ident, loc: Loc) -> Callee {
        if let Some(id) = self.struct_ident(base) {
            return match self.static_method(id, name, loc) {
                Some(fid) => self.method_callee(fid, Vec::new(), None),
                None => Callee::Unchecked,
            };
        }
        if let Some(ns) = base.as_ident().filter(|n| self.is_namespace(n)) {
            let ns = Ident::new(ns, base.loc);
            return match self.resolve_qualified(&ns, name) {
                Some(def) => {
                    let shown = format!("{}::{}", ns.name, name.name);
                    self.def_callee(def, None, &shown, name.loc)
                }
                None => Callee::Unchecked,
            };
        }
        let value = self.check_expr(base, None);
        if let Some((fid, sref)) = self.find_method(&value.ty, &name.name) {
            self.check_receiver(fid, base, &value);
            return self.method_callee(fid, sref.generics, None);
        }
        let member = self.member(base, &value, name, loc);
        self.record(loc, &member.ty);
        self.value_callee(member, &format!("{base}.{}", name.name), loc)
    }

    /// `f[T](..)`, `S[T](..)` or `v.m[T](..)`. `None` when the brackets
    /// are an index after all.
    fn generic_callee(&mut self, base: &Expr, args: &[Expr], generics: &[TypeNode], loc: Loc) -> Option<Callee> {
        if let Some((def, name)) = self.generic_def(base) {
            let explicit = self.resolve_types(generics);
            return Some(self.def_callee(def, Some(explicit), &name, loc));
        }
        let ExprKind::Selector { base: recv, name } = &base.kind else {
            return None;
        };
        if let Some(id) = self.struct_ident(recv) {
            let explicit = self.resolve_types(generics);
            return Some(match self.static_method(id, name, loc) {
                Some(fid) => self.method_callee(fid, Vec::new(), Some(explicit)),
                None => Callee::Unchecked,
            });
        }
        if recv.as_ident().is_some_and(|n| self.is_namespace(n)) {
            return None;
        }
        let value = self.check_expr(recv, None);
        if let Some((fid, sref)) = self.find_method(&value.ty, &name.name) {
            self.check_receiver(fid, recv, &value);
            let explicit = self.resolve_types(generics);
            return Some(self.method_callee(fid, sref.generics, Some(explicit)));
        }
        let member = self.member(recv, &value, name, base.loc);
        let indexed = self.index_on(&member, args, base.loc);
        Some(self.value_callee(indexed, &base.to_string(), loc))
    }

    fn resolve_types(&mut self, nodes: &[TypeNode]) -> Vec<Ty> {
        nodes.iter().map(|n| self.resolve_type(n)).collect()
    }

    fn method_callee(&self, id: FnId, owner_args: Vec<Ty>, explicit: Option<Vec<Ty>>) -> Callee {
        Callee::Fn {
            id,
            owner_args,
            explicit,
            name: self.describe_fn(id),
        }
    }

    /// A method of the struct behind `ty`. Fields shadow methods.
    fn find_method(&mut self, ty: &Ty, name: &str) -> Option<(FnId, StructRef)> {
        let sref = ty.struct_ref()?.clone();
        let fid = self.defs.strukt(sref.id).methods.get(name).copied()?;
        if self.struct_fields(&sref).iter().any(|f| f.name == name) {
            return None;
        }
        Some((fid, sref))
    }

    fn def_callee(&mut self, def: DefId, explicit: Option<Vec<Ty>>, name: &str, loc: Loc) -> Callee {
        match def {
            DefId::Fn(id) => Callee::Fn {
                id,
                owner_args: Vec::new(),
                explicit,
                name: self.describe_fn(id),
            },
            DefId::Struct(id) => Callee::Ctor {
                id,
                explicit,
                name: name.to_string(),
            },
            DefId::Alias(id) => {
                if explicit.is_some() {
                    self.error(TypeError::GenericsNotAllowed {
                        name: name.to_string(),
                        loc,
                    });
                }
                match self.alias_type(id) {
                    Ty::Struct(sref) => Callee::Ctor {
                        id: sref.id,
                        explicit: Some(sref.generics),
                        name: name.to_string(),
                    },
                    Ty::Error | Ty::Foreign(_) => Callee::Unchecked,
                    _ => {
                        self.error(TypeError::NotAValue {
                            name: name.to_string(),
                            loc,
                        });
                        Callee::Unchecked
                    }
                }
            }
            DefId::Global(_) => {
                if explicit.is_some() {
                    self.error(TypeError::GenericsNotAllowed {
                        name: name.to_string(),
                        loc,
                    });
                }
                let value = self.def_value(def, name, loc);
                self.record(loc, &value.ty);
                self.value_callee(value, name, loc)
            }
            DefId::Enum(_) | DefId::Trait(_) => {
                self.error(TypeError::NotAValue {
                    name: name.to_string(),
                    loc,
                });
                Callee::Unchecked
            }
        }
    }

    fn value_callee(&mut self, value: Value, what: &str, loc: Loc) -> Callee {
        match value.ty {
            Ty::Func(sig) => Callee::Value(*sig, what.to_string()),
            Ty::Error | Ty::Foreign(_) => Callee::Unchecked,
            ty => {
                self.error(TypeError::NotCallable { ty, loc });
                Callee::Unchecked
            }
        }
    }

    fn call_fn(
        &mut self,
        id: FnId,
        owner_args: Vec<Ty>,
        explicit: Option<Vec<Ty>>,
        args: &[Expr],
        name: &str,
        loc: Loc,
    ) -> Value {
        let own = self.defs.func(id).decl.generics.len();
        let (full, values) = match explicit {
            Some(explicit) => {
                if !self.generic_count(name, own, explicit.len(), loc) {
                    self.check_unchecked_args(args);
                    return Value::error();
                }
                (concat(owner_args, explicit), None)
            }
            None if own == 0 => (owner_args, None),
            None => {
                let (names, template_args) = self.template_args(id, &owner_args);
                let template = self.unmarked(|c| c.fn_sig(id, &template_args));
                match self.infer_from_params(&names, &template, args, name, loc) {
                    Some((bound, values)) => (concat(owner_args, bound), Some(values)),
                    None => return Value::error(),
                }
            }
        };
        if !full.iter().any(Ty::has_generics) {
            self.instantiate(id, &full);
            self.mark(DefId::Fn(id));
        }
        let sig = self.fn_sig(id, &full);
        self.check_args(name, &sig, args, values, loc);
        Value::of(sig.ret)
    }

    /// `S(a, b)`: one argument per field, in declaration order.
    fn construct(&mut self, id: StructId, explicit: Option<Vec<Ty>>, args: &[Expr], name: &str, loc: Loc) -> Value {
        let def = self.defs.strukt(id);
        let names = def.generic_names();
        let display = def.display.clone();
        let field_count = def.decl.fields.len();
        if args.len() != field_count {
            self.error(TypeError::ArgumentCount {
                callee: name.to_string(),
                expected: field_count,
                found: args.len(),
                variadic: false,
                loc,
            });
            self.check_unchecked_args(args);
            return Value::error();
        }
        let (generics, values) = match explicit {
            Some(explicit) => {
                if !self.generic_count(name, names.len(), explicit.len(), loc) {
                    self.check_unchecked_args(args);
                    return Value::error();
                }
                (explicit, None)
            }
            None if names.is_empty() => (Vec::new(), None),
            None => {
                let template_ref = StructRef {
                    id,
                    name: display,
                    generics: placeholders(&names),
                };
                let fields = self.unmarked(|c| c.struct_fields(&template_ref));
                let template = FnSig {
                    params: fields.into_iter().map(|f| f.ty).collect(),
                    variadic: false,
                    ret: Ty::Void,
                };
                match self.infer_from_params(&names, &template, args, name, loc) {
                    Some((bound, values)) => (bound, Some(values)),
                    None => return Value::error(),
                }
            }
        };
        let ty = self.struct_type(id, generics);
        let Some(sref) = ty.struct_ref().cloned() else {
            return Value::error();
        };
        let fields = self.struct_fields(&sref);
        let pkg = self.defs.strukt(id).origin.pkg;
        if pkg != self.ctx.pkg {
            if let Some(field) = fields.iter().find(|f| !f.public) {
                self.error(TypeError::Private {
                    name: field.name.clone(),
                    package: self.packages[pkg.0 as usize].path.clone(),
                    loc,
                });
            }
        }
        let sig = FnSig {
            params: fields.into_iter().map(|f| f.ty).collect(),
            variadic: false,
            ret: ty.clone(),
        };
        self.check_args(name, &sig, args, values, loc);
        Value::of(ty)
    }

    /// Check call arguments against `sig`. `values` holds the arguments'
    /// values when inference already checked them.
    pub(crate) fn check_args(&mut self, name: &str, sig: &FnSig, args: &[Expr], values: Option<Vec<Value>>, loc: Loc) {
        let n = sig.params.len();
        let found = args.len();
        let count_ok = if sig.variadic { found + 1 >= n } else { found == n };
        if !count_ok {
            self.error(TypeError::ArgumentCount {
                callee: name.to_string(),
                expected: if sig.variadic { n - 1 } else { n },
                found,
                variadic: sig.variadic,
                loc,
            });
            if values.is_none() {
                self.check_unchecked_args(args);
            }
            return;
        }
        for (i, arg) in args.iter().enumerate() {
            let spread = is_spread(arg);
            if spread && !(sig.variadic && i + 1 == n && i + 1 == found) {
                self.error(TypeError::SpreadNotAllowed { loc: arg.loc });
                if values.is_none() {
                    self.check_expr(spread_inner(arg), None);
                }
                continue;
            }
            let Some(param) = param_at(sig, i, spread) else {
                continue;
            };
            let value = match &values {
                Some(values) => values[i].clone(),
                None => self.check_expr(spread_inner(arg), Some(&param)),
            };
            self.expect_assignable(&param, &value, arg.loc);
        }
    }

    fn builtin_call(&mut self, builtin: Builtin, args: &[Expr], loc: Loc) -> Value {
        let arity = match builtin {
            Builtin::Print | Builtin::Println | Builtin::Append => None,
            Builtin::Panic | Builtin::Len => Some(1),
            Builtin::Delete => Some(2),
        };
        if let Some(expected) = arity.filter(|n| *n != args.len()) {
            self.error(TypeError::ArgumentCount {
                callee: builtin.name().to_string(),
                expected,
                found: args.len(),
                variadic: false,
                loc,
            });
            self.check_unchecked_args(args);
            return Value::error();
        }
        match builtin {
            Builtin::Print | Builtin::Println => {
                for arg in args {
                    let value = self.check_expr(arg, None);
                    self.default_type(&value, arg.loc);
                }
                Value::of(Ty::Void)
            }
            Builtin::Panic => {
                let value = self.check_expr(&args[0], Some(&Ty::STR));
                self.expect_assignable(&Ty::STR, &value, args[0].loc);
                Value::of(Ty::Void)
            }
            Builtin::Len => self.len_of(&args[0]),
            Builtin::Append => self.append(args, loc),
            Builtin::Delete => {
                let map = self.check_expr(&args[0], None);
                match map.ty {
                    Ty::Map(key, _) => {
                        let value = self.check_expr(&args[1], Some(&key));
                        self.expect_assignable(&key, &value, args[1].loc);
                    }
                    Ty::Error => {
                        self.check_expr(&args[1], None);
                    }
                    other => {
                        self.error(TypeError::InvalidOperator {
                            op: "delete",
                            lhs: other,
                            rhs: None,
                            loc: args[0].loc,
                        });
                        self.check_expr(&args[1], None);
                    }
                }
                Value::of(Ty::Void)
            }
        }
    }

    fn len_of(&mut self, arg: &Expr) -> Value {
        let value = self.check_expr(arg, None);
        let array_len = match &value.ty {
            Ty::Array(n, _) => Some(*n),
            Ty::Ptr(inner) | Ty::Ref(inner) => match inner.as_ref() {
                Ty::Array(n, _) => Some(*n),
                _ => None,
            },
            _ => None,
        };
        if let Some(n) = array_len {
            return Value {
                constant: Some(ConstValue::Int(i128::from(n))),
                ..Value::of(Ty::INT)
            };
        }
        match value.ty {
            Ty::Slice(_) | Ty::Map(..) | Ty::Prim(PrimType::Str) => Value::of(Ty::INT),
            Ty::Error => Value::error(),
            other => {
                self.error(TypeError::InvalidOperator {
                    op: "len",
                    lhs: other,
                    rhs: None,
                    loc: arg.loc,
                });
                Value::error()
            }
        }
    }

    /// `append(xs, a, b)` or `append(xs, ys...)`.
    fn append(&mut self, args: &[Expr], loc: Loc) -> Value {
        let Some((first, rest)) = args.split_first() else {
            self.error(TypeError::ArgumentCount {
                callee: "append".into(),
                expected: 1,
                found: 0,
                variadic: true,
                loc,
            });
            return Value::error();
        };
        let slice = self.check_expr(first, None);
        let elem = match &slice.ty {
            Ty::Slice(elem) => (**elem).clone(),
            Ty::Error => {
                self.check_unchecked_args(rest);
                return Value::error();
            }
            other => {
                self.error(TypeError::InvalidOperator {
                    op: "append",
                    lhs: other.clone(),
                    rhs: None,
                    loc: first.loc,
                });
                self.check_unchecked_args(rest);
                return Value::error();
            }
        };
        for (i, arg) in rest.iter().enumerate() {
            if let ExprKind::Spread(inner) = &arg.kind {
                let value = self.check_expr(inner, Some(&slice.ty));
                if i + 1 == rest.len() {
                    self.expect_assignable(&slice.ty, &value, inner.loc);
                } else {
                    self.error(TypeError::SpreadNotAllowed { loc: arg.loc });
                }
                continue;
            }
            let value = self.check_expr(arg, Some(&elem));
            self.expect_assignable(&elem, &value, arg.loc);
        }
        Value::of(slice.ty)
    }
}

fn concat(mut head: Vec<Ty>, tail: Vec<Ty>) -> Vec<Ty> {
    head.extend(tail);
    head
}
