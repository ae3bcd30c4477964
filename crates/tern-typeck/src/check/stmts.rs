//! Statement checking.

use tern_common::span::Loc;
use tern_parser::ast::{
    Assign, AssignOp, Block, Expr, ExprKind, Ident, LoopKind, LoopStmt, MatchStmt, Stmt, StmtKind, VarDecl,
};

use super::{Checker, Value, RUNE};
use crate::consts::ConstValue;
use crate::defs::{DefId, GlobalValue};
use crate::error::TypeError;
use crate::scope::Local;
use crate::ty::{PrimType, Ty};

impl<'a> Checker<'a> {
    pub(crate) fn check_stmts(&mut self, stmts: &[Stmt]) {
        self.check_stmts_with(stmts, None);
    }

    /// `fall_at` is the index of the one statement allowed to be `fall`.
    fn check_stmts_with(&mut self, stmts: &[Stmt], fall_at: Option<usize>) {
        let mut label: Option<String> = None;
        for (i, stmt) in stmts.iter().enumerate() {
            match &stmt.kind {
                StmtKind::Comment(_) => continue,
                StmtKind::Label(name) => {
                    label = Some(name.name.clone());
                    continue;
                }
                StmtKind::Loop(l) => self.check_loop(l, label.take()),
                StmtKind::Fall if fall_at == Some(i) => {}
                _ => self.check_stmt(stmt),
            }
            label = None;
        }
    }

    pub(crate) fn check_block(&mut self, block: &Block) {
        self.scoped(|c| c.check_stmts(&block.stmts));
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Var(decl) => self.check_local_var(decl),
            StmtKind::Assign(assign) => self.check_assign(assign, stmt.loc),
            StmtKind::Expr(expr) => {
                self.check_expr(expr, None);
            }
            StmtKind::Ret(expr) => self.check_ret(expr.as_ref(), stmt.loc),
            StmtKind::Break(label) => self.check_jump("break", label.as_ref(), stmt.loc),
            StmtKind::Continue(label) => self.check_jump("continue", label.as_ref(), stmt.loc),
            StmtKind::If(s) => {
                for (cond, block) in &s.branches {
                    let value = self.check_expr(cond, Some(&Ty::BOOL));
                    self.expect_bool(&value, cond.loc);
                    self.check_block(block);
                }
                if let Some(block) = &s.else_block {
                    self.check_block(block);
                }
            }
            StmtKind::Match(m) => self.check_match(m),
            StmtKind::Loop(l) => self.check_loop(l, None),
            StmtKind::Label(_) | StmtKind::Comment(_) => {}
            StmtKind::Goto(label) => {
                if !self.body.labels.contains(&label.name) {
                    self.error(TypeError::LabelNotFound {
                        name: label.name.clone(),
                        loc: label.loc,
                    });
                }
            }
            StmtKind::Fall => self.error(TypeError::InvalidFall { loc: stmt.loc }),
            StmtKind::Defer(inner) => self.check_stmt(inner),
            StmtKind::Co(expr) => {
                self.check_expr(expr, None);
            }
            StmtKind::Block { block, unsafe_ } => {
                if *unsafe_ {
                    self.body.unsafe_depth += 1;
                }
                self.check_block(block);
                if *unsafe_ {
                    self.body.unsafe_depth -= 1;
                }
            }
        }
    }

    fn check_local_var(&mut self, decl: &VarDecl) {
        let values = self.var_values(decl);
        for (name, value) in decl.names.iter().zip(values) {
            self.record(name.loc, &value.ty);
            self.declare_local(
                name,
                Local {
                    constant: value.constant,
                    untyped: value.untyped,
                    is_const: decl.constant,
                    ..Local::var(value.ty, name.loc)
                },
            );
        }
    }

    /// Types and constant values of the names a declaration introduces.
    /// Shared by locals and globals.
    pub(crate) fn var_values(&mut self, decl: &VarDecl) -> Vec<GlobalValue> {
        let declared = decl.ty.as_ref().map(|t| self.resolve_type(t));
        let n = decl.names.len();
        let failed = || {
            vec![
                GlobalValue {
                    ty: Ty::Error,
                    constant: None,
                    untyped: false,
                };
                n
            ]
        };
        let Some(init) = &decl.init else {
            if decl.constant {
                self.error(TypeError::NotConstant {
                    what: format!("value of `{}`", decl.names[0].name),
                    loc: decl.loc,
                });
            }
            let ty = declared.unwrap_or(Ty::Error);
            return vec![
                GlobalValue {
                    ty,
                    constant: None,
                    untyped: false,
                };
                n
            ];
        };
        if n == 1 {
            let value = self.check_expr(init, declared.as_ref());
            return vec![self.bind_value(declared.as_ref(), value, init.loc, decl.constant)];
        }
        if let ExprKind::Tuple(elems) = &init.kind {
            if elems.len() != n {
                self.error(TypeError::ValueCount {
                    expected: n,
                    found: elems.len(),
                    loc: init.loc,
                });
                self.check_unchecked_args(elems);
                return failed();
            }
            return elems
                .iter()
                .map(|e| {
                    let value = self.check_expr(e, declared.as_ref());
                    self.bind_value(declared.as_ref(), value, e.loc, decl.constant)
                })
                .collect();
        }
        let value = self.check_expr(init, None);
        let types = match &value.ty {
            Ty::Error => return failed(),
            ty => ty.values(),
        };
        if types.len() != n {
            self.error(TypeError::ValueCount {
                expected: n,
                found: types.len(),
                loc: init.loc,
            });
            return failed();
        }
        types
            .into_iter()
            .map(|ty| self.bind_value(declared.as_ref(), Value::of(ty), init.loc, decl.constant))
            .collect()
    }

    fn bind_value(&mut self, declared: Option<&Ty>, value: Value, loc: Loc, constant: bool) -> GlobalValue {
        if constant && value.constant.is_none() && !value.ty.is_error() {
            self.error(TypeError::NotConstant {
                what: "value of a `const`".into(),
                loc,
            });
        }
        let kept = if constant { value.constant.clone() } else { None };
        match declared {
            Some(ty) => {
                self.expect_assignable(ty, &value, loc);
                GlobalValue {
                    ty: ty.clone(),
                    constant: kept.map(|c| convert_const(c, ty)),
                    untyped: false,
                }
            }
            None => GlobalValue {
                ty: self.default_type(&value, loc),
                untyped: constant && value.untyped,
                constant: kept,
            },
        }
    }

    // ── Assignment ────────────────────────────────────────────────────

    fn check_assign(&mut self, assign: &Assign, loc: Loc) {
        match assign.op {
            AssignOp::Inc | AssignOp::Dec => {
                let Some(target) = assign.targets.first() else {
                    return;
                };
                let place = self.check_place(target);
                if !place.ty.is_numeric() && !place.ty.is_error() {
                    self.error(TypeError::InvalidOperator {
                        op: if assign.op == AssignOp::Inc { "++" } else { "--" },
                        lhs: place.ty,
                        rhs: None,
                        loc: target.loc,
                    });
                }
            }
            AssignOp::Compound(op) => {
                let (Some(target), Some(value)) = (assign.targets.first(), assign.values.first()) else {
                    return;
                };
                let place = self.check_place(target);
                let rhs = self.check_expr(value, Some(&place.ty));
                let result = self.binary_result(op, &place, &rhs, loc);
                if !result.ty.is_error() && !place.ty.is_error() {
                    self.expect_assignable(&place.ty, &result, value.loc);
                }
            }
            AssignOp::Set => self.check_set(&assign.targets, &assign.values, loc),
        }
    }

    fn check_set(&mut self, targets: &[Expr], values: &[Expr], loc: Loc) {
        if targets.len() == values.len() {
            for (target, value) in targets.iter().zip(values) {
                let place = self.assign_target(target);
                let checked = self.check_expr(value, place.as_ref().map(|p| &p.ty));
                match place {
                    Some(place) => {
                        self.expect_assignable(&place.ty, &checked, value.loc);
                    }
                    None => {
                        self.default_type(&checked, value.loc);
                    }
                }
            }
            return;
        }
        if let [value] = values {
            let checked = self.check_expr(value, None);
            let types = match &checked.ty {
                Ty::Error => vec![Ty::Error; targets.len()],
                ty => ty.values(),
            };
            if types.len() == targets.len() {
                for (target, ty) in targets.iter().zip(types) {
                    if let Some(place) = self.assign_target(target) {
                        self.expect_assignable(&place.ty, &Value::of(ty), target.loc);
                    }
                }
                return;
            }
            self.error(TypeError::ValueCount {
                expected: targets.len(),
                found: types.len(),
                loc,
            });
            return;
        }
        self.error(TypeError::ValueCount {
            expected: targets.len(),
            found: values.len(),
            loc,
        });
        self.check_unchecked_args(values);
    }

    /// `None` for the blank target `_`.
    fn assign_target(&mut self, target: &Expr) -> Option<Value> {
        if target.as_ident() == Some("_") {
            return None;
        }
        Some(self.check_place(target))
    }

    /// An expression on the left of an assignment. Assigning does not count
    /// as reading a local.
    pub(crate) fn check_place(&mut self, expr: &Expr) -> Value {
        if let ExprKind::Ident(name) = &expr.kind {
            if let Some((is_const, ty)) = self.body.scopes.peek(name).map(|l| (l.is_const, l.ty.clone())) {
                if is_const {
                    self.error(TypeError::ConstantAssignment {
                        name: name.clone(),
                        loc: expr.loc,
                    });
                    return Value::error();
                }
                self.record(expr.loc, &ty);
                return Value::place(ty);
            }
            if let Some(DefId::Global(id)) = self.lookup_def(name) {
                if self.defs.globals[id.index()].decl.constant {
                    self.error(TypeError::ConstantAssignment {
                        name: name.clone(),
                        loc: expr.loc,
                    });
                    return Value::error();
                }
            }
        }
        let value = self.check_expr(expr, None);
        if !value.addressable && !value.ty.is_error() {
            self.error(TypeError::NotAssignable {
                expr: expr.to_string(),
                loc: expr.loc,
            });
            return Value::error();
        }
        value
    }

    // ── Control flow ──────────────────────────────────────────────────

    fn check_ret(&mut self, expr: Option<&Expr>, loc: Loc) {
        let expected = self.body.ret.clone().unwrap_or(Ty::Void);
        if expected.is_error() {
            if let Some(expr) = expr {
                self.check_expr(expr, None);
            }
            return;
        }
        let want = expected.values();
        let Some(expr) = expr else {
            if !want.is_empty() {
                self.error(TypeError::InvalidReturn {
                    expected: want.len(),
                    found: 0,
                    loc,
                });
            }
            return;
        };
        if let ExprKind::Tuple(elems) = &expr.kind {
            if elems.len() != want.len() {
                self.error(TypeError::InvalidReturn {
                    expected: want.len(),
                    found: elems.len(),
                    loc: expr.loc,
                });
                self.check_unchecked_args(elems);
                return;
            }
            for (elem, ty) in elems.iter().zip(&want) {
                let value = self.check_expr(elem, Some(ty));
                self.expect_assignable(ty, &value, elem.loc);
            }
            return;
        }
        if want.is_empty() {
            self.check_expr(expr, None);
            self.error(TypeError::InvalidReturn {
                expected: 0,
                found: 1,
                loc: expr.loc,
            });
            return;
        }
        let value = self.check_expr(expr, Some(&expected));
        if value.ty.is_error() {
            return;
        }
        let found = value.ty.values().len();
        if want.len() > 1 && found != want.len() {
            self.error(TypeError::InvalidReturn {
                expected: want.len(),
                found,
                loc: expr.loc,
            });
            return;
        }
        self.expect_assignable(&expected, &value, expr.loc);
    }

    fn check_jump(&mut self, keyword: &'static str, label: Option<&Ident>, loc: Loc) {
        if self.body.loops.is_empty() {
            self.error(TypeError::BreakOutsideLoop { keyword, loc });
            return;
        }
        if let Some(label) = label {
            if !self.body.loops.iter().any(|l| l.as_deref() == Some(label.name.as_str())) {
                self.error(TypeError::LabelNotFound {
                    name: label.name.clone(),
                    loc: label.loc,
                });
            }
        }
    }

    fn check_match(&mut self, m: &MatchStmt) {
        let subject = m.subject.as_ref().map(|s| {
            let value = self.check_expr(s, None);
            let ty = self.default_type(&value, s.loc);
            Value { ty, ..value }
        });
        let total = m.cases.len() + usize::from(m.default.is_some());
        for (i, case) in m.cases.iter().chain(&m.default).enumerate() {
            for expr in &case.values {
                match &subject {
                    Some(subject) => {
                        let value = self.check_expr(expr, Some(&subject.ty));
                        self.expect_assignable(&subject.ty, &value, expr.loc);
                    }
                    None => {
                        let value = self.check_expr(expr, Some(&Ty::BOOL));
                        self.expect_bool(&value, expr.loc);
                    }
                }
            }
            let fall_at = if i + 1 < total {
                case.body
                    .stmts
                    .iter()
                    .rposition(|s| !matches!(s.kind, StmtKind::Comment(_)))
            } else {
                None
            };
            self.scoped(|c| c.check_stmts_with(&case.body.stmts, fall_at));
        }
    }

    fn check_loop(&mut self, l: &LoopStmt, label: Option<String>) {
        self.body.loops.push(label);
        self.scoped(|c| {
            match &l.kind {
                LoopKind::Infinite => {}
                LoopKind::While(cond) => {
                    let value = c.check_expr(cond, Some(&Ty::BOOL));
                    c.expect_bool(&value, cond.loc);
                }
                LoopKind::Iter { key, value, expr } => {
                    let iterated = c.check_expr(expr, None);
                    let (key_ty, value_ty) = c.iteration_types(&iterated.ty, expr.loc);
                    for (name, ty) in [(key, key_ty), (value, value_ty)] {
                        if let Some(name) = name {
                            c.record(name.loc, &ty);
                            c.declare_local(name, Local::param(ty, name.loc));
                        }
                    }
                }
            }
            c.check_block(&l.body);
        });
        self.body.loops.pop();
    }

    /// Key and value types of `for k, v in e`.
    pub(crate) fn iteration_types(&mut self, ty: &Ty, loc: Loc) -> (Ty, Ty) {
        match ty {
            Ty::Slice(elem) | Ty::Array(_, elem) => (Ty::INT, (**elem).clone()),
            Ty::Ptr(inner) if matches!(inner.as_ref(), Ty::Array(..)) => self.iteration_types(inner, loc),
            Ty::Ref(inner) => self.iteration_types(inner, loc),
            Ty::Map(key, value) => ((**key).clone(), (**value).clone()),
            Ty::Prim(PrimType::Str) => (Ty::INT, RUNE),
            ty if ty.is_integer() => (ty.clone(), ty.clone()),
            Ty::Error => (Ty::Error, Ty::Error),
            other => {
                self.error(TypeError::NotIterable {
                    ty: other.clone(),
                    loc,
                });
                (Ty::Error, Ty::Error)
            }
        }
    }
}

/// A constant stored under a declared type takes that type's kind.
pub(crate) fn convert_const(value: ConstValue, ty: &Ty) -> ConstValue {
    match (value, ty) {
        (ConstValue::Int(v), ty) if ty.is_float() => ConstValue::Float(v as f64),
        (value, _) => value,
    }
}
