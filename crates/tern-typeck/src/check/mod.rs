//! The semantic pass.
//!
//! A [`Checker`] owns the definition tables of every package registered so
//! far, and walks declarations and function bodies in a [`Ctx`]: the
//! package and file names resolve in, plus the generic bindings of the
//! instantiation being checked. Switching to another declaration's context
//! goes through [`Checker::in_context`], which also gives the callee a fresh
//! [`Body`] and restores both on return.

mod calls;
mod collect;
mod exprs;
mod generics;
mod resolve;
mod stmts;

use rustc_hash::{FxHashMap, FxHashSet};
use tern_common::package_graph::PackageId;
use tern_common::span::{FileId, Loc, Span};
use tern_parser::ast::Ident;

use crate::assign::{assignable, Assignability, Source};
use crate::consts::ConstValue;
use crate::defs::{DefId, Defs, FileScope, Origin, PackageScope};
use crate::error::TypeError;
use crate::scope::{Local, ScopeStack};
use crate::ty::{PrimType, Ty};
use crate::{CheckOptions, GenericInstance};

/// Where names resolve.
#[derive(Debug, Clone)]
pub(crate) struct Ctx {
    pub pkg: PackageId,
    pub file: FileId,
    pub bindings: FxHashMap<String, Ty>,
    /// Type of `self` inside a method body.
    pub self_ty: Option<Ty>,
    pub unsafe_fn: bool,
}

impl Ctx {
    pub fn at(origin: Origin) -> Self {
        Self {
            pkg: origin.pkg,
            file: origin.file,
            bindings: FxHashMap::default(),
            self_ty: None,
            unsafe_fn: false,
        }
    }

    pub fn with_bindings(mut self, names: Vec<String>, args: &[Ty]) -> Self {
        self.bindings = names.into_iter().zip(args.iter().cloned()).collect();
        self
    }
}

/// Per-function state.
#[derive(Debug, Default)]
pub(crate) struct Body {
    pub scopes: ScopeStack,
    /// Declared result; `None` outside any function.
    pub ret: Option<Ty>,
    /// Enclosing loops, innermost last, with their labels.
    pub loops: Vec<Option<String>>,
    pub labels: FxHashSet<String>,
    pub unsafe_depth: usize,
}

/// A checked expression.
#[derive(Debug, Clone)]
pub(crate) struct Value {
    pub ty: Ty,
    pub constant: Option<ConstValue>,
    /// A literal-derived constant whose type is still flexible.
    pub untyped: bool,
    pub addressable: bool,
}

impl Value {
    pub fn of(ty: Ty) -> Self {
        Self {
            ty,
            constant: None,
            untyped: false,
            addressable: false,
        }
    }

    pub fn place(ty: Ty) -> Self {
        Self {
            addressable: true,
            ..Self::of(ty)
        }
    }

    pub fn error() -> Self {
        Self::of(Ty::Error)
    }

    pub fn untyped(ty: Ty, constant: ConstValue) -> Self {
        Self {
            ty,
            constant: Some(constant),
            untyped: true,
            addressable: false,
        }
    }

    pub fn source(&self) -> Source<'_> {
        Source {
            ty: &self.ty,
            untyped: if self.untyped { self.constant.as_ref() } else { None },
        }
    }
}

pub struct Checker<'a> {
    pub(crate) options: CheckOptions,
    pub(crate) defs: Defs<'a>,
    /// Indexed by `PackageId`.
    pub(crate) packages: Vec<PackageScope>,
    pub(crate) by_path: FxHashMap<String, PackageId>,
    pub(crate) files: FxHashMap<FileId, FileScope>,
    pub(crate) ctx: Ctx,
    pub(crate) body: Body,
    /// Used marks are only set while checking code that will be emitted.
    pub(crate) marking: bool,
    pub(crate) types: FxHashMap<(FileId, Span), Ty>,
    pub(crate) errors: Vec<TypeError>,
    pub(crate) instances: Vec<GenericInstance>,
}

impl<'a> Checker<'a> {
    pub fn new(options: CheckOptions) -> Self {
        Self {
            options,
            defs: Defs::default(),
            packages: Vec::new(),
            by_path: FxHashMap::default(),
            files: FxHashMap::default(),
            ctx: Ctx::at(Origin {
                pkg: PackageId(0),
                file: FileId::default(),
            }),
            body: Body::default(),
            marking: true,
            types: FxHashMap::default(),
            errors: Vec::new(),
            instances: Vec::new(),
        }
    }

    pub(crate) fn error(&mut self, err: TypeError) {
        self.errors.push(err);
    }

    pub(crate) fn record(&mut self, loc: Loc, ty: &Ty) {
        self.types.insert((loc.file, loc.span), ty.clone());
    }

    /// Run `f` in another declaration's context with a fresh body.
    pub(crate) fn in_context<R>(&mut self, ctx: Ctx, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved_ctx = std::mem::replace(&mut self.ctx, ctx);
        let saved_body = std::mem::take(&mut self.body);
        let result = f(self);
        self.ctx = saved_ctx;
        self.body = saved_body;
        result
    }

    /// Run `f` with used marks switched off.
    pub(crate) fn unmarked<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = std::mem::replace(&mut self.marking, false);
        let result = f(self);
        self.marking = saved;
        result
    }

    /// Run `f` inside a new block scope. Locals never read are reported
    /// when the scope closes.
    pub(crate) fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.body.scopes.push();
        let result = f(self);
        let unused = self.body.scopes.pop();
        if self.options.warn_unused_locals {
            for (name, loc) in unused {
                self.error(TypeError::UnusedLocal { name, loc });
            }
        }
        result
    }

    pub(crate) fn declare_local(&mut self, name: &Ident, local: Local) {
        if name.is_blank() {
            return;
        }
        if let Err(previous) = self.body.scopes.declare(&name.name, local) {
            self.error(TypeError::DuplicateIdent {
                name: name.name.clone(),
                loc: name.loc,
                previous,
            });
        }
    }

    pub(crate) fn in_unsafe(&self) -> bool {
        self.ctx.unsafe_fn || self.body.unsafe_depth > 0
    }

    // ── Name lookup ───────────────────────────────────────────────────

    /// An unqualified top-level name: the current package first, then
    /// names imported by selection, then glob imports.
    pub(crate) fn lookup_def(&self, name: &str) -> Option<DefId> {
        if let Some(def) = self.packages[self.ctx.pkg.0 as usize].names.get(name) {
            return Some(*def);
        }
        let file = self.files.get(&self.ctx.file)?;
        if let Some((_, def)) = file.selected.get(name) {
            return Some(*def);
        }
        file.globs.iter().find_map(|pkg| {
            self.packages[pkg.0 as usize]
                .names
                .get(name)
                .copied()
                .filter(|def| self.defs.is_public(*def))
        })
    }

    pub(crate) fn namespace(&self, name: &str) -> Option<PackageId> {
        self.files.get(&self.ctx.file)?.namespaces.get(name).copied()
    }

    /// `ns::name`, reporting a missing namespace, a missing member or a
    /// private member.
    pub(crate) fn resolve_qualified(&mut self, ns: &Ident, name: &Ident) -> Option<DefId> {
        let Some(pkg) = self.namespace(&ns.name) else {
            self.error(TypeError::NotFound {
                name: ns.name.clone(),
                loc: ns.loc,
            });
            return None;
        };
        let scope = &self.packages[pkg.0 as usize];
        match scope.names.get(&name.name).copied() {
            None => {
                let qualified = format!("{}::{}", ns.name, name.name);
                self.error(TypeError::NotFound {
                    name: qualified,
                    loc: name.loc,
                });
                None
            }
            Some(def) if !self.defs.is_public(def) && pkg != self.ctx.pkg => {
                let package = scope.path.clone();
                self.error(TypeError::Private {
                    name: name.name.clone(),
                    package,
                    loc: name.loc,
                });
                None
            }
            Some(def) => Some(def),
        }
    }

    // ── Used marks ────────────────────────────────────────────────────

    pub(crate) fn mark(&mut self, def: DefId) {
        if !self.marking {
            return;
        }
        match def {
            DefId::Fn(id) => self.defs.func_mut(id).used = true,
            DefId::Trait(id) => self.defs.traits[id.index()].used = true,
            DefId::Enum(id) => self.defs.enums[id.index()].used = true,
            DefId::Global(id) => self.defs.globals[id.index()].used = true,
            DefId::Struct(_) | DefId::Alias(_) => {}
        }
    }

    // ── Assignability ─────────────────────────────────────────────────

    pub(crate) fn assignability(&self, target: &Ty, value: &Value) -> Assignability {
        assignable(&self.defs, target, value.source(), self.options.allow_implicit_deref)
    }

    /// Report unless `value` may be stored in `target`.
    pub(crate) fn expect_assignable(&mut self, target: &Ty, value: &Value, loc: Loc) -> bool {
        if matches!(value.ty, Ty::Void) {
            self.error(TypeError::NotAValue {
                name: "call without a result".into(),
                loc,
            });
            return false;
        }
        match self.assignability(target, value) {
            Assignability::Ok => true,
            Assignability::Overflow => {
                let shown = value.constant.as_ref().map_or_else(String::new, |c| c.to_string());
                self.error(TypeError::Overflow {
                    value: shown,
                    target: target.clone(),
                    loc,
                });
                false
            }
            Assignability::Incompatible => {
                self.error(TypeError::IncompatibleTypes {
                    expected: target.clone(),
                    found: value.ty.clone(),
                    loc,
                });
                false
            }
        }
    }

    /// The type a declaration without a written type takes from its value.
    pub(crate) fn default_type(&mut self, value: &Value, loc: Loc) -> Ty {
        match &value.ty {
            Ty::Nil => {
                self.error(TypeError::UntypedNil { loc });
                Ty::Error
            }
            Ty::Void => {
                self.error(TypeError::NotAValue {
                    name: "call without a result".into(),
                    loc,
                });
                Ty::Error
            }
            ty => ty.clone(),
        }
    }

    /// Report unless `value` is a `bool`.
    pub(crate) fn expect_bool(&mut self, value: &Value, loc: Loc) {
        if !value.ty.is_bool() && !value.ty.is_error() {
            self.error(TypeError::IncompatibleTypes {
                expected: Ty::BOOL,
                found: value.ty.clone(),
                loc,
            });
        }
    }

    /// Canonical rendering of a function for diagnostics, receiver included.
    pub(crate) fn describe_fn(&self, id: crate::ty::FnId) -> String {
        let def = self.defs.func(id);
        match def.owner {
            Some(owner) => format!("{}.{}", self.defs.strukt(owner).display, def.name),
            None => format!("{}{}", self.packages[def.origin.pkg.0 as usize].prefix(), def.name),
        }
    }
}

/// Placeholder arguments for checking a generic declaration on its own.
pub(crate) fn placeholders(names: &[String]) -> Vec<Ty> {
    names.iter().map(|n| Ty::Generic(n.clone())).collect()
}

/// Default type of an untyped rune literal.
pub(crate) const RUNE: Ty = Ty::Prim(PrimType::I32);
