//! Declaration collection and per-package checking.
//!
//! Every package goes through the same phases before any body is checked:
//! top-level names are registered, `use` declarations are resolved,
//! `impl` blocks attach methods and traits to their structs, and struct
//! layouts are tested for by-value cycles. [`Checker::check_package`]
//! then resolves aliases, enums and globals and checks every non-generic
//! body.

use rustc_hash::{FxHashMap, FxHashSet};
use tern_common::package_graph::PackageId;
use tern_common::span::Loc;
use tern_parser::ast::{
    EnumDecl, FnDecl, Ident, ImplDecl, ItemKind, LinkDecl, SourceTree, StructDecl, UseSelection, VarDecl,
};

use super::{placeholders, Checker, Ctx};
use crate::consts::{fits, ConstValue};
use crate::defs::{
    AliasDef, AliasTarget, DefId, EnumDef, FileScope, FnDef, GlobalDef, GlobalValue, Origin, PackageScope,
    Resolution, StructDef, TraitDef,
};
use crate::error::TypeError;
use crate::ty::{AliasId, EnumId, FnId, GlobalId, PrimType, StructId, StructRef, TraitId, Ty};

impl<'a> Checker<'a> {
    /// Add an empty package. Ids must be handed out in registration order.
    pub(crate) fn register_package(&mut self, id: PackageId, path: &str) {
        debug_assert_eq!(id.0 as usize, self.packages.len());
        self.packages.push(PackageScope::new(path));
        self.by_path.insert(path.to_string(), id);
    }

    // ── Phase 1: names ────────────────────────────────────────────────

    pub(crate) fn collect_items(&mut self, pkg: PackageId, tree: &'a SourceTree) {
        self.files.insert(
            tree.file,
            FileScope {
                pkg: Some(pkg),
                ..FileScope::default()
            },
        );
        let origin = Origin { pkg, file: tree.file };
        let prefix = self.packages[pkg.0 as usize].prefix();
        for item in &tree.items {
            let public = item.public || item.attrs.iter().any(|a| a.name.name == "export");
            match &item.kind {
                ItemKind::Use(_) | ItemKind::Impl(_) => {}
                ItemKind::Fn(decl) => self.collect_fn(decl, origin, public, false),
                ItemKind::Link(LinkDecl::Fn(decl)) => self.collect_fn(decl, origin, public, true),
                ItemKind::Global(var) => self.collect_global(var, origin, public),
                ItemKind::TypeAlias(alias) => {
                    let id = self.defs.add_alias(AliasDef {
                        name: alias.name.name.clone(),
                        target: AliasTarget::Node(&alias.ty),
                        origin,
                        loc: alias.name.loc,
                        public,
                        resolved: Resolution::Pending,
                    });
                    self.declare_top(pkg, &alias.name, DefId::Alias(id));
                }
                ItemKind::Link(LinkDecl::Type(name)) => {
                    let id = self.defs.add_alias(AliasDef {
                        name: name.name.clone(),
                        target: AliasTarget::Foreign,
                        origin,
                        loc: name.loc,
                        public,
                        resolved: Resolution::Pending,
                    });
                    self.declare_top(pkg, name, DefId::Alias(id));
                }
                ItemKind::Enum(decl) => {
                    let id = self.defs.add_enum(EnumDef {
                        name: decl.name.name.clone(),
                        display: format!("{prefix}{}", decl.name.name),
                        decl,
                        origin,
                        public,
                        base: PrimType::Int,
                        values: Resolution::Pending,
                        used: false,
                    });
                    self.declare_top(pkg, &decl.name, DefId::Enum(id));
                }
                ItemKind::Struct(decl) => self.collect_struct(decl, origin, &prefix, public, false),
                ItemKind::Link(LinkDecl::Struct(decl)) => self.collect_struct(decl, origin, &prefix, public, true),
                ItemKind::Trait(decl) => {
                    let needs_ref = decl.methods.iter().any(|m| m.receiver.as_ref().is_some_and(|r| r.by_ref));
                    let id = self.defs.add_trait(TraitDef {
                        name: decl.name.name.clone(),
                        display: format!("{prefix}{}", decl.name.name),
                        decl,
                        origin,
                        public,
                        needs_ref,
                        used: false,
                    });
                    self.declare_top(pkg, &decl.name, DefId::Trait(id));
                }
            }
        }
    }

    fn declare_top(&mut self, pkg: PackageId, name: &Ident, def: DefId) {
        if name.is_blank() {
            return;
        }
        let names = &mut self.packages[pkg.0 as usize].names;
        if let Some(prev) = names.get(&name.name).copied() {
            let previous = self.defs.loc(prev);
            self.error(TypeError::DuplicateIdent {
                name: name.name.clone(),
                loc: name.loc,
                previous,
            });
            return;
        }
        names.insert(name.name.clone(), def);
    }

    fn collect_fn(&mut self, decl: &'a FnDecl, origin: Origin, public: bool, linked: bool) {
        let id = self.defs.add_fn(FnDef {
            name: decl.name.name.clone(),
            decl,
            origin,
            owner: None,
            public,
            linked,
            combines: FxHashMap::default(),
            sigs: FxHashMap::default(),
            used: false,
        });
        self.declare_top(origin.pkg, &decl.name, DefId::Fn(id));
    }

    fn collect_global(&mut self, var: &'a VarDecl, origin: Origin, public: bool) {
        for (index, name) in var.names.iter().enumerate() {
            if name.is_blank() {
                continue;
            }
            let id = self.defs.add_global(GlobalDef {
                name: name.name.clone(),
                decl: var,
                index,
                origin,
                loc: name.loc,
                public,
                resolved: Resolution::Pending,
                used: false,
            });
            self.declare_top(origin.pkg, name, DefId::Global(id));
        }
    }

    fn collect_struct(&mut self, decl: &'a StructDecl, origin: Origin, prefix: &str, public: bool, linked: bool) {
        let mut seen: FxHashMap<&str, Loc> = FxHashMap::default();
        for field in &decl.fields {
            if let Some(previous) = seen.insert(&field.name.name, field.name.loc) {
                self.error(TypeError::DuplicateIdent {
                    name: field.name.name.clone(),
                    loc: field.name.loc,
                    previous,
                });
            }
        }
        let id = self.defs.add_struct(StructDef {
            name: decl.name.name.clone(),
            display: format!("{prefix}{}", decl.name.name),
            decl,
            origin,
            public,
            linked,
            methods: FxHashMap::default(),
            traits: FxHashSet::default(),
            instances: FxHashMap::default(),
        });
        self.declare_top(origin.pkg, &decl.name, DefId::Struct(id));
    }

    // ── Phase 2: imports ──────────────────────────────────────────────

    pub(crate) fn resolve_uses(&mut self, tree: &'a SourceTree) {
        for item in &tree.items {
            let ItemKind::Use(decl) = &item.kind else {
                continue;
            };
            if matches!(decl.selection, UseSelection::Header(_)) {
                continue;
            }
            let path = use_path(&decl.path);
            let Some(target) = self.by_path.get(&path).copied() else {
                self.error(TypeError::UsePathNotFound { path, loc: item.loc });
                continue;
            };
            match &decl.selection {
                UseSelection::Namespace => {
                    let alias = decl.path.last().map_or(path.clone(), |s| s.name.clone());
                    self.file_scope(tree).namespaces.insert(alias, target);
                }
                UseSelection::All => self.file_scope(tree).globs.push(target),
                UseSelection::Names(names) => {
                    for name in names {
                        let scope = &self.packages[target.0 as usize];
                        match scope.names.get(&name.name).copied() {
                            None => self.error(TypeError::NotFound {
                                name: format!("{path}::{}", name.name),
                                loc: name.loc,
                            }),
                            Some(def) if !self.defs.is_public(def) => {
                                let package = scope.path.clone();
                                self.error(TypeError::Private {
                                    name: name.name.clone(),
                                    package,
                                    loc: name.loc,
                                });
                            }
                            Some(def) => {
                                self.file_scope(tree).selected.insert(name.name.clone(), (target, def));
                            }
                        }
                    }
                }
                UseSelection::Header(_) => {}
            }
        }
    }

    fn file_scope(&mut self, tree: &SourceTree) -> &mut FileScope {
        self.files.entry(tree.file).or_default()
    }

    // ── Phase 3: impl blocks ──────────────────────────────────────────

    pub(crate) fn collect_impls(&mut self, pkg: PackageId, tree: &'a SourceTree) {
        let origin = Origin { pkg, file: tree.file };
        for item in &tree.items {
            if let ItemKind::Impl(decl) = &item.kind {
                self.in_context(Ctx::at(origin), |c| c.collect_impl(decl, origin));
            }
        }
    }

    fn collect_impl(&mut self, decl: &'a ImplDecl, origin: Origin) {
        let target = &decl.target;
        let id = match self.packages[origin.pkg.0 as usize].names.get(&target.name) {
            Some(DefId::Struct(id)) => *id,
            Some(_) => {
                self.error(TypeError::InvalidImplTarget {
                    name: target.name.clone(),
                    loc: target.loc,
                });
                return;
            }
            None => {
                self.error(TypeError::NotFound {
                    name: target.name.clone(),
                    loc: target.loc,
                });
                return;
            }
        };
        let public = self.defs.strukt(id).public;
        for method in &decl.methods {
            let def = self.defs.strukt(id);
            let previous = def
                .methods
                .get(&method.name.name)
                .map(|m| self.defs.func(*m).decl.name.loc)
                .or_else(|| {
                    def.decl
                        .fields
                        .iter()
                        .find(|f| f.name.name == method.name.name)
                        .map(|f| f.name.loc)
                });
            if let Some(previous) = previous {
                self.error(TypeError::DuplicateIdent {
                    name: method.name.name.clone(),
                    loc: method.name.loc,
                    previous,
                });
                continue;
            }
            let fid = self.defs.add_fn(FnDef {
                name: method.name.name.clone(),
                decl: method,
                origin,
                owner: Some(id),
                public,
                linked: false,
                combines: FxHashMap::default(),
                sigs: FxHashMap::default(),
                used: false,
            });
            self.defs.strukt_mut(id).methods.insert(method.name.name.clone(), fid);
        }

        let Some(trait_node) = &decl.trait_name else {
            return;
        };
        let tr = match self.resolve_type(trait_node) {
            Ty::Trait(tr, _) => tr,
            Ty::Error => return,
            _ => {
                self.error(TypeError::NotATrait {
                    name: trait_node.to_string(),
                    loc: trait_node.loc,
                });
                return;
            }
        };
        self.check_conformance(id, tr, target);
        // Recorded even on mismatch so later assignments do not cascade.
        self.defs.strukt_mut(id).traits.insert(tr);
    }

    fn check_conformance(&mut self, strukt: StructId, tr: TraitId, at: &Ident) {
        let tdef = self.defs.trait_def(tr);
        let (required, trait_name) = (tdef.decl, tdef.display.clone());
        let trait_generics: Vec<String> = required.generics.iter().map(|g| g.name.clone()).collect();
        let trait_ctx = Ctx::at(tdef.origin).with_bindings(trait_generics.clone(), &placeholders(&trait_generics));
        let sdef = self.defs.strukt(strukt);
        let target = sdef.display.clone();
        let struct_generics = sdef.generic_names();
        for method in &required.methods {
            let Some(fid) = self.defs.strukt(strukt).methods.get(&method.name.name).copied() else {
                self.error(TypeError::MissingTraitMethod {
                    trait_name: trait_name.clone(),
                    method: method.name.name.clone(),
                    target: target.clone(),
                    loc: at.loc,
                });
                continue;
            };
            let expected = self.in_context(trait_ctx.clone(), |c| c.describe_decl(method));
            let fdef = self.defs.func(fid);
            let (found_decl, found_ctx) = (
                fdef.decl,
                Ctx::at(fdef.origin).with_bindings(struct_generics.clone(), &placeholders(&struct_generics)),
            );
            let found = self.unmarked(|c| c.in_context(found_ctx, |c| c.describe_decl(found_decl)));
            if expected != found {
                self.error(TypeError::TraitMethodMismatch {
                    trait_name: trait_name.clone(),
                    method: method.name.name.clone(),
                    expected,
                    found,
                    loc: found_decl.name.loc,
                });
            }
        }
    }

    /// `fn(&self, int) str`: a signature with its receiver, for comparing
    /// trait methods with their implementations.
    fn describe_decl(&mut self, decl: &FnDecl) -> String {
        let sig = self.sig_of(decl);
        let mut params = Vec::new();
        if let Some(receiver) = &decl.receiver {
            params.push(if receiver.by_ref { "&self" } else { "self" }.to_string());
        }
        let last = sig.params.len().saturating_sub(1);
        for (i, param) in sig.params.iter().enumerate() {
            if sig.variadic && i == last {
                params.push(format!("...{param}"));
            } else {
                params.push(param.to_string());
            }
        }
        match sig.ret {
            Ty::Void => format!("fn({})", params.join(", ")),
            ret => format!("fn({}) {ret}", params.join(", ")),
        }
    }

    // ── Phase 4: struct layout ────────────────────────────────────────

    /// Report fields that embed their own struct by value, directly or
    /// through other structs, arrays and tuples.
    pub(crate) fn check_struct_cycles(&mut self, pkg: PackageId) {
        let ids: Vec<StructId> = (0..self.defs.structs.len() as u32)
            .map(StructId)
            .filter(|id| self.defs.strukt(*id).origin.pkg == pkg)
            .collect();
        for id in ids {
            let def = self.defs.strukt(id);
            let names = def.generic_names();
            let sref = StructRef {
                id,
                name: def.display.clone(),
                generics: placeholders(&names),
            };
            let fields = self.unmarked(|c| c.struct_fields(&sref));
            for field in fields {
                let mut seen = FxHashSet::default();
                if self.embeds(&field.ty, id, &mut seen) {
                    self.error(TypeError::CyclicStructField {
                        name: sref.name.clone(),
                        field: field.name,
                        loc: field.loc,
                    });
                }
            }
        }
    }

    fn embeds(&mut self, ty: &Ty, target: StructId, seen: &mut FxHashSet<StructId>) -> bool {
        match ty {
            Ty::Struct(s) if s.id == target => true,
            Ty::Struct(s) => {
                if !seen.insert(s.id) {
                    return false;
                }
                let fields = self.unmarked(|c| c.struct_fields(s));
                fields.iter().any(|f| self.embeds(&f.ty, target, seen))
            }
            Ty::Array(_, elem) => self.embeds(elem, target, seen),
            Ty::Tuple(elems) => elems.iter().any(|e| self.embeds(e, target, seen)),
            _ => false,
        }
    }

    // ── Enums and globals ─────────────────────────────────────────────

    /// Compute the base type and item values of an enum once.
    pub(crate) fn ensure_enum(&mut self, id: EnumId) {
        let def = &self.defs.enums[id.index()];
        if !matches!(def.values, Resolution::Pending) {
            return;
        }
        let (decl, origin) = (def.decl, def.origin);
        self.defs.enums[id.index()].values = Resolution::InProgress;
        let (base, values) = self.in_context(Ctx::at(origin), |c| c.enum_values(decl));
        let def = &mut self.defs.enums[id.index()];
        def.base = base;
        def.values = Resolution::Done(values);
    }

    fn enum_values(&mut self, decl: &EnumDecl) -> (PrimType, FxHashMap<String, i128>) {
        let base = match &decl.base {
            None => PrimType::Int,
            Some(node) => match self.resolve_type(node) {
                Ty::Prim(p) if p.is_integer() => p,
                Ty::Error => PrimType::Int,
                other => {
                    self.error(TypeError::InvalidEnumBase { ty: other, loc: node.loc });
                    PrimType::Int
                }
            },
        };
        let base_ty = Ty::Prim(base);
        let mut values = FxHashMap::default();
        let mut declared: FxHashMap<&str, Loc> = FxHashMap::default();
        let mut next: i128 = 0;
        for item in &decl.items {
            let value = match &item.value {
                None => next,
                Some(expr) => {
                    let v = self.check_expr(expr, Some(&base_ty));
                    match &v.constant {
                        _ if v.ty.is_error() => next,
                        Some(ConstValue::Int(n)) => *n,
                        Some(_) => {
                            self.expect_assignable(&base_ty, &v, expr.loc);
                            next
                        }
                        None => {
                            self.error(TypeError::NotConstant {
                                what: format!("value of enum item `{}`", item.name.name),
                                loc: expr.loc,
                            });
                            next
                        }
                    }
                }
            };
            if !fits(&ConstValue::Int(value), base) {
                self.error(TypeError::Overflow {
                    value: value.to_string(),
                    target: base_ty.clone(),
                    loc: item.name.loc,
                });
            }
            if let Some(previous) = declared.insert(&item.name.name, item.name.loc) {
                self.error(TypeError::DuplicateIdent {
                    name: item.name.name.clone(),
                    loc: item.name.loc,
                    previous,
                });
            } else {
                values.insert(item.name.name.clone(), value);
            }
            next = value.saturating_add(1);
        }
        (base, values)
    }

    /// Type and constant value of a global, resolving its declaration on
    /// first use. Every name of a multi-name declaration is resolved at once.
    pub(crate) fn global_value(&mut self, id: GlobalId) -> GlobalValue {
        let def = &self.defs.globals[id.index()];
        match &def.resolved {
            Resolution::Done(value) => return value.clone(),
            Resolution::InProgress => {
                let err = TypeError::GlobalCycle {
                    name: def.name.clone(),
                    loc: def.loc,
                };
                self.error(err);
                return GlobalValue {
                    ty: Ty::Error,
                    constant: None,
                    untyped: false,
                };
            }
            Resolution::Pending => {}
        }
        let (decl, origin) = (def.decl, def.origin);
        let siblings: Vec<usize> = (0..self.defs.globals.len())
            .filter(|i| std::ptr::eq(self.defs.globals[*i].decl, decl))
            .collect();
        for &i in &siblings {
            self.defs.globals[i].resolved = Resolution::InProgress;
        }
        let values = self.in_context(Ctx::at(origin), |c| c.var_values(decl));
        for &i in &siblings {
            let global = &mut self.defs.globals[i];
            let value = values.get(global.index).cloned().unwrap_or(GlobalValue {
                ty: Ty::Error,
                constant: None,
                untyped: false,
            });
            global.resolved = Resolution::Done(value);
        }
        match &self.defs.globals[id.index()].resolved {
            Resolution::Done(value) => value.clone(),
            _ => GlobalValue {
                ty: Ty::Error,
                constant: None,
                untyped: false,
            },
        }
    }

    // ── Package check ─────────────────────────────────────────────────

    pub(crate) fn check_package(&mut self, pkg: PackageId) {
        let path = self.packages[pkg.0 as usize].path.clone();
        tracing::debug!(package = %path, "checking package");
        let mine = |origin: Origin| origin.pkg == pkg;

        let aliases: Vec<_> = (0..self.defs.aliases.len())
            .filter(|i| mine(self.defs.aliases[*i].origin))
            .collect();
        for i in aliases {
            self.alias_type(AliasId(i as u32));
        }
        let enums: Vec<_> = (0..self.defs.enums.len() as u32)
            .map(EnumId)
            .filter(|id| mine(self.defs.enum_def(*id).origin))
            .collect();
        for id in enums {
            self.ensure_enum(id);
        }
        let globals: Vec<_> = (0..self.defs.globals.len() as u32)
            .map(GlobalId)
            .filter(|id| mine(self.defs.globals[id.index()].origin))
            .collect();
        for id in &globals {
            self.global_value(*id);
        }

        let fns: Vec<_> = (0..self.defs.fns.len() as u32)
            .map(FnId)
            .filter(|id| mine(self.defs.func(*id).origin))
            .collect();
        for id in fns.iter().copied() {
            let def = self.defs.func(id);
            let owner = def.owner.map(|o| self.defs.strukt(o));
            let names = def.generic_names(owner);
            if !names.is_empty() {
                // Bodies of generic declarations are checked per instance.
                self.unmarked(|c| c.fn_sig(id, &placeholders(&names)));
            } else {
                self.instantiate(id, &[]);
            }
        }

        // Exported declarations and the entry point are always emitted.
        for id in fns {
            let def = self.defs.func(id);
            let generic = !def.decl.generics.is_empty()
                || def.owner.is_some_and(|o| !self.defs.strukt(o).decl.generics.is_empty());
            if (def.public || (def.name == "main" && def.owner.is_none())) && !generic {
                self.mark(DefId::Fn(id));
            }
        }
        for id in globals {
            if self.defs.globals[id.index()].public {
                self.mark(DefId::Global(id));
            }
        }
        let structs: Vec<_> = (0..self.defs.structs.len() as u32)
            .map(StructId)
            .filter(|id| {
                let def = self.defs.strukt(*id);
                mine(def.origin) && def.public && def.decl.generics.is_empty()
            })
            .collect();
        for id in structs {
            self.struct_type(id, Vec::new());
        }
        for i in 0..self.defs.traits.len() {
            let def = &self.defs.traits[i];
            if mine(def.origin) && def.public {
                self.mark(DefId::Trait(TraitId(i as u32)));
            }
        }
        for i in 0..self.defs.enums.len() {
            let def = &self.defs.enums[i];
            if mine(def.origin) && def.public {
                self.mark(DefId::Enum(EnumId(i as u32)));
            }
        }
    }
}

fn use_path(path: &[Ident]) -> String {
    path.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join("::")
}
