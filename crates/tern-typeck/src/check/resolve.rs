//! Type resolution: syntactic type descriptors to [`Ty`].
//!
//! Named types look through generic bindings first, then the definition
//! tables. Aliases are expanded lazily and only once; struct uses create
//! an instance per distinct generic argument list; field types and
//! function signatures are resolved on demand in the declaring file's
//! context and cached per instance.

use tern_common::span::Loc;
use tern_parser::ast::{ArraySize, Expr, FnDecl, FnType, NamedType, TypeKind, TypeNode};

use super::{Checker, Ctx};
use crate::consts::ConstValue;
use crate::defs::{AliasTarget, DefId, FieldTy, Resolution, StructInstance};
use crate::error::TypeError;
use crate::ty::{generics_key, AliasId, FnId, FnSig, StructId, StructRef, Ty};

impl<'a> Checker<'a> {
    pub(crate) fn resolve_type(&mut self, node: &TypeNode) -> Ty {
        match &node.kind {
            TypeKind::Prim(p) => Ty::Prim(*p),
            TypeKind::Ptr(inner) => Ty::Ptr(Box::new(self.resolve_type(inner))),
            TypeKind::UnsafePtr => Ty::UnsafePtr,
            TypeKind::Ref(inner) => {
                let ty = self.resolve_type(inner);
                self.reference_to(ty, node.loc)
            }
            TypeKind::Slice(inner) => Ty::Slice(Box::new(self.resolve_type(inner))),
            TypeKind::Array { size, elem } => {
                let elem = self.resolve_type(elem);
                match size {
                    ArraySize::Auto => {
                        self.error(TypeError::InvalidArraySize {
                            reason: "`[...]` is only allowed in a composite literal",
                            loc: node.loc,
                        });
                        Ty::Error
                    }
                    ArraySize::Expr(expr) => match self.array_len(expr) {
                        Some(n) => Ty::Array(n, Box::new(elem)),
                        None => Ty::Error,
                    },
                }
            }
            TypeKind::Map { key, value } => {
                let key = self.resolve_type(key);
                let value = self.resolve_type(value);
                Ty::Map(Box::new(key), Box::new(value))
            }
            TypeKind::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| self.resolve_type(e)).collect()),
            TypeKind::Func(f) => Ty::Func(Box::new(self.resolve_fn_type(f))),
            TypeKind::Named(named) => self.resolve_named(named, node.loc),
        }
    }

    /// `&T`, rejecting kinds that cannot be referenced.
    pub(crate) fn reference_to(&mut self, ty: Ty, loc: Loc) -> Ty {
        match ty {
            Ty::Error => Ty::Error,
            Ty::Ref(_)
            | Ty::Trait(..)
            | Ty::Enum(..)
            | Ty::Ptr(_)
            | Ty::UnsafePtr
            | Ty::Slice(_)
            | Ty::Array(..) => {
                self.error(TypeError::InvalidReference {
                    ty: format!("&{ty}"),
                    loc,
                });
                Ty::Error
            }
            ty => Ty::Ref(Box::new(ty)),
        }
    }

    /// Length of `[N]T`: a non-negative integer constant.
    pub(crate) fn array_len(&mut self, expr: &Expr) -> Option<u64> {
        let value = self.check_expr(expr, None);
        if value.ty.is_error() {
            return None;
        }
        let reason = match value.constant.as_ref().and_then(ConstValue::as_int) {
            Some(n) if value.ty.is_integer() => match u64::try_from(n) {
                Ok(n) => return Some(n),
                Err(_) if n < 0 => "size must not be negative",
                Err(_) => "size is too large",
            },
            _ => "size must be a constant integer",
        };
        self.error(TypeError::InvalidArraySize {
            reason,
            loc: expr.loc,
        });
        None
    }

    fn resolve_fn_type(&mut self, f: &FnType) -> FnSig {
        FnSig {
            params: f.params.iter().map(|p| self.resolve_type(p)).collect(),
            variadic: f.variadic,
            ret: match &f.result {
                Some(ret) => self.resolve_type(ret),
                None => Ty::Void,
            },
        }
    }

    fn resolve_named(&mut self, named: &NamedType, loc: Loc) -> Ty {
        if named.foreign {
            return Ty::Foreign(named.name.name.clone());
        }
        let def = match named.namespace.as_slice() {
            [] => {
                if let Some(ty) = self.ctx.bindings.get(&named.name.name).cloned() {
                    if !named.generics.is_empty() {
                        self.error(TypeError::GenericsNotAllowed {
                            name: named.name.name.clone(),
                            loc,
                        });
                    }
                    return ty;
                }
                match self.lookup_def(&named.name.name) {
                    Some(def) => def,
                    None => {
                        self.error(TypeError::InvalidTypeSource {
                            name: named.name.name.clone(),
                            loc,
                        });
                        return Ty::Error;
                    }
                }
            }
            [ns] => match self.resolve_qualified(ns, &named.name) {
                Some(def) => def,
                None => return Ty::Error,
            },
            _ => {
                let path: Vec<&str> = named.namespace.iter().map(|s| s.name.as_str()).collect();
                self.error(TypeError::InvalidTypeSource {
                    name: format!("{}::{}", path.join("::"), named.name.name),
                    loc,
                });
                return Ty::Error;
            }
        };
        let args: Vec<Ty> = named.generics.iter().map(|g| self.resolve_type(g)).collect();
        self.def_type(def, args, &named.name.name, loc)
    }

    /// The type a definition names when used with `args`.
    pub(crate) fn def_type(&mut self, def: DefId, args: Vec<Ty>, name: &str, loc: Loc) -> Ty {
        match def {
            DefId::Alias(id) => {
                self.no_generics(&args, name, loc);
                self.alias_type(id)
            }
            DefId::Enum(id) => {
                self.no_generics(&args, name, loc);
                self.mark(def);
                Ty::Enum(id, self.defs.enum_def(id).display.clone())
            }
            DefId::Trait(id) => {
                self.no_generics(&args, name, loc);
                self.mark(def);
                Ty::Trait(id, self.defs.trait_def(id).display.clone())
            }
            DefId::Struct(id) => {
                let expected = self.defs.strukt(id).decl.generics.len();
                if !self.generic_count(name, expected, args.len(), loc) {
                    return Ty::Error;
                }
                self.struct_type(id, args)
            }
            DefId::Fn(id) => {
                let expected = self.defs.func(id).decl.generics.len();
                if !self.generic_count(name, expected, args.len(), loc) {
                    return Ty::Error;
                }
                Ty::Func(Box::new(self.fn_sig(id, &args)))
            }
            DefId::Global(_) => {
                self.error(TypeError::InvalidTypeSource {
                    name: name.to_string(),
                    loc,
                });
                Ty::Error
            }
        }
    }

    fn no_generics(&mut self, args: &[Ty], name: &str, loc: Loc) {
        if !args.is_empty() {
            self.error(TypeError::GenericsNotAllowed {
                name: name.to_string(),
                loc,
            });
        }
    }

    /// Report a generic argument count that does not match `expected`.
    pub(crate) fn generic_count(&mut self, name: &str, expected: usize, found: usize, loc: Loc) -> bool {
        let name = name.to_string();
        if found > expected {
            self.error(TypeError::GenericsOverflow {
                name,
                expected,
                found,
                loc,
            });
            false
        } else if found < expected {
            self.error(TypeError::MissingGenerics {
                name,
                expected,
                found,
                loc,
            });
            false
        } else {
            true
        }
    }

    pub(crate) fn alias_type(&mut self, id: AliasId) -> Ty {
        let alias = &self.defs.aliases[id.index()];
        match &alias.resolved {
            Resolution::Done(ty) => return ty.clone(),
            Resolution::InProgress => {
                let err = TypeError::CyclicAlias {
                    name: alias.name.clone(),
                    loc: alias.loc,
                };
                self.error(err);
                return Ty::Error;
            }
            Resolution::Pending => {}
        }
        let origin = alias.origin;
        let target = match &alias.target {
            AliasTarget::Foreign => Err(alias.name.clone()),
            AliasTarget::Node(node) => Ok(*node),
        };
        let ty = match target {
            Err(name) => Ty::Foreign(name),
            Ok(node) => {
                self.defs.aliases[id.index()].resolved = Resolution::InProgress;
                self.in_context(Ctx::at(origin), |c| c.resolve_type(node))
            }
        };
        self.defs.aliases[id.index()].resolved = Resolution::Done(ty.clone());
        ty
    }

    /// A use of struct `id` with `args`, creating the instance on first use.
    pub(crate) fn struct_type(&mut self, id: StructId, args: Vec<Ty>) -> Ty {
        let concrete = !args.iter().any(Ty::has_generics);
        let mark = self.marking && concrete;
        let def = self.defs.strukt_mut(id);
        let name = def.display.clone();
        let key = generics_key(&args);
        let instance = def.instances.entry(key).or_insert_with(|| {
            if concrete {
                tracing::debug!(name = %name, generics = ?args, "new struct instance");
            }
            StructInstance {
                generics: args.clone(),
                fields: None,
                used: false,
            }
        });
        if mark {
            instance.used = true;
        }
        Ty::Struct(StructRef {
            id,
            name,
            generics: args,
        })
    }

    /// Field types of a struct instance, resolved under its generic
    /// bindings on first access.
    pub(crate) fn struct_fields(&mut self, sref: &StructRef) -> Vec<FieldTy> {
        let key = generics_key(&sref.generics);
        let def = self.defs.strukt(sref.id);
        if let Some(fields) = def.instances.get(&key).and_then(|i| i.fields.clone()) {
            return fields;
        }
        let decl = def.decl;
        let ctx = Ctx::at(def.origin).with_bindings(def.generic_names(), &sref.generics);
        let fields: Vec<FieldTy> = self.in_context(ctx, |c| {
            decl.fields
                .iter()
                .map(|f| FieldTy {
                    name: f.name.name.clone(),
                    ty: c.resolve_type(&f.ty),
                    public: f.public,
                    loc: f.name.loc,
                })
                .collect()
        });
        let instance = self
            .defs
            .strukt_mut(sref.id)
            .instances
            .entry(key)
            .or_insert_with(|| StructInstance {
                generics: sref.generics.clone(),
                fields: None,
                used: false,
            });
        instance.fields = Some(fields.clone());
        fields
    }

    /// Signature of function `id` with every generic parameter (the
    /// owner's first) bound to `args`.
    pub(crate) fn fn_sig(&mut self, id: FnId, args: &[Ty]) -> FnSig {
        let key = generics_key(args);
        let def = self.defs.func(id);
        if let Some(sig) = def.sigs.get(&key) {
            return sig.clone();
        }
        let decl = def.decl;
        let owner = def.owner.map(|o| self.defs.strukt(o));
        let ctx = Ctx::at(def.origin).with_bindings(def.generic_names(owner), args);
        let sig = self.in_context(ctx, |c| c.sig_of(decl));
        if !args.iter().any(Ty::has_generics) {
            self.defs.func_mut(id).sigs.insert(key, sig.clone());
        }
        sig
    }

    /// Signature of a declaration in the current context. The receiver is
    /// not a parameter.
    pub(crate) fn sig_of(&mut self, decl: &FnDecl) -> FnSig {
        let params = decl
            .params
            .iter()
            .map(|p| match &p.ty {
                Some(ty) => self.resolve_type(ty),
                // Reported by the parser.
                None => Ty::Error,
            })
            .collect();
        let ret = match &decl.result {
            Some(ty) => self.resolve_type(ty),
            None => Ty::Void,
        };
        FnSig {
            params,
            variadic: decl.is_variadic(),
            ret,
        }
    }
}
