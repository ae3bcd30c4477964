//! Definition tables.
//!
//! Every top-level declaration of every package lives in one arena per
//! kind, addressed by the ids in [`crate::ty`]. Each package keeps its own
//! name table mapping identifiers to [`DefId`]s; files keep their imports.
//! Declarations borrow the syntax tree they came from.

use rustc_hash::{FxHashMap, FxHashSet};
use tern_common::package_graph::PackageId;
use tern_common::span::{FileId, Loc};
use tern_parser::ast::{EnumDecl, FnDecl, StructDecl, TraitDecl, TypeNode, VarDecl};

use crate::assign::Conformance;
use crate::consts::ConstValue;
use crate::ty::{AliasId, EnumId, FnId, FnSig, GlobalId, PrimType, StructId, TraitId, Ty};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefId {
    Fn(FnId),
    Struct(StructId),
    Trait(TraitId),
    Enum(EnumId),
    Alias(AliasId),
    Global(GlobalId),
}

/// Where a declaration was written: names in it resolve in this file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub pkg: PackageId,
    pub file: FileId,
}

#[derive(Debug)]
pub struct FnDef<'a> {
    pub name: String,
    pub decl: &'a FnDecl,
    pub origin: Origin,
    /// The struct an `impl` block attached this method to.
    pub owner: Option<StructId>,
    pub public: bool,
    /// `cpp fn`: checked at call sites only.
    pub linked: bool,
    /// Generic argument lists already instantiated, keyed by their
    /// canonical encoding. Methods of generic structs prefix the struct's
    /// arguments.
    pub combines: FxHashMap<String, Vec<Ty>>,
    pub sigs: FxHashMap<String, FnSig>,
    pub used: bool,
}

impl FnDef<'_> {
    /// Total generic parameters, the owner's first.
    pub fn generic_names(&self, owner: Option<&StructDef<'_>>) -> Vec<String> {
        owner
            .map(|s| s.generic_names())
            .unwrap_or_default()
            .into_iter()
            .chain(self.decl.generics.iter().map(|g| g.name.clone()))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct FieldTy {
    pub name: String,
    pub ty: Ty,
    pub public: bool,
    pub loc: Loc,
}

#[derive(Debug)]
pub struct StructInstance {
    pub generics: Vec<Ty>,
    /// Resolved lazily, on first access.
    pub fields: Option<Vec<FieldTy>>,
    pub used: bool,
}

#[derive(Debug)]
pub struct StructDef<'a> {
    pub name: String,
    /// Name as rendered in types: prefixed by the package alias outside the
    /// root package.
    pub display: String,
    pub decl: &'a StructDecl,
    pub origin: Origin,
    pub public: bool,
    pub linked: bool,
    pub methods: FxHashMap<String, FnId>,
    pub traits: FxHashSet<TraitId>,
    pub instances: FxHashMap<String, StructInstance>,
}

impl StructDef<'_> {
    pub fn generic_names(&self) -> Vec<String> {
        self.decl.generics.iter().map(|g| g.name.clone()).collect()
    }
}

#[derive(Debug)]
pub struct TraitDef<'a> {
    pub name: String,
    pub display: String,
    pub decl: &'a TraitDecl,
    pub origin: Origin,
    pub public: bool,
    pub needs_ref: bool,
    pub used: bool,
}

impl<'a> TraitDef<'a> {
    pub fn method(&self, name: &str) -> Option<&'a FnDecl> {
        self.decl.methods.iter().find(|m| m.name.name == name)
    }
}

#[derive(Debug)]
pub struct EnumDef<'a> {
    pub name: String,
    pub display: String,
    pub decl: &'a EnumDecl,
    pub origin: Origin,
    pub public: bool,
    /// `int` until the values are resolved.
    pub base: PrimType,
    pub values: Resolution<FxHashMap<String, i128>>,
    pub used: bool,
}

#[derive(Debug)]
pub enum AliasTarget<'a> {
    Node(&'a TypeNode),
    /// `cpp type Name`
    Foreign,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Pending,
    InProgress,
    Done(T),
}

#[derive(Debug)]
pub struct AliasDef<'a> {
    pub name: String,
    pub target: AliasTarget<'a>,
    pub origin: Origin,
    pub loc: Loc,
    pub public: bool,
    pub resolved: Resolution<Ty>,
}

#[derive(Debug, Clone)]
pub struct GlobalValue {
    pub ty: Ty,
    pub constant: Option<ConstValue>,
    pub untyped: bool,
}

#[derive(Debug)]
pub struct GlobalDef<'a> {
    pub name: String,
    pub decl: &'a VarDecl,
    /// Position among the names the declaration introduces.
    pub index: usize,
    pub origin: Origin,
    pub loc: Loc,
    pub public: bool,
    pub resolved: Resolution<GlobalValue>,
    pub used: bool,
}

#[derive(Debug, Default)]
pub struct Defs<'a> {
    pub fns: Vec<FnDef<'a>>,
    pub structs: Vec<StructDef<'a>>,
    pub traits: Vec<TraitDef<'a>>,
    pub enums: Vec<EnumDef<'a>>,
    pub aliases: Vec<AliasDef<'a>>,
    pub globals: Vec<GlobalDef<'a>>,
}

impl<'a> Defs<'a> {
    pub fn add_fn(&mut self, def: FnDef<'a>) -> FnId {
        self.fns.push(def);
        FnId(self.fns.len() as u32 - 1)
    }

    pub fn add_struct(&mut self, def: StructDef<'a>) -> StructId {
        self.structs.push(def);
        StructId(self.structs.len() as u32 - 1)
    }

    pub fn add_trait(&mut self, def: TraitDef<'a>) -> TraitId {
        self.traits.push(def);
        TraitId(self.traits.len() as u32 - 1)
    }

    pub fn add_enum(&mut self, def: EnumDef<'a>) -> EnumId {
        self.enums.push(def);
        EnumId(self.enums.len() as u32 - 1)
    }

    pub fn add_alias(&mut self, def: AliasDef<'a>) -> AliasId {
        self.aliases.push(def);
        AliasId(self.aliases.len() as u32 - 1)
    }

    pub fn add_global(&mut self, def: GlobalDef<'a>) -> GlobalId {
        self.globals.push(def);
        GlobalId(self.globals.len() as u32 - 1)
    }

    pub fn func(&self, id: FnId) -> &FnDef<'a> {
        &self.fns[id.index()]
    }

    pub fn func_mut(&mut self, id: FnId) -> &mut FnDef<'a> {
        &mut self.fns[id.index()]
    }

    pub fn strukt(&self, id: StructId) -> &StructDef<'a> {
        &self.structs[id.index()]
    }

    pub fn strukt_mut(&mut self, id: StructId) -> &mut StructDef<'a> {
        &mut self.structs[id.index()]
    }

    pub fn trait_def(&self, id: TraitId) -> &TraitDef<'a> {
        &self.traits[id.index()]
    }

    pub fn enum_def(&self, id: EnumId) -> &EnumDef<'a> {
        &self.enums[id.index()]
    }

    /// Whether the definition may be named from another package.
    pub fn is_public(&self, def: DefId) -> bool {
        match def {
            DefId::Fn(id) => self.func(id).public,
            DefId::Struct(id) => self.strukt(id).public,
            DefId::Trait(id) => self.trait_def(id).public,
            DefId::Enum(id) => self.enum_def(id).public,
            DefId::Alias(id) => self.aliases[id.index()].public,
            DefId::Global(id) => self.globals[id.index()].public,
        }
    }

    /// Declaration location, for duplicate reports.
    pub fn loc(&self, def: DefId) -> Loc {
        match def {
            DefId::Fn(id) => self.func(id).decl.name.loc,
            DefId::Struct(id) => self.strukt(id).decl.name.loc,
            DefId::Trait(id) => self.trait_def(id).decl.name.loc,
            DefId::Enum(id) => self.enum_def(id).decl.name.loc,
            DefId::Alias(id) => self.aliases[id.index()].loc,
            DefId::Global(id) => self.globals[id.index()].loc,
        }
    }
}

impl Conformance for Defs<'_> {
    fn implements(&self, strukt: StructId, tr: TraitId) -> bool {
        self.strukt(strukt).traits.contains(&tr)
    }

    fn needs_ref(&self, tr: TraitId) -> bool {
        self.trait_def(tr).needs_ref
    }
}

/// Top-level names of one package.
#[derive(Debug)]
pub struct PackageScope {
    pub path: String,
    pub names: FxHashMap<String, DefId>,
}

impl PackageScope {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            names: FxHashMap::default(),
        }
    }

    /// Prefix for type names declared here; empty for the root package.
    pub fn prefix(&self) -> String {
        if self.path == "main" {
            String::new()
        } else {
            let alias = self.path.rsplit("::").next().unwrap_or(&self.path);
            format!("{alias}::")
        }
    }
}

/// Names a file brought in with `use`.
#[derive(Debug, Default)]
pub struct FileScope {
    pub pkg: Option<PackageId>,
    /// `use a::b` makes `b::name` resolvable.
    pub namespaces: FxHashMap<String, PackageId>,
    /// `use a::b::{x, y}`
    pub selected: FxHashMap<String, (PackageId, DefId)>,
    /// `use a::b::*`
    pub globs: Vec<PackageId>,
}
