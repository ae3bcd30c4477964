//! Multi-package driver.
//!
//! A session owns the definition tables of every package added to it.
//! [`Session::check_all`] registers every package's top-level names first,
//! then resolves imports, attaches `impl` blocks, and finally checks the
//! packages in dependency order: a package's imports are fully checked
//! before the package itself.

use rustc_hash::FxHashSet;
use tern_common::package_graph::{topological_sort, PackageGraph, PackageId};
use tern_common::span::{FileId, Loc};
use tern_parser::ast::{ItemKind, TypeNode, UseSelection};
use tern_parser::SourceTree;

use crate::check::{Checker, Ctx};
use crate::defs::Origin;
use crate::error::TypeError;
use crate::ty::{FnId, StructId, StructRef, Ty};
use crate::{CheckOptions, TypeckResult, UsedSet};

pub struct Session<'a> {
    checker: Checker<'a>,
    graph: PackageGraph,
    trees: Vec<(PackageId, &'a SourceTree)>,
    /// `use` edges with the location of the declaration, for cycle reports.
    imports: Vec<(PackageId, PackageId, Loc)>,
}

impl<'a> Session<'a> {
    pub fn new(options: CheckOptions) -> Self {
        Self {
            checker: Checker::new(options),
            graph: PackageGraph::new(),
            trees: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Add the files of the package importable as `path`. Adding files to
    /// a known path extends that package.
    pub fn add_package(&mut self, path: &str, trees: &'a [SourceTree]) -> PackageId {
        let id = self.graph.add_package(path);
        if id.0 as usize == self.checker.packages.len() {
            self.checker.register_package(id, path);
        }
        self.trees.extend(trees.iter().map(|tree| (id, tree)));
        id
    }

    pub fn check_all(&mut self) {
        for &(pkg, tree) in &self.trees {
            self.checker.collect_items(pkg, tree);
        }
        for &(pkg, tree) in &self.trees {
            self.checker.resolve_uses(tree);
            for item in &tree.items {
                let ItemKind::Use(decl) = &item.kind else {
                    continue;
                };
                if matches!(decl.selection, UseSelection::Header(_)) {
                    continue;
                }
                let path: Vec<&str> = decl.path.iter().map(|s| s.name.as_str()).collect();
                if let Some(target) = self.graph.resolve(&path.join("::")) {
                    if self.graph.add_dependency(pkg, target) {
                        self.imports.push((pkg, target, item.loc));
                    }
                }
            }
        }
        for &(pkg, tree) in &self.trees {
            self.checker.collect_impls(pkg, tree);
        }

        let order = match topological_sort(&self.graph) {
            Ok(order) => order,
            Err(cycle) => {
                tracing::warn!(cycle = ?cycle.cycle_path, "import cycle");
                let loc = self.cycle_loc(&cycle.cycle_path);
                self.checker.error(TypeError::ImportCycle {
                    cycle: cycle.cycle_path.join(" -> "),
                    loc,
                });
                (0..self.graph.len() as u32).map(PackageId).collect()
            }
        };
        for pkg in order {
            self.checker.check_struct_cycles(pkg);
            self.checker.check_package(pkg);
        }
    }

    /// Location of the `use` that closes an import cycle.
    fn cycle_loc(&self, cycle: &[String]) -> Loc {
        let edge = |from: &str, to: &str| {
            let from = self.graph.resolve(from)?;
            let to = self.graph.resolve(to)?;
            self.imports
                .iter()
                .find(|(f, t, _)| *f == from && *t == to)
                .map(|(_, _, loc)| *loc)
        };
        cycle
            .windows(2)
            .find_map(|pair| edge(&pair[0], &pair[1]))
            .unwrap_or_default()
    }

    /// Resolve a syntactic type as if written at top level of `file`.
    /// Errors found on the way are returned instead of recorded.
    pub fn resolve_type(&mut self, file: FileId, node: &TypeNode) -> Result<Ty, Vec<TypeError>> {
        let pkg = self
            .checker
            .files
            .get(&file)
            .and_then(|f| f.pkg)
            .unwrap_or(PackageId(0));
        let before = self.checker.errors.len();
        let ty = self
            .checker
            .in_context(Ctx::at(Origin { pkg, file }), |c| c.resolve_type(node));
        if self.checker.errors.len() > before {
            Err(self.checker.errors.split_off(before))
        } else {
            Ok(ty)
        }
    }

    /// A function by its qualified display name: `name`, `ns::name` for
    /// imported packages, `Struct.method` for methods.
    pub fn find_function(&self, name: &str) -> Option<FnId> {
        (0..self.checker.defs.fns.len() as u32)
            .map(FnId)
            .find(|id| self.checker.describe_fn(*id) == name)
    }

    /// Instantiate a function with every generic parameter, the owner
    /// struct's first, bound to `args`. Returns `false` when the argument
    /// list was already instantiated or does not match the declaration.
    pub fn instantiate(&mut self, id: FnId, args: &[Ty]) -> bool {
        let def = self.checker.defs.func(id);
        let owner = def.owner.map(|o| self.checker.defs.strukt(o));
        let expected = def.generic_names(owner).len();
        let (name, loc) = (self.checker.describe_fn(id), def.decl.name.loc);
        if !self.checker.generic_count(&name, expected, args.len(), loc) {
            return false;
        }
        self.checker.instantiate(id, args)
    }

    /// Number of distinct generic argument lists `id` was instantiated
    /// with. A non-generic function that was checked counts once.
    pub fn combines(&self, id: FnId) -> usize {
        self.checker.defs.func(id).combines.len()
    }

    pub fn finish(self) -> TypeckResult {
        let checker = self.checker;
        let used = used_set(&checker);
        let mut seen = FxHashSet::default();
        let mut errors: Vec<TypeError> = checker
            .errors
            .into_iter()
            .filter(|e| seen.insert((e.code(), e.loc(), e.to_string())))
            .collect();
        errors.sort_by_key(|e| {
            let loc = e.loc();
            (loc.file, loc.row, loc.column)
        });
        tracing::debug!(errors = errors.len(), instances = checker.instances.len(), "check finished");
        TypeckResult {
            types: checker.types,
            errors,
            used,
            generic_instances: checker.instances,
        }
    }
}

fn used_set(checker: &Checker<'_>) -> UsedSet {
    let defs = &checker.defs;
    let mut used = UsedSet::default();
    for (i, def) in defs.fns.iter().enumerate() {
        if def.used {
            used.functions.insert(checker.describe_fn(FnId(i as u32)));
        }
    }
    for (i, def) in defs.structs.iter().enumerate() {
        for instance in def.instances.values().filter(|i| i.used) {
            let ty = Ty::Struct(StructRef {
                id: StructId(i as u32),
                name: def.display.clone(),
                generics: instance.generics.clone(),
            });
            used.structs.insert(ty.to_string());
        }
    }
    for def in defs.traits.iter().filter(|d| d.used) {
        used.traits.insert(def.display.clone());
    }
    for def in defs.enums.iter().filter(|d| d.used) {
        used.enums.insert(def.display.clone());
    }
    for def in defs.globals.iter().filter(|d| d.used) {
        let prefix = checker.packages[def.origin.pkg.0 as usize].prefix();
        used.globals.insert(format!("{prefix}{}", def.name));
    }
    used
}
