//! Package dependency graph.
//!
//! A package is a set of files sharing one definition table, named by its
//! `::`-separated import path (`std::math`). `use` declarations add edges;
//! packages are checked leaves-first in the order [`topological_sort`] returns.

use std::collections::VecDeque;
use std::fmt;

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub u32);

#[derive(Debug)]
pub struct PackageInfo {
    pub id: PackageId,
    /// Import path, e.g. `"std::math"`. The root package uses `"main"`.
    pub path: String,
    pub dependencies: Vec<PackageId>,
}

impl PackageInfo {
    /// Last path segment: the namespace a `use` of this package introduces.
    pub fn alias(&self) -> &str {
        self.path.rsplit("::").next().unwrap_or(&self.path)
    }
}

/// Packages in a dependency cycle, e.g. `["a", "b", "a"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    pub cycle_path: Vec<String>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "import cycle: {}", self.cycle_path.join(" -> "))
    }
}

impl std::error::Error for CycleError {}

#[derive(Debug, Default)]
pub struct PackageGraph {
    packages: Vec<PackageInfo>,
    by_path: FxHashMap<String, PackageId>,
}

impl PackageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package, or return the existing id if the path is known.
    pub fn add_package(&mut self, path: impl Into<String>) -> PackageId {
        let path = path.into();
        if let Some(id) = self.by_path.get(&path) {
            return *id;
        }
        let id = PackageId(self.packages.len() as u32);
        self.by_path.insert(path.clone(), id);
        self.packages.push(PackageInfo {
            id,
            path,
            dependencies: Vec::new(),
        });
        id
    }

    pub fn resolve(&self, path: &str) -> Option<PackageId> {
        self.by_path.get(path).copied()
    }

    /// Record that `from` imports `to`. Duplicate edges are ignored.
    ///
    /// Returns `false` for a self-import, which is never recorded.
    pub fn add_dependency(&mut self, from: PackageId, to: PackageId) -> bool {
        if from == to {
            return false;
        }
        let deps = &mut self.packages[from.0 as usize].dependencies;
        if !deps.contains(&to) {
            deps.push(to);
        }
        true
    }

    pub fn get(&self, id: PackageId) -> &PackageInfo {
        &self.packages[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageInfo> {
        self.packages.iter()
    }
}

/// Kahn's algorithm: dependencies before dependents, ties broken by path.
pub fn topological_sort(graph: &PackageGraph) -> Result<Vec<PackageId>, CycleError> {
    let n = graph.packages.len();
    let mut pending: Vec<usize> = graph.packages.iter().map(|p| p.dependencies.len()).collect();

    let by_path = |ids: &mut Vec<PackageId>| {
        ids.sort_by(|a, b| graph.get(*a).path.cmp(&graph.get(*b).path));
    };

    let mut ready: Vec<PackageId> = graph
        .packages
        .iter()
        .filter(|p| p.dependencies.is_empty())
        .map(|p| p.id)
        .collect();
    by_path(&mut ready);

    let mut queue = VecDeque::from(ready);
    let mut order = Vec::with_capacity(n);
    while let Some(done) = queue.pop_front() {
        order.push(done);
        let mut unlocked = Vec::new();
        for pkg in &graph.packages {
            let slot = &mut pending[pkg.id.0 as usize];
            if *slot > 0 && pkg.dependencies.contains(&done) {
                *slot -= 1;
                if *slot == 0 {
                    unlocked.push(pkg.id);
                }
            }
        }
        by_path(&mut unlocked);
        queue.extend(unlocked);
    }

    if order.len() == n {
        return Ok(order);
    }
    Err(CycleError {
        cycle_path: cycle_among(graph, &pending),
    })
}

/// Walk dependency edges among still-pending packages until one repeats.
fn cycle_among(graph: &PackageGraph, pending: &[usize]) -> Vec<String> {
    let Some(mut at) = pending.iter().position(|&p| p > 0) else {
        return Vec::new();
    };
    let mut walked: Vec<usize> = Vec::new();
    loop {
        if let Some(first) = walked.iter().position(|&w| w == at) {
            let mut cycle: Vec<String> = walked[first..]
                .iter()
                .map(|&i| graph.packages[i].path.clone())
                .collect();
            cycle.push(graph.packages[at].path.clone());
            return cycle;
        }
        walked.push(at);
        match graph.packages[at]
            .dependencies
            .iter()
            .find(|dep| pending[dep.0 as usize] > 0)
        {
            Some(dep) => at = dep.0 as usize,
            None => return walked.iter().map(|&i| graph.packages[i].path.clone()).collect(),
        }
    }
}
