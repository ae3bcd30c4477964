//! Tern semantic pass: type resolution, generic instantiation and
//! assignability checking.
//!
//! The checker walks the trees produced by `tern-parser`, resolves every
//! syntactic type against the definition tables, types every expression,
//! and monomorphizes generic functions and structs on demand. Its output
//! is the type of every expression, the semantic errors, and the set of
//! declarations the emitter has to produce.
//!
//! # Architecture
//!
//! - [`ty`]: resolved types and their canonical rendering
//! - [`consts`]: constant values, range checks and folding
//! - [`assign`]: the assignability relation
//! - [`unify`]: generic-argument inference on `ena`
//! - [`session`]: multi-package driver
//! - [`error`] and [`diagnostics`]: error values and their rendering

pub mod assign;
pub mod builtins;
mod check;
pub mod consts;
mod defs;
pub mod diagnostics;
pub mod error;
mod scope;
pub mod session;
pub mod ty;
pub mod unify;

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use tern_common::diagnostic::Diagnostic;
use tern_common::source::SourceMap;
use tern_common::span::{FileId, Loc, Span};
use tern_parser::SourceTree;

use crate::diagnostics::{render_diagnostic, DiagnosticOptions};
use crate::error::TypeError;
use crate::session::Session;
use crate::ty::Ty;

/// Switches for the semantic pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    /// Report block-local variables that are never read.
    pub warn_unused_locals: bool,
    /// Let a `&T` value be used where a `T` is expected.
    pub allow_implicit_deref: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            warn_unused_locals: true,
            allow_implicit_deref: true,
        }
    }
}

/// One concrete instantiation of a generic function.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericInstance {
    /// Qualified function name, `Box.get` for methods.
    pub function: String,
    pub generics: Vec<Ty>,
}

/// Declarations reached from emitted code, by display name. Struct
/// entries are rendered instances such as `Pair[int, str]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedSet {
    pub functions: BTreeSet<String>,
    pub structs: BTreeSet<String>,
    pub traits: BTreeSet<String>,
    pub enums: BTreeSet<String>,
    pub globals: BTreeSet<String>,
}

/// The result of checking a set of packages.
pub struct TypeckResult {
    /// Type of every checked expression, keyed by its location.
    pub types: FxHashMap<(FileId, Span), Ty>,
    /// Semantic errors and warnings, in source order without duplicates.
    pub errors: Vec<TypeError>,
    pub used: UsedSet,
    /// Concrete generic instantiations in the order they were created.
    pub generic_instances: Vec<GenericInstance>,
}

impl TypeckResult {
    /// Whether any entry should stop code emission. Warnings do not.
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(TypeError::is_error)
    }

    pub fn type_at(&self, loc: Loc) -> Option<&Ty> {
        self.types.get(&(loc.file, loc.span))
    }

    pub fn diagnostics(&self, files: &SourceMap) -> Vec<Diagnostic> {
        self.errors.iter().map(|e| e.to_diagnostic(files)).collect()
    }

    /// Render every error with its source snippet.
    pub fn render_errors(&self, files: &SourceMap, options: &DiagnosticOptions) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| render_diagnostic(e, files, options))
            .collect()
    }
}

/// Check the files of a single root package.
pub fn check(trees: &[SourceTree]) -> TypeckResult {
    check_with(CheckOptions::default(), &[("main", trees)])
}

/// Check several packages, each given as its `use` path and its files.
/// Packages may be listed in any order; imports decide the checking order.
pub fn check_with(options: CheckOptions, packages: &[(&str, &[SourceTree])]) -> TypeckResult {
    let mut session = Session::new(options);
    for &(path, trees) in packages {
        session.add_package(path, trees);
    }
    session.check_all();
    session.finish()
}
