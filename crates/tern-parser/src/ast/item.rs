use tern_common::span::Loc;

use super::expr::Expr;
use super::stmt::Block;
use super::ty::TypeNode;
use super::Ident;

/// A top-level declaration together with the doc comments and attributes
/// that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub kind: ItemKind,
    pub loc: Loc,
    pub public: bool,
    pub doc: Option<String>,
    pub attrs: Vec<Attr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Use(UseDecl),
    Fn(FnDecl),
    Global(VarDecl),
    TypeAlias(TypeAliasDecl),
    Enum(EnumDecl),
    Struct(StructDecl),
    Trait(TraitDecl),
    Impl(ImplDecl),
    /// `cpp ...`: a declaration implemented outside Tern.
    Link(LinkDecl),
}

/// `#name`
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub name: Ident,
}

/// `use a::b`, `use a::b::{x, y}`, `use a::b::*` or `use cpp "header.h"`.
#[derive(Debug, Clone, PartialEq)]
pub struct UseDecl {
    pub path: Vec<Ident>,
    pub selection: UseSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UseSelection {
    /// Import as a namespace named by the last path segment.
    Namespace,
    /// Bring every public name into file scope.
    All,
    /// Bring the listed names into file scope.
    Names(Vec<Ident>),
    /// `use cpp "header.h"`; `path` is empty.
    Header(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub name: Ident,
    pub generics: Vec<Ident>,
    pub receiver: Option<Receiver>,
    pub params: Vec<Param>,
    pub result: Option<TypeNode>,
    /// `None` for prototypes (trait methods, linked functions).
    pub body: Option<Block>,
    pub unsafe_: bool,
    pub loc: Loc,
}

impl FnDecl {
    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }
}

/// `self` or `&self` as the first method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receiver {
    pub by_ref: bool,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    /// `None` only when grouping found no type to the right of the name.
    pub ty: Option<TypeNode>,
    pub variadic: bool,
    pub loc: Loc,
}

/// A variable or constant declaration. Several names come from tuple
/// destructuring: `let (a, b) = pair()`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub names: Vec<Ident>,
    pub ty: Option<TypeNode>,
    pub init: Option<Expr>,
    pub constant: bool,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    pub name: Ident,
    pub ty: TypeNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: Ident,
    /// Underlying integer type; `int` when omitted.
    pub base: Option<TypeNode>,
    pub items: Vec<EnumItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumItem {
    pub name: Ident,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: Ident,
    pub generics: Vec<Ident>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Ident,
    pub ty: TypeNode,
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitDecl {
    pub name: Ident,
    pub generics: Vec<Ident>,
    pub methods: Vec<FnDecl>,
}

/// `impl Trait for Struct { ... }` or `impl Struct { ... }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImplDecl {
    pub trait_name: Option<TypeNode>,
    pub target: Ident,
    pub methods: Vec<FnDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkDecl {
    Fn(FnDecl),
    Struct(StructDecl),
    /// `cpp type Name`
    Type(Ident),
}
