//! Semantic errors.
//!
//! Every variant carries the location it is reported at. Most carry the
//! resolved types involved so messages can name them; rendering with a
//! source snippet lives in [`crate::diagnostics`].

use std::fmt;

use tern_common::diagnostic::{Diagnostic, Severity};
use tern_common::source::SourceMap;
use tern_common::span::Loc;

use crate::ty::Ty;

#[derive(Clone, Debug, PartialEq)]
pub enum TypeError {
    /// A name declared twice in one scope.
    DuplicateIdent { name: String, loc: Loc, previous: Loc },
    /// A value name that resolves to nothing.
    NotFound { name: String, loc: Loc },
    /// A type name that resolves to nothing, or to something that is not a type.
    InvalidTypeSource { name: String, loc: Loc },
    IncompatibleTypes { expected: Ty, found: Ty, loc: Loc },
    /// A constant that does not fit its destination.
    Overflow { value: String, target: Ty, loc: Loc },
    /// More generic arguments than the declaration has parameters.
    GenericsOverflow {
        name: String,
        expected: usize,
        found: usize,
        loc: Loc,
    },
    /// Fewer generic arguments than required, or none where they cannot be inferred.
    MissingGenerics {
        name: String,
        expected: usize,
        found: usize,
        loc: Loc,
    },
    GenericsNotAllowed { name: String, loc: Loc },
    /// A generic parameter that occurs only in the result type.
    CannotInfer { param: String, callee: String, loc: Loc },
    /// Two arguments bind one generic parameter to different types.
    ConflictingGeneric {
        param: String,
        first: Ty,
        second: Ty,
        loc: Loc,
    },
    /// A struct that contains itself by value.
    CyclicStructField { name: String, field: String, loc: Loc },
    CyclicAlias { name: String, loc: Loc },
    /// `&&T`, or `&` applied to a kind that cannot be referenced.
    InvalidReference { ty: String, loc: Loc },
    InvalidUnsafePointer { reason: &'static str, loc: Loc },
    ArgumentCount {
        callee: String,
        expected: usize,
        found: usize,
        variadic: bool,
        loc: Loc,
    },
    NotCallable { ty: Ty, loc: Loc },
    NoField { ty: Ty, name: String, loc: Loc },
    NotIndexable { ty: Ty, loc: Loc },
    NotIterable { ty: Ty, loc: Loc },
    /// An operator applied to operand types it is not defined on. `rhs` is
    /// `None` for unary operators.
    InvalidOperator {
        op: &'static str,
        lhs: Ty,
        rhs: Option<Ty>,
        loc: Loc,
    },
    DivisionByZero { loc: Loc },
    ConstantAssignment { name: String, loc: Loc },
    NotAssignable { expr: String, loc: Loc },
    NotAddressable { expr: String, loc: Loc },
    MissingTraitMethod {
        trait_name: String,
        method: String,
        target: String,
        loc: Loc,
    },
    TraitMethodMismatch {
        trait_name: String,
        method: String,
        expected: String,
        found: String,
        loc: Loc,
    },
    NotATrait { name: String, loc: Loc },
    /// A function with a result whose body can fall off the end.
    MissingReturn { name: String, loc: Loc },
    /// `ret` with the wrong number of values.
    InvalidReturn { expected: usize, found: usize, loc: Loc },
    BreakOutsideLoop { keyword: &'static str, loc: Loc },
    InvalidFall { loc: Loc },
    LabelNotFound { name: String, loc: Loc },
    InvalidArraySize { reason: &'static str, loc: Loc },
    IndexOutOfRange { index: i128, len: u64, loc: Loc },
    UsePathNotFound { path: String, loc: Loc },
    /// A name that exists but is not public in its package.
    Private { name: String, package: String, loc: Loc },
    UnusedLocal { name: String, loc: Loc },
    /// A type, builtin or `void` result used where a value is required.
    NotAValue { name: String, loc: Loc },
    NotConstant { what: String, loc: Loc },
    InvalidCast { from: Ty, to: Ty, loc: Loc },
    SpreadNotAllowed { loc: Loc },
    UntypedNil { loc: Loc },
    /// More or fewer values than names in a declaration or assignment.
    ValueCount { expected: usize, found: usize, loc: Loc },
    InvalidComposite { ty: Ty, loc: Loc },
    EmptySliceLiteral { loc: Loc },
    InvalidEnumBase { ty: Ty, loc: Loc },
    /// A global whose initializer depends on itself.
    GlobalCycle { name: String, loc: Loc },
    ImportCycle { cycle: String, loc: Loc },
    /// `impl` naming something other than a struct of the same package.
    InvalidImplTarget { name: String, loc: Loc },
}

impl TypeError {
    pub fn loc(&self) -> Loc {
        use TypeError::*;
        match self {
            DuplicateIdent { loc, .. }
            | NotFound { loc, .. }
            | InvalidTypeSource { loc, .. }
            | IncompatibleTypes { loc, .. }
            | Overflow { loc, .. }
            | GenericsOverflow { loc, .. }
            | MissingGenerics { loc, .. }
            | GenericsNotAllowed { loc, .. }
            | CannotInfer { loc, .. }
            | ConflictingGeneric { loc, .. }
            | CyclicStructField { loc, .. }
            | CyclicAlias { loc, .. }
            | InvalidReference { loc, .. }
            | InvalidUnsafePointer { loc, .. }
            | ArgumentCount { loc, .. }
            | NotCallable { loc, .. }
            | NoField { loc, .. }
            | NotIndexable { loc, .. }
            | NotIterable { loc, .. }
            | InvalidOperator { loc, .. }
            | DivisionByZero { loc }
            | ConstantAssignment { loc, .. }
            | NotAssignable { loc, .. }
            | NotAddressable { loc, .. }
            | MissingTraitMethod { loc, .. }
            | TraitMethodMismatch { loc, .. }
            | NotATrait { loc, .. }
            | MissingReturn { loc, .. }
            | InvalidReturn { loc, .. }
            | BreakOutsideLoop { loc, .. }
            | InvalidFall { loc }
            | LabelNotFound { loc, .. }
            | InvalidArraySize { loc, .. }
            | IndexOutOfRange { loc, .. }
            | UsePathNotFound { loc, .. }
            | Private { loc, .. }
            | UnusedLocal { loc, .. }
            | NotAValue { loc, .. }
            | NotConstant { loc, .. }
            | InvalidCast { loc, .. }
            | SpreadNotAllowed { loc }
            | UntypedNil { loc }
            | ValueCount { loc, .. }
            | InvalidComposite { loc, .. }
            | EmptySliceLiteral { loc }
            | InvalidEnumBase { loc, .. }
            | GlobalCycle { loc, .. }
            | ImportCycle { loc, .. }
            | InvalidImplTarget { loc, .. } => *loc,
        }
    }

    /// Stable code shown in rendered diagnostics. Warnings use a `W` prefix.
    pub fn code(&self) -> &'static str {
        use TypeError::*;
        match self {
            DuplicateIdent { .. } => "E0001",
            NotFound { .. } => "E0002",
            InvalidTypeSource { .. } => "E0003",
            IncompatibleTypes { .. } => "E0004",
            Overflow { .. } => "E0005",
            GenericsOverflow { .. } => "E0006",
            MissingGenerics { .. } => "E0007",
            GenericsNotAllowed { .. } => "E0008",
            CannotInfer { .. } => "E0009",
            ConflictingGeneric { .. } => "E0010",
            CyclicStructField { .. } => "E0011",
            CyclicAlias { .. } => "E0012",
            InvalidReference { .. } => "E0013",
            InvalidUnsafePointer { .. } => "E0014",
            ArgumentCount { .. } => "E0015",
            NotCallable { .. } => "E0016",
            NoField { .. } => "E0017",
            NotIndexable { .. } => "E0018",
            NotIterable { .. } => "E0019",
            InvalidOperator { .. } => "E0020",
            DivisionByZero { .. } => "E0021",
            ConstantAssignment { .. } => "E0022",
            NotAssignable { .. } => "E0023",
            NotAddressable { .. } => "E0024",
            MissingTraitMethod { .. } => "E0025",
            TraitMethodMismatch { .. } => "E0026",
            NotATrait { .. } => "E0027",
            MissingReturn { .. } => "E0028",
            InvalidReturn { .. } => "E0029",
            BreakOutsideLoop { .. } => "E0030",
            InvalidFall { .. } => "E0031",
            LabelNotFound { .. } => "E0032",
            InvalidArraySize { .. } => "E0033",
            IndexOutOfRange { .. } => "E0034",
            UsePathNotFound { .. } => "E0035",
            Private { .. } => "E0036",
            NotAValue { .. } => "E0037",
            NotConstant { .. } => "E0038",
            InvalidCast { .. } => "E0039",
            SpreadNotAllowed { .. } => "E0040",
            UntypedNil { .. } => "E0041",
            ValueCount { .. } => "E0042",
            InvalidComposite { .. } => "E0043",
            InvalidEnumBase { .. } => "E0044",
            GlobalCycle { .. } => "E0045",
            ImportCycle { .. } => "E0046",
            EmptySliceLiteral { .. } => "E0047",
            InvalidImplTarget { .. } => "E0048",
            UnusedLocal { .. } => "W0001",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            TypeError::UnusedLocal { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }

    pub fn to_diagnostic(&self, files: &SourceMap) -> Diagnostic {
        let loc = self.loc();
        let path = files.path(loc.file);
        let diag = match self.severity() {
            Severity::Error => Diagnostic::error(path, loc.row, loc.column, self.to_string()),
            Severity::Warning => Diagnostic::warning(path, loc.row, loc.column, self.to_string()),
        };
        diag.with_code(self.code())
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TypeError::*;
        match self {
            DuplicateIdent { name, previous, .. } => write!(
                f,
                "`{name}` is already declared (first declared at {}:{})",
                previous.row, previous.column
            ),
            NotFound { name, .. } => write!(f, "identifier not found: `{name}`"),
            InvalidTypeSource { name, .. } => write!(f, "`{name}` does not name a type"),
            IncompatibleTypes { expected, found, .. } => {
                write!(f, "incompatible types: expected `{expected}`, found `{found}`")
            }
            Overflow { value, target, .. } => write!(f, "constant {value} overflows `{target}`"),
            GenericsOverflow {
                name,
                expected,
                found,
                ..
            } => write!(
                f,
                "too many generic arguments for `{name}`: expected {expected}, found {found}"
            ),
            MissingGenerics {
                name,
                expected,
                found,
                ..
            } => write!(
                f,
                "missing generic arguments for `{name}`: expected {expected}, found {found}"
            ),
            GenericsNotAllowed { name, .. } => write!(f, "`{name}` does not take generic arguments"),
            CannotInfer { param, callee, .. } => write!(
                f,
                "cannot infer generic parameter `{param}` of `{callee}`; pass it explicitly"
            ),
            ConflictingGeneric {
                param,
                first,
                second,
                ..
            } => write!(
                f,
                "generic parameter `{param}` bound to both `{first}` and `{second}`"
            ),
            CyclicStructField { name, field, .. } => {
                write!(f, "struct `{name}` contains itself through field `{field}`")
            }
            CyclicAlias { name, .. } => write!(f, "type alias `{name}` refers to itself"),
            InvalidReference { ty, .. } => write!(f, "invalid reference type `{ty}`"),
            InvalidUnsafePointer { reason, .. } => write!(f, "invalid use of `*unsafe`: {reason}"),
            ArgumentCount {
                callee,
                expected,
                found,
                variadic,
                ..
            } => {
                let at_least = if *variadic { "at least " } else { "" };
                write!(
                    f,
                    "`{callee}` takes {at_least}{expected} argument{}, found {found}",
                    if *expected == 1 { "" } else { "s" }
                )
            }
            NotCallable { ty, .. } => write!(f, "value of type `{ty}` is not callable"),
            NoField { ty, name, .. } => write!(f, "`{ty}` has no field or method `{name}`"),
            NotIndexable { ty, .. } => write!(f, "cannot index a value of type `{ty}`"),
            NotIterable { ty, .. } => write!(f, "cannot iterate over a value of type `{ty}`"),
            InvalidOperator { op, lhs, rhs, .. } => match rhs {
                Some(rhs) => write!(f, "invalid operation: `{lhs}` {op} `{rhs}`"),
                None => write!(f, "invalid operation: `{op}` on `{lhs}`"),
            },
            DivisionByZero { .. } => write!(f, "division by constant zero"),
            ConstantAssignment { name, .. } => write!(f, "cannot assign to constant `{name}`"),
            NotAssignable { expr, .. } => write!(f, "cannot assign to `{expr}`"),
            NotAddressable { expr, .. } => write!(f, "cannot take a reference to `{expr}`"),
            MissingTraitMethod {
                trait_name,
                method,
                target,
                ..
            } => write!(
                f,
                "`{target}` does not implement `{trait_name}`: missing method `{method}`"
            ),
            TraitMethodMismatch {
                trait_name,
                method,
                expected,
                found,
                ..
            } => write!(
                f,
                "method `{method}` does not match `{trait_name}`: expected `{expected}`, found `{found}`"
            ),
            NotATrait { name, .. } => write!(f, "`{name}` is not a trait"),
            MissingReturn { name, .. } => write!(f, "function `{name}` is missing a return at the end"),
            InvalidReturn { expected, found, .. } => write!(
                f,
                "wrong number of return values: expected {expected}, found {found}"
            ),
            BreakOutsideLoop { keyword, .. } => write!(f, "`{keyword}` outside of a loop"),
            InvalidFall { .. } => write!(f, "`fall` is only allowed as the last statement of a non-final case"),
            LabelNotFound { name, .. } => write!(f, "label `{name}` not found"),
            InvalidArraySize { reason, .. } => write!(f, "invalid array size: {reason}"),
            IndexOutOfRange { index, len, .. } => {
                write!(f, "index {index} out of range for array of length {len}")
            }
            UsePathNotFound { path, .. } => write!(f, "package `{path}` not found"),
            Private { name, package, .. } => write!(f, "`{name}` is not public in `{package}`"),
            UnusedLocal { name, .. } => write!(f, "unused local `{name}`"),
            NotAValue { name, .. } => write!(f, "`{name}` is not a value"),
            NotConstant { what, .. } => write!(f, "{what} must be a constant"),
            InvalidCast { from, to, .. } => write!(f, "cannot convert `{from}` to `{to}`"),
            SpreadNotAllowed { .. } => {
                write!(f, "`...` is only allowed on the last argument of a variadic call")
            }
            UntypedNil { .. } => write!(f, "use of untyped `nil`"),
            ValueCount { expected, found, .. } => {
                write!(f, "assignment mismatch: {expected} targets but {found} values")
            }
            InvalidComposite { ty, .. } => write!(f, "invalid composite literal type `{ty}`"),
            EmptySliceLiteral { .. } => {
                write!(f, "cannot infer the element type of an empty slice literal")
            }
            InvalidEnumBase { ty, .. } => write!(f, "enum base must be an integer type, found `{ty}`"),
            GlobalCycle { name, .. } => write!(f, "initializer of `{name}` refers to itself"),
            ImportCycle { cycle, .. } => write!(f, "import cycle: {cycle}"),
            InvalidImplTarget { name, .. } => {
                write!(f, "cannot implement methods on `{name}`: not a struct of this package")
            }
        }
    }
}

impl std::error::Error for TypeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_common::span::{FileId, Span};

    fn loc(row: u32, column: u32) -> Loc {
        Loc::new(FileId(0), row, column, Span::new(0, 1))
    }

    #[test]
    fn messages_name_the_types() {
        let err = TypeError::IncompatibleTypes {
            expected: Ty::INT,
            found: Ty::STR,
            loc: loc(1, 1),
        };
        assert_eq!(err.to_string(), "incompatible types: expected `int`, found `str`");
        let err = TypeError::ArgumentCount {
            callee: "f".into(),
            expected: 1,
            found: 3,
            variadic: true,
            loc: loc(1, 1),
        };
        assert_eq!(err.to_string(), "`f` takes at least 1 argument, found 3");
    }

    #[test]
    fn unused_local_is_a_warning() {
        let mut files = SourceMap::new();
        let file = files.add("main.tn", "");
        let err = TypeError::UnusedLocal {
            name: "y".into(),
            loc: Loc::new(file, 4, 5, Span::new(0, 1)),
        };
        assert!(!err.is_error());
        assert_eq!(
            err.to_diagnostic(&files).to_string(),
            "main.tn:4:5: warning[W0001]: unused local `y`"
        );
    }
}
