//! Generic functions and structs: explicit arguments, inference from
//! parameters, and one body check per distinct argument list.

use tern_common::span::FileId;
use tern_parser::parse_type;
use tern_parser::SourceTree;
use tern_typeck::error::TypeError;
use tern_typeck::session::Session;
use tern_typeck::ty::{PrimType, Ty};
use tern_typeck::{CheckOptions, GenericInstance, TypeckResult};

// ── Helpers ────────────────────────────────────────────────────────────

fn tree(src: &str) -> SourceTree {
    let parse = tern_parser::parse(src, FileId(0));
    assert!(parse.ok(), "parse errors: {:?}", parse.errors());
    parse.into_parts().0
}

fn check_source(src: &str) -> TypeckResult {
    tern_typeck::check(&[tree(src)])
}

fn errors(result: &TypeckResult) -> Vec<&TypeError> {
    result.errors.iter().filter(|e| e.is_error()).collect()
}

fn assert_no_errors(result: &TypeckResult) {
    let errors = errors(result);
    assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
}

fn assert_has_error<F: Fn(&TypeError) -> bool>(result: &TypeckResult, pred: F, desc: &str) {
    assert!(
        result.errors.iter().any(pred),
        "expected error matching `{desc}`, got errors: {:?}",
        result.errors
    );
}

/// Type recorded for the first occurrence of `needle` in `src`.
fn type_of(result: &TypeckResult, src: &str, needle: &str) -> String {
    let start = src.find(needle).unwrap_or_else(|| panic!("`{needle}` not in source")) as u32;
    let span = tern_common::span::Span::new(start, start + needle.len() as u32);
    result
        .types
        .get(&(FileId(0), span))
        .map(|ty| ty.to_string())
        .unwrap_or_else(|| panic!("no type recorded for `{needle}`"))
}

/// Debug logs show each new instantiation and memo hit.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

fn instance(function: &str, generics: Vec<Ty>) -> GenericInstance {
    GenericInstance {
        function: function.into(),
        generics,
    }
}

const ID: &str = "\
fn id[T](v: T) T {
    ret v
}
";

// ── Functions ──────────────────────────────────────────────────────────

#[test]
fn explicit_generic_argument() {
    let src = format!("{ID}fn main() {{\n    print(id[int](1))\n}}\n");
    let result = check_source(&src);
    assert_no_errors(&result);
    assert_eq!(type_of(&result, &src, "id[int](1)"), "int");
    assert_eq!(result.generic_instances, vec![instance("id", vec![Ty::INT])]);
}

#[test]
fn generic_argument_inferred_from_parameter() {
    let src = format!("{ID}fn main() {{\n    print(id(1))\n    print(id(\"s\"))\n}}\n");
    let result = check_source(&src);
    assert_no_errors(&result);
    assert_eq!(type_of(&result, &src, "id(1)"), "int");
    assert_eq!(type_of(&result, &src, "id(\"s\")"), "str");
    assert_eq!(
        result.generic_instances,
        vec![instance("id", vec![Ty::INT]), instance("id", vec![Ty::STR])]
    );
}

#[test]
fn inference_prefers_typed_arguments() {
    let src = "\
fn pick[T](a: T, b: T) T {
    ret a
}
fn main() {
    small: u8 = 7
    print(pick(1, small))
}
";
    let result = check_source(src);
    assert_no_errors(&result);
    assert_eq!(type_of(&result, src, "pick(1, small)"), "u8");
}

#[test]
fn too_many_generic_arguments() {
    let src = format!("{ID}fn main() {{\n    print(id[int, str](1))\n}}\n");
    let result = check_source(&src);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::GenericsOverflow { name, expected: 1, found: 2, .. } if name == "id"),
        "GenericsOverflow on id",
    );
    assert!(result.generic_instances.is_empty());
}

#[test]
fn parameter_only_in_result_cannot_be_inferred() {
    let src = "\
fn empty[T]() []T {
    ret []T{}
}
fn main() {
    print(empty())
    print(len(empty[str]()))
}
";
    let result = check_source(src);
    let errors = errors(&result);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(matches!(errors[0], TypeError::CannotInfer { param, .. } if param == "T"));
}

#[test]
fn conflicting_bindings() {
    let src = "\
fn same[T](a: T, b: T) bool {
    ret true
}
fn main() {
    n: int = 1
    s: str = \"x\"
    print(same(n, s))
}
";
    let result = check_source(src);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::ConflictingGeneric { param, first, second, .. }
            if param == "T" && *first == Ty::INT && *second == Ty::STR),
        "ConflictingGeneric T",
    );
}

#[test]
fn generic_bodies_are_checked_per_instance() {
    let src = "\
fn broken[T](v: T) T {
    ret missing
}
";
    assert_no_errors(&check_source(src));

    let called = format!("{src}fn main() {{\n    print(broken(1))\n    print(broken(2))\n}}\n");
    let result = check_source(&called);
    let errors = errors(&result);
    // Both calls share the `int` instance, so the body is reported once.
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(matches!(errors[0], TypeError::NotFound { name, .. } if name == "missing"));
}

#[test]
fn recursive_generic_terminates() {
    init_tracing();
    let src = "\
fn count[T](v: T, n: int) int {
    if n == 0 {
        ret 0
    }
    ret count(v, n - 1) + 1
}
fn main() {
    print(count(\"a\", 3))
}
";
    let result = check_source(src);
    assert_no_errors(&result);
    assert_eq!(result.generic_instances, vec![instance("count", vec![Ty::STR])]);
}

// ── Structs ────────────────────────────────────────────────────────────

#[test]
fn generic_struct_method_instance() {
    let src = "\
struct Cell[T] {
    value: T
}
impl Cell {
    fn get(self) T {
        ret self.value
    }
}
fn main() {
    c := Cell(5)
    print(c.get())
}
";
    let result = check_source(src);
    assert_no_errors(&result);
    assert_eq!(type_of(&result, src, "c.get()"), "int");
    assert_eq!(result.generic_instances, vec![instance("Cell.get", vec![Ty::INT])]);
    assert!(result.used.structs.contains("Cell[int]"), "{:?}", result.used.structs);
    assert!(result.used.functions.contains("Cell.get"));
}

#[test]
fn generic_struct_needs_its_arguments() {
    let src = "\
struct Pair[A, B] {
    first: A
    second: B
}
fn main() {
    p: Pair[int] = Pair(1, 2)
    print(p.first)
}
";
    let result = check_source(src);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::MissingGenerics { expected: 2, found: 1, .. }),
        "MissingGenerics on Pair",
    );
}

// ── Session ────────────────────────────────────────────────────────────

#[test]
fn instantiation_is_memoized() {
    init_tracing();
    let trees = [tree(ID)];
    let mut session = Session::new(CheckOptions::default());
    session.add_package("main", &trees);
    session.check_all();

    let id = session.find_function("id").expect("`id` is declared");
    assert_eq!(session.combines(id), 0);
    assert!(session.instantiate(id, &[Ty::INT]));
    assert!(!session.instantiate(id, &[Ty::INT]));
    assert_eq!(session.combines(id), 1);
    assert!(session.instantiate(id, &[Ty::STR]));
    assert_eq!(session.combines(id), 2);
    assert!(!session.instantiate(id, &[Ty::INT, Ty::STR]));
    assert_eq!(session.combines(id), 2);

    let result = session.finish();
    assert_eq!(result.generic_instances.len(), 2);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::GenericsOverflow { .. }),
        "GenericsOverflow from instantiate",
    );
}

#[test]
fn resolved_types_render_canonically() {
    let src = "\
struct Pair[A, B] {
    first: A
    second: B
}
struct Point {
    x: int
}
";
    let trees = [tree(src)];
    let mut session = Session::new(CheckOptions::default());
    session.add_package("main", &trees);
    session.check_all();

    for text in [
        "i32",
        "*i32",
        "&Point",
        "[]str",
        "[4]u8",
        "[str:i32]",
        "(i32, str)",
        "fn(i32, ...str) i32",
        "Pair[i32, []str]",
    ] {
        let node = parse_type(text).unwrap_or_else(|e| panic!("{text}: {e:?}"));
        let ty = session
            .resolve_type(FileId(0), &node)
            .unwrap_or_else(|e| panic!("{text}: {e:?}"));
        assert_eq!(ty.to_string(), text);
    }

    let node = parse_type("[2 * 4]u8").unwrap();
    assert_eq!(
        session.resolve_type(FileId(0), &node),
        Ok(Ty::Array(8, Box::new(Ty::Prim(PrimType::U8))))
    );

    let node = parse_type("Missing").unwrap();
    assert!(session.resolve_type(FileId(0), &node).is_err());
    let node = parse_type("Pair[i32]").unwrap();
    let errors = session.resolve_type(FileId(0), &node).unwrap_err();
    assert!(matches!(errors.as_slice(), [TypeError::MissingGenerics { .. }]), "{errors:?}");
}
