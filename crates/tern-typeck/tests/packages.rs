//! Multi-package checking: imports, visibility, and import cycles.

use tern_common::span::FileId;
use tern_parser::SourceTree;
use tern_typeck::error::TypeError;
use tern_typeck::{check_with, CheckOptions, TypeckResult};

// ── Helpers ────────────────────────────────────────────────────────────

fn tree(src: &str, file: u32) -> SourceTree {
    let parse = tern_parser::parse(src, FileId(file));
    assert!(parse.ok(), "parse errors: {:?}", parse.errors());
    parse.into_parts().0
}

fn errors(result: &TypeckResult) -> Vec<&TypeError> {
    result.errors.iter().filter(|e| e.is_error()).collect()
}

fn assert_no_errors(result: &TypeckResult) {
    let errors = errors(result);
    assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
}

const GEO: &str = "\
pub fn area(w: int, h: int) int {
    ret w * h
}
fn secret() int {
    ret 42
}
pub struct Point {
    pub x: int
    y: int
}
pub const ORIGIN = 0
";

fn check_with_geo(main: &str) -> TypeckResult {
    let main = [tree(main, 0)];
    let geo = [tree(GEO, 1)];
    check_with(CheckOptions::default(), &[("main", &main[..]), ("geo", &geo[..])])
}

// ── Imports ────────────────────────────────────────────────────────────

#[test]
fn namespace_import() {
    let result = check_with_geo("use geo\nfn main() {\n    print(geo::area(2, 3))\n}\n");
    assert_no_errors(&result);
    assert!(result.used.functions.contains("geo::area"), "{:?}", result.used.functions);
    assert!(result.used.functions.contains("main"));
}

#[test]
fn selected_and_glob_imports() {
    let result = check_with_geo("use geo::{area}\nfn main() {\n    print(area(2, 3))\n}\n");
    assert_no_errors(&result);
    let result = check_with_geo("use geo::*\nfn main() {\n    print(area(2, ORIGIN))\n}\n");
    assert_no_errors(&result);
    assert!(result.used.globals.contains("geo::ORIGIN"), "{:?}", result.used.globals);
}

#[test]
fn glob_import_skips_private_names() {
    let result = check_with_geo("use geo::*\nfn main() {\n    print(secret())\n}\n");
    assert!(
        result
            .errors
            .iter()
            .any(|e| matches!(e, TypeError::NotFound { name, .. } if name == "secret")),
        "{:?}",
        result.errors
    );
}

#[test]
fn private_function_through_namespace() {
    let result = check_with_geo("use geo\nfn main() {\n    print(geo::secret())\n}\n");
    let errors = errors(&result);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(errors[0].to_string(), "`secret` is not public in `geo`");
}

#[test]
fn private_field_in_literal() {
    let result = check_with_geo("use geo\nfn main() {\n    p := geo::Point{x: 1, y: 2}\n    print(p.x)\n}\n");
    assert!(
        result
            .errors
            .iter()
            .any(|e| matches!(e, TypeError::Private { name, .. } if name == "y")),
        "{:?}",
        result.errors
    );
}

#[test]
fn unknown_package() {
    let main = [tree("use nowhere\n", 0)];
    let result = check_with(CheckOptions::default(), &[("main", &main[..])]);
    assert!(matches!(
        errors(&result).as_slice(),
        [TypeError::UsePathNotFound { path, .. }] if path == "nowhere"
    ));
}

#[test]
fn nested_package_path_uses_last_segment() {
    let fmt = [tree("pub fn show(n: int) str {\n    ret \"n\"\n}\n", 1)];
    let main = [tree("use std::fmt\nfn main() {\n    print(fmt::show(1))\n}\n", 0)];
    let result = check_with(CheckOptions::default(), &[("std::fmt", &fmt[..]), ("main", &main[..])]);
    assert_no_errors(&result);
    assert!(result.used.functions.contains("fmt::show"), "{:?}", result.used.functions);
}

#[test]
fn types_from_other_packages_render_qualified() {
    let result = check_with_geo("use geo\nfn main() {\n    p: geo::Point = 1\n    print(p)\n}\n");
    let errors = errors(&result);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(
        errors[0].to_string(),
        "incompatible types: expected `geo::Point`, found `int`"
    );
}

// ── Same-named packages ────────────────────────────────────────────────

const A_UTIL: &str = "pub struct S {\n    pub x: int\n}\n";
const B_UTIL: &str = "pub struct S {\n    pub name: str\n}\n";

/// `main` split over two files, each importing a different `util`.
fn check_two_utils(left: &str, right: &str) -> TypeckResult {
    let a = [tree(A_UTIL, 1)];
    let b = [tree(B_UTIL, 2)];
    let main = [tree(left, 0), tree(right, 3)];
    check_with(
        CheckOptions::default(),
        &[("a::util", &a[..]), ("b::util", &b[..]), ("main", &main[..])],
    )
}

#[test]
fn same_named_structs_get_separate_instances() {
    let left = "\
use a::util
struct Box[T] {
    v: T
}
fn left() {
    b := Box(util::S{x: 1})
    print(b.v.x)
}
";
    let right = "\
use b::util
fn right() {
    b := Box(util::S{name: \"s\"})
    print(b.v.name)
}
";
    let result = check_two_utils(left, right);
    assert_no_errors(&result);
}

#[test]
fn same_named_structs_instantiate_a_generic_twice() {
    let left = "\
use a::util
fn id[T](v: T) T {
    ret v
}
fn left() {
    s := id(util::S{x: 1})
    print(s.x)
}
";
    let right = "\
use b::util
fn right() {
    s := id(util::S{name: \"s\"})
    print(s.name)
}
";
    let result = check_two_utils(left, right);
    assert_no_errors(&result);
    let ids: Vec<_> = result
        .generic_instances
        .iter()
        .filter(|i| i.function == "id")
        .collect();
    assert_eq!(ids.len(), 2, "{:?}", result.generic_instances);
    assert_ne!(ids[0].generics, ids[1].generics);
}

// ── Cycles ─────────────────────────────────────────────────────────────

#[test]
fn import_cycle_is_reported_once() {
    let a = [tree("use b\npub fn fa() int {\n    ret 1\n}\n", 0)];
    let b = [tree("use a\npub fn fb() int {\n    ret 2\n}\n", 1)];
    let result = check_with(CheckOptions::default(), &[("a", &a[..]), ("b", &b[..])]);
    let cycles: Vec<&TypeError> = result
        .errors
        .iter()
        .filter(|e| matches!(e, TypeError::ImportCycle { .. }))
        .collect();
    assert_eq!(cycles.len(), 1, "{:?}", result.errors);
    let message = cycles[0].to_string();
    assert!(message.starts_with("import cycle: "), "{message}");
    assert!(message.contains('a') && message.contains('b'), "{message}");
    // Both packages are still checked.
    assert!(result.used.functions.contains("a::fa"));
    assert!(result.used.functions.contains("b::fb"));
}

#[test]
fn self_import_is_not_a_cycle() {
    let main = [tree("use main\nfn main() {\n    print(1)\n}\n", 0)];
    let result = check_with(CheckOptions::default(), &[("main", &main[..])]);
    assert!(
        !result.errors.iter().any(|e| matches!(e, TypeError::ImportCycle { .. })),
        "{:?}",
        result.errors
    );
}
