//! Declarations, assignability, traits and constant folding, checked
//! through whole source files.

use tern_common::span::{FileId, Span};
use tern_typeck::error::TypeError;
use tern_typeck::ty::{PrimType, Ty};
use tern_typeck::{CheckOptions, TypeckResult};

// ── Helpers ────────────────────────────────────────────────────────────

fn check_source(src: &str) -> TypeckResult {
    let parse = tern_parser::parse(src, FileId(0));
    assert!(parse.ok(), "parse errors: {:?}", parse.errors());
    let (tree, _) = parse.into_parts();
    tern_typeck::check(&[tree])
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

fn type_of(result: &TypeckResult, src: &str, needle: &str) -> String {
    let start = src.find(needle).unwrap_or_else(|| panic!("`{needle}` not in source")) as u32;
    let span = Span::new(start, start + needle.len() as u32);
    result
        .type_at(tern_common::span::Loc::new(FileId(0), 0, 0, span))
        .map(|ty| ty.to_string())
        .unwrap_or_else(|| panic!("no type recorded for `{needle}`"))
}

/// Wrap statements in a `main` body.
fn in_main(body: &str) -> String {
    let indented: Vec<String> = body.lines().map(|l| format!("    {l}")).collect();
    format!("fn main() {{\n{}\n}}\n", indented.join("\n"))
}

const U8: Ty = Ty::Prim(PrimType::U8);

// ── Declarations ───────────────────────────────────────────────────────

#[test]
fn declared_type_wins() {
    let src = in_main("answer: i32 = 5\nprint(answer)");
    let result = check_source(&src);
    assert_no_errors(&result);
    assert_eq!(type_of(&result, &src, "answer"), "i32");
}

#[test]
fn untyped_constants_take_default_types() {
    let src = in_main("count := 3\nratio := 0.5\nglyph := 'x'\nprint(count, ratio, glyph)");
    let result = check_source(&src);
    assert_no_errors(&result);
    assert_eq!(type_of(&result, &src, "count"), "int");
    assert_eq!(type_of(&result, &src, "ratio"), "f64");
    assert_eq!(type_of(&result, &src, "glyph"), "i32");
}

#[test]
fn unread_local_is_only_a_warning() {
    let src = in_main("idle := 1");
    let result = check_source(&src);
    assert!(!result.has_errors());
    assert!(matches!(
        &result.errors[..],
        [TypeError::UnusedLocal { name, .. }] if name == "idle"
    ));

    let quiet = tern_parser::parse(&src, FileId(0)).into_parts().0;
    let options = CheckOptions {
        warn_unused_locals: false,
        ..CheckOptions::default()
    };
    let trees = [quiet];
    let result = tern_typeck::check_with(options, &[("main", &trees[..])]);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
}

#[test]
fn redeclaration_in_one_block() {
    let src = in_main("x := 1\nx := 2\nprint(x)");
    let result = check_source(&src);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::DuplicateIdent { name, .. } if name == "x"),
        "DuplicateIdent x",
    );
}

#[test]
fn unknown_identifier() {
    let result = check_source(&in_main("print(nowhere)"));
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::NotFound { name, .. } if name == "nowhere"),
        "NotFound nowhere",
    );
}

#[test]
fn untyped_nil_needs_a_type() {
    let result = check_source(&in_main("p := nil\nprint(p)"));
    assert_has_error(&result, |e| matches!(e, TypeError::UntypedNil { .. }), "UntypedNil");

    let result = check_source(&in_main("p: *int = nil\nprint(p)"));
    assert_no_errors(&result);
}

// ── Constants ──────────────────────────────────────────────────────────

#[test]
fn literal_overflows_u8() {
    let result = check_source(&in_main("b: u8 = 300\nprint(b)"));
    let errors = errors(&result);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(matches!(
        errors[0],
        TypeError::Overflow { value, target, .. } if value == "300" && *target == U8
    ));
}

#[test]
fn literal_fits_u8() {
    assert_no_errors(&check_source(&in_main("b: u8 = 200\nprint(b)")));
}

#[test]
fn folded_constants_are_range_checked() {
    let result = check_source(&in_main("b: u8 = 100 + 156\nprint(b)"));
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::Overflow { value, .. } if value == "256"),
        "Overflow 256",
    );
    assert_no_errors(&check_source(&in_main("b: u8 = 100 + 155\nprint(b)")));
}

#[test]
fn division_by_constant_zero() {
    let result = check_source(&in_main("n := 10 / 0\nprint(n)"));
    assert_has_error(&result, |e| matches!(e, TypeError::DivisionByZero { .. }), "DivisionByZero");
}

#[test]
fn global_constant_sizes_an_array() {
    let src = "\
const width = 4 * 2
fn main() {
    cells: [width]int
    copy: [8]int = cells
    print(copy)
}
";
    let result = check_source(src);
    assert_no_errors(&result);
    assert_eq!(type_of(&result, src, "cells"), "[8]int");
}

#[test]
fn constants_cannot_be_assigned() {
    let result = check_source(&in_main("const limit = 3\nlimit = 4\nprint(limit)"));
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::ConstantAssignment { name, .. } if name == "limit"),
        "ConstantAssignment limit",
    );
}

#[test]
fn self_referencing_global() {
    let result = check_source("let loop_a = loop_a + 1\n");
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::GlobalCycle { name, .. } if name == "loop_a"),
        "GlobalCycle loop_a",
    );
}

// ── Primitive widening ─────────────────────────────────────────────────

#[test]
fn integers_widen_within_signedness() {
    assert_no_errors(&check_source(&in_main("a: i8 = 1\nb: i64 = a\nprint(b)")));
    let result = check_source(&in_main("a: i64 = 1\nb: i8 = a\nprint(b)"));
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::IncompatibleTypes { expected, found, .. }
            if *expected == Ty::Prim(PrimType::I8) && *found == Ty::Prim(PrimType::I64)),
        "IncompatibleTypes i8 <- i64",
    );
    let result = check_source(&in_main("a: u8 = 1\nb: i64 = a\nprint(b)"));
    assert_has_error(&result, |e| matches!(e, TypeError::IncompatibleTypes { .. }), "u8 into i64");
}

#[test]
fn explicit_conversion() {
    assert_no_errors(&check_source(&in_main("a: i64 = 300\nb := (u8)(a)\nprint(b)")));
}

// ── Traits ─────────────────────────────────────────────────────────────

const SPEAKER: &str = "\
trait Speaker {
    fn speak(self) str
}
struct Dog {
    name: str
}
impl Speaker for Dog {
    fn speak(self) str {
        ret self.name
    }
}
struct Rock {
    weight: int
}
";

#[test]
fn implementing_struct_is_assignable_to_trait() {
    let src = format!("{SPEAKER}{}", in_main("d := Dog{name: \"rex\"}\ns: Speaker = d\nprint(s.speak())"));
    let result = check_source(&src);
    assert_no_errors(&result);
    assert!(result.used.traits.contains("Speaker"));
}

#[test]
fn other_struct_is_not_assignable_to_trait() {
    let src = format!("{SPEAKER}{}", in_main("r := Rock{weight: 1}\ns: Speaker = r\nprint(s)"));
    let result = check_source(&src);
    let errors = errors(&result);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(matches!(
        errors[0],
        TypeError::IncompatibleTypes { expected: Ty::Trait(_, t), found: Ty::Struct(s), .. }
            if t == "Speaker" && s.name == "Rock"
    ));
}

#[test]
fn reference_receivers_need_an_indirect_value() {
    let src = "\
trait Named {
    fn name(&self) str
}
struct Cat {
    tag: str
}
impl Named for Cat {
    fn name(&self) str {
        ret self.tag
    }
}
fn main() {
    c := Cat{tag: \"tom\"}
    by_ref: Named = &c
    print(by_ref.name())
    by_value: Named = c
    print(by_value)
}
";
    let result = check_source(src);
    let errors = errors(&result);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(matches!(errors[0], TypeError::IncompatibleTypes { .. }));
}

#[test]
fn missing_trait_method() {
    let src = "\
trait Shape {
    fn area(self) f64
}
struct Square {
    side: f64
}
impl Shape for Square {
}
";
    let result = check_source(src);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::MissingTraitMethod { method, target, .. }
            if method == "area" && target == "Square"),
        "MissingTraitMethod area",
    );
}

#[test]
fn trait_method_signature_must_match() {
    let src = "\
trait Shape {
    fn area(self) f64
}
struct Square {
    side: int
}
impl Shape for Square {
    fn area(self) int {
        ret self.side * self.side
    }
}
";
    let result = check_source(src);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::TraitMethodMismatch { expected, found, .. }
            if expected == "fn(self) f64" && found == "fn(self) int"),
        "TraitMethodMismatch area",
    );
}

// ── Structs and functions ──────────────────────────────────────────────

#[test]
fn struct_containing_itself() {
    let src = "\
struct Node {
    next: Node
}
struct List {
    head: *List
}
";
    let result = check_source(src);
    let errors = errors(&result);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(matches!(errors[0], TypeError::CyclicStructField { name, field, .. }
        if name == "Node" && field == "next"));
}

#[test]
fn missing_return() {
    let src = "\
fn sign(n: int) int {
    if n > 0 {
        ret 1
    }
}
fn main() {
    print(sign(1))
}
";
    let result = check_source(src);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::MissingReturn { name, .. } if name == "sign"),
        "MissingReturn sign",
    );
}

#[test]
fn argument_count_and_types() {
    let src = "\
fn add(a: int, b: int) int {
    ret a + b
}
fn main() {
    print(add(1))
    print(add(1, \"two\"))
}
";
    let result = check_source(src);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::ArgumentCount { expected: 2, found: 1, .. }),
        "ArgumentCount add",
    );
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::IncompatibleTypes { expected, found, .. }
            if *expected == Ty::INT && *found == Ty::STR),
        "IncompatibleTypes int <- str",
    );
}

#[test]
fn break_outside_loop() {
    let result = check_source(&in_main("break"));
    assert_has_error(&result, |e| matches!(e, TypeError::BreakOutsideLoop { .. }), "BreakOutsideLoop");
    assert_no_errors(&check_source(&in_main("for {\n    break\n}")));
}

#[test]
fn errors_are_sorted_and_unique() {
    let result = check_source(&in_main("b: u8 = 300\nprint(missing)\nc: u8 = 256\nprint(b, c)"));
    let rows: Vec<u32> = result.errors.iter().map(|e| e.loc().row).collect();
    let mut sorted = rows.clone();
    sorted.sort();
    assert_eq!(rows, sorted);
    assert_eq!(result.errors.len(), 3, "{:?}", result.errors);
}
