//! Rendering of semantic and syntax errors.
//!
//! Each test triggers one error, renders it through the ariadne pipeline
//! without color, and looks for the code, the message and the labels.

use tern_common::source::SourceMap;
use tern_typeck::diagnostics::{render_diagnostic, render_json, render_parse_error, DiagnosticOptions};
use tern_typeck::TypeckResult;

// ── Helpers ────────────────────────────────────────────────────────────

fn opts() -> DiagnosticOptions {
    DiagnosticOptions::default()
}

/// Register `src` as `main.tn` and check it.
fn check_source(src: &str) -> (SourceMap, TypeckResult) {
    let mut files = SourceMap::new();
    let file = files.add("main.tn", src);
    let parse = tern_parser::parse(src, file);
    assert!(parse.ok(), "parse errors: {:?}", parse.errors());
    let (tree, _) = parse.into_parts();
    let result = tern_typeck::check(&[tree]);
    (files, result)
}

fn render_first_error(src: &str) -> String {
    let (files, result) = check_source(src);
    let first = result
        .errors
        .first()
        .unwrap_or_else(|| panic!("expected at least one error for source: {src:?}"));
    render_diagnostic(first, &files, &opts())
}

// ── Snippets ───────────────────────────────────────────────────────────

#[test]
fn overflow_names_the_target() {
    let out = render_first_error("fn main() {\n    b: u8 = 300\n    print(b)\n}\n");
    assert!(out.contains("E0005"), "{out}");
    assert!(out.contains("constant 300 overflows `u8`"), "{out}");
    assert!(out.contains("does not fit in `u8`"), "{out}");
    assert!(out.contains("main.tn"), "{out}");
}

#[test]
fn numeric_mismatch_suggests_a_conversion() {
    let out = render_first_error("fn main() {\n    a: i64 = 1\n    b: i8 = a\n    print(b)\n}\n");
    assert!(out.contains("E0004"), "{out}");
    assert!(out.contains("this is `i64`"), "{out}");
    assert!(out.contains("convert explicitly with `(i8)(..)`"), "{out}");
}

#[test]
fn duplicate_points_at_both_declarations() {
    let out = render_first_error("fn f() {}\nfn f() {}\n");
    assert!(out.contains("E0001"), "{out}");
    assert!(out.contains("declared again here"), "{out}");
    assert!(out.contains("first declared here"), "{out}");
}

#[test]
fn cannot_infer_shows_explicit_form() {
    let out = render_first_error("fn zero[T]() []T {\n    ret []T{}\n}\nfn main() {\n    print(zero())\n}\n");
    assert!(out.contains("E0009"), "{out}");
    assert!(out.contains("`zero[T](..)`"), "{out}");
}

#[test]
fn unused_local_renders_as_warning() {
    let out = render_first_error("fn main() {\n    idle := 1\n}\n");
    assert!(out.contains("W0001"), "{out}");
    assert!(out.contains("Warning"), "{out}");
    assert!(out.contains("never read"), "{out}");
}

#[test]
fn default_output_is_colorless() {
    let (files, result) = check_source("fn main() {\n    print(nowhere)\n}\n");
    let plain = result.render_errors(&files, &opts());
    assert_eq!(plain.len(), 1);
    assert!(!plain[0].contains('\u{1b}'), "{}", plain[0]);
    assert!(plain[0].contains("not found in this scope"), "{}", plain[0]);
}

// ── JSON ───────────────────────────────────────────────────────────────

#[test]
fn json_output_per_diagnostic() {
    let (files, result) = check_source("fn main() {\n    print(nowhere)\n}\n");
    let json = DiagnosticOptions {
        color: false,
        json: true,
    };
    let rendered = result.render_errors(&files, &json);
    insta::assert_snapshot!(rendered.join("\n"), @r#"{"severity":"error","row":2,"column":11,"path":"main.tn","message":"identifier not found: `nowhere`","code":"E0002"}"#);

    let diagnostics = result.diagnostics(&files);
    assert_eq!(render_json(&diagnostics[0]), rendered[0]);
}

// ── Syntax errors ──────────────────────────────────────────────────────

#[test]
fn parse_errors_use_the_same_renderer() {
    let mut files = SourceMap::new();
    let src = "trait T {\n    fn f() i32\n}\n";
    let file = files.add("main.tn", src);
    let parse = tern_parser::parse(src, file);
    let error = parse.errors().first().expect("a syntax error");
    let out = render_parse_error(error, &files, &opts());
    assert!(out.contains(&error.message), "{out}");
    assert!(out.contains("main.tn"), "{out}");

    let json = render_parse_error(error, &files, &DiagnosticOptions { color: false, json: true });
    assert!(json.starts_with(r#"{"severity":"error","row":2,"column":8"#), "{json}");
    assert!(!json.contains("\"code\""), "{json}");
}
