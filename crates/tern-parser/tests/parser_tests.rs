//! Parser integration tests: expressions are rendered in prefix form with
//! `debug_expr` and snapshotted; statements and declarations are checked
//! structurally.

use insta::assert_snapshot;
use tern_common::span::FileId;
use tern_parser::ast::{
    ArraySize, AssignOp, ExprKind, FnDecl, ItemKind, LinkDecl, LitKind, LoopKind, PrimType,
    StmtKind, TypeKind, UseSelection,
};
use tern_parser::{debug_expr, parse, parse_expr, parse_type, Parse};

fn expr(source: &str) -> String {
    match parse_expr(source) {
        Ok(expr) => debug_expr(&expr),
        Err(errors) => {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            format!("errors: {}", messages.join("; "))
        }
    }
}

fn file(source: &str) -> Parse {
    parse(source, FileId(0))
}

fn error_messages(parse: &Parse) -> Vec<String> {
    parse.errors().iter().map(|e| e.to_string()).collect()
}

fn only_fn(parse: &Parse) -> &FnDecl {
    assert!(parse.ok(), "unexpected errors: {:?}", error_messages(parse));
    match &parse.tree().items[..] {
        [item] => match &item.kind {
            ItemKind::Fn(decl) => decl,
            other => panic!("expected a function, got {other:?}"),
        },
        items => panic!("expected one item, got {}", items.len()),
    }
}

// ── Expressions ────────────────────────────────────────────────────────

#[test]
fn multiplication_binds_tighter() {
    assert_snapshot!(expr("a + b * c"), @"(+ a (* b c))");
}

#[test]
fn same_tier_groups_left() {
    assert_snapshot!(expr("a - b - c"), @"(- (- a b) c)");
    assert_snapshot!(expr("a / b * c"), @"(* (/ a b) c)");
}

#[test]
fn logical_and_comparison_tiers() {
    assert_snapshot!(expr("a || b && c == d"), @"(|| a (&& b (== c d)))");
    assert_snapshot!(expr("x << 2 | y & 1"), @"(| (<< x 2) (& y 1))");
}

#[test]
fn unary_operators() {
    assert_snapshot!(expr("-x * y"), @"(* (- x) y)");
    assert_snapshot!(expr("a * -b"), @"(* a (- b))");
    assert_snapshot!(expr("!ok && *p"), @"(&& (! ok) (* p))");
}

#[test]
fn parentheses_override_precedence() {
    assert_snapshot!(expr("(a + b) * c"), @"(* (+ a b) c)");
}

#[test]
fn calls_selectors_and_paths() {
    assert_snapshot!(expr("f(a, b + 1)"), @"(call f a (+ b 1))");
    assert_snapshot!(expr("p.pos.x"), @"(. x (. pos p))");
    assert_snapshot!(expr("io::read(buf)"), @"(call io::read buf)");
    assert_snapshot!(expr("cpp.puts(s)"), @"(call cpp.puts s)");
}

#[test]
fn casts() {
    assert_snapshot!(expr("(i64)(x)"), @"(cast i64 x)");
    assert_snapshot!(expr("(*u8)(p) + 1"), @"(+ (cast *u8 p) 1)");
}

#[test]
fn index_keeps_both_readings() {
    // A plain name inside brackets may be a generic argument or an index.
    assert_snapshot!(expr("max[i32](a, b)"), @"(call (index [i32] max i32) a b)");
    assert_snapshot!(expr(r#"m["k"]"#), @r#"(index m "k")"#);
    assert_snapshot!(expr("xs[i + 1]"), @"(index xs (+ i 1))");
}

#[test]
fn slicing() {
    assert_snapshot!(expr("xs[1:]"), @"(slice xs 1 _)");
    assert_snapshot!(expr("xs[:n]"), @"(slice xs _ n)");
}

#[test]
fn composite_literals() {
    assert_snapshot!(expr("Point{x: 1, y: 2}"), @"(composite Point (x 1) (y 2))");
    assert_snapshot!(expr("[]int{1, 2}"), @"(composite []int 1 2)");
    assert_snapshot!(expr("[]*Node{}"), @"(composite []*Node)");
    assert_snapshot!(expr("&Point{x: 1}"), @"(& (composite Point (x 1)))");
    assert_snapshot!(expr(r#"[str:int]{"a": 1}"#), @r#"(composite [str:int] ("a" 1))"#);
}

#[test]
fn slice_literals_tuples_and_spread() {
    assert_snapshot!(expr("[1, 2, 3]"), @"(slice-lit 1 2 3)");
    assert_snapshot!(expr("(a, b)"), @"(tuple a b)");
    assert_snapshot!(expr("f(xs...)"), @"(call f (... xs))");
}

#[test]
fn function_literal_argument() {
    assert_snapshot!(
        expr("apply(fn(x: i32) i32 { ret x * 2 }, 3)"),
        @"(call apply (fn/1) 3)"
    );
}

#[test]
fn literal_values() {
    let lit = |source: &str| match parse_expr(source).unwrap().kind {
        ExprKind::Lit(lit) => lit.kind,
        other => panic!("not a literal: {other:?}"),
    };
    assert_eq!(lit("0xff"), LitKind::Int(255));
    assert_eq!(lit("1_000"), LitKind::Int(1000));
    assert_eq!(lit("2.5"), LitKind::Float(2.5));
    assert_eq!(lit(r#""a\tb""#), LitKind::Str("a\tb".into()));
    assert_eq!(lit("'x'"), LitKind::Rune('x'));
    assert_eq!(lit("true"), LitKind::Bool(true));
}

#[test]
fn malformed_expressions() {
    assert_snapshot!(expr("a +"), @"errors: 1:3: missing right operand for `+`");
    assert_snapshot!(expr("()"), @"errors: 1:1: empty parentheses");
}

// ── Types ──────────────────────────────────────────────────────────────

#[test]
fn canonical_type_rendering_round_trips() {
    for source in [
        "i32",
        "*i32",
        "&Point",
        "[]str",
        "[4]u8",
        "[...]i32",
        "[str:i32]",
        "(i32, str)",
        "fn(i32, ...str) i32",
        "fn()",
        "cpp.FILE",
        "ns::Pair[i32, str]",
        "*unsafe",
        "[][]*Node[T]",
    ] {
        let ty = parse_type(source).unwrap_or_else(|e| panic!("{source}: {e:?}"));
        assert_eq!(ty.to_string(), source);
    }
}

#[test]
fn type_shapes() {
    let ty = parse_type("[8]u16").unwrap();
    match ty.kind {
        TypeKind::Array { size: ArraySize::Expr(_), elem } => {
            assert_eq!(elem.kind, TypeKind::Prim(PrimType::U16))
        }
        other => panic!("expected an array, got {other:?}"),
    }
    let ty = parse_type("fn(a: i32, b: i32) bool").unwrap();
    assert_eq!(ty.to_string(), "fn(i32, i32) bool");
}

#[test]
fn rejected_reference_types() {
    assert!(parse_type("&&i32").is_err());
    assert!(parse_type("&*i32").is_err());
    assert!(parse_type("i32[u8]").is_err());
}

// ── Declarations ───────────────────────────────────────────────────────

#[test]
fn typed_global_declaration() {
    let parse = file("x : i32 = 5 ;");
    assert!(parse.ok());
    let ItemKind::Global(var) = &parse.tree().items[0].kind else {
        panic!("expected a global");
    };
    assert_eq!(var.names[0].name, "x");
    assert_eq!(var.ty.as_ref().map(|t| t.to_string()).as_deref(), Some("i32"));
    let init = var.init.as_ref().unwrap();
    assert!(matches!(&init.kind, ExprKind::Lit(lit) if lit.kind == LitKind::Int(5)));
}

#[test]
fn functions_with_generics_and_grouped_params() {
    let parse = file("pub fn swap[T](a, b: T) (T, T) {\n    ret b, a\n}\n");
    let decl = only_fn(&parse);
    assert!(parse.tree().items[0].public);
    assert_eq!(decl.name.name, "swap");
    assert_eq!(decl.generics[0].name, "T");
    let types: Vec<String> = decl.params.iter().map(|p| p.ty.as_ref().unwrap().to_string()).collect();
    assert_eq!(types, vec!["T", "T"]);
    assert_eq!(decl.result.as_ref().unwrap().to_string(), "(T, T)");
    let body = decl.body.as_ref().unwrap();
    assert!(matches!(&body.stmts[0].kind, StmtKind::Ret(Some(e)) if matches!(e.kind, ExprKind::Tuple(_))));
}

#[test]
fn docs_and_attributes_attach_to_the_next_declaration() {
    let parse = file("// Adds two numbers.\n#inline\nfn add(a, b: i32) i32 {\n    ret a + b\n}\n");
    assert!(parse.ok(), "{:?}", error_messages(&parse));
    let item = &parse.tree().items[0];
    assert_eq!(item.doc.as_deref(), Some("Adds two numbers."));
    assert_eq!(item.attrs[0].name.name, "inline");
}

#[test]
fn attribute_on_use_is_an_error() {
    let parse = file("#inline\nuse fmt\n");
    assert_eq!(
        error_messages(&parse),
        vec!["1:2: attribute `inline` cannot be applied to a `use` declaration"]
    );
}

#[test]
fn doc_comment_needs_an_attachable_declaration() {
    let parse = file("// Formatting helpers.\nuse fmt\n");
    assert_eq!(
        error_messages(&parse),
        vec!["1:1: doc comment cannot be applied to a `use` declaration"]
    );

    let parse = file("fn f() {}\n// Trailing.\n");
    assert_eq!(
        error_messages(&parse),
        vec!["2:1: doc comment is not followed by a declaration"]
    );
}

#[test]
fn use_forms() {
    let parse = file("use fmt\nuse std::io::{read, write}\nuse math::*\nuse cpp \"stdio.h\"\n");
    assert!(parse.ok(), "{:?}", error_messages(&parse));
    let selections: Vec<&UseSelection> = parse
        .tree()
        .items
        .iter()
        .map(|item| match &item.kind {
            ItemKind::Use(decl) => &decl.selection,
            other => panic!("expected use, got {other:?}"),
        })
        .collect();
    assert_eq!(selections[0], &UseSelection::Namespace);
    assert!(matches!(selections[1], UseSelection::Names(names) if names.len() == 2));
    assert_eq!(selections[2], &UseSelection::All);
    assert_eq!(selections[3], &UseSelection::Header("stdio.h".into()));
}

#[test]
fn type_declarations() {
    let source = "\
struct Pair[T] {
    pub first: T
    second: T
}
enum Color: u8 { Red, Green = 5 }
type Bytes = []u8
trait Shape {
    fn area(&self) f64
}
impl Shape for Circle {
    fn area(&self) f64 {
        ret 3.14 * self.r * self.r
    }
}
cpp fn printf(format: str, args: ...any) i32
cpp type FILE
";
    let parse = file(source);
    assert!(parse.ok(), "{:?}", error_messages(&parse));
    let items = &parse.tree().items;
    assert_eq!(items.len(), 7);

    let ItemKind::Struct(pair) = &items[0].kind else { panic!() };
    assert_eq!(pair.generics.len(), 1);
    assert!(pair.fields[0].public && !pair.fields[1].public);

    let ItemKind::Enum(color) = &items[1].kind else { panic!() };
    assert_eq!(color.base.as_ref().unwrap().to_string(), "u8");
    assert!(color.items[0].value.is_none() && color.items[1].value.is_some());

    let ItemKind::TypeAlias(alias) = &items[2].kind else { panic!() };
    assert_eq!(alias.ty.to_string(), "[]u8");

    let ItemKind::Trait(shape) = &items[3].kind else { panic!() };
    assert!(shape.methods[0].receiver.unwrap().by_ref);
    assert!(shape.methods[0].body.is_none());

    let ItemKind::Impl(imp) = &items[4].kind else { panic!() };
    assert_eq!(imp.trait_name.as_ref().unwrap().to_string(), "Shape");
    assert_eq!(imp.target.name, "Circle");
    assert!(imp.methods[0].body.is_some());

    let ItemKind::Link(LinkDecl::Fn(printf)) = &items[5].kind else { panic!() };
    assert!(printf.is_variadic());
    assert!(matches!(&items[6].kind, ItemKind::Link(LinkDecl::Type(name)) if name.name == "FILE"));
}

#[test]
fn trait_methods_need_a_receiver() {
    let parse = file("trait T {\n    fn f() i32\n}\n");
    assert_eq!(error_messages(&parse), vec!["2:8: trait method `f` must take `self` or `&self`"]);
}

// ── Statements ─────────────────────────────────────────────────────────

#[test]
fn statement_forms() {
    let source = "\
fn main() {
    x := 1
    let y: i32 = 2
    const limit = 10
    a, b := pair()
    x += 2
    x++
    if x > 0 {
        print(x)
    } else if x < 0 {
        print(0)
    } else {
        print(1)
    }
    for i, v in xs {
        continue
    }
    for x < limit {
        break
    }
    for {
        ret
    }
    defer close(f)
    co worker(1)
    unsafe {
        poke(p)
    }
done:
    goto done
}
";
    let parse = file(source);
    let decl = only_fn(&parse);
    let stmts = &decl.body.as_ref().unwrap().stmts;
    let kinds: Vec<&StmtKind> = stmts.iter().map(|s| &s.kind).collect();
    assert_eq!(kinds.len(), 15);
    assert!(matches!(kinds[0], StmtKind::Var(v) if v.ty.is_none() && !v.constant));
    assert!(matches!(kinds[1], StmtKind::Var(v) if v.ty.is_some()));
    assert!(matches!(kinds[2], StmtKind::Var(v) if v.constant));
    assert!(matches!(kinds[3], StmtKind::Var(v) if v.names.len() == 2));
    assert!(matches!(kinds[4], StmtKind::Assign(a) if matches!(a.op, AssignOp::Compound(_))));
    assert!(matches!(kinds[5], StmtKind::Assign(a) if a.op == AssignOp::Inc && a.values.is_empty()));
    assert!(matches!(kinds[6], StmtKind::If(s) if s.branches.len() == 2 && s.else_block.is_some()));
    assert!(matches!(
        kinds[7],
        StmtKind::Loop(l) if matches!(&l.kind, LoopKind::Iter { key: Some(_), value: Some(_), .. })
    ));
    assert!(matches!(kinds[8], StmtKind::Loop(l) if matches!(l.kind, LoopKind::While(_))));
    assert!(matches!(kinds[9], StmtKind::Loop(l) if matches!(l.kind, LoopKind::Infinite)));
    assert!(matches!(kinds[10], StmtKind::Defer(_)));
    assert!(matches!(kinds[11], StmtKind::Co(_)));
    assert!(matches!(kinds[12], StmtKind::Block { unsafe_: true, .. }));
    assert!(matches!(kinds[13], StmtKind::Label(l) if l.name == "done"));
    assert!(matches!(kinds[14], StmtKind::Goto(l) if l.name == "done"));
}

#[test]
fn match_cases_and_default() {
    let source = "\
fn classify(n: i32) {
    match n {
    case 1, 2:
        print(\"small\")
    case 3: print(\"three\")
    default:
        print(\"big\")
        print(n)
    }
}
";
    let parse = file(source);
    let decl = only_fn(&parse);
    let StmtKind::Match(m) = &decl.body.as_ref().unwrap().stmts[0].kind else {
        panic!("expected match");
    };
    assert!(m.subject.is_some());
    assert_eq!(m.cases.len(), 2);
    assert_eq!(m.cases[0].values.len(), 2);
    assert_eq!(m.cases[1].body.stmts.len(), 1);
    assert_eq!(m.default.as_ref().unwrap().body.stmts.len(), 2);
}

#[test]
fn destructuring_let() {
    let parse = file("fn f() {\n    let (q, r) = divmod(7, 2)\n}\n");
    let decl = only_fn(&parse);
    let StmtKind::Var(var) = &decl.body.as_ref().unwrap().stmts[0].kind else { panic!() };
    let names: Vec<&str> = var.names.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["q", "r"]);
}

#[test]
fn operator_at_row_end_continues_the_statement() {
    let parse = file("fn f() {\n    x := 1 +\n        2\n    print(x)\n}\n");
    let decl = only_fn(&parse);
    assert_eq!(decl.body.as_ref().unwrap().stmts.len(), 2);
}

// ── Errors and recovery ────────────────────────────────────────────────

#[test]
fn statement_errors_recover() {
    let source = "\
fn f() {
    1 + 2
    if true {
    }
    else {
    }
    case 1:
    print(1)
}
";
    let parse = file(source);
    assert_eq!(
        error_messages(&parse),
        vec![
            "2:5: expression is not a statement; only calls may stand alone",
            "5:5: `else` without `if`",
            "7:5: `case` outside of `match`",
        ]
    );
    assert!(!parse.halted());
    let decl = match &parse.tree().items[0].kind {
        ItemKind::Fn(decl) => decl,
        _ => panic!(),
    };
    assert_eq!(decl.body.as_ref().unwrap().stmts.len(), 2);
}

#[test]
fn missing_parameter_types() {
    let parse = file("fn f(a, b) {\n}\nfn g(x: i32, x: i32) {\n}\n");
    assert_eq!(
        error_messages(&parse),
        vec![
            "1:6: missing type for parameter `a` of `f`",
            "1:9: missing type for parameter `b` of `f`",
            "3:14: duplicate parameter `x`",
        ]
    );
}

#[test]
fn unclosed_delimiter_halts() {
    let parse = file("fn a() {\n}\nfn b() {\n    x := 1\n");
    assert!(parse.halted());
    assert_eq!(error_messages(&parse), vec!["3:8: unclosed `{`"]);
    assert_eq!(parse.tree().items.len(), 1);
}

#[test]
fn missing_body_at_end_halts() {
    let parse = file("fn a() {\n}\nfn b() i32");
    assert!(parse.halted());
    assert_eq!(error_messages(&parse), vec!["3:8: missing body for function `b`"]);
}

#[test]
fn missing_body_before_more_input_recovers() {
    let parse = file("fn a()\nfn b() {\n}\n");
    assert!(!parse.halted());
    assert_eq!(error_messages(&parse), vec!["1:6: missing body for function `a`"]);
    assert_eq!(parse.tree().items.len(), 1);
}

#[test]
fn unexpected_closer_skips_the_statement() {
    let parse = file("x := 1)\nfn main() {\n}\n");
    assert!(!parse.halted());
    assert_eq!(error_messages(&parse), vec!["1:7: unexpected `)`"]);
    assert_eq!(parse.tree().items.len(), 1);
}

#[test]
fn lexical_errors_are_reported() {
    let parse = file("x := \"open\n");
    assert!(!parse.ok());
    let messages = error_messages(&parse);
    assert!(messages.contains(&"1:6: unterminated string literal".to_string()), "{messages:?}");
}
