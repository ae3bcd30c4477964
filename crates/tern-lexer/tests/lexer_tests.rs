use insta::assert_snapshot;
use tern_common::span::FileId;
use tern_lexer::Lexer;

/// One line per token: kind, text and 1-based position.
fn render(source: &str) -> String {
    let (tokens, errors) = Lexer::tokenize(source, FileId(0));
    let mut out: Vec<String> = tokens
        .iter()
        .map(|t| format!("{:?} {:?} {}:{}", t.kind, t.text, t.row, t.column))
        .collect();
    out.extend(errors.iter().map(|e| format!("error {} {}:{}", e, e.loc.row, e.loc.column)));
    out.join("\n")
}

#[test]
fn function_with_generics() {
    assert_snapshot!(render("fn id[T](v: T) T {\n    ret v\n}"), @r#"
    Fn "fn" 1:1
    Ident "id" 1:4
    LBracket "[" 1:6
    Ident "T" 1:7
    RBracket "]" 1:8
    LParen "(" 1:9
    Ident "v" 1:10
    Colon ":" 1:11
    Ident "T" 1:13
    RParen ")" 1:14
    Ident "T" 1:16
    LBrace "{" 1:18
    Ret "ret" 2:5
    Ident "v" 2:9
    RBrace "}" 3:1
    "#);
}

#[test]
fn attributes_and_comments() {
    assert_snapshot!(render("// Adds.\n#inline\nfn add() {} // trailing"), @r##"
    Comment "// Adds." 1:1
    Hash "#" 2:1
    Ident "inline" 2:2
    Fn "fn" 3:1
    Ident "add" 3:4
    LParen "(" 3:7
    RParen ")" 3:8
    LBrace "{" 3:10
    RBrace "}" 3:11
    "##);
}

#[test]
fn literals() {
    assert_snapshot!(render(r#"1_000 0b101 2.5e-3 "a\tb" 'x' `raw`"#), @r#"
    IntLiteral "1_000" 1:1
    IntLiteral "0b101" 1:7
    FloatLiteral "2.5e-3" 1:13
    StringLiteral "\"a\\tb\"" 1:20
    RuneLiteral "'x'" 1:27
    StringLiteral "`raw`" 1:31
    "#);
}

#[test]
fn types_and_pointers() {
    assert_snapshot!(render("x: *unsafe = nil\nm: [str:&i32]"), @r#"
    Ident "x" 1:1
    Colon ":" 1:2
    Star "*" 1:4
    Unsafe "unsafe" 1:5
    Eq "=" 1:12
    Nil "nil" 1:14
    Ident "m" 2:1
    Colon ":" 2:2
    LBracket "[" 2:4
    Ident "str" 2:5
    Colon ":" 2:8
    Amp "&" 2:9
    Ident "i32" 2:10
    RBracket "]" 2:13
    "#);
}

#[test]
fn errors_are_positioned() {
    assert_snapshot!(render("a $\nb '\\q'"), @r#"
    Ident "a" 1:1
    Ident "b" 2:1
    error unexpected character: '$' 1:3
    error invalid escape sequence: \q 2:4
    "#);
}
