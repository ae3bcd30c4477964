//! Ariadne-based rendering of type and parse errors.
//!
//! Output is colorless unless asked for, so tests can compare it. Each
//! report carries the error code, the message, a label on the offending
//! span and, for a few errors, a second label or a hint. JSON mode emits
//! the flat [`Diagnostic`] record on one line instead.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use tern_common::diagnostic::Diagnostic;
use tern_common::source::SourceMap;
use tern_common::span::Loc;
use tern_parser::ParseError;

use crate::error::TypeError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticOptions {
    pub color: bool,
    /// One JSON object per diagnostic instead of a source snippet.
    pub json: bool,
}

/// Everything a report needs, independent of the error type.
struct Rendering<'e> {
    kind: ReportKind<'static>,
    code: Option<&'static str>,
    message: String,
    primary: (Loc, String),
    secondary: Option<(Loc, &'e str)>,
    help: Option<String>,
}

pub fn render_diagnostic(error: &TypeError, files: &SourceMap, options: &DiagnosticOptions) -> String {
    if options.json {
        return render_json(&error.to_diagnostic(files));
    }
    let secondary = match error {
        TypeError::DuplicateIdent { loc, previous, .. } if previous != loc => Some((*previous, "first declared here")),
        _ => None,
    };
    let rendering = Rendering {
        kind: if error.is_error() {
            ReportKind::Error
        } else {
            ReportKind::Warning
        },
        code: Some(error.code()),
        message: error.to_string(),
        primary: (error.loc(), label(error)),
        secondary,
        help: help(error),
    };
    render(rendering, files, options).unwrap_or_else(|| error.to_diagnostic(files).to_string())
}

pub fn render_parse_error(error: &ParseError, files: &SourceMap, options: &DiagnosticOptions) -> String {
    if options.json {
        return render_json(&error.to_diagnostic(files));
    }
    let rendering = Rendering {
        kind: ReportKind::Error,
        code: None,
        message: error.message.clone(),
        primary: (error.loc, "here".to_string()),
        secondary: error.related.as_ref().map(|(msg, loc)| (*loc, msg.as_str())),
        help: None,
    };
    render(rendering, files, options).unwrap_or_else(|| error.to_diagnostic(files).to_string())
}

/// A diagnostic as a single line of JSON.
pub fn render_json(diagnostic: &Diagnostic) -> String {
    serde_json::to_string(diagnostic).unwrap_or_default()
}

/// `None` when the file is unknown or writing fails.
fn render(r: Rendering<'_>, files: &SourceMap, options: &DiagnosticOptions) -> Option<String> {
    let (loc, label) = r.primary;
    let source = files.get(loc.file)?.text.as_str();
    let span = clamp(source, loc);
    let mut builder = Report::build(r.kind, span.clone())
        .with_message(r.message)
        .with_config(Config::default().with_color(options.color));
    if let Some(code) = r.code {
        builder = builder.with_code(code);
    }
    builder.add_label(Label::new(span).with_message(label).with_color(Color::Red));
    if let Some((related, message)) = r.secondary.filter(|(l, _)| l.file == loc.file) {
        builder.add_label(
            Label::new(clamp(source, related))
                .with_message(message)
                .with_color(Color::Blue),
        );
    }
    if let Some(help) = r.help {
        builder.set_help(help);
    }
    let mut buf = Vec::new();
    builder.finish().write(Source::from(source), &mut buf).ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// A byte range inside `source`, at least one byte long when possible.
fn clamp(source: &str, loc: Loc) -> Range<usize> {
    let len = source.len();
    let start = (loc.span.start as usize).min(len);
    let end = (loc.span.end as usize).min(len).max(start);
    if start == end {
        start..(end + 1).min(len)
    } else {
        start..end
    }
}

fn label(error: &TypeError) -> String {
    use TypeError::*;
    match error {
        IncompatibleTypes { found, .. } => format!("this is `{found}`"),
        Overflow { target, .. } => format!("does not fit in `{target}`"),
        ArgumentCount { found, .. } => format!("{found} argument{} given", if *found == 1 { "" } else { "s" }),
        GenericsOverflow { found, .. } | MissingGenerics { found, .. } => {
            format!("{found} generic argument{} given", if *found == 1 { "" } else { "s" })
        }
        DuplicateIdent { .. } => "declared again here".to_string(),
        NotFound { .. } | InvalidTypeSource { .. } => "not found in this scope".to_string(),
        MissingReturn { .. } => "this function can end without `ret`".to_string(),
        UnusedLocal { .. } => "never read".to_string(),
        _ => "here".to_string(),
    }
}

fn help(error: &TypeError) -> Option<String> {
    use TypeError::*;
    match error {
        CannotInfer { callee, .. } => Some(format!("pass the generic arguments explicitly: `{callee}[T](..)`")),
        MissingReturn { .. } => Some("end every path with `ret` or `panic`".to_string()),
        UntypedNil { .. } => Some("give the declaration an explicit type".to_string()),
        IncompatibleTypes { expected, found, .. } if expected.is_numeric() && found.is_numeric() => {
            Some(format!("convert explicitly with `({expected})(..)`"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_common::span::Span;

    use crate::ty::Ty;

    #[test]
    fn clamp_keeps_ranges_inside_the_source() {
        let loc = |start, end| Loc::new(Default::default(), 1, 1, Span::new(start, end));
        assert_eq!(clamp("abc", loc(1, 2)), 1..2);
        assert_eq!(clamp("abc", loc(1, 1)), 1..2);
        assert_eq!(clamp("abc", loc(3, 3)), 3..3);
        assert_eq!(clamp("abc", loc(2, 9)), 2..3);
    }

    #[test]
    fn json_is_one_line() {
        let mut files = SourceMap::new();
        let file = files.add("main.tn", "x: u8 = 300\n");
        let err = TypeError::Overflow {
            value: "300".into(),
            target: Ty::Prim(crate::ty::PrimType::U8),
            loc: Loc::new(file, 1, 9, Span::new(8, 11)),
        };
        let out = render_diagnostic(&err, &files, &DiagnosticOptions { color: false, json: true });
        insta::assert_snapshot!(out, @r#"{"severity":"error","row":1,"column":9,"path":"main.tn","message":"constant 300 overflows `u8`","code":"E0005"}"#);
    }

    #[test]
    fn unknown_file_falls_back_to_the_flat_form() {
        let files = SourceMap::new();
        let err = TypeError::DivisionByZero {
            loc: Loc::new(Default::default(), 2, 5, Span::new(0, 1)),
        };
        let out = render_diagnostic(&err, &files, &DiagnosticOptions::default());
        assert_eq!(out, "<unknown>:2:5: error[E0021]: division by constant zero");
    }
}
