//! The flat diagnostic record shared by every front-end stage, and a
//! thread-safe accumulator for stages that report from worker threads.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One reported problem, positioned by file path and 1-based row/column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub row: u32,
    pub column: u32,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Diagnostic {
    pub fn error(path: impl Into<String>, row: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            row,
            column,
            path: path.into(),
            message: message.into(),
            code: None,
        }
    }

    pub fn warning(path: impl Into<String>, row: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(path, row, column, message)
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.path, self.row, self.column, self.severity)?;
        if let Some(code) = &self.code {
            write!(f, "[{code}]")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Accumulator that several threads may push into concurrently.
///
/// Insertion order across threads is unspecified; callers that need a
/// stable order sort after [`DiagnosticSink::into_inner`].
#[derive(Debug)]
pub struct DiagnosticSink<T = Diagnostic> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for DiagnosticSink<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }
}

impl<T> DiagnosticSink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    pub fn extend(&self, items: impl IntoIterator<Item = T>) {
        self.items.lock().extend(items);
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_inner(self) -> Vec<T> {
        self.items.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_when_present() {
        let d = Diagnostic::error("main.tn", 3, 7, "identifier not found: `x`").with_code("E0002");
        assert_eq!(d.to_string(), "main.tn:3:7: error[E0002]: identifier not found: `x`");
        let w = Diagnostic::warning("main.tn", 1, 1, "unused local `y`");
        assert_eq!(w.to_string(), "main.tn:1:1: warning: unused local `y`");
        assert!(!w.is_error());
    }

    #[test]
    fn sink_collects_from_threads() {
        let sink: DiagnosticSink<u32> = DiagnosticSink::new();
        std::thread::scope(|s| {
            for i in 0..4 {
                let sink = &sink;
                s.spawn(move || sink.push(i));
            }
        });
        let mut items = sink.into_inner();
        items.sort();
        assert_eq!(items, vec![0, 1, 2, 3]);
    }
}
