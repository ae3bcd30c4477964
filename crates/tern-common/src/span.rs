use serde::Serialize;

/// Byte-offset span into one source file. Start is inclusive, end is exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start ({start}) must be <= end ({end})");
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Index of a file registered in a [`SourceMap`](crate::source::SourceMap).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileId(pub u32);

/// A source location: the file, the 1-based row/column of the first byte,
/// and the byte span the located construct covers.
///
/// Every token carries one, and every tree node copies the location of its
/// first token, widened to its last token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Loc {
    pub file: FileId,
    pub row: u32,
    pub column: u32,
    pub span: Span,
}

impl Loc {
    pub fn new(file: FileId, row: u32, column: u32, span: Span) -> Self {
        Self {
            file,
            row,
            column,
            span,
        }
    }

    /// Widen this location so its span also covers `other`.
    ///
    /// Row and column stay at whichever location starts first.
    pub fn to(self, other: Loc) -> Loc {
        let (row, column) = if other.span.start < self.span.start {
            (other.row, other.column)
        } else {
            (self.row, self.column)
        };
        Loc {
            file: self.file,
            row,
            column,
            span: self.span.merge(other.span),
        }
    }
}

/// Pre-computed line starts for on-demand offset -> (row, column) lookup.
#[derive(Debug)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// 1-based (row, column) of a byte offset. Columns count bytes.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line_idx = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let row = (line_idx as u32) + 1;
        let col = offset - self.line_starts[line_idx] + 1;
        (row, col)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_merge_covers_both() {
        let merged = Span::new(5, 10).merge(Span::new(8, 15));
        assert_eq!(merged, Span::new(5, 15));
        assert_eq!(merged.len(), 10);
        assert!(Span::new(3, 3).is_empty());
    }

    #[test]
    fn loc_to_keeps_earliest_row() {
        let a = Loc::new(FileId(0), 2, 5, Span::new(10, 12));
        let b = Loc::new(FileId(0), 3, 1, Span::new(20, 25));
        let ab = a.to(b);
        assert_eq!((ab.row, ab.column), (2, 5));
        assert_eq!(ab.span, Span::new(10, 25));
        let ba = b.to(a);
        assert_eq!((ba.row, ba.column), (2, 5));
    }

    #[test]
    fn line_index_rows_and_columns() {
        let idx = LineIndex::new("hello\nworld\nfoo");
        assert_eq!(idx.line_col(0), (1, 1));
        assert_eq!(idx.line_col(6), (2, 1));
        assert_eq!(idx.line_col(13), (3, 2));
        assert_eq!(idx.line_count(), 3);
    }

    #[test]
    fn line_index_newline_belongs_to_its_row() {
        let idx = LineIndex::new("ab\ncd");
        assert_eq!(idx.line_col(2), (1, 3));
        assert_eq!(idx.line_col(3), (2, 1));
    }
}
