/// Character iterator over Tern source that tracks both the byte offset and
/// the 1-based row/column of the next character.
pub struct Cursor<'src> {
    source: &'src str,
    pos: u32,
    row: u32,
    column: u32,
    chars: std::str::Chars<'src>,
}

impl<'src> Cursor<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            row: 1,
            column: 1,
            chars: source.chars(),
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    pub fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next()
    }

    pub fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8() as u32;
        if c == '\n' {
            self.row += 1;
            self.column = 1;
        } else {
            self.column += c.len_utf8() as u32;
        }
        Some(c)
    }

    /// Consume the next character only if it equals `expected`.
    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// (row, column) of the next character.
    pub fn row_col(&self) -> (u32, u32) {
        (self.row, self.column)
    }

    pub fn is_eof(&self) -> bool {
        self.peek().is_none()
    }

    pub fn eat_while(&mut self, predicate: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            self.advance();
        }
    }

    /// # Panics
    ///
    /// Panics if the offsets are out of bounds or not on UTF-8 boundaries.
    pub fn slice(&self, start: u32, end: u32) -> &'src str {
        &self.source[start as usize..end as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_rows_and_columns() {
        let mut cursor = Cursor::new("ab\ncd");
        assert_eq!(cursor.row_col(), (1, 1));
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.row_col(), (1, 3));
        cursor.advance();
        assert_eq!(cursor.row_col(), (2, 1));
        assert_eq!(cursor.pos(), 3);
    }

    #[test]
    fn multibyte_advances_by_byte_length() {
        let mut cursor = Cursor::new("\u{00E9}a");
        assert_eq!(cursor.advance(), Some('\u{00E9}'));
        assert_eq!(cursor.pos(), 2);
        assert_eq!(cursor.row_col(), (1, 3));
    }

    #[test]
    fn eat_only_matching() {
        let mut cursor = Cursor::new("=>");
        assert!(!cursor.eat('>'));
        assert!(cursor.eat('='));
        assert_eq!(cursor.peek(), Some('>'));
        assert_eq!(cursor.peek_next(), None);
    }

    #[test]
    fn eat_while_and_slice() {
        let mut cursor = Cursor::new("aaab");
        cursor.eat_while(|c| c == 'a');
        assert_eq!(cursor.pos(), 3);
        assert_eq!(cursor.slice(0, 3), "aaa");
        assert!(!cursor.is_eof());
    }
}
