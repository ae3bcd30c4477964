// Tern lexer -- tokenizer for the Tern programming language.

mod cursor;

use cursor::Cursor;
use tern_common::error::{LexError, LexErrorKind};
use tern_common::span::{FileId, Loc, Span};
use tern_common::token::{keyword_from_str, Token, TokenKind};

/// Converts source text into tokens.
///
/// Newlines are not tokens: every token records its row, and the parser's
/// statement segmenter works from rows. A comment is emitted only when it is
/// the first token on its row; comments trailing code are skipped. Malformed
/// input is reported through [`LexError`]s and produces no token.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    file: FileId,
    errors: Vec<LexError>,
    /// Row of the most recently emitted token.
    last_row: Option<u32>,
}

/// Where a token being built started.
#[derive(Clone, Copy)]
struct Start {
    pos: u32,
    row: u32,
    column: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, file: FileId) -> Self {
        Self {
            cursor: Cursor::new(source),
            file,
            errors: Vec::new(),
            last_row: None,
        }
    }

    /// Tokenize a whole file, returning the tokens and every lexical error.
    pub fn tokenize(source: &str, file: FileId) -> (Vec<Token>, Vec<LexError>) {
        let mut lexer = Lexer::new(source, file);
        let tokens = lexer.by_ref().collect();
        (tokens, lexer.errors)
    }

    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    fn start(&self) -> Start {
        let (row, column) = self.cursor.row_col();
        Start {
            pos: self.cursor.pos(),
            row,
            column,
        }
    }

    fn loc_from(&self, start: Start) -> Loc {
        Loc::new(
            self.file,
            start.row,
            start.column,
            Span::new(start.pos, self.cursor.pos()),
        )
    }

    fn token(&self, kind: TokenKind, start: Start) -> Token {
        let text = self.cursor.slice(start.pos, self.cursor.pos());
        Token::new(
            kind,
            text,
            Span::new(start.pos, self.cursor.pos()),
            start.row,
            start.column,
        )
        .with_file(self.file)
    }

    fn error(&mut self, kind: LexErrorKind, start: Start) {
        let loc = self.loc_from(start);
        self.errors.push(LexError::new(kind, loc));
    }

    fn skip_whitespace(&mut self) {
        self.cursor.eat_while(char::is_whitespace);
    }

    /// Lex one token. `None` means the input was consumed without producing
    /// a token (an error, or a trailing comment).
    fn next_token(&mut self) -> Option<Token> {
        let start = self.start();
        let c = self.cursor.advance()?;

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '#' => TokenKind::Hash,

            '=' => self.pick('=', TokenKind::EqEq, TokenKind::Eq),
            '!' => self.pick('=', TokenKind::NotEq, TokenKind::Bang),
            '^' => self.pick('=', TokenKind::CaretEq, TokenKind::Caret),
            '%' => self.pick('=', TokenKind::PercentEq, TokenKind::Percent),
            '*' => self.pick('=', TokenKind::StarEq, TokenKind::Star),
            '+' => self.doubled_or_assign('+', TokenKind::PlusPlus, TokenKind::PlusEq, TokenKind::Plus),
            '-' => self.doubled_or_assign('-', TokenKind::MinusMinus, TokenKind::MinusEq, TokenKind::Minus),
            '&' => self.doubled_or_assign('&', TokenKind::AmpAmp, TokenKind::AmpEq, TokenKind::Amp),
            '|' => self.doubled_or_assign('|', TokenKind::PipePipe, TokenKind::PipeEq, TokenKind::Pipe),
            '<' => self.lex_angle('<', TokenKind::Shl, TokenKind::ShlEq, TokenKind::LtEq, TokenKind::Lt),
            '>' => self.lex_angle('>', TokenKind::Shr, TokenKind::ShrEq, TokenKind::GtEq, TokenKind::Gt),
            ':' => {
                if self.cursor.eat(':') {
                    TokenKind::ColonColon
                } else {
                    self.pick('=', TokenKind::ColonEq, TokenKind::Colon)
                }
            }
            '.' => {
                if self.cursor.peek() == Some('.') && self.cursor.peek_next() == Some('.') {
                    self.cursor.advance();
                    self.cursor.advance();
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            '/' => match self.cursor.peek() {
                Some('/') => {
                    self.cursor.eat_while(|c| c != '\n');
                    return self.comment(start);
                }
                Some('*') => {
                    self.cursor.advance();
                    self.lex_block_comment(start)?;
                    return self.comment(start);
                }
                _ => self.pick('=', TokenKind::SlashEq, TokenKind::Slash),
            },

            '0'..='9' => self.lex_number(c, start)?,
            '"' => self.lex_string(start)?,
            '`' => self.lex_raw_string(start)?,
            '\'' => self.lex_rune(start)?,
            c if is_ident_start(c) => {
                self.cursor.eat_while(is_ident_continue);
                let text = self.cursor.slice(start.pos, self.cursor.pos());
                keyword_from_str(text).unwrap_or(TokenKind::Ident)
            }
            other => {
                self.error(LexErrorKind::UnexpectedCharacter(other), start);
                return None;
            }
        };
        Some(self.token(kind, start))
    }

    /// `matched` if the next character is `next`, otherwise `bare`.
    fn pick(&mut self, next: char, matched: TokenKind, bare: TokenKind) -> TokenKind {
        if self.cursor.eat(next) {
            matched
        } else {
            bare
        }
    }

    /// `cc` -> `doubled`, `c=` -> `assign`, `c` -> `bare`.
    fn doubled_or_assign(
        &mut self,
        c: char,
        doubled: TokenKind,
        assign: TokenKind,
        bare: TokenKind,
    ) -> TokenKind {
        if self.cursor.eat(c) {
            doubled
        } else {
            self.pick('=', assign, bare)
        }
    }

    /// `<<=`, `<<`, `<=`, `<` and the `>` counterparts.
    fn lex_angle(
        &mut self,
        c: char,
        shift: TokenKind,
        shift_assign: TokenKind,
        or_eq: TokenKind,
        bare: TokenKind,
    ) -> TokenKind {
        if self.cursor.eat(c) {
            self.pick('=', shift_assign, shift)
        } else {
            self.pick('=', or_eq, bare)
        }
    }

    fn comment(&mut self, start: Start) -> Option<Token> {
        if self.last_row == Some(start.row) {
            return None;
        }
        Some(self.token(TokenKind::Comment, start))
    }

    /// Consume the remainder of a `/* ... */` comment. Block comments nest.
    fn lex_block_comment(&mut self, start: Start) -> Option<()> {
        let mut depth = 1u32;
        while depth > 0 {
            match self.cursor.advance() {
                None => {
                    self.error(LexErrorKind::UnterminatedBlockComment, start);
                    return None;
                }
                Some('/') if self.cursor.eat('*') => depth += 1,
                Some('*') if self.cursor.eat('/') => depth -= 1,
                Some(_) => {}
            }
        }
        Some(())
    }

    fn lex_number(&mut self, first: char, start: Start) -> Option<TokenKind> {
        if first == '0' {
            let radix = match self.cursor.peek() {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.cursor.advance();
                let digits_start = self.cursor.pos();
                self.cursor.eat_while(|c| c.is_digit(radix) || c == '_');
                if self.cursor.pos() == digits_start || self.cursor.peek().is_some_and(is_ident_continue) {
                    self.cursor.eat_while(is_ident_continue);
                    let text = self.cursor.slice(start.pos, self.cursor.pos()).to_string();
                    self.error(LexErrorKind::InvalidNumberLiteral(text), start);
                    return None;
                }
                return Some(TokenKind::IntLiteral);
            }
        }

        self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
        let mut kind = TokenKind::IntLiteral;
        if self.cursor.peek() == Some('.') && self.cursor.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
            kind = TokenKind::FloatLiteral;
        }
        if matches!(self.cursor.peek(), Some('e' | 'E')) {
            self.cursor.advance();
            if matches!(self.cursor.peek(), Some('+' | '-')) {
                self.cursor.advance();
            }
            let digits_start = self.cursor.pos();
            self.cursor.eat_while(|c| c.is_ascii_digit());
            if self.cursor.pos() == digits_start {
                let text = self.cursor.slice(start.pos, self.cursor.pos()).to_string();
                self.error(LexErrorKind::InvalidNumberLiteral(text), start);
                return None;
            }
            kind = TokenKind::FloatLiteral;
        }
        if self.cursor.peek().is_some_and(is_ident_start) {
            self.cursor.eat_while(is_ident_continue);
            let text = self.cursor.slice(start.pos, self.cursor.pos()).to_string();
            self.error(LexErrorKind::InvalidNumberLiteral(text), start);
            return None;
        }
        Some(kind)
    }

    /// Consume and validate one `\x` escape. The cursor sits on the backslash.
    fn lex_escape(&mut self) -> Result<(), char> {
        let escape_start = self.start();
        self.cursor.advance();
        match self.cursor.advance() {
            Some('n' | 't' | 'r' | '0' | '\\' | '"' | '\'') => Ok(()),
            Some(other) => {
                self.error(LexErrorKind::InvalidEscapeSequence(other), escape_start);
                Err(other)
            }
            None => Err('\0'),
        }
    }

    fn lex_string(&mut self, start: Start) -> Option<TokenKind> {
        let mut valid = true;
        loop {
            match self.cursor.peek() {
                None | Some('\n') => {
                    self.error(LexErrorKind::UnterminatedString, start);
                    return None;
                }
                Some('"') => {
                    self.cursor.advance();
                    break;
                }
                Some('\\') => {
                    valid &= self.lex_escape().is_ok();
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
        valid.then_some(TokenKind::StringLiteral)
    }

    fn lex_raw_string(&mut self, start: Start) -> Option<TokenKind> {
        self.cursor.eat_while(|c| c != '`');
        if !self.cursor.eat('`') {
            self.error(LexErrorKind::UnterminatedString, start);
            return None;
        }
        Some(TokenKind::StringLiteral)
    }

    fn lex_rune(&mut self, start: Start) -> Option<TokenKind> {
        let mut chars = 0usize;
        let mut valid = true;
        loop {
            match self.cursor.peek() {
                None | Some('\n') => {
                    self.error(LexErrorKind::UnterminatedRune, start);
                    return None;
                }
                Some('\'') => {
                    self.cursor.advance();
                    break;
                }
                Some('\\') => {
                    valid &= self.lex_escape().is_ok();
                    chars += 1;
                }
                Some(_) => {
                    self.cursor.advance();
                    chars += 1;
                }
            }
        }
        if chars != 1 {
            let text = self.cursor.slice(start.pos, self.cursor.pos()).to_string();
            self.error(LexErrorKind::InvalidRune(text), start);
            return None;
        }
        valid.then_some(TokenKind::RuneLiteral)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            self.skip_whitespace();
            if self.cursor.is_eof() {
                return None;
            }
            if let Some(token) = self.next_token() {
                self.last_row = Some(token.row);
                return Some(token);
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Lexer::tokenize(source, FileId(0));
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lex_declaration() {
        assert_eq!(
            kinds("x: i32 = 5"),
            vec![
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::IntLiteral,
            ]
        );
    }

    #[test]
    fn lex_compound_operators() {
        assert_eq!(
            kinds("<<= >>= << >> <= >= := :: ... ++ -- && ||"),
            vec![
                TokenKind::ShlEq,
                TokenKind::ShrEq,
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::ColonEq,
                TokenKind::ColonColon,
                TokenKind::Ellipsis,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
            ]
        );
    }

    #[test]
    fn rows_and_columns_are_one_based() {
        let (tokens, _) = Lexer::tokenize("fn f() {\n    ret 1\n}", FileId(3));
        let ret = tokens.iter().find(|t| t.kind == TokenKind::Ret).unwrap();
        assert_eq!((ret.row, ret.column), (2, 5));
        assert_eq!(ret.file, FileId(3));
        assert_eq!(ret.text, "ret");
    }

    #[test]
    fn trailing_comment_is_dropped() {
        let (tokens, _) = Lexer::tokenize("x := 1 // note\n// leading\ny := 2", FileId(0));
        let comments: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Comment)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(comments, vec!["// leading"]);
    }

    #[test]
    fn float_and_method_dot() {
        assert_eq!(
            kinds("1.5 1e9 x.y 0xFF"),
            vec![
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::Ident,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::IntLiteral,
            ]
        );
    }

    #[test]
    fn malformed_input_reports_errors() {
        let (tokens, errors) = Lexer::tokenize("a @ \"open", FileId(0));
        assert_eq!(tokens.len(), 1);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind, LexErrorKind::UnexpectedCharacter('@'));
        assert_eq!(errors[1].kind, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn rune_must_hold_one_char() {
        let (_, errors) = Lexer::tokenize("'ab'", FileId(0));
        assert_eq!(errors[0].kind, LexErrorKind::InvalidRune("'ab'".into()));
    }
}
