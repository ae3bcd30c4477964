use serde::Serialize;

use crate::span::{FileId, Loc, Span};

/// A token produced by the Tern lexer.
///
/// Tokens own their text so that later stages can slice token vectors
/// freely without holding on to the source string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
    /// 1-based row of the first byte.
    pub row: u32,
    /// 1-based column (in bytes) of the first byte.
    pub column: u32,
    pub file: FileId,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span, row: u32, column: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
            row,
            column,
            file: FileId::default(),
        }
    }

    pub fn with_file(mut self, file: FileId) -> Self {
        self.file = file;
        self
    }

    pub fn loc(&self) -> Loc {
        Loc::new(self.file, self.row, self.column, self.span)
    }
}

/// Every kind of token in the Tern language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    // ── Keywords ───────────────────────────────────────────────────────
    Break,
    Case,
    Co,
    Const,
    Continue,
    /// `cpp`, the foreign-linkage namespace.
    Cpp,
    Default,
    Defer,
    Else,
    Enum,
    Fall,
    False,
    Fn,
    For,
    Goto,
    If,
    Impl,
    In,
    Let,
    Match,
    Nil,
    Pub,
    Ret,
    /// The `self` keyword. Named `SelfKw` to avoid conflict with Rust's `Self`.
    SelfKw,
    Struct,
    Trait,
    True,
    Type,
    Unsafe,
    Use,

    // ── Operators ──────────────────────────────────────────────────────
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `&`
    Amp,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `&&`
    AmpAmp,
    /// `||`
    PipePipe,
    /// `!`
    Bang,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,

    // ── Assignment family ──────────────────────────────────────────────
    /// `=`
    Eq,
    /// `:=`
    ColonEq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,
    /// `++`
    PlusPlus,
    /// `--`
    MinusMinus,

    // ── Delimiters ─────────────────────────────────────────────────────
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    // ── Punctuation ────────────────────────────────────────────────────
    Comma,
    Dot,
    /// `...`
    Ellipsis,
    Colon,
    /// `::`
    ColonColon,
    Semicolon,
    /// `#`, introducing an attribute.
    Hash,

    // ── Literals ───────────────────────────────────────────────────────
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    RuneLiteral,

    // ── Other ──────────────────────────────────────────────────────────
    Ident,
    /// A `//` comment that begins its row. Comments after other tokens on
    /// the same row are not emitted.
    Comment,
    /// Input the lexer could not make sense of; `text` holds the offending slice.
    Error,
}

impl TokenKind {
    pub fn is_open_delim(self) -> bool {
        matches!(self, TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace)
    }

    pub fn is_close_delim(self) -> bool {
        matches!(self, TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace)
    }

    /// The closing delimiter matching an opening one.
    pub fn closing(self) -> Option<TokenKind> {
        match self {
            TokenKind::LParen => Some(TokenKind::RParen),
            TokenKind::LBracket => Some(TokenKind::RBracket),
            TokenKind::LBrace => Some(TokenKind::RBrace),
            _ => None,
        }
    }

    /// Binding tier of a binary operator, 1 (loosest) through 5 (tightest).
    pub fn binary_precedence(self) -> Option<u8> {
        use TokenKind::*;
        match self {
            PipePipe => Some(1),
            AmpAmp => Some(2),
            EqEq | NotEq | Lt | Gt | LtEq | GtEq => Some(3),
            Plus | Minus | Pipe | Caret => Some(4),
            Star | Slash | Percent | Shl | Shr | Amp => Some(5),
            _ => None,
        }
    }

    /// Tokens that may start a prefix (unary) expression.
    pub fn is_unary_op(self) -> bool {
        use TokenKind::*;
        matches!(self, Minus | Plus | Bang | Caret | Star | Amp)
    }

    /// Any operator token: a token after which a `-`, `*` or `&` is read as unary.
    pub fn is_operator(self) -> bool {
        self.binary_precedence().is_some() || self == TokenKind::Bang || self.is_assign_op()
    }

    /// `=`, `:=`, the compound assignments, `++` and `--`.
    pub fn is_assign_op(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Eq | ColonEq
                | PlusEq
                | MinusEq
                | StarEq
                | SlashEq
                | PercentEq
                | AmpEq
                | PipeEq
                | CaretEq
                | ShlEq
                | ShrEq
                | PlusPlus
                | MinusMinus
        )
    }

    pub fn is_literal(self) -> bool {
        use TokenKind::*;
        matches!(self, IntLiteral | FloatLiteral | StringLiteral | RuneLiteral | True | False | Nil)
    }
}

/// Map an identifier string to its keyword token kind, if it is one.
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    let kind = match s {
        "break" => TokenKind::Break,
        "case" => TokenKind::Case,
        "co" => TokenKind::Co,
        "const" => TokenKind::Const,
        "continue" => TokenKind::Continue,
        "cpp" => TokenKind::Cpp,
        "default" => TokenKind::Default,
        "defer" => TokenKind::Defer,
        "else" => TokenKind::Else,
        "enum" => TokenKind::Enum,
        "fall" => TokenKind::Fall,
        "false" => TokenKind::False,
        "fn" => TokenKind::Fn,
        "for" => TokenKind::For,
        "goto" => TokenKind::Goto,
        "if" => TokenKind::If,
        "impl" => TokenKind::Impl,
        "in" => TokenKind::In,
        "let" => TokenKind::Let,
        "match" => TokenKind::Match,
        "nil" => TokenKind::Nil,
        "pub" => TokenKind::Pub,
        "ret" => TokenKind::Ret,
        "self" => TokenKind::SelfKw,
        "struct" => TokenKind::Struct,
        "trait" => TokenKind::Trait,
        "true" => TokenKind::True,
        "type" => TokenKind::Type,
        "unsafe" => TokenKind::Unsafe,
        "use" => TokenKind::Use,
        _ => return None,
    };
    Some(kind)
}
