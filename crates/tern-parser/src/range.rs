//! Delimiter-aware helpers over token slices: matching closers, extracting
//! bracketed contents, and splitting at top-level separators.

use tern_common::token::{Token, TokenKind};

/// Index of the delimiter closing the one at `open`, counting nesting of the
/// same delimiter pair only.
pub fn find_close(tokens: &[Token], open: usize) -> Option<usize> {
    let opener = tokens.get(open)?.kind;
    let closer = opener.closing()?;
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        if tok.kind == opener {
            depth += 1;
        } else if tok.kind == closer {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Index of the delimiter opening the one closing at `close`, scanning backwards.
pub fn find_open(tokens: &[Token], close: usize) -> Option<usize> {
    let closer = tokens.get(close)?.kind;
    let opener = match closer {
        TokenKind::RParen => TokenKind::LParen,
        TokenKind::RBracket => TokenKind::LBracket,
        TokenKind::RBrace => TokenKind::LBrace,
        _ => return None,
    };
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        let kind = tokens[i].kind;
        if kind == closer {
            depth += 1;
        } else if kind == opener {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// The tokens strictly inside the group opened at `*pos`. On success `*pos`
/// moves past the closer; an unterminated group yields `None` and leaves
/// `*pos` untouched.
pub fn extract<'t>(tokens: &'t [Token], pos: &mut usize) -> Option<&'t [Token]> {
    let close = find_close(tokens, *pos)?;
    let inner = &tokens[*pos + 1..close];
    *pos = close + 1;
    Some(inner)
}

/// Position of the first token at nesting depth 0 satisfying `pred`.
pub fn find_top_level(tokens: &[Token], pred: impl Fn(&Token) -> bool) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate() {
        if depth == 0 && pred(tok) {
            return Some(i);
        }
        if tok.kind.is_open_delim() {
            depth += 1;
        } else if tok.kind.is_close_delim() {
            depth = depth.saturating_sub(1);
        }
    }
    None
}

/// Split at depth-0 occurrences of `sep`. A trailing separator does not
/// produce an empty final part; empty parts elsewhere are kept so callers can
/// report them.
pub fn split_top_level(tokens: &[Token], sep: TokenKind) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    if tokens.is_empty() {
        return parts;
    }
    let mut depth = 0usize;
    let mut start = 0;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.kind.is_open_delim() {
            depth += 1;
        } else if tok.kind.is_close_delim() {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && tok.kind == sep {
            parts.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    if start < tokens.len() {
        parts.push(&tokens[start..]);
    }
    parts
}

pub fn split_commas(tokens: &[Token]) -> Vec<&[Token]> {
    split_top_level(tokens, TokenKind::Comma)
}

/// First delimiter problem in a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Imbalance {
    /// The opener at this index is never closed.
    Unclosed(usize),
    /// The closer at this index has no opener, or closes the wrong kind.
    Unexpected(usize),
}

pub fn check_balanced(tokens: &[Token]) -> Result<(), Imbalance> {
    let mut stack: Vec<usize> = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        if tok.kind.is_open_delim() {
            stack.push(i);
        } else if tok.kind.is_close_delim() {
            match stack.pop() {
                Some(open) if tokens[open].kind.closing() == Some(tok.kind) => {}
                _ => return Err(Imbalance::Unexpected(i)),
            }
        }
    }
    match stack.first() {
        Some(&open) => Err(Imbalance::Unclosed(open)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_common::span::FileId;
    use tern_lexer::Lexer;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::tokenize(source, FileId(0)).0
    }

    fn texts(tokens: &[Token]) -> String {
        tokens.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn extract_nested_group() {
        let tokens = lex("(a, (b, c)) + d");
        let mut pos = 0;
        let inner = extract(&tokens, &mut pos).unwrap();
        assert_eq!(texts(inner), "a , ( b , c )");
        assert_eq!(tokens[pos].text, "+");
    }

    #[test]
    fn extract_unterminated_is_none() {
        let tokens = lex("(a, (b)");
        let mut pos = 0;
        assert!(extract(&tokens, &mut pos).is_none());
        assert_eq!(pos, 0);
    }

    #[test]
    fn find_open_scans_backwards() {
        let tokens = lex("f(g(x))[0]");
        assert_eq!(find_open(&tokens, tokens.len() - 1), Some(7));
        assert_eq!(find_open(&tokens, 6), Some(1));
    }

    #[test]
    fn split_ignores_nested_commas() {
        let tokens = lex("a, f(b, c), [d, e],");
        let parts: Vec<String> = split_commas(&tokens).into_iter().map(texts).collect();
        assert_eq!(parts, vec!["a", "f ( b , c )", "[ d , e ]"]);
    }

    #[test]
    fn balance_reports_first_problem() {
        assert_eq!(check_balanced(&lex("f(a[1])")), Ok(()));
        assert_eq!(check_balanced(&lex("f(a[1)]")), Err(Imbalance::Unexpected(5)));
        assert_eq!(check_balanced(&lex("{ f(")), Err(Imbalance::Unclosed(0)));
    }
}
