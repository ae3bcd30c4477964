//! Expression building by precedence splitting.
//!
//! A slice is split at its loosest binary operator outside any delimiter.
//! Among operators of the same tier the right-most one wins, so the left
//! side holds everything before it and `a - b - c` groups as `(a - b) - c`.
//! A slice with no such operator is an operand: a prefix operation, a
//! postfix form recognized from its last token, or a single-token leaf.

use tern_common::token::{Token, TokenKind};

use super::{loc_of, without_comments, Builder};
use crate::ast::{BinOp, Entry, Expr, ExprKind, Ident, LitKind, Literal, TypeNode, UnaryOp};
use crate::parser::items::FnRules;
use crate::parser::types::starts_type;
use crate::range::{find_close, find_open, find_top_level, split_commas};

fn binary_op(kind: TokenKind) -> Option<BinOp> {
    use TokenKind::*;
    let op = match kind {
        PipePipe => BinOp::Or,
        AmpAmp => BinOp::And,
        EqEq => BinOp::Eq,
        NotEq => BinOp::Ne,
        Lt => BinOp::Lt,
        Gt => BinOp::Gt,
        LtEq => BinOp::Le,
        GtEq => BinOp::Ge,
        Plus => BinOp::Add,
        Minus => BinOp::Sub,
        Pipe => BinOp::BitOr,
        Caret => BinOp::BitXor,
        Star => BinOp::Mul,
        Slash => BinOp::Div,
        Percent => BinOp::Rem,
        Shl => BinOp::Shl,
        Shr => BinOp::Shr,
        Amp => BinOp::BitAnd,
        _ => return None,
    };
    Some(op)
}

fn unary_op(kind: TokenKind) -> Option<UnaryOp> {
    let op = match kind {
        TokenKind::Minus => UnaryOp::Neg,
        TokenKind::Plus => UnaryOp::Plus,
        TokenKind::Bang => UnaryOp::Not,
        TokenKind::Caret => UnaryOp::BitNot,
        TokenKind::Star => UnaryOp::Deref,
        TokenKind::Amp => UnaryOp::AddrOf,
        _ => return None,
    };
    Some(op)
}

/// Index just past an anonymous function literal that starts the slice
/// (`fn(...) R { ... }`), if it is well formed.
fn fn_literal_end(tokens: &[Token]) -> Option<usize> {
    if tokens.first()?.kind != TokenKind::Fn || tokens.get(1)?.kind != TokenKind::LParen {
        return None;
    }
    let params_close = find_close(tokens, 1)?;
    let rest = &tokens[params_close + 1..];
    let brace = params_close + 1 + find_top_level(rest, |t| t.kind == TokenKind::LBrace)?;
    Some(find_close(tokens, brace)? + 1)
}

/// Whether the `[` at `open` begins a type prefix such as the `[]` of
/// `[]*T{...}` rather than an index or a slice literal.
fn is_type_bracket(tokens: &[Token], open: usize, close: usize, operand_start: bool) -> bool {
    if !operand_start || !tokens.get(close + 1).is_some_and(|t| starts_type(t.kind)) {
        return false;
    }
    let inner = &tokens[open + 1..close];
    inner.len() <= 1 || find_top_level(inner, |t| t.kind == TokenKind::Colon).is_some()
}

/// Position of the operator to split at, if the slice has a binary
/// operator outside all delimiters.
pub(crate) fn split_point(tokens: &[Token]) -> Option<usize> {
    let mut best: Option<(usize, u8)> = None;
    let mut depth = 0usize;
    // Index of the `]` closing the most recent type-prefix bracket group.
    let mut type_bracket_end: Option<usize> = None;
    let mut i = fn_literal_end(tokens).unwrap_or(0);

    while i < tokens.len() {
        let kind = tokens[i].kind;
        let after_operator = i == 0 || tokens[i - 1].kind.is_operator();
        if depth == 0 && kind == TokenKind::LBracket {
            if let Some(close) = find_close(tokens, i) {
                let operand_start = after_operator || type_bracket_end == Some(i - 1);
                if is_type_bracket(tokens, i, close, operand_start) {
                    type_bracket_end = Some(close);
                }
                i = close + 1;
                continue;
            }
        }
        if kind.is_open_delim() {
            depth += 1;
        } else if kind.is_close_delim() {
            depth = depth.saturating_sub(1);
        } else if depth == 0 {
            if let Some(prec) = kind.binary_precedence() {
                let unary = after_operator || type_bracket_end == Some(i - 1);
                if !unary && best.map_or(true, |(_, p)| prec <= p) {
                    best = Some((i, prec));
                }
            }
        }
        i += 1;
    }
    best.map(|(i, _)| i)
}

impl Builder {
    pub(crate) fn build_expr(&mut self, tokens: &[Token]) -> Option<Expr> {
        let tokens = without_comments(tokens);
        let tokens: &[Token] = &tokens;
        if tokens.is_empty() {
            self.error("missing expression", self.here);
            return None;
        }
        let Some(at) = split_point(tokens) else {
            return self.build_operand(tokens);
        };
        let op_tok = &tokens[at];
        let op = binary_op(op_tok.kind)?;
        if at + 1 == tokens.len() {
            self.error(format!("missing right operand for `{}`", op_tok.text), op_tok.loc());
            return None;
        }
        let lhs = self.build_expr(&tokens[..at]);
        let rhs = self.build_expr(&tokens[at + 1..]);
        Some(Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs?),
                rhs: Box::new(rhs?),
            },
            loc_of(tokens),
        ))
    }

    /// A comma-separated list; more than one element becomes a tuple.
    pub(crate) fn build_expr_list(&mut self, tokens: &[Token]) -> Option<Expr> {
        let parts = split_commas(tokens);
        if parts.len() == 1 {
            return self.build_expr(parts[0]);
        }
        let elems = self.build_exprs(&parts)?;
        Some(Expr::new(ExprKind::Tuple(elems), loc_of(tokens)))
    }

    /// Build each part, reporting every failing part before giving up.
    pub(crate) fn build_exprs(&mut self, parts: &[&[Token]]) -> Option<Vec<Expr>> {
        let built: Vec<Option<Expr>> = parts.iter().map(|part| self.build_expr(part)).collect();
        built.into_iter().collect()
    }

    fn build_operand(&mut self, tokens: &[Token]) -> Option<Expr> {
        let loc = loc_of(tokens);
        let first = &tokens[0];
        let last = &tokens[tokens.len() - 1];

        if let Some(op) = unary_op(first.kind) {
            if tokens.len() == 1 {
                self.error(format!("missing operand for `{}`", first.text), first.loc());
                return None;
            }
            let operand = self.build_expr(&tokens[1..])?;
            return Some(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                loc,
            ));
        }
        if first.kind == TokenKind::AmpAmp {
            self.error("unexpected `&&`", first.loc());
            return None;
        }
        if tokens.len() == 1 {
            return self.build_leaf(first);
        }
        if last.kind == TokenKind::Ellipsis {
            let inner = self.build_expr(&tokens[..tokens.len() - 1])?;
            return Some(Expr::new(ExprKind::Spread(Box::new(inner)), loc));
        }
        if fn_literal_end(tokens) == Some(tokens.len()) {
            let rules = FnRules::anonymous();
            let decl = self.build_fn(tokens, rules)?;
            return Some(Expr::new(ExprKind::Func(Box::new(decl)), loc));
        }

        match last.kind {
            TokenKind::RParen => self.build_paren_suffix(tokens),
            TokenKind::RBracket => self.build_bracket_suffix(tokens),
            TokenKind::RBrace => self.build_composite(tokens),
            TokenKind::Ident => self.build_name_chain(tokens),
            _ => {
                self.error(format!("invalid expression near `{}`", last.text), last.loc());
                None
            }
        }
    }

    /// Parenthesized expression, tuple, cast `(T)(e)` or call `f(args)`.
    fn build_paren_suffix(&mut self, tokens: &[Token]) -> Option<Expr> {
        let loc = loc_of(tokens);
        let close = tokens.len() - 1;
        let open = find_open(tokens, close)?;
        let inner = &tokens[open + 1..close];

        if open == 0 {
            let parts = split_commas(inner);
            let trailing_comma = inner.last().is_some_and(|t| t.kind == TokenKind::Comma);
            return match parts.len() {
                0 => {
                    self.error("empty parentheses", tokens[0].loc());
                    None
                }
                1 if !trailing_comma => {
                    let mut expr = self.build_expr(parts[0])?;
                    expr.loc = loc;
                    Some(expr)
                }
                _ => {
                    let elems = self.build_exprs(&parts)?;
                    Some(Expr::new(ExprKind::Tuple(elems), loc))
                }
            };
        }

        let prefix = &tokens[..open];
        if prefix[0].kind == TokenKind::LParen && find_close(prefix, 0) == Some(prefix.len() - 1) {
            let ty_tokens = &prefix[1..prefix.len() - 1];
            if let Some(ty) = self.speculate(|b| b.build_type(ty_tokens)) {
                let expr = self.build_expr(inner)?;
                return Some(Expr::new(
                    ExprKind::Cast {
                        ty,
                        expr: Box::new(expr),
                    },
                    loc,
                ));
            }
        }

        let callee = self.build_expr(prefix);
        let args = self.build_exprs(&split_commas(inner));
        Some(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee?),
                args: args?,
            },
            loc,
        ))
    }

    /// Slice literal `[a, b]`, slicing `x[a:b]`, or index / generic
    /// instantiation `x[...]`.
    fn build_bracket_suffix(&mut self, tokens: &[Token]) -> Option<Expr> {
        let loc = loc_of(tokens);
        let close = tokens.len() - 1;
        let open = find_open(tokens, close)?;
        let inner = &tokens[open + 1..close];

        if open == 0 {
            let elems = self.build_exprs(&split_commas(inner))?;
            return Some(Expr::new(ExprKind::SliceLit(elems), loc));
        }

        let base = self.build_expr(&tokens[..open]);
        if let Some(colon) = find_top_level(inner, |t| t.kind == TokenKind::Colon) {
            let start = match colon {
                0 => None,
                _ => Some(Box::new(self.build_expr(&inner[..colon])?)),
            };
            let end = match &inner[colon + 1..] {
                [] => None,
                rest => Some(Box::new(self.build_expr(rest)?)),
            };
            return Some(Expr::new(
                ExprKind::Slicing {
                    base: Box::new(base?),
                    start,
                    end,
                },
                loc,
            ));
        }
        if inner.is_empty() {
            self.error("missing index", tokens[open].loc());
            return None;
        }

        let parts = split_commas(inner);
        let generics: Option<Vec<TypeNode>> =
            self.speculate(|b| parts.iter().map(|part| b.build_type(part)).collect());
        let args: Option<Vec<Expr>> = self.speculate(|b| b.build_exprs(&parts));
        let args = match (args, &generics) {
            (Some(args), _) => args,
            (None, Some(_)) => Vec::new(),
            // Neither reading works; rebuild as expressions to report why.
            (None, None) => {
                self.build_exprs(&parts);
                return None;
            }
        };
        Some(Expr::new(
            ExprKind::Index {
                base: Box::new(base?),
                args,
                generics,
            },
            loc,
        ))
    }

    /// `T{...}`: struct, slice, array or map literal.
    fn build_composite(&mut self, tokens: &[Token]) -> Option<Expr> {
        let loc = loc_of(tokens);
        let close = tokens.len() - 1;
        let open = find_open(tokens, close)?;
        if open == 0 {
            self.error("a block is not an expression", tokens[0].loc());
            return None;
        }
        let ty = self.build_type(&tokens[..open])?;
        let inner = without_comments(&tokens[open + 1..close]);
        let mut entries = Vec::new();
        let mut ok = true;
        for part in split_commas(&inner) {
            let entry = match find_top_level(part, |t| t.kind == TokenKind::Colon) {
                Some(colon) => {
                    let key = self.build_expr(&part[..colon]);
                    let value = self.build_expr(&part[colon + 1..]);
                    key.zip(value).map(|(key, value)| Entry {
                        key: Some(key),
                        value,
                    })
                }
                None => self.build_expr(part).map(|value| Entry { key: None, value }),
            };
            match entry {
                Some(entry) => entries.push(entry),
                None => ok = false,
            }
        }
        ok.then(|| Expr::new(ExprKind::Composite { ty, entries }, loc))
    }

    /// `a.b`, `cpp.name` or `a::b::c`.
    fn build_name_chain(&mut self, tokens: &[Token]) -> Option<Expr> {
        let loc = loc_of(tokens);
        let n = tokens.len();
        let last = &tokens[n - 1];
        let name = Ident::new(&last.text, last.loc());

        if tokens[n - 2].kind == TokenKind::Dot {
            let base = &tokens[..n - 2];
            if let [only] = base {
                if only.kind == TokenKind::Cpp {
                    return Some(Expr::new(ExprKind::Foreign(name), loc));
                }
            }
            if base.is_empty() {
                self.error("missing expression before `.`", tokens[n - 2].loc());
                return None;
            }
            let base = self.build_expr(base)?;
            return Some(Expr::new(
                ExprKind::Selector {
                    base: Box::new(base),
                    name,
                },
                loc,
            ));
        }

        let is_path = n % 2 == 1
            && tokens.iter().enumerate().all(|(i, t)| {
                if i % 2 == 0 {
                    t.kind == TokenKind::Ident
                } else {
                    t.kind == TokenKind::ColonColon
                }
            });
        if is_path {
            let segments = tokens
                .iter()
                .step_by(2)
                .map(|t| Ident::new(&t.text, t.loc()))
                .collect();
            return Some(Expr::new(ExprKind::Path(segments), loc));
        }

        self.error(format!("invalid expression near `{}`", tokens[n - 2].text), tokens[n - 2].loc());
        None
    }

    fn build_leaf(&mut self, tok: &Token) -> Option<Expr> {
        let loc = tok.loc();
        let lit = |kind| {
            Some(Expr::new(
                ExprKind::Lit(Literal {
                    kind,
                    text: tok.text.clone(),
                }),
                loc,
            ))
        };
        match tok.kind {
            TokenKind::IntLiteral => match parse_int(&tok.text) {
                Some(value) => lit(LitKind::Int(value)),
                None => {
                    self.error(format!("integer literal `{}` is too large", tok.text), loc);
                    None
                }
            },
            TokenKind::FloatLiteral => match tok.text.replace('_', "").parse::<f64>() {
                Ok(value) => lit(LitKind::Float(value)),
                Err(_) => {
                    self.error(format!("invalid float literal `{}`", tok.text), loc);
                    None
                }
            },
            TokenKind::StringLiteral => lit(LitKind::Str(unquote(&tok.text))),
            TokenKind::RuneLiteral => match unquote(&tok.text).chars().next() {
                Some(c) => lit(LitKind::Rune(c)),
                None => {
                    self.error("empty rune literal", loc);
                    None
                }
            },
            TokenKind::True => lit(LitKind::Bool(true)),
            TokenKind::False => lit(LitKind::Bool(false)),
            TokenKind::Nil => Some(Expr::new(ExprKind::Nil, loc)),
            TokenKind::SelfKw => Some(Expr::new(ExprKind::SelfValue, loc)),
            TokenKind::Ident => Some(Expr::new(ExprKind::Ident(tok.text.clone()), loc)),
            _ => {
                self.error(format!("unexpected `{}` in expression", tok.text), loc);
                None
            }
        }
    }
}

/// Value of an integer literal in any supported radix; `None` on overflow.
fn parse_int(text: &str) -> Option<u128> {
    let digits = text.replace('_', "");
    let (radix, body) = match digits.get(..2) {
        Some("0x" | "0X") => (16, &digits[2..]),
        Some("0o" | "0O") => (8, &digits[2..]),
        Some("0b" | "0B") => (2, &digits[2..]),
        _ => (10, digits.as_str()),
    };
    u128::from_str_radix(body, radix).ok()
}

/// Strip the quotes of a string or rune literal and resolve escapes.
pub(crate) fn unquote(text: &str) -> String {
    if let Some(raw) = text.strip_prefix('`').and_then(|t| t.strip_suffix('`')) {
        return raw.to_string();
    }
    let inner = &text[1..text.len().saturating_sub(1).max(1)];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_radixes() {
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("0xff"), Some(255));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("0o17"), Some(15));
        assert_eq!(parse_int("999999999999999999999999999999999999999999"), None);
    }

    #[test]
    fn unquote_escapes() {
        assert_eq!(unquote(r#""a\tb\"c""#), "a\tb\"c");
        assert_eq!(unquote("`raw\\n`"), "raw\\n");
        assert_eq!(unquote(r"'\n'"), "\n");
        assert_eq!(unquote("\"\""), "");
    }
}
