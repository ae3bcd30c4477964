//! Type descriptor parsing.

use tern_common::token::{Token, TokenKind};

use super::{loc_of, Builder};
use crate::ast::{ArraySize, FnType, Ident, NamedType, PrimType, TypeKind, TypeNode};
use crate::range::{find_close, find_top_level, split_commas};

/// Tokens that can begin a type.
pub(crate) fn starts_type(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident
            | TokenKind::Star
            | TokenKind::Amp
            | TokenKind::AmpAmp
            | TokenKind::LBracket
            | TokenKind::Fn
            | TokenKind::LParen
            | TokenKind::Cpp
    )
}

impl Builder {
    /// Build a slice that must hold exactly one type.
    pub(crate) fn build_type(&mut self, tokens: &[Token]) -> Option<TypeNode> {
        if tokens.is_empty() {
            self.error("missing type", self.here);
            return None;
        }
        let mut pos = 0;
        let ty = self.build_type_at(tokens, &mut pos)?;
        if let Some(extra) = tokens.get(pos) {
            self.error(format!("unexpected `{}` after type `{ty}`", extra.text), extra.loc());
            return None;
        }
        Some(ty)
    }

    /// Build the type starting at `tokens[*pos]`, leaving `*pos` on the
    /// first token after it.
    pub(crate) fn build_type_at(&mut self, tokens: &[Token], pos: &mut usize) -> Option<TypeNode> {
        let start = *pos;
        let Some(tok) = tokens.get(start) else {
            let at = tokens.last().map_or(self.here, |t| t.loc());
            self.error("missing type", at);
            return None;
        };

        let kind = match tok.kind {
            TokenKind::Star => {
                *pos += 1;
                if tokens.get(*pos).is_some_and(|t| t.kind == TokenKind::Unsafe) {
                    *pos += 1;
                    TypeKind::UnsafePtr
                } else {
                    TypeKind::Ptr(Box::new(self.build_type_at(tokens, pos)?))
                }
            }
            TokenKind::Amp => {
                *pos += 1;
                match tokens.get(*pos).map(|t| t.kind) {
                    Some(TokenKind::Amp | TokenKind::AmpAmp) => {
                        self.error("reference to a reference is not allowed", tok.loc());
                        return None;
                    }
                    Some(TokenKind::Star) => {
                        self.error("reference to a pointer is not allowed", tok.loc());
                        return None;
                    }
                    _ => TypeKind::Ref(Box::new(self.build_type_at(tokens, pos)?)),
                }
            }
            TokenKind::AmpAmp => {
                self.error("reference to a reference is not allowed", tok.loc());
                return None;
            }
            TokenKind::LBracket => self.build_bracket_type(tokens, pos)?,
            TokenKind::Fn => TypeKind::Func(self.build_fn_type(tokens, pos)?),
            TokenKind::LParen => {
                let Some(close) = find_close(tokens, start) else {
                    self.error("unclosed `(` in type", tok.loc());
                    return None;
                };
                let inner = &tokens[start + 1..close];
                *pos = close + 1;
                let mut elems = Vec::new();
                for part in split_commas(inner) {
                    elems.push(self.build_type(part)?);
                }
                match elems.len() {
                    0 => {
                        self.error("empty tuple type", tok.loc());
                        return None;
                    }
                    1 => {
                        let mut single = elems.remove(0);
                        single.loc = loc_of(&tokens[start..*pos]);
                        return Some(single);
                    }
                    _ => TypeKind::Tuple(elems),
                }
            }
            TokenKind::Cpp => {
                *pos += 1;
                self.expect(tokens, pos, TokenKind::Dot, "`.` after `cpp`")?;
                let name = self.expect(tokens, pos, TokenKind::Ident, "foreign type name")?;
                TypeKind::Named(NamedType {
                    namespace: Vec::new(),
                    name: Ident::new(&name.text, name.loc()),
                    generics: Vec::new(),
                    foreign: true,
                })
            }
            TokenKind::Ident => self.build_named_type(tokens, pos)?,
            _ => {
                self.error(format!("invalid type: `{}`", tok.text), tok.loc());
                return None;
            }
        };
        Some(TypeNode::new(kind, loc_of(&tokens[start..*pos])))
    }

    /// `[]T`, `[N]T`, `[...]T` or `[K:V]`.
    fn build_bracket_type(&mut self, tokens: &[Token], pos: &mut usize) -> Option<TypeKind> {
        let open = *pos;
        let Some(close) = find_close(tokens, open) else {
            self.error("unclosed `[` in type", tokens[open].loc());
            return None;
        };
        let inner = &tokens[open + 1..close];
        *pos = close + 1;

        if inner.is_empty() {
            return Some(TypeKind::Slice(Box::new(self.build_type_at(tokens, pos)?)));
        }
        if let [only] = inner {
            if only.kind == TokenKind::Ellipsis {
                let elem = self.build_type_at(tokens, pos)?;
                return Some(TypeKind::Array {
                    size: ArraySize::Auto,
                    elem: Box::new(elem),
                });
            }
        }
        if let Some(colon) = find_top_level(inner, |t| t.kind == TokenKind::Colon) {
            let key = self.build_type(&inner[..colon])?;
            let value = self.build_type(&inner[colon + 1..])?;
            return Some(TypeKind::Map {
                key: Box::new(key),
                value: Box::new(value),
            });
        }
        let size = self.build_expr(inner)?;
        let elem = self.build_type_at(tokens, pos)?;
        Some(TypeKind::Array {
            size: ArraySize::Expr(Box::new(size)),
            elem: Box::new(elem),
        })
    }

    /// `fn(A, ...B) R`. Parameter names are allowed and ignored.
    pub(crate) fn build_fn_type(&mut self, tokens: &[Token], pos: &mut usize) -> Option<FnType> {
        *pos += 1;
        let open = *pos;
        if tokens.get(open).map(|t| t.kind) != Some(TokenKind::LParen) {
            let at = tokens.get(open).unwrap_or(&tokens[open - 1]).loc();
            self.error("expected `(` after `fn`", at);
            return None;
        }
        let Some(close) = find_close(tokens, open) else {
            self.error("unclosed `(` in function type", tokens[open].loc());
            return None;
        };
        *pos = close + 1;

        let mut params = Vec::new();
        let mut variadic = false;
        let parts = split_commas(&tokens[open + 1..close]);
        let count = parts.len();
        for (i, mut part) in parts.into_iter().enumerate() {
            if part.len() > 2 && part[0].kind == TokenKind::Ident && part[1].kind == TokenKind::Colon {
                part = &part[2..];
            }
            if part.first().is_some_and(|t| t.kind == TokenKind::Ellipsis) {
                if i + 1 != count {
                    self.error("variadic parameter must be the last parameter", part[0].loc());
                }
                variadic = true;
                part = &part[1..];
            }
            params.push(self.build_type(part)?);
        }

        let result = match tokens.get(*pos) {
            Some(tok) if starts_type(tok.kind) => Some(Box::new(self.build_type_at(tokens, pos)?)),
            _ => None,
        };
        Some(FnType {
            params,
            variadic,
            result,
        })
    }

    /// `Name`, `ns::Name`, `Name[A, B]` or a primitive.
    fn build_named_type(&mut self, tokens: &[Token], pos: &mut usize) -> Option<TypeKind> {
        let mut segments = vec![&tokens[*pos]];
        *pos += 1;
        while tokens.get(*pos).is_some_and(|t| t.kind == TokenKind::ColonColon) {
            *pos += 1;
            segments.push(self.expect(tokens, pos, TokenKind::Ident, "name after `::`")?);
        }
        let last = segments.pop()?;

        let mut generics = Vec::new();
        if tokens.get(*pos).is_some_and(|t| t.kind == TokenKind::LBracket) {
            let open = *pos;
            let Some(close) = find_close(tokens, open) else {
                self.error("unclosed `[` in generic arguments", tokens[open].loc());
                return None;
            };
            *pos = close + 1;
            let parts = split_commas(&tokens[open + 1..close]);
            if parts.is_empty() {
                self.error("empty generic argument list", tokens[open].loc());
                return None;
            }
            for part in parts {
                generics.push(self.build_type(part)?);
            }
        }

        if segments.is_empty() {
            if let Some(prim) = PrimType::from_name(&last.text) {
                if !generics.is_empty() {
                    self.error(format!("primitive type `{prim}` takes no generic arguments"), last.loc());
                    return None;
                }
                return Some(TypeKind::Prim(prim));
            }
        }
        Some(TypeKind::Named(NamedType {
            namespace: segments.iter().map(|t| Ident::new(&t.text, t.loc())).collect(),
            name: Ident::new(&last.text, last.loc()),
            generics,
            foreign: false,
        }))
    }
}
