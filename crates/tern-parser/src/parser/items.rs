//! Top-level declarations.

use tern_common::token::{Token, TokenKind};

use super::expressions::unquote;
use super::{comment_text, loc_of, without_comments, Builder};
use crate::ast::{
    Attr, EnumDecl, EnumItem, Field, FnDecl, Ident, ImplDecl, Item, ItemKind, LinkDecl, StructDecl,
    TraitDecl, TypeAliasDecl, UseDecl, UseSelection,
};
use crate::range::{extract, find_top_level, split_commas};
use crate::segment::segments;

/// What a function declaration may or must contain in its position.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FnRules {
    body: BodyRule,
    methods: bool,
    anonymous: bool,
    /// The declaration is the last statement of the input.
    at_end: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyRule {
    Required,
    Forbidden,
}

impl FnRules {
    fn top_level(at_end: bool) -> Self {
        Self {
            body: BodyRule::Required,
            methods: false,
            anonymous: false,
            at_end,
        }
    }

    fn method() -> Self {
        Self {
            methods: true,
            ..Self::top_level(false)
        }
    }

    fn prototype(methods: bool) -> Self {
        Self {
            body: BodyRule::Forbidden,
            methods,
            anonymous: false,
            at_end: false,
        }
    }

    pub(crate) fn anonymous() -> Self {
        Self {
            anonymous: true,
            ..Self::top_level(false)
        }
    }
}

impl Builder {
    pub(crate) fn build_item(&mut self, tokens: &[Token], at_end: bool) -> Option<Item> {
        let mut tokens = tokens;
        while tokens.first().is_some_and(|t| t.kind == TokenKind::Hash) {
            match tokens.get(1) {
                Some(name) if name.kind == TokenKind::Ident => {
                    self.attrs.push(Attr {
                        name: Ident::new(&name.text, name.loc()),
                    });
                    tokens = &tokens[2..];
                }
                _ => {
                    self.error("expected attribute name after `#`", tokens[0].loc());
                    tokens = &tokens[1..];
                }
            }
        }
        let first = tokens.first()?;
        if first.kind == TokenKind::Comment {
            self.doc_start.get_or_insert(first.loc());
            self.docs.push(comment_text(first));
            return None;
        }

        let public = first.kind == TokenKind::Pub;
        if public {
            tokens = &tokens[1..];
            if tokens.is_empty() {
                self.error("expected a declaration after `pub`", first.loc());
                return None;
            }
        }

        let kind = self.build_item_kind(tokens, at_end);
        let doc = (!self.docs.is_empty()).then(|| self.docs.join("\n"));
        self.docs.clear();
        self.doc_start = None;
        let attrs = std::mem::take(&mut self.attrs);
        Some(Item {
            kind: kind?,
            loc: loc_of(tokens),
            public,
            doc,
            attrs,
        })
    }

    fn build_item_kind(&mut self, tokens: &[Token], at_end: bool) -> Option<ItemKind> {
        let first = &tokens[0];
        let next = tokens.get(1).map(|t| t.kind);
        let kind = match first.kind {
            TokenKind::Use => {
                self.drop_pending("a `use` declaration");
                ItemKind::Use(self.build_use(tokens)?)
            }
            TokenKind::Impl => {
                self.drop_pending("an `impl` block");
                ItemKind::Impl(self.build_impl(tokens)?)
            }
            TokenKind::Fn => ItemKind::Fn(self.build_fn(tokens, FnRules::top_level(at_end))?),
            TokenKind::Unsafe if next == Some(TokenKind::Fn) => {
                let mut decl = self.build_fn(&tokens[1..], FnRules::top_level(at_end))?;
                decl.unsafe_ = true;
                decl.loc = loc_of(tokens);
                ItemKind::Fn(decl)
            }
            TokenKind::Let | TokenKind::Const => ItemKind::Global(self.build_var(tokens)?),
            TokenKind::Ident
                if matches!(next, Some(TokenKind::Colon | TokenKind::ColonEq | TokenKind::Comma)) =>
            {
                ItemKind::Global(self.build_var(tokens)?)
            }
            TokenKind::Type => ItemKind::TypeAlias(self.build_type_alias(tokens)?),
            TokenKind::Enum => ItemKind::Enum(self.build_enum(tokens)?),
            TokenKind::Struct => ItemKind::Struct(self.build_struct(tokens, true)?),
            TokenKind::Trait => ItemKind::Trait(self.build_trait(tokens)?),
            TokenKind::Cpp => ItemKind::Link(self.build_link(tokens)?),
            TokenKind::Else => {
                self.error("`else` without `if`", first.loc());
                return None;
            }
            _ => {
                self.error(
                    format!("expected a declaration, found `{}`", first.text),
                    first.loc(),
                );
                return None;
            }
        };
        Some(kind)
    }

    /// Report pending docs and attributes before a construct that takes
    /// neither.
    fn drop_pending(&mut self, what: &str) {
        self.docs.clear();
        if let Some(loc) = self.doc_start.take() {
            self.error(format!("doc comment cannot be applied to {what}"), loc);
        }
        for attr in std::mem::take(&mut self.attrs) {
            self.error(
                format!("attribute `{}` cannot be applied to {what}", attr.name.name),
                attr.name.loc,
            );
        }
    }

    /// Optional `[T, U]` after a declared name.
    fn build_generic_params(&mut self, tokens: &[Token], pos: &mut usize) -> Option<Vec<Ident>> {
        if tokens.get(*pos).map(|t| t.kind) != Some(TokenKind::LBracket) {
            return Some(Vec::new());
        }
        let open = *pos;
        let inner = extract(tokens, pos)?;
        let parts = split_commas(inner);
        if parts.is_empty() {
            self.error("empty generic parameter list", tokens[open].loc());
            return None;
        }
        let mut generics = Vec::new();
        for part in parts {
            match part {
                [name] if name.kind == TokenKind::Ident => generics.push(Ident::new(&name.text, name.loc())),
                _ => {
                    let at = part.first().map_or(tokens[open].loc(), |t| t.loc());
                    self.error("generic parameters must be plain names", at);
                    return None;
                }
            }
        }
        Some(generics)
    }

    pub(crate) fn build_fn(&mut self, tokens: &[Token], rules: FnRules) -> Option<FnDecl> {
        let fn_tok = &tokens[0];
        let mut pos = 1;
        let name = if rules.anonymous {
            Ident::new("<anonymous>", fn_tok.loc())
        } else {
            let tok = self.expect(tokens, &mut pos, TokenKind::Ident, "function name")?;
            Ident::new(&tok.text, tok.loc())
        };
        let generics = self.build_generic_params(tokens, &mut pos)?;
        if tokens.get(pos).map(|t| t.kind) != Some(TokenKind::LParen) {
            self.expect(tokens, &mut pos, TokenKind::LParen, "`(` to start the parameter list")?;
        }
        let inner = extract(tokens, &mut pos)?;
        let (receiver, params) = self.build_params(&name.name, inner, rules.methods);

        let result = match tokens.get(pos) {
            Some(tok) if tok.kind != TokenKind::LBrace => Some(self.build_type_at(tokens, &mut pos)?),
            _ => None,
        };

        let body = match tokens.get(pos) {
            Some(tok) if tok.kind == TokenKind::LBrace => {
                let open = pos;
                let inner = extract(tokens, &mut pos)?;
                if rules.body == BodyRule::Forbidden {
                    self.error(
                        format!("`{}` is a prototype and cannot have a body", name.name),
                        tok.loc(),
                    );
                }
                Some(self.build_block(inner, loc_of(&tokens[open..pos])))
            }
            Some(tok) => {
                self.error(format!("unexpected `{}` in function signature", tok.text), tok.loc());
                return None;
            }
            None if rules.body == BodyRule::Required => {
                let at = tokens[tokens.len() - 1].loc();
                self.error_related(
                    format!("missing body for function `{}`", name.name),
                    at,
                    "function declared here",
                    name.loc,
                );
                if rules.at_end {
                    self.halt();
                }
                return None;
            }
            None => None,
        };
        if let Some(extra) = tokens.get(pos) {
            self.error(format!("unexpected `{}` after function body", extra.text), extra.loc());
        }

        Some(FnDecl {
            name,
            generics,
            receiver,
            params,
            result,
            body,
            unsafe_: false,
            loc: loc_of(tokens),
        })
    }

    fn build_use(&mut self, tokens: &[Token]) -> Option<UseDecl> {
        let mut pos = 1;
        if tokens.get(pos).map(|t| t.kind) == Some(TokenKind::Cpp) {
            pos += 1;
            let header = self.expect(tokens, &mut pos, TokenKind::StringLiteral, "header path")?;
            self.reject_trailing(tokens, pos);
            return Some(UseDecl {
                path: Vec::new(),
                selection: UseSelection::Header(unquote(&header.text)),
            });
        }

        let mut path = Vec::new();
        let mut selection = UseSelection::Namespace;
        loop {
            let seg = self.expect(tokens, &mut pos, TokenKind::Ident, "package name")?;
            path.push(Ident::new(&seg.text, seg.loc()));
            if tokens.get(pos).map(|t| t.kind) != Some(TokenKind::ColonColon) {
                break;
            }
            pos += 1;
            match tokens.get(pos).map(|t| t.kind) {
                Some(TokenKind::Star) => {
                    pos += 1;
                    selection = UseSelection::All;
                    break;
                }
                Some(TokenKind::LBrace) => {
                    let inner = extract(tokens, &mut pos)?;
                    let mut names = Vec::new();
                    for part in split_commas(inner) {
                        match part {
                            [name] if name.kind == TokenKind::Ident => {
                                names.push(Ident::new(&name.text, name.loc()))
                            }
                            _ => {
                                let at = part.first().map_or(self.here, |t| t.loc());
                                self.error("expected a name in the import list", at);
                            }
                        }
                    }
                    selection = UseSelection::Names(names);
                    break;
                }
                _ => {}
            }
        }
        self.reject_trailing(tokens, pos);
        Some(UseDecl { path, selection })
    }

    fn reject_trailing(&mut self, tokens: &[Token], pos: usize) {
        if let Some(extra) = tokens.get(pos) {
            self.error(format!("unexpected `{}`", extra.text), extra.loc());
        }
    }

    fn build_type_alias(&mut self, tokens: &[Token]) -> Option<TypeAliasDecl> {
        let mut pos = 1;
        let name = self.expect(tokens, &mut pos, TokenKind::Ident, "type name")?;
        let name = Ident::new(&name.text, name.loc());
        self.expect(tokens, &mut pos, TokenKind::Eq, "`=` in type alias")?;
        let ty = self.build_type(&tokens[pos..])?;
        Some(TypeAliasDecl { name, ty })
    }

    /// Brace-delimited members, separated by rows or commas.
    fn member_parts<'t>(&mut self, tokens: &'t [Token], pos: &mut usize, what: &str) -> Option<Vec<&'t [Token]>> {
        if tokens.get(*pos).map(|t| t.kind) != Some(TokenKind::LBrace) {
            self.expect(tokens, pos, TokenKind::LBrace, &format!("`{{` to start {what}"))?;
        }
        let inner = extract(tokens, pos)?;
        self.reject_trailing(tokens, *pos);
        let mut parts = Vec::new();
        for seg in segments(inner) {
            if seg[0].kind == TokenKind::Comment {
                continue;
            }
            parts.extend(split_commas(seg).into_iter().filter(|p| !p.is_empty()));
        }
        Some(parts)
    }

    fn build_struct(&mut self, tokens: &[Token], body_required: bool) -> Option<StructDecl> {
        let mut pos = 1;
        let name = self.expect(tokens, &mut pos, TokenKind::Ident, "struct name")?;
        let name = Ident::new(&name.text, name.loc());
        let generics = self.build_generic_params(tokens, &mut pos)?;
        if !body_required && pos == tokens.len() {
            return Some(StructDecl {
                name,
                generics,
                fields: Vec::new(),
            });
        }

        let mut fields = Vec::new();
        for part in self.member_parts(tokens, &mut pos, "the struct body")? {
            let part = without_comments(part);
            let (public, part) = match part.first() {
                Some(t) if t.kind == TokenKind::Pub => (true, &part[1..]),
                _ => (false, &part[..]),
            };
            match part {
                [field, colon, ty @ ..] if field.kind == TokenKind::Ident && colon.kind == TokenKind::Colon => {
                    if let Some(ty) = self.build_type(ty) {
                        fields.push(Field {
                            name: Ident::new(&field.text, field.loc()),
                            ty,
                            public,
                        });
                    }
                }
                _ => {
                    let at = part.first().map_or(self.here, |t| t.loc());
                    self.error("expected a field declaration `name: Type`", at);
                }
            }
        }
        Some(StructDecl {
            name,
            generics,
            fields,
        })
    }

    fn build_enum(&mut self, tokens: &[Token]) -> Option<EnumDecl> {
        let mut pos = 1;
        let name = self.expect(tokens, &mut pos, TokenKind::Ident, "enum name")?;
        let name = Ident::new(&name.text, name.loc());
        let base = if tokens.get(pos).map(|t| t.kind) == Some(TokenKind::Colon) {
            pos += 1;
            Some(self.build_type_at(tokens, &mut pos)?)
        } else {
            None
        };

        let mut items = Vec::new();
        for part in self.member_parts(tokens, &mut pos, "the enum body")? {
            match part {
                [item] if item.kind == TokenKind::Ident => items.push(EnumItem {
                    name: Ident::new(&item.text, item.loc()),
                    value: None,
                }),
                [item, eq, value @ ..] if item.kind == TokenKind::Ident && eq.kind == TokenKind::Eq => {
                    if let Some(value) = self.build_expr(value) {
                        items.push(EnumItem {
                            name: Ident::new(&item.text, item.loc()),
                            value: Some(value),
                        });
                    }
                }
                _ => self.error("expected an enum item `Name` or `Name = value`", part[0].loc()),
            }
        }
        Some(EnumDecl { name, base, items })
    }

    fn build_trait(&mut self, tokens: &[Token]) -> Option<TraitDecl> {
        let mut pos = 1;
        let name = self.expect(tokens, &mut pos, TokenKind::Ident, "trait name")?;
        let name = Ident::new(&name.text, name.loc());
        let generics = self.build_generic_params(tokens, &mut pos)?;
        let body = self.body_statements(tokens, &mut pos, "the trait body")?;

        let mut methods = Vec::new();
        for seg in body {
            if seg[0].kind != TokenKind::Fn {
                self.error("a trait may only declare methods", seg[0].loc());
                continue;
            }
            let Some(method) = self.build_fn(seg, FnRules::prototype(true)) else {
                continue;
            };
            if method.receiver.is_none() {
                self.error(
                    format!("trait method `{}` must take `self` or `&self`", method.name.name),
                    method.name.loc,
                );
            }
            methods.push(method);
        }
        Some(TraitDecl {
            name,
            generics,
            methods,
        })
    }

    fn build_impl(&mut self, tokens: &[Token]) -> Option<ImplDecl> {
        let Some(open) = find_top_level(tokens, |t| t.kind == TokenKind::LBrace) else {
            self.error("missing body for `impl`", tokens[0].loc());
            return None;
        };
        let header = &tokens[1..open];
        let (trait_name, target) = match header.iter().position(|t| t.kind == TokenKind::For) {
            Some(f) => (Some(self.build_type(&header[..f])?), &header[f + 1..]),
            None => (None, header),
        };
        let target = match target {
            [name] if name.kind == TokenKind::Ident => Ident::new(&name.text, name.loc()),
            _ => {
                let at = target.first().map_or(tokens[0].loc(), |t| t.loc());
                self.error("expected the name of the implementing struct", at);
                return None;
            }
        };

        let mut pos = open;
        let mut methods = Vec::new();
        for seg in self.body_statements(tokens, &mut pos, "the impl body")? {
            let seg = match seg {
                [p, rest @ ..] if p.kind == TokenKind::Pub && !rest.is_empty() => rest,
                _ => seg,
            };
            if seg[0].kind != TokenKind::Fn {
                self.error("an impl block may only contain methods", seg[0].loc());
                continue;
            }
            if let Some(method) = self.build_fn(seg, FnRules::method()) {
                methods.push(method);
            }
        }
        Some(ImplDecl {
            trait_name,
            target,
            methods,
        })
    }

    /// The statements of a brace-delimited body, comments and attributes skipped.
    fn body_statements<'t>(&mut self, tokens: &'t [Token], pos: &mut usize, what: &str) -> Option<Vec<&'t [Token]>> {
        if tokens.get(*pos).map(|t| t.kind) != Some(TokenKind::LBrace) {
            self.expect(tokens, pos, TokenKind::LBrace, &format!("`{{` to start {what}"))?;
        }
        let inner = extract(tokens, pos)?;
        self.reject_trailing(tokens, *pos);
        Some(
            segments(inner)
                .filter(|seg| !matches!(seg[0].kind, TokenKind::Comment | TokenKind::Hash))
                .collect(),
        )
    }

    fn build_link(&mut self, tokens: &[Token]) -> Option<LinkDecl> {
        let rest = &tokens[1..];
        match rest.first().map(|t| t.kind) {
            Some(TokenKind::Fn) => Some(LinkDecl::Fn(self.build_fn(rest, FnRules::prototype(false))?)),
            Some(TokenKind::Struct) => Some(LinkDecl::Struct(self.build_struct(rest, false)?)),
            Some(TokenKind::Type) => match rest {
                [_, name] if name.kind == TokenKind::Ident => {
                    Some(LinkDecl::Type(Ident::new(&name.text, name.loc())))
                }
                _ => {
                    self.error("expected `cpp type Name`", tokens[0].loc());
                    None
                }
            },
            _ => {
                self.error("expected `fn`, `struct` or `type` after `cpp`", tokens[0].loc());
                None
            }
        }
    }
}
