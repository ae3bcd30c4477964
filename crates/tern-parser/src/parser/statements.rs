//! Statements inside function bodies.

use tern_common::span::Loc;
use tern_common::token::{Token, TokenKind};

use super::{comment_text, loc_of, Builder};
use crate::ast::{
    Assign, AssignOp, BinOp, Block, Case, Expr, ExprKind, Ident, IfStmt, LoopKind, LoopStmt, MatchStmt,
    Stmt, StmtKind, VarDecl,
};
use crate::range::{extract, find_top_level, split_commas};
use crate::segment::segments;

fn compound_op(kind: TokenKind) -> Option<AssignOp> {
    let op = match kind {
        TokenKind::Eq => return Some(AssignOp::Set),
        TokenKind::PlusPlus => return Some(AssignOp::Inc),
        TokenKind::MinusMinus => return Some(AssignOp::Dec),
        TokenKind::PlusEq => BinOp::Add,
        TokenKind::MinusEq => BinOp::Sub,
        TokenKind::StarEq => BinOp::Mul,
        TokenKind::SlashEq => BinOp::Div,
        TokenKind::PercentEq => BinOp::Rem,
        TokenKind::AmpEq => BinOp::BitAnd,
        TokenKind::PipeEq => BinOp::BitOr,
        TokenKind::CaretEq => BinOp::BitXor,
        TokenKind::ShlEq => BinOp::Shl,
        TokenKind::ShrEq => BinOp::Shr,
        _ => return None,
    };
    Some(AssignOp::Compound(op))
}

/// `x: T ...`, `x := ...` or `a, b := ...` at the start of a statement.
fn is_declaration(tokens: &[Token]) -> bool {
    match tokens {
        [name, colon, _, ..] if name.kind == TokenKind::Ident && colon.kind == TokenKind::Colon => true,
        _ => find_top_level(tokens, |t| t.kind == TokenKind::ColonEq).is_some(),
    }
}

/// A `case` or `default` whose statements are still being collected.
struct OpenCase {
    values: Vec<Expr>,
    is_default: bool,
    stmts: Vec<Stmt>,
    loc: Loc,
}

fn close_case(open: Option<OpenCase>, cases: &mut Vec<Case>, default: &mut Option<Case>) {
    let Some(open) = open else {
        return;
    };
    let body_loc = open.stmts.iter().fold(open.loc, |acc, s| acc.to(s.loc));
    let case = Case {
        values: open.values,
        body: Block {
            stmts: open.stmts,
            loc: body_loc,
        },
        loc: open.loc,
    };
    if open.is_default {
        *default = Some(case);
    } else {
        cases.push(case);
    }
}

/// Blank `_` names bind nothing.
fn binding(tok: &Token) -> Option<Ident> {
    (tok.text != "_").then(|| Ident::new(&tok.text, tok.loc()))
}

impl Builder {
    pub(crate) fn build_block(&mut self, inner: &[Token], loc: Loc) -> Block {
        let mut stmts = Vec::new();
        for seg in segments(inner) {
            self.here = loc_of(seg);
            if let Some(stmt) = self.build_stmt(seg) {
                stmts.push(stmt);
            }
        }
        Block { stmts, loc }
    }

    pub(crate) fn build_stmt(&mut self, tokens: &[Token]) -> Option<Stmt> {
        let loc = loc_of(tokens);
        let first = &tokens[0];
        let kind = match first.kind {
            TokenKind::Comment => StmtKind::Comment(comment_text(first)),
            TokenKind::Let | TokenKind::Const => StmtKind::Var(self.build_var(tokens)?),
            _ if is_declaration(tokens) => StmtKind::Var(self.build_var(tokens)?),
            _ if !matches!(
                first.kind,
                TokenKind::If | TokenKind::For | TokenKind::Match | TokenKind::Defer | TokenKind::Co
            ) && find_top_level(tokens, |t| t.kind.is_assign_op()).is_some() =>
            {
                StmtKind::Assign(self.build_assign(tokens)?)
            }
            TokenKind::Ret => match &tokens[1..] {
                [] => StmtKind::Ret(None),
                rest => StmtKind::Ret(Some(self.build_expr_list(rest)?)),
            },
            TokenKind::Break | TokenKind::Continue => {
                let label = match &tokens[1..] {
                    [] => None,
                    [name] if name.kind == TokenKind::Ident => Some(Ident::new(&name.text, name.loc())),
                    [extra, ..] => {
                        self.error(format!("unexpected `{}` after `{}`", extra.text, first.text), extra.loc());
                        return None;
                    }
                };
                if first.kind == TokenKind::Break {
                    StmtKind::Break(label)
                } else {
                    StmtKind::Continue(label)
                }
            }
            TokenKind::If => StmtKind::If(self.build_if(tokens)?),
            TokenKind::Else => {
                self.error("`else` without `if`", first.loc());
                return None;
            }
            TokenKind::For => StmtKind::Loop(self.build_for(tokens)?),
            TokenKind::Match => StmtKind::Match(self.build_match(tokens)?),
            TokenKind::Case | TokenKind::Default => {
                self.error(format!("`{}` outside of `match`", first.text), first.loc());
                return None;
            }
            TokenKind::Goto => match &tokens[1..] {
                [name] if name.kind == TokenKind::Ident => StmtKind::Goto(Ident::new(&name.text, name.loc())),
                _ => {
                    self.error("expected a label after `goto`", first.loc());
                    return None;
                }
            },
            TokenKind::Fall => {
                if let Some(extra) = tokens.get(1) {
                    self.error(format!("unexpected `{}` after `fall`", extra.text), extra.loc());
                }
                StmtKind::Fall
            }
            TokenKind::Defer => {
                if tokens.len() == 1 {
                    self.error("expected a statement after `defer`", first.loc());
                    return None;
                }
                StmtKind::Defer(Box::new(self.build_stmt(&tokens[1..])?))
            }
            TokenKind::Co => {
                let call = self.build_expr(&tokens[1..])?;
                if !matches!(call.kind, ExprKind::Call { .. }) {
                    self.error("`co` requires a function call", call.loc);
                    return None;
                }
                StmtKind::Co(call)
            }
            TokenKind::Unsafe if tokens.get(1).is_some_and(|t| t.kind == TokenKind::LBrace) => {
                StmtKind::Block {
                    block: self.build_nested_block(&tokens[1..])?,
                    unsafe_: true,
                }
            }
            TokenKind::LBrace => StmtKind::Block {
                block: self.build_nested_block(tokens)?,
                unsafe_: false,
            },
            TokenKind::Ident if tokens.len() == 2 && tokens[1].kind == TokenKind::Colon => {
                StmtKind::Label(Ident::new(&first.text, first.loc()))
            }
            _ => {
                let expr = self.build_expr(tokens)?;
                if !matches!(expr.kind, ExprKind::Call { .. }) {
                    self.error("expression is not a statement; only calls may stand alone", expr.loc);
                    return None;
                }
                StmtKind::Expr(expr)
            }
        };
        Some(Stmt { kind, loc })
    }

    /// `{ ... }` with nothing after the closing brace.
    fn build_nested_block(&mut self, tokens: &[Token]) -> Option<Block> {
        let mut pos = 0;
        let inner = extract(tokens, &mut pos)?;
        if let Some(extra) = tokens.get(pos) {
            self.error(format!("unexpected `{}` after block", extra.text), extra.loc());
        }
        Some(self.build_block(inner, loc_of(&tokens[..pos])))
    }

    /// `let`/`const` declarations, `x: T = e`, `x := e` and `let (a, b) = e`.
    pub(crate) fn build_var(&mut self, tokens: &[Token]) -> Option<VarDecl> {
        let loc = loc_of(tokens);
        let (constant, mut pos) = match tokens[0].kind {
            TokenKind::Const => (true, 1),
            TokenKind::Let => (false, 1),
            _ => (false, 0),
        };

        let mut names = Vec::new();
        if tokens.get(pos).is_some_and(|t| t.kind == TokenKind::LParen) {
            let open = pos;
            let inner = extract(tokens, &mut pos)?;
            for part in split_commas(inner) {
                match part {
                    [name] if name.kind == TokenKind::Ident => names.push(Ident::new(&name.text, name.loc())),
                    _ => {
                        let at = part.first().map_or(tokens[open].loc(), |t| t.loc());
                        self.error("expected a name in the destructuring list", at);
                        return None;
                    }
                }
            }
            if names.is_empty() {
                self.error("empty destructuring list", tokens[open].loc());
                return None;
            }
        } else {
            loop {
                let name = self.expect(tokens, &mut pos, TokenKind::Ident, "variable name")?;
                names.push(Ident::new(&name.text, name.loc()));
                if tokens.get(pos).is_some_and(|t| t.kind == TokenKind::Comma) {
                    pos += 1;
                } else {
                    break;
                }
            }
        }

        let (ty, init) = match tokens.get(pos).map(|t| t.kind) {
            Some(TokenKind::Colon) => {
                let rest = &tokens[pos + 1..];
                match find_top_level(rest, |t| t.kind == TokenKind::Eq) {
                    Some(eq) => {
                        let ty = self.build_type(&rest[..eq]);
                        let init = self.build_initializer(&rest[eq + 1..], &rest[eq]);
                        (Some(ty?), Some(init?))
                    }
                    None => (Some(self.build_type(rest)?), None),
                }
            }
            Some(TokenKind::ColonEq | TokenKind::Eq) => {
                let init = self.build_initializer(&tokens[pos + 1..], &tokens[pos])?;
                (None, Some(init))
            }
            Some(_) => {
                let tok = &tokens[pos];
                self.error(format!("unexpected `{}` in declaration", tok.text), tok.loc());
                return None;
            }
            None => {
                self.error(
                    format!("declaration of `{}` needs a type or a value", names[0].name),
                    names[0].loc,
                );
                return None;
            }
        };
        if constant && init.is_none() {
            self.error(format!("constant `{}` must be initialized", names[0].name), names[0].loc);
            return None;
        }
        Some(VarDecl {
            names,
            ty,
            init,
            constant,
            loc,
        })
    }

    fn build_initializer(&mut self, tokens: &[Token], op: &Token) -> Option<Expr> {
        if tokens.is_empty() {
            self.error(format!("missing value after `{}`", op.text), op.loc());
            return None;
        }
        self.build_expr_list(tokens)
    }

    fn build_assign(&mut self, tokens: &[Token]) -> Option<Assign> {
        let at = find_top_level(tokens, |t| t.kind.is_assign_op())?;
        let op_tok = &tokens[at];
        let op = compound_op(op_tok.kind)?;
        if at == 0 {
            self.error(format!("missing target before `{}`", op_tok.text), op_tok.loc());
            return None;
        }
        let targets = self.build_exprs(&split_commas(&tokens[..at]));
        let rest = &tokens[at + 1..];
        let values = match op {
            AssignOp::Inc | AssignOp::Dec => {
                if let Some(extra) = rest.first() {
                    self.error(format!("unexpected `{}` after `{}`", extra.text, op_tok.text), extra.loc());
                    return None;
                }
                Vec::new()
            }
            _ if rest.is_empty() => {
                self.error(format!("missing value after `{}`", op_tok.text), op_tok.loc());
                return None;
            }
            _ => self.build_exprs(&split_commas(rest))?,
        };
        let targets = targets?;
        if !matches!(op, AssignOp::Set) && targets.len() != 1 {
            self.error(format!("`{}` takes exactly one target", op_tok.text), op_tok.loc());
            return None;
        }
        Some(Assign { targets, op, values })
    }

    /// The condition before a body brace, and the body.
    fn build_guarded_body<'t>(
        &mut self,
        tokens: &'t [Token],
        pos: &mut usize,
        what: &str,
    ) -> Option<(Option<&'t [Token]>, Block)> {
        let rest = &tokens[*pos..];
        let Some(brace) = find_top_level(rest, |t| t.kind == TokenKind::LBrace) else {
            let at = rest.first().unwrap_or(&tokens[*pos - 1]).loc();
            self.error(format!("missing body for `{what}`"), at);
            return None;
        };
        let header = (brace > 0).then(|| &rest[..brace]);
        *pos += brace;
        let open = *pos;
        let inner = extract(tokens, pos)?;
        let body = self.build_block(inner, loc_of(&tokens[open..*pos]));
        Some((header, body))
    }

    fn build_if(&mut self, tokens: &[Token]) -> Option<IfStmt> {
        let mut pos = 1;
        let mut branches = Vec::new();
        let mut else_block = None;
        loop {
            let keyword = &tokens[pos - 1];
            let (cond, body) = self.build_guarded_body(tokens, &mut pos, "if")?;
            let Some(cond) = cond else {
                self.error("missing condition for `if`", keyword.loc());
                return None;
            };
            branches.push((self.build_expr(cond)?, body));

            match (tokens.get(pos).map(|t| t.kind), tokens.get(pos + 1).map(|t| t.kind)) {
                (Some(TokenKind::Else), Some(TokenKind::If)) => pos += 2,
                (Some(TokenKind::Else), Some(TokenKind::LBrace)) => {
                    pos += 1;
                    let open = pos;
                    let inner = extract(tokens, &mut pos)?;
                    else_block = Some(self.build_block(inner, loc_of(&tokens[open..pos])));
                    break;
                }
                (Some(TokenKind::Else), _) => {
                    self.error("expected `if` or `{` after `else`", tokens[pos].loc());
                    return None;
                }
                _ => break,
            }
        }
        if let Some(extra) = tokens.get(pos) {
            self.error(format!("unexpected `{}` after `if` statement", extra.text), extra.loc());
        }
        Some(IfStmt { branches, else_block })
    }

    fn build_for(&mut self, tokens: &[Token]) -> Option<LoopStmt> {
        let mut pos = 1;
        let (header, body) = self.build_guarded_body(tokens, &mut pos, "for")?;
        if let Some(extra) = tokens.get(pos) {
            self.error(format!("unexpected `{}` after loop body", extra.text), extra.loc());
        }
        let kind = match header {
            None => LoopKind::Infinite,
            Some(header) => match find_top_level(header, |t| t.kind == TokenKind::In) {
                Some(in_at) => {
                    let names = split_commas(&header[..in_at]);
                    let (key, value) = match names.as_slice() {
                        [[key]] if key.kind == TokenKind::Ident => (binding(key), None),
                        [[key], [value]] if key.kind == TokenKind::Ident && value.kind == TokenKind::Ident => {
                            (binding(key), binding(value))
                        }
                        _ => {
                            self.error("expected one or two names before `in`", header[0].loc());
                            return None;
                        }
                    };
                    if in_at + 1 == header.len() {
                        self.error("missing expression after `in`", header[in_at].loc());
                        return None;
                    }
                    let expr = self.build_expr(&header[in_at + 1..])?;
                    LoopKind::Iter { key, value, expr }
                }
                None => LoopKind::While(self.build_expr(header)?),
            },
        };
        Some(LoopStmt { kind, body })
    }

    fn build_match(&mut self, tokens: &[Token]) -> Option<MatchStmt> {
        let mut pos = 1;
        let Some(brace) = find_top_level(&tokens[1..], |t| t.kind == TokenKind::LBrace) else {
            self.error("missing body for `match`", tokens[0].loc());
            return None;
        };
        let subject = match brace {
            0 => None,
            _ => Some(self.build_expr(&tokens[1..1 + brace])?),
        };
        pos += brace;
        let inner = extract(tokens, &mut pos)?;
        if let Some(extra) = tokens.get(pos) {
            self.error(format!("unexpected `{}` after `match` body", extra.text), extra.loc());
        }

        let mut cases = Vec::new();
        let mut default: Option<Case> = None;
        let mut current: Option<OpenCase> = None;

        for seg in segments(inner) {
            self.here = loc_of(seg);
            let head = &seg[0];
            match head.kind {
                TokenKind::Case | TokenKind::Default => {
                    close_case(current.take(), &mut cases, &mut default);
                    let Some(colon) = find_top_level(seg, |t| t.kind == TokenKind::Colon) else {
                        self.error(format!("expected `:` after `{}`", head.text), head.loc());
                        continue;
                    };
                    let is_default = head.kind == TokenKind::Default;
                    let values = if is_default {
                        if colon != 1 {
                            self.error("`default` takes no values", seg[1].loc());
                        }
                        if default.is_some() {
                            self.error("duplicate `default` in `match`", head.loc());
                        }
                        Vec::new()
                    } else if colon == 1 {
                        self.error("`case` needs at least one value", head.loc());
                        Vec::new()
                    } else {
                        self.build_exprs(&split_commas(&seg[1..colon])).unwrap_or_default()
                    };
                    let mut stmts = Vec::new();
                    if colon + 1 < seg.len() {
                        stmts.extend(self.build_stmt(&seg[colon + 1..]));
                    }
                    current = Some(OpenCase {
                        values,
                        is_default,
                        stmts,
                        loc: loc_of(&seg[..=colon]),
                    });
                }
                _ => match current.as_mut() {
                    Some(open) => open.stmts.extend(self.build_stmt(seg)),
                    None if head.kind == TokenKind::Comment => {}
                    None => self.error("statement before the first `case`", head.loc()),
                },
            }
        }
        close_case(current.take(), &mut cases, &mut default);

        Some(MatchStmt {
            subject,
            cases,
            default,
        })
    }
}
