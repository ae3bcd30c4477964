//! Lexical scopes for local variables.
//!
//! Scope-stack-based environment for name resolution: each block pushes a
//! frame, lookup walks from the innermost frame outward, and popping a frame
//! hands back the locals that were never read.

use rustc_hash::FxHashMap;
use tern_common::span::Loc;

use crate::consts::ConstValue;
use crate::ty::Ty;

#[derive(Clone, Debug)]
pub struct Local {
    pub ty: Ty,
    /// Set for `const` locals.
    pub constant: Option<ConstValue>,
    /// A `const` declared without a type keeps its literal's flexibility.
    pub untyped: bool,
    pub is_const: bool,
    pub loc: Loc,
    pub used: bool,
    /// Parameters and loop variables are never reported as unused.
    pub report_unused: bool,
}

impl Local {
    pub fn var(ty: Ty, loc: Loc) -> Self {
        Self {
            ty,
            constant: None,
            untyped: false,
            is_const: false,
            loc,
            used: false,
            report_unused: true,
        }
    }

    pub fn param(ty: Ty, loc: Loc) -> Self {
        Self {
            report_unused: false,
            ..Self::var(ty, loc)
        }
    }
}

#[derive(Debug, Default)]
struct Frame {
    vars: FxHashMap<String, Local>,
    order: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Pop the innermost frame, returning its unread locals in declaration order.
    pub fn pop(&mut self) -> Vec<(String, Loc)> {
        let Some(mut frame) = self.frames.pop() else {
            return Vec::new();
        };
        frame
            .order
            .drain(..)
            .filter_map(|name| {
                let local = frame.vars.remove(&name)?;
                (!local.used && local.report_unused).then_some((name, local.loc))
            })
            .collect()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Declare in the innermost frame. A name already declared in that
    /// frame is rejected with its previous location; outer frames may be
    /// shadowed.
    pub fn declare(&mut self, name: &str, local: Local) -> Result<(), Loc> {
        if self.frames.is_empty() {
            self.push();
        }
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        if let Some(prev) = frame.vars.get(name) {
            return Err(prev.loc);
        }
        frame.order.push(name.to_string());
        frame.vars.insert(name.to_string(), local);
        Ok(())
    }

    /// Innermost binding of `name`, marking it as read.
    pub fn lookup(&mut self, name: &str) -> Option<&Local> {
        let local = self.frames.iter_mut().rev().find_map(|f| f.vars.get_mut(name))?;
        local.used = true;
        Some(local)
    }

    /// Innermost binding of `name` without marking it as read.
    pub fn peek(&self, name: &str) -> Option<&Local> {
        self.frames.iter().rev().find_map(|f| f.vars.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_common::span::{FileId, Span};

    fn at(row: u32) -> Loc {
        Loc::new(FileId(0), row, 1, Span::new(0, 1))
    }

    #[test]
    fn inner_frames_shadow_outer() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.declare("x", Local::var(Ty::INT, at(1))).unwrap();
        scopes.push();
        scopes.declare("x", Local::var(Ty::STR, at(2))).unwrap();
        assert_eq!(scopes.lookup("x").map(|l| l.ty.clone()), Some(Ty::STR));
        scopes.pop();
        assert_eq!(scopes.lookup("x").map(|l| l.ty.clone()), Some(Ty::INT));
    }

    #[test]
    fn redeclaration_in_one_frame_is_rejected() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.declare("x", Local::var(Ty::INT, at(1))).unwrap();
        assert_eq!(scopes.declare("x", Local::var(Ty::INT, at(3))), Err(at(1)));
    }

    #[test]
    fn pop_reports_unread_locals_only() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.declare("a", Local::var(Ty::INT, at(1))).unwrap();
        scopes.declare("b", Local::var(Ty::INT, at(2))).unwrap();
        scopes.declare("p", Local::param(Ty::INT, at(3))).unwrap();
        scopes.lookup("a");
        assert!(scopes.peek("b").is_some_and(|l| !l.used));
        assert_eq!(scopes.pop(), vec![("b".to_string(), at(2))]);
        assert_eq!(scopes.depth(), 0);
    }
}
