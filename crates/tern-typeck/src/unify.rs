//! Generic argument inference.
//!
//! Each generic parameter of the callee becomes a key in an ena
//! [`InPlaceUnificationTable`] whose value is the type it is bound to.
//! Parameter types (resolved with the parameters as [`Ty::Generic`]
//! placeholders) are walked structurally against argument types; every
//! placeholder reached binds its key.

use ena::unify::InPlaceUnificationTable;
use rustc_hash::FxHashMap;

use crate::ty::{GenericVar, Ty};

/// A parameter bound to two different types.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub param: String,
    pub first: Ty,
    pub second: Ty,
}

pub struct Inference {
    table: InPlaceUnificationTable<GenericVar>,
    vars: FxHashMap<String, GenericVar>,
    order: Vec<String>,
}

impl Inference {
    pub fn new(params: &[String]) -> Self {
        let mut table = InPlaceUnificationTable::new();
        let mut vars = FxHashMap::default();
        for name in params {
            let var: GenericVar = table.new_key(None);
            vars.insert(name.clone(), var);
        }
        Self {
            table,
            vars,
            order: params.to_vec(),
        }
    }

    /// The bound type of `param`, if any.
    pub fn binding(&mut self, param: &str) -> Option<Ty> {
        let var = *self.vars.get(param)?;
        self.table.probe_value(var)
    }

    /// Bind placeholders in `param` from the matching parts of `arg`.
    /// Shape mismatches bind nothing; assignability reports them later.
    pub fn unify(&mut self, param: &Ty, arg: &Ty) -> Result<(), Conflict> {
        match (param, arg) {
            (_, Ty::Error | Ty::Nil) => Ok(()),
            (Ty::Generic(name), _) => match self.vars.get(name).copied() {
                Some(var) => self.bind(name, var, arg),
                None => Ok(()),
            },
            (Ty::Ptr(p), Ty::Ptr(a) | Ty::Ref(a))
            | (Ty::Ref(p), Ty::Ref(a) | Ty::Ptr(a))
            | (Ty::Slice(p), Ty::Slice(a))
            | (Ty::Array(_, p), Ty::Array(_, a)) => self.unify(p, a),
            // A reference parameter accepts a value through implicit borrowing.
            (Ty::Ref(p), a) => self.unify(p, a),
            (Ty::Map(pk, pv), Ty::Map(ak, av)) => {
                self.unify(pk, ak)?;
                self.unify(pv, av)
            }
            (Ty::Tuple(ps), Ty::Tuple(args)) if ps.len() == args.len() => {
                ps.iter().zip(args).try_for_each(|(p, a)| self.unify(p, a))
            }
            (Ty::Func(p), Ty::Func(a)) if p.params.len() == a.params.len() => {
                p.params
                    .iter()
                    .zip(&a.params)
                    .try_for_each(|(p, a)| self.unify(p, a))?;
                self.unify(&p.ret, &a.ret)
            }
            (Ty::Struct(p), Ty::Struct(a)) if p.id == a.id => {
                p.generics
                    .iter()
                    .zip(&a.generics)
                    .try_for_each(|(p, a)| self.unify(p, a))
            }
            _ => Ok(()),
        }
    }

    fn bind(&mut self, name: &str, var: GenericVar, ty: &Ty) -> Result<(), Conflict> {
        self.table
            .unify_var_value(var, Some(ty.clone()))
            .map_err(|(first, second)| Conflict {
                param: name.to_string(),
                first,
                second,
            })
    }

    /// Bind `param` to `ty` unless it is already bound. Used for untyped
    /// constant arguments, which only decide a parameter nothing else did.
    pub fn default_to(&mut self, param: &Ty, ty: &Ty) {
        if let Ty::Generic(name) = param {
            if let Some(var) = self.vars.get(name).copied() {
                if self.table.probe_value(var).is_none() {
                    let _ = self.bind(name, var, ty);
                }
            }
        }
    }

    /// The bound types in parameter order, or the first unbound parameter.
    pub fn finish(mut self) -> Result<Vec<Ty>, String> {
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .map(|name| self.binding(&name).ok_or(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::FnSig;

    fn g(name: &str) -> Ty {
        Ty::Generic(name.into())
    }

    #[test]
    fn binds_through_containers() {
        let mut inf = Inference::new(&["K".into(), "V".into()]);
        let param = Ty::Map(Box::new(g("K")), Box::new(Ty::Slice(Box::new(g("V")))));
        let arg = Ty::Map(Box::new(Ty::STR), Box::new(Ty::Slice(Box::new(Ty::BOOL))));
        inf.unify(&param, &arg).unwrap();
        assert_eq!(inf.finish(), Ok(vec![Ty::STR, Ty::BOOL]));
    }

    #[test]
    fn binds_through_function_types() {
        let mut inf = Inference::new(&["T".into(), "R".into()]);
        let param = Ty::Func(Box::new(FnSig {
            params: vec![g("T")],
            variadic: false,
            ret: g("R"),
        }));
        let arg = Ty::Func(Box::new(FnSig {
            params: vec![Ty::INT],
            variadic: false,
            ret: Ty::STR,
        }));
        inf.unify(&param, &arg).unwrap();
        assert_eq!(inf.finish(), Ok(vec![Ty::INT, Ty::STR]));
    }

    #[test]
    fn conflicting_bindings_are_reported() {
        let mut inf = Inference::new(&["T".into()]);
        inf.unify(&g("T"), &Ty::INT).unwrap();
        let err = inf.unify(&g("T"), &Ty::STR).unwrap_err();
        assert_eq!(
            err,
            Conflict {
                param: "T".into(),
                first: Ty::INT,
                second: Ty::STR
            }
        );
    }

    #[test]
    fn defaults_only_fill_unbound_parameters() {
        let mut inf = Inference::new(&["T".into()]);
        inf.unify(&g("T"), &Ty::Prim(crate::ty::PrimType::U8)).unwrap();
        inf.default_to(&g("T"), &Ty::INT);
        assert_eq!(inf.finish(), Ok(vec![Ty::Prim(crate::ty::PrimType::U8)]));
    }

    #[test]
    fn unbound_parameter_is_named() {
        let mut inf = Inference::new(&["T".into(), "U".into()]);
        inf.unify(&g("T"), &Ty::INT).unwrap();
        assert_eq!(inf.finish(), Err("U".to_string()));
    }
}
