// Unification for generic call sites (§4.3.2). Traverses list element,
// option inner, result ok/err, function params/return, record field types
// (names must match), and union names (nominal equality).

use super::Checker;
use crate::diagnostics::DiagnosticBuilder;
use crate::token::Span;
use crate::types::{Substitution, Type};

pub fn unify(declared: &Type, arg: &Type, subst: &mut Substitution, checker: &mut Checker, span: Span) {
    let declared = subst.apply(declared);
    match (&declared, arg) {
        (Type::Var(id), _) => subst.insert(*id, arg.clone()),
        (Type::List(a), Type::List(b)) => unify(a, b, subst, checker, span),
        (Type::Option(a), Type::Option(b)) => unify(a, b, subst, checker, span),
        (Type::Result(a_ok, a_err), Type::Result(b_ok, b_err)) => {
            unify(a_ok, b_ok, subst, checker, span);
            unify(a_err, b_err, subst, checker, span);
        }
        (Type::Map(a_k, a_v), Type::Map(b_k, b_v)) => {
            unify(a_k, b_k, subst, checker, span);
            unify(a_v, b_v, subst, checker, span);
        }
        (Type::Function { params: ap, return_type: ar, .. }, Type::Function { params: bp, return_type: br, .. }) => {
            for (a, b) in ap.iter().zip(bp) {
                unify(a, b, subst, checker, span);
            }
            unify(ar, br, subst, checker, span);
        }
        (Type::Record(a), Type::Record(b)) => {
            if a.name != b.name {
                checker.error(DiagnosticBuilder::type_mismatch(&a.name, &b.name, checker_loc(checker, span)));
            }
        }
        (Type::Union(a), Type::Union(b)) => {
            if a.name != b.name {
                checker.error(DiagnosticBuilder::type_mismatch(&a.name, &b.name, checker_loc(checker, span)));
            }
        }
        (Type::Error, _) | (_, Type::Error) => {}
        _ if &declared == arg => {}
        _ => {
            checker.error(DiagnosticBuilder::type_mismatch(&declared.to_string(), &arg.to_string(), checker_loc(checker, span)));
        }
    }
}

fn checker_loc(checker: &Checker, span: Span) -> crate::diagnostics::SourceLocation {
    checker.loc(span)
}

/// Structural equality used for binding/return compatibility checks once
/// all unification variables have been substituted away.
pub fn structurally_equal(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::List(x), Type::List(y)) => structurally_equal(x, y),
        (Type::Option(x), Type::Option(y)) => structurally_equal(x, y),
        (Type::Result(xo, xe), Type::Result(yo, ye)) => structurally_equal(xo, yo) && structurally_equal(xe, ye),
        (Type::Map(xk, xv), Type::Map(yk, yv)) => structurally_equal(xk, yk) && structurally_equal(xv, yv),
        (Type::Record(x), Type::Record(y)) => x.name == y.name,
        (Type::Union(x), Type::Union(y)) => x.name == y.name,
        (Type::Function { params: xp, return_type: xr, .. }, Type::Function { params: yp, return_type: yr, .. }) => {
            xp.len() == yp.len() && xp.iter().zip(yp).all(|(a, b)| structurally_equal(a, b)) && structurally_equal(xr, yr)
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_of_different_element_types_are_not_equal() {
        let a = Type::List(Box::new(Type::Int64));
        let b = Type::List(Box::new(Type::String));
        assert!(!structurally_equal(&a, &b));
    }

    #[test]
    fn identical_option_types_are_equal() {
        let a = Type::Option(Box::new(Type::Int64));
        let b = Type::Option(Box::new(Type::Int64));
        assert!(structurally_equal(&a, &b));
    }
}
