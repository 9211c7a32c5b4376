// Match exhaustiveness and overlap analysis (§4.3.8).

use super::{Checker, EffectSet};
use crate::ast::*;
use crate::diagnostics::DiagnosticBuilder;
use crate::token::Span;
use crate::types::Type;

pub fn check_match(checker: &mut Checker, m: &Match, effects: &EffectSet, span: Span) -> Type {
    let scrutinee_ty = checker.check_expr(&m.scrutinee, effects);

    let mut result_ty: Option<Type> = None;
    for arm in &m.arms {
        bind_pattern(checker, &arm.pattern, &scrutinee_ty);
        if let Some(guard) = &arm.guard {
            let guard_ty = checker.check_expr(guard, effects);
            if !matches!(guard_ty, Type::Bool) {
                checker.error(DiagnosticBuilder::guard_not_bool(&guard_ty.to_string(), checker.loc(guard.span)));
            }
        }
        let arm_ty = checker.check_expr(&arm.body, effects);
        match &result_ty {
            None => result_ty = Some(arm_ty),
            Some(expected) => {
                if !checker.types_compatible(expected, &arm_ty) {
                    checker.error(DiagnosticBuilder::type_mismatch(&expected.to_string(), &arm_ty.to_string(), checker.loc(arm.span)));
                }
            }
        }
    }

    check_exhaustiveness(checker, &scrutinee_ty, &m.arms, span);
    check_range_overlap(checker, &m.arms, span);

    result_ty.unwrap_or(Type::Unit)
}

fn bind_pattern(checker: &mut Checker, pattern: &Pattern, scrutinee_ty: &Type) {
    match pattern {
        Pattern::Binding(id) => checker.env.bind(id.value.clone(), scrutinee_ty.clone(), false),
        Pattern::Constructor { name, fields } => {
            let field_types = field_types_for_variant(checker, scrutinee_ty, &name.value);
            match fields {
                ConstructorFields::None => {}
                ConstructorFields::Positional(pats) => {
                    for (i, pat) in pats.iter().enumerate() {
                        let ty = field_types.get(i).cloned().unwrap_or(Type::Error);
                        bind_pattern(checker, pat, &ty);
                    }
                }
                ConstructorFields::Named(pairs) => {
                    for (fname, pat) in pairs {
                        let ty = field_types
                            .iter()
                            .zip(variant_field_names(checker, scrutinee_ty, &name.value))
                            .find(|(_, n)| n == &fname.value)
                            .map(|(t, _)| t.clone())
                            .unwrap_or(Type::Error);
                        bind_pattern(checker, pat, &ty);
                    }
                }
            }
        }
        Pattern::Wildcard | Pattern::Literal(_) | Pattern::Range(..) => {}
    }
}

fn field_types_for_variant(checker: &Checker, ty: &Type, variant_name: &str) -> Vec<Type> {
    if let Some(u) = ty.as_union() {
        if let Some(v) = u.variants.iter().find(|v| v.name == variant_name) {
            return v.fields.iter().map(|(_, t)| t.clone()).collect();
        }
    }
    let _ = checker;
    Vec::new()
}

fn variant_field_names(checker: &Checker, ty: &Type, variant_name: &str) -> Vec<String> {
    if let Some(u) = ty.as_union() {
        if let Some(v) = u.variants.iter().find(|v| v.name == variant_name) {
            return v.fields.iter().map(|(n, _)| n.clone()).collect();
        }
    }
    let _ = checker;
    Vec::new()
}

/// A wildcard or bare binding arm satisfies exhaustiveness outright
/// (guards don't weaken this — a guarded binding/wildcard still counts
/// as covering its pattern, a deliberately conservative choice, §9).
fn has_catch_all(arms: &[MatchArm]) -> bool {
    arms.iter().any(|a| matches!(a.pattern, Pattern::Wildcard | Pattern::Binding(_)))
}

fn check_exhaustiveness(checker: &mut Checker, scrutinee_ty: &Type, arms: &[MatchArm], span: Span) {
    if has_catch_all(arms) {
        return;
    }
    match scrutinee_ty {
        Type::Bool => {
            let has_true = arms.iter().any(|a| matches!(a.pattern, Pattern::Literal(Literal::Bool(true))));
            let has_false = arms.iter().any(|a| matches!(a.pattern, Pattern::Literal(Literal::Bool(false))));
            if !(has_true && has_false) {
                let mut missing = Vec::new();
                if !has_true {
                    missing.push("True".to_string());
                }
                if !has_false {
                    missing.push("False".to_string());
                }
                checker.error(DiagnosticBuilder::match_not_exhaustive(&missing, checker.loc(span)));
            }
        }
        ty if ty.as_union().is_some() => {
            let union = ty.as_union().unwrap();
            let covered: std::collections::HashSet<&str> = arms
                .iter()
                .filter_map(|a| match &a.pattern {
                    Pattern::Constructor { name, .. } => Some(name.value.as_str()),
                    _ => None,
                })
                .collect();
            let missing: Vec<String> = union.variants.iter().filter(|v| !covered.contains(v.name.as_str())).map(|v| v.name.clone()).collect();
            if !missing.is_empty() {
                checker.error(DiagnosticBuilder::match_not_exhaustive(&missing, checker.loc(span)));
            }
        }
        Type::Int64 | Type::String | Type::Float64 | Type::Bytes | Type::Timestamp => {
            checker.error(DiagnosticBuilder::match_not_exhaustive(&["_".to_string()], checker.loc(span)));
        }
        _ => {}
    }
}

/// Range overlap runs regardless of whether a wildcard is present.
fn check_range_overlap(checker: &mut Checker, arms: &[MatchArm], span: Span) {
    let ranges: Vec<(i64, i64)> = arms
        .iter()
        .filter_map(|a| match a.pattern {
            Pattern::Range(lo, hi) => Some((lo, hi)),
            _ => None,
        })
        .collect();
    for i in 0..ranges.len() {
        for j in (i + 1)..ranges.len() {
            let (a_lo, a_hi) = ranges[i];
            let (b_lo, b_hi) = ranges[j];
            if a_lo <= b_hi && b_lo <= a_hi {
                checker.error(DiagnosticBuilder::range_overlap((a_lo, a_hi), (b_lo, b_hi), checker.loc(span)));
            }
        }
    }
}
