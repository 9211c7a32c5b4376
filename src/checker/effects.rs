// Effect discipline (§4.3.7) and call-site resolution, including the
// ad-hoc polymorphism for `Some`/`None`/`Ok`/`Err` (§4.3.3) and named
// argument validation (§4.3.5).

use super::Checker;
use crate::ast::*;
use crate::diagnostics::DiagnosticBuilder;
use crate::token::Span;
use crate::types::Type;
use std::collections::HashSet;

pub type EffectSet = HashSet<String>;

pub fn check_call_site(checker: &mut Checker, call: &Call, caller_effects: &EffectSet, span: Span) -> Type {
    match call.callee.value.as_str() {
        "Some" => {
            let inner = checker.check_expr(&positional(&call.args)[0], caller_effects);
            checker.canonicalize_option_result(Type::Option(Box::new(inner)))
        }
        "None" => checker.canonicalize_option_result(Type::Option(Box::new(Type::Var(checker.env.fresh_var_id())))),
        "Ok" => {
            let inner = checker.check_expr(&positional(&call.args)[0], caller_effects);
            let err = Type::Var(checker.env.fresh_var_id());
            checker.canonicalize_option_result(Type::Result(Box::new(inner), Box::new(err)))
        }
        "Err" => {
            let inner = checker.check_expr(&positional(&call.args)[0], caller_effects);
            let ok = Type::Var(checker.env.fresh_var_id());
            checker.canonicalize_option_result(Type::Result(Box::new(ok), Box::new(inner)))
        }
        _ => check_ordinary_call(checker, call, caller_effects, span),
    }
}

fn positional(args: &[Arg]) -> Vec<&Expr> {
    args.iter()
        .map(|a| match a {
            Arg::Positional(e) => e,
            Arg::Named(_, e) => e,
        })
        .collect()
}

fn check_ordinary_call(checker: &mut Checker, call: &Call, caller_effects: &EffectSet, span: Span) -> Type {
    let sig = match checker.functions.get(&call.callee.value) {
        Some(sig) => sig,
        None => {
            if let Some(builtin) = crate::type_registry::lookup(&call.callee.value) {
                return check_builtin_call(checker, call, builtin, caller_effects, span);
            }
            checker.error(DiagnosticBuilder::undefined_function(&call.callee.value, checker.loc(span), None));
            for arg in positional(&call.args) {
                checker.check_expr(arg, caller_effects);
            }
            return Type::Error;
        }
    };

    let sig_params = sig.params.clone();
    let sig_param_names = sig.param_names.clone();
    let sig_return = sig.return_type.clone();
    let sig_effects = sig.effects.clone();

    check_effect_coverage(checker, &call.callee.value, &sig_effects, caller_effects, span);

    let ordered_args = reorder_named_args(checker, call, &sig_param_names, span);
    let arg_types: Vec<Type> = ordered_args.iter().map(|e| checker.check_expr(e, caller_effects)).collect();

    checker.unify_call(&sig_params, &arg_types, &sig_return, span)
}

fn check_builtin_call(
    checker: &mut Checker,
    call: &Call,
    builtin: &crate::type_registry::BuiltinEntry,
    caller_effects: &EffectSet,
    span: Span,
) -> Type {
    check_effect_coverage(checker, &builtin.name, &builtin.effects, caller_effects, span);
    let params = builtin.params.clone();
    let ret = builtin.return_type.clone();
    let arg_types: Vec<Type> = positional(&call.args).into_iter().map(|e| checker.check_expr(e, caller_effects)).collect();
    checker.unify_call(&params, &arg_types, &ret, span)
}

/// Caller's declared effect set must be a superset of the callee's.
fn check_effect_coverage(checker: &mut Checker, callee_name: &str, callee_effects: &[String], caller_effects: &EffectSet, span: Span) {
    let missing: Vec<String> = callee_effects.iter().filter(|e| !caller_effects.contains(*e)).cloned().collect();
    if !missing.is_empty() {
        checker.error(DiagnosticBuilder::effect_not_declared(&missing, callee_name, checker.loc(span)));
    }
}

/// If any argument is named, every argument must be named; rewrites the
/// list into parameter order so downstream passes see positional layout.
fn reorder_named_args(checker: &mut Checker, call: &Call, param_names: &[String], span: Span) -> Vec<Expr> {
    let any_named = call.args.iter().any(|a| matches!(a, Arg::Named(..)));
    if !any_named {
        return positional(&call.args).into_iter().cloned().collect();
    }

    let all_named = call.args.iter().all(|a| matches!(a, Arg::Named(..)));
    if !all_named {
        checker.error(DiagnosticBuilder::named_argument_error(
            "if any argument is named, every argument in this call must be named",
            checker.loc(span),
        ));
        return positional(&call.args).into_iter().cloned().collect();
    }

    let mut by_name = std::collections::HashMap::new();
    for arg in &call.args {
        if let Arg::Named(name, expr) = arg {
            if by_name.insert(name.value.clone(), expr.clone()).is_some() {
                checker.error(DiagnosticBuilder::named_argument_error(format!("duplicate named argument `{}`", name.value), checker.loc(span)));
            }
        }
    }

    let mut ordered = Vec::new();
    for pname in param_names {
        match by_name.remove(pname) {
            Some(expr) => ordered.push(expr),
            None => {
                checker.error(DiagnosticBuilder::named_argument_error(format!("missing named argument `{}`", pname), checker.loc(span)));
            }
        }
    }
    for (unknown_name, _) in by_name {
        checker.error(DiagnosticBuilder::named_argument_error(format!("unknown named argument `{}`", unknown_name), checker.loc(span)));
    }
    ordered
}
