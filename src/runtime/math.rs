// `env` math imports (§4.5 runtime::math). These back builtins that
// don't have a direct wasm instruction (`sqrt`/`floor` do — `f64.sqrt`
// and `f64.floor` exist natively, but routing every builtin through `env`
// uniformly keeps `codegen`'s call-site dispatch a single table lookup
// rather than a special case per instruction-backed builtin).

use super::HostState;
use wasmi::{Caller, Linker};

pub fn link(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    linker.func_wrap("env", "abs_int", |_: Caller<'_, HostState>, n: i64| -> i64 { n.abs() })?;
    linker.func_wrap("env", "min_int", |_: Caller<'_, HostState>, a: i64, b: i64| -> i64 { a.min(b) })?;
    linker.func_wrap("env", "max_int", |_: Caller<'_, HostState>, a: i64, b: i64| -> i64 { a.max(b) })?;
    linker.func_wrap("env", "sqrt_f64", |_: Caller<'_, HostState>, n: f64| -> f64 { n.sqrt() })?;
    linker.func_wrap("env", "floor_f64", |_: Caller<'_, HostState>, n: f64| -> f64 { n.floor() })?;
    linker.func_wrap("env", "ceil_f64", |_: Caller<'_, HostState>, n: f64| -> f64 { n.ceil() })?;
    linker.func_wrap("env", "pow_f64", |_: Caller<'_, HostState>, base: f64, exp: f64| -> f64 { base.powf(exp) })?;
    // Delegated to the host because wasm has no `f64.rem` instruction (§4.5).
    linker.func_wrap("env", "f64_rem", |_: Caller<'_, HostState>, a: f64, b: f64| -> f64 { a % b })?;
    Ok(())
}
