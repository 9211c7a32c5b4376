// `env` numeric/string conversion imports (§4.5 runtime::conversions).
// `intToFloat`/`floatToInt` are plain `f64.convert_i64_s`/`i64.trunc_f64_s`
// instructions emitted directly by `codegen` — no host round trip needed
// — so only the string-facing conversions live here.

use super::HostState;
use wasmi::{Caller, Linker};

pub fn link(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    linker.func_wrap("env", "int_to_string", |mut caller: Caller<'_, HostState>, n: i64| -> i32 {
        let s = n.to_string();
        caller.data_mut().intern(s)
    })?;
    linker.func_wrap("env", "float_to_string", |mut caller: Caller<'_, HostState>, n: f64| -> i32 {
        let s = n.to_string();
        caller.data_mut().intern(s)
    })?;
    Ok(())
}
