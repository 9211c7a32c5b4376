// `env` JSON import (§4.5 runtime::json). `jsonStringify` only needs to
// serialize the one value shape Clarity exposes it for (a `String`), so
// this reuses `serde_json::to_string` on a plain Rust `&str` rather than
// building out a general Clarity-value-to-JSON encoder the spec doesn't
// ask for.

use super::HostState;
use wasmi::{Caller, Linker};

pub fn link(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    linker.func_wrap("env", "json_stringify_string", |mut caller: Caller<'_, HostState>, h: i32| -> i32 {
        let encoded = serde_json::to_string(caller.data().string(h)).unwrap_or_else(|_| "null".to_string());
        caller.data_mut().intern(encoded)
    })?;
    Ok(())
}
