// `env` timestamp import (§4.5 runtime::timestamp). `now` carries the
// `Time` effect (§4.3.7) so only functions that declared it can reach
// this at all — the checker, not the runtime, is what keeps it out of
// pure code.

use super::HostState;
use std::time::{SystemTime, UNIX_EPOCH};
use wasmi::{Caller, Linker};

pub fn link(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    linker.func_wrap("env", "now", |_: Caller<'_, HostState>| -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
    })?;
    Ok(())
}
