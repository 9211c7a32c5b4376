// `env` bytes imports (§4.5 runtime::bytes). `Bytes` values only ever
// originate from a builtin (`sha256` today) since Clarity has no byte
// literal syntax, so the arena only ever grows from other host calls,
// never from module memory.

use super::HostState;
use wasmi::{Caller, Linker};

pub fn link(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    linker.func_wrap("env", "bytes_length", |caller: Caller<'_, HostState>, h: i32| -> i64 {
        caller.data().bytes(h).len() as i64
    })?;
    Ok(())
}
