// `env` crypto imports (§4.5 runtime::crypto). Grounded in the teacher's
// own `sha2` dependency (present in its Cargo.toml for unrelated content
// hashing) rather than pulling in a new crate for this.

use super::HostState;
use sha2::{Digest, Sha256};
use wasmi::{Caller, Linker};

pub fn link(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    linker.func_wrap("env", "sha256", |mut caller: Caller<'_, HostState>, h: i32| -> i32 {
        let digest = Sha256::digest(caller.data().bytes(h)).to_vec();
        caller.data_mut().push_bytes(digest)
    })?;
    Ok(())
}
