// `env` list imports (§4.5 runtime::lists, §5). Lists are persistent:
// every mutator clones the backing `Vec<i64>` and pushes the result as a
// new arena slot rather than mutating in place, so an old handle keeps
// denoting the list it always denoted. Elements cross the ABI boundary
// as a raw `i64` — codegen sign- or bit-extends non-`i64` element types
// on the way in and narrows them back on the way out.

use super::HostState;
use wasmi::{Caller, Linker};

pub fn link(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    linker.func_wrap("env", "list_new", |mut caller: Caller<'_, HostState>| -> i32 {
        caller.data_mut().push_list(Vec::new())
    })?;
    linker.func_wrap("env", "list_length", |caller: Caller<'_, HostState>, h: i32| -> i64 {
        caller.data().list(h).len() as i64
    })?;
    linker.func_wrap("env", "list_push", |mut caller: Caller<'_, HostState>, h: i32, raw: i64| -> i32 {
        let mut items = caller.data().list(h).to_vec();
        items.push(raw);
        caller.data_mut().push_list(items)
    })?;
    // Returns `(found, raw)`; codegen wraps the result in `Option<T>`.
    linker.func_wrap("env", "list_get", |caller: Caller<'_, HostState>, h: i32, i: i64| -> (i32, i64) {
        if i < 0 {
            return (0, 0);
        }
        match caller.data().list(h).get(i as usize) {
            Some(v) => (1, *v),
            None => (0, 0),
        }
    })?;
    linker.func_wrap("env", "list_tail", |mut caller: Caller<'_, HostState>, h: i32| -> i32 {
        let items = caller.data().list(h);
        let tail = if items.is_empty() { Vec::new() } else { items[1..].to_vec() };
        caller.data_mut().push_list(tail)
    })?;
    linker.func_wrap("env", "list_set", |mut caller: Caller<'_, HostState>, h: i32, i: i64, v: i64| -> i32 {
        let mut items = caller.data().list(h).to_vec();
        if i >= 0 && (i as usize) < items.len() {
            items[i as usize] = v;
        }
        caller.data_mut().push_list(items)
    })?;
    linker.func_wrap("env", "list_reverse", |mut caller: Caller<'_, HostState>, h: i32| -> i32 {
        let mut items = caller.data().list(h).to_vec();
        items.reverse();
        caller.data_mut().push_list(items)
    })?;
    linker.func_wrap("env", "list_concat", |mut caller: Caller<'_, HostState>, a: i32, b: i32| -> i32 {
        let mut items = caller.data().list(a).to_vec();
        items.extend_from_slice(caller.data().list(b));
        caller.data_mut().push_list(items)
    })?;
    Ok(())
}
