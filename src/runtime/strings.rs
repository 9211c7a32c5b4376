// `env` string imports (§4.5 runtime::strings). Strings are host-side
// `String`s behind an `i32` handle; only `intern_string` ever reads the
// module's own linear memory.

use super::{read_memory, HostState};
use wasmi::{Caller, Linker};

pub fn link(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    linker.func_wrap("env", "intern_string", |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> i32 {
        let bytes = read_memory(&mut caller, ptr, len);
        let s = String::from_utf8_lossy(&bytes).into_owned();
        caller.data_mut().intern(s)
    })?;
    linker.func_wrap("env", "string_length", |caller: Caller<'_, HostState>, h: i32| -> i64 {
        caller.data().string(h).len() as i64
    })?;
    linker.func_wrap("env", "string_concat", |mut caller: Caller<'_, HostState>, a: i32, b: i32| -> i32 {
        let joined = format!("{}{}", caller.data().string(a), caller.data().string(b));
        caller.data_mut().intern(joined)
    })?;
    linker.func_wrap(
        "env",
        "string_slice",
        |mut caller: Caller<'_, HostState>, h: i32, start: i64, end: i64| -> i32 {
            let s = caller.data().string(h);
            let bytes = s.as_bytes();
            let start = start.clamp(0, bytes.len() as i64) as usize;
            let end = end.clamp(start as i64, bytes.len() as i64) as usize;
            let slice = String::from_utf8_lossy(&bytes[start..end]).into_owned();
            caller.data_mut().intern(slice)
        },
    )?;
    linker.func_wrap("env", "string_eq", |caller: Caller<'_, HostState>, a: i32, b: i32| -> i32 {
        i32::from(caller.data().string(a) == caller.data().string(b))
    })?;
    // Returns `(is_some, value)`; codegen builds the `Option<Int64>` union
    // itself from these two results rather than the host touching the
    // module's own bump-allocated memory.
    linker.func_wrap("env", "string_to_int", |caller: Caller<'_, HostState>, h: i32| -> (i32, i64) {
        match caller.data().string(h).trim().parse::<i64>() {
            Ok(v) => (1, v),
            Err(_) => (0, 0),
        }
    })?;
    linker.func_wrap("env", "string_to_float", |caller: Caller<'_, HostState>, h: i32| -> (i32, f64) {
        match caller.data().string(h).trim().parse::<f64>() {
            Ok(v) => (1, v),
            Err(_) => (0, 0.0),
        }
    })?;
    // §9: exact empty-needle / out-of-range semantics are left to host
    // behavior. `char_at` returns the empty string out of range; `index_of`
    // of an empty needle matches at 0, same as `str::find`.
    linker.func_wrap("env", "char_at", |mut caller: Caller<'_, HostState>, h: i32, i: i64| -> i32 {
        let ch = caller.data().string(h).chars().nth(i.max(0) as usize);
        caller.data_mut().intern(ch.map(|c| c.to_string()).unwrap_or_default())
    })?;
    linker.func_wrap("env", "contains", |caller: Caller<'_, HostState>, h: i32, needle: i32| -> i32 {
        i32::from(caller.data().string(h).contains(caller.data().string(needle)))
    })?;
    linker.func_wrap("env", "index_of", |caller: Caller<'_, HostState>, h: i32, needle: i32| -> i64 {
        let needle = caller.data().string(needle).to_string();
        match caller.data().string(h).find(&needle) {
            Some(i) => i as i64,
            None => -1,
        }
    })?;
    linker.func_wrap("env", "trim", |mut caller: Caller<'_, HostState>, h: i32| -> i32 {
        let trimmed = caller.data().string(h).trim().to_string();
        caller.data_mut().intern(trimmed)
    })?;
    linker.func_wrap("env", "split", |mut caller: Caller<'_, HostState>, h: i32, sep: i32| -> i32 {
        let (s, sep) = (caller.data().string(h).to_string(), caller.data().string(sep).to_string());
        let parts: Vec<i64> = if sep.is_empty() {
            vec![caller.data_mut().intern(s) as i64]
        } else {
            s.split(&sep).map(|p| caller.data_mut().intern(p.to_string()) as i64).collect()
        };
        caller.data_mut().push_list(parts)
    })?;
    linker.func_wrap("env", "char_code", |caller: Caller<'_, HostState>, h: i32| -> i64 {
        match caller.data().string(h).chars().next() {
            Some(c) => c as i64,
            None => -1,
        }
    })?;
    linker.func_wrap("env", "char_from_code", |mut caller: Caller<'_, HostState>, code: i64| -> i32 {
        let s = char::from_u32(code.max(0) as u32).map(|c| c.to_string()).unwrap_or_default();
        caller.data_mut().intern(s)
    })?;
    Ok(())
}
