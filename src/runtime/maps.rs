// `env` map imports (§4.5 runtime::maps, §5). Maps are persistent
// association lists behind an opaque handle, same append-only arena
// discipline as lists. Keys arrive tagged by kind (0 = Int64, 1 = Bool,
// 2 = String handle) since the import signature can't vary by Clarity
// key type; `MapKey` normalizes a string key to its owned content so two
// equal strings with different handles still collide.

use super::{HostState, MapKey};
use wasmi::{Caller, Linker};

fn decode_key(caller: &Caller<'_, HostState>, kind: i32, key: i64) -> MapKey {
    match kind {
        1 => MapKey::Bool(key != 0),
        2 => MapKey::Str(caller.data().string(key as i32).to_string()),
        _ => MapKey::Int(key),
    }
}

pub fn link(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    linker.func_wrap("env", "map_new", |mut caller: Caller<'_, HostState>| -> i32 {
        caller.data_mut().push_map(Vec::new())
    })?;
    linker.func_wrap("env", "map_size", |caller: Caller<'_, HostState>, h: i32| -> i64 {
        caller.data().map(h).len() as i64
    })?;
    linker.func_wrap(
        "env",
        "map_insert",
        |mut caller: Caller<'_, HostState>, h: i32, key_kind: i32, key: i64, value: i64| -> i32 {
            let decoded = decode_key(&caller, key_kind, key);
            let mut entries = caller.data().map(h).to_vec();
            if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == decoded) {
                slot.1 = value;
            } else {
                entries.push((decoded, value));
            }
            caller.data_mut().push_map(entries)
        },
    )?;
    // Returns `(found, value)`; codegen wraps the result in `Option<V>`.
    linker.func_wrap(
        "env",
        "map_get",
        |caller: Caller<'_, HostState>, h: i32, key_kind: i32, key: i64| -> (i32, i64) {
            let decoded = decode_key(&caller, key_kind, key);
            match caller.data().map(h).iter().find(|(k, _)| *k == decoded) {
                Some((_, v)) => (1, *v),
                None => (0, 0),
            }
        },
    )?;
    linker.func_wrap(
        "env",
        "map_has",
        |caller: Caller<'_, HostState>, h: i32, key_kind: i32, key: i64| -> i32 {
            let decoded = decode_key(&caller, key_kind, key);
            i32::from(caller.data().map(h).iter().any(|(k, _)| *k == decoded))
        },
    )?;
    linker.func_wrap(
        "env",
        "map_remove",
        |mut caller: Caller<'_, HostState>, h: i32, key_kind: i32, key: i64| -> i32 {
            let decoded = decode_key(&caller, key_kind, key);
            let entries: Vec<_> = caller.data().map(h).iter().filter(|(k, _)| *k != decoded).cloned().collect();
            caller.data_mut().push_map(entries)
        },
    )?;
    linker.func_wrap("env", "map_keys", |mut caller: Caller<'_, HostState>, h: i32| -> i32 {
        let keys: Vec<MapKey> = caller.data().map(h).iter().map(|(k, _)| k.clone()).collect();
        let encoded: Vec<i64> = keys
            .into_iter()
            .map(|k| match k {
                MapKey::Int(i) => i,
                MapKey::Bool(b) => i64::from(b),
                MapKey::Str(s) => i64::from(caller.data_mut().intern(s)),
            })
            .collect();
        caller.data_mut().push_list(encoded)
    })?;
    linker.func_wrap("env", "map_values", |mut caller: Caller<'_, HostState>, h: i32| -> i32 {
        let values: Vec<i64> = caller.data().map(h).iter().map(|(_, v)| *v).collect();
        caller.data_mut().push_list(values)
    })?;
    Ok(())
}
