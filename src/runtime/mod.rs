// Host runtime (§4.5, §6.5, §9): the `env` import namespace a compiled
// module links against, and the embedding that actually runs it via
// `wasmi`. Strings, Bytes, Lists, and Maps are never resident in the
// module's own linear memory — per `codegen::layout`'s module doc, each
// is an opaque `i32` handle into one of the arenas below, so almost none
// of these host functions ever touch the module's `memory` export. The
// sole exception is `intern_string`, which reads a string literal's UTF-8
// bytes out of a compile-time data segment the one time each literal is
// evaluated.
//
// Records and Unions, by contrast, live in the module's own linear
// memory and are bump-allocated by a small `__alloc` function `codegen`
// emits directly as wasm — the host never allocates module memory.

mod assertions;
mod bytes;
mod conversions;
mod crypto;
mod io;
mod json;
mod lists;
mod maps;
mod math;
mod strings;
mod timestamp;

use std::collections::HashMap;
use wasmi::{Caller, Linker};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int(i64),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone)]
pub struct TestFailure {
    pub test_name: String,
    pub kind: String,
    pub actual: String,
    pub expected: String,
}

/// Everything a running module's host imports read or mutate. Lives in
/// `wasmi::Store<HostState>`; every `func_wrap` closure below borrows it
/// through `Caller::data_mut`.
pub struct HostState {
    strings: Vec<String>,
    string_intern: HashMap<String, i32>,
    byte_strings: Vec<Vec<u8>>,
    /// Every element is carried as a raw `i64`: `i32`/`f32`-shaped values
    /// are sign- or bit-extended by the codegen call site before the
    /// host ever sees them, and narrowed back on the way out. This lets
    /// one arena and one import family serve every element type without
    /// per-type host function variants.
    lists: Vec<Vec<i64>>,
    maps: Vec<Vec<(MapKey, i64)>>,
    rng_state: u64,
    pub current_test: Option<String>,
    pub failures: Vec<TestFailure>,
    pub args: Vec<String>,
    pub exit_code: Option<i32>,
}

impl HostState {
    pub fn new(args: Vec<String>) -> Self {
        HostState {
            strings: Vec::new(),
            string_intern: HashMap::new(),
            byte_strings: Vec::new(),
            lists: Vec::new(),
            maps: Vec::new(),
            rng_state: 0x2545F4914F6CDD1D,
            current_test: None,
            failures: Vec::new(),
            args,
            exit_code: None,
        }
    }

    fn intern(&mut self, s: String) -> i32 {
        if let Some(&handle) = self.string_intern.get(&s) {
            return handle;
        }
        let handle = self.strings.len() as i32;
        self.string_intern.insert(s.clone(), handle);
        self.strings.push(s);
        handle
    }

    fn string(&self, handle: i32) -> &str {
        self.strings.get(handle as usize).map(|s| s.as_str()).unwrap_or("")
    }

    fn push_bytes(&mut self, b: Vec<u8>) -> i32 {
        self.byte_strings.push(b);
        (self.byte_strings.len() - 1) as i32
    }

    fn bytes(&self, handle: i32) -> &[u8] {
        self.byte_strings.get(handle as usize).map(|b| b.as_slice()).unwrap_or(&[])
    }

    fn push_list(&mut self, l: Vec<i64>) -> i32 {
        self.lists.push(l);
        (self.lists.len() - 1) as i32
    }

    fn list(&self, handle: i32) -> &[i64] {
        self.lists.get(handle as usize).map(|l| l.as_slice()).unwrap_or(&[])
    }

    fn push_map(&mut self, m: Vec<(MapKey, i64)>) -> i32 {
        self.maps.push(m);
        (self.maps.len() - 1) as i32
    }

    fn map(&self, handle: i32) -> &[(MapKey, i64)] {
        self.maps.get(handle as usize).map(|m| m.as_slice()).unwrap_or(&[])
    }

    fn next_random(&mut self) -> u64 {
        // xorshift64*: no external crate is pulled in for a facility this
        // small and non-cryptographic (`sha2` already covers crypto).
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        x
    }

    fn record_failure(&mut self, kind: &str, actual: String, expected: String) {
        let test_name = self.current_test.clone().unwrap_or_else(|| "<unknown>".to_string());
        self.failures.push(TestFailure { test_name, kind: kind.to_string(), actual, expected });
    }
}

/// Registers every `env.*` import a compiled module may reference.
/// `Linker::func_wrap` is forgiving of unused imports, so it's safe to
/// register the whole catalog even though a given module only pulls in
/// the subset `codegen` actually referenced.
pub fn link_all(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    strings::link(linker)?;
    lists::link(linker)?;
    maps::link(linker)?;
    bytes::link(linker)?;
    math::link(linker)?;
    conversions::link(linker)?;
    crypto::link(linker)?;
    timestamp::link(linker)?;
    json::link(linker)?;
    io::link(linker)?;
    assertions::link(linker)?;
    Ok(())
}

/// Reads `len` bytes starting at `ptr` out of the caller's exported
/// `memory`. Used only by `intern_string` — see the module doc.
fn read_memory(caller: &mut Caller<'_, HostState>, ptr: i32, len: i32) -> Vec<u8> {
    let memory = match caller.get_export("memory").and_then(|e| e.into_memory()) {
        Some(m) => m,
        None => return Vec::new(),
    };
    let mut buf = vec![0u8; len.max(0) as usize];
    let _ = memory.read(&caller, ptr as usize, &mut buf);
    buf
}

/// A loaded, instantiated module ready to be called into — shared by the
/// `run` and `test` CLI commands (§6.3) and `test_harness`.
pub struct Execution {
    store: wasmi::Store<HostState>,
    instance: wasmi::Instance,
}

pub fn instantiate(wasm: &[u8], args: Vec<String>) -> Result<Execution, String> {
    let engine = wasmi::Engine::default();
    let module = wasmi::Module::new(&engine, wasm).map_err(|e| format!("invalid wasm module: {e}"))?;
    let mut store = wasmi::Store::new(&engine, HostState::new(args));
    let mut linker = wasmi::Linker::new(&engine);
    link_all(&mut linker).map_err(|e| format!("failed to link host imports: {e}"))?;
    let instance = linker
        .instantiate(&mut store, &module)
        .map_err(|e| format!("failed to instantiate module: {e}"))?
        .start(&mut store)
        .map_err(|e| format!("module start function trapped: {e}"))?;
    Ok(Execution { store, instance })
}

impl Execution {
    pub fn has_function(&mut self, name: &str) -> bool {
        self.instance.get_func(&mut self.store, name).is_some()
    }

    pub fn call(&mut self, name: &str, args: &[wasmi::Val]) -> Result<Vec<wasmi::Val>, String> {
        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| format!("function '{name}' is not exported"))?;
        let result_count = func.ty(&self.store).results().len();
        let mut results = vec![wasmi::Val::I32(0); result_count];
        func.call(&mut self.store, args, &mut results).map_err(|e| format!("trap in '{name}': {e}"))?;
        Ok(results)
    }

    pub fn set_current_test(&mut self, name: &str) {
        self.store.data_mut().current_test = Some(name.to_string());
    }

    pub fn take_failures(&mut self) -> Vec<TestFailure> {
        std::mem::take(&mut self.store.data_mut().failures)
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.store.data().exit_code
    }

    /// Resolves a string handle (an `i32` result from a call) to its
    /// content, for printing `run`'s return value.
    pub fn read_string(&self, handle: i32) -> String {
        self.store.data().string(handle).to_string()
    }
}
