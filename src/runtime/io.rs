// `env` I/O, logging, and randomness imports (§4.5 runtime::io,
// runtime::random). Each backs a builtin the checker requires an effect
// declaration for (`Log`, `FileSystem`, `Random` — §4.3.7); the runtime
// itself performs no effect enforcement, it's purely advisory at the
// type-checking layer.

use super::HostState;
use std::io::{self, BufRead, Write};
use wasmi::{Caller, Linker};

pub fn link(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    linker.func_wrap("env", "log", |caller: Caller<'_, HostState>, h: i32| {
        println!("{}", caller.data().string(h));
    })?;
    linker.func_wrap("env", "log_warn", |caller: Caller<'_, HostState>, h: i32| {
        eprintln!("{}", caller.data().string(h));
    })?;
    linker.func_wrap("env", "print_string", |caller: Caller<'_, HostState>, h: i32| {
        print!("{}", caller.data().string(h));
        let _ = io::stdout().flush();
    })?;
    linker.func_wrap("env", "print_int", |_: Caller<'_, HostState>, n: i64| {
        print!("{n}");
        let _ = io::stdout().flush();
    })?;
    linker.func_wrap("env", "print_float", |_: Caller<'_, HostState>, n: f64| {
        print!("{n}");
        let _ = io::stdout().flush();
    })?;
    // Returns `(found, handle)`; codegen wraps the result in `Option<String>`.
    linker.func_wrap("env", "read_line", |mut caller: Caller<'_, HostState>| -> (i32, i32) {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => (0, 0),
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
                let handle = caller.data_mut().intern(trimmed);
                (1, handle)
            }
            Err(_) => (0, 0),
        }
    })?;
    linker.func_wrap("env", "read_all_stdin", |mut caller: Caller<'_, HostState>| -> i32 {
        use std::io::Read;
        let mut buf = String::new();
        let _ = io::stdin().lock().read_to_string(&mut buf);
        caller.data_mut().intern(buf)
    })?;
    // Returns `(found, handle)`; codegen wraps the result in `Option<String>`.
    linker.func_wrap("env", "read_file", |mut caller: Caller<'_, HostState>, h: i32| -> (i32, i32) {
        let path = caller.data().string(h).to_string();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let handle = caller.data_mut().intern(content);
                (1, handle)
            }
            Err(_) => (0, 0),
        }
    })?;
    linker.func_wrap("env", "write_file", |caller: Caller<'_, HostState>, path: i32, content: i32| -> i32 {
        let (path, content) = (caller.data().string(path).to_string(), caller.data().string(content).to_string());
        i32::from(std::fs::write(path, content).is_ok())
    })?;
    linker.func_wrap("env", "random_int", |mut caller: Caller<'_, HostState>, low: i64, high: i64| -> i64 {
        if high <= low {
            return low;
        }
        let span = (high - low) as u64;
        low + (caller.data_mut().next_random() % span) as i64
    })?;
    linker.func_wrap("env", "exit", |mut caller: Caller<'_, HostState>, code: i64| {
        caller.data_mut().exit_code = Some(code as i32);
    })?;
    linker.func_wrap("env", "args_count", |caller: Caller<'_, HostState>| -> i64 {
        caller.data().args.len() as i64
    })?;
    // Returns `(found, handle)`; codegen wraps the result in `Option<String>`.
    linker.func_wrap("env", "arg_at", |mut caller: Caller<'_, HostState>, i: i64| -> (i32, i32) {
        if i < 0 {
            return (0, 0);
        }
        match caller.data().args.get(i as usize).cloned() {
            Some(arg) => (1, caller.data_mut().intern(arg)),
            None => (0, 0),
        }
    })?;
    Ok(())
}
