// `env` assertion imports (§4.6, §4.5 runtime::assertions). A failing
// assertion doesn't trap or unwind: it's recorded against the current
// test name so a test function keeps running after its first failure
// and the harness can report everything wrong in one pass (§4.6's
// "self-healing" accumulation).

use super::HostState;
use wasmi::{Caller, Linker};

pub fn link(linker: &mut Linker<HostState>) -> Result<(), wasmi::Error> {
    linker.func_wrap("env", "set_current_test", |mut caller: Caller<'_, HostState>, h: i32| {
        let name = caller.data().string(h).to_string();
        caller.data_mut().current_test = Some(name);
    })?;
    linker.func_wrap("env", "assert_eq_int", |mut caller: Caller<'_, HostState>, actual: i64, expected: i64| {
        if actual != expected {
            caller.data_mut().record_failure("assertEqual", actual.to_string(), expected.to_string());
        }
    })?;
    linker.func_wrap("env", "assert_eq_float", |mut caller: Caller<'_, HostState>, actual: f64, expected: f64| {
        if (actual - expected).abs() > 1e-9 {
            caller.data_mut().record_failure("assertEqual", actual.to_string(), expected.to_string());
        }
    })?;
    linker.func_wrap(
        "env",
        "assert_eq_string",
        |mut caller: Caller<'_, HostState>, actual: i32, expected: i32| {
            let (a, e) = (caller.data().string(actual).to_string(), caller.data().string(expected).to_string());
            if a != e {
                caller.data_mut().record_failure("assertEqual", a, e);
            }
        },
    )?;
    linker.func_wrap("env", "assert_true", |mut caller: Caller<'_, HostState>, condition: i32| {
        if condition == 0 {
            caller.data_mut().record_failure("assertTrue", "False".to_string(), "True".to_string());
        }
    })?;
    linker.func_wrap("env", "assert_false", |mut caller: Caller<'_, HostState>, condition: i32| {
        if condition != 0 {
            caller.data_mut().record_failure("assertFalse", "True".to_string(), "False".to_string());
        }
    })?;
    Ok(())
}
