use clap::Parser as ClapParser;
use clarity_compiler::checker::FunctionSignature;
use clarity_compiler::test_harness::TestHarness;
use clarity_compiler::type_registry;
use clarity_compiler::types::Type;
use clarity_compiler::{runtime, Compiler};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "clarityc", version, about = "Compiler for Clarity, a pattern-matching-only language targeting WebAssembly")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Compile a Clarity module to WASM
    Compile {
        path: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Stop after type/effect checking; don't emit WASM
        #[arg(long)]
        check_only: bool,
        /// Print a best-effort textual section listing instead of writing WASM
        #[arg(long)]
        emit_wat: bool,
        /// Print the parsed AST and exit
        #[arg(long)]
        emit_ast: bool,
    },
    /// Compile a module and invoke one of its exported functions
    Run {
        path: PathBuf,
        #[arg(short = 'f', long = "function")]
        function: String,
        /// Positional arguments for the function, in order. May repeat.
        #[arg(short = 'a', long = "arg")]
        args: Vec<String>,
    },
    /// Compile a module and run its `test_*` functions
    Test {
        path: PathBuf,
        /// Emit one JSON object per test result instead of human text
        #[arg(long)]
        json: bool,
        /// Stop at the first failing test
        #[arg(long)]
        fail_fast: bool,
    },
    /// Dump the built-in registry, effect catalog, or last-checked types
    Introspect {
        #[arg(long)]
        builtins: bool,
        #[arg(long)]
        effects: bool,
        #[arg(long)]
        types: bool,
        /// Required for --types: the file whose record/union types to dump
        path: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Compile { path, output, check_only, emit_wat, emit_ast } => {
            cmd_compile(path, output, check_only, emit_wat, emit_ast)
        }
        Commands::Run { path, function, args } => cmd_run(path, function, args),
        Commands::Test { path, json, fail_fast } => cmd_test(path, json, fail_fast),
        Commands::Introspect { builtins, effects, types, path } => cmd_introspect(builtins, effects, types, path),
    };
    process::exit(code);
}

fn read_source(path: &PathBuf) -> Result<String, i32> {
    fs::read_to_string(path).map_err(|e| {
        eprintln!("{} could not read {}: {}", "error:".red().bold(), path.display(), e);
        2
    })
}

fn cmd_compile(path: PathBuf, output: Option<PathBuf>, check_only: bool, emit_wat: bool, emit_ast: bool) -> i32 {
    let source = match read_source(&path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let file = path.display().to_string();
    let compiler = Compiler::new(file.clone());

    if emit_ast {
        let module = match compiler.parse(&source) {
            Ok(m) => m,
            Err(diags) => {
                eprintln!("{}", diags.display_all(Some(&source)));
                return 1;
            }
        };
        println!("{:#?}", module);
        return 0;
    }

    if check_only {
        return match compiler.check_source(&source) {
            Ok(_) => {
                println!("{}", "ok: no errors".green());
                0
            }
            Err(diags) => {
                eprintln!("{}", diags.display_all(Some(&source)));
                1
            }
        };
    }

    let output_path = output.unwrap_or_else(|| path.with_extension("wasm"));
    match compiler.compile_source(&source) {
        Ok(out) => {
            if emit_wat {
                println!("{}", disassemble_sections(&out.wasm));
                return 0;
            }
            if let Err(e) = fs::write(&output_path, &out.wasm) {
                eprintln!("{} could not write {}: {}", "error:".red().bold(), output_path.display(), e);
                return 1;
            }
            println!("{} wrote {} ({} bytes)", "ok:".green().bold(), output_path.display(), out.wasm.len());
            0
        }
        Err(diags) => {
            eprintln!("{}", diags.display_all(Some(&source)));
            1
        }
    }
}

fn cmd_run(path: PathBuf, function: String, args: Vec<String>) -> i32 {
    let source = match read_source(&path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let file = path.display().to_string();
    let compiler = Compiler::new(file);
    let out = match compiler.compile_source(&source) {
        Ok(out) => out,
        Err(diags) => {
            eprintln!("{}", diags.display_all(Some(&source)));
            return 1;
        }
    };
    let sig = match out.check.functions.get(&function) {
        Some(s) => s,
        None => {
            eprintln!("{} no such function `{}`", "error:".red().bold(), function);
            return 2;
        }
    };
    let wasm_args = match parse_cli_args(sig, &args) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return 2;
        }
    };
    let mut exec = match runtime::instantiate(&out.wasm, args.clone()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return 1;
        }
    };
    match exec.call(&function, &wasm_args) {
        Ok(results) => {
            println!("{}", format_result(&sig.return_type, &results, &exec));
            exec.exit_code().unwrap_or(0)
        }
        Err(trap) => {
            eprintln!("{} {}", "error:".red().bold(), trap);
            1
        }
    }
}

fn cmd_test(path: PathBuf, json: bool, fail_fast: bool) -> i32 {
    let source = match read_source(&path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let file = path.display().to_string();
    let compiler = Compiler::new(file.clone());
    let out = match compiler.compile_source(&source) {
        Ok(out) => out,
        Err(diags) => {
            eprintln!("{}", diags.display_all(Some(&source)));
            return 1;
        }
    };
    let mut exec = match runtime::instantiate(&out.wasm, Vec::new()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return 1;
        }
    };
    let harness = TestHarness::new(&file);
    let reports = harness.run(&out.module, &out.check, &mut exec, fail_fast);
    if reports.is_empty() {
        println!("no test_* functions found in {}", file);
        return 0;
    }
    let mut any_failed = false;
    for report in &reports {
        any_failed |= !report.passed;
        if json {
            println!("{}", report.to_json_line());
        } else {
            println!("{}", report.human());
        }
    }
    let passed = reports.iter().filter(|r| r.passed).count();
    if !json {
        println!("\n{}/{} passed", passed, reports.len());
    }
    if any_failed { 1 } else { 0 }
}

fn cmd_introspect(builtins: bool, effects: bool, types: bool, path: Option<PathBuf>) -> i32 {
    if builtins {
        println!("{}", serde_json::to_string_pretty(&*type_registry::BUILTINS).unwrap());
    }
    if effects {
        println!("{}", serde_json::to_string_pretty(&*type_registry::EFFECTS).unwrap());
    }
    if types {
        let path = match path {
            Some(p) => p,
            None => {
                println!("introspect --types needs a file to check; pass a path");
                return 0;
            }
        };
        let source = match read_source(&path) {
            Ok(s) => s,
            Err(code) => return code,
        };
        let compiler = Compiler::new(path.display().to_string());
        match compiler.check_source(&source) {
            Ok((_, check)) => {
                let records: Vec<&str> = check.records.keys().map(|s| s.as_str()).collect();
                let unions: Vec<&str> = check.unions.keys().map(|s| s.as_str()).collect();
                let dump = serde_json::json!({ "records": records, "unions": unions });
                println!("{}", serde_json::to_string_pretty(&dump).unwrap());
            }
            Err(diags) => {
                eprintln!("{}", diags.display_all(Some(&source)));
                return 1;
            }
        }
    }
    if !builtins && !effects && !types {
        println!("pass one of --builtins, --effects, --types");
    }
    0
}

/// Converts CLI string arguments to WASM values per the callee's declared
/// parameter types. Only the scalar types a shell argument can spell are
/// supported; a record/union/list parameter is a CLI misuse (exit 2).
fn parse_cli_args(sig: &FunctionSignature, raw: &[String]) -> Result<Vec<wasmi::Val>, String> {
    if raw.len() != sig.params.len() {
        return Err(format!("expected {} argument(s), got {}", sig.params.len(), raw.len()));
    }
    raw.iter()
        .zip(&sig.params)
        .map(|(value, ty)| match ty {
            Type::Int64 => value
                .parse::<i64>()
                .map(wasmi::Val::I64)
                .map_err(|_| format!("`{value}` is not a valid Int64")),
            Type::Float64 => value
                .parse::<f64>()
                .map(wasmi::Val::F64)
                .map_err(|_| format!("`{value}` is not a valid Float64")),
            Type::Bool => match value.as_str() {
                "True" | "true" => Ok(wasmi::Val::I32(1)),
                "False" | "false" => Ok(wasmi::Val::I32(0)),
                _ => Err(format!("`{value}` is not a valid Bool")),
            },
            other => Err(format!("`run` can't construct a CLI argument of type {other}")),
        })
        .collect()
}

fn format_result(ty: &Type, results: &[wasmi::Val], exec: &runtime::Execution) -> String {
    let value = match results.first() {
        Some(v) => v,
        None => return "()".to_string(),
    };
    match ty {
        Type::Unit => "()".to_string(),
        Type::String => value.i32().map(|h| exec.read_string(h)).unwrap_or_default(),
        Type::Bool => match value.i32() {
            Some(0) => "False".to_string(),
            Some(_) => "True".to_string(),
            None => "()".to_string(),
        },
        Type::Float64 => value.f64().map(|n| n.to_string()).unwrap_or_default(),
        _ => value
            .i64()
            .map(|n| n.to_string())
            .or_else(|| value.i32().map(|n| n.to_string()))
            .unwrap_or_default(),
    }
}

/// A best-effort textual dump of the emitted module's top-level section
/// structure (§D): full WAT round-tripping needs a disassembler this crate
/// doesn't carry, so this walks the raw section headers instead.
fn disassemble_sections(wasm: &[u8]) -> String {
    let mut out = String::from("(module\n");
    let mut pos = 8usize; // past the 4-byte magic + 4-byte version
    while pos < wasm.len() {
        let id = wasm[pos];
        pos += 1;
        let (size, consumed) = read_leb128_u32(&wasm[pos..]);
        pos += consumed;
        out.push_str(&format!("  ;; section {} ({}), {} bytes\n", id, section_name(id), size));
        pos += size as usize;
    }
    out.push(')');
    out
}

fn section_name(id: u8) -> &'static str {
    match id {
        0 => "custom",
        1 => "type",
        2 => "import",
        3 => "function",
        4 => "table",
        5 => "memory",
        6 => "global",
        7 => "export",
        8 => "start",
        9 => "element",
        10 => "code",
        11 => "data",
        12 => "data count",
        _ => "unknown",
    }
}

fn read_leb128_u32(bytes: &[u8]) -> (u32, usize) {
    let mut result = 0u32;
    let mut shift = 0u32;
    let mut consumed = 0usize;
    for &byte in bytes {
        consumed += 1;
        result |= ((byte & 0x7f) as u32) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    (result, consumed)
}
