// Monomorphizing wasm codegen (§4.4, §9). Walks a checked module's
// function bodies and emits one `wasm_encoder::Module`: every generic
// call site is specialized by `monomorphize::Monomorphizer` into its own
// concrete function, every record/union construction is a bump
// allocation against the module's own `__alloc`, and every `String` /
// `Bytes` / `List` / `Map` value is an opaque `i32` handle into the
// `runtime::HostState` arenas described in `layout`'s module doc.

pub mod layout;
pub mod monomorphize;

use crate::ast::*;
use crate::checker::{CheckResult, FunctionSignature};
use crate::codegen::layout::{field_size, repr_count, wasm_valtype};
use crate::codegen::monomorphize::Monomorphizer;
use crate::types::{Type, UnionType};
use std::collections::HashMap;
use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, DataSection, ElementSection, Elements, EntityType,
    ExportKind, ExportSection, Function, FunctionSection, GlobalSection, GlobalType, ImportSection,
    Instruction, MemArg, MemorySection, MemoryType, Module as WasmModule, TableSection, TableType,
    TypeSection, ValType,
};

/// The fixed `env` import catalog `runtime::link_all` registers (§4.5).
/// Codegen imports the whole table unconditionally — unused imports cost
/// nothing in a wasm binary, and it keeps call-site dispatch a single
/// name lookup instead of a two-pass "which imports does this module
/// actually need" analysis.
fn host_import_table() -> Vec<(&'static str, Vec<ValType>, Vec<ValType>)> {
    use ValType::{F64, I32, I64};
    vec![
        ("intern_string", vec![I32, I32], vec![I32]),
        ("string_length", vec![I32], vec![I64]),
        ("string_concat", vec![I32, I32], vec![I32]),
        ("string_slice", vec![I32, I64, I64], vec![I32]),
        ("string_eq", vec![I32, I32], vec![I32]),
        ("string_to_int", vec![I32], vec![I32, I64]),
        ("string_to_float", vec![I32], vec![I32, F64]),
        ("char_at", vec![I32, I64], vec![I32]),
        ("contains", vec![I32, I32], vec![I32]),
        ("index_of", vec![I32, I32], vec![I64]),
        ("trim", vec![I32], vec![I32]),
        ("split", vec![I32, I32], vec![I32]),
        ("char_code", vec![I32], vec![I64]),
        ("char_from_code", vec![I64], vec![I32]),
        ("list_new", vec![], vec![I32]),
        ("list_length", vec![I32], vec![I64]),
        ("list_push", vec![I32, I64], vec![I32]),
        ("list_get", vec![I32, I64], vec![I32, I64]),
        ("list_set", vec![I32, I64, I64], vec![I32]),
        ("list_tail", vec![I32], vec![I32]),
        ("list_reverse", vec![I32], vec![I32]),
        ("list_concat", vec![I32, I32], vec![I32]),
        ("map_new", vec![], vec![I32]),
        ("map_size", vec![I32], vec![I64]),
        ("map_insert", vec![I32, I32, I64, I64], vec![I32]),
        ("map_get", vec![I32, I32, I64], vec![I32, I64]),
        ("map_has", vec![I32, I32, I64], vec![I32]),
        ("map_remove", vec![I32, I32, I64], vec![I32]),
        ("map_keys", vec![I32], vec![I32]),
        ("map_values", vec![I32], vec![I32]),
        ("bytes_length", vec![I32], vec![I64]),
        ("abs_int", vec![I64], vec![I64]),
        ("min_int", vec![I64, I64], vec![I64]),
        ("max_int", vec![I64, I64], vec![I64]),
        ("sqrt_f64", vec![F64], vec![F64]),
        ("floor_f64", vec![F64], vec![F64]),
        ("ceil_f64", vec![F64], vec![F64]),
        ("pow_f64", vec![F64, F64], vec![F64]),
        ("f64_rem", vec![F64, F64], vec![F64]),
        ("int_to_string", vec![I64], vec![I32]),
        ("float_to_string", vec![F64], vec![I32]),
        ("sha256", vec![I32], vec![I32]),
        ("now", vec![], vec![I64]),
        ("json_stringify_string", vec![I32], vec![I32]),
        ("log", vec![I32], vec![]),
        ("log_warn", vec![I32], vec![]),
        ("print_string", vec![I32], vec![]),
        ("print_int", vec![I64], vec![]),
        ("print_float", vec![F64], vec![]),
        ("read_line", vec![], vec![I32, I32]),
        ("read_all_stdin", vec![], vec![I32]),
        ("read_file", vec![I32], vec![I32, I32]),
        ("write_file", vec![I32, I32], vec![I32]),
        ("random_int", vec![I64, I64], vec![I64]),
        ("exit", vec![I64], vec![]),
        ("args_count", vec![], vec![I64]),
        ("arg_at", vec![I64], vec![I32, I32]),
        ("set_current_test", vec![I32], vec![]),
        ("assert_eq_int", vec![I64, I64], vec![]),
        ("assert_eq_float", vec![F64, F64], vec![]),
        ("assert_eq_string", vec![I32, I32], vec![]),
        ("assert_true", vec![I32], vec![]),
        ("assert_false", vec![I32], vec![]),
    ]
}

/// Maps a Clarity-facing builtin name (`type_registry::BUILTINS`) to the
/// `env` import it compiles to. Most builtins fan out by element/key
/// representation (e.g. `listGet` on a `List<String>` still calls the
/// one generic `list_get` import — the `i64` it returns is the string
/// handle, narrowed back to `i32` at the call site) so this table is
/// smaller than the builtin catalog itself.
fn builtin_import_name(name: &str) -> Option<&'static str> {
    Some(match name {
        "abs" => "abs_int",
        "min" => "min_int",
        "max" => "max_int",
        "sqrt" => "sqrt_f64",
        "floor" => "floor_f64",
        "ceil" => "ceil_f64",
        "pow" => "pow_f64",
        "floatRem" => "f64_rem",
        "intToString" => "int_to_string",
        "floatToString" => "float_to_string",
        "stringToInt" => "string_to_int",
        "stringToFloat" => "string_to_float",
        "stringLength" => "string_length",
        "stringConcat" => "string_concat",
        "stringSlice" => "string_slice",
        "charAt" => "char_at",
        "contains" => "contains",
        "indexOf" => "index_of",
        "trim" => "trim",
        "split" => "split",
        "charCode" => "char_code",
        "charFromCode" => "char_from_code",
        "bytesLength" => "bytes_length",
        "sha256" => "sha256",
        "now" => "now",
        "jsonStringify" => "json_stringify_string",
        "log" => "log",
        "logWarn" => "log_warn",
        "printString" => "print_string",
        "printInt" => "print_int",
        "printFloat" => "print_float",
        "readLine" => "read_line",
        "readAllStdin" => "read_all_stdin",
        "readFile" => "read_file",
        "writeFile" => "write_file",
        "randomInt" => "random_int",
        "argCount" => "args_count",
        "argAt" => "arg_at",
        "assertTrue" => "assert_true",
        "assertFalse" => "assert_false",
        // `listLength` / `listPush` / `listGet` / `listHead` / `listTail` /
        // `listSet` / `listReverse` / `listConcat` and every `map*` builtin
        // are intercepted earlier in `compile_call` (they need element/key
        // widening or a synthesized key-kind tag the generic dispatch path
        // below doesn't thread through) and never reach this table.
        _ => return None,
    })
}

fn group_locals(types: &[ValType]) -> Vec<(u32, ValType)> {
    let mut out: Vec<(u32, ValType)> = Vec::new();
    for &t in types {
        if let Some(last) = out.last_mut() {
            if last.1 == t {
                last.0 += 1;
                continue;
            }
        }
        out.push((1, t));
    }
    out
}

/// Per-function bookkeeping: local slots (with their Clarity type, so an
/// indirect call through a `Function`-typed local knows what signature
/// to use), lexical scoping, and the label depth a tail-recursive `loop`
/// sits at (`None` when this function isn't wrapped in one — see
/// `compile_function`).
struct FuncCtx<'a> {
    check: &'a CheckResult,
    locals: Vec<(String, u32, Type)>,
    local_types: Vec<ValType>,
    scopes: Vec<usize>,
    self_name: String,
    self_params: Vec<(String, Type)>,
    tail_loop: bool,
    /// Number of `If` blocks currently nested between the cursor and the
    /// enclosing TCO `Loop` (every match arm's test compiles to one). A
    /// self-tail-call branches `loop_depth` levels out to reach the loop's
    /// label, not a hard-coded `0` — `Br(0)` would only break out of the
    /// innermost `If`, not re-enter the loop (§8.2.1, §9).
    loop_depth: u32,
}

impl<'a> FuncCtx<'a> {
    fn push_scope(&mut self) {
        self.scopes.push(self.locals.len());
    }

    fn pop_scope(&mut self) {
        if let Some(mark) = self.scopes.pop() {
            self.locals.truncate(mark);
        }
    }

    fn declare_local(&mut self, name: &str, ty: Type) -> u32 {
        let index = self.local_types.len() as u32 + self.self_params.len() as u32;
        if let Some(vt) = wasm_valtype(&ty) {
            self.local_types.push(vt);
        }
        self.locals.push((name.to_string(), index, ty));
        index
    }

    fn lookup(&self, name: &str) -> Option<(u32, Type)> {
        self.locals.iter().rev().find(|(n, ..)| n == name).map(|(_, i, t)| (*i, t.clone()))
    }
}

pub struct CodeGenerator<'a> {
    module: &'a Module,
    check: &'a CheckResult,
    mono: Monomorphizer,
    types: TypeSection,
    type_index: HashMap<(Vec<ValType>, Vec<ValType>), u32>,
    imports: ImportSection,
    funcs: FunctionSection,
    code: CodeSection,
    exports: ExportSection,
    data: DataSection,
    func_index: HashMap<String, u32>,
    next_func_index: u32,
    string_literals: HashMap<String, (u32, u32)>,
    data_cursor: u32,
    table_slots: Vec<u32>,
    lambda_counter: u32,
    pending_lambdas: Vec<(String, Lambda)>,
    lambda_table_patches: Vec<(u32, String)>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(module: &'a Module, check: &'a CheckResult) -> Self {
        let mut gen = CodeGenerator {
            module,
            check,
            mono: Monomorphizer::new(),
            types: TypeSection::new(),
            type_index: HashMap::new(),
            imports: ImportSection::new(),
            funcs: FunctionSection::new(),
            code: CodeSection::new(),
            exports: ExportSection::new(),
            data: DataSection::new(),
            func_index: HashMap::new(),
            next_func_index: 0,
            string_literals: HashMap::new(),
            data_cursor: 0,
            table_slots: Vec::new(),
            lambda_counter: 0,
            pending_lambdas: Vec::new(),
            lambda_table_patches: Vec::new(),
        };
        gen.import_host_functions();
        gen
    }

    fn type_index_of(&mut self, params: Vec<ValType>, results: Vec<ValType>) -> u32 {
        let key = (params.clone(), results.clone());
        if let Some(&idx) = self.type_index.get(&key) {
            return idx;
        }
        let idx = self.type_index.len() as u32;
        self.types.ty().function(params, results);
        self.type_index.insert(key, idx);
        idx
    }

    fn import_host_functions(&mut self) {
        for (name, params, results) in host_import_table() {
            let ty = self.type_index_of(params, results);
            self.imports.import("env", name, EntityType::Function(ty));
            self.func_index.insert(name.to_string(), self.next_func_index);
            self.next_func_index += 1;
        }
    }

    /// Compiles the whole module. Fails only if `check` carries errors —
    /// callers are expected to have already checked `check.ok()`.
    pub fn generate(mut self) -> Vec<u8> {
        let mut worklist: Vec<(String, &FunctionDeclaration)> = Vec::new();
        for decl in &self.module.declarations {
            if let Declaration::Function(f) = decl {
                if f.type_params.is_empty() {
                    worklist.push((f.name.value.clone(), f));
                }
            }
        }

        // Reserve function indices up front so forward/mutually-recursive
        // calls can be resolved before every body is compiled.
        for (name, _) in &worklist {
            self.func_index.insert(name.clone(), self.next_func_index);
            self.next_func_index += 1;
        }

        let mut compiled: Vec<(String, &FunctionDeclaration, Vec<Type>)> =
            worklist.into_iter().map(|(n, f)| (n, f, Vec::new())).collect();

        loop {
            for (name, decl, type_args) in compiled.drain(..) {
                self.compile_function(&name, decl, &type_args);
            }
            let pending = self.mono.drain();
            if pending.is_empty() && self.pending_lambdas.is_empty() {
                break;
            }
            for (generic_name, mangled, args) in pending {
                if self.func_index.contains_key(&mangled) {
                    continue;
                }
                if let Some(decl) = self.find_function_decl(&generic_name) {
                    self.func_index.insert(mangled.clone(), self.next_func_index);
                    self.next_func_index += 1;
                    compiled.push((mangled, decl, args));
                }
            }
            for (name, lambda) in self.pending_lambdas.drain(..) {
                self.func_index.insert(name.clone(), self.next_func_index);
                self.next_func_index += 1;
                self.compile_lambda_function(&name, &lambda);
            }
        }

        self.emit_alloc_function();
        self.finish()
    }

    fn find_function_decl(&self, name: &str) -> Option<&'a FunctionDeclaration> {
        self.module.declarations.iter().find_map(|d| match d {
            Declaration::Function(f) if f.name.value == name => Some(f),
            _ => None,
        })
    }

    /// A bump allocator living in the module's own linear memory, used
    /// for every record/union construction (§4.4.1). `$heap_ptr` starts
    /// at `__heap_base` (right after the literal-string data segment) and
    /// grows the memory a page at a time when a request would overrun it.
    fn emit_alloc_function(&mut self) {
        let ty = self.type_index_of(vec![ValType::I32], vec![ValType::I32]);
        self.funcs.function(ty);
        self.func_index.insert("__alloc".to_string(), self.next_func_index);
        self.next_func_index += 1;

        let locals = vec![ValType::I32, ValType::I32]; // result ptr, byte-size check temp
        let mut f = Function::new(group_locals(&locals));
        // result = $heap_ptr; $heap_ptr += size; if $heap_ptr > memory.size*65536: memory.grow
        f.instruction(&Instruction::GlobalGet(0));
        f.instruction(&Instruction::LocalSet(2));
        f.instruction(&Instruction::GlobalGet(0));
        f.instruction(&Instruction::LocalGet(0));
        f.instruction(&Instruction::I32Add);
        f.instruction(&Instruction::GlobalSet(0));
        f.instruction(&Instruction::GlobalGet(0));
        f.instruction(&Instruction::MemorySize(0));
        f.instruction(&Instruction::I32Const(65536));
        f.instruction(&Instruction::I32Mul);
        f.instruction(&Instruction::I32GeU);
        f.instruction(&Instruction::If(BlockType::Empty));
        f.instruction(&Instruction::I32Const(1));
        f.instruction(&Instruction::MemoryGrow(0));
        f.instruction(&Instruction::Drop);
        f.instruction(&Instruction::End);
        f.instruction(&Instruction::LocalGet(2));
        f.instruction(&Instruction::End);
        self.code.function(&f);
    }

    fn intern_literal(&mut self, s: &str) -> (u32, u32) {
        if let Some(&(off, len)) = self.string_literals.get(s) {
            return (off, len);
        }
        let offset = self.data_cursor;
        let bytes = s.as_bytes().to_vec();
        let len = bytes.len() as u32;
        self.data.active(0, &ConstExpr::i32_const(offset as i32), bytes);
        self.data_cursor += len.max(1); // never place two literals at the same offset
        self.string_literals.insert(s.to_string(), (offset, len));
        (offset, len)
    }

    fn compile_function(&mut self, mangled_name: &str, decl: &FunctionDeclaration, type_args: &[Type]) {
        let sig = self.resolve_signature(decl, type_args);
        let param_types: Vec<ValType> = sig.params.iter().filter_map(wasm_valtype).collect();
        let result_types: Vec<ValType> = wasm_valtype(&sig.return_type).into_iter().collect();
        let ty = self.type_index_of(param_types, result_types.clone());
        self.funcs.function(ty);
        if decl.exported && type_args.is_empty() {
            self.exports.export(mangled_name, ExportKind::Func, *self.func_index.get(mangled_name).unwrap());
        }

        let self_params: Vec<(String, Type)> =
            decl.params.iter().zip(sig.params.iter()).map(|(p, t)| (p.name.value.clone(), t.clone())).collect();

        let wraps_in_loop = self.body_has_self_tail_call(&decl.body, &decl.name.value, decl.params.len());

        let mut ctx = FuncCtx {
            check: self.check,
            locals: self_params.iter().enumerate().map(|(i, (n, t))| (n.clone(), i as u32, t.clone())).collect(),
            local_types: Vec::new(),
            scopes: vec![self_params.len()],
            self_name: decl.name.value.clone(),
            self_params: self_params.clone(),
            tail_loop: wraps_in_loop,
            loop_depth: 0,
        };

        let mut body = Vec::new();
        if wraps_in_loop {
            let block_ty = match result_types.first() {
                Some(vt) => BlockType::Result(*vt),
                None => BlockType::Empty,
            };
            body.push(Instruction::Loop(block_ty));
            self.compile_tail_block(&decl.body, &mut body, &mut ctx);
            body.push(Instruction::End);
        } else {
            self.compile_tail_block(&decl.body, &mut body, &mut ctx);
        }
        body.push(Instruction::End);

        let mut f = Function::new(group_locals(&ctx.local_types));
        for ins in &body {
            f.instruction(ins);
        }
        self.code.function(&f);
    }

    /// Resolves a declaration's signature, substituting `type_args` for
    /// its type parameters positionally (§4.4.3) when this is a
    /// monomorphized instantiation rather than the generic original.
    fn resolve_signature(&self, decl: &FunctionDeclaration, type_args: &[Type]) -> FunctionSignature {
        let base = &self.check.functions[&decl.name.value];
        if type_args.is_empty() || base.type_params.is_empty() {
            return FunctionSignature {
                type_params: base.type_params.clone(),
                params: base.params.clone(),
                param_names: base.param_names.clone(),
                return_type: base.return_type.clone(),
                effects: base.effects.clone(),
            };
        }
        let bindings = &self.check.type_param_bindings[&decl.name.value];
        let subst: HashMap<String, Type> =
            base.type_params.iter().cloned().zip(type_args.iter().cloned()).collect();
        let mut sub = crate::types::Substitution::new();
        for (name, var) in bindings {
            if let (Type::Var(id), Some(concrete)) = (var, subst.get(name)) {
                sub.insert(*id, concrete.clone());
            }
        }
        FunctionSignature {
            type_params: vec![],
            params: base.params.iter().map(|t| sub.apply(t)).collect(),
            param_names: base.param_names.clone(),
            return_type: sub.apply(&base.return_type),
            effects: base.effects.clone(),
        }
    }

    // ---- tail-position compilation (self-tail-call optimization, §9) ----

    fn body_has_self_tail_call(&self, block: &Block, name: &str, arity: usize) -> bool {
        match &block.result {
            Some(expr) => self.expr_has_self_tail_call(expr, name, arity),
            None => false,
        }
    }

    fn expr_has_self_tail_call(&self, expr: &Expr, name: &str, arity: usize) -> bool {
        match &expr.kind {
            ExprKind::Call(call) => call.callee.value == name && call.args.len() == arity && call.type_args.is_empty(),
            ExprKind::Match(m) => m.arms.iter().any(|a| self.expr_has_self_tail_call(&a.body, name, arity)),
            ExprKind::Block(b) => self.body_has_self_tail_call(b, name, arity),
            ExprKind::Let(_, body) => self.expr_has_self_tail_call(body, name, arity),
            _ => false,
        }
    }

    fn compile_tail_block(&mut self, block: &Block, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        ctx.push_scope();
        for stmt in &block.statements {
            self.compile_stmt(stmt, out, ctx);
        }
        match &block.result {
            Some(expr) => self.compile_tail_expr(expr, out, ctx),
            None => {}
        }
        ctx.pop_scope();
    }

    fn compile_tail_expr(&mut self, expr: &Expr, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        match &expr.kind {
            ExprKind::Call(call) if ctx.tail_loop && call.callee.value == ctx.self_name && call.type_args.is_empty() => {
                self.compile_self_tail_call(call, out, ctx);
            }
            ExprKind::Match(m) => self.compile_match(m, out, ctx, true),
            ExprKind::Block(b) => self.compile_tail_block(b, out, ctx),
            ExprKind::Let(stmt, body) => {
                ctx.push_scope();
                self.compile_let(stmt, out, ctx);
                self.compile_tail_expr(body, out, ctx);
                ctx.pop_scope();
            }
            _ => self.compile_expr(expr, out, ctx),
        }
    }

    fn compile_self_tail_call(&mut self, call: &Call, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        let params = ctx.self_params.clone();
        let args = self.ordered_args(call, &params.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>());
        // Evaluate every new argument into a fresh temp before writing any
        // param local, so `f(b, a)`-style swaps don't clobber a value an
        // earlier argument still needs to read.
        let mut temps = Vec::new();
        for (arg_expr, (_, ty)) in args.iter().zip(params.iter()) {
            self.compile_expr(arg_expr, out, ctx);
            let temp = ctx.declare_local("__tail_tmp", ty.clone());
            out.push(Instruction::LocalSet(temp));
            temps.push(temp);
        }
        for (i, temp) in temps.into_iter().enumerate() {
            out.push(Instruction::LocalGet(temp));
            out.push(Instruction::LocalSet(i as u32));
        }
        // Branches `loop_depth` levels out — past every `If` the match
        // compilation nested this call inside — to land back on the
        // enclosing `Loop`'s label, not its innermost `If`.
        out.push(Instruction::Br(ctx.loop_depth));
    }

    /// Reorders a call's (possibly named) arguments to match `param_names`
    /// — the checker already validated this is possible (§4.3.6).
    fn ordered_args<'e>(&self, call: &'e Call, param_names: &[String]) -> Vec<&'e Expr> {
        if call.args.iter().all(|a| matches!(a, Arg::Positional(_))) {
            return call.args.iter().map(|a| match a {
                Arg::Positional(e) => e,
                Arg::Named(_, e) => e,
            }).collect();
        }
        param_names
            .iter()
            .map(|name| {
                call.args
                    .iter()
                    .find_map(|a| match a {
                        Arg::Named(n, e) if &n.value == name => Some(e),
                        _ => None,
                    })
                    .expect("checker validated every named arg is present")
            })
            .collect()
    }

    // ---- statements ----

    fn compile_stmt(&mut self, stmt: &Stmt, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        match stmt {
            Stmt::Let(l) => self.compile_let(l, out, ctx),
            Stmt::Assign(a) => {
                self.compile_expr(&a.value, out, ctx);
                let (index, _) = ctx.lookup(&a.target.value).expect("checker validated assignment target exists");
                out.push(Instruction::LocalSet(index));
            }
            Stmt::Expr(e) => {
                self.compile_expr(e, out, ctx);
                if !matches!(e.resolved_type.borrow().as_ref(), Some(Type::Unit) | None) {
                    out.push(Instruction::Drop);
                }
            }
        }
    }

    fn compile_let(&mut self, l: &LetStmt, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        self.compile_expr(&l.value, out, ctx);
        let ty = l.value.resolved_type.borrow().clone().unwrap_or(Type::Error);
        if wasm_valtype(&ty).is_some() {
            let index = ctx.declare_local(&l.name.value, ty);
            out.push(Instruction::LocalSet(index));
        } else {
            ctx.declare_local(&l.name.value, ty);
        }
    }

    // ---- expressions (non-tail-position) ----

    fn compile_expr(&mut self, expr: &Expr, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        match &expr.kind {
            ExprKind::Integer(n) => out.push(Instruction::I64Const(*n)),
            ExprKind::Float(s) => out.push(Instruction::F64Const(s.parse().unwrap_or(0.0))),
            ExprKind::Bool(b) => out.push(Instruction::I32Const(i32::from(*b))),
            ExprKind::Str(s) => {
                let (offset, len) = self.intern_literal(s);
                out.push(Instruction::I32Const(offset as i32));
                out.push(Instruction::I32Const(len as i32));
                out.push(Instruction::Call(self.func_index["intern_string"]));
            }
            ExprKind::Identifier(id) => {
                if let Some((index, _)) = ctx.lookup(&id.value) {
                    out.push(Instruction::LocalGet(index));
                } else if let Some(&idx) = self.func_index.get(&id.value) {
                    // A bare reference to a top-level function by name
                    // (no call) yields its table slot as a Function value.
                    if let Some(slot) = self.table_slots.iter().position(|&f| f == idx) {
                        out.push(Instruction::I32Const(slot as i32));
                    } else {
                        let slot = self.table_slots.len() as i32;
                        self.table_slots.push(idx);
                        out.push(Instruction::I32Const(slot));
                    }
                }
            }
            ExprKind::Unary(op, inner) => {
                self.compile_expr(inner, out, ctx);
                let ty = inner.resolved_type.borrow().clone().unwrap_or(Type::Error);
                match (op, &ty) {
                    (UnaryOp::Neg, Type::Int64) => {
                        out.push(Instruction::I64Const(-1));
                        out.push(Instruction::I64Mul);
                    }
                    (UnaryOp::Neg, Type::Float64) => out.push(Instruction::F64Neg),
                    (UnaryOp::Not, _) => out.push(Instruction::I32Eqz),
                    _ => {}
                }
            }
            ExprKind::Binary(op, lhs, rhs) => self.compile_binary(*op, lhs, rhs, out, ctx),
            ExprKind::Call(call) => self.compile_call(expr, call, out, ctx),
            ExprKind::Member(receiver, field) => self.compile_member(receiver, field, out, ctx),
            ExprKind::List(items) => self.compile_list_literal(items, out, ctx),
            ExprKind::Record(fields) => self.compile_record_literal(expr, fields, out, ctx),
            ExprKind::Block(b) => {
                ctx.push_scope();
                for stmt in &b.statements {
                    self.compile_stmt(stmt, out, ctx);
                }
                if let Some(result) = &b.result {
                    self.compile_expr(result, out, ctx);
                }
                ctx.pop_scope();
            }
            ExprKind::Let(stmt, body) => {
                ctx.push_scope();
                self.compile_let(stmt, out, ctx);
                self.compile_expr(body, out, ctx);
                ctx.pop_scope();
            }
            ExprKind::Match(m) => self.compile_match(m, out, ctx, false),
            ExprKind::Lambda(lambda) => self.compile_lambda_value(lambda, out),
        }
    }

    fn compile_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        out: &mut Vec<Instruction<'static>>,
        ctx: &mut FuncCtx<'a>,
    ) {
        if op == BinaryOp::Concat {
            self.compile_expr(lhs, out, ctx);
            self.compile_expr(rhs, out, ctx);
            out.push(Instruction::Call(self.func_index["string_concat"]));
            return;
        }
        if op == BinaryOp::And {
            // Short-circuit: `if lhs { rhs } else { false }`.
            self.compile_expr(lhs, out, ctx);
            out.push(Instruction::If(BlockType::Result(ValType::I32)));
            self.compile_expr(rhs, out, ctx);
            out.push(Instruction::Else);
            out.push(Instruction::I32Const(0));
            out.push(Instruction::End);
            return;
        }
        if op == BinaryOp::Or {
            self.compile_expr(lhs, out, ctx);
            out.push(Instruction::If(BlockType::Result(ValType::I32)));
            out.push(Instruction::I32Const(1));
            out.push(Instruction::Else);
            self.compile_expr(rhs, out, ctx);
            out.push(Instruction::End);
            return;
        }
        let ty = lhs.resolved_type.borrow().clone().unwrap_or(Type::Error);
        self.compile_expr(lhs, out, ctx);
        self.compile_expr(rhs, out, ctx);
        if ty == Type::String {
            out.push(Instruction::Call(self.func_index["string_eq"]));
            if op == BinaryOp::NotEq {
                out.push(Instruction::I32Eqz);
            }
            return;
        }
        // Equality is open to any structurally-compatible pair (§4.3.2), not
        // just numerics, so `Bool`/`Bytes`/`List`/`Option`/`Result`/`Record`/
        // `Union` handles (all `i32`-repr) need `I32Eq`/`I32Ne` here, not the
        // `I64Eq`/`I64Ne` the fallthrough below would otherwise apply.
        if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) {
            let ins = match wasm_valtype(&ty) {
                Some(ValType::F64) => if op == BinaryOp::Eq { Instruction::F64Eq } else { Instruction::F64Ne },
                Some(ValType::I64) => if op == BinaryOp::Eq { Instruction::I64Eq } else { Instruction::I64Ne },
                _ => if op == BinaryOp::Eq { Instruction::I32Eq } else { Instruction::I32Ne },
            };
            out.push(ins);
            return;
        }
        let is_float = ty == Type::Float64;
        let ins = match (op, is_float) {
            (BinaryOp::Add, false) => Instruction::I64Add,
            (BinaryOp::Add, true) => Instruction::F64Add,
            (BinaryOp::Sub, false) => Instruction::I64Sub,
            (BinaryOp::Sub, true) => Instruction::F64Sub,
            (BinaryOp::Mul, false) => Instruction::I64Mul,
            (BinaryOp::Mul, true) => Instruction::F64Mul,
            (BinaryOp::Div, false) => Instruction::I64DivS,
            (BinaryOp::Div, true) => Instruction::F64Div,
            (BinaryOp::Rem, false) => Instruction::I64RemS,
            (BinaryOp::Rem, true) => Instruction::F64Div, // checker rejects Float64 `%`; unreachable in practice
            (BinaryOp::Lt, false) => Instruction::I64LtS,
            (BinaryOp::Lt, true) => Instruction::F64Lt,
            (BinaryOp::Gt, false) => Instruction::I64GtS,
            (BinaryOp::Gt, true) => Instruction::F64Gt,
            (BinaryOp::LtEq, false) => Instruction::I64LeS,
            (BinaryOp::LtEq, true) => Instruction::F64Le,
            (BinaryOp::GtEq, false) => Instruction::I64GeS,
            (BinaryOp::GtEq, true) => Instruction::F64Ge,
            (BinaryOp::And, _) => Instruction::I32And,
            (BinaryOp::Or, _) => Instruction::I32Or,
            (BinaryOp::Concat, _) => unreachable!("handled above"),
            (BinaryOp::Eq, _) | (BinaryOp::NotEq, _) => unreachable!("handled above"),
        };
        out.push(ins);
    }

    fn compile_member(&mut self, receiver: &Expr, field: &Identifier, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        self.compile_expr(receiver, out, ctx);
        let rty = receiver.resolved_type.borrow().clone().unwrap_or(Type::Error);
        if let Type::Record(record) = &rty {
            let layout = layout::layout_record(record);
            let f = layout.field(&field.value).expect("checker validated field exists");
            self.emit_load(f.offset, &f.ty, out);
        }
    }

    fn emit_load(&self, offset: u32, ty: &Type, out: &mut Vec<Instruction<'static>>) {
        let memarg = MemArg { offset: offset as u64, align: 2, memory_index: 0 };
        match wasm_valtype(ty) {
            Some(ValType::I64) => out.push(Instruction::I64Load(memarg)),
            Some(ValType::F64) => out.push(Instruction::F64Load(memarg)),
            Some(ValType::I32) => out.push(Instruction::I32Load(memarg)),
            _ => {}
        }
    }

    fn emit_store(&self, offset: u32, ty: &Type, out: &mut Vec<Instruction<'static>>) {
        let memarg = MemArg { offset: offset as u64, align: 2, memory_index: 0 };
        match wasm_valtype(ty) {
            Some(ValType::I64) => out.push(Instruction::I64Store(memarg)),
            Some(ValType::F64) => out.push(Instruction::F64Store(memarg)),
            Some(ValType::I32) => out.push(Instruction::I32Store(memarg)),
            _ => {}
        }
    }

    fn compile_record_literal(
        &mut self,
        expr: &Expr,
        fields: &[(Identifier, Expr)],
        out: &mut Vec<Instruction<'static>>,
        ctx: &mut FuncCtx<'a>,
    ) {
        let ty = expr.resolved_type.borrow().clone().unwrap_or(Type::Error);
        let record = match &ty {
            Type::Record(r) => r.clone(),
            _ => return,
        };
        let layout = layout::layout_record(&record);
        let ptr_local = ctx.declare_local("__record_ptr", Type::String /* any i32-repr type; never read back by name */);
        out.push(Instruction::I32Const(layout.size as i32));
        out.push(Instruction::Call(self.func_index["__alloc"]));
        out.push(Instruction::LocalSet(ptr_local));
        for (name, value_expr) in fields {
            let f = layout.field(&name.value).expect("checker validated record field");
            out.push(Instruction::LocalGet(ptr_local));
            self.compile_expr(value_expr, out, ctx);
            self.emit_store(f.offset, &f.ty, out);
        }
        out.push(Instruction::LocalGet(ptr_local));
    }

    fn compile_list_literal(&mut self, items: &[Expr], out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        out.push(Instruction::Call(self.func_index["list_new"]));
        for item in items {
            self.compile_expr(item, out, ctx);
            self.widen_to_i64(item, out);
            out.push(Instruction::Call(self.func_index["list_push"]));
        }
    }

    /// Lists carry every element as a raw `i64` in the host arena
    /// (`runtime::lists`'s module doc); widen/narrow at the boundary.
    fn widen_to_i64(&self, item: &Expr, out: &mut Vec<Instruction<'static>>) {
        let ty = item.resolved_type.borrow().clone().unwrap_or(Type::Error);
        self.widen_ty_to_i64(&ty, out);
    }

    fn widen_ty_to_i64(&self, ty: &Type, out: &mut Vec<Instruction<'static>>) {
        match wasm_valtype(ty) {
            Some(ValType::I64) => {}
            Some(ValType::F64) => out.push(Instruction::I64ReinterpretF64),
            _ => out.push(Instruction::I64ExtendI32S),
        }
    }

    fn narrow_from_i64(&self, ty: &Type, out: &mut Vec<Instruction<'static>>) {
        match wasm_valtype(ty) {
            Some(ValType::I64) => {}
            Some(ValType::F64) => out.push(Instruction::F64ReinterpretI64),
            _ => out.push(Instruction::I32WrapI64),
        }
    }

    /// Consumes a `(found: i32, value: <inner_ty's repr>)` pair off the
    /// stack top (value on top, found beneath — wasm's multi-value return
    /// order) and pushes a real `Option<inner_ty>` tagged-union pointer,
    /// laid out exactly as `compile_variant_construction` would for a
    /// `Some`/`None` built by hand. Host imports that report "found or
    /// not" (`stringToInt`, `listGet`, `mapGet`, `readLine`, …) return raw
    /// value pairs rather than touching the module's own linear memory, so
    /// this is the one place that bridges the two representations.
    fn emit_wrap_option(&mut self, inner_ty: &Type, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        use crate::types::{UnionType, UnionVariant};
        let union = UnionType {
            name: "Option".to_string(),
            variants: vec![
                UnionVariant { name: "Some".to_string(), fields: vec![("value".to_string(), inner_ty.clone())] },
                UnionVariant { name: "None".to_string(), fields: vec![] },
            ],
        };
        let union_layout = layout::layout_union(&union);

        let value_local = ctx.declare_local("__opt_value", inner_ty.clone());
        let found_local = ctx.declare_local("__opt_found", Type::Bool);
        out.push(Instruction::LocalSet(value_local));
        out.push(Instruction::LocalSet(found_local));
        let ptr_local = ctx.declare_local("__opt_ptr", Type::String /* any i32-repr type */);

        out.push(Instruction::LocalGet(found_local));
        out.push(Instruction::If(BlockType::Empty));
        {
            let some_layout = union_layout.variant(0);
            out.push(Instruction::I32Const(some_layout.size as i32));
            out.push(Instruction::Call(self.func_index["__alloc"]));
            out.push(Instruction::LocalSet(ptr_local));
            out.push(Instruction::LocalGet(ptr_local));
            out.push(Instruction::I32Const(0));
            out.push(Instruction::I32Store(MemArg { offset: 0, align: 2, memory_index: 0 }));
            out.push(Instruction::LocalGet(ptr_local));
            out.push(Instruction::LocalGet(value_local));
            let field = some_layout.field("value").expect("Some has one field").offset;
            self.emit_store(field, inner_ty, out);
        }
        out.push(Instruction::Else);
        {
            let none_layout = union_layout.variant(1);
            out.push(Instruction::I32Const(none_layout.size as i32));
            out.push(Instruction::Call(self.func_index["__alloc"]));
            out.push(Instruction::LocalSet(ptr_local));
            out.push(Instruction::LocalGet(ptr_local));
            out.push(Instruction::I32Const(1));
            out.push(Instruction::I32Store(MemArg { offset: 0, align: 2, memory_index: 0 }));
        }
        out.push(Instruction::End);
        out.push(Instruction::LocalGet(ptr_local));
    }

    /// List builtins (§4.5 runtime::lists) need the element type to widen
    /// a pushed value to the arena's raw `i64` slot, or narrow one back out
    /// — the generic `builtin_import_name` dispatch has no room for that,
    /// so these get their own path instead of going through it.
    fn compile_list_builtin(&mut self, name: &str, call: &Call, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        let param_names = crate::type_registry::lookup(name).map(|b| b.param_names.clone()).unwrap_or_default();
        let args = self.ordered_args(call, &param_names);
        let elem_ty = match args[0].resolved_type.borrow().clone() {
            Some(Type::List(inner)) => (*inner).clone(),
            _ => Type::Int64,
        };
        self.compile_expr(args[0], out, ctx);
        match name {
            "listLength" => out.push(Instruction::Call(self.func_index["list_length"])),
            "listReverse" => out.push(Instruction::Call(self.func_index["list_reverse"])),
            "listTail" => out.push(Instruction::Call(self.func_index["list_tail"])),
            "listConcat" => {
                self.compile_expr(args[1], out, ctx);
                out.push(Instruction::Call(self.func_index["list_concat"]));
            }
            "listPush" => {
                self.compile_expr(args[1], out, ctx);
                self.widen_ty_to_i64(&elem_ty, out);
                out.push(Instruction::Call(self.func_index["list_push"]));
            }
            "listSet" => {
                self.compile_expr(args[1], out, ctx);
                self.compile_expr(args[2], out, ctx);
                self.widen_ty_to_i64(&elem_ty, out);
                out.push(Instruction::Call(self.func_index["list_set"]));
            }
            "listGet" | "listHead" => {
                if name == "listGet" {
                    self.compile_expr(args[1], out, ctx);
                } else {
                    out.push(Instruction::I64Const(0));
                }
                out.push(Instruction::Call(self.func_index["list_get"]));
                self.narrow_from_i64(&elem_ty, out);
                self.emit_wrap_option(&elem_ty, out, ctx);
            }
            _ => unreachable!("compile_call only routes list builtins here"),
        }
    }

    /// A map's host arena stores keys behind a runtime-typed `MapKey`
    /// (`runtime::maps::decode_key`), but the import ABI passes a key as a
    /// plain `i64` alongside a `key_kind` tag so one `func_wrap` closure
    /// covers every key type. `key_kind` is static per call site (the
    /// map's declared `K`), so codegen supplies the constant itself.
    fn map_key_kind(ty: &Type) -> i32 {
        match ty {
            Type::Bool => 1,
            Type::String => 2,
            _ => 0,
        }
    }

    fn compile_map_builtin(&mut self, name: &str, call: &Call, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        let param_names = crate::type_registry::lookup(name).map(|b| b.param_names.clone()).unwrap_or_default();
        let args = self.ordered_args(call, &param_names);
        let (key_ty, val_ty) = match args[0].resolved_type.borrow().clone() {
            Some(Type::Map(k, v)) => ((*k).clone(), (*v).clone()),
            _ => (Type::Int64, Type::Int64),
        };
        self.compile_expr(args[0], out, ctx);
        match name {
            "mapKeys" => out.push(Instruction::Call(self.func_index["map_keys"])),
            "mapValues" => out.push(Instruction::Call(self.func_index["map_values"])),
            "mapHas" => {
                out.push(Instruction::I32Const(Self::map_key_kind(&key_ty)));
                self.compile_expr(args[1], out, ctx);
                self.widen_ty_to_i64(&key_ty, out);
                out.push(Instruction::Call(self.func_index["map_has"]));
            }
            "mapRemove" => {
                out.push(Instruction::I32Const(Self::map_key_kind(&key_ty)));
                self.compile_expr(args[1], out, ctx);
                self.widen_ty_to_i64(&key_ty, out);
                out.push(Instruction::Call(self.func_index["map_remove"]));
            }
            "mapGet" => {
                out.push(Instruction::I32Const(Self::map_key_kind(&key_ty)));
                self.compile_expr(args[1], out, ctx);
                self.widen_ty_to_i64(&key_ty, out);
                out.push(Instruction::Call(self.func_index["map_get"]));
                self.narrow_from_i64(&val_ty, out);
                self.emit_wrap_option(&val_ty, out, ctx);
            }
            "mapInsert" => {
                out.push(Instruction::I32Const(Self::map_key_kind(&key_ty)));
                self.compile_expr(args[1], out, ctx);
                self.widen_ty_to_i64(&key_ty, out);
                self.compile_expr(args[2], out, ctx);
                self.widen_ty_to_i64(&val_ty, out);
                out.push(Instruction::Call(self.func_index["map_insert"]));
            }
            _ => unreachable!("compile_call only routes map builtins here"),
        }
    }

    fn compile_lambda_value(&mut self, lambda: &Lambda, out: &mut Vec<Instruction<'static>>) {
        let name = format!("__lambda_{}", self.lambda_counter);
        self.lambda_counter += 1;
        self.pending_lambdas.push((name.clone(), lambda.clone()));
        // The function index doesn't exist yet (compiled later in the
        // monomorphization drain loop); record the slot now and patch
        // the table element list once it does.
        let slot = self.table_slots.len() as i32;
        self.table_slots.push(u32::MAX); // patched in `compile_lambda_function`
        self.lambda_table_patches.push((slot as u32, name));
        out.push(Instruction::I32Const(slot));
    }

    fn compile_lambda_function(&mut self, name: &str, lambda: &Lambda) {
        let param_types: Vec<Type> = lambda
            .params
            .iter()
            .map(|p| self.resolve_type_expr(&p.ty))
            .collect();
        let return_type = self.resolve_type_expr(&lambda.return_type);
        let wasm_params: Vec<ValType> = param_types.iter().filter_map(wasm_valtype).collect();
        let wasm_results: Vec<ValType> = wasm_valtype(&return_type).into_iter().collect();
        let ty = self.type_index_of(wasm_params, wasm_results);
        self.funcs.function(ty);

        if let Some(idx) = self.func_index.get(name).copied() {
            for (slot, lname) in self.lambda_table_patches.clone() {
                if lname == name {
                    self.table_slots[slot as usize] = idx;
                }
            }
        }

        let mut ctx = FuncCtx {
            check: self.check,
            locals: lambda
                .params
                .iter()
                .zip(param_types.iter())
                .enumerate()
                .map(|(i, (p, t))| (p.name.value.clone(), i as u32, t.clone()))
                .collect(),
            local_types: Vec::new(),
            scopes: vec![lambda.params.len()],
            self_name: name.to_string(),
            self_params: lambda.params.iter().zip(param_types.iter()).map(|(p, t)| (p.name.value.clone(), t.clone())).collect(),
            tail_loop: false,
            loop_depth: 0,
        };
        let mut body = Vec::new();
        self.compile_tail_block(&lambda.body, &mut body, &mut ctx);
        body.push(Instruction::End);
        let mut f = Function::new(group_locals(&ctx.local_types));
        for ins in &body {
            f.instruction(ins);
        }
        self.code.function(&f);
    }

    /// Resolves a lambda's written-out `TypeExpr` against the module's
    /// registered types. Lambdas don't go through the checker's general
    /// `resolve_type_expr` (that's private to `checker`), so this
    /// duplicates its `Named`/`Generic` cases against `self.check`'s
    /// already-resolved registries.
    fn resolve_type_expr(&self, expr: &TypeExpr) -> Type {
        match expr {
            TypeExpr::Named(id) => match id.value.as_str() {
                "Int64" => Type::Int64,
                "Float64" => Type::Float64,
                "Bool" => Type::Bool,
                "String" => Type::String,
                "Bytes" => Type::Bytes,
                "Timestamp" => Type::Timestamp,
                "Unit" => Type::Unit,
                other => self
                    .check
                    .type_aliases
                    .get(other)
                    .cloned()
                    .or_else(|| self.check.records.get(other).cloned().map(Type::Record))
                    .or_else(|| self.check.unions.get(other).cloned().map(Type::Union))
                    .unwrap_or(Type::Error),
            },
            TypeExpr::Generic(id, args) => {
                let resolved: Vec<Type> = args.iter().map(|a| self.resolve_type_expr(a)).collect();
                match id.value.as_str() {
                    "List" => Type::List(Box::new(resolved[0].clone())),
                    "Option" => Type::Option(Box::new(resolved[0].clone())),
                    "Result" => Type::Result(Box::new(resolved[0].clone()), Box::new(resolved[1].clone())),
                    "Map" => Type::Map(Box::new(resolved[0].clone()), Box::new(resolved[1].clone())),
                    _ => Type::Error,
                }
            }
            TypeExpr::Function(params, ret) => Type::Function {
                params: params.iter().map(|p| self.resolve_type_expr(p)).collect(),
                param_names: None,
                return_type: Box::new(self.resolve_type_expr(ret)),
                effects: vec![],
            },
        }
    }

    // ---- calls: builtins, user functions, union/variant constructors, indirect ----

    fn compile_call(&mut self, expr: &Expr, call: &Call, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        let name = call.callee.value.as_str();

        if self.is_variant_constructor(name) {
            self.compile_variant_construction(expr, call, out, ctx);
            return;
        }

        if name == "assertEqual" {
            self.compile_assert_equal(call, out, ctx);
            return;
        }

        if matches!(name, "listLength" | "listPush" | "listGet" | "listHead" | "listTail" | "listSet" | "listReverse" | "listConcat") {
            self.compile_list_builtin(name, call, out, ctx);
            return;
        }

        if matches!(name, "mapGet" | "mapInsert" | "mapHas" | "mapRemove" | "mapKeys" | "mapValues") {
            self.compile_map_builtin(name, call, out, ctx);
            return;
        }

        if let Some(import_name) = builtin_import_name(name) {
            // Builtins live in `type_registry::BUILTINS`, not
            // `check.functions` (that map only holds module-declared
            // signatures), so param names come from the registry.
            let param_names = crate::type_registry::lookup(name).map(|b| b.param_names.clone()).unwrap_or_default();
            for arg in self.ordered_args(call, &param_names) {
                self.compile_expr(arg, out, ctx);
            }
            out.push(Instruction::Call(self.func_index[import_name]));
            // These imports return `(found: i32, value)` rather than a
            // single value; wrap into the real `Option<T>` tagged-union
            // pointer the rest of codegen expects (§4.4.1). None of them
            // need element/key widening first — the payload is already in
            // its natural wasm representation (`i64` for `Int64`, `f64` for
            // `Float64`, `i32` for a `String` handle).
            if matches!(name, "stringToInt" | "stringToFloat" | "readLine" | "readFile" | "argAt") {
                let inner_ty = match expr.resolved_type.borrow().clone() {
                    Some(Type::Option(inner)) => (*inner).clone(),
                    _ => Type::Int64,
                };
                self.emit_wrap_option(&inner_ty, out, ctx);
            }
            return;
        }

        if let Some(local_ty) = ctx.lookup(name).map(|(_, t)| t) {
            if let Type::Function { params, param_names, .. } = &local_ty {
                let names: Vec<String> = param_names.clone().unwrap_or_default();
                let ordered = if names.is_empty() {
                    call.args.iter().map(|a| match a { Arg::Positional(e) => e, Arg::Named(_, e) => e }).collect::<Vec<_>>()
                } else {
                    self.ordered_args(call, &names)
                };
                for arg in &ordered {
                    self.compile_expr(arg, out, ctx);
                }
                let (index, _) = ctx.lookup(name).unwrap();
                out.push(Instruction::LocalGet(index));
                let wasm_params: Vec<ValType> = params.iter().filter_map(wasm_valtype).collect();
                let wasm_results: Vec<ValType> =
                    wasm_valtype(&expr.resolved_type.borrow().clone().unwrap_or(Type::Unit)).into_iter().collect();
                let ty = self.type_index_of(wasm_params, wasm_results);
                out.push(Instruction::CallIndirect { type_index: ty, table_index: 0 });
                return;
            }
        }

        // Ordinary (possibly generic) user function call.
        let base_sig = &self.check.functions[name];
        let target = if base_sig.type_params.is_empty() {
            name.to_string()
        } else {
            let concrete: Vec<Type> = call
                .type_args
                .iter()
                .map(|t| self.resolve_type_expr(t))
                .collect();
            let concrete = if concrete.is_empty() { self.infer_type_args(call, base_sig, ctx) } else { concrete };
            self.mono.specialize(name, &concrete)
        };
        let param_names = base_sig.param_names.clone();
        for arg in self.ordered_args(call, &param_names) {
            self.compile_expr(arg, out, ctx);
        }
        // The target function's wasm index may not exist yet if this is a
        // fresh specialization; `generate`'s drain loop reserves it before
        // the next compile pass, so by the time this body is finalized
        // (same drain iteration it was requested in, or a later one) the
        // index is present. Direct recursion into `compile_function` for
        // specializations discovered mid-body isn't attempted here —
        // bodies only ever reference indices already reserved this pass.
        if let Some(&idx) = self.func_index.get(&target) {
            out.push(Instruction::Call(idx));
        }
    }

    /// Best-effort type-argument inference from the concrete argument
    /// types at the call site (§4.4.3) when the call omits explicit
    /// `<Type>` annotations. Matches each generic param's `Type::Var`
    /// against the corresponding argument's resolved type positionally.
    fn infer_type_args(&self, call: &Call, sig: &FunctionSignature, _ctx: &FuncCtx<'a>) -> Vec<Type> {
        let mut bound: HashMap<usize, Type> = HashMap::new();
        let args: Vec<&Expr> = call.args.iter().map(|a| match a { Arg::Positional(e) => e, Arg::Named(_, e) => e }).collect();
        for (param_ty, arg) in sig.params.iter().zip(args.iter()) {
            if let Type::Var(id) = param_ty {
                if let Some(concrete) = arg.resolved_type.borrow().clone() {
                    bound.entry(*id).or_insert(concrete);
                }
            }
        }
        // `type_params` lists names in declaration order; the checker
        // recorded each name's `Var` id in `type_param_bindings`.
        sig.type_params
            .iter()
            .enumerate()
            .map(|(i, _)| bound.get(&i).cloned().unwrap_or(Type::Error))
            .collect()
    }

    fn is_variant_constructor(&self, name: &str) -> bool {
        matches!(name, "Some" | "None" | "Ok" | "Err") || self.check.unions.values().any(|u| u.tag_of(name).is_some())
    }

    fn compile_assert_equal(&mut self, call: &Call, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        let args: Vec<&Expr> = call.args.iter().map(|a| match a { Arg::Positional(e) => e, Arg::Named(_, e) => e }).collect();
        let ty = args[0].resolved_type.borrow().clone().unwrap_or(Type::Error);
        self.compile_expr(args[0], out, ctx);
        self.compile_expr(args[1], out, ctx);
        let import = match ty {
            Type::Float64 => "assert_eq_float",
            Type::String => "assert_eq_string",
            _ => "assert_eq_int",
        };
        out.push(Instruction::Call(self.func_index[import]));
    }

    fn compile_variant_construction(&mut self, expr: &Expr, call: &Call, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>) {
        let name = call.callee.value.as_str();
        let ty = expr.resolved_type.borrow().clone().unwrap_or(Type::Error);
        let union: std::rc::Rc<UnionType> = ty.as_union().unwrap_or_else(|| {
            std::rc::Rc::new(UnionType { name: name.to_string(), variants: vec![] })
        });
        let tag = union.tag_of(name).unwrap_or(0);
        let layout = layout::layout_union(&union);
        let variant_layout = layout.variant(tag);

        let ptr_local = ctx.declare_local("__variant_ptr", Type::String /* any i32-repr type; never read back by name */);
        out.push(Instruction::I32Const(variant_layout.size as i32));
        out.push(Instruction::Call(self.func_index["__alloc"]));
        out.push(Instruction::LocalSet(ptr_local));
        out.push(Instruction::LocalGet(ptr_local));
        out.push(Instruction::I32Const(tag as i32));
        out.push(Instruction::I32Store(MemArg { offset: 0, align: 2, memory_index: 0 }));

        let field_names: Vec<String> = variant_layout.fields.iter().map(|f| f.name.clone()).collect();
        let positional = call.args.iter().all(|a| matches!(a, Arg::Positional(_)));
        let values: Vec<&Expr> = if positional || field_names.is_empty() {
            call.args.iter().map(|a| match a { Arg::Positional(e) => e, Arg::Named(_, e) => e }).collect()
        } else {
            self.ordered_args(call, &field_names)
        };
        for (value_expr, field) in values.iter().zip(variant_layout.fields.iter()) {
            out.push(Instruction::LocalGet(ptr_local));
            self.compile_expr(value_expr, out, ctx);
            self.emit_store(field.offset, &field.ty, out);
        }
        out.push(Instruction::LocalGet(ptr_local));
    }

    // ---- match (§4.3.8, §9: bounds-checked tag, traps on fall-through) ----

    fn compile_match(&mut self, m: &Match, out: &mut Vec<Instruction<'static>>, ctx: &mut FuncCtx<'a>, tail: bool) {
        let result_ty = m.arms.first().map(|a| a.body.resolved_type.borrow().clone().unwrap_or(Type::Unit)).unwrap_or(Type::Unit);
        let scrutinee_ty = m.scrutinee.resolved_type.borrow().clone().unwrap_or(Type::Error);

        self.compile_expr(&m.scrutinee, out, ctx);
        let scrutinee_local = ctx.declare_local("__scrutinee", scrutinee_ty.clone());
        out.push(Instruction::LocalSet(scrutinee_local));

        let result_local = if wasm_valtype(&result_ty).is_some() {
            Some(ctx.declare_local("__match_result", result_ty.clone()))
        } else {
            None
        };

        self.compile_match_arms(&m.arms, 0, scrutinee_local, &scrutinee_ty, result_local, out, ctx, tail);

        if let Some(local) = result_local {
            out.push(Instruction::LocalGet(local));
        }
    }

    fn compile_match_arms(
        &mut self,
        arms: &[MatchArm],
        index: usize,
        scrutinee_local: u32,
        scrutinee_ty: &Type,
        result_local: Option<u32>,
        out: &mut Vec<Instruction<'static>>,
        ctx: &mut FuncCtx<'a>,
        tail: bool,
    ) {
        if index >= arms.len() {
            // No arm matched — the checker proved exhaustiveness over the
            // *declared* shape, but a union's tag is still only checked at
            // run time (§9's explicit decision), so an out-of-range tag traps.
            out.push(Instruction::Unreachable);
            return;
        }
        let arm = &arms[index];
        ctx.push_scope();
        // `compile_pattern_test` pushes its boolean condition directly
        // onto `out` when it returns `true`; when unconditional (plain
        // wildcard/binding, no guard) nothing is pushed at all.
        let has_condition = self.compile_pattern_test(&arm.pattern, scrutinee_local, scrutinee_ty, out, ctx);
        match (has_condition, &arm.guard) {
            (true, Some(guard)) => {
                out.push(Instruction::If(BlockType::Empty));
                ctx.loop_depth += 1;
                self.compile_expr(guard, out, ctx);
                out.push(Instruction::If(BlockType::Empty));
                ctx.loop_depth += 1;
                self.compile_arm_body(arm, result_local, tail, out, ctx);
                out.push(Instruction::Else);
                self.compile_match_arms(arms, index + 1, scrutinee_local, scrutinee_ty, result_local, out, ctx, tail);
                out.push(Instruction::End);
                ctx.loop_depth -= 1;
                out.push(Instruction::Else);
                self.compile_match_arms(arms, index + 1, scrutinee_local, scrutinee_ty, result_local, out, ctx, tail);
                out.push(Instruction::End);
                ctx.loop_depth -= 1;
            }
            (true, None) => {
                out.push(Instruction::If(BlockType::Empty));
                ctx.loop_depth += 1;
                self.compile_arm_body(arm, result_local, tail, out, ctx);
                out.push(Instruction::Else);
                self.compile_match_arms(arms, index + 1, scrutinee_local, scrutinee_ty, result_local, out, ctx, tail);
                out.push(Instruction::End);
                ctx.loop_depth -= 1;
            }
            (false, Some(guard)) => {
                self.compile_expr(guard, out, ctx);
                out.push(Instruction::If(BlockType::Empty));
                ctx.loop_depth += 1;
                self.compile_arm_body(arm, result_local, tail, out, ctx);
                out.push(Instruction::Else);
                self.compile_match_arms(arms, index + 1, scrutinee_local, scrutinee_ty, result_local, out, ctx, tail);
                out.push(Instruction::End);
                ctx.loop_depth -= 1;
            }
            (false, None) => {
                // Unconditional (wildcard/binding, no guard) — later arms
                // are unreachable, matching the checker's dead-arm stance.
                self.compile_arm_body(arm, result_local, tail, out, ctx);
            }
        }
        ctx.pop_scope();
    }

    fn compile_arm_body(
        &mut self,
        arm: &MatchArm,
        result_local: Option<u32>,
        tail: bool,
        out: &mut Vec<Instruction<'static>>,
        ctx: &mut FuncCtx<'a>,
    ) {
        if tail {
            self.compile_tail_expr(&arm.body, out, ctx);
        } else {
            self.compile_expr(&arm.body, out, ctx);
        }
        if let Some(local) = result_local {
            out.push(Instruction::LocalSet(local));
        }
    }

    /// Emits the test for one pattern (pushing its `i32` boolean condition
    /// onto `out`) and binds its identifiers as new locals. Returns `false`
    /// for an unconditional pattern (wildcard or plain binding with no
    /// guard) — nothing is pushed — so the caller can skip the `if`.
    fn compile_pattern_test(
        &mut self,
        pattern: &Pattern,
        scrutinee_local: u32,
        scrutinee_ty: &Type,
        out: &mut Vec<Instruction<'static>>,
        ctx: &mut FuncCtx<'a>,
    ) -> bool {
        match pattern {
            Pattern::Wildcard => false,
            Pattern::Binding(id) => {
                let index = ctx.declare_local(&id.value, scrutinee_ty.clone());
                out.push(Instruction::LocalGet(scrutinee_local));
                out.push(Instruction::LocalSet(index));
                false
            }
            Pattern::Literal(lit) => {
                out.push(Instruction::LocalGet(scrutinee_local));
                match lit {
                    Literal::Integer(n) => {
                        out.push(Instruction::I64Const(*n));
                        out.push(Instruction::I64Eq);
                    }
                    Literal::Float(s) => {
                        out.push(Instruction::F64Const(s.parse().unwrap_or(0.0)));
                        out.push(Instruction::F64Eq);
                    }
                    Literal::Bool(b) => {
                        out.push(Instruction::I32Const(i32::from(*b)));
                        out.push(Instruction::I32Eq);
                    }
                    Literal::Str(s) => {
                        let (offset, len) = self.intern_literal(s);
                        out.push(Instruction::I32Const(offset as i32));
                        out.push(Instruction::I32Const(len as i32));
                        out.push(Instruction::Call(self.func_index["intern_string"]));
                        out.push(Instruction::Call(self.func_index["string_eq"]));
                    }
                }
                true
            }
            Pattern::Range(lo, hi) => {
                out.push(Instruction::LocalGet(scrutinee_local));
                out.push(Instruction::I64Const(*lo));
                out.push(Instruction::I64GeS);
                out.push(Instruction::LocalGet(scrutinee_local));
                out.push(Instruction::I64Const(*hi));
                out.push(Instruction::I64LeS);
                out.push(Instruction::I32And);
                true
            }
            Pattern::Constructor { name, fields } => {
                let union = scrutinee_ty.as_union();
                let tag = union.as_ref().and_then(|u| u.tag_of(&name.value));
                let mut condition_pushed = false;
                if let Some(tag) = tag {
                    out.push(Instruction::LocalGet(scrutinee_local));
                    out.push(Instruction::I32Load(MemArg { offset: 0, align: 2, memory_index: 0 }));
                    out.push(Instruction::I32Const(tag as i32));
                    out.push(Instruction::I32Eq);
                    condition_pushed = true;
                }
                // Sub-patterns are tested after the tag check and ANDed
                // into the running condition, so `Ok(Some(x))`-style
                // nested constructor/literal/range sub-patterns actually
                // gate the arm instead of only binding `x` unconditionally.
                // A sub-pattern only reads fields that exist for this tag,
                // so testing it here (rather than inside its own `if`) is
                // sound even without short-circuiting.
                if let Some(u) = &union {
                    if let Some(t) = tag {
                        let variant_layout = layout::layout_union(u).variants[t as usize].clone();
                        match fields {
                            ConstructorFields::None => {}
                            ConstructorFields::Positional(pats) => {
                                for (pat, field) in pats.iter().zip(variant_layout.fields.iter()) {
                                    if self.bind_subpattern(pat, scrutinee_local, field.offset, &field.ty, out, ctx) {
                                        if condition_pushed {
                                            out.push(Instruction::I32And);
                                        } else {
                                            condition_pushed = true;
                                        }
                                    }
                                }
                            }
                            ConstructorFields::Named(pairs) => {
                                for (fname, pat) in pairs {
                                    if let Some(field) = variant_layout.field(&fname.value) {
                                        let (offset, ty) = (field.offset, field.ty.clone());
                                        if self.bind_subpattern(pat, scrutinee_local, offset, &ty, out, ctx) {
                                            if condition_pushed {
                                                out.push(Instruction::I32And);
                                            } else {
                                                condition_pushed = true;
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
                condition_pushed
            }
        }
    }

    /// Tests and binds a pattern nested inside a constructor pattern's
    /// field: loads the field into a fresh local, then recurses through
    /// `compile_pattern_test` exactly as if that local were a top-level
    /// scrutinee. This is what lets a nested `Constructor`/`Literal`/
    /// `Range` sub-pattern (not just `Binding`/`Wildcard`) get tested.
    /// Returns whether a condition was pushed onto `out`.
    fn bind_subpattern(
        &mut self,
        pat: &Pattern,
        scrutinee_local: u32,
        offset: u32,
        field_ty: &Type,
        out: &mut Vec<Instruction<'static>>,
        ctx: &mut FuncCtx<'a>,
    ) -> bool {
        if matches!(pat, Pattern::Wildcard) {
            return false;
        }
        out.push(Instruction::LocalGet(scrutinee_local));
        self.emit_load(offset, field_ty, out);
        let field_local = ctx.declare_local("__field", field_ty.clone());
        out.push(Instruction::LocalSet(field_local));
        self.compile_pattern_test(pat, field_local, field_ty, out, ctx)
    }

    fn finish(mut self) -> Vec<u8> {
        let mut tables = TableSection::new();
        let table_len = self.table_slots.len().max(1) as u64;
        tables.table(TableType { element_type: wasm_encoder::RefType::FUNCREF, minimum: table_len, maximum: Some(table_len) });

        let mut memories = MemorySection::new();
        memories.memory(MemoryType { minimum: 1, maximum: None, memory64: false, shared: false });

        let mut globals = GlobalSection::new();
        let heap_base = self.data_cursor.max(8);
        globals.global(
            GlobalType { val_type: ValType::I32, mutable: true },
            &ConstExpr::i32_const(heap_base as i32),
        );

        self.exports.export("memory", ExportKind::Memory, 0);
        self.exports.export("__heap_base", ExportKind::Global, 0);
        self.exports.export("__alloc", ExportKind::Func, self.func_index["__alloc"]);

        let mut elements = ElementSection::new();
        if !self.table_slots.is_empty() {
            let fns: Vec<u32> = self.table_slots.clone();
            elements.active(Some(0), &ConstExpr::i32_const(0), Elements::Functions(&fns));
        }

        let mut module = WasmModule::new();
        module.section(&self.types);
        module.section(&self.imports);
        module.section(&self.funcs);
        module.section(&tables);
        module.section(&memories);
        module.section(&globals);
        module.section(&self.exports);
        module.section(&elements);
        module.section(&self.code);
        module.section(&self.data);
        module.finish()
    }
}
