//#[macro_use]
extern crate lazy_static;

pub mod ast;
pub mod checker;
pub mod codegen;
pub mod diagnostics;
pub mod error_help;
pub mod errors;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod test_harness;
pub mod token;
pub mod type_registry;
pub mod types;

use checker::{CheckResult, Checker};
use codegen::CodeGenerator;
use diagnostics::DiagnosticCollector;
use errors::CompileError;
use lexer::Lexer;
use parser::Parser;

/// The result of a full pipeline run: the emitted module plus the checked
/// registries (codegen already consumed them, but `test_harness` and
/// `introspect --types` read them again after compilation).
pub struct CompileOutput {
    pub wasm: Vec<u8>,
    pub module: ast::Module,
    pub check: CheckResult,
}

/// Lex -> parse -> check -> codegen, the same pipeline stages the
/// teacher's `Compiler::compile_source` drives, reduced to Clarity's
/// single build target (there is no client/server split here).
pub struct Compiler {
    file: String,
}

impl Compiler {
    pub fn new(file: impl Into<String>) -> Self {
        Compiler { file: file.into() }
    }

    /// Lexes and parses `source`, collecting every recoverable parse error
    /// into one `DiagnosticCollector` rather than stopping at the first.
    pub fn parse(&self, source: &str) -> Result<ast::Module, DiagnosticCollector> {
        let mut lexer = Lexer::new(source);
        let mut parser = Parser::new(&mut lexer);
        parser.parse_module().map_err(|errors| {
            let mut diagnostics = DiagnosticCollector::new();
            for error in errors {
                diagnostics.add(error.to_diagnostic(&self.file));
            }
            diagnostics
        })
    }

    /// Runs the three-pass checker (§4.3.1) over an already-parsed module.
    pub fn check(&self, module: &ast::Module) -> CheckResult {
        Checker::new(&self.file).check(module)
    }

    /// Parses and checks `source`, stopping short of codegen. Used by
    /// `compile --check-only` and by `introspect --types`, which needs a
    /// `CheckResult` without caring about the emitted module.
    pub fn check_source(&self, source: &str) -> Result<(ast::Module, CheckResult), DiagnosticCollector> {
        let module = self.parse(source)?;
        let check = self.check(&module);
        if !check.ok() {
            return Err(check.diagnostics);
        }
        Ok((module, check))
    }

    /// Runs the full pipeline, emitting a WASM module on success.
    pub fn compile_source(&self, source: &str) -> Result<CompileOutput, DiagnosticCollector> {
        println!("   - compiling {}", self.file);
        let (module, check) = self.check_source(source)?;
        let wasm = CodeGenerator::new(&module, &check).generate();
        Ok(CompileOutput { wasm, module, check })
    }

    /// Renders a single `CompileError` the way `main.rs` prints lex/parse
    /// failures that never made it into a `DiagnosticCollector`.
    pub fn display_error(&self, error: &CompileError, source: Option<&str>) -> String {
        error.to_diagnostic(&self.file).display(source)
    }
}

pub trait LexerExt {
    fn collect_tokens(&mut self) -> Vec<token::Token>;
}

impl LexerExt for Lexer {
    fn collect_tokens(&mut self) -> Vec<token::Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let done = tok.kind == token::TokenKind::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        tokens
    }
}
