// Test discovery, execution, and reporting (§4.6). A compiled module's
// `test_*` exports are run one at a time through `runtime::Execution`;
// each accumulated `TestFailure` is turned into a self-contained report
// carrying its source span and a stock fix hint, independent of any other
// failure in the same run (the "self-healing" accumulation of §7).

use crate::ast::{Declaration, Module};
use crate::checker::CheckResult;
use crate::diagnostics::SourceLocation;
use crate::runtime::{Execution, TestFailure};
use crate::token::Span;
use crate::types::Type;
use colored::Colorize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub kind: String,
    pub actual: String,
    pub expected: String,
    pub function: String,
    pub location: SourceLocation,
    pub fix_hint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub name: String,
    pub passed: bool,
    pub failures: Vec<FailureReport>,
}

impl TestReport {
    pub fn human(&self) -> String {
        if self.passed {
            format!("{} {}", "ok".green().bold(), self.name)
        } else {
            let mut out = format!("{} {}", "FAIL".red().bold(), self.name);
            for f in &self.failures {
                out.push_str(&format!(
                    "\n    {} at {}:{}:{} — expected {}, got {}\n    hint: {}",
                    f.kind.dimmed(),
                    f.location.file,
                    f.location.line,
                    f.location.column,
                    f.expected,
                    f.actual,
                    f.fix_hint
                ));
            }
            out
        }
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Discovers and runs `test_*` functions against an already-instantiated
/// module, per the §4.6 discovery rule: name begins with `test_`, declares
/// exactly the `Test` effect, takes zero parameters, returns `Unit`.
pub struct TestHarness<'a> {
    file: &'a str,
}

impl<'a> TestHarness<'a> {
    pub fn new(file: &'a str) -> Self {
        TestHarness { file }
    }

    pub fn discover(&self, module: &Module, check: &CheckResult) -> Vec<String> {
        module
            .declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Function(f) => Some(f),
                _ => None,
            })
            .filter(|f| f.name.value.starts_with("test_"))
            .filter(|f| {
                check
                    .functions
                    .get(&f.name.value)
                    .map(|sig| {
                        sig.effects.len() == 1
                            && sig.effects[0] == "Test"
                            && sig.params.is_empty()
                            && sig.return_type == Type::Unit
                    })
                    .unwrap_or(false)
            })
            .map(|f| f.name.value.clone())
            .collect()
    }

    /// Runs every discovered test in source order, reporting all
    /// accumulated failures per test. With `fail_fast`, stops after the
    /// first failing test rather than running the remaining ones.
    pub fn run(&self, module: &Module, check: &CheckResult, exec: &mut Execution, fail_fast: bool) -> Vec<TestReport> {
        let mut reports = Vec::new();
        for name in self.discover(module, check) {
            exec.set_current_test(&name);
            // A trap (e.g. division by zero inside the test body) is
            // itself a failing result; it just can't carry a structured
            // `TestFailure` record, so it's reported as one synthetic one.
            let call_result = exec.call(&name, &[]);
            let mut failures: Vec<FailureReport> = exec
                .take_failures()
                .into_iter()
                .map(|f| self.to_report(&name, module, f))
                .collect();
            if let Err(trap) = call_result {
                failures.push(FailureReport {
                    kind: "trap".to_string(),
                    actual: trap,
                    expected: "no trap".to_string(),
                    function: name.clone(),
                    location: self.span_for(module, &name),
                    fix_hint: "the test function trapped before completing; check for division by \
                               zero, an out-of-range index, or an unmatched union tag"
                        .to_string(),
                });
            }
            let passed = failures.is_empty();
            let is_last_failure = fail_fast && !passed;
            reports.push(TestReport { name, passed, failures });
            if is_last_failure {
                break;
            }
        }
        reports
    }

    fn to_report(&self, function: &str, module: &Module, failure: TestFailure) -> FailureReport {
        FailureReport {
            fix_hint: fix_hint_for(&failure.kind),
            kind: failure.kind,
            actual: failure.actual,
            expected: failure.expected,
            function: function.to_string(),
            location: self.span_for(module, function),
        }
    }

    fn span_for(&self, module: &Module, function: &str) -> SourceLocation {
        let span = module
            .declarations
            .iter()
            .find_map(|d| match d {
                Declaration::Function(f) if f.name.value == function => Some(f.span),
                _ => None,
            })
            .unwrap_or_else(Span::default);
        SourceLocation::from_span(span, self.file)
    }
}

fn fix_hint_for(kind: &str) -> String {
    match kind {
        "assertEqual" => "compare the expression on each side by hand; one of them isn't \
                          producing the value the test expects"
            .to_string(),
        "assertTrue" => "the asserted condition evaluated to False; check its operands".to_string(),
        "assertFalse" => "the asserted condition evaluated to True; check its operands".to_string(),
        other => format!("check the arguments passed to the `{other}` assertion"),
    }
}
