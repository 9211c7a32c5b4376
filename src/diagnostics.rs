// Diagnostic rendering: colored human-readable text or structured JSON
// (§6.2). The stage that produces a diagnostic stamps its span; the driver
// decides how to render it.

use crate::token::{Span, Token};
use serde::Serialize;

pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Error => colors::RED,
            Severity::Warning => colors::YELLOW,
            Severity::Info => colors::CYAN,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl SourceLocation {
    pub fn from_span(span: Span, file: &str) -> Self {
        let length = span.end.offset.saturating_sub(span.start.offset).max(1);
        SourceLocation { file: file.to_string(), line: span.start.line, column: span.start.col, length }
    }

    pub fn from_token(token: &Token, file: &str) -> Self {
        Self::from_span(token.span, file)
    }

    pub fn unknown() -> Self {
        SourceLocation { file: "<unknown>".to_string(), line: 0, column: 0, length: 0 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub help: Vec<String>,
    pub notes: Vec<String>,
    pub code: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic { severity: Severity::Error, message: message.into(), location: None, help: Vec::new(), notes: Vec::new(), code: None }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic { severity: Severity::Warning, message: message.into(), location: None, help: Vec::new(), notes: Vec::new(), code: None }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Diagnostic { severity: Severity::Info, message: message.into(), location: None, help: Vec::new(), notes: Vec::new(), code: None }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn display(&self, source: Option<&str>) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{bold}{color}{severity}:{reset} {bold}{message}{reset}\n",
            bold = colors::BOLD,
            color = self.severity.color(),
            severity = self.severity.label(),
            reset = colors::RESET,
            message = self.message,
        ));

        if let Some(loc) = &self.location {
            output.push_str(&format!(
                "  {dim}-->{reset} {file}:{line}:{column}\n",
                dim = colors::DIM,
                reset = colors::RESET,
                file = loc.file,
                line = loc.line,
                column = loc.column,
            ));
            if let Some(source) = source {
                output.push_str(&self.format_source_snippet(source, loc));
            }
        }

        if let Some(code) = &self.code {
            output.push_str(&format!("  {dim}[{code}]{reset}\n", dim = colors::DIM, code = code, reset = colors::RESET));
        }

        for help in &self.help {
            output.push_str(&format!("  {green}{bold}help:{reset} {help}\n", green = colors::GREEN, bold = colors::BOLD, reset = colors::RESET, help = help));
        }

        for note in &self.notes {
            output.push_str(&format!("  {cyan}note:{reset} {note}\n", cyan = colors::CYAN, reset = colors::RESET, note = note));
        }

        output
    }

    fn format_source_snippet(&self, source: &str, loc: &SourceLocation) -> String {
        let mut output = String::new();
        let lines: Vec<&str> = source.lines().collect();
        if loc.line == 0 || loc.line > lines.len() {
            return output;
        }
        let line_idx = loc.line - 1;
        let line_content = lines[line_idx];
        let width = loc.line.to_string().len();

        if line_idx > 0 {
            output.push_str(&format!("   {dim}{:>w$} |{reset} {}\n", line_idx, lines[line_idx - 1], dim = colors::DIM, reset = colors::RESET, w = width));
        }
        output.push_str(&format!("   {cyan}{:>w$} |{reset} {}\n", loc.line, line_content, cyan = colors::CYAN, reset = colors::RESET, w = width));

        let padding = " ".repeat(width + 3 + loc.column.saturating_sub(1));
        let underline = "^".repeat(loc.length.max(1));
        output.push_str(&format!("   {dim}{:>w$} |{reset}{padding}{color}{underline}{reset}\n", "", dim = colors::DIM, reset = colors::RESET, w = width, padding = padding, color = self.severity.color(), underline = underline));

        if line_idx + 1 < lines.len() {
            output.push_str(&format!("   {dim}{:>w$} |{reset} {}\n", line_idx + 2, lines[line_idx + 1], dim = colors::DIM, reset = colors::RESET, w = width));
        }
        output
    }
}

/// Canned constructors for Clarity's error taxonomy (§4.3.9, §7).
pub struct DiagnosticBuilder;

impl DiagnosticBuilder {
    pub fn type_mismatch(expected: &str, found: &str, location: SourceLocation) -> Diagnostic {
        Diagnostic::error(format!("type mismatch: expected `{}`, found `{}`", expected, found))
            .at(location)
            .with_code("E001")
            .with_help("Clarity never performs implicit numeric conversion; convert explicitly")
    }

    pub fn undefined_variable(name: &str, location: SourceLocation) -> Diagnostic {
        Diagnostic::error(format!("Undefined: cannot find `{}` in this scope", name))
            .at(location)
            .with_code("E002")
            .with_help("variables must be declared with `let` before they are used")
    }

    pub fn undefined_function(name: &str, location: SourceLocation, similar: Option<&str>) -> Diagnostic {
        let mut diag = Diagnostic::error(format!("cannot find function `{}` in this scope", name)).at(location).with_code("E003");
        if let Some(s) = similar {
            diag = diag.with_help(format!("did you mean `{}`?", s));
        }
        diag
    }

    pub fn syntax_error(expected: &str, found: &str, location: SourceLocation) -> Diagnostic {
        Diagnostic::error(format!("expected {}, found {}", expected, found)).at(location).with_code("E004")
    }

    pub fn llm_migration(word: &str, hint: &str, location: SourceLocation) -> Diagnostic {
        Diagnostic::error(format!("`{}` is not part of Clarity's grammar", word))
            .at(location)
            .with_code("E005")
            .with_help(hint)
            .with_note("Clarity is pattern-matching-only; this idiom doesn't carry over from other languages")
    }

    pub fn unknown_effect(name: &str, valid: &[&str], location: SourceLocation) -> Diagnostic {
        Diagnostic::error(format!("unknown effect `{}`", name))
            .at(location)
            .with_code("E006")
            .with_help(format!("valid effects are: {}", valid.join(", ")))
    }

    pub fn effect_not_declared(missing: &[String], callee: &str, location: SourceLocation) -> Diagnostic {
        Diagnostic::error(format!(
            "call to `{}` requires effect{} {} not declared by the caller",
            callee,
            if missing.len() == 1 { "" } else { "s" },
            missing.join(", "),
        ))
        .at(location)
        .with_code("E007")
        .with_help("add the missing effect(s) to this function's `effect { ... }` clause")
    }

    pub fn immutable_assignment(name: &str, location: SourceLocation) -> Diagnostic {
        Diagnostic::error(format!("cannot assign to immutable binding `{}`", name))
            .at(location)
            .with_code("E008")
            .with_help(format!("declare it as `let mut {}` if it needs to be reassigned", name))
    }

    pub fn assign_to_param(name: &str, location: SourceLocation) -> Diagnostic {
        Diagnostic::error(format!("cannot assign to function parameter `{}`", name))
            .at(location)
            .with_code("E009")
    }

    pub fn match_not_exhaustive(missing: &[String], location: SourceLocation) -> Diagnostic {
        Diagnostic::error(format!("match is not exhaustive; missing: `{}`", missing.join("`, `")))
            .at(location)
            .with_code("E010")
            .with_help("add the missing arm(s) or a wildcard `_` arm")
    }

    pub fn range_overlap(a: (i64, i64), b: (i64, i64), location: SourceLocation) -> Diagnostic {
        Diagnostic::warning(format!("range patterns {}..{} and {}..{} overlap", a.0, a.1, b.0, b.1))
            .at(location)
            .with_code("W001")
            .with_help("the earlier arm always wins for overlapping values; reorder or narrow the ranges")
    }

    pub fn named_argument_error(message: impl Into<String>, location: SourceLocation) -> Diagnostic {
        Diagnostic::error(message).at(location).with_code("E011")
    }

    pub fn record_literal_ambiguous(candidates: &[String], location: SourceLocation) -> Diagnostic {
        Diagnostic::error(format!("record literal matches multiple types: {}", candidates.join(", ")))
            .at(location)
            .with_code("E012")
            .with_note("the first registered match is used; annotate the binding to disambiguate")
    }

    pub fn no_matching_record_type(location: SourceLocation) -> Diagnostic {
        Diagnostic::error("record literal doesn't match any registered record type's field set")
            .at(location)
            .with_code("E013")
    }

    pub fn guard_not_bool(found: &str, location: SourceLocation) -> Diagnostic {
        Diagnostic::error(format!("match guard must have type `Bool`, found `{}`", found))
            .at(location)
            .with_code("E014")
    }

    pub fn unused_variable(name: &str, location: SourceLocation) -> Diagnostic {
        Diagnostic::warning(format!("unused variable: `{}`", name))
            .at(location)
            .with_code("W002")
            .with_help(format!("prefix with `_` to silence: `_{}`", name))
    }

    pub fn module_not_found(module_name: &str, location: SourceLocation) -> Diagnostic {
        Diagnostic::error(format!("module `{}` not found", module_name)).at(location).with_code("E015")
    }

    pub fn import_not_found(item: &str, module: &str, location: SourceLocation, similar: Option<&str>) -> Diagnostic {
        let mut diag = Diagnostic::error(format!("cannot find `{}` in module `{}`", item, module)).at(location).with_code("E016");
        diag = match similar {
            Some(s) => diag.with_help(format!("did you mean `{}`?", s)),
            None => diag.with_help(format!("check the exports of `{}`", module)),
        };
        diag
    }
}

#[derive(Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Info => {}
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warning_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn display_all(&self, source: Option<&str>) -> String {
        let mut output = String::new();
        for diag in &self.diagnostics {
            output.push_str(&diag.display(source));
            output.push('\n');
        }
        if self.has_errors() || self.has_warnings() {
            output.push_str(&format!("{bold}result:{reset} ", bold = colors::BOLD, reset = colors::RESET));
            if self.has_errors() {
                output.push_str(&format!("{red}{n} error{s}{reset}", red = colors::RED, n = self.error_count, s = if self.error_count == 1 { "" } else { "s" }, reset = colors::RESET));
            }
            if self.has_warnings() {
                if self.has_errors() {
                    output.push_str(", ");
                }
                output.push_str(&format!("{yellow}{n} warning{s}{reset}", yellow = colors::YELLOW, n = self.warning_count, s = if self.warning_count == 1 { "" } else { "s" }, reset = colors::RESET));
            }
            output.push('\n');
        }
        output
    }

    pub fn to_json_lines(&self) -> Vec<String> {
        self.diagnostics.iter().filter_map(|d| serde_json::to_string(d).ok()).collect()
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
        self.warning_count = 0;
    }
}

pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let len1 = s1.len();
    let len2 = s2.len();
    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }
    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }
    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if s1.chars().nth(i - 1) == s2.chars().nth(j - 1) { 0 } else { 1 };
            matrix[i][j] = std::cmp::min(std::cmp::min(matrix[i - 1][j] + 1, matrix[i][j - 1] + 1), matrix[i - 1][j - 1] + cost);
        }
    }
    matrix[len1][len2]
}

pub fn find_similar(target: &str, candidates: &[&str]) -> Option<String> {
    let mut best: Option<(String, usize)> = None;
    for candidate in candidates {
        let distance = levenshtein_distance(target, candidate);
        if distance < 3 && best.as_ref().map(|(_, d)| distance < *d).unwrap_or(true) {
            best = Some((candidate.to_string(), distance));
        }
    }
    best.map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_includes_location_and_help() {
        let diag = Diagnostic::error("type mismatch")
            .at(SourceLocation { file: "test.clarity".to_string(), line: 10, column: 5, length: 3 })
            .with_help("consider converting types")
            .with_code("E001");
        let output = diag.display(None);
        assert!(output.contains("error"));
        assert!(output.contains("test.clarity:10:5"));
        assert!(output.contains("help"));
    }

    #[test]
    fn levenshtein_matches_known_distances() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("test", "test"), 0);
    }

    #[test]
    fn find_similar_picks_closest_candidate() {
        let candidates = vec!["listLength", "listPush", "mapGet"];
        assert_eq!(find_similar("listLengt", &candidates), Some("listLength".to_string()));
        assert_eq!(find_similar("xyz", &candidates), None);
    }

    #[test]
    fn collector_tracks_error_and_warning_counts() {
        let mut c = DiagnosticCollector::new();
        c.add(Diagnostic::error("e1"));
        c.add(Diagnostic::warning("w1"));
        c.add(Diagnostic::error("e2"));
        assert_eq!(c.error_count(), 2);
        assert_eq!(c.warning_count(), 1);
        assert!(c.has_errors());
    }

    #[test]
    fn match_not_exhaustive_lists_missing_variants() {
        let loc = SourceLocation::unknown();
        let diag = DiagnosticBuilder::match_not_exhaustive(&["Some(_)".to_string(), "None".to_string()], loc);
        assert!(diag.message.contains("Some(_)"));
        assert_eq!(diag.code, Some("E010".to_string()));
    }

    #[test]
    fn effect_not_declared_names_missing_effects() {
        let loc = SourceLocation::unknown();
        let diag = DiagnosticBuilder::effect_not_declared(&["DB".to_string()], "save", loc);
        assert!(diag.message.contains("DB"));
        assert!(diag.message.contains("save"));
    }
}
