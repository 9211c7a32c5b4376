// Error Help Text Database
// Expanded suggestions keyed by pattern name, consulted when a diagnostic's
// message matches a known shape but wasn't built with a canned `help` line.

use std::collections::HashMap;

pub struct ErrorHelp {
    suggestions: HashMap<String, ErrorHelpEntry>,
}

#[derive(Clone)]
pub struct ErrorHelpEntry {
    pub code: &'static str,
    pub title: &'static str,
    pub suggestion: &'static str,
    pub example: Option<&'static str>,
}

impl ErrorHelp {
    pub fn new() -> Self {
        let mut suggestions = HashMap::new();

        suggestions.insert(
            "unexpected_token".to_string(),
            ErrorHelpEntry {
                code: "E004",
                title: "Unexpected token",
                suggestion: "Check for a missing operator, brace, or separator near this position",
                example: None,
            },
        );

        suggestions.insert(
            "migration_if".to_string(),
            ErrorHelpEntry {
                code: "E005",
                title: "`if`/`else` aren't expressions in Clarity",
                suggestion: "Use `match` for conditional logic",
                example: Some("match cond {\n    True -> doA(),\n    False -> doB(),\n}"),
            },
        );

        suggestions.insert(
            "migration_loop".to_string(),
            ErrorHelpEntry {
                code: "E005",
                title: "Clarity has no loop constructs",
                suggestion: "Express iteration with a self-tail-recursive function",
                example: Some("function sum(n: Int64, acc: Int64) -> Int64 {\n    match n {\n        0 -> acc,\n        _ -> sum(n - 1, acc + n),\n    }\n}"),
            },
        );

        suggestions.insert(
            "migration_class".to_string(),
            ErrorHelpEntry {
                code: "E005",
                title: "Clarity has no classes or interfaces",
                suggestion: "Use a record type for data, a union type for variants",
                example: Some("type Point = { x: Int64, y: Int64 }\ntype Shape = | Circle(radius: Float64) | Square(side: Float64)"),
            },
        );

        suggestions.insert(
            "migration_return".to_string(),
            ErrorHelpEntry {
                code: "E005",
                title: "No `return` statement",
                suggestion: "A function's value is its trailing block expression",
                example: Some("function square(n: Int64) -> Int64 {\n    n * n\n}"),
            },
        );

        suggestions.insert(
            "migration_null".to_string(),
            ErrorHelpEntry {
                code: "E005",
                title: "No null, nil, or undefined",
                suggestion: "Use `Option<T>` with `Some(v)` / `None`",
                example: Some("function find(id: Int64) -> Option<String> {\n    match id {\n        1 -> Some(\"alice\"),\n        _ -> None,\n    }\n}"),
            },
        );

        suggestions.insert(
            "migration_exceptions".to_string(),
            ErrorHelpEntry {
                code: "E005",
                title: "No exceptions",
                suggestion: "Use `Result<T, E>` with `Ok(v)` / `Err(e)`",
                example: Some("function divide(a: Int64, b: Int64) -> Result<Int64, String> {\n    match b {\n        0 -> Err(\"division by zero\"),\n        _ -> Ok(a / b),\n    }\n}"),
            },
        );

        suggestions.insert(
            "type_mismatch".to_string(),
            ErrorHelpEntry {
                code: "E001",
                title: "Type mismatch",
                suggestion: "The value's type doesn't match what was expected; there is no implicit conversion",
                example: Some("let count: Int64 = 0       // correct\nlet ratio: Float64 = count // error: Int64 is not Float64"),
            },
        );

        suggestions.insert(
            "undefined_variable".to_string(),
            ErrorHelpEntry {
                code: "E002",
                title: "Undefined variable",
                suggestion: "The name hasn't been declared in any enclosing scope",
                example: Some("let count = 0\nlog(intToString(count))"),
            },
        );

        suggestions.insert(
            "effect_not_declared".to_string(),
            ErrorHelpEntry {
                code: "E007",
                title: "Missing declared effect",
                suggestion: "Add the callee's effect(s) to this function's own `effect { ... }` clause",
                example: Some("function save(x: Int64) effect { DB } {\n    writeToStore(x)\n}"),
            },
        );

        suggestions.insert(
            "match_not_exhaustive".to_string(),
            ErrorHelpEntry {
                code: "E010",
                title: "Non-exhaustive match",
                suggestion: "Cover every union variant (or Bool value) explicitly, or add a wildcard `_` arm",
                example: Some("match opt {\n    Some(v) -> v,\n    None -> 0,\n}"),
            },
        );

        suggestions.insert(
            "import_not_found".to_string(),
            ErrorHelpEntry {
                code: "E016",
                title: "Import not found",
                suggestion: "Check that the name is exported from the named module",
                example: Some("import helper from \"./util\""),
            },
        );

        ErrorHelp { suggestions }
    }

    pub fn get_help(&self, pattern: &str) -> Option<&ErrorHelpEntry> {
        self.suggestions.get(pattern)
    }

    pub fn suggest_from_message(&self, message: &str) -> Option<&ErrorHelpEntry> {
        let lower = message.to_lowercase();

        if lower.contains("not part of clarity's grammar") {
            if lower.contains("if") || lower.contains("else") {
                return self.get_help("migration_if");
            }
            if lower.contains("while") || lower.contains("for") {
                return self.get_help("migration_loop");
            }
            if lower.contains("class") || lower.contains("interface") {
                return self.get_help("migration_class");
            }
            if lower.contains("return") {
                return self.get_help("migration_return");
            }
            if lower.contains("null") || lower.contains("nil") || lower.contains("undefined") {
                return self.get_help("migration_null");
            }
            if lower.contains("try") || lower.contains("catch") || lower.contains("throw") {
                return self.get_help("migration_exceptions");
            }
        }
        if lower.contains("type mismatch") {
            return self.get_help("type_mismatch");
        }
        if lower.contains("undefined") {
            return self.get_help("undefined_variable");
        }
        if lower.contains("effect") && lower.contains("declared") {
            return self.get_help("effect_not_declared");
        }
        if lower.contains("not exhaustive") {
            return self.get_help("match_not_exhaustive");
        }
        if lower.contains("cannot find") && lower.contains("module") {
            return self.get_help("import_not_found");
        }
        if lower.contains("unexpected") {
            return self.get_help("unexpected_token");
        }
        None
    }

    pub fn format_help(&self, entry: &ErrorHelpEntry) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{} [{}]\n", entry.title, entry.code));
        output.push_str(&format!("   {}\n", entry.suggestion));
        if let Some(example) = entry.example {
            output.push_str("\nexample:\n");
            for line in example.lines() {
                output.push_str(&format!("   {}\n", line));
            }
        }
        output
    }
}

impl Default for ErrorHelp {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_help_returns_expected_code() {
        let help = ErrorHelp::new();
        let entry = help.get_help("migration_if");
        assert!(entry.is_some());
        assert_eq!(entry.unwrap().code, "E005");
    }

    #[test]
    fn suggest_from_message_routes_migration_diagnostics() {
        let help = ErrorHelp::new();
        let entry = help.suggest_from_message("`if` is not part of Clarity's grammar");
        assert!(entry.is_some());
        assert_eq!(entry.unwrap().code, "E005");
    }

    #[test]
    fn suggest_from_message_routes_exhaustiveness() {
        let help = ErrorHelp::new();
        let entry = help.suggest_from_message("match is not exhaustive; missing: `None`");
        assert_eq!(entry.unwrap().code, "E010");
    }

    #[test]
    fn format_help_includes_code_and_example() {
        let help = ErrorHelp::new();
        let entry = help.get_help("migration_if").unwrap();
        let formatted = help.format_help(entry);
        assert!(formatted.contains("E005"));
        assert!(formatted.contains("example"));
    }
}
