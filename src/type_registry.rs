// The built-in function catalog and the closed effect catalog (§6.4, C4).
// Consulted by the checker for name resolution and by `clarityc introspect`
// for JSON dumps, so every entry's shape is `serde`-serializable as-is.

use crate::types::Type;
use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct BuiltinEntry {
    pub name: String,
    #[serde(serialize_with = "serialize_types")]
    pub params: Vec<Type>,
    pub param_names: Vec<String>,
    #[serde(serialize_with = "serialize_type")]
    pub return_type: Type,
    pub effects: Vec<String>,
    pub doc: String,
    pub category: String,
}

fn serialize_type<S>(ty: &Type, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&ty.to_string())
}

fn serialize_types<S>(tys: &[Type], s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;
    let mut seq = s.serialize_seq(Some(tys.len()))?;
    for t in tys {
        seq.serialize_element(&t.to_string())?;
    }
    seq.end()
}

fn entry(
    name: &str,
    params: Vec<(&str, Type)>,
    return_type: Type,
    effects: &[&str],
    doc: &str,
    category: &str,
) -> BuiltinEntry {
    BuiltinEntry {
        name: name.to_string(),
        param_names: params.iter().map(|(n, _)| n.to_string()).collect(),
        params: params.into_iter().map(|(_, t)| t).collect(),
        return_type,
        effects: effects.iter().map(|e| e.to_string()).collect(),
        doc: doc.to_string(),
        category: category.to_string(),
    }
}

lazy_static! {
    pub static ref BUILTINS: Vec<BuiltinEntry> = vec![
        // Math (§4.5 runtime::math)
        entry("abs", vec![("n", Type::Int64)], Type::Int64, &[], "Absolute value of an integer.", "math"),
        entry("min", vec![("a", Type::Int64), ("b", Type::Int64)], Type::Int64, &[], "Smaller of two integers.", "math"),
        entry("max", vec![("a", Type::Int64), ("b", Type::Int64)], Type::Int64, &[], "Larger of two integers.", "math"),
        entry("sqrt", vec![("n", Type::Float64)], Type::Float64, &[], "Square root.", "math"),
        entry("floor", vec![("n", Type::Float64)], Type::Float64, &[], "Round toward negative infinity.", "math"),
        entry("ceil", vec![("n", Type::Float64)], Type::Float64, &[], "Round toward positive infinity.", "math"),
        entry("pow", vec![("base", Type::Float64), ("exponent", Type::Float64)], Type::Float64, &[], "Raises base to exponent.", "math"),
        entry("floatRem", vec![("a", Type::Float64), ("b", Type::Float64)], Type::Float64, &[], "Floating-point remainder (wasm has no f64.rem).", "math"),

        // Conversions
        entry("intToFloat", vec![("n", Type::Int64)], Type::Float64, &[], "Widen an Int64 to Float64.", "conversions"),
        entry("floatToInt", vec![("n", Type::Float64)], Type::Int64, &[], "Truncate a Float64 toward zero.", "conversions"),
        entry("intToString", vec![("n", Type::Int64)], Type::String, &[], "Render an Int64 in base 10.", "conversions"),
        entry("floatToString", vec![("n", Type::Float64)], Type::String, &[], "Render a Float64.", "conversions"),
        entry("stringToInt", vec![("s", Type::String)], Type::Option(Box::new(Type::Int64)), &[], "Parse an Int64, None on failure.", "conversions"),
        entry("stringToFloat", vec![("s", Type::String)], Type::Option(Box::new(Type::Float64)), &[], "Parse a Float64, None on failure.", "conversions"),

        // Strings
        entry("stringLength", vec![("s", Type::String)], Type::Int64, &[], "UTF-8 byte length.", "strings"),
        entry("stringConcat", vec![("a", Type::String), ("b", Type::String)], Type::String, &[], "Concatenate two strings.", "strings"),
        entry("stringSlice", vec![("s", Type::String), ("start", Type::Int64), ("end", Type::Int64)], Type::String, &[], "Byte-range substring.", "strings"),
        entry("charAt", vec![("s", Type::String), ("i", Type::Int64)], Type::String, &[], "Single-character substring at a byte index, empty string if out of range.", "strings"),
        entry("contains", vec![("s", Type::String), ("needle", Type::String)], Type::Bool, &[], "Whether needle occurs anywhere in s.", "strings"),
        entry("indexOf", vec![("s", Type::String), ("needle", Type::String)], Type::Int64, &[], "Byte offset of the first occurrence of needle, or -1.", "strings"),
        entry("trim", vec![("s", Type::String)], Type::String, &[], "Strips leading/trailing ASCII whitespace.", "strings"),
        entry("split", vec![("s", Type::String), ("sep", Type::String)], Type::List(Box::new(Type::String)), &[], "Splits s on every occurrence of sep.", "strings"),
        entry("charCode", vec![("s", Type::String)], Type::Int64, &[], "Unicode code point of the first character, or -1 if empty.", "strings"),
        entry("charFromCode", vec![("code", Type::Int64)], Type::String, &[], "Single-character string for a Unicode code point.", "strings"),

        // Lists (persistent, §5)
        entry("listLength", vec![("l", Type::List(Box::new(Type::Var(0))))], Type::Int64, &[], "Number of elements.", "lists"),
        entry("listPush", vec![("l", Type::List(Box::new(Type::Var(0)))), ("v", Type::Var(0))], Type::List(Box::new(Type::Var(0))), &[], "Persistent append; returns a new list.", "lists"),
        entry("listReverse", vec![("l", Type::List(Box::new(Type::Var(0))))], Type::List(Box::new(Type::Var(0))), &[], "Persistent reverse.", "lists"),
        entry("listGet", vec![("l", Type::List(Box::new(Type::Var(0)))), ("i", Type::Int64)], Type::Option(Box::new(Type::Var(0))), &[], "Bounds-checked index.", "lists"),
        entry("listHead", vec![("l", Type::List(Box::new(Type::Var(0))))], Type::Option(Box::new(Type::Var(0))), &[], "First element, None if empty.", "lists"),
        entry("listTail", vec![("l", Type::List(Box::new(Type::Var(0))))], Type::List(Box::new(Type::Var(0))), &[], "Every element but the first; empty stays empty.", "lists"),
        entry("listSet", vec![("l", Type::List(Box::new(Type::Var(0)))), ("i", Type::Int64), ("v", Type::Var(0))], Type::List(Box::new(Type::Var(0))), &[], "Persistent index assignment; out-of-range index leaves the list unchanged.", "lists"),
        entry("listConcat", vec![("a", Type::List(Box::new(Type::Var(0)))), ("b", Type::List(Box::new(Type::Var(0))))], Type::List(Box::new(Type::Var(0))), &[], "Persistent concatenation.", "lists"),

        // Maps (persistent, §5)
        entry("mapGet", vec![("m", Type::Map(Box::new(Type::Var(0)), Box::new(Type::Var(1)))), ("k", Type::Var(0))], Type::Option(Box::new(Type::Var(1))), &[], "Lookup by key.", "maps"),
        entry("mapInsert", vec![("m", Type::Map(Box::new(Type::Var(0)), Box::new(Type::Var(1)))), ("k", Type::Var(0)), ("v", Type::Var(1))], Type::Map(Box::new(Type::Var(0)), Box::new(Type::Var(1))), &[], "Persistent insert, returns a new map handle.", "maps"),
        entry("mapHas", vec![("m", Type::Map(Box::new(Type::Var(0)), Box::new(Type::Var(1)))), ("k", Type::Var(0))], Type::Bool, &[], "Whether a key is present.", "maps"),
        entry("mapRemove", vec![("m", Type::Map(Box::new(Type::Var(0)), Box::new(Type::Var(1)))), ("k", Type::Var(0))], Type::Map(Box::new(Type::Var(0)), Box::new(Type::Var(1))), &[], "Persistent removal, returns a new map handle.", "maps"),
        entry("mapKeys", vec![("m", Type::Map(Box::new(Type::Var(0)), Box::new(Type::Var(1))))], Type::List(Box::new(Type::Var(0))), &[], "All keys, insertion order.", "maps"),
        entry("mapValues", vec![("m", Type::Map(Box::new(Type::Var(0)), Box::new(Type::Var(1))))], Type::List(Box::new(Type::Var(1))), &[], "All values, insertion order.", "maps"),

        // Bytes / crypto / timestamp / JSON
        entry("bytesLength", vec![("b", Type::Bytes)], Type::Int64, &[], "Length in bytes.", "bytes"),
        entry("sha256", vec![("b", Type::Bytes)], Type::Bytes, &[], "SHA-256 digest.", "crypto"),
        entry("now", vec![], Type::Timestamp, &["Time"], "Current host time.", "timestamp"),
        entry("jsonStringify", vec![("s", Type::String)], Type::String, &[], "Serializes a string value to a JSON string.", "json"),

        // I/O, logging, randomness (effectful)
        entry("log", vec![("message", Type::String)], Type::Unit, &["Log"], "Writes an info-level line to the host log sink.", "io"),
        entry("logWarn", vec![("message", Type::String)], Type::Unit, &["Log"], "Writes a warn-level line to the host log sink.", "io"),
        entry("printString", vec![("s", Type::String)], Type::Unit, &["Log"], "Writes a string to stdout with no trailing newline.", "io"),
        entry("printInt", vec![("n", Type::Int64)], Type::Unit, &["Log"], "Writes an Int64's decimal form to stdout.", "io"),
        entry("printFloat", vec![("n", Type::Float64)], Type::Unit, &["Log"], "Writes a Float64's decimal form to stdout.", "io"),
        entry("readLine", vec![], Type::Option(Box::new(Type::String)), &["FileSystem"], "Reads a line from stdin, None at EOF.", "io"),
        entry("readAllStdin", vec![], Type::String, &["FileSystem"], "Reads stdin to EOF.", "io"),
        entry("readFile", vec![("path", Type::String)], Type::Option(Box::new(Type::String)), &["FileSystem"], "Reads a whole file, None if it can't be read.", "io"),
        entry("writeFile", vec![("path", Type::String), ("content", Type::String)], Type::Bool, &["FileSystem"], "Writes a whole file, returns whether it succeeded.", "io"),
        entry("argCount", vec![], Type::Int64, &[], "Number of CLI arguments passed to `run`.", "io"),
        entry("argAt", vec![("i", Type::Int64)], Type::Option(Box::new(Type::String)), &[], "CLI argument at index i, None if out of range.", "io"),
        entry("randomInt", vec![("low", Type::Int64), ("high", Type::Int64)], Type::Int64, &["Random"], "Random integer in [low, high).", "random"),

        // Assertions (Test effect, §4.6)
        entry("assertEqual", vec![("actual", Type::Var(0)), ("expected", Type::Var(0))], Type::Unit, &["Test"], "Records a failure if actual != expected.", "assertions"),
        entry("assertTrue", vec![("condition", Type::Bool)], Type::Unit, &["Test"], "Records a failure if condition is False.", "assertions"),
        entry("assertFalse", vec![("condition", Type::Bool)], Type::Unit, &["Test"], "Records a failure if condition is True.", "assertions"),
    ];

    pub static ref BUILTINS_BY_NAME: HashMap<String, &'static BuiltinEntry> = {
        let mut map = HashMap::new();
        for entry in BUILTINS.iter() {
            map.insert(entry.name.clone(), entry);
        }
        map
    };
}

pub fn lookup(name: &str) -> Option<&'static BuiltinEntry> {
    BUILTINS_BY_NAME.get(name).copied()
}

/// The closed effect catalog (§4.3.7). Kept separate from `crate::types::BUILTIN_EFFECTS`
/// so the registry can carry doc strings for `introspect --effects`.
#[derive(Debug, Clone, Serialize)]
pub struct EffectEntry {
    pub name: String,
    pub doc: String,
}

lazy_static! {
    pub static ref EFFECTS: Vec<EffectEntry> = vec![
        EffectEntry { name: "DB".into(), doc: "Persistent storage reads/writes.".into() },
        EffectEntry { name: "Network".into(), doc: "Outbound network calls.".into() },
        EffectEntry { name: "Time".into(), doc: "Reading the host clock.".into() },
        EffectEntry { name: "Random".into(), doc: "Non-deterministic randomness.".into() },
        EffectEntry { name: "Log".into(), doc: "Writing to the host log sink.".into() },
        EffectEntry { name: "FileSystem".into(), doc: "Stdio and file reads/writes.".into() },
        EffectEntry { name: "Test".into(), doc: "Test-only assertion bookkeeping.".into() },
    ];
}

pub fn is_known_effect(name: &str) -> bool {
    EFFECTS.iter().any(|e| e.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_name_is_unique_and_lookup_works() {
        let mut seen = std::collections::HashSet::new();
        for b in BUILTINS.iter() {
            assert!(seen.insert(&b.name), "duplicate builtin {}", b.name);
        }
        assert!(lookup("log").is_some());
        assert!(lookup("not_a_builtin").is_none());
    }

    #[test]
    fn effect_catalog_matches_types_module() {
        for e in crate::types::BUILTIN_EFFECTS {
            assert!(is_known_effect(e), "missing effect entry for {e}");
        }
    }
}
