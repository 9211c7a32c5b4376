use std::collections::HashMap;

/// A `{ offset, line, col }` position (GLOSSARY "Span").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, col: usize) -> Self {
        Position { offset, line, col }
    }
}

/// A source-range attached to every token, AST node, and diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }

    /// Re-expresses a span computed over an interpolated-expression slice in
    /// terms of the outer source string it was carved out of (§4.2
    /// interpolation desugaring runs a sub-lexer/sub-parser over each slice).
    pub fn shift(mut self, offset: usize) -> Self {
        self.start.offset += offset;
        self.end.offset += offset;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String, span: Span) -> Self {
        Token { kind, lexeme, span }
    }
}

/// A string literal containing `${expr}` desugars to this instead of
/// `TokenKind::StringLiteral`. `parts.len() == expr_sources.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedStringToken {
    pub parts: Vec<String>,
    pub expr_sources: Vec<String>,
    pub expr_offsets: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords (§4.1)
    Module,
    Function,
    Type,
    Const,
    Let,
    Mut,
    Match,
    Effect,
    Import,
    Export,
    From,
    If,
    True,
    False,
    And,
    Or,

    // Identifiers & literals
    Identifier,
    Integer(i64),
    Float(String),
    StringLiteral(String),
    InterpolatedString(InterpolatedStringToken),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Bang,
    Assign,
    Arrow,
    Pipe,
    Dot,
    DotDot,
    Comma,
    Semicolon,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Underscore,

    Eof,
    Illegal(char),
}

lazy_static::lazy_static! {
    pub static ref KEYWORDS: HashMap<&'static str, TokenKind> = {
        let mut map = HashMap::new();
        map.insert("module", TokenKind::Module);
        map.insert("function", TokenKind::Function);
        map.insert("type", TokenKind::Type);
        map.insert("const", TokenKind::Const);
        map.insert("let", TokenKind::Let);
        map.insert("mut", TokenKind::Mut);
        map.insert("match", TokenKind::Match);
        map.insert("effect", TokenKind::Effect);
        map.insert("import", TokenKind::Import);
        map.insert("export", TokenKind::Export);
        map.insert("from", TokenKind::From);
        map.insert("if", TokenKind::If);
        map.insert("True", TokenKind::True);
        map.insert("False", TokenKind::False);
        map.insert("and", TokenKind::And);
        map.insert("or", TokenKind::Or);
        map
    };
}

/// Identifiers spelled like these trigger the LLM-migration diagnostic
/// (§4.2) in declaration/expression position. `if` is lexed as a real
/// keyword rather than landing here, but the parser treats it identically:
/// Clarity has no if-statement/if-expression grammar, only `match`.
pub const MIGRATION_TRIGGER_WORDS: &[&str] = &[
    "else", "while", "for", "class", "interface", "return", "null", "nil",
    "undefined", "try", "catch", "throw", "var",
];

pub fn migration_hint(word: &str) -> Option<&'static str> {
    match word {
        "if" | "else" => Some("use `match` for conditional logic: `match cond { True -> ..., False -> ... }`"),
        "while" | "for" => Some("Clarity has no loops; express iteration with a self-tail-recursive function"),
        "class" | "interface" => Some("use `type Name = { field: Type }` for records or `type Name = | A | B` for unions"),
        "return" => Some("functions return their trailing block expression; there is no `return` statement"),
        "null" | "nil" | "undefined" => Some("use `Option<T>` with `Some(v)` / `None` instead of a null value"),
        "try" | "catch" | "throw" => Some("use `Result<T, E>` with `Ok(v)` / `Err(e)` instead of exceptions"),
        "var" => Some("use `let` (immutable) or `let mut` (mutable) instead of `var`"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_table_covers_the_closed_set() {
        for kw in ["module", "function", "type", "const", "let", "mut", "match",
                   "effect", "import", "export", "from", "if", "True", "False", "and", "or"] {
            assert!(KEYWORDS.contains_key(kw), "missing keyword {kw}");
        }
        assert!(!KEYWORDS.contains_key("else"));
    }

    #[test]
    fn migration_hint_covers_trigger_words() {
        for word in MIGRATION_TRIGGER_WORDS {
            assert!(migration_hint(word).is_some(), "no hint for {word}");
        }
        assert!(migration_hint("if").is_some());
        assert!(migration_hint("foo").is_none());
    }
}
