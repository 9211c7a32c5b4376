use crate::token::{InterpolatedStringToken, Position, Span, Token, TokenKind, KEYWORDS};

/// UTF-8 source in, a finite token sequence out. Identifiers are
/// ASCII-only; the lexer still walks the source as `char`s so non-ASCII
/// bytes inside string literals round-trip correctly.
#[derive(Clone)]
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    read_position: usize,
    ch: char,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let mut lexer = Lexer {
            input: input.chars().collect(),
            position: 0,
            read_position: 0,
            ch: '\0',
            line: 1,
            col: 0,
        };
        lexer.read_char();
        lexer
    }

    fn read_char(&mut self) {
        self.ch = if self.read_position >= self.input.len() {
            '\0'
        } else {
            self.input[self.read_position]
        };
        self.position = self.read_position;
        self.read_position += 1;
        if self.ch == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
    }

    fn peek(&self) -> char {
        if self.read_position >= self.input.len() {
            '\0'
        } else {
            self.input[self.read_position]
        }
    }

    fn pos(&self) -> Position {
        Position::new(self.position, self.line, self.col)
    }

    fn skip_trivia(&mut self) {
        loop {
            if self.ch.is_whitespace() {
                self.read_char();
            } else if self.ch == '/' && self.peek() == '/' {
                while self.ch != '\n' && self.ch != '\0' {
                    self.read_char();
                }
            } else {
                break;
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();
        let start = self.pos();

        macro_rules! tok1 {
            ($kind:expr, $lexeme:expr) => {{
                self.read_char();
                Token::new($kind, $lexeme.to_string(), Span::new(start, self.pos()))
            }};
        }
        macro_rules! tok2 {
            ($kind:expr, $lexeme:expr) => {{
                self.read_char();
                self.read_char();
                Token::new($kind, $lexeme.to_string(), Span::new(start, self.pos()))
            }};
        }

        match self.ch {
            '\0' => Token::new(TokenKind::Eof, String::new(), Span::new(start, start)),
            '+' => {
                if self.peek() == '+' {
                    tok2!(TokenKind::PlusPlus, "++")
                } else {
                    tok1!(TokenKind::Plus, "+")
                }
            }
            '-' => {
                if self.peek() == '>' {
                    tok2!(TokenKind::Arrow, "->")
                } else {
                    tok1!(TokenKind::Minus, "-")
                }
            }
            '*' => tok1!(TokenKind::Star, "*"),
            '/' => tok1!(TokenKind::Slash, "/"),
            '%' => tok1!(TokenKind::Percent, "%"),
            '=' => {
                if self.peek() == '=' {
                    tok2!(TokenKind::EqEq, "==")
                } else {
                    tok1!(TokenKind::Assign, "=")
                }
            }
            '!' => {
                if self.peek() == '=' {
                    tok2!(TokenKind::NotEq, "!=")
                } else {
                    tok1!(TokenKind::Bang, "!")
                }
            }
            '<' => {
                if self.peek() == '=' {
                    tok2!(TokenKind::LtEq, "<=")
                } else {
                    tok1!(TokenKind::Lt, "<")
                }
            }
            '>' => {
                if self.peek() == '=' {
                    tok2!(TokenKind::GtEq, ">=")
                } else {
                    tok1!(TokenKind::Gt, ">")
                }
            }
            '|' => tok1!(TokenKind::Pipe, "|"),
            '.' => {
                if self.peek() == '.' {
                    tok2!(TokenKind::DotDot, "..")
                } else {
                    tok1!(TokenKind::Dot, ".")
                }
            }
            ',' => tok1!(TokenKind::Comma, ","),
            ';' => tok1!(TokenKind::Semicolon, ";"),
            ':' => tok1!(TokenKind::Colon, ":"),
            '(' => tok1!(TokenKind::LParen, "("),
            ')' => tok1!(TokenKind::RParen, ")"),
            '[' => tok1!(TokenKind::LBracket, "["),
            ']' => tok1!(TokenKind::RBracket, "]"),
            '{' => tok1!(TokenKind::LBrace, "{"),
            '}' => tok1!(TokenKind::RBrace, "}"),
            '"' => self.read_string(start),
            _ => {
                if self.ch.is_ascii_alphabetic() || self.ch == '_' {
                    self.read_identifier(start)
                } else if self.ch.is_ascii_digit() {
                    self.read_number(start)
                } else {
                    let ch = self.ch;
                    self.read_char();
                    Token::new(TokenKind::Illegal(ch), ch.to_string(), Span::new(start, self.pos()))
                }
            }
        }
    }

    fn read_identifier(&mut self, start: Position) -> Token {
        let start_pos = self.position;
        while self.ch.is_ascii_alphanumeric() || self.ch == '_' {
            self.read_char();
        }
        let literal: String = self.input[start_pos..self.position].iter().collect();
        if literal == "_" {
            return Token::new(TokenKind::Underscore, literal, Span::new(start, self.pos()));
        }
        let kind = KEYWORDS.get(literal.as_str()).cloned().unwrap_or(TokenKind::Identifier);
        Token::new(kind, literal, Span::new(start, self.pos()))
    }

    fn read_number(&mut self, start: Position) -> Token {
        let start_pos = self.position;
        while self.ch.is_ascii_digit() {
            self.read_char();
        }
        let mut is_float = false;
        if self.ch == '.' && self.peek().is_ascii_digit() {
            is_float = true;
            self.read_char();
            while self.ch.is_ascii_digit() {
                self.read_char();
            }
        }
        let literal: String = self.input[start_pos..self.position].iter().collect();
        let span = Span::new(start, self.pos());
        if is_float {
            Token::new(TokenKind::Float(literal.clone()), literal, span)
        } else {
            let value = literal.parse().unwrap_or(0);
            Token::new(TokenKind::Integer(value), literal, span)
        }
    }

    /// Reads a `"..."` literal. If it contains `${...}`, emits an
    /// `InterpolatedString` token instead of a plain string, per §4.1.
    fn read_string(&mut self, start: Position) -> Token {
        let start_pos = self.position;
        self.read_char(); // consume opening quote

        let mut parts = vec![String::new()];
        let mut expr_sources = Vec::new();
        let mut expr_offsets = Vec::new();
        let mut plain = String::new();

        loop {
            match self.ch {
                '"' | '\0' => break,
                '\\' => {
                    self.read_char();
                    let c = match self.ch {
                        'n' => '\n',
                        't' => '\t',
                        '\\' => '\\',
                        '"' => '"',
                        other => other,
                    };
                    plain.push(c);
                    parts.last_mut().unwrap().push(c);
                    self.read_char();
                }
                '$' if self.peek() == '{' => {
                    self.read_char(); // $
                    self.read_char(); // {
                    let expr_start = self.position;
                    let mut depth = 1;
                    while depth > 0 && self.ch != '\0' {
                        match self.ch {
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                        self.read_char();
                    }
                    let expr_src: String = self.input[expr_start..self.position].iter().collect();
                    expr_offsets.push(expr_start);
                    expr_sources.push(expr_src);
                    self.read_char(); // consume closing }
                    parts.push(String::new());
                }
                c => {
                    plain.push(c);
                    parts.last_mut().unwrap().push(c);
                    self.read_char();
                }
            }
        }
        self.read_char(); // consume closing quote
        let span = Span::new(start, self.pos());

        if expr_sources.is_empty() {
            Token::new(TokenKind::StringLiteral(plain), String::new(), span)
        } else {
            let lexeme: String = self.input[start_pos..self.position].iter().collect();
            Token::new(
                TokenKind::InterpolatedString(InterpolatedStringToken { parts, expr_sources, expr_offsets }),
                lexeme,
                span,
            )
        }
    }

    pub fn collect_tokens(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).collect_tokens().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_module_header() {
        let k = kinds("module M");
        assert_eq!(k[0], TokenKind::Module);
        assert_eq!(k[1], TokenKind::Identifier);
        assert_eq!(k[2], TokenKind::Eof);
    }

    #[test]
    fn lexes_integer_and_float() {
        let k = kinds("42 3.5");
        assert_eq!(k[0], TokenKind::Integer(42));
        assert_eq!(k[1], TokenKind::Float("3.5".to_string()));
    }

    #[test]
    fn lexes_range_pattern_operator() {
        let k = kinds("1..10");
        assert_eq!(k[0], TokenKind::Integer(1));
        assert_eq!(k[1], TokenKind::DotDot);
        assert_eq!(k[2], TokenKind::Integer(10));
    }

    #[test]
    fn string_escapes() {
        let k = kinds(r#""a\nb\tc\\d\"e""#);
        match &k[0] {
            TokenKind::StringLiteral(s) => assert_eq!(s, "a\nb\tc\\d\"e"),
            other => panic!("expected string literal, got {other:?}"),
        }
    }

    #[test]
    fn interpolated_string_splits_into_parts() {
        let k = kinds(r#""hi ${name}, you are ${age}""#);
        match &k[0] {
            TokenKind::InterpolatedString(tok) => {
                assert_eq!(tok.parts, vec!["hi ".to_string(), ", you are ".to_string(), "".to_string()]);
                assert_eq!(tok.expr_sources, vec!["name".to_string(), "age".to_string()]);
            }
            other => panic!("expected interpolated string, got {other:?}"),
        }
    }

    #[test]
    fn comments_are_skipped() {
        let k = kinds("1 // this is a comment\n2");
        assert_eq!(k[0], TokenKind::Integer(1));
        assert_eq!(k[1], TokenKind::Integer(2));
    }

    #[test]
    fn underscore_is_its_own_kind() {
        let k = kinds("_ foo_bar _baz");
        assert_eq!(k[0], TokenKind::Underscore);
        assert_eq!(k[1], TokenKind::Identifier);
        assert_eq!(k[2], TokenKind::Identifier);
    }

    #[test]
    fn keywords_win_over_identifiers() {
        let k = kinds("match effect True False and or");
        assert_eq!(k, vec![
            TokenKind::Match, TokenKind::Effect, TokenKind::True,
            TokenKind::False, TokenKind::And, TokenKind::Or,
        ]);
    }

    #[test]
    fn migration_trigger_words_lex_as_plain_identifiers() {
        let k = kinds("class interface return null");
        assert_eq!(k, vec![TokenKind::Identifier; 4]);
    }
}
