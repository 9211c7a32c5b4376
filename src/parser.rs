use crate::ast::*;
use crate::errors::CompileError;
use crate::lexer::Lexer;
use crate::token::{migration_hint, Span, Token, TokenKind, MIGRATION_TRIGGER_WORDS};
use std::collections::HashMap;

/// §4.2 operator precedence table, lowest to highest.
#[derive(PartialEq, PartialOrd, Clone, Copy, Debug)]
enum Precedence {
    Lowest,
    Or,          // or
    And,         // and
    Equals,      // == !=
    LessGreater, // < > <= >=
    Sum,         // + - ++
    Product,     // * / %
    Unary,       // unary - !
}

lazy_static::lazy_static! {
    static ref PRECEDENCES: HashMap<TokenKind, Precedence> = {
        let mut m = HashMap::new();
        m.insert(TokenKind::Or, Precedence::Or);
        m.insert(TokenKind::And, Precedence::And);
        m.insert(TokenKind::EqEq, Precedence::Equals);
        m.insert(TokenKind::NotEq, Precedence::Equals);
        m.insert(TokenKind::Lt, Precedence::LessGreater);
        m.insert(TokenKind::Gt, Precedence::LessGreater);
        m.insert(TokenKind::LtEq, Precedence::LessGreater);
        m.insert(TokenKind::GtEq, Precedence::LessGreater);
        m.insert(TokenKind::Plus, Precedence::Sum);
        m.insert(TokenKind::Minus, Precedence::Sum);
        m.insert(TokenKind::PlusPlus, Precedence::Sum);
        m.insert(TokenKind::Star, Precedence::Product);
        m.insert(TokenKind::Slash, Precedence::Product);
        m.insert(TokenKind::Percent, Precedence::Product);
        m
    };
}

/// Tokens the statement/declaration synchronizer stops at after a parse
/// error (§4.2 error recovery).
const SYNC_TOKENS: &[TokenKind] = &[
    TokenKind::Function, TokenKind::Type, TokenKind::Const, TokenKind::Effect,
    TokenKind::RBrace, TokenKind::Semicolon,
];

pub struct Parser<'a> {
    lexer: &'a mut Lexer,
    current: Token,
    peek: Token,
    pub errors: Vec<CompileError>,
}

impl<'a> Parser<'a> {
    pub fn new(lexer: &'a mut Lexer) -> Self {
        let current = lexer.next_token();
        let peek = lexer.next_token();
        Parser { lexer, current, peek, errors: Vec::new() }
    }

    fn bump(&mut self) {
        self.current = std::mem::replace(&mut self.peek, self.lexer.next_token());
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn peek_at(&self, kind: &TokenKind) -> bool {
        &self.peek.kind == kind
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, CompileError> {
        if self.current.kind == kind {
            let tok = self.current.clone();
            self.bump();
            Ok(tok)
        } else {
            Err(self.error_here(format!("expected {}, found `{}`", what, self.current.lexeme)))
        }
    }

    fn error_here(&self, message: String) -> CompileError {
        CompileError::ParserError { message, span: self.current.span }
    }

    /// Records a parse error and synchronizes to the next recognizable
    /// declaration/statement boundary so the rest of the file still parses.
    fn recover(&mut self, err: CompileError) {
        self.errors.push(err);
        while !self.at(&TokenKind::Eof) && !SYNC_TOKENS.contains(&self.current.kind) {
            self.bump();
        }
        if self.at(&TokenKind::Semicolon) || self.at(&TokenKind::RBrace) {
            self.bump();
        }
    }

    fn check_migration_trigger(&mut self) -> Option<CompileError> {
        if self.current.kind == TokenKind::If {
            let hint = migration_hint("if").unwrap();
            return Some(CompileError::ParserError {
                message: format!("`if` is not part of Clarity's grammar. {}", hint),
                span: self.current.span,
            });
        }
        if self.current.kind == TokenKind::Identifier && MIGRATION_TRIGGER_WORDS.contains(&self.current.lexeme.as_str()) {
            if let Some(hint) = migration_hint(&self.current.lexeme) {
                return Some(CompileError::ParserError {
                    message: format!("`{}` is not part of Clarity's grammar. {}", self.current.lexeme, hint),
                    span: self.current.span,
                });
            }
        }
        None
    }

    pub fn parse_module(&mut self) -> Result<Module, Vec<CompileError>> {
        let start = self.current.span;
        self.expect(TokenKind::Module, "`module`").map_err(|e| vec![e])?;
        let name_tok = match self.expect(TokenKind::Identifier, "a module name") {
            Ok(t) => t,
            Err(e) => return Err(vec![e]),
        };
        let name = Identifier::new(name_tok.lexeme);

        let mut declarations = Vec::new();
        while !self.at(&TokenKind::Eof) {
            if let Some(err) = self.check_migration_trigger() {
                self.recover(err.clone());
                self.errors.pop();
                self.errors.push(err);
                continue;
            }
            match self.parse_declaration() {
                Ok(decl) => declarations.push(decl),
                Err(err) => self.recover(err),
            }
        }
        let _ = start;

        if self.errors.is_empty() {
            Ok(Module { name, declarations })
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn parse_declaration(&mut self) -> Result<Declaration, CompileError> {
        let exported = if self.at(&TokenKind::Export) {
            self.bump();
            true
        } else {
            false
        };

        match self.current.kind {
            TokenKind::Import => self.parse_import().map(Declaration::Import),
            TokenKind::Type => self.parse_type_decl(exported).map(Declaration::Type),
            TokenKind::Function => self.parse_function(exported).map(Declaration::Function),
            TokenKind::Const => self.parse_const(exported).map(Declaration::Const),
            _ => Err(self.error_here(format!(
                "expected `import`, `type`, `function`, or `const`, found `{}`",
                self.current.lexeme
            ))),
        }
    }

    fn parse_import(&mut self) -> Result<ImportDeclaration, CompileError> {
        let start = self.current.span;
        self.expect(TokenKind::Import, "`import`")?;
        let mut names = vec![Identifier::new(self.expect(TokenKind::Identifier, "an imported name")?.lexeme)];
        while self.at(&TokenKind::Comma) {
            self.bump();
            names.push(Identifier::new(self.expect(TokenKind::Identifier, "an imported name")?.lexeme));
        }
        self.expect(TokenKind::From, "`from`")?;
        let from_tok = self.expect_string_literal()?;
        let span = Span::new(start.start, self.current.span.start);
        Ok(ImportDeclaration { names, from: from_tok, span })
    }

    fn expect_string_literal(&mut self) -> Result<String, CompileError> {
        match self.current.kind.clone() {
            TokenKind::StringLiteral(s) => {
                self.bump();
                Ok(s)
            }
            _ => Err(self.error_here(format!("expected a string literal, found `{}`", self.current.lexeme))),
        }
    }

    fn parse_type_params(&mut self) -> Result<Vec<Identifier>, CompileError> {
        let mut params = Vec::new();
        if self.at(&TokenKind::Lt) {
            self.bump();
            params.push(Identifier::new(self.expect(TokenKind::Identifier, "a type parameter")?.lexeme));
            while self.at(&TokenKind::Comma) {
                self.bump();
                params.push(Identifier::new(self.expect(TokenKind::Identifier, "a type parameter")?.lexeme));
            }
            self.expect(TokenKind::Gt, "`>`")?;
        }
        Ok(params)
    }

    fn parse_type_decl(&mut self, exported: bool) -> Result<TypeDeclaration, CompileError> {
        let start = self.current.span;
        self.expect(TokenKind::Type, "`type`")?;
        let name = Identifier::new(self.expect(TokenKind::Identifier, "a type name")?.lexeme);
        let type_params = self.parse_type_params()?;
        self.expect(TokenKind::Assign, "`=`")?;

        let body = if self.at(&TokenKind::Pipe) {
            self.parse_union_body()?
        } else if self.at(&TokenKind::LBrace) {
            self.parse_record_body()?
        } else {
            TypeBody::Alias(self.parse_type_expr()?)
        };
        let span = Span::new(start.start, self.current.span.start);
        Ok(TypeDeclaration { name, type_params, body, exported, span })
    }

    fn parse_record_body(&mut self) -> Result<TypeBody, CompileError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut fields = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            let fname = Identifier::new(self.expect(TokenKind::Identifier, "a field name")?.lexeme);
            self.expect(TokenKind::Colon, "`:`")?;
            let ty = self.parse_type_expr()?;
            fields.push(FieldDecl { name: fname, ty });
            if self.at(&TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(TypeBody::Record(fields))
    }

    fn parse_union_body(&mut self) -> Result<TypeBody, CompileError> {
        let mut variants = Vec::new();
        while self.at(&TokenKind::Pipe) {
            self.bump();
            let vname = Identifier::new(self.expect(TokenKind::Identifier, "a variant name")?.lexeme);
            let fields = if self.at(&TokenKind::LParen) {
                self.bump();
                let mut fs = Vec::new();
                while !self.at(&TokenKind::RParen) {
                    let fname = Identifier::new(self.expect(TokenKind::Identifier, "a field name")?.lexeme);
                    self.expect(TokenKind::Colon, "`:`")?;
                    let ty = self.parse_type_expr()?;
                    fs.push(FieldDecl { name: fname, ty });
                    if self.at(&TokenKind::Comma) {
                        self.bump();
                    } else {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "`)`")?;
                fs
            } else {
                Vec::new()
            };
            variants.push(VariantDecl { name: vname, fields });
        }
        Ok(TypeBody::Union(variants))
    }

    fn parse_type_expr(&mut self) -> Result<TypeExpr, CompileError> {
        if self.at(&TokenKind::LParen) {
            self.bump();
            let mut params = Vec::new();
            while !self.at(&TokenKind::RParen) {
                params.push(self.parse_type_expr()?);
                if self.at(&TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "`)`")?;
            self.expect(TokenKind::Arrow, "`->`")?;
            let ret = self.parse_type_expr()?;
            return Ok(TypeExpr::Function(params, Box::new(ret)));
        }

        let name = Identifier::new(self.expect(TokenKind::Identifier, "a type name")?.lexeme);
        if self.at(&TokenKind::Lt) {
            self.bump();
            let mut args = vec![self.parse_type_expr()?];
            while self.at(&TokenKind::Comma) {
                self.bump();
                args.push(self.parse_type_expr()?);
            }
            self.expect(TokenKind::Gt, "`>`")?;
            Ok(TypeExpr::Generic(name, args))
        } else {
            Ok(TypeExpr::Named(name))
        }
    }

    fn parse_function(&mut self, exported: bool) -> Result<FunctionDeclaration, CompileError> {
        let start = self.current.span;
        self.expect(TokenKind::Function, "`function`")?;
        let name = Identifier::new(self.expect(TokenKind::Identifier, "a function name")?.lexeme);
        let type_params = self.parse_type_params()?;

        self.expect(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        while !self.at(&TokenKind::RParen) {
            let pname = Identifier::new(self.expect(TokenKind::Identifier, "a parameter name")?.lexeme);
            self.expect(TokenKind::Colon, "`:`")?;
            let ty = self.parse_type_expr()?;
            params.push(Param { name: pname, ty });
            if self.at(&TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        self.expect(TokenKind::Arrow, "`->`")?;
        let return_type = self.parse_type_expr()?;

        let mut effects = Vec::new();
        if self.at(&TokenKind::Effect) {
            self.bump();
            self.expect(TokenKind::LBrace, "`{`")?;
            while !self.at(&TokenKind::RBrace) {
                effects.push(Identifier::new(self.expect(TokenKind::Identifier, "an effect name")?.lexeme));
                if self.at(&TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RBrace, "`}`")?;
        }

        let body = self.parse_block()?;
        let span = Span::new(start.start, self.current.span.start);
        Ok(FunctionDeclaration { name, type_params, params, return_type, effects, body, exported, span })
    }

    fn parse_const(&mut self, exported: bool) -> Result<ConstDeclaration, CompileError> {
        let start = self.current.span;
        self.expect(TokenKind::Const, "`const`")?;
        let name = Identifier::new(self.expect(TokenKind::Identifier, "a const name")?.lexeme);
        let ty = if self.at(&TokenKind::Colon) {
            self.bump();
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Assign, "`=`")?;
        let value = self.parse_expr(Precedence::Lowest)?;
        let span = Span::new(start.start, self.current.span.start);
        Ok(ConstDeclaration { name, ty, value, exported, span })
    }

    fn parse_block(&mut self) -> Result<Block, CompileError> {
        let start = self.current.span;
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut statements = Vec::new();
        let mut result = None;

        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            if let Some(err) = self.check_migration_trigger() {
                return Err(err);
            }
            if self.at(&TokenKind::Let) {
                statements.push(Stmt::Let(self.parse_let_stmt()?));
            } else if self.at(&TokenKind::Identifier) && self.peek_at(&TokenKind::Assign) {
                statements.push(Stmt::Assign(self.parse_assign_stmt()?));
            } else {
                let expr = self.parse_expr(Precedence::Lowest)?;
                if self.at(&TokenKind::Semicolon) {
                    self.bump();
                    statements.push(Stmt::Expr(expr));
                } else {
                    result = Some(Box::new(expr));
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        let span = Span::new(start.start, self.current.span.start);
        Ok(Block { statements, result, span })
    }

    fn parse_let_stmt(&mut self) -> Result<LetStmt, CompileError> {
        let start = self.current.span;
        self.expect(TokenKind::Let, "`let`")?;
        let mutable = if self.at(&TokenKind::Mut) {
            self.bump();
            true
        } else {
            false
        };
        let name = Identifier::new(self.expect(TokenKind::Identifier, "a binding name")?.lexeme);
        let ty = if self.at(&TokenKind::Colon) {
            self.bump();
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Assign, "`=`")?;
        let value = self.parse_expr(Precedence::Lowest)?;
        if self.at(&TokenKind::Semicolon) {
            self.bump();
        }
        let span = Span::new(start.start, self.current.span.start);
        Ok(LetStmt { name, mutable, ty, value, span })
    }

    fn parse_assign_stmt(&mut self) -> Result<AssignStmt, CompileError> {
        let start = self.current.span;
        let target = Identifier::new(self.expect(TokenKind::Identifier, "an assignment target")?.lexeme);
        self.expect(TokenKind::Assign, "`=`")?;
        let value = self.parse_expr(Precedence::Lowest)?;
        if self.at(&TokenKind::Semicolon) {
            self.bump();
        }
        let span = Span::new(start.start, self.current.span.start);
        Ok(AssignStmt { target, value, span })
    }

    fn peek_precedence(&self) -> Precedence {
        PRECEDENCES.get(&self.peek.kind).copied().unwrap_or(Precedence::Lowest)
    }

    fn current_precedence(&self) -> Precedence {
        PRECEDENCES.get(&self.current.kind).copied().unwrap_or(Precedence::Lowest)
    }

    fn parse_expr(&mut self, precedence: Precedence) -> Result<Expr, CompileError> {
        if let Some(err) = self.check_migration_trigger() {
            return Err(err);
        }
        let mut left = self.parse_prefix()?;

        while !self.at(&TokenKind::Semicolon) && precedence < self.current_precedence() {
            left = self.parse_infix(left)?;
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, CompileError> {
        let start = self.current.span;
        match self.current.kind.clone() {
            TokenKind::Integer(v) => {
                self.bump();
                Ok(Expr::new(ExprKind::Integer(v), start))
            }
            TokenKind::Float(s) => {
                self.bump();
                Ok(Expr::new(ExprKind::Float(s), start))
            }
            TokenKind::StringLiteral(s) => {
                self.bump();
                Ok(Expr::new(ExprKind::Str(s), start))
            }
            TokenKind::InterpolatedString(tok) => {
                self.bump();
                self.desugar_interpolation(tok, start)
            }
            TokenKind::True => {
                self.bump();
                Ok(Expr::new(ExprKind::Bool(true), start))
            }
            TokenKind::False => {
                self.bump();
                Ok(Expr::new(ExprKind::Bool(false), start))
            }
            TokenKind::Minus => {
                self.bump();
                let operand = self.parse_expr(Precedence::Unary)?;
                let span = Span::new(start.start, operand.span.end);
                Ok(Expr::new(ExprKind::Unary(UnaryOp::Neg, Box::new(operand)), span))
            }
            TokenKind::Bang => {
                self.bump();
                let operand = self.parse_expr(Precedence::Unary)?;
                let span = Span::new(start.start, operand.span.end);
                Ok(Expr::new(ExprKind::Unary(UnaryOp::Not, Box::new(operand)), span))
            }
            TokenKind::LParen => {
                self.bump();
                let expr = self.parse_expr(Precedence::Lowest)?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_list(start),
            TokenKind::LBrace => self.parse_block_or_record(start),
            TokenKind::Match => self.parse_match(start),
            TokenKind::Pipe => self.parse_lambda(start),
            TokenKind::Let => {
                let let_stmt = self.parse_let_stmt()?;
                let body = self.parse_expr(Precedence::Lowest)?;
                let span = Span::new(start.start, body.span.end);
                Ok(Expr::new(ExprKind::Let(Box::new(let_stmt), Box::new(body)), span))
            }
            TokenKind::Identifier => self.parse_identifier_or_call(start),
            other => Err(self.error_here(format!("unexpected token `{:?}` in expression position", other))),
        }
    }

    /// Lowers `"a${x}b${y}c"` to `"a" ++ x ++ "b" ++ y ++ "c"`, parsing each
    /// embedded expression with a sub-lexer/sub-parser whose spans are
    /// shifted back into the outer source (§4.2).
    fn desugar_interpolation(
        &mut self,
        tok: crate::token::InterpolatedStringToken,
        outer_span: Span,
    ) -> Result<Expr, CompileError> {
        let mut pieces: Vec<Expr> = Vec::new();
        for (i, part) in tok.parts.iter().enumerate() {
            if !part.is_empty() || i == 0 {
                pieces.push(Expr::new(ExprKind::Str(part.clone()), outer_span));
            }
            if i < tok.expr_sources.len() {
                let src = &tok.expr_sources[i];
                let offset = tok.expr_offsets[i];
                let mut sub_lexer = Lexer::new(src);
                let mut sub_parser = Parser::new(&mut sub_lexer);
                let mut expr = sub_parser.parse_expr(Precedence::Lowest).map_err(|e| match e {
                    CompileError::ParserError { message, span } => {
                        CompileError::ParserError { message, span: span.shift(offset) }
                    }
                    other => other,
                })?;
                expr.span = expr.span.shift(offset);
                pieces.push(expr);
            }
        }
        if pieces.is_empty() {
            return Ok(Expr::new(ExprKind::Str(String::new()), outer_span));
        }
        // Right-associative chain of `++`.
        let mut iter = pieces.into_iter().rev();
        let mut acc = iter.next().unwrap();
        for piece in iter {
            let span = Span::new(piece.span.start, acc.span.end);
            acc = Expr::new(ExprKind::Binary(BinaryOp::Concat, Box::new(piece), Box::new(acc)), span);
        }
        Ok(acc)
    }

    fn parse_list(&mut self, start: Span) -> Result<Expr, CompileError> {
        self.expect(TokenKind::LBracket, "`[`")?;
        let mut elements = Vec::new();
        while !self.at(&TokenKind::RBracket) {
            elements.push(self.parse_expr(Precedence::Lowest)?);
            if self.at(&TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        let end = self.expect(TokenKind::RBracket, "`]`")?;
        let span = Span::new(start.start, end.span.end);
        Ok(Expr::new(ExprKind::List(elements), span))
    }

    /// `{` starts a record literal only if lookahead is `Identifier :`
    /// (not `Identifier ,` or `Identifier ->`); otherwise it's a block.
    fn parse_block_or_record(&mut self, start: Span) -> Result<Expr, CompileError> {
        let looks_like_record = self.peek.kind == TokenKind::Identifier;
        if looks_like_record {
            // Need a second lookahead token to distinguish `{ name: ... }`
            // from `{ name }` (a block whose result is a bare identifier).
            let saved_lexer = self.lexer.clone();
            let saved_current = self.current.clone();
            let saved_peek = self.peek.clone();
            self.bump(); // consume `{`
            let after_name = self.peek.kind.clone();
            *self.lexer = saved_lexer;
            self.current = saved_current;
            self.peek = saved_peek;

            if after_name == TokenKind::Colon {
                return self.parse_record(start);
            }
        }
        let block = self.parse_block()?;
        let span = block.span;
        Ok(Expr::new(ExprKind::Block(block), span))
    }

    fn parse_record(&mut self, start: Span) -> Result<Expr, CompileError> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut fields = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            let name = Identifier::new(self.expect(TokenKind::Identifier, "a field name")?.lexeme);
            self.expect(TokenKind::Colon, "`:`")?;
            let value = self.parse_expr(Precedence::Lowest)?;
            fields.push((name, value));
            if self.at(&TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "`}`")?;
        let span = Span::new(start.start, end.span.end);
        Ok(Expr::new(ExprKind::Record(fields), span))
    }

    fn parse_identifier_or_call(&mut self, start: Span) -> Result<Expr, CompileError> {
        let name = Identifier::new(self.expect(TokenKind::Identifier, "an identifier")?.lexeme);

        let type_args = if self.at(&TokenKind::Lt) && self.looks_like_type_arg_list() {
            self.bump();
            let mut args = vec![self.parse_type_expr()?];
            while self.at(&TokenKind::Comma) {
                self.bump();
                args.push(self.parse_type_expr()?);
            }
            self.expect(TokenKind::Gt, "`>`")?;
            args
        } else {
            Vec::new()
        };

        if self.at(&TokenKind::LParen) {
            self.bump();
            let mut args = Vec::new();
            while !self.at(&TokenKind::RParen) {
                if self.current.kind == TokenKind::Identifier && self.peek_at(&TokenKind::Colon) {
                    let arg_name = Identifier::new(self.current.lexeme.clone());
                    self.bump();
                    self.bump();
                    let value = self.parse_expr(Precedence::Lowest)?;
                    args.push(Arg::Named(arg_name, value));
                } else {
                    args.push(Arg::Positional(self.parse_expr(Precedence::Lowest)?));
                }
                if self.at(&TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            let end = self.expect(TokenKind::RParen, "`)`")?;
            let span = Span::new(start.start, end.span.end);
            return Ok(Expr::new(ExprKind::Call(Call { callee: name, args, type_args }), span));
        }

        Ok(Expr::new(ExprKind::Identifier(name), start))
    }

    /// `<` after an identifier starts a type-argument list only when it's
    /// immediately followed by something that can start a type and the
    /// matching `>` precedes a `(` — a heuristic sufficient for Clarity's
    /// small grammar (no expression ever compares two type-shaped things
    /// directly against a call).
    fn looks_like_type_arg_list(&self) -> bool {
        self.peek.kind == TokenKind::Identifier
    }

    fn parse_infix(&mut self, left: Expr) -> Result<Expr, CompileError> {
        if self.at(&TokenKind::Dot) {
            self.bump();
            let member = Identifier::new(self.expect(TokenKind::Identifier, "a member name")?.lexeme);
            let span = Span::new(left.span.start, self.current.span.start);
            return Ok(Expr::new(ExprKind::Member(Box::new(left), member), span));
        }

        let op = match self.current.kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            TokenKind::PlusPlus => BinaryOp::Concat,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::GtEq => BinaryOp::GtEq,
            TokenKind::And => BinaryOp::And,
            TokenKind::Or => BinaryOp::Or,
            ref other => return Err(self.error_here(format!("unexpected infix token `{:?}`", other))),
        };
        let precedence = self.current_precedence();
        self.bump();
        let right = self.parse_expr(precedence)?;
        let span = Span::new(left.span.start, right.span.end);
        Ok(Expr::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), span))
    }

    /// `|x: Int64, y: Int64| -> Int64 { x + y }` (§3.2, §9). Every parameter
    /// and the return type are written out in full — lambdas do not borrow
    /// type information from their call site the way a function call's
    /// argument positions do.
    fn parse_lambda(&mut self, start: Span) -> Result<Expr, CompileError> {
        self.expect(TokenKind::Pipe, "`|`")?;
        let mut params = Vec::new();
        while !self.at(&TokenKind::Pipe) {
            let pname = Identifier::new(self.expect(TokenKind::Identifier, "a parameter name")?.lexeme);
            self.expect(TokenKind::Colon, "`:`")?;
            let ty = self.parse_type_expr()?;
            params.push(Param { name: pname, ty });
            if self.at(&TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(TokenKind::Pipe, "`|`")?;
        self.expect(TokenKind::Arrow, "`->`")?;
        let return_type = self.parse_type_expr()?;
        let body = self.parse_block()?;
        let span = Span::new(start.start, body.span.end);
        Ok(Expr::new(ExprKind::Lambda(Lambda { params, return_type, body: Box::new(body) }), span))
    }

    fn parse_match(&mut self, start: Span) -> Result<Expr, CompileError> {
        self.expect(TokenKind::Match, "`match`")?;
        let scrutinee = Box::new(self.parse_expr(Precedence::Lowest)?);
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut arms = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            let arm_start = self.current.span;
            let pattern = self.parse_pattern()?;
            let guard = if self.at(&TokenKind::If) {
                self.bump();
                Some(self.parse_expr(Precedence::Lowest)?)
            } else {
                None
            };
            self.expect(TokenKind::Arrow, "`->`")?;
            let body = self.parse_expr(Precedence::Lowest)?;
            let span = Span::new(arm_start.start, body.span.end);
            arms.push(MatchArm { pattern, guard, body, span });
            if self.at(&TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "`}`")?;
        let span = Span::new(start.start, end.span.end);
        Ok(Expr::new(ExprKind::Match(Match { scrutinee, arms }), span))
    }

    fn parse_pattern(&mut self) -> Result<Pattern, CompileError> {
        match self.current.kind.clone() {
            TokenKind::Underscore => {
                self.bump();
                Ok(Pattern::Wildcard)
            }
            TokenKind::Integer(lo) => {
                self.bump();
                if self.at(&TokenKind::DotDot) {
                    self.bump();
                    let hi = match self.current.kind {
                        TokenKind::Integer(hi) => hi,
                        _ => return Err(self.error_here("expected an integer to close a range pattern".into())),
                    };
                    self.bump();
                    Ok(Pattern::Range(lo, hi))
                } else {
                    Ok(Pattern::Literal(Literal::Integer(lo)))
                }
            }
            TokenKind::Float(s) => {
                self.bump();
                Ok(Pattern::Literal(Literal::Float(s)))
            }
            TokenKind::StringLiteral(s) => {
                self.bump();
                Ok(Pattern::Literal(Literal::Str(s)))
            }
            TokenKind::True => {
                self.bump();
                Ok(Pattern::Literal(Literal::Bool(true)))
            }
            TokenKind::False => {
                self.bump();
                Ok(Pattern::Literal(Literal::Bool(false)))
            }
            TokenKind::Identifier => {
                let name = self.current.lexeme.clone();
                let is_constructor = name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
                self.bump();
                if !is_constructor {
                    return Ok(Pattern::Binding(Identifier::new(name)));
                }
                let ident = Identifier::new(name);
                if self.at(&TokenKind::LParen) {
                    self.bump();
                    let fields = self.parse_constructor_fields()?;
                    self.expect(TokenKind::RParen, "`)`")?;
                    Ok(Pattern::Constructor { name: ident, fields })
                } else {
                    Ok(Pattern::Constructor { name: ident, fields: ConstructorFields::None })
                }
            }
            other => Err(self.error_here(format!("unexpected token `{:?}` in pattern position", other))),
        }
    }

    fn parse_constructor_fields(&mut self) -> Result<ConstructorFields, CompileError> {
        if self.at(&TokenKind::RParen) {
            return Ok(ConstructorFields::Positional(Vec::new()));
        }
        let named = self.current.kind == TokenKind::Identifier && self.peek_at(&TokenKind::Colon);
        if named {
            let mut pairs = Vec::new();
            while !self.at(&TokenKind::RParen) {
                let fname = Identifier::new(self.expect(TokenKind::Identifier, "a field name")?.lexeme);
                self.expect(TokenKind::Colon, "`:`")?;
                let pat = self.parse_pattern()?;
                pairs.push((fname, pat));
                if self.at(&TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            Ok(ConstructorFields::Named(pairs))
        } else {
            let mut pats = Vec::new();
            while !self.at(&TokenKind::RParen) {
                pats.push(self.parse_pattern()?);
                if self.at(&TokenKind::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
            Ok(ConstructorFields::Positional(pats))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Module {
        let mut lexer = Lexer::new(src);
        let mut parser = Parser::new(&mut lexer);
        parser.parse_module().expect("expected parse to succeed")
    }

    #[test]
    fn parses_module_header_and_function() {
        let m = parse_ok("module M\nfunction add(a: Int64, b: Int64) -> Int64 { a + b }");
        assert_eq!(m.name.value, "M");
        assert_eq!(m.declarations.len(), 1);
    }

    #[test]
    fn parses_record_and_union_types() {
        let m = parse_ok(
            "module M\ntype Point = { x: Int64, y: Int64 }\ntype Shape = | Circle(r: Float64) | Square",
        );
        assert_eq!(m.declarations.len(), 2);
        match &m.declarations[1] {
            Declaration::Type(t) => match &t.body {
                TypeBody::Union(variants) => assert_eq!(variants.len(), 2),
                _ => panic!("expected union"),
            },
            _ => panic!("expected type decl"),
        }
    }

    #[test]
    fn parses_match_with_guard_and_range() {
        let m = parse_ok(
            "module M\nfunction classify(n: Int64) -> String { match n { 0..9 -> \"digit\", x if x > 9 -> \"big\", _ -> \"other\" } }",
        );
        assert_eq!(m.declarations.len(), 1);
    }

    #[test]
    fn if_keyword_produces_migration_diagnostic() {
        let mut lexer = Lexer::new("module M\nfunction f() -> Int64 { if True { 1 } }");
        let mut parser = Parser::new(&mut lexer);
        let result = parser.parse_module();
        assert!(result.is_err());
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("match")));
    }

    #[test]
    fn interpolated_string_desugars_to_concat_chain() {
        let m = parse_ok("module M\nconst greeting: String = \"hi ${name}\"");
        match &m.declarations[0] {
            Declaration::Const(c) => match &c.value.kind {
                ExprKind::Binary(BinaryOp::Concat, _, _) => {}
                other => panic!("expected concat chain, got {other:?}"),
            },
            _ => panic!("expected const decl"),
        }
    }

    #[test]
    fn parses_lambda_expression() {
        let m = parse_ok("module M\nconst inc: (Int64) -> Int64 = |x: Int64| -> Int64 { x + 1 }");
        match &m.declarations[0] {
            Declaration::Const(c) => match &c.value.kind {
                ExprKind::Lambda(lambda) => assert_eq!(lambda.params.len(), 1),
                other => panic!("expected lambda, got {other:?}"),
            },
            _ => panic!("expected const decl"),
        }
    }

    #[test]
    fn named_and_positional_args_both_parse() {
        let m = parse_ok("module M\nconst x: Int64 = f(a: 1, b: 2)");
        match &m.declarations[0] {
            Declaration::Const(c) => match &c.value.kind {
                ExprKind::Call(call) => assert_eq!(call.args.len(), 2),
                other => panic!("expected call, got {other:?}"),
            },
            _ => panic!("expected const decl"),
        }
    }
}
