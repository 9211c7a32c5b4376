use crate::diagnostics::{Diagnostic, DiagnosticBuilder, SourceLocation};
use crate::token::Span;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    LexerError { message: String, span: Span },
    ParserError { message: String, span: Span },
    TypeError { message: String, span: Span, code: &'static str },
    EffectError { message: String, span: Span },
    Generic(String),
    WithLocation { message: String, location: SourceLocation, help: Option<String> },
}

impl CompileError {
    pub fn to_diagnostic(&self, file: &str) -> Diagnostic {
        match self {
            CompileError::LexerError { message, span } => {
                Diagnostic::error(message.clone()).at(SourceLocation::from_span(*span, file)).with_code("E000")
            }
            CompileError::ParserError { message, span } => {
                DiagnosticBuilder::syntax_error("", message, SourceLocation::from_span(*span, file))
            }
            CompileError::TypeError { message, span, code } => {
                Diagnostic::error(message.clone()).at(SourceLocation::from_span(*span, file)).with_code(*code)
            }
            CompileError::EffectError { message, span } => {
                Diagnostic::error(message.clone()).at(SourceLocation::from_span(*span, file)).with_code("E007")
            }
            CompileError::Generic(msg) => Diagnostic::error(msg.clone()),
            CompileError::WithLocation { message, location, help } => {
                let mut diag = Diagnostic::error(message.clone()).at(location.clone());
                if let Some(h) = help {
                    diag = diag.with_help(h.clone());
                }
                diag
            }
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::LexerError { message, span } => write!(f, "lex error [{}:{}]: {}", span.start.line, span.start.col, message),
            CompileError::ParserError { message, span } => write!(f, "parse error [{}:{}]: {}", span.start.line, span.start.col, message),
            CompileError::TypeError { message, span, .. } => write!(f, "type error [{}:{}]: {}", span.start.line, span.start.col, message),
            CompileError::EffectError { message, span } => write!(f, "effect error [{}:{}]: {}", span.start.line, span.start.col, message),
            CompileError::Generic(msg) => write!(f, "error: {}", msg),
            CompileError::WithLocation { message, .. } => write!(f, "error: {}", message),
        }
    }
}

impl std::error::Error for CompileError {}
