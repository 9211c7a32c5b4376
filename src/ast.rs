use crate::token::Span;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub value: String,
}

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Identifier { value: value.into() }
    }
}

#[derive(Debug, Clone)]
pub struct Module {
    pub name: Identifier,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone)]
pub enum Declaration {
    Import(ImportDeclaration),
    Type(TypeDeclaration),
    Function(FunctionDeclaration),
    Const(ConstDeclaration),
}

#[derive(Debug, Clone)]
pub struct ImportDeclaration {
    pub names: Vec<Identifier>,
    pub from: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeDeclaration {
    pub name: Identifier,
    pub type_params: Vec<Identifier>,
    pub body: TypeBody,
    pub exported: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeBody {
    Alias(TypeExpr),
    Record(Vec<FieldDecl>),
    Union(Vec<VariantDecl>),
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: Identifier,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct VariantDecl {
    pub name: Identifier,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone)]
pub struct FunctionDeclaration {
    pub name: Identifier,
    pub type_params: Vec<Identifier>,
    pub params: Vec<Param>,
    pub return_type: TypeExpr,
    pub effects: Vec<Identifier>,
    pub body: Block,
    pub exported: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Identifier,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct ConstDeclaration {
    pub name: Identifier,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
    pub exported: bool,
    pub span: Span,
}

/// A type reference as written in source, resolved to `crate::types::Type`
/// by the checker.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Named(Identifier),
    Generic(Identifier, Vec<TypeExpr>),
    Function(Vec<TypeExpr>, Box<TypeExpr>),
}

#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub result: Option<Box<Expr>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Let(LetStmt),
    Assign(AssignStmt),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct LetStmt {
    pub name: Identifier,
    pub mutable: bool,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AssignStmt {
    pub target: Identifier,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Populated by the checker (§3.4). `None` before checking runs.
    pub resolved_type: std::cell::RefCell<Option<crate::types::Type>>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span, resolved_type: std::cell::RefCell::new(None) }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Integer(i64),
    Float(String),
    Str(String),
    Bool(bool),
    List(Vec<Expr>),
    Record(Vec<(Identifier, Expr)>),
    Identifier(Identifier),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Call),
    Member(Box<Expr>, Identifier),
    Block(Block),
    Let(Box<LetStmt>, Box<Expr>),
    Match(Match),
    Lambda(Lambda),
}

/// A non-capturing anonymous function: `|x: Int64, y: Int64| -> Int64 { ... }`
/// (§3.2, §9). Parameters and the return type must be written out in full —
/// Clarity does not infer lambda signatures from call-site context.
#[derive(Debug, Clone)]
pub struct Lambda {
    pub params: Vec<Param>,
    pub return_type: TypeExpr,
    pub body: Box<Block>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub callee: Identifier,
    pub args: Vec<Arg>,
    pub type_args: Vec<TypeExpr>,
}

#[derive(Debug, Clone)]
pub enum Arg {
    Positional(Expr),
    Named(Identifier, Expr),
}

#[derive(Debug, Clone)]
pub struct Match {
    pub scrutinee: Box<Expr>,
    pub arms: Vec<MatchArm>,
}

#[derive(Debug, Clone)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Wildcard,
    Binding(Identifier),
    Literal(Literal),
    Range(i64, i64),
    /// `Name` (zero-field variant) or `Name(...)` with positional or named
    /// sub-patterns — never both in the same pattern.
    Constructor { name: Identifier, fields: ConstructorFields },
}

#[derive(Debug, Clone)]
pub enum ConstructorFields {
    None,
    Positional(Vec<Pattern>),
    Named(Vec<(Identifier, Pattern)>),
}

#[derive(Debug, Clone)]
pub enum Literal {
    Integer(i64),
    Float(String),
    Str(String),
    Bool(bool),
}

impl Pattern {
    /// All identifiers this pattern binds, left to right.
    pub fn bound_identifiers(&self) -> Vec<Identifier> {
        match self {
            Pattern::Wildcard | Pattern::Literal(_) | Pattern::Range(..) => vec![],
            Pattern::Binding(id) => vec![id.clone()],
            Pattern::Constructor { fields, .. } => match fields {
                ConstructorFields::None => vec![],
                ConstructorFields::Positional(pats) => {
                    pats.iter().flat_map(Pattern::bound_identifiers).collect()
                }
                ConstructorFields::Named(pairs) => {
                    pairs.iter().flat_map(|(_, p)| p.bound_identifiers()).collect()
                }
            },
        }
    }
}
