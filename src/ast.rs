//! Boundary data model for parsed source files.
//!
//! The parser itself lives outside this crate; callers hand the analyser a
//! [`SourceAst`] they built from whatever parser they use. The shapes here
//! carry exactly what the analyser consumes: line spans, declaration names,
//! parameter/return types, attributes and doc comments, and the statement
//! kinds that matter for executable-line detection and complexity.

/// Inclusive line span of a declaration or statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    #[must_use]
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// An attribute attached to a declaration, e.g. `#[CodeCoverageIgnore]`.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
}

impl Attribute {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Method/property visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }
}

/// A type expression as it appears in a signature.
#[derive(Debug, Clone)]
pub enum Type {
    Named(String),
    /// `?T`
    Nullable(Box<Type>),
    /// `A|B`
    Union(Vec<Type>),
    /// `A&B`
    Intersection(Vec<Type>),
}

impl Type {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Type::Named(name.into())
    }
}

/// A declared parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Option<Type>,
    pub by_ref: bool,
    pub variadic: bool,
}

impl Param {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: Option<Type>) -> Self {
        Self {
            name: name.into(),
            ty,
            by_ref: false,
            variadic: false,
        }
    }
}

/// One parsed source file.
#[derive(Debug, Clone, Default)]
pub struct SourceAst {
    pub items: Vec<Item>,
}

/// A top-level item: a declaration or a free statement.
#[derive(Debug, Clone)]
pub enum Item {
    Interface(InterfaceDecl),
    Class(ClassDecl),
    Trait(TraitDecl),
    Enum(EnumDecl),
    Function(FunctionDecl),
    Stmt(Stmt),
}

#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub namespaced_name: String,
    pub span: Span,
    pub extends: Vec<String>,
    /// Interface methods are bodyless stubs; only their signatures exist.
    pub methods: Vec<MethodDecl>,
    pub attributes: Vec<Attribute>,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub namespaced_name: String,
    pub span: Span,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub members: Vec<Member>,
    pub attributes: Vec<Attribute>,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TraitDecl {
    pub name: String,
    pub namespaced_name: String,
    pub span: Span,
    pub members: Vec<Member>,
    pub attributes: Vec<Attribute>,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub namespaced_name: String,
    pub span: Span,
    pub interfaces: Vec<String>,
    pub members: Vec<Member>,
    pub attributes: Vec<Attribute>,
    pub doc_comment: Option<String>,
}

/// A member of a class-like declaration body.
#[derive(Debug, Clone)]
pub enum Member {
    Method(MethodDecl),
    /// `use TraitA, TraitB;`
    UseTrait { names: Vec<String>, line: u32 },
    EnumCase(EnumCaseDecl),
}

#[derive(Debug, Clone)]
pub struct EnumCaseDecl {
    pub name: String,
    pub span: Span,
    pub attributes: Vec<Attribute>,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub span: Span,
    pub visibility: Visibility,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    /// `None` for abstract/interface stubs.
    pub body: Option<Vec<Stmt>>,
    pub attributes: Vec<Attribute>,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub namespaced_name: String,
    pub span: Span,
    pub params: Vec<Param>,
    pub return_type: Option<Type>,
    pub body: Vec<Stmt>,
    pub attributes: Vec<Attribute>,
    pub doc_comment: Option<String>,
}

/// A statement, carrying the line it begins on.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub line: u32,
    pub kind: StmtKind,
}

impl Stmt {
    #[must_use]
    pub fn new(line: u32, kind: StmtKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    Return(Option<Expr>),
    Echo(Vec<Expr>),
    Throw(Expr),
    Break,
    Continue,
    If {
        cond: Expr,
        then: Vec<Stmt>,
        elseifs: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
    },
    For {
        init: Vec<Expr>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Vec<Stmt>,
    },
    Foreach {
        subject: Expr,
        body: Vec<Stmt>,
    },
    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
    },
    Try {
        body: Vec<Stmt>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
}

/// One `case`/`default` arm of a switch.
#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub line: u32,
    /// `None` for `default:`.
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub line: u32,
    pub ty: String,
    pub body: Vec<Stmt>,
}

/// An expression, carrying the line it begins on.
#[derive(Debug, Clone)]
pub struct Expr {
    pub line: u32,
    pub kind: ExprKind,
}

impl Expr {
    #[must_use]
    pub fn new(line: u32, kind: ExprKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Variable(String),
    Literal,
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    MethodCall {
        recv: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    New {
        class: String,
        args: Vec<Expr>,
    },
    /// `new class(...) { ... }` — never an addressable code unit.
    NewAnonymousClass {
        members: Vec<Member>,
        args: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Option<Box<Expr>>,
        else_branch: Box<Expr>,
    },
    /// `function (...) { ... }` / `fn (...) => ...` — never an addressable
    /// code unit, but its body lines are executable.
    Closure {
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
    Match {
        subject: Box<Expr>,
        arms: Vec<MatchArm>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `&&` / `and`
    And,
    /// `||` / `or`
    Or,
    /// `??`
    Coalesce,
    /// Anything without control-flow significance.
    Other,
}

/// One arm of a `match` expression.
#[derive(Debug, Clone)]
pub struct MatchArm {
    pub line: u32,
    /// `None` for the `default` arm.
    pub conditions: Option<Vec<Expr>>,
    pub body: Expr,
}
