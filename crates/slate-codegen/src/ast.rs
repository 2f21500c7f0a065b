//! The typed AST consumed by code generation.
//!
//! The lexer/parser front end produces this tree; the lowering core only
//! needs node-kind dispatch and per-kind structural accessors, so the
//! whole surface is a closed set of plain enums and structs. Every node
//! carries the [`Span`] of the source text it came from.

use std::fmt;

use slate_common::Span;

/// A whole compilation unit: the ordered list of top-level declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// An interface (struct schema) declaration.
    Interface(InterfaceDecl),
    /// A bare prototype: an extern or forward declaration without a body.
    Prototype(Prototype),
    /// A function definition.
    Function(FunctionDecl),
}

/// A reference to a type by its source-level name (`i32`, `bool`, a
/// user-defined interface name, ...), resolved against the type registry
/// on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub name: String,
    pub span: Span,
}

impl TypeRef {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// An interface declaration: named, ordered `(property, type)` pairs plus
/// the names of the base interfaces it extends.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub properties: Vec<(String, TypeRef)>,
    pub bases: Vec<String>,
    pub span: Span,
}

/// A function signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub params: Vec<(String, TypeRef)>,
    /// `None` means the function returns `void`.
    pub return_type: Option<TypeRef>,
    pub is_variadic: bool,
    pub is_extern: bool,
    pub is_exported: bool,
    pub span: Span,
}

impl Prototype {
    pub fn new(name: impl Into<String>, params: Vec<(String, TypeRef)>, return_type: Option<TypeRef>) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            is_variadic: false,
            is_extern: false,
            is_exported: false,
            span: Span::default(),
        }
    }
}

/// A function definition: prototype plus body statements.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub prototype: Prototype,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// A statement inside a function body or control-flow arm.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// An expression evaluated for its effect.
    Expr(Expr),
    /// `return;` or `return <expr>;`
    Return(Option<Expr>, Span),
    Break(Span),
    Continue(Span),
    If(IfStmt),
    /// A bare infinite loop.
    Loop { body: Vec<Stmt>, span: Span },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        /// A do-while evaluates the body once before the first condition check.
        is_do_while: bool,
        span: Span,
    },
    For {
        definition: Box<Expr>,
        condition: Box<Expr>,
        stepper: Box<Expr>,
        body: Vec<Stmt>,
        span: Span,
    },
}

/// The statement form of `if`; either branch may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_body: Option<Vec<Stmt>>,
    pub else_body: Option<Vec<Stmt>>,
    pub span: Span,
}

/// A variable reference, optionally through a property-access chain:
/// `x` has no parent, `a.b.c` is `c` with parent `b` with parent `a`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub name: String,
    pub parent: Option<Box<VarRef>>,
    pub span: Span,
}

impl VarRef {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            parent: None,
            span,
        }
    }

    /// `self.property`, for building access chains.
    pub fn property(self, name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            parent: Some(Box::new(self)),
            span,
        }
    }
}

/// A variable definition (`let x: i32` / `let x`), usable standalone or
/// as the left side of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDef {
    pub name: String,
    /// `None` means the type is inferred from the assigned value.
    pub ty: Option<TypeRef>,
    pub span: Span,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Bool(bool, Span),
    /// A numeric literal, kept as source text so its width can be decided
    /// by the ambient expected type at lowering time.
    Number(String, Span),
    Str(String, Span),
    Null(Span),
    /// An object literal: ordered `(property, value)` pairs.
    Object {
        properties: Vec<(String, Expr)>,
        span: Span,
    },
    Variable(VarRef),
    Define(VarDef),
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        /// Postfix (`x++`) rather than prefix (`++x`).
        suffix: bool,
        span: Span,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    /// `<expr> as <type>`
    Cast {
        value: Box<Expr>,
        ty: TypeRef,
        span: Span,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
        span: Span,
    },
    /// The expression form of `if`; both arms are mandatory.
    InlineIf {
        condition: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Bool(_, span)
            | Expr::Number(_, span)
            | Expr::Str(_, span)
            | Expr::Null(span)
            | Expr::Object { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Cast { span, .. }
            | Expr::Call { span, .. }
            | Expr::InlineIf { span, .. } => *span,
            Expr::Variable(v) => v.span,
            Expr::Define(d) => d.span,
        }
    }
}

/// Binary operator tokens. The reserved entries (`**`, `&&`, `||`) are
/// accepted by the parser but have no lowering yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Assign,
    Star,
    Slash,
    Percent,
    Plus,
    Minus,
    Caret,
    And,
    Or,
    Shl,
    Shr,
    UShr,
    Lt,
    Lte,
    Eq,
    Ne,
    Gte,
    Gt,
    StarStar,
    AndAnd,
    OrOr,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Assign => "=",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Caret => "^",
            Self::And => "&",
            Self::Or => "|",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::UShr => ">>>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gte => ">=",
            Self::Gt => ">",
            Self::StarStar => "**",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
        };
        write!(f, "{token}")
    }
}

/// Unary operator tokens. `+`, `~` and `&` are reserved and fail at
/// lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Increment,
    Decrement,
    Minus,
    Not,
    Plus,
    Tilde,
    Ampersand,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Increment => "++",
            Self::Decrement => "--",
            Self::Minus => "-",
            Self::Not => "!",
            Self::Plus => "+",
            Self::Tilde => "~",
            Self::Ampersand => "&",
        };
        write!(f, "{token}")
    }
}
