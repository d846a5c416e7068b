use super::expr::{Expr, Operator};
use super::NodeId;
use crate::error::Span;
use std::sync::Arc;

/// Reference to a class by name, used by type hints and class parents
#[derive(Debug, Clone)]
pub struct TypeRef {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

/// `Number | String`: a value matches if it is an instance of any option
#[derive(Debug, Clone)]
pub struct TypeHint {
    pub options: Vec<TypeRef>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub hint: Option<TypeHint>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegateKind {
    Super,
    This,
}

/// Constructor header delegation: `Name(a) : super(a, 1) { ... }`
#[derive(Debug, Clone)]
pub struct Delegate {
    pub kind: DelegateKind,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    /// Single `name...` parameter collecting every argument
    pub variadic: bool,
    pub return_type: Option<TypeHint>,
    pub body: Vec<Stmt>,
    pub delegate: Option<Delegate>,
    pub span: Span,
}

impl FunctionDecl {
    pub fn arity(&self) -> i32 {
        if self.variadic {
            -1
        } else {
            self.params.len() as i32
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub hint: Option<TypeHint>,
    pub initializer: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumConstant {
    pub name: String,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Enum,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    /// Identity of this declaration; `super` calls in its body refer to it
    pub id: NodeId,
    pub name: String,
    pub kind: ClassKind,
    pub parents: Vec<TypeRef>,
    pub fields: Vec<FieldDecl>,
    pub static_fields: Vec<FieldDecl>,
    pub constructors: Vec<Arc<FunctionDecl>>,
    pub methods: Vec<Arc<FunctionDecl>>,
    pub static_methods: Vec<Arc<FunctionDecl>>,
    pub operators: Vec<(Operator, Arc<FunctionDecl>)>,
    /// Enum constants, in declaration order
    pub constants: Vec<EnumConstant>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct InterfaceMethod {
    pub name: String,
    pub arity: i32,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub parents: Vec<TypeRef>,
    pub methods: Vec<InterfaceMethod>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub name: String,
    /// Empty means "catch everything"
    pub types: Vec<TypeRef>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ImportNames {
    All,
    Names(Vec<String>),
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Local {
        name: String,
        hint: Option<TypeHint>,
        initializer: Option<Expr>,
        span: Span,
    },

    Expression {
        expr: Expr,
        span: Span,
    },

    Block {
        statements: Vec<Stmt>,
        span: Span,
    },

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
        span: Span,
    },

    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
        span: Span,
    },

    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },

    Foreach {
        variable: String,
        iterable: Expr,
        body: Box<Stmt>,
        span: Span,
    },

    Function {
        decl: Arc<FunctionDecl>,
    },

    /// Class and enum declarations
    Class {
        decl: Arc<ClassDecl>,
    },

    Interface {
        decl: Arc<InterfaceDecl>,
    },

    Return {
        value: Option<Expr>,
        span: Span,
    },

    Break {
        span: Span,
    },

    Continue {
        span: Span,
    },

    Throw {
        value: Expr,
        span: Span,
    },

    Try {
        body: Box<Stmt>,
        catch: Option<CatchClause>,
        finally: Option<Box<Stmt>>,
        span: Span,
    },

    Import {
        names: ImportNames,
        path: Vec<String>,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Local { span, .. }
            | Stmt::Expression { span, .. }
            | Stmt::Block { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Foreach { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Throw { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Import { span, .. } => *span,
            Stmt::Function { decl } => decl.span,
            Stmt::Class { decl } => decl.span,
            Stmt::Interface { decl } => decl.span,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}
