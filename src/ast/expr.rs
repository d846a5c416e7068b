use super::{FunctionDecl, NodeId};
use crate::error::Span;
use crate::lexer::TokenKind;
use std::fmt;
use std::sync::Arc;

/// Every overloadable operator. Unary and binary forms share a variant
/// (`-`, `~`) and are told apart by arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Ampersand,
    Pipe,
    Tilde,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Bang,
    /// `a[i]`
    Index,
    /// `a[i] = v`
    IndexSet,
}

impl Operator {
    pub fn binary_from_token(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Plus => Some(Operator::Plus),
            TokenKind::Minus => Some(Operator::Minus),
            TokenKind::Star => Some(Operator::Star),
            TokenKind::Slash => Some(Operator::Slash),
            TokenKind::Caret => Some(Operator::Caret),
            TokenKind::Ampersand => Some(Operator::Ampersand),
            TokenKind::Pipe => Some(Operator::Pipe),
            TokenKind::Tilde => Some(Operator::Tilde),
            TokenKind::LessLess => Some(Operator::ShiftLeft),
            TokenKind::GreaterGreater => Some(Operator::ShiftRight),
            TokenKind::EqualEqual => Some(Operator::Equal),
            TokenKind::BangEqual => Some(Operator::NotEqual),
            TokenKind::Less => Some(Operator::Less),
            TokenKind::LessEqual => Some(Operator::LessEqual),
            TokenKind::Greater => Some(Operator::Greater),
            TokenKind::GreaterEqual => Some(Operator::GreaterEqual),
            TokenKind::And => Some(Operator::And),
            TokenKind::Or => Some(Operator::Or),
            TokenKind::Bang => Some(Operator::Bang),
            _ => None,
        }
    }

    /// Operator applied by a compound assignment token
    pub fn compound_from_token(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::PlusEqual => Some(Operator::Plus),
            TokenKind::MinusEqual => Some(Operator::Minus),
            TokenKind::StarEqual => Some(Operator::Star),
            TokenKind::SlashEqual => Some(Operator::Slash),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Slash => "/",
            Operator::Caret => "^",
            Operator::Ampersand => "&",
            Operator::Pipe => "|",
            Operator::Tilde => "~",
            Operator::ShiftLeft => "<<",
            Operator::ShiftRight => ">>",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Bang => "!",
            Operator::Index => "[]",
            Operator::IndexSet => "[]=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal {
        value: Literal,
        span: Span,
    },

    List {
        elements: Vec<Expr>,
        span: Span,
    },

    Map {
        entries: Vec<(Expr, Expr)>,
        span: Span,
    },

    /// Bare name read; may denote a variable, a function or a class
    Access {
        id: NodeId,
        name: String,
        span: Span,
    },

    /// `name = value` or `name op= value`
    Assign {
        id: NodeId,
        name: String,
        op: Option<Operator>,
        value: Box<Expr>,
        span: Span,
    },

    /// `name(args)`, resolved by name and arity
    FunctionCall {
        id: NodeId,
        name: String,
        args: Vec<Expr>,
        span: Span,
    },

    /// `expr(args)` where the callee is computed
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },

    Member {
        object: Box<Expr>,
        name: String,
        span: Span,
    },

    MemberAssign {
        object: Box<Expr>,
        name: String,
        op: Option<Operator>,
        value: Box<Expr>,
        span: Span,
    },

    MemberCall {
        object: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        span: Span,
    },

    Bracket {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },

    BracketAssign {
        object: Box<Expr>,
        index: Box<Expr>,
        op: Option<Operator>,
        value: Box<Expr>,
        span: Span,
    },

    Unary {
        op: Operator,
        operand: Box<Expr>,
        span: Span,
    },

    Binary {
        left: Box<Expr>,
        op: Operator,
        right: Box<Expr>,
        span: Span,
    },

    This {
        id: NodeId,
        span: Span,
    },

    /// `super.method(args)`
    SuperCall {
        id: NodeId,
        method: String,
        args: Vec<Expr>,
        span: Span,
    },

    New {
        id: NodeId,
        class: String,
        args: Vec<Expr>,
        span: Span,
    },

    /// Anonymous `fun(params) { ... }`
    Function {
        decl: Arc<FunctionDecl>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::List { span, .. }
            | Expr::Map { span, .. }
            | Expr::Access { span, .. }
            | Expr::Assign { span, .. }
            | Expr::FunctionCall { span, .. }
            | Expr::Call { span, .. }
            | Expr::Member { span, .. }
            | Expr::MemberAssign { span, .. }
            | Expr::MemberCall { span, .. }
            | Expr::Bracket { span, .. }
            | Expr::BracketAssign { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::This { span, .. }
            | Expr::SuperCall { span, .. }
            | Expr::New { span, .. }
            | Expr::Function { span, .. } => *span,
        }
    }
}
