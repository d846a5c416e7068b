// Callable values
// Native functions, script functions closed over their defining scope,
// and receiver-bound methods

use std::sync::{Arc, Weak};

use super::user::UserClass;
use super::value::Value;
use crate::ast::FunctionDecl;
use crate::error::EvalResult;
use crate::interpreter::{Interpreter, StackTable};

/// Native function signature for free functions and constructors
pub type NativeFn = fn(&[Value], &mut Interpreter) -> EvalResult;

/// Native function signature for instance methods (with receiver)
pub type NativeMethodFn = fn(&Value, &[Value], &mut Interpreter) -> EvalResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionRole {
    Plain,
    Method,
    Static,
    Constructor,
    Operator,
}

impl FunctionRole {
    /// Whether invocation binds `this` in the call table
    pub fn takes_receiver(self) -> bool {
        matches!(
            self,
            FunctionRole::Method | FunctionRole::Constructor | FunctionRole::Operator
        )
    }
}

pub struct UserFunction {
    pub decl: Arc<FunctionDecl>,
    pub closure: Arc<StackTable>,
    pub role: FunctionRole,
    /// File the body was compiled from, for traces
    pub file: Arc<str>,
    /// Declaring class, set for constructors
    pub owner: Option<Weak<UserClass>>,
}

pub enum FunctionKind {
    Native(NativeFn),
    NativeMethod(NativeMethodFn),
    User(Arc<UserFunction>),
    /// Method value taken off an instance: `local f = obj.m;`
    Bound {
        receiver: Value,
        method: Arc<Function>,
    },
}

pub struct Function {
    pub name: String,
    /// `-1` accepts any number of arguments
    pub arity: i32,
    pub kind: FunctionKind,
}

impl Function {
    pub fn native(name: impl Into<String>, arity: i32, func: NativeFn) -> Self {
        Self {
            name: name.into(),
            arity,
            kind: FunctionKind::Native(func),
        }
    }

    pub fn native_method(name: impl Into<String>, arity: i32, func: NativeMethodFn) -> Self {
        Self {
            name: name.into(),
            arity,
            kind: FunctionKind::NativeMethod(func),
        }
    }

    pub fn user(user: UserFunction) -> Self {
        Self {
            name: user.decl.name.clone(),
            arity: user.decl.arity(),
            kind: FunctionKind::User(Arc::new(user)),
        }
    }

    pub fn bound(receiver: Value, method: Arc<Function>) -> Self {
        Self {
            name: method.name.clone(),
            arity: method.arity,
            kind: FunctionKind::Bound { receiver, method },
        }
    }

    pub fn accepts(&self, argc: usize) -> bool {
        self.arity == -1 || self.arity == argc as i32
    }

    pub fn is_native(&self) -> bool {
        matches!(
            self.kind,
            FunctionKind::Native(_) | FunctionKind::NativeMethod(_)
        )
    }

    /// `name::arity` as shown in traces
    pub fn signature(&self) -> String {
        if self.arity < 0 {
            format!("{}::...", self.name)
        } else {
            format!("{}::{}", self.name, self.arity)
        }
    }
}
