// Invocation: arity checks, call frames, parameter binding and
// constructor delegation

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use super::{Flow, Interpreter, StackTable};
use crate::ast::{DelegateKind, TypeHint};
use crate::error::{fatal_error, runtime_error, ErrorKind, EvalResult, Trace, Unwind};
use crate::runtime::{Function, FunctionKind, FunctionRole, UserFunction, Value};

impl Interpreter {
    /// Call `function` with an optional receiver. Every call, native or
    /// scripted, goes through here so the call stack and depth limit stay
    /// accurate.
    pub fn invoke(&mut self, function: &Arc<Function>, receiver: Option<&Value>, args: Vec<Value>) -> EvalResult {
        self.check_alive()?;

        if let FunctionKind::Bound { receiver, method } = &function.kind {
            if method.accepts(args.len()) {
                return self.invoke(method, Some(receiver), args);
            }
            // Another overload of the same name may take this many arguments
            return self.call_method(receiver, &method.name, args);
        }

        if !function.accepts(args.len()) {
            return Err(runtime_error(
                ErrorKind::ArgumentError,
                format!(
                    "Function '{}' expected {} argument(s) but got {}",
                    function.name,
                    function.arity,
                    args.len()
                ),
            ));
        }

        let max_depth = self.config().max_call_depth;
        if self.trace.len() >= max_depth {
            return Err(runtime_error(
                ErrorKind::StackOverflow,
                format!("Stack overflow: maximum call depth of {} exceeded", max_depth),
            ));
        }

        let description = match receiver {
            Some(target) => format!("{}.{}", self.type_name(target), function.signature()),
            None => function.signature(),
        };
        let frame = Trace::call(self.file.clone(), self.call_site, description);
        let depth = self.trace.len();
        self.trace.push(frame.clone());
        let saved_table = self.table.clone();
        let saved_file = self.file.clone();

        let result = match &function.kind {
            FunctionKind::Native(native) => {
                let native = *native;
                self.guard_native(&function.name, |interp| native(&args, interp))
            }
            FunctionKind::NativeMethod(native) => match receiver {
                Some(target) => {
                    let native = *native;
                    self.guard_native(&function.name, |interp| native(target, &args, interp))
                }
                None => Err(fatal_error(format!(
                    "Native method '{}' called without a receiver",
                    function.name
                ))),
            },
            FunctionKind::User(user) => self.call_user(user, receiver, args),
            FunctionKind::Bound { .. } => Err(fatal_error("Bound method reached the call path")),
        };

        self.table = saved_table;
        self.file = saved_file;
        self.trace.truncate(depth);

        result.map_err(|unwind| match unwind {
            Unwind::Error(mut error) => {
                error.push_frame(frame);
                Unwind::Error(error)
            }
            Unwind::Fatal(mut fatal) => {
                fatal.trace.push(frame);
                Unwind::Fatal(fatal)
            }
            Unwind::Stop => Unwind::Stop,
        })
    }

    /// A panicking native becomes a fatal error instead of tearing down the
    /// whole thread
    fn guard_native(&mut self, name: &str, call: impl FnOnce(&mut Interpreter) -> EvalResult) -> EvalResult {
        match panic::catch_unwind(AssertUnwindSafe(|| call(self))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(function = name, %message, "native function panicked");
                Err(fatal_error(format!("Native function '{}' panicked: {}", name, message)))
            }
        }
    }

    fn call_user(&mut self, user: &Arc<UserFunction>, receiver: Option<&Value>, args: Vec<Value>) -> EvalResult {
        let decl = &user.decl;
        let table = StackTable::child(&user.closure);
        self.table = table.clone();
        self.file = user.file.clone();

        if user.role.takes_receiver() {
            match receiver {
                Some(this) => table.define_variable("this", this.clone()),
                None => {
                    return Err(fatal_error(format!("Method '{}' called without a receiver", decl.name)));
                }
            }
        }

        if decl.variadic {
            if let Some(param) = decl.params.first() {
                if let Some(hint) = &param.hint {
                    for arg in &args {
                        self.check_hint(hint, arg, &format!("argument to '{}'", param.name))?;
                    }
                }
                table.define_variable(&param.name, Value::list(args));
            }
        } else {
            for (param, arg) in decl.params.iter().zip(args) {
                if let Some(hint) = &param.hint {
                    self.check_hint(hint, &arg, &format!("parameter '{}'", param.name))?;
                }
                table.define_variable(&param.name, arg);
            }
        }

        if user.role == FunctionRole::Constructor {
            self.delegate_constructor(user, receiver)?;
        }

        let value = match self.execute_statements(&decl.body)? {
            Flow::Return(value) => value,
            Flow::Normal | Flow::Break | Flow::Continue => Value::Null,
        };
        if let Some(hint) = &decl.return_type {
            self.check_hint(hint, &value, &format!("return value of '{}'", decl.name))?;
        }
        Ok(value)
    }

    /// Run the `: super(...)` / `: this(...)` part of a constructor header,
    /// or the implicit no-argument parent initialization
    fn delegate_constructor(&mut self, user: &UserFunction, receiver: Option<&Value>) -> EvalResult<()> {
        let owner = user
            .owner
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| fatal_error(format!("Constructor '{}' has no owning class", user.decl.name)))?;
        let Some(this) = receiver else {
            return Err(fatal_error(format!("Constructor '{}' called without a receiver", user.decl.name)));
        };

        match &user.decl.delegate {
            Some(delegate) => {
                let args = self.evaluate_all(&delegate.args)?;
                self.call_site = delegate.span;
                match delegate.kind {
                    DelegateKind::Super => owner.init_parent(self, this, args),
                    DelegateKind::This => owner.run_constructor(self, this, args),
                }
            }
            None => owner.init_parent(self, this, Vec::new()),
        }
    }

    /// Call any callable value
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> EvalResult {
        let definition = self.definition_of(callee);
        definition.call(self, callee, args)
    }

    /// `target.name(args)`, dispatched through the target's definition
    pub fn call_method(&mut self, target: &Value, name: &str, args: Vec<Value>) -> EvalResult {
        let definition = self.definition_of(target);
        definition.call_member(self, target, name, args)
    }

    /// Call `name` on `target` only if its definition answers it
    pub fn try_call_method(&mut self, target: &Value, name: &str, args: Vec<Value>) -> EvalResult<Option<Value>> {
        match self.definition_of(target).find_method(name, args.len()) {
            Some(method) => self.invoke(&method, Some(target), args).map(Some),
            None => Ok(None),
        }
    }

    /// Fail with a TypeError unless `value` is an instance of one of the
    /// hinted classes
    pub fn check_hint(&mut self, hint: &TypeHint, value: &Value, what: &str) -> EvalResult<()> {
        let mut expected = Vec::with_capacity(hint.options.len());
        for option in &hint.options {
            let class = self.lookup_type(option)?;
            if self.is_instance(value, &class) {
                return Ok(());
            }
            expected.push(class.name().to_string());
        }
        Err(runtime_error(
            ErrorKind::TypeError,
            format!(
                "Expected {} to be {} but got {}",
                what,
                expected.join(" | "),
                self.type_name(value)
            ),
        ))
    }
}

/// Text of a caught panic payload
pub(super) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::interpreter::Interpreter;
    use crate::runtime::BufferSink;
    use std::sync::Arc;

    fn interpreter() -> Interpreter {
        Interpreter::builder().sink(Arc::new(BufferSink::new())).build()
    }

    #[test]
    fn test_overloads_pick_exact_arity() {
        let mut interp = interpreter();
        let value = interp
            .run_source(
                "fun f(a) { return 1; } fun f(a, b) { return 2; } fun f(xs...) { return 3; } f(1) * 100 + f(1, 2) * 10 + f(1, 2, 3);",
                "test.sbl",
            )
            .unwrap();
        assert_eq!(value.as_number(), Some(123.0));
    }

    #[test]
    fn test_parameter_hint_mismatch_is_type_error() {
        let mut interp = interpreter();
        let error = interp
            .run_source("fun f(n: Number) { return n; } f(\"x\");", "test.sbl")
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::TypeError);
        assert_eq!(error.message, "Expected parameter 'n' to be Number but got String");
    }

    #[test]
    fn test_runaway_recursion_is_catchable() {
        let mut interp = interpreter();
        let value = interp
            .run_source(
                "fun down(n) { return down(n + 1); } local caught = false; try { down(0); } catch (e: StackOverflow) { caught = true; } caught;",
                "test.sbl",
            )
            .unwrap();
        assert!(matches!(value, crate::runtime::Value::Boolean(true)));
    }

    #[test]
    fn test_error_trace_lists_innermost_call_first() {
        let mut interp = interpreter();
        let error = interp
            .run_source("fun inner() { throw \"boom\"; }\nfun outer() { inner(); }\nouter();", "test.sbl")
            .unwrap_err();
        let frames: Vec<String> = error
            .stack_trace
            .iter()
            .filter_map(|frame| frame.description.clone())
            .collect();
        assert_eq!(frames, vec!["inner::0".to_string(), "outer::0".to_string()]);
    }
}
