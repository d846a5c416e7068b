// Error built-in classes
// `Error` and one subclass per catchable error kind. Instances are plain
// objects carrying `message` and `trace` fields, so script subclasses can
// add their own fields and methods.

use crate::error::{ErrorKind, EvalResult};
use crate::interpreter::Interpreter;
use crate::runtime::class::no_constructor;
use crate::runtime::{ClassCore, ClassDefinition, ClassRef, Object, Value};
use std::sync::{Arc, Weak};

use super::Primitives;

struct ErrorClass {
    core: ClassCore,
    this: Weak<ErrorClass>,
}

impl ErrorClass {
    fn create(core: impl FnOnce() -> ClassCore) -> ClassRef {
        Arc::new_cyclic(|this| ErrorClass {
            core: core(),
            this: this.clone(),
        })
    }
}

impl ClassDefinition for ErrorClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    fn construct(&self, interp: &mut Interpreter, args: Vec<Value>) -> EvalResult {
        let class: ClassRef = match self.this.upgrade() {
            Some(class) => class,
            None => return Err(crate::error::fatal_error("Error class was dropped while in use")),
        };
        let object = Value::Object(Arc::new(Object::new(class)));
        self.init_super(interp, &object, args)?;
        Ok(object)
    }

    /// Error() or Error(message)
    fn init_super(&self, interp: &mut Interpreter, this: &Value, args: Vec<Value>) -> EvalResult<()> {
        let message = match args.as_slice() {
            [] => String::new(),
            [Value::String(text)] => text.to_string(),
            [other] => interp.stringify(other)?,
            _ => return Err(no_constructor(self.name(), args.len())),
        };
        if let Value::Object(object) = this {
            object.set("message", Value::string(message));
            object.set("trace", trace_list(interp.call_stack().iter().rev().map(|frame| frame.to_string())));
        }
        Ok(())
    }

    fn to_string(&self, interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        let message = match value.as_object().and_then(|object| object.get("message")) {
            Some(Value::String(text)) => text.to_string(),
            Some(other) => interp.stringify(&other)?,
            None => String::new(),
        };
        Ok(format!("{}: {}", interp.type_name(value), message))
    }
}

fn trace_list(frames: impl Iterator<Item = String>) -> Value {
    Value::list(frames.map(Value::string).collect())
}

pub fn create_error_class(object: ClassRef) -> ClassRef {
    ErrorClass::create(|| {
        ClassCore::new("Error")
            .extends(object)
            .extendable()
            .constructor(0, error_new)
            .constructor(1, error_new)
            .method("getMessage", 0, error_get_message)
            .method("getTrace", 0, error_get_trace)
    })
}

pub fn create_error_kind_class(kind: ErrorKind, error: ClassRef) -> ClassRef {
    ErrorClass::create(|| {
        ClassCore::new(kind.to_string())
            .extends(error)
            .extendable()
            .constructor(0, error_new)
            .constructor(1, error_new)
    })
}

/// Arity entries for the constructor table; construction itself goes
/// through the class definition so the right subclass is instantiated
fn error_new(args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let error = interp.primitives().error.clone();
    error.construct(interp, args.to_vec())
}

/// Error value for a runtime error raised by the interpreter itself
pub fn new_error_object(primitives: &Primitives, kind: ErrorKind, message: &str, trace: Vec<String>) -> Value {
    let object = Object::new(primitives.error_class(kind));
    object.set("message", Value::string(message));
    object.set("trace", trace_list(trace.into_iter()));
    Value::Object(Arc::new(object))
}

fn error_get_message(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(recv
        .as_object()
        .and_then(|object| object.get("message"))
        .unwrap_or_else(|| Value::string("")))
}

fn error_get_trace(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(recv
        .as_object()
        .and_then(|object| object.get("trace"))
        .unwrap_or_else(|| Value::list(Vec::new())))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::Interpreter;
    use crate::runtime::{BufferSink, Value};
    use std::sync::Arc;

    fn run(source: &str) -> Value {
        let mut interp = Interpreter::builder().sink(Arc::new(BufferSink::new())).build();
        interp.run_source(source, "test.sbl").unwrap()
    }

    #[test]
    fn test_interpreter_errors_are_catchable_by_kind() {
        let value = run("local m = null; try { 1 / 0; } catch (e: DivisionByZero) { m = e.getMessage(); } m;");
        assert_eq!(value.as_str(), Some("Division by zero"));
    }

    #[test]
    fn test_catch_filter_matches_base_error() {
        let value = run("local m = null; try { undefinedThing; } catch (e: Error) { m = e.toString(); } m;");
        assert_eq!(value.as_str(), Some("NameError: Undefined variable 'undefinedThing'"));
    }

    #[test]
    fn test_script_subclass_of_error() {
        let source = "
            class Oops : Error {
                var code = 0;
                Oops(m, c) : super(m) { this.code = c; }
            }
            local out = null;
            try { throw new Oops(\"bad\", 42); } catch (e: Oops) { out = e.getMessage() + e.code; }
            out;
        ";
        assert_eq!(run(source).as_str(), Some("bad42"));
    }

    #[test]
    fn test_unmatched_filter_rethrows() {
        let mut interp = Interpreter::builder().sink(Arc::new(BufferSink::new())).build();
        let error = interp
            .run_source("try { throw TypeError(\"t\"); } catch (e: IndexError) { }", "test.sbl")
            .unwrap_err();
        assert_eq!(error.kind, crate::error::ErrorKind::TypeError);
        assert_eq!(error.message, "t");
    }
}
