// Function built-in class

use crate::error::EvalResult;
use crate::interpreter::Interpreter;
use crate::runtime::{ClassCore, ClassDefinition, ClassRef, Value};
use std::sync::Arc;

struct FunctionClass {
    core: ClassCore,
}

impl ClassDefinition for FunctionClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    fn is_callable(&self, value: &Value) -> bool {
        matches!(value, Value::Function(_))
    }

    fn call(&self, interp: &mut Interpreter, callee: &Value, args: Vec<Value>) -> EvalResult {
        match callee {
            Value::Function(function) => interp.invoke(function, None, args),
            _ => Err(crate::error::runtime_error(
                crate::error::ErrorKind::TypeError,
                format!("Value of type {} is not callable", interp.type_name(callee)),
            )),
        }
    }

    fn to_string(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        Ok(match value {
            Value::Function(function) => format!("<function {}>", function.signature()),
            _ => "<function>".to_string(),
        })
    }
}

pub fn create_function_class(object: ClassRef) -> ClassRef {
    let core = ClassCore::new("Function")
        .extends(object)
        .method("arity", 0, function_arity)
        .method("name", 0, function_name)
        .method("call", -1, function_call);
    Arc::new(FunctionClass { core })
}

fn function_arity(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(match recv {
        Value::Function(function) => Value::Number(function.arity as f64),
        _ => Value::Null,
    })
}

fn function_name(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(match recv {
        Value::Function(function) => Value::string(&function.name),
        _ => Value::Null,
    })
}

/// call(args...) - invoke with the given arguments
fn function_call(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    interp.call_value(recv, args.to_vec())
}

#[cfg(test)]
mod tests {
    use crate::interpreter::Interpreter;
    use crate::runtime::BufferSink;
    use std::sync::Arc;

    #[test]
    fn test_bound_method_value_keeps_receiver() {
        let mut interp = Interpreter::builder().sink(Arc::new(BufferSink::new())).build();
        let value = interp
            .run_source(
                "class Box { var v = 4; fun get() { return this.v; } } local f = new Box().get; f() + f.call() + f.arity();",
                "test.sbl",
            )
            .unwrap();
        assert_eq!(value.as_number(), Some(8.0));
    }
}
