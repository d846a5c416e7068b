// Type built-in class
// Definition of class values themselves: static member access, static
// calls, and construction by calling the class.

use crate::error::{fatal_error, runtime_error, ErrorKind, EvalResult};
use crate::interpreter::Interpreter;
use crate::runtime::{ClassCore, ClassDefinition, ClassRef, Value};
use std::sync::Arc;

struct TypeClass {
    core: ClassCore,
}

fn class_of(value: &Value) -> Option<&ClassRef> {
    match value {
        Value::Type(class) => Some(class),
        _ => None,
    }
}

impl ClassDefinition for TypeClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    /// Static field, else a static function as a value
    fn member_access(&self, interp: &mut Interpreter, target: &Value, name: &str) -> EvalResult {
        let Some(class) = class_of(target) else {
            return Err(fatal_error(format!("{} is not a class", interp.type_name(target))));
        };
        let core = class.core();
        if let Some(value) = core.static_field(name) {
            return Ok(value);
        }
        if let Some(function) = core.find_static_named(name) {
            return Ok(Value::Function(function));
        }
        Err(runtime_error(
            ErrorKind::NoSuchMethod,
            format!("Class '{}' has no static member '{}'", class.name(), name),
        ))
    }

    fn member_assign(&self, _interp: &mut Interpreter, target: &Value, name: &str, value: Value) -> EvalResult<()> {
        let Some(class) = class_of(target) else {
            return Ok(());
        };
        if class.core().assign_static_field(name, value) {
            return Ok(());
        }
        Err(runtime_error(
            ErrorKind::TypeError,
            format!("Class '{}' has no static field '{}'", class.name(), name),
        ))
    }

    /// Static method of the class, else a method every class answers
    fn call_member(&self, interp: &mut Interpreter, target: &Value, name: &str, args: Vec<Value>) -> EvalResult {
        if let Some(class) = class_of(target) {
            if let Some(function) = class.core().find_static(name, args.len()) {
                return interp.invoke(&function, None, args);
            }
            if let Some(field) = class.core().static_field(name) {
                if interp.definition_of(&field).is_callable(&field) {
                    return interp.call_value(&field, args);
                }
            }
        }
        if let Some(method) = self.core.find_method(name, args.len()) {
            return interp.invoke(&method, Some(target), args);
        }
        Err(runtime_error(
            ErrorKind::NoSuchMethod,
            format!(
                "No static method '{}' accepting {} argument(s) on class {}",
                name,
                args.len(),
                class_of(target).map_or("?", |class| class.name())
            ),
        ))
    }

    fn is_callable(&self, _value: &Value) -> bool {
        true
    }

    /// Calling a class constructs an instance
    fn call(&self, interp: &mut Interpreter, callee: &Value, args: Vec<Value>) -> EvalResult {
        match class_of(callee) {
            Some(class) => class.construct(interp, args),
            None => Err(runtime_error(ErrorKind::TypeError, "Value is not a class")),
        }
    }

    fn to_string(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        Ok(match class_of(value) {
            Some(class) => format!("<class {}>", class.name()),
            None => "<class>".to_string(),
        })
    }
}

pub fn create_type_class(object: ClassRef) -> ClassRef {
    let core = ClassCore::new("Type")
        .extends(object)
        .method("getName", 0, type_get_name)
        .method("getSuperclass", 0, type_get_superclass)
        .method("isSubclassOf", 1, type_is_subclass_of)
        .method("values", 0, type_values);
    Arc::new(TypeClass { core })
}

fn type_get_name(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(class_of(recv).map(|class| Value::string(class.name())).unwrap_or(Value::Null))
}

fn type_get_superclass(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(class_of(recv)
        .and_then(|class| class.superclass().cloned())
        .map(Value::Type)
        .unwrap_or(Value::Null))
}

fn type_is_subclass_of(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    match (class_of(recv), class_of(&args[0])) {
        (Some(class), Some(other)) => Ok(Value::Boolean(class.is_subclass_of(other))),
        _ => Err(runtime_error(
            ErrorKind::TypeError,
            format!("Expected a class, got {}", interp.type_name(&args[0])),
        )),
    }
}

/// values() - the constants of an enum, in declaration order
fn type_values(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    let Some(class) = class_of(recv) else {
        return Ok(Value::Null);
    };
    match class.as_user().filter(|user| user.is_enum()) {
        Some(user) => Ok(Value::list(user.enum_constants.read().clone())),
        None => Err(runtime_error(
            ErrorKind::TypeError,
            format!("'{}' is not an enum", class.name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::interpreter::Interpreter;
    use crate::runtime::{BufferSink, Value};
    use std::sync::Arc;

    fn run(source: &str) -> crate::error::SableResult<Value> {
        let mut interp = Interpreter::builder().sink(Arc::new(BufferSink::new())).build();
        interp.run_source(source, "test.sbl")
    }

    #[test]
    fn test_static_methods_and_fields() {
        let source = "
            class Counter {
                static var count = 0;
                static fun bump(by) { Counter.count = Counter.count + by; return Counter.count; }
            }
            Counter.bump(2);
            Counter.bump(3);
        ";
        assert_eq!(run(source).unwrap().as_number(), Some(5.0));
    }

    #[test]
    fn test_unknown_static_field_assignment() {
        let error = run("class A { } A.nope = 1;").unwrap_err();
        assert_eq!(error.kind, ErrorKind::TypeError);
        assert_eq!(error.message, "Class 'A' has no static field 'nope'");
    }

    #[test]
    fn test_class_reflection() {
        let value = run("class A { } class B : A { } B.getSuperclass().getName() + B.isSubclassOf(A);").unwrap();
        assert_eq!(value.as_str(), Some("Atrue"));
    }
}
