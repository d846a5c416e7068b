// Sable Built-in Module
// The primitive class lineage every value belongs to, plus the native
// functions registered before any user code runs

mod boolean;
pub mod error;
mod enums;
mod function;
mod functions;
mod list;
pub mod map;
mod null;
mod number;
mod object;
mod string;
mod task;
mod thread;
mod types;

use crate::error::{runtime_error, ErrorKind, EvalResult};
use crate::interpreter::Interpreter;
use crate::runtime::{ClassRef, Value};

pub use functions::register_natives;

/// Definitions of the built-in types, looked up by value variant
pub struct Primitives {
    pub object: ClassRef,
    pub null: ClassRef,
    pub boolean: ClassRef,
    pub number: ClassRef,
    pub string: ClassRef,
    pub list: ClassRef,
    pub map: ClassRef,
    pub function: ClassRef,
    pub error: ClassRef,
    pub type_: ClassRef,
    pub enumeration: ClassRef,
    pub thread: ClassRef,
    pub task: ClassRef,
    pub future: ClassRef,
    /// One `Error` subclass per catchable error kind
    pub errors: Vec<(ErrorKind, ClassRef)>,
}

impl Primitives {
    /// Class thrown for runtime errors of `kind`
    pub fn error_class(&self, kind: ErrorKind) -> ClassRef {
        self.errors
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, class)| class.clone())
            .unwrap_or_else(|| self.error.clone())
    }

    pub fn all(&self) -> Vec<ClassRef> {
        let mut classes = vec![
            self.object.clone(),
            self.null.clone(),
            self.boolean.clone(),
            self.number.clone(),
            self.string.clone(),
            self.list.clone(),
            self.map.clone(),
            self.function.clone(),
            self.error.clone(),
            self.type_.clone(),
            self.enumeration.clone(),
            self.thread.clone(),
            self.task.clone(),
            self.future.clone(),
        ];
        classes.extend(self.errors.iter().map(|(_, class)| class.clone()));
        classes
    }
}

/// Create all built-in type classes
pub fn create_primitives() -> Primitives {
    let object = object::create_object_class();
    let error = error::create_error_class(object.clone());
    let errors = ErrorKind::CATCHABLE
        .into_iter()
        .map(|kind| (kind, error::create_error_kind_class(kind, error.clone())))
        .collect();
    Primitives {
        null: null::create_null_class(object.clone()),
        boolean: boolean::create_boolean_class(object.clone()),
        number: number::create_number_class(object.clone()),
        string: string::create_string_class(object.clone()),
        list: list::create_list_class(object.clone()),
        map: map::create_map_class(object.clone()),
        function: function::create_function_class(object.clone()),
        type_: types::create_type_class(object.clone()),
        enumeration: enums::create_enum_class(object.clone()),
        thread: thread::create_thread_class(object.clone()),
        task: task::create_task_class(object.clone()),
        future: task::create_future_class(object.clone()),
        error,
        errors,
        object,
    }
}

/// Helper: get number argument
pub fn get_number_arg(interp: &Interpreter, value: &Value, arg_name: &str) -> EvalResult<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(runtime_error(
            ErrorKind::TypeError,
            format!("Expected {} to be a Number, got {}", arg_name, interp.type_name(value)),
        )),
    }
}

/// Helper: get a non-negative whole number argument, e.g. an index
pub fn get_index_arg(interp: &Interpreter, value: &Value, arg_name: &str) -> EvalResult<usize> {
    let n = get_number_arg(interp, value, arg_name)?;
    if n.fract() != 0.0 || n < 0.0 {
        return Err(runtime_error(
            ErrorKind::ArgumentError,
            format!("Expected {} to be a non-negative integer, got {}", arg_name, n),
        ));
    }
    Ok(n as usize)
}

/// Helper: get string argument
pub fn get_string_arg(interp: &Interpreter, value: &Value, arg_name: &str) -> EvalResult<String> {
    match value {
        Value::String(s) => Ok(s.to_string()),
        _ => Err(runtime_error(
            ErrorKind::TypeError,
            format!("Expected {} to be a String, got {}", arg_name, interp.type_name(value)),
        )),
    }
}

/// Helper: get function argument
pub fn get_function_arg(
    interp: &Interpreter,
    value: &Value,
    arg_name: &str,
) -> EvalResult<std::sync::Arc<crate::runtime::Function>> {
    match value {
        Value::Function(f) => Ok(f.clone()),
        _ => Err(runtime_error(
            ErrorKind::TypeError,
            format!("Expected {} to be a Function, got {}", arg_name, interp.type_name(value)),
        )),
    }
}

/// How a value prints inside a collection: strings quoted
pub fn repr(interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
    match value {
        Value::String(s) => Ok(format!("{:?}", s.as_ref())),
        other => interp.stringify(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_every_primitive_descends_from_object() {
        let primitives = create_primitives();
        for class in primitives.all() {
            assert!(class.is_subclass_of(&primitives.object), "{}", class.name());
        }
    }

    #[test]
    fn test_error_kinds_extend_error() {
        let primitives = create_primitives();
        let type_error = primitives.error_class(ErrorKind::TypeError);
        assert_eq!(type_error.name(), "TypeError");
        assert!(type_error.is_subclass_of(&primitives.error));
        assert!(Arc::ptr_eq(&primitives.error_class(ErrorKind::Fatal), &primitives.error));
    }

    #[test]
    fn test_sealed_primitives() {
        let primitives = create_primitives();
        assert!(primitives.object.core().can_extend);
        assert!(!primitives.object.core().can_construct);
        assert!(primitives.error.core().can_extend);
        assert!(!primitives.number.core().can_extend);
        assert!(!primitives.enumeration.core().can_extend);
    }
}
