// Null built-in class

use crate::error::EvalResult;
use crate::interpreter::Interpreter;
use crate::runtime::{ClassCore, ClassDefinition, ClassRef, Value};
use std::sync::Arc;

struct NullClass {
    core: ClassCore,
}

impl ClassDefinition for NullClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    fn to_string(&self, _interp: &mut Interpreter, _value: &Value) -> EvalResult<String> {
        Ok("null".to_string())
    }
}

pub fn create_null_class(object: ClassRef) -> ClassRef {
    Arc::new(NullClass {
        core: ClassCore::new("Null").extends(object),
    })
}
