// Object built-in class
// Root of every lineage. Its methods answer with the nearest native
// behavior so `super.toString()` and friends never loop back into the
// script override that called them.

use crate::error::EvalResult;
use crate::interpreter::Interpreter;
use crate::runtime::{ClassCore, ClassDefinition, ClassRef, Value};
use std::sync::Arc;

struct ObjectClass {
    core: ClassCore,
}

impl ClassDefinition for ObjectClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }
}

pub fn create_object_class() -> ClassRef {
    let core = ClassCore::new("Object")
        .extendable()
        .method("toString", 0, object_to_string)
        .method("equals", 1, object_equals)
        .method("hashCode", 0, object_hash_code);
    Arc::new(ObjectClass { core })
}

/// First definition in the value's lineage that is not script-defined
fn native_definition(interp: &Interpreter, value: &Value) -> ClassRef {
    let mut definition = interp.definition_of(value);
    while definition.as_user().is_some() {
        match definition.superclass().cloned() {
            Some(parent) => definition = parent,
            None => break,
        }
    }
    definition
}

fn object_to_string(recv: &Value, _args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let definition = native_definition(interp, recv);
    Ok(Value::string(definition.to_string(interp, recv)?))
}

fn object_equals(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let definition = native_definition(interp, recv);
    Ok(Value::Boolean(definition.equals(interp, recv, &args[0])?))
}

fn object_hash_code(recv: &Value, _args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let definition = native_definition(interp, recv);
    let hash = definition.hash(interp, recv)?;
    // Keep it exactly representable as a Number
    Ok(Value::Number((hash >> 11) as f64))
}

#[cfg(test)]
mod tests {
    use crate::interpreter::Interpreter;
    use crate::runtime::BufferSink;
    use std::sync::Arc;

    fn run_str(source: &str) -> String {
        let mut interp = Interpreter::builder().sink(Arc::new(BufferSink::new())).build();
        let value = interp.run_source(source, "test.sbl").unwrap();
        value.as_str().map(String::from).unwrap_or_default()
    }

    #[test]
    fn test_super_to_string_uses_native_form() {
        let source = "
            class Point { fun toString() { return \"P\" + super.toString(); } }
            new Point().toString();
        ";
        assert_eq!(run_str(source), "P<Point instance>");
    }

    #[test]
    fn test_primitive_to_string_through_object() {
        assert_eq!(run_str("local n = 12; n.toString();"), "12");
    }
}
