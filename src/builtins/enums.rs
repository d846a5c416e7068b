// Enum built-in class
// Base of every script enum. Constants order by ordinal.

use crate::ast::Operator;
use crate::error::EvalResult;
use crate::interpreter::Interpreter;
use crate::runtime::class::object_binary;
use crate::runtime::{ClassCore, ClassDefinition, ClassRef, EnumTag, Rhs, Value};
use std::sync::Arc;

struct EnumClass {
    core: ClassCore,
}

fn tag(value: &Value) -> Option<&EnumTag> {
    value.as_object().and_then(|object| object.tag.as_ref())
}

impl ClassDefinition for EnumClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    fn binary(&self, interp: &mut Interpreter, left: &Value, op: Operator, rhs: Rhs<'_>) -> EvalResult {
        let relational = matches!(
            op,
            Operator::Less | Operator::LessEqual | Operator::Greater | Operator::GreaterEqual
        );
        let Some(left_tag) = tag(left).filter(|_| relational) else {
            return object_binary(interp, left, op, rhs);
        };
        let a = left_tag.ordinal;
        let right = rhs(interp)?;
        let same_enum = right
            .as_object()
            .zip(left.as_object())
            .is_some_and(|(r, l)| Arc::ptr_eq(&r.class, &l.class));
        let Some(b) = tag(&right).filter(|_| same_enum).map(|t| t.ordinal) else {
            return Err(crate::error::runtime_error(
                crate::error::ErrorKind::TypeError,
                format!(
                    "Cannot compare {} with {}",
                    interp.type_name(left),
                    interp.type_name(&right)
                ),
            ));
        };
        Ok(Value::Boolean(match op {
            Operator::Less => a < b,
            Operator::LessEqual => a <= b,
            Operator::Greater => a > b,
            _ => a >= b,
        }))
    }

    fn to_string(&self, interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        Ok(match tag(value) {
            Some(tag) => tag.name.clone(),
            None => format!("<{} instance>", interp.type_name(value)),
        })
    }
}

pub fn create_enum_class(object: ClassRef) -> ClassRef {
    let core = ClassCore::new("Enum")
        .extends(object)
        .method("name", 0, enum_name)
        .method("ordinal", 0, enum_ordinal);
    Arc::new(EnumClass { core })
}

fn enum_name(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(tag(recv).map(|tag| Value::string(&tag.name)).unwrap_or(Value::Null))
}

fn enum_ordinal(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(tag(recv)
        .map(|tag| Value::Number(tag.ordinal as f64))
        .unwrap_or(Value::Null))
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
    fn test_constants_order_by_ordinal() {
        assert!(matches!(run("enum Size { S, M, L; } Size.S < Size.L;"), Value::Boolean(true)));
        assert!(matches!(run("enum Size { S, M, L; } Size.M >= Size.L;"), Value::Boolean(false)));
    }

    #[test]
    fn test_constant_names_and_values() {
        let value = run("enum Size { S, M, L; } local out = \"\"; foreach (s : Size.values()) { out = out + s + s.ordinal(); } out;");
        assert_eq!(value.as_str(), Some("S0M1L2"));
    }

    #[test]
    fn test_constants_are_identical_across_reads() {
        assert!(matches!(run("enum Dir { UP, DOWN; } Dir.UP == Dir.UP && Dir.UP != Dir.DOWN;"), Value::Boolean(true)));
    }
}
