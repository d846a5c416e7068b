// Boolean built-in class
// `&&` and `||` live here: the right operand is only evaluated when the
// left one does not already decide the result.

use crate::ast::Operator;
use crate::error::EvalResult;
use crate::interpreter::Interpreter;
use crate::runtime::class::{object_binary, operator_error};
use crate::runtime::{ClassCore, ClassDefinition, ClassRef, Rhs, Value};
use std::sync::Arc;

struct BooleanClass {
    core: ClassCore,
}

impl ClassDefinition for BooleanClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    fn binary(&self, interp: &mut Interpreter, left: &Value, op: Operator, rhs: Rhs<'_>) -> EvalResult {
        let Value::Boolean(l) = left else {
            return Err(operator_error(interp, op, left));
        };
        match op {
            Operator::And if !*l => Ok(Value::Boolean(false)),
            Operator::Or if *l => Ok(Value::Boolean(true)),
            Operator::And | Operator::Or => {
                let right = rhs(interp)?;
                let r = interp.expect_boolean(right, &format!("Right operand of {}", op))?;
                Ok(Value::Boolean(r))
            }
            _ => object_binary(interp, left, op, rhs),
        }
    }

    fn unary(&self, interp: &mut Interpreter, operand: &Value, op: Operator) -> EvalResult {
        match (op, operand) {
            (Operator::Bang, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
            _ => Err(operator_error(interp, op, operand)),
        }
    }

    fn to_string(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        Ok(match value {
            Value::Boolean(true) => "true",
            _ => "false",
        }
        .to_string())
    }
}

pub fn create_boolean_class(object: ClassRef) -> ClassRef {
    Arc::new(BooleanClass {
        core: ClassCore::new("Boolean").extends(object),
    })
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
    fn test_and_skips_right_operand() {
        let value = run("local hits = 0; fun touch() { hits = hits + 1; return true; } false && touch(); true || touch(); hits;");
        assert_eq!(value.as_number(), Some(0.0));
    }

    #[test]
    fn test_or_evaluates_right_operand_when_needed() {
        let value = run("local hits = 0; fun touch() { hits = hits + 1; return true; } local r = false || touch(); hits;");
        assert_eq!(value.as_number(), Some(1.0));
    }

    #[test]
    fn test_not() {
        assert!(matches!(run("!false;"), Value::Boolean(true)));
    }
}
