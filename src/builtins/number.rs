// Number built-in class
// Arithmetic, comparison and bitwise operators. Bitwise operators work on
// the 64-bit integer part.

use crate::ast::Operator;
use crate::error::{runtime_error, ErrorKind, EvalResult};
use crate::interpreter::Interpreter;
use crate::runtime::class::{object_binary, operator_error};
use crate::runtime::{format_number, ClassCore, ClassDefinition, ClassRef, Rhs, Value};
use std::sync::Arc;

struct NumberClass {
    core: ClassCore,
}

impl ClassDefinition for NumberClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    fn binary(&self, interp: &mut Interpreter, left: &Value, op: Operator, rhs: Rhs<'_>) -> EvalResult {
        let Value::Number(a) = left else {
            return Err(operator_error(interp, op, left));
        };
        let a = *a;
        if matches!(op, Operator::Equal | Operator::NotEqual | Operator::And | Operator::Or) {
            return object_binary(interp, left, op, rhs);
        }

        let right = rhs(interp)?;
        let Value::Number(b) = right else {
            return Err(runtime_error(
                ErrorKind::TypeError,
                format!(
                    "Cannot apply operator {} to Number and {}",
                    op,
                    interp.type_name(&right)
                ),
            ));
        };

        let value = match op {
            Operator::Plus => Value::Number(a + b),
            Operator::Minus => Value::Number(a - b),
            Operator::Star => Value::Number(a * b),
            Operator::Slash => {
                if b == 0.0 {
                    return Err(runtime_error(ErrorKind::DivisionByZero, "Division by zero"));
                }
                Value::Number(a / b)
            }
            Operator::Caret => Value::Number(a.powf(b)),
            Operator::Ampersand => Value::Number(((a as i64) & (b as i64)) as f64),
            Operator::Pipe => Value::Number(((a as i64) | (b as i64)) as f64),
            Operator::Tilde => Value::Number(((a as i64) ^ (b as i64)) as f64),
            Operator::ShiftLeft => Value::Number(shift(a, b, i64::checked_shl)),
            Operator::ShiftRight => Value::Number(shift(a, b, i64::checked_shr)),
            Operator::Less => Value::Boolean(a < b),
            Operator::LessEqual => Value::Boolean(a <= b),
            Operator::Greater => Value::Boolean(a > b),
            Operator::GreaterEqual => Value::Boolean(a >= b),
            _ => return Err(operator_error(interp, op, left)),
        };
        Ok(value)
    }

    fn unary(&self, interp: &mut Interpreter, operand: &Value, op: Operator) -> EvalResult {
        match (op, operand) {
            (Operator::Minus, Value::Number(n)) => Ok(Value::Number(-n)),
            (Operator::Tilde, Value::Number(n)) => Ok(Value::Number(!(*n as i64) as f64)),
            _ => Err(operator_error(interp, op, operand)),
        }
    }

    fn to_string(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        Ok(match value {
            Value::Number(n) => format_number(*n),
            _ => String::new(),
        })
    }
}

/// Shift amounts outside 0..64 yield zero
fn shift(a: f64, b: f64, op: fn(i64, u32) -> Option<i64>) -> f64 {
    if b < 0.0 {
        return 0.0;
    }
    op(a as i64, b as u32).unwrap_or(0) as f64
}

pub fn create_number_class(object: ClassRef) -> ClassRef {
    let core = ClassCore::new("Number")
        .extends(object)
        .method("floor", 0, number_floor)
        .method("ceil", 0, number_ceil)
        .method("round", 0, number_round)
        .method("abs", 0, number_abs)
        .method("sqrt", 0, number_sqrt)
        .method("isInteger", 0, number_is_integer);
    Arc::new(NumberClass { core })
}

fn receiver(recv: &Value) -> f64 {
    recv.as_number().unwrap_or(f64::NAN)
}

fn number_floor(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Number(receiver(recv).floor()))
}

fn number_ceil(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Number(receiver(recv).ceil()))
}

fn number_round(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Number(receiver(recv).round()))
}

fn number_abs(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Number(receiver(recv).abs()))
}

fn number_sqrt(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    let n = receiver(recv);
    if n < 0.0 {
        return Err(runtime_error(
            ErrorKind::ArgumentError,
            format!("Cannot take the square root of {}", format_number(n)),
        ));
    }
    Ok(Value::Number(n.sqrt()))
}

fn number_is_integer(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    let n = receiver(recv);
    Ok(Value::Boolean(n.is_finite() && n.fract() == 0.0))
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
    fn test_power_is_right_associative() {
        assert_eq!(run("2 ^ 3 ^ 2;").unwrap().as_number(), Some(512.0));
    }

    #[test]
    fn test_bitwise_operators() {
        assert_eq!(run("(6 & 3) + (6 | 3) + (6 ~ 3) + (1 << 4) + (-(~0));").unwrap().as_number(), Some(2.0 + 7.0 + 5.0 + 16.0 + 1.0));
    }

    #[test]
    fn test_division_by_zero() {
        let error = run("1 / 0;").unwrap_err();
        assert_eq!(error.kind, ErrorKind::DivisionByZero);
        assert_eq!(error.message, "Division by zero");
    }

    #[test]
    fn test_mixed_operands_are_type_errors() {
        let error = run("1 + \"a\";").unwrap_err();
        assert_eq!(error.kind, ErrorKind::TypeError);
        assert_eq!(error.message, "Cannot apply operator + to Number and String");
    }

    #[test]
    fn test_rounding_methods() {
        assert_eq!(run("local n = 2.5; n.floor() + n.ceil() + (-1.5).abs();").unwrap().as_number(), Some(6.5));
    }
}
