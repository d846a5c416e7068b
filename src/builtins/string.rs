// String built-in class
// Instance methods for string manipulation. Indices count characters,
// not bytes.

use super::{get_index_arg, get_number_arg, get_string_arg};
use crate::ast::Operator;
use crate::error::{runtime_error, ErrorKind, EvalResult};
use crate::interpreter::Interpreter;
use crate::runtime::class::{object_binary, operator_error};
use crate::runtime::{ClassCore, ClassDefinition, ClassRef, Rhs, Value};
use std::sync::Arc;

struct StringClass {
    core: ClassCore,
}

impl ClassDefinition for StringClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    fn binary(&self, interp: &mut Interpreter, left: &Value, op: Operator, rhs: Rhs<'_>) -> EvalResult {
        let Value::String(s) = left else {
            return Err(operator_error(interp, op, left));
        };
        match op {
            Operator::Plus => {
                let right = rhs(interp)?;
                let text = interp.stringify(&right)?;
                Ok(Value::string(format!("{}{}", s, text)))
            }
            Operator::Star => {
                let right = rhs(interp)?;
                let count = get_index_arg(interp, &right, "repeat count")?;
                Ok(Value::string(s.repeat(count)))
            }
            Operator::Less | Operator::LessEqual | Operator::Greater | Operator::GreaterEqual => {
                let right = rhs(interp)?;
                let Value::String(other) = &right else {
                    return Err(runtime_error(
                        ErrorKind::TypeError,
                        format!("Cannot compare String with {}", interp.type_name(&right)),
                    ));
                };
                let ordering = s.as_ref().cmp(other.as_ref());
                Ok(Value::Boolean(match op {
                    Operator::Less => ordering.is_lt(),
                    Operator::LessEqual => ordering.is_le(),
                    Operator::Greater => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
            _ => object_binary(interp, left, op, rhs),
        }
    }

    fn bracket_access(&self, interp: &mut Interpreter, target: &Value, index: Value) -> EvalResult {
        let text = receiver(target);
        let i = get_index_arg(interp, &index, "index")?;
        match text.chars().nth(i) {
            Some(c) => Ok(Value::string(c.to_string())),
            None => Err(runtime_error(
                ErrorKind::IndexError,
                format!("Index {} out of bounds for string of length {}", i, text.chars().count()),
            )),
        }
    }

    fn to_string(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        Ok(receiver(value).to_string())
    }

    fn iterate(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult<Vec<Value>> {
        Ok(receiver(value)
            .chars()
            .map(|c| Value::string(c.to_string()))
            .collect())
    }
}

pub fn create_string_class(object: ClassRef) -> ClassRef {
    let core = ClassCore::new("String")
        .extends(object)
        .method("length", 0, string_length)
        .method("upper", 0, string_upper)
        .method("lower", 0, string_lower)
        .method("trim", 0, string_trim)
        .method("contains", 1, string_contains)
        .method("startsWith", 1, string_starts_with)
        .method("endsWith", 1, string_ends_with)
        .method("charAt", 1, string_char_at)
        .method("indexOf", 1, string_index_of)
        .method("replace", 2, string_replace)
        .method("split", 1, string_split)
        .method("substring", 1, string_substring)
        .method("substring", 2, string_substring)
        .method("toString", 0, string_to_string);
    Arc::new(StringClass { core })
}

fn receiver(recv: &Value) -> &str {
    recv.as_str().unwrap_or_default()
}

fn string_length(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Number(receiver(recv).chars().count() as f64))
}

fn string_upper(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::string(receiver(recv).to_uppercase()))
}

fn string_lower(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::string(receiver(recv).to_lowercase()))
}

fn string_trim(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::string(receiver(recv).trim()))
}

fn string_contains(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let needle = get_string_arg(interp, &args[0], "search")?;
    Ok(Value::Boolean(receiver(recv).contains(&needle)))
}

fn string_starts_with(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let prefix = get_string_arg(interp, &args[0], "prefix")?;
    Ok(Value::Boolean(receiver(recv).starts_with(&prefix)))
}

fn string_ends_with(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let suffix = get_string_arg(interp, &args[0], "suffix")?;
    Ok(Value::Boolean(receiver(recv).ends_with(&suffix)))
}

/// charAt(index) - null past the end
fn string_char_at(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let index = get_index_arg(interp, &args[0], "index")?;
    Ok(receiver(recv)
        .chars()
        .nth(index)
        .map(|c| Value::string(c.to_string()))
        .unwrap_or(Value::Null))
}

/// indexOf(search) - character index of the first match, or -1
fn string_index_of(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let search = get_string_arg(interp, &args[0], "search")?;
    let text = receiver(recv);
    Ok(Value::Number(match text.find(&search) {
        Some(byte) => text[..byte].chars().count() as f64,
        None => -1.0,
    }))
}

fn string_replace(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let from = get_string_arg(interp, &args[0], "pattern")?;
    let to = get_string_arg(interp, &args[1], "replacement")?;
    Ok(Value::string(receiver(recv).replace(&from, &to)))
}

fn string_split(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let separator = get_string_arg(interp, &args[0], "separator")?;
    let text = receiver(recv);
    let parts: Vec<Value> = if separator.is_empty() {
        text.chars().map(|c| Value::string(c.to_string())).collect()
    } else {
        text.split(separator.as_str()).map(Value::string).collect()
    };
    Ok(Value::list(parts))
}

/// substring(start, end?) - clamped to the string
fn string_substring(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let chars: Vec<char> = receiver(recv).chars().collect();
    let start = get_number_arg(interp, &args[0], "start")?.max(0.0) as usize;
    let end = match args.get(1) {
        Some(end) => get_number_arg(interp, end, "end")?.max(0.0) as usize,
        None => chars.len(),
    }
    .min(chars.len());
    if start >= end {
        return Ok(Value::string(""));
    }
    Ok(Value::string(chars[start..end].iter().collect::<String>()))
}

fn string_to_string(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(recv.clone())
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

    fn run_str(source: &str) -> String {
        run(source).unwrap().as_str().map(String::from).unwrap_or_default()
    }

    #[test]
    fn test_concatenation_stringifies_right_operand() {
        assert_eq!(run_str("\"n = \" + 4 + \", \" + true;"), "n = 4, true");
    }

    #[test]
    fn test_repeat_and_compare() {
        assert_eq!(run_str("\"ab\" * 3;"), "ababab");
        assert!(matches!(run("\"apple\" < \"banana\";").unwrap(), Value::Boolean(true)));
    }

    #[test]
    fn test_index_out_of_bounds() {
        let error = run("local s = \"abc\"; s[3];").unwrap_err();
        assert_eq!(error.kind, ErrorKind::IndexError);
        assert_eq!(error.message, "Index 3 out of bounds for string of length 3");
    }

    #[test]
    fn test_methods() {
        assert_eq!(run_str("local s = \"  Hello World  \"; s.trim().lower().replace(\"world\", \"there\");"), "hello there");
        assert_eq!(run_str("local s = \"héllo\"; s.substring(1, 3);"), "él");
        assert_eq!(run("local s = \"a,b,c\"; s.split(\",\").length();").unwrap().as_number(), Some(3.0));
    }
}
