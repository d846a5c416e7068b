// List built-in class
// Equality and hashing are structural. Both work on a snapshot so no lock
// is held while element definitions run script code.

use super::{get_function_arg, get_index_arg, get_string_arg, repr};
use crate::ast::Operator;
use crate::error::{runtime_error, ErrorKind, EvalResult};
use crate::interpreter::Interpreter;
use crate::runtime::class::{object_binary, operator_error};
use crate::runtime::{ClassCore, ClassDefinition, ClassRef, Rhs, Value};
use parking_lot::RwLock;
use rustc_hash::FxHasher;
use std::hash::Hasher;
use std::sync::Arc;

struct ListClass {
    core: ClassCore,
}

fn items(value: &Value) -> Option<&Arc<RwLock<Vec<Value>>>> {
    match value {
        Value::List(items) => Some(items),
        _ => None,
    }
}

fn snapshot(value: &Value) -> Vec<Value> {
    items(value).map(|items| items.read().clone()).unwrap_or_default()
}

fn out_of_bounds(index: usize, len: usize) -> crate::error::Unwind {
    runtime_error(
        ErrorKind::IndexError,
        format!("Index {} out of bounds for list of length {}", index, len),
    )
}

impl ClassDefinition for ListClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    fn binary(&self, interp: &mut Interpreter, left: &Value, op: Operator, rhs: Rhs<'_>) -> EvalResult {
        if op != Operator::Plus {
            return object_binary(interp, left, op, rhs);
        }
        let right = rhs(interp)?;
        if !matches!(right, Value::List(_)) {
            return Err(operator_error(interp, op, &right));
        }
        let mut joined = snapshot(left);
        joined.extend(snapshot(&right));
        Ok(Value::list(joined))
    }

    fn bracket_access(&self, interp: &mut Interpreter, target: &Value, index: Value) -> EvalResult {
        let i = get_index_arg(interp, &index, "index")?;
        let Some(items) = items(target) else {
            return Err(operator_error(interp, Operator::Index, target));
        };
        let items = items.read();
        items.get(i).cloned().ok_or_else(|| out_of_bounds(i, items.len()))
    }

    fn bracket_assign(&self, interp: &mut Interpreter, target: &Value, index: Value, value: Value) -> EvalResult<()> {
        let i = get_index_arg(interp, &index, "index")?;
        let Some(items) = items(target) else {
            return Err(operator_error(interp, Operator::IndexSet, target));
        };
        let mut items = items.write();
        let len = items.len();
        match items.get_mut(i) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(out_of_bounds(i, len)),
        }
    }

    fn equals(&self, interp: &mut Interpreter, left: &Value, right: &Value) -> EvalResult<bool> {
        if left.identical(right) {
            return Ok(true);
        }
        if !matches!(right, Value::List(_)) {
            return Ok(false);
        }
        let (a, b) = (snapshot(left), snapshot(right));
        if a.len() != b.len() {
            return Ok(false);
        }
        for (x, y) in a.iter().zip(&b) {
            if !interp.values_equal(x, y)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn hash(&self, interp: &mut Interpreter, value: &Value) -> EvalResult<u64> {
        let mut hasher = FxHasher::default();
        for item in snapshot(value) {
            hasher.write_u64(interp.hash_value(&item)?);
        }
        Ok(hasher.finish())
    }

    fn to_string(&self, interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        let parts = snapshot(value)
            .iter()
            .map(|item| repr(interp, item))
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(format!("[{}]", parts.join(", ")))
    }

    fn copy(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult {
        Ok(Value::list(snapshot(value)))
    }

    fn iterate(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult<Vec<Value>> {
        Ok(snapshot(value))
    }
}

pub fn create_list_class(object: ClassRef) -> ClassRef {
    let core = ClassCore::new("List")
        .extends(object)
        .constructor(-1, list_new)
        .method("length", 0, list_length)
        .method("isEmpty", 0, list_is_empty)
        .method("append", 1, list_append)
        .method("get", 1, list_get)
        .method("set", 2, list_set)
        .method("insert", 2, list_insert)
        .method("removeAt", 1, list_remove_at)
        .method("pop", 0, list_pop)
        .method("clear", 0, list_clear)
        .method("contains", 1, list_contains)
        .method("indexOf", 1, list_index_of)
        .method("first", 0, list_first)
        .method("last", 0, list_last)
        .method("join", 1, list_join)
        .method("map", 1, list_map)
        .method("copy", 0, list_copy);
    Arc::new(ListClass { core })
}

/// List(a, b, ...) - a list of the arguments
fn list_new(args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::list(args.to_vec()))
}

fn list_length(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Number(items(recv).map_or(0, |items| items.read().len()) as f64))
}

fn list_is_empty(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Boolean(items(recv).map_or(true, |items| items.read().is_empty())))
}

fn list_append(recv: &Value, args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    if let Some(items) = items(recv) {
        items.write().push(args[0].clone());
    }
    Ok(recv.clone())
}

fn list_get(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let definition = interp.definition_of(recv);
    definition.bracket_access(interp, recv, args[0].clone())
}

fn list_set(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let definition = interp.definition_of(recv);
    definition.bracket_assign(interp, recv, args[0].clone(), args[1].clone())?;
    Ok(args[1].clone())
}

fn list_insert(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let i = get_index_arg(interp, &args[0], "index")?;
    let Some(items) = items(recv) else {
        return Ok(Value::Null);
    };
    let mut items = items.write();
    if i > items.len() {
        return Err(out_of_bounds(i, items.len()));
    }
    items.insert(i, args[1].clone());
    Ok(Value::Null)
}

fn list_remove_at(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let i = get_index_arg(interp, &args[0], "index")?;
    let Some(items) = items(recv) else {
        return Ok(Value::Null);
    };
    let mut items = items.write();
    if i >= items.len() {
        return Err(out_of_bounds(i, items.len()));
    }
    Ok(items.remove(i))
}

/// pop() - remove and return the last element, null when empty
fn list_pop(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(items(recv).and_then(|items| items.write().pop()).unwrap_or(Value::Null))
}

fn list_clear(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    if let Some(items) = items(recv) {
        items.write().clear();
    }
    Ok(Value::Null)
}

fn position(recv: &Value, needle: &Value, interp: &mut Interpreter) -> EvalResult<Option<usize>> {
    for (index, item) in snapshot(recv).iter().enumerate() {
        if interp.values_equal(item, needle)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn list_contains(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Boolean(position(recv, &args[0], interp)?.is_some()))
}

fn list_index_of(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Number(match position(recv, &args[0], interp)? {
        Some(index) => index as f64,
        None => -1.0,
    }))
}

fn list_first(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(items(recv).and_then(|items| items.read().first().cloned()).unwrap_or(Value::Null))
}

fn list_last(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(items(recv).and_then(|items| items.read().last().cloned()).unwrap_or(Value::Null))
}

fn list_join(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let separator = get_string_arg(interp, &args[0], "separator")?;
    let parts = snapshot(recv)
        .iter()
        .map(|item| interp.stringify(item))
        .collect::<EvalResult<Vec<_>>>()?;
    Ok(Value::string(parts.join(&separator)))
}

/// map(f) - a new list of f(item) for each item
fn list_map(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let function = get_function_arg(interp, &args[0], "mapper")?;
    let mut mapped = Vec::new();
    for item in snapshot(recv) {
        mapped.push(interp.invoke(&function, None, vec![item])?);
    }
    Ok(Value::list(mapped))
}

fn list_copy(recv: &Value, _args: &[Value], interp: &mut Interpreter) -> EvalResult {
    interp.copy_value(recv)
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
    fn test_structural_equality() {
        assert!(matches!(run("[1, [2, \"x\"]] == [1, [2, \"x\"]];").unwrap(), Value::Boolean(true)));
        assert!(matches!(run("[1, 2] == [2, 1];").unwrap(), Value::Boolean(false)));
    }

    #[test]
    fn test_self_containing_list_overflows_catchably() {
        let error = run("local l = []; l.append(l); print(l);").unwrap_err();
        assert_eq!(error.kind, ErrorKind::StackOverflow);

        let value = run(
            "local l = [1]; l.append(l); local caught = false; try { str(l); } catch (e: StackOverflow) { caught = true; } caught && len(l) == 2;",
        )
        .unwrap();
        assert!(matches!(value, Value::Boolean(true)));
    }

    #[test]
    fn test_self_containing_list_as_map_key() {
        let error = run("local l = []; l.append(l); local m = {}; m[l] = 1;").unwrap_err();
        assert_eq!(error.kind, ErrorKind::StackOverflow);
    }

    #[test]
    fn test_out_of_bounds_assignment() {
        let error = run("local xs = [1]; xs[1] = 2;").unwrap_err();
        assert_eq!(error.kind, ErrorKind::IndexError);
        assert_eq!(error.message, "Index 1 out of bounds for list of length 1");
    }

    #[test]
    fn test_mutation_methods() {
        let value = run("local xs = List(3, 1); xs.append(4); xs.insert(0, 9); xs.removeAt(1); xs.join(\"-\");").unwrap();
        assert_eq!(value.as_str(), Some("9-1-4"));
    }

    #[test]
    fn test_copy_is_shallow() {
        let value = run("local inner = [1]; local a = [inner]; local b = a.copy(); inner.append(2); b.append(3); a.length() * 10 + b[0].length();").unwrap();
        assert_eq!(value.as_number(), Some(12.0));
    }

    #[test]
    fn test_to_string_quotes_strings() {
        let value = run("local xs = [1, \"a\", null]; xs.toString();").unwrap();
        assert_eq!(value.as_str(), Some("[1, \"a\", null]"));
    }
}
