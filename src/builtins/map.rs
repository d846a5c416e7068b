// Map built-in class
// Keys are found by their definition's hash, then its equality. Both are
// computed before the map's lock is taken.

use super::repr;
use crate::error::EvalResult;
use crate::interpreter::Interpreter;
use crate::runtime::{ClassCore, ClassDefinition, ClassRef, Value, ValueMap};
use parking_lot::RwLock;
use std::sync::Arc;

type MapRef = Arc<RwLock<ValueMap>>;

struct MapClass {
    core: ClassCore,
}

fn entries(value: &Value) -> Option<&MapRef> {
    match value {
        Value::Map(map) => Some(map),
        _ => None,
    }
}

/// Where `key` sits in a map, as of `version`
struct Slot {
    hash: u64,
    index: Option<usize>,
    version: u64,
}

fn locate(interp: &mut Interpreter, map: &MapRef, key: &Value) -> EvalResult<Slot> {
    let hash = interp.hash_value(key)?;
    let (version, candidates) = {
        let guard = map.read();
        (guard.version(), guard.candidates(hash))
    };
    for (index, candidate) in candidates {
        if interp.values_equal(key, &candidate)? {
            return Ok(Slot { hash, index: Some(index), version });
        }
    }
    Ok(Slot { hash, index: None, version })
}

pub fn map_get(interp: &mut Interpreter, map: &MapRef, key: &Value) -> EvalResult<Option<Value>> {
    loop {
        let slot = locate(interp, map, key)?;
        let guard = map.read();
        // Another thread inserted or removed while equality was dispatched
        if guard.version() != slot.version {
            continue;
        }
        return Ok(slot.index.and_then(|index| guard.value_at(index)));
    }
}

pub fn map_insert(interp: &mut Interpreter, map: &MapRef, key: Value, value: Value) -> EvalResult<()> {
    loop {
        let slot = locate(interp, map, &key)?;
        let mut guard = map.write();
        if guard.version() != slot.version {
            continue;
        }
        match slot.index {
            Some(index) => {
                guard.replace_at(index, value);
            }
            None => guard.push(slot.hash, key, value),
        }
        return Ok(());
    }
}

pub fn map_remove(interp: &mut Interpreter, map: &MapRef, key: &Value) -> EvalResult<Option<Value>> {
    loop {
        let slot = locate(interp, map, key)?;
        let mut guard = map.write();
        if guard.version() != slot.version {
            continue;
        }
        return Ok(slot
            .index
            .and_then(|index| guard.remove_at(index))
            .map(|entry| entry.value));
    }
}

impl ClassDefinition for MapClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    /// Missing keys read as null
    fn bracket_access(&self, interp: &mut Interpreter, target: &Value, index: Value) -> EvalResult {
        match entries(target) {
            Some(map) => Ok(map_get(interp, map, &index)?.unwrap_or(Value::Null)),
            None => Ok(Value::Null),
        }
    }

    fn bracket_assign(&self, interp: &mut Interpreter, target: &Value, index: Value, value: Value) -> EvalResult<()> {
        match entries(target) {
            Some(map) => map_insert(interp, map, index, value),
            None => Ok(()),
        }
    }

    fn to_string(&self, interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        let snapshot: Vec<(Value, Value)> = entries(value)
            .map(|map| {
                map.read()
                    .entries()
                    .iter()
                    .map(|entry| (entry.key.clone(), entry.value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let mut parts = Vec::with_capacity(snapshot.len());
        for (key, value) in &snapshot {
            parts.push(format!("{}: {}", repr(interp, key)?, repr(interp, value)?));
        }
        Ok(format!("{{{}}}", parts.join(", ")))
    }

    fn copy(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult {
        let copied = entries(value).map(|map| map.read().clone()).unwrap_or_default();
        Ok(Value::map(copied))
    }

    /// Keys, in insertion order
    fn iterate(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult<Vec<Value>> {
        Ok(entries(value).map(|map| map.read().keys()).unwrap_or_default())
    }
}

pub fn create_map_class(object: ClassRef) -> ClassRef {
    let core = ClassCore::new("Map")
        .extends(object)
        .constructor(0, map_new)
        .method("get", 1, map_get_method)
        .method("put", 2, map_put)
        .method("containsKey", 1, map_contains_key)
        .method("remove", 1, map_remove_method)
        .method("keys", 0, map_keys)
        .method("values", 0, map_values)
        .method("length", 0, map_length)
        .method("isEmpty", 0, map_is_empty)
        .method("clear", 0, map_clear);
    Arc::new(MapClass { core })
}

fn map_new(_args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::map(ValueMap::new()))
}

fn map_get_method(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    match entries(recv) {
        Some(map) => Ok(map_get(interp, map, &args[0])?.unwrap_or(Value::Null)),
        None => Ok(Value::Null),
    }
}

/// put(key, value) - returns the map for chaining
fn map_put(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    if let Some(map) = entries(recv) {
        map_insert(interp, map, args[0].clone(), args[1].clone())?;
    }
    Ok(recv.clone())
}

fn map_contains_key(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let found = match entries(recv) {
        Some(map) => map_get(interp, map, &args[0])?.is_some(),
        None => false,
    };
    Ok(Value::Boolean(found))
}

/// remove(key) - the removed value, or null
fn map_remove_method(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    match entries(recv) {
        Some(map) => Ok(map_remove(interp, map, &args[0])?.unwrap_or(Value::Null)),
        None => Ok(Value::Null),
    }
}

fn map_keys(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::list(entries(recv).map(|map| map.read().keys()).unwrap_or_default()))
}

fn map_values(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::list(entries(recv).map(|map| map.read().values()).unwrap_or_default()))
}

fn map_length(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Number(entries(recv).map_or(0, |map| map.read().len()) as f64))
}

fn map_is_empty(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Boolean(entries(recv).map_or(true, |map| map.read().is_empty())))
}

fn map_clear(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    if let Some(map) = entries(recv) {
        map.write().clear();
    }
    Ok(Value::Null)
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
    fn test_equal_keys_share_an_entry() {
        let value = run("local m = {}; m[[1, 2]] = \"a\"; m[[1, 2]] = \"b\"; m.length() * 10 + m.get([1, 2]).length();");
        assert_eq!(value.as_number(), Some(11.0));
    }

    #[test]
    fn test_user_keys_use_equals_and_hash_code() {
        let source = "
            class Key {
                var id = 0;
                Key(id) { this.id = id; }
                fun equals(other) { return this.id == other.id; }
                fun hashCode() { return this.id; }
            }
            local m = {};
            m[new Key(7)] = \"seven\";
            m[new Key(7)];
        ";
        assert_eq!(run(source).as_str(), Some("seven"));
    }

    #[test]
    fn test_missing_key_reads_null() {
        assert!(run("local m = {\"a\": 1}; m[\"b\"];").is_null());
    }

    #[test]
    fn test_remove_and_iterate_keys() {
        let value = run("local m = {\"a\": 1, \"b\": 2, \"c\": 3}; m.remove(\"b\"); local out = \"\"; foreach (k : m) { out = out + k; } out;");
        assert_eq!(value.as_str(), Some("ac"));
    }

    #[test]
    fn test_concurrent_writers_never_duplicate_a_key() {
        let source = "
            local m = {};
            fun fill() { for (local i = 0; i < 200; i += 1) { m[[i]] = i; } }
            local a = runThreaded(fun() { fill(); });
            local b = runThreaded(fun() { fill(); });
            a.join();
            b.join();
            m.length() * 1000 + m[[199]];
        ";
        assert_eq!(run(source).as_number(), Some(200_199.0));
    }
}
