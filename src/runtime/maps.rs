// Arity-overloaded lookup tables for functions and operators

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;

use super::function::Function;
use crate::ast::Operator;

/// name x arity -> callable. A variadic (`-1`) entry only answers when no
/// exact arity matches.
#[derive(Clone, Default)]
pub struct FunctionMap {
    entries: FxHashMap<String, SmallVec<[Arc<Function>; 2]>>,
}

impl FunctionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing an existing overload of the same arity
    pub fn insert(&mut self, function: Arc<Function>) {
        let overloads = self.entries.entry(function.name.clone()).or_default();
        match overloads.iter_mut().find(|f| f.arity == function.arity) {
            Some(slot) => *slot = function,
            None => overloads.push(function),
        }
    }

    pub fn get(&self, name: &str, argc: usize) -> Option<Arc<Function>> {
        self.get_exact(name, argc as i32)
            .or_else(|| self.get_exact(name, -1))
    }

    pub fn get_exact(&self, name: &str, arity: i32) -> Option<Arc<Function>> {
        self.entries
            .get(name)?
            .iter()
            .find(|f| f.arity == arity)
            .cloned()
    }

    /// Some overload of `name`, preferring the lowest arity
    pub fn any(&self, name: &str) -> Option<Arc<Function>> {
        self.entries
            .get(name)?
            .iter()
            .min_by_key(|f| if f.arity < 0 { i32::MAX } else { f.arity })
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn arities(&self, name: &str) -> SmallVec<[i32; 4]> {
        self.entries
            .get(name)
            .map(|overloads| overloads.iter().map(|f| f.arity).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(SmallVec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// (operator, arity) -> overload. Binary operators take arity 2 (receiver
/// plus operand), unary ones 1, `[]` 2 and `[]=` 3.
#[derive(Clone, Default)]
pub struct OperatorMap {
    entries: FxHashMap<(Operator, i32), Arc<Function>>,
}

impl OperatorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, op: Operator, arity: i32, function: Arc<Function>) {
        self.entries.insert((op, arity), function);
    }

    pub fn get(&self, op: Operator, arity: i32) -> Option<Arc<Function>> {
        self.entries
            .get(&(op, arity))
            .or_else(|| self.entries.get(&(op, -1)))
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalResult;
    use crate::interpreter::Interpreter;
    use crate::runtime::Value;

    fn nothing(_: &[Value], _: &mut Interpreter) -> EvalResult {
        Ok(Value::Null)
    }

    fn function(name: &str, arity: i32) -> Arc<Function> {
        Arc::new(Function::native(name, arity, nothing))
    }

    #[test]
    fn test_exact_arity_beats_variadic() {
        let mut map = FunctionMap::new();
        map.insert(function("g", -1));
        map.insert(function("g", 2));
        assert_eq!(map.get("g", 2).map(|f| f.arity), Some(2));
        assert_eq!(map.get("g", 3).map(|f| f.arity), Some(-1));
        assert_eq!(map.get("g", 0).map(|f| f.arity), Some(-1));
    }

    #[test]
    fn test_missing_arity_without_variadic() {
        let mut map = FunctionMap::new();
        map.insert(function("f", 1));
        assert!(map.get("f", 2).is_none());
        assert!(map.get("h", 1).is_none());
        assert!(map.contains("f"));
    }

    #[test]
    fn test_insert_replaces_same_arity() {
        let mut map = FunctionMap::new();
        let first = function("f", 1);
        let second = function("f", 1);
        map.insert(first);
        map.insert(second.clone());
        assert_eq!(map.len(), 1);
        assert!(map.get("f", 1).is_some_and(|f| Arc::ptr_eq(&f, &second)));
    }

    #[test]
    fn test_any_prefers_fixed_arity() {
        let mut map = FunctionMap::new();
        map.insert(function("f", -1));
        map.insert(function("f", 3));
        map.insert(function("f", 1));
        assert_eq!(map.any("f").map(|f| f.arity), Some(1));
        assert_eq!(map.arities("f").len(), 3);
    }

    #[test]
    fn test_operator_lookup_by_arity() {
        let mut map = OperatorMap::new();
        map.insert(Operator::Minus, 2, function("-", 2));
        map.insert(Operator::Minus, 1, function("-", 1));
        assert_eq!(map.get(Operator::Minus, 1).map(|f| f.arity), Some(1));
        assert_eq!(map.get(Operator::Minus, 2).map(|f| f.arity), Some(2));
        assert!(map.get(Operator::Plus, 2).is_none());
    }
}
