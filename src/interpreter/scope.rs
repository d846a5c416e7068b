// Scope frames
// Each frame holds four disjoint namespaces and points at its parent.
// Frames are shared (closures, branches on other threads), so every
// namespace sits behind its own lock.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::runtime::{ClassRef, Function, FunctionMap, Value};

/// Classes a frame expects to find in loaded modules
#[derive(Debug, Clone, Default)]
struct Promises {
    /// class name -> dotted import path
    named: FxHashMap<String, String>,
    /// `import * from path`
    wildcard: Vec<String>,
}

#[derive(Default)]
pub struct StackTable {
    parent: Option<Arc<StackTable>>,
    variables: RwLock<FxHashMap<String, Value>>,
    functions: RwLock<FunctionMap>,
    classes: RwLock<FxHashMap<String, ClassRef>>,
    promises: RwLock<Promises>,
}

impl StackTable {
    /// A frame with no parent: the global scope of a root or child interpreter
    pub fn global() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn child(parent: &Arc<StackTable>) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(parent.clone()),
            ..Self::default()
        })
    }

    pub fn parent(&self) -> Option<&Arc<StackTable>> {
        self.parent.as_ref()
    }

    /// Frame `distance` steps up the chain
    pub fn ancestor(&self, distance: usize) -> Option<&StackTable> {
        let mut table = self;
        for _ in 0..distance {
            table = table.parent.as_deref()?;
        }
        Some(table)
    }

    /// This frame followed by each ancestor
    pub fn chain(&self) -> impl Iterator<Item = &StackTable> {
        std::iter::successors(Some(self), |&table| table.parent.as_deref())
    }

    // ==================== Variables ====================

    pub fn define_variable(&self, name: &str, value: Value) {
        self.variables.write().insert(name.to_string(), value);
    }

    pub fn get_variable(&self, name: &str) -> Option<Value> {
        self.variables.read().get(name).cloned()
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.read().contains_key(name)
    }

    /// Overwrite a variable that already lives in this frame
    pub fn set_variable(&self, name: &str, value: Value) -> bool {
        match self.variables.write().get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    // ==================== Functions ====================

    pub fn define_function(&self, function: Arc<Function>) {
        self.functions.write().insert(function);
    }

    pub fn function_exact(&self, name: &str, arity: i32) -> Option<Arc<Function>> {
        self.functions.read().get_exact(name, arity)
    }

    pub fn get_function(&self, name: &str, argc: usize) -> Option<Arc<Function>> {
        self.functions.read().get(name, argc)
    }

    pub fn any_function(&self, name: &str) -> Option<Arc<Function>> {
        self.functions.read().any(name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.read().contains(name)
    }

    // ==================== Classes ====================

    pub fn define_class(&self, name: &str, class: ClassRef) {
        self.classes.write().insert(name.to_string(), class);
    }

    pub fn get_class(&self, name: &str) -> Option<ClassRef> {
        self.classes.read().get(name).cloned()
    }

    pub fn classes(&self) -> FxHashMap<String, ClassRef> {
        self.classes.read().clone()
    }

    // ==================== Module promises ====================

    pub fn promise_named(&self, name: &str, path: &str) {
        self.promises
            .write()
            .named
            .insert(name.to_string(), path.to_string());
    }

    pub fn promise_all(&self, path: &str) {
        let mut promises = self.promises.write();
        if !promises.wildcard.iter().any(|p| p == path) {
            promises.wildcard.push(path.to_string());
        }
    }

    /// Import paths that may provide `name`, named promises first
    pub fn promised_paths(&self, name: &str) -> Vec<String> {
        let promises = self.promises.read();
        let mut paths: Vec<String> = promises.named.get(name).cloned().into_iter().collect();
        paths.extend(promises.wildcard.iter().cloned());
        paths
    }

    // ==================== Chain walks ====================

    pub fn lookup_variable(&self, name: &str) -> Option<Value> {
        self.chain().find_map(|table| table.get_variable(name))
    }

    /// Assign to the nearest frame that holds `name`
    pub fn assign_variable(&self, name: &str, value: Value) -> bool {
        for table in self.chain() {
            if table.has_variable(name) {
                return table.set_variable(name, value);
            }
        }
        false
    }

    /// Exact arity over the whole chain first, then a variadic overload
    pub fn lookup_function(&self, name: &str, argc: usize) -> Option<Arc<Function>> {
        self.chain()
            .find_map(|table| table.function_exact(name, argc as i32))
            .or_else(|| self.chain().find_map(|table| table.function_exact(name, -1)))
    }

    pub fn lookup_any_function(&self, name: &str) -> Option<Arc<Function>> {
        self.chain().find_map(|table| table.any_function(name))
    }

    pub fn lookup_class(&self, name: &str) -> Option<ClassRef> {
        self.chain().find_map(|table| table.get_class(name))
    }

    pub fn depth(&self) -> usize {
        self.chain().count() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestor_walks_exact_distance() {
        let global = StackTable::global();
        global.define_variable("x", Value::Number(10.0));
        let function = StackTable::child(&global);
        let block = StackTable::child(&function);

        assert!(block.ancestor(0).is_some_and(|t| !t.has_variable("x")));
        assert!(block.ancestor(2).is_some_and(|t| t.has_variable("x")));
        assert!(block.ancestor(3).is_none());
        assert_eq!(block.depth(), 2);
    }

    #[test]
    fn test_assignment_updates_owning_frame() {
        let global = StackTable::global();
        global.define_variable("x", Value::Number(1.0));
        let inner = StackTable::child(&global);
        assert!(inner.assign_variable("x", Value::Number(2.0)));
        assert!(!inner.has_variable("x"));
        assert_eq!(global.get_variable("x").and_then(|v| v.as_number()), Some(2.0));
        assert!(!inner.assign_variable("missing", Value::Null));
    }

    #[test]
    fn test_shadowing_is_per_frame() {
        let global = StackTable::global();
        global.define_variable("x", Value::Number(1.0));
        let inner = StackTable::child(&global);
        inner.define_variable("x", Value::Number(2.0));
        assert_eq!(inner.lookup_variable("x").and_then(|v| v.as_number()), Some(2.0));
        assert_eq!(global.lookup_variable("x").and_then(|v| v.as_number()), Some(1.0));
    }

    #[test]
    fn test_promises_keep_named_first() {
        let table = StackTable::global();
        table.promise_all("lib.all");
        table.promise_named("Circle", "shapes.circle");
        table.promise_all("lib.all");
        assert_eq!(
            table.promised_paths("Circle"),
            vec!["shapes.circle".to_string(), "lib.all".to_string()]
        );
        assert_eq!(table.promised_paths("Other"), vec!["lib.all".to_string()]);
    }
}
