// Loaded modules: import path -> published classes

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use super::class::ClassRef;

#[derive(Default)]
struct ModuleState {
    modules: FxHashMap<String, FxHashMap<String, ClassRef>>,
    /// Paths ever tried, so a failed import is not resolved again
    attempted: FxHashSet<String>,
    /// Paths whose source is currently being run by an outer import
    loading: FxHashSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Loaded,
    Loading,
    Failed,
    Fresh,
}

#[derive(Default)]
pub struct ModuleMap {
    state: RwLock<ModuleState>,
}

impl ModuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_of(&self, path: &str) -> ImportState {
        let state = self.state.read();
        if state.modules.contains_key(path) {
            ImportState::Loaded
        } else if state.loading.contains(path) {
            ImportState::Loading
        } else if state.attempted.contains(path) {
            ImportState::Failed
        } else {
            ImportState::Fresh
        }
    }

    pub fn begin(&self, path: &str) {
        let mut state = self.state.write();
        state.attempted.insert(path.to_string());
        state.loading.insert(path.to_string());
    }

    /// Finish a load; `classes` is `None` when it failed
    pub fn finish(&self, path: &str, classes: Option<FxHashMap<String, ClassRef>>) {
        let mut state = self.state.write();
        state.loading.remove(path);
        if let Some(classes) = classes {
            state.modules.insert(path.to_string(), classes);
        }
    }

    pub fn class(&self, path: &str, name: &str) -> Option<ClassRef> {
        self.state.read().modules.get(path)?.get(name).cloned()
    }

    pub fn has_class(&self, path: &str, name: &str) -> bool {
        self.class(path, name).is_some()
    }

    pub fn is_loaded(&self, path: &str) -> bool {
        self.state.read().modules.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_import_is_remembered() {
        let modules = ModuleMap::new();
        assert_eq!(modules.state_of("a.b"), ImportState::Fresh);
        modules.begin("a.b");
        assert_eq!(modules.state_of("a.b"), ImportState::Loading);
        modules.finish("a.b", None);
        assert_eq!(modules.state_of("a.b"), ImportState::Failed);
    }

    #[test]
    fn test_loaded_module_without_classes() {
        let modules = ModuleMap::new();
        modules.begin("util");
        modules.finish("util", Some(FxHashMap::default()));
        assert_eq!(modules.state_of("util"), ImportState::Loaded);
        assert!(!modules.has_class("util", "Missing"));
    }
}
