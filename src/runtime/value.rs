// Sable runtime values
// Every value is an instance of exactly one class definition; the variant
// only selects the native payload the definition works with.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::class::ClassRef;
use super::function::Function;
use super::task::{FutureValue, Task};
use super::thread::ScriptThread;

#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(f64),
    String(Arc<str>),
    List(Arc<RwLock<Vec<Value>>>),
    Map(Arc<RwLock<ValueMap>>),
    Function(Arc<Function>),
    Type(ClassRef),
    /// Instance of a script-defined class (or of `Error`)
    Object(Arc<Object>),
    Thread(Arc<ScriptThread>),
    Task(Arc<Task>),
    Future(Arc<FutureValue>),
}

impl Value {
    pub fn string(text: impl AsRef<str>) -> Self {
        Value::String(Arc::from(text.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(items)))
    }

    pub fn map(map: ValueMap) -> Self {
        Value::Map(Arc::new(RwLock::new(map)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<Object>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Identity, the equality every definition starts from.
    /// Immediate values compare by content.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Thread(a), Value::Thread(b)) => Arc::ptr_eq(a, b),
            (Value::Task(a), Value::Task(b)) => Arc::ptr_eq(a, b),
            (Value::Future(a), Value::Future(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Hash consistent with `identical`
    pub fn identity_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        match self {
            Value::Null => 0u8.hash(&mut hasher),
            Value::Boolean(b) => b.hash(&mut hasher),
            Value::Number(n) => number_bits(*n).hash(&mut hasher),
            Value::String(s) => s.hash(&mut hasher),
            Value::List(a) => (Arc::as_ptr(a) as *const u8 as usize).hash(&mut hasher),
            Value::Map(a) => (Arc::as_ptr(a) as *const u8 as usize).hash(&mut hasher),
            Value::Function(a) => (Arc::as_ptr(a) as *const u8 as usize).hash(&mut hasher),
            Value::Type(a) => (Arc::as_ptr(a) as *const u8 as usize).hash(&mut hasher),
            Value::Object(a) => (Arc::as_ptr(a) as *const u8 as usize).hash(&mut hasher),
            Value::Thread(a) => (Arc::as_ptr(a) as *const u8 as usize).hash(&mut hasher),
            Value::Task(a) => (Arc::as_ptr(a) as *const u8 as usize).hash(&mut hasher),
            Value::Future(a) => (Arc::as_ptr(a) as *const u8 as usize).hash(&mut hasher),
        }
        hasher.finish()
    }
}

/// `0.0` and `-0.0` compare equal, so they must hash equal too
pub fn number_bits(n: f64) -> u64 {
    if n == 0.0 {
        0
    } else if n.is_nan() {
        f64::NAN.to_bits()
    } else {
        n.to_bits()
    }
}

/// Format a number the way scripts print it: integers without a fraction
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => write!(f, "<list of {}>", items.read().len()),
            Value::Map(map) => write!(f, "<map of {}>", map.read().len()),
            Value::Function(func) => write!(f, "<function {}>", func.name),
            Value::Type(class) => write!(f, "<class {}>", class.name()),
            Value::Object(object) => write!(f, "<{} instance>", object.class.name()),
            Value::Thread(thread) => write!(f, "<thread {}>", thread.name()),
            Value::Task(_) => write!(f, "<task>"),
            Value::Future(_) => write!(f, "<future>"),
        }
    }
}

/// Constant of a user enum
#[derive(Debug, Clone)]
pub struct EnumTag {
    pub name: String,
    pub ordinal: usize,
}

pub struct Object {
    pub class: ClassRef,
    pub fields: RwLock<FxHashMap<String, Value>>,
    pub tag: Option<EnumTag>,
}

impl Object {
    pub fn new(class: ClassRef) -> Self {
        Self {
            class,
            fields: RwLock::new(FxHashMap::default()),
            tag: None,
        }
    }

    pub fn with_tag(class: ClassRef, tag: EnumTag) -> Self {
        Self {
            tag: Some(tag),
            ..Self::new(class)
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.fields.write().insert(name.to_string(), value);
    }
}

/// Insertion-ordered entries with a hash index. Hashing and equality are
/// dispatched by the interpreter before the map is touched, so no lock is
/// held while script code runs. `version` changes on every insert or
/// removal; a writer that dispatched against an older version must look
/// again.
#[derive(Clone, Default)]
pub struct ValueMap {
    entries: Vec<MapEntry>,
    index: FxHashMap<u64, SmallVec<[usize; 2]>>,
    version: u64,
}

#[derive(Clone)]
pub struct MapEntry {
    pub hash: u64,
    pub key: Value,
    pub value: Value,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Keys whose hash matches, with their positions
    pub fn candidates(&self, hash: u64) -> Vec<(usize, Value)> {
        self.index
            .get(&hash)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&position| (position, self.entries[position].key.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn value_at(&self, index: usize) -> Option<Value> {
        self.entries.get(index).map(|entry| entry.value.clone())
    }

    /// Overwrite the value at `index`; keys and positions stay put
    pub fn replace_at(&mut self, index: usize, value: Value) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.value = value;
                true
            }
            None => false,
        }
    }

    pub fn push(&mut self, hash: u64, key: Value, value: Value) {
        self.index.entry(hash).or_default().push(self.entries.len());
        self.entries.push(MapEntry { hash, key, value });
        self.version += 1;
    }

    pub fn remove_at(&mut self, index: usize) -> Option<MapEntry> {
        if index >= self.entries.len() {
            return None;
        }
        let entry = self.entries.remove(index);
        self.reindex();
        self.version += 1;
        Some(entry)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.version += 1;
    }

    /// Positions shift after a removal
    fn reindex(&mut self) {
        self.index.clear();
        for (position, entry) in self.entries.iter().enumerate() {
            self.index.entry(entry.hash).or_default().push(position);
        }
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|e| e.key.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|e| e.value.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_zero_hashes_equal() {
        let positive = Value::Number(0.0);
        let negative = Value::Number(-0.0);
        assert!(positive.identical(&negative));
        assert_eq!(positive.identity_hash(), negative.identity_hash());
    }

    #[test]
    fn test_lists_compare_by_identity() {
        let a = Value::list(vec![Value::Number(1.0)]);
        let b = Value::list(vec![Value::Number(1.0)]);
        assert!(a.identical(&a.clone()));
        assert!(!a.identical(&b));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(12.0), "12");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(1.5), "1.5");
    }

    #[test]
    fn test_value_map_candidates_by_hash() {
        let mut map = ValueMap::new();
        map.push(7, Value::string("a"), Value::Number(1.0));
        map.push(9, Value::string("b"), Value::Number(2.0));
        map.push(7, Value::string("c"), Value::Number(3.0));
        let candidates = map.candidates(7);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].0, 2);
        assert!(map.replace_at(2, Value::Number(4.0)));
        assert!(!map.replace_at(1, Value::Number(5.0)));
        assert_eq!(map.value_at(2).and_then(|v| v.as_number()), Some(4.0));
    }

    #[test]
    fn test_map_index_follows_removals() {
        let mut map = ValueMap::new();
        map.push(7, Value::string("a"), Value::Number(1.0));
        map.push(9, Value::string("b"), Value::Number(2.0));
        map.push(7, Value::string("c"), Value::Number(3.0));
        let before = map.version();

        map.remove_at(0);
        assert_ne!(map.version(), before);
        let positions: Vec<usize> = map.candidates(7).into_iter().map(|(index, _)| index).collect();
        assert_eq!(positions, vec![1]);
        assert_eq!(map.value_at(1).and_then(|v| v.as_number()), Some(3.0));
        assert!(map.candidates(8).is_empty());
    }
}
