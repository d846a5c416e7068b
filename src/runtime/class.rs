// Class definitions and the dispatch protocol
// Every operator, member access, construction and conversion is answered
// by the definition that owns the left-hand value. The trait's default
// methods are the behavior of the universal root class.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::sync::Arc;

use super::function::{Function, NativeFn, NativeMethodFn};
use super::maps::{FunctionMap, OperatorMap};
use super::user::{UserClass, UserInterface};
use super::value::Value;
use crate::ast::Operator;
use crate::error::{runtime_error, ErrorKind, EvalResult};
use crate::interpreter::Interpreter;

pub type ClassRef = Arc<dyn ClassDefinition>;

/// Lazily evaluated right operand, so `&&` and `||` can short-circuit
pub type Rhs<'a> = &'a mut dyn FnMut(&mut Interpreter) -> EvalResult;

/// Data shared by every definition: names, tables and capability flags
pub struct ClassCore {
    pub name: String,
    pub superclass: Option<ClassRef>,
    pub interfaces: Vec<ClassRef>,
    pub methods: FunctionMap,
    pub static_methods: FunctionMap,
    pub static_fields: RwLock<FxHashMap<String, Value>>,
    pub constructors: SmallVec<[Arc<Function>; 2]>,
    pub operators: OperatorMap,
    pub can_extend: bool,
    pub can_construct: bool,
    pub is_interface: bool,
}

impl ClassCore {
    /// A sealed, non-constructible class
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            interfaces: Vec::new(),
            methods: FunctionMap::new(),
            static_methods: FunctionMap::new(),
            static_fields: RwLock::new(FxHashMap::default()),
            constructors: SmallVec::new(),
            operators: OperatorMap::new(),
            can_extend: false,
            can_construct: false,
            is_interface: false,
        }
    }

    pub fn extends(mut self, superclass: ClassRef) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn extendable(mut self) -> Self {
        self.can_extend = true;
        self
    }

    pub fn method(mut self, name: &str, arity: i32, func: NativeMethodFn) -> Self {
        self.methods
            .insert(Arc::new(Function::native_method(name, arity, func)));
        self
    }

    pub fn static_method(mut self, name: &str, arity: i32, func: NativeFn) -> Self {
        self.static_methods
            .insert(Arc::new(Function::native(name, arity, func)));
        self
    }

    pub fn constructor(mut self, arity: i32, func: NativeFn) -> Self {
        let name = self.name.clone();
        self.constructors
            .push(Arc::new(Function::native(name, arity, func)));
        self.can_construct = true;
        self
    }

    /// This class followed by each ancestor, most derived first
    pub fn lineage(&self) -> impl Iterator<Item = &ClassCore> {
        std::iter::successors(Some(self), |&core| {
            core.superclass.as_ref().map(|parent| parent.core())
        })
    }

    /// Exact arity anywhere in the lineage first, then a variadic overload
    pub fn find_method(&self, name: &str, argc: usize) -> Option<Arc<Function>> {
        self.lineage()
            .find_map(|core| core.methods.get_exact(name, argc as i32))
            .or_else(|| self.lineage().find_map(|core| core.methods.get_exact(name, -1)))
    }

    pub fn find_method_named(&self, name: &str) -> Option<Arc<Function>> {
        self.lineage().find_map(|core| core.methods.any(name))
    }

    pub fn find_static(&self, name: &str, argc: usize) -> Option<Arc<Function>> {
        self.lineage()
            .find_map(|core| core.static_methods.get_exact(name, argc as i32))
            .or_else(|| {
                self.lineage()
                    .find_map(|core| core.static_methods.get_exact(name, -1))
            })
    }

    pub fn find_static_named(&self, name: &str) -> Option<Arc<Function>> {
        self.lineage().find_map(|core| core.static_methods.any(name))
    }

    /// Whether some class in the lineage answers `name` with `arity` arguments
    pub fn implements(&self, name: &str, arity: i32) -> bool {
        self.lineage().any(|core| {
            core.methods.get_exact(name, arity).is_some() || core.methods.get_exact(name, -1).is_some()
        })
    }

    pub fn find_constructor(&self, argc: usize) -> Option<Arc<Function>> {
        self.constructors
            .iter()
            .find(|c| c.arity == argc as i32)
            .or_else(|| self.constructors.iter().find(|c| c.arity == -1))
            .cloned()
    }

    pub fn static_field(&self, name: &str) -> Option<Value> {
        self.lineage()
            .find_map(|core| core.static_fields.read().get(name).cloned())
    }

    /// Assign to an existing static field somewhere in the lineage
    pub fn assign_static_field(&self, name: &str, value: Value) -> bool {
        for core in self.lineage() {
            let mut fields = core.static_fields.write();
            if let Some(slot) = fields.get_mut(name) {
                *slot = value;
                return true;
            }
        }
        false
    }

    pub fn is_subclass_of(&self, other: &ClassCore) -> bool {
        self.lineage().any(|core| {
            std::ptr::eq(core, other)
                || core
                    .interfaces
                    .iter()
                    .any(|interface| interface.core().is_subclass_of(other))
        })
    }
}

pub trait ClassDefinition: Send + Sync {
    fn core(&self) -> &ClassCore;

    fn name(&self) -> &str {
        &self.core().name
    }

    fn as_user(&self) -> Option<&UserClass> {
        None
    }

    fn as_interface(&self) -> Option<&UserInterface> {
        None
    }

    fn superclass(&self) -> Option<&ClassRef> {
        self.core().superclass.as_ref()
    }

    fn find_method(&self, name: &str, argc: usize) -> Option<Arc<Function>> {
        self.core().find_method(name, argc)
    }

    fn find_operator(&self, op: Operator, arity: i32) -> Option<Arc<Function>> {
        self.core().operators.get(op, arity)
    }

    fn is_subclass_of(&self, other: &ClassRef) -> bool {
        self.core().is_subclass_of(other.core())
    }

    fn binary(
        &self,
        interp: &mut Interpreter,
        left: &Value,
        op: Operator,
        rhs: Rhs<'_>,
    ) -> EvalResult {
        object_binary(interp, left, op, rhs)
    }

    fn unary(&self, interp: &mut Interpreter, operand: &Value, op: Operator) -> EvalResult {
        Err(operator_error(interp, op, operand))
    }

    fn bracket_access(&self, interp: &mut Interpreter, target: &Value, _index: Value) -> EvalResult {
        Err(operator_error(interp, Operator::Index, target))
    }

    fn bracket_assign(
        &self,
        interp: &mut Interpreter,
        target: &Value,
        _index: Value,
        _value: Value,
    ) -> EvalResult<()> {
        Err(operator_error(interp, Operator::IndexSet, target))
    }

    /// Field read, or a method taken as a bound value
    fn member_access(&self, interp: &mut Interpreter, target: &Value, name: &str) -> EvalResult {
        if let Value::Object(object) = target {
            if let Some(value) = object.get(name) {
                return Ok(value);
            }
        }
        if let Some(method) = self.core().find_method_named(name) {
            return Ok(Value::Function(Arc::new(Function::bound(target.clone(), method))));
        }
        Err(runtime_error(
            ErrorKind::NoSuchMethod,
            format!("'{}' has no member '{}'", interp.type_name(target), name),
        ))
    }

    fn member_assign(
        &self,
        interp: &mut Interpreter,
        target: &Value,
        name: &str,
        value: Value,
    ) -> EvalResult<()> {
        match target {
            Value::Object(object) => {
                object.set(name, value);
                Ok(())
            }
            _ => Err(runtime_error(
                ErrorKind::TypeError,
                format!("Cannot set property '{}' on type {}", name, interp.type_name(target)),
            )),
        }
    }

    /// Method by exact arity (then variadic), else a callable field
    fn call_member(
        &self,
        interp: &mut Interpreter,
        target: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> EvalResult {
        if let Some(method) = self.find_method(name, args.len()) {
            return interp.invoke(&method, Some(target), args);
        }
        if let Value::Object(object) = target {
            if let Some(field) = object.get(name) {
                if interp.definition_of(&field).is_callable(&field) {
                    return interp.call_value(&field, args);
                }
            }
        }
        Err(runtime_error(
            ErrorKind::NoSuchMethod,
            format!(
                "No method '{}' accepting {} argument(s) on type {}",
                name,
                args.len(),
                interp.type_name(target)
            ),
        ))
    }

    fn construct(&self, interp: &mut Interpreter, args: Vec<Value>) -> EvalResult {
        let core = self.core();
        if !core.can_construct {
            return Err(runtime_error(
                ErrorKind::TypeError,
                format!("Cannot construct '{}' directly", core.name),
            ));
        }
        match core.find_constructor(args.len()) {
            Some(constructor) => interp.invoke(&constructor, None, args),
            None => Err(no_constructor(&core.name, args.len())),
        }
    }

    /// Run as the superclass part of a subclass constructor
    fn init_super(&self, _interp: &mut Interpreter, _this: &Value, args: Vec<Value>) -> EvalResult<()> {
        if args.is_empty() {
            Ok(())
        } else {
            Err(no_constructor(self.name(), args.len()))
        }
    }

    fn equals(&self, _interp: &mut Interpreter, left: &Value, right: &Value) -> EvalResult<bool> {
        Ok(left.identical(right))
    }

    fn hash(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult<u64> {
        Ok(value.identity_hash())
    }

    /// Three-way ordering built from `<` and `>`; neither means equal
    fn compare(&self, interp: &mut Interpreter, left: &Value, right: &Value) -> EvalResult<Ordering> {
        if interp.test_operator(left, Operator::Less, right.clone())? {
            return Ok(Ordering::Less);
        }
        if interp.test_operator(left, Operator::Greater, right.clone())? {
            return Ok(Ordering::Greater);
        }
        Ok(Ordering::Equal)
    }

    fn to_string(&self, interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        Ok(format!("<{} instance>", interp.type_name(value)))
    }

    fn copy(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult {
        Ok(value.clone())
    }

    fn is_callable(&self, _value: &Value) -> bool {
        false
    }

    fn call(&self, interp: &mut Interpreter, callee: &Value, _args: Vec<Value>) -> EvalResult {
        Err(runtime_error(
            ErrorKind::TypeError,
            format!("Value of type {} is not callable", interp.type_name(callee)),
        ))
    }

    /// Snapshot of the elements a `foreach` walks
    fn iterate(&self, interp: &mut Interpreter, value: &Value) -> EvalResult<Vec<Value>> {
        Err(runtime_error(
            ErrorKind::TypeError,
            format!("Cannot iterate over type {}", interp.type_name(value)),
        ))
    }
}

/// Binary behavior of the root class: equality by `equals`, `<=`/`>=` by
/// `compare`, everything else unsupported
pub fn object_binary(interp: &mut Interpreter, left: &Value, op: Operator, rhs: Rhs<'_>) -> EvalResult {
    match op {
        Operator::Equal => {
            let right = rhs(interp)?;
            Ok(Value::Boolean(interp.values_equal(left, &right)?))
        }
        Operator::NotEqual => {
            let right = rhs(interp)?;
            Ok(Value::Boolean(!interp.values_equal(left, &right)?))
        }
        Operator::LessEqual => {
            let right = rhs(interp)?;
            Ok(Value::Boolean(interp.compare(left, &right)? != Ordering::Greater))
        }
        Operator::GreaterEqual => {
            let right = rhs(interp)?;
            Ok(Value::Boolean(interp.compare(left, &right)? != Ordering::Less))
        }
        _ => Err(operator_error(interp, op, left)),
    }
}

pub fn operator_error(interp: &Interpreter, op: Operator, value: &Value) -> crate::error::Unwind {
    runtime_error(
        ErrorKind::TypeError,
        format!("Cannot apply operator {} to type {}", op, interp.type_name(value)),
    )
}

pub fn no_constructor(class: &str, argc: usize) -> crate::error::Unwind {
    runtime_error(
        ErrorKind::ArgumentError,
        format!("Class '{}' has no constructor accepting {} argument(s)", class, argc),
    )
}
