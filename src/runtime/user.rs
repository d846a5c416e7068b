// Script-defined classes, enums and interfaces
// Behavior is data: method and operator tables built when the declaration
// statement runs, falling back to the superclass for everything else.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};

use super::class::{no_constructor, ClassCore, ClassDefinition, ClassRef, Rhs};
use super::function::Function;
use super::value::{number_bits, Object, Value};
use crate::ast::{ClassDecl, Operator};
use crate::error::{fatal_error, runtime_error, ErrorKind, EvalResult};
use crate::interpreter::{Interpreter, StackTable};

pub struct UserClass {
    core: ClassCore,
    this: Weak<UserClass>,
    pub decl: Arc<ClassDecl>,
    /// Scope of the class body; parent of every method closure
    pub class_table: Arc<StackTable>,
    /// Enum constants in declaration order
    pub enum_constants: RwLock<Vec<Value>>,
}

impl UserClass {
    /// Build the class with access to its own weak handle, so methods and
    /// constructors can point back at it
    pub fn new_cyclic(
        decl: Arc<ClassDecl>,
        class_table: Arc<StackTable>,
        build: impl FnOnce(&Weak<UserClass>) -> ClassCore,
    ) -> Arc<UserClass> {
        Arc::new_cyclic(|this| UserClass {
            core: build(this),
            this: this.clone(),
            decl,
            class_table,
            enum_constants: RwLock::new(Vec::new()),
        })
    }

    pub fn class_ref(&self) -> EvalResult<ClassRef> {
        match self.this.upgrade() {
            Some(class) => Ok(class),
            None => Err(fatal_error(format!("Class '{}' was dropped while in use", self.core.name))),
        }
    }

    pub fn is_enum(&self) -> bool {
        self.decl.kind == crate::ast::ClassKind::Enum
    }

    /// Evaluate instance field initializers, root class first
    pub fn initialize_fields(&self, interp: &mut Interpreter, this: &Value) -> EvalResult<()> {
        if let Some(parent) = self.core.superclass.as_ref().and_then(|s| s.as_user()) {
            parent.initialize_fields(interp, this)?;
        }
        let Value::Object(object) = this else {
            return Ok(());
        };
        if self.decl.fields.is_empty() {
            return Ok(());
        }

        let table = StackTable::child(&self.class_table);
        table.define_variable("this", this.clone());
        for field in &self.decl.fields {
            let value = match &field.initializer {
                Some(initializer) => interp.eval_in(&table, initializer)?,
                None => Value::Null,
            };
            if let Some(hint) = &field.hint {
                interp.check_hint(hint, &value, &format!("field '{}'", field.name))?;
            }
            object.set(&field.name, value);
        }
        Ok(())
    }

    /// Pick a constructor by arity and run it on an already allocated instance
    pub fn run_constructor(&self, interp: &mut Interpreter, this: &Value, args: Vec<Value>) -> EvalResult<()> {
        if self.core.constructors.is_empty() {
            if !args.is_empty() {
                return Err(no_constructor(&self.core.name, args.len()));
            }
            return self.init_parent(interp, this, Vec::new());
        }
        match self.core.find_constructor(args.len()) {
            Some(constructor) => interp.invoke(&constructor, Some(this), args).map(|_| ()),
            None => Err(no_constructor(&self.core.name, args.len())),
        }
    }

    /// Superclass part of construction
    pub fn init_parent(&self, interp: &mut Interpreter, this: &Value, args: Vec<Value>) -> EvalResult<()> {
        match &self.core.superclass {
            Some(parent) => parent.init_super(interp, this, args),
            None => Ok(()),
        }
    }

    /// Script-defined method only; native ones are the superclass's business
    fn user_method(&self, name: &str, argc: usize) -> Option<Arc<Function>> {
        self.core
            .find_method(name, argc)
            .filter(|method| !method.is_native())
    }
}

impl ClassDefinition for UserClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    fn as_user(&self) -> Option<&UserClass> {
        Some(self)
    }

    fn binary(&self, interp: &mut Interpreter, left: &Value, op: Operator, rhs: Rhs<'_>) -> EvalResult {
        if let Some(overload) = self.core.operators.get(op, 2) {
            let right = rhs(interp)?;
            return interp.invoke(&overload, Some(left), vec![right]);
        }
        match &self.core.superclass {
            Some(parent) => parent.binary(interp, left, op, rhs),
            None => super::class::object_binary(interp, left, op, rhs),
        }
    }

    fn unary(&self, interp: &mut Interpreter, operand: &Value, op: Operator) -> EvalResult {
        if let Some(overload) = self.core.operators.get(op, 1) {
            return interp.invoke(&overload, Some(operand), Vec::new());
        }
        match &self.core.superclass {
            Some(parent) => parent.unary(interp, operand, op),
            None => Err(super::class::operator_error(interp, op, operand)),
        }
    }

    fn bracket_access(&self, interp: &mut Interpreter, target: &Value, index: Value) -> EvalResult {
        if let Some(overload) = self.core.operators.get(Operator::Index, 2) {
            return interp.invoke(&overload, Some(target), vec![index]);
        }
        match &self.core.superclass {
            Some(parent) => parent.bracket_access(interp, target, index),
            None => Err(super::class::operator_error(interp, Operator::Index, target)),
        }
    }

    fn bracket_assign(&self, interp: &mut Interpreter, target: &Value, index: Value, value: Value) -> EvalResult<()> {
        if let Some(overload) = self.core.operators.get(Operator::IndexSet, 3) {
            interp.invoke(&overload, Some(target), vec![index, value])?;
            return Ok(());
        }
        match &self.core.superclass {
            Some(parent) => parent.bracket_assign(interp, target, index, value),
            None => Err(super::class::operator_error(interp, Operator::IndexSet, target)),
        }
    }

    fn construct(&self, interp: &mut Interpreter, args: Vec<Value>) -> EvalResult {
        if !self.core.can_construct {
            return Err(runtime_error(
                ErrorKind::TypeError,
                format!("Cannot construct '{}' directly", self.core.name),
            ));
        }
        let object = Value::Object(Arc::new(Object::new(self.class_ref()?)));
        self.initialize_fields(interp, &object)?;
        self.run_constructor(interp, &object, args)?;
        Ok(object)
    }

    fn init_super(&self, interp: &mut Interpreter, this: &Value, args: Vec<Value>) -> EvalResult<()> {
        self.run_constructor(interp, this, args)
    }

    fn equals(&self, interp: &mut Interpreter, left: &Value, right: &Value) -> EvalResult<bool> {
        if let Some(overload) = self.core.operators.get(Operator::Equal, 2) {
            let result = interp.invoke(&overload, Some(left), vec![right.clone()])?;
            return interp.expect_boolean(result, "operator ==");
        }
        if let Some(method) = self.user_method("equals", 1) {
            let result = interp.invoke(&method, Some(left), vec![right.clone()])?;
            return interp.expect_boolean(result, "equals()");
        }
        match &self.core.superclass {
            Some(parent) => parent.equals(interp, left, right),
            None => Ok(left.identical(right)),
        }
    }

    fn hash(&self, interp: &mut Interpreter, value: &Value) -> EvalResult<u64> {
        if let Some(method) = self.user_method("hashCode", 0) {
            return match interp.invoke(&method, Some(value), Vec::new())? {
                Value::Number(n) => Ok(number_bits(n)),
                other => Err(runtime_error(
                    ErrorKind::TypeError,
                    format!("hashCode() must return a Number, got {}", interp.type_name(&other)),
                )),
            };
        }
        match &self.core.superclass {
            Some(parent) => parent.hash(interp, value),
            None => Ok(value.identity_hash()),
        }
    }

    fn to_string(&self, interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        if let Some(method) = self.user_method("toString", 0) {
            let result = interp.invoke(&method, Some(value), Vec::new())?;
            return match result {
                Value::String(text) => Ok(text.to_string()),
                other => interp.stringify(&other),
            };
        }
        match &self.core.superclass {
            Some(parent) => parent.to_string(interp, value),
            None => Ok(format!("<{} instance>", self.core.name)),
        }
    }

    fn iterate(&self, interp: &mut Interpreter, value: &Value) -> EvalResult<Vec<Value>> {
        if let Some(method) = self.user_method("iterator", 0) {
            let items = interp.invoke(&method, Some(value), Vec::new())?;
            return interp.iterate(&items);
        }
        match &self.core.superclass {
            Some(parent) => parent.iterate(interp, value),
            None => Err(runtime_error(
                ErrorKind::TypeError,
                format!("Cannot iterate over type {}", self.core.name),
            )),
        }
    }
}

/// A script-declared interface: a named list of required methods
pub struct UserInterface {
    core: ClassCore,
    /// (name, arity) pairs, including those inherited from parent interfaces
    pub required: Vec<(String, i32)>,
}

impl UserInterface {
    pub fn new(name: &str, parents: Vec<ClassRef>, required: Vec<(String, i32)>) -> Self {
        let mut core = ClassCore::new(name).extendable();
        core.is_interface = true;
        core.interfaces = parents;
        Self { core, required }
    }

    /// Every (name, arity) this interface and its parents require
    pub fn all_required(&self) -> Vec<(String, i32)> {
        let mut required = self.required.clone();
        for parent in &self.core.interfaces {
            if let Some(parent) = parent.as_interface() {
                required.extend(parent.all_required());
            }
        }
        required
    }
}

impl ClassDefinition for UserInterface {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    fn as_interface(&self) -> Option<&UserInterface> {
        Some(self)
    }
}
