// Name lookup
// References the resolver bound are read at their cached distance; the
// rest fall through to the scope chain, the native registries and
// classes promised by imports.

use super::Interpreter;
use crate::ast::{NodeId, TypeRef};
use crate::error::{fatal_error, runtime_error, ErrorKind, EvalResult, Unwind};
use crate::resolver::{LocalCache, SuperOwner};
use crate::runtime::{ClassRef, Value};

impl Interpreter {
    /// Probe this interpreter's cache, then the caches it descends from
    fn cached<T>(&self, probe: impl Fn(&LocalCache) -> Option<T>) -> Option<T> {
        if let Some(found) = probe(&self.cache.read()) {
            return Some(found);
        }
        self.outer_caches.iter().find_map(|cache| probe(&cache.read()))
    }

    /// A binding missing at the distance the resolver computed. A name that
    /// exists nowhere on the chain was assigned on a path that never ran;
    /// anything else means the scopes diverged from the resolver's view.
    fn cache_miss(&self, namespace: &str, name: &str, distance: usize) -> Unwind {
        if namespace == "variable" && self.table.lookup_variable(name).is_none() {
            return runtime_error(ErrorKind::NameError, format!("Undefined variable '{}'", name));
        }
        tracing::error!(
            namespace,
            name,
            distance,
            depth = self.table.depth(),
            file = %self.file,
            "resolved binding missing from scope"
        );
        fatal_error(format!(
            "Resolved {} '{}' not found at scope distance {}",
            namespace, name, distance
        ))
    }

    /// Value of a bare name: variable, function or class
    pub(crate) fn lookup_access(&mut self, id: NodeId, name: &str) -> EvalResult {
        if let Some(distance) = self.cached(|cache| cache.variable(id)) {
            return self
                .table
                .ancestor(distance)
                .and_then(|table| table.get_variable(name))
                .ok_or_else(|| self.cache_miss("variable", name, distance));
        }
        if let Some(distance) = self.cached(|cache| cache.function(id)) {
            return self
                .table
                .ancestor(distance)
                .and_then(|table| table.any_function(name))
                .map(Value::Function)
                .ok_or_else(|| self.cache_miss("function", name, distance));
        }
        if let Some(distance) = self.cached(|cache| cache.class(id)) {
            return self
                .table
                .ancestor(distance)
                .and_then(|table| table.get_class(name))
                .map(Value::Type)
                .ok_or_else(|| self.cache_miss("class", name, distance));
        }
        self.lookup_dynamic(name)
    }

    /// Names the resolver could not bind: natives, registered classes,
    /// imported classes, and anything defined at runtime (`eval`)
    fn lookup_dynamic(&self, name: &str) -> EvalResult {
        if let Some(value) = self.table.lookup_variable(name) {
            return Ok(value);
        }
        if let Some(function) = self.table.lookup_any_function(name) {
            return Ok(Value::Function(function));
        }
        if let Some(function) = self.shared.natives.read().any(name) {
            return Ok(Value::Function(function));
        }
        if let Some(class) = self.find_class(name) {
            return Ok(Value::Type(class));
        }
        Err(runtime_error(
            ErrorKind::NameError,
            format!("Undefined variable '{}'", name),
        ))
    }

    /// Assign to a bare name; a miss at distance zero declares it
    pub(crate) fn assign(&mut self, id: NodeId, name: &str, value: Value) -> EvalResult<()> {
        let Some(distance) = self.cached(|cache| cache.variable(id)) else {
            if !self.table.assign_variable(name, value.clone()) {
                self.table.define_variable(name, value);
            }
            return Ok(());
        };
        let Some(table) = self.table.ancestor(distance) else {
            return Err(self.cache_miss("variable", name, distance));
        };
        if table.set_variable(name, value.clone()) {
            return Ok(());
        }
        if distance == 0 {
            table.define_variable(name, value);
            return Ok(());
        }
        Err(self.cache_miss("variable", name, distance))
    }

    /// `name(args)`: a function overload, a callable variable, or a class
    /// to construct
    pub(crate) fn call_by_name(&mut self, id: NodeId, name: &str, args: Vec<Value>) -> EvalResult {
        let argc = args.len();

        if let Some(distance) = self.cached(|cache| cache.function(id)) {
            let function = self
                .table
                .ancestor(distance)
                .and_then(|table| table.get_function(name, argc))
                .ok_or_else(|| self.cache_miss("function", name, distance))?;
            return self.invoke(&function, None, args);
        }
        if let Some(distance) = self.cached(|cache| cache.variable(id)) {
            let callee = self
                .table
                .ancestor(distance)
                .and_then(|table| table.get_variable(name))
                .ok_or_else(|| self.cache_miss("variable", name, distance))?;
            return self.call_value(&callee, args);
        }
        if let Some(distance) = self.cached(|cache| cache.class(id)) {
            let class = self
                .table
                .ancestor(distance)
                .and_then(|table| table.get_class(name))
                .ok_or_else(|| self.cache_miss("class", name, distance))?;
            return class.construct(self, args);
        }

        if let Some(function) = self.table.lookup_function(name, argc) {
            return self.invoke(&function, None, args);
        }
        let native = self.shared.natives.read().get(name, argc);
        if let Some(function) = native {
            return self.invoke(&function, None, args);
        }
        if let Some(callee) = self.table.lookup_variable(name) {
            return self.call_value(&callee, args);
        }
        if let Some(class) = self.find_class(name) {
            return class.construct(self, args);
        }

        let overloaded = self.table.lookup_any_function(name).is_some() || self.shared.natives.read().contains(name);
        if overloaded {
            return Err(runtime_error(
                ErrorKind::ArgumentError,
                format!("No overload of '{}' accepts {} argument(s)", name, argc),
            ));
        }
        Err(runtime_error(
            ErrorKind::NameError,
            format!("Undefined function '{}' accepting {} argument(s)", name, argc),
        ))
    }

    /// Class by name without a cached distance
    pub(crate) fn find_class(&self, name: &str) -> Option<ClassRef> {
        if let Some(class) = self.table.lookup_class(name) {
            return Some(class);
        }
        if let Some(class) = self.shared.classes.read().get(name).cloned() {
            return Some(class);
        }
        self.promised_class(name)
    }

    /// A class from a module some enclosing scope imported
    fn promised_class(&self, name: &str) -> Option<ClassRef> {
        self.table.chain().find_map(|table| {
            table
                .promised_paths(name)
                .iter()
                .find_map(|path| self.shared.modules.class(path, name))
        })
    }

    /// Class named at a reference site, using the cached distance when the
    /// resolver bound one
    pub(crate) fn lookup_class_ref(&self, id: Option<NodeId>, name: &str) -> EvalResult<ClassRef> {
        if let Some(distance) = id.and_then(|id| self.cached(|cache| cache.class(id))) {
            return self
                .table
                .ancestor(distance)
                .and_then(|table| table.get_class(name))
                .ok_or_else(|| self.cache_miss("class", name, distance));
        }
        self.find_class(name).ok_or_else(|| {
            runtime_error(ErrorKind::NameError, format!("Undefined class '{}'", name))
        })
    }

    pub(crate) fn lookup_type(&self, type_ref: &TypeRef) -> EvalResult<ClassRef> {
        self.lookup_class_ref(Some(type_ref.id), &type_ref.name)
    }

    /// `super.method(args)`: start the search above the class whose body
    /// contains the call, whatever the runtime class of `this` is
    pub(crate) fn super_call(&mut self, id: NodeId, method: &str, args: Vec<Value>) -> EvalResult {
        let this = self.lookup_access(id, "this")?;
        let SuperOwner { class: owner_id, name: owner_name } = self
            .cached(|cache| cache.super_owner(id).cloned())
            .ok_or_else(|| fatal_error("'super' call without an owning class"))?;

        let mut current = Some(self.definition_of(&this));
        let owner = loop {
            match current {
                Some(class) if class.as_user().is_some_and(|user| user.decl.id == owner_id) => break class,
                Some(class) => current = class.superclass().cloned(),
                None => {
                    return Err(fatal_error(format!(
                        "Class '{}' is not in the lineage of '{}'",
                        owner_name,
                        self.type_name(&this)
                    )));
                }
            }
        };

        let Some(parent) = owner.superclass().cloned() else {
            return Err(runtime_error(
                ErrorKind::NoSuchMethod,
                format!("Class '{}' has no superclass", owner_name),
            ));
        };
        match parent.find_method(method, args.len()) {
            Some(function) => self.invoke(&function, Some(&this), args),
            None => Err(runtime_error(
                ErrorKind::NoSuchMethod,
                format!(
                    "Superclass '{}' has no method '{}' accepting {} argument(s)",
                    parent.name(),
                    method,
                    args.len()
                ),
            )),
        }
    }
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
    fn test_closure_sees_later_assignment() {
        let value = run("local x = 1; fun get() { return x; } x = 5; get();").unwrap();
        assert_eq!(value.as_number(), Some(5.0));
    }

    #[test]
    fn test_undefined_function_reports_name_error() {
        let error = run("missing(1);").unwrap_err();
        assert_eq!(error.kind, ErrorKind::NameError);
        assert_eq!(error.message, "Undefined function 'missing' accepting 1 argument(s)");
    }

    #[test]
    fn test_wrong_arity_reports_argument_error() {
        let error = run("fun f(a) { return a; } f(1, 2);").unwrap_err();
        assert_eq!(error.kind, ErrorKind::ArgumentError);
    }

    #[test]
    fn test_conditionally_assigned_name_is_name_error() {
        let error = run("if (false) y = 1; y;").unwrap_err();
        assert_eq!(error.kind, ErrorKind::NameError);
        assert_eq!(error.message, "Undefined variable 'y'");
    }

    #[test]
    fn test_super_starts_above_textual_owner() {
        let source = "
            class A { fun name() { return \"A\"; } }
            class B : A { fun name() { return \"B\" + super.name(); } }
            class C : B { fun name() { return \"C\" + super.name(); } }
            new C().name();
        ";
        assert_eq!(run(source).unwrap().as_str(), Some("CBA"));
    }

    #[test]
    fn test_super_owner_is_the_declaration_not_the_name() {
        let source = "
            class Base { fun f() { return 1; } }
            class A : Base { fun f() { return super.f() + 1; } }
            fun make() {
                class A : A { fun f() { return super.f() + 10; } }
                return new A();
            }
            make().f();
        ";
        assert_eq!(run(source).unwrap().as_number(), Some(12.0));
    }
}
