// Class, enum and interface declarations

use std::sync::{Arc, Weak};

use super::{Interpreter, StackTable};
use crate::ast::{ClassDecl, ClassKind, FunctionDecl, InterfaceDecl};
use crate::error::{runtime_error, ErrorKind, EvalResult};
use crate::runtime::{
    ClassCore, ClassDefinition, ClassRef, EnumTag, Function, FunctionRole, Object, UserClass,
    UserFunction, UserInterface, Value,
};

impl Interpreter {
    pub(crate) fn declare_class(&mut self, decl: &Arc<ClassDecl>) -> EvalResult<()> {
        let (superclass, interfaces) = self.class_parents(decl)?;
        check_super_arity(decl, &superclass)?;

        let class_table = StackTable::child(&self.table);
        let file = self.file.clone();
        let instantiable = decl.kind == ClassKind::Class;

        let class = UserClass::new_cyclic(decl.clone(), class_table.clone(), |this| {
            let member = |function: &Arc<FunctionDecl>, role: FunctionRole, owner: Option<Weak<UserClass>>| {
                Arc::new(Function::user(UserFunction {
                    decl: function.clone(),
                    closure: class_table.clone(),
                    role,
                    file: file.clone(),
                    owner,
                }))
            };

            let mut core = ClassCore::new(decl.name.as_str()).extends(superclass.clone());
            core.interfaces = interfaces.clone();
            core.can_extend = instantiable;
            core.can_construct = instantiable;
            for method in &decl.methods {
                core.methods.insert(member(method, FunctionRole::Method, None));
            }
            for method in &decl.static_methods {
                core.static_methods.insert(member(method, FunctionRole::Static, None));
            }
            for constructor in &decl.constructors {
                core.constructors
                    .push(member(constructor, FunctionRole::Constructor, Some(this.clone())));
            }
            // Operator tables count the receiver as an operand
            for (op, overload) in &decl.operators {
                let arity = if overload.variadic { -1 } else { overload.params.len() as i32 + 1 };
                core.operators
                    .insert(*op, arity, member(overload, FunctionRole::Operator, None));
            }
            core
        });

        for interface in &interfaces {
            let Some(required) = interface.as_interface().map(UserInterface::all_required) else {
                continue;
            };
            for (method, arity) in required {
                if !class.core().implements(&method, arity) {
                    return Err(runtime_error(
                        ErrorKind::InterfaceError,
                        format!(
                            "Class '{}' does not implement method '{}' required by interface '{}'",
                            decl.name,
                            method,
                            interface.name()
                        ),
                    ));
                }
            }
        }

        self.table.define_class(&decl.name, class.clone());
        tracing::trace!(class = %decl.name, methods = decl.methods.len(), "declared class");

        self.with_table(class_table, |interp| interp.initialize_statics(&class))
    }

    /// Split declared parents into the superclass and the interfaces
    fn class_parents(&self, decl: &ClassDecl) -> EvalResult<(ClassRef, Vec<ClassRef>)> {
        let mut superclass: Option<ClassRef> = None;
        let mut interfaces = Vec::new();

        for parent in &decl.parents {
            let class = self.lookup_type(parent)?;
            if class.core().is_interface {
                interfaces.push(class);
                continue;
            }
            if decl.kind == ClassKind::Enum {
                return Err(runtime_error(
                    ErrorKind::TypeError,
                    format!("Enum '{}' can only implement interfaces", decl.name),
                ));
            }
            if superclass.is_some() {
                return Err(runtime_error(
                    ErrorKind::TypeError,
                    format!("Class '{}' can only extend one non-interface super class", decl.name),
                ));
            }
            if !class.core().can_extend {
                return Err(runtime_error(
                    ErrorKind::TypeError,
                    format!("Cannot extend '{}'", class.name()),
                ));
            }
            superclass = Some(class);
        }

        let superclass = superclass.unwrap_or_else(|| match decl.kind {
            ClassKind::Enum => self.primitives().enumeration.clone(),
            ClassKind::Class => self.primitives().object.clone(),
        });
        Ok((superclass, interfaces))
    }

    /// Enum constants first, then static fields, in declaration order.
    /// Runs with the class body as the current scope.
    fn initialize_statics(&mut self, class: &Arc<UserClass>) -> EvalResult<()> {
        let class_ref: ClassRef = class.clone();
        let decl = class.decl.clone();

        for (ordinal, constant) in decl.constants.iter().enumerate() {
            let args = self.evaluate_all(&constant.args)?;
            let tag = EnumTag {
                name: constant.name.clone(),
                ordinal,
            };
            let value = Value::Object(Arc::new(Object::with_tag(class_ref.clone(), tag)));
            self.call_site = constant.span;
            class.initialize_fields(self, &value)?;
            class.run_constructor(self, &value, args)?;
            class
                .core()
                .static_fields
                .write()
                .insert(constant.name.clone(), value.clone());
            class.enum_constants.write().push(value);
        }

        for field in &decl.static_fields {
            let value = match &field.initializer {
                Some(initializer) => self.evaluate(initializer)?,
                None => Value::Null,
            };
            if let Some(hint) = &field.hint {
                self.check_hint(hint, &value, &format!("static field '{}'", field.name))?;
            }
            class
                .core()
                .static_fields
                .write()
                .insert(field.name.clone(), value);
        }
        Ok(())
    }

    pub(crate) fn declare_interface(&mut self, decl: &Arc<InterfaceDecl>) -> EvalResult<()> {
        let mut parents = Vec::with_capacity(decl.parents.len());
        for parent in &decl.parents {
            let class = self.lookup_type(parent)?;
            if !class.core().is_interface {
                return Err(runtime_error(
                    ErrorKind::TypeError,
                    format!(
                        "Interface '{}' can only extend interfaces, not '{}'",
                        decl.name,
                        class.name()
                    ),
                ));
            }
            parents.push(class);
        }
        let required = decl
            .methods
            .iter()
            .map(|method| (method.name.clone(), method.arity))
            .collect();
        let interface: ClassRef = Arc::new(UserInterface::new(&decl.name, parents, required));
        self.table.define_class(&decl.name, interface);
        Ok(())
    }
}

/// Every constructor must reach a superclass initializer that exists. The
/// resolver checks this for parents it can see; imported and native
/// parents are checked here.
fn check_super_arity(decl: &ClassDecl, superclass: &ClassRef) -> EvalResult<()> {
    let core = superclass.core();
    let accepts = |argc: usize| {
        if core.constructors.is_empty() {
            argc == 0
        } else {
            core.find_constructor(argc).is_some()
        }
    };

    let mut counts: Vec<usize> = decl
        .constructors
        .iter()
        .filter_map(|constructor| match &constructor.delegate {
            Some(delegate) if delegate.kind == crate::ast::DelegateKind::This => None,
            Some(delegate) => Some(delegate.args.len()),
            None => Some(0),
        })
        .collect();
    if decl.constructors.is_empty() {
        counts.push(0);
    }

    match counts.into_iter().find(|&argc| !accepts(argc)) {
        Some(argc) => Err(runtime_error(
            ErrorKind::ArgumentError,
            format!(
                "Superclass '{}' has no constructor accepting {} argument(s)",
                core.name, argc
            ),
        )),
        None => Ok(()),
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
    fn test_missing_interface_method() {
        let error = run("interface Shape { fun area(); } class Square : Shape { }").unwrap_err();
        assert_eq!(error.kind, ErrorKind::InterfaceError);
        assert_eq!(
            error.message,
            "Class 'Square' does not implement method 'area' required by interface 'Shape'"
        );
    }

    #[test]
    fn test_inherited_method_satisfies_interface() {
        let source = "
            interface Named { fun name(); }
            class Base { fun name() { return \"base\"; } }
            class Child : Base, Named { }
            local c = new Child();
            c.name();
        ";
        assert_eq!(run(source).unwrap().as_str(), Some("base"));
    }

    #[test]
    fn test_static_fields_initialize_in_order() {
        let source = "
            class Counter {
                static var start = 10;
                static var next = Counter.start + 1;
            }
            Counter.next;
        ";
        assert_eq!(run(source).unwrap().as_number(), Some(11.0));
    }

    #[test]
    fn test_enum_constants_run_constructors() {
        let source = "
            enum Planet {
                MERCURY(1), VENUS(2);
                var mass = 0;
                Planet(m) { this.mass = m * 10; }
            }
            Planet.VENUS.mass + Planet.MERCURY.ordinal();
        ";
        assert_eq!(run(source).unwrap().as_number(), Some(20.0));
    }

    #[test]
    fn test_enums_cannot_be_constructed() {
        let error = run("enum Dir { UP, DOWN; } new Dir();").unwrap_err();
        assert_eq!(error.kind, ErrorKind::TypeError);
        assert_eq!(error.message, "Cannot construct 'Dir' directly");
    }
}
