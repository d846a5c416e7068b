// Sable Resolver
// Single static pass that binds every reference to a scope distance and
// rejects illegal declarations and control flow before anything runs

mod cache;

pub use cache::{LocalCache, SuperOwner};

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::ast::*;
use crate::error::{SableError, SableResult, Span};

/// What the resolver knows about a class without executing anything
#[derive(Debug, Clone, Default)]
pub struct ClassShape {
    /// Declared constructor arities; empty means only the implicit no-arg one
    pub constructors: SmallVec<[i32; 4]>,
    pub is_interface: bool,
    pub can_extend: bool,
}

impl ClassShape {
    pub fn accepts(&self, argc: usize) -> bool {
        if self.constructors.is_empty() {
            return argc == 0;
        }
        self.constructors
            .iter()
            .any(|&arity| arity == -1 || arity == argc as i32)
    }
}

/// Names registered by the native library before user code runs
#[derive(Debug, Clone, Default)]
pub struct NativeNames {
    pub functions: FxHashSet<String>,
    pub classes: FxHashMap<String, ClassShape>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Loop,
    Finally,
    Function,
    Method,
    Constructor,
    Static,
}

impl Context {
    fn is_function_boundary(self) -> bool {
        matches!(
            self,
            Context::Function | Context::Method | Context::Constructor | Context::Static
        )
    }
}

enum Found {
    Variable,
    Function,
    Class,
}

pub struct Resolver<'a> {
    file: &'a str,
    source: &'a str,
    natives: &'a NativeNames,
    variables: Vec<FxHashSet<String>>,
    functions: Vec<FxHashMap<String, SmallVec<[i32; 4]>>>,
    classes: Vec<FxHashMap<String, ClassShape>>,
    contexts: Vec<Context>,
    /// Declarations whose bodies enclose the current node
    class_stack: Vec<SuperOwner>,
    cache: LocalCache,
}

impl<'a> Resolver<'a> {
    pub fn new(natives: &'a NativeNames, file: &'a str, source: &'a str) -> Self {
        Self {
            file,
            source,
            natives,
            variables: Vec::new(),
            functions: Vec::new(),
            classes: Vec::new(),
            contexts: Vec::new(),
            class_stack: Vec::new(),
            cache: LocalCache::new(),
        }
    }

    /// Resolve a whole program; the outermost scope is the table it will run in
    pub fn resolve(mut self, program: &Program) -> SableResult<LocalCache> {
        self.begin_scope();
        self.resolve_statements(&program.statements)?;
        self.end_scope();
        Ok(self.cache)
    }

    fn error(&self, message: impl Into<String>, span: Span) -> SableError {
        SableError::compile_error(message, span, self.file).with_source(self.source)
    }

    // ==================== Scopes ====================

    fn begin_scope(&mut self) {
        self.variables.push(FxHashSet::default());
        self.functions.push(FxHashMap::default());
        self.classes.push(FxHashMap::default());
    }

    fn end_scope(&mut self) {
        self.variables.pop();
        self.functions.pop();
        self.classes.pop();
    }

    fn depth(&self) -> usize {
        self.variables.len()
    }

    /// Innermost binding of `name` in any namespace, with its distance
    fn find_any(&self, name: &str) -> Option<(Found, usize)> {
        for index in (0..self.depth()).rev() {
            let distance = self.depth() - 1 - index;
            if self.variables[index].contains(name) {
                return Some((Found::Variable, distance));
            }
            if self.functions[index].contains_key(name) {
                return Some((Found::Function, distance));
            }
            if self.classes[index].contains_key(name) {
                return Some((Found::Class, distance));
            }
        }
        None
    }

    fn find_variable(&self, name: &str) -> Option<usize> {
        (0..self.depth())
            .rev()
            .find(|&index| self.variables[index].contains(name))
            .map(|index| self.depth() - 1 - index)
    }

    fn find_class(&self, name: &str) -> Option<(usize, &ClassShape)> {
        (0..self.depth()).rev().find_map(|index| {
            self.classes[index]
                .get(name)
                .map(|shape| (self.depth() - 1 - index, shape))
        })
    }

    fn function_visible(&self, name: &str) -> bool {
        self.functions.iter().any(|scope| scope.contains_key(name))
    }

    fn class_visible(&self, name: &str) -> bool {
        self.classes.iter().any(|scope| scope.contains_key(name)) || self.natives.classes.contains_key(name)
    }

    /// Overload resolution: exact arity anywhere on the chain first, then variadic
    fn find_function(&self, name: &str, argc: usize) -> Option<usize> {
        for wanted in [argc as i32, -1] {
            for index in (0..self.depth()).rev() {
                let matches = self.functions[index]
                    .get(name)
                    .is_some_and(|arities| arities.contains(&wanted));
                if matches {
                    return Some(self.depth() - 1 - index);
                }
            }
        }
        None
    }

    fn class_shape(&self, name: &str) -> Option<&ClassShape> {
        self.find_class(name)
            .map(|(_, shape)| shape)
            .or_else(|| self.natives.classes.get(name))
    }

    // ==================== Declarations ====================

    fn declare_variable(&mut self, name: &str, span: Span) -> SableResult<()> {
        if self.variables.last().is_some_and(|scope| scope.contains(name)) {
            return Err(self
                .error(format!("Variable '{}' is already declared locally", name), span)
                .with_help("Assign to the existing variable instead of declaring it again"));
        }
        if self.function_visible(name) || self.natives.functions.contains(name) {
            return Err(self.error(format!("'{}' is already declared as a function", name), span));
        }
        if self.class_visible(name) {
            return Err(self.error(format!("'{}' is already declared as a class", name), span));
        }

        if let Some(scope) = self.variables.last_mut() {
            scope.insert(name.to_string());
        }
        Ok(())
    }

    fn declare_function(&mut self, name: &str, arity: i32, span: Span) -> SableResult<()> {
        if self.find_variable(name).is_some() {
            return Err(self.error(format!("'{}' is already declared as a variable", name), span));
        }
        if self.class_visible(name) {
            return Err(self.error(format!("'{}' is already declared as a class", name), span));
        }
        let duplicate = self
            .functions
            .last()
            .and_then(|scope| scope.get(name))
            .is_some_and(|arities| arities.contains(&arity));
        if duplicate {
            return Err(self.error(
                format!(
                    "Function '{}' with {} parameter(s) is already declared in this scope",
                    name,
                    describe_arity(arity)
                ),
                span,
            ));
        }

        if let Some(scope) = self.functions.last_mut() {
            scope.entry(name.to_string()).or_default().push(arity);
        }
        Ok(())
    }

    fn declare_class(&mut self, name: &str, shape: ClassShape, span: Span) -> SableResult<()> {
        if self.find_variable(name).is_some() {
            return Err(self.error(format!("'{}' is already declared as a variable", name), span));
        }
        if self.function_visible(name) || self.natives.functions.contains(name) {
            return Err(self.error(format!("'{}' is already declared as a function", name), span));
        }
        if self.natives.classes.contains_key(name) {
            return Err(self.error(format!("'{}' is a built-in class", name), span));
        }
        if self.classes.last().is_some_and(|scope| scope.contains_key(name)) {
            return Err(self.error(format!("Class '{}' is already declared in this scope", name), span));
        }

        if let Some(scope) = self.classes.last_mut() {
            scope.insert(name.to_string(), shape);
        }
        Ok(())
    }

    // ==================== Statements ====================

    fn resolve_statements(&mut self, statements: &[Stmt]) -> SableResult<()> {
        for statement in statements {
            self.resolve_statement(statement)?;
        }
        Ok(())
    }

    fn resolve_statement(&mut self, statement: &Stmt) -> SableResult<()> {
        match statement {
            Stmt::Local {
                name,
                hint,
                initializer,
                span,
            } => {
                if let Some(hint) = hint {
                    self.resolve_hint(hint);
                }
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer)?;
                }
                self.declare_variable(name, *span)
            }

            Stmt::Expression { expr, .. } => self.resolve_expr(expr),

            Stmt::Block { statements, .. } => {
                self.begin_scope();
                let result = self.resolve_statements(statements);
                self.end_scope();
                result
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_expr(condition)?;
                self.resolve_statement(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.resolve_statement(else_branch)?;
                }
                Ok(())
            }

            Stmt::While { condition, body, .. } | Stmt::DoWhile { condition, body, .. } => {
                self.resolve_expr(condition)?;
                self.resolve_loop_body(body)
            }

            Stmt::For {
                init,
                condition,
                step,
                body,
                ..
            } => {
                self.begin_scope();
                let result = self.resolve_for(init, condition, step, body);
                self.end_scope();
                result
            }

            Stmt::Foreach {
                variable,
                iterable,
                body,
                span,
            } => {
                self.resolve_expr(iterable)?;
                self.begin_scope();
                let result = self
                    .declare_variable(variable, *span)
                    .and_then(|_| self.resolve_loop_body(body));
                self.end_scope();
                result
            }

            Stmt::Function { decl } => {
                self.declare_function(&decl.name, decl.arity(), decl.span)?;
                self.resolve_function(decl, Context::Function)
            }

            Stmt::Class { decl } => self.resolve_class(decl),

            Stmt::Interface { decl } => {
                let shape = ClassShape {
                    constructors: SmallVec::new(),
                    is_interface: true,
                    can_extend: true,
                };
                self.declare_class(&decl.name, shape, decl.span)?;
                for parent in &decl.parents {
                    self.resolve_type_ref(parent);
                }
                Ok(())
            }

            Stmt::Return { value, span } => {
                for context in self.contexts.iter().rev() {
                    match context {
                        Context::Finally => {
                            return Err(self.error("Cannot return from a finally block", *span));
                        }
                        Context::Constructor => {
                            return Err(self
                                .error("Cannot return from a constructor", *span)
                                .with_help("Constructors initialize 'this' and never return a value"));
                        }
                        c if c.is_function_boundary() => break,
                        _ => {}
                    }
                }
                match value {
                    Some(value) => self.resolve_expr(value),
                    None => Ok(()),
                }
            }

            Stmt::Break { span } => self.check_loop_jump("break", *span),
            Stmt::Continue { span } => self.check_loop_jump("continue", *span),

            Stmt::Throw { value, span } => {
                for context in self.contexts.iter().rev() {
                    if *context == Context::Finally {
                        return Err(self.error("Cannot throw from a finally block", *span));
                    }
                    if context.is_function_boundary() {
                        break;
                    }
                }
                self.resolve_expr(value)
            }

            Stmt::Try {
                body,
                catch,
                finally,
                ..
            } => {
                self.resolve_statement(body)?;
                if let Some(catch) = catch {
                    for filter in &catch.types {
                        self.resolve_type_ref(filter);
                    }
                    self.begin_scope();
                    let result = self
                        .declare_variable(&catch.name, catch.span)
                        .and_then(|_| self.resolve_statements(&catch.body));
                    self.end_scope();
                    result?;
                }
                if let Some(finally) = finally {
                    self.contexts.push(Context::Finally);
                    let result = self.resolve_statement(finally);
                    self.contexts.pop();
                    result?;
                }
                Ok(())
            }

            // Imported classes are found through module promises at runtime
            Stmt::Import { .. } => Ok(()),
        }
    }

    fn resolve_for(
        &mut self,
        init: &Option<Box<Stmt>>,
        condition: &Option<Expr>,
        step: &Option<Expr>,
        body: &Stmt,
    ) -> SableResult<()> {
        if let Some(init) = init {
            self.resolve_statement(init)?;
        }
        if let Some(condition) = condition {
            self.resolve_expr(condition)?;
        }
        if let Some(step) = step {
            self.resolve_expr(step)?;
        }
        self.resolve_loop_body(body)
    }

    fn resolve_loop_body(&mut self, body: &Stmt) -> SableResult<()> {
        self.contexts.push(Context::Loop);
        let result = self.resolve_statement(body);
        self.contexts.pop();
        result
    }

    fn check_loop_jump(&self, keyword: &str, span: Span) -> SableResult<()> {
        for context in self.contexts.iter().rev() {
            match context {
                Context::Loop => return Ok(()),
                Context::Finally => {
                    return Err(self.error(format!("'{}' cannot be used inside a finally block", keyword), span));
                }
                _ => break,
            }
        }
        Err(self.error(format!("'{}' outside of loop", keyword), span))
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, context: Context) -> SableResult<()> {
        self.contexts.push(context);
        self.begin_scope();
        let result = self.resolve_function_scope(decl, context);
        self.end_scope();
        self.contexts.pop();
        result
    }

    fn resolve_function_scope(&mut self, decl: &FunctionDecl, context: Context) -> SableResult<()> {
        if matches!(context, Context::Method | Context::Constructor) {
            if let Some(scope) = self.variables.last_mut() {
                scope.insert("this".to_string());
            }
        }

        for param in &decl.params {
            if self.variables.last().is_some_and(|scope| scope.contains(&param.name)) {
                return Err(self.error(format!("Duplicate parameter '{}'", param.name), param.span));
            }
            self.declare_variable(&param.name, param.span)?;
            if let Some(hint) = &param.hint {
                self.resolve_hint(hint);
            }
        }
        if let Some(hint) = &decl.return_type {
            self.resolve_hint(hint);
        }
        if let Some(delegate) = &decl.delegate {
            for arg in &delegate.args {
                self.resolve_expr(arg)?;
            }
        }

        self.resolve_statements(&decl.body)
    }

    fn resolve_class(&mut self, decl: &ClassDecl) -> SableResult<()> {
        for parent in &decl.parents {
            self.resolve_type_ref(parent);
        }

        let superclass = if decl.kind == ClassKind::Enum {
            None
        } else {
            self.check_superclass(decl)?
        };

        let shape = ClassShape {
            constructors: decl.constructors.iter().map(|c| c.arity()).collect(),
            is_interface: false,
            can_extend: decl.kind == ClassKind::Class,
        };

        if let Some(parent) = superclass {
            self.check_super_initialization(decl, &parent)?;
        }
        self.check_this_delegation(decl, &shape)?;

        self.declare_class(&decl.name, shape, decl.span)?;

        self.class_stack.push(SuperOwner {
            class: decl.id,
            name: decl.name.clone(),
        });
        self.begin_scope();
        let result = self.resolve_class_body(decl);
        self.end_scope();
        self.class_stack.pop();
        result
    }

    /// The single non-interface parent, when its shape is known statically
    fn check_superclass(&self, decl: &ClassDecl) -> SableResult<Option<ClassShape>> {
        for parent in &decl.parents {
            let Some(shape) = self.class_shape(&parent.name) else {
                continue;
            };
            if shape.is_interface {
                continue;
            }
            if !shape.can_extend {
                return Err(self
                    .error(format!("Cannot extend '{}'", parent.name), parent.span)
                    .with_help(format!("'{}' is sealed and cannot be used as a superclass", parent.name)));
            }
            return Ok(Some(shape.clone()));
        }
        Ok(None)
    }

    fn check_super_initialization(&self, decl: &ClassDecl, parent: &ClassShape) -> SableResult<()> {
        let parent_name = decl
            .parents
            .iter()
            .find(|p| self.class_shape(&p.name).is_some_and(|s| !s.is_interface))
            .map(|p| p.name.as_str())
            .unwrap_or("super");

        if decl.constructors.is_empty() {
            if !parent.accepts(0) {
                return Err(self
                    .error(
                        format!(
                            "Class '{}' must declare a constructor: superclass '{}' has no constructor accepting 0 arguments",
                            decl.name, parent_name
                        ),
                        decl.span,
                    )
                    .with_help(format!("Add a constructor such as '{}(a): super(a);'", decl.name)));
            }
            return Ok(());
        }

        for constructor in &decl.constructors {
            let argc = match &constructor.delegate {
                Some(delegate) if delegate.kind == DelegateKind::This => continue,
                Some(delegate) => delegate.args.len(),
                None => 0,
            };
            if !parent.accepts(argc) {
                return Err(self
                    .error(
                        format!(
                            "Superclass '{}' has no constructor accepting {} argument(s)",
                            parent_name, argc
                        ),
                        constructor.span,
                    )
                    .with_help("Call a matching parent constructor with ': super(...)'"));
            }
        }
        Ok(())
    }

    fn check_this_delegation(&self, decl: &ClassDecl, shape: &ClassShape) -> SableResult<()> {
        for constructor in &decl.constructors {
            let Some(delegate) = &constructor.delegate else {
                continue;
            };
            if delegate.kind == DelegateKind::This && !shape.accepts(delegate.args.len()) {
                return Err(self.error(
                    format!(
                        "Class '{}' has no constructor accepting {} argument(s)",
                        decl.name,
                        delegate.args.len()
                    ),
                    delegate.span,
                ));
            }
        }
        Ok(())
    }

    fn resolve_class_body(&mut self, decl: &ClassDecl) -> SableResult<()> {
        // Statics and enum constants are evaluated directly in the class scope
        self.contexts.push(Context::Static);
        let statics = self.resolve_static_members(decl);
        self.contexts.pop();
        statics?;

        // Instance field initializers share one scope that holds `this`
        self.contexts.push(Context::Method);
        self.begin_scope();
        if let Some(scope) = self.variables.last_mut() {
            scope.insert("this".to_string());
        }
        let fields = self.resolve_fields(&decl.fields);
        self.end_scope();
        self.contexts.pop();
        fields?;

        for constructor in &decl.constructors {
            self.resolve_function(constructor, Context::Constructor)?;
        }
        for method in &decl.methods {
            self.resolve_function(method, Context::Method)?;
        }
        for (_, overload) in &decl.operators {
            self.resolve_function(overload, Context::Method)?;
        }
        for method in &decl.static_methods {
            self.resolve_function(method, Context::Static)?;
        }
        Ok(())
    }

    fn resolve_static_members(&mut self, decl: &ClassDecl) -> SableResult<()> {
        for constant in &decl.constants {
            for arg in &constant.args {
                self.resolve_expr(arg)?;
            }
        }
        self.resolve_fields(&decl.static_fields)
    }

    fn resolve_fields(&mut self, fields: &[FieldDecl]) -> SableResult<()> {
        for field in fields {
            if let Some(hint) = &field.hint {
                self.resolve_hint(hint);
            }
            if let Some(initializer) = &field.initializer {
                self.resolve_expr(initializer)?;
            }
        }
        Ok(())
    }

    fn resolve_hint(&mut self, hint: &TypeHint) {
        for option in &hint.options {
            self.resolve_type_ref(option);
        }
    }

    fn resolve_type_ref(&mut self, type_ref: &TypeRef) {
        if let Some((distance, _)) = self.find_class(&type_ref.name) {
            self.cache.classes.insert(type_ref.id, distance);
        }
    }

    // ==================== Expressions ====================

    fn resolve_exprs(&mut self, exprs: &[Expr]) -> SableResult<()> {
        for expr in exprs {
            self.resolve_expr(expr)?;
        }
        Ok(())
    }

    fn resolve_expr(&mut self, expr: &Expr) -> SableResult<()> {
        match expr {
            Expr::Literal { .. } => Ok(()),

            Expr::List { elements, .. } => self.resolve_exprs(elements),

            Expr::Map { entries, .. } => {
                for (key, value) in entries {
                    self.resolve_expr(key)?;
                    self.resolve_expr(value)?;
                }
                Ok(())
            }

            Expr::Access { id, name, .. } => {
                match self.find_any(name) {
                    Some((Found::Variable, distance)) => self.cache.variables.insert(*id, distance),
                    Some((Found::Function, distance)) => self.cache.functions.insert(*id, distance),
                    Some((Found::Class, distance)) => self.cache.classes.insert(*id, distance),
                    None => None,
                };
                Ok(())
            }

            Expr::Assign {
                id,
                name,
                value,
                span,
                ..
            } => {
                self.resolve_expr(value)?;
                if let Some(distance) = self.find_variable(name) {
                    self.cache.variables.insert(*id, distance);
                    return Ok(());
                }
                if self.function_visible(name) || self.natives.functions.contains(name) {
                    return Err(self.error(format!("Cannot assign to function '{}'", name), *span));
                }
                if self.class_visible(name) {
                    return Err(self.error(format!("Cannot assign to class '{}'", name), *span));
                }
                // A bare assignment to an unknown name declares it here
                self.declare_variable(name, *span)?;
                self.cache.variables.insert(*id, 0);
                Ok(())
            }

            Expr::FunctionCall { id, name, args, .. } => {
                self.resolve_exprs(args)?;
                if let Some(distance) = self.find_function(name, args.len()) {
                    self.cache.functions.insert(*id, distance);
                } else if let Some(distance) = self.find_variable(name) {
                    self.cache.variables.insert(*id, distance);
                } else if let Some((distance, _)) = self.find_class(name) {
                    self.cache.classes.insert(*id, distance);
                }
                Ok(())
            }

            Expr::Call { callee, args, .. } => {
                self.resolve_expr(callee)?;
                self.resolve_exprs(args)
            }

            Expr::Member { object, .. } => self.resolve_expr(object),

            Expr::MemberAssign { object, value, .. } => {
                self.resolve_expr(object)?;
                self.resolve_expr(value)
            }

            Expr::MemberCall { object, args, .. } => {
                self.resolve_expr(object)?;
                self.resolve_exprs(args)
            }

            Expr::Bracket { object, index, .. } => {
                self.resolve_expr(object)?;
                self.resolve_expr(index)
            }

            Expr::BracketAssign {
                object,
                index,
                value,
                ..
            } => {
                self.resolve_expr(object)?;
                self.resolve_expr(index)?;
                self.resolve_expr(value)
            }

            Expr::Unary { operand, .. } => self.resolve_expr(operand),

            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)
            }

            Expr::This { id, span } => {
                self.check_instance_context("this", *span)?;
                if let Some(distance) = self.find_variable("this") {
                    self.cache.variables.insert(*id, distance);
                }
                Ok(())
            }

            Expr::SuperCall { id, args, span, .. } => {
                self.check_instance_context("super", *span)?;
                if let Some(distance) = self.find_variable("this") {
                    self.cache.variables.insert(*id, distance);
                }
                if let Some(owner) = self.class_stack.last() {
                    self.cache.supers.insert(*id, owner.clone());
                }
                self.resolve_exprs(args)
            }

            Expr::New { id, class, args, .. } => {
                if let Some((distance, _)) = self.find_class(class) {
                    self.cache.classes.insert(*id, distance);
                }
                self.resolve_exprs(args)
            }

            Expr::Function { decl, .. } => self.resolve_function(decl, Context::Function),
        }
    }

    /// `this` and `super` need an enclosing method or constructor
    fn check_instance_context(&self, keyword: &str, span: Span) -> SableResult<()> {
        for context in self.contexts.iter().rev() {
            match context {
                Context::Method | Context::Constructor => return Ok(()),
                Context::Static => {
                    return Err(self.error(format!("Cannot use '{}' in a static context", keyword), span));
                }
                _ => {}
            }
        }
        Err(self.error(format!("Cannot use '{}' outside of a class", keyword), span))
    }
}

fn describe_arity(arity: i32) -> String {
    if arity < 0 {
        "variadic".to_string()
    } else {
        arity.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn natives() -> NativeNames {
        let mut names = NativeNames::default();
        names.functions.insert("print".to_string());
        names.classes.insert(
            "Object".to_string(),
            ClassShape {
                constructors: SmallVec::new(),
                is_interface: false,
                can_extend: true,
            },
        );
        names.classes.insert(
            "Number".to_string(),
            ClassShape {
                constructors: SmallVec::new(),
                is_interface: false,
                can_extend: false,
            },
        );
        names
    }

    fn resolve(source: &str) -> SableResult<(Program, LocalCache)> {
        let program = parse_source(source, "test.sbl")?;
        let names = natives();
        let cache = Resolver::new(&names, "test.sbl", source).resolve(&program)?;
        Ok((program, cache))
    }

    fn compile_error(source: &str) -> String {
        match resolve(source) {
            Ok(_) => panic!("expected a compile error for: {}", source),
            Err(error) => error.message,
        }
    }

    #[test]
    fn test_redeclaration_in_same_block_is_rejected() {
        assert_eq!(
            compile_error("local x = 1; local x = 2;"),
            "Variable 'x' is already declared locally"
        );
    }

    #[test]
    fn test_shadowing_in_nested_block_is_allowed() {
        assert!(resolve("local x = 1; { local x = 2; }").is_ok());
    }

    #[test]
    fn test_cross_namespace_collision() {
        assert_eq!(
            compile_error("local f = 1; fun f() {}"),
            "'f' is already declared as a variable"
        );
        assert_eq!(
            compile_error("fun f() {} local f = 1;"),
            "'f' is already declared as a function"
        );
        assert_eq!(
            compile_error("class A {} fun A() {}"),
            "'A' is already declared as a class"
        );
    }

    #[test]
    fn test_overloads_by_arity_are_allowed() {
        assert!(resolve("fun g(a, b) {} fun g(args...) {}").is_ok());
        assert_eq!(
            compile_error("fun g(a) {} fun g(b) {}"),
            "Function 'g' with 1 parameter(s) is already declared in this scope"
        );
    }

    #[test]
    fn test_variable_distances() {
        let (program, cache) = resolve("local x = 10; fun f() { { x = x + 1; } }").unwrap();
        let Stmt::Function { decl } = &program.statements[1] else {
            panic!("expected function");
        };
        let Stmt::Block { statements, .. } = &decl.body[0] else {
            panic!("expected block");
        };
        let Stmt::Expression { expr: Expr::Assign { id, value, .. }, .. } = &statements[0] else {
            panic!("expected assignment");
        };
        // block -> function scope -> global
        assert_eq!(cache.variable(*id), Some(2));
        let Expr::Binary { left, .. } = value.as_ref() else {
            panic!("expected binary");
        };
        let Expr::Access { id, .. } = left.as_ref() else {
            panic!("expected access");
        };
        assert_eq!(cache.variable(*id), Some(2));
    }

    #[test]
    fn test_function_call_prefers_exact_arity_then_variadic() {
        let (program, cache) = resolve(
            "fun g(args...) {} { fun g(a, b) {} g(1, 2); g(1, 2, 3); }",
        )
        .unwrap();
        let Stmt::Block { statements, .. } = &program.statements[1] else {
            panic!("expected block");
        };
        let ids: Vec<NodeId> = statements
            .iter()
            .filter_map(|s| match s {
                Stmt::Expression { expr: Expr::FunctionCall { id, .. }, .. } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(cache.function(ids[0]), Some(0));
        assert_eq!(cache.function(ids[1]), Some(1));
    }

    #[test]
    fn test_unknown_names_stay_uncached() {
        let (_, cache) = resolve("print(1); Missing;").unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_illegal_control_flow() {
        assert_eq!(compile_error("break;"), "'break' outside of loop");
        assert_eq!(
            compile_error("while (true) { fun f() { continue; } }"),
            "'continue' outside of loop"
        );
        assert_eq!(
            compile_error("while (true) { try { } finally { break; } }"),
            "'break' cannot be used inside a finally block"
        );
        assert_eq!(
            compile_error("fun f() { try { } finally { return 1; } }"),
            "Cannot return from a finally block"
        );
        assert_eq!(
            compile_error("try { } finally { throw 1; }"),
            "Cannot throw from a finally block"
        );
        assert_eq!(
            compile_error("class A { A() { return; } }"),
            "Cannot return from a constructor"
        );
    }

    #[test]
    fn test_this_outside_class() {
        assert_eq!(compile_error("this;"), "Cannot use 'this' outside of a class");
        assert_eq!(
            compile_error("class A { static fun f() { return this; } }"),
            "Cannot use 'this' in a static context"
        );
        assert!(resolve("class A { fun f() { return fun() { return this; }; } }").is_ok());
    }

    #[test]
    fn test_super_records_enclosing_class() {
        let (program, cache) =
            resolve("class A { fun f() { return 1; } } class B: A { fun f() { return super.f() + 1; } }")
                .unwrap();
        let Stmt::Class { decl } = &program.statements[1] else {
            panic!("expected class");
        };
        let Stmt::Return { value: Some(Expr::Binary { left, .. }), .. } = &decl.methods[0].body[0] else {
            panic!("expected return");
        };
        let Expr::SuperCall { id, .. } = left.as_ref() else {
            panic!("expected super call");
        };
        assert_eq!(cache.super_owner(*id).map(|owner| owner.name.as_str()), Some("B"));
        assert_eq!(cache.super_owner(*id).map(|owner| owner.class), Some(decl.id));
        // method scope holds `this`
        assert_eq!(cache.variable(*id), Some(0));
    }

    #[test]
    fn test_super_initialization_arity() {
        assert_eq!(
            compile_error("class A { A(x) { } } class B: A { B(): super(); }"),
            "Superclass 'A' has no constructor accepting 0 argument(s)"
        );
        assert!(resolve("class A { A(x) { } } class B: A { B(): super(1); }").is_ok());
        assert_eq!(
            compile_error("class A { A(x) { } } class B: A { }"),
            "Class 'B' must declare a constructor: superclass 'A' has no constructor accepting 0 arguments"
        );
        assert!(resolve("class A { A(x) { } } class B: A { B(): this(1); B(x): super(x); }").is_ok());
    }

    #[test]
    fn test_sealed_superclass() {
        assert_eq!(compile_error("class N: Number { }"), "Cannot extend 'Number'");
    }

    #[test]
    fn test_assignment_to_function_is_rejected() {
        assert_eq!(compile_error("fun f() {} f = 1;"), "Cannot assign to function 'f'");
    }
}
