// Sable Interpreter
// Tree-walking evaluator. A root interpreter owns the shared registries;
// branches copy the scope cursor and call stack, children get a fresh
// global scope. No interpreter is shared between threads.

mod call;
mod concurrency;
mod declare;
mod eval;
mod exec;
mod import;
mod lookup;
mod scope;

pub use exec::Flow;
pub use scope::StackTable;

use parking_lot::{ReentrantMutex, RwLock};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::ast::Program;
use crate::builtins::{self, Primitives};
use crate::config::Config;
use crate::error::{
    runtime_error, ErrorKind, EvalResult, RuntimeError, SableError, SableResult, Span, Trace,
    Unwind,
};
use crate::parser::parse_source;
use crate::resolver::{ClassShape, LocalCache, NativeNames, Resolver};
use crate::runtime::{
    ClassRef, Executor, FileImportResolver, Function, FunctionMap, ImportResolver, ModuleMap,
    NativeFn, OutputSink, ScriptThread, StdSink, ThreadExecutor, ThreadHandler, Value,
};

/// State every interpreter of one program shares
pub struct Shared {
    pub config: Config,
    pub natives: RwLock<FunctionMap>,
    /// Globally visible classes: primitives and host-registered ones
    pub classes: RwLock<FxHashMap<String, ClassRef>>,
    pub primitives: Primitives,
    pub modules: ModuleMap,
    pub threads: ThreadHandler,
    pub sink: Arc<dyn OutputSink>,
    pub importer: Arc<dyn ImportResolver>,
    pub executor: Arc<dyn Executor>,
    /// Serializes imports; re-entrant so nested imports on one thread work
    import_lock: ReentrantMutex<()>,
}

pub struct InterpreterBuilder {
    config: Config,
    sink: Option<Arc<dyn OutputSink>>,
    importer: Option<Arc<dyn ImportResolver>>,
    executor: Option<Arc<dyn Executor>>,
}

impl InterpreterBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn importer(mut self, importer: Arc<dyn ImportResolver>) -> Self {
        self.importer = Some(importer);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Create the root interpreter with primitives and natives registered
    pub fn build(self) -> Interpreter {
        let config = self.config;
        let importer = self.importer.unwrap_or_else(|| {
            Arc::new(FileImportResolver::new(
                config.import_root.clone(),
                config.library_extension.clone(),
            ))
        });

        let primitives = builtins::create_primitives();
        let mut classes = FxHashMap::default();
        for class in primitives.all() {
            classes.insert(class.name().to_string(), class);
        }
        let mut natives = FunctionMap::new();
        builtins::register_natives(&mut natives);

        let threads = ThreadHandler::new(&config.main_thread_name);
        let thread = threads.main().clone();
        let shared = Arc::new(Shared {
            natives: RwLock::new(natives),
            classes: RwLock::new(classes),
            primitives,
            modules: ModuleMap::new(),
            threads,
            sink: self.sink.unwrap_or_else(|| Arc::new(StdSink)),
            importer,
            executor: self.executor.unwrap_or_else(|| Arc::new(ThreadExecutor)),
            import_lock: ReentrantMutex::new(()),
            config,
        });

        let globals = StackTable::global();
        Interpreter {
            shared,
            table: globals.clone(),
            globals,
            cache: Arc::new(RwLock::new(LocalCache::new())),
            outer_caches: Vec::new(),
            trace: Vec::new(),
            thread,
            file: Arc::from("<main>"),
            source: Arc::from(""),
            program: None,
            call_site: Span::default(),
            suppress_stop: 0,
            nesting: 0,
        }
    }
}

pub struct Interpreter {
    shared: Arc<Shared>,
    globals: Arc<StackTable>,
    /// Current scope cursor
    table: Arc<StackTable>,
    cache: Arc<RwLock<LocalCache>>,
    /// Caches of the interpreters this child descends from, nearest first
    outer_caches: Vec<Arc<RwLock<LocalCache>>>,
    trace: Vec<Trace>,
    thread: Arc<ScriptThread>,
    file: Arc<str>,
    source: Arc<str>,
    program: Option<Arc<Program>>,
    /// Span of the call expression being evaluated, for trace frames
    call_site: Span,
    /// Non-zero while `finally` blocks run during a stop
    suppress_stop: usize,
    /// Depth of structural dispatch (equals, hash, toString) in progress
    nesting: usize,
}

impl Interpreter {
    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder {
            config: Config::default(),
            sink: None,
            importer: None,
            executor: None,
        }
    }

    pub fn new(config: Config) -> Self {
        Self::builder().config(config).build()
    }

    // ==================== Compile / run ====================

    /// Parse and resolve `source`; the distances are merged into this
    /// interpreter's cache and into every cache it descends from
    pub fn compile(&mut self, source: &str, file: &str) -> SableResult<()> {
        let program = parse_source(source, file)?;
        let names = self.native_names();
        let resolved = Resolver::new(&names, file, source).resolve(&program)?;

        self.cache.write().merge(&resolved);
        for outer in &self.outer_caches {
            outer.write().merge(&resolved);
        }
        tracing::debug!(file, statements = program.statements.len(), cached = resolved.len(), "compiled");

        self.program = Some(Arc::new(program));
        self.file = Arc::from(file);
        self.source = Arc::from(source);
        Ok(())
    }

    /// Run the compiled program. Returns the value of a top-level `return`,
    /// or of the last top-level expression statement.
    pub fn interpret(&mut self) -> SableResult<Value> {
        match self.run_program() {
            Ok(value) => Ok(value),
            Err(unwind) => match self.escaped_error(unwind) {
                Some(error) => Err(error),
                None => Ok(Value::Null),
            },
        }
    }

    pub fn run_source(&mut self, source: &str, file: &str) -> SableResult<Value> {
        self.compile(source, file)?;
        self.interpret()
    }

    /// Parse and resolve only
    pub fn check(&self, source: &str, file: &str) -> SableResult<()> {
        let program = parse_source(source, file)?;
        let names = self.native_names();
        Resolver::new(&names, file, source).resolve(&program)?;
        Ok(())
    }

    /// Execute the compiled program with errors left catchable by the caller
    pub(crate) fn run_program(&mut self) -> EvalResult {
        let Some(program) = self.program.clone() else {
            return Ok(Value::Null);
        };
        self.table = self.globals.clone();
        self.execute_program(&program)
    }

    /// Convert an escaped unwind into a host error; `None` for a stop
    fn escaped_error(&self, unwind: Unwind) -> Option<SableError> {
        match unwind {
            Unwind::Stop => {
                tracing::debug!(file = %self.file, "script stopped");
                None
            }
            Unwind::Error(error) => Some(self.report(error)),
            Unwind::Fatal(fatal) => {
                tracing::error!(message = %fatal.message, "fatal error");
                Some(fatal.into_sable(&self.file))
            }
        }
    }

    pub(crate) fn report(&self, error: RuntimeError) -> SableError {
        let same_file = error.file.as_deref().is_some_and(|file| file == &*self.file);
        let source = same_file.then(|| self.source.to_string());
        error.into_sable(source.as_deref())
    }

    // ==================== Shapes ====================

    /// Fresh view sharing everything but the scope cursor and call stack
    pub fn branch(&self) -> Interpreter {
        Interpreter {
            shared: self.shared.clone(),
            globals: self.globals.clone(),
            table: self.table.clone(),
            cache: self.cache.clone(),
            outer_caches: self.outer_caches.clone(),
            trace: self.trace.clone(),
            thread: self.thread.clone(),
            file: self.file.clone(),
            source: self.source.clone(),
            program: self.program.clone(),
            call_site: self.call_site,
            suppress_stop: 0,
            nesting: 0,
        }
    }

    /// Interpreter with its own global scope and cache, for imports and `eval`
    pub fn child(&self, file: &str) -> Interpreter {
        let globals = StackTable::global();
        let mut outer_caches = vec![self.cache.clone()];
        outer_caches.extend(self.outer_caches.iter().cloned());
        Interpreter {
            shared: self.shared.clone(),
            table: globals.clone(),
            globals,
            cache: Arc::new(RwLock::new(LocalCache::new())),
            outer_caches,
            trace: self.trace.clone(),
            thread: self.thread.clone(),
            file: Arc::from(file),
            source: Arc::from(""),
            program: None,
            call_site: self.call_site,
            suppress_stop: self.suppress_stop,
            nesting: self.nesting,
        }
    }

    // ==================== Registration ====================

    pub fn register_function(&self, name: &str, arity: i32, function: NativeFn) {
        self.shared
            .natives
            .write()
            .insert(Arc::new(Function::native(name, arity, function)));
    }

    pub fn register_class(&self, class: ClassRef) {
        self.shared
            .classes
            .write()
            .insert(class.name().to_string(), class);
    }

    fn native_names(&self) -> NativeNames {
        let functions = self.shared.natives.read().names().map(String::from).collect();
        let classes = self
            .shared
            .classes
            .read()
            .iter()
            .map(|(name, class)| {
                let core = class.core();
                let shape = ClassShape {
                    constructors: core.constructors.iter().map(|c| c.arity).collect(),
                    is_interface: core.is_interface,
                    can_extend: core.can_extend,
                };
                (name.clone(), shape)
            })
            .collect();
        NativeNames { functions, classes }
    }

    // ==================== Accessors ====================

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn sink(&self) -> &Arc<dyn OutputSink> {
        &self.shared.sink
    }

    pub fn primitives(&self) -> &Primitives {
        &self.shared.primitives
    }

    pub fn globals(&self) -> &Arc<StackTable> {
        &self.globals
    }

    pub fn thread(&self) -> &Arc<ScriptThread> {
        &self.thread
    }

    pub fn threads(&self) -> &ThreadHandler {
        &self.shared.threads
    }

    pub fn file(&self) -> &Arc<str> {
        &self.file
    }

    pub fn call_stack(&self) -> &[Trace] {
        &self.trace
    }

    pub fn is_main_thread(&self) -> bool {
        Arc::ptr_eq(&self.thread, self.shared.threads.main())
    }

    /// Block until every script-spawned thread and task has finished
    pub fn wait_for_threads(&self) {
        self.shared.threads.wait_for_threads();
    }

    /// Liveness check run before every loop iteration and call
    pub fn check_alive(&self) -> EvalResult<()> {
        self.thread.check(self.suppress_stop > 0)
    }

    pub fn stop_suppressed(&self) -> bool {
        self.suppress_stop > 0
    }

    // ==================== Dispatch helpers ====================

    pub fn definition_of(&self, value: &Value) -> ClassRef {
        let primitives = &self.shared.primitives;
        match value {
            Value::Null => primitives.null.clone(),
            Value::Boolean(_) => primitives.boolean.clone(),
            Value::Number(_) => primitives.number.clone(),
            Value::String(_) => primitives.string.clone(),
            Value::List(_) => primitives.list.clone(),
            Value::Map(_) => primitives.map.clone(),
            Value::Function(_) => primitives.function.clone(),
            Value::Type(_) => primitives.type_.clone(),
            Value::Object(object) => object.class.clone(),
            Value::Thread(_) => primitives.thread.clone(),
            Value::Task(_) => primitives.task.clone(),
            Value::Future(_) => primitives.future.clone(),
        }
    }

    pub fn type_name(&self, value: &Value) -> String {
        self.definition_of(value).name().to_string()
    }

    pub fn is_instance(&self, value: &Value, class: &ClassRef) -> bool {
        self.definition_of(value).is_subclass_of(class)
    }

    pub fn values_equal(&mut self, left: &Value, right: &Value) -> EvalResult<bool> {
        let definition = self.definition_of(left);
        self.nested(|interp| definition.equals(interp, left, right))
    }

    pub fn hash_value(&mut self, value: &Value) -> EvalResult<u64> {
        let definition = self.definition_of(value);
        self.nested(|interp| definition.hash(interp, value))
    }

    pub fn compare(&mut self, left: &Value, right: &Value) -> EvalResult<Ordering> {
        let definition = self.definition_of(left);
        self.nested(|interp| definition.compare(interp, left, right))
    }

    pub fn stringify(&mut self, value: &Value) -> EvalResult<String> {
        let definition = self.definition_of(value);
        self.nested(|interp| definition.to_string(interp, value))
    }

    /// Collections recurse into their elements without passing `invoke`,
    /// so a self-containing list needs its own depth limit
    fn nested<T>(&mut self, operation: impl FnOnce(&mut Interpreter) -> EvalResult<T>) -> EvalResult<T> {
        let max_depth = self.config().max_call_depth;
        if self.nesting >= max_depth {
            return Err(runtime_error(
                ErrorKind::StackOverflow,
                format!("Stack overflow: value nested deeper than {} levels", max_depth),
            ));
        }
        self.nesting += 1;
        let result = stacker::maybe_grow(eval::RED_ZONE, eval::STACK_SEGMENT, || operation(self));
        self.nesting -= 1;
        result
    }

    pub fn copy_value(&mut self, value: &Value) -> EvalResult {
        self.definition_of(value).copy(self, value)
    }

    pub fn iterate(&mut self, value: &Value) -> EvalResult<Vec<Value>> {
        self.definition_of(value).iterate(self, value)
    }

    /// Apply a binary operator to an already evaluated right operand
    pub fn binary_values(&mut self, left: &Value, op: crate::ast::Operator, right: Value) -> EvalResult {
        let definition = self.definition_of(left);
        definition.binary(self, left, op, &mut move |_: &mut Interpreter| -> EvalResult { Ok(right.clone()) })
    }

    /// Apply a relational operator that must answer with a Boolean
    pub fn test_operator(&mut self, left: &Value, op: crate::ast::Operator, right: Value) -> EvalResult<bool> {
        let result = self.binary_values(left, op, right)?;
        self.expect_boolean(result, &format!("operator {}", op))
    }

    pub fn expect_boolean(&self, value: Value, what: &str) -> EvalResult<bool> {
        match value {
            Value::Boolean(b) => Ok(b),
            other => Err(runtime_error(
                ErrorKind::TypeError,
                format!("{} must return a Boolean, got {}", what, self.type_name(&other)),
            )),
        }
    }
}
