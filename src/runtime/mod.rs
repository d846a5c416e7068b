// Sable runtime model: values, callables, class definitions and the
// collaborators the interpreter talks to

pub mod class;
pub mod function;
pub mod host;
pub mod maps;
pub mod module;
pub mod task;
pub mod thread;
pub mod user;
pub mod value;

pub use class::{ClassCore, ClassDefinition, ClassRef, Rhs};
pub use function::{Function, FunctionKind, FunctionRole, NativeFn, NativeMethodFn, UserFunction};
pub use host::{
    BufferSink, Executor, FileImportResolver, ImportResolver, MemoryImportResolver, OutputSink,
    StdSink, ThreadExecutor,
};
pub use maps::{FunctionMap, OperatorMap};
pub use module::{ImportState, ModuleMap};
pub use task::{FutureValue, Task};
pub use thread::{ScriptThread, ThreadHandler};
pub use user::{UserClass, UserInterface};
pub use value::{format_number, EnumTag, Object, Value, ValueMap};
