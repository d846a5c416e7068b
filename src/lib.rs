// Sable Programming Language
// A class-based, thread-aware tree-walking interpreter

pub mod ast;
pub mod builtins;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod runtime;

pub use config::Config;
pub use error::{ErrorKind, SableError, SableResult, Trace};
pub use interpreter::{Interpreter, InterpreterBuilder};
pub use runtime::{
    BufferSink, Executor, FileImportResolver, ImportResolver, MemoryImportResolver, OutputSink,
    StdSink, ThreadExecutor, Value,
};
