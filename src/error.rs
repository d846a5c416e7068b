// Sable Error Handling Module
// Compile-time reports, the runtime error taxonomy and call-stack traces

use colored::*;
use std::fmt;
use std::sync::Arc;

use crate::runtime::Value;

/// Represents a position in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

/// Represents a span in the source code (start to end position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn single(line: usize, column: usize, offset: usize) -> Self {
        let pos = Position::new(line, column, offset);
        Self {
            start: pos,
            end: pos,
        }
    }

    pub fn from_positions(
        start_line: usize,
        start_column: usize,
        end_line: usize,
        end_column: usize,
    ) -> Self {
        Self {
            start: Position::new(start_line, start_column, 0),
            end: Position::new(end_line, end_column, 0),
        }
    }

    /// Span covering `self` through `other`
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
        }
    }
}

/// Types of errors in Sable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SyntaxError,
    CompileError,
    TypeError,
    NameError,
    RuntimeError,
    ArgumentError,
    IndexError,
    DivisionByZero,
    NoSuchMethod,
    ImportError,
    InterfaceError,
    StackOverflow,
    Fatal,
}

impl ErrorKind {
    /// Kinds that have a catchable script-level class of the same name
    pub const CATCHABLE: [ErrorKind; 11] = [
        ErrorKind::CompileError,
        ErrorKind::TypeError,
        ErrorKind::NameError,
        ErrorKind::RuntimeError,
        ErrorKind::ArgumentError,
        ErrorKind::IndexError,
        ErrorKind::DivisionByZero,
        ErrorKind::NoSuchMethod,
        ErrorKind::ImportError,
        ErrorKind::InterfaceError,
        ErrorKind::StackOverflow,
    ];

    pub fn from_name(name: &str) -> Option<ErrorKind> {
        Self::CATCHABLE
            .into_iter()
            .find(|kind| kind.to_string() == name)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::CompileError => "CompileError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::NameError => "NameError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::ArgumentError => "ArgumentError",
            ErrorKind::IndexError => "IndexError",
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::NoSuchMethod => "NoSuchMethod",
            ErrorKind::ImportError => "ImportError",
            ErrorKind::InterfaceError => "InterfaceError",
            ErrorKind::StackOverflow => "StackOverflow",
            ErrorKind::Fatal => "FatalError",
        };
        write!(f, "{}", name)
    }
}

/// One call-stack frame, used only for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub file: Arc<str>,
    pub line: usize,
    pub column: usize,
    /// Human readable call description, present for value-level calls
    pub description: Option<String>,
}

impl Trace {
    pub fn new(file: Arc<str>, span: Span) -> Self {
        Self {
            file,
            line: span.start.line,
            column: span.start.column,
            description: None,
        }
    }

    pub fn call(file: Arc<str>, span: Span, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::new(file, span)
        }
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  at {} ({}:{}:{})",
            self.description.as_deref().unwrap_or("<script>"),
            self.file,
            self.line,
            self.column
        )
    }
}

/// Host-facing error: what the embedder or the CLI gets back
#[derive(Debug, Clone)]
pub struct SableError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
    pub file: String,
    pub help: Option<String>,
    pub stack_trace: Vec<Trace>,
    source_lines: Vec<String>,
}

impl SableError {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        span: Span,
        file: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            file: file.into(),
            help: None,
            stack_trace: Vec::new(),
            source_lines: Vec::new(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source_lines = source.lines().map(String::from).collect();
        self
    }

    pub fn with_stack_trace(mut self, trace: Vec<Trace>) -> Self {
        self.stack_trace = trace;
        self
    }

    /// Static violations found before anything executes
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::SyntaxError | ErrorKind::CompileError
        )
    }

    /// One uncolored line: `Kind: message at file:line:column`
    pub fn summary(&self) -> String {
        format!(
            "{}: {} at {}:{}:{}",
            self.kind, self.message, self.file, self.span.start.line, self.span.start.column
        )
    }

    /// Format the error for display
    pub fn format(&self) -> String {
        let mut output = String::new();

        let header = format!(
            "{}: {} at {}:{}:{}",
            self.kind.to_string().red().bold(),
            self.message.white().bold(),
            self.file,
            self.span.start.line,
            self.span.start.column
        );
        output.push_str(&header);
        output.push('\n');

        // Source context (line before, error line, line after)
        if !self.source_lines.is_empty() {
            let error_line = self.span.start.line;
            let start_line = if error_line > 1 { error_line - 1 } else { 1 };
            let end_line = (error_line + 1).min(self.source_lines.len());

            output.push('\n');

            for line_num in start_line..=end_line {
                let Some(line_content) = self.source_lines.get(line_num - 1) else {
                    continue;
                };
                let line_num_str = format!("{:>4} |", line_num);

                if line_num == error_line {
                    output.push_str(&format!("{} {}\n", line_num_str.red(), line_content));

                    let spaces = " ".repeat(6 + self.span.start.column);
                    let caret_len = if self.span.end.line == self.span.start.line
                        && self.span.end.column > self.span.start.column
                    {
                        self.span.end.column - self.span.start.column
                    } else {
                        1
                    };
                    let carets = "^".repeat(caret_len);
                    output.push_str(&format!("{}{}\n", spaces, carets.red().bold()));
                } else {
                    output.push_str(&format!("{} {}\n", line_num_str.dimmed(), line_content));
                }
            }
        }

        if let Some(ref help) = self.help {
            output.push_str(&format!("\n      {}: {}\n", "Help".cyan().bold(), help));
        }

        if !self.stack_trace.is_empty() {
            output.push_str(&format!("\n{}:\n", "Stack trace".yellow().bold()));
            for frame in self.stack_trace.iter() {
                output.push_str(&format!("{}\n", frame));
            }
        }

        output
    }
}

impl fmt::Display for SableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

impl std::error::Error for SableError {}

/// Result type for host-facing Sable operations
pub type SableResult<T> = Result<T, SableError>;

impl SableError {
    pub fn syntax_error(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, message, span, file)
    }

    pub fn compile_error(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::CompileError, message, span, file)
    }
}

/// A user-catchable failure; corresponds to the script-level `Error` value
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    /// The script value that was thrown, when there is one
    pub value: Option<Value>,
    pub span: Option<Span>,
    pub file: Option<Arc<str>>,
    pub trace: Vec<Trace>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            value: None,
            span: None,
            file: None,
            trace: Vec::new(),
        }
    }

    /// Error raised by a script-level `throw`
    pub fn thrown(value: Value, message: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            ..Self::new(ErrorKind::RuntimeError, message)
        }
    }

    /// Attach a location unless one is already present
    pub fn at(mut self, span: Span, file: &Arc<str>) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
            self.file = Some(file.clone());
        }
        self
    }

    pub fn push_frame(&mut self, frame: Trace) {
        self.trace.push(frame);
    }

    pub fn into_sable(self, source: Option<&str>) -> SableError {
        let file = self.file.as_deref().unwrap_or("<unknown>").to_string();
        let mut error = SableError::new(self.kind, self.message, self.span.unwrap_or_default(), file)
            .with_stack_trace(self.trace);
        if let Some(source) = source {
            error = error.with_source(source);
        }
        error
    }
}

/// An internal invariant violation or unexpected host fault.
/// Never caught by script-level `try/catch`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("FatalError: {message}")]
pub struct FatalError {
    pub message: String,
    pub trace: Vec<Trace>,
}

impl FatalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: Vec::new(),
        }
    }

    pub fn into_sable(self, file: &str) -> SableError {
        SableError::new(ErrorKind::Fatal, self.message, Span::default(), file)
            .with_stack_trace(self.trace)
    }
}

/// Everything that unwinds the evaluation stack abnormally
#[derive(Debug, Clone, thiserror::Error)]
pub enum Unwind {
    #[error(transparent)]
    Error(RuntimeError),
    #[error(transparent)]
    Fatal(FatalError),
    /// "Stop the whole script": caught by nothing but the top-level runner
    #[error("script execution was stopped")]
    Stop,
}

impl Unwind {
    /// Attach a location to a runtime error that has none yet
    pub fn at(self, span: Span, file: &Arc<str>) -> Self {
        match self {
            Unwind::Error(error) => Unwind::Error(error.at(span, file)),
            other => other,
        }
    }
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Error(error)
    }
}

impl From<FatalError> for Unwind {
    fn from(error: FatalError) -> Self {
        Unwind::Fatal(error)
    }
}

/// Result of evaluating an expression
pub type EvalResult<T = Value> = Result<T, Unwind>;

/// Shorthand for a catchable runtime failure
pub fn runtime_error(kind: ErrorKind, message: impl Into<String>) -> Unwind {
    Unwind::Error(RuntimeError::new(kind, message))
}

/// Shorthand for an internal-consistency fault
pub fn fatal_error(message: impl Into<String>) -> Unwind {
    Unwind::Fatal(FatalError::new(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_location_is_kept() {
        let file: Arc<str> = Arc::from("main.sbl");
        let first = Span::single(3, 7, 20);
        let error = RuntimeError::new(ErrorKind::TypeError, "bad")
            .at(first, &file)
            .at(Span::single(9, 1, 80), &file);
        assert_eq!(error.span, Some(first));
    }

    #[test]
    fn test_summary_and_kind_names() {
        let error = SableError::syntax_error("Expected ';'", Span::single(4, 2, 0), "lib/a.sbl");
        assert_eq!(error.summary(), "SyntaxError: Expected ';' at lib/a.sbl:4:2");
        assert_eq!(ErrorKind::from_name("TypeError"), Some(ErrorKind::TypeError));
        assert_eq!(ErrorKind::from_name("FatalError"), None);
    }

    #[test]
    fn test_format_contains_header_and_trace() {
        colored::control::set_override(false);
        let error = SableError::compile_error("Variable 'x' is already declared locally", Span::single(2, 7, 0), "main.sbl")
            .with_source("local x = 1;\nlocal x = 2;")
            .with_stack_trace(vec![Trace::call(Arc::from("main.sbl"), Span::single(2, 1, 0), "f::0")]);
        let text = error.format();
        assert!(text.starts_with("CompileError: Variable 'x' is already declared locally at main.sbl:2:7"));
        assert!(text.contains("   2 | local x = 2;"));
        assert!(text.contains("  at f::0 (main.sbl:2:1)"));
    }
}
