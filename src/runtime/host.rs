// Host collaborators: output sink, import source resolution, thread executor

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::io::{self, Write};
use std::path::PathBuf;

/// Where script output, debug lines and error reports go
pub trait OutputSink: Send + Sync {
    fn print(&self, text: &str);
    fn debug(&self, text: &str);
    fn error(&self, text: &str);
}

/// stdout for output, stderr for debug and errors
#[derive(Debug, Default)]
pub struct StdSink;

impl OutputSink for StdSink {
    fn print(&self, text: &str) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{}", text);
        let _ = out.flush();
    }

    fn debug(&self, text: &str) {
        eprintln!("[debug] {}", text);
    }

    fn error(&self, text: &str) {
        eprintln!("{}", text);
    }
}

/// Captures everything in memory
#[derive(Debug, Default)]
pub struct BufferSink {
    output: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Printed lines, in order
    pub fn lines(&self) -> Vec<String> {
        self.output.lock().clone()
    }

    /// Printed text, one line per `print`
    pub fn contents(&self) -> String {
        self.output.lock().iter().map(|line| format!("{}\n", line)).collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl OutputSink for BufferSink {
    fn print(&self, text: &str) {
        self.output.lock().push(text.to_string());
    }

    fn debug(&self, text: &str) {
        self.output.lock().push(format!("[debug] {}", text));
    }

    fn error(&self, text: &str) {
        self.errors.lock().push(text.to_string());
    }
}

/// Turns an import path into source text
pub trait ImportResolver: Send + Sync {
    fn resolve(&self, segments: &[String], local_only: bool) -> Option<String>;
}

/// `a.b.c` -> `<root>/a/b/c.<extension>`. Only the local file system is
/// consulted; `local_only` never widens the search.
#[derive(Debug, Clone)]
pub struct FileImportResolver {
    root: PathBuf,
    extension: String,
}

impl FileImportResolver {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn path_for(&self, segments: &[String]) -> PathBuf {
        let mut path = self.root.clone();
        for segment in segments {
            path.push(segment);
        }
        path.set_extension(&self.extension);
        path
    }
}

impl ImportResolver for FileImportResolver {
    fn resolve(&self, segments: &[String], _local_only: bool) -> Option<String> {
        let path = self.path_for(segments);
        match std::fs::read_to_string(&path) {
            Ok(source) => Some(source),
            Err(error) => {
                tracing::debug!(path = %path.display(), %error, "import source not found");
                None
            }
        }
    }
}

/// In-memory modules keyed by dotted path
#[derive(Debug, Default)]
pub struct MemoryImportResolver {
    modules: Mutex<FxHashMap<String, String>>,
}

impl MemoryImportResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, source: impl Into<String>) {
        self.modules.lock().insert(path.to_string(), source.into());
    }
}

impl ImportResolver for MemoryImportResolver {
    fn resolve(&self, segments: &[String], _local_only: bool) -> Option<String> {
        self.modules.lock().get(&segments.join(".")).cloned()
    }
}

/// Runs jobs concurrently with the caller
pub trait Executor: Send + Sync {
    fn spawn(&self, name: String, stack_size: usize, job: Box<dyn FnOnce() + Send>) -> io::Result<()>;
}

/// One named OS thread per job
#[derive(Debug, Default)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn spawn(&self, name: String, stack_size: usize, job: Box<dyn FnOnce() + Send>) -> io::Result<()> {
        std::thread::Builder::new()
            .name(name)
            .stack_size(stack_size)
            .spawn(job)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_resolver_maps_segments_to_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("shapes")).unwrap();
        std::fs::write(dir.path().join("shapes").join("circle.sbl"), "class Circle {}").unwrap();

        let resolver = FileImportResolver::new(dir.path(), "sbl");
        let segments = vec!["shapes".to_string(), "circle".to_string()];
        assert_eq!(resolver.resolve(&segments, true).as_deref(), Some("class Circle {}"));
        assert!(resolver.resolve(&["missing".to_string()], true).is_none());
    }

    #[test]
    fn test_buffer_sink_collects_lines() {
        let sink = BufferSink::new();
        sink.print("a");
        sink.print("b");
        sink.error("oops");
        assert_eq!(sink.contents(), "a\nb\n");
        assert_eq!(sink.errors(), vec!["oops".to_string()]);
    }
}
