// Shared helpers for the end-to-end suites

#![allow(dead_code)]

use sable_core::{BufferSink, Config, Interpreter, MemoryImportResolver, SableResult, Value};
use std::sync::Arc;

pub struct Harness {
    pub interp: Interpreter,
    pub sink: Arc<BufferSink>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let sink = Arc::new(BufferSink::new());
        let interp = Interpreter::builder().config(config).sink(sink.clone()).build();
        Self { interp, sink }
    }

    pub fn with_modules(modules: &[(&str, &str)]) -> Self {
        let importer = MemoryImportResolver::new();
        for (path, source) in modules {
            importer.insert(path, *source);
        }
        let sink = Arc::new(BufferSink::new());
        let interp = Interpreter::builder()
            .sink(sink.clone())
            .importer(Arc::new(importer))
            .build();
        Self { interp, sink }
    }

    pub fn run(&mut self, source: &str) -> SableResult<Value> {
        let result = self.interp.run_source(source, "main.sbl");
        self.interp.wait_for_threads();
        result
    }

    pub fn output(&self) -> Vec<String> {
        self.sink.lines()
    }
}

/// Run `source` and return everything it printed
pub fn output_of(source: &str) -> Vec<String> {
    let mut harness = Harness::new();
    if let Err(error) = harness.run(source) {
        panic!("script failed: {}", error.summary());
    }
    harness.output()
}

pub fn lines(expected: &[&str]) -> Vec<String> {
    expected.iter().map(|line| line.to_string()).collect()
}
