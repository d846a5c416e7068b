// Module imports
// A module runs once, in a child interpreter with its own global scope.
// Only the classes it declares at top level are published; importing
// scopes get a promise that resolves class names against them lazily.

use super::Interpreter;
use crate::ast::ImportNames;
use crate::error::{runtime_error, ErrorKind, EvalResult, Unwind};
use crate::runtime::ImportState;

impl Interpreter {
    pub(crate) fn execute_import(&mut self, names: &ImportNames, path: &[String]) -> EvalResult<()> {
        let dotted = path.join(".");
        self.load_module(path, &dotted)?;

        match names {
            ImportNames::All => self.table.promise_all(&dotted),
            ImportNames::Names(names) => {
                for name in names {
                    if !self.shared.modules.has_class(&dotted, name) {
                        return Err(runtime_error(
                            ErrorKind::ImportError,
                            format!("Module '{}' has no class '{}'", dotted, name),
                        ));
                    }
                    self.table.promise_named(name, &dotted);
                }
            }
        }
        Ok(())
    }

    fn load_module(&mut self, path: &[String], dotted: &str) -> EvalResult<()> {
        let shared = self.shared.clone();
        let _guard = shared.import_lock.lock();

        match shared.modules.state_of(dotted) {
            ImportState::Loaded => return Ok(()),
            ImportState::Loading => {
                return Err(runtime_error(
                    ErrorKind::ImportError,
                    format!("Circular import of '{}'", dotted),
                ));
            }
            ImportState::Failed => {
                return Err(runtime_error(
                    ErrorKind::ImportError,
                    format!("Module '{}' failed to load earlier", dotted),
                ));
            }
            ImportState::Fresh => {}
        }

        shared.modules.begin(dotted);
        let Some(source) = shared.importer.resolve(path, shared.config.local_imports_only) else {
            shared.modules.finish(dotted, None);
            return Err(runtime_error(
                ErrorKind::ImportError,
                format!("Cannot find module '{}'", dotted),
            ));
        };

        let file = format!("{}.{}", path.join("/"), shared.config.library_extension);
        let mut child = self.child(&file);
        if let Err(error) = child.compile(&source, &file) {
            shared.modules.finish(dotted, None);
            return Err(runtime_error(
                ErrorKind::ImportError,
                format!("Failed to compile module '{}': {}", dotted, error.summary()),
            ));
        }

        match child.run_program() {
            Ok(_) => {
                let classes = child.globals.classes();
                tracing::debug!(module = dotted, classes = classes.len(), "module loaded");
                shared.modules.finish(dotted, Some(classes));
                Ok(())
            }
            Err(Unwind::Error(error)) => {
                shared.modules.finish(dotted, None);
                let summary = child.report(error).summary();
                Err(runtime_error(
                    ErrorKind::ImportError,
                    format!("Failed to load module '{}': {}", dotted, summary),
                ))
            }
            Err(other) => {
                shared.modules.finish(dotted, None);
                Err(other)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::interpreter::Interpreter;
    use crate::runtime::{BufferSink, MemoryImportResolver};
    use std::sync::Arc;

    fn interpreter(modules: &[(&str, &str)]) -> Interpreter {
        let importer = MemoryImportResolver::new();
        for (path, source) in modules {
            importer.insert(path, *source);
        }
        Interpreter::builder()
            .sink(Arc::new(BufferSink::new()))
            .importer(Arc::new(importer))
            .build()
    }

    #[test]
    fn test_named_import_resolves_class() {
        let mut interp = interpreter(&[("geo.shapes", "class Square { var side = 3; fun area() { return this.side * this.side; } }")]);
        let value = interp
            .run_source("import Square from geo.shapes; new Square().area();", "main.sbl")
            .unwrap();
        assert_eq!(value.as_number(), Some(9.0));
    }

    #[test]
    fn test_missing_module_is_import_error() {
        let mut interp = interpreter(&[]);
        let error = interp.run_source("import * from nowhere;", "main.sbl").unwrap_err();
        assert_eq!(error.kind, ErrorKind::ImportError);
        assert_eq!(error.message, "Cannot find module 'nowhere'");
    }

    #[test]
    fn test_circular_import_is_detected() {
        let mut interp = interpreter(&[("a", "import * from b; class A { }"), ("b", "import * from a; class B { }")]);
        let error = interp.run_source("import * from a;", "main.sbl").unwrap_err();
        assert_eq!(error.kind, ErrorKind::ImportError);
        assert!(error.message.contains("Circular import of 'a'"), "{}", error.message);
    }

    #[test]
    fn test_module_compile_error_is_reported_as_import_error() {
        let mut interp = interpreter(&[("bad", "local x = ;")]);
        let error = interp.run_source("import * from bad;", "main.sbl").unwrap_err();
        assert_eq!(error.kind, ErrorKind::ImportError);
        assert!(error.message.starts_with("Failed to compile module 'bad': SyntaxError"));
    }

    #[test]
    fn test_unknown_class_in_named_import() {
        let mut interp = interpreter(&[("lib", "class Present { }")]);
        let error = interp.run_source("import Absent from lib;", "main.sbl").unwrap_err();
        assert_eq!(error.message, "Module 'lib' has no class 'Absent'");
    }
}
