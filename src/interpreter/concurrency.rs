// Script threads and tasks
// Each one runs on a branch of the interpreter that started it, so it
// shares registries and scopes but owns its scope cursor and call stack.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::call::panic_message;
use super::Interpreter;
use crate::error::{runtime_error, ErrorKind, EvalResult, RuntimeError, Unwind};
use crate::runtime::{Function, FutureValue, ScriptThread, Task, Value};

impl Interpreter {
    /// Run `function(args)` on a new thread. Errors that escape it are
    /// reported through the sink; they never reach the spawner.
    pub fn spawn_thread(
        &self,
        name: Option<String>,
        function: Arc<Function>,
        args: Vec<Value>,
    ) -> EvalResult<Arc<ScriptThread>> {
        let handle = self.shared.threads.register(name);
        let mut branch = self.branch();
        branch.thread = handle.clone();

        let shared = self.shared.clone();
        let worker = handle.clone();
        let job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                if let Err(unwind) = branch.invoke(&function, None, args) {
                    if let Some(error) = branch.escaped_error(unwind) {
                        shared.sink.error(&error.format());
                    }
                }
            }));
            if let Err(payload) = outcome {
                tracing::error!(thread = %worker.name(), message = %panic_message(payload.as_ref()), "script thread panicked");
            }
            shared.threads.unregister(&worker);
        });

        let stack_size = self.config().thread_stack_size;
        if let Err(error) = self.shared.executor.spawn(handle.name().to_string(), stack_size, job) {
            tracing::error!(thread = %handle.name(), %error, "failed to start script thread");
            self.shared.threads.unregister(&handle);
            return Err(runtime_error(
                ErrorKind::RuntimeError,
                format!("Could not start thread '{}': {}", handle.name(), error),
            ));
        }
        Ok(handle)
    }

    /// Run the task's steps in order on a new thread; the future receives
    /// the last step's result or the first error
    pub fn run_task(&self, task: &Arc<Task>) -> EvalResult<Arc<FutureValue>> {
        let future = Arc::new(FutureValue::new());
        let handle = self.shared.threads.register(None);
        let mut branch = self.branch();
        branch.thread = handle.clone();

        let steps = task.steps();
        let shared = self.shared.clone();
        let worker = handle.clone();
        let slot = future.clone();
        let job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| branch.run_steps(&steps)));
            let result = match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(Unwind::Error(error))) => Err(error),
                Ok(Err(Unwind::Stop)) => Err(RuntimeError::new(ErrorKind::RuntimeError, "Task was stopped")),
                Ok(Err(Unwind::Fatal(fatal))) => {
                    tracing::error!(message = %fatal.message, "fatal error in task");
                    Err(RuntimeError::new(ErrorKind::RuntimeError, fatal.message))
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(task = %worker.name(), %message, "task panicked");
                    Err(RuntimeError::new(ErrorKind::RuntimeError, format!("Task panicked: {}", message)))
                }
            };
            slot.complete(result);
            shared.threads.unregister(&worker);
        });

        let stack_size = self.config().thread_stack_size;
        if let Err(error) = self.shared.executor.spawn(handle.name().to_string(), stack_size, job) {
            tracing::error!(task = %handle.name(), %error, "failed to start task");
            self.shared.threads.unregister(&handle);
            return Err(runtime_error(
                ErrorKind::RuntimeError,
                format!("Could not start task: {}", error),
            ));
        }
        Ok(future)
    }

    /// Each step gets the previous result, unless it takes no arguments
    fn run_steps(&mut self, steps: &[Arc<Function>]) -> EvalResult {
        let mut value = Value::Null;
        for step in steps {
            let args = if step.arity == 0 { Vec::new() } else { vec![value] };
            value = self.invoke(step, None, args)?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::Interpreter;
    use crate::runtime::{BufferSink, OutputSink};
    use std::sync::Arc;

    /// Fails on every write, even when reporting a failure
    struct BrokenSink;

    impl OutputSink for BrokenSink {
        fn print(&self, _text: &str) {
            panic!("output closed");
        }

        fn debug(&self, _text: &str) {}

        fn error(&self, _text: &str) {
            panic!("error output closed");
        }
    }

    #[test]
    fn test_thread_error_goes_to_sink() {
        let sink = Arc::new(BufferSink::new());
        let mut interp = Interpreter::builder().sink(sink.clone()).build();
        interp
            .run_source("runThreaded(fun() { throw \"worker failed\"; });", "test.sbl")
            .unwrap();
        interp.wait_for_threads();
        let errors = sink.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("worker failed"), "{}", errors[0]);
    }

    #[test]
    fn test_task_steps_chain_results() {
        let mut interp = Interpreter::builder().sink(Arc::new(BufferSink::new())).build();
        let value = interp
            .run_source(
                "local t = Task(fun() { return 2; }); t.then(fun(x) { return x * 10; }).then(fun(x) { return x + 1; }); t.run().await();",
                "test.sbl",
            )
            .unwrap();
        assert_eq!(value.as_number(), Some(21.0));
    }

    #[test]
    fn test_task_error_surfaces_on_await() {
        let mut interp = Interpreter::builder().sink(Arc::new(BufferSink::new())).build();
        let value = interp
            .run_source(
                "local f = Task(fun() { throw \"bad step\"; }).run(); local m = null; try { f.await(); } catch (e) { m = e; } m;",
                "test.sbl",
            )
            .unwrap();
        assert_eq!(value.as_str(), Some("bad step"));
    }

    #[test]
    fn test_panicking_thread_still_unregisters() {
        let mut interp = Interpreter::builder().sink(Arc::new(BrokenSink)).build();
        interp
            .run_source("runThreaded(\"noisy\", fun() { print(\"hello\"); });", "test.sbl")
            .unwrap();
        interp.wait_for_threads();
        assert_eq!(interp.threads().running(), 0);
    }
}
