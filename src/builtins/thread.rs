// Thread built-in class
// Handles returned by `runThreaded`. Stopping or freezing takes effect at
// the target's next liveness check.

use crate::error::EvalResult;
use crate::interpreter::Interpreter;
use crate::runtime::{ClassCore, ClassDefinition, ClassRef, ScriptThread, Value};
use std::sync::Arc;
use std::time::Duration;

struct ThreadClass {
    core: ClassCore,
}

impl ClassDefinition for ThreadClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    fn to_string(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        Ok(match handle(value) {
            Some(thread) => format!("<Thread {}>", thread.name()),
            None => "<Thread>".to_string(),
        })
    }
}

pub fn create_thread_class(object: ClassRef) -> ClassRef {
    let core = ClassCore::new("Thread")
        .extends(object)
        .method("getName", 0, thread_get_name)
        .method("stop", 0, thread_stop)
        .method("freeze", 0, thread_freeze)
        .method("thaw", 0, thread_thaw)
        .method("isAlive", 0, thread_is_alive)
        .method("isFrozen", 0, thread_is_frozen)
        .method("join", 0, thread_join);
    Arc::new(ThreadClass { core })
}

fn handle(value: &Value) -> Option<&Arc<ScriptThread>> {
    match value {
        Value::Thread(thread) => Some(thread),
        _ => None,
    }
}

fn thread_get_name(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(handle(recv).map(|t| Value::string(t.name())).unwrap_or(Value::Null))
}

fn thread_stop(recv: &Value, _args: &[Value], interp: &mut Interpreter) -> EvalResult {
    if let Some(thread) = handle(recv) {
        tracing::debug!(thread = %thread.name(), "stop requested");
        thread.request_stop();
        // Stopping yourself unwinds right away
        if Arc::ptr_eq(thread, interp.thread()) {
            interp.check_alive()?;
        }
    }
    Ok(Value::Null)
}

fn thread_freeze(recv: &Value, _args: &[Value], interp: &mut Interpreter) -> EvalResult {
    if let Some(thread) = handle(recv) {
        thread.freeze();
        if Arc::ptr_eq(thread, interp.thread()) {
            interp.check_alive()?;
        }
    }
    Ok(Value::Null)
}

fn thread_thaw(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    if let Some(thread) = handle(recv) {
        thread.thaw();
    }
    Ok(Value::Null)
}

fn thread_is_alive(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Boolean(handle(recv).is_some_and(|t| t.is_alive())))
}

fn thread_is_frozen(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Boolean(handle(recv).is_some_and(|t| t.is_frozen())))
}

/// join() - wait for the thread to finish; the waiter stays stoppable
fn thread_join(recv: &Value, _args: &[Value], interp: &mut Interpreter) -> EvalResult {
    if let Some(thread) = handle(recv) {
        if Arc::ptr_eq(thread, interp.thread()) {
            return Err(crate::error::runtime_error(
                crate::error::ErrorKind::RuntimeError,
                "A thread cannot join itself",
            ));
        }
        let poll = Duration::from_millis(interp.config().await_poll_ms);
        thread.join(interp.thread(), poll, interp.stop_suppressed())?;
    }
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use crate::interpreter::Interpreter;
    use crate::runtime::{BufferSink, Value};
    use std::sync::Arc;

    #[test]
    fn test_stopped_thread_finishes() {
        let mut interp = Interpreter::builder().sink(Arc::new(BufferSink::new())).build();
        let value = interp
            .run_source(
                "local t = runThreaded(\"spinner\", fun() { while (true) { sleep(1); } }); t.stop(); t.join(); t.isAlive();",
                "test.sbl",
            )
            .unwrap();
        assert!(matches!(value, Value::Boolean(false)));
        interp.wait_for_threads();
    }

    #[test]
    fn test_join_waits_for_result() {
        let mut interp = Interpreter::builder().sink(Arc::new(BufferSink::new())).build();
        let value = interp
            .run_source(
                "local total = 0; local t = runThreaded(fun() { for (local i = 1; i <= 4; i += 1) { total += i; } }); t.join(); total + t.getName().length() * 0;",
                "test.sbl",
            )
            .unwrap();
        assert_eq!(value.as_number(), Some(10.0));
    }
}
