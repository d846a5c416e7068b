// Task and Future built-in classes
// Task(f).then(g).then(h).run() runs f, g, h in order on another thread
// and returns a Future for h's result.

use super::get_function_arg;
use crate::error::EvalResult;
use crate::interpreter::Interpreter;
use crate::runtime::{ClassCore, ClassDefinition, ClassRef, FutureValue, Task, Value};
use std::sync::Arc;
use std::time::Duration;

struct TaskClass {
    core: ClassCore,
}

impl ClassDefinition for TaskClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    fn to_string(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        Ok(match value {
            Value::Task(task) => format!("<Task of {} step(s)>", task.steps().len()),
            _ => "<Task>".to_string(),
        })
    }
}

struct FutureClass {
    core: ClassCore,
}

impl ClassDefinition for FutureClass {
    fn core(&self) -> &ClassCore {
        &self.core
    }

    fn to_string(&self, _interp: &mut Interpreter, value: &Value) -> EvalResult<String> {
        let state = match value {
            Value::Future(future) if future.is_complete() => "complete",
            _ => "pending",
        };
        Ok(format!("<Future {}>", state))
    }
}

pub fn create_task_class(object: ClassRef) -> ClassRef {
    let core = ClassCore::new("Task")
        .extends(object)
        .constructor(1, task_new)
        .method("then", 1, task_then)
        .method("run", 0, task_run);
    Arc::new(TaskClass { core })
}

pub fn create_future_class(object: ClassRef) -> ClassRef {
    let core = ClassCore::new("Future")
        .extends(object)
        .method("await", 0, future_await)
        .method("isComplete", 0, future_is_complete);
    Arc::new(FutureClass { core })
}

/// Task(f) - a task whose first step is f
fn task_new(args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let first = get_function_arg(interp, &args[0], "task step")?;
    Ok(Value::Task(Arc::new(Task::new(first))))
}

/// then(f) - append a step; returns the task for chaining
fn task_then(recv: &Value, args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let step = get_function_arg(interp, &args[0], "task step")?;
    if let Value::Task(task) = recv {
        task.then(step);
    }
    Ok(recv.clone())
}

fn task_run(recv: &Value, _args: &[Value], interp: &mut Interpreter) -> EvalResult {
    match recv {
        Value::Task(task) => Ok(Value::Future(interp.run_task(task)?)),
        _ => Ok(Value::Null),
    }
}

fn future(value: &Value) -> Option<&Arc<FutureValue>> {
    match value {
        Value::Future(future) => Some(future),
        _ => None,
    }
}

/// await() - block until the task finishes; its error is rethrown here
fn future_await(recv: &Value, _args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let Some(future) = future(recv) else {
        return Ok(Value::Null);
    };
    let poll = Duration::from_millis(interp.config().await_poll_ms);
    future.wait(interp.thread(), poll, interp.stop_suppressed())
}

fn future_is_complete(recv: &Value, _args: &[Value], _interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Boolean(future(recv).is_some_and(|f| f.is_complete())))
}
