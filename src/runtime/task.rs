// Tasks (chained function pipelines) and the futures they complete

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

use super::function::Function;
use super::thread::ScriptThread;
use super::value::Value;
use crate::error::{EvalResult, RuntimeError, Unwind};

/// Steps run strictly in the order they were chained
#[derive(Default)]
pub struct Task {
    steps: Mutex<Vec<Arc<Function>>>,
}

impl Task {
    pub fn new(first: Arc<Function>) -> Self {
        Self {
            steps: Mutex::new(vec![first]),
        }
    }

    pub fn then(&self, step: Arc<Function>) {
        self.steps.lock().push(step);
    }

    pub fn steps(&self) -> Vec<Arc<Function>> {
        self.steps.lock().clone()
    }
}

/// Result slot filled once by whoever runs the work
#[derive(Default)]
pub struct FutureValue {
    result: Mutex<Option<Result<Value, RuntimeError>>>,
    ready: Condvar,
}

impl FutureValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete(&self, result: Result<Value, RuntimeError>) {
        let mut slot = self.result.lock();
        if slot.is_none() {
            *slot = Some(result);
        }
        self.ready.notify_all();
    }

    pub fn is_complete(&self) -> bool {
        self.result.lock().is_some()
    }

    /// Block until completed; the waiter's liveness is checked between polls.
    /// `suppress_stop` is set while the waiter runs `finally` during a stop.
    pub fn wait(&self, waiter: &ScriptThread, poll: Duration, suppress_stop: bool) -> EvalResult {
        loop {
            {
                let mut slot = self.result.lock();
                if slot.is_none() {
                    self.ready.wait_for(&mut slot, poll);
                }
                if let Some(result) = slot.as_ref() {
                    return result.clone().map_err(Unwind::Error);
                }
            }
            waiter.check(suppress_stop)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::thread;

    #[test]
    fn test_wait_returns_completed_value() {
        let future = Arc::new(FutureValue::new());
        let waiter = ScriptThread::new(0, "main");
        let producer = future.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.complete(Ok(Value::Number(42.0)));
        });
        let value = future.wait(&waiter, Duration::from_millis(5), false).unwrap();
        assert_eq!(value.as_number(), Some(42.0));
        handle.join().unwrap();
    }

    #[test]
    fn test_first_completion_wins() {
        let future = FutureValue::new();
        future.complete(Err(RuntimeError::new(ErrorKind::RuntimeError, "boom")));
        future.complete(Ok(Value::Null));
        let waiter = ScriptThread::new(0, "main");
        let result = future.wait(&waiter, Duration::from_millis(1), false);
        assert!(matches!(result, Err(Unwind::Error(e)) if e.message == "boom"));
    }

    #[test]
    fn test_waiting_thread_can_be_stopped() {
        let future = FutureValue::new();
        let waiter = ScriptThread::new(0, "main");
        waiter.request_stop();
        assert!(matches!(
            future.wait(&waiter, Duration::from_millis(1), false),
            Err(Unwind::Stop)
        ));
    }

    #[test]
    fn test_suppressed_waiter_outlasts_its_stop() {
        let future = Arc::new(FutureValue::new());
        let waiter = ScriptThread::new(0, "main");
        waiter.request_stop();
        let producer = future.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.complete(Ok(Value::Number(7.0)));
        });
        let value = future.wait(&waiter, Duration::from_millis(1), true).unwrap();
        assert_eq!(value.as_number(), Some(7.0));
        handle.join().unwrap();
    }
}
