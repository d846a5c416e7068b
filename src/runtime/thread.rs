// Script threads: stop and freeze signalling, plus the registry the root
// interpreter uses to stop or wait for every running thread

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{EvalResult, Unwind};

#[derive(Debug, Default)]
struct ThreadState {
    frozen: bool,
    finished: bool,
}

/// Control block of one logical thread of script execution
#[derive(Debug)]
pub struct ScriptThread {
    id: u64,
    name: String,
    stop: AtomicBool,
    state: Mutex<ThreadState>,
    signal: Condvar,
}

impl ScriptThread {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            stop: AtomicBool::new(false),
            state: Mutex::new(ThreadState::default()),
            signal: Condvar::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Liveness check: converts a pending stop into `Unwind::Stop` and parks
    /// while frozen. `suppress_stop` is set while `finally` blocks run
    /// during a stop.
    pub fn check(&self, suppress_stop: bool) -> EvalResult<()> {
        if self.stop_requested() && !suppress_stop {
            return Err(Unwind::Stop);
        }
        let mut state = self.state.lock();
        while state.frozen && !self.stop_requested() {
            self.signal.wait(&mut state);
        }
        drop(state);
        if self.stop_requested() && !suppress_stop {
            return Err(Unwind::Stop);
        }
        Ok(())
    }

    /// Sleep that a stop request interrupts
    pub fn sleep(&self, duration: Duration, suppress_stop: bool) -> EvalResult<()> {
        let deadline = Instant::now() + duration;
        let mut state = self.state.lock();
        loop {
            if self.stop_requested() && !suppress_stop {
                return Err(Unwind::Stop);
            }
            if Instant::now() >= deadline {
                return Ok(());
            }
            self.signal.wait_until(&mut state, deadline);
        }
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        let _state = self.state.lock();
        self.signal.notify_all();
    }

    pub fn freeze(&self) {
        self.state.lock().frozen = true;
    }

    pub fn thaw(&self) {
        let mut state = self.state.lock();
        state.frozen = false;
        self.signal.notify_all();
    }

    pub fn is_frozen(&self) -> bool {
        self.state.lock().frozen
    }

    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.finished = true;
        self.signal.notify_all();
    }

    pub fn is_alive(&self) -> bool {
        !self.state.lock().finished
    }

    /// Block until this thread finishes, polling the waiter's own liveness
    pub fn join(&self, waiter: &ScriptThread, poll: Duration, suppress_stop: bool) -> EvalResult<()> {
        loop {
            {
                let mut state = self.state.lock();
                if state.finished {
                    return Ok(());
                }
                self.signal.wait_for(&mut state, poll);
                if state.finished {
                    return Ok(());
                }
            }
            waiter.check(suppress_stop)?;
        }
    }
}

/// Registry of spawned threads, owned by the root interpreter
#[derive(Debug)]
pub struct ThreadHandler {
    main: Arc<ScriptThread>,
    threads: Mutex<Vec<Arc<ScriptThread>>>,
    idle: Condvar,
    next_id: AtomicU64,
}

impl ThreadHandler {
    pub fn new(main_name: &str) -> Self {
        Self {
            main: Arc::new(ScriptThread::new(0, main_name)),
            threads: Mutex::new(Vec::new()),
            idle: Condvar::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn main(&self) -> &Arc<ScriptThread> {
        &self.main
    }

    pub fn register(&self, name: Option<String>) -> Arc<ScriptThread> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = name.unwrap_or_else(|| format!("Thread-{}", id));
        let thread = Arc::new(ScriptThread::new(id, name));
        self.threads.lock().push(thread.clone());
        tracing::debug!(thread = %thread.name(), id, "registered script thread");
        thread
    }

    pub fn unregister(&self, thread: &ScriptThread) {
        thread.finish();
        let mut threads = self.threads.lock();
        threads.retain(|t| t.id() != thread.id());
        tracing::debug!(thread = %thread.name(), remaining = threads.len(), "script thread finished");
        if threads.is_empty() {
            self.idle.notify_all();
        }
    }

    pub fn running(&self) -> usize {
        self.threads.lock().len()
    }

    /// Stop the main thread and every registered thread
    pub fn stop_all(&self) {
        self.main.request_stop();
        let threads = self.threads.lock().clone();
        for thread in threads {
            thread.request_stop();
        }
    }

    pub fn wait_for_threads(&self) {
        let mut threads = self.threads.lock();
        while !threads.is_empty() {
            self.idle.wait(&mut threads);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_stop_interrupts_sleep() {
        let script = Arc::new(ScriptThread::new(1, "worker"));
        let sleeper = script.clone();
        let handle = thread::spawn(move || sleeper.sleep(Duration::from_secs(30), false));
        thread::sleep(Duration::from_millis(20));
        script.request_stop();
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(Unwind::Stop)));
    }

    #[test]
    fn test_suppressed_check_ignores_stop() {
        let script = ScriptThread::new(1, "worker");
        script.request_stop();
        assert!(script.check(true).is_ok());
        assert!(matches!(script.check(false), Err(Unwind::Stop)));
    }

    #[test]
    fn test_frozen_thread_parks_until_thawed() {
        let script = Arc::new(ScriptThread::new(1, "worker"));
        script.freeze();
        let checker = script.clone();
        let handle = thread::spawn(move || checker.check(false));
        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());
        script.thaw();
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_wait_for_threads_returns_when_all_finish() {
        let handler = Arc::new(ThreadHandler::new("Main Thread"));
        let worker = handler.register(None);
        let registry = handler.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            registry.unregister(&worker);
        });
        handler.wait_for_threads();
        assert_eq!(handler.running(), 0);
        handle.join().unwrap();
    }
}
