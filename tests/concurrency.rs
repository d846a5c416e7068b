// Threads, stop/freeze and tasks observed from script code

mod common;

use common::{lines, output_of, Harness};
use pretty_assertions::assert_eq;
use sable_core::ErrorKind;

#[test]
fn test_stop_unwinds_through_finally_but_skips_catch() {
    let output = output_of(
        "
        local started = false;
        local caught = 0;
        local cleaned = 0;
        local t = runThreaded(\"worker\", fun() {
            try {
                started = true;
                while (true) { sleep(1); }
            } catch (e) {
                caught += 1;
            } finally {
                cleaned += 1;
            }
        });
        while (!started) { sleep(1); }
        t.stop();
        t.join();
        print(caught, cleaned, t.isAlive());
        ",
    );
    assert_eq!(output, lines(&["0 1 false"]));
}

#[test]
fn test_threads_share_globals() {
    let output = output_of(
        "
        local total = 0;
        local a = runThreaded(fun() { total += 1; });
        a.join();
        local b = runThreaded(fun() { total += 10; });
        b.join();
        print(total);
        ",
    );
    assert_eq!(output, lines(&["11"]));
}

#[test]
fn test_is_main_differs_on_spawned_threads() {
    let output = output_of(
        "
        local inside = null;
        local t = runThreaded(\"probe\", fun() { inside = isMain(); });
        t.join();
        print(isMain(), inside, t.getName());
        ",
    );
    assert_eq!(output, lines(&["true false probe"]));
}

#[test]
fn test_frozen_thread_resumes_after_thaw() {
    let output = output_of(
        "
        local ticks = 0;
        local go = false;
        fun bump() { ticks += 1; }
        local t = runThreaded(fun() {
            while (!go) { sleep(1); }
            bump();
        });
        t.freeze();
        go = true;
        sleep(20);
        local whileFrozen = ticks;
        t.thaw();
        t.join();
        print(whileFrozen, ticks);
        ",
    );
    assert_eq!(output, lines(&["0 1"]));
}

#[test]
fn test_task_chain_passes_results_forward() {
    let output = output_of(
        "
        local future = Task(fun() { return 4; })
            .then(fun(n) { return n * 10; })
            .then(fun(n) { return n + 2; })
            .run();
        print(future.await(), future.isComplete());
        ",
    );
    assert_eq!(output, lines(&["42 true"]));
}

#[test]
fn test_task_error_is_catchable_at_await() {
    let output = output_of(
        "
        local future = Task(fun() { throw Error(\"broken\"); }).run();
        try { future.await(); } catch (e: Error) { print(e.getMessage()); }
        ",
    );
    assert_eq!(output, lines(&["broken"]));
}

#[test]
fn test_uncaught_thread_error_is_reported_without_failing_main() {
    let mut harness = Harness::new();
    let value = harness
        .run("local t = runThreaded(fun() { local x = undefinedName; }); t.join(); 7;")
        .unwrap();
    assert_eq!(value.as_number(), Some(7.0));
    let errors = harness.sink.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("undefinedName"), "{}", errors[0]);
}

#[test]
fn test_joining_yourself_is_an_error() {
    let mut harness = Harness::new();
    let value = harness
        .run(
            "
            local result = \"\";
            local worker = null;
            worker = runThreaded(fun() {
                while (worker == null) { sleep(1); }
                try { worker.join(); } catch (e: RuntimeError) { result = e.getMessage(); }
            });
            worker.join();
            result;
            ",
        )
        .unwrap();
    assert_eq!(value.as_str(), Some("A thread cannot join itself"));
}

#[test]
fn test_stop_from_a_thread_ends_the_whole_script() {
    let mut harness = Harness::new();
    let value = harness
        .run(
            "
            local t = runThreaded(fun() { stop(); });
            t.join();
            while (true) { sleep(1); }
            ",
        )
        .unwrap();
    assert!(value.is_null());
    assert_eq!(harness.interp.threads().running(), 0);
}

#[test]
fn test_division_error_inside_task_keeps_its_kind() {
    let mut harness = Harness::new();
    let error = harness
        .run("Task(fun() { return 1 / 0; }).run().await();")
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::DivisionByZero);
}

#[test]
fn test_finally_during_stop_can_still_join() {
    let output = output_of(
        "
        local started = false;
        local done = false;
        local cleaned = false;
        local t = runThreaded(fun() {
            try {
                started = true;
                while (true) { sleep(1); }
            } finally {
                local helper = runThreaded(fun() { sleep(20); done = true; });
                helper.join();
                cleaned = done;
            }
        });
        while (!started) { sleep(1); }
        t.stop();
        t.join();
        print(cleaned);
        ",
    );
    assert_eq!(output, lines(&["true"]));
}
