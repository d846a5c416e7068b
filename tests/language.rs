// End-to-end language behavior through a root interpreter

mod common;

use common::{lines, output_of, Harness};
use pretty_assertions::assert_eq;
use sable_core::ErrorKind;

#[test]
fn test_closure_mutates_enclosing_binding() {
    let output = output_of("local x = 10; fun f() { x = x + 1; return x; } print(f()); print(f());");
    assert_eq!(output, lines(&["11", "12"]));
}

#[test]
fn test_super_call_reaches_parent_method() {
    let output = output_of(
        "class A { fun f() { return 1; } } class B: A { fun f() { return super.f() + 1; } } print(new B().f());",
    );
    assert_eq!(output, lines(&["2"]));
}

#[test]
fn test_redeclaration_fails_before_anything_runs() {
    let mut harness = Harness::new();
    let error = harness.run("print(\"ran\"); local x = 1; local x = 2;").unwrap_err();
    assert!(error.is_compile_error());
    assert_eq!(error.message, "Variable 'x' is already declared locally");
    assert!(harness.output().is_empty());
}

#[test]
fn test_variable_and_function_share_a_namespace() {
    let mut harness = Harness::new();
    let error = harness.run("local f = 1; fun f() {}").unwrap_err();
    assert!(error.is_compile_error());
    assert_eq!(error.message, "'f' is already declared as a variable");
}

#[test]
fn test_exact_arity_wins_over_variadic() {
    let output = output_of(
        "fun g(a, b) { return \"pair\"; } fun g(rest...) { return \"many \" + len(rest); } print(g(1, 2)); print(g(1, 2, 3));",
    );
    assert_eq!(output, lines(&["pair", "many 3"]));
}

#[test]
fn test_logical_operators_short_circuit() {
    let output = output_of(
        "
        local calls = 0;
        fun sideEffect() { calls += 1; return true; }
        local a = false && sideEffect();
        local b = true || sideEffect();
        print(a, b, calls);
        ",
    );
    assert_eq!(output, lines(&["false true 0"]));
}

#[test]
fn test_two_concrete_superclasses_fail_at_declaration() {
    let mut harness = Harness::new();
    let error = harness
        .run("class A { } class B { } print(\"declared\"); class C: A, B { }")
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::TypeError);
    assert_eq!(error.message, "Class 'C' can only extend one non-interface super class");
    assert_eq!(harness.output(), lines(&["declared"]));
}

#[test]
fn test_class_may_add_interfaces_to_one_superclass() {
    let output = output_of(
        "
        interface Greeter { fun greet(); }
        class Base { fun name() { return \"base\"; } }
        class Impl: Base, Greeter { fun greet() { return \"hi \" + this.name(); } }
        print(new Impl().greet());
        ",
    );
    assert_eq!(output, lines(&["hi base"]));
}

#[test]
fn test_finally_runs_once_after_a_caught_throw() {
    let output = output_of(
        "
        local runs = 0;
        fun sideEffect() { runs += 1; }
        try { throw Error(\"x\"); } catch (e) { print(e.getMessage()); } finally { sideEffect(); }
        print(runs);
        ",
    );
    assert_eq!(output, lines(&["x", "1"]));
}

#[test]
fn test_finally_runs_when_a_return_leaves_the_try() {
    let output = output_of(
        "
        fun f() { try { return 1; } finally { print(\"cleanup\"); } }
        print(f());
        ",
    );
    assert_eq!(output, lines(&["cleanup", "1"]));
}

#[test]
fn test_uncaught_error_reports_kind_and_trace() {
    let mut harness = Harness::new();
    let error = harness
        .run("fun divide(a, b) { return a / b; }\nfun outer() { return divide(1, 0); }\nouter();")
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::DivisionByZero);
    assert_eq!(error.message, "Division by zero");
    let frames: Vec<String> = error
        .stack_trace
        .iter()
        .filter_map(|frame| frame.description.clone())
        .collect();
    assert_eq!(frames, lines(&["divide::2", "outer::0"]));
}

#[test]
fn test_super_constructor_arity_is_checked_at_compile_time() {
    let mut harness = Harness::new();
    let error = harness
        .run("class A { A(x) { } } class B: A { B(): super(); } new B();")
        .unwrap_err();
    assert!(error.is_compile_error());
    assert_eq!(error.message, "Superclass 'A' has no constructor accepting 0 argument(s)");
}

#[test]
fn test_constructor_chain_and_fields() {
    let output = output_of(
        "
        class Point {
            var x = 0;
            var y = 0;
            Point(x, y) { this.x = x; this.y = y; }
            Point(): this(1, 2);
            fun sum() { return this.x + this.y; }
        }
        class Point3: Point {
            var z = 0;
            Point3(z): super(10, 20) { this.z = z; }
            fun sum() { return super.sum() + this.z; }
        }
        print(new Point().sum());
        print(new Point3(3).sum());
        ",
    );
    assert_eq!(output, lines(&["3", "33"]));
}

#[test]
fn test_operator_overload_and_to_string() {
    let output = output_of(
        "
        class Vec {
            var x = 0;
            Vec(x) { this.x = x; }
            operator + (other) { return new Vec(this.x + other.x); }
            fun toString() { return \"Vec(\" + this.x + \")\"; }
        }
        print(new Vec(2) + new Vec(5));
        ",
    );
    assert_eq!(output, lines(&["Vec(7)"]));
}

#[test]
fn test_loops_with_break_and_continue() {
    let output = output_of(
        "
        local seen = [];
        for (local i = 0; i < 10; i += 1) {
            if (i == 2) { continue; }
            if (i == 5) { break; }
            seen.append(i);
        }
        local n = 0;
        do { n += 1; } while (n < 3);
        print(seen, n);
        ",
    );
    assert_eq!(output, lines(&["[0, 1, 3, 4] 3"]));
}

#[test]
fn test_non_boolean_condition_is_a_type_error() {
    let mut harness = Harness::new();
    let error = harness.run("if (1) { print(\"no\"); }").unwrap_err();
    assert_eq!(error.kind, ErrorKind::TypeError);
    assert!(harness.output().is_empty());
}

#[test]
fn test_thrown_user_error_subclass_is_caught_by_type() {
    let output = output_of(
        "
        class NotFound: Error { NotFound(what): super(what + \" missing\"); }
        try {
            throw new NotFound(\"key\");
        } catch (e: TypeError | NotFound) {
            print(typeOf(e), e.getMessage());
        }
        ",
    );
    assert_eq!(output, lines(&["NotFound key missing"]));
}

#[test]
fn test_eval_sees_no_caller_locals_but_can_print() {
    let output = output_of("local secret = 1; eval(\"print(\\\"inside\\\");\"); print(secret);");
    assert_eq!(output, lines(&["inside", "1"]));
}
