// lox-vm - End-to-end interpreter tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

mod common;
use common::run;

use lox_vm::Vm;

// =========================================================================
// Expressions
// =========================================================================

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(run("print 1 + 2 * 3;"), "7\n");
    assert_eq!(run("print 2 + 3 * 4 - 6 / 3;"), "12\n");
    assert_eq!(run("print (1 + 2) * 3;"), "9\n");
    assert_eq!(run("print -2 * 3;"), "-6\n");
    assert_eq!(run("print 5 / 2;"), "2.5\n");
}

#[test]
fn test_unary_and_grouping() {
    assert_eq!(run("print -(3 + 4);"), "-7\n");
    assert_eq!(run("print !true;"), "false\n");
    assert_eq!(run("print !!nil;"), "false\n");
    assert_eq!(run("print !0;"), "false\n");
}

#[test]
fn test_comparison_and_equality() {
    assert_eq!(run("print 1 < 2;"), "true\n");
    assert_eq!(run("print 2 <= 2;"), "true\n");
    assert_eq!(run("print 3 > 4;"), "false\n");
    assert_eq!(run("print 4 >= 5;"), "false\n");
    assert_eq!(run("print 1 == 1;"), "true\n");
    assert_eq!(run("print 1 != 2;"), "true\n");
    assert_eq!(run("print nil == false;"), "false\n");
    assert_eq!(run("print \"a\" == 1;"), "false\n");
}

#[test]
fn test_mixed_precedence_chain() {
    assert_eq!(run("print !(5 - 4 > 3 * 2 == !nil);"), "true\n");
}

#[test]
fn test_string_concatenation() {
    assert_eq!(run("var a = \"foo\"; var b = \"bar\"; print a + b;"), "foobar\n");
    assert_eq!(run("print \"\" + \"\";"), "\n");
}

#[test]
fn test_concatenation_result_is_interned() {
    // Runtime concatenation and the compile-time literal end up as the same
    // handle, so equality holds.
    assert_eq!(run("print \"a\" + \"b\" == \"ab\";"), "true\n");
}

#[test]
fn test_multiline_string() {
    assert_eq!(run("print \"line1\nline2\";"), "line1\nline2\n");
}

#[test]
fn test_logical_operators_return_operands() {
    assert_eq!(run("print nil or \"yes\";"), "yes\n");
    assert_eq!(run("print 1 or 2;"), "1\n");
    assert_eq!(run("print false and 1;"), "false\n");
    assert_eq!(run("print 1 and 2;"), "2\n");
    assert_eq!(run("print nil and 2;"), "nil\n");
}

#[test]
fn test_logical_operators_short_circuit() {
    // The right-hand call must not run when the left side decides.
    assert_eq!(
        run("fun shout() { print \"ran\"; return true; } \
             print false and shout(); print true or shout();"),
        "false\ntrue\n"
    );
}

#[test]
fn test_number_rendering() {
    assert_eq!(run("print 7;"), "7\n");
    assert_eq!(run("print 1.5;"), "1.5\n");
    assert_eq!(run("print 0.1 + 0.2;"), "0.3\n");
    assert_eq!(run("print 10 / 3;"), "3.33333\n");
    assert_eq!(run("print 100000 * 10;"), "1e+06\n");
}

// =========================================================================
// Variables and scope
// =========================================================================

#[test]
fn test_global_declaration_and_default() {
    assert_eq!(run("var x; print x;"), "nil\n");
    assert_eq!(run("var x = 1 + 2; print x;"), "3\n");
}

#[test]
fn test_global_redefinition_overwrites() {
    assert_eq!(run("var a = 1; var a = 2; print a;"), "2\n");
}

#[test]
fn test_assignment_is_an_expression() {
    assert_eq!(run("var a = 1; print a = 2;"), "2\n");
    assert_eq!(run("var a = 1; var b = 2; a = b = 3; print a; print b;"), "3\n3\n");
}

#[test]
fn test_block_scoping_and_shadowing() {
    assert_eq!(run("var x = 1; { var x = 2; print x; } print x;"), "2\n1\n");
    assert_eq!(
        run("var x = \"outer\"; { var y = \"inner\"; print x; print y; }"),
        "outer\ninner\n"
    );
}

#[test]
fn test_locals_resolve_by_slot() {
    assert_eq!(
        run("{ var a = 1; var b = 2; var c = a + b; print c; b = 10; print a + b; }"),
        "3\n11\n"
    );
}

// =========================================================================
// Control flow
// =========================================================================

#[test]
fn test_if_else() {
    assert_eq!(run("if (true) print \"then\"; else print \"else\";"), "then\n");
    assert_eq!(run("if (false) print \"then\"; else print \"else\";"), "else\n");
    assert_eq!(run("if (nil) print \"then\"; else print \"else\";"), "else\n");
}

#[test]
fn test_if_without_else() {
    assert_eq!(run("if (false) print \"skipped\"; print \"after\";"), "after\n");
    assert_eq!(run("if (1) print \"taken\"; print \"after\";"), "taken\nafter\n");
}

#[test]
fn test_while_loop() {
    assert_eq!(
        run("var i = 0; while (i < 3) { print i; i = i + 1; }"),
        "0\n1\n2\n"
    );
    assert_eq!(run("while (false) print \"never\"; print \"done\";"), "done\n");
}

#[test]
fn test_for_loop() {
    assert_eq!(run("for (var i = 0; i < 3; i = i + 1) print i;"), "0\n1\n2\n");
}

#[test]
fn test_for_loop_clauses_are_optional() {
    assert_eq!(
        run("var i = 0; for (; i < 2;) { print i; i = i + 1; }"),
        "0\n1\n"
    );
    assert_eq!(
        run("for (var i = 3; i > 0; i = i - 1) { if (i == 1) print \"liftoff\"; }"),
        "liftoff\n"
    );
}

// =========================================================================
// Functions
// =========================================================================

#[test]
fn test_function_call_and_return() {
    assert_eq!(run("fun add(a, b) { return a + b; } print add(1, 2);"), "3\n");
    assert_eq!(run("fun nothing() {} print nothing();"), "nil\n");
    assert_eq!(run("fun bare() { return; } print bare();"), "nil\n");
}

#[test]
fn test_function_values_print() {
    assert_eq!(run("fun f() {} print f;"), "<fn f>\n");
    assert_eq!(run("print clock;"), "<native fn>\n");
}

#[test]
fn test_recursion() {
    assert_eq!(
        run("fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);"),
        "55\n"
    );
}

#[test]
fn test_mutual_recursion_through_globals() {
    assert_eq!(
        run("fun isOdd(n) { if (n == 0) return false; return isEven(n - 1); } \
             fun isEven(n) { if (n == 0) return true; return isOdd(n - 1); } \
             print isEven(4);"),
        "true\n"
    );
}

#[test]
fn test_arguments_evaluate_left_to_right() {
    assert_eq!(
        run("fun three(a, b, c) { print a; print b; print c; } three(1, 2, 3);"),
        "1\n2\n3\n"
    );
}

#[test]
fn test_clock_native() {
    assert_eq!(run("print clock() >= 0;"), "true\n");
    assert_eq!(run("var before = clock(); var after = clock(); print after >= before;"), "true\n");
}

// =========================================================================
// Closures and upvalues
// =========================================================================

#[test]
fn test_closure_over_returned_local() {
    assert_eq!(
        run("fun outer() { var x = \"outside\"; fun inner() { print x; } return inner; } \
             var closure = outer(); closure();"),
        "outside\n"
    );
}

#[test]
fn test_counter_closure_mutates_captured_variable() {
    assert_eq!(
        run("fun makeCounter() { var i = 0; fun count() { i = i + 1; print i; } return count; } \
             var c = makeCounter(); c(); c(); c();"),
        "1\n2\n3\n"
    );
}

#[test]
fn test_independent_counters() {
    assert_eq!(
        run("fun makeCounter() { var i = 0; fun count() { i = i + 1; print i; } return count; } \
             var a = makeCounter(); var b = makeCounter(); a(); a(); b();"),
        "1\n2\n1\n"
    );
}

#[test]
fn test_sibling_closures_share_an_open_upvalue() {
    assert_eq!(
        run("fun outer() { var x = 1; fun setter() { x = 2; } fun getter() { print x; } \
             setter(); getter(); } outer();"),
        "2\n"
    );
}

#[test]
fn test_sibling_closures_share_a_closed_upvalue() {
    assert_eq!(
        run("var inc; var get; \
             fun make() { var shared = 0; fun i() { shared = shared + 1; } \
             fun g() { print shared; } inc = i; get = g; } \
             make(); inc(); inc(); get();"),
        "2\n"
    );
}

#[test]
fn test_transitive_capture() {
    assert_eq!(
        run("fun a() { var x = \"x\"; fun b() { fun c() { print x; } c(); } b(); } a();"),
        "x\n"
    );
}

#[test]
fn test_block_scope_closes_captured_local() {
    assert_eq!(
        run("var f; { var x = 5; fun g() { print x; } f = g; } f();"),
        "5\n"
    );
}

#[test]
fn test_closures_capture_variables_not_values() {
    assert_eq!(
        run("var f; { var x = 1; fun g() { print x; } x = 2; f = g; } f();"),
        "2\n"
    );
}

// =========================================================================
// Sessions
// =========================================================================

#[test]
fn test_globals_persist_across_interpret_calls() {
    let mut out = Vec::new();
    let mut vm = Vm::with_output(&mut out);
    vm.interpret("var total = 40;").expect("first line runs");
    vm.interpret("total = total + 2;").expect("second line runs");
    vm.interpret("print total;").expect("third line runs");
    drop(vm);
    assert_eq!(String::from_utf8(out).expect("UTF-8"), "42\n");
}

#[test]
fn test_empty_and_comment_only_sources() {
    assert_eq!(run(""), "");
    assert_eq!(run("// nothing to do\n"), "");
}
