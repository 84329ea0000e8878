//! Interpreter tests — evaluation, control flow, closures, classes

use std::cell::RefCell;
use std::rc::Rc;

use rowan_lang::interpreter::Interpreter;
use rowan_lang::lexer::Lexer;
use rowan_lang::parser::Parser;
use rowan_lang::resolver::Resolver;

/// A `Write` handle the test keeps a second reference to, so `print` output
/// can be inspected after the run.
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl std::io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn execute(source: &str) -> (String, Option<String>) {
    let (tokens, errors) = Lexer::new(source).tokenize();
    assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
    let (statements, errors) = Parser::new(tokens).parse();
    assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);

    let buf = SharedBuf::default();
    let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));
    let errors = Resolver::new(&mut interpreter).resolve(&statements);
    assert!(errors.is_empty(), "unexpected resolve errors: {:?}", errors);

    let error = interpreter.interpret(&statements).err().map(|e| e.message);
    let output = String::from_utf8(buf.0.borrow().clone()).unwrap();
    (output, error)
}

/// Run and return printed lines; any runtime error fails the test.
fn run(source: &str) -> Vec<String> {
    let (output, error) = execute(source);
    assert_eq!(error, None, "unexpected runtime error");
    output.lines().map(str::to_string).collect()
}

/// Run and return the runtime error message.
fn run_err(source: &str) -> String {
    let (_, error) = execute(source);
    error.expect("expected a runtime error")
}

// ── Values and printing ─────────────────────────────────────

#[test]
fn print_literals() {
    assert_eq!(run("print 1; print nil; print true; print \"hi\";"),
               vec!["1", "nil", "true", "hi"]);
}

#[test]
fn whole_numbers_print_without_a_fraction() {
    assert_eq!(run("print 3.0; print 1.5 + 1.5;"), vec!["3", "3"]);
}

#[test]
fn arithmetic() {
    assert_eq!(run("print 1 + 2 * 3 - 4 / 2;"), vec!["5"]);
}

#[test]
fn string_concatenation() {
    assert_eq!(run("print \"foo\" + \"bar\";"), vec!["foobar"]);
}

#[test]
fn mixed_plus_is_an_error() {
    assert_eq!(run_err("print \"a\" + 1;"),
               "Operands must be two numbers or two strings.");
}

#[test]
fn division_by_zero() {
    assert_eq!(run_err("print 5 / 0;"), "Division by zero.");
}

#[test]
fn unary_operand_must_be_a_number() {
    assert_eq!(run_err("print -\"a\";"), "Operand must be a number.");
}

#[test]
fn comparison_operands_must_be_numbers() {
    assert_eq!(run_err("print 1 < \"two\";"), "Operands must be numbers.");
}

#[test]
fn equality_across_types_is_false() {
    assert_eq!(run("print 1 == \"1\"; print nil == nil; print nil == false;"),
               vec!["false", "true", "false"]);
}

#[test]
fn zero_is_truthy() {
    assert_eq!(run("if (0) print \"yes\"; else print \"no\";"), vec!["yes"]);
}

#[test]
fn logical_operators_return_operands() {
    assert_eq!(run("print \"hi\" or 2; print nil or \"fallback\"; print nil and 2;"),
               vec!["hi", "fallback", "nil"]);
}

#[test]
fn ternary_evaluates_only_the_taken_branch() {
    assert_eq!(run("print true ? 1 : 1 / 0; print false ? 1 / 0 : 2;"),
               vec!["1", "2"]);
}

#[test]
fn comma_yields_the_right_operand() {
    assert_eq!(run("print (1, 2, 3);"), vec!["3"]);
}

// ── Variables and scope ─────────────────────────────────────

#[test]
fn shadowing_reads_the_inner_binding() {
    assert_eq!(run("var a = 1; { var a = 2; print a; } print a;"),
               vec!["2", "1"]);
}

#[test]
fn undefined_variable() {
    assert_eq!(run_err("print nothing;"), "Undefined variable 'nothing'.");
}

#[test]
fn reading_an_unassigned_variable() {
    assert_eq!(run_err("var a; print a;"),
               "Cannot read unassigned variable 'a'.");
}

#[test]
fn assignment_before_first_read_is_fine() {
    assert_eq!(run("var a; a = 7; print a;"), vec!["7"]);
}

#[test]
fn assignment_is_an_expression() {
    assert_eq!(run("var a = 1; print a = 2; print a;"), vec!["2", "2"]);
}

#[test]
fn assigning_an_undefined_global() {
    assert_eq!(run_err("nothing = 1;"), "Undefined variable 'nothing'.");
}

// ── Control flow ────────────────────────────────────────────

#[test]
fn while_loop() {
    assert_eq!(run("var i = 0; while (i < 3) { print i; i = i + 1; }"),
               vec!["0", "1", "2"]);
}

#[test]
fn for_loop() {
    assert_eq!(run("for (var i = 0; i < 3; i = i + 1) print i;"),
               vec!["0", "1", "2"]);
}

#[test]
fn break_leaves_the_innermost_loop() {
    let source = "
        for (var i = 0; i < 3; i = i + 1) {
            for (var j = 0; j < 3; j = j + 1) {
                if (j == 1) break;
                print i + j;
            }
        }";
    assert_eq!(run(source), vec!["0", "1", "2"]);
}

#[test]
fn continue_skips_to_the_next_iteration() {
    let source = "
        var i = 0;
        while (i < 5) {
            i = i + 1;
            if (i == 3) continue;
            print i;
        }";
    assert_eq!(run(source), vec!["1", "2", "4", "5"]);
}

#[test]
fn continue_skips_a_desugared_for_increment() {
    // continue resumes at the condition, and the increment is part of the
    // body it jumps out of; loops that continue must advance their own
    // induction variables
    let source = "
        for (var i = 0; i < 3; i = i + 1) {
            if (i == 1) { i = i + 2; continue; }
            print i;
        }";
    assert_eq!(run(source), vec!["0"]);
}

#[test]
fn break_inside_a_called_function_exits_the_enclosing_loop() {
    // The signal tunnels through the call boundary to the loop that is
    // dynamically running; the statements after the call never execute.
    let source = "
        var n = 0;
        while (n < 3) {
            fun f() { break; }
            f();
            n = n + 1;
        }
        print n;";
    assert_eq!(run(source), vec!["0"]);
}

#[test]
fn continue_inside_a_called_function_resumes_the_enclosing_loop() {
    let source = "
        var n = 0;
        while (n < 4) {
            n = n + 1;
            fun f() { if (n == 2) continue; }
            f();
            print n;
        }";
    assert_eq!(run(source), vec!["1", "3", "4"]);
}

#[test]
fn a_tunnelling_break_abandons_the_surrounding_expression() {
    // `n = n + f()` is cut short mid-expression, so the assignment to n
    // never lands.
    let source = "
        var n = 10;
        while (true) {
            fun f() { break; }
            n = n + f();
        }
        print n;";
    assert_eq!(run(source), vec!["10"]);
}

#[test]
fn return_still_stops_at_the_call_boundary() {
    let source = "
        var hits = 0;
        while (hits < 2) {
            fun f() { return 5; }
            print f();
            hits = hits + 1;
        }";
    assert_eq!(run(source), vec!["5", "5"]);
}

// ── Functions and closures ──────────────────────────────────

#[test]
fn function_call_and_return() {
    assert_eq!(run("fun add(a, b) { return a + b; } print add(1, 2);"),
               vec!["3"]);
}

#[test]
fn return_without_a_value_is_nil() {
    assert_eq!(run("fun f() { return; } print f();"), vec!["nil"]);
}

#[test]
fn falling_off_the_end_returns_nil() {
    assert_eq!(run("fun f() { 1 + 1; } print f();"), vec!["nil"]);
}

#[test]
fn recursion() {
    let source = "
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        print fib(10);";
    assert_eq!(run(source), vec!["55"]);
}

#[test]
fn arity_mismatch() {
    assert_eq!(run_err("fun f(a, b) { return a + b; } f(1);"),
               "Expected 2 arguments but got 1.");
}

#[test]
fn calling_a_non_callable() {
    assert_eq!(run_err("var x = 1; x();"),
               "Can only call functions and classes.");
}

#[test]
fn function_values_print_their_name() {
    assert_eq!(run("fun f() { return 1; } print f;"), vec!["<fn f>"]);
}

#[test]
fn closure_counter() {
    let source = "
        fun makeCounter() {
            var count = 0;
            return fun () {
                count = count + 1;
                return count;
            };
        }
        var counter = makeCounter();
        print counter();
        print counter();
        print counter();";
    assert_eq!(run(source), vec!["1", "2", "3"]);
}

#[test]
fn counters_do_not_share_state() {
    let source = "
        fun makeCounter() {
            var count = 0;
            return fun () {
                count = count + 1;
                return count;
            };
        }
        var a = makeCounter();
        var b = makeCounter();
        a(); a();
        print a();
        print b();";
    assert_eq!(run(source), vec!["3", "1"]);
}

#[test]
fn closures_capture_the_variable_not_its_value() {
    let source = "
        var f;
        {
            var local = \"before\";
            f = fun () { print local; };
            local = \"after\";
        }
        f();";
    assert_eq!(run(source), vec!["after"]);
}

#[test]
fn lambda_expression_value() {
    assert_eq!(run("var twice = fun (x) { return x * 2; }; print twice(4);"),
               vec!["8"]);
}

// ── Classes ─────────────────────────────────────────────────

#[test]
fn instances_print_the_class_name() {
    assert_eq!(run("class C {} print C(); print C;"),
               vec!["C instance", "C"]);
}

#[test]
fn fields_and_methods() {
    let source = "
        class Counter {
            init() { this.count = 0; }
            bump() {
                this.count = this.count + 1;
                return this.count;
            }
        }
        var c = Counter();
        c.bump();
        print c.bump();
        print c.count;";
    assert_eq!(run(source), vec!["2", "2"]);
}

#[test]
fn fields_shadow_methods() {
    let source = "
        class C {
            m() { return \"method\"; }
        }
        var c = C();
        c.m = fun () { return \"field\"; };
        print c.m();";
    assert_eq!(run(source), vec!["field"]);
}

#[test]
fn bound_methods_remember_their_receiver() {
    let source = "
        class Greeter {
            init(name) { this.name = name; }
            greet() { print \"hi \" + this.name; }
        }
        var g = Greeter(\"ada\").greet;
        g();";
    assert_eq!(run(source), vec!["hi ada"]);
}

#[test]
fn initializer_arity_is_the_class_arity() {
    assert_eq!(run_err("class C { init(a) { this.a = a; } } C();"),
               "Expected 1 arguments but got 0.");
}

#[test]
fn bare_return_in_init_still_yields_the_instance() {
    let source = "
        class C {
            init() {
                this.x = 1;
                return;
            }
        }
        print C();";
    assert_eq!(run(source), vec!["C instance"]);
}

#[test]
fn undefined_property() {
    assert_eq!(run_err("class C {} print C().missing;"),
               "Undefined property 'missing'.");
}

#[test]
fn properties_on_a_non_instance() {
    assert_eq!(run_err("print (1).size;"), "Only instances have properties.");
    assert_eq!(run_err("(1).size = 2;"), "Only instances have fields.");
}

// ── Inheritance ─────────────────────────────────────────────

#[test]
fn methods_are_inherited() {
    let source = "
        class A { m() { return \"A\"; } }
        class B < A {}
        print B().m();";
    assert_eq!(run(source), vec!["A"]);
}

#[test]
fn super_calls_the_overridden_method() {
    let source = "
        class A {
            m() { print \"A\"; }
        }
        class B < A {
            m() {
                super.m();
                print \"B\";
            }
        }
        B().m();";
    assert_eq!(run(source), vec!["A", "B"]);
}

#[test]
fn super_skips_past_the_receiver_class() {
    // method inherited by C still resolves super against B's superclass
    let source = "
        class A { m() { print \"A\"; } }
        class B < A { m() { super.m(); } }
        class C < B {}
        C().m();";
    assert_eq!(run(source), vec!["A"]);
}

#[test]
fn superclass_must_be_a_class() {
    assert_eq!(run_err("var NotAClass = 1; class C < NotAClass {}"),
               "Superclass must be a class.");
}

// ── Class-level methods and fields ──────────────────────────

#[test]
fn class_methods_are_called_on_the_class() {
    let source = "
        class Math {
            class square(n) { return n * n; }
        }
        print Math.square(3);";
    assert_eq!(run(source), vec!["9"]);
}

#[test]
fn class_methods_see_the_class_as_this() {
    let source = "
        class Math {
            class identify() { print this; }
        }
        Math.identify();";
    assert_eq!(run(source), vec!["Math"]);
}

#[test]
fn class_fields_shadow_class_methods() {
    let source = "
        class Math {
            class tau() { return 6.28; }
        }
        Math.tau = \"overwritten\";
        print Math.tau;";
    assert_eq!(run(source), vec!["overwritten"]);
}

#[test]
fn class_methods_are_not_inherited() {
    let source = "
        class A {
            class m() { return 1; }
        }
        class B < A {}
        print B.m();";
    assert_eq!(run_err(source), "Undefined property 'm'.");
}
