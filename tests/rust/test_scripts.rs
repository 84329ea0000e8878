//! End-to-end script tests. Expected output rides along in the scripts
//! themselves as `// Prints "..."` (or `// Expect "..."`) comments, collected
//! in source order and compared against everything the program printed.

use std::cell::RefCell;
use std::rc::Rc;

use regex::Regex;

use rowan_lang::interpreter::Interpreter;
use rowan_lang::lexer::Lexer;
use rowan_lang::parser::Parser;
use rowan_lang::resolver::Resolver;

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

fn expectations(source: &str) -> Vec<String> {
    let re = Regex::new(r#"// ?(?:Expect|Prints) "([^"]*)""#).unwrap();
    re.captures_iter(source)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn check(source: &str) {
    let expected = expectations(source);
    assert!(!expected.is_empty(), "script carries no expectations");

    let (tokens, errors) = Lexer::new(source).tokenize();
    assert!(errors.is_empty(), "lex errors: {:?}", errors);
    let (statements, errors) = Parser::new(tokens).parse();
    assert!(errors.is_empty(), "parse errors: {:?}", errors);

    let buf = SharedBuf::default();
    let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));
    let errors = Resolver::new(&mut interpreter).resolve(&statements);
    assert!(errors.is_empty(), "resolve errors: {:?}", errors);
    interpreter.interpret(&statements).expect("runtime error");

    let output = String::from_utf8(buf.0.borrow().clone()).unwrap();
    let printed: Vec<String> = output.lines().map(str::to_string).collect();
    assert_eq!(printed, expected);
}

#[test]
fn comment_scanner_finds_expectations_in_order() {
    let source = r#"
        print 1; // Prints "1"
        print 2; // Expect "2"
        // a plain comment is ignored
    "#;
    assert_eq!(expectations(source), vec!["1", "2"]);
}

#[test]
fn block_scope() {
    check(r#"
        var a = "global a";
        {
            var a = "block a";
            print a; // Prints "block a"
        }
        print a; // Prints "global a"
    "#);
}

#[test]
fn fibonacci() {
    check(r#"
        var a = 0;
        var temp;
        for (var b = 1; a < 30; b = temp + b) {
            print a; // Prints "0"
            // Prints "1"
            // Prints "1"
            // Prints "2"
            // Prints "3"
            // Prints "5"
            // Prints "8"
            // Prints "13"
            // Prints "21"
            temp = a;
            a = b;
        }
    "#);
}

#[test]
fn counters() {
    check(r#"
        fun makeCounter() {
            var count = 0;
            return fun () {
                count = count + 1;
                return count;
            };
        }
        var tick = makeCounter();
        print tick(); // Prints "1"
        print tick(); // Prints "2"
        print makeCounter()(); // Prints "1"
    "#);
}

#[test]
fn inheritance() {
    check(r#"
        class Doughnut {
            cook() {
                print "Fry until golden brown."; // Prints "Fry until golden brown."
            }
        }
        class BostonCream < Doughnut {
            cook() {
                super.cook();
                print "Pipe full of custard."; // Prints "Pipe full of custard."
            }
        }
        BostonCream().cook();
    "#);
}

#[test]
fn class_methods_and_instances() {
    check(r#"
        class Circle {
            class fromDiameter(d) {
                return Circle(d / 2);
            }
            init(radius) {
                this.radius = radius;
            }
            describe() {
                print "radius " + this.label();
            }
            label() {
                return this.radius == 2 ? "two" : "other";
            }
        }
        Circle.fromDiameter(4).describe(); // Prints "radius two"
        Circle(3).describe(); // Prints "radius other"
    "#);
}

#[test]
fn loops_and_signals() {
    check(r#"
        var i = 0;
        while (true) {
            i = i + 1;
            if (i == 2) continue;
            if (i > 4) break;
            print i; // Prints "1"
            // Prints "3"
            // Prints "4"
        }
        print "done"; // Prints "done"
    "#);
}
