//! End-to-end acceptance tests: source text in, program result out,
//! through the whole lexer -> parser -> compiler -> VM pipeline.

use std::rc::Rc;

use cinder::bytecode::compile::Compiler;
use cinder::frontend::parser::Parser;
use cinder::lang::value::Value;
use cinder::runtime::runtime_error::RuntimeError;
use cinder::runtime::vm::VM;

fn run(source: &str) -> Result<Value, RuntimeError> {
    let program = Parser::parse_source(source).expect("parse error");

    let mut compiler = Compiler::new();
    compiler.compile(&program).expect("compile error");

    let mut vm = VM::new(compiler.bytecode());
    vm.run()?;
    Ok(vm.last_popped_stack_element())
}

fn expect(source: &str, value: Value) {
    assert_eq!(run(source).unwrap(), value, "source: {}", source);
}

#[test]
fn adds_integers() {
    expect("1 + 2", Value::Integer(3));
}

#[test]
fn mixes_prefix_minus_with_addition() {
    expect("-50 + 100 + -50", Value::Integer(0));
}

#[test]
fn reads_global_bindings() {
    expect("let one = 1; let two = 2; one + two", Value::Integer(3));
}

#[test]
fn takes_the_consequence_branch() {
    expect("if (1 < 2) { 10 } else { 20 }", Value::Integer(10));
}

#[test]
fn conditional_without_alternative_yields_null() {
    expect("if (false) { 10 }", Value::Null);
}

#[test]
fn concatenates_strings() {
    expect(
        r#""mon" + "key""#,
        Value::Str(Rc::new("monkey".to_string())),
    );
}

#[test]
fn indexes_arrays_with_computed_subscripts() {
    expect("[1, 2, 3][1 + 1]", Value::Integer(3));
}

#[test]
fn indexes_hashes_by_integer_key() {
    expect("{1: 2, 3: 4}[3]", Value::Integer(4));
}

#[test]
fn calls_functions_with_locals_and_arguments() {
    expect(
        "let sum = fn(a, b) { let c = a + b; c }; sum(1, 2) + sum(3, 4)",
        Value::Integer(10),
    );
}

#[test]
fn rejects_surplus_arguments() {
    let err = run("fn() { 1 }(1)").unwrap_err();
    assert_eq!(err.to_string(), "wrong number of arguments: want=0, got=1");
}

#[test]
fn return_exits_the_function_early() {
    expect(
        "let earlyExit = fn() { return 99; 100 }; earlyExit()",
        Value::Integer(99),
    );
}

#[test]
fn len_counts_array_elements() {
    expect("len([1, 2, 3])", Value::Integer(3));
}
