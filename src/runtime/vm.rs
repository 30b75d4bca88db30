use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::ir::Bytecode;
use crate::bytecode::op::{read_u16, read_u8, Op};
use crate::lang::value::{Builtin, CompiledFunction, HashKey, HashPair, Value};
use crate::runtime::builtins::BUILTINS;
use crate::runtime::runtime_error::{
    calling_non_function, division_by_zero, frame_overflow, index_not_supported, stack_overflow,
    stack_underflow, unknown_comparison_operator, unknown_integer_operator,
    unknown_string_operator, unsupported_binary_types, unsupported_negation, unusable_hash_key,
    wrong_number_of_arguments, RuntimeError,
};

/// Value stack capacity. Exceeding it is a fatal `stack overflow`.
pub const STACK_SIZE: usize = 2048;
/// Globals array capacity, the address space of `OpSetGlobal`/`OpGetGlobal`.
pub const GLOBALS_SIZE: usize = 65536;
/// Maximum call depth. Exceeding it is a fatal `frame overflow`.
pub const MAX_FRAMES: usize = 1024;

/// One active call: the function being executed, its instruction pointer,
/// and the stack index where its locals begin.
///
/// `ip` starts at -1 because the dispatch loop pre-increments.
#[derive(Debug, Clone)]
struct Frame {
    func: Rc<CompiledFunction>,
    ip: i64,
    base_pointer: usize,
}

impl Frame {
    fn new(func: Rc<CompiledFunction>, base_pointer: usize) -> Self {
        Frame {
            func,
            ip: -1,
            base_pointer,
        }
    }
}

/// Stack virtual machine for compiled Cinder bytecode.
///
/// The main program is wrapped in a synthetic `CompiledFunction` and pushed
/// as frame 0; `run` then fetch-decode-dispatches until that frame's
/// instructions are exhausted or a fatal error surfaces.
pub struct VM {
    constants: Vec<Value>,

    stack: Vec<Value>,
    /// Index of the next free stack slot; the top of stack is `sp - 1`.
    sp: usize,

    globals: Vec<Value>,

    frames: Vec<Frame>,
}

impl VM {
    pub fn new(bytecode: Bytecode) -> Self {
        let main_func = Rc::new(CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        });

        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(main_func, 0));

        VM {
            constants: bytecode.constants,
            stack: vec![Value::Null; STACK_SIZE],
            sp: 0,
            globals: new_globals(),
            frames,
        }
    }

    /// REPL constructor: runs over a globals array carried across lines.
    pub fn with_globals_store(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        let mut vm = VM::new(bytecode);
        vm.globals = globals;
        vm
    }

    /// Hands the globals array back for the next `with_globals_store` round.
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    pub fn stack_top(&self) -> Option<&Value> {
        if self.sp == 0 {
            None
        } else {
            Some(&self.stack[self.sp - 1])
        }
    }

    /// The canonical "program result": the slot just above the logical top
    /// of the stack. Pops only move `sp`, so the value a terminating
    /// expression statement popped is still there.
    pub fn last_popped_stack_element(&self) -> Value {
        self.stack[self.sp].clone()
    }

    // =========================================================================
    // Dispatch loop
    // =========================================================================

    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while !self.frames.is_empty()
            && self.current_frame().ip < self.current_frame().func.instructions.len() as i64 - 1
        {
            self.current_frame_mut().ip += 1;

            let frame = self.current_frame();
            let ip = frame.ip as usize;
            let func = Rc::clone(&frame.func);
            let ins = func.instructions.as_bytes();

            let op = Op::try_from(ins[ip]).map_err(|e| RuntimeError::new(e.to_string()))?;

            match op {
                Op::Constant => {
                    let index = read_u16(&ins[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 2;

                    let constant = self.constants[index].clone();
                    self.push(constant)?;
                }

                Op::Pop => {
                    self.pop()?;
                }

                Op::Add | Op::Sub | Op::Mul | Op::Div => {
                    self.execute_binary_operation(op)?;
                }

                Op::True => self.push(Value::Boolean(true))?,
                Op::False => self.push(Value::Boolean(false))?,
                Op::Null => self.push(Value::Null)?,

                Op::Equal | Op::NotEqual | Op::GreaterThan => {
                    self.execute_comparison(op)?;
                }

                Op::Bang => self.execute_bang_operator()?,
                Op::Minus => self.execute_minus_operator()?,

                Op::Jump => {
                    let target = read_u16(&ins[ip + 1..]) as i64;
                    // the loop pre-increments
                    self.current_frame_mut().ip = target - 1;
                }

                Op::JumpNotTruthy => {
                    let target = read_u16(&ins[ip + 1..]) as i64;
                    self.current_frame_mut().ip += 2;

                    let condition = self.pop()?;
                    if !is_truthy(&condition) {
                        self.current_frame_mut().ip = target - 1;
                    }
                }

                Op::SetGlobal => {
                    let index = read_u16(&ins[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 2;

                    let value = self.pop()?;
                    self.globals[index] = value;
                }

                Op::GetGlobal => {
                    let index = read_u16(&ins[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 2;

                    let value = self.globals[index].clone();
                    self.push(value)?;
                }

                Op::Array => {
                    let count = read_u16(&ins[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 2;

                    let array = self.build_array(self.sp - count, self.sp);
                    self.sp -= count;
                    self.push(array)?;
                }

                Op::Hash => {
                    let count = read_u16(&ins[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 2;

                    let hash = self.build_hash(self.sp - count, self.sp)?;
                    self.sp -= count;
                    self.push(hash)?;
                }

                Op::Index => {
                    let index = self.pop()?;
                    let left = self.pop()?;
                    self.execute_index_expression(left, index)?;
                }

                Op::Call => {
                    let num_args = read_u8(&ins[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 1;

                    self.execute_call(num_args)?;
                }

                Op::ReturnValue => {
                    let return_value = self.pop()?;

                    let frame = self.pop_frame();
                    if self.frames.is_empty() {
                        // top-level `return`: the value already sits in the
                        // last-popped slot and the loop is about to exit
                        continue;
                    }
                    self.sp = frame.base_pointer - 1;

                    self.push(return_value)?;
                }

                Op::Return => {
                    let frame = self.pop_frame();
                    if self.frames.is_empty() {
                        self.push(Value::Null)?;
                        self.pop()?;
                        continue;
                    }
                    self.sp = frame.base_pointer - 1;

                    self.push(Value::Null)?;
                }

                Op::SetLocal => {
                    let index = read_u8(&ins[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 1;

                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.pop()?;
                    self.stack[base_pointer + index] = value;
                }

                Op::GetLocal => {
                    let index = read_u8(&ins[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 1;

                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.stack[base_pointer + index].clone();
                    self.push(value)?;
                }

                Op::GetBuiltin => {
                    let index = read_u8(&ins[ip + 1..]) as usize;
                    self.current_frame_mut().ip += 1;

                    self.push(Value::Builtin(BUILTINS[index]))?;
                }
            }
        }

        Ok(())
    }

    // =========================================================================
    // Frames
    // =========================================================================

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("vm has no frame")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("vm has no frame")
    }

    fn push_frame(&mut self, frame: Frame) -> Result<(), RuntimeError> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(frame_overflow());
        }
        self.frames.push(frame);
        Ok(())
    }

    fn pop_frame(&mut self) -> Frame {
        self.frames.pop().expect("vm has no frame")
    }

    // =========================================================================
    // Calls
    // =========================================================================

    fn execute_call(&mut self, num_args: usize) -> Result<(), RuntimeError> {
        // the callee sits below the arguments
        let callee = self.stack[self.sp - 1 - num_args].clone();

        match callee {
            Value::CompiledFunction(func) => self.call_function(func, num_args),
            Value::Builtin(builtin) => self.call_builtin(builtin, num_args),
            _ => Err(calling_non_function()),
        }
    }

    fn call_function(
        &mut self,
        func: Rc<CompiledFunction>,
        num_args: usize,
    ) -> Result<(), RuntimeError> {
        if func.num_parameters != num_args {
            return Err(wrong_number_of_arguments(func.num_parameters, num_args));
        }

        // the arguments become the first local slots
        let base_pointer = self.sp - num_args;
        let num_locals = func.num_locals;

        self.push_frame(Frame::new(func, base_pointer))?;

        // reserve the remaining local slots above the arguments
        self.sp = base_pointer + num_locals;

        Ok(())
    }

    fn call_builtin(&mut self, builtin: Builtin, num_args: usize) -> Result<(), RuntimeError> {
        let args = self.stack[self.sp - num_args..self.sp].to_vec();

        let result = (builtin.func)(&args);

        // drop callee and arguments, then push the result
        self.sp = self.sp - num_args - 1;
        self.push(result)
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn execute_binary_operation(&mut self, op: Op) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                self.execute_binary_integer_operation(op, *l, *r)
            }
            (Value::Str(l), Value::Str(r)) => self.execute_binary_string_operation(op, l, r),
            _ => Err(unsupported_binary_types(left.kind(), right.kind())),
        }
    }

    fn execute_binary_integer_operation(
        &mut self,
        op: Op,
        left: i64,
        right: i64,
    ) -> Result<(), RuntimeError> {
        let result = match op {
            Op::Add => left + right,
            Op::Sub => left - right,
            Op::Mul => left * right,
            Op::Div => {
                if right == 0 {
                    return Err(division_by_zero());
                }
                left / right
            }
            other => return Err(unknown_integer_operator(other as u8)),
        };

        self.push(Value::Integer(result))
    }

    fn execute_binary_string_operation(
        &mut self,
        op: Op,
        left: &str,
        right: &str,
    ) -> Result<(), RuntimeError> {
        if op != Op::Add {
            return Err(unknown_string_operator(op as u8));
        }

        self.push(Value::Str(Rc::new(format!("{}{}", left, right))))
    }

    fn execute_comparison(&mut self, op: Op) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        if let (Value::Integer(l), Value::Integer(r)) = (&left, &right) {
            return self.execute_integer_comparison(op, *l, *r);
        }

        match op {
            Op::Equal => self.push(Value::Boolean(left.identity_eq(&right))),
            Op::NotEqual => self.push(Value::Boolean(!left.identity_eq(&right))),
            other => Err(unknown_comparison_operator(
                other as u8,
                left.kind(),
                right.kind(),
            )),
        }
    }

    fn execute_integer_comparison(
        &mut self,
        op: Op,
        left: i64,
        right: i64,
    ) -> Result<(), RuntimeError> {
        let result = match op {
            Op::Equal => left == right,
            Op::NotEqual => left != right,
            Op::GreaterThan => left > right,
            other => return Err(unknown_integer_operator(other as u8)),
        };

        self.push(Value::Boolean(result))
    }

    fn execute_bang_operator(&mut self) -> Result<(), RuntimeError> {
        let operand = self.pop()?;

        let result = match operand {
            Value::Boolean(value) => !value,
            Value::Null => true,
            _ => false,
        };

        self.push(Value::Boolean(result))
    }

    fn execute_minus_operator(&mut self) -> Result<(), RuntimeError> {
        let operand = self.pop()?;

        match operand {
            Value::Integer(value) => self.push(Value::Integer(-value)),
            other => Err(unsupported_negation(other.kind())),
        }
    }

    // =========================================================================
    // Aggregates and indexing
    // =========================================================================

    fn build_array(&self, start: usize, end: usize) -> Value {
        Value::Array(Rc::new(self.stack[start..end].to_vec()))
    }

    fn build_hash(&self, start: usize, end: usize) -> Result<Value, RuntimeError> {
        let mut pairs: HashMap<HashKey, HashPair> = HashMap::new();

        let mut i = start;
        while i < end {
            let key = self.stack[i].clone();
            let value = self.stack[i + 1].clone();

            let hash_key = key
                .hash_key()
                .ok_or_else(|| unusable_hash_key(key.kind()))?;

            pairs.insert(hash_key, HashPair { key, value });
            i += 2;
        }

        Ok(Value::Hash(Rc::new(pairs)))
    }

    fn execute_index_expression(
        &mut self,
        left: Value,
        index: Value,
    ) -> Result<(), RuntimeError> {
        match (&left, &index) {
            (Value::Array(elements), Value::Integer(i)) => {
                let max = elements.len() as i64 - 1;
                if *i < 0 || *i > max {
                    self.push(Value::Null)
                } else {
                    self.push(elements[*i as usize].clone())
                }
            }
            (Value::Hash(pairs), _) => {
                let key = index
                    .hash_key()
                    .ok_or_else(|| unusable_hash_key(index.kind()))?;

                match pairs.get(&key) {
                    Some(pair) => self.push(pair.value.clone()),
                    None => self.push(Value::Null),
                }
            }
            _ => Err(index_not_supported(left.kind())),
        }
    }

    // =========================================================================
    // Stack
    // =========================================================================

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.sp >= STACK_SIZE {
            return Err(stack_overflow());
        }

        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    /// Pops by moving `sp` down; the slot's contents stay put, which is what
    /// makes `last_popped_stack_element` possible.
    fn pop(&mut self) -> Result<Value, RuntimeError> {
        if self.sp == 0 {
            return Err(stack_underflow());
        }

        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }
}

/// A fresh globals array, sized for the full `OpSetGlobal` address space.
pub fn new_globals() -> Vec<Value> {
    vec![Value::Null; GLOBALS_SIZE]
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(value) => *value,
        Value::Null => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::Compiler;
    use crate::frontend::parser::Parser;

    fn run_source(input: &str) -> Result<Value, RuntimeError> {
        let program = Parser::parse_source(input).expect("parse error");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");

        let mut vm = VM::new(compiler.bytecode());
        vm.run()?;
        Ok(vm.last_popped_stack_element())
    }

    fn expect_value(input: &str, expected: Value) {
        match run_source(input) {
            Ok(value) => assert_eq!(value, expected, "input: {}", input),
            Err(e) => panic!("vm error for {:?}: {}", input, e),
        }
    }

    fn expect_integer(input: &str, expected: i64) {
        expect_value(input, Value::Integer(expected));
    }

    fn expect_error(input: &str, message: &str) {
        match run_source(input) {
            Err(e) => assert_eq!(e.to_string(), message, "input: {}", input),
            Ok(value) => panic!("expected error for {:?}, got {:?}", input, value),
        }
    }

    fn string(s: &str) -> Value {
        Value::Str(Rc::new(s.to_string()))
    }

    // =========================================================================
    // Arithmetic and booleans
    // =========================================================================

    #[test]
    fn test_integer_arithmetic() {
        let cases = [
            ("1", 1),
            ("2", 2),
            ("1 + 2", 3),
            ("1 - 2", -1),
            ("1 * 2", 2),
            ("4 / 2", 2),
            ("50 / 2 * 2 + 10 - 5", 55),
            ("5 * (2 + 10)", 60),
            ("-5", -5),
            ("-10", -10),
            ("-50 + 100 + -50", 0),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50),
        ];

        for (input, expected) in cases {
            expect_integer(input, expected);
        }
    }

    #[test]
    fn test_boolean_expressions() {
        let cases = [
            ("true", true),
            ("false", false),
            ("1 < 2", true),
            ("1 > 2", false),
            ("1 == 1", true),
            ("1 != 1", false),
            ("1 == 2", false),
            ("true == true", true),
            ("false == false", true),
            ("true == false", false),
            ("true != false", true),
            ("(1 < 2) == true", true),
            ("(1 > 2) == true", false),
            ("!true", false),
            ("!false", true),
            ("!5", false),
            ("!!true", true),
            ("!!5", true),
            ("!(if (false) { 5; })", true),
        ];

        for (input, expected) in cases {
            expect_value(input, Value::Boolean(expected));
        }
    }

    #[test]
    fn test_string_equality_is_identity() {
        // two separately interned constants are distinct objects
        expect_value(r#""a" == "a""#, Value::Boolean(false));
        expect_value(r#""a" != "a""#, Value::Boolean(true));

        // the same global read twice is the same object
        expect_value(r#"let s = "a"; s == s"#, Value::Boolean(true));
    }

    // =========================================================================
    // Conditionals
    // =========================================================================

    #[test]
    fn test_conditionals() {
        let cases = [
            ("if (true) { 10 }", Value::Integer(10)),
            ("if (true) { 10 } else { 20 }", Value::Integer(10)),
            ("if (false) { 10 } else { 20 }", Value::Integer(20)),
            ("if (1) { 10 }", Value::Integer(10)),
            ("if (1 < 2) { 10 }", Value::Integer(10)),
            ("if (1 < 2) { 10 } else { 20 }", Value::Integer(10)),
            ("if (1 > 2) { 10 } else { 20 }", Value::Integer(20)),
            ("if (1 > 2) { 10 }", Value::Null),
            ("if (false) { 10 }", Value::Null),
            (
                "if ((if (false) { 10 })) { 10 } else { 20 }",
                Value::Integer(20),
            ),
        ];

        for (input, expected) in cases {
            expect_value(input, expected);
        }
    }

    // =========================================================================
    // Globals
    // =========================================================================

    #[test]
    fn test_global_let_statements() {
        expect_integer("let one = 1; one", 1);
        expect_integer("let one = 1; let two = 2; one + two", 3);
        expect_integer("let one = 1; let two = one + one; one + two", 3);
    }

    // =========================================================================
    // Strings
    // =========================================================================

    #[test]
    fn test_string_expressions() {
        expect_value(r#""cinder""#, string("cinder"));
        expect_value(r#""cin" + "der""#, string("cinder"));
        expect_value(r#""cin" + "der" + "ella""#, string("cinderella"));
    }

    // =========================================================================
    // Arrays and hashes
    // =========================================================================

    #[test]
    fn test_array_literals() {
        expect_value("[]", Value::Array(Rc::new(vec![])));
        expect_value(
            "[1, 2, 3]",
            Value::Array(Rc::new(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3),
            ])),
        );
        expect_value(
            "[1 + 2, 3 * 4, 5 + 6]",
            Value::Array(Rc::new(vec![
                Value::Integer(3),
                Value::Integer(12),
                Value::Integer(11),
            ])),
        );
    }

    #[test]
    fn test_hash_literals() {
        let result = run_source("{1: 2, 2: 3}").unwrap();
        match result {
            Value::Hash(pairs) => {
                assert_eq!(pairs.len(), 2);

                let one = Value::Integer(1).hash_key().unwrap();
                assert_eq!(pairs.get(&one).unwrap().value, Value::Integer(2));

                let two = Value::Integer(2).hash_key().unwrap();
                assert_eq!(pairs.get(&two).unwrap().value, Value::Integer(3));
            }
            other => panic!("expected hash, got {:?}", other),
        }

        let result = run_source("{1 + 1: 2 * 2, 3 + 3: 4 * 4}").unwrap();
        match result {
            Value::Hash(pairs) => {
                assert_eq!(pairs.len(), 2);
                let key = Value::Integer(2).hash_key().unwrap();
                assert_eq!(pairs.get(&key).unwrap().value, Value::Integer(4));
            }
            other => panic!("expected hash, got {:?}", other),
        }
    }

    #[test]
    fn test_index_expressions() {
        let cases = [
            ("[1, 2, 3][1]", Value::Integer(2)),
            ("[1, 2, 3][0 + 2]", Value::Integer(3)),
            ("[[1, 1, 1]][0][0]", Value::Integer(1)),
            ("[][0]", Value::Null),
            ("[1, 2, 3][99]", Value::Null),
            ("[1][-1]", Value::Null),
            ("{1: 1, 2: 2}[1]", Value::Integer(1)),
            ("{1: 1, 2: 2}[2]", Value::Integer(2)),
            ("{1: 1}[0]", Value::Null),
            ("{}[0]", Value::Null),
            (r#"{"one": 1}["one"]"#, Value::Integer(1)),
            (r#"{true: 10, false: 20}[1 > 2]"#, Value::Integer(20)),
        ];

        for (input, expected) in cases {
            expect_value(input, expected);
        }
    }

    // =========================================================================
    // Functions and calls
    // =========================================================================

    #[test]
    fn test_calling_functions_without_arguments() {
        expect_integer("let fivePlusTen = fn() { 5 + 10; }; fivePlusTen();", 15);
        expect_integer("let one = fn() { 1; }; let two = fn() { 2; }; one() + two()", 3);
        expect_integer(
            "let a = fn() { 1 }; let b = fn() { a() + 1 }; let c = fn() { b() + 1 }; c();",
            3,
        );
    }

    #[test]
    fn test_functions_with_return_statements() {
        expect_integer("let earlyExit = fn() { return 99; 100; }; earlyExit();", 99);
        expect_integer("let earlyExit = fn() { return 99; return 100; }; earlyExit();", 99);
    }

    #[test]
    fn test_functions_without_return_value() {
        expect_value("let noReturn = fn() { }; noReturn();", Value::Null);
        expect_value(
            "let noReturn = fn() { }; let noReturnTwo = fn() { noReturn(); }; noReturn(); noReturnTwo();",
            Value::Null,
        );
    }

    #[test]
    fn test_first_class_functions() {
        expect_integer(
            "let returnsOne = fn() { 1; }; let returnsOneReturner = fn() { returnsOne; }; returnsOneReturner()();",
            1,
        );
    }

    #[test]
    fn test_calling_functions_with_bindings() {
        expect_integer("let one = fn() { let one = 1; one }; one();", 1);
        expect_integer(
            "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; }; oneAndTwo();",
            3,
        );
        expect_integer(
            "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; };
             let threeAndFour = fn() { let three = 3; let four = 4; three + four; };
             oneAndTwo() + threeAndFour();",
            10,
        );
        expect_integer(
            "let firstFoobar = fn() { let foobar = 50; foobar; };
             let secondFoobar = fn() { let foobar = 100; foobar; };
             firstFoobar() + secondFoobar();",
            150,
        );
        expect_integer(
            "let globalSeed = 50;
             let minusOne = fn() { let num = 1; globalSeed - num; };
             let minusTwo = fn() { let num = 2; globalSeed - num; };
             minusOne() + minusTwo();",
            97,
        );
    }

    #[test]
    fn test_calling_functions_with_arguments() {
        expect_integer("let identity = fn(a) { a; }; identity(4);", 4);
        expect_integer("let sum = fn(a, b) { a + b; }; sum(1, 2);", 3);
        expect_integer("let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2);", 3);
        expect_integer(
            "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2) + sum(3, 4);",
            10,
        );
        expect_integer(
            "let sum = fn(a, b) { let c = a + b; c; }; let outer = fn() { sum(1, 2) + sum(3, 4); }; outer();",
            10,
        );
        expect_integer(
            "let globalNum = 10;
             let sum = fn(a, b) { let c = a + b; c + globalNum; };
             let outer = fn() { sum(1, 2) + sum(3, 4) + globalNum; };
             outer() + globalNum;",
            50,
        );
    }

    #[test]
    fn test_calling_functions_with_wrong_arguments() {
        expect_error("fn() { 1; }(1);", "wrong number of arguments: want=0, got=1");
        expect_error("fn(a) { a; }();", "wrong number of arguments: want=1, got=0");
        expect_error(
            "fn(a, b) { a + b; }(1);",
            "wrong number of arguments: want=2, got=1",
        );
    }

    #[test]
    fn test_calling_non_function() {
        expect_error("let x = 1; x();", "calling non-function");
        expect_error("5();", "calling non-function");
    }

    // =========================================================================
    // Builtins
    // =========================================================================

    #[test]
    fn test_builtin_functions() {
        expect_integer(r#"len("")"#, 0);
        expect_integer(r#"len("four")"#, 4);
        expect_integer(r#"len("hello world")"#, 11);
        expect_integer("len([1, 2, 3])", 3);
        expect_integer("len([])", 0);
        expect_value("puts(\"hello\")", Value::Null);
        expect_integer("first([1, 2, 3])", 1);
        expect_value("first([])", Value::Null);
        expect_integer("last([1, 2, 3])", 3);
        expect_value("last([])", Value::Null);
        expect_value(
            "rest([1, 2, 3])",
            Value::Array(Rc::new(vec![Value::Integer(2), Value::Integer(3)])),
        );
        expect_value("rest([])", Value::Null);
        expect_value(
            "push([], 1)",
            Value::Array(Rc::new(vec![Value::Integer(1)])),
        );
    }

    #[test]
    fn test_builtin_errors_are_values_not_aborts() {
        // builtin failures land on the stack as ERROR values
        expect_value(
            "len(1)",
            Value::Error("argument to `len` not supported, got INTEGER".to_string()),
        );
        expect_value(
            r#"len("one", "two")"#,
            Value::Error("wrong number of arguments. got=2, want=1".to_string()),
        );
        expect_value(
            "first(1)",
            Value::Error("argument to `first` must be ARRAY, got INTEGER".to_string()),
        );
        expect_value(
            "last(1)",
            Value::Error("argument to `last` must be ARRAY, got INTEGER".to_string()),
        );
        expect_value(
            "push(1, 1)",
            Value::Error("argument to `push` must be ARRAY, got INTEGER".to_string()),
        );

        // and execution continues past them
        expect_integer("len(1); 42", 42);
    }

    // =========================================================================
    // Floats
    // =========================================================================

    #[test]
    fn test_float_literals() {
        expect_value("3.14", Value::Float(3.14));
        expect_value("0.5", Value::Float(0.5));
    }

    #[test]
    fn test_float_arithmetic_is_unsupported() {
        expect_error(
            "1.5 + 1",
            "unsupported types for binary operation: FLOAT INTEGER",
        );
        expect_error("-1.5", "unsupported type for negation: FLOAT");
        expect_error("{3.14: 1}", "unusable as hash key: FLOAT");
    }

    // =========================================================================
    // Fatal errors
    // =========================================================================

    #[test]
    fn test_binary_operation_errors() {
        expect_error(
            "5 + true",
            "unsupported types for binary operation: INTEGER BOOLEAN",
        );
        expect_error(
            "5 + true; 5;",
            "unsupported types for binary operation: INTEGER BOOLEAN",
        );
        expect_error(
            "true + false",
            "unsupported types for binary operation: BOOLEAN BOOLEAN",
        );
        expect_error(
            r#""a" - "b""#,
            &format!("unknown string operator: {}", Op::Sub as u8),
        );
        expect_error("-true", "unsupported type for negation: BOOLEAN");
    }

    #[test]
    fn test_index_errors() {
        expect_error("5[0]", "index operator not supported: INTEGER");
        expect_error(r#""str"[0]"#, "index operator not supported: STRING");
        expect_error(
            r#"{"name": "Cinder"}[fn(x) { x }];"#,
            "unusable as hash key: COMPILED_FUNCTION_OBJ",
        );
    }

    #[test]
    fn test_division_by_zero() {
        expect_error("1 / 0", "division by zero");
    }

    // =========================================================================
    // Result queries and state reuse
    // =========================================================================

    #[test]
    fn test_last_popped_tracks_the_final_statement() {
        expect_integer("1; 2; 3", 3);
    }

    #[test]
    fn test_stack_top_is_empty_after_a_clean_run() {
        let program = Parser::parse_source("1 + 2;").unwrap();
        let mut compiler = Compiler::new();
        compiler.compile(&program).unwrap();

        let mut vm = VM::new(compiler.bytecode());
        vm.run().unwrap();

        assert!(vm.stack_top().is_none());
        assert_eq!(vm.last_popped_stack_element(), Value::Integer(3));
    }

    #[test]
    fn test_globals_persist_across_runs() {
        // first line of a REPL session
        let program = Parser::parse_source("let x = 5;").unwrap();
        let mut compiler = Compiler::new();
        compiler.compile(&program).unwrap();
        let (symbols, constants) = {
            let bytecode = compiler.bytecode();
            let mut vm = VM::with_globals_store(bytecode, new_globals());
            vm.run().unwrap();
            let globals = vm.into_globals();

            // second line: same symbols, same constants, same globals
            let (symbols, constants) = compiler.into_state();
            let mut compiler = Compiler::with_state(symbols, constants);
            let program = Parser::parse_source("x + 1").unwrap();
            compiler.compile(&program).unwrap();

            let mut vm = VM::with_globals_store(compiler.bytecode(), globals);
            vm.run().unwrap();
            assert_eq!(vm.last_popped_stack_element(), Value::Integer(6));

            compiler.into_state()
        };

        assert!(symbols.resolve("x").is_some());
        assert_eq!(constants[0], Value::Integer(5));
    }

    #[test]
    fn test_top_level_return() {
        expect_integer("return 5;", 5);
    }
}
