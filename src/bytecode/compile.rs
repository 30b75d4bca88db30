use std::rc::Rc;

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::ir::Bytecode;
use crate::bytecode::op::{make, Instructions, Op};
use crate::bytecode::symbols::{SymbolScope, SymbolTable};
use crate::lang::ast::{BlockStatement, Expression, Program, Statement};
use crate::lang::value::{CompiledFunction, Value};
use crate::runtime::builtins::BUILTINS;

/// Book-keeping for the most recently emitted instruction of a scope.
/// Jump patching and the function-epilogue rewrite only ever inspect the
/// immediately preceding instruction, so one slot is enough.
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Op,
    position: usize,
}

/// One function body under compilation: its growing instruction buffer and
/// the last-emitted record.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last: Option<EmittedInstruction>,
}

impl CompilationScope {
    fn new() -> Self {
        CompilationScope::default()
    }
}

/// Lowers a parsed `Program` to bytecode.
///
/// The compiler walks the AST emitting instructions into the current
/// compilation scope and appending literals to the constant pool. Function
/// literals open a nested scope (and a nested symbol table); the finished
/// body becomes a `CompiledFunction` constant.
pub struct Compiler {
    constants: Vec<Value>,
    symbols: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbols.define_builtin(index, builtin.name);
        }

        Compiler {
            constants: Vec::new(),
            symbols,
            scopes: vec![CompilationScope::new()],
        }
    }

    /// REPL constructor: compiles on top of an existing symbol table and
    /// constant pool so earlier definitions keep their slots.
    pub fn with_state(symbols: SymbolTable, constants: Vec<Value>) -> Self {
        Compiler {
            constants,
            symbols,
            scopes: vec![CompilationScope::new()],
        }
    }

    /// Hands the symbol table and constant pool back to the caller for the
    /// next `with_state` round.
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        (self.symbols, self.constants)
    }

    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    /// Snapshot of the instructions and constants compiled so far.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.current_scope().instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    // =========================================================================
    // Statement lowering
    // =========================================================================

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Let { name, value } => {
                self.compile_expression(value)?;

                let symbol = self.symbols.define(name);
                let op = match symbol.scope {
                    SymbolScope::Global => Op::SetGlobal,
                    _ => Op::SetLocal,
                };
                self.emit(op, &[symbol.index]);
            }

            Statement::Return(Some(value)) => {
                self.compile_expression(value)?;
                self.emit(Op::ReturnValue, &[]);
            }

            Statement::Return(None) => {
                self.emit(Op::Return, &[]);
            }

            Statement::Expression(expression) => {
                self.compile_expression(expression)?;
                // statement sequences must leave the stack empty
                self.emit(Op::Pop, &[]);
            }
        }

        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    // =========================================================================
    // Expression lowering
    // =========================================================================

    fn compile_expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::Identifier(name) => {
                let symbol = match self.symbols.resolve(name) {
                    Some(symbol) => symbol.clone(),
                    None => return Err(CompileError::UndefinedVariable(name.clone())),
                };

                let op = match symbol.scope {
                    SymbolScope::Global => Op::GetGlobal,
                    SymbolScope::Local => Op::GetLocal,
                    SymbolScope::Builtin => Op::GetBuiltin,
                };
                self.emit(op, &[symbol.index]);
            }

            Expression::IntegerLiteral(value) => {
                let index = self.add_constant(Value::Integer(*value));
                self.emit(Op::Constant, &[index]);
            }

            Expression::FloatLiteral(value) => {
                let index = self.add_constant(Value::Float(*value));
                self.emit(Op::Constant, &[index]);
            }

            Expression::StringLiteral(value) => {
                let index = self.add_constant(Value::Str(Rc::new(value.clone())));
                self.emit(Op::Constant, &[index]);
            }

            Expression::BooleanLiteral(true) => {
                self.emit(Op::True, &[]);
            }

            Expression::BooleanLiteral(false) => {
                self.emit(Op::False, &[]);
            }

            Expression::Prefix { operator, right } => {
                self.compile_expression(right)?;

                match operator.as_str() {
                    "!" => self.emit(Op::Bang, &[]),
                    "-" => self.emit(Op::Minus, &[]),
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
            }

            Expression::Infix {
                operator,
                left,
                right,
            } => {
                // there is no less-than opcode: `a < b` lowers as `b > a`
                if operator == "<" {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(Op::GreaterThan, &[]);
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;

                let op = match operator.as_str() {
                    "+" => Op::Add,
                    "-" => Op::Sub,
                    "*" => Op::Mul,
                    "/" => Op::Div,
                    ">" => Op::GreaterThan,
                    "==" => Op::Equal,
                    "!=" => Op::NotEqual,
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
                self.emit(op, &[]);
            }

            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition)?;

                // operand patched once the consequence length is known
                let jump_not_truthy_pos = self.emit(Op::JumpNotTruthy, &[9999]);

                self.compile_block(consequence)?;
                if self.last_instruction_is(Op::Pop) {
                    self.remove_last_pop();
                }

                let jump_pos = self.emit(Op::Jump, &[9999]);

                let after_consequence = self.current_scope().instructions.len();
                self.change_operand(jump_not_truthy_pos, after_consequence);

                match alternative {
                    Some(alternative) => {
                        self.compile_block(alternative)?;
                        if self.last_instruction_is(Op::Pop) {
                            self.remove_last_pop();
                        }
                    }
                    None => {
                        self.emit(Op::Null, &[]);
                    }
                }

                let after_alternative = self.current_scope().instructions.len();
                self.change_operand(jump_pos, after_alternative);
            }

            Expression::ArrayLiteral(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Op::Array, &[elements.len()]);
            }

            Expression::HashLiteral(pairs) => {
                // emit pairs in a canonical order so identical literals
                // always produce identical instruction streams
                let mut ordered: Vec<&(Expression, Expression)> = pairs.iter().collect();
                ordered.sort_by_key(|(key, _)| key.to_string());

                for (key, value) in ordered {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Op::Hash, &[pairs.len() * 2]);
            }

            Expression::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Op::Index, &[]);
            }

            Expression::FunctionLiteral { parameters, body } => {
                self.enter_scope();

                for parameter in parameters {
                    self.symbols.define(parameter);
                }

                self.compile_block(body)?;

                // a body ending in an expression statement returns that
                // expression implicitly
                if self.last_instruction_is(Op::Pop) {
                    self.replace_last_pop_with_return();
                }
                if !self.last_instruction_is(Op::ReturnValue) {
                    self.emit(Op::Return, &[]);
                }

                let num_locals = self.symbols.num_definitions;
                let instructions = self.leave_scope();

                let function = Value::CompiledFunction(Rc::new(CompiledFunction {
                    instructions,
                    num_locals,
                    num_parameters: parameters.len(),
                }));
                let index = self.add_constant(function);
                self.emit(Op::Constant, &[index]);
            }

            Expression::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Op::Call, &[arguments.len()]);
            }
        }

        Ok(())
    }

    // =========================================================================
    // Emission helpers
    // =========================================================================

    fn current_scope(&self) -> &CompilationScope {
        self.scopes.last().expect("compiler has no scope")
    }

    fn current_scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("compiler has no scope")
    }

    /// Appends a constant to the pool and returns its index. Identical
    /// literals are interned separately on purpose: deduplication would
    /// change the instruction streams the tests pin down.
    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    fn emit(&mut self, op: Op, operands: &[usize]) -> usize {
        let instruction = make(op, operands);

        let scope = self.current_scope_mut();
        let position = scope.instructions.len();
        scope.instructions.extend(&instruction);
        scope.last = Some(EmittedInstruction {
            opcode: op,
            position,
        });

        position
    }

    fn last_instruction_is(&self, op: Op) -> bool {
        matches!(self.current_scope().last, Some(last) if last.opcode == op)
    }

    fn remove_last_pop(&mut self) {
        let scope = self.current_scope_mut();
        if let Some(last) = scope.last.take() {
            scope.instructions.truncate(last.position);
        }
    }

    /// Rewrites the trailing `Pop` of a function body to `ReturnValue` in
    /// place (both are single-byte instructions).
    fn replace_last_pop_with_return(&mut self) {
        let scope = self.current_scope_mut();
        if let Some(last) = scope.last.as_mut() {
            scope
                .instructions
                .replace(last.position, &make(Op::ReturnValue, &[]));
            last.opcode = Op::ReturnValue;
        }
    }

    /// Re-encodes the instruction at `pos` with a new operand. Only used
    /// for jumps, whose operand width never changes.
    fn change_operand(&mut self, pos: usize, operand: usize) {
        let byte = self.current_scope().instructions.as_bytes()[pos];
        let op = Op::try_from(byte).expect("patch position holds no opcode");

        let instruction = make(op, &[operand]);
        self.current_scope_mut().instructions.replace(pos, &instruction);
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::new());
        let outer = std::mem::take(&mut self.symbols);
        self.symbols = SymbolTable::new_enclosed(outer);
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().expect("leave_scope without enter_scope");
        let symbols = std::mem::take(&mut self.symbols);
        self.symbols = symbols.into_outer();
        scope.instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}
