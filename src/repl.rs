use std::io::{self, BufRead, Write};

use crate::bytecode::compile::Compiler;
use crate::bytecode::symbols::SymbolTable;
use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::lang::value::Value;
use crate::runtime::builtins::BUILTINS;
use crate::runtime::vm::{new_globals, VM};

pub const PROMPT: &str = "--> ";

/// Line-oriented REPL.
///
/// Globals, the symbol table and the constant pool survive across lines, so
/// a `let` on one line is visible on the next: each compilation extends the
/// previous state instead of restarting it.
pub fn start(input: impl BufRead, mut output: impl Write) -> io::Result<()> {
    let mut constants: Vec<Value> = Vec::new();
    let mut globals = new_globals();

    let mut symbols = SymbolTable::new();
    for (index, builtin) in BUILTINS.iter().enumerate() {
        symbols.define_builtin(index, builtin.name);
    }

    let mut lines = input.lines();

    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => return Ok(()),
        };

        let tokens = match Lexer::new(&line).tokenize() {
            Ok(tokens) => tokens,
            Err(e) => {
                writeln!(output, "\t{}", e)?;
                continue;
            }
        };

        let mut parser = Parser::new(tokens);
        let program = parser.parse_program();
        if !parser.errors().is_empty() {
            for error in parser.errors() {
                writeln!(output, "\t{}", error)?;
            }
            continue;
        }

        let mut compiler = Compiler::with_state(symbols, constants);
        if let Err(e) = compiler.compile(&program) {
            writeln!(output, "Woops! Compilation failed:\n {}", e)?;
            (symbols, constants) = compiler.into_state();
            continue;
        }

        let bytecode = compiler.bytecode();
        (symbols, constants) = compiler.into_state();

        let mut machine = VM::with_globals_store(bytecode, globals);
        if let Err(e) = machine.run() {
            writeln!(output, "Woops! Executing bytecode failed:\n {}", e)?;
            globals = machine.into_globals();
            continue;
        }

        writeln!(output, "{}", machine.last_popped_stack_element())?;
        globals = machine.into_globals();
    }
}
