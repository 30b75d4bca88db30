//! Cinder: a small dynamically-typed scripting language, compiled to
//! bytecode and executed on a stack virtual machine.
//!
//! The pipeline runs source text through the [`frontend`] (lexer + parser),
//! lowers the resulting AST with [`bytecode::compile::Compiler`], and hands
//! the `(instructions, constants)` pair to [`runtime::vm::VM`]. The
//! [`repl`] module wires the stages together line by line, keeping globals
//! and the symbol table alive between inputs.

pub mod bytecode;
pub mod frontend;
pub mod lang;
pub mod repl;
pub mod runtime;
