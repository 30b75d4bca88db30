pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod ir;
pub mod op;
pub mod symbols;

pub use ir::Bytecode;
pub use op::{Instructions, Op};
