use crate::bytecode::op::Instructions;
use crate::lang::value::Value;

/// A compiled program: the main instruction stream plus the constant pool
/// its `OpConstant` operands index into.
///
/// Constants are append-only during compilation and are shared read-only
/// with the VM afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}
