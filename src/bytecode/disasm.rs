use std::fmt;

use crate::bytecode::ir::Bytecode;
use crate::bytecode::op::{lookup, read_operands, Instructions};
use crate::lang::value::Value;

// =============================================================================
// DISASM - Canonical rendering of instruction streams
// =============================================================================

impl fmt::Display for Instructions {
    /// Renders one line per instruction: a 4-digit zero-padded byte offset,
    /// the opcode name, then any operands.
    ///
    /// ```text
    /// 0000 OpConstant 2
    /// 0003 OpConstant 65535
    /// 0006 OpAdd
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            let def = match lookup(bytes[i]) {
                Ok(def) => def,
                Err(e) => {
                    writeln!(f, "ERROR: {}", e)?;
                    i += 1;
                    continue;
                }
            };

            let (operands, read) = read_operands(def, &bytes[i + 1..]);
            writeln!(f, "{:04} {}", i, fmt_instruction(def.name, &operands))?;

            i += 1 + read;
        }

        Ok(())
    }
}

fn fmt_instruction(name: &str, operands: &[usize]) -> String {
    match operands.len() {
        0 => name.to_string(),
        1 => format!("{} {}", name, operands[0]),
        n => format!("ERROR: unhandled operand count {} for {}", n, name),
    }
}

/// Prints a whole compiled program: the main stream followed by every
/// function constant, labeled by its constant-pool index.
pub fn print_bytecode(bytecode: &Bytecode) {
    println!("== main ==");
    print!("{}", bytecode.instructions);

    for (i, constant) in bytecode.constants.iter().enumerate() {
        if let Value::CompiledFunction(func) = constant {
            println!(
                "== fn constant {} ({} locals, {} params) ==",
                i, func.num_locals, func.num_parameters
            );
            print!("{}", func.instructions);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::op::{make, Op};

    fn concat(parts: Vec<Vec<u8>>) -> Instructions {
        Instructions::from_bytes(parts.into_iter().flatten().collect())
    }

    #[test]
    fn test_instructions_display() {
        let instructions = concat(vec![
            make(Op::Add, &[]),
            make(Op::GetLocal, &[1]),
            make(Op::Constant, &[2]),
            make(Op::Constant, &[65535]),
            make(Op::Call, &[255]),
        ]);

        let expected = "\
0000 OpAdd
0001 OpGetLocal 1
0003 OpConstant 2
0006 OpConstant 65535
0009 OpCall 255
";

        assert_eq!(instructions.to_string(), expected);
    }

    #[test]
    fn test_display_offsets_count_bytes() {
        let instructions = concat(vec![
            make(Op::Constant, &[2]),
            make(Op::Constant, &[65535]),
            make(Op::Add, &[]),
        ]);

        let expected = "\
0000 OpConstant 2
0003 OpConstant 65535
0006 OpAdd
";

        assert_eq!(instructions.to_string(), expected);
    }

    #[test]
    fn test_display_flags_undefined_bytes() {
        let instructions = Instructions::from_bytes(vec![Op::Add as u8, 200]);
        let rendered = instructions.to_string();

        assert!(rendered.contains("0000 OpAdd"));
        assert!(rendered.contains("ERROR: opcode 200 not defined"));
    }

    #[test]
    fn test_decode_reencode_round_trip() {
        let original = concat(vec![
            make(Op::Constant, &[1]),
            make(Op::JumpNotTruthy, &[10]),
            make(Op::Array, &[3]),
            make(Op::SetLocal, &[0]),
            make(Op::ReturnValue, &[]),
        ]);

        // walk the stream, decode each instruction, re-encode, compare
        let bytes = original.as_bytes();
        let mut reencoded = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let op = Op::try_from(bytes[i]).unwrap();
            let (operands, read) = read_operands(op.definition(), &bytes[i + 1..]);
            reencoded.extend(make(op, &operands));
            i += 1 + read;
        }

        assert_eq!(reencoded, bytes);
    }
}
