//! Bytecode chunk for one compiled method.

use super::{ConstantPool, NumericKind, OpCode};
use std::fmt::Write as _;

/// Instruction bytes of a single method, with the source line of each byte.
#[derive(Debug, Clone, Default)]
pub struct BytecodeChunk {
    code: Vec<u8>,
    /// Parallel to `code`.
    lines: Vec<u32>,
}

impl BytecodeChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.code.push(op as u8);
        self.lines.push(line);
    }

    pub fn write_byte(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Write a 16-bit operand (big-endian).
    pub fn write_u16(&mut self, value: u16, line: u32) {
        for byte in value.to_be_bytes() {
            self.write_byte(byte, line);
        }
    }

    /// Overwrite a previously written 16-bit operand.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.code[offset] = hi;
        self.code[offset + 1] = lo;
    }

    /// Current code offset (for jump patching).
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn line_at(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn read_byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    /// Read a u16 at the given offset (big-endian).
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let hi = *self.code.get(offset)?;
        let lo = *self.code.get(offset + 1)?;
        Some(u16::from_be_bytes([hi, lo]))
    }

    pub fn read_op(&self, offset: usize) -> Option<OpCode> {
        self.code.get(offset).and_then(|&b| OpCode::from_u8(b))
    }

    /// All opcodes in order, operands skipped.
    pub fn opcodes(&self) -> Vec<OpCode> {
        let mut ops = Vec::new();
        let mut offset = 0;
        while offset < self.code.len() {
            match self.read_op(offset) {
                Some(op) => {
                    ops.push(op);
                    offset += 1 + op.operand_size();
                }
                None => offset += 1,
            }
        }
        ops
    }

    /// Check the chunk holds exactly the given opcode sequence.
    #[track_caller]
    pub fn assert_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        assert_eq!(
            actual,
            expected,
            "Bytecode mismatch.\nExpected: {:?}\nActual:   {:?}",
            expected.iter().map(|op| op.name()).collect::<Vec<_>>(),
            actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
        );
    }

    /// Render the instruction stream, one instruction per line.
    pub fn disassemble(&self, constants: &ConstantPool) -> String {
        let mut out = String::new();
        let mut offset = 0;
        while offset < self.code.len() {
            let line = self.line_at(offset).unwrap_or(0);
            let Some(op) = self.read_op(offset) else {
                let _ = writeln!(out, "{offset:04} {line:>4} <invalid {:#04x}>", self.code[offset]);
                offset += 1;
                continue;
            };
            let _ = write!(out, "{offset:04} {line:>4} {:<22}", op.name());
            let operands = offset + 1;
            let byte = |i: usize| self.read_byte(operands + i).unwrap_or(0);
            let word = |i: usize| self.read_u16(operands + i).unwrap_or(0);
            let constant = |index: u16| {
                constants
                    .get(u32::from(index))
                    .map_or_else(|| format!("#{index}?"), |c| format!("#{index} {c}"))
            };
            let _ = match op {
                OpCode::Constant => write!(out, "{}", constant(u16::from(byte(0)))),
                OpCode::ConstantWide
                | OpCode::PushDefault
                | OpCode::GetField
                | OpCode::SetField
                | OpCode::GetProperty
                | OpCode::GetPropertyVirtual
                | OpCode::GetStaticProperty
                | OpCode::SetProperty
                | OpCode::SetPropertyVirtual
                | OpCode::SetStaticProperty => write!(out, "{}", constant(word(0))),
                OpCode::GetLocal | OpCode::SetLocal => write!(out, "{}", word(0)),
                OpCode::Jump | OpCode::JumpIfFalse => {
                    write!(out, "-> {:04}", operands + 2 + usize::from(word(0)))
                }
                OpCode::Loop => write!(out, "-> {:04}", (operands + 2).saturating_sub(usize::from(word(0)))),
                OpCode::CallStatic | OpCode::CallMethod | OpCode::CallVirtual => {
                    write!(out, "{} argc={}", constant(word(0)), byte(2))
                }
                OpCode::NewArray => write!(out, "{} rank={}", constant(word(0)), byte(2)),
                OpCode::New => write!(out, "{} {} argc={}", constant(word(0)), constant(word(2)), byte(4)),
                OpCode::CallUnit => write!(out, "callee={} argc={}", byte(0), byte(1)),
                OpCode::Convert => write!(
                    out,
                    "{}",
                    NumericKind::try_from(byte(0)).map_or("?", |kind| kind.name())
                ),
                _ if op.operand_size() == 1 => write!(out, "{}", byte(0)),
                _ => Ok(()),
            };
            out.push('\n');
            offset = operands + op.operand_size();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Constant;

    #[test]
    fn write_and_read_operands() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::GetLocal, 3);
        chunk.write_u16(0x1234, 3);

        assert_eq!(chunk.len(), 3);
        assert_eq!(chunk.read_op(0), Some(OpCode::GetLocal));
        assert_eq!(chunk.read_u16(1), Some(0x1234));
        assert_eq!(chunk.line_at(2), Some(3));
        assert_eq!(chunk.read_u16(2), None);
    }

    #[test]
    fn patching_rewrites_operand() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::Jump, 1);
        chunk.write_u16(0xFFFF, 1);
        chunk.patch_u16(1, 7);
        assert_eq!(chunk.read_u16(1), Some(7));
    }

    #[test]
    fn opcodes_skip_operands() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::CallStatic, 1);
        chunk.write_u16(0, 1);
        chunk.write_byte(2, 1);
        chunk.write_op(OpCode::Return, 1);
        chunk.assert_opcodes(&[OpCode::CallStatic, OpCode::Return]);
    }

    #[test]
    #[should_panic(expected = "Bytecode mismatch")]
    fn assert_opcodes_failure() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::Pop, 1);
        chunk.assert_opcodes(&[OpCode::Dup]);
    }

    #[test]
    fn disassembly_names_constants() {
        let mut pool = ConstantPool::new();
        let idx = pool.add(Constant::Int32(20));
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::Constant, 1);
        chunk.write_byte(idx as u8, 1);
        chunk.write_op(OpCode::GetArg, 1);
        chunk.write_byte(0, 1);
        chunk.write_op(OpCode::Mul, 1);
        chunk.write_op(OpCode::Return, 2);

        let text = chunk.disassemble(&pool);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("CONSTANT") && lines[0].ends_with("#0 20"));
        assert!(lines[1].contains("GET_ARG") && lines[1].ends_with('0'));
        assert!(lines[3].contains("   2 RETURN"));
    }
}
