//! Bytecode emitter.
//!
//! The [`BytecodeEmitter`] writes instructions for one method into a
//! [`BytecodeChunk`], interning constants into the method's pool.
//!
//! # Example
//!
//! ```ignore
//! let mut constants = ConstantPool::new();
//! let mut emitter = BytecodeEmitter::new(&mut constants);
//!
//! emitter.set_line(1);
//! emitter.emit_int(20);
//! emitter.emit_get_arg(0);
//! emitter.emit(OpCode::Mul);
//!
//! let chunk = emitter.finish();
//! ```

use crate::bytecode::{BytecodeChunk, Constant, ConstantPool, NumericKind, OpCode};
use dynemit_core::{CompilationError, TypeHash};

/// Placeholder written into a forward jump until it is patched.
const UNPATCHED: u16 = 0xFFFF;

/// A forward jump waiting for its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpLabel(pub(crate) usize);

impl JumpLabel {
    pub fn offset(&self) -> usize {
        self.0
    }
}

pub struct BytecodeEmitter<'pool> {
    chunk: BytecodeChunk,
    constants: &'pool mut ConstantPool,
    current_line: u32,
}

impl<'pool> BytecodeEmitter<'pool> {
    pub fn new(constants: &'pool mut ConstantPool) -> Self {
        Self {
            chunk: BytecodeChunk::new(),
            constants,
            current_line: 0,
        }
    }

    /// Set the source line for subsequent instructions. Zero keeps the current line.
    pub fn set_line(&mut self, line: u32) {
        if line != 0 {
            self.current_line = line;
        }
    }

    pub fn current_line(&self) -> u32 {
        self.current_line
    }

    // ==========================================================================
    // Basic Emission
    // ==========================================================================

    pub fn emit(&mut self, op: OpCode) {
        self.chunk.write_op(op, self.current_line);
    }

    pub fn emit_byte(&mut self, op: OpCode, byte: u8) {
        self.chunk.write_op(op, self.current_line);
        self.chunk.write_byte(byte, self.current_line);
    }

    pub fn emit_u16(&mut self, op: OpCode, value: u16) {
        self.chunk.write_op(op, self.current_line);
        self.chunk.write_u16(value, self.current_line);
    }

    fn intern(&mut self, constant: Constant) -> Result<u16, CompilationError> {
        let index = self.constants.add(constant);
        u16::try_from(index).map_err(|_| CompilationError::unsupported("method with more than 65536 constants"))
    }

    /// Emit a constant load, narrow or wide depending on the pool index.
    pub fn emit_constant(&mut self, constant: Constant) -> Result<(), CompilationError> {
        let index = self.intern(constant)?;
        match u8::try_from(index) {
            Ok(narrow) => self.emit_byte(OpCode::Constant, narrow),
            Err(_) => self.emit_u16(OpCode::ConstantWide, index),
        }
        Ok(())
    }

    /// Emit an instruction whose operand is a hash constant.
    pub fn emit_hash(&mut self, op: OpCode, hash: TypeHash) -> Result<(), CompilationError> {
        let index = self.intern(Constant::Hash(hash))?;
        self.emit_u16(op, index);
        Ok(())
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    pub fn emit_int(&mut self, value: i32) -> Result<(), CompilationError> {
        self.emit_constant(Constant::Int32(value))
    }

    pub fn emit_string(&mut self, value: &str) -> Result<(), CompilationError> {
        self.emit_constant(Constant::String(value.to_string()))
    }

    pub fn emit_null(&mut self) {
        self.emit(OpCode::PushNull);
    }

    pub fn emit_bool(&mut self, value: bool) {
        self.emit(if value { OpCode::PushTrue } else { OpCode::PushFalse });
    }

    pub fn emit_default(&mut self, ty: TypeHash) -> Result<(), CompilationError> {
        self.emit_hash(OpCode::PushDefault, ty)
    }

    // ==========================================================================
    // Arguments and Locals
    // ==========================================================================

    pub fn emit_get_arg(&mut self, slot: u8) {
        self.emit_byte(OpCode::GetArg, slot);
    }

    pub fn emit_set_arg(&mut self, slot: u8) {
        self.emit_byte(OpCode::SetArg, slot);
    }

    pub fn emit_get_local(&mut self, slot: u16) {
        self.emit_u16(OpCode::GetLocal, slot);
    }

    pub fn emit_set_local(&mut self, slot: u16) {
        self.emit_u16(OpCode::SetLocal, slot);
    }

    pub fn emit_convert(&mut self, kind: NumericKind) {
        self.emit_byte(OpCode::Convert, kind.into());
    }

    // ==========================================================================
    // Calls and Objects
    // ==========================================================================

    /// Emit a static, instance or virtual call to a host method.
    pub fn emit_call(&mut self, op: OpCode, method: TypeHash, arg_count: u8) -> Result<(), CompilationError> {
        self.emit_hash(op, method)?;
        self.chunk.write_byte(arg_count, self.current_line);
        Ok(())
    }

    pub fn emit_call_unit(&mut self, callee: u8, arg_count: u8) {
        self.emit_byte(OpCode::CallUnit, callee);
        self.chunk.write_byte(arg_count, self.current_line);
    }

    pub fn emit_new(&mut self, type_hash: TypeHash, ctor: TypeHash, arg_count: u8) -> Result<(), CompilationError> {
        let type_index = self.intern(Constant::Hash(type_hash))?;
        let ctor_index = self.intern(Constant::Hash(ctor))?;
        self.emit_u16(OpCode::New, type_index);
        self.chunk.write_u16(ctor_index, self.current_line);
        self.chunk.write_byte(arg_count, self.current_line);
        Ok(())
    }

    pub fn emit_new_array(&mut self, element: TypeHash, rank: u8) -> Result<(), CompilationError> {
        self.emit_hash(OpCode::NewArray, element)?;
        self.chunk.write_byte(rank, self.current_line);
        Ok(())
    }

    pub fn emit_return(&mut self) {
        self.emit(OpCode::Return);
    }

    pub fn emit_return_void(&mut self) {
        self.emit(OpCode::ReturnVoid);
    }

    pub fn emit_pop(&mut self) {
        self.emit(OpCode::Pop);
    }

    pub fn emit_dup(&mut self) {
        self.emit(OpCode::Dup);
    }

    // ==========================================================================
    // Jumps
    // ==========================================================================

    /// Emit a forward jump; patch it with [`patch_jump`](Self::patch_jump).
    pub fn emit_jump(&mut self, op: OpCode) -> JumpLabel {
        self.emit(op);
        let offset = self.chunk.current_offset();
        self.chunk.write_u16(UNPATCHED, self.current_line);
        JumpLabel(offset)
    }

    /// Point a forward jump at the current position.
    pub fn patch_jump(&mut self, label: JumpLabel) -> Result<(), CompilationError> {
        let distance = self.chunk.current_offset() - label.0 - 2;
        let distance =
            u16::try_from(distance).map_err(|_| CompilationError::unsupported("jump over more than 65535 bytes"))?;
        self.chunk.patch_u16(label.0, distance);
        Ok(())
    }

    /// Emit a backward jump to `target`.
    pub fn emit_loop(&mut self, target: usize) -> Result<(), CompilationError> {
        self.emit(OpCode::Loop);
        // +2 for the operand itself
        let distance = self.chunk.current_offset() - target + 2;
        let distance =
            u16::try_from(distance).map_err(|_| CompilationError::unsupported("loop over more than 65535 bytes"))?;
        self.chunk.write_u16(distance, self.current_line);
        Ok(())
    }

    pub fn current_offset(&self) -> usize {
        self.chunk.current_offset()
    }

    pub fn finish(self) -> BytecodeChunk {
        self.chunk
    }
}
