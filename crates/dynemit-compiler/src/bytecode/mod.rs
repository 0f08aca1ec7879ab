//! Bytecode types.
//!
//! - [`OpCode`] - the instruction set
//! - [`BytecodeChunk`] - instruction bytes and their line table
//! - [`Constant`] and [`ConstantPool`] - per-method constant storage

mod chunk;
mod constant;
mod opcode;

pub use chunk::BytecodeChunk;
pub use constant::{Constant, ConstantPool};
pub use opcode::{NumericKind, OpCode};
