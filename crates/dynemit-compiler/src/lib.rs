//! Dynamic method compiler.
//!
//! Turns typed operation trees into sealed code units of stack bytecode.
//!
//! ## Modules
//!
//! - [`bytecode`]: opcodes, chunks and constant pools
//! - [`emit`]: the bytecode emitter
//! - [`session`]: per-request unit arena and lambda registry
//! - [`lambda`]: compiles nested anonymous functions ahead of their use
//! - [`expr`]: expression compiler
//! - [`stmt`]: statement compiler
//! - [`pipeline`]: top-level entry points
//! - [`unit`]: sealed output

pub mod bytecode;
mod context;
pub mod emit;
pub mod expr;
pub mod lambda;
pub mod pipeline;
pub mod scope;
pub mod session;
pub mod stmt;
pub mod unit;

pub use bytecode::{BytecodeChunk, Constant, ConstantPool, NumericKind, OpCode};
pub use context::BodyContext;
pub use emit::{BytecodeEmitter, JumpLabel};
pub use expr::ExprCompiler;
pub use lambda::LambdaMaterializer;
pub use pipeline::{CompiledFunction, Pipeline};
pub use scope::Frame;
pub use session::{CompilationSession, UnitId};
pub use stmt::StmtCompiler;
pub use unit::{ClosureInstance, CodeUnit, CompiledLambda, CompiledMethod};

pub use dynemit_core::CompilationError;
