//! Core types shared by the dynemit crates.
//!
//! - [`TypeHash`]: deterministic identity for host types and members
//! - [`TypeDescriptor`], symbols and [`Operation`]: the typed trees a front end hands in
//! - [`SemanticModel`]: the front-end interface
//! - [`Value`], [`FunctionValue`], [`NativeFn`]: the runtime model
//! - error enums for every phase

pub mod convert;
pub mod descriptor;
pub mod error;
pub mod frontend;
pub mod function;
pub mod native;
pub mod operation;
pub mod symbols;
pub mod type_hash;
pub mod value;

pub use convert::{FromValue, IntoValue, TypedValue};
pub use descriptor::TypeDescriptor;
pub use error::{CompilationError, ConversionError, DynEmitError, RegistrationError, RuntimeError};
pub use frontend::{Declaration, MethodDeclaration, SemanticModel, SourceCompilation, SyntaxId};
pub use function::{CompiledCode, FunctionBody, FunctionSignature, FunctionValue, Invoker};
pub use native::{CallContext, NativeFn};
pub use operation::{
    BinaryOperator, ConstantValue, HoleArgument, InterpolationPart, Operation, OperationKind, UnaryOperator,
};
pub use symbols::{FieldSymbol, LocalSymbol, MethodKind, MethodSymbol, ParameterSymbol, PropertySymbol, SymbolId};
pub use type_hash::{TypeHash, primitives};
pub use value::{ArrayRef, ObjectRef, PayloadCopier, Value, copy_payload};
