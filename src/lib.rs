//! # dynemit
//!
//! Compiles already-typed operation trees into callable function values at
//! runtime.
//!
//! A front end describes source methods and expressions through a
//! [`SemanticModel`]. The [`DynamicMethodFactory`] resolves their types
//! against a catalog of registered host types, compiles them (and any
//! lambdas they contain) into sealed bytecode units, and hands back function
//! values executed by the bundled [`Vm`].
//!
//! ## Crates
//!
//! - `dynemit-core`: type hashes, operation trees, runtime values, errors
//! - `dynemit-registry`: host type registration and the [`TypeCatalog`]
//! - `dynemit-compiler`: the compilation pipeline and bytecode
//! - `dynemit` (this crate): the VM, instance materializer and factory

pub mod factory;
pub mod instance;
pub mod typed;
pub mod vm;

pub use factory::{DynamicMethodFactory, DynamicMethodFactoryBuilder};
pub use instance::{CompiledSetter, FallbackHook, InstanceMaterializer, MemberKind, TypeMemberKey, UnknownAssignment};
pub use typed::{ArgList, FunctionShape, TypedFunction};
pub use vm::{DEFAULT_MAX_CALL_DEPTH, Vm};

pub use dynemit_compiler::{CodeUnit, CompiledFunction, CompiledMethod};
pub use dynemit_core::{
    CallContext, CompilationError, ConversionError, Declaration, DynEmitError, FromValue, FunctionSignature,
    FunctionValue, IntoValue, MethodDeclaration, Operation, RegistrationError, RuntimeError, SemanticModel,
    SourceCompilation, SyntaxId, TypeDescriptor, TypeHash, TypedValue, Value,
};
pub use dynemit_registry::{MethodDef, Module, TypeBuilder, TypeCatalog, TypeDef, TypeRef};

pub type Result<T> = std::result::Result<T, DynEmitError>;
