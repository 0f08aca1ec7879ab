//! Error types for every phase of dynamic compilation.
//!
//! ```text
//! DynEmitError (top-level wrapper)
//! ├── RegistrationError - reference module / catalog construction errors
//! ├── CompilationError  - operation tree to code unit errors
//! ├── RuntimeError      - execution errors inside compiled code or natives
//! └── ConversionError   - value extraction at the host boundary
//! ```

use thiserror::Error;

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors raised while building the type catalog from reference modules.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// Two types registered under the same name.
    #[error("duplicate type '{name}'")]
    DuplicateType { name: String },

    /// Two members with the same identity on one type.
    #[error("duplicate member '{member}' on type '{type_name}'")]
    DuplicateMember { type_name: String, member: String },

    /// A base type named by a registration does not exist.
    #[error("type '{name}' referenced by '{referenced_by}' is not registered")]
    TypeNotFound { name: String, referenced_by: String },

    /// Registration shape is invalid (e.g. a delegate without an invoke signature).
    #[error("invalid registration of '{name}': {reason}")]
    InvalidType { name: String, reason: String },
}

// ============================================================================
// Compilation Errors
// ============================================================================

/// Errors that abort a compilation. None are recoverable within the session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilationError {
    /// A type descriptor does not bind to any registered host type.
    #[error("unresolved type '{name}'")]
    UnresolvedType { name: String },

    /// No host candidate is compatible with the requested parameter types.
    #[error("no compatible overload for '{name}({})'", params.join(", "))]
    UnresolvedMethodOverload { name: String, params: Vec<String> },

    /// The operation tree uses a shape outside the compiled subset.
    #[error("unsupported operation shape: {shape}")]
    UnsupportedOperationShape { shape: String },

    /// A non-nullable member has no literal or fallback value.
    #[error("no value available for required member '{member}'")]
    MissingRequiredValue { member: String },

    /// A syntax node or symbol is not the kind the request needs.
    #[error("invalid symbol shape: expected {expected}, found {found}")]
    InvalidSymbolShape { expected: String, found: String },
}

impl CompilationError {
    pub fn unsupported(shape: impl Into<String>) -> Self {
        CompilationError::UnsupportedOperationShape { shape: shape.into() }
    }

    pub fn unresolved_type(name: impl ToString) -> Self {
        CompilationError::UnresolvedType { name: name.to_string() }
    }
}

// ============================================================================
// Runtime Errors
// ============================================================================

/// Errors raised while executing compiled code or host natives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("null reference in {context}")]
    NullReference { context: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("index {index} out of range for length {length}")]
    IndexOutOfRange { index: i64, length: usize },

    /// An array's element count overflows or cannot be reserved.
    #[error("cannot allocate array of dimensions {dimensions:?}")]
    AllocationFailed { dimensions: Vec<usize> },

    #[error("call depth limit of {limit} exceeded")]
    CallDepthExceeded { limit: usize },

    #[error("invalid format string '{format}'")]
    InvalidFormat { format: String },

    /// A member hash in the instruction stream is not in the catalog.
    #[error("member {member} not found on '{type_name}'")]
    MemberNotFound { type_name: String, member: String },

    #[error("invalid bytecode at offset {offset}: {reason}")]
    InvalidBytecode { offset: usize, reason: String },

    /// A host object lock was poisoned by a panicking native.
    #[error("host object lock poisoned")]
    Poisoned,

    /// A native reported a failure.
    #[error("{message}")]
    Native { message: String },

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl RuntimeError {
    pub fn native(message: impl Into<String>) -> Self {
        RuntimeError::Native { message: message.into() }
    }
}

// ============================================================================
// Conversion Errors
// ============================================================================

/// Errors extracting Rust values from runtime values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("integer overflow: {value} doesn't fit in {target_type}")]
    IntegerOverflow {
        value: String,
        target_type: &'static str,
    },

    /// A typed function shape does not match the compiled signature.
    #[error("function shape mismatch: expected {expected}, compiled {actual}")]
    SignatureMismatch { expected: String, actual: String },
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Top-level error wrapping every phase.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DynEmitError {
    #[error("registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("compilation error: {0}")]
    Compilation(#[from] CompilationError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),
}

impl DynEmitError {
    pub fn is_registration(&self) -> bool {
        matches!(self, DynEmitError::Registration(_))
    }

    pub fn is_compilation(&self) -> bool {
        matches!(self, DynEmitError::Compilation(_))
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, DynEmitError::Runtime(_))
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self, DynEmitError::Conversion(_))
    }

    /// The compilation error, if this is one.
    pub fn as_compilation(&self) -> Option<&CompilationError> {
        match self {
            DynEmitError::Compilation(err) => Some(err),
            _ => None,
        }
    }
}
