//! Function values: callable handles bound to a delegate type.

use crate::error::RuntimeError;
use crate::native::NativeFn;
use crate::type_hash::TypeHash;
use crate::value::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Parameter and return types of a delegate's invoke signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSignature {
    pub params: Vec<TypeHash>,
    /// `None` for a void return.
    pub return_type: Option<TypeHash>,
}

impl FunctionSignature {
    pub fn new(params: Vec<TypeHash>, return_type: Option<TypeHash>) -> Self {
        Self { params, return_type }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn returns_value(&self) -> bool {
        self.return_type.is_some()
    }
}

/// Compiled code the host can execute. Implemented by the compiler's method
/// type; the executor downcasts through [`CompiledCode::as_any`].
pub trait CompiledCode: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub enum FunctionBody {
    Native(NativeFn),
    Compiled(Arc<dyn CompiledCode>),
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBody::Native(native) => write!(f, "Native({:?})", native.id()),
            FunctionBody::Compiled(code) => write!(f, "Compiled({})", code.name()),
        }
    }
}

/// A callable value of a specific delegate type.
#[derive(Debug)]
pub struct FunctionValue {
    delegate_type: TypeHash,
    signature: FunctionSignature,
    /// Receiver passed as `this` to instance bodies.
    target: Option<Value>,
    body: FunctionBody,
}

impl FunctionValue {
    pub fn new(delegate_type: TypeHash, signature: FunctionSignature, target: Option<Value>, body: FunctionBody) -> Self {
        Self {
            delegate_type,
            signature,
            target,
            body,
        }
    }

    pub fn delegate_type(&self) -> TypeHash {
        self.delegate_type
    }

    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    pub fn target(&self) -> Option<&Value> {
        self.target.as_ref()
    }

    pub fn body(&self) -> &FunctionBody {
        &self.body
    }
}

/// Executes function values. Natives use it to call back into delegates.
pub trait Invoker {
    fn invoke(&self, function: &FunctionValue, args: Vec<Value>) -> Result<Value, RuntimeError>;
}
