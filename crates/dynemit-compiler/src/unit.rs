//! Sealed compilation output.
//!
//! A [`CodeUnit`] is the sealed container produced for one top-level method,
//! expression or lambda. Its [`CompiledMethod`]s are what function values
//! execute.

use crate::bytecode::{BytecodeChunk, ConstantPool};
use dynemit_core::{CompiledCode, FunctionBody, FunctionSignature, FunctionValue, SymbolId, TypeHash, Value};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Executable body of one method.
#[derive(Debug)]
pub struct CompiledMethod {
    pub name: String,
    /// Declared parameters, excluding `this`.
    pub param_count: usize,
    /// Argument slot 0 holds the receiver.
    pub has_this: bool,
    pub local_count: usize,
    pub returns_value: bool,
    pub chunk: BytecodeChunk,
    pub constants: ConstantPool,
    /// Targets of `LoadDelegate`.
    pub lambdas: Vec<Arc<CompiledLambda>>,
    /// Targets of `CallUnit`.
    pub callees: Vec<Arc<CompiledMethod>>,
}

impl CompiledMethod {
    /// Argument slots including the receiver.
    pub fn arg_slots(&self) -> usize {
        self.param_count + usize::from(self.has_this)
    }

    pub fn disassemble(&self) -> String {
        self.chunk.disassemble(&self.constants)
    }
}

impl CompiledCode for CompiledMethod {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Payload of a lambda unit's singleton instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosureInstance {
    pub unit: u64,
}

/// Sealed code unit.
pub struct CodeUnit {
    pub id: u64,
    pub name: String,
    pub methods: Vec<Arc<CompiledMethod>>,
    /// Compute-once function value, present on lambda units.
    pub delegate_slot: Option<Arc<OnceLock<Arc<FunctionValue>>>>,
    /// Singleton receiver, present on lambda units.
    pub instance: Option<Value>,
}

impl fmt::Debug for CodeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeUnit")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("methods", &self.methods.iter().map(|m| m.name.as_str()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A materialized anonymous function.
#[derive(Debug)]
pub struct CompiledLambda {
    pub symbol: SymbolId,
    pub unit: Arc<CodeUnit>,
    pub method: Arc<CompiledMethod>,
    pub delegate_type: TypeHash,
    pub signature: FunctionSignature,
    cell: Arc<OnceLock<Arc<FunctionValue>>>,
    instance: Value,
}

impl CompiledLambda {
    pub fn new(
        symbol: SymbolId,
        unit: Arc<CodeUnit>,
        method: Arc<CompiledMethod>,
        delegate_type: TypeHash,
        signature: FunctionSignature,
    ) -> Self {
        let cell = unit.delegate_slot.clone().unwrap_or_default();
        let instance = unit.instance.clone().unwrap_or(Value::Null);
        Self {
            symbol,
            unit,
            method,
            delegate_type,
            signature,
            cell,
            instance,
        }
    }

    /// The cached function value, created on first use.
    pub fn delegate(&self) -> Arc<FunctionValue> {
        Arc::clone(self.cell.get_or_init(|| {
            let body: Arc<dyn CompiledCode> = self.method.clone();
            Arc::new(FunctionValue::new(
                self.delegate_type,
                self.signature.clone(),
                Some(self.instance.clone()),
                FunctionBody::Compiled(body),
            ))
        }))
    }

    pub fn instance(&self) -> &Value {
        &self.instance
    }
}
