//! Compilation sessions.
//!
//! A session owns everything one top-level compilation creates before it is
//! sealed: an arena of unit builders with parent links, a cursor on the unit
//! being filled, and the lambdas materialized so far keyed by symbol.
//! Sessions never share state; unsealed units are dropped with the session.

use crate::unit::{ClosureInstance, CodeUnit, CompiledLambda, CompiledMethod};
use dynemit_core::{CompilationError, SymbolId, TypeHash, Value};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);
static NEXT_UNIT: AtomicU64 = AtomicU64::new(1);

/// Index of a unit builder in its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(usize);

#[derive(Debug)]
struct UnitBuilder {
    id: u64,
    name: String,
    parent: Option<UnitId>,
    methods: Vec<Arc<CompiledMethod>>,
    delegate_slot: Option<Arc<OnceLock<Arc<dynemit_core::FunctionValue>>>>,
    has_instance: bool,
    sealed: Option<Arc<CodeUnit>>,
}

#[derive(Debug)]
pub struct CompilationSession {
    id: u64,
    units: Vec<UnitBuilder>,
    current: Option<UnitId>,
    lambdas: FxHashMap<SymbolId, Arc<CompiledLambda>>,
}

impl Default for CompilationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilationSession {
    pub fn new() -> Self {
        Self {
            id: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            units: Vec::new(),
            current: None,
            lambdas: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Open a unit nested under the current one and make it current.
    pub fn open_unit(&mut self, name: &str) -> UnitId {
        let unit = UnitId(self.units.len());
        let id = NEXT_UNIT.fetch_add(1, Ordering::Relaxed);
        self.units.push(UnitBuilder {
            id,
            name: format!("DynEmit.S{}.U{}.{name}", self.id, unit.0),
            parent: self.current,
            methods: Vec::new(),
            delegate_slot: None,
            has_instance: false,
            sealed: None,
        });
        self.current = Some(unit);
        unit
    }

    pub fn current(&self) -> Option<UnitId> {
        self.current
    }

    pub fn parent(&self, unit: UnitId) -> Option<UnitId> {
        self.units.get(unit.0).and_then(|u| u.parent)
    }

    pub fn unit_name(&self, unit: UnitId) -> Option<&str> {
        self.units.get(unit.0).map(|u| u.name.as_str())
    }

    fn builder_mut(&mut self, unit: UnitId) -> Result<&mut UnitBuilder, CompilationError> {
        match self.units.get_mut(unit.0) {
            Some(builder) if builder.sealed.is_none() => Ok(builder),
            Some(builder) => Err(CompilationError::InvalidSymbolShape {
                expected: "open code unit".into(),
                found: format!("sealed unit {}", builder.name),
            }),
            None => Err(CompilationError::InvalidSymbolShape {
                expected: "open code unit".into(),
                found: format!("unknown unit {}", unit.0),
            }),
        }
    }

    pub fn add_method(&mut self, unit: UnitId, method: Arc<CompiledMethod>) -> Result<(), CompilationError> {
        self.builder_mut(unit)?.methods.push(method);
        Ok(())
    }

    /// Give a lambda unit its cached function-value slot and singleton instance.
    pub fn add_delegate_slots(&mut self, unit: UnitId) -> Result<(), CompilationError> {
        let builder = self.builder_mut(unit)?;
        builder.delegate_slot = Some(Arc::new(OnceLock::new()));
        builder.has_instance = true;
        Ok(())
    }

    /// Seal `unit`, constructing its singleton instance, and move the cursor
    /// back to its parent.
    pub fn seal_unit(&mut self, unit: UnitId) -> Result<Arc<CodeUnit>, CompilationError> {
        let builder = self.builder_mut(unit)?;
        let instance = builder
            .has_instance
            .then(|| Value::object(closure_type(builder.id), ClosureInstance { unit: builder.id }));
        let sealed = Arc::new(CodeUnit {
            id: builder.id,
            name: builder.name.clone(),
            methods: std::mem::take(&mut builder.methods),
            delegate_slot: builder.delegate_slot.take(),
            instance,
        });
        builder.sealed = Some(Arc::clone(&sealed));
        let parent = builder.parent;
        if self.current == Some(unit) {
            self.current = parent;
        }
        debug!(unit = %sealed.name, methods = sealed.methods.len(), "sealed code unit");
        Ok(sealed)
    }

    pub fn register_lambda(&mut self, lambda: Arc<CompiledLambda>) {
        debug!(symbol = %lambda.symbol, unit = %lambda.unit.name, "registered lambda");
        self.lambdas.insert(lambda.symbol, lambda);
    }

    pub fn lambda(&self, symbol: SymbolId) -> Option<&Arc<CompiledLambda>> {
        self.lambdas.get(&symbol)
    }

    pub fn lambda_count(&self) -> usize {
        self.lambdas.len()
    }
}

/// Runtime type of a lambda unit's singleton.
fn closure_type(unit: u64) -> TypeHash {
    TypeHash::from_name(&format!("<closure>{unit}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{BytecodeChunk, ConstantPool};
    use dynemit_core::FunctionSignature;

    fn method() -> Arc<CompiledMethod> {
        Arc::new(CompiledMethod {
            name: "M".into(),
            param_count: 0,
            has_this: false,
            local_count: 0,
            returns_value: false,
            chunk: BytecodeChunk::new(),
            constants: ConstantPool::new(),
            lambdas: Vec::new(),
            callees: Vec::new(),
        })
    }

    #[test]
    fn nested_units_restore_the_cursor() {
        let mut session = CompilationSession::new();
        let outer = session.open_unit("outer");
        let inner = session.open_unit("inner");
        assert_eq!(session.parent(inner), Some(outer));
        assert_eq!(session.current(), Some(inner));

        session.seal_unit(inner).unwrap();
        assert_eq!(session.current(), Some(outer));
        session.seal_unit(outer).unwrap();
        assert_eq!(session.current(), None);
    }

    #[test]
    fn sealed_units_reject_changes() {
        let mut session = CompilationSession::new();
        let unit = session.open_unit("u");
        session.add_method(unit, method()).unwrap();
        let sealed = session.seal_unit(unit).unwrap();
        assert_eq!(sealed.methods.len(), 1);
        assert!(session.add_method(unit, method()).is_err());
        assert!(session.seal_unit(unit).is_err());
    }

    #[test]
    fn lambda_units_get_an_instance_and_slot() {
        let mut session = CompilationSession::new();
        let unit = session.open_unit("lambda");
        session.add_delegate_slots(unit).unwrap();
        let sealed = session.seal_unit(unit).unwrap();
        assert!(sealed.delegate_slot.is_some());
        assert!(matches!(sealed.instance, Some(Value::Object(_))));

        let lambda = Arc::new(CompiledLambda::new(
            SymbolId(3),
            sealed,
            method(),
            TypeHash::from_name("Proc"),
            FunctionSignature::new(vec![], None),
        ));
        session.register_lambda(lambda);
        assert!(session.lambda(SymbolId(3)).is_some());
        assert!(session.lambda(SymbolId(4)).is_none());
    }

    #[test]
    fn sessions_and_units_are_distinct() {
        let mut a = CompilationSession::new();
        let mut b = CompilationSession::new();
        assert_ne!(a.id(), b.id());
        let ua = a.open_unit("F");
        let ub = b.open_unit("F");
        assert_ne!(a.unit_name(ua), b.unit_name(ub));
        assert_ne!(a.seal_unit(ua).unwrap().id, b.seal_unit(ub).unwrap().id);
    }
}
