//! The public entry point.
//!
//! [`DynamicMethodFactoryBuilder`] collects reference modules and options,
//! then freezes them into a [`DynamicMethodFactory`] that compiles method
//! declarations and expressions into function values and materializes
//! object instances.

use crate::instance::{FallbackHook, InstanceMaterializer};
use crate::typed::FunctionShape;
use crate::vm::{DEFAULT_MAX_CALL_DEPTH, Vm};
use dynemit_compiler::{CompiledFunction, Pipeline};
use dynemit_core::{
    CompilationError, Declaration, DynEmitError, FunctionValue, RuntimeError, SemanticModel, SyntaxId, Value,
};
use dynemit_registry::{Module, TypeCatalog, TypeDef};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the module collecting types registered one at a time.
const HOST_MODULE: &str = "host";

pub struct DynamicMethodFactoryBuilder {
    modules: Vec<Module>,
    host: Module,
    fallback: Option<Arc<dyn FallbackHook>>,
    max_call_depth: usize,
}

impl Default for DynamicMethodFactoryBuilder {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            host: Module::new(HOST_MODULE),
            fallback: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl DynamicMethodFactoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every type of `module` to the catalog.
    pub fn register_module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    /// Add a single type to the catalog.
    pub fn register_type(mut self, def: TypeDef) -> Self {
        self.host.add(def);
        self
    }

    /// Install the hook consulted for non-constant initializer assignments.
    pub fn install_fallback(mut self, hook: impl FallbackHook + 'static) -> Self {
        self.fallback = Some(Arc::new(hook));
        self
    }

    pub fn max_call_depth(mut self, limit: usize) -> Self {
        self.max_call_depth = limit;
        self
    }

    pub fn build(self) -> Result<DynamicMethodFactory, DynEmitError> {
        let mut modules = self.modules;
        if !self.host.types().is_empty() {
            modules.push(self.host);
        }
        let catalog = Arc::new(TypeCatalog::new(modules)?);
        info!(
            types = catalog.registered_types().count(),
            max_call_depth = self.max_call_depth,
            "dynamic method factory ready"
        );

        let vm = Arc::new(Vm::new(Arc::clone(&catalog)).with_max_call_depth(self.max_call_depth));
        let instances = InstanceMaterializer::new(Arc::clone(&catalog), self.fallback);
        Ok(DynamicMethodFactory {
            catalog,
            vm,
            instances,
        })
    }
}

/// Compiles front-end declarations into callable function values.
pub struct DynamicMethodFactory {
    catalog: Arc<TypeCatalog>,
    vm: Arc<Vm>,
    instances: InstanceMaterializer,
}

impl fmt::Debug for DynamicMethodFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicMethodFactory")
            .field("catalog", &self.catalog)
            .field("max_call_depth", &self.vm.max_call_depth())
            .field("instances", &self.instances)
            .finish()
    }
}

impl DynamicMethodFactory {
    pub fn builder() -> DynamicMethodFactoryBuilder {
        DynamicMethodFactoryBuilder::new()
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn vm(&self) -> &Arc<Vm> {
        &self.vm
    }

    pub fn instances(&self) -> &InstanceMaterializer {
        &self.instances
    }

    /// Compile the declaration at `syntax` into a sealed code unit.
    pub fn compile(&self, syntax: SyntaxId, model: &dyn SemanticModel) -> Result<CompiledFunction, CompilationError> {
        Pipeline::new(&self.catalog, model).compile_syntax(syntax)
    }

    /// Compile the method or expression at `syntax` and bind it to `F`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn create_method<F: FunctionShape>(&self, syntax: SyntaxId, model: &dyn SemanticModel) -> Result<F, DynEmitError> {
        let compiled = self.compile(syntax, model)?;
        debug!(
            unit = %compiled.unit.name,
            delegate = %self.catalog.display_name(compiled.delegate_type),
            "created method"
        );
        Ok(F::bind(compiled.to_function_value(), Arc::clone(&self.vm))?)
    }

    /// Materialize the object-creation expression at `syntax` as a `T`.
    pub fn create_instance<T: Any + Clone>(&self, syntax: SyntaxId, model: &dyn SemanticModel) -> Result<T, DynEmitError> {
        match self.create_instance_value(syntax, model)? {
            Value::Object(object) => Ok(object.with(|payload: &T| payload.clone())?),
            other => Err(RuntimeError::TypeMismatch {
                expected: "host object".into(),
                actual: other.kind_name().into(),
            }
            .into()),
        }
    }

    /// Like [`create_instance`](Self::create_instance), returning the runtime value.
    pub fn create_instance_value(&self, syntax: SyntaxId, model: &dyn SemanticModel) -> Result<Value, DynEmitError> {
        let creation = match model.declaration(syntax) {
            Some(Declaration::Expression(expression)) => expression,
            other => {
                return Err(CompilationError::InvalidSymbolShape {
                    expected: "object creation expression".into(),
                    found: other.map_or_else(|| format!("unknown syntax node {}", syntax.0), |d| d.kind_name().to_string()),
                }
                .into());
            }
        };
        let ty = creation.ty.as_ref().ok_or_else(|| CompilationError::InvalidSymbolShape {
            expected: "typed object creation".into(),
            found: creation.shape_name(),
        })?;
        let target = self.catalog.resolve_or_fail(ty)?;
        self.instances.materialize(target, &creation, self.vm.as_ref())
    }

    /// Call a function value on this factory's machine.
    pub fn invoke(&self, function: &FunctionValue, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.vm.call(function, args)
    }
}
