//! Stack virtual machine executing sealed code units.
//!
//! A [`Vm`] is shared by every function value a factory hands out. Each
//! top-level call runs in its own [`Execution`], which tracks call depth
//! across compiled frames and natives that call back into function values.

pub(crate) mod arith;
mod frame;

use dynemit_compiler::CompiledMethod;
use dynemit_core::{CallContext, FunctionBody, FunctionValue, Invoker, RuntimeError, Value};
use dynemit_registry::TypeCatalog;
use std::cell::Cell;
use std::sync::Arc;
use tracing::trace;

/// Default limit on nested calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

#[derive(Debug)]
pub struct Vm {
    catalog: Arc<TypeCatalog>,
    max_call_depth: usize,
}

impl Vm {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    pub fn with_max_call_depth(mut self, limit: usize) -> Self {
        self.max_call_depth = limit;
        self
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    /// Call a function value with `args`.
    pub fn call(&self, function: &FunctionValue, args: Vec<Value>) -> Result<Value, RuntimeError> {
        Execution::new(self).invoke(function, args)
    }
}

impl Invoker for Vm {
    fn invoke(&self, function: &FunctionValue, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.call(function, args)
    }
}

/// State of one top-level call.
pub(crate) struct Execution<'vm> {
    vm: &'vm Vm,
    depth: Cell<usize>,
}

/// Releases one level of call depth on drop.
struct DepthGuard<'e> {
    depth: &'e Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

impl<'vm> Execution<'vm> {
    fn new(vm: &'vm Vm) -> Self {
        Self {
            vm,
            depth: Cell::new(0),
        }
    }

    fn catalog(&self) -> &TypeCatalog {
        &self.vm.catalog
    }

    fn enter(&self) -> Result<DepthGuard<'_>, RuntimeError> {
        let depth = self.depth.get() + 1;
        if depth > self.vm.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                limit: self.vm.max_call_depth,
            });
        }
        self.depth.set(depth);
        Ok(DepthGuard { depth: &self.depth })
    }
}

impl Invoker for Execution<'_> {
    fn invoke(&self, function: &FunctionValue, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let arity = function.signature().arity();
        if args.len() != arity {
            return Err(RuntimeError::TypeMismatch {
                expected: format!("{arity} argument(s)"),
                actual: args.len().to_string(),
            });
        }

        match function.body() {
            FunctionBody::Native(native) => {
                let _depth = self.enter()?;
                let mut ctx = CallContext::new(function.target(), &args, self);
                native.call(&mut ctx)?;
                Ok(ctx.take_return())
            }
            FunctionBody::Compiled(code) => {
                let method = code
                    .as_any()
                    .downcast_ref::<CompiledMethod>()
                    .ok_or_else(|| RuntimeError::TypeMismatch {
                        expected: "bytecode method".into(),
                        actual: code.name().to_string(),
                    })?;
                trace!(method = %method.name, depth = self.depth.get(), "invoke");
                self.run(method, function.target().cloned(), args)
            }
        }
    }
}
