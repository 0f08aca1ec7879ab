//! Per-body compilation state shared by the expression and statement compilers.

use crate::pipeline::Pipeline;
use crate::scope::Frame;
use crate::session::CompilationSession;
use crate::unit::{CompiledLambda, CompiledMethod};
use dynemit_core::{CompilationError, Operation, SymbolId, TypeDescriptor, TypeHash};
use dynemit_registry::TypeCatalog;
use std::sync::Arc;

type Result<T> = std::result::Result<T, CompilationError>;

pub struct BodyContext<'c> {
    pipeline: &'c Pipeline<'c>,
    session: &'c CompilationSession,
    pub(crate) frame: Frame,
    lambdas: Vec<Arc<CompiledLambda>>,
    callees: Vec<Arc<CompiledMethod>>,
    /// Open object initializers whose receiver is on the stack.
    pub(crate) implicit_receivers: usize,
}

impl<'c> BodyContext<'c> {
    pub fn new(pipeline: &'c Pipeline<'c>, session: &'c CompilationSession, frame: Frame) -> Self {
        Self {
            pipeline,
            session,
            frame,
            lambdas: Vec::new(),
            callees: Vec::new(),
            implicit_receivers: 0,
        }
    }

    pub fn pipeline(&self) -> &'c Pipeline<'c> {
        self.pipeline
    }

    pub fn catalog(&self) -> &'c TypeCatalog {
        self.pipeline.catalog()
    }

    pub fn resolve(&self, ty: &TypeDescriptor) -> Result<TypeHash> {
        self.catalog().resolve_or_fail(ty)
    }

    /// Resolved static type of an expression.
    pub fn static_type(&self, op: &Operation) -> Result<TypeHash> {
        match &op.ty {
            Some(ty) => self.resolve(ty),
            None => Err(CompilationError::InvalidSymbolShape {
                expected: "typed expression".into(),
                found: op.shape_name(),
            }),
        }
    }

    /// Index of a materialized lambda in this body's delegate table.
    pub fn lambda_index(&mut self, symbol: SymbolId) -> Result<u8> {
        if let Some(index) = self.lambdas.iter().position(|l| l.symbol == symbol) {
            return Ok(index as u8);
        }
        let lambda = self.session.lambda(symbol).ok_or_else(|| CompilationError::InvalidSymbolShape {
            expected: "materialized anonymous function".into(),
            found: format!("symbol {symbol}"),
        })?;
        let index =
            u8::try_from(self.lambdas.len()).map_err(|_| CompilationError::unsupported("more than 255 lambdas"))?;
        self.lambdas.push(Arc::clone(lambda));
        Ok(index)
    }

    pub fn add_callee(&mut self, method: Arc<CompiledMethod>) -> Result<u8> {
        let index =
            u8::try_from(self.callees.len()).map_err(|_| CompilationError::unsupported("more than 255 source calls"))?;
        self.callees.push(method);
        Ok(index)
    }

    pub fn into_parts(self) -> (Frame, Vec<Arc<CompiledLambda>>, Vec<Arc<CompiledMethod>>) {
        (self.frame, self.lambdas, self.callees)
    }
}
