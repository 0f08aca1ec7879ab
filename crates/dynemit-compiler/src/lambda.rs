//! Lambda materialization.
//!
//! Before a body is compiled, every anonymous function reachable from it is
//! compiled into its own code unit, nested under the unit currently open in
//! the session. Functions are visited post-order so a lambda's own nested
//! lambdas exist before its body refers to them.

use crate::pipeline::Pipeline;
use crate::session::CompilationSession;
use crate::unit::CompiledLambda;
use dynemit_core::{CompilationError, MethodSymbol, Operation, OperationKind};
use std::sync::Arc;

pub struct LambdaMaterializer<'p, 'a> {
    pipeline: &'p Pipeline<'a>,
}

impl<'p, 'a> LambdaMaterializer<'p, 'a> {
    pub fn new(pipeline: &'p Pipeline<'a>) -> Self {
        Self { pipeline }
    }

    /// Materialize every lambda under `root`; returns how many were compiled.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn materialize(&self, root: &Operation, session: &mut CompilationSession) -> Result<usize, CompilationError> {
        let mut compiled = 0;
        self.visit(root, session, &mut compiled)?;
        Ok(compiled)
    }

    fn visit(&self, op: &Operation, session: &mut CompilationSession, compiled: &mut usize) -> Result<(), CompilationError> {
        for child in op.children() {
            self.visit(child, session, compiled)?;
        }
        if let OperationKind::AnonymousFunction { symbol, body } = &op.kind {
            if session.lambda(symbol.id).is_none() {
                self.compile_lambda(symbol, body, session)?;
                *compiled += 1;
            }
        }
        Ok(())
    }

    fn compile_lambda(
        &self,
        symbol: &MethodSymbol,
        body: &Operation,
        session: &mut CompilationSession,
    ) -> Result<(), CompilationError> {
        let unit = session.open_unit(&symbol.name);
        let (delegate_type, signature) = self.pipeline.function_type(symbol)?;

        let method = Arc::new(self.pipeline.compile_body(session, symbol, true, body)?);
        session.add_method(unit, Arc::clone(&method))?;
        session.add_delegate_slots(unit)?;
        let sealed = session.seal_unit(unit)?;

        session.register_lambda(Arc::new(CompiledLambda::new(
            symbol.id,
            sealed,
            method,
            delegate_type,
            signature,
        )));
        Ok(())
    }
}
