//! Delegate creation.
//!
//! Lambdas are materialized into their own units before the enclosing body
//! is compiled, so a delegate creation only loads the cached function value.

use super::{ExprCompiler, Result};
use crate::bytecode::OpCode;
use dynemit_core::{CompilationError, Operation, OperationKind};

pub(super) fn compile_delegate_creation(compiler: &mut ExprCompiler<'_, '_, '_>, target: &Operation) -> Result<()> {
    match &target.kind {
        OperationKind::AnonymousFunction { symbol, .. } => {
            let index = compiler.ctx.lambda_index(symbol.id)?;
            compiler.emitter.emit_byte(OpCode::LoadDelegate, index);
            Ok(())
        }
        OperationKind::Parenthesized { operand } => compile_delegate_creation(compiler, operand),
        _ => Err(CompilationError::unsupported(format!(
            "DelegateCreation({})",
            target.shape_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{catalog, compile_expr, method};
    use dynemit_core::{CompilationError, MethodSymbol, Operation, OperationKind, SymbolId, TypeDescriptor};

    #[test]
    fn unmaterialized_lambdas_are_rejected() {
        let symbol = MethodSymbol::lambda(SymbolId(40), TypeDescriptor::named("Calc"));
        let op = Operation::lambda(symbol, Operation::int(1), TypeDescriptor::named("Proc"));
        let err = compile_expr(&catalog(), &method(1), &op).unwrap_err();
        assert!(matches!(err, CompilationError::InvalidSymbolShape { .. }));
    }

    #[test]
    fn method_group_conversions_are_unsupported() {
        let target = Operation::parameter(&method(1).parameters[0]);
        let op = Operation::new(
            OperationKind::DelegateCreation {
                target: Box::new(target),
            },
            Some(TypeDescriptor::named("Proc")),
        );
        let err = compile_expr(&catalog(), &method(1), &op).unwrap_err();
        assert_eq!(err, CompilationError::unsupported("DelegateCreation(ParameterReference)"));
    }
}
