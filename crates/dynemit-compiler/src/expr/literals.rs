//! Literal compilation.

use super::{ExprCompiler, Result};
use crate::bytecode::Constant;
use dynemit_core::{CompilationError, ConstantValue, Operation};

pub(super) fn compile_literal(compiler: &mut ExprCompiler<'_, '_, '_>, op: &Operation) -> Result<()> {
    let Some(constant) = &op.constant else {
        return Err(CompilationError::unsupported(op.shape_name()));
    };
    let emitter = &mut *compiler.emitter;

    match constant {
        ConstantValue::Null => emitter.emit_null(),
        ConstantValue::Bool(value) => emitter.emit_bool(*value),
        ConstantValue::Int32(value) => emitter.emit_constant(Constant::Int32(*value))?,
        ConstantValue::Int64(value) => emitter.emit_constant(Constant::Int64(*value))?,
        ConstantValue::UInt32(value) => emitter.emit_constant(Constant::UInt32(*value))?,
        ConstantValue::UInt64(value) => emitter.emit_constant(Constant::UInt64(*value))?,
        ConstantValue::Float32(value) => emitter.emit_constant(Constant::Float32(*value))?,
        ConstantValue::Float64(value) => emitter.emit_constant(Constant::Float64(*value))?,
        ConstantValue::String(value) => emitter.emit_string(value)?,
        ConstantValue::Char(_) | ConstantValue::Decimal(..) => {
            return Err(CompilationError::unsupported(op.shape_name()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{catalog, compile_expr, method};
    use crate::bytecode::OpCode;
    use dynemit_core::{CompilationError, ConstantValue, Operation};
    use rstest::rstest;

    #[rstest]
    #[case(ConstantValue::Int32(7), OpCode::Constant)]
    #[case(ConstantValue::UInt64(7), OpCode::Constant)]
    #[case(ConstantValue::Float64(0.5), OpCode::Constant)]
    #[case(ConstantValue::String("s".into()), OpCode::Constant)]
    #[case(ConstantValue::Bool(true), OpCode::PushTrue)]
    #[case(ConstantValue::Bool(false), OpCode::PushFalse)]
    fn supported_literals(#[case] constant: ConstantValue, #[case] expected: OpCode) {
        let (chunk, _) = compile_expr(&catalog(), &method(1), &Operation::literal(constant)).unwrap();
        chunk.assert_opcodes(&[expected]);
    }

    #[test]
    fn null_literal() {
        let op = Operation::null(dynemit_core::TypeDescriptor::string());
        let (chunk, _) = compile_expr(&catalog(), &method(1), &op).unwrap();
        chunk.assert_opcodes(&[OpCode::PushNull]);
    }

    #[rstest]
    #[case(ConstantValue::Char('c'), "Literal(char)")]
    #[case(ConstantValue::Decimal(15, 1), "Literal(decimal)")]
    fn other_literals_are_unsupported(#[case] constant: ConstantValue, #[case] shape: &str) {
        let err = compile_expr(&catalog(), &method(1), &Operation::literal(constant)).unwrap_err();
        assert_eq!(err, CompilationError::unsupported(shape));
    }
}
