//! Operators and conversions.

use super::{ExprCompiler, Result};
use crate::bytecode::{NumericKind, OpCode};
use crate::emit::BytecodeEmitter;
use dynemit_core::{BinaryOperator, CompilationError, Operation, UnaryOperator};

pub(super) fn compile_binary(
    compiler: &mut ExprCompiler<'_, '_, '_>,
    operator: BinaryOperator,
    left: &Operation,
    right: &Operation,
) -> Result<()> {
    compiler.compile(left)?;
    compiler.compile(right)?;
    emit_operator(compiler.emitter, operator);
    Ok(())
}

/// Emit the instruction(s) for `operator` applied to the two topmost values.
///
/// Logical and/or evaluate both operands. Negated comparisons are the
/// primitive comparison followed by `Not`.
pub(super) fn emit_operator(emitter: &mut BytecodeEmitter<'_>, operator: BinaryOperator) {
    let (op, negate) = match operator {
        BinaryOperator::Add => (OpCode::Add, false),
        BinaryOperator::Subtract => (OpCode::Sub, false),
        BinaryOperator::Multiply => (OpCode::Mul, false),
        BinaryOperator::Divide => (OpCode::Div, false),
        BinaryOperator::Remainder => (OpCode::Rem, false),
        BinaryOperator::And | BinaryOperator::ConditionalAnd => (OpCode::BitAnd, false),
        BinaryOperator::Or | BinaryOperator::ConditionalOr => (OpCode::BitOr, false),
        BinaryOperator::ExclusiveOr => (OpCode::BitXor, false),
        BinaryOperator::LeftShift => (OpCode::Shl, false),
        BinaryOperator::RightShift => (OpCode::Shr, false),
        BinaryOperator::Equals => (OpCode::Eq, false),
        BinaryOperator::NotEquals => (OpCode::Eq, true),
        BinaryOperator::LessThan => (OpCode::Lt, false),
        BinaryOperator::LessThanOrEqual => (OpCode::Gt, true),
        BinaryOperator::GreaterThan => (OpCode::Gt, false),
        BinaryOperator::GreaterThanOrEqual => (OpCode::Lt, true),
    };
    emitter.emit(op);
    if negate {
        emitter.emit(OpCode::Not);
    }
}

pub(super) fn compile_unary(
    compiler: &mut ExprCompiler<'_, '_, '_>,
    operator: UnaryOperator,
    operand: &Operation,
) -> Result<()> {
    compiler.compile(operand)?;
    match operator {
        UnaryOperator::Plus => {}
        UnaryOperator::Negate => compiler.emitter.emit(OpCode::Neg),
        UnaryOperator::Not => compiler.emitter.emit(OpCode::Not),
        UnaryOperator::BitwiseNot => compiler.emitter.emit(OpCode::BitNot),
    }
    Ok(())
}

/// Primitive numeric conversions and reference conversions (which need no code).
pub(super) fn compile_conversion(
    compiler: &mut ExprCompiler<'_, '_, '_>,
    op: &Operation,
    operand: &Operation,
) -> Result<()> {
    let target = compiler.ctx.static_type(op)?;
    let source = compiler.ctx.static_type(operand)?;
    compiler.compile(operand)?;

    if target == source {
        return Ok(());
    }
    if let Some(kind) = NumericKind::of(target).filter(|_| NumericKind::of(source).is_some()) {
        compiler.emitter.emit_convert(kind);
        return Ok(());
    }

    let catalog = compiler.ctx.catalog();
    if catalog.get(target).is_some_and(|ty| !ty.is_value_type()) {
        return Ok(());
    }
    Err(CompilationError::unsupported(format!(
        "Conversion({} -> {})",
        catalog.display_name(source),
        catalog.display_name(target)
    )))
}
