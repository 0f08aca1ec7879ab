//! Operators on runtime values.
//!
//! Integer arithmetic wraps; integer division and remainder by zero fail.
//! Operands of a binary operator must share a numeric kind, except shifts
//! (any integer count, masked to the operand width) and string concatenation.

use dynemit_compiler::{NumericKind, OpCode};
use dynemit_core::{RuntimeError, Value};
use dynemit_registry::format_value;
use std::cmp::Ordering;

type Result<T> = std::result::Result<T, RuntimeError>;

fn mismatch(op: OpCode, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: format!("matching operands for {}", op.name()),
        actual: format!("{} and {}", left.kind_name(), right.kind_name()),
    }
}

fn unary_mismatch(op: OpCode, operand: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: format!("operand for {}", op.name()),
        actual: operand.kind_name().to_string(),
    }
}

macro_rules! integer_op {
    ($op:expr, $a:expr, $b:expr, $variant:ident, $left:expr, $right:expr) => {{
        let (a, b) = ($a, $b);
        match $op {
            OpCode::Add => Value::$variant(a.wrapping_add(b)),
            OpCode::Sub => Value::$variant(a.wrapping_sub(b)),
            OpCode::Mul => Value::$variant(a.wrapping_mul(b)),
            OpCode::Div if b == 0 => return Err(RuntimeError::DivisionByZero),
            OpCode::Div => Value::$variant(a.wrapping_div(b)),
            OpCode::Rem if b == 0 => return Err(RuntimeError::DivisionByZero),
            OpCode::Rem => Value::$variant(a.wrapping_rem(b)),
            OpCode::BitAnd => Value::$variant(a & b),
            OpCode::BitOr => Value::$variant(a | b),
            OpCode::BitXor => Value::$variant(a ^ b),
            _ => return Err(mismatch($op, $left, $right)),
        }
    }};
}

macro_rules! float_op {
    ($op:expr, $a:expr, $b:expr, $variant:ident, $left:expr, $right:expr) => {{
        let (a, b) = ($a, $b);
        match $op {
            OpCode::Add => Value::$variant(a + b),
            OpCode::Sub => Value::$variant(a - b),
            OpCode::Mul => Value::$variant(a * b),
            OpCode::Div => Value::$variant(a / b),
            OpCode::Rem => Value::$variant(a % b),
            _ => return Err(mismatch($op, $left, $right)),
        }
    }};
}

/// Arithmetic, bitwise and shift operators.
pub(super) fn binary(op: OpCode, left: &Value, right: &Value) -> Result<Value> {
    if matches!(op, OpCode::Shl | OpCode::Shr) {
        return shift(op, left, right);
    }

    Ok(match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => integer_op!(op, *a, *b, Int32, left, right),
        (Value::Int64(a), Value::Int64(b)) => integer_op!(op, *a, *b, Int64, left, right),
        (Value::UInt32(a), Value::UInt32(b)) => integer_op!(op, *a, *b, UInt32, left, right),
        (Value::UInt64(a), Value::UInt64(b)) => integer_op!(op, *a, *b, UInt64, left, right),
        (Value::Float32(a), Value::Float32(b)) => float_op!(op, *a, *b, Float32, left, right),
        (Value::Float64(a), Value::Float64(b)) => float_op!(op, *a, *b, Float64, left, right),
        (Value::Bool(a), Value::Bool(b)) => match op {
            OpCode::BitAnd => Value::Bool(*a & *b),
            OpCode::BitOr => Value::Bool(*a | *b),
            OpCode::BitXor => Value::Bool(*a ^ *b),
            _ => return Err(mismatch(op, left, right)),
        },
        (Value::String(_), _) | (_, Value::String(_)) if op == OpCode::Add => {
            let mut text = format_value(left, None, None)?;
            text.push_str(&format_value(right, None, None)?);
            Value::String(text)
        }
        _ => return Err(mismatch(op, left, right)),
    })
}

fn shift(op: OpCode, left: &Value, right: &Value) -> Result<Value> {
    let count = match right {
        Value::Int32(n) => *n as u32,
        Value::Int64(n) => *n as u32,
        Value::UInt32(n) => *n,
        Value::UInt64(n) => *n as u32,
        _ => return Err(mismatch(op, left, right)),
    };
    let left_shift = op == OpCode::Shl;
    Ok(match left {
        Value::Int32(a) if left_shift => Value::Int32(a.wrapping_shl(count)),
        Value::Int32(a) => Value::Int32(a.wrapping_shr(count)),
        Value::Int64(a) if left_shift => Value::Int64(a.wrapping_shl(count)),
        Value::Int64(a) => Value::Int64(a.wrapping_shr(count)),
        Value::UInt32(a) if left_shift => Value::UInt32(a.wrapping_shl(count)),
        Value::UInt32(a) => Value::UInt32(a.wrapping_shr(count)),
        Value::UInt64(a) if left_shift => Value::UInt64(a.wrapping_shl(count)),
        Value::UInt64(a) => Value::UInt64(a.wrapping_shr(count)),
        _ => return Err(mismatch(op, left, right)),
    })
}

/// `Neg`, `Not` and `BitNot`.
pub(super) fn unary(op: OpCode, operand: &Value) -> Result<Value> {
    Ok(match (op, operand) {
        (OpCode::Neg, Value::Int32(a)) => Value::Int32(a.wrapping_neg()),
        (OpCode::Neg, Value::Int64(a)) => Value::Int64(a.wrapping_neg()),
        (OpCode::Neg, Value::Float32(a)) => Value::Float32(-a),
        (OpCode::Neg, Value::Float64(a)) => Value::Float64(-a),
        (OpCode::Not, Value::Bool(b)) => Value::Bool(!b),
        (OpCode::BitNot, Value::Int32(a)) => Value::Int32(!a),
        (OpCode::BitNot, Value::Int64(a)) => Value::Int64(!a),
        (OpCode::BitNot, Value::UInt32(a)) => Value::UInt32(!a),
        (OpCode::BitNot, Value::UInt64(a)) => Value::UInt64(!a),
        _ => return Err(unary_mismatch(op, operand)),
    })
}

/// `Lt` and `Gt`.
pub(super) fn compare(op: OpCode, left: &Value, right: &Value) -> Result<bool> {
    let ordering = match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => a.partial_cmp(b),
        (Value::Int64(a), Value::Int64(b)) => a.partial_cmp(b),
        (Value::UInt32(a), Value::UInt32(b)) => a.partial_cmp(b),
        (Value::UInt64(a), Value::UInt64(b)) => a.partial_cmp(b),
        (Value::Float32(a), Value::Float32(b)) => a.partial_cmp(b),
        (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => a.partial_cmp(b),
        _ => return Err(mismatch(op, left, right)),
    };
    // NaN compares false either way
    Ok(match op {
        OpCode::Lt => ordering == Some(Ordering::Less),
        OpCode::Gt => ordering == Some(Ordering::Greater),
        _ => return Err(mismatch(op, left, right)),
    })
}

enum Number {
    Integer(i128),
    Float(f64),
}

/// Unchecked numeric conversion: integers truncate, floats saturate.
pub(crate) fn convert(value: &Value, target: NumericKind) -> Result<Value> {
    let number = match value {
        Value::Int32(v) => Number::Integer(i128::from(*v)),
        Value::Int64(v) => Number::Integer(i128::from(*v)),
        Value::UInt32(v) => Number::Integer(i128::from(*v)),
        Value::UInt64(v) => Number::Integer(i128::from(*v)),
        Value::Float32(v) => Number::Float(f64::from(*v)),
        Value::Float64(v) => Number::Float(*v),
        other => return Err(unary_mismatch(OpCode::Convert, other)),
    };

    Ok(match (number, target) {
        (Number::Integer(v), NumericKind::Int32) => Value::Int32(v as i32),
        (Number::Integer(v), NumericKind::Int64) => Value::Int64(v as i64),
        (Number::Integer(v), NumericKind::UInt32) => Value::UInt32(v as u32),
        (Number::Integer(v), NumericKind::UInt64) => Value::UInt64(v as u64),
        (Number::Integer(v), NumericKind::Float32) => Value::Float32(v as f32),
        (Number::Integer(v), NumericKind::Float64) => Value::Float64(v as f64),
        (Number::Float(v), NumericKind::Int32) => Value::Int32(v as i32),
        (Number::Float(v), NumericKind::Int64) => Value::Int64(v as i64),
        (Number::Float(v), NumericKind::UInt32) => Value::UInt32(v as u32),
        (Number::Float(v), NumericKind::UInt64) => Value::UInt64(v as u64),
        (Number::Float(v), NumericKind::Float32) => Value::Float32(v as f32),
        (Number::Float(v), NumericKind::Float64) => Value::Float64(v),
    })
}
