//! Conversions between Rust values and runtime [`Value`]s.
//!
//! - [`FromValue`]: extract a Rust value (native arguments, typed results)
//! - [`IntoValue`]: wrap a Rust value (native returns, typed arguments)
//! - [`TypedValue`]: the catalog type a Rust primitive maps to
//!
//! Integer extraction accepts any integer variant whose value fits the
//! target type.

use crate::error::ConversionError;
use crate::function::FunctionValue;
use crate::type_hash::{TypeHash, primitives};
use crate::value::{ArrayRef, Value};
use std::sync::Arc;

pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ConversionError>;

    /// True only for `()`, the shape of a void result.
    fn is_void_shape() -> bool {
        false
    }
}

pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Catalog type of a Rust primitive.
pub trait TypedValue {
    const TYPE: TypeHash;
}

fn mismatch(expected: &'static str, value: &Value) -> ConversionError {
    ConversionError::TypeMismatch {
        expected,
        actual: value.kind_name(),
    }
}

fn integer(value: &Value) -> Option<i128> {
    match value {
        Value::Int32(v) => Some(i128::from(*v)),
        Value::Int64(v) => Some(i128::from(*v)),
        Value::UInt32(v) => Some(i128::from(*v)),
        Value::UInt64(v) => Some(i128::from(*v)),
        _ => None,
    }
}

// ============================================================================
// Integers
// ============================================================================

macro_rules! impl_integer {
    ($($ty:ty => $variant:ident, $hash:expr);* $(;)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, ConversionError> {
                    let wide = integer(value).ok_or_else(|| mismatch(stringify!($ty), value))?;
                    <$ty>::try_from(wide).map_err(|_| ConversionError::IntegerOverflow {
                        value: wide.to_string(),
                        target_type: stringify!($ty),
                    })
                }
            }

            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }

            impl TypedValue for $ty {
                const TYPE: TypeHash = $hash;
            }
        )*
    };
}

impl_integer! {
    i32 => Int32, primitives::INT32;
    i64 => Int64, primitives::INT64;
    u32 => UInt32, primitives::UINT32;
    u64 => UInt64, primitives::UINT64;
}

// ============================================================================
// Floats
// ============================================================================

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Float64(v) => Ok(*v),
            Value::Float32(v) => Ok(f64::from(*v)),
            other => integer(other)
                .map(|v| v as f64)
                .ok_or_else(|| mismatch("double", other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Float32(v) => Ok(*v),
            Value::Float64(v) => Ok(*v as f32),
            other => integer(other)
                .map(|v| v as f32)
                .ok_or_else(|| mismatch("float", other)),
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float64(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float32(self)
    }
}

impl TypedValue for f64 {
    const TYPE: TypeHash = primitives::DOUBLE;
}

impl TypedValue for f32 {
    const TYPE: TypeHash = primitives::FLOAT;
}

// ============================================================================
// Bool, strings, unit
// ============================================================================

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(v) => Ok(*v),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl TypedValue for bool {
    const TYPE: TypeHash = primitives::BOOL;
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::String(v) => Ok(v.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl TypedValue for String {
    const TYPE: TypeHash = primitives::STRING;
}

impl FromValue for () {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Void => Ok(()),
            other => Err(mismatch("void", other)),
        }
    }

    fn is_void_shape() -> bool {
        true
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Void
    }
}

// ============================================================================
// Pass-through, options, arrays, functions
// ============================================================================

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Array(array) => {
                let items = array.to_vec().map_err(|_| mismatch("array", value))?;
                items.iter().map(T::from_value).collect()
            }
            other => Err(mismatch("array", other)),
        }
    }
}

impl<T: IntoValue + TypedValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        let items = self.into_iter().map(IntoValue::into_value).collect();
        Value::Array(ArrayRef::from_vec(T::TYPE, items))
    }
}

impl FromValue for Arc<FunctionValue> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Function(function) => Ok(Arc::clone(function)),
            other => Err(mismatch("function", other)),
        }
    }
}

impl IntoValue for Arc<FunctionValue> {
    fn into_value(self) -> Value {
        Value::Function(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widening_and_overflow() {
        assert_eq!(i64::from_value(&Value::Int32(-3)).unwrap(), -3);
        assert_eq!(i32::from_value(&Value::UInt64(7)).unwrap(), 7);
        assert!(matches!(
            u32::from_value(&Value::Int32(-1)),
            Err(ConversionError::IntegerOverflow { .. })
        ));
        assert!(matches!(
            i32::from_value(&Value::Bool(true)),
            Err(ConversionError::TypeMismatch { expected: "i32", actual: "bool" })
        ));
    }

    #[test]
    fn floats_accept_integers() {
        assert_eq!(f64::from_value(&Value::Int32(2)).unwrap(), 2.0);
        assert_eq!(f32::from_value(&Value::Float64(1.5)).unwrap(), 1.5);
    }

    #[test]
    fn vectors_round_through_arrays() {
        let value = vec![1, 2, 3].into_value();
        let Value::Array(array) = &value else {
            panic!("expected array");
        };
        assert_eq!(array.element_type(), primitives::INT32);
        assert_eq!(Vec::<i32>::from_value(&value).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn unit_is_the_void_shape() {
        assert!(<()>::is_void_shape());
        assert!(!i32::is_void_shape());
        assert!(<()>::from_value(&Value::Int32(1)).is_err());
    }

    #[test]
    fn options_map_null() {
        assert_eq!(Option::<i32>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(Some(4).into_value(), Value::Int32(4));
    }
}
