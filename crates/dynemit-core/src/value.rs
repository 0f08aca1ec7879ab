//! Runtime values of the host environment.
//!
//! Primitive values are stored inline. Arrays, host objects and function
//! values are shared references: cloning a [`Value`] clones the reference, and
//! equality on them is reference identity. Host objects of value types carry a
//! payload copier; [`Value::copied`] duplicates them when they are stored.

use crate::error::RuntimeError;
use crate::function::FunctionValue;
use crate::operation::ConstantValue;
use crate::type_hash::{TypeHash, primitives};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};

/// A runtime value.
#[derive(Clone, Default)]
pub enum Value {
    /// No value (result of a void call).
    #[default]
    Void,
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Arc<FunctionValue>),
}

impl Value {
    /// Wrap `value` in a new host object of runtime type `type_hash`.
    pub fn object<T: Any + Send + Sync>(type_hash: TypeHash, value: T) -> Self {
        Value::Object(ObjectRef::new(type_hash, value))
    }

    /// Wrap `value` in a host object with copy-on-store semantics.
    pub fn value_object<T: Any + Send + Sync + Clone>(type_hash: TypeHash, value: T) -> Self {
        Value::Object(ObjectRef::with_copier(type_hash, value, Some(copy_payload::<T>)))
    }

    /// The value as stored into a slot: value-type objects are duplicated,
    /// everything else is shared.
    pub fn copied(&self) -> Result<Value, RuntimeError> {
        match self {
            Value::Object(object) if object.is_value() => Ok(Value::Object(object.copy()?)),
            other => Ok(other.clone()),
        }
    }

    /// Runtime value of a front-end constant. `None` for constant kinds the
    /// host has no representation for.
    pub fn from_constant(constant: &ConstantValue) -> Option<Self> {
        Some(match constant {
            ConstantValue::Null => Value::Null,
            ConstantValue::Bool(v) => Value::Bool(*v),
            ConstantValue::Int32(v) => Value::Int32(*v),
            ConstantValue::Int64(v) => Value::Int64(*v),
            ConstantValue::UInt32(v) => Value::UInt32(*v),
            ConstantValue::UInt64(v) => Value::UInt64(*v),
            ConstantValue::Float32(v) => Value::Float32(*v),
            ConstantValue::Float64(v) => Value::Float64(*v),
            ConstantValue::String(v) => Value::String(v.clone()),
            ConstantValue::Char(_) | ConstantValue::Decimal(..) => return None,
        })
    }

    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int",
            Value::Int64(_) => "int64",
            Value::UInt32(_) => "uint",
            Value::UInt64(_) => "uint64",
            Value::Float32(_) => "float",
            Value::Float64(_) => "double",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Runtime type used for virtual dispatch. `None` for `void` and `null`.
    pub fn runtime_type(&self) -> Option<TypeHash> {
        Some(match self {
            Value::Void | Value::Null => return None,
            Value::Bool(_) => primitives::BOOL,
            Value::Int32(_) => primitives::INT32,
            Value::Int64(_) => primitives::INT64,
            Value::UInt32(_) => primitives::UINT32,
            Value::UInt64(_) => primitives::UINT64,
            Value::Float32(_) => primitives::FLOAT,
            Value::Float64(_) => primitives::DOUBLE,
            Value::String(_) => primitives::STRING,
            Value::Array(array) => array.type_hash(),
            Value::Object(object) => object.type_hash(),
            Value::Function(function) => function.delegate_type(),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    /// Elements of an array value, for natives consuming sequences.
    pub fn sequence_items(&self) -> Result<Vec<Value>, RuntimeError> {
        match self {
            Value::Array(array) => array.to_vec(),
            Value::Null => Err(RuntimeError::NullReference {
                context: "sequence enumeration".into(),
            }),
            other => Err(RuntimeError::TypeMismatch {
                expected: "sequence".into(),
                actual: other.kind_name().into(),
            }),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt32(a), Value::UInt32(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "Void"),
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int32(v) => write!(f, "Int32({v})"),
            Value::Int64(v) => write!(f, "Int64({v})"),
            Value::UInt32(v) => write!(f, "UInt32({v})"),
            Value::UInt64(v) => write!(f, "UInt64({v})"),
            Value::Float32(v) => write!(f, "Float32({v})"),
            Value::Float64(v) => write!(f, "Float64({v})"),
            Value::String(v) => write!(f, "String({v:?})"),
            Value::Array(a) => write!(f, "Array({}, {:?})", a.type_hash(), a.dimensions()),
            Value::Object(o) => write!(f, "Object({})", o.type_hash()),
            Value::Function(func) => write!(f, "Function({})", func.delegate_type()),
        }
    }
}

// ============================================================================
// Host objects
// ============================================================================

/// Duplicates the payload of a value-type object.
pub type PayloadCopier = fn(&(dyn Any + Send + Sync)) -> Option<Box<dyn Any + Send + Sync>>;

/// [`PayloadCopier`] for a `Clone` payload.
pub fn copy_payload<T: Any + Send + Sync + Clone>(payload: &(dyn Any + Send + Sync)) -> Option<Box<dyn Any + Send + Sync>> {
    payload
        .downcast_ref::<T>()
        .map(|value| Box::new(value.clone()) as Box<dyn Any + Send + Sync>)
}

struct ObjectCell {
    type_hash: TypeHash,
    copier: Option<PayloadCopier>,
    data: RwLock<Box<dyn Any + Send + Sync>>,
}

/// Shared reference to a host object.
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectCell>);

impl ObjectRef {
    pub fn new<T: Any + Send + Sync>(type_hash: TypeHash, value: T) -> Self {
        Self::with_copier(type_hash, value, None)
    }

    /// An object whose payload `copier` duplicates; `Some` makes it a value-type object.
    pub fn with_copier<T: Any + Send + Sync>(type_hash: TypeHash, value: T, copier: Option<PayloadCopier>) -> Self {
        ObjectRef(Arc::new(ObjectCell {
            type_hash,
            copier,
            data: RwLock::new(Box::new(value)),
        }))
    }

    /// Whether stores duplicate this object.
    pub fn is_value(&self) -> bool {
        self.0.copier.is_some()
    }

    /// A detached object with a copy of the payload. Reference objects are shared.
    pub fn copy(&self) -> Result<ObjectRef, RuntimeError> {
        let Some(copier) = self.0.copier else {
            return Ok(self.clone());
        };
        let data = self.with_any(copier)?.ok_or_else(|| RuntimeError::TypeMismatch {
            expected: "copyable payload".into(),
            actual: "host object of another type".into(),
        })?;
        Ok(ObjectRef(Arc::new(ObjectCell {
            type_hash: self.0.type_hash,
            copier: Some(copier),
            data: RwLock::new(data),
        })))
    }

    /// The object's runtime type.
    pub fn type_hash(&self) -> TypeHash {
        self.0.type_hash
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Borrow the payload as `T`.
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, RuntimeError> {
        self.with_any(|any| any.downcast_ref::<T>().map(f))?
            .ok_or_else(|| payload_mismatch::<T>())
    }

    /// Mutably borrow the payload as `T`.
    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, RuntimeError> {
        self.with_any_mut(|any| any.downcast_mut::<T>().map(f))?
            .ok_or_else(|| payload_mismatch::<T>())
    }

    pub fn with_any<R>(&self, f: impl FnOnce(&(dyn Any + Send + Sync)) -> R) -> Result<R, RuntimeError> {
        let guard = self.0.data.read().map_err(|_| RuntimeError::Poisoned)?;
        Ok(f(guard.as_ref()))
    }

    pub fn with_any_mut<R>(&self, f: impl FnOnce(&mut (dyn Any + Send + Sync)) -> R) -> Result<R, RuntimeError> {
        let mut guard = self.0.data.write().map_err(|_| RuntimeError::Poisoned)?;
        Ok(f(guard.as_mut()))
    }
}

fn payload_mismatch<T>() -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: std::any::type_name::<T>().into(),
        actual: "host object of another type".into(),
    }
}

// ============================================================================
// Arrays
// ============================================================================

struct ArrayCell {
    type_hash: TypeHash,
    element_type: TypeHash,
    dims: Vec<usize>,
    items: RwLock<Vec<Value>>,
}

/// Shared, mutable, rectangular array.
#[derive(Clone)]
pub struct ArrayRef(Arc<ArrayCell>);

impl ArrayRef {
    /// An array of the given dimensions with every element set to `fill`.
    pub fn new(element_type: TypeHash, dims: Vec<usize>, fill: Value) -> Result<Self, RuntimeError> {
        let failed = |dims: &[usize]| RuntimeError::AllocationFailed { dimensions: dims.to_vec() };
        let len = dims
            .iter()
            .try_fold(1usize, |len, &dim| len.checked_mul(dim))
            .ok_or_else(|| failed(&dims))?;
        let mut items = Vec::new();
        items.try_reserve_exact(len).map_err(|_| failed(&dims))?;
        for _ in 0..len {
            items.push(fill.copied()?);
        }
        Ok(Self::with_items(element_type, dims, items))
    }

    /// A single-dimension array holding `items`.
    pub fn from_vec(element_type: TypeHash, items: Vec<Value>) -> Self {
        let dims = vec![items.len()];
        Self::with_items(element_type, dims, items)
    }

    fn with_items(element_type: TypeHash, dims: Vec<usize>, items: Vec<Value>) -> Self {
        let rank = u8::try_from(dims.len()).unwrap_or(u8::MAX);
        let type_hash = TypeHash::from_instance(TypeHash::array_definition(rank), &[element_type]);
        ArrayRef(Arc::new(ArrayCell {
            type_hash,
            element_type,
            dims,
            items: RwLock::new(items),
        }))
    }

    /// Closed array type, e.g. the hash of `int[]`.
    pub fn type_hash(&self) -> TypeHash {
        self.0.type_hash
    }

    pub fn element_type(&self) -> TypeHash {
        self.0.element_type
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.0.dims
    }

    pub fn rank(&self) -> usize {
        self.0.dims.len()
    }

    pub fn len(&self) -> usize {
        self.0.dims.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Row-major offset of `indices`.
    fn offset(&self, indices: &[i64]) -> Result<usize, RuntimeError> {
        if indices.len() != self.0.dims.len() {
            return Err(RuntimeError::TypeMismatch {
                expected: format!("{} indices", self.0.dims.len()),
                actual: format!("{} indices", indices.len()),
            });
        }
        let mut offset = 0usize;
        for (&index, &dim) in indices.iter().zip(&self.0.dims) {
            let i = usize::try_from(index)
                .ok()
                .filter(|i| *i < dim)
                .ok_or(RuntimeError::IndexOutOfRange { index, length: dim })?;
            offset = offset * dim + i;
        }
        Ok(offset)
    }

    pub fn get(&self, indices: &[i64]) -> Result<Value, RuntimeError> {
        let offset = self.offset(indices)?;
        let items = self.0.items.read().map_err(|_| RuntimeError::Poisoned)?;
        Ok(items[offset].clone())
    }

    pub fn set(&self, indices: &[i64], value: Value) -> Result<(), RuntimeError> {
        let offset = self.offset(indices)?;
        let mut items = self.0.items.write().map_err(|_| RuntimeError::Poisoned)?;
        items[offset] = value;
        Ok(())
    }

    /// Snapshot of the elements in row-major order.
    pub fn to_vec(&self) -> Result<Vec<Value>, RuntimeError> {
        let items = self.0.items.read().map_err(|_| RuntimeError::Poisoned)?;
        Ok(items.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn object_payload_access() {
        let value = Value::object(TypeHash::from_name("Point"), Point { x: 0, y: 1 });
        let Value::Object(obj) = &value else {
            panic!("expected object");
        };
        obj.with_mut(|p: &mut Point| p.y = 2).unwrap();
        assert_eq!(obj.with(|p: &Point| p.clone()).unwrap(), Point { x: 0, y: 2 });
        assert!(obj.with(|_: &String| ()).is_err());
        assert_eq!(value.runtime_type(), Some(TypeHash::from_name("Point")));
    }

    #[test]
    fn reference_equality_for_shared_values() {
        let a = Value::object(TypeHash::from_name("Point"), Point { x: 0, y: 0 });
        let b = Value::object(TypeHash::from_name("Point"), Point { x: 0, y: 0 });
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(Value::String("a".into()), Value::String("a".into()));
    }

    #[test]
    fn rectangular_array_indexing() {
        let array = ArrayRef::new(primitives::INT32, vec![2, 3], Value::Int32(0)).unwrap();
        array.set(&[1, 2], Value::Int32(9)).unwrap();
        assert_eq!(array.get(&[1, 2]).unwrap(), Value::Int32(9));
        assert_eq!(array.len(), 6);
        assert!(matches!(
            array.get(&[2, 0]),
            Err(RuntimeError::IndexOutOfRange { index: 2, length: 2 })
        ));
        assert!(array.get(&[0]).is_err());
    }

    #[test]
    fn oversized_arrays_fail_to_allocate() {
        let huge = i32::MAX as usize;
        assert_eq!(
            ArrayRef::new(primitives::INT32, vec![huge, huge, huge], Value::Int32(0)).err(),
            Some(RuntimeError::AllocationFailed {
                dimensions: vec![huge, huge, huge],
            })
        );
        assert!(matches!(
            ArrayRef::new(primitives::INT32, vec![usize::MAX / 2], Value::Int32(0)),
            Err(RuntimeError::AllocationFailed { .. })
        ));
    }

    #[test]
    fn value_objects_copy_on_store() {
        let original = Value::value_object(TypeHash::from_name("Point"), Point { x: 0, y: 1 });
        let copy = original.copied().unwrap();
        assert_ne!(original, copy);

        let Value::Object(obj) = &copy else {
            panic!("expected object");
        };
        obj.with_mut(|p: &mut Point| p.y = 5).unwrap();
        let Value::Object(first) = &original else {
            panic!("expected object");
        };
        assert_eq!(first.with(|p: &Point| p.y).unwrap(), 1);
        assert_eq!(copy.runtime_type(), original.runtime_type());
    }

    #[test]
    fn reference_objects_stay_shared() {
        let shared = Value::object(TypeHash::from_name("Point"), Point { x: 0, y: 1 });
        assert_eq!(shared.copied().unwrap(), shared);
    }

    #[test]
    fn array_runtime_type_is_closed_array_instance() {
        let array = ArrayRef::from_vec(primitives::INT32, vec![Value::Int32(1)]);
        let expected = TypeHash::from_instance(TypeHash::array_definition(1), &[primitives::INT32]);
        assert_eq!(Value::Array(array).runtime_type(), Some(expected));
    }

    #[test]
    fn constants_map_to_values() {
        assert_eq!(Value::from_constant(&ConstantValue::Int32(4)), Some(Value::Int32(4)));
        assert_eq!(Value::from_constant(&ConstantValue::Char('a')), None);
    }
}
