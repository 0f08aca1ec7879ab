//! Constant pool.
//!
//! Stores the values bytecode instructions refer to by index: numeric and
//! text literals plus type and member hashes.

use dynemit_core::{TypeHash, Value};
use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;
use std::fmt;

/// Values stored in the constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    /// Type, method, field or property hash.
    Hash(TypeHash),
}

impl Constant {
    /// Runtime value pushed by a constant load. `None` for hashes.
    pub fn to_value(&self) -> Option<Value> {
        Some(match self {
            Constant::Int32(v) => Value::Int32(*v),
            Constant::Int64(v) => Value::Int64(*v),
            Constant::UInt32(v) => Value::UInt32(*v),
            Constant::UInt64(v) => Value::UInt64(*v),
            Constant::Float32(v) => Value::Float32(*v),
            Constant::Float64(v) => Value::Float64(*v),
            Constant::String(v) => Value::String(v.clone()),
            Constant::Hash(_) => return None,
        })
    }

    pub fn as_hash(&self) -> Option<TypeHash> {
        match self {
            Constant::Hash(hash) => Some(*hash),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int32(v) => write!(f, "{v}"),
            Constant::Int64(v) => write!(f, "{v}L"),
            Constant::UInt32(v) => write!(f, "{v}u"),
            Constant::UInt64(v) => write!(f, "{v}UL"),
            Constant::Float32(v) => write!(f, "{v}f"),
            Constant::Float64(v) => write!(f, "{v}d"),
            Constant::String(v) => write!(f, "{v:?}"),
            Constant::Hash(h) => write!(f, "{h}"),
        }
    }
}

/// Hashable form of [`Constant`] used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float32(OrderedFloat<f32>),
    Float64(OrderedFloat<f64>),
    String(String),
    Hash(TypeHash),
}

impl From<&Constant> for ConstantKey {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Int32(v) => ConstantKey::Int32(*v),
            Constant::Int64(v) => ConstantKey::Int64(*v),
            Constant::UInt32(v) => ConstantKey::UInt32(*v),
            Constant::UInt64(v) => ConstantKey::UInt64(*v),
            Constant::Float32(v) => ConstantKey::Float32(OrderedFloat(*v)),
            Constant::Float64(v) => ConstantKey::Float64(OrderedFloat(*v)),
            Constant::String(v) => ConstantKey::String(v.clone()),
            Constant::Hash(h) => ConstantKey::Hash(*h),
        }
    }
}

/// Deduplicating constant pool, one per compiled method.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    index: FxHashMap<ConstantKey, u32>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or get an existing constant, returning its index.
    pub fn add(&mut self, constant: Constant) -> u32 {
        let key = ConstantKey::from(&constant);
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.constants.len() as u32;
        self.constants.push(constant);
        self.index.insert(key, idx);
        idx
    }

    pub fn add_hash(&mut self, hash: TypeHash) -> u32 {
        self.add(Constant::Hash(hash))
    }

    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}
