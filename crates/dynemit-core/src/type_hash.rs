//! Deterministic hash-based identity for host types and members.
//!
//! [`TypeHash`] is a 64-bit hash computed from names and signatures, so the
//! same type or member always receives the same identity regardless of
//! registration order. Closed generic instantiations hash their definition
//! together with their type arguments, which lets the catalog create them on
//! demand and still find them again by hash.
//!
//! # Examples
//!
//! ```
//! use dynemit_core::TypeHash;
//!
//! let int = TypeHash::from_name("int");
//! assert_eq!(int, dynemit_core::primitives::INT32);
//!
//! let list = TypeHash::from_name("List`1");
//! let list_int = TypeHash::from_instance(list, &[int]);
//! assert_ne!(list, list_int);
//! ```

use std::fmt;
use xxhash_rust::const_xxh64::xxh64 as const_xxh64;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants.
///
/// Different entity kinds (types, methods, constructors, members) produce
/// distinct hashes even when they share a name.
pub mod hash_constants {
    /// Separator constant used when folding parameter lists.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for type hashes.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for method hashes.
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for constructor hashes.
    pub const CONSTRUCTOR: u64 = 0x9a7f3d5e2b8c4601;

    /// Domain marker for field and property hashes.
    pub const MEMBER: u64 = 0x1a095090689d4647;

    /// Domain marker for closed method instantiations.
    pub const CLOSED_METHOD: u64 = 0x3e9f5d2a8c7b1403;

    /// Per-position mixing constants so parameter order matters.
    pub const PARAM_MARKERS: [u64; 16] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
        0x7c3e9f2a5b8d1403,
        0x5d8c7b4a3e9f2106,
        0x3f1e9d8c7b5a4203,
        0x1a2b3c4d5e6f7089,
        0x9f8e7d6c5b4a3210,
        0x2468ace013579bdf,
        0xfdb97531eca86420,
        0x123456789abcdef0,
    ];
}

/// A deterministic 64-bit hash identifying a type or member.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a registered type name.
    ///
    /// Generic definitions are registered under `Name`N` where `N` is the
    /// number of generic parameters, so `Func`1` and `Func`2` never collide.
    #[inline]
    pub const fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ const_xxh64(name.as_bytes(), 0))
    }

    /// Hash of a closed generic instantiation of `definition`.
    #[inline]
    pub fn from_instance(definition: TypeHash, args: &[TypeHash]) -> Self {
        TypeHash(fold_params(definition.0, args))
    }

    /// Hash of the rank-specific array definition (`array`1` for `T[]`).
    #[inline]
    pub fn array_definition(rank: u8) -> Self {
        TypeHash::from_name(&format!("array`{rank}"))
    }

    /// Hash of a method from its owner, name and parameter types.
    #[inline]
    pub fn from_method(owner: TypeHash, name: &str, param_hashes: &[TypeHash]) -> Self {
        let seed = hash_constants::METHOD ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        TypeHash(fold_params(seed, param_hashes))
    }

    /// Hash of a constructor from its owner and parameter types.
    #[inline]
    pub fn from_constructor(owner: TypeHash, param_hashes: &[TypeHash]) -> Self {
        TypeHash(fold_params(hash_constants::CONSTRUCTOR ^ owner.0, param_hashes))
    }

    /// Hash of a generic method closed over `type_args`.
    #[inline]
    pub fn from_closed_method(definition: TypeHash, type_args: &[TypeHash]) -> Self {
        TypeHash(fold_params(hash_constants::CLOSED_METHOD ^ definition.0, type_args))
    }

    /// Hash of a field or property on `owner`.
    #[inline]
    pub fn from_member(owner: TypeHash, name: &str) -> Self {
        TypeHash(hash_constants::MEMBER ^ owner.0 ^ xxh64(name.as_bytes(), 0))
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

fn fold_params(seed: u64, params: &[TypeHash]) -> u64 {
    let mut hash = seed;
    for (i, param) in params.iter().enumerate() {
        let marker = hash_constants::PARAM_MARKERS
            .get(i)
            .copied()
            .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
        // wrapping_mul keeps the fold order-sensitive
        hash = hash.wrapping_mul(hash_constants::SEP).wrapping_add(marker ^ param.0);
    }
    hash
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Well-known hashes for the built-in types of the `system` module.
pub mod primitives {
    use super::TypeHash;

    pub const VOID: TypeHash = TypeHash::from_name("void");
    pub const BOOL: TypeHash = TypeHash::from_name("bool");
    /// 32-bit signed integer.
    pub const INT32: TypeHash = TypeHash::from_name("int");
    pub const INT64: TypeHash = TypeHash::from_name("int64");
    /// 32-bit unsigned integer.
    pub const UINT32: TypeHash = TypeHash::from_name("uint");
    pub const UINT64: TypeHash = TypeHash::from_name("uint64");
    /// 32-bit float.
    pub const FLOAT: TypeHash = TypeHash::from_name("float");
    pub const DOUBLE: TypeHash = TypeHash::from_name("double");
    pub const STRING: TypeHash = TypeHash::from_name("string");
    /// Root of every reference type.
    pub const OBJECT: TypeHash = TypeHash::from_name("object");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_hash_determinism() {
        assert_eq!(TypeHash::from_name("Point"), TypeHash::from_name("Point"));
        assert_ne!(TypeHash::from_name("Point"), TypeHash::from_name("Shape"));
    }

    #[test]
    fn primitives_match_runtime_names() {
        assert_eq!(primitives::INT32, TypeHash::from_name("int"));
        assert_eq!(primitives::STRING, TypeHash::from_name("string"));
        assert_eq!(primitives::VOID, TypeHash::from_name("void"));
    }

    #[test]
    fn const_and_runtime_hashers_agree() {
        let name = "IEnumerable`1";
        let runtime = hash_constants::TYPE ^ xxh64(name.as_bytes(), 0);
        assert_eq!(TypeHash::from_name(name).0, runtime);
    }

    #[test]
    fn instance_hash_depends_on_argument_order() {
        let def = TypeHash::from_name("Func`2");
        let a = TypeHash::from_instance(def, &[primitives::INT32, primitives::STRING]);
        let b = TypeHash::from_instance(def, &[primitives::STRING, primitives::INT32]);
        assert_ne!(a, b);
        assert_eq!(a, TypeHash::from_instance(def, &[primitives::INT32, primitives::STRING]));
    }

    #[test]
    fn method_hash_distinguishes_overloads() {
        let owner = TypeHash::from_name("Sequence");
        let a = TypeHash::from_method(owner, "Sum", &[primitives::INT32]);
        let b = TypeHash::from_method(owner, "Sum", &[primitives::DOUBLE]);
        assert_ne!(a, b);
        assert_ne!(a, TypeHash::from_constructor(owner, &[primitives::INT32]));
    }

    #[test]
    fn member_hash_is_owner_scoped() {
        let a = TypeHash::from_member(TypeHash::from_name("Point"), "X");
        let b = TypeHash::from_member(TypeHash::from_name("Size"), "X");
        assert_ne!(a, b);
    }

    #[test]
    fn array_definitions_are_rank_specific() {
        assert_ne!(TypeHash::array_definition(1), TypeHash::array_definition(2));
    }
}
