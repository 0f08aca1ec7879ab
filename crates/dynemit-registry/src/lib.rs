//! Host type registration and resolution.
//!
//! Types are described with [`TypeBuilder`], grouped into [`Module`]s and
//! frozen into a [`TypeCatalog`]. The catalog resolves front-end
//! [`TypeDescriptor`](dynemit_core::TypeDescriptor)s, closes generic types and
//! methods on demand and scores overloads.

pub mod catalog;
pub mod delegates;
pub mod entries;
pub mod format;
pub mod module;
pub mod overload;
pub mod system;

pub use catalog::TypeCatalog;
pub use delegates::{DelegateFamilies, MAX_DELEGATE_ARITY};
pub use entries::{
    CONSTRUCTOR_NAME, FieldEntry, HostType, InvokeSignature, MemberFlags, MethodEntry, MethodImpl, PropertyEntry,
    TypeFlags, TypeRef, generic_key,
};
pub use format::format_value;
pub use module::{MethodDef, Module, TypeBuilder, TypeDef};
pub use overload::{Candidate, overload_compatible, overload_distance, select_overload};
pub use system::{
    APPEND_FORMATTED, APPEND_LITERAL, INTERPOLATED_TEXT_BUILDER, InterpolatedText, MAX_ARRAY_RANK, TO_STRING_AND_CLEAR,
};
