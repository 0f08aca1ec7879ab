//! Catalog entries: host types and their members.

use bitflags::bitflags;
use dynemit_core::{NativeFn, ObjectRef, RuntimeError, TypeHash, Value, primitives};
use std::fmt;
use std::sync::Arc;

bitflags! {
    /// Kind and shape of a host type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u32 {
        const ABSTRACT = 1 << 0;
        const SEALED = 1 << 1;
        const VALUE_TYPE = 1 << 2;
        const INTERFACE = 1 << 3;
        const DELEGATE = 1 << 4;
        /// Value type that still admits an absent value.
        const NULLABLE = 1 << 5;
        const GENERIC_DEFINITION = 1 << 6;
        const ARRAY = 1 << 7;
        const PRIMITIVE = 1 << 8;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemberFlags: u8 {
        const STATIC = 1 << 0;
        const VIRTUAL = 1 << 1;
    }
}

/// A type as written in a member signature. Unlike a [`TypeHash`] it can
/// mention generic parameters of the declaring type or method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Void,
    Concrete(TypeHash),
    /// Generic parameter of the declaring type, by position.
    TypeParam(usize),
    /// Generic parameter of the method, by position.
    MethodParam(usize),
    /// A generic definition applied to arguments, open or closed.
    Generic { definition: TypeHash, args: Vec<TypeRef> },
}

impl TypeRef {
    /// A registered type by name; `"void"` maps to [`TypeRef::Void`].
    pub fn named(name: &str) -> Self {
        if name == "void" {
            TypeRef::Void
        } else {
            TypeRef::Concrete(TypeHash::from_name(name))
        }
    }

    pub fn of(hash: TypeHash) -> Self {
        if hash == primitives::VOID {
            TypeRef::Void
        } else {
            TypeRef::Concrete(hash)
        }
    }

    pub fn type_param(index: usize) -> Self {
        TypeRef::TypeParam(index)
    }

    pub fn method_param(index: usize) -> Self {
        TypeRef::MethodParam(index)
    }

    /// `name<args...>` where `name` is registered with `args.len()` parameters.
    pub fn generic(name: &str, args: Vec<TypeRef>) -> Self {
        TypeRef::Generic {
            definition: TypeHash::from_name(&generic_key(name, args.len())),
            args,
        }
    }

    /// `element[]`
    pub fn array(element: TypeRef) -> Self {
        TypeRef::Generic {
            definition: TypeHash::array_definition(1),
            args: vec![element],
        }
    }

    pub fn int() -> Self {
        TypeRef::Concrete(primitives::INT32)
    }

    pub fn int64() -> Self {
        TypeRef::Concrete(primitives::INT64)
    }

    pub fn double() -> Self {
        TypeRef::Concrete(primitives::DOUBLE)
    }

    pub fn bool() -> Self {
        TypeRef::Concrete(primitives::BOOL)
    }

    pub fn string() -> Self {
        TypeRef::Concrete(primitives::STRING)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    /// A bare generic parameter (`T`), not a type built from one.
    pub fn is_generic_param(&self) -> bool {
        matches!(self, TypeRef::TypeParam(_) | TypeRef::MethodParam(_))
    }

    pub fn contains_generic_params(&self) -> bool {
        match self {
            TypeRef::Void | TypeRef::Concrete(_) => false,
            TypeRef::TypeParam(_) | TypeRef::MethodParam(_) => true,
            TypeRef::Generic { args, .. } => args.iter().any(TypeRef::contains_generic_params),
        }
    }

    /// Hash of the closed type this reference denotes, `None` while open.
    pub fn closed_hash(&self) -> Option<TypeHash> {
        match self {
            TypeRef::Void => Some(primitives::VOID),
            TypeRef::Concrete(hash) => Some(*hash),
            TypeRef::TypeParam(_) | TypeRef::MethodParam(_) => None,
            TypeRef::Generic { definition, args } => {
                let args = args.iter().map(TypeRef::closed_hash).collect::<Option<Vec<_>>>()?;
                Some(TypeHash::from_instance(*definition, &args))
            }
        }
    }

    /// Identity used in member hashes. Open references hash by shape.
    pub fn signature_hash(&self) -> TypeHash {
        match self {
            TypeRef::TypeParam(i) => TypeHash::from_name(&format!("!{i}")),
            TypeRef::MethodParam(i) => TypeHash::from_name(&format!("!!{i}")),
            TypeRef::Generic { definition, args } => {
                let args: Vec<TypeHash> = args.iter().map(TypeRef::signature_hash).collect();
                TypeHash::from_instance(*definition, &args)
            }
            closed => closed.closed_hash().unwrap_or(TypeHash::EMPTY),
        }
    }

    /// Replace generic parameters with the given arguments where available.
    pub fn substitute(&self, type_args: &[TypeHash], method_args: &[TypeHash]) -> TypeRef {
        match self {
            TypeRef::TypeParam(i) => type_args.get(*i).map_or(self.clone(), |h| TypeRef::of(*h)),
            TypeRef::MethodParam(i) => method_args.get(*i).map_or(self.clone(), |h| TypeRef::of(*h)),
            TypeRef::Generic { definition, args } => TypeRef::Generic {
                definition: *definition,
                args: args.iter().map(|a| a.substitute(type_args, method_args)).collect(),
            },
            closed => closed.clone(),
        }
    }
}

/// Registration key of a type: `Name` or `Name`N` for generic definitions.
pub fn generic_key(name: &str, arity: usize) -> String {
    if arity == 0 {
        name.to_string()
    } else {
        format!("{name}`{arity}")
    }
}

/// How a method is executed.
#[derive(Debug, Clone)]
pub enum MethodImpl {
    Native(NativeFn),
    /// The `Invoke` method of a delegate type: calls the receiver function value.
    DelegateInvoke,
}

/// A registered method or constructor.
#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub hash: TypeHash,
    pub name: String,
    pub owner: TypeHash,
    pub flags: MemberFlags,
    pub params: Vec<TypeRef>,
    pub return_type: TypeRef,
    pub generic_params: Vec<String>,
    /// Generic method this one was closed from.
    pub definition: Option<TypeHash>,
    pub type_args: Vec<TypeHash>,
    pub implementation: MethodImpl,
}

impl MethodEntry {
    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    pub fn is_virtual(&self) -> bool {
        self.flags.contains(MemberFlags::VIRTUAL)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }

    pub fn is_generic_definition(&self) -> bool {
        !self.generic_params.is_empty()
    }
}

pub const CONSTRUCTOR_NAME: &str = ".ctor";

pub type FieldGetter = Arc<dyn Fn(&ObjectRef) -> Result<Value, RuntimeError> + Send + Sync>;
pub type FieldSetter = Arc<dyn Fn(&ObjectRef, Value) -> Result<(), RuntimeError> + Send + Sync>;

/// A field: direct accessors on the host object's payload.
#[derive(Clone)]
pub struct FieldEntry {
    pub hash: TypeHash,
    pub name: String,
    pub owner: TypeHash,
    pub ty: TypeRef,
    pub getter: FieldGetter,
    pub setter: FieldSetter,
}

impl fmt::Debug for FieldEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldEntry")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

/// A property: accessor natives called with the object as receiver.
#[derive(Debug, Clone)]
pub struct PropertyEntry {
    pub hash: TypeHash,
    pub name: String,
    pub owner: TypeHash,
    pub ty: TypeRef,
    pub flags: MemberFlags,
    pub getter: Option<NativeFn>,
    pub setter: Option<NativeFn>,
}

impl PropertyEntry {
    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    pub fn is_virtual(&self) -> bool {
        self.flags.contains(MemberFlags::VIRTUAL)
    }
}

/// Invoke signature of a delegate type.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeSignature {
    pub params: Vec<TypeRef>,
    pub return_type: TypeRef,
}

/// A host type: registered definition, non-generic type, or closed instance.
#[derive(Debug, Clone)]
pub struct HostType {
    pub hash: TypeHash,
    /// Name without generic arity, e.g. `IEnumerable`.
    pub name: String,
    /// Display form, e.g. `IEnumerable<int>` or `int[,]`.
    pub display_name: String,
    pub flags: TypeFlags,
    pub base: Option<TypeHash>,
    pub generic_params: Vec<String>,
    /// Generic definition of a closed instance.
    pub definition: Option<TypeHash>,
    pub type_args: Vec<TypeHash>,
    pub array_rank: u8,
    pub constructors: Vec<Arc<MethodEntry>>,
    pub methods: Vec<Arc<MethodEntry>>,
    pub fields: Vec<Arc<FieldEntry>>,
    pub properties: Vec<Arc<PropertyEntry>>,
    pub invoke: Option<InvokeSignature>,
}

impl HostType {
    pub fn is_generic_definition(&self) -> bool {
        self.flags.contains(TypeFlags::GENERIC_DEFINITION)
    }

    pub fn is_closed_instance(&self) -> bool {
        self.definition.is_some()
    }

    pub fn is_value_type(&self) -> bool {
        self.flags.contains(TypeFlags::VALUE_TYPE)
    }

    /// Reference types and nullable value types admit an absent value.
    pub fn admits_null(&self) -> bool {
        !self.is_value_type() || self.flags.contains(TypeFlags::NULLABLE)
    }

    /// Member access on this type goes through the runtime type.
    pub fn dispatches_virtually(&self) -> bool {
        self.flags.contains(TypeFlags::ABSTRACT) || !self.flags.contains(TypeFlags::SEALED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_generic_refs_hash_like_instances() {
        let closed = TypeRef::generic("IEnumerable", vec![TypeRef::int()]);
        let def = TypeHash::from_name("IEnumerable`1");
        assert_eq!(
            closed.closed_hash(),
            Some(TypeHash::from_instance(def, &[primitives::INT32]))
        );
        assert!(!closed.contains_generic_params());
    }

    #[test]
    fn open_refs_have_no_closed_hash() {
        let open = TypeRef::generic("IEnumerable", vec![TypeRef::method_param(0)]);
        assert!(open.contains_generic_params());
        assert!(!open.is_generic_param());
        assert_eq!(open.closed_hash(), None);
    }

    #[test]
    fn substitution_closes_parameters() {
        let open = TypeRef::generic("Func", vec![TypeRef::type_param(0), TypeRef::method_param(0)]);
        let closed = open.substitute(&[primitives::INT32], &[primitives::STRING]);
        assert_eq!(closed, TypeRef::generic("Func", vec![TypeRef::int(), TypeRef::string()]));
        let partial = open.substitute(&[primitives::INT32], &[]);
        assert!(partial.contains_generic_params());
    }

    #[test]
    fn signature_hash_distinguishes_parameter_kinds() {
        assert_ne!(
            TypeRef::type_param(0).signature_hash(),
            TypeRef::method_param(0).signature_hash()
        );
        assert_eq!(TypeRef::int().signature_hash(), primitives::INT32);
    }

    #[test]
    fn void_is_recognized_by_name_and_hash() {
        assert!(TypeRef::named("void").is_void());
        assert!(TypeRef::of(primitives::VOID).is_void());
    }
}
