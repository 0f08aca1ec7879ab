//! Reference modules and the fluent type registration API.
//!
//! # Example
//!
//! ```ignore
//! let mut module = Module::new("geometry");
//! module.add(
//!     TypeBuilder::<Point>::value_type("Point")
//!         .constructor(vec![TypeRef::int(), TypeRef::int()], |ctx| {
//!             Ok(Point { x: ctx.arg(0)?, y: ctx.arg(1)? })
//!         })
//!         .field("X", TypeRef::int(), |p| p.x, |p, v| p.x = v)
//!         .property_rw("Y", TypeRef::int(), |p| p.y, |p, v| p.y = v)
//!         .build(),
//! );
//! ```

use crate::entries::{InvokeSignature, MemberFlags, TypeFlags, TypeRef, generic_key};
use dynemit_core::{
    CallContext, FromValue, IntoValue, NativeFn, ObjectRef, PayloadCopier, RuntimeError, TypeHash, Value, copy_payload,
};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// A named group of host type registrations.
#[derive(Debug, Default)]
pub struct Module {
    name: String,
    types: Vec<TypeDef>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add(&mut self, def: TypeDef) -> &mut Self {
        self.types.push(def);
        self
    }

    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    pub(crate) fn into_types(self) -> Vec<TypeDef> {
        self.types
    }
}

/// Signature and flags of a method being registered.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub(crate) name: String,
    pub(crate) params: Vec<TypeRef>,
    pub(crate) return_type: TypeRef,
    pub(crate) flags: MemberFlags,
    pub(crate) generic_params: Vec<String>,
}

impl MethodDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type: TypeRef::Void,
            flags: MemberFlags::empty(),
            generic_params: Vec::new(),
        }
    }

    pub fn param(mut self, ty: TypeRef) -> Self {
        self.params.push(ty);
        self
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.return_type = ty;
        self
    }

    pub fn static_(mut self) -> Self {
        self.flags |= MemberFlags::STATIC;
        self
    }

    pub fn virtual_(mut self) -> Self {
        self.flags |= MemberFlags::VIRTUAL;
        self
    }

    /// Declare method-level generic parameters, referenced as [`TypeRef::MethodParam`].
    pub fn generic(mut self, params: &[&str]) -> Self {
        self.generic_params = params.iter().map(|p| p.to_string()).collect();
        self
    }
}

pub(crate) struct MethodRegistration {
    pub def: MethodDef,
    pub native: Option<NativeFn>,
}

pub(crate) struct FieldRegistration {
    pub name: String,
    pub ty: TypeRef,
    pub getter: crate::entries::FieldGetter,
    pub setter: crate::entries::FieldSetter,
}

pub(crate) struct PropertyRegistration {
    pub name: String,
    pub ty: TypeRef,
    pub flags: MemberFlags,
    pub getter: Option<NativeFn>,
    pub setter: Option<NativeFn>,
}

/// A complete type registration, produced by [`TypeBuilder::build`].
pub struct TypeDef {
    pub(crate) name: String,
    pub(crate) flags: TypeFlags,
    pub(crate) base: Option<String>,
    pub(crate) generic_params: Vec<String>,
    pub(crate) array_rank: u8,
    pub(crate) constructors: Vec<(Vec<TypeRef>, NativeFn)>,
    pub(crate) methods: Vec<MethodRegistration>,
    pub(crate) fields: Vec<FieldRegistration>,
    pub(crate) properties: Vec<PropertyRegistration>,
    pub(crate) invoke: Option<InvokeSignature>,
}

impl TypeDef {
    fn new(name: impl Into<String>, flags: TypeFlags) -> Self {
        Self {
            name: name.into(),
            flags,
            base: None,
            generic_params: Vec::new(),
            array_rank: 0,
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            invoke: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registration key: the name plus generic arity, or `array`N` for
    /// the rank-N array definition.
    pub fn key(&self) -> String {
        if self.array_rank > 0 {
            format!("array`{}", self.array_rank)
        } else {
            generic_key(&self.name, self.generic_params.len())
        }
    }

    pub fn hash(&self) -> TypeHash {
        TypeHash::from_name(&self.key())
    }
}

impl std::fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.key())
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for one host type whose instances carry a `T` payload.
pub struct TypeBuilder<T> {
    def: TypeDef,
    copier: Option<PayloadCopier>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypeBuilder<T> {
    fn with_flags(name: impl Into<String>, flags: TypeFlags) -> Self {
        Self {
            def: TypeDef::new(name, flags),
            copier: None,
            _marker: PhantomData,
        }
    }

    pub fn abstract_(mut self) -> Self {
        self.def.flags.insert(TypeFlags::ABSTRACT);
        self.def.flags.remove(TypeFlags::SEALED);
        self
    }

    pub fn sealed(mut self) -> Self {
        self.def.flags |= TypeFlags::SEALED;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.def.flags |= TypeFlags::NULLABLE;
        self
    }

    /// Derive from a registered type, named by its registration key.
    pub fn base(mut self, name: impl Into<String>) -> Self {
        self.def.base = Some(name.into());
        self
    }

    /// Declare type-level generic parameters, referenced as [`TypeRef::TypeParam`].
    pub fn generic_params(mut self, params: &[&str]) -> Self {
        self.def.generic_params = params.iter().map(|p| p.to_string()).collect();
        self.def.flags |= TypeFlags::GENERIC_DEFINITION;
        self
    }

    /// Register a method backed by a raw native.
    pub fn method<F>(mut self, def: MethodDef, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        let id = TypeHash::from_name(&format!("{}::{}", self.def.key(), def.name));
        self.def.methods.push(MethodRegistration {
            def,
            native: Some(NativeFn::new(id, f)),
        });
        self
    }

    /// Register a static property backed by a raw getter.
    pub fn static_property<F>(mut self, name: impl Into<String>, ty: TypeRef, get: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        let name = name.into();
        let id = TypeHash::from_name(&format!("{}::get_{name}", self.def.key()));
        self.def.properties.push(PropertyRegistration {
            name,
            ty,
            flags: MemberFlags::STATIC,
            getter: Some(NativeFn::new(id, get)),
            setter: None,
        });
        self
    }

    pub fn build(self) -> TypeDef {
        self.def
    }
}

impl TypeBuilder<()> {
    /// A built-in primitive.
    pub fn primitive(name: impl Into<String>, value_type: bool) -> Self {
        let mut flags = TypeFlags::PRIMITIVE | TypeFlags::SEALED;
        if value_type {
            flags |= TypeFlags::VALUE_TYPE;
        }
        Self::with_flags(name, flags)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::with_flags(name, TypeFlags::INTERFACE | TypeFlags::ABSTRACT)
    }

    /// A static-only holder of host functions.
    pub fn static_class(name: impl Into<String>) -> Self {
        Self::with_flags(name, TypeFlags::ABSTRACT | TypeFlags::SEALED)
    }

    /// A delegate type; its invoke signature also becomes an `Invoke` method.
    pub fn delegate(name: impl Into<String>, params: Vec<TypeRef>, return_type: TypeRef) -> Self {
        let mut builder = Self::with_flags(name, TypeFlags::DELEGATE | TypeFlags::SEALED);
        builder.def.invoke = Some(InvokeSignature {
            params: params.clone(),
            return_type: return_type.clone(),
        });
        builder.def.methods.push(MethodRegistration {
            def: MethodDef {
                name: "Invoke".into(),
                params,
                return_type,
                flags: MemberFlags::empty(),
                generic_params: Vec::new(),
            },
            native: None,
        });
        builder
    }

    /// The rank-specific array definition.
    pub fn array_definition(rank: u8) -> Self {
        let mut builder = Self::with_flags("array", TypeFlags::ARRAY | TypeFlags::SEALED).generic_params(&["T"]);
        builder.def.array_rank = rank;
        builder
    }
}

impl<T: Any + Send + Sync + Clone> TypeBuilder<T> {
    /// A sealed value type; its instances are copied whenever they are stored.
    pub fn value_type(name: impl Into<String>) -> Self {
        let mut builder = Self::with_flags(name, TypeFlags::VALUE_TYPE | TypeFlags::SEALED);
        builder.copier = Some(copy_payload::<T>);
        builder
    }
}

impl<T: Any + Send + Sync> TypeBuilder<T> {
    pub fn class(name: impl Into<String>) -> Self {
        Self::with_flags(name, TypeFlags::empty())
    }

    /// Register a constructor returning the payload; the object is created
    /// with the runtime type the caller is constructing.
    pub fn constructor<F>(mut self, params: Vec<TypeRef>, f: F) -> Self
    where
        F: Fn(&CallContext<'_>) -> Result<T, RuntimeError> + Send + Sync + 'static,
    {
        let owner = self.def.name.clone();
        let copier = self.copier;
        let id = TypeHash::from_name(&format!("{owner}::.ctor/{}", params.len()));
        let native = NativeFn::new(id, move |ctx| {
            let ty = ctx.constructed_type().ok_or_else(|| RuntimeError::TypeMismatch {
                expected: format!("constructor call for {owner}"),
                actual: "plain call".into(),
            })?;
            let payload = f(ctx)?;
            ctx.set_return_value(Value::Object(ObjectRef::with_copier(ty, payload, copier)));
            Ok(())
        });
        self.def.constructors.push((params, native));
        self
    }

    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(Vec::new(), |_| Ok(T::default()))
    }

    /// Register a field with direct accessors.
    pub fn field<V, G, S>(mut self, name: impl Into<String>, ty: TypeRef, get: G, set: S) -> Self
    where
        V: FromValue + IntoValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let getter = Arc::new(move |obj: &ObjectRef| obj.with(|payload: &T| get(payload).into_value()));
        let setter = Arc::new(move |obj: &ObjectRef, value: Value| {
            let value = V::from_value(&value)?;
            obj.with_mut(|payload: &mut T| set(payload, value))
        });
        self.def.fields.push(FieldRegistration {
            name: name.into(),
            ty,
            getter,
            setter,
        });
        self
    }

    /// Register a read-only property.
    pub fn property<V, G>(self, name: impl Into<String>, ty: TypeRef, get: G) -> Self
    where
        V: IntoValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.push_property(name.into(), ty, MemberFlags::empty(), get, None)
    }

    /// Register a read-only property that derived types may override.
    pub fn virtual_property<V, G>(self, name: impl Into<String>, ty: TypeRef, get: G) -> Self
    where
        V: IntoValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.push_property(name.into(), ty, MemberFlags::VIRTUAL, get, None)
    }

    /// Register a read-write property.
    pub fn property_rw<V, G, S>(self, name: impl Into<String>, ty: TypeRef, get: G, set: S) -> Self
    where
        V: FromValue + IntoValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let name = name.into();
        let id = TypeHash::from_name(&format!("{}::set_{name}", self.def.key()));
        let setter = NativeFn::new(id, move |ctx| {
            let value: V = ctx.arg(0)?;
            ctx.with_this_mut(|payload: &mut T| set(payload, value))
        });
        self.push_property(name, ty, MemberFlags::empty(), get, Some(setter))
    }

    fn push_property<V, G>(mut self, name: String, ty: TypeRef, flags: MemberFlags, get: G, setter: Option<NativeFn>) -> Self
    where
        V: IntoValue + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        let id = TypeHash::from_name(&format!("{}::get_{name}", self.def.key()));
        let getter = NativeFn::new(id, move |ctx| {
            let value = ctx.with_this(|payload: &T| get(payload))?;
            ctx.set_return(value);
            Ok(())
        });
        self.def.properties.push(PropertyRegistration {
            name,
            ty,
            flags,
            getter: Some(getter),
            setter,
        });
        self
    }
}
