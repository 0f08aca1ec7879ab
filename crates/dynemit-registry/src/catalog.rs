//! The type catalog: registered host types and resolution of front-end
//! descriptors against them.
//!
//! The registered set is fixed at construction. Closed generic types
//! (including arrays) and closed generic methods are created on demand and
//! cached in concurrent maps, so a shared catalog can serve concurrent
//! compilations.

use crate::delegates::DelegateFamilies;
use crate::entries::{
    CONSTRUCTOR_NAME, FieldEntry, HostType, MemberFlags, MethodEntry, MethodImpl, PropertyEntry, TypeFlags, TypeRef,
    generic_key,
};
use crate::module::{Module, TypeDef};
use crate::system;
use dashmap::DashMap;
use dynemit_core::{
    CompilationError, FunctionSignature, MethodSymbol, RegistrationError, TypeDescriptor, TypeHash, Value, primitives,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

pub struct TypeCatalog {
    types: FxHashMap<TypeHash, Arc<HostType>>,
    names: FxHashMap<String, TypeHash>,
    methods: FxHashMap<TypeHash, Arc<MethodEntry>>,
    fields: FxHashMap<TypeHash, Arc<FieldEntry>>,
    properties: FxHashMap<TypeHash, Arc<PropertyEntry>>,
    instances: DashMap<TypeHash, Arc<HostType>>,
    closed_methods: DashMap<TypeHash, Arc<MethodEntry>>,
    delegates: DelegateFamilies,
}

impl std::fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("types", &self.types.len())
            .field("instances", &self.instances.len())
            .finish_non_exhaustive()
    }
}

impl TypeCatalog {
    /// Build a catalog from the `system` module plus `modules`.
    pub fn new(modules: impl IntoIterator<Item = Module>) -> Result<Self, RegistrationError> {
        let mut defs: Vec<TypeDef> = system::module().into_types();
        for module in modules {
            debug!(module = module.name(), types = module.types().len(), "registering reference module");
            defs.extend(module.into_types());
        }

        let mut names = FxHashMap::default();
        for def in &defs {
            if names.insert(def.key(), def.hash()).is_some() {
                return Err(RegistrationError::DuplicateType { name: def.key() });
            }
        }

        let mut catalog = Self {
            types: FxHashMap::default(),
            names,
            methods: FxHashMap::default(),
            fields: FxHashMap::default(),
            properties: FxHashMap::default(),
            instances: DashMap::new(),
            closed_methods: DashMap::new(),
            delegates: DelegateFamilies::standard(),
        };
        for def in defs {
            catalog.register(def)?;
        }
        Ok(catalog)
    }

    fn register(&mut self, def: TypeDef) -> Result<(), RegistrationError> {
        let key = def.key();
        let owner = def.hash();
        let base = match &def.base {
            Some(base) => Some(*self.names.get(base).ok_or_else(|| RegistrationError::TypeNotFound {
                name: base.clone(),
                referenced_by: key.clone(),
            })?),
            None => None,
        };
        if def.flags.contains(TypeFlags::DELEGATE) && def.invoke.is_none() {
            return Err(RegistrationError::InvalidType {
                name: key,
                reason: "delegate without invoke signature".into(),
            });
        }
        let duplicate = |member: &str| RegistrationError::DuplicateMember {
            type_name: key.clone(),
            member: member.to_string(),
        };

        let mut constructors = Vec::new();
        for (params, native) in def.constructors {
            let param_hashes: Vec<TypeHash> = params.iter().map(TypeRef::signature_hash).collect();
            let hash = TypeHash::from_constructor(owner, &param_hashes);
            let entry = Arc::new(MethodEntry {
                hash,
                name: CONSTRUCTOR_NAME.into(),
                owner,
                flags: MemberFlags::empty(),
                params,
                return_type: TypeRef::of(owner),
                generic_params: Vec::new(),
                definition: None,
                type_args: Vec::new(),
                implementation: MethodImpl::Native(native),
            });
            if self.methods.insert(hash, Arc::clone(&entry)).is_some() {
                return Err(duplicate(CONSTRUCTOR_NAME));
            }
            constructors.push(entry);
        }

        let mut methods = Vec::new();
        for registration in def.methods {
            let method = registration.def;
            let param_hashes: Vec<TypeHash> = method.params.iter().map(TypeRef::signature_hash).collect();
            let hash = TypeHash::from_method(owner, &method.name, &param_hashes);
            let implementation = registration.native.map_or(MethodImpl::DelegateInvoke, MethodImpl::Native);
            let entry = Arc::new(MethodEntry {
                hash,
                name: method.name,
                owner,
                flags: method.flags,
                params: method.params,
                return_type: method.return_type,
                generic_params: method.generic_params,
                definition: None,
                type_args: Vec::new(),
                implementation,
            });
            if self.methods.insert(hash, Arc::clone(&entry)).is_some() {
                return Err(duplicate(&entry.name));
            }
            methods.push(entry);
        }

        let mut fields = Vec::new();
        for field in def.fields {
            let hash = TypeHash::from_member(owner, &field.name);
            let entry = Arc::new(FieldEntry {
                hash,
                name: field.name,
                owner,
                ty: field.ty,
                getter: field.getter,
                setter: field.setter,
            });
            if self.fields.insert(hash, Arc::clone(&entry)).is_some() {
                return Err(duplicate(&entry.name));
            }
            fields.push(entry);
        }

        let mut properties = Vec::new();
        for property in def.properties {
            let hash = TypeHash::from_member(owner, &property.name);
            if self.fields.contains_key(&hash) {
                return Err(duplicate(&property.name));
            }
            let entry = Arc::new(PropertyEntry {
                hash,
                name: property.name,
                owner,
                ty: property.ty,
                flags: property.flags,
                getter: property.getter,
                setter: property.setter,
            });
            if self.properties.insert(hash, Arc::clone(&entry)).is_some() {
                return Err(duplicate(&entry.name));
            }
            properties.push(entry);
        }

        let display_name = if def.array_rank > 0 {
            format!("T[{}]", ",".repeat(usize::from(def.array_rank) - 1))
        } else if def.generic_params.is_empty() {
            def.name.clone()
        } else {
            format!("{}<{}>", def.name, def.generic_params.join(", "))
        };

        let host = HostType {
            hash: owner,
            name: def.name,
            display_name,
            flags: def.flags,
            base,
            generic_params: def.generic_params,
            definition: None,
            type_args: Vec::new(),
            array_rank: def.array_rank,
            constructors,
            methods,
            fields,
            properties,
            invoke: def.invoke,
        };
        self.types.insert(owner, Arc::new(host));
        Ok(())
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// A registered type or a cached closed instance.
    pub fn get(&self, hash: TypeHash) -> Option<Arc<HostType>> {
        self.types
            .get(&hash)
            .cloned()
            .or_else(|| self.instances.get(&hash).map(|entry| Arc::clone(entry.value())))
    }

    pub fn contains(&self, hash: TypeHash) -> bool {
        self.types.contains_key(&hash) || self.instances.contains_key(&hash)
    }

    /// A registered type by registration key (`int`, `IEnumerable`1`).
    pub fn by_name(&self, key: &str) -> Option<TypeHash> {
        self.names.get(key).copied()
    }

    /// Every registered (non-instance) type.
    pub fn registered_types(&self) -> impl Iterator<Item = &Arc<HostType>> {
        self.types.values()
    }

    pub fn display_name(&self, hash: TypeHash) -> String {
        self.get(hash)
            .map_or_else(|| hash.to_string(), |ty| ty.display_name.clone())
    }

    pub fn delegates(&self) -> &DelegateFamilies {
        &self.delegates
    }

    /// A method or constructor by hash, registered or closed.
    pub fn method(&self, hash: TypeHash) -> Option<Arc<MethodEntry>> {
        self.methods
            .get(&hash)
            .cloned()
            .or_else(|| self.closed_methods.get(&hash).map(|entry| Arc::clone(entry.value())))
    }

    pub fn field(&self, hash: TypeHash) -> Option<Arc<FieldEntry>> {
        self.fields.get(&hash).cloned()
    }

    pub fn property(&self, hash: TypeHash) -> Option<Arc<PropertyEntry>> {
        self.properties.get(&hash).cloned()
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Bind a descriptor to a host type. Never fails; `None` when unknown.
    pub fn resolve(&self, descriptor: &TypeDescriptor) -> Option<TypeHash> {
        match descriptor {
            TypeDescriptor::Void => Some(primitives::VOID),
            TypeDescriptor::GenericParameter { .. } => None,
            TypeDescriptor::Named { name, type_args } if type_args.is_empty() => self.by_name(name),
            TypeDescriptor::Named { name, type_args } => {
                let definition = self.by_name(&generic_key(name, type_args.len()))?;
                let args = type_args
                    .iter()
                    .map(|arg| self.resolve(arg))
                    .collect::<Option<Vec<_>>>()?;
                self.close_generic(definition, &args)
            }
            TypeDescriptor::Array { element, rank } => {
                let element = self.resolve(element)?;
                self.close_array(element, *rank)
            }
        }
    }

    /// Like [`resolve`](Self::resolve), failing with the descriptor's display name.
    pub fn resolve_or_fail(&self, descriptor: &TypeDescriptor) -> Result<TypeHash, CompilationError> {
        self.resolve(descriptor)
            .ok_or_else(|| CompilationError::unresolved_type(descriptor))
    }

    /// The delegate type matching a method's arity and return shape.
    pub fn resolve_function_type(&self, method: &MethodSymbol) -> Option<TypeHash> {
        let mut args = method
            .parameters
            .iter()
            .map(|p| self.resolve(&p.ty))
            .collect::<Option<Vec<_>>>()?;
        let arity = args.len();
        if method.return_type.is_void() {
            let definition = self.delegates.proc(arity)?;
            if arity == 0 {
                return Some(definition);
            }
            self.close_generic(definition, &args)
        } else {
            args.push(self.resolve(&method.return_type)?);
            let definition = self.delegates.func(arity)?;
            self.close_generic(definition, &args)
        }
    }

    /// Close a generic definition over `args`, creating the instance on first use.
    pub fn close_generic(&self, definition: TypeHash, args: &[TypeHash]) -> Option<TypeHash> {
        let def = self.types.get(&definition)?;
        if !def.is_generic_definition() || def.generic_params.len() != args.len() {
            return None;
        }
        let hash = TypeHash::from_instance(definition, args);
        if self.instances.contains_key(&hash) {
            return Some(hash);
        }

        let arg_names: Vec<String> = args.iter().map(|a| self.display_name(*a)).collect();
        let display_name = if def.flags.contains(TypeFlags::ARRAY) {
            format!("{}[{}]", arg_names[0], ",".repeat(usize::from(def.array_rank).saturating_sub(1)))
        } else {
            format!("{}<{}>", def.name, arg_names.join(", "))
        };
        let mut flags = def.flags;
        flags.remove(TypeFlags::GENERIC_DEFINITION);
        let instance = HostType {
            hash,
            name: def.name.clone(),
            display_name,
            flags,
            base: def.base,
            generic_params: Vec::new(),
            definition: Some(definition),
            type_args: args.to_vec(),
            array_rank: def.array_rank,
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            invoke: None,
        };
        self.instances.entry(hash).or_insert_with(|| Arc::new(instance));
        Some(hash)
    }

    pub fn close_array(&self, element: TypeHash, rank: u8) -> Option<TypeHash> {
        let definition = self.by_name(&format!("array`{rank}"))?;
        self.close_generic(definition, &[element])
    }

    /// Hash of the closed type denoted by `ty`, creating instances as needed.
    pub fn materialize(&self, ty: &TypeRef) -> Option<TypeHash> {
        match ty {
            TypeRef::Void => Some(primitives::VOID),
            TypeRef::Concrete(hash) => Some(*hash),
            TypeRef::TypeParam(_) | TypeRef::MethodParam(_) => None,
            TypeRef::Generic { definition, args } => {
                let args = args.iter().map(|a| self.materialize(a)).collect::<Option<Vec<_>>>()?;
                self.close_generic(*definition, &args)
            }
        }
    }

    /// Generic definition of a closed instance: one level of peeling.
    pub fn peel(&self, hash: TypeHash) -> Option<TypeHash> {
        self.get(hash)?.definition
    }

    pub fn is_closed_generic(&self, hash: TypeHash) -> bool {
        self.get(hash).is_some_and(|ty| ty.is_closed_instance())
    }

    /// Invoke signature of a (closed) delegate type.
    pub fn delegate_signature(&self, hash: TypeHash) -> Option<FunctionSignature> {
        let (decl, type_args) = self.declaring(hash)?;
        let invoke = decl.invoke.as_ref()?;
        let params = invoke
            .params
            .iter()
            .map(|p| self.materialize(&p.substitute(&type_args, &[])))
            .collect::<Option<Vec<_>>>()?;
        let return_type = invoke.return_type.substitute(&type_args, &[]);
        let return_type = if return_type.is_void() {
            None
        } else {
            Some(self.materialize(&return_type)?)
        };
        Some(FunctionSignature::new(params, return_type))
    }

    /// The type that declares members for `hash`, with the type arguments to
    /// substitute into them.
    fn declaring(&self, hash: TypeHash) -> Option<(Arc<HostType>, Vec<TypeHash>)> {
        let ty = self.get(hash)?;
        match ty.definition {
            Some(definition) => Some((self.get(definition)?, ty.type_args.clone())),
            None => Some((ty, Vec::new())),
        }
    }

    /// Default value of a local or array element of type `hash`.
    pub fn default_value(&self, hash: TypeHash) -> Value {
        match hash {
            h if h == primitives::BOOL => Value::Bool(false),
            h if h == primitives::INT32 => Value::Int32(0),
            h if h == primitives::INT64 => Value::Int64(0),
            h if h == primitives::UINT32 => Value::UInt32(0),
            h if h == primitives::UINT64 => Value::UInt64(0),
            h if h == primitives::FLOAT => Value::Float32(0.0),
            h if h == primitives::DOUBLE => Value::Float64(0.0),
            h if h == primitives::VOID => Value::Void,
            _ => Value::Null,
        }
    }

    /// Whether a member of type `hash` may be left without a value.
    pub fn admits_null(&self, hash: TypeHash) -> bool {
        self.get(hash).is_some_and(|ty| ty.admits_null())
    }

    // ========================================================================
    // Members
    // ========================================================================

    /// Base-first chain from `hash` upwards: each declaring type with its type arguments.
    fn hierarchy(&self, hash: TypeHash) -> Vec<(Arc<HostType>, Vec<TypeHash>)> {
        let mut chain = Vec::new();
        let mut current = Some(hash);
        while let Some(h) = current {
            let Some((decl, args)) = self.declaring(h) else {
                break;
            };
            current = decl.base;
            chain.push((decl, args));
        }
        chain
    }

    /// Methods named `name` on `owner` and its bases, most derived first,
    /// with type-level generic parameters substituted.
    pub fn methods_named(&self, owner: TypeHash, name: &str) -> Vec<crate::overload::Candidate> {
        self.hierarchy(owner)
            .into_iter()
            .flat_map(|(decl, args)| {
                decl.methods
                    .iter()
                    .filter(|m| m.name == name)
                    .map(|m| crate::overload::Candidate {
                        params: m.params.iter().map(|p| p.substitute(&args, &[])).collect(),
                        method: Arc::clone(m),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn constructors(&self, owner: TypeHash) -> Vec<crate::overload::Candidate> {
        let Some((decl, args)) = self.declaring(owner) else {
            return Vec::new();
        };
        decl.constructors
            .iter()
            .map(|c| crate::overload::Candidate {
                params: c.params.iter().map(|p| p.substitute(&args, &[])).collect(),
                method: Arc::clone(c),
            })
            .collect()
    }

    pub fn find_field(&self, owner: TypeHash, name: &str) -> Option<Arc<FieldEntry>> {
        self.hierarchy(owner)
            .into_iter()
            .find_map(|(decl, _)| decl.fields.iter().find(|f| f.name == name).cloned())
    }

    pub fn find_property(&self, owner: TypeHash, name: &str) -> Option<Arc<PropertyEntry>> {
        self.hierarchy(owner)
            .into_iter()
            .find_map(|(decl, _)| decl.properties.iter().find(|p| p.name == name).cloned())
    }

    /// Most derived override of `method` visible from `runtime_type`.
    pub fn resolve_override(&self, runtime_type: TypeHash, method: &Arc<MethodEntry>) -> Arc<MethodEntry> {
        let signature: Vec<TypeHash> = method.params.iter().map(TypeRef::signature_hash).collect();
        self.hierarchy(runtime_type)
            .into_iter()
            .find_map(|(decl, _)| {
                decl.methods
                    .iter()
                    .find(|m| {
                        m.name == method.name
                            && m.params.iter().map(TypeRef::signature_hash).eq(signature.iter().copied())
                    })
                    .cloned()
            })
            .unwrap_or_else(|| Arc::clone(method))
    }

    /// Most derived property named like `property` visible from `runtime_type`.
    pub fn resolve_property_override(&self, runtime_type: TypeHash, property: &Arc<PropertyEntry>) -> Arc<PropertyEntry> {
        self.find_property(runtime_type, &property.name)
            .unwrap_or_else(|| Arc::clone(property))
    }

    /// Close a generic method over explicit type arguments. Non-generic
    /// methods are returned as-is when no arguments are given.
    pub fn close_method(&self, method: &Arc<MethodEntry>, type_args: &[TypeHash]) -> Option<Arc<MethodEntry>> {
        if type_args.is_empty() {
            return Some(Arc::clone(method));
        }
        if method.generic_params.len() != type_args.len() {
            return None;
        }
        let hash = TypeHash::from_closed_method(method.hash, type_args);
        if let Some(closed) = self.closed_methods.get(&hash) {
            return Some(Arc::clone(closed.value()));
        }
        let closed = MethodEntry {
            hash,
            name: method.name.clone(),
            owner: method.owner,
            flags: method.flags,
            params: method.params.iter().map(|p| p.substitute(&[], type_args)).collect(),
            return_type: method.return_type.substitute(&[], type_args),
            generic_params: Vec::new(),
            definition: Some(method.hash),
            type_args: type_args.to_vec(),
            implementation: method.implementation.clone(),
        };
        let entry = self.closed_methods.entry(hash).or_insert_with(|| Arc::new(closed));
        Some(Arc::clone(entry.value()))
    }
}
