//! Instance materialization.
//!
//! Builds a host object straight from an object-creation expression without
//! compiling a method: constructor arguments must be constants, and every
//! simple assignment below the creation applies a literal (or a value from
//! the installed [`FallbackHook`]) through a memoized per-member setter.

use crate::vm::arith;
use dashmap::DashMap;
use dynemit_compiler::NumericKind;
use dynemit_core::{
    CallContext, CompilationError, DynEmitError, Invoker, Operation, OperationKind, RuntimeError, TypeDescriptor, TypeHash,
    Value,
};
use dynemit_registry::{CONSTRUCTOR_NAME, MethodImpl, TypeCatalog, select_overload};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// An initializer assignment whose value is not a compile-time constant.
#[derive(Debug, Clone, Copy)]
pub struct UnknownAssignment<'a> {
    pub owner: TypeHash,
    pub type_name: &'a str,
    pub member: &'a str,
    pub member_type: TypeHash,
    /// The assigned expression.
    pub value: &'a Operation,
}

/// Supplies values for non-constant initializer assignments.
pub trait FallbackHook: Send + Sync {
    fn value_for(&self, assignment: &UnknownAssignment<'_>) -> Option<Value>;
}

impl<F> FallbackHook for F
where
    F: Fn(&UnknownAssignment<'_>) -> Option<Value> + Send + Sync,
{
    fn value_for(&self, assignment: &UnknownAssignment<'_>) -> Option<Value> {
        self(assignment)
    }
}

/// Setter cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeMemberKey {
    pub owner: TypeHash,
    pub member: String,
}

impl TypeMemberKey {
    pub fn new(owner: TypeHash, member: impl Into<String>) -> Self {
        Self {
            owner,
            member: member.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Property,
}

type ApplyFn = Box<dyn Fn(&Value, Value, &dyn Invoker) -> Result<(), RuntimeError> + Send + Sync>;

/// A member store specialized for one `(type, member)`.
pub struct CompiledSetter {
    pub kind: MemberKind,
    pub member_type: TypeHash,
    pub admits_null: bool,
    /// Numeric kind incoming values are coerced to.
    pub coerce: Option<NumericKind>,
    apply: ApplyFn,
}

impl fmt::Debug for CompiledSetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSetter")
            .field("kind", &self.kind)
            .field("member_type", &self.member_type)
            .field("admits_null", &self.admits_null)
            .field("coerce", &self.coerce)
            .finish_non_exhaustive()
    }
}

impl CompiledSetter {
    pub fn apply(&self, object: &Value, value: Value, invoker: &dyn Invoker) -> Result<(), RuntimeError> {
        let value = match self.coerce {
            Some(kind) if value_kind(&value).is_some_and(|k| k != kind) => arith::convert(&value, kind)?,
            _ => value,
        };
        (self.apply)(object, value, invoker)
    }
}

pub struct InstanceMaterializer {
    catalog: Arc<TypeCatalog>,
    setters: DashMap<TypeMemberKey, Arc<CompiledSetter>>,
    fallback: Option<Arc<dyn FallbackHook>>,
}

impl fmt::Debug for InstanceMaterializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceMaterializer")
            .field("cached_setters", &self.setters.len())
            .field("fallback", &self.fallback.is_some())
            .finish_non_exhaustive()
    }
}

impl InstanceMaterializer {
    pub fn new(catalog: Arc<TypeCatalog>, fallback: Option<Arc<dyn FallbackHook>>) -> Self {
        Self {
            catalog,
            setters: DashMap::new(),
            fallback,
        }
    }

    pub fn cached_setters(&self) -> usize {
        self.setters.len()
    }

    /// Construct `target` from `creation` and apply its initializer assignments.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn materialize(&self, target: TypeHash, creation: &Operation, invoker: &dyn Invoker) -> Result<Value, DynEmitError> {
        let OperationKind::ObjectCreation {
            constructor, arguments, ..
        } = &creation.kind
        else {
            return Err(CompilationError::InvalidSymbolShape {
                expected: "object creation".into(),
                found: creation.shape_name(),
            }
            .into());
        };

        let args = arguments
            .iter()
            .map(|arg| {
                arg.constant.as_ref().and_then(Value::from_constant).ok_or_else(|| {
                    CompilationError::unsupported(format!("non-constant constructor argument {}", arg.shape_name()))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let instance = self.construct(target, constructor.parameters.iter().map(|p| &p.ty), &args, invoker)?;

        let type_name = self.catalog.display_name(target);
        for node in creation.descendants() {
            let OperationKind::SimpleAssignment { target: member, value } = &node.kind else {
                continue;
            };
            let name = member_name(member)?;
            let setter = self.setter(target, name)?;

            let value = match value.constant.as_ref() {
                Some(constant) => Value::from_constant(constant).ok_or_else(|| {
                    CompilationError::unsupported(format!("{} constant assigned to '{type_name}.{name}'", constant.kind_name()))
                })?,
                None => {
                    let assignment = UnknownAssignment {
                        owner: target,
                        type_name: &type_name,
                        member: name,
                        member_type: setter.member_type,
                        value,
                    };
                    match self.fallback.as_ref().and_then(|hook| hook.value_for(&assignment)) {
                        Some(value) => value,
                        None if setter.admits_null => {
                            trace!(member = name, "no value for nullable member, keeping default");
                            continue;
                        }
                        None => {
                            return Err(CompilationError::MissingRequiredValue {
                                member: format!("{type_name}.{name}"),
                            }
                            .into());
                        }
                    }
                }
            };
            setter.apply(&instance, value, invoker)?;
        }
        Ok(instance)
    }

    fn construct<'t>(
        &self,
        target: TypeHash,
        params: impl Iterator<Item = &'t TypeDescriptor>,
        args: &[Value],
        invoker: &dyn Invoker,
    ) -> Result<Value, DynEmitError> {
        let requested = params
            .map(|ty| self.catalog.resolve_or_fail(ty))
            .collect::<Result<Vec<_>, _>>()?;
        let selected = select_overload(&self.catalog, &requested, self.catalog.constructors(target)).ok_or_else(|| {
            CompilationError::UnresolvedMethodOverload {
                name: format!("{}.{CONSTRUCTOR_NAME}", self.catalog.display_name(target)),
                params: requested.iter().map(|t| self.catalog.display_name(*t)).collect(),
            }
        })?;
        let MethodImpl::Native(native) = &selected.method.implementation else {
            return Err(CompilationError::unsupported("constructor without a native body").into());
        };

        let mut ctx = CallContext::for_constructor(args, target, invoker);
        native.call(&mut ctx)?;
        Ok(ctx.take_return())
    }

    fn setter(&self, owner: TypeHash, member: &str) -> Result<Arc<CompiledSetter>, CompilationError> {
        let key = TypeMemberKey::new(owner, member);
        if let Some(hit) = self.setters.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }
        let setter = Arc::new(self.compile_setter(&key)?);
        debug!(
            owner = %self.catalog.display_name(owner),
            member,
            kind = ?setter.kind,
            "compiled member setter"
        );
        Ok(Arc::clone(self.setters.entry(key).or_insert(setter).value()))
    }

    fn compile_setter(&self, key: &TypeMemberKey) -> Result<CompiledSetter, CompilationError> {
        let catalog = &self.catalog;
        let qualified = || format!("{}.{}", catalog.display_name(key.owner), key.member);

        if let Some(field) = catalog.find_field(key.owner, &key.member) {
            let member_type = catalog.materialize(&field.ty).ok_or_else(|| CompilationError::unresolved_type(qualified()))?;
            let store = Arc::clone(&field.setter);
            return Ok(CompiledSetter {
                kind: MemberKind::Field,
                member_type,
                admits_null: catalog.admits_null(member_type),
                coerce: NumericKind::of(member_type),
                apply: Box::new(move |object: &Value, value: Value, _: &dyn Invoker| match object {
                    Value::Object(object) => store(object, value),
                    other => Err(RuntimeError::TypeMismatch {
                        expected: "object".into(),
                        actual: other.kind_name().into(),
                    }),
                }),
            });
        }

        let property = catalog
            .find_property(key.owner, &key.member)
            .map(|p| catalog.resolve_property_override(key.owner, &p))
            .ok_or_else(|| CompilationError::InvalidSymbolShape {
                expected: format!("field or property '{}'", qualified()),
                found: "no such member".into(),
            })?;
        if property.is_static() {
            return Err(CompilationError::unsupported(format!("static property '{}' in object initializer", qualified())));
        }
        let store = property
            .setter
            .clone()
            .ok_or_else(|| CompilationError::unsupported(format!("assignment to read-only property '{}'", qualified())))?;
        let member_type = catalog.materialize(&property.ty).ok_or_else(|| CompilationError::unresolved_type(qualified()))?;

        Ok(CompiledSetter {
            kind: MemberKind::Property,
            member_type,
            admits_null: catalog.admits_null(member_type),
            coerce: NumericKind::of(member_type),
            apply: Box::new(move |object: &Value, value: Value, invoker: &dyn Invoker| {
                let args = [value];
                let mut ctx = CallContext::new(Some(object), &args, invoker);
                store.call(&mut ctx)
            }),
        })
    }
}

fn value_kind(value: &Value) -> Option<NumericKind> {
    Some(match value {
        Value::Int32(_) => NumericKind::Int32,
        Value::Int64(_) => NumericKind::Int64,
        Value::UInt32(_) => NumericKind::UInt32,
        Value::UInt64(_) => NumericKind::UInt64,
        Value::Float32(_) => NumericKind::Float32,
        Value::Float64(_) => NumericKind::Float64,
        _ => return None,
    })
}

fn member_name(target: &Operation) -> Result<&str, CompilationError> {
    match &target.kind {
        OperationKind::FieldReference { field, .. } => Ok(&field.name),
        OperationKind::PropertyReference { property, .. } => Ok(&property.name),
        _ => Err(CompilationError::unsupported(format!(
            "assignment to {} in object initializer",
            target.shape_name()
        ))),
    }
}
