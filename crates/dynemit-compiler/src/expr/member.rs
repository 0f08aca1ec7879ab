//! Field and property access.

use super::{ExprCompiler, Result};
use crate::bytecode::OpCode;
use dynemit_core::{CompilationError, Operation, TypeDescriptor, TypeHash};
use dynemit_registry::TypeCatalog;

/// How a member is reached once resolved against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MemberAccess {
    Field(TypeHash),
    Property { hash: TypeHash, virtual_: bool, readable: bool, writable: bool },
    StaticProperty { hash: TypeHash, readable: bool, writable: bool },
}

impl MemberAccess {
    pub(super) fn is_static(&self) -> bool {
        matches!(self, MemberAccess::StaticProperty { .. })
    }

    pub(super) fn load_op(&self) -> OpCode {
        match self {
            MemberAccess::Field(_) => OpCode::GetField,
            MemberAccess::Property { virtual_: true, .. } => OpCode::GetPropertyVirtual,
            MemberAccess::Property { .. } => OpCode::GetProperty,
            MemberAccess::StaticProperty { .. } => OpCode::GetStaticProperty,
        }
    }

    pub(super) fn store_op(&self) -> OpCode {
        match self {
            MemberAccess::Field(_) => OpCode::SetField,
            MemberAccess::Property { virtual_: true, .. } => OpCode::SetPropertyVirtual,
            MemberAccess::Property { .. } => OpCode::SetProperty,
            MemberAccess::StaticProperty { .. } => OpCode::SetStaticProperty,
        }
    }

    pub(super) fn hash(&self) -> TypeHash {
        match self {
            MemberAccess::Field(hash)
            | MemberAccess::Property { hash, .. }
            | MemberAccess::StaticProperty { hash, .. } => *hash,
        }
    }

    fn readable(&self) -> bool {
        match self {
            MemberAccess::Field(_) => true,
            MemberAccess::Property { readable, .. } | MemberAccess::StaticProperty { readable, .. } => *readable,
        }
    }

    pub(super) fn writable(&self) -> bool {
        match self {
            MemberAccess::Field(_) => true,
            MemberAccess::Property { writable, .. } | MemberAccess::StaticProperty { writable, .. } => *writable,
        }
    }
}

/// Resolve `name` on `containing_type` as a field or a property.
pub(super) fn resolve_member(
    catalog: &TypeCatalog,
    containing_type: &TypeDescriptor,
    name: &str,
    is_static: bool,
) -> Result<MemberAccess> {
    let owner = catalog.resolve_or_fail(containing_type)?;

    if let Some(field) = catalog.find_field(owner, name) {
        if is_static {
            return Err(CompilationError::unsupported(format!("static field '{name}'")));
        }
        return Ok(MemberAccess::Field(field.hash));
    }

    if let Some(property) = catalog.find_property(owner, name) {
        let readable = property.getter.is_some();
        let writable = property.setter.is_some();
        if property.is_static() {
            return Ok(MemberAccess::StaticProperty {
                hash: property.hash,
                readable,
                writable,
            });
        }
        let virtual_ = property.is_virtual()
            || catalog
                .get(property.owner)
                .is_some_and(|declaring| declaring.dispatches_virtually());
        return Ok(MemberAccess::Property {
            hash: property.hash,
            virtual_,
            readable,
            writable,
        });
    }

    Err(CompilationError::UnresolvedMethodOverload {
        name: format!("{}.{name}", catalog.display_name(owner)),
        params: Vec::new(),
    })
}

pub(super) fn compile_member_read(
    compiler: &mut ExprCompiler<'_, '_, '_>,
    instance: Option<&Operation>,
    containing_type: &TypeDescriptor,
    name: &str,
    is_static: bool,
) -> Result<()> {
    let access = resolve_member(compiler.ctx.catalog(), containing_type, name, is_static)?;
    if !access.readable() {
        return Err(CompilationError::unsupported(format!("read of write-only property '{name}'")));
    }

    if !access.is_static() {
        compile_receiver(compiler, instance, name)?;
    }
    compiler.emitter.emit_hash(access.load_op(), access.hash())
}

/// Push the receiver of an instance member.
pub(super) fn compile_receiver(
    compiler: &mut ExprCompiler<'_, '_, '_>,
    instance: Option<&Operation>,
    member: &str,
) -> Result<()> {
    match instance {
        Some(instance) => compiler.compile(instance),
        None => Err(CompilationError::InvalidSymbolShape {
            expected: format!("receiver for instance member '{member}'"),
            found: "no instance".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{catalog, compile_expr, method};
    use crate::bytecode::OpCode;
    use dynemit_core::{
        CompilationError, FieldSymbol, LocalSymbol, Operation, PropertySymbol, SymbolId, TypeDescriptor,
    };

    fn local(name: &str) -> Operation {
        Operation::local(&LocalSymbol::new(SymbolId(50), "p", TypeDescriptor::named(name)))
    }

    #[test]
    fn sealed_property_is_read_directly() {
        let catalog = catalog();
        let point = TypeDescriptor::named("Point");
        let read = Operation::property(Some(Operation::parameter(&method(1).parameters[0])), PropertySymbol::new(point, "Y", TypeDescriptor::int()));
        let (chunk, _) = compile_expr(&catalog, &method(1), &read).unwrap();
        chunk.assert_opcodes(&[OpCode::GetArg, OpCode::GetProperty]);
    }

    #[test]
    fn abstract_declaring_type_reads_virtually() {
        let catalog = catalog();
        let shape = TypeDescriptor::named("Shape");
        let read = Operation::property(
            Some(Operation::parameter(&method(1).parameters[0])),
            PropertySymbol::new(shape, "Area", TypeDescriptor::double()),
        );
        let (chunk, _) = compile_expr(&catalog, &method(1), &read).unwrap();
        chunk.assert_opcodes(&[OpCode::GetArg, OpCode::GetPropertyVirtual]);
    }

    #[test]
    fn fields_are_never_virtual() {
        let catalog = catalog();
        let read = Operation::field(
            Some(Operation::parameter(&method(1).parameters[0])),
            FieldSymbol::new(TypeDescriptor::named("Point"), "X", TypeDescriptor::int()),
        );
        let (chunk, _) = compile_expr(&catalog, &method(1), &read).unwrap();
        chunk.assert_opcodes(&[OpCode::GetArg, OpCode::GetField]);
    }

    #[test]
    fn unknown_member_is_unresolved() {
        let catalog = catalog();
        let read = Operation::property(
            Some(Operation::parameter(&method(1).parameters[0])),
            PropertySymbol::new(TypeDescriptor::named("Point"), "Z", TypeDescriptor::int()),
        );
        let err = compile_expr(&catalog, &method(1), &read).unwrap_err();
        assert_eq!(
            err,
            CompilationError::UnresolvedMethodOverload {
                name: "Point.Z".into(),
                params: vec![],
            }
        );
    }

    #[test]
    fn locals_must_be_declared_in_this_body() {
        let catalog = catalog();
        let read = Operation::property(
            Some(local("Point")),
            PropertySymbol::new(TypeDescriptor::named("Point"), "Y", TypeDescriptor::int()),
        );
        let err = compile_expr(&catalog, &method(1), &read).unwrap_err();
        assert_eq!(err, CompilationError::unsupported("captured local 'p'"));
    }
}
