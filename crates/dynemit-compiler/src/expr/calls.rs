//! Invocation and object creation.
//!
//! A call whose declaring type is not in the catalog targets a source-local
//! method: the callee is compiled through the pipeline (once per call site)
//! and called with `CallUnit`, or `CallSelf` for direct recursion. Host calls
//! pick an overload by distance and emit the call form matching the member:
//! `InvokeDelegate`, `CallStatic`, `CallVirtual` or `CallMethod`.

use super::{ExprCompiler, Result, arg_count, assign};
use crate::bytecode::OpCode;
use dynemit_core::{CompilationError, MethodSymbol, Operation, OperationKind, TypeHash};
use dynemit_registry::{CONSTRUCTOR_NAME, Candidate, MethodImpl, TypeCatalog, select_overload};

pub(super) fn compile_invocation(
    compiler: &mut ExprCompiler<'_, '_, '_>,
    instance: Option<&Operation>,
    method: &MethodSymbol,
    arguments: &[Operation],
) -> Result<()> {
    match compiler.ctx.catalog().resolve(&method.containing_type) {
        Some(owner) => compile_host_call(compiler, owner, instance, method, arguments),
        None => compile_source_call(compiler, instance, method, arguments),
    }
}

fn compile_source_call(
    compiler: &mut ExprCompiler<'_, '_, '_>,
    instance: Option<&Operation>,
    method: &MethodSymbol,
    arguments: &[Operation],
) -> Result<()> {
    if instance.is_some() || !method.is_static {
        return Err(CompilationError::InvalidSymbolShape {
            expected: "static source method".into(),
            found: method.display_signature(),
        });
    }
    let argc = arg_count(arguments.len())?;

    if method.id == compiler.ctx.frame.owner() {
        compiler.compile_all(arguments)?;
        compiler.emitter.emit_byte(OpCode::CallSelf, argc);
        return Ok(());
    }

    let callee = compiler.ctx.pipeline().compile_callee(method)?;
    let index = compiler.ctx.add_callee(callee)?;
    compiler.compile_all(arguments)?;
    compiler.emitter.emit_call_unit(index, argc);
    Ok(())
}

fn compile_host_call(
    compiler: &mut ExprCompiler<'_, '_, '_>,
    owner: TypeHash,
    instance: Option<&Operation>,
    method: &MethodSymbol,
    arguments: &[Operation],
) -> Result<()> {
    let catalog = compiler.ctx.catalog();
    let requested = parameter_types(compiler, method)?;

    let candidates: Vec<Candidate> = catalog
        .methods_named(owner, &method.name)
        .into_iter()
        .filter(|candidate| candidate.method.is_static() == method.is_static)
        .collect();
    let selected = select_overload(catalog, &requested, candidates)
        .ok_or_else(|| unresolved_overload(catalog, owner, &method.name, &requested))?;

    let entry = if selected.method.is_generic_definition() {
        if method.type_arguments.is_empty() {
            return Err(CompilationError::InvalidSymbolShape {
                expected: format!("type arguments for generic method '{}'", method.name),
                found: "none".into(),
            });
        }
        let type_args = method
            .type_arguments
            .iter()
            .map(|arg| compiler.ctx.resolve(arg))
            .collect::<Result<Vec<_>>>()?;
        catalog
            .close_method(&selected.method, &type_args)
            .ok_or_else(|| unresolved_overload(catalog, owner, &method.name, &requested))?
    } else {
        selected.method
    };

    if !entry.is_static() {
        super::member::compile_receiver(compiler, instance, &method.name)?;
    }
    compiler.compile_all(arguments)?;

    let argc = arg_count(arguments.len())?;
    match &entry.implementation {
        MethodImpl::DelegateInvoke => compiler.emitter.emit_byte(OpCode::InvokeDelegate, argc),
        _ if entry.is_static() => compiler.emitter.emit_call(OpCode::CallStatic, entry.hash, argc)?,
        _ if entry.is_virtual() => compiler.emitter.emit_call(OpCode::CallVirtual, entry.hash, argc)?,
        _ => compiler.emitter.emit_call(OpCode::CallMethod, entry.hash, argc)?,
    }
    Ok(())
}

pub(super) fn compile_object_creation(
    compiler: &mut ExprCompiler<'_, '_, '_>,
    constructor: &MethodSymbol,
    arguments: &[Operation],
    initializer: &[Operation],
) -> Result<()> {
    let catalog = compiler.ctx.catalog();
    let owner = compiler.ctx.resolve(&constructor.containing_type)?;
    let requested = parameter_types(compiler, constructor)?;
    let selected = select_overload(catalog, &requested, catalog.constructors(owner))
        .ok_or_else(|| unresolved_overload(catalog, owner, CONSTRUCTOR_NAME, &requested))?;

    compiler.compile_all(arguments)?;
    compiler.emitter.emit_new(owner, selected.method.hash, arg_count(arguments.len())?)?;

    compiler.ctx.implicit_receivers += 1;
    let applied = apply_initializer(compiler, initializer);
    compiler.ctx.implicit_receivers -= 1;
    applied
}

/// Member assignments applied to the new object, which stays on the stack.
fn apply_initializer(compiler: &mut ExprCompiler<'_, '_, '_>, initializer: &[Operation]) -> Result<()> {
    for assignment in initializer {
        compiler.emitter.set_line(assignment.line);
        match &assignment.kind {
            OperationKind::SimpleAssignment { target, value } => {
                compiler.emitter.emit_dup();
                assign::compile_simple(compiler, target, value, false)?;
            }
            _ => {
                return Err(CompilationError::unsupported(format!(
                    "{} in object initializer",
                    assignment.shape_name()
                )));
            }
        }
    }
    Ok(())
}

/// Resolved parameter types of a front-end method symbol.
fn parameter_types(compiler: &ExprCompiler<'_, '_, '_>, method: &MethodSymbol) -> Result<Vec<TypeHash>> {
    method.parameters.iter().map(|p| compiler.ctx.resolve(&p.ty)).collect()
}

fn unresolved_overload(catalog: &TypeCatalog, owner: TypeHash, name: &str, requested: &[TypeHash]) -> CompilationError {
    CompilationError::UnresolvedMethodOverload {
        name: format!("{}.{name}", catalog.display_name(owner)),
        params: requested.iter().map(|t| catalog.display_name(*t)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{catalog, compile_expr, method};
    use crate::bytecode::OpCode;
    use dynemit_core::{
        CompilationError, MethodSymbol, Operation, PropertySymbol, SymbolId, TypeDescriptor,
    };

    fn ints() -> TypeDescriptor {
        TypeDescriptor::generic("IEnumerable", vec![TypeDescriptor::int()])
    }

    fn sequence(name: &str) -> MethodSymbol {
        MethodSymbol::new(SymbolId(20), name, TypeDescriptor::named("Sequence"))
            .with_param("xs", ints())
            .returns(TypeDescriptor::int())
    }

    fn numbers() -> Operation {
        Operation::conversion(
            Operation::new_array(TypeDescriptor::array(TypeDescriptor::int()), vec![Operation::int(1)], None),
            ints(),
        )
    }

    #[test]
    fn static_host_call() {
        let op = Operation::invocation(None, sequence("Sum"), vec![numbers()]);
        let (chunk, _) = compile_expr(&catalog(), &method(1), &op).unwrap();
        chunk.assert_opcodes(&[OpCode::Constant, OpCode::NewArray, OpCode::CallStatic]);
    }

    #[test]
    fn generic_call_needs_type_arguments() {
        let op = Operation::invocation(None, sequence("First"), vec![numbers()]);
        let err = compile_expr(&catalog(), &method(1), &op).unwrap_err();
        assert!(matches!(err, CompilationError::InvalidSymbolShape { .. }));

        let first = sequence("First").with_type_args(vec![TypeDescriptor::int()]);
        let op = Operation::invocation(None, first, vec![numbers()]);
        let (chunk, _) = compile_expr(&catalog(), &method(1), &op).unwrap();
        chunk.assert_opcodes(&[OpCode::Constant, OpCode::NewArray, OpCode::CallStatic]);
    }

    #[test]
    fn no_compatible_overload() {
        let sum = MethodSymbol::new(SymbolId(21), "Sum", TypeDescriptor::named("Sequence"))
            .with_param("s", TypeDescriptor::string())
            .returns(TypeDescriptor::int());
        let op = Operation::invocation(None, sum, vec![Operation::string("x")]);
        let err = compile_expr(&catalog(), &method(1), &op).unwrap_err();
        assert_eq!(
            err,
            CompilationError::UnresolvedMethodOverload {
                name: "Sequence.Sum".into(),
                params: vec!["string".into()],
            }
        );
    }

    #[test]
    fn recursion_calls_self() {
        let owner = method(1);
        let op = Operation::invocation(None, owner.clone(), vec![Operation::int(3)]);
        let (chunk, _) = compile_expr(&catalog(), &owner, &op).unwrap();
        chunk.assert_opcodes(&[OpCode::Constant, OpCode::CallSelf]);
    }

    #[test]
    fn source_method_without_body_is_unresolved() {
        let other = MethodSymbol::new(SymbolId(30), "G", TypeDescriptor::named("Calc"));
        let op = Operation::invocation(None, other, vec![]);
        let err = compile_expr(&catalog(), &method(1), &op).unwrap_err();
        assert_eq!(err, CompilationError::unresolved_type("Calc"));
    }

    #[test]
    fn object_initializer_stores_through_duplicate() {
        let point = TypeDescriptor::named("Point");
        let ctor = MethodSymbol::constructor(SymbolId(9), point.clone())
            .with_param("x", TypeDescriptor::int())
            .with_param("y", TypeDescriptor::int());
        let y = Operation::property(
            Some(Operation::implicit_receiver(point.clone())),
            PropertySymbol::new(point, "Y", TypeDescriptor::int()),
        );
        let op = Operation::new_object(
            ctor,
            vec![Operation::int(0), Operation::int(1)],
            vec![Operation::assign(y, Operation::int(2))],
        );
        let (chunk, _) = compile_expr(&catalog(), &method(1), &op).unwrap();
        chunk.assert_opcodes(&[
            OpCode::Constant,
            OpCode::Constant,
            OpCode::New,
            OpCode::Dup,
            OpCode::Constant,
            OpCode::SetProperty,
        ]);
    }

    #[test]
    fn implicit_receiver_outside_initializer() {
        let point = TypeDescriptor::named("Point");
        let y = Operation::property(
            Some(Operation::implicit_receiver(point.clone())),
            PropertySymbol::new(point, "Y", TypeDescriptor::int()),
        );
        let err = compile_expr(&catalog(), &method(1), &Operation::assign(y, Operation::int(2))).unwrap_err();
        assert!(matches!(err, CompilationError::UnsupportedOperationShape { .. }));
    }
}
