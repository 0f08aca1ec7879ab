//! Simple and compound assignment.
//!
//! Stores never leave a value. When the assignment's own value is wanted,
//! variable targets duplicate the value before the store; receiver targets
//! (fields, properties, elements) park it in a temporary and reload it
//! after the store. Compound assignment to a receiver target spills the
//! receiver parts to temporaries so they are evaluated once.

use super::binary::emit_operator;
use super::member::{self, MemberAccess};
use super::{ExprCompiler, Result, arrays};
use crate::bytecode::OpCode;
use crate::emit::BytecodeEmitter;
use dynemit_core::{BinaryOperator, CompilationError, Operation, OperationKind};

/// Where an assignment stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreTarget {
    Argument(u8),
    Local(u16),
    Member(MemberAccess),
    Element { rank: u8 },
}

impl StoreTarget {
    fn emit_load(&self, emitter: &mut BytecodeEmitter<'_>) -> Result<()> {
        match self {
            StoreTarget::Argument(slot) => emitter.emit_get_arg(*slot),
            StoreTarget::Local(slot) => emitter.emit_get_local(*slot),
            StoreTarget::Member(access) => emitter.emit_hash(access.load_op(), access.hash())?,
            StoreTarget::Element { rank } => emitter.emit_byte(OpCode::LoadElement, *rank),
        }
        Ok(())
    }

    fn emit_store(&self, emitter: &mut BytecodeEmitter<'_>) -> Result<()> {
        match self {
            StoreTarget::Argument(slot) => emitter.emit_set_arg(*slot),
            StoreTarget::Local(slot) => emitter.emit_set_local(*slot),
            StoreTarget::Member(access) => emitter.emit_hash(access.store_op(), access.hash())?,
            StoreTarget::Element { rank } => emitter.emit_byte(OpCode::StoreElement, *rank),
        }
        Ok(())
    }
}

/// Operands the store consumes below the value.
enum Receiver<'o> {
    None,
    /// The object under construction, already on the stack.
    Implicit,
    Instance(&'o Operation),
    Element { array: &'o Operation, indices: &'o [Operation] },
}

struct Target<'o> {
    store: StoreTarget,
    receiver: Receiver<'o>,
}

fn resolve_target<'o>(compiler: &ExprCompiler<'_, '_, '_>, target: &'o Operation) -> Result<Target<'o>> {
    let (store, receiver) = match &target.kind {
        OperationKind::ParameterReference(param) => (StoreTarget::Argument(compiler.ctx.frame.param_slot(param)?), Receiver::None),
        OperationKind::LocalReference(local) => (StoreTarget::Local(compiler.ctx.frame.local_slot(local)?), Receiver::None),
        OperationKind::FieldReference { instance, field } => {
            let access = member::resolve_member(compiler.ctx.catalog(), &field.containing_type, &field.name, field.is_static)?;
            member_target(compiler, access, instance.as_deref(), &field.name)?
        }
        OperationKind::PropertyReference { instance, property } => {
            let access =
                member::resolve_member(compiler.ctx.catalog(), &property.containing_type, &property.name, property.is_static)?;
            member_target(compiler, access, instance.as_deref(), &property.name)?
        }
        OperationKind::ArrayElementReference { array, indices } => (
            StoreTarget::Element {
                rank: arrays::element_rank(indices)?,
            },
            Receiver::Element {
                array: array.as_ref(),
                indices: indices.as_slice(),
            },
        ),
        OperationKind::Parenthesized { operand } => return resolve_target(compiler, operand),
        _ => {
            return Err(CompilationError::unsupported(format!("assignment to {}", target.shape_name())));
        }
    };
    Ok(Target { store, receiver })
}

fn member_target<'o>(
    compiler: &ExprCompiler<'_, '_, '_>,
    access: MemberAccess,
    instance: Option<&'o Operation>,
    name: &str,
) -> Result<(StoreTarget, Receiver<'o>)> {
    if !access.writable() {
        return Err(CompilationError::unsupported(format!("assignment to read-only property '{name}'")));
    }
    let receiver = match instance {
        _ if access.is_static() => Receiver::None,
        Some(op) if matches!(op.kind, OperationKind::ImplicitReceiver) => {
            if compiler.ctx.implicit_receivers == 0 {
                return Err(CompilationError::unsupported("ImplicitReceiver outside an object initializer"));
            }
            Receiver::Implicit
        }
        Some(op) => Receiver::Instance(op),
        None => {
            return Err(CompilationError::InvalidSymbolShape {
                expected: format!("receiver for instance member '{name}'"),
                found: "no instance".into(),
            });
        }
    };
    Ok((StoreTarget::Member(access), receiver))
}

pub(super) fn compile_simple(
    compiler: &mut ExprCompiler<'_, '_, '_>,
    target: &Operation,
    value: &Operation,
    want_value: bool,
) -> Result<()> {
    let target = resolve_target(compiler, target)?;

    match target.receiver {
        Receiver::None => {
            compiler.compile(value)?;
            if want_value {
                compiler.emitter.emit_dup();
            }
            target.store.emit_store(compiler.emitter)
        }
        Receiver::Implicit => {
            compiler.compile(value)?;
            store_keeping_value(compiler, target.store, want_value)
        }
        Receiver::Instance(instance) => {
            compiler.compile(instance)?;
            compiler.compile(value)?;
            store_keeping_value(compiler, target.store, want_value)
        }
        Receiver::Element { array, indices } => {
            compiler.compile(array)?;
            compiler.compile_all(indices)?;
            compiler.compile(value)?;
            store_keeping_value(compiler, target.store, want_value)
        }
    }
}

pub(super) fn compile_compound(
    compiler: &mut ExprCompiler<'_, '_, '_>,
    operator: BinaryOperator,
    target: &Operation,
    value: &Operation,
    want_value: bool,
) -> Result<()> {
    let target = resolve_target(compiler, target)?;

    let parts = match target.receiver {
        Receiver::None => {
            target.store.emit_load(compiler.emitter)?;
            compiler.compile(value)?;
            emit_operator(compiler.emitter, operator);
            if want_value {
                compiler.emitter.emit_dup();
            }
            return target.store.emit_store(compiler.emitter);
        }
        Receiver::Implicit => {
            return Err(CompilationError::unsupported("compound assignment in object initializer"));
        }
        Receiver::Instance(instance) => vec![spill(compiler, instance)?],
        Receiver::Element { array, indices } => {
            let mut parts = vec![spill(compiler, array)?];
            for index in indices {
                parts.push(spill(compiler, index)?);
            }
            parts
        }
    };

    // receiver parts for the store, then again for the load
    for &slot in parts.iter().chain(parts.iter()) {
        compiler.emitter.emit_get_local(slot);
    }
    target.store.emit_load(compiler.emitter)?;
    compiler.compile(value)?;
    emit_operator(compiler.emitter, operator);
    store_keeping_value(compiler, target.store, want_value)
}

/// Evaluate `op` once into a fresh temporary.
fn spill(compiler: &mut ExprCompiler<'_, '_, '_>, op: &Operation) -> Result<u16> {
    compiler.compile(op)?;
    let slot = compiler.ctx.frame.temp()?;
    compiler.emitter.emit_set_local(slot);
    Ok(slot)
}

/// Store the value on top of a receiver, leaving a copy when wanted.
fn store_keeping_value(compiler: &mut ExprCompiler<'_, '_, '_>, store: StoreTarget, want_value: bool) -> Result<()> {
    let temp = if want_value {
        let slot = compiler.ctx.frame.temp()?;
        compiler.emitter.emit_dup();
        compiler.emitter.emit_set_local(slot);
        Some(slot)
    } else {
        None
    };
    store.emit_store(compiler.emitter)?;
    if let Some(slot) = temp {
        compiler.emitter.emit_get_local(slot);
    }
    Ok(())
}
