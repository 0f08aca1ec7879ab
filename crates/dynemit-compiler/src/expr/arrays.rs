//! Array creation and element reads.

use super::{ExprCompiler, Result};
use crate::bytecode::OpCode;
use dynemit_core::{CompilationError, Operation, TypeDescriptor};

pub(super) fn compile_array_creation(
    compiler: &mut ExprCompiler<'_, '_, '_>,
    op: &Operation,
    dimension_sizes: &[Operation],
    initializer: Option<&[Operation]>,
) -> Result<()> {
    let Some(TypeDescriptor::Array { element, rank }) = &op.ty else {
        return Err(CompilationError::InvalidSymbolShape {
            expected: "array type".into(),
            found: op.ty.as_ref().map_or_else(|| "untyped".to_string(), ToString::to_string),
        });
    };
    let rank = *rank;
    let element = compiler.ctx.resolve(element)?;
    // fail early on ranks the catalog has no definition for
    compiler.ctx.catalog().close_array(element, rank).ok_or_else(|| {
        CompilationError::unresolved_type(op.ty.as_ref().map_or_else(String::new, ToString::to_string))
    })?;

    if initializer.is_some() && rank != 1 {
        return Err(CompilationError::unsupported("multi-dimensional array initializer"));
    }

    match (dimension_sizes.is_empty(), initializer) {
        (true, Some(items)) => compiler.emitter.emit_int(element_index(items.len())?)?,
        (true, None) => {
            return Err(CompilationError::InvalidSymbolShape {
                expected: "array dimension sizes or initializer".into(),
                found: "neither".into(),
            });
        }
        (false, _) if dimension_sizes.len() != usize::from(rank) => {
            return Err(CompilationError::InvalidSymbolShape {
                expected: format!("{rank} dimension sizes"),
                found: dimension_sizes.len().to_string(),
            });
        }
        (false, _) => compiler.compile_all(dimension_sizes)?,
    }
    compiler.emitter.emit_new_array(element, rank)?;

    for (index, item) in initializer.unwrap_or_default().iter().enumerate() {
        compiler.emitter.emit_dup();
        compiler.emitter.emit_int(element_index(index)?)?;
        compiler.compile(item)?;
        compiler.emitter.emit_byte(OpCode::StoreElement, 1);
    }
    Ok(())
}

pub(super) fn compile_element_read(
    compiler: &mut ExprCompiler<'_, '_, '_>,
    array: &Operation,
    indices: &[Operation],
) -> Result<()> {
    let rank = element_rank(indices)?;
    compiler.compile(array)?;
    compiler.compile_all(indices)?;
    compiler.emitter.emit_byte(OpCode::LoadElement, rank);
    Ok(())
}

pub(super) fn element_rank(indices: &[Operation]) -> Result<u8> {
    u8::try_from(indices.len())
        .ok()
        .filter(|rank| *rank > 0)
        .ok_or_else(|| CompilationError::unsupported(format!("element access with {} indices", indices.len())))
}

fn element_index(index: usize) -> Result<i32> {
    i32::try_from(index).map_err(|_| CompilationError::unsupported("array initializer too long"))
}
