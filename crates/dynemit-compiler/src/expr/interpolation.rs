//! Interpolated text.
//!
//! Compiles to the builder protocol of the `system` module:
//!
//! ```text
//! new InterpolatedTextBuilder(literalLength, holeCount)
//! builder.AppendLiteral("n=")           per text part
//! builder.AppendFormatted<T>(value, ..) per hole
//! builder.ToStringAndClear()
//! ```
//!
//! Each hole picks exactly one `AppendFormatted` overload from its shape:
//! value, value+format, value+alignment or value+alignment+format.

use super::{ExprCompiler, Result, arg_count};
use crate::bytecode::OpCode;
use dynemit_core::{CompilationError, HoleArgument, InterpolationPart, Operation, TypeHash, primitives};
use dynemit_registry::{
    APPEND_FORMATTED, APPEND_LITERAL, INTERPOLATED_TEXT_BUILDER, MethodEntry, TO_STRING_AND_CLEAR, TypeCatalog,
    select_overload,
};
use std::sync::Arc;

/// The extra arguments of one hole, in call order.
struct HoleShape<'o> {
    alignment: Option<&'o Operation>,
    format: Option<&'o str>,
}

impl<'o> HoleShape<'o> {
    fn classify(arguments: &'o [HoleArgument]) -> Result<Self> {
        let shape = match arguments {
            [] => HoleShape {
                alignment: None,
                format: None,
            },
            [HoleArgument::Format(format)] => HoleShape {
                alignment: None,
                format: Some(format),
            },
            [HoleArgument::Alignment(alignment)] => HoleShape {
                alignment: Some(alignment),
                format: None,
            },
            [HoleArgument::Alignment(alignment), HoleArgument::Format(format)]
            | [HoleArgument::Format(format), HoleArgument::Alignment(alignment)] => HoleShape {
                alignment: Some(alignment),
                format: Some(format),
            },
            _ => {
                return Err(CompilationError::unsupported(format!(
                    "interpolation hole with {} arguments",
                    arguments.len()
                )));
            }
        };
        Ok(shape)
    }

    fn requested(&self, value: TypeHash) -> Vec<TypeHash> {
        let mut requested = vec![value];
        if self.alignment.is_some() {
            requested.push(primitives::INT32);
        }
        if self.format.is_some() {
            requested.push(primitives::STRING);
        }
        requested
    }
}

pub(super) fn compile_interpolated(compiler: &mut ExprCompiler<'_, '_, '_>, parts: &[InterpolationPart]) -> Result<()> {
    let catalog = compiler.ctx.catalog();
    let builder = catalog
        .by_name(INTERPOLATED_TEXT_BUILDER)
        .ok_or_else(|| CompilationError::unresolved_type(INTERPOLATED_TEXT_BUILDER))?;

    let literal_length: usize = parts
        .iter()
        .map(|part| match part {
            InterpolationPart::Text(text) => text.chars().count(),
            InterpolationPart::Hole { .. } => 0,
        })
        .sum();
    let hole_count = parts
        .iter()
        .filter(|part| matches!(part, InterpolationPart::Hole { .. }))
        .count();

    let constructor = select_overload(catalog, &[primitives::INT32, primitives::INT32], catalog.constructors(builder))
        .ok_or_else(|| missing(catalog, builder, ".ctor", &[primitives::INT32, primitives::INT32]))?;
    compiler.emitter.emit_int(size_operand(literal_length)?)?;
    compiler.emitter.emit_int(size_operand(hole_count)?)?;
    compiler.emitter.emit_new(builder, constructor.method.hash, 2)?;

    for part in parts {
        match part {
            InterpolationPart::Text(text) => {
                let append = builder_method(catalog, builder, APPEND_LITERAL, &[primitives::STRING])?;
                compiler.emitter.emit_dup();
                compiler.emitter.emit_string(text)?;
                compiler.emitter.emit_call(OpCode::CallMethod, append.hash, 1)?;
            }
            InterpolationPart::Hole { value, arguments } => {
                let shape = HoleShape::classify(arguments)?;
                let value_type = compiler.ctx.static_type(value)?;
                let requested = shape.requested(value_type);
                let append = builder_method(catalog, builder, APPEND_FORMATTED, &requested)?;
                let append = catalog.close_method(&append, &[value_type]).ok_or_else(|| {
                    missing(catalog, builder, APPEND_FORMATTED, &requested)
                })?;

                compiler.emitter.emit_dup();
                compiler.compile(value)?;
                if let Some(alignment) = shape.alignment {
                    compiler.compile(alignment)?;
                }
                if let Some(format) = shape.format {
                    compiler.emitter.emit_string(format)?;
                }
                compiler.emitter.emit_call(OpCode::CallMethod, append.hash, arg_count(requested.len())?)?;
            }
        }
    }

    let finish = builder_method(catalog, builder, TO_STRING_AND_CLEAR, &[])?;
    compiler.emitter.emit_call(OpCode::CallMethod, finish.hash, 0)
}

fn builder_method(catalog: &TypeCatalog, builder: TypeHash, name: &str, requested: &[TypeHash]) -> Result<Arc<MethodEntry>> {
    select_overload(catalog, requested, catalog.methods_named(builder, name))
        .map(|candidate| candidate.method)
        .ok_or_else(|| missing(catalog, builder, name, requested))
}

fn missing(catalog: &TypeCatalog, builder: TypeHash, name: &str, requested: &[TypeHash]) -> CompilationError {
    CompilationError::UnresolvedMethodOverload {
        name: format!("{}.{name}", catalog.display_name(builder)),
        params: requested.iter().map(|t| catalog.display_name(*t)).collect(),
    }
}

fn size_operand(size: usize) -> Result<i32> {
    i32::try_from(size).map_err(|_| CompilationError::unsupported("interpolated text too long"))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{catalog, compile_expr, method};
    use crate::bytecode::{Constant, OpCode};
    use dynemit_core::{CompilationError, HoleArgument, InterpolationPart, Operation, TypeHash, primitives};
    use dynemit_registry::{APPEND_FORMATTED, INTERPOLATED_TEXT_BUILDER};

    fn hole(arguments: Vec<HoleArgument>) -> InterpolationPart {
        InterpolationPart::Hole {
            value: Box::new(Operation::parameter(&method(1).parameters[0])),
            arguments,
        }
    }

    #[test]
    fn aligned_hole_calls_value_alignment_overload() {
        let catalog = catalog();
        let op = Operation::interpolated(vec![
            InterpolationPart::Text("n=".into()),
            hole(vec![HoleArgument::Alignment(Operation::int(5))]),
        ]);
        let (chunk, constants) = compile_expr(&catalog, &method(1), &op).unwrap();
        chunk.assert_opcodes(&[
            OpCode::Constant,
            OpCode::Constant,
            OpCode::New,
            OpCode::Dup,
            OpCode::Constant,
            OpCode::CallMethod,
            OpCode::Dup,
            OpCode::GetArg,
            OpCode::Constant,
            OpCode::CallMethod,
            OpCode::CallMethod,
        ]);

        // literal length 2, one hole
        assert_eq!(constants.get(0), Some(&Constant::Int32(2)));
        assert_eq!(constants.get(1), Some(&Constant::Int32(1)));

        let builder = TypeHash::from_name(INTERPOLATED_TEXT_BUILDER);
        let called: Vec<_> = constants
            .constants()
            .iter()
            .filter_map(Constant::as_hash)
            .filter_map(|hash| catalog.method(hash))
            .filter(|m| m.name == APPEND_FORMATTED)
            .collect();
        assert_eq!(called.len(), 1);
        assert_eq!(called[0].owner, builder);
        assert_eq!(called[0].type_args, vec![primitives::INT32]);
        assert_eq!(called[0].params.len(), 2);
    }

    #[test]
    fn format_then_alignment_is_normalized() {
        let op = Operation::interpolated(vec![hole(vec![
            HoleArgument::Format("x".into()),
            HoleArgument::Alignment(Operation::int(-4)),
        ])]);
        let (chunk, _) = compile_expr(&catalog(), &method(1), &op).unwrap();
        // value, alignment, format
        let ops = chunk.opcodes();
        assert_eq!(&ops[3..8], &[OpCode::Dup, OpCode::GetArg, OpCode::Constant, OpCode::Constant, OpCode::CallMethod]);
    }

    #[test]
    fn repeated_arguments_are_unsupported() {
        let op = Operation::interpolated(vec![hole(vec![
            HoleArgument::Format("x".into()),
            HoleArgument::Format("y".into()),
        ])]);
        let err = compile_expr(&catalog(), &method(1), &op).unwrap_err();
        assert_eq!(err, CompilationError::unsupported("interpolation hole with 2 arguments"));
    }
}
