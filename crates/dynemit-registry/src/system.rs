//! The built-in `system` module.
//!
//! Always registered first: primitives, `object`, `IEnumerable<T>`,
//! `Nullable<T>`, the array definitions, the delegate families and the
//! interpolated text builder.

use crate::delegates::DelegateFamilies;
use crate::entries::TypeRef;
use crate::format::format_value;
use crate::module::{MethodDef, Module, TypeBuilder};
use dynemit_core::{CallContext, RuntimeError};

/// Highest array rank the catalog resolves.
pub const MAX_ARRAY_RANK: u8 = 4;

pub const INTERPOLATED_TEXT_BUILDER: &str = "InterpolatedTextBuilder";
pub const APPEND_LITERAL: &str = "AppendLiteral";
pub const APPEND_FORMATTED: &str = "AppendFormatted";
pub const TO_STRING_AND_CLEAR: &str = "ToStringAndClear";

/// Payload of an interpolated text builder.
#[derive(Debug, Clone, Default)]
pub struct InterpolatedText {
    buffer: String,
}

impl InterpolatedText {
    /// Rough per-hole reservation for formatted values.
    const HOLE_CAPACITY: usize = 11;

    pub fn with_capacity(literal_length: usize, hole_count: usize) -> Self {
        Self {
            buffer: String::with_capacity(literal_length + hole_count * Self::HOLE_CAPACITY),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

pub fn module() -> Module {
    let mut module = Module::new("system");

    for (name, value_type) in [
        ("void", true),
        ("bool", true),
        ("int", true),
        ("int64", true),
        ("uint", true),
        ("uint64", true),
        ("float", true),
        ("double", true),
        ("string", false),
    ] {
        module.add(TypeBuilder::<()>::primitive(name, value_type).build());
    }
    module.add(TypeBuilder::<()>::class("object").build());

    module.add(TypeBuilder::<()>::interface("IEnumerable").generic_params(&["T"]).build());
    module.add(
        TypeBuilder::<()>::value_type("Nullable")
            .generic_params(&["T"])
            .nullable()
            .build(),
    );
    for rank in 1..=MAX_ARRAY_RANK {
        module.add(TypeBuilder::<()>::array_definition(rank).build());
    }

    DelegateFamilies::register(&mut module);
    module.add(interpolated_text_builder());
    module
}

fn append_formatted(ctx: &mut CallContext<'_>, alignment: Option<usize>, format: Option<usize>) -> Result<(), RuntimeError> {
    let alignment = alignment.map(|i| ctx.arg::<i32>(i)).transpose()?;
    let format = format.map(|i| ctx.arg::<String>(i)).transpose()?;
    let text = format_value(ctx.arg_slot(0)?, alignment, format.as_deref())?;
    ctx.with_this_mut(|b: &mut InterpolatedText| b.buffer.push_str(&text))
}

fn interpolated_text_builder() -> crate::module::TypeDef {
    let formatted = || {
        MethodDef::new(APPEND_FORMATTED)
            .generic(&["T"])
            .param(TypeRef::method_param(0))
    };
    TypeBuilder::<InterpolatedText>::value_type(INTERPOLATED_TEXT_BUILDER)
        .constructor(vec![TypeRef::int(), TypeRef::int()], |ctx| {
            let literal_length: i32 = ctx.arg(0)?;
            let hole_count: i32 = ctx.arg(1)?;
            Ok(InterpolatedText::with_capacity(
                usize::try_from(literal_length).unwrap_or(0),
                usize::try_from(hole_count).unwrap_or(0),
            ))
        })
        .method(MethodDef::new(APPEND_LITERAL).param(TypeRef::string()), |ctx| {
            let literal: String = ctx.arg(0)?;
            ctx.with_this_mut(|b: &mut InterpolatedText| b.buffer.push_str(&literal))
        })
        .method(formatted(), |ctx| append_formatted(ctx, None, None))
        .method(formatted().param(TypeRef::string()), |ctx| append_formatted(ctx, None, Some(1)))
        .method(formatted().param(TypeRef::int()), |ctx| append_formatted(ctx, Some(1), None))
        .method(
            formatted().param(TypeRef::int()).param(TypeRef::string()),
            |ctx| append_formatted(ctx, Some(1), Some(2)),
        )
        .method(
            MethodDef::new(TO_STRING_AND_CLEAR).returns(TypeRef::string()),
            |ctx| {
                let text = ctx.with_this_mut(|b: &mut InterpolatedText| std::mem::take(&mut b.buffer))?;
                ctx.set_return(text);
                Ok(())
            },
        )
        .build()
}
