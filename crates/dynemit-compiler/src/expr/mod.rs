//! Expression compilation.
//!
//! `ExprCompiler` walks one typed expression tree and emits stack code:
//! operands first, then the operator. Each expression that has a static
//! type leaves exactly one value on the stack.
//!
//! ## Module Organization
//!
//! - `literals` - constant loads
//! - `binary` - binary and unary operators, conversions
//! - `calls` - host and source-local invocations, object creation
//! - `member` - field and property reads
//! - `interpolation` - interpolated text through the builder protocol
//! - `arrays` - array creation and element reads
//! - `assign` - simple and compound assignment
//! - `lambda` - delegate creation from materialized lambdas

mod arrays;
mod assign;
mod binary;
mod calls;
mod interpolation;
mod lambda;
mod literals;
mod member;

use crate::bytecode::OpCode;
use crate::context::BodyContext;
use crate::emit::BytecodeEmitter;
use dynemit_core::{CompilationError, Operation, OperationKind};

type Result<T> = std::result::Result<T, CompilationError>;

pub struct ExprCompiler<'a, 'c, 'pool> {
    ctx: &'a mut BodyContext<'c>,
    emitter: &'a mut BytecodeEmitter<'pool>,
}

impl<'a, 'c, 'pool> ExprCompiler<'a, 'c, 'pool> {
    pub fn new(ctx: &'a mut BodyContext<'c>, emitter: &'a mut BytecodeEmitter<'pool>) -> Self {
        Self { ctx, emitter }
    }

    /// Compile an expression, leaving its value (if any) on the stack.
    pub fn compile(&mut self, op: &Operation) -> Result<()> {
        self.emitter.set_line(op.line);

        match &op.kind {
            OperationKind::Literal => literals::compile_literal(self, op),
            OperationKind::ParameterReference(param) => {
                let slot = self.ctx.frame.param_slot(param)?;
                self.emitter.emit_get_arg(slot);
                Ok(())
            }
            OperationKind::LocalReference(local) => {
                let slot = self.ctx.frame.local_slot(local)?;
                self.emitter.emit_get_local(slot);
                Ok(())
            }
            OperationKind::ImplicitReceiver => Err(CompilationError::unsupported("ImplicitReceiver read")),
            OperationKind::FieldReference { instance, field } => {
                member::compile_member_read(self, instance.as_deref(), &field.containing_type, &field.name, field.is_static)
            }
            OperationKind::PropertyReference { instance, property } => member::compile_member_read(
                self,
                instance.as_deref(),
                &property.containing_type,
                &property.name,
                property.is_static,
            ),
            OperationKind::ArrayElementReference { array, indices } => arrays::compile_element_read(self, array, indices),
            OperationKind::Binary { operator, left, right } => binary::compile_binary(self, *operator, left, right),
            OperationKind::Unary { operator, operand } => binary::compile_unary(self, *operator, operand),
            OperationKind::Conversion { operand } => binary::compile_conversion(self, op, operand),
            OperationKind::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                let when_false = when_false.as_deref().ok_or_else(|| CompilationError::InvalidSymbolShape {
                    expected: "conditional expression with both branches".into(),
                    found: "missing false branch".into(),
                })?;
                self.compile_conditional(condition, when_true, when_false)
            }
            OperationKind::Invocation {
                instance,
                method,
                arguments,
            } => calls::compile_invocation(self, instance.as_deref(), method, arguments),
            OperationKind::ObjectCreation {
                constructor,
                arguments,
                initializer,
            } => calls::compile_object_creation(self, constructor, arguments, initializer),
            OperationKind::DelegateCreation { target } => lambda::compile_delegate_creation(self, target),
            OperationKind::InterpolatedString { parts } => interpolation::compile_interpolated(self, parts),
            OperationKind::ArrayCreation {
                dimension_sizes,
                initializer,
            } => arrays::compile_array_creation(self, op, dimension_sizes, initializer.as_deref()),
            OperationKind::SimpleAssignment { target, value } => assign::compile_simple(self, target, value, true),
            OperationKind::CompoundAssignment {
                operator,
                target,
                value,
            } => assign::compile_compound(self, *operator, target, value, true),
            OperationKind::Parenthesized { operand } => self.compile(operand),
            OperationKind::Unsupported { kind, .. } => Err(CompilationError::unsupported(kind.clone())),
            OperationKind::AnonymousFunction { .. }
            | OperationKind::VariableDeclaration { .. }
            | OperationKind::Block { .. }
            | OperationKind::ExpressionStatement { .. }
            | OperationKind::Return { .. }
            | OperationKind::WhileLoop { .. } => Err(CompilationError::unsupported(format!(
                "{} in expression position",
                op.shape_name()
            ))),
        }
    }

    /// Compile an expression for its side effects only.
    pub fn compile_discarded(&mut self, op: &Operation) -> Result<()> {
        self.emitter.set_line(op.line);

        match &op.kind {
            OperationKind::SimpleAssignment { target, value } => assign::compile_simple(self, target, value, false),
            OperationKind::CompoundAssignment {
                operator,
                target,
                value,
            } => assign::compile_compound(self, *operator, target, value, false),
            OperationKind::Parenthesized { operand } => self.compile_discarded(operand),
            _ => {
                self.compile(op)?;
                if op.produces_value() {
                    self.emitter.emit_pop();
                }
                Ok(())
            }
        }
    }

    fn compile_conditional(&mut self, condition: &Operation, when_true: &Operation, when_false: &Operation) -> Result<()> {
        self.compile(condition)?;
        let else_jump = self.emitter.emit_jump(OpCode::JumpIfFalse);
        self.compile(when_true)?;
        let end_jump = self.emitter.emit_jump(OpCode::Jump);
        self.emitter.patch_jump(else_jump)?;
        self.compile(when_false)?;
        self.emitter.patch_jump(end_jump)
    }

    fn compile_all(&mut self, ops: &[Operation]) -> Result<()> {
        for op in ops {
            self.compile(op)?;
        }
        Ok(())
    }
}

/// Argument count as an instruction operand.
fn arg_count(count: usize) -> Result<u8> {
    u8::try_from(count).map_err(|_| CompilationError::unsupported("call with more than 255 arguments"))
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for compiler unit tests.

    use crate::bytecode::{BytecodeChunk, ConstantPool};
    use crate::context::BodyContext;
    use crate::emit::BytecodeEmitter;
    use crate::expr::ExprCompiler;
    use crate::pipeline::Pipeline;
    use crate::scope::Frame;
    use crate::session::CompilationSession;
    use dynemit_core::{CompilationError, MethodSymbol, Operation, SourceCompilation, SymbolId, TypeDescriptor};
    use dynemit_registry::{MethodDef, Module, TypeBuilder, TypeCatalog, TypeRef};

    #[derive(Clone)]
    pub struct Point {
        pub x: i32,
        pub y: i32,
    }

    pub struct Shape;

    pub fn catalog() -> TypeCatalog {
        let mut module = Module::new("test");
        module.add(
            TypeBuilder::<()>::static_class("Sequence")
                .method(
                    MethodDef::new("Sum")
                        .static_()
                        .param(TypeRef::generic("IEnumerable", vec![TypeRef::int()]))
                        .returns(TypeRef::int()),
                    |_| Ok(()),
                )
                .method(
                    MethodDef::new("First")
                        .static_()
                        .generic(&["T"])
                        .param(TypeRef::generic("IEnumerable", vec![TypeRef::method_param(0)]))
                        .returns(TypeRef::method_param(0)),
                    |_| Ok(()),
                )
                .build(),
        );
        module.add(
            TypeBuilder::<Point>::value_type("Point")
                .sealed()
                .constructor(vec![TypeRef::int(), TypeRef::int()], |ctx| {
                    Ok(Point {
                        x: ctx.arg(0)?,
                        y: ctx.arg(1)?,
                    })
                })
                .field("X", TypeRef::int(), |p: &Point| p.x, |p: &mut Point, v: i32| p.x = v)
                .property_rw("Y", TypeRef::int(), |p: &Point| p.y, |p: &mut Point, v: i32| p.y = v)
                .build(),
        );
        module.add(
            TypeBuilder::<Shape>::class("Shape")
                .abstract_()
                .virtual_property("Area", TypeRef::double(), |_: &Shape| 0.0)
                .build(),
        );
        TypeCatalog::new([module]).unwrap()
    }

    pub fn method(id: u32) -> MethodSymbol {
        MethodSymbol::new(SymbolId(id), "F", TypeDescriptor::named("Calc"))
            .with_param("x", TypeDescriptor::int())
            .returns(TypeDescriptor::int())
    }

    /// Compile `op` as an expression in the body of `owner`.
    pub fn compile_expr(
        catalog: &TypeCatalog,
        owner: &MethodSymbol,
        op: &Operation,
    ) -> Result<(BytecodeChunk, ConstantPool), CompilationError> {
        let model = SourceCompilation::new();
        let pipeline = Pipeline::new(catalog, &model);
        let session = CompilationSession::new();
        let mut constants = ConstantPool::new();
        let mut ctx = BodyContext::new(&pipeline, &session, Frame::for_method(owner, false));
        let chunk = {
            let mut emitter = BytecodeEmitter::new(&mut constants);
            ExprCompiler::new(&mut ctx, &mut emitter).compile(op)?;
            emitter.finish()
        };
        Ok((chunk, constants))
    }
}
