//! Statement compiler.
//!
//! Compiles method bodies: blocks, local declarations, returns, `if` and
//! `while`. Expression statements go through [`ExprCompiler`] with their
//! value discarded.

mod control;

use crate::context::BodyContext;
use crate::emit::BytecodeEmitter;
use crate::expr::ExprCompiler;
use dynemit_core::{CompilationError, Operation, OperationKind};

type Result<T> = std::result::Result<T, CompilationError>;

pub struct StmtCompiler<'a, 'c, 'pool> {
    ctx: &'a mut BodyContext<'c>,
    emitter: &'a mut BytecodeEmitter<'pool>,
    /// Whether the method being compiled returns a value.
    returns_value: bool,
}

impl<'a, 'c, 'pool> StmtCompiler<'a, 'c, 'pool> {
    pub fn new(ctx: &'a mut BodyContext<'c>, emitter: &'a mut BytecodeEmitter<'pool>, returns_value: bool) -> Self {
        Self {
            ctx,
            emitter,
            returns_value,
        }
    }

    fn expr(&mut self) -> ExprCompiler<'_, 'c, 'pool> {
        ExprCompiler::new(self.ctx, self.emitter)
    }

    /// Compile a whole method body.
    ///
    /// Statement bodies fall through to a trailing `ReturnVoid`. Expression
    /// bodies return their value, or discard it when the method is void.
    pub fn compile_body(&mut self, body: &Operation) -> Result<()> {
        if is_statement(body) {
            self.compile(body)?;
            self.emitter.emit_return_void();
            return Ok(());
        }

        if self.returns_value {
            if !body.produces_value() {
                return Err(CompilationError::InvalidSymbolShape {
                    expected: "value-producing expression body".into(),
                    found: body.shape_name(),
                });
            }
            self.expr().compile(body)?;
            self.emitter.emit_return();
        } else {
            self.expr().compile_discarded(body)?;
            self.emitter.emit_return_void();
        }
        Ok(())
    }

    pub fn compile(&mut self, stmt: &Operation) -> Result<()> {
        self.emitter.set_line(stmt.line);

        match &stmt.kind {
            OperationKind::Block { statements } => {
                for statement in statements {
                    self.compile(statement)?;
                }
                Ok(())
            }
            OperationKind::VariableDeclaration { local, initializer } => {
                let slot = self.ctx.frame.declare_local(local)?;
                match initializer {
                    Some(init) => self.expr().compile(init)?,
                    None => {
                        let ty = self.ctx.resolve(&local.ty)?;
                        self.emitter.emit_default(ty)?;
                    }
                }
                self.emitter.emit_set_local(slot);
                Ok(())
            }
            OperationKind::Return { value } => self.compile_return(value.as_deref()),
            OperationKind::WhileLoop { condition, body } => self.compile_while(condition, body),
            OperationKind::Conditional {
                condition,
                when_true,
                when_false,
            } if stmt.ty.is_none() => self.compile_if(condition, when_true, when_false.as_deref()),
            OperationKind::ExpressionStatement { expression } => self.expr().compile_discarded(expression),
            _ => self.expr().compile_discarded(stmt),
        }
    }

    fn compile_return(&mut self, value: Option<&Operation>) -> Result<()> {
        match value {
            Some(value) if self.returns_value => {
                self.expr().compile(value)?;
                self.emitter.emit_return();
            }
            Some(value) => {
                self.expr().compile_discarded(value)?;
                self.emitter.emit_return_void();
            }
            None if self.returns_value => {
                return Err(CompilationError::InvalidSymbolShape {
                    expected: "return with a value".into(),
                    found: "empty return".into(),
                });
            }
            None => self.emitter.emit_return_void(),
        }
        Ok(())
    }
}

/// Whether a body is written as statements rather than a bare expression.
fn is_statement(op: &Operation) -> bool {
    match &op.kind {
        OperationKind::Block { .. }
        | OperationKind::VariableDeclaration { .. }
        | OperationKind::ExpressionStatement { .. }
        | OperationKind::Return { .. }
        | OperationKind::WhileLoop { .. } => true,
        OperationKind::Conditional { .. } => op.ty.is_none(),
        _ => false,
    }
}
