//! `if` and `while`.

use super::{Result, StmtCompiler};
use crate::bytecode::OpCode;
use dynemit_core::Operation;

impl StmtCompiler<'_, '_, '_> {
    pub(super) fn compile_if(
        &mut self,
        condition: &Operation,
        then_branch: &Operation,
        else_branch: Option<&Operation>,
    ) -> Result<()> {
        self.expr().compile(condition)?;
        let else_jump = self.emitter.emit_jump(OpCode::JumpIfFalse);
        self.compile(then_branch)?;

        match else_branch {
            Some(else_branch) => {
                let end_jump = self.emitter.emit_jump(OpCode::Jump);
                self.emitter.patch_jump(else_jump)?;
                self.compile(else_branch)?;
                self.emitter.patch_jump(end_jump)
            }
            None => self.emitter.patch_jump(else_jump),
        }
    }

    pub(super) fn compile_while(&mut self, condition: &Operation, body: &Operation) -> Result<()> {
        let loop_start = self.emitter.current_offset();
        self.expr().compile(condition)?;
        let exit_jump = self.emitter.emit_jump(OpCode::JumpIfFalse);
        self.compile(body)?;
        self.emitter.emit_loop(loop_start)?;
        self.emitter.patch_jump(exit_jump)
    }
}
