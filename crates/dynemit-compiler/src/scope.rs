//! Slot allocation for the method being compiled.

use dynemit_core::{CompilationError, LocalSymbol, MethodSymbol, ParameterSymbol, SymbolId};
use rustc_hash::FxHashMap;

/// Argument and local slots of one method body.
///
/// Parameters live in argument slots (after `this` for instance bodies);
/// declared locals and compiler temporaries live in local slots. A
/// parameter or local that belongs to another method is a capture, which
/// is not supported.
#[derive(Debug)]
pub struct Frame {
    owner: SymbolId,
    has_this: bool,
    param_count: usize,
    locals: FxHashMap<SymbolId, u16>,
    local_count: u16,
}

impl Frame {
    pub fn for_method(method: &MethodSymbol, has_this: bool) -> Self {
        Self {
            owner: method.id,
            has_this,
            param_count: method.parameters.len(),
            locals: FxHashMap::default(),
            local_count: 0,
        }
    }

    pub fn owner(&self) -> SymbolId {
        self.owner
    }

    pub fn has_this(&self) -> bool {
        self.has_this
    }

    pub fn param_count(&self) -> usize {
        self.param_count
    }

    pub fn local_count(&self) -> usize {
        usize::from(self.local_count)
    }

    pub fn param_slot(&self, param: &ParameterSymbol) -> Result<u8, CompilationError> {
        if param.owner != self.owner {
            return Err(CompilationError::unsupported(format!("captured parameter '{}'", param.name)));
        }
        let slot = param.ordinal + usize::from(self.has_this);
        u8::try_from(slot).map_err(|_| CompilationError::unsupported("method with more than 255 parameters"))
    }

    pub fn declare_local(&mut self, local: &LocalSymbol) -> Result<u16, CompilationError> {
        if let Some(&slot) = self.locals.get(&local.id) {
            return Ok(slot);
        }
        let slot = self.temp()?;
        self.locals.insert(local.id, slot);
        Ok(slot)
    }

    pub fn local_slot(&self, local: &LocalSymbol) -> Result<u16, CompilationError> {
        self.locals
            .get(&local.id)
            .copied()
            .ok_or_else(|| CompilationError::unsupported(format!("captured local '{}'", local.name)))
    }

    /// A fresh unnamed local slot.
    pub fn temp(&mut self) -> Result<u16, CompilationError> {
        let slot = self.local_count;
        self.local_count = self
            .local_count
            .checked_add(1)
            .ok_or_else(|| CompilationError::unsupported("method with more than 65535 locals"))?;
        Ok(slot)
    }
}
