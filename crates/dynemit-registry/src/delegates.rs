//! Delegate families used as function-value types.
//!
//! `Proc` / `Proc<T1..Tn>` take `n` arguments and return nothing;
//! `Func<T1..Tn, TResult>` take `n` arguments and return `TResult`.

use crate::entries::{TypeRef, generic_key};
use crate::module::{Module, TypeBuilder};
use dynemit_core::TypeHash;

/// Highest supported delegate arity.
pub const MAX_DELEGATE_ARITY: usize = 8;

pub const PROC: &str = "Proc";
pub const FUNC: &str = "Func";

/// Arity-indexed delegate definitions.
#[derive(Debug, Clone)]
pub struct DelegateFamilies {
    procs: Vec<TypeHash>,
    funcs: Vec<TypeHash>,
}

impl DelegateFamilies {
    /// The families registered by the `system` module.
    pub fn standard() -> Self {
        let procs = (0..=MAX_DELEGATE_ARITY)
            .map(|arity| TypeHash::from_name(&generic_key(PROC, arity)))
            .collect();
        let funcs = (0..=MAX_DELEGATE_ARITY)
            .map(|arity| TypeHash::from_name(&generic_key(FUNC, arity + 1)))
            .collect();
        Self { procs, funcs }
    }

    /// Void-returning definition taking `arity` arguments.
    pub fn proc(&self, arity: usize) -> Option<TypeHash> {
        self.procs.get(arity).copied()
    }

    /// Value-returning definition taking `arity` arguments.
    pub fn func(&self, arity: usize) -> Option<TypeHash> {
        self.funcs.get(arity).copied()
    }

    /// Add every family member to `module`.
    pub(crate) fn register(module: &mut Module) {
        for arity in 0..=MAX_DELEGATE_ARITY {
            let params: Vec<TypeRef> = (0..arity).map(TypeRef::type_param).collect();
            let names: Vec<String> = (1..=arity).map(|i| format!("T{i}")).collect();
            let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

            let proc = TypeBuilder::<()>::delegate(PROC, params.clone(), TypeRef::Void);
            let proc = if arity == 0 { proc } else { proc.generic_params(&name_refs) };
            module.add(proc.build());

            let mut func_names = name_refs.clone();
            func_names.push("TResult");
            let func = TypeBuilder::<()>::delegate(FUNC, params, TypeRef::type_param(arity)).generic_params(&func_names);
            module.add(func.build());
        }
    }
}
