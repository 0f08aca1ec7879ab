//! Overload scoring and selection.
//!
//! Requested argument types are closed hashes; candidate parameters are
//! [`TypeRef`]s that may still mention generic parameters. Exact matches cost
//! nothing, each generic peeling step costs one, and a bare generic parameter
//! binds anything at a doubling cost.

use crate::catalog::TypeCatalog;
use crate::entries::{MethodEntry, TypeRef};
use dynemit_core::TypeHash;
use std::sync::Arc;
use tracing::trace;

/// A method with its parameter types as seen from the receiver type.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub method: Arc<MethodEntry>,
    pub params: Vec<TypeRef>,
}

pub fn overload_compatible(catalog: &TypeCatalog, requested: &[TypeHash], candidate: &[TypeRef]) -> bool {
    score(catalog, requested, candidate).is_some()
}

/// Distance of a compatible candidate; `u32::MAX` when incompatible.
pub fn overload_distance(catalog: &TypeCatalog, requested: &[TypeHash], candidate: &[TypeRef]) -> u32 {
    score(catalog, requested, candidate).unwrap_or(u32::MAX)
}

/// Compatible candidate with the lowest distance, first registered on ties.
pub fn select_overload(catalog: &TypeCatalog, requested: &[TypeHash], candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let distance = score(catalog, requested, &candidate.params)?;
            trace!(method = %candidate.method.name, distance, "overload candidate");
            Some((distance, candidate))
        })
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}

fn score(catalog: &TypeCatalog, requested: &[TypeHash], candidate: &[TypeRef]) -> Option<u32> {
    if requested.len() != candidate.len() {
        return None;
    }
    requested
        .iter()
        .zip(candidate)
        .try_fold(0u32, |total, (req, param)| position(catalog, *req, param, total))
}

fn position(catalog: &TypeCatalog, requested: TypeHash, candidate: &TypeRef, total: u32) -> Option<u32> {
    if candidate.closed_hash() == Some(requested) {
        return Some(total);
    }
    if candidate.is_generic_param() {
        return Some(total.saturating_add(1).saturating_mul(2));
    }
    if !candidate.contains_generic_params() || !catalog.is_closed_generic(requested) {
        return None;
    }

    let mut total = total;
    let mut requested = requested;
    let mut candidate = candidate.clone();
    loop {
        requested = catalog.peel(requested)?;
        candidate = peel_ref(catalog, &candidate)?;
        total = total.saturating_add(1);
        if candidate.closed_hash() == Some(requested) {
            return Some(total);
        }
    }
}

fn peel_ref(catalog: &TypeCatalog, ty: &TypeRef) -> Option<TypeRef> {
    match ty {
        TypeRef::Generic { definition, .. } => Some(TypeRef::Concrete(*definition)),
        TypeRef::Concrete(hash) => catalog.peel(*hash).map(TypeRef::Concrete),
        TypeRef::Void | TypeRef::TypeParam(_) | TypeRef::MethodParam(_) => None,
    }
}
