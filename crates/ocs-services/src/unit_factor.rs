//! Unit factor resolution
//!
//! Selects, for one event, the first entry of an ordered list whose filters
//! pass. Used for balance unit factors and for filter-selected option values.

use ocs_core::{
    models::{DynamicDecimalOpt, DynamicOpt, EventContext, ResolvedFactor, UnitFactor},
    traits::FilterService,
    OcsError, OcsResult,
};
use rust_decimal::Decimal;
use tracing::debug;

/// Index of the first candidate whose filter IDs pass for `event`
async fn first_passing<F>(
    filters: &F,
    tenant: &str,
    candidates: &[&[String]],
    event: &EventContext,
) -> OcsResult<Option<usize>>
where
    F: FilterService + ?Sized,
{
    for (idx, filter_ids) in candidates.iter().copied().enumerate() {
        let passed = filters
            .pass(tenant, filter_ids, event)
            .await
            .map_err(|e| OcsError::FilterEvaluationFailed {
                filter_ids: filter_ids.to_vec(),
                reason: e.to_string(),
            })?;
        if passed {
            return Ok(Some(idx));
        }
    }
    Ok(None)
}

/// Resolve the conversion factor for `event`
///
/// Returns the first matching unit factor, or the identity factor when the
/// list is empty or nothing matches. Filter failures abort with
/// [`OcsError::FilterEvaluationFailed`].
pub async fn resolve_unit_factor<F>(
    filters: &F,
    tenant: &str,
    unit_factors: &[UnitFactor],
    event: &EventContext,
) -> OcsResult<ResolvedFactor>
where
    F: FilterService + ?Sized,
{
    if unit_factors.is_empty() {
        return Ok(ResolvedFactor::identity());
    }

    let candidates: Vec<&[String]> = unit_factors
        .iter()
        .map(|uf| uf.filter_ids.as_slice())
        .collect();
    let matched = first_passing(filters, tenant, &candidates, event).await?;

    Ok(match matched {
        Some(idx) => {
            debug!(
                "Event {} matched unit factor {} (filters {:?})",
                event.id, unit_factors[idx].factor, unit_factors[idx].filter_ids
            );
            ResolvedFactor::matched(&unit_factors[idx])
        }
        None => ResolvedFactor::identity(),
    })
}

/// Resolve a filter-selected option, `None` when nothing matches
pub async fn resolve_dynamic_opt<F, T>(
    filters: &F,
    tenant: &str,
    opts: &[DynamicOpt<T>],
    event: &EventContext,
) -> OcsResult<Option<T>>
where
    F: FilterService + ?Sized,
    T: Clone,
{
    let candidates: Vec<&[String]> = opts.iter().map(|opt| opt.filter_ids.as_slice()).collect();
    let matched = first_passing(filters, tenant, &candidates, event).await?;

    Ok(matched.map(|idx| opts[idx].value.clone()))
}

pub async fn resolve_dynamic_decimal<F>(
    filters: &F,
    tenant: &str,
    opts: &[DynamicDecimalOpt],
    event: &EventContext,
) -> OcsResult<Option<Decimal>>
where
    F: FilterService + ?Sized,
{
    resolve_dynamic_opt(filters, tenant, opts, event).await
}
