//! Common traits for collaborators and balance variants

use crate::models::{BalanceType, EventContext, ResolvedFactor};
use crate::OcsResult;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Filter evaluation service
///
/// Decides whether an event matches a set of declarative predicates,
/// scoped to a tenant. Implementations must return `true` for an empty
/// `filter_ids` slice and must not mutate the event.
#[async_trait]
pub trait FilterService: Send + Sync {
    /// Check that every filter in `filter_ids` passes for `event`
    async fn pass(
        &self,
        tenant: &str,
        filter_ids: &[String],
        event: &EventContext,
    ) -> OcsResult<bool>;
}

/// Debit contract shared by every balance variant
///
/// Each variant decides what its native unit is and how a request maps onto
/// it, but all of them grant at most the requested amount, honor their floor
/// and leave `units` untouched when they fail.
pub trait DebitUnits: Send + Sync + std::fmt::Debug {
    fn balance_id(&self) -> &str;

    fn balance_type(&self) -> BalanceType;

    /// Reject a malformed request before any resolution or locking
    fn validate_request(&self, requested: Decimal, increment: Decimal) -> OcsResult<()>;

    /// Debit `units` in place and return the granted amount in external units
    ///
    /// Must be called with exclusive access to `units`.
    fn debit_units(
        &self,
        units: &mut Decimal,
        factor: &ResolvedFactor,
        requested: Decimal,
        increment: Decimal,
    ) -> OcsResult<Decimal>;
}
