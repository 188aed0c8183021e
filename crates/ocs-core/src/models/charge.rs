//! Charge request and debit outcome models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::event::EventContext;
use super::unit_factor::UnitFactor;

/// A request to debit one balance of one account
///
/// Amounts are expressed in the external unit; the balance converts them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub account_id: String,
    pub balance_id: String,

    /// Requested amount
    pub amount: Decimal,

    /// Granularity of partial grants; resolved from configuration when absent
    #[serde(default)]
    pub increment: Option<Decimal>,

    pub event: EventContext,
}

/// Result of a successful debit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebitOutcome {
    pub balance_id: String,

    /// Requested amount, external unit
    pub requested: Decimal,

    /// Granted amount, external unit
    pub granted: Decimal,

    /// Unit factor applied, `None` for the identity conversion
    pub unit_factor: Option<UnitFactor>,

    /// Balance units after the debit, native unit
    pub units_after: Decimal,
}

impl DebitOutcome {
    /// Whether less than the requested amount was granted
    pub fn is_partial(&self) -> bool {
        self.granted < self.requested
    }
}
