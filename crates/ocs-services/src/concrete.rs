//! Concrete balance
//!
//! Debits units directly against a signed floor:
//! - Convert the request to native units with the resolved unit factor
//! - Grant it whole when it fits above the floor
//! - Otherwise grant the largest whole number of increments that fits
//! - Grant nothing (without failing) when there is no headroom left

use ocs_core::{
    decimal::{checked_div, checked_mul, checked_sub, floor_to_multiple},
    models::{Balance, BalanceType, ResolvedFactor},
    traits::DebitUnits,
    OcsError, OcsResult,
};
use rust_decimal::Decimal;
use tracing::debug;

use crate::limit::LimitPolicy;

/// Floor-limited, quantized balance variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcreteBalance {
    id: String,
    limit: LimitPolicy,
}

impl ConcreteBalance {
    /// Build the variant from a persisted balance
    ///
    /// # Errors
    ///
    /// Returns `InvalidBalanceConfig` if:
    /// - The balance is not tagged `*concrete`
    /// - Its limit options cannot be parsed
    /// - A unit factor is zero or negative
    pub fn new(balance: &Balance) -> OcsResult<Self> {
        if balance.balance_type != BalanceType::Concrete {
            return Err(OcsError::balance_config(
                &balance.id,
                format!("unsupported balance type {}", balance.balance_type),
            ));
        }

        if let Some(uf) = balance
            .unit_factors
            .iter()
            .find(|uf| uf.factor <= Decimal::ZERO)
        {
            return Err(OcsError::balance_config(
                &balance.id,
                format!(
                    "unit factor {} for filters {:?} must be greater than zero",
                    uf.factor, uf.filter_ids
                ),
            ));
        }

        Ok(Self {
            id: balance.id.clone(),
            limit: LimitPolicy::from_opts(&balance.id, &balance.opts)?,
        })
    }

    pub fn limit(&self) -> LimitPolicy {
        self.limit
    }

    /// Native units to remove for a request, computed without touching `units`
    fn native_grant(
        &self,
        units: Decimal,
        native_requested: Decimal,
        native_increment: Decimal,
    ) -> OcsResult<Decimal> {
        let available = match self.limit.headroom(units)? {
            None => return Ok(native_requested),
            Some(available) => available,
        };

        if native_requested <= available {
            return Ok(native_requested);
        }

        let granted = floor_to_multiple(available, native_increment)?;
        debug!(
            "Balance {} headroom {} below request {}, quantized to {}",
            self.id, available, native_requested, granted
        );
        Ok(granted)
    }
}

impl DebitUnits for ConcreteBalance {
    fn balance_id(&self) -> &str {
        &self.id
    }

    fn balance_type(&self) -> BalanceType {
        BalanceType::Concrete
    }

    fn validate_request(&self, requested: Decimal, increment: Decimal) -> OcsResult<()> {
        if requested < Decimal::ZERO {
            return Err(OcsError::InvalidAmount(requested));
        }
        if !self.limit.is_unlimited() && increment <= Decimal::ZERO {
            return Err(OcsError::InvalidIncrement(increment));
        }
        Ok(())
    }

    fn debit_units(
        &self,
        units: &mut Decimal,
        factor: &ResolvedFactor,
        requested: Decimal,
        increment: Decimal,
    ) -> OcsResult<Decimal> {
        self.validate_request(requested, increment)?;
        if factor.factor <= Decimal::ZERO {
            return Err(OcsError::balance_config(
                &self.id,
                format!("unit factor {} must be greater than zero", factor.factor),
            ));
        }

        let native_requested = checked_mul(requested, factor.factor)?;
        let native_increment = checked_mul(increment, factor.factor)?;
        let native_granted = self.native_grant(*units, native_requested, native_increment)?;

        let granted = if native_granted == native_requested {
            requested
        } else {
            checked_div(native_granted, factor.factor)?
        };
        let remaining = checked_sub(*units, native_granted)?;

        debug!(
            "Balance {} debit: requested {} (native {}), granted {} (native {}), units {} -> {}",
            self.id, requested, native_requested, granted, native_granted, units, remaining
        );

        *units = remaining;
        Ok(granted)
    }
}
