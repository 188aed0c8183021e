//! Guarded balance
//!
//! The only handle through which a balance's units can be read or changed.
//! Unit factor resolution happens before the lock is taken; the floor check
//! and the mutation happen together while it is held.

use ocs_core::{
    models::{Balance, BalanceType, DebitOutcome, EventContext, ResolvedFactor, UnitFactor},
    traits::{DebitUnits, FilterService},
    OcsError, OcsResult,
};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};

use crate::concrete::ConcreteBalance;
use crate::unit_factor::resolve_unit_factor;

/// Balance with exclusive access to its units
#[derive(Debug)]
pub struct GuardedBalance {
    variant: Box<dyn DebitUnits>,
    opts: HashMap<String, Value>,
    unit_factors: Vec<UnitFactor>,
    units: Mutex<Decimal>,
    lock_timeout: Option<Duration>,
}

impl GuardedBalance {
    /// Take ownership of a persisted balance
    ///
    /// Fails with `InvalidBalanceConfig` for unsupported balance types or
    /// invalid options.
    pub fn new(balance: Balance) -> OcsResult<Self> {
        let variant: Box<dyn DebitUnits> = match balance.balance_type {
            BalanceType::Concrete => Box::new(ConcreteBalance::new(&balance)?),
            other => {
                return Err(OcsError::balance_config(
                    &balance.id,
                    format!("unsupported balance type {}", other),
                ))
            }
        };

        Ok(Self {
            variant,
            opts: balance.opts,
            unit_factors: balance.unit_factors,
            units: Mutex::new(balance.units),
            lock_timeout: None,
        })
    }

    /// Give up on the lock after `timeout` instead of waiting indefinitely
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn id(&self) -> &str {
        self.variant.balance_id()
    }

    pub fn balance_type(&self) -> BalanceType {
        self.variant.balance_type()
    }

    pub fn unit_factors(&self) -> &[UnitFactor] {
        &self.unit_factors
    }

    /// Current units
    pub fn units(&self) -> OcsResult<Decimal> {
        Ok(*self.lock()?)
    }

    /// Persistable copy of the balance with its current units
    pub fn snapshot(&self) -> OcsResult<Balance> {
        let units = self.units()?;
        Ok(Balance {
            id: self.id().to_string(),
            balance_type: self.balance_type(),
            units,
            opts: self.opts.clone(),
            unit_factors: self.unit_factors.clone(),
        })
    }

    /// Debit the balance for one event
    ///
    /// Resolves the unit factor through `filters` using the event's tenant,
    /// then debits under the lock. Any failure leaves the units unchanged.
    #[instrument(skip(self, filters, event), fields(balance_id = %self.id(), event_id = %event.id))]
    pub async fn debit<F>(
        &self,
        filters: &F,
        requested: Decimal,
        increment: Decimal,
        event: &EventContext,
    ) -> OcsResult<DebitOutcome>
    where
        F: FilterService + ?Sized,
    {
        self.variant.validate_request(requested, increment)?;

        let resolved =
            resolve_unit_factor(filters, &event.tenant, &self.unit_factors, event).await?;

        self.debit_resolved(&resolved, requested, increment)
    }

    /// Debit with an already resolved unit factor
    pub fn debit_resolved(
        &self,
        factor: &ResolvedFactor,
        requested: Decimal,
        increment: Decimal,
    ) -> OcsResult<DebitOutcome> {
        let (granted, units_after) = {
            let mut units = self.lock()?;
            let granted = self
                .variant
                .debit_units(&mut units, factor, requested, increment)?;
            (granted, *units)
        };

        info!(
            "Balance {} granted {} of {} (factor {}), units now {}",
            self.id(),
            granted,
            requested,
            factor.factor,
            units_after
        );

        Ok(DebitOutcome {
            balance_id: self.id().to_string(),
            requested,
            granted,
            unit_factor: factor.source.clone(),
            units_after,
        })
    }

    fn lock(&self) -> OcsResult<MutexGuard<'_, Decimal>> {
        match self.lock_timeout {
            None => Ok(self.units.lock()),
            Some(timeout) => {
                self.units
                    .try_lock_for(timeout)
                    .ok_or_else(|| OcsError::GuardTimeout {
                        balance_id: self.id().to_string(),
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    })
            }
        }
    }
}
