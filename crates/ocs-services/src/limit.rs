//! Limit policy
//!
//! Typed view of a balance's `*balanceLimit` / `*balanceUnlimited` options,
//! built once when the balance is loaded.

use ocs_core::{
    decimal::{checked_sub, decimal_from_json},
    models::{BALANCE_LIMIT_OPT, BALANCE_UNLIMITED_OPT},
    OcsError, OcsResult,
};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;

/// How far a balance may be debited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPolicy {
    /// Any amount may be debited
    Unlimited,
    /// Units may not be pushed below this value (negative allows debt,
    /// positive reserves a cushion)
    Floor(Decimal),
}

impl Default for LimitPolicy {
    fn default() -> Self {
        LimitPolicy::Floor(Decimal::ZERO)
    }
}

fn option_as_bool(balance_id: &str, value: &Value) -> OcsResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            _ => Err(OcsError::balance_config(
                balance_id,
                format!("{} must be a boolean, got <{}>", BALANCE_UNLIMITED_OPT, s),
            )),
        },
        Value::Null => Ok(false),
        other => Err(OcsError::balance_config(
            balance_id,
            format!("{} must be a boolean, got <{}>", BALANCE_UNLIMITED_OPT, other),
        )),
    }
}

impl LimitPolicy {
    /// Build the policy from raw balance options
    ///
    /// `*balanceUnlimited` takes precedence; without it the floor is
    /// `*balanceLimit`, or zero when absent.
    pub fn from_opts(balance_id: &str, opts: &HashMap<String, Value>) -> OcsResult<Self> {
        if let Some(value) = opts.get(BALANCE_UNLIMITED_OPT) {
            if option_as_bool(balance_id, value)? {
                return Ok(LimitPolicy::Unlimited);
            }
        }

        match opts.get(BALANCE_LIMIT_OPT) {
            None | Some(Value::Null) => Ok(LimitPolicy::default()),
            Some(value) => decimal_from_json(value)
                .map(LimitPolicy::Floor)
                .map_err(|e| OcsError::balance_config(balance_id, e.to_string())),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, LimitPolicy::Unlimited)
    }

    /// The floor, `None` when unlimited
    pub fn floor(&self) -> Option<Decimal> {
        match self {
            LimitPolicy::Unlimited => None,
            LimitPolicy::Floor(floor) => Some(*floor),
        }
    }

    /// Units that can be debited before reaching the floor
    ///
    /// Never negative: a balance already below its floor has no headroom.
    /// `None` when unlimited.
    pub fn headroom(&self, units: Decimal) -> OcsResult<Option<Decimal>> {
        match self {
            LimitPolicy::Unlimited => Ok(None),
            LimitPolicy::Floor(floor) => Ok(Some(checked_sub(units, *floor)?.max(Decimal::ZERO))),
        }
    }
}
