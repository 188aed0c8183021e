//! Balance model
//!
//! The persisted shape of a debitable balance. Its options are kept as a raw
//! map here; the charging engine turns them into a typed limit policy once,
//! when the balance is loaded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use super::unit_factor::UnitFactor;

/// Option holding the floor a balance may be debited down to
pub const BALANCE_LIMIT_OPT: &str = "*balanceLimit";

/// Option disabling the floor entirely
pub const BALANCE_UNLIMITED_OPT: &str = "*balanceUnlimited";

/// Balance variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BalanceType {
    /// Units debited directly against a floor
    #[default]
    #[serde(rename = "*concrete")]
    Concrete,
    /// Usage-tracking balance charged through rating
    #[serde(rename = "*abstract")]
    Abstract,
}

impl fmt::Display for BalanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceType::Concrete => write!(f, "*concrete"),
            BalanceType::Abstract => write!(f, "*abstract"),
        }
    }
}

/// Balance entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Identifier, unique within the owning account
    pub id: String,

    /// Variant tag
    #[serde(rename = "type", default)]
    pub balance_type: BalanceType,

    /// Current value in the balance's native unit
    pub units: Decimal,

    /// Raw options (`*balanceLimit`, `*balanceUnlimited`)
    #[serde(default)]
    pub opts: HashMap<String, Value>,

    /// Ordered conversion factors, first match wins
    #[serde(default)]
    pub unit_factors: Vec<UnitFactor>,
}

impl Balance {
    /// Create a concrete balance with no options and no unit factors
    pub fn concrete(id: impl Into<String>, units: Decimal) -> Self {
        Self {
            id: id.into(),
            balance_type: BalanceType::Concrete,
            units,
            opts: HashMap::new(),
            unit_factors: Vec::new(),
        }
    }

    pub fn with_limit(mut self, limit: Decimal) -> Self {
        self.opts
            .insert(BALANCE_LIMIT_OPT.to_string(), Value::String(limit.to_string()));
        self
    }

    pub fn unlimited(mut self) -> Self {
        self.opts
            .insert(BALANCE_UNLIMITED_OPT.to_string(), Value::Bool(true));
        self
    }

    pub fn with_unit_factor(mut self, unit_factor: UnitFactor) -> Self {
        self.unit_factors.push(unit_factor);
        self
    }
}

/// Balances owned by one account, as persisted in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalances {
    pub account_id: String,
    #[serde(default)]
    pub balances: Vec<Balance>,
}
