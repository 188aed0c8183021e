//! Unit factor model
//!
//! A unit factor converts one external request unit into balance-native
//! units, e.g. `100` when the balance holds cents and requests are in whole
//! currency units.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Filter-selected conversion factor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFactor {
    /// Filters that must all pass for this factor to apply (empty = always)
    #[serde(default)]
    pub filter_ids: Vec<String>,

    /// Native units per external unit
    pub factor: Decimal,
}

impl UnitFactor {
    pub fn new(filter_ids: Vec<String>, factor: Decimal) -> Self {
        Self { filter_ids, factor }
    }

    /// Factor that applies to every event
    pub fn unconditional(factor: Decimal) -> Self {
        Self {
            filter_ids: Vec::new(),
            factor,
        }
    }
}

/// Outcome of unit factor resolution for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFactor {
    pub factor: Decimal,

    /// The matched entry, `None` when the identity factor was used
    pub source: Option<UnitFactor>,
}

impl ResolvedFactor {
    /// Identity conversion used when no unit factor matches
    pub fn identity() -> Self {
        Self {
            factor: Decimal::ONE,
            source: None,
        }
    }

    pub fn matched(unit_factor: &UnitFactor) -> Self {
        Self {
            factor: unit_factor.factor,
            source: Some(unit_factor.clone()),
        }
    }
}

impl Default for ResolvedFactor {
    fn default() -> Self {
        Self::identity()
    }
}
