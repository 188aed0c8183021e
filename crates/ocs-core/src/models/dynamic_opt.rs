//! Dynamic options
//!
//! An option whose value depends on the event: a list of
//! `(filter_ids, value)` entries where the first entry whose filters pass
//! provides the value. Configuration expresses each entry as a
//! `;`-separated filter ID string and a value, e.g. `("fltr1;fltr2", "3")`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::parse_decimal;
use crate::{OcsError, OcsResult};

/// Separator between filter IDs in a dynamic option key
pub const FILTER_IDS_SEP: char = ';';

/// Value type usable in a dynamic option
pub trait DynamicOptValue: Sized {
    /// Parse the configured text form
    fn parse_opt(input: &str) -> OcsResult<Self>;

    /// Text form that `parse_opt` reads back to the same value
    fn format_opt(&self) -> String;
}

impl DynamicOptValue for String {
    fn parse_opt(input: &str) -> OcsResult<Self> {
        Ok(input.to_string())
    }

    fn format_opt(&self) -> String {
        self.clone()
    }
}

impl DynamicOptValue for bool {
    fn parse_opt(input: &str) -> OcsResult<Self> {
        match input.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(OcsError::Config(format!(
                "can't convert <{}> to bool",
                input
            ))),
        }
    }

    fn format_opt(&self) -> String {
        self.to_string()
    }
}

impl DynamicOptValue for i64 {
    fn parse_opt(input: &str) -> OcsResult<Self> {
        input
            .trim()
            .parse()
            .map_err(|_| OcsError::InvalidNumber(format!("can't convert <{}> to int", input)))
    }

    fn format_opt(&self) -> String {
        self.to_string()
    }
}

impl DynamicOptValue for Decimal {
    fn parse_opt(input: &str) -> OcsResult<Self> {
        parse_decimal(input)
    }

    fn format_opt(&self) -> String {
        self.to_string()
    }
}

/// Value selected by filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicOpt<T> {
    #[serde(default)]
    pub filter_ids: Vec<String>,
    pub value: T,
}

pub type DynamicDecimalOpt = DynamicOpt<Decimal>;
pub type DynamicStringOpt = DynamicOpt<String>;
pub type DynamicBoolOpt = DynamicOpt<bool>;
pub type DynamicIntOpt = DynamicOpt<i64>;

impl<T> DynamicOpt<T> {
    pub fn new(filter_ids: Vec<String>, value: T) -> Self {
        Self { filter_ids, value }
    }

    /// Filter IDs in their configured `;`-joined form
    pub fn filter_ids_key(&self) -> String {
        self.filter_ids.join(&FILTER_IDS_SEP.to_string())
    }
}

fn split_filter_ids(key: &str) -> Vec<String> {
    key.split(FILTER_IDS_SEP)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `(filter IDs, value)` pairs into dynamic options
///
/// Configured order is kept, since the first passing entry wins.
pub fn dynamic_opts_from_pairs<'a, T, I>(pairs: I) -> OcsResult<Vec<DynamicOpt<T>>>
where
    T: DynamicOptValue,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(filter_ids, value)| {
            Ok(DynamicOpt::new(
                split_filter_ids(filter_ids),
                T::parse_opt(value)?,
            ))
        })
        .collect()
}

/// Render dynamic options back to `(filter IDs, value)` pairs, in order
pub fn dynamic_opts_to_pairs<T: DynamicOptValue>(opts: &[DynamicOpt<T>]) -> Vec<(String, String)> {
    opts.iter()
        .map(|opt| (opt.filter_ids_key(), opt.value.format_opt()))
        .collect()
}

pub fn dynamic_decimal_opts_from_pairs<'a, I>(pairs: I) -> OcsResult<Vec<DynamicDecimalOpt>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    dynamic_opts_from_pairs(pairs)
}

pub fn dynamic_decimal_opts_to_pairs(opts: &[DynamicDecimalOpt]) -> Vec<(String, String)> {
    dynamic_opts_to_pairs(opts)
}
