//! Domain models for the charging engine

pub mod balance;
pub mod charge;
pub mod dynamic_opt;
pub mod event;
pub mod unit_factor;

pub use balance::{AccountBalances, Balance, BalanceType, BALANCE_LIMIT_OPT, BALANCE_UNLIMITED_OPT};
pub use charge::{ChargeRequest, DebitOutcome};
pub use dynamic_opt::{
    dynamic_decimal_opts_from_pairs, dynamic_decimal_opts_to_pairs, dynamic_opts_from_pairs,
    dynamic_opts_to_pairs, DynamicBoolOpt, DynamicDecimalOpt, DynamicIntOpt, DynamicOpt,
    DynamicOptValue, DynamicStringOpt, FILTER_IDS_SEP,
};
pub use event::{EventContext, OPTS_PATH_PREFIX, REQ_PATH_PREFIX};
pub use unit_factor::{ResolvedFactor, UnitFactor};
