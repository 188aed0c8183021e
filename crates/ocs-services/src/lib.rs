//! Charging services for the OCS engine
//!
//! This crate contains the balance debit engine and the services that feed
//! it: unit factor resolution, limit policy evaluation, the per-balance
//! concurrency guard, filter evaluation and bounded charge dispatching.
//!
//! # Architecture
//!
//! ```text
//!  ChargeRequest
//!        |
//!        v
//!  ChargingDispatcher (concurrency cap)
//!        |
//!        v
//!  BalanceRegistry -> GuardedBalance
//!                        |  resolve unit factor (FilterService, no lock held)
//!                        |  lock units
//!                        v
//!                   ConcreteBalance (limit policy + quantized debit)
//! ```
//!
//! # Services
//!
//! - `GuardedBalance` - Exclusive access to one balance's units
//! - `ConcreteBalance` - Floor-limited, quantized debit algorithm
//! - `BalanceRegistry` - Guarded balances by account and balance ID
//! - `ChargingDispatcher` - Bounded-concurrency charge processing
//! - `InMemoryFilterService` - Inline and named filter evaluation

pub mod concrete;
pub mod dispatcher;
pub mod filters;
pub mod guard;
pub mod limit;
pub mod registry;
pub mod unit_factor;

pub use concrete::ConcreteBalance;
pub use dispatcher::ChargingDispatcher;
pub use filters::{FilterRule, InMemoryFilterService};
pub use guard::GuardedBalance;
pub use limit::LimitPolicy;
pub use registry::BalanceRegistry;
pub use unit_factor::{resolve_dynamic_decimal, resolve_dynamic_opt, resolve_unit_factor};
