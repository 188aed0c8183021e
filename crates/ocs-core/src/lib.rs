//! OCS Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the charging engine. It includes:
//!
//! - Exact decimal arithmetic helpers
//! - Domain models (Balance, UnitFactor, EventContext, dynamic options)
//! - The seams to external collaborators (filter evaluation) and the
//!   contract every debit-capable balance variant implements
//! - Unified error handling
//! - Application configuration

pub mod config;
pub mod decimal;
pub mod error;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::OcsError;

/// Result type alias using OcsError
pub type OcsResult<T> = Result<T, OcsError>;
