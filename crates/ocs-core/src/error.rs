//! Unified error handling for the charging engine
//!
//! Every failure raised while debiting a balance is reported through
//! [`OcsError`]. None of them is fatal to the process: the caller decides
//! whether to retry the triggering event or route it to a failure sink.

use rust_decimal::Decimal;
use thiserror::Error;

/// Main charging error type
#[derive(Error, Debug)]
pub enum OcsError {
    // ==================== Arithmetic Errors ====================
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Invalid increment: {0} (must be greater than zero)")]
    InvalidIncrement(Decimal),

    #[error("Invalid amount: {0} (must not be negative)")]
    InvalidAmount(Decimal),

    // ==================== Filter Errors ====================
    #[error("Filter evaluation failed for {filter_ids:?}: {reason}")]
    FilterEvaluationFailed {
        filter_ids: Vec<String>,
        reason: String,
    },

    #[error("Filter not found: {0}")]
    FilterNotFound(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    // ==================== Balance Errors ====================
    #[error("Invalid balance configuration for {balance_id}: {reason}")]
    InvalidBalanceConfig { balance_id: String, reason: String },

    #[error("Balance not found: {0}")]
    BalanceNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Timed out after {timeout_ms}ms waiting for balance {balance_id}")]
    GuardTimeout { balance_id: String, timeout_ms: u64 },

    // ==================== Internal Errors ====================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcsError {
    /// Shorthand for balance configuration failures
    pub fn balance_config(balance_id: impl Into<String>, reason: impl Into<String>) -> Self {
        OcsError::InvalidBalanceConfig {
            balance_id: balance_id.into(),
            reason: reason.into(),
        }
    }

    /// Returns the stable error code reported to callers
    pub fn error_code(&self) -> &'static str {
        match self {
            OcsError::InvalidNumber(_) => "invalid_number",
            OcsError::InvalidIncrement(_) => "invalid_increment",
            OcsError::InvalidAmount(_) => "invalid_amount",
            OcsError::FilterEvaluationFailed { .. } => "filter_evaluation_failed",
            OcsError::FilterNotFound(_) => "filter_not_found",
            OcsError::InvalidFilter(_) => "invalid_filter",
            OcsError::InvalidBalanceConfig { .. } => "invalid_balance_config",
            OcsError::BalanceNotFound(_) => "balance_not_found",
            OcsError::AccountNotFound(_) => "account_not_found",
            OcsError::GuardTimeout { .. } => "guard_timeout",
            OcsError::Config(_) => "config_error",
            OcsError::Serialization(_) => "serialization_error",
            OcsError::Io(_) => "io_error",
            OcsError::Internal(_) => "internal_error",
        }
    }

    /// Whether retrying the same request may succeed once the cause is fixed
    ///
    /// Arithmetic and configuration failures are deterministic; filter and
    /// lock failures depend on external state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OcsError::FilterEvaluationFailed { .. } | OcsError::GuardTimeout { .. }
        )
    }
}

// ==================== From implementations ====================

impl From<rust_decimal::Error> for OcsError {
    fn from(err: rust_decimal::Error) -> Self {
        OcsError::InvalidNumber(err.to_string())
    }
}

impl From<serde_json::Error> for OcsError {
    fn from(err: serde_json::Error) -> Self {
        OcsError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for OcsError {
    fn from(err: std::io::Error) -> Self {
        OcsError::Io(err.to_string())
    }
}

impl From<config::ConfigError> for OcsError {
    fn from(err: config::ConfigError) -> Self {
        OcsError::Config(err.to_string())
    }
}
