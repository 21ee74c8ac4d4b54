//! Error types for occurrence-engine operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Why a recurrence rule string was rejected by strict parsing.
///
/// The calendar itself never surfaces these: [`crate::rule::parse_rule`]
/// maps every failure to "no recurrence".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule has no FREQ component: '{0}'")]
    MissingFrequency(String),

    #[error("unsupported frequency '{0}'")]
    UnknownFrequency(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
