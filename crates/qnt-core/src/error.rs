use thiserror::Error;

use crate::adjust::AdjustError;
use crate::optimizer::OptimizeError;

/// Validation and contract errors exposed by `qnt-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with a letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid interval '{value}', expected one of 1m, 5m, 15m, 1h, 1d")]
    InvalidInterval { value: String },
    #[error("invalid source class '{value}', expected one of equity (tsetmc), crypto")]
    InvalidSourceClass { value: String },
    #[error("invalid method '{value}', expected one of gmv, msr")]
    InvalidMethod { value: String },

    #[error("symbol request must contain at least one identifier")]
    EmptySymbolSpec,

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("timestamp is out of range: {value}")]
    TimestampOutOfRange { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' must be greater than zero")]
    NonPositiveValue { field: &'static str },

    #[error("invalid proxy url '{value}'")]
    InvalidProxy { value: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Adjust(#[from] AdjustError),

    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
