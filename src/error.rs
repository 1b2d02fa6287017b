//! Engine error types

use thiserror::Error;

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// Price history shorter than the rule needs. The host should skip the session.
    #[error("Invalid history length: need at least {required} values, got {actual}")]
    InvalidHistoryLength { required: usize, actual: usize },

    /// NaN or infinite value in a price series
    #[error("Non-finite price in {context}")]
    NonFinitePrice { context: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Stop management requested while the engine holds no position
    #[error("No position held; stop management requires a long position")]
    NotInvested,
}

impl EngineError {
    pub fn history(required: usize, actual: usize) -> Self {
        Self::InvalidHistoryLength { required, actual }
    }

    pub fn non_finite(context: impl Into<String>) -> Self {
        Self::NonFinitePrice {
            context: context.into(),
        }
    }

    /// Fail unless every value is finite
    pub fn ensure_finite(values: &[f64], context: &str) -> Result<()> {
        if values.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(Self::non_finite(context))
        }
    }

    pub fn division_by_zero(context: impl Into<String>) -> Self {
        Self::DivisionByZero {
            context: context.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
