use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReInvestError {
    #[error("Invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Non-convergence: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    NonConvergence {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Arithmetic overflow in {context}")]
    Overflow { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ReInvestError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ReInvestError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(context: impl Into<String>) -> Self {
        ReInvestError::Overflow {
            context: context.into(),
        }
    }
}

impl From<serde_json::Error> for ReInvestError {
    fn from(e: serde_json::Error) -> Self {
        ReInvestError::SerializationError(e.to_string())
    }
}
