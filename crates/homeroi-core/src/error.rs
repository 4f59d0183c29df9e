use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HomeRoiError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Numeric domain error at month {month}: equity / total paid = {ratio} has no real annualized return ({scenario})")]
    NumericDomain {
        month: u32,
        ratio: Decimal,
        scenario: String,
    },

    #[error("Result not representable: {context} overflows")]
    Overflow { context: String },

    #[error("Degenerate rate: {context}")]
    DegenerateRate { context: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for HomeRoiError {
    fn from(e: serde_json::Error) -> Self {
        HomeRoiError::SerializationError(e.to_string())
    }
}

impl From<serde_yaml::Error> for HomeRoiError {
    fn from(e: serde_yaml::Error) -> Self {
        HomeRoiError::SerializationError(e.to_string())
    }
}
