use thiserror::Error;

pub type CourierResult<T> = Result<T, CourierError>;

#[derive(Error, Debug)]
pub enum CourierError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client-facing message naming the first missing or invalid field.
    #[error("{0}")]
    Validation(String),

    #[error("Segment {segment} failed: {reason}")]
    SegmentProcessing { segment: String, reason: String },

    #[error("Message for customer {customer} failed: {reason}")]
    CustomerMessage { customer: String, reason: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CourierError {
    pub fn missing_field(field: &str) -> Self {
        CourierError::Validation(format!("Campo obrigatório ausente: {field}"))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CourierError::Validation(_))
    }
}
