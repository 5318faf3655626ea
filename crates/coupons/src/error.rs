use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("coupon store backend error: {0}")]
    Backend(String),

    #[error("coupon record corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Outcome of a redemption or lookup that did not succeed. The display text
/// of the first three variants is safe to return to clients.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Cupom não encontrado")]
    NotFound { coupon_id: String },

    #[error("Cupom não está disponível")]
    Unavailable { coupon_id: String },

    #[error("Cupom esgotado")]
    Exhausted { coupon_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Short label used as a metrics dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotFound { .. } => "not_found",
            LedgerError::Unavailable { .. } => "unavailable",
            LedgerError::Exhausted { .. } => "exhausted",
            LedgerError::Store(_) => "store",
        }
    }
}
