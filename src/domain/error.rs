use crate::domain::Money;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error("Ingestion failed with: {0}")]
    Ingestion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("invalid amount {0}")]
    InvalidAmount(Money),

    #[error("insufficient balance: requested {requested}, spendable {spendable}")]
    InsufficientBalance { requested: Money, spendable: Money },

    #[error("invalid authorized amount: requested {requested}, authorized {authorized}")]
    InvalidAuthorizedAmount { requested: Money, authorized: Money },

    #[error("invalid captured amount: requested {requested}, captured {captured}")]
    InvalidCapturedAmount { requested: Money, captured: Money },

    #[error("identifier generation failed: {0}")]
    Generation(String),

    #[error("storage conflict: {0}")]
    StorageConflict(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: &'static str, id: impl ToString) -> Self {
        Error::AlreadyExists {
            entity,
            id: id.to_string(),
        }
    }

    /// Only conflicts are worth retrying; every other failure is final for the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StorageConflict(_))
    }
}
