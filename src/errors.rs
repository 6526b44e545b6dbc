use sea_orm::error::{DbErr, SqlErr};
use sea_orm::TransactionError;

/// Error taxonomy for the inventory engine.
///
/// The four "business" variants (`Validation`, `NotFound`,
/// `InsufficientStock`, `InvalidTransition`) carry enough detail for the
/// caller to correct its input. `Conflict` is retryable and handled by the
/// transaction runner before it ever reaches a caller. `Integrity` is fatal:
/// it means a balance write and its ledger row disagreed, which the
/// transaction boundary exists to make impossible.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),
}

impl ServiceError {
    /// Maps a storage error, folding write-write conflicts into `Conflict`
    /// so the transaction runner can retry them.
    pub fn db_error(err: DbErr) -> Self {
        if is_conflict(&err) {
            ServiceError::Conflict(err.to_string())
        } else {
            ServiceError::Database(err)
        }
    }

    /// True for errors the transaction runner may retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Conflict(_) => true,
            ServiceError::Database(db_err) => {
                matches!(db_err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
            }
            _ => false,
        }
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        }
    }
}

/// Conflict detection: unique-index violations (two writers creating the
/// same bucket key) and serialization aborts both resolve to a retry.
fn is_conflict(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    let msg = err.to_string().to_lowercase();
    msg.contains("could not serialize")
        || msg.contains("serialization failure")
        || msg.contains("deadlock")
        || msg.contains("database is locked")
        || msg.contains("database table is locked")
}
