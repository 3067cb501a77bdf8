// ⚠️ Ledger errors - one taxonomy for validation, lookup and storage faults

use thiserror::Error;

/// The error type returned by every ledger operation
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Splits of a transaction do not sum to zero
    #[error("unbalanced transaction: splits sum to {sum} minor units (must be 0)")]
    Unbalanced { sum: i64 },

    /// A transaction was submitted without any split
    #[error("transaction has no splits")]
    EmptyTransaction,

    /// Input rejected before any write (missing field, bad CSV header, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// Update/delete targeted an entity that does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Delete rejected because other rows still reference the entity
    #[error("{entity} {id} is still referenced and cannot be deleted")]
    InUse { entity: &'static str, id: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for errors raised before touching storage
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::Unbalanced { .. }
                | LedgerError::EmptyTransaction
                | LedgerError::Validation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
