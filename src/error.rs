use thiserror::Error;

use crate::users::repo::StoreError;

/// Failures surfaced by [`crate::AccountService`].
#[derive(Debug, Error)]
pub enum AccountError {
    /// No such account, or the account is not visible to the operation.
    #[error("account not found")]
    NotFound,

    #[error("certification code does not match")]
    CertificationMismatch,

    #[error("{0} already registered")]
    Conflict(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(field) => AccountError::Conflict(field),
            StoreError::RowNotFound(_) => AccountError::NotFound,
            StoreError::Backend(e) => AccountError::Internal(e),
        }
    }
}
