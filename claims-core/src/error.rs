use crate::types::ClaimId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("claim {0} not found")]
    ClaimNotFound(ClaimId),

    /// Rejected input; the message is safe to show to the user.
    #[error("{0}")]
    Validation(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClaimsError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ClaimNotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}

pub type ClaimsResult<T> = Result<T, ClaimsError>;
