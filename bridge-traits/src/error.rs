use thiserror::Error;

use crate::index::FailureCode;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Source store query failed: {0}")]
    SourceUnavailable(String),

    #[error("Index store error ({code}): {message}")]
    Index { code: FailureCode, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Failure code recorded in per-pass statistics for this error.
    pub fn failure_code(&self) -> FailureCode {
        match self {
            BridgeError::SourceUnavailable(_) => FailureCode::SourceUnavailable,
            BridgeError::Index { code, .. } => *code,
            BridgeError::Io(_) => FailureCode::Io,
            BridgeError::Serialization(_) => FailureCode::InvalidArgument,
            BridgeError::NotAvailable(_) | BridgeError::OperationFailed(_) => {
                FailureCode::Internal
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
