use bridge_traits::{BridgeError, FailureCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Index pass cancelled")]
    Cancelled,

    #[error("Index worker is shut down")]
    WorkerClosed,
}

impl IndexError {
    /// Failure code recorded in pass statistics for this error.
    pub fn failure_code(&self) -> FailureCode {
        match self {
            IndexError::Bridge(e) => e.failure_code(),
            IndexError::Config(_) => FailureCode::InvalidArgument,
            IndexError::Cancelled | IndexError::WorkerClosed => FailureCode::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
