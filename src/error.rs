use thiserror::Error;

use crate::email::template::TemplateError;
use crate::storage::StorageError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("relay error: {0}")]
    Relay(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the underlying store rejected a write for lack of space.
    pub fn is_quota(&self) -> bool {
        matches!(self, Error::Storage(StorageError::QuotaExceeded { .. }))
    }
}
