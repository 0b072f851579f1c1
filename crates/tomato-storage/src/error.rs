use tomato_accounting::error::AccountingError;
use tomato_topology::error::TopologyError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(String),
    #[error("serialization: {0}")]
    Serde(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<tokio_rusqlite::Error> for StorageError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        StorageError::Sqlite(err.to_string())
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Sqlite(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serde(err.to_string())
    }
}

impl From<StorageError> for TopologyError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => {
                TopologyError::NotFound(id.parse().unwrap_or_else(|_| tomato_core::ids::TopologyId::new()))
            }
            other => TopologyError::InvalidValue(other.to_string()),
        }
    }
}

impl From<StorageError> for AccountingError {
    fn from(_err: StorageError) -> Self {
        AccountingError::UnknownStatistics
    }
}
