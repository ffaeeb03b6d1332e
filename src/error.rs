use crate::domain::{ColumnId, TicketId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KanbanError>;

#[derive(Debug, Error)]
pub enum KanbanError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    #[error("Column not found: {0}")]
    ColumnNotFound(ColumnId),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Ticket {ticket} left column {from} but was not placed in column {to}: {source}")]
    PartialMove {
        ticket: TicketId,
        from: ColumnId,
        to: ColumnId,
        #[source]
        source: Box<KanbanError>,
    },

    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "sqlite-storage")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl KanbanError {
    /// True for missing ticket or column references
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TicketNotFound(_) | Self::ColumnNotFound(_))
    }

    /// True when repeating the same call is safe and expected to finish the work
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PartialMove { .. })
    }

    /// Folds any failure during store open/seed into `StoreUnavailable`
    pub(crate) fn unavailable(self) -> Self {
        match self {
            Self::StoreUnavailable(_) => self,
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}
