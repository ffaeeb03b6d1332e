//! # Kanban Core
//!
//! Persistent columns of ordered tickets.
//!
//! Within every column ticket `order` values always form `0..N` with no gaps
//! or duplicates. [`BoardService`] keeps it that way across inserts, moves,
//! reorders and deletes, and serves each column page by page. Storage is
//! pluggable through the [`Store`] trait; rendering is left to the caller.

pub mod domain;
pub mod error;
pub mod service;
pub mod storage;

// Re-export commonly used types
pub use domain::{
    board::{BoardConfig, Column, ColumnId, ColumnView},
    ordering::Position,
    pagination::{Page, PageRequest},
    ticket::{NewTicket, Ticket, TicketEdit, TicketId, TicketPatch},
};
pub use error::{KanbanError, Result};
pub use service::BoardService;
pub use storage::{memory_storage::MemoryStorage, Store, TicketFilter, TicketQuery, WriteBatch};

#[cfg(feature = "file-storage")]
pub use storage::file_storage::FileStorage;

#[cfg(feature = "sqlite-storage")]
pub use storage::sqlite_storage::SqliteStorage;
