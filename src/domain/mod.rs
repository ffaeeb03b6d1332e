pub mod board;
pub mod ordering;
pub mod pagination;
pub mod ticket;

pub use board::{BoardConfig, Column, ColumnId, ColumnView};
pub use ordering::{
    compact, insert_at, is_dense, move_within, reindex_full, remove_from, Insertion, Position,
};
pub use pagination::{Page, PageRequest};
pub use ticket::{NewTicket, Ticket, TicketEdit, TicketId, TicketPatch};
