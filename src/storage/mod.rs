use crate::{
    domain::{Column, ColumnId, NewTicket, Ticket, TicketId, TicketPatch},
    error::{KanbanError, Result},
};
use async_trait::async_trait;

#[cfg(feature = "file-storage")]
pub mod file_storage;
pub mod memory_storage;
mod tables;

#[cfg(feature = "sqlite-storage")]
pub mod sqlite_storage;

/// Secondary-key restrictions for ticket scans
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub column_id: Option<ColumnId>,
    /// Only tickets with `order > order_above`
    pub order_above: Option<u32>,
    /// Only tickets with `order >= order_at_least`
    pub order_at_least: Option<u32>,
}

impl TicketFilter {
    pub fn column(column_id: ColumnId) -> Self {
        Self {
            column_id: Some(column_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.column_id.map_or(true, |id| ticket.column_id == id)
            && self.order_above.map_or(true, |o| ticket.order > o)
            && self.order_at_least.map_or(true, |o| ticket.order >= o)
    }
}

/// A range scan. Results are always sorted by `order` ascending, then id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketQuery {
    pub filter: TicketFilter,
    pub limit: Option<usize>,
}

impl TicketQuery {
    /// Every ticket of one column
    pub fn column(column_id: ColumnId) -> Self {
        Self {
            filter: TicketFilter::column(column_id),
            limit: None,
        }
    }
}

/// Writes that a store must apply all together or not at all
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub inserts: Vec<NewTicket>,
    pub upserts: Vec<Ticket>,
    pub deletes: Vec<TicketId>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, ticket: NewTicket) -> Self {
        self.inserts.push(ticket);
        self
    }

    pub fn upsert(mut self, ticket: Ticket) -> Self {
        self.upserts.push(ticket);
        self
    }

    pub fn upsert_all(mut self, tickets: impl IntoIterator<Item = Ticket>) -> Self {
        self.upserts.extend(tickets);
        self
    }

    pub fn delete(mut self, id: TicketId) -> Self {
        self.deletes.push(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.upserts.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inserts.len() + self.upserts.len() + self.deletes.len()
    }
}

/// Persistent table of columns and tickets.
///
/// Every call on a store that is not open fails with
/// [`KanbanError::StoreUnavailable`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens (creating if needed) the backing storage
    async fn open(&self) -> Result<()>;

    /// Releases the backing storage
    async fn close(&self) -> Result<()>;

    async fn is_open(&self) -> bool;

    /// Creates one column per title unless columns already exist.
    /// Returns whether seeding happened.
    async fn seed_on_first_run(&self, titles: &[String]) -> Result<bool>;

    /// All columns by ascending id
    async fn list_columns(&self) -> Result<Vec<Column>>;

    async fn get_column(&self, id: ColumnId) -> Result<Column>;

    async fn get_ticket(&self, id: TicketId) -> Result<Ticket>;

    async fn query_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>>;

    async fn count_tickets(&self, filter: &TicketFilter) -> Result<usize>;

    /// Applies deletes, then upserts, then inserts in one atomic step.
    /// Returns the inserted tickets, with their generated ids, in batch order.
    async fn apply(&self, batch: WriteBatch) -> Result<Vec<Ticket>>;

    /// Inserts one ticket and returns it with its generated id
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket> {
        let mut created = self.apply(WriteBatch::new().insert(ticket)).await?;
        created
            .pop()
            .ok_or_else(|| KanbanError::StorageError("insert returned no ticket".to_string()))
    }

    async fn update_ticket(&self, id: TicketId, patch: &TicketPatch) -> Result<Ticket> {
        let mut ticket = self.get_ticket(id).await?;
        patch.apply_to(&mut ticket);
        self.apply(WriteBatch::new().upsert(ticket.clone())).await?;
        Ok(ticket)
    }

    async fn delete_ticket(&self, id: TicketId) -> Result<()> {
        self.apply(WriteBatch::new().delete(id)).await?;
        Ok(())
    }

    async fn bulk_upsert(&self, tickets: Vec<Ticket>) -> Result<()> {
        if tickets.is_empty() {
            return Ok(());
        }
        self.apply(WriteBatch::new().upsert_all(tickets)).await?;
        Ok(())
    }
}

pub(crate) fn not_open() -> KanbanError {
    KanbanError::StoreUnavailable("store is not open".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matching() {
        let mut new = NewTicket::new(ColumnId::new(2), "Pitch");
        new.order = 3;
        let ticket = new.into_ticket(TicketId::new(1));

        assert!(TicketFilter::default().matches(&ticket));
        assert!(TicketFilter::column(ColumnId::new(2)).matches(&ticket));
        assert!(!TicketFilter::column(ColumnId::new(1)).matches(&ticket));

        let above = TicketFilter {
            order_above: Some(3),
            ..TicketFilter::default()
        };
        assert!(!above.matches(&ticket));

        let at_least = TicketFilter {
            order_at_least: Some(3),
            ..TicketFilter::default()
        };
        assert!(at_least.matches(&ticket));
    }

    #[test]
    fn test_batch_builder() {
        let batch = WriteBatch::new()
            .insert(NewTicket::new(ColumnId::new(1), "A"))
            .delete(TicketId::new(4));
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert!(WriteBatch::new().is_empty());
    }
}
