use crate::{
    domain::{Column, ColumnId, Ticket, TicketId},
    error::Result,
    storage::{
        tables::{opened, opened_mut, Tables},
        Store, TicketFilter, TicketQuery, WriteBatch,
    },
};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Store that keeps everything in process memory.
///
/// Contents live only while the store is open; `close` discards them.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<Option<Tables>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStorage {
    async fn open(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.is_none() {
            *state = Some(Tables::default());
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.write().await.take();
        Ok(())
    }

    async fn is_open(&self) -> bool {
        self.state.read().await.is_some()
    }

    async fn seed_on_first_run(&self, titles: &[String]) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(opened_mut(&mut state)?.seed(titles))
    }

    async fn list_columns(&self) -> Result<Vec<Column>> {
        let state = self.state.read().await;
        Ok(opened(&state)?.columns())
    }

    async fn get_column(&self, id: ColumnId) -> Result<Column> {
        let state = self.state.read().await;
        opened(&state)?.column(id)
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Ticket> {
        let state = self.state.read().await;
        opened(&state)?.ticket(id)
    }

    async fn query_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>> {
        let state = self.state.read().await;
        Ok(opened(&state)?.query(query))
    }

    async fn count_tickets(&self, filter: &TicketFilter) -> Result<usize> {
        let state = self.state.read().await;
        Ok(opened(&state)?.count(filter))
    }

    async fn apply(&self, batch: WriteBatch) -> Result<Vec<Ticket>> {
        let mut state = self.state.write().await;
        opened_mut(&mut state)?.apply(batch)
    }
}
