use crate::{
    domain::{Column, ColumnId, Ticket, TicketId},
    error::{KanbanError, Result},
    storage::{TicketFilter, TicketQuery, WriteBatch},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub(crate) const SCHEMA_VERSION: u32 = 1;

/// In-process column and ticket tables shared by the memory and file stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Tables {
    pub schema_version: u32,
    next_column_id: u64,
    next_ticket_id: u64,
    columns: BTreeMap<u64, Column>,
    tickets: BTreeMap<u64, Ticket>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            next_column_id: 1,
            next_ticket_id: 1,
            columns: BTreeMap::new(),
            tickets: BTreeMap::new(),
        }
    }
}

impl Tables {
    pub fn check_version(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(KanbanError::StoreUnavailable(format!(
                "unsupported schema version {} (expected {})",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        Ok(())
    }

    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn seed(&mut self, titles: &[String]) -> bool {
        if self.has_columns() {
            return false;
        }
        for title in titles {
            let id = ColumnId::new(self.next_column_id);
            self.next_column_id += 1;
            self.columns.insert(id.get(), Column::new(id, title.clone()));
        }
        true
    }

    pub fn columns(&self) -> Vec<Column> {
        self.columns.values().cloned().collect()
    }

    pub fn column(&self, id: ColumnId) -> Result<Column> {
        self.columns
            .get(&id.get())
            .cloned()
            .ok_or(KanbanError::ColumnNotFound(id))
    }

    pub fn ticket(&self, id: TicketId) -> Result<Ticket> {
        self.tickets
            .get(&id.get())
            .cloned()
            .ok_or(KanbanError::TicketNotFound(id))
    }

    pub fn query(&self, query: &TicketQuery) -> Vec<Ticket> {
        let mut found: Vec<Ticket> = self
            .tickets
            .values()
            .filter(|t| query.filter.matches(t))
            .cloned()
            .collect();
        found.sort_by_key(|t| (t.order, t.id));
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        found
    }

    pub fn count(&self, filter: &TicketFilter) -> usize {
        self.tickets.values().filter(|t| filter.matches(t)).count()
    }

    /// Validates the whole batch before touching anything
    pub fn apply(&mut self, batch: WriteBatch) -> Result<Vec<Ticket>> {
        let mut deleted = HashSet::new();
        for id in &batch.deletes {
            if !self.tickets.contains_key(&id.get()) || !deleted.insert(*id) {
                return Err(KanbanError::TicketNotFound(*id));
            }
        }
        for ticket in &batch.upserts {
            self.column(ticket.column_id)?;
        }
        for ticket in &batch.inserts {
            self.column(ticket.column_id)?;
        }

        for id in batch.deletes {
            self.tickets.remove(&id.get());
        }
        for ticket in batch.upserts {
            let raw = ticket.id.get();
            self.next_ticket_id = self.next_ticket_id.max(raw + 1);
            self.tickets.insert(raw, ticket);
        }

        let mut created = Vec::with_capacity(batch.inserts.len());
        for new in batch.inserts {
            let id = TicketId::new(self.next_ticket_id);
            self.next_ticket_id += 1;
            let ticket = new.into_ticket(id);
            self.tickets.insert(id.get(), ticket.clone());
            created.push(ticket);
        }
        Ok(created)
    }
}

pub(crate) fn opened(state: &Option<Tables>) -> Result<&Tables> {
    state.as_ref().ok_or_else(super::not_open)
}

pub(crate) fn opened_mut(state: &mut Option<Tables>) -> Result<&mut Tables> {
    state.as_mut().ok_or_else(super::not_open)
}
