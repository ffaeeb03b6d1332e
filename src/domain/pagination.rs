//! Page-by-page loading of a column.
//!
//! Because orders are dense from zero, "the last order already shown" is a
//! complete cursor: everything at or below it has been delivered, everything
//! above it has not. No state is kept between requests.

use crate::{
    domain::{board::ColumnId, ticket::Ticket},
    error::{KanbanError, Result},
    storage::{TicketFilter, TicketQuery},
};
use serde::Serialize;

/// A slice of a column plus how many tickets are still behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub tickets: Vec<Ticket>,
    pub remaining: usize,
}

impl Page {
    /// Order of the last ticket in this page, usable as the next cursor
    pub fn cursor(&self) -> Option<u32> {
        self.tickets.last().map(|t| t.order)
    }
}

/// Which tickets of a column to materialize next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    after: Option<u32>,
    size: usize,
}

impl PageRequest {
    /// The first `size` tickets of a column
    pub fn first(size: usize) -> Result<Self> {
        Self::build(None, size)
    }

    /// Up to `size` tickets with order above `since_order`
    pub fn after(since_order: u32, size: usize) -> Result<Self> {
        Self::build(Some(since_order), size)
    }

    /// Next page for a caller that already displays `shown` tickets
    pub fn from_shown(shown: usize, size: usize) -> Result<Self> {
        match shown.checked_sub(1) {
            None => Self::first(size),
            Some(last) => {
                let since = u32::try_from(last).map_err(|_| {
                    KanbanError::Validation(format!("shown count {} is out of range", shown))
                })?;
                Self::after(since, size)
            }
        }
    }

    fn build(after: Option<u32>, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(KanbanError::Validation(
                "page size must be greater than zero".to_string(),
            ));
        }
        Ok(Self { after, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of tickets delivered before this page
    pub fn already_shown(&self) -> usize {
        self.after.map_or(0, |order| order as usize + 1)
    }

    /// Range query that fetches this page from the store
    pub fn query(&self, column_id: ColumnId) -> TicketQuery {
        TicketQuery {
            filter: TicketFilter {
                column_id: Some(column_id),
                order_above: self.after,
                order_at_least: None,
            },
            limit: Some(self.size),
        }
    }

    /// Combines fetched tickets with the column total into a page
    pub fn assemble(&self, total: usize, tickets: Vec<Ticket>) -> Page {
        let remaining = total.saturating_sub(self.already_shown() + tickets.len());
        Page { tickets, remaining }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ticket::{NewTicket, TicketId};

    fn tickets(orders: std::ops::Range<u32>) -> Vec<Ticket> {
        orders
            .map(|order| {
                let mut new = NewTicket::new(ColumnId::new(1), format!("T{}", order));
                new.order = order;
                new.into_ticket(TicketId::new(order as u64 + 1))
            })
            .collect()
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert!(matches!(PageRequest::first(0), Err(KanbanError::Validation(_))));
        assert!(PageRequest::after(3, 0).is_err());
    }

    #[test]
    fn test_first_page_query() {
        let request = PageRequest::first(2).unwrap();
        let query = request.query(ColumnId::new(7));

        assert_eq!(query.filter.column_id, Some(ColumnId::new(7)));
        assert_eq!(query.filter.order_above, None);
        assert_eq!(query.limit, Some(2));
        assert_eq!(request.already_shown(), 0);
    }

    #[test]
    fn test_page_walk_over_five() {
        let first = PageRequest::first(2).unwrap().assemble(5, tickets(0..2));
        assert_eq!(first.remaining, 3);
        assert_eq!(first.cursor(), Some(1));

        let second = PageRequest::after(1, 2).unwrap().assemble(5, tickets(2..4));
        assert_eq!(second.remaining, 1);

        let third = PageRequest::after(3, 2).unwrap().assemble(5, tickets(4..5));
        assert_eq!(third.remaining, 0);
        assert_eq!(third.cursor(), Some(4));
    }

    #[test]
    fn test_from_shown_derives_cursor() {
        assert_eq!(
            PageRequest::from_shown(0, 4).unwrap(),
            PageRequest::first(4).unwrap()
        );
        assert_eq!(
            PageRequest::from_shown(3, 4).unwrap(),
            PageRequest::after(2, 4).unwrap()
        );
    }

    #[test]
    fn test_remaining_never_negative() {
        let page = PageRequest::after(9, 5).unwrap().assemble(4, Vec::new());
        assert_eq!(page.remaining, 0);
        assert_eq!(page.cursor(), None);
    }
}
