//! Dense per-column ordering.
//!
//! Every function here works on a column's tickets held in memory and returns
//! the tickets whose `order` must be rewritten (the shift set). Nothing is
//! persisted; callers hand the result to the store in one batch.
//!
//! Between operations the orders of a column with N tickets are exactly
//! `0..N`, one ticket per value.

use crate::{
    domain::{
        board::ColumnId,
        ticket::{NewTicket, Ticket, TicketId},
    },
    error::{KanbanError, Result},
};
use std::collections::HashSet;

/// Where a ticket should land inside a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// After the last ticket
    Append,
    /// At this order value; anything past the end behaves like `Append`
    At(u32),
}

impl Position {
    /// Concrete order value for a column that currently holds `len` tickets
    pub fn resolve(self, len: usize) -> u32 {
        let end = u32::try_from(len).unwrap_or(u32::MAX);
        match self {
            Position::Append => end,
            Position::At(order) => order.min(end),
        }
    }
}

impl From<usize> for Position {
    fn from(index: usize) -> Self {
        u32::try_from(index).map_or(Position::Append, Position::At)
    }
}

/// Anything that can be given a slot in a column
pub trait Slotted {
    fn assign_slot(&mut self, column_id: ColumnId, order: u32);
}

impl Slotted for Ticket {
    fn assign_slot(&mut self, column_id: ColumnId, order: u32) {
        self.set_slot(column_id, order);
    }
}

impl Slotted for NewTicket {
    fn assign_slot(&mut self, column_id: ColumnId, order: u32) {
        self.column_id = column_id;
        self.order = order;
    }
}

/// Result of placing a ticket into a column
#[derive(Debug, Clone)]
pub struct Insertion<T> {
    pub ticket: T,
    pub shifted: Vec<Ticket>,
}

/// Places `ticket` at `position` in the column made of `column`.
///
/// `column` must not contain the ticket being inserted. Tickets at or after
/// the target order move up by one.
pub fn insert_at<T: Slotted>(
    column_id: ColumnId,
    column: &[Ticket],
    mut ticket: T,
    position: Position,
) -> Insertion<T> {
    let order = position.resolve(column.len());
    let shifted = column
        .iter()
        .filter(|t| t.order >= order)
        .map(|t| with_order(t, t.order + 1))
        .collect();

    ticket.assign_slot(column_id, order);
    Insertion { ticket, shifted }
}

/// Closes the gap `ticket` leaves behind in `column`.
///
/// The removed ticket itself is never part of the result.
pub fn remove_from(column: &[Ticket], ticket: &Ticket) -> Vec<Ticket> {
    column
        .iter()
        .filter(|t| t.id != ticket.id && t.order > ticket.order)
        .map(|t| with_order(t, t.order - 1))
        .collect()
}

/// Moves one ticket to `position` inside its own column.
///
/// `position` is the index the ticket should hold afterwards. The run of
/// tickets between the old and new index shifts by one. Returns every ticket
/// whose order changed, the moved one included; empty when nothing moves.
pub fn move_within(
    column: &[Ticket],
    ticket_id: TicketId,
    position: Position,
) -> Result<Vec<Ticket>> {
    let moving = column
        .iter()
        .find(|t| t.id == ticket_id)
        .ok_or(KanbanError::TicketNotFound(ticket_id))?;

    let mut sequence: Vec<&Ticket> = sorted(column)
        .into_iter()
        .filter(|t| t.id != ticket_id)
        .collect();
    let target = position.resolve(sequence.len()) as usize;
    sequence.insert(target, moving);

    Ok(renumber(&sequence))
}

/// Reassigns orders from an externally observed sequence.
///
/// Listed tickets get `0..k` in the order given. Tickets of the column that
/// are not listed (not materialized on screen) keep their relative order and
/// follow after the listed ones. Duplicate ids and ids from other columns
/// are rejected.
pub fn reindex_full(column: &[Ticket], ordered_ids: &[TicketId]) -> Result<Vec<Ticket>> {
    let mut listed = HashSet::with_capacity(ordered_ids.len());
    let mut sequence = Vec::with_capacity(column.len());

    for id in ordered_ids {
        if !listed.insert(*id) {
            return Err(KanbanError::Validation(format!(
                "ticket {} appears more than once in the new order",
                id
            )));
        }
        let ticket = column.iter().find(|t| t.id == *id).ok_or_else(|| {
            KanbanError::Validation(format!("ticket {} does not belong to this column", id))
        })?;
        sequence.push(ticket);
    }

    sequence.extend(sorted(column).into_iter().filter(|t| !listed.contains(&t.id)));
    Ok(renumber(&sequence))
}

/// Renumbers a column to `0..N` keeping its current relative order.
///
/// Repairs gaps and duplicates; ties are broken by id.
pub fn compact(column: &[Ticket]) -> Vec<Ticket> {
    renumber(&sorted(column))
}

/// Checks the dense-sequence invariant
pub fn is_dense(column: &[Ticket]) -> bool {
    let mut orders: Vec<u32> = column.iter().map(|t| t.order).collect();
    orders.sort_unstable();
    orders
        .iter()
        .enumerate()
        .all(|(index, order)| *order as usize == index)
}

fn sorted(column: &[Ticket]) -> Vec<&Ticket> {
    let mut tickets: Vec<&Ticket> = column.iter().collect();
    tickets.sort_by_key(|t| (t.order, t.id));
    tickets
}

fn renumber(sequence: &[&Ticket]) -> Vec<Ticket> {
    sequence
        .iter()
        .enumerate()
        .filter(|(index, t)| t.order as usize != *index)
        .map(|(index, t)| with_order(t, index as u32))
        .collect()
}

fn with_order(ticket: &Ticket, order: u32) -> Ticket {
    let mut updated = ticket.clone();
    updated.set_slot(ticket.column_id, order);
    updated
}
