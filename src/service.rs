//! Column and ticket operations over a [`Store`].
//!
//! Each operation reads the affected column(s), computes the shift set in
//! memory, and only then writes. Writes of one operation go out as a single
//! [`WriteBatch`], except for cross-column moves which take two (see
//! [`BoardService::reorder_on_drop`]). Every operation, reads included, runs
//! under one async lock so nobody observes a column halfway through a
//! renumbering.

use crate::{
    domain::{
        ordering::{compact, insert_at, move_within, reindex_full, remove_from, Position},
        ticket::validate_title,
        BoardConfig, ColumnId, ColumnView, NewTicket, Page, PageRequest, Ticket, TicketEdit,
        TicketId,
    },
    error::{KanbanError, Result},
    storage::{Store, TicketFilter, TicketQuery, WriteBatch},
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

pub struct BoardService<S: Store> {
    store: S,
    config: BoardConfig,
    writer: Mutex<()>,
}

impl<S: Store> BoardService<S> {
    /// Opens `store`, seeds the configured columns on first run and returns
    /// a service ready for use. Any store failure here is reported as
    /// [`KanbanError::StoreUnavailable`].
    pub async fn open(store: S, config: BoardConfig) -> Result<Self> {
        config.validate()?;
        store.open().await.map_err(KanbanError::unavailable)?;
        let seeded = store
            .seed_on_first_run(&config.columns)
            .await
            .map_err(KanbanError::unavailable)?;
        info!(board = %config.name, seeded, "board opened");

        Ok(Self {
            store,
            config,
            writer: Mutex::new(()),
        })
    }

    /// Closes the underlying store
    pub async fn close(self) -> Result<()> {
        let _guard = self.writer.lock().await;
        self.store.close().await?;
        info!(board = %self.config.name, "board closed");
        Ok(())
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every column with its first page of tickets
    #[instrument(skip(self))]
    pub async fn list_columns_with_first_page(&self, page_size: usize) -> Result<Vec<ColumnView>> {
        let request = PageRequest::first(page_size)?;
        let _guard = self.writer.lock().await;

        let columns = self.store.list_columns().await?;
        let mut views = Vec::with_capacity(columns.len());
        for column in columns {
            let page = self.read_page(column.id, request).await?;
            views.push(ColumnView::new(column, page));
        }
        Ok(views)
    }

    /// The page that follows the `already_shown` tickets a caller displays
    #[instrument(skip(self), fields(column = %column_id))]
    pub async fn load_more_tickets(
        &self,
        column_id: ColumnId,
        already_shown: usize,
        page_size: usize,
    ) -> Result<Page> {
        let request = PageRequest::from_shown(already_shown, page_size)?;
        let _guard = self.writer.lock().await;

        self.store.get_column(column_id).await?;
        self.read_page(column_id, request).await
    }

    /// Appends a new ticket to the end of a column
    pub async fn create_ticket(
        &self,
        column_id: ColumnId,
        title: impl Into<String>,
        image: Option<String>,
    ) -> Result<Ticket> {
        self.create_ticket_at(column_id, title, image, Position::Append)
            .await
    }

    /// Inserts a new ticket at `position`, shifting the tickets at and after it
    #[instrument(skip(self, title, image), fields(column = %column_id))]
    pub async fn create_ticket_at(
        &self,
        column_id: ColumnId,
        title: impl Into<String>,
        image: Option<String>,
        position: Position,
    ) -> Result<Ticket> {
        let title = title.into();
        validate_title(&title)?;
        let _guard = self.writer.lock().await;

        self.store.get_column(column_id).await?;
        let column = self.column_snapshot(column_id).await?;
        let new = NewTicket::new(column_id, title).with_image(image);
        let insertion = insert_at(column_id, &column, new, position);
        let shifted = insertion.shifted.len();

        let batch = WriteBatch::new()
            .upsert_all(insertion.shifted)
            .insert(insertion.ticket);
        let ticket = self
            .store
            .apply(batch)
            .await?
            .pop()
            .ok_or_else(|| KanbanError::StorageError("insert returned no ticket".to_string()))?;

        debug!(ticket = %ticket.id, order = ticket.order, shifted, "created ticket");
        Ok(ticket)
    }

    /// Updates title and image, moving the ticket to the end of another
    /// column when `edit.column_id` names a different one.
    #[instrument(skip(self, edit), fields(ticket = %ticket_id))]
    pub async fn edit_ticket(&self, ticket_id: TicketId, edit: TicketEdit) -> Result<Ticket> {
        validate_title(&edit.title)?;
        let _guard = self.writer.lock().await;

        let mut ticket = self.store.get_ticket(ticket_id).await?;
        let destination = edit.column_id.filter(|id| *id != ticket.column_id);
        if let Some(id) = destination {
            self.store.get_column(id).await?;
        }

        ticket.set_title(edit.title);
        if let Some(image) = edit.image {
            ticket.set_image(Some(image));
        }

        match destination {
            None => {
                self.store
                    .apply(WriteBatch::new().upsert(ticket.clone()))
                    .await?;
                Ok(ticket)
            }
            Some(to) => self.relocate(ticket, to, Position::Append).await,
        }
    }

    /// Deletes a ticket and closes the gap it leaves in its column
    #[instrument(skip(self), fields(ticket = %ticket_id))]
    pub async fn delete_ticket(&self, ticket_id: TicketId) -> Result<Ticket> {
        let _guard = self.writer.lock().await;

        let ticket = self.store.get_ticket(ticket_id).await?;
        let column = self.column_snapshot(ticket.column_id).await?;
        let shifts = remove_from(&column, &ticket);
        let shifted = shifts.len();

        self.store
            .apply(WriteBatch::new().delete(ticket_id).upsert_all(shifts))
            .await?;

        debug!(column = %ticket.column_id, shifted, "deleted ticket");
        Ok(ticket)
    }

    /// Applies a drag-and-drop result.
    ///
    /// `target_position` is the index the ticket holds in the target column
    /// once dropped; values past the end append. Within one column this is a
    /// single write. Across columns it takes two: the first closes the gap in
    /// the source column and parks the ticket at the tail of the target, the
    /// second opens the requested slot. Both columns stay dense after either
    /// step. When the second write fails the error is
    /// [`KanbanError::PartialMove`] and repeating the same call finishes it.
    #[instrument(skip(self), fields(ticket = %ticket_id, target = %target_column_id))]
    pub async fn reorder_on_drop(
        &self,
        ticket_id: TicketId,
        target_column_id: ColumnId,
        target_position: usize,
    ) -> Result<Ticket> {
        let _guard = self.writer.lock().await;

        let ticket = self.store.get_ticket(ticket_id).await?;
        self.store.get_column(target_column_id).await?;
        let position = Position::from(target_position);

        if ticket.column_id != target_column_id {
            return self.relocate(ticket, target_column_id, position).await;
        }

        let column = self.column_snapshot(target_column_id).await?;
        let changes = move_within(&column, ticket_id, position)?;
        if changes.is_empty() {
            return Ok(ticket);
        }

        let moved = changes
            .iter()
            .find(|t| t.id == ticket_id)
            .cloned()
            .unwrap_or(ticket);
        debug!(shifted = changes.len(), order = moved.order, "reordered within column");
        self.store.bulk_upsert(changes).await?;
        Ok(moved)
    }

    /// Rewrites a column's orders from an observed sequence of ticket ids.
    ///
    /// Tickets of the column that are not listed keep their relative order
    /// after the listed ones. Returns the tickets whose order changed.
    #[instrument(skip(self, ordered_ids), fields(column = %column_id, listed = ordered_ids.len()))]
    pub async fn batch_reindex(
        &self,
        column_id: ColumnId,
        ordered_ids: &[TicketId],
    ) -> Result<Vec<Ticket>> {
        let _guard = self.writer.lock().await;

        self.store.get_column(column_id).await?;
        let column = self.column_snapshot(column_id).await?;
        let changes = reindex_full(&column, ordered_ids)?;

        debug!(changed = changes.len(), "reindexed column");
        self.store.bulk_upsert(changes.clone()).await?;
        Ok(changes)
    }

    /// Every ticket of a column, in order
    pub async fn column_tickets(&self, column_id: ColumnId) -> Result<Vec<Ticket>> {
        let _guard = self.writer.lock().await;

        self.store.get_column(column_id).await?;
        self.column_snapshot(column_id).await
    }

    /// Renumbers a column whose stored orders have gaps or duplicates.
    /// Returns how many tickets were rewritten.
    #[instrument(skip(self), fields(column = %column_id))]
    pub async fn repair_column(&self, column_id: ColumnId) -> Result<usize> {
        let _guard = self.writer.lock().await;

        self.store.get_column(column_id).await?;
        let column = self.column_snapshot(column_id).await?;
        let changes = compact(&column);
        let repaired = changes.len();

        if repaired > 0 {
            warn!(repaired, "column orders drifted, compacting");
            self.store.bulk_upsert(changes).await?;
        }
        Ok(repaired)
    }

    async fn read_page(&self, column_id: ColumnId, request: PageRequest) -> Result<Page> {
        let tickets = self.store.query_tickets(&request.query(column_id)).await?;
        let total = self
            .store
            .count_tickets(&TicketFilter::column(column_id))
            .await?;
        Ok(request.assemble(total, tickets))
    }

    async fn column_snapshot(&self, column_id: ColumnId) -> Result<Vec<Ticket>> {
        self.store
            .query_tickets(&TicketQuery::column(column_id))
            .await
    }

    /// Moves `ticket` (content already updated) into another column
    async fn relocate(&self, ticket: Ticket, to: ColumnId, position: Position) -> Result<Ticket> {
        let from = ticket.column_id;
        let source = self.column_snapshot(from).await?;
        let target = self.column_snapshot(to).await?;

        let closing = remove_from(&source, &ticket);
        let parked = insert_at(to, &target, ticket, Position::Append).ticket;
        debug!(from = %from, closed = closing.len(), order = parked.order, "left source column");
        self.store
            .apply(WriteBatch::new().upsert_all(closing).upsert(parked.clone()))
            .await?;

        if position.resolve(target.len()) == parked.order {
            return Ok(parked);
        }

        let mut arrived = target;
        arrived.push(parked.clone());
        let opening = move_within(&arrived, parked.id, position)?;
        let placed = opening
            .iter()
            .find(|t| t.id == parked.id)
            .cloned()
            .unwrap_or(parked);

        if let Err(source) = self.store.bulk_upsert(opening).await {
            warn!(
                ticket = %placed.id,
                from = %from,
                to = %to,
                error = %source,
                "move stopped after leaving source column"
            );
            return Err(KanbanError::PartialMove {
                ticket: placed.id,
                from,
                to,
                source: Box::new(source),
            });
        }
        Ok(placed)
    }
}
