use crate::domain::board::ColumnId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Store-generated identifier for a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(u64);

impl TicketId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl FromStr for TicketId {
    type Err = crate::error::KanbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| crate::error::KanbanError::InvalidId(s.to_string()))
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single orderable item on the board.
///
/// `title` and `image` are stored exactly as supplied. Composing a display
/// string out of them is left to whoever renders the ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub column_id: ColumnId,
    pub title: String,
    /// Zero-based rank inside `column_id`
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Sets the title
    pub fn set_title(&mut self, title: String) {
        self.title = title;
        self.updated_at = Utc::now();
    }

    /// Replaces the image payload
    pub fn set_image(&mut self, image: Option<String>) {
        self.image = image;
        self.updated_at = Utc::now();
    }

    /// Places the ticket at `order` in `column_id`
    pub fn set_slot(&mut self, column_id: ColumnId, order: u32) {
        self.column_id = column_id;
        self.order = order;
        self.updated_at = Utc::now();
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

/// A ticket that has not been given an id by the store yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    pub column_id: ColumnId,
    pub title: String,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl NewTicket {
    pub fn new(column_id: ColumnId, title: impl Into<String>) -> Self {
        Self {
            column_id,
            title: title.into(),
            order: 0,
            image: None,
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    /// Materializes the record once the store has generated an id
    pub fn into_ticket(self, id: TicketId) -> Ticket {
        let now = Utc::now();
        Ticket {
            id,
            column_id: self.column_id,
            title: self.title,
            order: self.order,
            image: self.image,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a stored ticket. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketPatch {
    pub title: Option<String>,
    pub column_id: Option<ColumnId>,
    pub order: Option<u32>,
    pub image: Option<Option<String>>,
}

impl TicketPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.column_id.is_none()
            && self.order.is_none()
            && self.image.is_none()
    }

    pub fn apply_to(&self, ticket: &mut Ticket) {
        if self.is_empty() {
            return;
        }
        if let Some(title) = &self.title {
            ticket.title = title.clone();
        }
        if let Some(column_id) = self.column_id {
            ticket.column_id = column_id;
        }
        if let Some(order) = self.order {
            ticket.order = order;
        }
        if let Some(image) = &self.image {
            ticket.image = image.clone();
        }
        ticket.updated_at = Utc::now();
    }
}

/// Content changes requested for an existing ticket.
///
/// A `column_id` different from the ticket's current column moves the ticket
/// to the end of that column. `image: None` keeps the stored image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TicketEdit {
    pub title: String,
    pub column_id: Option<ColumnId>,
    pub image: Option<String>,
}

impl TicketEdit {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn move_to(mut self, column_id: ColumnId) -> Self {
        self.column_id = Some(column_id);
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// Rejects titles that are empty once surrounding whitespace is removed
pub fn validate_title(title: &str) -> crate::error::Result<()> {
    if title.trim().is_empty() {
        return Err(crate::error::KanbanError::Validation(
            "ticket title must not be empty".to_string(),
        ));
    }
    Ok(())
}
