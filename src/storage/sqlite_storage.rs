use crate::{
    domain::{Column, ColumnId, Ticket, TicketId},
    error::{KanbanError, Result},
    storage::{not_open, Store, TicketFilter, TicketQuery, WriteBatch},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, TryLockError},
};
use tracing::{debug, info};

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS columns (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS tickets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        column_id INTEGER NOT NULL REFERENCES columns(id),
        title TEXT NOT NULL,
        sort_order INTEGER NOT NULL,
        image TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_tickets_column_order ON tickets (column_id, sort_order);
";

const TICKET_COLUMNS: &str = "id, column_id, title, sort_order, image, created_at, updated_at";

const FILTER: &str = "(?1 IS NULL OR column_id = ?1)
    AND (?2 IS NULL OR sort_order > ?2)
    AND (?3 IS NULL OR sort_order >= ?3)";

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// SQLite-based storage backend for columns and tickets.
///
/// Every batch runs inside one SQLite transaction. Connection work happens on
/// the blocking thread pool.
pub struct SqliteStorage {
    location: Location,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStorage {
    /// Creates a storage backed by the database file at `database_path`
    pub fn new(database_path: impl AsRef<Path>) -> Self {
        Self {
            location: Location::File(database_path.as_ref().to_path_buf()),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a storage backed by a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    async fn with_conn<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| poisoned())?;
            let conn = guard.as_mut().ok_or_else(not_open)?;
            work(conn)
        })
        .await
        .map_err(|err| KanbanError::StorageError(err.to_string()))?
    }
}

fn bootstrap(conn: &Connection) -> Result<()> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    match version {
        0 => {
            conn.execute_batch(SCHEMA)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            Ok(())
        }
        SCHEMA_VERSION => {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        }
        other => Err(KanbanError::StoreUnavailable(format!(
            "unsupported schema version {} (expected {})",
            other, SCHEMA_VERSION
        ))),
    }
}

fn poisoned() -> KanbanError {
    KanbanError::StorageError("sqlite connection lock poisoned".to_string())
}

fn to_sql_id(raw: u64) -> Result<i64> {
    i64::try_from(raw)
        .map_err(|_| KanbanError::StorageError(format!("id {} exceeds sqlite range", raw)))
}

fn ensure_column(conn: &Connection, id: ColumnId) -> Result<()> {
    let found = conn
        .query_row(
            "SELECT id FROM columns WHERE id = ?1",
            params![to_sql_id(id.get())?],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    found.map(|_| ()).ok_or(KanbanError::ColumnNotFound(id))
}

struct TicketRow {
    id: i64,
    column_id: i64,
    title: String,
    order: i64,
    image: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TicketRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            column_id: row.get(1)?,
            title: row.get(2)?,
            order: row.get(3)?,
            image: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_ticket(self) -> Result<Ticket> {
        let corrupt = |what: &str| {
            KanbanError::StorageError(format!("ticket {} has invalid {}", self.id, what))
        };
        Ok(Ticket {
            id: TicketId::new(u64::try_from(self.id).map_err(|_| corrupt("id"))?),
            column_id: ColumnId::new(
                u64::try_from(self.column_id).map_err(|_| corrupt("column id"))?,
            ),
            title: self.title.clone(),
            order: u32::try_from(self.order).map_err(|_| corrupt("order"))?,
            image: self.image.clone(),
            created_at: parse_timestamp(&self.created_at).ok_or_else(|| corrupt("created_at"))?,
            updated_at: parse_timestamp(&self.updated_at).ok_or_else(|| corrupt("updated_at"))?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

type FilterParams = (Option<i64>, Option<i64>, Option<i64>);

fn filter_params(filter: &TicketFilter) -> Result<FilterParams> {
    let column_id = filter.column_id.map(|id| to_sql_id(id.get())).transpose()?;
    Ok((
        column_id,
        filter.order_above.map(i64::from),
        filter.order_at_least.map(i64::from),
    ))
}

fn upsert_ticket(conn: &Connection, ticket: &Ticket) -> Result<()> {
    ensure_column(conn, ticket.column_id)?;
    conn.execute(
        "INSERT INTO tickets (id, column_id, title, sort_order, image, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            column_id = excluded.column_id,
            title = excluded.title,
            sort_order = excluded.sort_order,
            image = excluded.image,
            updated_at = excluded.updated_at",
        params![
            to_sql_id(ticket.id.get())?,
            to_sql_id(ticket.column_id.get())?,
            ticket.title,
            i64::from(ticket.order),
            ticket.image,
            ticket.created_at.to_rfc3339(),
            ticket.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStorage {
    async fn open(&self) -> Result<()> {
        let location = self.location.clone();
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| poisoned())?;
            if guard.is_some() {
                return Ok(());
            }
            let connection = match &location {
                Location::File(path) => Connection::open(path)?,
                Location::Memory => Connection::open_in_memory()?,
            };
            bootstrap(&connection)?;
            *guard = Some(connection);
            info!(location = ?location, "opened sqlite store");
            Ok(())
        })
        .await
        .map_err(|err| KanbanError::StorageError(err.to_string()))?
    }

    async fn close(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| poisoned())?;
            if let Some(connection) = guard.take() {
                connection.close().map_err(|(_, err)| KanbanError::from(err))?;
            }
            Ok(())
        })
        .await
        .map_err(|err| KanbanError::StorageError(err.to_string()))?
    }

    async fn is_open(&self) -> bool {
        // a busy connection is held by a blocking job, which needs it open
        match self.conn.try_lock() {
            Ok(guard) => guard.is_some(),
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(_)) => false,
        }
    }

    async fn seed_on_first_run(&self, titles: &[String]) -> Result<bool> {
        let titles = titles.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let existing: i64 = tx.query_row("SELECT COUNT(*) FROM columns", [], |row| row.get(0))?;
            if existing > 0 {
                return Ok(false);
            }
            for title in &titles {
                tx.execute("INSERT INTO columns (title) VALUES (?1)", params![title])?;
            }
            tx.commit()?;
            info!(columns = titles.len(), "seeded default columns");
            Ok(true)
        })
        .await
    }

    async fn list_columns(&self) -> Result<Vec<Column>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, title FROM columns ORDER BY id ASC")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut columns = Vec::new();
            for row in rows {
                let (id, title) = row?;
                let id = u64::try_from(id).map_err(|_| {
                    KanbanError::StorageError(format!("column has invalid id {}", id))
                })?;
                columns.push(Column::new(ColumnId::new(id), title));
            }
            Ok(columns)
        })
        .await
    }

    async fn get_column(&self, id: ColumnId) -> Result<Column> {
        self.with_conn(move |conn| {
            let title = conn
                .query_row(
                    "SELECT title FROM columns WHERE id = ?1",
                    params![to_sql_id(id.get())?],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            title
                .map(|title| Column::new(id, title))
                .ok_or(KanbanError::ColumnNotFound(id))
        })
        .await
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Ticket> {
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM tickets WHERE id = ?1", TICKET_COLUMNS),
                    params![to_sql_id(id.get())?],
                    TicketRow::read,
                )
                .optional()?;
            row.ok_or(KanbanError::TicketNotFound(id))?.into_ticket()
        })
        .await
    }

    async fn query_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>> {
        let (column_id, above, at_least) = filter_params(&query.filter)?;
        let limit = match query.limit {
            Some(limit) => i64::try_from(limit).unwrap_or(i64::MAX),
            None => -1,
        };
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tickets WHERE {} ORDER BY sort_order ASC, id ASC LIMIT ?4",
                TICKET_COLUMNS, FILTER
            ))?;
            let rows = stmt.query_map(params![column_id, above, at_least, limit], TicketRow::read)?;

            let mut tickets = Vec::new();
            for row in rows {
                tickets.push(row?.into_ticket()?);
            }
            Ok(tickets)
        })
        .await
    }

    async fn count_tickets(&self, filter: &TicketFilter) -> Result<usize> {
        let (column_id, above, at_least) = filter_params(filter)?;
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM tickets WHERE {}", FILTER),
                params![column_id, above, at_least],
                |row| row.get(0),
            )?;
            usize::try_from(count).map_err(|_| {
                KanbanError::StorageError(format!("ticket count {} out of range", count))
            })
        })
        .await
    }

    async fn apply(&self, batch: WriteBatch) -> Result<Vec<Ticket>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let writes = batch.len();
        let created = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;

                for id in &batch.deletes {
                    let removed = tx.execute(
                        "DELETE FROM tickets WHERE id = ?1",
                        params![to_sql_id(id.get())?],
                    )?;
                    if removed == 0 {
                        return Err(KanbanError::TicketNotFound(*id));
                    }
                }
                for ticket in &batch.upserts {
                    upsert_ticket(&tx, ticket)?;
                }

                let mut created = Vec::with_capacity(batch.inserts.len());
                for new in batch.inserts {
                    ensure_column(&tx, new.column_id)?;
                    let mut ticket = new.into_ticket(TicketId::new(0));
                    tx.execute(
                        "INSERT INTO tickets
                            (column_id, title, sort_order, image, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            to_sql_id(ticket.column_id.get())?,
                            ticket.title,
                            i64::from(ticket.order),
                            ticket.image,
                            ticket.created_at.to_rfc3339(),
                            ticket.updated_at.to_rfc3339(),
                        ],
                    )?;
                    let raw = u64::try_from(tx.last_insert_rowid())
                        .map_err(|_| KanbanError::StorageError("negative rowid".to_string()))?;
                    ticket.id = TicketId::new(raw);
                    created.push(ticket);
                }

                tx.commit()?;
                Ok(created)
            })
            .await?;
        debug!(writes, "committed sqlite batch");
        Ok(created)
    }
}
