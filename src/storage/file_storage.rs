use crate::{
    domain::{Column, ColumnId, Ticket, TicketId},
    error::Result,
    storage::{
        tables::{opened, Tables},
        Store, TicketFilter, TicketQuery, WriteBatch,
    },
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::RwLock};
use tracing::{debug, info};

/// File-based storage implementation.
///
/// The whole board lives in one JSON snapshot. Every write produces a new
/// snapshot in a temporary file that is renamed over the old one, so a
/// failed write leaves the previous state on disk and in memory.
pub struct FileStorage {
    root_path: PathBuf,
    state: RwLock<Option<Tables>>,
}

impl FileStorage {
    const KANBAN_DIR: &'static str = ".kanban";
    const BOARD_FILE: &'static str = "board.json";
    const TEMP_FILE: &'static str = "board.json.tmp";

    /// Creates a new FileStorage instance for the given project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::KANBAN_DIR),
            state: RwLock::new(None),
        }
    }

    fn board_file(&self) -> PathBuf {
        self.root_path.join(Self::BOARD_FILE)
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    async fn persist(&self, tables: &Tables) -> Result<()> {
        let json = serde_json::to_string_pretty(tables)?;
        let temp = self.root_path.join(Self::TEMP_FILE);

        fs::write(&temp, json).await?;
        fs::rename(&temp, self.board_file()).await?;
        Ok(())
    }

    async fn load(&self) -> Result<Tables> {
        let contents = fs::read_to_string(self.board_file()).await?;
        let tables: Tables = serde_json::from_str(&contents)?;
        tables.check_version()?;
        Ok(tables)
    }

    /// Runs `change` on a copy of the tables, persists the copy, then swaps
    /// it in. Nothing changes when either step fails.
    async fn write<T>(&self, change: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut state = self.state.write().await;
        let mut next = opened(&state)?.clone();
        let outcome = change(&mut next)?;
        self.persist(&next).await?;
        *state = Some(next);
        Ok(outcome)
    }
}

#[async_trait]
impl Store for FileStorage {
    async fn open(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.is_some() {
            return Ok(());
        }

        self.ensure_directory_exists(&self.root_path).await?;

        let tables = if self.board_file().exists() {
            self.load().await?
        } else {
            let tables = Tables::default();
            self.persist(&tables).await?;
            tables
        };

        info!(path = %self.board_file().display(), "opened board file");
        *state = Some(tables);
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
        {
            let state = self.state.read().await;
            if opened(&state)?.has_columns() {
                return Ok(false);
            }
        }

        let seeded = self.write(|tables| Ok(tables.seed(titles))).await?;
        if seeded {
            info!(columns = titles.len(), "seeded default columns");
        }
        Ok(seeded)
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
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let writes = batch.len();
        let created = self.write(|tables| tables.apply(batch)).await?;
        debug!(writes, "persisted batch");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{NewTicket, TicketPatch},
        error::KanbanError,
    };
    use tempfile::TempDir;

    fn titles() -> Vec<String> {
        vec!["No Status".to_string(), "First Call".to_string()]
    }

    #[tokio::test]
    async fn test_storage_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        assert!(!storage.is_open().await);
        storage.open().await.unwrap();

        assert!(storage.is_open().await);
        assert!(storage.board_file().exists());
    }

    #[tokio::test]
    async fn test_seed_only_on_first_run() {
        let temp_dir = TempDir::new().unwrap();

        let storage = FileStorage::new(temp_dir.path());
        storage.open().await.unwrap();
        assert!(storage.seed_on_first_run(&titles()).await.unwrap());
        storage.close().await.unwrap();

        let reopened = FileStorage::new(temp_dir.path());
        reopened.open().await.unwrap();
        assert!(!reopened
            .seed_on_first_run(&["Other".to_string()])
            .await
            .unwrap());

        let columns = reopened.list_columns().await.unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].title, "No Status");
    }

    #[tokio::test]
    async fn test_seeded_board_opens_without_writing() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.open().await.unwrap();
        storage.seed_on_first_run(&titles()).await.unwrap();
        storage.close().await.unwrap();

        // a directory in the temp file's place makes every snapshot write fail
        std::fs::create_dir(storage.root_path.join(FileStorage::TEMP_FILE)).unwrap();

        storage.open().await.unwrap();
        assert!(!storage.seed_on_first_run(&titles()).await.unwrap());
        assert_eq!(storage.list_columns().await.unwrap().len(), 2);

        let result = storage
            .insert_ticket(NewTicket::new(ColumnId::new(1), "Blocked"))
            .await;
        assert!(matches!(result, Err(KanbanError::IoError(_))));
    }

    #[tokio::test]
    async fn test_ticket_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.open().await.unwrap();
        storage.seed_on_first_run(&titles()).await.unwrap();

        let ticket = storage
            .insert_ticket(
                NewTicket::new(ColumnId::new(2), "Call Acme")
                    .with_image(Some("data:image/png;base64,AAAA".to_string())),
            )
            .await
            .unwrap();
        storage.close().await.unwrap();

        let reopened = FileStorage::new(temp_dir.path());
        reopened.open().await.unwrap();
        let loaded = reopened.get_ticket(ticket.id).await.unwrap();
        assert_eq!(loaded, ticket);
        assert_eq!(loaded.title, "Call Acme");
    }

    #[tokio::test]
    async fn test_ids_keep_growing_after_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.open().await.unwrap();
        storage.seed_on_first_run(&titles()).await.unwrap();

        let first = storage
            .insert_ticket(NewTicket::new(ColumnId::new(1), "One"))
            .await
            .unwrap();
        storage.delete_ticket(first.id).await.unwrap();
        storage.close().await.unwrap();

        storage.open().await.unwrap();
        let second = storage
            .insert_ticket(NewTicket::new(ColumnId::new(1), "Two"))
            .await
            .unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_rejected_batch_leaves_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.open().await.unwrap();
        storage.seed_on_first_run(&titles()).await.unwrap();

        let before = std::fs::read_to_string(storage.board_file()).unwrap();
        let result = storage
            .apply(WriteBatch::new().insert(NewTicket::new(ColumnId::new(42), "Nowhere")))
            .await;
        assert!(matches!(result, Err(KanbanError::ColumnNotFound(_))));

        let after = std::fs::read_to_string(storage.board_file()).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_range_query_and_count() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.open().await.unwrap();
        storage.seed_on_first_run(&titles()).await.unwrap();

        let mut batch = WriteBatch::new();
        for order in 0..4u32 {
            let mut new = NewTicket::new(ColumnId::new(1), format!("T{}", order));
            new.order = order;
            batch = batch.insert(new);
        }
        storage.apply(batch).await.unwrap();

        let query = TicketQuery {
            filter: TicketFilter {
                column_id: Some(ColumnId::new(1)),
                order_at_least: Some(2),
                ..TicketFilter::default()
            },
            limit: None,
        };
        let found = storage.query_tickets(&query).await.unwrap();
        let orders: Vec<u32> = found.iter().map(|t| t.order).collect();
        assert_eq!(orders, vec![2, 3]);

        let total = storage
            .count_tickets(&TicketFilter::column(ColumnId::new(1)))
            .await
            .unwrap();
        assert_eq!(total, 4);
        assert_eq!(
            storage
                .count_tickets(&TicketFilter::column(ColumnId::new(2)))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_update_ticket_keeps_other_fields() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.open().await.unwrap();
        storage.seed_on_first_run(&titles()).await.unwrap();

        let ticket = storage
            .insert_ticket(NewTicket::new(ColumnId::new(1), "Before"))
            .await
            .unwrap();
        let patch = TicketPatch {
            title: Some("After".to_string()),
            ..TicketPatch::default()
        };
        let updated = storage.update_ticket(ticket.id, &patch).await.unwrap();

        assert_eq!(updated.title, "After");
        assert_eq!(updated.order, ticket.order);
        assert_eq!(updated.column_id, ticket.column_id);
    }

    #[tokio::test]
    async fn test_unknown_schema_version_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.open().await.unwrap();
        storage.close().await.unwrap();

        let contents = std::fs::read_to_string(storage.board_file()).unwrap();
        let bumped = contents.replace("\"schema_version\": 1", "\"schema_version\": 7");
        std::fs::write(storage.board_file(), bumped).unwrap();

        let result = storage.open().await;
        assert!(matches!(result, Err(KanbanError::StoreUnavailable(_))));
        assert!(!storage.is_open().await);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let result = storage.list_columns().await;
        assert!(matches!(result, Err(KanbanError::StoreUnavailable(_))));
        assert!(storage.seed_on_first_run(&titles()).await.is_err());
    }
}
