use crate::{
    domain::{pagination::Page, ticket::Ticket},
    error::{KanbanError, Result},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, path::Path, str::FromStr};

/// Store-generated identifier for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(u64);

impl ColumnId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl FromStr for ColumnId {
    type Err = KanbanError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| KanbanError::InvalidId(s.to_string()))
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A board lane as persisted. Columns are created once by seeding and never
/// change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
}

impl Column {
    pub fn new(id: ColumnId, title: String) -> Self {
        Self { id, title }
    }
}

/// A column together with the tickets materialized for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnView {
    pub id: ColumnId,
    pub title: String,
    pub tickets_loaded: Vec<Ticket>,
    pub tickets_remaining: usize,
}

impl ColumnView {
    pub fn new(column: Column, page: Page) -> Self {
        Self {
            id: column.id,
            title: column.title,
            tickets_loaded: page.tickets,
            tickets_remaining: page.remaining,
        }
    }

    /// Whether a "load more" affordance should be offered
    pub fn has_more(&self) -> bool {
        self.tickets_remaining > 0
    }
}

/// Board configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub name: String,
    /// Column titles created on first store initialization
    pub columns: Vec<String>,
    /// Default number of tickets per page
    pub page_size: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: "kanban".to_string(),
            columns: vec![
                "No Status".to_string(),
                "First Call".to_string(),
                "Negotiation".to_string(),
                "Win-Closed".to_string(),
                "Lost-Closed".to_string(),
            ],
            page_size: 10,
        }
    }
}

impl BoardConfig {
    /// Reads a JSON config file. Missing keys fall back to the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: BoardConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(KanbanError::ConfigError(
                "at least one column title is required".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(KanbanError::ConfigError(
                "page_size must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for title in &self.columns {
            if title.trim().is_empty() {
                return Err(KanbanError::ConfigError(
                    "column titles must not be blank".to_string(),
                ));
            }
            if !seen.insert(title.as_str()) {
                return Err(KanbanError::ConfigError(format!(
                    "duplicate column title '{}'",
                    title
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BoardConfig::default();
        assert_eq!(config.columns.len(), 5);
        assert_eq!(config.columns[0], "No Status");
        assert_eq!(config.columns[4], "Lost-Closed");
        assert_eq!(config.page_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = BoardConfig::default();
        config.page_size = 0;
        assert!(matches!(config.validate(), Err(KanbanError::ConfigError(_))));

        let mut config = BoardConfig::default();
        config.columns.clear();
        assert!(config.validate().is_err());

        let mut config = BoardConfig::default();
        config.columns.push("First Call".to_string());
        assert!(config.validate().is_err());

        let mut config = BoardConfig::default();
        config.columns[1] = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "page_size": 3 }}"#).unwrap();

        let config = BoardConfig::load(file.path()).unwrap();
        assert_eq!(config.page_size, 3);
        assert_eq!(config.columns, BoardConfig::default().columns);
    }

    #[test]
    fn test_config_load_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "columns": [] }}"#).unwrap();
        assert!(BoardConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_column_id_round_trip() {
        let id = ColumnId::from_str("5").unwrap();
        assert_eq!(id, ColumnId::new(5));
        assert_eq!(id.to_string(), "5");
        assert!(matches!(
            ColumnId::from_str("five"),
            Err(KanbanError::InvalidId(_))
        ));
    }

    #[test]
    fn test_column_view_has_more() {
        let column = Column::new(ColumnId::new(1), "No Status".to_string());
        let view = ColumnView::new(
            column,
            Page {
                tickets: Vec::new(),
                remaining: 2,
            },
        );
        assert!(view.has_more());
        assert_eq!(view.title, "No Status");
    }
}
