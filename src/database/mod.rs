pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryDatabase;
pub use postgres::PgDatabase;

/// A stored row as a JSON object keyed by column name.
pub type Row = Map<String, Value>;

/// Identifier type shared by every resource table.
pub type RecordId = i64;

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{table} {id} not found")]
    NotFound { table: String, id: RecordId },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(table: &str, id: RecordId) -> Self {
        StoreError::NotFound {
            table: table.to_string(),
            id,
        }
    }
}

/// Entry point to a store. Hands out one session per request.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    /// Open a transactional session. Dropping it without `commit` discards its writes.
    async fn session(&self) -> Result<Box<dyn Session>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// A request-scoped transaction against the store.
///
/// Rows within a table are ordered by `id`; `page` slices that order.
#[async_trait]
pub trait Session: Send {
    async fn count(&mut self, table: &str) -> Result<u64, StoreError>;

    /// Rows of the 1-indexed `page` when the table is cut into `per_page` sized pages.
    async fn page(&mut self, table: &str, page: u64, per_page: u64) -> Result<Vec<Row>, StoreError>;

    async fn get(&mut self, table: &str, id: RecordId) -> Result<Row, StoreError>;

    /// Insert a row; the store assigns `id` when the row has none.
    async fn insert(&mut self, table: &str, row: Row) -> Result<Row, StoreError>;

    /// Overwrite the given columns of an existing row.
    async fn update(&mut self, table: &str, id: RecordId, row: Row) -> Result<Row, StoreError>;

    /// Remove a row, returning what was stored.
    async fn delete(&mut self, table: &str, id: RecordId) -> Result<Row, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Offset of the first row on a 1-indexed page.
pub(crate) fn page_offset(page: u64, per_page: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(per_page)
}

/// Table and column names are interpolated into SQL, so only plain identifiers pass.
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
