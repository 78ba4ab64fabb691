use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{page_offset, Database, RecordId, Row, Session, StoreError};

#[derive(Debug, Clone, Default)]
struct Table {
    last_id: RecordId,
    rows: BTreeMap<RecordId, Row>,
}

type Tables = HashMap<String, Table>;

/// Process-local store. Tables appear on first use.
///
/// Sessions hold the store lock for their whole lifetime and work on a copy,
/// so a session is exclusive and its writes land only on `commit`.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows outside of any request, assigning ids as `insert` would.
    pub async fn seed(&self, table: &str, rows: impl IntoIterator<Item = Row>) -> Result<(), StoreError> {
        let mut session = self.session().await?;
        for row in rows {
            session.insert(table, row).await?;
        }
        session.commit().await
    }

    /// Number of committed rows in a table.
    pub async fn len(&self, table: &str) -> usize {
        self.tables
            .lock()
            .await
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn session(&self) -> Result<Box<dyn Session>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemorySession { guard, working }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

struct MemorySession {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl MemorySession {
    fn table(&mut self, name: &str) -> &mut Table {
        self.working.entry(name.to_string()).or_default()
    }
}

fn row_id(row: &Row) -> Result<Option<RecordId>, StoreError> {
    match row.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| StoreError::Constraint(format!("id must be an integer, got {}", v))),
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn count(&mut self, table: &str) -> Result<u64, StoreError> {
        Ok(self.table(table).rows.len() as u64)
    }

    async fn page(&mut self, table: &str, page: u64, per_page: u64) -> Result<Vec<Row>, StoreError> {
        let offset = usize::try_from(page_offset(page, per_page)).unwrap_or(usize::MAX);
        Ok(self
            .table(table)
            .rows
            .values()
            .skip(offset)
            .take(usize::try_from(per_page).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn get(&mut self, table: &str, id: RecordId) -> Result<Row, StoreError> {
        self.table(table)
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(table, id))
    }

    async fn insert(&mut self, table: &str, mut row: Row) -> Result<Row, StoreError> {
        let requested = row_id(&row)?;
        let t = self.table(table);
        let id = match requested {
            Some(id) if t.rows.contains_key(&id) => {
                return Err(StoreError::Constraint(format!(
                    "duplicate key: {}.id = {}",
                    table, id
                )));
            }
            Some(id) => id,
            None => t.last_id + 1,
        };
        t.last_id = t.last_id.max(id);
        row.insert("id".to_string(), Value::from(id));
        t.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update(&mut self, table: &str, id: RecordId, row: Row) -> Result<Row, StoreError> {
        let stored = self
            .table(table)
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(table, id))?;
        for (key, value) in row {
            if key != "id" {
                stored.insert(key, value);
            }
        }
        Ok(stored.clone())
    }

    async fn delete(&mut self, table: &str, id: RecordId) -> Result<Row, StoreError> {
        self.table(table)
            .rows
            .remove(&id)
            .ok_or_else(|| StoreError::not_found(table, id))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemorySession { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
