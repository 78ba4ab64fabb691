use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::database::{Database, MemoryDatabase, RecordId, Row, Session, StoreError};
use crate::permission::{PermissionCheck, PermissionEngine, PermissionError};

/// Memory store that counts every call made against it.
#[derive(Debug, Clone, Default)]
pub struct SpyDatabase {
    inner: MemoryDatabase,
    calls: Arc<AtomicUsize>,
}

impl SpyDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions opened plus session operations run.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryDatabase {
        &self.inner
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Database for SpyDatabase {
    async fn session(&self) -> Result<Box<dyn Session>, StoreError> {
        self.hit();
        let inner = self.inner.session().await?;
        Ok(Box::new(SpySession {
            inner,
            calls: Arc::clone(&self.calls),
        }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.hit();
        Ok(())
    }
}

struct SpySession {
    inner: Box<dyn Session>,
    calls: Arc<AtomicUsize>,
}

impl SpySession {
    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for SpySession {
    async fn count(&mut self, table: &str) -> Result<u64, StoreError> {
        self.hit();
        self.inner.count(table).await
    }

    async fn page(&mut self, table: &str, page: u64, per_page: u64) -> Result<Vec<Row>, StoreError> {
        self.hit();
        self.inner.page(table, page, per_page).await
    }

    async fn get(&mut self, table: &str, id: RecordId) -> Result<Row, StoreError> {
        self.hit();
        self.inner.get(table, id).await
    }

    async fn insert(&mut self, table: &str, row: Row) -> Result<Row, StoreError> {
        self.hit();
        self.inner.insert(table, row).await
    }

    async fn update(&mut self, table: &str, id: RecordId, row: Row) -> Result<Row, StoreError> {
        self.hit();
        self.inner.update(table, id, row).await
    }

    async fn delete(&mut self, table: &str, id: RecordId) -> Result<Row, StoreError> {
        self.hit();
        self.inner.delete(table, id).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.hit();
        self.inner.commit().await
    }
}

/// Denies every check and remembers what was asked.
#[derive(Debug, Default)]
pub struct DenyAll {
    seen: Mutex<Vec<(String, String, String)>>,
}

impl DenyAll {
    pub fn seen(&self) -> Vec<(String, String, String)> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PermissionEngine for DenyAll {
    async fn check(&self, check: &PermissionCheck<'_>) -> Result<(), PermissionError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((
                check.resource.to_string(),
                check.mode.to_string(),
                check.group.to_string(),
            ));
        }
        Err(PermissionError::denied(check))
    }
}
