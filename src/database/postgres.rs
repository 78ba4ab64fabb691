use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Row as _, Transaction};
use tracing::{debug, info};

use super::{is_valid_identifier, page_offset, Database, RecordId, Row, Session, StoreError};

/// PostgreSQL store. Each resource maps to a table of the same name with a
/// bigint `id` primary key; rows travel as `row_to_json` objects.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(map_sqlx)?;
        info!("Connected to PostgreSQL (max_connections={})", max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// LIMIT and OFFSET are signed in Postgres; clamp instead of wrapping.
fn sql_bound(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl Database for PgDatabase {
    async fn session(&self) -> Result<Box<dyn Session>, StoreError> {
        let tx = self.pool.begin().await.map_err(map_sqlx)?;
        Ok(Box::new(PgSession { tx }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}

struct PgSession {
    tx: Transaction<'static, Postgres>,
}

/// Integrity violations (SQLSTATE class 23) become constraint errors; lost
/// connections become unavailability.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().map(|c| c.starts_with("23")).unwrap_or(false) {
            return StoreError::Constraint(db_err.message().to_string());
        }
    }
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Sqlx(other),
    }
}

fn quote(name: &str) -> Result<String, StoreError> {
    if !is_valid_identifier(name) {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

fn json_row(row: &sqlx::postgres::PgRow) -> Result<Row, StoreError> {
    let value: Value = row.try_get("row").map_err(map_sqlx)?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::QueryError(format!("expected a JSON object row, got {}", other))),
    }
}

/// Quoted column list for every key of a row except a null `id`.
fn columns(row: &Row) -> Result<Vec<String>, StoreError> {
    row.keys()
        .filter(|k| k.as_str() != "id" || !row[k.as_str()].is_null())
        .map(|k| quote(k))
        .collect()
}

#[async_trait]
impl Session for PgSession {
    async fn count(&mut self, table: &str) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote(table)?);
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(count.max(0) as u64)
    }

    async fn page(&mut self, table: &str, page: u64, per_page: u64) -> Result<Vec<Row>, StoreError> {
        let sql = format!(
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM {} ORDER BY id LIMIT $1 OFFSET $2) t",
            quote(table)?
        );
        debug!("page {} of {} ({} per page)", page, table, per_page);
        let rows = sqlx::query(&sql)
            .bind(sql_bound(per_page))
            .bind(sql_bound(page_offset(page, per_page)))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(json_row).collect()
    }

    async fn get(&mut self, table: &str, id: RecordId) -> Result<Row, StoreError> {
        let sql = format!(
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM {} WHERE id = $1) t",
            quote(table)?
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?
            .ok_or_else(|| StoreError::not_found(table, id))?;
        json_row(&row)
    }

    async fn insert(&mut self, table: &str, row: Row) -> Result<Row, StoreError> {
        let quoted = quote(table)?;
        let cols = columns(&row)?;
        let sql = if cols.is_empty() {
            format!("INSERT INTO {} AS t DEFAULT VALUES RETURNING row_to_json(t) AS row", quoted)
        } else {
            let list = cols.join(", ");
            format!(
                "INSERT INTO {table} AS t ({list}) SELECT {list} FROM jsonb_populate_record(NULL::{table}, $1::jsonb) RETURNING row_to_json(t) AS row",
                table = quoted,
                list = list
            )
        };
        let inserted = sqlx::query(&sql)
            .bind(Value::Object(row))
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        json_row(&inserted)
    }

    async fn update(&mut self, table: &str, id: RecordId, mut row: Row) -> Result<Row, StoreError> {
        row.remove("id");
        let quoted = quote(table)?;
        let cols = columns(&row)?;
        if cols.is_empty() {
            return self.get(table, id).await;
        }
        let list = cols.join(", ");
        let sql = format!(
            "UPDATE {table} AS t SET ({list}) = (SELECT {list} FROM jsonb_populate_record(NULL::{table}, $1::jsonb)) WHERE t.id = $2 RETURNING row_to_json(t) AS row",
            table = quoted,
            list = list
        );
        let updated = sqlx::query(&sql)
            .bind(Value::Object(row))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?
            .ok_or_else(|| StoreError::not_found(table, id))?;
        json_row(&updated)
    }

    async fn delete(&mut self, table: &str, id: RecordId) -> Result<Row, StoreError> {
        let sql = format!(
            "DELETE FROM {} AS t WHERE t.id = $1 RETURNING row_to_json(t) AS row",
            quote(table)?
        );
        let deleted = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?
            .ok_or_else(|| StoreError::not_found(table, id))?;
        json_row(&deleted)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx)
    }
}
