use serde_json::{Map, Value};

use super::{Operation, ResourceView};
use crate::api::{link, Envelope, Pagination};
use crate::database::{RecordId, Row, Session};
use crate::error::ApiError;
use crate::resource::Resource;

impl<R: Resource> ResourceView<R> {
    pub(crate) async fn execute(&self, session: &mut dyn Session, operation: Operation) -> Result<Envelope, ApiError> {
        match operation {
            Operation::List { page } => self.list(session, page).await,
            Operation::Get { id } => self.get(session, id).await,
            Operation::Create { fields } => self.create(session, fields).await,
            Operation::Replace { id, fields } => self.replace(session, id, fields).await,
            Operation::Delete { id } => self.delete(session, id).await,
        }
    }

    async fn list(&self, session: &mut dyn Session, page: u64) -> Result<Envelope, ApiError> {
        let table = R::table();
        let total = session.count(&table).await?;
        let rows = session.page(&table, page, self.per_page).await?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let record = from_row::<R>(row)?;
            let id = record.id();
            data.push(link::annotate(to_value(&record)?, &self.prefix, self.endpoint_name(), id));
        }

        let pagination = Pagination::new(page, self.per_page, total);
        Ok(Envelope::page(data, &pagination, &self.prefix, self.endpoint_name()))
    }

    async fn get(&self, session: &mut dyn Session, id: RecordId) -> Result<Envelope, ApiError> {
        let record = from_row::<R>(session.get(&R::table(), id).await?)?;
        Ok(Envelope::item(to_value(&record)?))
    }

    async fn create(&self, session: &mut dyn Session, fields: Map<String, Value>) -> Result<Envelope, ApiError> {
        let record: R = serde_json::from_value(Value::Object(fields))
            .map_err(|e| ApiError::unprocessable_entity(format!("Invalid {}: {}", R::NAME, e)))?;
        let stored = session.insert(&R::table(), to_row(&record)?).await?;
        Ok(Envelope::item(to_value(&from_row::<R>(stored)?)?))
    }

    /// Merge the request fields over the stored record; `id` stays the path id.
    async fn replace(
        &self,
        session: &mut dyn Session,
        id: RecordId,
        fields: Map<String, Value>,
    ) -> Result<Envelope, ApiError> {
        let table = R::table();
        let mut merged = session.get(&table, id).await?;
        for (key, value) in fields {
            if key != "id" {
                merged.insert(key, value);
            }
        }
        merged.insert("id".to_string(), Value::from(id));

        let record: R = serde_json::from_value(Value::Object(merged))
            .map_err(|e| ApiError::unprocessable_entity(format!("Invalid {}: {}", R::NAME, e)))?;
        let stored = session.update(&table, id, to_row(&record)?).await?;
        Ok(Envelope::item(to_value(&from_row::<R>(stored)?)?))
    }

    async fn delete(&self, session: &mut dyn Session, id: RecordId) -> Result<Envelope, ApiError> {
        let removed = session.delete(&R::table(), id).await?;
        Ok(Envelope::item(to_value(&from_row::<R>(removed)?)?))
    }
}

/// A stored row that no longer fits the resource type is a server-side fault.
fn from_row<R: Resource>(row: Row) -> Result<R, ApiError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| {
        tracing::error!("Stored {} row does not match the resource: {}", R::NAME, e);
        ApiError::internal_server_error(format!("Stored {} is unreadable", R::NAME))
    })
}

fn to_value<R: Resource>(record: &R) -> Result<Value, ApiError> {
    serde_json::to_value(record).map_err(|e| {
        tracing::error!("Failed to serialize {}: {}", R::NAME, e);
        ApiError::internal_server_error("Failed to format response")
    })
}

fn to_row<R: Resource>(record: &R) -> Result<Row, ApiError> {
    match to_value(record)? {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::internal_server_error(format!(
            "{} does not serialize to an object",
            R::NAME
        ))),
    }
}
