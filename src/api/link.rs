use serde_json::Value;

use crate::database::RecordId;

pub fn record_link(prefix: &str, endpoint: &str, id: RecordId) -> String {
    format!("{}{}/{}", prefix, endpoint, id)
}

/// Add a `link` field pointing at the record's item route. Non-object values
/// and records without an id pass through untouched.
pub fn annotate(mut record: Value, prefix: &str, endpoint: &str, id: Option<RecordId>) -> Value {
    if let (Value::Object(map), Some(id)) = (&mut record, id) {
        map.insert("link".to_string(), Value::String(record_link(prefix, endpoint, id)));
    }
    record
}
