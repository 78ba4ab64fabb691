use serde::{de::DeserializeOwned, Serialize};

use crate::database::RecordId;

/// A persisted record type exposed through a [`ResourceView`](crate::view::ResourceView).
///
/// Serializing a value yields its stored columns; deserializing a JSON object
/// is how new values are constructed from request fields.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type name. Lower-cased, it is the default endpoint.
    const NAME: &'static str;

    /// Table rows live in.
    fn table() -> String {
        Self::NAME.to_lowercase()
    }

    /// Identifier, or None before the store has assigned one.
    fn id(&self) -> Option<RecordId>;
}
