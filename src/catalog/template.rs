use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An immutable seed record loaded once from the catalog.
///
/// `id` and `topic` are the only fields the feed relies on. Everything else
/// in the source record (author, body, media...) is kept verbatim in
/// `fields` and copied into every item materialized from this template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub topic: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Template {
    pub fn new(id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            fields: Map::new(),
        }
    }

    /// Adds a body field, replacing any previous value under `key`.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
