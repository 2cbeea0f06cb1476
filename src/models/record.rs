//! Editable records used by the per-entity editors (blog posts, products, ...).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Any entity that starts without an id and receives one on first save.
pub trait EditableRecord: Clone + Send + Sync + 'static {
    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: String);
}

/// A loosely-typed record: an optional id plus arbitrary JSON fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entry {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { id: None, fields }
    }

    /// Shallow-merge `patch` into the fields. An `id` key in the patch is
    /// ignored, ids are only assigned by the store.
    pub fn merge(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            if key == "id" {
                continue;
            }
            self.fields.insert(key, value);
        }
    }
}

impl EditableRecord for Entry {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// A stored record as returned by the public read endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: String,
    pub collection: String,
    pub data: Map<String, Value>,
    pub created_at: String,
    pub updated_at: String,
    pub updated_by: String,
    pub version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_ignores_id() {
        let mut entry = Entry::new(Map::new());
        let patch = json!({ "id": "forged", "title": "Hello" });
        entry.merge(patch.as_object().cloned().unwrap());
        assert_eq!(entry.id(), None);
        assert_eq!(entry.fields["title"], "Hello");
    }

    #[test]
    fn test_entry_flattens_fields() {
        let mut entry = Entry::new(json!({ "title": "a" }).as_object().cloned().unwrap());
        entry.set_id("abc".to_string());
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value, json!({ "id": "abc", "title": "a" }));
    }
}
