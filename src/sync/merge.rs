//! Top-level section merging.
//!
//! Merges are shallow: a section present in the overrides replaces the
//! default section wholesale, fields inside a section are never combined.

use serde_json::{Map, Value};

use crate::errors::SyncError;
use crate::models::WebsiteContent;

/// Merge `overrides` over `base`, one top-level key at a time.
///
/// A known section whose override does not fit its schema keeps the base
/// value. Unknown keys are kept as extensions.
pub fn merge_sections(base: &WebsiteContent, overrides: &Map<String, Value>) -> WebsiteContent {
    let mut merged = base.clone();
    for (key, value) in overrides {
        if let Err(e) = merged.set_key(key, value.clone()) {
            tracing::warn!("Ignoring malformed section '{}': {}", key, e);
        }
    }
    merged
}

/// Apply a client patch. Unlike `merge_sections` every key must fit its
/// schema, the first bad key fails the whole patch.
pub fn apply_patch(
    content: &mut WebsiteContent,
    patch: Map<String, Value>,
) -> Result<(), SyncError> {
    for (key, value) in patch {
        content
            .set_key(&key, value)
            .map_err(|e| SyncError::Serialization(format!("section '{}': {}", key, e)))?;
    }
    Ok(())
}

/// Parse a JSON object, as stored in the cache slots.
pub fn parse_map(raw: &str) -> Result<Map<String, Value>, SyncError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(SyncError::Serialization(
            "expected a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_override_replaces_whole_section() {
        let defaults = WebsiteContent::defaults();
        let merged = merge_sections(&defaults, &object(json!({ "hero": { "title": "Remote" } })));

        assert_eq!(merged.hero.title, "Remote");
        // Not a deep merge: the default subtitle is gone
        assert_eq!(merged.hero.subtitle, "");
        assert_eq!(merged.about, defaults.about);
        assert_eq!(merged.footer, defaults.footer);
    }

    #[test]
    fn test_malformed_section_keeps_default() {
        let defaults = WebsiteContent::defaults();
        let merged = merge_sections(
            &defaults,
            &object(json!({ "hero": null, "contact": { "email": "x@y.z" } })),
        );
        assert_eq!(merged.hero, defaults.hero);
        assert_eq!(merged.contact.email, "x@y.z");
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let merged = merge_sections(
            &WebsiteContent::defaults(),
            &object(json!({ "pricing": [1, 2] })),
        );
        assert_eq!(merged.extensions["pricing"], json!([1, 2]));
    }

    #[test]
    fn test_apply_patch_is_strict() {
        let mut content = WebsiteContent::defaults();
        let err = apply_patch(
            &mut content,
            object(json!({ "hero": { "stats": 5 } })),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Serialization(_)));
    }

    #[test]
    fn test_parse_map_rejects_non_objects() {
        assert!(parse_map("[1,2]").is_err());
        assert!(parse_map("{not json").is_err());
        assert_eq!(parse_map(r#"{"a":1}"#).unwrap()["a"], 1);
    }
}
