//! Typed dot paths into the content document, e.g. `hero.stats`.

use serde_json::{Map, Value};

use super::SectionKey;
use crate::errors::SyncError;

/// First segment of a content path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRoot {
    Section(SectionKey),
    Extension(String),
}

impl PathRoot {
    pub fn key(&self) -> &str {
        match self {
            PathRoot::Section(section) => section.as_str(),
            PathRoot::Extension(key) => key,
        }
    }
}

/// A validated path: a top-level key followed by zero or more field names.
/// Numeric segments index into arrays that already exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPath {
    root: PathRoot,
    fields: Vec<String>,
}

impl ContentPath {
    /// Parse a dotted path. Empty segments are rejected.
    pub fn parse(dotted: &str) -> Result<Self, SyncError> {
        let mut segments = dotted.split('.');
        let first = segments.next().unwrap_or_default();
        if first.trim().is_empty() {
            return Err(SyncError::InvalidPath(format!("'{}' has no root key", dotted)));
        }

        let fields: Vec<String> = segments.map(str::to_string).collect();
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(SyncError::InvalidPath(format!(
                "'{}' contains an empty segment",
                dotted
            )));
        }

        let root = match SectionKey::from_key(first) {
            Some(section) => PathRoot::Section(section),
            None => PathRoot::Extension(first.to_string()),
        };

        Ok(Self { root, fields })
    }

    pub fn root(&self) -> &PathRoot {
        &self.root
    }

    /// Set `value` at this path inside `root_value`, the current value of the
    /// root key. Missing or null intermediates are created as empty objects.
    pub fn set_within(&self, root_value: Value, value: Value) -> Result<Value, SyncError> {
        let Some((leaf, parents)) = self.fields.split_last() else {
            return Ok(value);
        };

        let mut root_value = match root_value {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        let mut current = &mut root_value;
        for segment in parents {
            current = descend(current, segment, self)?;
        }

        match current {
            Value::Object(map) => {
                map.insert(leaf.clone(), value);
            }
            Value::Array(items) => {
                let slot = leaf
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get_mut(index))
                    .ok_or_else(|| self.invalid(leaf))?;
                *slot = value;
            }
            _ => return Err(self.invalid(leaf)),
        }

        Ok(root_value)
    }

    fn invalid(&self, segment: &str) -> SyncError {
        SyncError::InvalidPath(format!("cannot resolve '{}' in '{}'", segment, self))
    }
}

fn descend<'a>(
    current: &'a mut Value,
    segment: &str,
    path: &ContentPath,
) -> Result<&'a mut Value, SyncError> {
    match current {
        Value::Object(map) => {
            let next = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if next.is_null() {
                *next = Value::Object(Map::new());
            }
            Ok(next)
        }
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |index| items.get_mut(index))
            .ok_or_else(|| path.invalid(segment)),
        _ => Err(path.invalid(segment)),
    }
}

impl std::fmt::Display for ContentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.root.key())?;
        for field in &self.fields {
            write!(f, ".{}", field)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_section_root() {
        let path = ContentPath::parse("hero.stats").unwrap();
        assert_eq!(path.root(), &PathRoot::Section(SectionKey::Hero));
        assert_eq!(path.fields, ["stats".to_string()]);
        assert_eq!(path.to_string(), "hero.stats");
    }

    #[test]
    fn test_parse_extension_root() {
        let path = ContentPath::parse("pricing.tiers").unwrap();
        assert_eq!(path.root(), &PathRoot::Extension("pricing".to_string()));
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!(ContentPath::parse("").is_err());
        assert!(ContentPath::parse("hero..title").is_err());
        assert!(ContentPath::parse("hero.").is_err());
    }

    #[test]
    fn test_set_leaf_field() {
        let path = ContentPath::parse("hero.title").unwrap();
        let updated = path
            .set_within(json!({ "title": "Old", "subtitle": "Keep" }), json!("New"))
            .unwrap();
        assert_eq!(updated, json!({ "title": "New", "subtitle": "Keep" }));
    }

    #[test]
    fn test_missing_intermediates_become_objects() {
        let path = ContentPath::parse("about.gallery.images").unwrap();
        let updated = path.set_within(json!({}), json!(["a.png", "b.png"])).unwrap();
        assert_eq!(updated, json!({ "gallery": { "images": ["a.png", "b.png"] } }));
        assert!(updated["gallery"].is_object());
    }

    #[test]
    fn test_numeric_segment_indexes_existing_array() {
        let path = ContentPath::parse("hero.stats.1.value").unwrap();
        let updated = path
            .set_within(
                json!({ "stats": [{ "value": "1" }, { "value": "2" }] }),
                json!("20"),
            )
            .unwrap();
        assert_eq!(updated["stats"][1]["value"], "20");
        assert_eq!(updated["stats"][0]["value"], "1");
    }

    #[test]
    fn test_cannot_walk_through_primitive() {
        let path = ContentPath::parse("hero.title.text").unwrap();
        let err = path
            .set_within(json!({ "title": "plain" }), json!("x"))
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidPath(_)));
    }

    #[test]
    fn test_root_only_path_replaces_value() {
        let path = ContentPath::parse("pricing").unwrap();
        let updated = path.set_within(Value::Null, json!({ "tiers": 3 })).unwrap();
        assert_eq!(updated, json!({ "tiers": 3 }));
    }
}
