//! Document and world types.
//!
//! A document is whatever JSON value a client last wrote for an entity,
//! usually an object mapping field names to values. The store never looks
//! inside values beyond what `merge` needs.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// The content owned by one entity.
pub type Document = Value;

/// Snapshot of every entity and its document.
pub type World = HashMap<String, Document>;

/// The document of an entity nobody has written yet: `{}`.
pub fn empty_document() -> Document {
    Value::Object(Map::new())
}

/// Build a document holding a single field.
pub fn single_field(key: impl Into<String>, value: Value) -> Document {
    let mut fields = Map::new();
    fields.insert(key.into(), value);
    Value::Object(fields)
}

/// Set `key` on `document`.
///
/// A document that is not an object is replaced by a single-field object.
pub fn insert_field(document: &mut Document, key: impl Into<String>, value: Value) {
    match document {
        Value::Object(fields) => {
            fields.insert(key.into(), value);
        }
        other => *other = single_field(key, value),
    }
}

/// Number of top-level fields, zero for anything but an object.
pub fn field_count(document: &Document) -> usize {
    document.as_object().map_or(0, Map::len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_field() {
        assert_eq!(single_field("x", json!(5)), json!({"x": 5}));
    }

    #[test]
    fn test_empty_document_is_empty_object() {
        assert_eq!(empty_document(), json!({}));
        assert_eq!(field_count(&empty_document()), 0);
    }

    #[test]
    fn test_insert_field_into_object() {
        let mut doc = json!({"x": 1});
        insert_field(&mut doc, "y", json!(2));
        assert_eq!(doc, json!({"x": 1, "y": 2}));
    }

    #[test]
    fn test_insert_field_replaces_scalar() {
        for scalar in [json!(3), json!(null), json!([1, 2]), json!("paddle")] {
            let mut doc = scalar;
            insert_field(&mut doc, "x", json!(1));
            assert_eq!(doc, json!({"x": 1}));
        }
    }

    #[test]
    fn test_field_count() {
        assert_eq!(field_count(&json!({"a": 1, "b": 2})), 2);
        assert_eq!(field_count(&json!([1, 2, 3])), 0);
        assert_eq!(field_count(&json!(7)), 0);
    }
}
