//! Shared schema utilities for consistent traversal and path construction.
//!
//! Provides two concerns used by the validator, normalizer, resolver and
//! parser:
//! 1. **JSON Pointer escaping** (RFC 6901) for property keys with `/` or `~`
//! 2. **Shared traversal** that visits every schema-bearing keyword the
//!    compiler understands, in one place

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::error::CompileError;

// ---------------------------------------------------------------------------
// JSON Pointer escaping (RFC 6901)
// ---------------------------------------------------------------------------

/// Escape a single path segment per RFC 6901.
///
/// - `~` → `~0`
/// - `/` → `~1`
///
/// Returns `Cow::Borrowed` when no escaping is needed (the common case).
pub fn escape_pointer_segment(segment: &str) -> Cow<'_, str> {
    if segment.contains('~') || segment.contains('/') {
        Cow::Owned(segment.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Build a JSON Pointer path by appending segments to a parent path.
///
/// # Example
/// ```
/// use jsonschema_ts_core::build_path;
/// assert_eq!(build_path("#", &["properties", "a/b"]), "#/properties/a~1b");
/// ```
pub fn build_path(parent: &str, segments: &[&str]) -> String {
    let mut path = parent.to_string();
    for segment in segments {
        path.push('/');
        path.push_str(&escape_pointer_segment(segment));
    }
    path
}

/// Unescape a single path segment per RFC 6901.
///
/// Order matters: unescape `~1` first to avoid double-unescaping.
pub fn unescape_pointer_segment(segment: &str) -> Cow<'_, str> {
    if segment.contains("~0") || segment.contains("~1") {
        Cow::Owned(segment.replace("~1", "/").replace("~0", "~"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Split a JSON Pointer path into decoded segments.
///
/// # Example
/// ```
/// use jsonschema_ts_core::split_path;
/// assert_eq!(split_path("#/definitions/a~1b"), vec!["definitions", "a/b"]);
/// assert_eq!(split_path("#"), Vec::<String>::new());
/// ```
pub fn split_path(path: &str) -> Vec<String> {
    let stripped = path.strip_prefix('#').unwrap_or(path);

    // An empty fragment ("#" or "") refers to the whole document.
    if stripped.is_empty() {
        return Vec::new();
    }

    let mut segments_iter = stripped.split('/');

    // "#/" → [""] refers to the empty-string key, so only the first empty
    // segment is dropped.
    if stripped.starts_with('/') {
        segments_iter.next();
    }

    segments_iter
        .map(|s| unescape_pointer_segment(s).into_owned())
        .collect()
}

// ---------------------------------------------------------------------------
// Shared schema traversal
// ---------------------------------------------------------------------------

/// Keywords whose value is a map of property name → schema.
const MAP_KEYWORDS: [&str; 5] = [
    "properties",
    "patternProperties",
    "definitions",
    "$defs",
    "dependencies",
];

/// Keywords whose value is a single schema.
const SINGLE_KEYWORDS: [&str; 8] = [
    "additionalProperties",
    "additionalItems",
    "propertyNames",
    "contains",
    "not",
    "if",
    "then",
    "else",
];

/// Keywords whose value is an array of schemas.
const ARRAY_KEYWORDS: [&str; 3] = ["anyOf", "oneOf", "allOf"];

/// Keywords whose value is either one schema or an array of schemas.
const SCHEMA_OR_ARRAY_KEYWORDS: [&str; 2] = ["items", "tsExtends"];

fn is_schema(value: &Value) -> bool {
    value.is_object() || value.is_boolean()
}

/// Recursively visit all schema-bearing children of a JSON Schema object,
/// replacing each child with the value returned by `walk_fn`.
///
/// Uses the extract-recurse-reinsert pattern to avoid borrow conflicts.
/// Non-schema values under a recognised keyword (`dependencies` arrays,
/// `additionalProperties: false`) are preserved as-is.
pub fn recurse_into_children<F>(
    obj: &mut Map<String, Value>,
    path: &str,
    walk_fn: &mut F,
) -> Result<(), CompileError>
where
    F: FnMut(&Value, &str) -> Result<Value, CompileError>,
{
    for keyword in MAP_KEYWORDS {
        if let Some(val) = obj.remove(keyword) {
            match val {
                Value::Object(map) => {
                    let mut new_map = Map::new();
                    for (key, val) in map {
                        let walked = if val.is_object() {
                            walk_fn(&val, &build_path(path, &[keyword, &key]))?
                        } else {
                            val
                        };
                        new_map.insert(key, walked);
                    }
                    obj.insert(keyword.to_string(), Value::Object(new_map));
                }
                other => {
                    obj.insert(keyword.to_string(), other);
                }
            }
        }
    }

    for keyword in SINGLE_KEYWORDS {
        if let Some(val) = obj.remove(keyword) {
            if val.is_object() {
                let walked = walk_fn(&val, &build_path(path, &[keyword]))?;
                obj.insert(keyword.to_string(), walked);
            } else {
                obj.insert(keyword.to_string(), val);
            }
        }
    }

    for keyword in ARRAY_KEYWORDS.into_iter().chain(SCHEMA_OR_ARRAY_KEYWORDS) {
        if let Some(val) = obj.remove(keyword) {
            let walked = match val {
                Value::Object(_) if SCHEMA_OR_ARRAY_KEYWORDS.contains(&keyword) => {
                    walk_fn(&val, &build_path(path, &[keyword]))?
                }
                Value::Array(variants) => {
                    let mut walked = Vec::with_capacity(variants.len());
                    for (i, variant) in variants.into_iter().enumerate() {
                        if variant.is_object() {
                            walked.push(walk_fn(&variant, &build_path(path, &[keyword, &i.to_string()]))?);
                        } else {
                            walked.push(variant);
                        }
                    }
                    Value::Array(walked)
                }
                other => other,
            };
            obj.insert(keyword.to_string(), walked);
        }
    }

    Ok(())
}

/// Schema-bearing children of `obj` paired with their pointer paths, in
/// keyword order. Boolean schemas are included.
pub fn child_schemas<'a>(obj: &'a Map<String, Value>, path: &str) -> Vec<(String, &'a Value)> {
    let mut children = Vec::new();

    for keyword in MAP_KEYWORDS {
        if let Some(Value::Object(map)) = obj.get(keyword) {
            for (key, val) in map {
                if is_schema(val) {
                    children.push((build_path(path, &[keyword, key]), val));
                }
            }
        }
    }

    for keyword in SINGLE_KEYWORDS {
        if let Some(val) = obj.get(keyword) {
            if is_schema(val) {
                children.push((build_path(path, &[keyword]), val));
            }
        }
    }

    for keyword in ARRAY_KEYWORDS.into_iter().chain(SCHEMA_OR_ARRAY_KEYWORDS) {
        match obj.get(keyword) {
            Some(Value::Array(variants)) => {
                for (i, variant) in variants.iter().enumerate() {
                    if is_schema(variant) {
                        children.push((build_path(path, &[keyword, &i.to_string()]), variant));
                    }
                }
            }
            Some(val) if SCHEMA_OR_ARRAY_KEYWORDS.contains(&keyword) && is_schema(val) => {
                children.push((build_path(path, &[keyword]), val));
            }
            _ => {}
        }
    }

    children
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // --- Escaping tests ---

    #[test]
    fn test_escape_no_special() {
        let result = escape_pointer_segment("foo");
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "foo");
    }

    #[test]
    fn test_escape_both() {
        assert_eq!(escape_pointer_segment("~/"), "~0~1");
    }

    #[test]
    fn test_build_path_escaping() {
        assert_eq!(build_path("#", &["properties", "a/b"]), "#/properties/a~1b");
    }

    #[test]
    fn test_build_path_empty() {
        assert_eq!(build_path("#", &[]), "#");
    }

    #[test]
    fn test_unescape_both() {
        assert_eq!(unescape_pointer_segment("a~0b~1c"), "a~b/c");
    }

    #[test]
    fn test_split_path_with_escapes() {
        assert_eq!(
            split_path("#/properties/a~1b/items"),
            vec!["properties", "a/b", "items"]
        );
    }

    #[test]
    fn test_split_path_root() {
        assert_eq!(split_path("#"), Vec::<String>::new());
    }

    #[test]
    fn test_split_path_empty_key() {
        assert_eq!(split_path("#/"), vec![""]);
    }

    // --- Traversal tests ---

    #[test]
    fn test_recurse_visits_all_keywords() {
        let mut schema = json!({
            "properties": { "a": { "type": "string" } },
            "patternProperties": { "^x-": { "type": "string" } },
            "additionalProperties": { "type": "integer" },
            "items": { "type": "string" },
            "anyOf": [{ "type": "string" }],
            "oneOf": [{ "type": "integer" }],
            "allOf": [{ "type": "boolean" }],
            "not": { "type": "null" },
            "definitions": { "Bar": { "type": "integer" } },
            "$defs": { "Foo": { "type": "string" } },
            "tsExtends": [{ "$ref": "#/definitions/Bar" }]
        });

        let obj = schema.as_object_mut().unwrap();
        let mut visited = 0;
        recurse_into_children(obj, "#", &mut |val: &Value, _path: &str| {
            visited += 1;
            Ok(val.clone())
        })
        .unwrap();

        assert_eq!(visited, 11);
    }

    #[test]
    fn test_recurse_preserves_non_schema_values() {
        let mut schema = json!({
            "additionalProperties": false,
            "items": true,
            "dependencies": { "a": ["b"] },
            "anyOf": "invalid"
        });
        let original = schema.clone();

        let obj = schema.as_object_mut().unwrap();
        recurse_into_children(obj, "#", &mut |_val: &Value, _path: &str| {
            Ok(json!("replaced"))
        })
        .unwrap();

        assert_eq!(schema, original);
    }

    #[test]
    fn test_recurse_items_array_form() {
        let mut schema = json!({
            "items": [{ "type": "string" }, { "type": "integer" }]
        });

        let obj = schema.as_object_mut().unwrap();
        let mut paths = Vec::new();
        recurse_into_children(obj, "#", &mut |val: &Value, path: &str| {
            paths.push(path.to_string());
            Ok(val.clone())
        })
        .unwrap();

        assert_eq!(paths, vec!["#/items/0", "#/items/1"]);
    }

    #[test]
    fn test_child_schemas_paths_and_booleans() {
        let schema = json!({
            "properties": { "a/b": { "type": "string" }, "c": true },
            "tsExtends": { "$ref": "#/definitions/Base" },
            "enum": [{ "$ref": "not-a-schema" }]
        });

        let paths: Vec<String> = child_schemas(schema.as_object().unwrap(), "#")
            .into_iter()
            .map(|(path, _)| path)
            .collect();

        assert_eq!(
            paths,
            vec!["#/properties/a~1b", "#/properties/c", "#/tsExtends"]
        );
    }
}
