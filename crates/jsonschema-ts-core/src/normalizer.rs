//! Shape-only rewrites applied to each loaded document before parsing.
//!
//! Rules applied to every schema object that is not a `$ref` (the children of
//! a `$ref` object, such as its `definitions`, are still visited):
//! - A one-element `type` array becomes its single element.
//! - `required: false` (draft 3 style) becomes `required: []`.
//! - Object-like schemas without `additionalProperties` or
//!   `patternProperties` get `additionalProperties: true`.
//!
//! The compile root additionally receives `required: []` and a `title`
//! derived from the root name when it lacks them.

use serde_json::{Map, Value};

use crate::error::CompileError;
use crate::schema_utils::recurse_into_children;

/// Normalize the root document of a compile.
pub fn normalize(schema: &Value, root_name: &str) -> Result<Value, CompileError> {
    let mut result = normalize_fragment(schema)?;
    if let Value::Object(obj) = &mut result {
        if !obj.contains_key("$ref") {
            obj.entry("required").or_insert_with(|| Value::Array(Vec::new()));
            if !obj.contains_key("title") {
                obj.insert("title".to_string(), Value::String(root_name.to_string()));
            }
        }
    }
    Ok(result)
}

/// Normalize a document without the root-only rules. Used for documents
/// loaded through file `$ref`s.
pub fn normalize_fragment(schema: &Value) -> Result<Value, CompileError> {
    walk(schema, "#")
}

fn walk(schema: &Value, path: &str) -> Result<Value, CompileError> {
    let Value::Object(obj) = schema else {
        return Ok(schema.clone());
    };

    let mut obj = obj.clone();
    if !obj.contains_key("$ref") {
        destructure_unary_type(&mut obj);
        fix_required(&mut obj);
        default_additional_properties(&mut obj);
    }

    recurse_into_children(&mut obj, path, &mut |child: &Value, child_path: &str| {
        walk(child, child_path)
    })?;

    Ok(Value::Object(obj))
}

fn destructure_unary_type(obj: &mut Map<String, Value>) {
    if let Some(Value::Array(types)) = obj.get_mut("type") {
        if types.len() == 1 {
            let single = types.remove(0);
            obj.insert("type".to_string(), single);
        }
    }
}

fn fix_required(obj: &mut Map<String, Value>) {
    if obj.get("required") == Some(&Value::Bool(false)) {
        obj.insert("required".to_string(), Value::Array(Vec::new()));
    }
}

fn default_additional_properties(obj: &mut Map<String, Value>) {
    let object_like =
        obj.get("type").and_then(Value::as_str) == Some("object") || obj.contains_key("properties");
    if object_like
        && !obj.contains_key("additionalProperties")
        && !obj.contains_key("patternProperties")
    {
        obj.insert("additionalProperties".to_string(), Value::Bool(true));
    }
}
