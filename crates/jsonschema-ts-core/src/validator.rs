//! Structural sanity checks run before any compilation work.

use serde_json::Value;

use crate::schema_utils::child_schemas;

/// Check `schema` and every nested schema against the rules the compiler
/// relies on. An empty result means the compile may proceed.
pub fn validate(schema: &Value, root_name: &str) -> Vec<String> {
    let mut errors = Vec::new();
    validate_node(schema, "#", root_name, &mut errors);
    errors
}

fn validate_node(schema: &Value, path: &str, root_name: &str, errors: &mut Vec<String>) {
    let Some(obj) = schema.as_object() else {
        return;
    };

    let mut fail = |rule: &str| {
        errors.push(format!(
            "Error at key \"{path}\" in schema \"{root_name}\": {rule}"
        ));
    };

    let enum_values = obj.get("enum");
    if let Some(values) = enum_values {
        match values.as_array() {
            Some(values) if !values.is_empty() => {}
            _ => fail("enum must be a non-empty array"),
        }
    }

    if let Some(names) = obj.get("tsEnumNames") {
        match names.as_array() {
            Some(names) if names.iter().all(Value::is_string) => {
                let enum_len = enum_values.and_then(Value::as_array).map(Vec::len);
                if enum_len != Some(names.len()) {
                    fail("enum and tsEnumNames must have the same length");
                }
            }
            _ => fail("tsEnumNames must be an array of strings"),
        }
    }

    for (child_path, child) in child_schemas(obj, path) {
        validate_node(child, &child_path, root_name, errors);
    }
}
