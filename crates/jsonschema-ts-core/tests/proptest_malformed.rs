//! Negative tests for malformed JSON Schemas.
//!
//! The invariant under test is **no panics**: `compile()` returns either
//! `Ok` or a `CompileError` for any JSON value. Where the failure mode is
//! well defined the error code is checked too.
//!
//! Complements `fuzz/fuzz_targets/fuzz_compile.rs`, which feeds arbitrary
//! bytes through JSON parsing first. These tests generate valid JSON with
//! schema-shaped keys directly.

use jsonschema_ts_core::{compile, CompileOptions, ErrorCode, RefOptions};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn default_opts() -> CompileOptions {
    CompileOptions {
        ref_options: RefOptions {
            external: false,
            ..RefOptions::default()
        },
        ..CompileOptions::default()
    }
}

fn error_code(schema: Value) -> ErrorCode {
    compile(&schema, "Malformed", &default_opts())
        .expect_err("schema should be rejected")
        .code()
}

// ===========================================================================
// 1. Deterministic cases
// ===========================================================================

/// Keyword shapes the compiler does not understand are ignored.
#[test]
fn malformed_keyword_shapes_are_tolerated() {
    for schema in [
        json!({ "type": "object", "properties": { "a": { "type": "string" } }, "required": "a" }),
        json!({ "anyOf": { "not": "an_array" } }),
        json!({ "allOf": { "type": "string" } }),
        json!({ "type": 42 }),
        json!({ "type": "array", "items": 42 }),
        json!({ "type": "object", "properties": "a_string" }),
        json!({ "$ref": 42 }),
        json!({ "type": [] }),
        json!({ "type": [1, "null"] }),
        json!(true),
        json!(false),
    ] {
        let result = compile(&schema, "Tolerated", &default_opts());
        assert!(result.is_ok(), "{schema} -> {result:?}");
    }
}

#[test]
fn malformed_enum_is_validation_error() {
    assert_eq!(error_code(json!({ "enum": "not_an_array" })), ErrorCode::ValidationError);
    assert_eq!(error_code(json!({ "enum": [] })), ErrorCode::ValidationError);
    assert_eq!(
        error_code(json!({ "enum": [1, 2], "tsEnumNames": ["One", 2] })),
        ErrorCode::ValidationError
    );
}

#[test]
fn non_schema_values_are_schema_errors() {
    assert_eq!(error_code(json!(null)), ErrorCode::SchemaError);
    assert_eq!(error_code(json!({ "properties": { "a": 5 } })), ErrorCode::SchemaError);
    assert_eq!(
        error_code(json!({ "type": "object", "tsExtends": 5 })),
        ErrorCode::SchemaError
    );
}

#[test]
fn self_extension_is_schema_error() {
    assert_eq!(
        error_code(json!({ "type": "object", "properties": {}, "tsExtends": { "$ref": "#" } })),
        ErrorCode::SchemaError
    );
}

#[test]
fn broken_refs_are_resolution_errors() {
    assert_eq!(error_code(json!({ "$ref": "#/$defs/DoesNotExist" })), ErrorCode::ResolutionError);
    assert_eq!(error_code(json!({ "$ref": "#anchor" })), ErrorCode::ResolutionError);
    assert_eq!(
        error_code(json!({
            "$ref": "#/definitions/a",
            "definitions": {
                "a": { "$ref": "#/definitions/b" },
                "b": { "$ref": "#/definitions/a" }
            }
        })),
        ErrorCode::ResolutionError
    );
}

#[test]
fn unbalanced_ts_type_is_format_error() {
    let schema = json!({ "properties": { "a": { "tsType": "{ broken" } } });
    assert_eq!(error_code(schema), ErrorCode::FormatError);
}

// ===========================================================================
// 2. Property-based: arbitrary schema-shaped JSON
// ===========================================================================

const KEYWORDS: [&str; 16] = [
    "type",
    "properties",
    "required",
    "items",
    "enum",
    "tsEnumNames",
    "anyOf",
    "allOf",
    "oneOf",
    "additionalProperties",
    "patternProperties",
    "definitions",
    "$ref",
    "title",
    "description",
    "tsType",
];

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        prop::sample::select(vec![
            "string", "object", "array", "null", "integer", "#", "#/definitions/a", "a",
        ])
        .prop_map(|s| json!(s)),
    ]
}

fn schema_like() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((prop::sample::select(KEYWORDS.to_vec()), inner), 0..6)
                .prop_map(|entries| {
                    let mut map = Map::new();
                    for (key, value) in entries {
                        map.insert(key.to_string(), value);
                    }
                    Value::Object(map)
                }),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn compile_never_panics(schema in schema_like()) {
        let _ = compile(&schema, "Arbitrary", &default_opts());
    }
}
