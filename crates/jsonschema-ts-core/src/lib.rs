//! # jsonschema-ts-core
//!
//! Compile JSON Schema documents into TypeScript type declarations.
//!
//! A compile runs a fixed pipeline:
//!
//! 1. **Validate**: structural checks on `enum` / `tsEnumNames`
//! 2. **Dereference**: load every `$ref` target into a [`SchemaGraph`]
//! 3. **Normalize**: shape-only rewrites of each loaded document
//! 4. **Parse**: schema fragments → typed [`Ast`]
//! 5. **Optimize**: flatten, dedupe and simplify unions and intersections
//! 6. **Generate**: AST → declaration text
//! 7. **Format**: indentation and semicolons per [`StyleOptions`]
//!
//! ```
//! use jsonschema_ts_core::{compile, CompileOptions};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": { "a": { "type": "string" } },
//!     "required": ["a"],
//!     "additionalProperties": false
//! });
//! let options = CompileOptions { banner_comment: String::new(), ..Default::default() };
//! let ts = compile(&schema, "Sample", &options).unwrap();
//! assert_eq!(ts, "export interface Sample {\n  a: string;\n}\n");
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod formatter;
pub mod generator;
pub mod naming;
pub mod normalizer;
pub mod optimizer;
pub mod parser;
pub mod resolver;
pub mod schema_utils;
pub mod validator;

use std::path::Path;

use serde_json::Value;
use url::Url;

pub use ast::{Ast, Node, NodeId, NodeKind};
pub use config::{CompileOptions, RefOptions, StyleOptions, DEFAULT_BANNER_COMMENT};
pub use error::{CompileError, ErrorCode};
pub use naming::{generate_unique_name, sanitize_identifier, UsedNames};
pub use resolver::{SchemaGraph, SchemaId};
pub use schema_utils::{build_path, split_path};

/// Compile an in-memory schema. Relative file refs resolve against
/// `options.cwd`.
pub fn compile(schema: &Value, name: &str, options: &CompileOptions) -> Result<String, CompileError> {
    compile_at(schema, name, None, options)
}

/// Read, parse and compile the schema stored at `path`.
///
/// The root name is the file stem and relative refs resolve against the
/// file's directory, overriding `options.cwd`.
pub fn compile_from_file(path: &Path, options: &CompileOptions) -> Result<String, CompileError> {
    let read_error = |message: String| CompileError::SchemaRead {
        path: path.display().to_string(),
        message,
    };

    let text = std::fs::read_to_string(path).map_err(|e| read_error(e.to_string()))?;
    let schema: Value = serde_json::from_str(&text).map_err(|e| read_error(e.to_string()))?;

    let absolute = std::path::absolute(path).map_err(|e| read_error(e.to_string()))?;
    let location = Url::from_file_path(&absolute)
        .map_err(|()| read_error("path cannot be expressed as a file URL".to_string()))?;

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut options = options.clone();
    if let Some(parent) = absolute.parent() {
        options.cwd = parent.to_path_buf();
    }

    compile_at(&schema, &name, Some(location), &options)
}

/// Run only the validation stage.
pub fn check(schema: &Value, name: &str) -> Result<(), CompileError> {
    let errors = validator::validate(schema, name);
    if errors.is_empty() {
        return Ok(());
    }
    for message in &errors {
        tracing::warn!(schema = name, "{message}");
    }
    Err(CompileError::Validation(errors))
}

fn compile_at(
    schema: &Value,
    name: &str,
    location: Option<Url>,
    options: &CompileOptions,
) -> Result<String, CompileError> {
    tracing::debug!(schema = name, "compiling");

    check(schema, name)?;

    let mut graph = resolver::dereference(schema, location, options)?;
    for (index, document) in graph.documents_mut().enumerate() {
        document.root = if index == 0 {
            normalizer::normalize(&document.root, name)?
        } else {
            normalizer::normalize_fragment(&document.root)?
        };
    }

    let ast = parser::parse(&graph, name, options)?;
    let ast = optimizer::optimize(&ast, options);
    let text = generator::generate(&ast, options)?;
    let formatted = formatter::format(&text, &options.style)?;

    tracing::debug!(schema = name, declarations = ast.standalone_names().len(), "compiled");
    Ok(formatted)
}
