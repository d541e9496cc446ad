//! Error types for schema compilation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::NodeId;

/// Stable, machine-readable error codes.
///
/// Variant names and their serialized `snake_case` strings are part of the
/// public contract and must not change across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorCode {
    /// The input could not be read or is not valid JSON.
    SchemaReadError,
    /// The schema failed structural validation.
    ValidationError,
    /// A `$ref` could not be resolved.
    ResolutionError,
    /// The schema uses a construct that cannot be compiled.
    SchemaError,
    /// The generator met an AST node it cannot render.
    UnsupportedNodeError,
    /// The formatter rejected the generated text.
    FormatError,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Unable to read schema from {path}: {message}")]
    SchemaRead { path: String, message: String },

    #[error("Schema failed validation:\n{}", .0.join("\n"))]
    Validation(Vec<String>),

    #[error("Unresolvable $ref \"{reference}\" at {path}: {message}")]
    Resolution {
        path: String,
        reference: String,
        message: String,
    },

    #[error("Schema error at {path}: {message}")]
    Schema { path: String, message: String },

    #[error("Cannot generate node {node} at {path}: {reason}")]
    UnsupportedNode {
        node: NodeId,
        path: String,
        reason: String,
    },

    #[error("Formatting failed at line {line}: {message}")]
    Format { line: usize, message: String },
}

impl CompileError {
    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CompileError::SchemaRead { .. } => ErrorCode::SchemaReadError,
            CompileError::Validation(_) => ErrorCode::ValidationError,
            CompileError::Resolution { .. } => ErrorCode::ResolutionError,
            CompileError::Schema { .. } => ErrorCode::SchemaError,
            CompileError::UnsupportedNode { .. } => ErrorCode::UnsupportedNodeError,
            CompileError::Format { .. } => ErrorCode::FormatError,
        }
    }
}
