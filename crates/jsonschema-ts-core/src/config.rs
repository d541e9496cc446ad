//! Configuration for schema compilation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Disclaimer prepended to every generated file unless overridden.
pub const DEFAULT_BANNER_COMMENT: &str = "/* tslint:disable */
/**
 * This file was automatically generated by jsonschema-ts.
 * DO NOT MODIFY IT BY HAND. Instead, modify the source JSON Schema file,
 * and run jsonschema-ts to regenerate this file.
 */";

/// Options for a single compile.
///
/// ## Serialization Format
///
/// Fields are serialized in `kebab-case` (e.g., `banner-comment`, `ref-options`).
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CompileOptions {
    /// Disclaimer comment prepended to the top of the generated text.
    pub banner_comment: String,
    /// Root directory for resolving relative file `$ref`s.
    pub cwd: PathBuf,
    /// Declare named schemas other than the root, instead of only referring
    /// to them by name.
    pub declare_externally_referenced: bool,
    /// Emit `export const enum` rather than `export enum`.
    pub enable_const_enums: bool,
    /// Formatter configuration.
    pub style: StyleOptions,
    /// Emit declarations for `definitions` that the root never references.
    pub unreachable_definitions: bool,
    /// Resolver configuration.
    pub ref_options: RefOptions,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            banner_comment: DEFAULT_BANNER_COMMENT.to_string(),
            cwd: PathBuf::from("."),
            declare_externally_referenced: true,
            enable_const_enums: true,
            style: StyleOptions::default(),
            unreachable_definitions: false,
            ref_options: RefOptions::default(),
        }
    }
}

/// Layout settings applied by the formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StyleOptions {
    /// Spaces per nesting level (ignored when `use_tabs` is set).
    pub indent_width: usize,
    /// Indent with tabs instead of spaces.
    pub use_tabs: bool,
    /// Terminate members and type aliases with `;`.
    pub semi: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            indent_width: 2,
            use_tabs: false,
            semi: true,
        }
    }
}

/// Settings for `$ref` resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RefOptions {
    /// Load referenced files. When `false`, every ref that leaves the current
    /// document is emitted as an opaque type name instead.
    pub external: bool,
    /// Maximum number of `$ref` hops followed for a single fragment.
    pub max_depth: usize,
}

impl Default for RefOptions {
    fn default() -> Self {
        Self {
            external: true,
            max_depth: 50,
        }
    }
}
