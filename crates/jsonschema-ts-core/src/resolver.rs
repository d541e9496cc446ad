//! `$ref` resolution into a schema graph.
//!
//! [`dereference`] loads every document reachable through file `$ref`s and
//! records, for each `$ref` site, the fragment it points at. Nothing is
//! inlined: the graph keeps the documents as loaded and cycles stay cycles.
//! Downstream code walks the graph through [`SchemaId`] handles, so a
//! fragment reached through several refs is always the same fragment.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use percent_encoding::percent_decode_str;
use serde_json::Value;
use url::Url;

use crate::config::CompileOptions;
use crate::error::CompileError;
use crate::schema_utils::{build_path, child_schemas, split_path};

/// Identity of one schema fragment in a [`SchemaGraph`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SchemaId {
    /// Index into [`SchemaGraph::documents`].
    pub document: usize,
    /// RFC 6901 pointer in fragment form, e.g. `#/definitions/Node`.
    pub pointer: String,
    /// Branch of a `type` array this fragment stands for, if any. Branches
    /// share the pointer (and therefore the children) of their schema.
    pub variant: Option<usize>,
}

impl SchemaId {
    pub fn new(document: usize, pointer: impl Into<String>) -> Self {
        Self {
            document,
            pointer: pointer.into(),
            variant: None,
        }
    }

    /// The compile root.
    pub fn root() -> Self {
        Self::new(0, "#")
    }

    pub fn with_variant(&self, variant: usize) -> Self {
        Self {
            variant: Some(variant),
            ..self.clone()
        }
    }

    /// Identity of the child at `path`, which must be a pointer built from
    /// this fragment's pointer.
    pub fn child(&self, path: String) -> Self {
        Self::new(self.document, path)
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}", self.document, self.pointer)?;
        if let Some(variant) = self.variant {
            write!(f, "<{variant}>")?;
        }
        Ok(())
    }
}

/// A loaded JSON document.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Where the document was loaded from. `None` for an in-memory root.
    pub location: Option<Url>,
    pub root: Value,
}

impl Document {
    /// File stem of the document location, if any.
    pub fn file_stem(&self) -> Option<String> {
        let location = self.location.as_ref()?;
        let last = location.path_segments()?.next_back()?;
        let stem = Path::new(last).file_stem()?.to_str()?;
        Some(stem.to_string())
    }
}

/// Where a `$ref` site points.
#[derive(Clone, Debug, PartialEq)]
pub enum RefTarget {
    Fragment(SchemaId),
    /// A ref left unloaded; rendered as an opaque type name.
    External { name: String, reference: String },
}

/// Final target of a fragment after following `$ref` chains.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolved {
    Fragment(SchemaId),
    External(String),
}

/// All documents of one compile plus the resolved `$ref` sites.
#[derive(Clone, Debug)]
pub struct SchemaGraph {
    documents: Vec<Document>,
    refs: HashMap<SchemaId, RefTarget>,
    max_depth: usize,
}

impl SchemaGraph {
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn documents_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.documents.iter_mut()
    }

    pub fn document(&self, index: usize) -> Option<&Document> {
        self.documents.get(index)
    }

    /// JSON value of a fragment. The `variant` of `id` is ignored.
    pub fn get(&self, id: &SchemaId) -> Option<&Value> {
        let document = self.documents.get(id.document)?;
        let pointer = id.pointer.strip_prefix('#').unwrap_or(&id.pointer);
        document.root.pointer(pointer)
    }

    /// Follow `$ref` sites starting at `id` until a fragment that is not a
    /// ref is reached.
    pub fn resolve(&self, id: &SchemaId) -> Result<Resolved, CompileError> {
        let mut current = id.clone();
        for _ in 0..=self.max_depth {
            match self.refs.get(&current) {
                None => return Ok(Resolved::Fragment(current)),
                Some(RefTarget::External { name, .. }) => {
                    return Ok(Resolved::External(name.clone()))
                }
                Some(RefTarget::Fragment(target)) => current = target.clone(),
            }
        }
        Err(CompileError::Resolution {
            path: id.pointer.clone(),
            reference: current.pointer,
            message: format!(
                "$ref chain exceeds the maximum depth of {}",
                self.max_depth
            ),
        })
    }
}

/// Resolve every `$ref` reachable from `schema`.
///
/// `location` is the URL `schema` was loaded from; relative file refs are
/// resolved against it, or against `options.cwd` when it is `None`.
pub fn dereference(
    schema: &Value,
    location: Option<Url>,
    options: &CompileOptions,
) -> Result<SchemaGraph, CompileError> {
    let base = match &location {
        Some(url) => Some(url.clone()),
        None => std::path::absolute(&options.cwd)
            .ok()
            .and_then(|dir| Url::from_directory_path(dir).ok()),
    };

    let mut resolver = Resolver {
        options,
        documents: vec![Document {
            location,
            root: schema.clone(),
        }],
        bases: vec![base],
        depths: vec![0],
        refs: HashMap::new(),
    };

    let mut next = 0;
    while next < resolver.documents.len() {
        resolver.scan_document(next)?;
        next += 1;
    }

    tracing::debug!(
        documents = resolver.documents.len(),
        refs = resolver.refs.len(),
        "dereferenced schema"
    );

    Ok(SchemaGraph {
        documents: resolver.documents,
        refs: resolver.refs,
        max_depth: options.ref_options.max_depth,
    })
}

struct Resolver<'a> {
    options: &'a CompileOptions,
    documents: Vec<Document>,
    /// Base URL per document for joining relative refs.
    bases: Vec<Option<Url>>,
    /// Number of file hops from the root document.
    depths: Vec<usize>,
    refs: HashMap<SchemaId, RefTarget>,
}

impl Resolver<'_> {
    fn scan_document(&mut self, document: usize) -> Result<(), CompileError> {
        let root = self.documents[document].root.clone();
        self.scan(&root, document, "#")
    }

    fn scan(&mut self, schema: &Value, document: usize, path: &str) -> Result<(), CompileError> {
        let Some(obj) = schema.as_object() else {
            return Ok(());
        };

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            let ignored: Vec<&str> = obj
                .keys()
                .map(String::as_str)
                .filter(|key| {
                    !matches!(*key, "$ref" | "title" | "description" | "definitions" | "$defs")
                })
                .collect();
            if !ignored.is_empty() {
                tracing::warn!(path = %path, keywords = ?ignored, "ignoring keywords next to $ref");
            }

            let target = self.resolve_reference(reference, document, path)?;
            self.refs.insert(SchemaId::new(document, path), target);
        }

        // Children of a `$ref` object stay addressable as ref targets.
        // Data keywords such as `enum` and `default` are never visited.
        for (child_path, child) in child_schemas(obj, path) {
            self.scan(child, document, &child_path)?;
        }
        Ok(())
    }

    fn resolve_reference(
        &mut self,
        reference: &str,
        document: usize,
        path: &str,
    ) -> Result<RefTarget, CompileError> {
        let error = |message: String| CompileError::Resolution {
            path: path.to_string(),
            reference: reference.to_string(),
            message,
        };

        if let Some(fragment) = reference.strip_prefix('#') {
            let id = SchemaId::new(document, fragment_pointer(fragment).map_err(error)?);
            self.check_pointer(&id).map_err(error)?;
            return Ok(RefTarget::Fragment(id));
        }

        if !self.options.ref_options.external {
            return Ok(RefTarget::External {
                name: external_name(reference),
                reference: reference.to_string(),
            });
        }

        let base = self.bases[document]
            .as_ref()
            .ok_or_else(|| error("no base location to resolve a relative reference".into()))?;
        let mut url = base
            .join(reference)
            .map_err(|e| error(format!("invalid reference URL: {e}")))?;
        let fragment = url.fragment().unwrap_or("").to_string();
        url.set_fragment(None);

        if url.scheme() != "file" {
            return Err(error(format!(
                "unsupported scheme \"{}\"; only local files are loaded",
                url.scheme()
            )));
        }

        let target_document = match self
            .documents
            .iter()
            .position(|d| d.location.as_ref() == Some(&url))
        {
            Some(index) => index,
            None => self.load(url, document).map_err(error)?,
        };

        let id = SchemaId::new(target_document, fragment_pointer(&fragment).map_err(error)?);
        self.check_pointer(&id).map_err(error)?;
        Ok(RefTarget::Fragment(id))
    }

    fn load(&mut self, url: Url, from: usize) -> Result<usize, String> {
        let depth = self.depths[from] + 1;
        if depth > self.options.ref_options.max_depth {
            return Err(format!(
                "document nesting exceeds the maximum depth of {}",
                self.options.ref_options.max_depth
            ));
        }

        let file = url
            .to_file_path()
            .map_err(|()| format!("{url} is not a local file path"))?;
        let content = std::fs::read_to_string(&file)
            .map_err(|e| format!("cannot read {}: {e}", file.display()))?;
        let root: Value = serde_json::from_str(&content)
            .map_err(|e| format!("invalid JSON in {}: {e}", file.display()))?;

        tracing::debug!(location = %url, "loaded referenced document");

        self.documents.push(Document {
            location: Some(url.clone()),
            root,
        });
        self.bases.push(Some(url));
        self.depths.push(depth);
        Ok(self.documents.len() - 1)
    }

    fn check_pointer(&self, id: &SchemaId) -> Result<(), String> {
        let pointer = id.pointer.strip_prefix('#').unwrap_or(&id.pointer);
        if !pointer.is_empty() && !pointer.starts_with('/') {
            return Err(format!("\"{}\" is not a JSON pointer", id.pointer));
        }
        let document = &self.documents[id.document];
        match document.root.pointer(pointer) {
            Some(Value::Object(_)) | Some(Value::Bool(_)) => Ok(()),
            Some(_) => Err(format!("\"{}\" does not point at a schema", id.pointer)),
            None => Err(format!("\"{}\" does not exist", id.pointer)),
        }
    }
}

/// Canonical `#`-prefixed pointer for a URI fragment.
///
/// The fragment is percent-decoded before it is read as a JSON pointer, then
/// rebuilt so it matches the paths built while walking the schema. Fragments
/// that are not pointers are returned decoded and rejected later.
fn fragment_pointer(fragment: &str) -> Result<String, String> {
    let decoded = percent_decode_str(fragment)
        .decode_utf8()
        .map_err(|e| format!("\"#{fragment}\" is not valid UTF-8 once decoded: {e}"))?;
    if !decoded.starts_with('/') {
        return Ok(format!("#{decoded}"));
    }
    let segments = split_path(&decoded);
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
    Ok(build_path("#", &segments))
}

/// Type name for a ref that is not loaded: the last pointer segment of its
/// fragment, or the file stem of its path.
fn external_name(reference: &str) -> String {
    let (location, fragment) = match reference.split_once('#') {
        Some((location, fragment)) => (location, fragment),
        None => (reference, ""),
    };
    if let Some(last) = split_path(fragment).into_iter().rev().find(|s| !s.is_empty()) {
        return last;
    }
    let last = location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(location);
    Path::new(last)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(last)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RefOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_local_ref_resolves_to_fragment() {
        let schema = json!({
            "properties": { "a": { "$ref": "#/definitions/A" } },
            "definitions": { "A": { "type": "string" } }
        });
        let graph = dereference(&schema, None, &CompileOptions::default()).unwrap();

        let site = SchemaId::new(0, "#/properties/a");
        assert_eq!(
            graph.resolve(&site).unwrap(),
            Resolved::Fragment(SchemaId::new(0, "#/definitions/A"))
        );
        assert_eq!(
            graph.get(&SchemaId::new(0, "#/definitions/A")),
            Some(&json!({ "type": "string" }))
        );
    }

    #[test]
    fn test_percent_encoded_fragments_are_decoded() {
        let schema = json!({
            "properties": {
                "spaced": { "$ref": "#/definitions/My%20Type" },
                "slashed": { "$ref": "#/definitions/a~1b" },
                "both": { "$ref": "#/definitions/c%20~1%20d" }
            },
            "definitions": {
                "My Type": { "type": "string" },
                "a/b": { "type": "number" },
                "c / d": { "type": "boolean" }
            }
        });
        let graph = dereference(&schema, None, &CompileOptions::default()).unwrap();

        for (site, target) in [
            ("#/properties/spaced", "#/definitions/My Type"),
            ("#/properties/slashed", "#/definitions/a~1b"),
            ("#/properties/both", "#/definitions/c ~1 d"),
        ] {
            assert_eq!(
                graph.resolve(&SchemaId::new(0, site)).unwrap(),
                Resolved::Fragment(SchemaId::new(0, target))
            );
        }
    }

    #[test]
    fn test_invalid_utf8_fragment_is_resolution_error() {
        let schema = json!({ "items": { "$ref": "#/definitions/%FF" } });
        let err = dereference(&schema, None, &CompileOptions::default()).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ResolutionError);
    }

    #[test]
    fn test_ref_chains_are_followed() {
        let schema = json!({
            "definitions": {
                "A": { "$ref": "#/definitions/B" },
                "B": { "type": "number" }
            },
            "items": { "$ref": "#/definitions/A" }
        });
        let graph = dereference(&schema, None, &CompileOptions::default()).unwrap();
        assert_eq!(
            graph.resolve(&SchemaId::new(0, "#/items")).unwrap(),
            Resolved::Fragment(SchemaId::new(0, "#/definitions/B"))
        );
    }

    #[test]
    fn test_self_referential_schema_keeps_cycle() {
        let schema = json!({
            "properties": { "children": { "type": "array", "items": { "$ref": "#" } } }
        });
        let graph = dereference(&schema, None, &CompileOptions::default()).unwrap();
        assert_eq!(
            graph.resolve(&SchemaId::new(0, "#/properties/children/items")).unwrap(),
            Resolved::Fragment(SchemaId::root())
        );
    }

    #[test]
    fn test_definitions_next_to_ref_are_scanned() {
        let schema = json!({
            "$ref": "#/definitions/A",
            "definitions": {
                "A": { "properties": { "b": { "$ref": "#/definitions/B" } } },
                "B": { "type": "string" }
            }
        });
        let graph = dereference(&schema, None, &CompileOptions::default()).unwrap();
        assert_eq!(
            graph.resolve(&SchemaId::root()).unwrap(),
            Resolved::Fragment(SchemaId::new(0, "#/definitions/A"))
        );
        assert_eq!(
            graph
                .resolve(&SchemaId::new(0, "#/definitions/A/properties/b"))
                .unwrap(),
            Resolved::Fragment(SchemaId::new(0, "#/definitions/B"))
        );
    }

    #[test]
    fn test_missing_pointer_is_resolution_error() {
        let schema = json!({ "items": { "$ref": "#/definitions/Missing" } });
        let err = dereference(&schema, None, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::Resolution { .. }));
        assert!(err.to_string().contains("#/definitions/Missing"));
    }

    #[test]
    fn test_malformed_pointer_is_resolution_error() {
        let schema = json!({ "items": { "$ref": "#anchor" } });
        let err = dereference(&schema, None, &CompileOptions::default()).unwrap_err();
        assert!(err.to_string().contains("not a JSON pointer"));
    }

    #[test]
    fn test_ref_only_loop_exceeds_depth() {
        let schema = json!({
            "definitions": {
                "A": { "$ref": "#/definitions/B" },
                "B": { "$ref": "#/definitions/A" }
            }
        });
        let graph = dereference(&schema, None, &CompileOptions::default()).unwrap();
        let err = graph.resolve(&SchemaId::new(0, "#/definitions/A")).unwrap_err();
        assert!(err.to_string().contains("maximum depth"));
    }

    #[test]
    fn test_remote_ref_is_unsupported() {
        let schema = json!({ "items": { "$ref": "https://example.com/schema.json" } });
        let err = dereference(&schema, None, &CompileOptions::default()).unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_external_disabled_produces_named_reference() {
        let schema = json!({
            "properties": {
                "a": { "$ref": "https://example.com/schema.json#/definitions/Address" },
                "b": { "$ref": "./common/user-profile.json" }
            }
        });
        let options = CompileOptions {
            ref_options: RefOptions {
                external: false,
                ..RefOptions::default()
            },
            ..CompileOptions::default()
        };
        let graph = dereference(&schema, None, &options).unwrap();
        assert_eq!(
            graph.resolve(&SchemaId::new(0, "#/properties/a")).unwrap(),
            Resolved::External("Address".to_string())
        );
        assert_eq!(
            graph.resolve(&SchemaId::new(0, "#/properties/b")).unwrap(),
            Resolved::External("user-profile".to_string())
        );
    }

    #[test]
    fn test_refs_inside_enum_are_data() {
        let schema = json!({ "enum": [{ "$ref": "#/nowhere" }] });
        assert!(dereference(&schema, None, &CompileOptions::default()).is_ok());
    }

    #[test]
    fn test_file_refs_are_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("shared.json"),
            r#"{ "definitions": { "Id": { "type": "string" } } }"#,
        )
        .unwrap();

        let schema = json!({
            "properties": {
                "a": { "$ref": "shared.json#/definitions/Id" },
                "b": { "$ref": "./shared.json#/definitions/Id" }
            }
        });
        let options = CompileOptions {
            cwd: dir.path().to_path_buf(),
            ..CompileOptions::default()
        };
        let graph = dereference(&schema, None, &options).unwrap();

        assert_eq!(graph.documents().len(), 2);
        assert_eq!(graph.documents()[1].file_stem().as_deref(), Some("shared"));
        let expected = Resolved::Fragment(SchemaId::new(1, "#/definitions/Id"));
        assert_eq!(graph.resolve(&SchemaId::new(0, "#/properties/a")).unwrap(), expected);
        assert_eq!(graph.resolve(&SchemaId::new(0, "#/properties/b")).unwrap(), expected);
    }

    #[test]
    fn test_missing_file_is_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let schema = json!({ "items": { "$ref": "absent.json" } });
        let options = CompileOptions {
            cwd: dir.path().to_path_buf(),
            ..CompileOptions::default()
        };
        let err = dereference(&schema, None, &options).unwrap_err();
        assert!(matches!(err, CompileError::Resolution { .. }));
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_external_name() {
        assert_eq!(external_name("other.json"), "other");
        assert_eq!(external_name("other.json#/definitions/Thing"), "Thing");
        assert_eq!(external_name("https://x.org/a/b.schema.json"), "b.schema");
    }
}
