//! Schema graph → typed AST.
//!
//! The parser walks the graph from the root fragment, building one node per
//! fragment identity. A fragment's slot is reserved and recorded in
//! [`ParseState::processed`] before its children are parsed, so a child that
//! refers back to an ancestor gets the ancestor's handle instead of
//! recursing. Such an ancestor is always given a standalone name, which is
//! what lets the generator print the back edge as a type name.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::ast::{Ast, EnumMember, InterfaceParam, Node, NodeId, NodeKind, INDEX_SIGNATURE_KEY};
use crate::config::CompileOptions;
use crate::error::CompileError;
use crate::naming::{generate_unique_name, sanitize_identifier, UsedNames};
use crate::resolver::{Document, Resolved, SchemaGraph, SchemaId};
use crate::schema_utils::{build_path, split_path};

/// Fragment identity → node built for it.
pub type Processed = HashMap<SchemaId, NodeId>;

/// Bookkeeping threaded through one parse.
#[derive(Debug, Default)]
pub struct ParseState {
    pub processed: Processed,
    pub used_names: UsedNames,
}

/// Parse the root fragment of `graph` into an AST rooted at it.
pub fn parse(
    graph: &SchemaGraph,
    root_name: &str,
    options: &CompileOptions,
) -> Result<Ast, CompileError> {
    let mut parser = Parser::new(graph, root_name, options);
    let root = parser.parse_fragment(&SchemaId::root(), None, true)?;
    Ok(parser.finish(root))
}

pub struct Parser<'a> {
    graph: &'a SchemaGraph,
    root_name: &'a str,
    options: &'a CompileOptions,
    ast: Ast,
    state: ParseState,
    /// Nodes whose slot is reserved but whose children are still being parsed.
    in_progress: HashSet<NodeId>,
    /// In-progress nodes that were reached again through a cycle.
    needs_name: HashSet<NodeId>,
    /// `REFERENCE` nodes by external name.
    references: HashMap<String, NodeId>,
}

impl<'a> Parser<'a> {
    pub fn new(graph: &'a SchemaGraph, root_name: &'a str, options: &'a CompileOptions) -> Self {
        Self::with_state(graph, root_name, options, ParseState::default())
    }

    /// Start from existing bookkeeping, e.g. to reserve names up front.
    pub fn with_state(
        graph: &'a SchemaGraph,
        root_name: &'a str,
        options: &'a CompileOptions,
        state: ParseState,
    ) -> Self {
        Self {
            graph,
            root_name,
            options,
            ast: Ast::new(),
            state,
            in_progress: HashSet::new(),
            needs_name: HashSet::new(),
            references: HashMap::new(),
        }
    }

    pub fn state(&self) -> &ParseState {
        &self.state
    }

    /// Consume the parser, returning the AST with `root` as its root.
    pub fn finish(mut self, root: NodeId) -> Ast {
        self.ast.set_root(root);
        self.ast
    }

    /// Parse the fragment at `site`, following `$ref`s.
    ///
    /// Returns the node already built for the target fragment when there is
    /// one; this is both the memoization and the cycle guard.
    pub fn parse_fragment(
        &mut self,
        site: &SchemaId,
        key_name: Option<&str>,
        is_root: bool,
    ) -> Result<NodeId, CompileError> {
        let target = match self.graph.resolve(site)? {
            Resolved::External(name) => return Ok(self.reference(&name)),
            Resolved::Fragment(target) => target,
        };

        if let Some(&existing) = self.state.processed.get(&target) {
            if self.in_progress.contains(&existing) {
                tracing::debug!(fragment = %target, "fragment reached through a cycle");
                self.needs_name.insert(existing);
            }
            return Ok(existing);
        }

        self.parse_schema(target, key_name, is_root)
    }

    fn parse_schema(
        &mut self,
        id: SchemaId,
        key_name: Option<&str>,
        is_root: bool,
    ) -> Result<NodeId, CompileError> {
        let schema = self.fragment(&id)?;

        let node_id = self.ast.reserve();
        self.state.processed.insert(id.clone(), node_id);
        self.in_progress.insert(node_id);

        let mut standalone_name = self
            .name_hint(&id, &schema, key_name, is_root)
            .map(|hint| generate_unique_name(&hint, &mut self.state.used_names));

        let kind = self.build_kind(&id, &schema, standalone_name.as_deref(), key_name)?;
        self.in_progress.remove(&node_id);

        if standalone_name.is_none() && self.needs_name.contains(&node_id) {
            let hint = key_name.unwrap_or("Recursive");
            standalone_name = Some(generate_unique_name(hint, &mut self.state.used_names));
        }

        tracing::debug!(
            fragment = %id,
            kind = kind.tag(),
            name = ?standalone_name,
            "parsed schema"
        );

        let comment = schema
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.ast.fill(
            node_id,
            Node {
                kind,
                standalone_name,
                comment,
                key_name: key_name.map(str::to_string),
            },
        );
        Ok(node_id)
    }

    /// The JSON for `id`. A `type` array branch is a copy of its schema with
    /// the single type filled in and the title and description removed, so
    /// that only the union over the branches is named and documented.
    fn fragment(&self, id: &SchemaId) -> Result<Cow<'a, Value>, CompileError> {
        let graph = self.graph;
        let value = graph.get(id).ok_or_else(|| CompileError::Schema {
            path: id.pointer.clone(),
            message: format!("fragment {id} does not exist"),
        })?;

        let Some(variant) = id.variant else {
            return Ok(Cow::Borrowed(value));
        };

        let mut obj = value.as_object().cloned().unwrap_or_default();
        let branch_type = obj
            .get("type")
            .and_then(Value::as_array)
            .and_then(|types| types.get(variant))
            .cloned()
            .ok_or_else(|| CompileError::Schema {
                path: id.pointer.clone(),
                message: format!("type branch {variant} does not exist"),
            })?;
        obj.insert("type".to_string(), branch_type);
        obj.remove("title");
        obj.remove("description");
        Ok(Cow::Owned(Value::Object(obj)))
    }

    fn name_hint(
        &self,
        id: &SchemaId,
        schema: &Value,
        key_name: Option<&str>,
        is_root: bool,
    ) -> Option<String> {
        if id.variant.is_some() {
            return None;
        }
        if let Some(title) = schema.get("title").and_then(Value::as_str) {
            return Some(title.to_string());
        }

        let segments = split_path(&id.pointer);
        if let [.., parent, key] = segments.as_slice() {
            if parent == "definitions" || parent == "$defs" {
                return Some(key.clone());
            }
        }

        if is_root {
            return Some(self.root_name.to_string());
        }
        if schema.get("tsEnumNames").is_some() {
            if let Some(key_name) = key_name {
                return Some(key_name.to_string());
            }
        }
        if id.document != 0 && segments.is_empty() {
            return self.graph.document(id.document).and_then(Document::file_stem);
        }
        None
    }

    fn build_kind(
        &mut self,
        id: &SchemaId,
        schema: &Value,
        name: Option<&str>,
        key_name: Option<&str>,
    ) -> Result<NodeKind, CompileError> {
        let obj = match schema {
            Value::Bool(true) => return Ok(NodeKind::Any),
            Value::Bool(false) => return Ok(NodeKind::CustomType("never".to_string())),
            Value::Object(obj) => obj,
            other => {
                return Err(CompileError::Schema {
                    path: id.pointer.clone(),
                    message: format!("expected a schema object or boolean, found {other}"),
                })
            }
        };

        if let Some(ts_type) = obj.get("tsType").and_then(Value::as_str) {
            return Ok(NodeKind::CustomType(ts_type.to_string()));
        }
        if let Some(Value::Array(all_of)) = obj.get("allOf") {
            return Ok(NodeKind::Intersection(self.parse_list(id, "allOf", all_of.len())?));
        }
        for keyword in ["anyOf", "oneOf"] {
            if let Some(Value::Array(variants)) = obj.get(keyword) {
                return Ok(NodeKind::Union(self.parse_list(id, keyword, variants.len())?));
            }
        }
        if let Some(Value::Array(types)) = obj.get("type") {
            let mut branches = Vec::with_capacity(types.len());
            for variant in 0..types.len() {
                branches.push(self.parse_fragment(&id.with_variant(variant), key_name, false)?);
            }
            return Ok(NodeKind::Union(branches));
        }

        let schema_type = obj.get("type").and_then(Value::as_str);
        if schema_type == Some("null") {
            return Ok(NodeKind::Null);
        }

        match obj.get("items") {
            Some(Value::Array(items)) => {
                return Ok(NodeKind::Tuple(self.parse_list(id, "items", items.len())?));
            }
            Some(Value::Object(_) | Value::Bool(_)) => {
                let items = id.child(build_path(&id.pointer, &["items"]));
                return Ok(NodeKind::Array(self.parse_fragment(&items, None, false)?));
            }
            _ => {}
        }

        if let Some(Value::Array(values)) = obj.get("enum") {
            return Ok(self.build_enum(obj, values, name));
        }
        if let Some(value) = obj.get("const") {
            return Ok(NodeKind::Literal(value.clone()));
        }

        let has_members = self.has_members(obj);
        match schema_type {
            Some("string") => return Ok(NodeKind::String),
            Some("number" | "integer") => return Ok(NodeKind::Number),
            Some("boolean") => return Ok(NodeKind::Boolean),
            Some("any") => return Ok(NodeKind::Any),
            Some("array") => return Ok(NodeKind::Array(self.ast.add(Node::new(NodeKind::Any)))),
            Some("object") if !has_members => return Ok(NodeKind::Object),
            Some("object") | None => {}
            Some(other) => {
                tracing::warn!(path = %id.pointer, schema_type = other, "unknown type, using any");
                return Ok(NodeKind::Any);
            }
        }

        if has_members {
            return self.build_interface(id, obj, name, key_name);
        }

        Ok(match obj.get("default") {
            Some(Value::Bool(_)) => NodeKind::Boolean,
            Some(Value::Number(_)) => NodeKind::Number,
            Some(Value::String(_)) => NodeKind::String,
            _ => NodeKind::Any,
        })
    }

    fn has_members(&self, obj: &Map<String, Value>) -> bool {
        obj.contains_key("properties")
            || obj.contains_key("patternProperties")
            || obj.contains_key("tsExtends")
            || matches!(
                obj.get("additionalProperties"),
                Some(Value::Object(_) | Value::Bool(false))
            )
            || (self.options.unreachable_definitions
                && (obj.contains_key("definitions") || obj.contains_key("$defs")))
    }

    fn build_enum(&mut self, obj: &Map<String, Value>, values: &[Value], name: Option<&str>) -> NodeKind {
        if let Some(names) = obj.get("tsEnumNames").and_then(Value::as_array) {
            let mut members = Vec::with_capacity(values.len());
            for (key, value) in names.iter().zip(values) {
                members.push(EnumMember {
                    key_name: key.as_str().unwrap_or_default().to_string(),
                    ast: self.literal(value),
                });
            }
            return NodeKind::Enum(members);
        }

        if name.is_some() && values.iter().all(|v| v.is_string() || v.is_number()) {
            let mut keys = UsedNames::new();
            let mut members = Vec::with_capacity(values.len());
            for value in values {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let raw = if sanitize_identifier(&text).is_empty() {
                    format!("value {text}")
                } else {
                    text
                };
                members.push(EnumMember {
                    key_name: generate_unique_name(&raw, &mut keys),
                    ast: self.literal(value),
                });
            }
            return NodeKind::Enum(members);
        }

        NodeKind::Union(values.iter().map(|value| self.literal(value)).collect())
    }

    fn build_interface(
        &mut self,
        id: &SchemaId,
        obj: &Map<String, Value>,
        name: Option<&str>,
        key_name: Option<&str>,
    ) -> Result<NodeKind, CompileError> {
        let required: HashSet<&str> = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let parent = name.or(key_name).unwrap_or(self.root_name).to_string();
        let mut params = Vec::new();

        if let Some(Value::Object(properties)) = obj.get("properties") {
            for key in properties.keys() {
                let site = id.child(build_path(&id.pointer, &["properties", key]));
                let child = self.parse_fragment(&site, Some(key), false)?;
                params.push(InterfaceParam::new(
                    key.as_str(),
                    child,
                    required.contains(key.as_str()),
                ));
            }
        }

        let additional = obj.get("additionalProperties");
        let mut index_signature_taken = false;

        if let Some(Value::Object(patterns)) = obj.get("patternProperties") {
            let single = patterns.len() == 1 && matches!(additional, None | Some(Value::Bool(false)));
            for pattern in patterns.keys() {
                let site = id.child(build_path(&id.pointer, &["patternProperties", pattern]));
                let child = self.parse_fragment(&site, Some(pattern), false)?;
                self.append_comment(
                    child,
                    &format!(
                        "This interface was referenced by `{parent}`'s JSON-Schema definition\nvia the `patternProperty` \"{pattern}\"."
                    ),
                );

                let key = if single { INDEX_SIGNATURE_KEY } else { pattern.as_str() };
                let mut param = InterfaceParam::new(
                    key,
                    child,
                    single || required.contains(pattern.as_str()),
                );
                param.is_pattern_property = !single;
                params.push(param);
                index_signature_taken |= single;
            }
        }

        if self.options.unreachable_definitions {
            for keyword in ["definitions", "$defs"] {
                if let Some(Value::Object(definitions)) = obj.get(keyword) {
                    for key in definitions.keys() {
                        let site = id.child(build_path(&id.pointer, &[keyword, key]));
                        let child = self.parse_fragment(&site, Some(key), false)?;
                        self.append_comment(
                            child,
                            &format!(
                                "This interface was referenced by `{parent}`'s JSON-Schema\nvia the `definition` \"{key}\"."
                            ),
                        );
                        let mut param = InterfaceParam::new(
                            key.as_str(),
                            child,
                            required.contains(key.as_str()),
                        );
                        param.is_unreachable_definition = true;
                        params.push(param);
                    }
                }
            }
        }

        match additional {
            Some(Value::Bool(false)) => {}
            Some(Value::Object(_)) => {
                let site = id.child(build_path(&id.pointer, &["additionalProperties"]));
                let child = self.parse_fragment(&site, None, false)?;
                params.push(InterfaceParam::new(INDEX_SIGNATURE_KEY, child, true));
            }
            _ if index_signature_taken => {}
            _ => {
                let any = self.ast.add(Node::new(NodeKind::Any));
                params.push(InterfaceParam::new(INDEX_SIGNATURE_KEY, any, true));
            }
        }

        let super_types = match obj.get("tsExtends") {
            None => Vec::new(),
            Some(Value::Array(targets)) => {
                let mut super_types = Vec::with_capacity(targets.len());
                for i in 0..targets.len() {
                    let path = build_path(&id.pointer, &["tsExtends", &i.to_string()]);
                    super_types.push(self.parse_super_type(id.child(path))?);
                }
                super_types
            }
            Some(Value::Object(_)) => {
                let path = build_path(&id.pointer, &["tsExtends"]);
                vec![self.parse_super_type(id.child(path))?]
            }
            Some(_) => {
                return Err(CompileError::Schema {
                    path: build_path(&id.pointer, &["tsExtends"]),
                    message: "tsExtends must be a schema or an array of schemas".to_string(),
                })
            }
        };

        Ok(NodeKind::Interface {
            params,
            super_types,
        })
    }

    fn parse_super_type(&mut self, site: SchemaId) -> Result<NodeId, CompileError> {
        let node_id = self.parse_fragment(&site, None, false)?;
        let error = |message: &str| CompileError::Schema {
            path: site.pointer.clone(),
            message: message.to_string(),
        };
        match self.ast.get(node_id) {
            Some(Node {
                kind: NodeKind::Interface { .. },
                standalone_name: Some(_),
                ..
            }) => Ok(node_id),
            Some(_) => Err(error("tsExtends target must be a named object schema")),
            None => Err(error("tsExtends target is still being defined (cyclic inheritance)")),
        }
    }

    fn parse_list(
        &mut self,
        id: &SchemaId,
        keyword: &str,
        len: usize,
    ) -> Result<Vec<NodeId>, CompileError> {
        (0..len)
            .map(|i| {
                let site = id.child(build_path(&id.pointer, &[keyword, &i.to_string()]));
                self.parse_fragment(&site, None, false)
            })
            .collect()
    }

    fn literal(&mut self, value: &Value) -> NodeId {
        self.ast.add(Node::new(NodeKind::Literal(value.clone())))
    }

    fn reference(&mut self, name: &str) -> NodeId {
        if let Some(&existing) = self.references.get(name) {
            return existing;
        }
        let mut type_name = sanitize_identifier(name);
        if type_name.is_empty() {
            type_name = "unknown".to_string();
        }
        let node_id = self.ast.add(Node::new(NodeKind::Reference(type_name)));
        self.references.insert(name.to_string(), node_id);
        node_id
    }

    fn append_comment(&mut self, node_id: NodeId, extra: &str) {
        if let Some(node) = self.ast.get_mut(node_id) {
            node.comment = Some(match node.comment.take() {
                Some(comment) => format!("{comment}\n\n{extra}"),
                None => extra.to_string(),
            });
        }
    }
}
