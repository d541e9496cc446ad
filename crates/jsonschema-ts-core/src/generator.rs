//! Optimized AST → TypeScript declarations.
//!
//! Declarations are collected by three independent depth-first walks over
//! the same AST (type aliases, interfaces, enums), each with its own
//! visited set. Inline types are rendered by [`Generator::generate_type`],
//! which prints a named node as its name and never expands it, so cyclic
//! ASTs render finitely.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::ast::{Ast, EnumMember, InterfaceParam, Node, NodeId, NodeKind, INDEX_SIGNATURE_KEY};
use crate::config::CompileOptions;
use crate::error::CompileError;
use crate::naming::sanitize_identifier;
use crate::schema_utils::build_path;

static BARE_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap());

/// Render `ast` as TypeScript declaration text, banner first.
pub fn generate(ast: &Ast, options: &CompileOptions) -> Result<String, CompileError> {
    let generator = Generator::new(ast, options);

    let mut sections = Vec::new();
    if !options.banner_comment.is_empty() {
        sections.push(options.banner_comment.clone());
    }
    for section in [
        generator.declare_named_types()?,
        generator.declare_named_interfaces()?,
        generator.declare_enums()?,
    ] {
        if !section.is_empty() {
            sections.push(section);
        }
    }

    let mut output = sections.join("\n\n");
    output.push('\n');
    Ok(output)
}

/// Emit `key` as a bare identifier when possible, otherwise as a quoted
/// string literal. The index signature key passes through unchanged.
pub fn escape_key_name(key: &str) -> String {
    if key == INDEX_SIGNATURE_KEY || BARE_KEY.is_match(key) {
        key.to_string()
    } else {
        Value::String(key.to_string()).to_string()
    }
}

/// Render `comment` as a `/** … */` block.
pub fn generate_comment(comment: &str) -> String {
    let escaped = comment.replace("*/", "*\\/");
    let mut lines = vec!["/**".to_string()];
    for line in escaped.lines() {
        if line.trim().is_empty() {
            lines.push(" *".to_string());
        } else {
            lines.push(format!(" * {line}"));
        }
    }
    lines.push(" */".to_string());
    lines.join("\n")
}

pub struct Generator<'a> {
    ast: &'a Ast,
    options: &'a CompileOptions,
}

impl<'a> Generator<'a> {
    pub fn new(ast: &'a Ast, options: &'a CompileOptions) -> Self {
        Self { ast, options }
    }

    // -----------------------------------------------------------------------
    // Declaration passes
    // -----------------------------------------------------------------------

    /// Type aliases for named non-interface, non-enum nodes.
    pub fn declare_named_types(&self) -> Result<String, CompileError> {
        let mut processed = HashSet::new();
        let mut out = Vec::new();
        self.walk_types(self.ast.root(), "#", &mut processed, &mut out)?;
        Ok(out.join("\n"))
    }

    fn walk_types(
        &self,
        id: NodeId,
        path: &str,
        processed: &mut HashSet<NodeId>,
        out: &mut Vec<String>,
    ) -> Result<(), CompileError> {
        if !processed.insert(id) {
            return Ok(());
        }
        let node = self.node(id, path)?;
        match &node.kind {
            NodeKind::Array(element) => {
                self.walk_types(*element, &build_path(path, &["items"]), processed, out)?;
                if node.has_standalone_name() {
                    out.push(self.standalone_type(id, node, path)?);
                }
            }
            NodeKind::Enum(_) => {}
            NodeKind::Interface {
                params,
                super_types,
            } => {
                for (child, child_path) in self.interface_children(path, params, super_types) {
                    if self.is_root(child) || self.options.declare_externally_referenced {
                        self.walk_types(child, &child_path, processed, out)?;
                    }
                }
            }
            NodeKind::Intersection(children)
            | NodeKind::Tuple(children)
            | NodeKind::Union(children) => {
                if node.has_standalone_name() {
                    out.push(self.standalone_type(id, node, path)?);
                }
                for (i, child) in children.iter().enumerate() {
                    self.walk_types(*child, &build_path(path, &[&i.to_string()]), processed, out)?;
                }
            }
            _ => {
                if node.has_standalone_name() {
                    out.push(self.standalone_type(id, node, path)?);
                }
            }
        }
        Ok(())
    }

    /// Interface declarations for named INTERFACE nodes.
    pub fn declare_named_interfaces(&self) -> Result<String, CompileError> {
        let mut processed = HashSet::new();
        let mut out = Vec::new();
        self.walk_interfaces(self.ast.root(), "#", &mut processed, &mut out)?;
        Ok(out.join("\n"))
    }

    fn walk_interfaces(
        &self,
        id: NodeId,
        path: &str,
        processed: &mut HashSet<NodeId>,
        out: &mut Vec<String>,
    ) -> Result<(), CompileError> {
        if !processed.insert(id) {
            return Ok(());
        }
        let node = self.node(id, path)?;
        match &node.kind {
            NodeKind::Array(element) => {
                self.walk_interfaces(*element, &build_path(path, &["items"]), processed, out)?;
            }
            NodeKind::Interface {
                params,
                super_types,
            } => {
                if node.has_standalone_name()
                    && (self.is_root(id) || self.options.declare_externally_referenced)
                {
                    out.push(self.standalone_interface(id, node, path)?);
                }
                for (child, child_path) in self.interface_children(path, params, super_types) {
                    self.walk_interfaces(child, &child_path, processed, out)?;
                }
            }
            NodeKind::Intersection(children)
            | NodeKind::Tuple(children)
            | NodeKind::Union(children) => {
                for (i, child) in children.iter().enumerate() {
                    self.walk_interfaces(*child, &build_path(path, &[&i.to_string()]), processed, out)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Enum declarations for named ENUM nodes.
    pub fn declare_enums(&self) -> Result<String, CompileError> {
        let mut processed = HashSet::new();
        let mut out = Vec::new();
        self.walk_enums(self.ast.root(), "#", &mut processed, &mut out)?;
        Ok(out.join("\n"))
    }

    fn walk_enums(
        &self,
        id: NodeId,
        path: &str,
        processed: &mut HashSet<NodeId>,
        out: &mut Vec<String>,
    ) -> Result<(), CompileError> {
        if !processed.insert(id) {
            return Ok(());
        }
        let node = self.node(id, path)?;
        match &node.kind {
            NodeKind::Array(element) => {
                self.walk_enums(*element, &build_path(path, &["items"]), processed, out)?;
            }
            NodeKind::Enum(members) => {
                if node.has_standalone_name() {
                    out.push(self.standalone_enum(id, node, members, path)?);
                }
            }
            NodeKind::Interface {
                params,
                super_types,
            } => {
                for (child, child_path) in self.interface_children(path, params, super_types) {
                    self.walk_enums(child, &child_path, processed, out)?;
                }
            }
            NodeKind::Intersection(children)
            | NodeKind::Tuple(children)
            | NodeKind::Union(children) => {
                for (i, child) in children.iter().enumerate() {
                    self.walk_enums(*child, &build_path(path, &[&i.to_string()]), processed, out)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Standalone declarations
    // -----------------------------------------------------------------------

    fn standalone_type(&self, id: NodeId, node: &Node, path: &str) -> Result<String, CompileError> {
        let body = self.render_body(id, node, path, &mut HashSet::new())?;
        Ok(format!(
            "{}export type {} = {body}",
            self.comment_prefix(node),
            self.declared_name(node),
        ))
    }

    fn standalone_interface(&self, id: NodeId, node: &Node, path: &str) -> Result<String, CompileError> {
        let NodeKind::Interface { super_types, .. } = &node.kind else {
            return Err(self.unsupported(id, path, "expected an INTERFACE node"));
        };

        let mut extends = Vec::with_capacity(super_types.len());
        for (i, super_type) in super_types.iter().enumerate() {
            let super_path = build_path(path, &["extends", &i.to_string()]);
            let super_node = self.node(*super_type, &super_path)?;
            match &super_node.standalone_name {
                Some(name) => extends.push(sanitize_identifier(name)),
                None => return Err(self.unsupported(*super_type, &super_path, "super type has no name")),
            }
        }
        let extends = if extends.is_empty() {
            String::new()
        } else {
            format!("extends {} ", extends.join(", "))
        };

        let body = self.render_body(id, node, path, &mut HashSet::new())?;
        Ok(format!(
            "{}export interface {} {extends}{body}",
            self.comment_prefix(node),
            self.declared_name(node),
        ))
    }

    fn standalone_enum(
        &self,
        id: NodeId,
        node: &Node,
        members: &[EnumMember],
        path: &str,
    ) -> Result<String, CompileError> {
        let mut stack = HashSet::from([id]);
        let mut lines = Vec::with_capacity(members.len());
        for member in members {
            let member_path = build_path(path, &[&member.key_name]);
            let value = self.generate_type(member.ast, &member_path, &mut stack)?;
            lines.push(format!("{} = {value}", escape_key_name(&member.key_name)));
        }
        Ok(format!(
            "{}export {}enum {} {{\n{}\n}}",
            self.comment_prefix(node),
            if self.options.enable_const_enums { "const " } else { "" },
            self.declared_name(node),
            lines.join(",\n"),
        ))
    }

    // -----------------------------------------------------------------------
    // Inline types
    // -----------------------------------------------------------------------

    /// Render the type expression for `id`: its name when it has one,
    /// otherwise its structure.
    ///
    /// `stack` holds the unnamed nodes currently being expanded; reaching one
    /// of them again is an unnamed cycle, which has no finite rendering.
    pub fn generate_type(
        &self,
        id: NodeId,
        path: &str,
        stack: &mut HashSet<NodeId>,
    ) -> Result<String, CompileError> {
        let node = self.node(id, path)?;
        if let Some(name) = &node.standalone_name {
            return Ok(sanitize_identifier(name));
        }
        self.render_body(id, node, path, stack)
    }

    fn render_body(
        &self,
        id: NodeId,
        node: &Node,
        path: &str,
        stack: &mut HashSet<NodeId>,
    ) -> Result<String, CompileError> {
        if !stack.insert(id) && !node.has_standalone_name() {
            return Err(self.unsupported(id, path, "unnamed cycle reached during inline rendering"));
        }

        let text = match &node.kind {
            NodeKind::Any => "any".to_string(),
            NodeKind::Boolean => "boolean".to_string(),
            NodeKind::Null => "null".to_string(),
            NodeKind::Number => "number".to_string(),
            NodeKind::Object => "object".to_string(),
            NodeKind::String => "string".to_string(),
            NodeKind::CustomType(text) | NodeKind::Reference(text) => text.clone(),
            NodeKind::Literal(value) => value.to_string(),
            NodeKind::Array(element) => {
                let element = self.generate_type(*element, &build_path(path, &["items"]), stack)?;
                if element.ends_with('"') {
                    format!("({element})[]")
                } else {
                    format!("{element}[]")
                }
            }
            NodeKind::Tuple(items) => {
                let rendered = self.render_each(items, path, stack)?;
                format!("[{}]", rendered.join(", "))
            }
            NodeKind::Union(children) => self.set_operation(children, " | ", "never", path, stack)?,
            NodeKind::Intersection(children) => {
                self.set_operation(children, " & ", "unknown", path, stack)?
            }
            NodeKind::Enum(members) => {
                let literals: Vec<NodeId> = members.iter().map(|m| m.ast).collect();
                self.set_operation(&literals, " | ", "never", path, stack)?
            }
            NodeKind::Interface { params, .. } => self.render_interface(params, path, stack)?,
        };

        stack.remove(&id);
        Ok(text)
    }

    fn render_each(
        &self,
        children: &[NodeId],
        path: &str,
        stack: &mut HashSet<NodeId>,
    ) -> Result<Vec<String>, CompileError> {
        children
            .iter()
            .enumerate()
            .map(|(i, child)| self.generate_type(*child, &build_path(path, &[&i.to_string()]), stack))
            .collect()
    }

    fn set_operation(
        &self,
        children: &[NodeId],
        separator: &str,
        empty: &str,
        path: &str,
        stack: &mut HashSet<NodeId>,
    ) -> Result<String, CompileError> {
        let rendered = self.render_each(children, path, stack)?;
        Ok(match rendered.len() {
            0 => empty.to_string(),
            1 => rendered.into_iter().next().unwrap_or_default(),
            _ => format!("({})", rendered.join(separator)),
        })
    }

    fn render_interface(
        &self,
        params: &[InterfaceParam],
        path: &str,
        stack: &mut HashSet<NodeId>,
    ) -> Result<String, CompileError> {
        let mut members = Vec::new();
        for param in params
            .iter()
            .filter(|p| !p.is_pattern_property && !p.is_unreachable_definition)
        {
            let member_path = build_path(path, &[&param.key_name]);
            let member = self.node(param.ast, &member_path)?;
            let rendered = self.generate_type(param.ast, &member_path, stack)?;

            let mut line = String::new();
            if let (Some(comment), false) = (&member.comment, member.has_standalone_name()) {
                line.push_str(&generate_comment(comment));
                line.push('\n');
            }
            line.push_str(&escape_key_name(&param.key_name));
            if !param.is_required {
                line.push('?');
            }
            line.push_str(": ");
            line.push_str(&rendered);
            members.push(line);
        }

        if members.is_empty() {
            Ok("{}".to_string())
        } else {
            Ok(format!("{{\n{}\n}}", members.join("\n")))
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn node(&self, id: NodeId, path: &str) -> Result<&'a Node, CompileError> {
        if !self.ast.contains(id) {
            return Err(self.unsupported(id, path, "node does not belong to this AST"));
        }
        self.ast
            .get(id)
            .ok_or_else(|| self.unsupported(id, path, "node was reserved but never built"))
    }

    fn unsupported(&self, node: NodeId, path: &str, reason: &str) -> CompileError {
        tracing::debug!(node = %node, path = %path, reason, "cannot generate node");
        CompileError::UnsupportedNode {
            node,
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    fn is_root(&self, id: NodeId) -> bool {
        id == self.ast.root()
    }

    fn interface_children(
        &self,
        path: &str,
        params: &[InterfaceParam],
        super_types: &[NodeId],
    ) -> Vec<(NodeId, String)> {
        params
            .iter()
            .map(|p| (p.ast, build_path(path, &[&p.key_name])))
            .chain(
                super_types
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (*s, build_path(path, &["extends", &i.to_string()]))),
            )
            .collect()
    }

    fn declared_name(&self, node: &Node) -> String {
        sanitize_identifier(node.standalone_name.as_deref().unwrap_or_default())
    }

    fn comment_prefix(&self, node: &Node) -> String {
        match &node.comment {
            Some(comment) => format!("{}\n", generate_comment(comment)),
            None => String::new(),
        }
    }
}
