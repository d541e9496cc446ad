//! Typed AST produced by the parser and consumed by the optimizer and generator.
//!
//! Nodes live in an arena owned by [`Ast`] and refer to each other through
//! [`NodeId`] handles. A handle is the node's identity: shared sub-schemas and
//! cycles are expressed by several parents holding the same handle, and every
//! visited-set in the pipeline is keyed on it rather than on node contents.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

/// Key used for the index signature member of an interface.
pub const INDEX_SIGNATURE_KEY: &str = "[k: string]";

/// Handle of a node inside an [`Ast`] arena.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(pub u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single AST node: its kind plus the optional naming and documentation
/// attributes every kind may carry.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Globally unique declaration name. Named nodes are declared once and
    /// referred to by name everywhere else.
    pub standalone_name: Option<String>,
    pub comment: Option<String>,
    /// Property name under which the node was first reached.
    pub key_name: Option<String>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            standalone_name: None,
            comment: None,
            key_name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.standalone_name = Some(name.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn has_standalone_name(&self) -> bool {
        self.standalone_name.is_some()
    }
}

/// The closed set of node kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Any,
    Array(NodeId),
    Boolean,
    /// Verbatim type text supplied by the schema author (`tsType`).
    CustomType(String),
    Enum(Vec<EnumMember>),
    Interface {
        params: Vec<InterfaceParam>,
        super_types: Vec<NodeId>,
    },
    Intersection(Vec<NodeId>),
    Literal(Value),
    Null,
    Number,
    Object,
    /// Opaque name of a type declared outside this compile unit.
    Reference(String),
    String,
    Tuple(Vec<NodeId>),
    Union(Vec<NodeId>),
}

impl NodeKind {
    /// Upper-case discriminant, as used in logs and error messages.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Any => "ANY",
            NodeKind::Array(_) => "ARRAY",
            NodeKind::Boolean => "BOOLEAN",
            NodeKind::CustomType(_) => "CUSTOM_TYPE",
            NodeKind::Enum(_) => "ENUM",
            NodeKind::Interface { .. } => "INTERFACE",
            NodeKind::Intersection(_) => "INTERSECTION",
            NodeKind::Literal(_) => "LITERAL",
            NodeKind::Null => "NULL",
            NodeKind::Number => "NUMBER",
            NodeKind::Object => "OBJECT",
            NodeKind::Reference(_) => "REFERENCE",
            NodeKind::String => "STRING",
            NodeKind::Tuple(_) => "TUPLE",
            NodeKind::Union(_) => "UNION",
        }
    }

    /// Direct children in declaration order. Interface members come before
    /// super types.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Array(element) => vec![*element],
            NodeKind::Enum(members) => members.iter().map(|m| m.ast).collect(),
            NodeKind::Interface {
                params,
                super_types,
            } => params
                .iter()
                .map(|p| p.ast)
                .chain(super_types.iter().copied())
                .collect(),
            NodeKind::Intersection(children)
            | NodeKind::Tuple(children)
            | NodeKind::Union(children) => children.clone(),
            NodeKind::Any
            | NodeKind::Boolean
            | NodeKind::CustomType(_)
            | NodeKind::Literal(_)
            | NodeKind::Null
            | NodeKind::Number
            | NodeKind::Object
            | NodeKind::Reference(_)
            | NodeKind::String => Vec::new(),
        }
    }

    /// Mutable handles of the direct children, in the order of
    /// [`NodeKind::children`].
    pub fn children_mut(&mut self) -> Vec<&mut NodeId> {
        match self {
            NodeKind::Array(element) => vec![element],
            NodeKind::Enum(members) => members.iter_mut().map(|m| &mut m.ast).collect(),
            NodeKind::Interface {
                params,
                super_types,
            } => params
                .iter_mut()
                .map(|p| &mut p.ast)
                .chain(super_types.iter_mut())
                .collect(),
            NodeKind::Intersection(children)
            | NodeKind::Tuple(children)
            | NodeKind::Union(children) => children.iter_mut().collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumMember {
    pub key_name: String,
    /// Always a `LITERAL` node.
    pub ast: NodeId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceParam {
    pub key_name: String,
    pub ast: NodeId,
    pub is_required: bool,
    /// Keyed by a regex; never emitted as a concrete member.
    pub is_pattern_property: bool,
    /// Carries a `definitions` entry so its declarations get emitted; never
    /// emitted as a concrete member.
    pub is_unreachable_definition: bool,
}

impl InterfaceParam {
    pub fn new(key_name: impl Into<String>, ast: NodeId, is_required: bool) -> Self {
        Self {
            key_name: key_name.into(),
            ast,
            is_required,
            is_pattern_property: false,
            is_unreachable_definition: false,
        }
    }
}

/// Arena of nodes plus the compile root.
///
/// Slots can be reserved before their node exists so that a node under
/// construction already has an identity that its own descendants can point
/// at. A slot that is reserved but never filled stays visible as such and the
/// generator refuses to render it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ast {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty slot.
    pub fn reserve(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(None);
        id
    }

    /// Store `node` in a slot obtained from [`Ast::reserve`].
    ///
    /// `id` must come from this arena.
    pub fn fill(&mut self, id: NodeId, node: Node) {
        debug_assert!(self.contains(id), "{id} does not belong to this AST");
        if let Some(slot) = self.nodes.get_mut(id.index()) {
            *slot = Some(node);
        }
    }

    /// Allocate a slot and store `node` in it.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = self.reserve();
        self.fill(id, node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Whether `id` was allocated by this arena (built or merely reserved).
    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    /// Number of allocated slots.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes reachable from the root, depth-first pre-order, each once.
    pub fn reachable(&self) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            if let Some(node) = self.get(id) {
                // Reverse so the first child is visited first.
                stack.extend(node.kind.children().into_iter().rev());
            }
        }
        order
    }

    /// Standalone names of all reachable nodes, in reachability order.
    pub fn standalone_names(&self) -> Vec<&str> {
        self.reachable()
            .into_iter()
            .filter_map(|id| self.get(id))
            .filter_map(|node| node.standalone_name.as_deref())
            .collect()
    }
}
