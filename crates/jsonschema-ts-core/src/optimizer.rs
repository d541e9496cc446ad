//! AST → minimal, canonical AST.
//!
//! Rewrites run bottom-up over the nodes reachable from the root, repeated
//! until a sweep changes nothing:
//!
//! - UNION / INTERSECTION: flatten unnamed same-kind children, drop
//!   structurally duplicate children, absorb into ANY when a child is ANY,
//!   collapse single-child combinators.
//! - INTERFACE: drop unreachable-definition members unless they were asked
//!   for, and turn `T | undefined` members into optional `T` members.
//!
//! The input is never modified. The result is compacted into a fresh arena
//! in depth-first order from the root, so optimizing an already optimized
//! AST returns an equal value.

use std::collections::{HashMap, HashSet};

use crate::ast::{Ast, Node, NodeId, NodeKind};
use crate::config::CompileOptions;

/// Optimize `ast` according to `options`.
pub fn optimize(ast: &Ast, options: &CompileOptions) -> Ast {
    let mut optimizer = Optimizer {
        ast: ast.clone(),
        redirects: HashMap::new(),
        unreachable_definitions: options.unreachable_definitions,
    };

    // Back edges are skipped by one post-order sweep, so a node can be
    // rewritten before an ancestor it points back to. Sweep to a fixpoint.
    let max_sweeps = ast.len() + 1;
    let mut sweeps = 0;
    loop {
        let before = optimizer.ast.clone();
        let redirects = optimizer.redirects.len();
        for id in optimizer.post_order() {
            optimizer.rewrite(id);
        }
        sweeps += 1;
        if optimizer.ast == before && optimizer.redirects.len() == redirects {
            break;
        }
        if sweeps >= max_sweeps {
            tracing::warn!(sweeps, "optimizer stopped before reaching a fixpoint");
            break;
        }
    }

    let optimized = optimizer.compact();
    tracing::debug!(before = ast.len(), after = optimized.len(), sweeps, "optimized AST");
    optimized
}

struct Optimizer {
    ast: Ast,
    /// Nodes replaced by another node. Parents are re-pointed lazily.
    redirects: HashMap<NodeId, NodeId>,
    unreachable_definitions: bool,
}

impl Optimizer {
    /// Follow redirects from `id`. Chains are finite because a redirect
    /// always points at a node rewritten earlier.
    fn resolve(&self, mut id: NodeId) -> NodeId {
        let mut hops = 0;
        while let Some(&next) = self.redirects.get(&id) {
            if next == id || hops > self.redirects.len() {
                break;
            }
            id = next;
            hops += 1;
        }
        id
    }

    /// Reachable nodes after redirects, children before parents. Back edges
    /// of cycles are skipped.
    fn post_order(&self) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![(self.resolve(self.ast.root()), false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            if let Some(node) = self.ast.get(id) {
                for child in node.kind.children().into_iter().rev() {
                    let child = self.resolve(child);
                    if !visited.contains(&child) {
                        stack.push((child, false));
                    }
                }
            }
        }
        order
    }

    fn rewrite(&mut self, id: NodeId) {
        let Some(node) = self.ast.get(id) else {
            return;
        };
        match node.kind {
            NodeKind::Union(_) | NodeKind::Intersection(_) => self.rewrite_combinator(id),
            NodeKind::Interface { .. } => self.rewrite_interface(id),
            _ => self.redirect_children(id),
        }
    }

    fn redirect_children(&mut self, id: NodeId) {
        let Some(mut node) = self.ast.get(id).cloned() else {
            return;
        };
        for child in node.kind.children_mut() {
            *child = self.resolve(*child);
        }
        self.ast.fill(id, node);
    }

    fn rewrite_combinator(&mut self, id: NodeId) {
        let Some(mut node) = self.ast.get(id).cloned() else {
            return;
        };
        let is_union = matches!(node.kind, NodeKind::Union(_));
        let children: Vec<NodeId> = node
            .kind
            .children()
            .into_iter()
            .map(|child| self.resolve(child))
            .collect();

        // Flatten
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match self.ast.get(child) {
                Some(inner)
                    if child != id
                        && inner.standalone_name.is_none()
                        && inner.comment.is_none()
                        && is_same_combinator(&inner.kind, is_union) =>
                {
                    flat.extend(inner.kind.children().into_iter().map(|c| self.resolve(c)));
                }
                _ => flat.push(child),
            }
        }

        // Merge
        let mut seen = HashSet::new();
        flat.retain(|child| seen.insert(self.fingerprint(*child)));

        // Any absorption
        if flat
            .iter()
            .any(|child| matches!(self.ast.get(*child).map(|n| &n.kind), Some(NodeKind::Any)))
        {
            tracing::debug!(node = %id, "combinator absorbed into any");
            node.kind = NodeKind::Any;
            self.ast.fill(id, node);
            return;
        }

        // Singleton collapse
        if let [only] = flat[..] {
            if only != id {
                if let Some(child) = self.ast.get(only).cloned() {
                    if child.standalone_name.is_none() {
                        node.kind = child.kind;
                        node.comment = node.comment.or(child.comment);
                        self.ast.fill(id, node);
                        return;
                    }
                    if node.standalone_name.is_none() && node.comment.is_none() {
                        self.redirects.insert(id, only);
                        return;
                    }
                }
            }
        }

        node.kind = if is_union {
            NodeKind::Union(flat)
        } else {
            NodeKind::Intersection(flat)
        };
        self.ast.fill(id, node);
    }

    fn rewrite_interface(&mut self, id: NodeId) {
        self.redirect_children(id);
        let Some(mut node) = self.ast.get(id).cloned() else {
            return;
        };
        let NodeKind::Interface { params, .. } = &mut node.kind else {
            return;
        };

        if !self.unreachable_definitions {
            params.retain(|param| !param.is_unreachable_definition);
        }

        for param in params.iter_mut() {
            let Some(member) = self.ast.get(param.ast) else {
                continue;
            };
            let NodeKind::Union(branches) = &member.kind else {
                continue;
            };
            if member.standalone_name.is_some() {
                continue;
            }
            let kept: Vec<NodeId> = branches
                .iter()
                .copied()
                .filter(|branch| !self.is_undefined(*branch))
                .collect();
            if kept.len() == branches.len() {
                continue;
            }

            let mut optional = Node::new(NodeKind::Union(kept));
            optional.comment = member.comment.clone();
            optional.key_name = member.key_name.clone();
            let optional = self.ast.add(optional);
            self.rewrite_combinator(optional);

            param.ast = self.resolve(optional);
            param.is_required = false;
        }

        self.ast.fill(id, node);
    }

    fn is_undefined(&self, id: NodeId) -> bool {
        matches!(
            self.ast.get(id).map(|n| &n.kind),
            Some(NodeKind::CustomType(t) | NodeKind::Reference(t)) if t == "undefined"
        )
    }

    /// Structural key of a node for duplicate detection. The node's own name
    /// and comment are ignored; named descendants contribute only their name.
    fn fingerprint(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut guard = HashSet::new();
        self.write_fingerprint(id, true, &mut guard, &mut out);
        out
    }

    fn write_fingerprint(&self, id: NodeId, top: bool, guard: &mut HashSet<NodeId>, out: &mut String) {
        let id = self.resolve(id);
        let Some(node) = self.ast.get(id) else {
            out.push_str(&format!("?{id}"));
            return;
        };
        if !top {
            if let Some(name) = &node.standalone_name {
                out.push('@');
                out.push_str(name);
                return;
            }
        }
        if !guard.insert(id) {
            out.push_str(&format!("^{id}"));
            return;
        }

        match &node.kind {
            NodeKind::Any => out.push_str("any"),
            NodeKind::Boolean => out.push_str("boolean"),
            NodeKind::Null => out.push_str("null"),
            NodeKind::Number => out.push_str("number"),
            NodeKind::Object => out.push_str("object"),
            NodeKind::String => out.push_str("string"),
            NodeKind::CustomType(text) => out.push_str(&format!("custom:{text}")),
            NodeKind::Reference(text) => out.push_str(&format!("ref:{text}")),
            NodeKind::Literal(value) => out.push_str(&format!("lit:{value}")),
            NodeKind::Array(element) => self.write_list("array", &[*element], guard, out),
            NodeKind::Tuple(items) => self.write_list("tuple", items, guard, out),
            NodeKind::Union(children) => self.write_list("union", children, guard, out),
            NodeKind::Intersection(children) => self.write_list("intersection", children, guard, out),
            NodeKind::Enum(members) => {
                out.push_str("enum{");
                for member in members {
                    out.push_str(&format!("{:?}=", member.key_name));
                    self.write_fingerprint(member.ast, false, guard, out);
                    out.push(',');
                }
                out.push('}');
            }
            NodeKind::Interface {
                params,
                super_types,
            } => {
                out.push_str("interface{");
                for param in params {
                    out.push_str(&format!(
                        "{:?}{}{}{}:",
                        param.key_name,
                        if param.is_required { "" } else { "?" },
                        if param.is_pattern_property { "~" } else { "" },
                        if param.is_unreachable_definition { "!" } else { "" },
                    ));
                    self.write_fingerprint(param.ast, false, guard, out);
                    out.push(',');
                }
                out.push('}');
                self.write_list("extends", super_types, guard, out);
            }
        }
        guard.remove(&id);
    }

    fn write_list(&self, tag: &str, children: &[NodeId], guard: &mut HashSet<NodeId>, out: &mut String) {
        out.push_str(tag);
        out.push('(');
        for child in children {
            self.write_fingerprint(*child, false, guard, out);
            out.push(',');
        }
        out.push(')');
    }

    /// Copy the nodes reachable from the root into a fresh arena, resolving
    /// redirects. Slots that were reserved but never built stay that way.
    fn compact(&self) -> Ast {
        let mut out = Ast::new();
        let mut mapping = HashMap::new();
        let root = self.copy_into(self.ast.root(), &mut out, &mut mapping);
        out.set_root(root);
        out
    }

    fn copy_into(&self, id: NodeId, out: &mut Ast, mapping: &mut HashMap<NodeId, NodeId>) -> NodeId {
        let id = self.resolve(id);
        if let Some(&copied) = mapping.get(&id) {
            return copied;
        }
        let new_id = out.reserve();
        mapping.insert(id, new_id);

        if let Some(node) = self.ast.get(id) {
            let mut node = node.clone();
            for child in node.kind.children_mut() {
                *child = self.copy_into(*child, out, mapping);
            }
            out.fill(new_id, node);
        }
        new_id
    }
}

fn is_same_combinator(kind: &NodeKind, is_union: bool) -> bool {
    match kind {
        NodeKind::Union(_) => is_union,
        NodeKind::Intersection(_) => !is_union,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::InterfaceParam;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn opts() -> CompileOptions {
        CompileOptions::default()
    }

    fn kind_of(ast: &Ast, id: NodeId) -> &NodeKind {
        &ast.get(id).unwrap().kind
    }

    #[test]
    fn test_flattens_nested_unions() {
        let mut ast = Ast::new();
        let a = ast.add(Node::new(NodeKind::String));
        let b = ast.add(Node::new(NodeKind::Number));
        let c = ast.add(Node::new(NodeKind::Boolean));
        let inner = ast.add(Node::new(NodeKind::Union(vec![b, c])));
        let root = ast.add(Node::new(NodeKind::Union(vec![a, inner])).with_name("Root"));
        ast.set_root(root);

        let optimized = optimize(&ast, &opts());
        let NodeKind::Union(children) = kind_of(&optimized, optimized.root()) else {
            panic!("expected UNION");
        };
        let kinds: Vec<&NodeKind> = children.iter().map(|c| kind_of(&optimized, *c)).collect();
        assert_eq!(kinds, vec![&NodeKind::String, &NodeKind::Number, &NodeKind::Boolean]);
    }

    #[test]
    fn test_named_children_are_not_flattened() {
        let mut ast = Ast::new();
        let a = ast.add(Node::new(NodeKind::String));
        let b = ast.add(Node::new(NodeKind::Number));
        let inner = ast.add(Node::new(NodeKind::Union(vec![a, b])).with_name("Inner"));
        let c = ast.add(Node::new(NodeKind::Null));
        let root = ast.add(Node::new(NodeKind::Union(vec![inner, c])).with_name("Root"));
        ast.set_root(root);

        let optimized = optimize(&ast, &opts());
        assert_eq!(optimized.standalone_names(), vec!["Root", "Inner"]);
    }

    #[test]
    fn test_merges_structural_duplicates() {
        let mut ast = Ast::new();
        let a = ast.add(Node::new(NodeKind::Literal(json!("x"))));
        let b = ast.add(Node::new(NodeKind::Literal(json!("x"))));
        let c = ast.add(Node::new(NodeKind::Literal(json!("y"))));
        let root = ast.add(Node::new(NodeKind::Union(vec![a, b, c])).with_name("Root"));
        ast.set_root(root);

        let optimized = optimize(&ast, &opts());
        let NodeKind::Union(children) = kind_of(&optimized, optimized.root()) else {
            panic!("expected UNION");
        };
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn test_any_absorbs_union() {
        let mut ast = Ast::new();
        let a = ast.add(Node::new(NodeKind::String));
        let any = ast.add(Node::new(NodeKind::Any));
        let root = ast.add(
            Node::new(NodeKind::Union(vec![a, any]))
                .with_name("Root")
                .with_comment("kept"),
        );
        ast.set_root(root);

        let optimized = optimize(&ast, &opts());
        let root = optimized.get(optimized.root()).unwrap();
        assert_eq!(root.kind, NodeKind::Any);
        assert_eq!(root.standalone_name.as_deref(), Some("Root"));
        assert_eq!(root.comment.as_deref(), Some("kept"));
    }

    #[test]
    fn test_singleton_collapse_keeps_name_and_comment() {
        let mut ast = Ast::new();
        let s = ast.add(Node::new(NodeKind::String).with_comment("inner"));
        let root = ast.add(Node::new(NodeKind::Intersection(vec![s])).with_name("Root"));
        ast.set_root(root);

        let optimized = optimize(&ast, &opts());
        let root = optimized.get(optimized.root()).unwrap();
        assert_eq!(root.kind, NodeKind::String);
        assert_eq!(root.standalone_name.as_deref(), Some("Root"));
        assert_eq!(root.comment.as_deref(), Some("inner"));
    }

    #[test]
    fn test_unnamed_singleton_of_named_child_is_replaced() {
        let mut ast = Ast::new();
        let named = ast.add(Node::new(NodeKind::String).with_name("Id"));
        let wrapper = ast.add(Node::new(NodeKind::Union(vec![named])));
        let root = ast.add(
            Node::new(NodeKind::Interface {
                params: vec![InterfaceParam::new("id", wrapper, true)],
                super_types: vec![],
            })
            .with_name("Root"),
        );
        ast.set_root(root);

        let optimized = optimize(&ast, &opts());
        let NodeKind::Interface { params, .. } = kind_of(&optimized, optimized.root()) else {
            panic!("expected INTERFACE");
        };
        let member = optimized.get(params[0].ast).unwrap();
        assert_eq!(member.standalone_name.as_deref(), Some("Id"));
        assert_eq!(member.kind, NodeKind::String);
    }

    #[test]
    fn test_undefined_branch_makes_member_optional() {
        let mut ast = Ast::new();
        let s = ast.add(Node::new(NodeKind::String));
        let undefined = ast.add(Node::new(NodeKind::CustomType("undefined".to_string())));
        let union = ast.add(Node::new(NodeKind::Union(vec![s, undefined])));
        let root = ast.add(
            Node::new(NodeKind::Interface {
                params: vec![InterfaceParam::new("a", union, true)],
                super_types: vec![],
            })
            .with_name("Root"),
        );
        ast.set_root(root);

        let optimized = optimize(&ast, &opts());
        let NodeKind::Interface { params, .. } = kind_of(&optimized, optimized.root()) else {
            panic!("expected INTERFACE");
        };
        assert!(!params[0].is_required);
        assert_eq!(kind_of(&optimized, params[0].ast), &NodeKind::String);
        // The input AST is untouched.
        assert!(matches!(kind_of(&ast, union), NodeKind::Union(c) if c.len() == 2));
    }

    #[test]
    fn test_unreachable_definitions_are_pruned_unless_requested() {
        let mut ast = Ast::new();
        let s = ast.add(Node::new(NodeKind::String));
        let defn = ast.add(Node::new(NodeKind::Number).with_name("Unused"));
        let mut unreachable = InterfaceParam::new("Unused", defn, false);
        unreachable.is_unreachable_definition = true;
        let root = ast.add(
            Node::new(NodeKind::Interface {
                params: vec![InterfaceParam::new("a", s, true), unreachable],
                super_types: vec![],
            })
            .with_name("Root"),
        );
        ast.set_root(root);

        let pruned = optimize(&ast, &opts());
        assert_eq!(pruned.standalone_names(), vec!["Root"]);

        let options = CompileOptions {
            unreachable_definitions: true,
            ..opts()
        };
        let kept = optimize(&ast, &options);
        assert_eq!(kept.standalone_names(), vec!["Root", "Unused"]);
    }

    #[test]
    fn test_cycles_terminate_and_stay_intact() {
        let mut ast = Ast::new();
        let root = ast.reserve();
        let array = ast.add(Node::new(NodeKind::Array(root)));
        let null = ast.add(Node::new(NodeKind::Null));
        let union = ast.add(Node::new(NodeKind::Union(vec![array, null])));
        ast.fill(
            root,
            Node::new(NodeKind::Interface {
                params: vec![InterfaceParam::new("children", union, false)],
                super_types: vec![],
            })
            .with_name("Tree"),
        );
        ast.set_root(root);

        let optimized = optimize(&ast, &opts());
        assert_eq!(optimized.len(), 4);
        assert_eq!(optimize(&optimized, &opts()), optimized);
    }

    #[test]
    fn test_any_reached_through_a_back_edge_is_absorbed() {
        let mut ast = Ast::new();
        let a = ast.reserve();
        let b = ast.reserve();
        let any = ast.add(Node::new(NodeKind::Any));
        let string = ast.add(Node::new(NodeKind::String));
        ast.fill(a, Node::new(NodeKind::Union(vec![b, any])).with_name("A"));
        ast.fill(b, Node::new(NodeKind::Union(vec![a, string])).with_name("B"));
        let root = ast.add(
            Node::new(NodeKind::Interface {
                params: vec![
                    InterfaceParam::new("a", a, true),
                    InterfaceParam::new("b", b, true),
                ],
                super_types: vec![],
            })
            .with_name("R"),
        );
        ast.set_root(root);

        let once = optimize(&ast, &opts());
        let kinds: Vec<(&str, &NodeKind)> = once
            .reachable()
            .into_iter()
            .filter_map(|id| once.get(id))
            .filter_map(|node| Some((node.standalone_name.as_deref()?, &node.kind)))
            .filter(|(name, _)| *name != "R")
            .collect();
        assert_eq!(kinds, vec![("A", &NodeKind::Any), ("B", &NodeKind::Any)]);
        assert_eq!(optimize(&once, &opts()), once);
    }

    #[test]
    fn test_idempotent_on_nested_combinators() {
        let mut ast = Ast::new();
        let a = ast.add(Node::new(NodeKind::String));
        let b = ast.add(Node::new(NodeKind::String));
        let inner = ast.add(Node::new(NodeKind::Intersection(vec![a])));
        let mid = ast.add(Node::new(NodeKind::Union(vec![inner, b])));
        let root = ast.add(Node::new(NodeKind::Union(vec![mid])).with_name("Root"));
        ast.set_root(root);

        let once = optimize(&ast, &opts());
        let twice = optimize(&once, &opts());
        assert_eq!(once, twice);
        assert_eq!(kind_of(&once, once.root()), &NodeKind::String);
    }

    #[test]
    fn test_reserved_slots_survive_compaction() {
        let mut ast = Ast::new();
        let root = ast.reserve();
        ast.set_root(root);

        let optimized = optimize(&ast, &opts());
        assert_eq!(optimized.len(), 1);
        assert!(optimized.get(optimized.root()).is_none());
    }
}
