//! Ownership tree navigation, mutation and relative addressing.

use std::collections::HashSet;

use log::debug;
use uuid::Uuid;

use super::Graph;
use crate::error::GraphError;
use crate::model::{ComponentKind, ValueType};

/// Names follow identifier rules: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_name(name: &str) -> Result<(), GraphError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(GraphError::InvalidName(name.to_string()))
    }
}

impl Graph {
    pub fn parent(&self, id: Uuid) -> Option<Uuid> {
        self.components.get(&id)?.parent
    }

    pub fn children(&self, id: Uuid) -> &[Uuid] {
        self.components
            .get(&id)
            .map(|c| c.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn name(&self, id: Uuid) -> &str {
        self.components.get(&id).map(|c| c.name.as_str()).unwrap_or("")
    }

    pub fn child(&self, parent: Uuid, name: &str) -> Option<Uuid> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.name(*c) == name)
    }

    pub fn child_at(&self, parent: Uuid, index: usize) -> Option<Uuid> {
        self.children(parent).get(index).copied()
    }

    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// Direct plug children of a node or compound plug.
    pub fn plugs(&self, parent: Uuid) -> Vec<Uuid> {
        self.children(parent)
            .iter()
            .copied()
            .filter(|c| self.is_plug(*c))
            .collect()
    }

    /// Direct node children of the root or a node.
    pub fn nodes(&self, parent: Uuid) -> Vec<Uuid> {
        self.children(parent)
            .iter()
            .copied()
            .filter(|c| self.is_node(*c))
            .collect()
    }

    /// Strict ancestry: a component is not its own ancestor.
    pub fn is_ancestor_of(&self, ancestor: Uuid, id: Uuid) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    pub fn common_ancestor(&self, a: Uuid, b: Uuid) -> Option<Uuid> {
        let mut ancestors = HashSet::new();
        let mut current = Some(a);
        while let Some(id) = current {
            ancestors.insert(id);
            current = self.parent(id);
        }
        let mut current = Some(b);
        while let Some(id) = current {
            if ancestors.contains(&id) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    /// Dot separated path from the root, e.g. `loop.out.x`.
    pub fn full_name(&self, id: Uuid) -> String {
        if id == self.root {
            return String::new();
        }
        match self.relative_name(id, self.root) {
            Ok(names) => names.join("."),
            Err(_) => self.name(id).to_string(),
        }
    }

    /// Names from `ancestor` (exclusive) down to `descendant` (inclusive).
    /// Empty when both are the same component.
    pub fn relative_name(&self, descendant: Uuid, ancestor: Uuid) -> Result<Vec<String>, GraphError> {
        let mut names = Vec::new();
        let mut current = descendant;
        while current != ancestor {
            let component = self.component_ref(current)?;
            names.push(component.name.clone());
            current = component.parent.ok_or_else(|| {
                GraphError::not_found(format!(
                    "{} is not a descendant of {}",
                    self.name(descendant),
                    self.name(ancestor)
                ))
            })?;
        }
        names.reverse();
        Ok(names)
    }

    /// Walk down from `ancestor` following `path`.
    pub fn descendant<S: AsRef<str>>(&self, ancestor: Uuid, path: &[S]) -> Result<Uuid, GraphError> {
        let mut current = ancestor;
        for step in path {
            let step = step.as_ref();
            current = self.child(current, step).ok_or_else(|| {
                GraphError::not_found(format!("{} has no child {}", self.full_name(current), step))
            })?;
        }
        Ok(current)
    }

    /// Resolve a dot separated path from the root.
    pub fn find(&self, path: &str) -> Result<Uuid, GraphError> {
        if path.is_empty() {
            return Ok(self.root);
        }
        let steps: Vec<&str> = path.split('.').collect();
        self.descendant(self.root, &steps)
    }

    /// The plug directly owned by `node` that contains `plug`, and the path
    /// from that plug down to `plug`.
    pub fn ancestor_plug(&self, node: Uuid, plug: Uuid) -> Option<(Uuid, Vec<String>)> {
        let mut path = Vec::new();
        let mut current = plug;
        loop {
            let component = self.components.get(&current)?;
            if !component.is_plug() {
                return None;
            }
            let parent = component.parent?;
            if parent == node {
                path.reverse();
                return Some((current, path));
            }
            path.push(component.name.clone());
            current = parent;
        }
    }

    /// Leaf plugs under `plug`, depth first; `plug` itself when it is a leaf.
    pub fn leaf_plugs(&self, plug: Uuid) -> Vec<Uuid> {
        let mut leaves = Vec::new();
        self.collect_leaves(plug, &mut leaves);
        leaves
    }

    fn collect_leaves(&self, plug: Uuid, leaves: &mut Vec<Uuid>) {
        let children = self.plugs(plug);
        if children.is_empty() {
            leaves.push(plug);
        }
        for child in children {
            self.collect_leaves(child, leaves);
        }
    }

    /// Every plug in the subtree of `id`, depth first, excluding `id`.
    pub fn descendant_plugs(&self, id: Uuid) -> Vec<Uuid> {
        let mut plugs = Vec::new();
        for child in self.plugs(id) {
            plugs.push(child);
            plugs.extend(self.descendant_plugs(child));
        }
        plugs
    }

    pub(crate) fn check_unique_name(
        &self,
        parent: Uuid,
        name: &str,
        except: Option<Uuid>,
    ) -> Result<(), GraphError> {
        let taken = self
            .children(parent)
            .iter()
            .any(|c| Some(*c) != except && self.name(*c) == name);
        if taken {
            return Err(GraphError::topology(format!(
                "{} already has a child named {}",
                self.full_name(parent),
                name
            )));
        }
        Ok(())
    }

    pub(crate) fn link_child(&mut self, parent: Uuid, child: Uuid) {
        if let Some(c) = self.components.get_mut(&child) {
            c.parent = Some(parent);
        }
        if let Some(p) = self.components.get_mut(&parent) {
            p.children.push(child);
        }
    }

    /// Parent a detached component. Fires child-added notifications.
    pub fn add_child(&mut self, parent: Uuid, child: Uuid) -> Result<(), GraphError> {
        let parent_component = self.component_ref(parent)?;
        let child_component = self.component_ref(child)?;
        if let Some(existing) = child_component.parent {
            return Err(GraphError::topology(format!(
                "{} is already owned by {}",
                child_component.name,
                self.full_name(existing)
            )));
        }
        if child == parent || child == self.root || self.is_ancestor_of(child, parent) {
            return Err(GraphError::topology(format!(
                "cannot parent {} under its own subtree",
                child_component.name
            )));
        }
        let allowed = match (&parent_component.kind, &child_component.kind) {
            (ComponentKind::Root | ComponentKind::Node { .. }, ComponentKind::Node { .. }) => true,
            (ComponentKind::Node { .. }, ComponentKind::Plug(_)) => true,
            (ComponentKind::Plug(p), ComponentKind::Plug(_)) => p.value_type() == ValueType::Compound,
            _ => false,
        };
        if !allowed {
            return Err(GraphError::topology(format!(
                "{} cannot own {}",
                self.full_name(parent),
                child_component.name
            )));
        }
        let name = child_component.name.clone();
        self.check_unique_name(parent, &name, None)?;

        self.link_child(parent, child);
        if self.is_plug(child) {
            self.mirror_child_added(parent, child)?;
            self.propagate_dirtiness(child);
        }
        self.notify_child_added(parent, child)
    }

    /// Destroy `child` and its subtree, disconnecting everything it touched.
    pub fn remove_child(&mut self, parent: Uuid, child: Uuid) -> Result<(), GraphError> {
        if self.parent(child) != Some(parent) {
            return Err(GraphError::not_found(format!(
                "{} is not a child of {}",
                self.name(child),
                self.full_name(parent)
            )));
        }
        let mut subtree = vec![child];
        let mut index = 0;
        while index < subtree.len() {
            subtree.extend_from_slice(self.children(subtree[index]));
            index += 1;
        }
        let removed: HashSet<Uuid> = subtree.iter().copied().collect();

        let mut orphaned = Vec::new();
        if self.is_plug(parent) {
            orphaned.push(parent);
        }
        for id in &subtree {
            let Some(data) = self.components.get(id).and_then(|c| c.as_plug()) else {
                continue;
            };
            let input = data.input;
            let outputs = data.outputs.clone();
            if let Some(source) = input {
                if !removed.contains(&source) {
                    self.unlink(source, *id);
                }
            }
            for destination in outputs {
                if !removed.contains(&destination) {
                    self.unlink(*id, destination);
                    orphaned.push(destination);
                }
            }
        }

        if let Some(p) = self.components.get_mut(&parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.components.get_mut(&child) {
            c.parent = None;
        }
        debug!("Removed {} ({} components)", self.name(child), subtree.len());
        self.destroy_subtree(child);
        self.cache.invalidate_plugs(&removed);
        self.propagate_dirtiness_from(&orphaned);
        Ok(())
    }

    /// Drop a detached subtree from the arena with its behaviours and
    /// subscriptions.
    pub(crate) fn destroy_subtree(&mut self, id: Uuid) {
        let Some(component) = self.components.remove(&id) else {
            return;
        };
        self.behaviors.remove(&id);
        self.subscriptions.remove(&id);
        for child in component.children {
            self.destroy_subtree(child);
        }
    }

    /// Rename a component. Collisions with siblings are resolved by a numeric
    /// suffix (`op` becomes `op1`, `op1` becomes `op2`). Returns the final name.
    pub fn set_name(&mut self, id: Uuid, name: &str) -> Result<String, GraphError> {
        validate_name(name)?;
        if id == self.root {
            return Err(GraphError::invalid_argument("the root cannot be renamed"));
        }
        self.component_ref(id)?;
        let unique = match self.parent(id) {
            Some(parent) => self.unique_name(parent, id, name),
            None => name.to_string(),
        };
        self.component_mut(id)?.name = unique.clone();
        if self.is_plug(id) {
            let mut renamed = vec![id];
            renamed.extend(self.descendant_plugs(id));
            self.propagate_dirtiness_from(&renamed);
        }
        Ok(unique)
    }

    fn unique_name(&self, parent: Uuid, id: Uuid, name: &str) -> String {
        if self.check_unique_name(parent, name, Some(id)).is_ok() {
            return name.to_string();
        }
        let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
        let mut suffix: u64 = name[stem.len()..]
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_add(1))
            .unwrap_or(1);
        loop {
            let candidate = format!("{}{}", stem, suffix);
            if self.check_unique_name(parent, &candidate, Some(id)).is_ok() {
                return candidate;
            }
            suffix = suffix.saturating_add(1);
        }
    }

    /// Replace the child order of `parent`. `order` must be a permutation of
    /// the current children.
    pub fn reorder_children(&mut self, parent: Uuid, order: &[Uuid]) -> Result<(), GraphError> {
        let current = self.children(parent);
        if order.len() != current.len() {
            return Err(GraphError::invalid_argument(format!(
                "expected {} children, got {}",
                current.len(),
                order.len()
            )));
        }
        let mut seen = HashSet::new();
        for id in order {
            if !current.contains(id) {
                return Err(GraphError::invalid_argument(format!(
                    "{} is not a child of {}",
                    id,
                    self.full_name(parent)
                )));
            }
            if !seen.insert(*id) {
                return Err(GraphError::invalid_argument(format!("{} listed twice", id)));
            }
        }
        self.component_mut(parent)?.children = order.to_vec();
        if self.is_plug(parent) {
            self.mirror_reorder(parent)?;
            self.propagate_dirtiness(parent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, PlugDefinition};
    use crate::node::ComputeNode;

    fn setup_graph() -> (Graph, Uuid, Uuid) {
        let mut graph = Graph::new();
        let root = graph.root();
        let node = graph.add_node(root, "node", Box::new(ComputeNode::new())).unwrap();
        let point = graph
            .add_plug(
                node,
                PlugDefinition::compound(
                    "point",
                    Direction::In,
                    vec![
                        PlugDefinition::input("x", ValueType::Float),
                        PlugDefinition::input("y", ValueType::Float),
                    ],
                ),
            )
            .unwrap();
        (graph, node, point)
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("in").is_ok());
        assert!(validate_name("_private2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("2d").is_err());
        assert!(validate_name("a.b").is_err());
    }

    #[test]
    fn test_relative_addressing_round_trip() {
        let (graph, node, point) = setup_graph();
        let y = graph.child(point, "y").unwrap();

        let path = graph.relative_name(y, node).unwrap();
        assert_eq!(path, vec!["point".to_string(), "y".to_string()]);
        assert_eq!(graph.descendant(node, &path).unwrap(), y);
        assert_eq!(graph.full_name(y), "node.point.y");
        assert_eq!(graph.find("node.point.y").unwrap(), y);
    }

    #[test]
    fn test_relative_name_requires_ancestor() {
        let (graph, node, point) = setup_graph();
        assert!(matches!(
            graph.relative_name(node, point),
            Err(GraphError::NotFound(_))
        ));
        assert!(matches!(
            graph.descendant(point, &["z"]),
            Err(GraphError::NotFound(_))
        ));
    }

    #[test]
    fn test_ancestor_plug() {
        let (graph, node, point) = setup_graph();
        let x = graph.child(point, "x").unwrap();
        assert_eq!(graph.ancestor_plug(node, x), Some((point, vec!["x".to_string()])));
        assert_eq!(graph.ancestor_plug(node, point), Some((point, vec![])));
        assert_eq!(graph.ancestor_plug(node, node), None);
    }

    #[test]
    fn test_leaf_plugs() {
        let (graph, _node, point) = setup_graph();
        let leaves = graph.leaf_plugs(point);
        assert_eq!(leaves.len(), 2);
        let x = graph.child(point, "x").unwrap();
        assert_eq!(graph.leaf_plugs(x), vec![x]);
    }

    #[test]
    fn test_add_child_rejects_owned_and_duplicate() {
        let (mut graph, node, point) = setup_graph();
        let root = graph.root();
        assert!(matches!(
            graph.add_child(root, point),
            Err(GraphError::InvalidTopology(_))
        ));
        let other = graph.add_node(root, "other", Box::new(ComputeNode::new())).unwrap();
        assert!(matches!(
            graph.add_node(root, "node", Box::new(ComputeNode::new())),
            Err(GraphError::InvalidTopology(_))
        ));
        assert!(matches!(
            graph.add_child(other, root),
            Err(GraphError::InvalidTopology(_))
        ));
        assert_eq!(graph.nodes(root), vec![node, other]);
    }

    #[test]
    fn test_set_name_uniquifies() {
        let mut graph = Graph::new();
        let root = graph.root();
        let a = graph.add_node(root, "op", Box::new(ComputeNode::new())).unwrap();
        let b = graph.add_node(root, "b", Box::new(ComputeNode::new())).unwrap();
        let c = graph.add_node(root, "c", Box::new(ComputeNode::new())).unwrap();

        assert_eq!(graph.set_name(b, "op").unwrap(), "op1");
        assert_eq!(graph.set_name(c, "op1").unwrap(), "op2");
        assert_eq!(graph.set_name(a, "op").unwrap(), "op");
        assert!(matches!(graph.set_name(a, "no good"), Err(GraphError::InvalidName(_))));
    }

    #[test]
    fn test_set_name_with_huge_numeric_suffix() {
        let mut graph = Graph::new();
        let root = graph.root();
        let name = format!("op{}", u64::MAX);
        graph.add_node(root, &name, Box::new(ComputeNode::new())).unwrap();
        let other = graph.add_node(root, "other", Box::new(ComputeNode::new())).unwrap();
        assert_eq!(graph.set_name(other, &name).unwrap(), "op1");
    }

    #[test]
    fn test_reorder_children() {
        let (mut graph, _node, point) = setup_graph();
        let x = graph.child(point, "x").unwrap();
        let y = graph.child(point, "y").unwrap();

        graph.reorder_children(point, &[y, x]).unwrap();
        assert_eq!(graph.child_at(point, 0), Some(y));
        assert_eq!(graph.index_of(x), Some(1));

        assert!(graph.reorder_children(point, &[y]).is_err());
        assert!(graph.reorder_children(point, &[y, y]).is_err());
        assert!(graph.reorder_children(point, &[y, point]).is_err());
    }

    #[test]
    fn test_remove_child_destroys_subtree() {
        let (mut graph, node, point) = setup_graph();
        let x = graph.child(point, "x").unwrap();
        graph.remove_child(node, point).unwrap();
        assert!(!graph.contains(point));
        assert!(!graph.contains(x));
        assert!(graph.children(node).is_empty());
        assert!(graph.remove_child(node, point).is_err());
    }

    #[test]
    fn test_common_ancestor() {
        let (graph, node, point) = setup_graph();
        let x = graph.child(point, "x").unwrap();
        let y = graph.child(point, "y").unwrap();
        assert_eq!(graph.common_ancestor(x, y), Some(point));
        assert_eq!(graph.common_ancestor(x, node), Some(node));
        assert!(graph.is_ancestor_of(node, y));
        assert!(!graph.is_ancestor_of(y, y));
    }
}
