//! Plug connections.
//!
//! Every plug has at most one input. Compound plugs connect child by child.
//! Connections that would close a cycle are rejected unless one of the plugs
//! on the cycle accepts dependency cycles.

use std::collections::{HashSet, VecDeque};

use log::{debug, warn};
use uuid::Uuid;

use super::Graph;
use crate::error::GraphError;
use crate::model::{Direction, ValueType};

impl Graph {
    pub fn input(&self, plug: Uuid) -> Option<Uuid> {
        self.plug(plug).ok()?.input()
    }

    pub fn outputs(&self, plug: Uuid) -> Vec<Uuid> {
        self.plug(plug)
            .map(|p| p.outputs().to_vec())
            .unwrap_or_default()
    }

    /// Follow the input chain to the plug that actually provides the value.
    pub fn source(&self, plug: Uuid) -> Uuid {
        let mut visited = HashSet::new();
        let mut current = plug;
        while let Some(input) = self.input(current) {
            if !visited.insert(current) {
                break;
            }
            current = input;
        }
        current
    }

    /// Check whether `source -> destination` may be connected without
    /// changing anything.
    pub fn validate_connection(&self, source: Uuid, destination: Uuid) -> Result<(), GraphError> {
        let source_data = self.plug(source)?;
        let destination_data = self.plug(destination)?;

        if source == destination {
            return Err(GraphError::topology(format!(
                "cannot connect {} to itself",
                self.full_name(source)
            )));
        }
        if self.is_ancestor_of(source, destination) || self.is_ancestor_of(destination, source) {
            return Err(GraphError::topology(format!(
                "cannot connect {} to {} within the same plug",
                self.full_name(source),
                self.full_name(destination)
            )));
        }
        if !destination_data.flags().accepts_inputs {
            return Err(GraphError::topology(format!(
                "{} does not accept inputs",
                self.full_name(destination)
            )));
        }
        if source_data.value_type() != destination_data.value_type() {
            return Err(GraphError::type_mismatch(
                destination_data.value_type(),
                source_data.value_type(),
            ));
        }

        if source_data.value_type() == ValueType::Compound {
            let source_children = self.plugs(source);
            let destination_children = self.plugs(destination);
            if source_children.len() != destination_children.len() {
                return Err(GraphError::type_mismatch(
                    format!("{} fields", destination_children.len()),
                    format!("{} fields", source_children.len()),
                ));
            }
            for (s, d) in source_children.iter().zip(&destination_children) {
                self.validate_connection(*s, *d)?;
            }
        }

        if self.would_create_cycle(source, destination) {
            return Err(GraphError::topology(format!(
                "connecting {} to {} would create a cycle",
                self.full_name(source),
                self.full_name(destination)
            )));
        }
        Ok(())
    }

    /// Plugs whose values depend directly on `plug`.
    pub(crate) fn dependents(&self, plug: Uuid) -> Vec<Uuid> {
        let Ok(data) = self.plug(plug) else {
            return Vec::new();
        };
        let mut dependents = data.outputs().to_vec();
        if data.direction() == Direction::In {
            dependents.extend(self.affects(plug));
        }
        if let Some(parent) = self.parent(plug).filter(|p| self.is_plug(*p)) {
            dependents.push(parent);
        }
        dependents
    }

    /// True if `source` is already reachable from `destination`. Edges
    /// touching a cycle-accepting plug are not followed.
    fn would_create_cycle(&self, source: Uuid, destination: Uuid) -> bool {
        let accepts = |plug: Uuid| {
            self.plug(plug)
                .map(|p| p.accepts_dependency_cycles())
                .unwrap_or(false)
        };
        if accepts(source) || accepts(destination) {
            return false;
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(destination);
        while let Some(current) = queue.pop_front() {
            if current == source {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            for next in self.dependents(current) {
                if !accepts(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Connect `source` into `destination`, replacing any existing input.
    /// Returns the plugs dirtied by the change.
    pub fn connect(&mut self, source: Uuid, destination: Uuid) -> Result<Vec<Uuid>, GraphError> {
        self.validate_connection(source, destination)?;

        let mut pairs = vec![(source, destination)];
        let mut index = 0;
        while index < pairs.len() {
            let (s, d) = pairs[index];
            pairs.extend(self.plugs(s).into_iter().zip(self.plugs(d)));
            index += 1;
        }
        for (s, d) in &pairs {
            self.link(*s, *d);
        }
        debug!(
            "Connected {} -> {}",
            self.full_name(source),
            self.full_name(destination)
        );

        let destinations: Vec<Uuid> = pairs.iter().map(|(_, d)| *d).collect();
        Ok(self.propagate_dirtiness_from(&destinations))
    }

    /// Remove the input of `destination` and of all its descendants.
    pub fn disconnect(&mut self, destination: Uuid) -> Result<Vec<Uuid>, GraphError> {
        self.plug(destination)?;
        let mut plugs = vec![destination];
        plugs.extend(self.descendant_plugs(destination));

        let mut disconnected = Vec::new();
        for plug in plugs {
            if let Some(source) = self.input(plug) {
                self.unlink(source, plug);
                disconnected.push(plug);
            }
        }
        if disconnected.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Disconnected {}", self.full_name(destination));
        Ok(self.propagate_dirtiness_from(&disconnected))
    }

    /// Give every destination of the compound plug `parent` a connected
    /// counterpart of its new `child`, so connected compounds keep one shape.
    pub(crate) fn mirror_child_added(&mut self, parent: Uuid, child: Uuid) -> Result<(), GraphError> {
        if !self.is_plug(parent) {
            return Ok(());
        }
        let name = self.name(child).to_string();
        for destination in self.outputs(parent) {
            let direction = self.plug(destination)?.direction();
            let counterpart = self.create_counterpart(child, &name, direction)?;
            let mirrored = self.add_plug(destination, counterpart)?;
            self.connect(child, mirrored)?;
        }
        Ok(())
    }

    /// Reorder the destinations of `parent` to follow its child order.
    pub(crate) fn mirror_reorder(&mut self, parent: Uuid) -> Result<(), GraphError> {
        let order = self.children(parent).to_vec();
        for destination in self.outputs(parent) {
            let mirrored: Option<Vec<Uuid>> = order
                .iter()
                .map(|child| {
                    self.outputs(*child)
                        .into_iter()
                        .find(|d| self.parent(*d) == Some(destination))
                })
                .collect();
            match mirrored {
                Some(mirrored) if mirrored.len() == self.children(destination).len() => {
                    self.reorder_children(destination, &mirrored)?;
                }
                _ => warn!(
                    "{} is not connected child by child, leaving its order",
                    self.full_name(destination)
                ),
            }
        }
        Ok(())
    }

    fn link(&mut self, source: Uuid, destination: Uuid) {
        if let Some(previous) = self.input(destination) {
            if previous == source {
                return;
            }
            self.unlink(previous, destination);
        }
        if let Ok(data) = self.plug_mut(destination) {
            data.input = Some(source);
        }
        if let Ok(data) = self.plug_mut(source) {
            data.outputs.push(destination);
        }
    }

    pub(crate) fn unlink(&mut self, source: Uuid, destination: Uuid) {
        if let Ok(data) = self.plug_mut(destination) {
            if data.input == Some(source) {
                data.input = None;
            }
        }
        if let Ok(data) = self.plug_mut(source) {
            data.outputs.retain(|d| *d != destination);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlugDefinition;
    use crate::node::{ArithmeticNode, ComputeNode, Operation};

    fn add(graph: &mut Graph, name: &str) -> Uuid {
        let root = graph.root();
        graph
            .add_node(root, name, Box::new(ArithmeticNode::new(Operation::Add, ValueType::Int)))
            .unwrap()
    }

    #[test]
    fn test_connect_and_disconnect() {
        let mut graph = Graph::new();
        let a = add(&mut graph, "a");
        let b = add(&mut graph, "b");
        let a_result = graph.child(a, "result").unwrap();
        let b_op1 = graph.child(b, "op1").unwrap();
        let b_result = graph.child(b, "result").unwrap();

        let dirtied = graph.connect(a_result, b_op1).unwrap();
        assert!(dirtied.contains(&b_op1));
        assert!(dirtied.contains(&b_result));
        assert_eq!(graph.input(b_op1), Some(a_result));
        assert_eq!(graph.outputs(a_result), vec![b_op1]);
        assert_eq!(graph.source(b_op1), a_result);

        graph.disconnect(b_op1).unwrap();
        assert_eq!(graph.input(b_op1), None);
        assert!(graph.outputs(a_result).is_empty());
    }

    #[test]
    fn test_connect_replaces_existing_input() {
        let mut graph = Graph::new();
        let a = add(&mut graph, "a");
        let b = add(&mut graph, "b");
        let c = add(&mut graph, "c");
        let op1 = graph.child(c, "op1").unwrap();
        let a_result = graph.child(a, "result").unwrap();
        let b_result = graph.child(b, "result").unwrap();

        graph.connect(a_result, op1).unwrap();
        graph.connect(b_result, op1).unwrap();
        assert_eq!(graph.input(op1), Some(b_result));
        assert!(graph.outputs(a_result).is_empty());
    }

    #[test]
    fn test_cycle_is_rejected_and_graph_unchanged() {
        let mut graph = Graph::new();
        let a = add(&mut graph, "a");
        let b = add(&mut graph, "b");
        let a_result = graph.child(a, "result").unwrap();
        let a_op1 = graph.child(a, "op1").unwrap();
        let b_op1 = graph.child(b, "op1").unwrap();
        let b_result = graph.child(b, "result").unwrap();
        graph.connect(a_result, b_op1).unwrap();

        let result = graph.connect(b_result, a_op1);
        assert!(matches!(result, Err(GraphError::InvalidTopology(_))));
        assert_eq!(graph.input(a_op1), None);
        assert!(graph.outputs(b_result).is_empty());

        let same_node = graph.connect(a_result, a_op1);
        assert!(matches!(same_node, Err(GraphError::InvalidTopology(_))));
    }

    #[test]
    fn test_type_and_shape_mismatch() {
        let mut graph = Graph::new();
        let root = graph.root();
        let node = graph.add_node(root, "node", Box::new(ComputeNode::new())).unwrap();
        let int_out = graph.add_plug(node, PlugDefinition::output("i", ValueType::Int)).unwrap();
        let str_in = graph.add_plug(node, PlugDefinition::input("s", ValueType::String)).unwrap();
        let pair = graph
            .add_plug(
                node,
                PlugDefinition::compound(
                    "pair",
                    Direction::Out,
                    vec![
                        PlugDefinition::output("a", ValueType::Int),
                        PlugDefinition::output("b", ValueType::Int),
                    ],
                ),
            )
            .unwrap();
        let single = graph
            .add_plug(
                node,
                PlugDefinition::compound(
                    "single",
                    Direction::In,
                    vec![PlugDefinition::input("a", ValueType::Int)],
                ),
            )
            .unwrap();

        assert!(matches!(
            graph.connect(int_out, str_in),
            Err(GraphError::TypeMismatch { .. })
        ));
        assert!(matches!(
            graph.connect(pair, single),
            Err(GraphError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_compound_connects_children() {
        let mut graph = Graph::new();
        let root = graph.root();
        let node = graph.add_node(root, "node", Box::new(ComputeNode::new())).unwrap();
        let shape = |direction| {
            PlugDefinition::compound(
                "p",
                direction,
                vec![
                    PlugDefinition::new("x", direction, ValueType::Float),
                    PlugDefinition::new("y", direction, ValueType::Float),
                ],
            )
        };
        let out = graph.add_plug(node, shape(Direction::Out).with_name("out")).unwrap();
        let other = graph.add_node(root, "other", Box::new(ComputeNode::new())).unwrap();
        let input = graph.add_plug(other, shape(Direction::In).with_name("in")).unwrap();

        graph.connect(out, input).unwrap();
        let out_y = graph.child(out, "y").unwrap();
        let in_y = graph.child(input, "y").unwrap();
        assert_eq!(graph.input(in_y), Some(out_y));

        graph.disconnect(input).unwrap();
        assert_eq!(graph.input(in_y), None);
        assert_eq!(graph.input(input), None);
    }

    #[test]
    fn test_input_rejected_when_not_accepted() {
        let mut graph = Graph::new();
        let root = graph.root();
        let node = graph.add_node(root, "node", Box::new(ComputeNode::new())).unwrap();
        let out = graph.add_plug(node, PlugDefinition::output("out", ValueType::Int)).unwrap();
        let other = graph.add_node(root, "other", Box::new(ComputeNode::new())).unwrap();
        let locked = graph
            .add_plug(
                other,
                PlugDefinition::input("locked", ValueType::Int).with_flags(crate::model::PlugFlags {
                    accepts_inputs: false,
                    ..Default::default()
                }),
            )
            .unwrap();
        assert!(matches!(
            graph.connect(out, locked),
            Err(GraphError::InvalidTopology(_))
        ));
    }
}
