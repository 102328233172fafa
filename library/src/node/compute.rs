use std::any::Any;

use uuid::Uuid;

use super::{output_hash_prefix, NodeBehavior};
use crate::error::GraphError;
use crate::evaluation::{Context, PlugHash};
use crate::graph::Graph;
use crate::model::{PlugDefinition, Value, ValueType};

pub const COMPUTE_TYPE: &str = "utility.compute";
pub const PASSTHROUGH_TYPE: &str = "utility.passthrough";

/// A node that declares nothing and computes nothing. Used as the base of
/// nodes whose plugs are all added by the user.
pub struct ComputeNode {
    type_name: String,
}

impl Default for ComputeNode {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeNode {
    pub fn new() -> Self {
        Self {
            type_name: COMPUTE_TYPE.to_string(),
        }
    }
}

impl NodeBehavior for ComputeNode {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn hash(
        &self,
        graph: &Graph,
        node: Uuid,
        output: Uuid,
        _context: &Context,
    ) -> Result<PlugHash, GraphError> {
        Ok(output_hash_prefix(graph, &self.type_name, node, output)?.finish())
    }

    fn compute(
        &self,
        graph: &Graph,
        _node: Uuid,
        output: Uuid,
        _context: &Context,
    ) -> Result<Value, GraphError> {
        Err(GraphError::compute(format!(
            "{} has no way to compute {}",
            self.type_name,
            graph.full_name(output)
        )))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Passes `in` through to `out`, field by field for compound plugs.
pub struct ProcessorNode {
    value_type: ValueType,
}

impl ProcessorNode {
    pub fn new(value_type: ValueType) -> Self {
        Self { value_type }
    }

    /// The plug under `in` mirroring `output` under `out`.
    fn mirrored_input(&self, graph: &Graph, node: Uuid, output: Uuid) -> Result<Uuid, GraphError> {
        let (_, path) = graph
            .ancestor_plug(node, output)
            .ok_or_else(|| GraphError::not_found(graph.full_name(output)))?;
        let input = graph
            .child(node, "in")
            .ok_or_else(|| GraphError::not_found(format!("{}.in", graph.full_name(node))))?;
        graph.descendant(input, &path)
    }
}

impl NodeBehavior for ProcessorNode {
    fn type_name(&self) -> &str {
        PASSTHROUGH_TYPE
    }

    fn initialize(&mut self, graph: &mut Graph, node: Uuid) -> Result<(), GraphError> {
        graph.add_plug(node, PlugDefinition::input("in", self.value_type))?;
        graph.add_plug(node, PlugDefinition::output("out", self.value_type))?;
        Ok(())
    }

    fn affects(&self, graph: &Graph, node: Uuid, input: Uuid, outputs: &mut Vec<Uuid>) {
        let Some((ancestor, path)) = graph.ancestor_plug(node, input) else {
            return;
        };
        if graph.name(ancestor) != "in" {
            return;
        }
        if let Some(out) = graph.child(node, "out") {
            if let Ok(output) = graph.descendant(out, &path) {
                outputs.push(output);
            }
        }
    }

    fn hash(
        &self,
        graph: &Graph,
        node: Uuid,
        output: Uuid,
        _context: &Context,
    ) -> Result<PlugHash, GraphError> {
        graph.hash(self.mirrored_input(graph, node, output)?)
    }

    fn compute(
        &self,
        graph: &Graph,
        node: Uuid,
        output: Uuid,
        _context: &Context,
    ) -> Result<Value, GraphError> {
        graph.get_value(self.mirrored_input(graph, node, output)?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let mut graph = Graph::new();
        let root = graph.root();
        let node = graph
            .add_node(root, "pass", Box::new(ProcessorNode::new(ValueType::String)))
            .unwrap();
        let input = graph.child(node, "in").unwrap();
        let out = graph.child(node, "out").unwrap();
        graph.set_value(input, "hello").unwrap();

        assert_eq!(graph.affects(input), vec![out]);
        assert_eq!(graph.get(out, &Context::new()).unwrap(), Value::from("hello"));
        assert_eq!(
            graph.get_hash(out, &Context::new()).unwrap(),
            graph.get_hash(input, &Context::new()).unwrap()
        );
    }

    #[test]
    fn test_compute_node_hash_depends_on_plug() {
        let mut graph = Graph::new();
        let root = graph.root();
        let node = graph.add_node(root, "node", Box::new(ComputeNode::new())).unwrap();
        let a = graph.add_plug(node, PlugDefinition::output("a", ValueType::Int)).unwrap();
        let b = graph.add_plug(node, PlugDefinition::output("b", ValueType::Int)).unwrap();
        let context = Context::new();
        assert_ne!(
            graph.get_hash(a, &context).unwrap(),
            graph.get_hash(b, &context).unwrap()
        );
    }
}
