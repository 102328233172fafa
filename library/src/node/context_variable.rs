use std::any::Any;

use uuid::Uuid;

use super::{output_hash_prefix, NodeBehavior};
use crate::error::GraphError;
use crate::evaluation::{Context, PlugHash};
use crate::graph::Graph;
use crate::model::{PlugDefinition, Value, ValueType};

pub const CONTEXT_VARIABLE_TYPE: &str = "utility.context_variable";

/// Reads an integer context variable, e.g. `loop:index` inside a loop body.
#[derive(Default)]
pub struct ContextVariableNode;

impl ContextVariableNode {
    fn settings(&self, graph: &Graph, node: Uuid) -> Result<(String, i64), GraphError> {
        let plug = |name: &str| {
            graph
                .child(node, name)
                .ok_or_else(|| GraphError::not_found(format!("{}.{}", graph.full_name(node), name)))
        };
        let name = graph.get_value(plug("name")?)?;
        let default = graph.get_value(plug("default")?)?;
        Ok((
            name.as_str().unwrap_or_default().to_string(),
            default.as_int().unwrap_or_default(),
        ))
    }
}

impl NodeBehavior for ContextVariableNode {
    fn type_name(&self) -> &str {
        CONTEXT_VARIABLE_TYPE
    }

    fn initialize(&mut self, graph: &mut Graph, node: Uuid) -> Result<(), GraphError> {
        graph.add_plug(node, PlugDefinition::input("name", ValueType::String))?;
        graph.add_plug(node, PlugDefinition::input("default", ValueType::Int))?;
        graph.add_plug(node, PlugDefinition::output("out", ValueType::Int))?;
        Ok(())
    }

    fn affects(&self, graph: &Graph, node: Uuid, input: Uuid, outputs: &mut Vec<Uuid>) {
        if graph.parent(input) == Some(node) {
            if let Some(out) = graph.child(node, "out") {
                outputs.push(out);
            }
        }
    }

    fn hash(
        &self,
        graph: &Graph,
        node: Uuid,
        output: Uuid,
        context: &Context,
    ) -> Result<PlugHash, GraphError> {
        let mut h = output_hash_prefix(graph, CONTEXT_VARIABLE_TYPE, node, output)?;
        let (name, default) = self.settings(graph, node)?;
        h.append_i64(context.get_int(&name, default));
        Ok(h.finish())
    }

    fn compute(
        &self,
        graph: &Graph,
        node: Uuid,
        _output: Uuid,
        context: &Context,
    ) -> Result<Value, GraphError> {
        let (name, default) = self.settings(graph, node)?;
        Ok(Value::Int(context.get_int(&name, default)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
