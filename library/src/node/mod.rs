//! Node behaviours: what a node computes from its plugs.

pub mod arithmetic;
pub mod compute;
pub mod context_variable;
pub mod loop_node;
pub mod registry;

use std::any::Any;

use uuid::Uuid;

use crate::error::GraphError;
use crate::evaluation::{Context, PlugHash, PlugHasher};
use crate::graph::Graph;
use crate::model::Value;

pub use arithmetic::{ArithmeticNode, Operation};
pub use compute::{ComputeNode, ProcessorNode};
pub use context_variable::ContextVariableNode;
pub use loop_node::{Loop, LoopPlugs, LoopState, DEFAULT_ITERATIONS, LOOP_INDEX};
pub use registry::NodeRegistry;

/// Trait implemented by every node type.
///
/// A behaviour is stored next to its node in the [`Graph`] and is handed the
/// graph and its node id on every call. Decorators such as [`Loop`] wrap a
/// boxed base behaviour and forward whatever they do not handle themselves.
pub trait NodeBehavior: Any + Send + Sync {
    /// Registry name of the node type, e.g. `"math.add"`.
    fn type_name(&self) -> &str;

    /// Called once after the node is parented, before the behaviour is
    /// stored. Plugs the node type always has are created here.
    fn initialize(&mut self, _graph: &mut Graph, _node: Uuid) -> Result<(), GraphError> {
        Ok(())
    }

    /// Push the outputs of `node` that depend on the input plug `input`.
    fn affects(&self, _graph: &Graph, _node: Uuid, _input: Uuid, _outputs: &mut Vec<Uuid>) {}

    /// Hash of the leaf output plug `output` under `context`.
    fn hash(
        &self,
        graph: &Graph,
        node: Uuid,
        output: Uuid,
        context: &Context,
    ) -> Result<PlugHash, GraphError>;

    /// Value of the leaf output plug `output` under `context`.
    fn compute(
        &self,
        graph: &Graph,
        node: Uuid,
        output: Uuid,
        context: &Context,
    ) -> Result<Value, GraphError>;

    /// Delivered while the behaviour holds a child-added subscription on its node.
    fn child_added(&mut self, _graph: &mut Graph, _node: Uuid, _child: Uuid) -> Result<(), GraphError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

/// Start a hash for `output` with the node type and the plug's path on the
/// node. Node identity is left out so equal setups share cached values.
pub fn output_hash_prefix(
    graph: &Graph,
    type_name: &str,
    node: Uuid,
    output: Uuid,
) -> Result<PlugHasher, GraphError> {
    let mut h = PlugHasher::new();
    h.append_str(type_name);
    h.append_str(&graph.relative_name(output, node)?.join("."));
    Ok(h)
}
