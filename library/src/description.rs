//! Graph descriptions: the topology, dynamic plugs, input values and
//! connections needed to rebuild a graph.
//!
//! Nodes are recreated through a [`NodeRegistry`], so only the type name is
//! stored. Plugs a node type creates itself are not stored, apart from the
//! values of its inputs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::GraphError;
use crate::graph::Graph;
use crate::model::{Direction, PlugDefinition, Value};
use crate::node::NodeRegistry;

pub const DESCRIPTION_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GraphDescription {
    pub version: u32,
    pub nodes: Vec<NodeDescription>,
    #[serde(default)]
    pub connections: Vec<ConnectionDescription>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NodeDescription {
    pub name: String,
    pub type_name: String,
    /// User-created plugs, in creation order.
    #[serde(default)]
    pub dynamic_plugs: Vec<PlugDefinition>,
    /// Input values differing from their defaults.
    #[serde(default)]
    pub values: Vec<PlugValueDescription>,
    #[serde(default)]
    pub children: Vec<NodeDescription>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlugValueDescription {
    /// Dot separated path relative to the node.
    pub plug: String,
    pub value: Value,
}

/// Full names of both endpoints.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConnectionDescription {
    pub source: String,
    pub destination: String,
}

impl GraphDescription {
    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, GraphError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl Graph {
    pub fn describe(&self) -> Result<GraphDescription, GraphError> {
        let nodes = self
            .nodes(self.root())
            .into_iter()
            .map(|node| self.describe_node(node))
            .collect::<Result<Vec<_>, _>>()?;

        let mut connections = Vec::new();
        self.describe_connections(self.root(), &mut connections);

        Ok(GraphDescription {
            version: DESCRIPTION_VERSION,
            nodes,
            connections,
        })
    }

    fn describe_node(&self, node: Uuid) -> Result<NodeDescription, GraphError> {
        let component = self.component_ref(node)?;
        let mut dynamic_plugs = Vec::new();
        for plug in self.plugs(node) {
            if self.plug(plug)?.flags().dynamic {
                dynamic_plugs.push(self.plug_definition(plug)?);
            }
        }

        let mut values = Vec::new();
        for plug in self.descendant_plugs(node) {
            let data = self.plug(plug)?;
            let serialisable = data.direction() == Direction::In
                && data.flags().serialisable
                && data.input().is_none()
                && self.children(plug).is_empty();
            if !serialisable {
                continue;
            }
            let value = data.stored_value();
            if &value != data.default_value() {
                values.push(PlugValueDescription {
                    plug: self.relative_name(plug, node)?.join("."),
                    value,
                });
            }
        }

        let children = self
            .nodes(node)
            .into_iter()
            .map(|child| self.describe_node(child))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NodeDescription {
            name: component.name().to_string(),
            type_name: component.type_name().unwrap_or_default().to_string(),
            dynamic_plugs,
            values,
            children,
        })
    }

    /// Connections in tree order. Child connections implied by a connection
    /// of their parent plugs are left out.
    fn describe_connections(&self, id: Uuid, connections: &mut Vec<ConnectionDescription>) {
        for child in self.children(id).to_vec() {
            if let Some(source) = self.input(child) {
                let implied = match (self.parent(child), self.parent(source)) {
                    (Some(parent), Some(source_parent)) => {
                        self.is_plug(parent) && self.input(parent) == Some(source_parent)
                    }
                    _ => false,
                };
                if !implied {
                    connections.push(ConnectionDescription {
                        source: self.full_name(source),
                        destination: self.full_name(child),
                    });
                }
            }
            self.describe_connections(child, connections);
        }
    }

    /// Build a new graph with the default [`EngineConfig`] from a description.
    pub fn from_description(
        description: &GraphDescription,
        registry: &NodeRegistry,
    ) -> Result<Graph, GraphError> {
        Self::from_description_with_config(description, registry, EngineConfig::default())
    }

    pub fn from_description_with_config(
        description: &GraphDescription,
        registry: &NodeRegistry,
        config: EngineConfig,
    ) -> Result<Graph, GraphError> {
        let mut graph = Graph::with_config(config);
        graph.load_description(description, registry)?;
        Ok(graph)
    }

    /// Add the described nodes under the root. Nodes come first, then their
    /// dynamic plugs, then values, then connections, so loops have their
    /// feedback plugs before anything is wired to them.
    pub fn load_description(
        &mut self,
        description: &GraphDescription,
        registry: &NodeRegistry,
    ) -> Result<(), GraphError> {
        if description.version > DESCRIPTION_VERSION {
            return Err(GraphError::invalid_argument(format!(
                "description version {} is newer than supported version {}",
                description.version, DESCRIPTION_VERSION
            )));
        }

        let mut created = Vec::new();
        let root = self.root();
        for node in &description.nodes {
            self.create_described_node(root, node, registry, &mut created)?;
        }

        for (node, node_description) in &created {
            for definition in &node_description.dynamic_plugs {
                self.add_plug(*node, definition.clone())?;
            }
        }

        for (node, node_description) in &created {
            for value in &node_description.values {
                let path: Vec<&str> = value.plug.split('.').collect();
                let plug = self.descendant(*node, &path)?;
                self.set_value(plug, value.value.clone())?;
            }
        }

        for connection in &description.connections {
            let source = self.find(&connection.source)?;
            let destination = self.find(&connection.destination)?;
            self.connect(source, destination)?;
        }
        Ok(())
    }

    fn create_described_node<'a>(
        &mut self,
        parent: Uuid,
        description: &'a NodeDescription,
        registry: &NodeRegistry,
        created: &mut Vec<(Uuid, &'a NodeDescription)>,
    ) -> Result<(), GraphError> {
        let behavior = registry.create(&description.type_name)?;
        let node = self.add_node(parent, &description.name, behavior)?;
        created.push((node, description));
        for child in &description.children {
            self.create_described_node(node, child, registry, created)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Context;
    use crate::model::ValueType;
    use crate::node::{ArithmeticNode, Operation};

    fn setup_chain() -> Graph {
        let mut graph = Graph::new();
        let root = graph.root();
        let a = graph
            .add_node(root, "a", Box::new(ArithmeticNode::new(Operation::Add, ValueType::Int)))
            .unwrap();
        let b = graph
            .add_node(root, "b", Box::new(ArithmeticNode::new(Operation::Multiply, ValueType::Int)))
            .unwrap();
        graph.set_value(graph.child(a, "op1").unwrap(), 2).unwrap();
        graph.set_value(graph.child(a, "op2").unwrap(), 3).unwrap();
        graph.set_value(graph.child(b, "op2").unwrap(), 4).unwrap();
        graph
            .connect(graph.child(a, "result").unwrap(), graph.child(b, "op1").unwrap())
            .unwrap();
        graph
    }

    #[test]
    fn test_describe_skips_defaults_and_connected() {
        let graph = setup_chain();
        let description = graph.describe().unwrap();
        assert_eq!(description.nodes.len(), 2);
        assert_eq!(description.nodes[0].values.len(), 2);
        assert_eq!(
            description.nodes[1].values,
            vec![PlugValueDescription {
                plug: "op2".to_string(),
                value: Value::Int(4),
            }]
        );
        assert_eq!(
            description.connections,
            vec![ConnectionDescription {
                source: "a.result".to_string(),
                destination: "b.op1".to_string(),
            }]
        );
    }

    #[test]
    fn test_json_and_binary_rebuild() {
        let graph = setup_chain();
        let description = graph.describe().unwrap();
        let registry = NodeRegistry::with_default_nodes();

        let from_json = GraphDescription::from_json(&description.to_json().unwrap()).unwrap();
        let from_bytes = GraphDescription::from_bytes(&description.to_bytes().unwrap()).unwrap();
        assert_eq!(from_json, description);
        assert_eq!(from_bytes, description);

        let rebuilt = Graph::from_description(&from_json, &registry).unwrap();
        let result = rebuilt.find("b.result").unwrap();
        assert_eq!(rebuilt.get(result, &Context::new()).unwrap(), Value::Int(20));
        assert_eq!(rebuilt.describe().unwrap(), description);
    }

    #[test]
    fn test_rebuild_with_config() {
        let description = setup_chain().describe().unwrap();
        let config = EngineConfig {
            value_cache_capacity: 2,
            hash_cache_enabled: false,
            ..Default::default()
        };
        let rebuilt =
            Graph::from_description_with_config(&description, &NodeRegistry::with_default_nodes(), config.clone())
                .unwrap();
        assert_eq!(rebuilt.config(), &config);

        let result = rebuilt.find("b.result").unwrap();
        assert_eq!(rebuilt.get(result, &Context::new()).unwrap(), Value::Int(20));
        assert_eq!(rebuilt.cache().hash_count(), 0);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let description = GraphDescription {
            version: DESCRIPTION_VERSION + 1,
            nodes: Vec::new(),
            connections: Vec::new(),
        };
        assert!(matches!(
            Graph::from_description(&description, &NodeRegistry::new()),
            Err(GraphError::InvalidArgument(_))
        ));
    }
}
