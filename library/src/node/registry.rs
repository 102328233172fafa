use std::collections::HashMap;
use std::sync::Arc;

use super::compute::{COMPUTE_TYPE, PASSTHROUGH_TYPE};
use super::context_variable::CONTEXT_VARIABLE_TYPE;
use super::loop_node::LOOP_TYPE;
use super::{ArithmeticNode, ComputeNode, ContextVariableNode, Loop, NodeBehavior, Operation, ProcessorNode};
use crate::error::GraphError;
use crate::model::ValueType;

/// Loop over a pass-through base, configured as soon as it is created.
pub const PASSTHROUGH_LOOP_TYPE: &str = "utility.passthrough_loop";

type Factory = Arc<dyn Fn() -> Box<dyn NodeBehavior> + Send + Sync>;

/// Creates node behaviours by type name. Graph descriptions are rebuilt
/// through a registry.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: HashMap<String, Factory>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in node type.
    pub fn with_default_nodes() -> Self {
        let mut registry = Self::new();
        registry.register(COMPUTE_TYPE, || Box::new(ComputeNode::new()));
        registry.register(PASSTHROUGH_TYPE, || Box::new(ProcessorNode::new(ValueType::Int)));
        registry.register(CONTEXT_VARIABLE_TYPE, || Box::new(ContextVariableNode));
        registry.register(LOOP_TYPE, || Box::new(Loop::new(Box::new(ComputeNode::new()))));
        registry.register(PASSTHROUGH_LOOP_TYPE, || {
            Box::new(
                Loop::new(Box::new(ProcessorNode::new(ValueType::Int))).with_type_name(PASSTHROUGH_LOOP_TYPE),
            )
        });
        for operation in [Operation::Add, Operation::Subtract, Operation::Multiply] {
            for value_type in [ValueType::Int, ValueType::Float] {
                let type_name = ArithmeticNode::new(operation, value_type).type_name().to_string();
                registry.register(&type_name, move || Box::new(ArithmeticNode::new(operation, value_type)));
            }
        }
        registry
    }

    /// Register a factory, replacing any previous one for `type_name`.
    pub fn register<F>(&mut self, type_name: &str, factory: F)
    where
        F: Fn() -> Box<dyn NodeBehavior> + Send + Sync + 'static,
    {
        self.factories.insert(type_name.to_string(), Arc::new(factory));
    }

    pub fn create(&self, type_name: &str) -> Result<Box<dyn NodeBehavior>, GraphError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| GraphError::not_found(format!("node type {}", type_name)))?;
        Ok(factory())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_nodes() {
        let registry = NodeRegistry::with_default_nodes();
        assert!(registry.contains("utility.loop"));
        assert!(registry.contains("math.multiply_float"));
        assert_eq!(registry.create("math.add").unwrap().type_name(), "math.add");
        assert_eq!(
            registry.create(PASSTHROUGH_LOOP_TYPE).unwrap().type_name(),
            PASSTHROUGH_LOOP_TYPE
        );
        assert!(matches!(registry.create("nope"), Err(GraphError::NotFound(_))));
    }

    #[test]
    fn test_type_names_sorted() {
        let registry = NodeRegistry::with_default_nodes();
        let names = registry.type_names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 11);
    }
}
