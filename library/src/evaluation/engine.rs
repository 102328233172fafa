//! Hash and value pulls.
//!
//! Both walks share one shape: a connected plug follows its input, a
//! compound plug combines its children in order, an unconnected input
//! reports its stored value and a leaf output asks its node's behaviour.
//! Every pull happens under the ambient [`Context`].

use std::cell::RefCell;
use std::collections::HashSet;

use log::trace;
use rayon::prelude::*;
use uuid::Uuid;

use super::context::Context;
use super::hash::{PlugHash, PlugHasher};
use crate::cache::HashKey;
use crate::error::GraphError;
use crate::graph::Graph;
use crate::model::{Direction, Value, ValueType};

thread_local! {
    /// Hash requests currently being resolved on this thread.
    static IN_FLIGHT: RefCell<HashSet<HashKey>> = RefCell::new(HashSet::new());
}

/// Marks a `(plug, context)` hash as in progress. A second request for the
/// same key before the first finishes means the evaluation is cyclic.
struct InFlight {
    key: HashKey,
}

impl InFlight {
    fn enter(key: HashKey) -> Option<Self> {
        IN_FLIGHT
            .with(|set| set.borrow_mut().insert(key))
            .then(|| Self { key })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let _ = IN_FLIGHT.try_with(|set| set.borrow_mut().remove(&self.key));
    }
}

impl Graph {
    /// Hash of `plug` under the ambient context.
    pub fn hash(&self, plug: Uuid) -> Result<PlugHash, GraphError> {
        let context = Context::current();
        let key = (plug, context.content_hash());
        if self.config().hash_cache_enabled {
            if let Some(hash) = self.cache().get_hash(&key) {
                trace!("Hash cache hit for {}", self.full_name(plug));
                return Ok(hash);
            }
        }

        let _in_flight = InFlight::enter(key).ok_or_else(|| {
            GraphError::topology(format!(
                "cyclic evaluation of {} in context {:?}",
                self.full_name(plug),
                context
            ))
        })?;
        let hash = self.hash_uncached(plug, &context)?;
        if self.config().hash_cache_enabled {
            self.cache().put_hash(key, hash);
        }
        Ok(hash)
    }

    fn hash_uncached(&self, plug: Uuid, context: &Context) -> Result<PlugHash, GraphError> {
        let data = self.plug(plug)?;
        if let Some(input) = data.input() {
            return self.hash(input);
        }

        if data.value_type() == ValueType::Compound {
            let mut h = PlugHasher::new();
            h.append_str("compound");
            for child in self.plugs(plug) {
                h.append_str(self.name(child));
                h.append_hash(&self.hash(child)?);
            }
            return Ok(h.finish());
        }

        match data.direction() {
            Direction::In => {
                let mut h = PlugHasher::new();
                h.append_str(&data.value_type().to_string());
                h.append_value(&data.stored_value());
                Ok(h.finish())
            }
            Direction::Out => {
                let node = self.owning_node(plug)?;
                let behavior = self.behavior(node).ok_or_else(|| {
                    GraphError::not_found(format!("behaviour of {}", self.full_name(node)))
                })?;
                behavior.hash(self, node, plug, context)
            }
        }
    }

    /// Value of `plug` under the ambient context. Leaf outputs are computed
    /// at most once per distinct hash while they stay in the value cache.
    pub fn get_value(&self, plug: Uuid) -> Result<Value, GraphError> {
        let data = self.plug(plug)?;
        if let Some(input) = data.input() {
            return self.get_value(input);
        }

        if data.value_type() == ValueType::Compound {
            return self
                .plugs(plug)
                .into_iter()
                .map(|child| Ok((self.name(child).to_string(), self.get_value(child)?)))
                .collect::<Result<Vec<_>, GraphError>>()
                .map(Value::Compound);
        }

        if data.direction() == Direction::In {
            return Ok(data.stored_value());
        }

        let hash = self.hash(plug)?;
        if let Some(value) = self.cache().get_value(&hash) {
            trace!("Value cache hit for {}", self.full_name(plug));
            return Ok(value);
        }

        let node = self.owning_node(plug)?;
        let behavior = self.behavior(node).ok_or_else(|| {
            GraphError::not_found(format!("behaviour of {}", self.full_name(node)))
        })?;
        let context = Context::current();
        let value = behavior.compute(self, node, plug, &context)?;
        let found = value.value_type();
        let value = value
            .coerce(data.value_type())
            .ok_or_else(|| GraphError::type_mismatch(data.value_type(), found))?;
        trace!("Computed {} = {}", self.full_name(plug), value);
        self.cache().put_value(hash, value.clone());
        Ok(value)
    }

    /// Value of `plug` with `context` scoped for the duration of the pull.
    pub fn get(&self, plug: Uuid, context: &Context) -> Result<Value, GraphError> {
        let _scope = context.scope();
        self.get_value(plug)
    }

    /// Hash of `plug` with `context` scoped for the duration of the pull.
    pub fn get_hash(&self, plug: Uuid, context: &Context) -> Result<PlugHash, GraphError> {
        let _scope = context.scope();
        self.hash(plug)
    }

    /// Evaluate independent requests in parallel. Results keep the order of
    /// `requests`.
    pub fn get_many(&self, requests: &[(Uuid, Context)]) -> Vec<Result<Value, GraphError>> {
        requests
            .par_iter()
            .map(|(plug, context)| self.get(*plug, context))
            .collect()
    }

    fn owning_node(&self, plug: Uuid) -> Result<Uuid, GraphError> {
        self.node_of(plug)
            .ok_or_else(|| GraphError::not_found(format!("node owning {}", self.full_name(plug))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlugDefinition;
    use crate::node::{ArithmeticNode, ComputeNode, Operation};

    fn setup_add() -> (Graph, Uuid) {
        let mut graph = Graph::new();
        let root = graph.root();
        let add = graph
            .add_node(root, "add", Box::new(ArithmeticNode::new(Operation::Add, ValueType::Int)))
            .unwrap();
        (graph, add)
    }

    #[test]
    fn test_get_computes_and_follows_inputs() {
        let (mut graph, add) = setup_add();
        let op1 = graph.child(add, "op1").unwrap();
        let op2 = graph.child(add, "op2").unwrap();
        let result = graph.child(add, "result").unwrap();
        graph.set_value(op1, 2).unwrap();
        graph.set_value(op2, 3).unwrap();

        assert_eq!(graph.get(result, &Context::new()).unwrap(), Value::Int(5));
        assert_eq!(graph.get(op1, &Context::new()).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_hash_tracks_inputs() {
        let (mut graph, add) = setup_add();
        let op1 = graph.child(add, "op1").unwrap();
        let result = graph.child(add, "result").unwrap();
        let context = Context::new();

        let first = graph.get_hash(result, &context).unwrap();
        assert_eq!(graph.get_hash(result, &context).unwrap(), first);

        graph.set_value(op1, 7).unwrap();
        let second = graph.get_hash(result, &context).unwrap();
        assert_ne!(first, second);

        graph.set_value(op1, 0).unwrap();
        assert_eq!(graph.get_hash(result, &context).unwrap(), first);
    }

    #[test]
    fn test_compute_failure_propagates() {
        let mut graph = Graph::new();
        let root = graph.root();
        let node = graph.add_node(root, "node", Box::new(ComputeNode::new())).unwrap();
        let out = graph
            .add_plug(node, PlugDefinition::output("out", ValueType::Int))
            .unwrap();
        assert!(matches!(
            graph.get(out, &Context::new()),
            Err(GraphError::Compute(_))
        ));
        assert_eq!(Context::scope_depth(), 0);
    }

    #[test]
    fn test_get_many_keeps_order() {
        let (mut graph, add) = setup_add();
        let op2 = graph.child(add, "op2").unwrap();
        let result = graph.child(add, "result").unwrap();
        graph.set_value(op2, 10).unwrap();

        let requests: Vec<(Uuid, Context)> = (0..8)
            .map(|i| (if i % 2 == 0 { result } else { op2 }, Context::new().with_frame(i as f64)))
            .collect();
        let values = graph.get_many(&requests);
        for (i, value) in values.into_iter().enumerate() {
            assert_eq!(value.unwrap(), Value::Int(10), "request {}", i);
        }
    }

    #[test]
    fn test_disabled_hash_cache_stores_nothing() {
        let mut graph = Graph::with_config(crate::config::EngineConfig {
            hash_cache_enabled: false,
            ..Default::default()
        });
        let root = graph.root();
        let add = graph
            .add_node(root, "add", Box::new(ArithmeticNode::new(Operation::Add, ValueType::Int)))
            .unwrap();
        let result = graph.child(add, "result").unwrap();
        graph.get(result, &Context::new()).unwrap();
        assert_eq!(graph.cache().hash_count(), 0);
        assert_eq!(graph.cache().value_count(), 1);
    }

    #[test]
    fn test_hash_cache_stays_bounded_across_contexts() {
        let mut graph = Graph::with_config(crate::config::EngineConfig {
            hash_cache_contexts_per_plug: 8,
            ..Default::default()
        });
        let root = graph.root();
        let add = graph
            .add_node(root, "add", Box::new(ArithmeticNode::new(Operation::Add, ValueType::Int)))
            .unwrap();
        let result = graph.child(add, "result").unwrap();
        graph.set_value(graph.child(add, "op1").unwrap(), 4).unwrap();

        for frame in 0..200 {
            let context = Context::new().with_frame(frame as f64);
            assert_eq!(graph.get(result, &context).unwrap(), Value::Int(4));
        }
        // result, op1 and op2
        assert_eq!(graph.cache().hash_count(), 3 * 8);
    }
}
