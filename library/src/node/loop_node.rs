//! Bounded feedback loop.
//!
//! A loop node owns `in` and `out` plus three plugs it creates itself:
//! `next` (shaped like `in`), `previous` (shaped like `out`, accepting
//! dependency cycles) and the integer `iterations`. A body wired from
//! `previous` back into `next` is evaluated `iterations` times. Each step
//! lowers the `loop:index` context variable by one, and index zero reads
//! `in`, so the feedback edge never recurses without bound.
//!
//! The loop wraps a base behaviour. Node types that create `in` and `out`
//! during their own initialisation get configured immediately. Otherwise the
//! loop subscribes to child-added notifications and configures itself once
//! both plugs exist.

use std::any::Any;
use std::mem;

use log::debug;
use uuid::Uuid;

use super::NodeBehavior;
use crate::error::GraphError;
use crate::evaluation::{Context, PlugHash};
use crate::graph::{ChildAddedSubscription, Graph};
use crate::model::{Direction, PlugDefinition, Value, ValueType};

/// Context variable carrying the iteration being evaluated.
pub const LOOP_INDEX: &str = "loop:index";
pub const DEFAULT_ITERATIONS: i64 = 10;
pub const LOOP_TYPE: &str = "utility.loop";

/// Ids of the five loop plugs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopPlugs {
    pub in_plug: Uuid,
    pub out_plug: Uuid,
    pub next: Uuid,
    pub previous: Uuid,
    pub iterations: Uuid,
}

#[derive(Debug)]
pub enum LoopState {
    Uninitialized,
    /// Waiting for `in` and `out` to be added.
    Pending(ChildAddedSubscription),
    Configured(LoopPlugs),
}

pub struct Loop {
    base: Box<dyn NodeBehavior>,
    state: LoopState,
    type_name: String,
}

impl Loop {
    pub fn new(base: Box<dyn NodeBehavior>) -> Self {
        Self {
            base,
            state: LoopState::Uninitialized,
            type_name: LOOP_TYPE.to_string(),
        }
    }

    /// Register the loop under a different node type name.
    pub fn with_type_name(mut self, type_name: &str) -> Self {
        self.type_name = type_name.to_string();
        self
    }

    pub fn base(&self) -> &dyn NodeBehavior {
        self.base.as_ref()
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.state, LoopState::Configured(_))
    }

    pub fn plugs(&self) -> Option<LoopPlugs> {
        match self.state {
            LoopState::Configured(plugs) => Some(plugs),
            _ => None,
        }
    }

    pub fn in_plug(&self) -> Option<Uuid> {
        self.plugs().map(|p| p.in_plug)
    }

    pub fn out_plug(&self) -> Option<Uuid> {
        self.plugs().map(|p| p.out_plug)
    }

    pub fn next_plug(&self) -> Option<Uuid> {
        self.plugs().map(|p| p.next)
    }

    pub fn previous_plug(&self) -> Option<Uuid> {
        self.plugs().map(|p| p.previous)
    }

    pub fn iterations_plug(&self) -> Option<Uuid> {
        self.plugs().map(|p| p.iterations)
    }

    /// Create `next`, `previous` and `iterations` once `in` and `out` exist.
    /// Returns whether the loop is configured.
    fn setup_plugs(&mut self, graph: &mut Graph, node: Uuid) -> Result<bool, GraphError> {
        if self.is_configured() {
            return Ok(true);
        }
        let in_plug = graph.child(node, "in").filter(|p| graph.is_plug(*p));
        let out_plug = graph.child(node, "out").filter(|p| graph.is_plug(*p));
        let (Some(in_plug), Some(out_plug)) = (in_plug, out_plug) else {
            return Ok(false);
        };

        if let LoopState::Pending(subscription) = mem::replace(&mut self.state, LoopState::Uninitialized) {
            graph.unsubscribe(subscription);
        }

        let next = graph.add_plug(node, graph.create_counterpart(in_plug, "next", Direction::In)?)?;
        let previous_definition = graph
            .create_counterpart(out_plug, "previous", Direction::Out)?
            .map_flags(|f| f.accepts_dependency_cycles = true);
        let previous = graph.add_plug(node, previous_definition)?;
        let iterations = graph.add_plug(
            node,
            PlugDefinition::input("iterations", ValueType::Int)
                .with_default(DEFAULT_ITERATIONS)
                .with_min(0),
        )?;

        self.state = LoopState::Configured(LoopPlugs {
            in_plug,
            out_plug,
            next,
            previous,
            iterations,
        });
        debug!("Configured loop {}", graph.full_name(node));
        Ok(true)
    }

    /// Shared routing of hash and compute requests. `None` means the request
    /// is not a loop plug and belongs to the base behaviour.
    fn route<T>(
        &self,
        graph: &Graph,
        node: Uuid,
        output: Uuid,
        context: &Context,
        pull: impl Fn(&Graph, Uuid) -> Result<T, GraphError>,
    ) -> Option<Result<T, GraphError>> {
        let plugs = self.plugs()?;
        let (ancestor, path) = graph.ancestor_plug(node, output)?;

        if ancestor == plugs.previous {
            let index = context.get_int(LOOP_INDEX, 0);
            return Some(if index >= 1 {
                graph.descendant(plugs.next, &path).and_then(|plug| {
                    let _scope = context.set(LOOP_INDEX, index - 1).scope();
                    pull(graph, plug)
                })
            } else {
                graph
                    .descendant(plugs.in_plug, &path)
                    .and_then(|plug| pull(graph, plug))
            });
        }

        if ancestor == plugs.out_plug {
            return Some(self.route_out(graph, &plugs, &path, context, pull));
        }
        None
    }

    fn route_out<T>(
        &self,
        graph: &Graph,
        plugs: &LoopPlugs,
        path: &[String],
        context: &Context,
        pull: impl Fn(&Graph, Uuid) -> Result<T, GraphError>,
    ) -> Result<T, GraphError> {
        let iterations = graph
            .get_value(plugs.iterations)?
            .as_int()
            .unwrap_or(DEFAULT_ITERATIONS)
            .max(0);
        if iterations == 0 {
            return pull(graph, graph.descendant(plugs.in_plug, path)?);
        }
        let plug = graph.descendant(plugs.next, path)?;
        let _scope = context.set(LOOP_INDEX, iterations - 1).scope();
        pull(graph, plug)
    }
}

impl NodeBehavior for Loop {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn initialize(&mut self, graph: &mut Graph, node: Uuid) -> Result<(), GraphError> {
        self.base.initialize(graph, node)?;
        if !self.setup_plugs(graph, node)? {
            self.state = LoopState::Pending(graph.subscribe_child_added(node)?);
            debug!("Loop {} waiting for in and out", graph.full_name(node));
        }
        Ok(())
    }

    fn affects(&self, graph: &Graph, node: Uuid, input: Uuid, outputs: &mut Vec<Uuid>) {
        self.base.affects(graph, node, input, outputs);
        let Some(plugs) = self.plugs() else {
            return;
        };

        if input == plugs.iterations {
            outputs.extend(graph.leaf_plugs(plugs.out_plug));
            return;
        }
        let Some((ancestor, path)) = graph.ancestor_plug(node, input) else {
            return;
        };
        if ancestor == plugs.in_plug || ancestor == plugs.next {
            for mirror in [plugs.out_plug, plugs.previous] {
                if let Ok(plug) = graph.descendant(mirror, &path) {
                    outputs.push(plug);
                }
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
        match self.route(graph, node, output, context, Graph::hash) {
            Some(result) => result,
            None => self.base.hash(graph, node, output, context),
        }
    }

    fn compute(
        &self,
        graph: &Graph,
        node: Uuid,
        output: Uuid,
        context: &Context,
    ) -> Result<Value, GraphError> {
        match self.route(graph, node, output, context, Graph::get_value) {
            Some(result) => result,
            None => self.base.compute(graph, node, output, context),
        }
    }

    fn child_added(&mut self, graph: &mut Graph, node: Uuid, child: Uuid) -> Result<(), GraphError> {
        self.base.child_added(graph, node, child)?;
        if matches!(self.state, LoopState::Pending(_)) {
            self.setup_plugs(graph, node)?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
