//! The graph arena: every node and plug lives in one ownership tree keyed by
//! id, with node behaviours stored alongside.

pub mod connection;
pub mod dirty;
pub mod signals;
pub mod tree;

use std::collections::HashMap;

use log::debug;
use uuid::Uuid;

use crate::cache::EvalCache;
use crate::config::EngineConfig;
use crate::error::GraphError;
use crate::model::{Component, ComponentKind, Direction, PlugData, PlugDefinition, Value, ValueType};
use crate::node::NodeBehavior;

pub use signals::ChildAddedSubscription;

pub struct Graph {
    root: Uuid,
    components: HashMap<Uuid, Component>,
    behaviors: HashMap<Uuid, Box<dyn NodeBehavior>>,
    /// Active child-added subscriptions, by parent.
    subscriptions: HashMap<Uuid, Vec<u64>>,
    next_subscription: u64,
    cache: EvalCache,
    config: EngineConfig,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let root = Component::new("root", ComponentKind::Root);
        let root_id = root.id;
        let mut components = HashMap::new();
        components.insert(root_id, root);
        Self {
            root: root_id,
            components,
            behaviors: HashMap::new(),
            subscriptions: HashMap::new(),
            next_subscription: 0,
            cache: EvalCache::new(config.value_cache_capacity, config.hash_cache_contexts_per_plug),
            config,
        }
    }

    /// The top-level container that owns every node.
    pub fn root(&self) -> Uuid {
        self.root
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &EvalCache {
        &self.cache
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.components.contains_key(&id)
    }

    pub fn component(&self, id: Uuid) -> Option<&Component> {
        self.components.get(&id)
    }

    pub(crate) fn component_ref(&self, id: Uuid) -> Result<&Component, GraphError> {
        self.components
            .get(&id)
            .ok_or_else(|| GraphError::not_found(format!("component {}", id)))
    }

    pub(crate) fn component_mut(&mut self, id: Uuid) -> Result<&mut Component, GraphError> {
        self.components
            .get_mut(&id)
            .ok_or_else(|| GraphError::not_found(format!("component {}", id)))
    }

    pub fn is_plug(&self, id: Uuid) -> bool {
        self.components.get(&id).is_some_and(Component::is_plug)
    }

    pub fn is_node(&self, id: Uuid) -> bool {
        self.components.get(&id).is_some_and(Component::is_node)
    }

    pub fn plug(&self, id: Uuid) -> Result<&PlugData, GraphError> {
        self.component_ref(id)?
            .as_plug()
            .ok_or_else(|| GraphError::not_found(format!("plug {}", id)))
    }

    pub(crate) fn plug_mut(&mut self, id: Uuid) -> Result<&mut PlugData, GraphError> {
        self.component_mut(id)?
            .as_plug_mut()
            .ok_or_else(|| GraphError::not_found(format!("plug {}", id)))
    }

    /// The node owning `plug`, however deeply nested.
    pub fn node_of(&self, plug: Uuid) -> Option<Uuid> {
        let mut current = self.components.get(&plug)?.parent;
        while let Some(id) = current {
            let component = self.components.get(&id)?;
            if component.is_node() {
                return Some(id);
            }
            current = component.parent;
        }
        None
    }

    pub fn behavior(&self, node: Uuid) -> Option<&dyn NodeBehavior> {
        self.behaviors.get(&node).map(|b| b.as_ref())
    }

    /// Downcast a node's behaviour to its concrete type.
    pub fn behavior_as<T: NodeBehavior>(&self, node: Uuid) -> Option<&T> {
        self.behavior(node)?.as_any().downcast_ref::<T>()
    }

    /// Create a node under `parent` and let its behaviour build its plugs.
    pub fn add_node(
        &mut self,
        parent: Uuid,
        name: &str,
        mut behavior: Box<dyn NodeBehavior>,
    ) -> Result<Uuid, GraphError> {
        tree::validate_name(name)?;
        let component = Component::new(
            name,
            ComponentKind::Node {
                type_name: behavior.type_name().to_string(),
            },
        );
        let id = component.id;
        self.components.insert(id, component);
        if let Err(e) = self.add_child(parent, id) {
            self.components.remove(&id);
            return Err(e);
        }

        if let Err(e) = behavior.initialize(self, id) {
            self.remove_child(parent, id)?;
            return Err(e);
        }
        debug!("Added node {} ({})", name, behavior.type_name());
        self.behaviors.insert(id, behavior);
        Ok(id)
    }

    /// Create a plug (and its children) from a definition under a node or
    /// compound plug.
    pub fn add_plug(&mut self, parent: Uuid, definition: PlugDefinition) -> Result<Uuid, GraphError> {
        let id = self.create_plug(&definition)?;
        if let Err(e) = self.add_child(parent, id) {
            self.destroy_subtree(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Build a detached plug subtree.
    fn create_plug(&mut self, definition: &PlugDefinition) -> Result<Uuid, GraphError> {
        tree::validate_name(&definition.name)?;
        let mut data = PlugData::from_definition(definition);
        if definition.value_type == ValueType::Compound {
            data.default = Value::default_for(ValueType::Compound);
        } else {
            if !definition.children.is_empty() {
                return Err(GraphError::invalid_argument(format!(
                    "plug {} has children but is not compound",
                    definition.name
                )));
            }
            let found = definition.default.value_type();
            data.default = definition
                .default
                .clone()
                .coerce(definition.value_type)
                .ok_or_else(|| GraphError::type_mismatch(definition.value_type, found))?;
        }

        let component = Component::new(&definition.name, ComponentKind::Plug(data));
        let id = component.id;
        self.components.insert(id, component);
        for child in &definition.children {
            let result = self
                .check_unique_name(id, &child.name, None)
                .and_then(|_| self.create_plug(child));
            match result {
                Ok(child_id) => self.link_child(id, child_id),
                Err(e) => {
                    self.destroy_subtree(id);
                    return Err(e);
                }
            }
        }
        Ok(id)
    }

    /// Store a value on an input plug, clamping integers into range, and
    /// propagate dirtiness. Returns the dirtied plugs.
    pub fn set_value(&mut self, plug: Uuid, value: impl Into<Value>) -> Result<Vec<Uuid>, GraphError> {
        let value = value.into();
        let data = self.plug(plug)?;
        if data.direction() != Direction::In {
            return Err(GraphError::invalid_argument(format!(
                "{} is not an input plug",
                self.full_name(plug)
            )));
        }
        if data.value_type() == ValueType::Compound {
            let fields = match value {
                Value::Compound(fields) => fields,
                other => return Err(GraphError::type_mismatch(ValueType::Compound, other.value_type())),
            };
            let mut dirtied = Vec::new();
            for (name, field) in fields {
                let child = self
                    .child(plug, &name)
                    .ok_or_else(|| GraphError::not_found(format!("{}.{}", self.full_name(plug), name)))?;
                dirtied.extend(self.set_value(child, field)?);
            }
            return Ok(dirtied);
        }

        let found = value.value_type();
        let value = value
            .coerce(data.value_type())
            .ok_or_else(|| GraphError::type_mismatch(data.value_type(), found))?;
        let value = data.clamp(value);
        self.plug_mut(plug)?.value = Some(value);
        Ok(self.propagate_dirtiness(plug))
    }

    /// The value stored on a plug, ignoring connections. Compound plugs
    /// gather their children.
    pub fn stored_value(&self, plug: Uuid) -> Result<Value, GraphError> {
        let component = self.component_ref(plug)?;
        let data = self.plug(plug)?;
        if data.value_type() != ValueType::Compound {
            return Ok(data.stored_value());
        }
        component
            .children
            .iter()
            .map(|child| Ok((self.name(*child).to_string(), self.stored_value(*child)?)))
            .collect::<Result<Vec<_>, GraphError>>()
            .map(Value::Compound)
    }

    /// Reconstruct the definition a plug was built from, with current flags.
    pub fn plug_definition(&self, plug: Uuid) -> Result<PlugDefinition, GraphError> {
        let component = self.component_ref(plug)?;
        let data = self.plug(plug)?;
        let children = component
            .children
            .iter()
            .map(|child| self.plug_definition(*child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PlugDefinition {
            name: component.name.clone(),
            direction: data.direction(),
            value_type: data.value_type(),
            default: data.default_value().clone(),
            min: data.min(),
            max: data.max(),
            flags: data.flags(),
            children,
        })
    }

    /// A definition with the same shape as `plug`, renamed and redirected.
    /// The copy is never dynamic.
    pub fn create_counterpart(
        &self,
        plug: Uuid,
        name: &str,
        direction: Direction,
    ) -> Result<PlugDefinition, GraphError> {
        Ok(self
            .plug_definition(plug)?
            .with_name(name)
            .with_direction(direction)
            .map_flags(|f| f.dynamic = false))
    }
}
