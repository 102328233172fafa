//! Plug model: the typed input/output slots of nodes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value::{Value, ValueType};

/// Direction of a plug.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::In => write!(f, "in"),
            Direction::Out => write!(f, "out"),
        }
    }
}

/// Behavioural flags carried by a plug.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct PlugFlags {
    /// Created by the user rather than by the node type; descriptions must
    /// recreate it.
    pub dynamic: bool,
    /// Stored value is written into graph descriptions.
    pub serialisable: bool,
    /// The plug may receive an input connection.
    pub accepts_inputs: bool,
    /// Edges touching this plug are exempt from static cycle detection.
    pub accepts_dependency_cycles: bool,
}

impl Default for PlugFlags {
    fn default() -> Self {
        Self {
            dynamic: false,
            serialisable: true,
            accepts_inputs: true,
            accepts_dependency_cycles: false,
        }
    }
}

/// Definition of a plug (and, for compound plugs, its children).
///
/// Node types build their plugs from definitions, and graph descriptions
/// store dynamic plugs as definitions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlugDefinition {
    pub name: String,
    pub direction: Direction,
    pub value_type: ValueType,
    pub default: Value,
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
    #[serde(default)]
    pub flags: PlugFlags,
    #[serde(default)]
    pub children: Vec<PlugDefinition>,
}

impl PlugDefinition {
    pub fn new(name: &str, direction: Direction, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            direction,
            value_type,
            default: Value::default_for(value_type),
            min: None,
            max: None,
            flags: PlugFlags::default(),
            children: Vec::new(),
        }
    }

    pub fn input(name: &str, value_type: ValueType) -> Self {
        Self::new(name, Direction::In, value_type)
    }

    pub fn output(name: &str, value_type: ValueType) -> Self {
        Self::new(name, Direction::Out, value_type)
    }

    /// A compound plug owning `children`. Children take the parent's direction.
    pub fn compound(name: &str, direction: Direction, children: Vec<PlugDefinition>) -> Self {
        let mut def = Self::new(name, direction, ValueType::Compound);
        def.children = children;
        def.with_direction(direction)
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn with_min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_flags(mut self, flags: PlugFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Mark as a user-created plug.
    pub fn dynamic(self) -> Self {
        self.map_flags(|f| f.dynamic = true)
    }

    /// Rename, keeping everything else.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the direction of this plug and every descendant.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self.children = self
            .children
            .into_iter()
            .map(|c| c.with_direction(direction))
            .collect();
        self
    }

    /// Apply `f` to the flags of this plug and every descendant.
    pub fn map_flags(mut self, f: impl Fn(&mut PlugFlags) + Copy) -> Self {
        f(&mut self.flags);
        self.children = self.children.into_iter().map(|c| c.map_flags(f)).collect();
        self
    }
}

/// Runtime state of a plug living in a graph.
#[derive(Clone, Debug, PartialEq)]
pub struct PlugData {
    pub(crate) direction: Direction,
    pub(crate) value_type: ValueType,
    pub(crate) flags: PlugFlags,
    pub(crate) default: Value,
    pub(crate) min: Option<i64>,
    pub(crate) max: Option<i64>,
    /// Stored value of an input plug. `None` means "use the default".
    pub(crate) value: Option<Value>,
    /// Source plug, if connected.
    pub(crate) input: Option<Uuid>,
    /// Plugs that take this plug as their input.
    pub(crate) outputs: Vec<Uuid>,
    pub(crate) dirty_count: u64,
}

impl PlugData {
    pub(crate) fn from_definition(def: &PlugDefinition) -> Self {
        Self {
            direction: def.direction,
            value_type: def.value_type,
            flags: def.flags,
            default: def.default.clone(),
            min: def.min,
            max: def.max,
            value: None,
            input: None,
            outputs: Vec::new(),
            dirty_count: 0,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn flags(&self) -> PlugFlags {
        self.flags
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn min(&self) -> Option<i64> {
        self.min
    }

    pub fn max(&self) -> Option<i64> {
        self.max
    }

    pub fn input(&self) -> Option<Uuid> {
        self.input
    }

    pub fn outputs(&self) -> &[Uuid] {
        &self.outputs
    }

    /// Number of times this plug has been dirtied.
    pub fn dirty_count(&self) -> u64 {
        self.dirty_count
    }

    pub fn accepts_dependency_cycles(&self) -> bool {
        self.flags.accepts_dependency_cycles
    }

    /// Stored value, falling back to the default.
    pub(crate) fn stored_value(&self) -> Value {
        self.value.clone().unwrap_or_else(|| self.default.clone())
    }

    /// Clamp integers into `[min, max]`.
    pub(crate) fn clamp(&self, value: Value) -> Value {
        match value {
            Value::Int(mut v) => {
                if let Some(min) = self.min {
                    v = v.max(min);
                }
                if let Some(max) = self.max {
                    v = v.min(max);
                }
                Value::Int(v)
            }
            other => other,
        }
    }
}
