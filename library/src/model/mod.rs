//! Data model: ownership-tree components, plugs and values.

pub mod component;
pub mod plug;
pub mod value;

pub use component::{Component, ComponentKind};
pub use plug::{Direction, PlugData, PlugDefinition, PlugFlags};
pub use value::{Value, ValueType};
