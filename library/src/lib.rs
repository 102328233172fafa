//! Lazy, hash-memoized evaluation of plug graphs.
//!
//! Nodes own typed plugs arranged in an ownership tree. Plugs are wired into
//! a directed graph, pulled on demand under an evaluation [`Context`], and
//! memoized by content hash. The [`Loop`](node::Loop) node turns a feedback
//! connection into a bounded recursion driven by the context.

pub mod cache;
pub mod config;
pub mod description;
pub mod error;
pub mod evaluation;
pub mod graph;
pub mod model;
pub mod node;

pub use config::EngineConfig;
pub use description::{ConnectionDescription, GraphDescription, NodeDescription, PlugValueDescription};
pub use error::GraphError;
pub use evaluation::{Context, ContextScope, ContextValue, PlugHash, PlugHasher};
pub use graph::{ChildAddedSubscription, Graph};
pub use model::{Direction, PlugDefinition, PlugFlags, Value, ValueType};
pub use node::{Loop, NodeBehavior, NodeRegistry};
