pub mod context;
pub mod engine;
pub mod hash;

pub use context::{Context, ContextScope, ContextValue, FRAME};
pub use hash::{PlugHash, PlugHasher};
