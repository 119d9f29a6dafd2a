//! Static and dynamic evaluation contexts.

mod config;
mod dynamic_context;
mod registry;
mod static_context;

pub use config::{ConfigError, StaticContextConfig};
pub use dynamic_context::{CallingContext, DynamicContext, DynamicContextBuilder};
pub use registry::StaticContextRegistry;
pub use static_context::{LexicalName, StaticContext, StaticContextBuilder};
