//! Tool system: descriptors, registry and execution.

pub mod arguments;
pub mod executor;
pub mod registry;
pub mod result;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use executor::{ToolExecutor, ToolInterceptor};
pub use registry::ToolRegistry;
pub use result::ToolExecutionResult;
pub use tool::{ToolContext, ToolDescriptor};
pub use types::ParameterShape;
