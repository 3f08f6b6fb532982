pub mod echo;
pub mod executor;
pub mod exit_loop;
pub mod function;
pub mod registry;
pub mod schema;

pub use echo::EchoTool;
pub use executor::{normalize, ToolInvoker, ToolResult};
pub use exit_loop::{ExitLoopTool, EXIT_LOOP_TOOL};
pub use function::FunctionTool;
pub use registry::{Tool, ToolContext, ToolRegistry, ToolSchema};
pub use schema::{typed_schema, validate_args};
