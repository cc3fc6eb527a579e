//! Tool call parsing, fuzzy edits, command translation and tool dispatch.

pub mod config;
pub mod dispatcher;
pub mod edit;
pub mod executor;
pub mod fetch;
pub mod file;
pub mod git;
pub mod parser;
pub mod registry;
pub mod safety;
pub mod shell;
pub mod todo;
pub mod translate;

pub use config::{FetchConfig, ShellConfig, TodoConfig, ToolsConfig};
pub use dispatcher::{Confirm, ExecuteOptions, ToolArguments, ToolDispatcher};
pub use edit::{EditOutcome, LineEnding, MatchTier, apply_edit, apply_multi_edit};
pub use executor::{
    ToolError, ToolErrorKind, ToolEvent, ToolEventTx, ToolInvocation, ToolResult,
    truncate_tool_output,
};
pub use parser::parse_tool_calls;
pub use registry::{ToolDef, ToolRegistry};
pub use safety::{CommandRisk, classify, is_dangerous, is_safe};
pub use shell::{CommandExecution, ShellExecutor};
pub use translate::{Direction, Translator, translate};
