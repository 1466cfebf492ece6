pub mod cancel;
pub mod event;
#[path = "loop.rs"]
pub mod agent_loop;
pub mod stream;
pub mod tool;
pub mod tools;

pub use agent_loop::{
    continue_existing, run, AgentEventStream, LoopConfig, LoopContext, LoopError, QueueDrainMode,
    QueueFn,
};
pub use cancel::{CancellationSource, CancellationToken};
pub use event::{AgentEvent, DisplayBody, ToolCallDisplay, ToolResultDisplay};
pub use stream::{BoxStream, StreamEvent, StreamFn, StreamRequest, TransformContextFn};
pub use tool::{OnToolUpdate, Tool, ToolOutput};
pub use tools::{BashTool, EditTool, ReadTool, WriteTool};

use std::path::PathBuf;

use tool::ErasedTool;

/// The four filesystem/shell tools every coding-agent session registers by
/// default (spec's named tool set). Boxed here, inside the crate that can
/// still name `ErasedTool`, so a caller elsewhere in the workspace (e.g.
/// `corvid-controller`) gets back an opaque, ready-to-use registry without
/// ever needing to spell out the erasure trait itself.
pub fn default_toolset(cwd: PathBuf) -> Vec<Box<dyn ErasedTool>> {
    vec![
        Box::new(ReadTool::new(cwd.clone())),
        Box::new(WriteTool::new(cwd.clone())),
        Box::new(EditTool::new(cwd.clone())),
        Box::new(BashTool::new(cwd)),
    ]
}

/// System prompt for a coding-assistant session, naming whichever tools are
/// actually active. Regenerated by the controller whenever the active tool
/// set changes (`set_active_tools_by_name`) so the model is never told
/// about a tool it can't currently call.
pub fn system_prompt(cwd: &std::path::Path, tool_names: &[String]) -> String {
    let tools = if tool_names.is_empty() {
        "no tools".to_string()
    } else {
        tool_names.join(", ")
    };
    format!(
        "You are a coding assistant operating in {}. You have access to \
         the following tools: {tools}. Use them to inspect and modify files \
         and run commands. Make focused, minimal changes and verify your \
         work before reporting it done.",
        cwd.display()
    )
}

/// Convenience: a [`LoopConfig`] wired to the default tool set and a
/// cwd-derived system prompt, with no steering/follow-up queues or context
/// transform — callers that need those (typically `corvid-controller`)
/// build a `LoopConfig` directly instead.
pub fn default_loop_config(
    cwd: PathBuf,
    provider: impl Into<String>,
    model_id: impl Into<String>,
) -> LoopConfig {
    LoopConfig::new(default_toolset(cwd), provider, model_id)
}
