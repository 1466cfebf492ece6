use corvid_llm::Describe;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::event::{ToolCallDisplay, ToolResultDisplay};

/// Callback a tool can invoke while running to report incremental progress
/// (spec's tool callback contract — surfaced to the frontend as
/// `AgentEvent::ToolUpdate`).
pub type OnToolUpdate = Arc<dyn Fn(ToolResultDisplay) + Send + Sync>;

/// A structured tool result, convertible into the plain-text form a
/// language model actually sees.
pub trait ToolOutput {
    fn to_llm(&self) -> String;
}

/// A callable tool with typed input and structured output. Implement this
/// to register a tool with the agent loop.
///
/// `Input`/`Output` split the JSON the model sends from the text it reads
/// back, so `render_input`/`render_output` can build a richer UI
/// presentation (e.g. syntax-highlighted file contents) from the same
/// values without re-parsing anything.
///
/// Tools must be `Clone` so the erasure layer can clone them before calling
/// `async fn call` — this avoids the borrow-across-await problem without
/// requiring manual `Box::pin`.
pub trait Tool: Clone + Send + Sync + 'static {
    type Input: Describe + DeserializeOwned + Clone + Send;
    type Output: ToolOutput;

    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// Run the tool. `cancel` mirrors the cancellation token threaded
    /// through the owning agent loop — long-running tools (`bash`) should
    /// race their work against it. `on_update` lets a tool stream partial
    /// output before it finishes.
    fn call(
        &self,
        input: Self::Input,
        cancel: CancellationToken,
        on_update: OnToolUpdate,
    ) -> impl Future<Output = Result<Self::Output, corvid_llm::Error>> + Send;

    fn render_input(&self, input: &Self::Input) -> ToolCallDisplay;
    fn render_output(&self, input: &Self::Input, output: &Self::Output) -> ToolResultDisplay;
}

// ---------------------------------------------------------------------------
// Type erasure
// ---------------------------------------------------------------------------

/// The outcome of running an erased tool: both the plain-text form a
/// language model consumes and the rendered display a frontend shows,
/// produced together so the loop never has to re-derive one from the other.
pub struct ToolExecution {
    pub content: String,
    pub is_error: bool,
    pub display: ToolResultDisplay,
}

/// Object-safe, type-erased wrapper around a [`Tool`].
///
/// The returned future from `execute` is `'static` — it does not borrow
/// `self`, which lets callers drop locks before awaiting.
pub(crate) trait ErasedTool: Send + Sync {
    fn name(&self) -> &str;
    fn definition(&self) -> corvid_llm::Tool;

    /// Render a tool call's arguments for display before it runs. Returns
    /// the raw parse error (as text) if the model's JSON doesn't match the
    /// tool's input schema.
    fn render_input(&self, arguments: &str) -> Result<ToolCallDisplay, String>;

    fn execute(
        &self,
        arguments: &str,
        cancel: CancellationToken,
        on_update: OnToolUpdate,
    ) -> Pin<Box<dyn Future<Output = ToolExecution> + Send>>;

    /// Clone the underlying tool into a fresh trait object. `Tool: Clone`
    /// makes this infallible; it's what lets a registry filtered down to
    /// an active subset (`set_active_tools_by_name`) hold independent
    /// copies rather than references into the full registry.
    fn clone_box(&self) -> Box<dyn ErasedTool>;
}

impl<T: Tool> ErasedTool for T {
    fn clone_box(&self) -> Box<dyn ErasedTool> {
        Box::new(self.clone())
    }

    fn name(&self) -> &str {
        Tool::name(self)
    }

    fn definition(&self) -> corvid_llm::Tool {
        corvid_llm::Tool {
            name: Tool::name(self).to_string(),
            description: Tool::description(self).to_string(),
            parameters: T::Input::describe(),
        }
    }

    fn render_input(&self, arguments: &str) -> Result<ToolCallDisplay, String> {
        let input: T::Input = serde_json::from_str(arguments).map_err(|e| e.to_string())?;
        Ok(Tool::render_input(self, &input))
    }

    fn execute(
        &self,
        arguments: &str,
        cancel: CancellationToken,
        on_update: OnToolUpdate,
    ) -> Pin<Box<dyn Future<Output = ToolExecution> + Send>> {
        let parsed: Result<T::Input, serde_json::Error> = serde_json::from_str(arguments);
        // Clone self so the future is 'static and doesn't borrow from the
        // tool registry. This is why Tool requires Clone.
        let this = self.clone();
        Box::pin(async move {
            let input = match parsed {
                Ok(input) => input,
                Err(e) => {
                    let message = format!("invalid arguments: {e}");
                    return ToolExecution {
                        content: message.clone(),
                        is_error: true,
                        display: ToolResultDisplay {
                            title: message,
                            body: None,
                        },
                    };
                }
            };
            match this.call(input.clone(), cancel, on_update).await {
                Ok(output) => {
                    let display = this.render_output(&input, &output);
                    ToolExecution {
                        content: output.to_llm(),
                        is_error: false,
                        display,
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    ToolExecution {
                        content: message.clone(),
                        is_error: true,
                        display: ToolResultDisplay {
                            title: message,
                            body: None,
                        },
                    }
                }
            }
        })
    }
}
