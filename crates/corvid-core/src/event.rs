//! Agent events — the render-oriented protocol from the agent loop to a
//! frontend, mirroring the taxonomy `agent_loop.py`'s `AgentEvent*` dataclasses
//! push onto its event stream.

use corvid_llm::Message;

/// Structured content for display. Frontends can use this to apply syntax
/// highlighting, diff rendering, etc.
#[derive(Debug, Clone)]
pub enum DisplayBody {
    /// Plain text.
    Text(String),
    /// Code with an optional language hint for syntax highlighting.
    Code {
        language: Option<String>,
        content: String,
    },
}

/// How to display a tool invocation (the input side) to the user.
#[derive(Debug, Clone)]
pub struct ToolCallDisplay {
    /// Short summary, e.g. "Read src/main.rs", "Run `cargo build`".
    pub title: String,
    /// Optional expanded content (e.g. the command, the file content to write).
    pub body: Option<DisplayBody>,
}

/// How to display a tool result (the output side) to the user.
#[derive(Debug, Clone)]
pub struct ToolResultDisplay {
    /// Short summary, e.g. "55 lines", "exit code 0".
    pub title: String,
    /// Optional expanded content (e.g. file contents, command output).
    pub body: Option<DisplayBody>,
}

/// The full event taxonomy a running or resumed agent loop emits. A
/// frontend (or `corvid-controller`, in front of one) consumes these to
/// update UI state and to route post-turn checks (retry, compaction)
/// without re-deriving loop state itself.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// The loop has started (fires once, before the first `TurnStart`).
    AgentStart,
    /// A new turn (one assistant streaming response plus any tool calls it
    /// makes) is beginning.
    TurnStart,
    /// A message entered `context.messages` — a queued user/steering
    /// message, the just-started assistant streaming message, or a tool
    /// result.
    MessageStart { message: Message },
    /// The assistant's in-progress message was replaced by an updated
    /// partial (new text/thinking/tool-call content accumulated).
    MessageUpdate { message: Message },
    /// A message reached its terminal state. For the assistant message this
    /// carries its final `stop_reason`/`usage`; user and tool messages reach
    /// this immediately after `MessageStart`.
    MessageEnd { message: Message },
    /// A tool call is about to execute (or was identified as unknown).
    ToolStart {
        id: String,
        name: String,
        display: ToolCallDisplay,
    },
    /// A tool reported incremental progress while running.
    ToolUpdate {
        id: String,
        name: String,
        partial_result: ToolResultDisplay,
    },
    /// A tool call finished, was skipped due to queued steering messages, or
    /// failed.
    ToolEnd {
        id: String,
        name: String,
        display: ToolResultDisplay,
        is_error: bool,
    },
    /// A turn completed: the assistant message plus whatever tool results it
    /// produced (empty if the assistant made no tool calls, or ended in
    /// `error`/`aborted`).
    TurnEnd {
        assistant_msg: Message,
        tool_results: Vec<Message>,
    },
    /// The loop is done — drained pending/follow-up messages, or terminated
    /// on error/abort/cancellation. Carries every message appended to
    /// context during this run, in order.
    AgentEnd { all_new_messages: Vec<Message> },
}
