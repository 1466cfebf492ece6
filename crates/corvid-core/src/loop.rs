//! The agent loop: spec's §4.2 state machine. One "turn" is a single
//! assistant streaming response plus whatever tool calls it makes; the loop
//! keeps taking turns while there are unexecuted tool calls or queued
//! messages, and only stops for good once a follow-up poll also comes back
//! empty. Grounded on `agent_loop.py`'s `agent_loop`/`agent_loop_continue`/
//! `_run_loop`/`_stream_assistant_response`/`_execute_tool_calls`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use corvid_llm::{AssistantPart, Message, StopReason, ToolCallPart};
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::cancel::CancellationToken;
use crate::event::{AgentEvent, ToolCallDisplay, ToolResultDisplay};
use crate::stream::{StreamEvent, StreamFn, StreamRequest, TransformContextFn};
use crate::tool::{ErasedTool, OnToolUpdate};

/// Errors raised synchronously, before a loop run even starts.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("cannot continue an empty context")]
    EmptyContext,
    #[error("cannot continue a context whose last message is already an assistant message")]
    LastMessageIsAssistant,
}

/// A queued-message source: steering messages arriving mid-turn, or
/// follow-up messages polled once the inner loop is otherwise idle. Both
/// are plain callbacks rather than channels so a caller can back them with
/// whatever queue it likes (an mpsc receiver, a session's pending list, …).
pub type QueueFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Vec<Message>> + Send>> + Send + Sync>;

/// Whether an initial steering-message drain (the one before the very first
/// turn) takes everything queued or just the head of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueDrainMode {
    OneAtATime,
    All,
}

/// The conversation state a loop run operates over. Deliberately thin:
/// callers own persistence (appending to a session journal, say) by
/// inspecting the events a run emits rather than this struct.
#[derive(Debug, Clone, Default)]
pub struct LoopContext {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
}

/// Everything about *how* a run behaves that isn't part of the
/// conversation itself.
#[derive(Clone)]
pub struct LoopConfig {
    pub tools: Arc<Vec<Box<dyn ErasedTool>>>,
    pub provider: String,
    pub model_id: String,
    pub steering: Option<QueueFn>,
    pub follow_up: Option<QueueFn>,
    pub steering_mode: QueueDrainMode,
    pub transform_context: Option<TransformContextFn>,
}

impl LoopConfig {
    pub fn new(tools: Vec<Box<dyn ErasedTool>>, provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            tools: Arc::new(tools),
            provider: provider.into(),
            model_id: model_id.into(),
            steering: None,
            follow_up: None,
            steering_mode: QueueDrainMode::All,
            transform_context: None,
        }
    }

    /// Names of every tool currently registered, in registration order.
    /// Lets a caller outside this crate (`corvid-controller`'s
    /// `set_active_tools_by_name`) know what's available without naming
    /// `ErasedTool` itself.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// Rebuild `self.tools` from `all`, keeping only the tools named in
    /// `names` and preserving `all`'s order (not `names`'s). Unknown names
    /// are silently ignored, matching `set_active_tools_by_name`'s
    /// filter-don't-fail behavior in `agent_session.py`. Passing an empty
    /// `names` clears the active set entirely.
    pub fn with_active_tools(mut self, all: &Arc<Vec<Box<dyn ErasedTool>>>, names: &[String]) -> Self {
        let active: Vec<Box<dyn ErasedTool>> = all
            .iter()
            .filter(|t| names.iter().any(|n| n == t.name()))
            .map(|t| t.clone_box())
            .collect();
        self.tools = Arc::new(active);
        self
    }
}

/// A running (or already-finished) loop's event stream.
pub struct AgentEventStream {
    rx: mpsc::Receiver<AgentEvent>,
}

impl AgentEventStream {
    pub async fn next(&mut self) -> Option<AgentEvent> {
        self.rx.recv().await
    }
}

/// Start a fresh run: append `prompts` to `context` and take turns until the
/// loop goes idle. Mirrors `agent_loop(context, prompts, config)`.
pub fn run(
    prompts: Vec<Message>,
    context: LoopContext,
    config: LoopConfig,
    cancel: CancellationToken,
    stream_fn: StreamFn,
) -> AgentEventStream {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut ctx = context;
        let mut new_messages = prompts.clone();

        if tx.send(AgentEvent::AgentStart).await.is_err() {
            return;
        }
        if tx.send(AgentEvent::TurnStart).await.is_err() {
            return;
        }
        for prompt in &prompts {
            if tx
                .send(AgentEvent::MessageStart {
                    message: prompt.clone(),
                })
                .await
                .is_err()
            {
                return;
            }
            if tx
                .send(AgentEvent::MessageEnd {
                    message: prompt.clone(),
                })
                .await
                .is_err()
            {
                return;
            }
            ctx.messages.push(prompt.clone());
        }

        run_loop(ctx, &mut new_messages, config, cancel, stream_fn, tx).await;
    });
    AgentEventStream { rx }
}

/// Resume an existing context whose last message is a user/tool message
/// (i.e. the assistant hasn't replied to it yet). Mirrors
/// `agent_loop_continue(context, config)`.
pub fn continue_existing(
    context: LoopContext,
    config: LoopConfig,
    cancel: CancellationToken,
    stream_fn: StreamFn,
) -> Result<AgentEventStream, LoopError> {
    if context.messages.is_empty() {
        return Err(LoopError::EmptyContext);
    }
    if matches!(context.messages.last(), Some(Message::Assistant { .. })) {
        return Err(LoopError::LastMessageIsAssistant);
    }

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let ctx = context;
        let mut new_messages = Vec::new();

        if tx.send(AgentEvent::AgentStart).await.is_err() {
            return;
        }
        if tx.send(AgentEvent::TurnStart).await.is_err() {
            return;
        }

        run_loop(ctx, &mut new_messages, config, cancel, stream_fn, tx).await;
    });
    Ok(AgentEventStream { rx })
}

/// The body of `_run_loop`: assumes the caller already emitted `AgentStart`
/// and the first `TurnStart`.
async fn run_loop(
    mut ctx: LoopContext,
    new_messages: &mut Vec<Message>,
    config: LoopConfig,
    cancel: CancellationToken,
    stream_fn: StreamFn,
    tx: mpsc::Sender<AgentEvent>,
) {
    let mut pending = drain_queue(&config.steering, config.steering_mode).await;
    let mut first_turn = true;

    'outer: loop {
        let mut has_more_tool_calls = true;

        while has_more_tool_calls || !pending.is_empty() {
            if first_turn {
                first_turn = false;
            } else if tx.send(AgentEvent::TurnStart).await.is_err() {
                return;
            }

            for msg in pending.drain(..) {
                if tx
                    .send(AgentEvent::MessageStart {
                        message: msg.clone(),
                    })
                    .await
                    .is_err()
                {
                    return;
                }
                if tx
                    .send(AgentEvent::MessageEnd {
                        message: msg.clone(),
                    })
                    .await
                    .is_err()
                {
                    return;
                }
                ctx.messages.push(msg.clone());
                new_messages.push(msg);
            }

            if cancel.is_cancelled() {
                let aborted = aborted_message(&config.provider, &config.model_id, now_ms());
                ctx.messages.push(aborted.clone());
                new_messages.push(aborted.clone());
                let _ = tx
                    .send(AgentEvent::MessageStart {
                        message: aborted.clone(),
                    })
                    .await;
                let _ = tx
                    .send(AgentEvent::MessageEnd {
                        message: aborted.clone(),
                    })
                    .await;
                let _ = tx
                    .send(AgentEvent::TurnEnd {
                        assistant_msg: aborted,
                        tool_results: vec![],
                    })
                    .await;
                let _ = tx
                    .send(AgentEvent::AgentEnd {
                        all_new_messages: std::mem::take(new_messages),
                    })
                    .await;
                return;
            }

            let assistant =
                match stream_assistant_response(&mut ctx, &config, &cancel, &stream_fn, &tx).await {
                    Some(message) => message,
                    None => {
                        let _ = tx
                            .send(AgentEvent::AgentEnd {
                                all_new_messages: std::mem::take(new_messages),
                            })
                            .await;
                        return;
                    }
                };
            new_messages.push(assistant.clone());

            let stop_reason = match &assistant {
                Message::Assistant { stop_reason, .. } => *stop_reason,
                _ => StopReason::Stop,
            };

            if matches!(stop_reason, StopReason::Error | StopReason::Aborted) {
                let _ = tx
                    .send(AgentEvent::TurnEnd {
                        assistant_msg: assistant,
                        tool_results: vec![],
                    })
                    .await;
                let _ = tx
                    .send(AgentEvent::AgentEnd {
                        all_new_messages: std::mem::take(new_messages),
                    })
                    .await;
                return;
            }

            let tool_calls = tool_calls_of(&assistant);
            has_more_tool_calls = !tool_calls.is_empty();

            let mut tool_results = Vec::new();
            let mut steering_after_tools = None;
            if has_more_tool_calls {
                let Some((results, steering)) =
                    execute_tool_calls(&config, &tool_calls, &cancel, &tx).await
                else {
                    return;
                };
                for result in &results {
                    ctx.messages.push(result.clone());
                    new_messages.push(result.clone());
                }
                tool_results = results;
                steering_after_tools = steering;
            }

            if tx
                .send(AgentEvent::TurnEnd {
                    assistant_msg: assistant,
                    tool_results,
                })
                .await
                .is_err()
            {
                return;
            }

            pending = match steering_after_tools {
                Some(steering) => steering,
                None => drain_queue(&config.steering, QueueDrainMode::All).await,
            };

            if cancel.is_cancelled() {
                break 'outer;
            }
        }

        let follow_up = drain_queue(&config.follow_up, QueueDrainMode::All).await;
        if follow_up.is_empty() {
            break;
        }
        pending = follow_up;
    }

    let _ = tx
        .send(AgentEvent::AgentEnd {
            all_new_messages: std::mem::take(new_messages),
        })
        .await;
}

/// Stream one assistant turn, mirroring `_stream_assistant_response`:
/// repeatedly replace the last context message with the latest partial,
/// emitting `MessageStart` once and `MessageUpdate` per delta, finishing
/// with `MessageEnd` once `stream_fn` reports `Done`/`Error`. Returns
/// `None` only if the stream ended with no event at all (a malformed
/// `stream_fn`), in which case the run ends without a terminal message.
async fn stream_assistant_response(
    ctx: &mut LoopContext,
    config: &LoopConfig,
    cancel: &CancellationToken,
    stream_fn: &StreamFn,
    tx: &mpsc::Sender<AgentEvent>,
) -> Option<Message> {
    let mut messages_for_llm = ctx.messages.clone();
    if let Some(transform) = &config.transform_context {
        messages_for_llm = transform(messages_for_llm, cancel.clone()).await;
    }
    messages_for_llm.retain(Message::is_llm_visible);

    let request = StreamRequest {
        system_prompt: ctx.system_prompt.clone(),
        messages: messages_for_llm,
        tools: config.tools.iter().map(|t| t.definition()).collect(),
    };

    let mut stream = stream_fn(request, cancel.clone());
    let mut started = false;
    let mut last_partial: Option<Message> = None;

    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::Start { partial } => {
                ctx.messages.push(partial.clone());
                started = true;
                last_partial = Some(partial.clone());
                if tx
                    .send(AgentEvent::MessageStart { message: partial })
                    .await
                    .is_err()
                {
                    return None;
                }
            }
            StreamEvent::Delta { partial } => {
                if started {
                    *ctx.messages.last_mut().expect("started pushed one") = partial.clone();
                } else {
                    ctx.messages.push(partial.clone());
                    started = true;
                    if tx
                        .send(AgentEvent::MessageStart {
                            message: partial.clone(),
                        })
                        .await
                        .is_err()
                    {
                        return None;
                    }
                }
                last_partial = Some(partial.clone());
                if tx
                    .send(AgentEvent::MessageUpdate { message: partial })
                    .await
                    .is_err()
                {
                    return None;
                }
            }
            StreamEvent::Done { message } | StreamEvent::Error { message } => {
                if started {
                    *ctx.messages.last_mut().expect("started pushed one") = message.clone();
                } else {
                    ctx.messages.push(message.clone());
                    if tx
                        .send(AgentEvent::MessageStart {
                            message: message.clone(),
                        })
                        .await
                        .is_err()
                    {
                        return None;
                    }
                }
                if tx
                    .send(AgentEvent::MessageEnd {
                        message: message.clone(),
                    })
                    .await
                    .is_err()
                {
                    return None;
                }
                return Some(message);
            }
        }
    }

    // Stream ended without a terminal event — treat as aborted if
    // cancellation was requested, otherwise surface whatever partial we
    // have (a misbehaving stream_fn, not expected in normal operation).
    let partial = last_partial?;
    if cancel.is_cancelled() {
        let aborted = aborted_message(&config.provider, &config.model_id, now_ms());
        *ctx.messages.last_mut().expect("started pushed one") = aborted.clone();
        let _ = tx
            .send(AgentEvent::MessageEnd {
                message: aborted.clone(),
            })
            .await;
        return Some(aborted);
    }
    let _ = tx
        .send(AgentEvent::MessageEnd {
            message: partial.clone(),
        })
        .await;
    Some(partial)
}

/// Execute one batch of tool calls in order, mirroring `_execute_tool_calls`.
/// After each execution re-polls steering; if messages are queued, every
/// remaining call in the batch is synthetically skipped
/// (`_skip_tool_call`) rather than run. Returns `None` if the event
/// channel closed mid-batch.
async fn execute_tool_calls(
    config: &LoopConfig,
    tool_calls: &[ToolCallPart],
    cancel: &CancellationToken,
    tx: &mpsc::Sender<AgentEvent>,
) -> Option<(Vec<Message>, Option<Vec<Message>>)> {
    let mut results = Vec::new();

    for (index, call) in tool_calls.iter().enumerate() {
        let tool = config.tools.iter().find(|t| t.name() == call.name);

        let call_display = match &tool {
            Some(t) => t.render_input(&call.arguments).unwrap_or_else(|e| ToolCallDisplay {
                title: format!("{}: {e}", call.name),
                body: None,
            }),
            None => ToolCallDisplay {
                title: format!("Unknown tool `{}`", call.name),
                body: None,
            },
        };
        tx.send(AgentEvent::ToolStart {
            id: call.id.clone(),
            name: call.name.clone(),
            display: call_display,
        })
        .await
        .ok()?;

        let execution = match &tool {
            Some(t) => {
                let tx_update = tx.clone();
                let update_id = call.id.clone();
                let update_name = call.name.clone();
                let on_update: OnToolUpdate = Arc::new(move |partial_result| {
                    let _ = tx_update.try_send(AgentEvent::ToolUpdate {
                        id: update_id.clone(),
                        name: update_name.clone(),
                        partial_result,
                    });
                });
                t.execute(&call.arguments, cancel.clone(), on_update).await
            }
            None => crate::tool::ToolExecution {
                content: format!("unknown tool: {}", call.name),
                is_error: true,
                display: ToolResultDisplay {
                    title: format!("unknown tool: {}", call.name),
                    body: None,
                },
            },
        };

        let crate::tool::ToolExecution {
            content,
            is_error,
            display: result_display,
        } = execution;
        tx.send(AgentEvent::ToolEnd {
            id: call.id.clone(),
            name: call.name.clone(),
            display: result_display,
            is_error,
        })
        .await
        .ok()?;

        let result_msg = Message::tool_result(call.id.clone(), call.name.clone(), content, is_error, now_ms());
        tx.send(AgentEvent::MessageStart {
            message: result_msg.clone(),
        })
        .await
        .ok()?;
        tx.send(AgentEvent::MessageEnd {
            message: result_msg.clone(),
        })
        .await
        .ok()?;
        results.push(result_msg);

        if let Some(steering_fn) = &config.steering {
            let steering = steering_fn().await;
            if !steering.is_empty() {
                for skipped in &tool_calls[index + 1..] {
                    let (msg, display) = skip_tool_call(skipped);
                    tx.send(AgentEvent::ToolStart {
                        id: skipped.id.clone(),
                        name: skipped.name.clone(),
                        display: ToolCallDisplay {
                            title: format!("{} (skipped)", skipped.name),
                            body: None,
                        },
                    })
                    .await
                    .ok()?;
                    tx.send(AgentEvent::ToolEnd {
                        id: skipped.id.clone(),
                        name: skipped.name.clone(),
                        display,
                        is_error: true,
                    })
                    .await
                    .ok()?;
                    tx.send(AgentEvent::MessageStart {
                        message: msg.clone(),
                    })
                    .await
                    .ok()?;
                    tx.send(AgentEvent::MessageEnd {
                        message: msg.clone(),
                    })
                    .await
                    .ok()?;
                    results.push(msg);
                }
                return Some((results, Some(steering)));
            }
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    Some((results, None))
}

/// Testable property #8 / scenario S3: a tool call that never runs because
/// a steering message arrived while its siblings in the same batch were
/// executing.
fn skip_tool_call(call: &ToolCallPart) -> (Message, ToolResultDisplay) {
    const SKIP_TEXT: &str = "Skipped due to queued user message.";
    let message = Message::tool_result(call.id.clone(), call.name.clone(), SKIP_TEXT, true, now_ms());
    let display = ToolResultDisplay {
        title: SKIP_TEXT.to_string(),
        body: None,
    };
    (message, display)
}

fn tool_calls_of(message: &Message) -> Vec<ToolCallPart> {
    match message {
        Message::Assistant { parts, .. } => parts
            .iter()
            .filter_map(|p| match p {
                AssistantPart::ToolCall(call) => Some(call.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

async fn drain_queue(queue: &Option<QueueFn>, mode: QueueDrainMode) -> Vec<Message> {
    let Some(queue) = queue else {
        return Vec::new();
    };
    let mut messages = queue().await;
    if mode == QueueDrainMode::OneAtATime && messages.len() > 1 {
        messages.truncate(1);
    }
    messages
}

fn aborted_message(provider: &str, model_id: &str, timestamp_ms: u64) -> Message {
    Message::Assistant {
        parts: vec![],
        provider: provider.to_string(),
        model_id: model_id.to_string(),
        usage: None,
        stop_reason: StopReason::Aborted,
        error_message: Some("cancelled".to_string()),
        timestamp_ms,
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
