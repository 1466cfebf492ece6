//! The agent loop's own streaming abstraction.
//!
//! `corvid_llm::StreamEvent` is a wire-level delta stream (text/tool-call
//! fragments, a single terminal `Finish`/`Error`). The loop needs something
//! one level up: every event carries the *whole* assistant message as
//! accumulated so far, because `MessageUpdate`/`MessageEnd` replace the
//! message in `context.messages` wholesale rather than patching it. Spec's
//! stream callback contract lists nine wire-level subtypes
//! (`text_start`/`text_delta`/`text_end`/`thinking_*`/`toolcall_*`), but the
//! loop branches on none of them individually — it only needs start/delta/
//! terminal — so they collapse into one `Delta` variant here.
//!
//! A caller adapting a `corvid_llm::LanguageModel` into a `StreamFn`
//! accumulates the wire deltas into a running `corvid_llm::Message::Assistant`
//! and emits `Start` once, `Delta` on every subsequent wire event, and
//! `Done`/`Error` on `Finish`/`Error`.

use std::future::Future;
use std::pin::Pin;

use corvid_llm::Message;

use crate::cancel::CancellationToken;

/// One step of the loop-facing assistant stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The assistant message was created (no content yet, or the first
    /// fragment — implementations may fire this with non-empty `partial`).
    Start { partial: Message },
    /// The assistant message gained more content since the last event.
    Delta { partial: Message },
    /// The assistant turn finished normally (`stop_reason` is not
    /// `error`/`aborted`).
    Done { message: Message },
    /// The assistant turn ended in an error. `message.stop_reason` is
    /// `StopReason::Error` and `error_message` is populated.
    Error { message: Message },
}

pub type BoxStream<T> = Pin<Box<dyn futures::Stream<Item = T> + Send>>;

/// What the loop asks a model-backed caller for on each turn: the messages
/// and tools to send (already passed through `transform_context` and
/// filtered to LLM-visible roles), plus a cancellation token to poll or
/// race against mid-stream.
pub struct StreamRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<corvid_llm::Tool>,
}

pub type StreamFn = std::sync::Arc<
    dyn Fn(StreamRequest, CancellationToken) -> BoxStream<StreamEvent> + Send + Sync,
>;

/// A context-transform hook: runs before `messages` are filtered and sent
/// to `stream_fn`, e.g. to inject a system reminder or strip stale content.
pub type TransformContextFn = std::sync::Arc<
    dyn Fn(Vec<Message>, CancellationToken) -> Pin<Box<dyn Future<Output = Vec<Message>> + Send>>
        + Send
        + Sync,
>;
