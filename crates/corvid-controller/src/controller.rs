//! Session controller: wraps the agent loop with persistence, auto-retry,
//! auto-compaction, model/thinking cycling, and session statistics.
//! Grounded on `AgentSession` in `agent_session.py` — this is its `prompt`/
//! `_on_agent_event`/`_post_turn_checks` orchestration re-expressed around
//! `corvid_core`'s channel-based loop rather than a subscribed callback
//! object.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use corvid_core::{AgentEvent, AgentEventStream, CancellationSource, LoopConfig, LoopContext, StreamFn};
use corvid_llm::{Message, StopReason};
use corvid_session::SessionManager;

use crate::compaction::{self, SummarizeFn};
use crate::config::ControllerConfig;
use crate::error::{Error, Result};
use crate::model::{cycle_model, CycleDirection, ModelCatalog, ModelInfo, ThinkingLevel};
use crate::retry::{self, RetryDecision, RetryState};
use crate::stats::{self, SessionStats};

/// Current context-window usage. Mirrors `getContextUsage()`.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ContextUsage {
    pub tokens: u64,
    pub context_window: u32,
    pub percent: f64,
}

/// Snapshot returned by [`SessionController::clear_queue`].
#[derive(Debug, Clone, Default)]
pub struct ClearedQueues {
    pub steering: Vec<Message>,
    pub follow_up: Vec<Message>,
}

/// Owns one session's working context and drives it through the agent
/// loop, persisting every message as it completes and running the
/// retry/compaction checks `agent_session.py` runs after each turn.
pub struct SessionController {
    cwd: PathBuf,
    session: SessionManager,
    catalog: Arc<dyn ModelCatalog>,
    config: ControllerConfig,
    /// Carries the full tool registry; only its `tools` field is read, via
    /// `LoopConfig::with_active_tools`, to rebuild `loop_config`'s active
    /// subset.
    all_tools: LoopConfig,
    loop_config: LoopConfig,
    context: LoopContext,
    /// The session entry each `context.messages[i]` was persisted as, or
    /// `None` for message kinds the loop never persists (`System`/`Custom`).
    /// Parallel to `context.messages`.
    context_entry_ids: Vec<Option<String>>,
    system_prompt: String,
    current_model: Option<ModelInfo>,
    thinking_level: ThinkingLevel,
    cancel_source: CancellationSource,
    retry: RetryState,
    compacting: bool,
    steering_queue: Arc<StdMutex<VecDeque<Message>>>,
    follow_up_queue: Arc<StdMutex<VecDeque<Message>>>,
    stream_fn: StreamFn,
    summarize_fn: SummarizeFn,
}

impl SessionController {
    /// Build a controller around an already-open session, the default
    /// filesystem/shell tools, and the given model.
    pub fn new(
        cwd: PathBuf,
        session: SessionManager,
        catalog: Arc<dyn ModelCatalog>,
        initial_model: ModelInfo,
        thinking_level: ThinkingLevel,
        config: ControllerConfig,
        stream_fn: StreamFn,
        summarize_fn: SummarizeFn,
    ) -> Self {
        let derived = session.build_context(None);
        // Prefer whatever model/thinking level the session's own history
        // last recorded over the caller-supplied defaults, as long as the
        // catalog can still resolve it (e.g. its API key is still present).
        let resumed_model = derived
            .model
            .as_ref()
            .and_then(|m| catalog.info(&m.provider, &m.model_id));
        let effective_model = resumed_model.unwrap_or(initial_model);
        let effective_thinking = ThinkingLevel::parse(&derived.thinking_level).unwrap_or(thinking_level);
        let context_entry_ids = derived.source_entry_ids.into_iter().map(Some).collect();

        let all_tools = LoopConfig::new(
            corvid_core::default_toolset(cwd.clone()),
            effective_model.provider.clone(),
            effective_model.model_id.clone(),
        );

        let steering_queue = Arc::new(StdMutex::new(VecDeque::new()));
        let follow_up_queue = Arc::new(StdMutex::new(VecDeque::new()));
        let mut loop_config = all_tools.clone();
        loop_config.steering = Some(make_queue_fn(steering_queue.clone()));
        loop_config.follow_up = Some(make_queue_fn(follow_up_queue.clone()));

        let system_prompt = corvid_core::system_prompt(&cwd, &loop_config.tool_names());
        let context = LoopContext {
            system_prompt: Some(system_prompt.clone()),
            messages: derived.messages,
        };

        Self {
            cwd,
            session,
            catalog,
            config,
            all_tools,
            loop_config,
            context,
            context_entry_ids,
            system_prompt,
            current_model: Some(effective_model),
            thinking_level: effective_thinking,
            cancel_source: CancellationSource::new(),
            retry: RetryState::default(),
            compacting: false,
            steering_queue,
            follow_up_queue,
            stream_fn,
            summarize_fn,
        }
    }

    // -----------------------------------------------------------------
    // Driving the loop
    // -----------------------------------------------------------------

    /// Send a prompt and run until the loop goes idle, including any
    /// auto-retries and compaction-triggered continuations. `on_event` is
    /// invoked for every event the loop (and any continuations) emit, so a
    /// frontend renders exactly what it would from a bare `corvid_core`
    /// run, while this method handles persistence and recovery underneath.
    pub async fn prompt(
        &mut self,
        message: impl Into<String>,
        mut on_event: impl FnMut(&AgentEvent),
    ) -> Result<()> {
        self.retry.reset();
        self.cancel_source = CancellationSource::new();
        let user_msg = Message::user(message.into(), now_ms());
        let stream = corvid_core::run(
            vec![user_msg],
            self.context.clone(),
            self.loop_config.clone(),
            self.cancel_source.token(),
            self.stream_fn.clone(),
        );
        self.drive(stream, &mut on_event).await
    }

    async fn drive(
        &mut self,
        mut stream: AgentEventStream,
        on_event: &mut impl FnMut(&AgentEvent),
    ) -> Result<()> {
        loop {
            let mut last_assistant: Option<Message> = None;
            while let Some(event) = stream.next().await {
                if let AgentEvent::MessageEnd { message } = &event {
                    self.on_message_end(message)?;
                    if matches!(message, Message::Assistant { .. }) {
                        last_assistant = Some(message.clone());
                    }
                }
                on_event(&event);
            }
            let Some(msg) = last_assistant else { break };
            match self.post_turn_checks(&msg).await? {
                Some(next) => stream = next,
                None => break,
            }
        }
        Ok(())
    }

    /// Cancel the in-flight turn and drop any pending auto-retry.
    pub fn abort(&mut self) {
        self.retry.reset();
        self.cancel_source.cancel();
    }

    fn on_message_end(&mut self, message: &Message) -> Result<()> {
        let entry_id = match message {
            Message::User { .. } | Message::Assistant { .. } | Message::Tool { .. } => {
                Some(self.session.append_message(message.clone())?)
            }
            Message::System { .. } | Message::Custom { .. } => None,
        };
        self.context.messages.push(message.clone());
        self.context_entry_ids.push(entry_id);

        if let Message::Assistant { stop_reason, .. } = message {
            if *stop_reason != StopReason::Error && self.retry.is_retrying() {
                tracing::info!(attempt = self.retry.attempt(), "auto-retry succeeded");
                self.retry.reset();
            }
        }
        Ok(())
    }

    /// Retry takes priority over compaction — mirrors `_post_turn_checks`.
    async fn post_turn_checks(&mut self, msg: &Message) -> Result<Option<AgentEventStream>> {
        if self.is_retryable_error(msg) {
            if let Some(stream) = self.handle_retryable_error(msg).await? {
                return Ok(Some(stream));
            }
        }
        self.check_compaction(msg).await
    }

    fn is_retryable_error(&self, msg: &Message) -> bool {
        let Some(model) = &self.current_model else {
            return false;
        };
        retry::is_retryable_error(msg, model.context_window)
    }

    async fn handle_retryable_error(&mut self, _msg: &Message) -> Result<Option<AgentEventStream>> {
        if !self.config.retry.enabled {
            return Ok(None);
        }
        match self.retry.advance(self.config.retry.max_retries) {
            RetryDecision::Exhausted { attempt } => {
                tracing::warn!(attempt, "auto-retry exhausted");
                Ok(None)
            }
            RetryDecision::Retry { attempt } => {
                let delay = self.config.retry.delay_ms(attempt);
                tracing::info!(attempt, delay_ms = delay, "auto-retry waiting before continuing");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                self.pop_trailing_error_message();
                Ok(Some(self.continue_run()?))
            }
        }
    }

    /// Overflow path (same model, context-overflow error: compact and
    /// always retry) vs. threshold path (context over budget: compact,
    /// only auto-continue if messages are already queued). Mirrors
    /// `_check_compaction`.
    async fn check_compaction(&mut self, msg: &Message) -> Result<Option<AgentEventStream>> {
        if !self.config.compaction.enabled {
            return Ok(None);
        }
        if matches!(
            msg,
            Message::Assistant {
                stop_reason: StopReason::Aborted,
                ..
            }
        ) {
            return Ok(None);
        }

        let Some(model) = self.current_model.clone() else {
            return Ok(None);
        };

        let same_model = matches!(
            msg,
            Message::Assistant { provider, model_id, .. }
                if *provider == model.provider && *model_id == model.model_id
        );
        if same_model && retry::is_context_overflow(msg, model.context_window) {
            self.pop_trailing_error_message();
            return self.run_auto_compaction("overflow", true).await;
        }

        if matches!(
            msg,
            Message::Assistant {
                stop_reason: StopReason::Error,
                ..
            }
        ) {
            return Ok(None);
        }

        let context_window = model.context_window as u64;
        if context_window > 0
            && compaction::should_compact(&self.context.messages, context_window, &self.config.compaction)
        {
            return self.run_auto_compaction("threshold", false).await;
        }
        Ok(None)
    }

    async fn run_auto_compaction(&mut self, reason: &str, will_retry: bool) -> Result<Option<AgentEventStream>> {
        self.compacting = true;
        tracing::info!(reason, "auto-compaction starting");
        let outcome = self.run_compaction_inner(None).await;
        self.compacting = false;

        let summarized = match outcome {
            Ok(summarized) => summarized,
            Err(e) => {
                tracing::warn!(reason, error = %e, "auto-compaction failed");
                return Ok(None);
            }
        };

        if summarized.is_some() && (will_retry || self.pending_message_count() > 0) {
            return Ok(Some(self.continue_run()?));
        }
        Ok(None)
    }

    fn continue_run(&self) -> Result<AgentEventStream> {
        Ok(corvid_core::continue_existing(
            self.context.clone(),
            self.loop_config.clone(),
            self.cancel_source.token(),
            self.stream_fn.clone(),
        )?)
    }

    /// Drop a trailing error assistant message from the working context
    /// before retrying/compacting. It stays in the session's persisted
    /// history — only the in-memory context used for the next turn loses
    /// it, mirroring `replace_messages(messages[:-1])`.
    fn pop_trailing_error_message(&mut self) {
        if matches!(self.context.messages.last(), Some(Message::Assistant { .. })) {
            self.context.messages.pop();
            self.context_entry_ids.pop();
        }
    }

    // -----------------------------------------------------------------
    // Compaction
    // -----------------------------------------------------------------

    /// Manually compact the context. Returns the generated summary, or an
    /// empty string if there wasn't enough history to bother.
    pub async fn compact(&mut self) -> Result<String> {
        self.compacting = true;
        let result = self.run_compaction_inner(None).await;
        self.compacting = false;
        Ok(result?.unwrap_or_default())
    }

    async fn run_compaction_inner(&mut self, previous_summary: Option<&str>) -> Result<Option<String>> {
        let outcome = compaction::compact_context(
            &self.context.messages,
            &self.config.compaction,
            previous_summary,
            now_ms(),
            &self.summarize_fn,
            &self.cancel_source.token(),
        )
        .await?;

        if outcome.summary.is_empty() {
            return Ok(None);
        }

        let first_kept_id = self
            .context_entry_ids
            .get(outcome.cut.first_kept_index)
            .cloned()
            .flatten()
            .unwrap_or_default();
        let compaction_entry_id = self.session.append_compaction(
            outcome.summary.clone(),
            first_kept_id,
            outcome.tokens_before,
            None,
            false,
        )?;

        let mut new_ids = Vec::with_capacity(self.context_entry_ids.len() - outcome.cut.first_kept_index + 1);
        new_ids.push(Some(compaction_entry_id));
        new_ids.extend_from_slice(&self.context_entry_ids[outcome.cut.first_kept_index..]);

        self.context.messages = outcome.new_messages;
        self.context_entry_ids = new_ids;
        Ok(Some(outcome.summary))
    }

    // -----------------------------------------------------------------
    // Queue management
    // -----------------------------------------------------------------

    pub fn steer(&self, message: impl Into<String>) {
        self.steering_queue
            .lock()
            .unwrap()
            .push_back(Message::user(message.into(), now_ms()));
    }

    pub fn follow_up(&self, message: impl Into<String>) {
        self.follow_up_queue
            .lock()
            .unwrap()
            .push_back(Message::user(message.into(), now_ms()));
    }

    pub fn pending_message_count(&self) -> usize {
        self.steering_queue.lock().unwrap().len() + self.follow_up_queue.lock().unwrap().len()
    }

    pub fn get_steering_messages(&self) -> Vec<Message> {
        self.steering_queue.lock().unwrap().iter().cloned().collect()
    }

    pub fn get_follow_up_messages(&self) -> Vec<Message> {
        self.follow_up_queue.lock().unwrap().iter().cloned().collect()
    }

    pub fn clear_queue(&self) -> ClearedQueues {
        ClearedQueues {
            steering: self.steering_queue.lock().unwrap().drain(..).collect(),
            follow_up: self.follow_up_queue.lock().unwrap().drain(..).collect(),
        }
    }

    // -----------------------------------------------------------------
    // Tool management
    // -----------------------------------------------------------------

    pub fn active_tool_names(&self) -> Vec<String> {
        self.loop_config.tool_names()
    }

    pub fn all_tool_names(&self) -> Vec<String> {
        self.all_tools.tool_names()
    }

    /// Narrow the active tool set and rebuild the system prompt to name
    /// only what's now active. Unknown names are dropped silently.
    pub fn set_active_tools_by_name(&mut self, names: &[String]) {
        self.loop_config = self.loop_config.clone().with_active_tools(&self.all_tools.tools, names);
        self.system_prompt = corvid_core::system_prompt(&self.cwd, &self.loop_config.tool_names());
        self.context.system_prompt = Some(self.system_prompt.clone());
    }

    // -----------------------------------------------------------------
    // Model / thinking level management
    // -----------------------------------------------------------------

    pub fn model(&self) -> Option<&ModelInfo> {
        self.current_model.as_ref()
    }

    pub fn set_model(&mut self, model: ModelInfo) -> Result<()> {
        if self.catalog.info(&model.provider, &model.model_id).is_none() {
            return Err(Error::NoApiKey {
                provider: model.provider,
                model_id: model.model_id,
            });
        }
        self.loop_config.provider = model.provider.clone();
        self.loop_config.model_id = model.model_id.clone();
        self.all_tools.provider = model.provider.clone();
        self.all_tools.model_id = model.model_id.clone();
        self.session.append_model_change(model.provider.clone(), model.model_id.clone())?;
        self.current_model = Some(model);
        // Re-clamp thinking level for the new model's capabilities.
        self.set_thinking_level(self.thinking_level)?;
        Ok(())
    }

    pub fn cycle_model(&mut self, direction: CycleDirection) -> Result<Option<ModelInfo>> {
        let next = cycle_model(self.catalog.as_ref(), self.current_model.as_ref(), direction);
        if let Some(model) = next.clone() {
            self.set_model(model)?;
        }
        Ok(next)
    }

    pub fn thinking_level(&self) -> ThinkingLevel {
        self.thinking_level
    }

    pub fn available_thinking_levels(&self) -> &'static [ThinkingLevel] {
        let supports_xhigh = self.current_model.as_ref().is_some_and(|m| m.supports_xhigh);
        ThinkingLevel::tiers(supports_xhigh)
    }

    pub fn set_thinking_level(&mut self, level: ThinkingLevel) -> Result<()> {
        let supports_xhigh = self.current_model.as_ref().is_some_and(|m| m.supports_xhigh);
        let effective = level.clamp(supports_xhigh);
        let changing = effective != self.thinking_level;
        self.thinking_level = effective;
        if changing {
            self.session.append_thinking_level_change(effective.as_str())?;
        }
        Ok(())
    }

    pub fn cycle_thinking_level(&mut self) -> Result<Option<ThinkingLevel>> {
        let supports_xhigh = self.current_model.as_ref().is_some_and(|m| m.supports_xhigh);
        let Some(next) = self.thinking_level.next(supports_xhigh) else {
            return Ok(None);
        };
        self.set_thinking_level(next)?;
        Ok(Some(next))
    }

    // -----------------------------------------------------------------
    // Statistics / context usage
    // -----------------------------------------------------------------

    pub fn session_stats(&self) -> SessionStats {
        stats::compute_session_stats(&self.context.messages)
    }

    pub fn context_usage(&self) -> Option<ContextUsage> {
        let model = self.current_model.as_ref()?;
        if model.context_window == 0 {
            return None;
        }
        let tokens = compaction::estimate_context_tokens(&self.context.messages).tokens;
        let percent = tokens as f64 / model.context_window as f64 * 100.0;
        Some(ContextUsage {
            tokens,
            context_window: model.context_window,
            percent,
        })
    }

    pub fn is_compacting(&self) -> bool {
        self.compacting
    }

    pub fn is_retrying(&self) -> bool {
        self.retry.is_retrying()
    }

    pub fn retry_attempt(&self) -> u32 {
        self.retry.attempt()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn session_manager(&self) -> &SessionManager {
        &self.session
    }

    // -----------------------------------------------------------------
    // Forking
    // -----------------------------------------------------------------

    /// Copy this session's full history into a new session file and return
    /// a controller over it, sharing the model catalog, stream/summarize
    /// callbacks, and current model/tool/thinking state, but with its own
    /// cancellation source, retry state, and queues.
    pub fn fork(&self) -> Result<SessionController> {
        let src_path = self.session.session_file().ok_or(Error::Session(corvid_session::Error::NoBackingFile))?;
        let forked_session = SessionManager::fork_from(
            src_path,
            &self.cwd.display().to_string(),
            Some(self.session.sessions_dir()),
        )?;

        let steering_queue = Arc::new(StdMutex::new(VecDeque::new()));
        let follow_up_queue = Arc::new(StdMutex::new(VecDeque::new()));
        let mut loop_config = self.loop_config.clone();
        loop_config.steering = Some(make_queue_fn(steering_queue.clone()));
        loop_config.follow_up = Some(make_queue_fn(follow_up_queue.clone()));

        Ok(SessionController {
            cwd: self.cwd.clone(),
            session: forked_session,
            catalog: self.catalog.clone(),
            config: self.config.clone(),
            all_tools: self.all_tools.clone(),
            loop_config,
            context: self.context.clone(),
            context_entry_ids: self.context_entry_ids.clone(),
            system_prompt: self.system_prompt.clone(),
            current_model: self.current_model.clone(),
            thinking_level: self.thinking_level,
            cancel_source: CancellationSource::new(),
            retry: RetryState::default(),
            compacting: false,
            steering_queue,
            follow_up_queue,
            stream_fn: self.stream_fn.clone(),
            summarize_fn: self.summarize_fn.clone(),
        })
    }
}

fn make_queue_fn(queue: Arc<StdMutex<VecDeque<Message>>>) -> corvid_core::QueueFn {
    Arc::new(move || {
        let queue = queue.clone();
        Box::pin(async move { queue.lock().unwrap().drain(..).collect() })
    })
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
