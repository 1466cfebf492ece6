use corvid_llm::{Message, StopReason};

/// Substrings of a retryable error message: rate limiting, transient
/// 5xx/429s, and connection drops. Mirrors `_RETRY_PATTERN` in
/// `agent_session.py`, expanded out of regex alternation (`rate.?limit`,
/// `connection.?error`, …) into the literal variants it actually matches,
/// since nothing else in this workspace pulls in a regex crate and a
/// handful of `contains` checks covers the same ground.
const RETRYABLE_SUBSTRINGS: &[&str] = &[
    "overloaded",
    "rate limit",
    "ratelimit",
    "rate-limit",
    "too many requests",
    "429",
    "500",
    "502",
    "503",
    "504",
    "service unavailable",
    "serviceunavailable",
    "service-unavailable",
    "server error",
    "internal error",
    "connection error",
    "connectionerror",
    "connection-error",
    "connection refused",
    "connectionrefused",
    "connection-refused",
    "other side closed",
    "fetch failed",
    "upstream connect",
    "upstreamconnect",
    "upstream-connect",
    "reset before headers",
    "terminated",
    "retry delay",
];

/// Substrings that indicate the provider rejected the request for being
/// too large for the model's context window, rather than a transient
/// failure. Not grounded in `original_source` — `is_context_overflow`
/// there is imported from a `pi_ai` package outside the retrieved pack —
/// so this list is a recorded design decision (see DESIGN.md) rather than
/// a port of existing code.
const OVERFLOW_SUBSTRINGS: &[&str] = &[
    "context length",
    "context window",
    "context_length_exceeded",
    "maximum context length",
    "too many tokens",
    "prompt is too long",
    "input is too long",
    "input length and `max_tokens`",
];

/// Whether `msg`'s error looks like a context-overflow rejection from the
/// model it was sent to. Context overflow is handled by compaction, never
/// by retry, even though both are triggered from the same `stop_reason`.
pub fn is_context_overflow(msg: &Message, _context_window: u32) -> bool {
    let Message::Assistant {
        stop_reason: StopReason::Error,
        error_message: Some(err),
        ..
    } = msg
    else {
        return false;
    };
    let lower = err.to_lowercase();
    OVERFLOW_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

/// Whether `msg` is an error that's worth retrying with backoff. Context
/// overflow is explicitly excluded — that's `is_context_overflow`'s job.
pub fn is_retryable_error(msg: &Message, context_window: u32) -> bool {
    let Message::Assistant {
        stop_reason: StopReason::Error,
        error_message: Some(err),
        ..
    } = msg
    else {
        return false;
    };
    if is_context_overflow(msg, context_window) {
        return false;
    }
    let lower = err.to_lowercase();
    RETRYABLE_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

/// Tracks in-flight auto-retry state for one controller. Mirrors the
/// `_retry_attempt`/`_retry_event` bookkeeping in `agent_session.py`,
/// minus the asyncio event (callers `await` the controller's own drive
/// loop instead of a separate resolution future).
#[derive(Debug, Default)]
pub struct RetryState {
    attempt: u32,
}

impl RetryState {
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_retrying(&self) -> bool {
        self.attempt > 0
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Outcome of attempting another retry.
    pub fn advance(&mut self, max_retries: u32) -> RetryDecision {
        self.attempt += 1;
        if self.attempt > max_retries {
            let exhausted_attempt = self.attempt - 1;
            self.attempt = 0;
            RetryDecision::Exhausted {
                attempt: exhausted_attempt,
            }
        } else {
            RetryDecision::Retry {
                attempt: self.attempt,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u32 },
    Exhausted { attempt: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_msg(text: &str) -> Message {
        Message::Assistant {
            parts: vec![],
            provider: "anthropic".into(),
            model_id: "m".into(),
            usage: None,
            stop_reason: StopReason::Error,
            error_message: Some(text.to_string()),
            timestamp_ms: 0,
        }
    }

    #[test]
    fn rate_limit_is_retryable() {
        let msg = error_msg("429 Too Many Requests: rate limit exceeded");
        assert!(is_retryable_error(&msg, 100_000));
    }

    #[test]
    fn context_overflow_is_not_retryable() {
        let msg = error_msg("maximum context length exceeded, please reduce prompt");
        assert!(!is_retryable_error(&msg, 100_000));
        assert!(is_context_overflow(&msg, 100_000));
    }

    #[test]
    fn non_error_stop_reason_is_never_retryable() {
        let msg = Message::assistant("hi", "anthropic", "m", StopReason::Stop, 0);
        assert!(!is_retryable_error(&msg, 100_000));
    }

    #[test]
    fn unrecognized_error_is_not_retryable() {
        let msg = error_msg("invalid api key");
        assert!(!is_retryable_error(&msg, 100_000));
    }

    #[test]
    fn retry_state_exhausts_after_max() {
        let mut state = RetryState::default();
        assert_eq!(state.advance(3), RetryDecision::Retry { attempt: 1 });
        assert_eq!(state.advance(3), RetryDecision::Retry { attempt: 2 });
        assert_eq!(state.advance(3), RetryDecision::Retry { attempt: 3 });
        assert_eq!(state.advance(3), RetryDecision::Exhausted { attempt: 3 });
        assert_eq!(state.attempt(), 0);
    }
}
