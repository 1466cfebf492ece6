use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use corvid_core::CancellationToken;
use corvid_llm::{AssistantPart, Message, StopReason, SystemPart, UserPart};

use crate::config::CompactionPolicy;
use crate::error::{Error, Result};

const SUMMARIZATION_SYSTEM_PROMPT: &str = "You are a precise technical assistant that creates \
structured summaries of AI coding sessions. Focus on technical facts: files changed, decisions \
made, current state, next steps. Be concise and accurate.";

const SUMMARIZATION_PROMPT: &str = "The messages above are a conversation to summarize. Create a \
structured context checkpoint summary that another LLM will use to continue the work.

Use this EXACT format:

## Goal
[What is the user trying to accomplish? Can be multiple items if the session covers different tasks.]

## Constraints & Preferences
- [Any constraints, preferences, or requirements mentioned by user]
- [Or \"(none)\" if none were mentioned]

## Progress
### Done
- [x] [Completed tasks/changes]

### In Progress
- [ ] [Current work]

### Blocked
- [Issues preventing progress, if any]

## Key Decisions
- **[Decision]**: [Brief rationale]

## Next Steps
1. [Ordered list of what should happen next]

## Critical Context
- [Any data, examples, or references needed to continue]
- [Or \"(none)\" if not applicable]

Keep each section concise. Preserve exact file paths, function names, and error messages.";

const UPDATE_SUMMARIZATION_PROMPT: &str = "The messages above are NEW conversation messages to \
incorporate into the existing summary provided in <previous-summary> tags.

Update the existing structured summary with new information. RULES:
- PRESERVE all existing information from the previous summary
- ADD new progress, decisions, and context from the new messages
- UPDATE the Progress section: move items from \"In Progress\" to \"Done\" when completed
- UPDATE \"Next Steps\" based on what was accomplished
- PRESERVE exact file paths, function names, and error messages
- If something is no longer relevant, you may remove it

Use the same EXACT format as the original summary (Goal / Constraints & Preferences / Progress / \
Key Decisions / Next Steps / Critical Context). Keep each section concise.";

/// Single-shot "summarize this text" callback, distinct from the
/// full-turn streaming [`corvid_core::StreamFn`] — mirrors
/// `generate_summary`'s use of `complete_simple` rather than the
/// streaming agent protocol in `compaction.py`.
pub type SummarizeFn = Arc<
    dyn Fn(
            String,
            String,
            CancellationToken,
        ) -> Pin<Box<dyn Future<Output = std::result::Result<String, corvid_llm::Error>> + Send>>
        + Send
        + Sync,
>;

/// `chars/4` token estimate for a single message, broken down the same way
/// per role as `estimate_tokens()` in `compaction.py`.
pub fn estimate_tokens(message: &Message) -> u64 {
    let chars: usize = match message {
        Message::System { parts } => parts
            .iter()
            .map(|p| {
                let SystemPart::Text(t) = p;
                t.text.chars().count()
            })
            .sum(),
        Message::User { parts, .. } => parts
            .iter()
            .map(|p| match p {
                UserPart::Text(t) => t.text.chars().count(),
                UserPart::Image(_) => 4800,
            })
            .sum(),
        Message::Assistant { parts, .. } => parts
            .iter()
            .map(|p| match p {
                AssistantPart::Text(t) => t.text.chars().count(),
                AssistantPart::Thinking(r) => r.text.chars().count(),
                AssistantPart::ToolCall(c) => c.name.chars().count() + c.arguments.chars().count(),
            })
            .sum(),
        Message::Tool { parts, .. } => parts.iter().map(|p| p.content.chars().count()).sum(),
        Message::Custom { payload, .. } => {
            serde_json::to_string(payload).map(|s| s.len()).unwrap_or(0)
        }
    };
    (((chars + 3) / 4) as u64).max(1)
}

/// Total input/cache-read tokens a usage record represents, the context
/// footprint those tokens actually occupy (mirrors
/// `calculate_context_tokens()`).
pub fn calculate_context_tokens(usage: &corvid_llm::stream::Usage) -> u64 {
    usage.input_tokens as u64 + usage.cached_tokens.unwrap_or(0) as u64
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextTokenEstimate {
    pub tokens: u64,
    pub usage_tokens: u64,
    pub trailing_tokens: u64,
    pub last_usage_index: Option<usize>,
}

/// Estimate current context size, preferring the last non-aborted,
/// non-error assistant turn's real usage over the `chars/4` heuristic.
/// Mirrors `estimate_context_tokens()`.
pub fn estimate_context_tokens(messages: &[Message]) -> ContextTokenEstimate {
    let last_usage = messages.iter().enumerate().rev().find_map(|(i, m)| {
        let Message::Assistant {
            usage: Some(usage),
            stop_reason,
            ..
        } = m
        else {
            return None;
        };
        if matches!(stop_reason, StopReason::Aborted | StopReason::Error) {
            return None;
        }
        Some((i, usage))
    });

    let Some((idx, usage)) = last_usage else {
        let total: u64 = messages.iter().map(estimate_tokens).sum();
        return ContextTokenEstimate {
            tokens: total,
            usage_tokens: 0,
            trailing_tokens: total,
            last_usage_index: None,
        };
    };

    let usage_tokens = calculate_context_tokens(usage);
    let trailing_tokens: u64 = messages[idx + 1..].iter().map(estimate_tokens).sum();
    ContextTokenEstimate {
        tokens: usage_tokens + trailing_tokens,
        usage_tokens,
        trailing_tokens,
        last_usage_index: Some(idx),
    }
}

/// Whether estimated context usage exceeds `context_window - reserve_tokens`.
/// Mirrors `should_compact()`.
pub fn should_compact(messages: &[Message], context_window: u64, policy: &CompactionPolicy) -> bool {
    if !policy.enabled || context_window == 0 {
        return false;
    }
    let estimate = estimate_context_tokens(messages);
    estimate.tokens > context_window.saturating_sub(policy.reserve_tokens)
}

/// A valid compaction cut point is anything but a bare tool result — the
/// loop's invariant (§3) guarantees every tool call is paired with its
/// result before the next assistant turn, so cutting between them would
/// strand an unmatched result. This mirrors `_is_valid_cut_entry()`
/// applied to the already-derived message list `compact_context()`
/// operates on (branch summaries and custom messages have, by that point,
/// already become ordinary `User`/`Custom` messages via
/// `build_session_context`).
fn is_valid_cut_point(message: &Message) -> bool {
    !matches!(message, Message::Tool { .. })
}

fn find_valid_cut_points(messages: &[Message], start: usize, end: usize) -> Vec<usize> {
    (start..end)
        .filter(|&i| is_valid_cut_point(&messages[i]))
        .collect()
}

/// Walk backward from `entry_idx` to find the user (or custom) message
/// that starts the turn containing it. Mirrors `find_turn_start_index()`.
fn find_turn_start_index(messages: &[Message], entry_idx: usize, start: usize) -> Option<usize> {
    (start..=entry_idx)
        .rev()
        .find(|&i| matches!(messages[i], Message::User { .. } | Message::Custom { .. }))
}

#[derive(Debug, Clone, Copy)]
pub struct CutPoint {
    pub first_kept_index: usize,
    pub turn_start_index: Option<usize>,
    pub is_split_turn: bool,
}

/// Find where to cut the context for compaction: walk backward
/// accumulating estimated tokens until `keep_recent_tokens` is reached,
/// then snap to the nearest valid cut point at or after that message.
/// Mirrors `find_cut_point()`.
pub fn find_cut_point(
    messages: &[Message],
    start: usize,
    end: usize,
    keep_recent_tokens: u64,
) -> CutPoint {
    let cut_points = find_valid_cut_points(messages, start, end);
    let Some(&first_cut_point) = cut_points.first() else {
        return CutPoint {
            first_kept_index: start,
            turn_start_index: None,
            is_split_turn: false,
        };
    };

    let mut cut_index = first_cut_point;
    let mut accumulated = 0u64;
    for i in (start..end).rev() {
        accumulated += estimate_tokens(&messages[i]);
        if accumulated >= keep_recent_tokens {
            if let Some(&cp) = cut_points.iter().find(|&&cp| cp >= i) {
                cut_index = cp;
            }
            break;
        }
    }

    // `to_keep` must start at a real message boundary: nothing to scan
    // backward over here since every index in `messages` is already a
    // message (unlike the raw entry tree, which can hold non-message
    // entries between cut points).

    let is_user = matches!(messages[cut_index], Message::User { .. });
    let turn_start_index = if is_user {
        None
    } else {
        find_turn_start_index(messages, cut_index, start)
    };

    CutPoint {
        first_kept_index: cut_index,
        turn_start_index,
        is_split_turn: !is_user && turn_start_index.is_some(),
    }
}

pub struct CompactionOutcome {
    pub new_messages: Vec<Message>,
    pub summary: String,
    pub tokens_before: u64,
    pub cut: CutPoint,
}

fn serialize_conversation(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let (role, text) = match m {
                Message::System { parts } => (
                    "system",
                    parts
                        .iter()
                        .map(|p| {
                            let SystemPart::Text(t) = p;
                            t.text.clone()
                        })
                        .collect::<Vec<_>>()
                        .join(" "),
                ),
                Message::User { parts, .. } => (
                    "user",
                    parts
                        .iter()
                        .filter_map(|p| match p {
                            UserPart::Text(t) => Some(t.text.clone()),
                            UserPart::Image(_) => None,
                        })
                        .collect::<Vec<_>>()
                        .join(" "),
                ),
                Message::Assistant { parts, .. } => (
                    "assistant",
                    parts
                        .iter()
                        .filter_map(|p| match p {
                            AssistantPart::Text(t) => Some(t.text.clone()),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join(" "),
                ),
                Message::Tool { parts, .. } => (
                    "tool",
                    parts.iter().map(|p| p.content.clone()).collect::<Vec<_>>().join(" "),
                ),
                Message::Custom { payload, .. } => ("custom", payload.to_string()),
            };
            format!("{}: {text}", role.to_uppercase())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Summarize everything before the cut and splice a single synthetic
/// summary message in its place. Mirrors `compact_context()`. Returns
/// `new_messages == messages` unchanged (and an empty summary) when
/// there's too little history to bother compacting, or the cut point
/// lands at the very start.
pub async fn compact_context(
    messages: &[Message],
    policy: &CompactionPolicy,
    previous_summary: Option<&str>,
    now_ms: u64,
    summarize: &SummarizeFn,
    cancel: &CancellationToken,
) -> Result<CompactionOutcome> {
    let tokens_before = estimate_context_tokens(messages).tokens;

    if messages.len() < 4 {
        return Ok(CompactionOutcome {
            new_messages: messages.to_vec(),
            summary: String::new(),
            tokens_before,
            cut: CutPoint {
                first_kept_index: 0,
                turn_start_index: None,
                is_split_turn: false,
            },
        });
    }

    let cut = find_cut_point(messages, 0, messages.len(), policy.keep_recent_tokens);
    if cut.first_kept_index == 0 {
        return Ok(CompactionOutcome {
            new_messages: messages.to_vec(),
            summary: String::new(),
            tokens_before,
            cut,
        });
    }

    let to_summarize = &messages[..cut.first_kept_index];
    let to_keep = &messages[cut.first_kept_index..];

    let base_prompt = if previous_summary.is_some() {
        UPDATE_SUMMARIZATION_PROMPT
    } else {
        SUMMARIZATION_PROMPT
    };
    let conversation = serialize_conversation(to_summarize);
    let mut prompt = format!("<conversation>\n{conversation}\n</conversation>\n\n");
    if let Some(prev) = previous_summary {
        prompt.push_str(&format!("<previous-summary>\n{prev}\n</previous-summary>\n\n"));
    }
    prompt.push_str(base_prompt);

    let summary = summarize(SUMMARIZATION_SYSTEM_PROMPT.to_string(), prompt, cancel.clone())
        .await
        .map_err(|e| Error::Summarization(e.to_string()))?;

    let mut new_messages = Vec::with_capacity(to_keep.len() + 1);
    new_messages.push(Message::user(
        format!("[Previous conversation summary]\n{summary}"),
        now_ms,
    ));
    new_messages.extend_from_slice(to_keep);

    Ok(CompactionOutcome {
        new_messages,
        summary,
        tokens_before,
        cut,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_llm::stream::Usage;

    fn user(text: &str) -> Message {
        Message::user(text, 0)
    }

    fn assistant(text: &str) -> Message {
        Message::assistant(text, "anthropic", "m", StopReason::Stop, 0)
    }

    fn tool_result(text: &str) -> Message {
        Message::tool_result("id", "bash", text, false, 0)
    }

    #[test]
    fn estimate_tokens_is_chars_over_four_floor_one() {
        assert_eq!(estimate_tokens(&user("")), 1);
        assert_eq!(estimate_tokens(&user("12345678")), 2);
    }

    #[test]
    fn cut_point_never_lands_on_tool_result() {
        let messages = vec![
            user("first task"),
            assistant("ok, calling a tool"),
            tool_result("tool output here"),
            user("thanks, second task now"),
            assistant("done"),
        ];
        let cut = find_cut_point(&messages, 0, messages.len(), 1);
        assert!(!matches!(messages[cut.first_kept_index], Message::Tool { .. }));
    }

    #[test]
    fn context_tokens_prefer_real_usage_over_heuristic() {
        let mut messages = vec![user("hi")];
        messages.push(Message::Assistant {
            parts: vec![],
            provider: "anthropic".into(),
            model_id: "m".into(),
            usage: Some(Usage {
                input_tokens: 1000,
                output_tokens: 50,
                reasoning_tokens: None,
                cached_tokens: Some(200),
            }),
            stop_reason: StopReason::Stop,
            error_message: None,
            timestamp_ms: 0,
        });
        let estimate = estimate_context_tokens(&messages);
        assert_eq!(estimate.usage_tokens, 1200);
        assert_eq!(estimate.last_usage_index, Some(1));
    }

    #[test]
    fn should_compact_respects_reserve() {
        let policy = CompactionPolicy {
            enabled: true,
            reserve_tokens: 100,
            keep_recent_tokens: 20_000,
        };
        let messages = vec![assistant(&"x".repeat(400))];
        assert!(should_compact(&messages, 200, &policy));
        assert!(!should_compact(&messages, 1_000_000, &policy));
    }
}
