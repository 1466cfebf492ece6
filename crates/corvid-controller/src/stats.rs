use corvid_llm::{AssistantPart, Message};
use serde::Serialize;

/// Aggregate token counts across a branch's assistant turns.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TokenStats {
    pub input: u64,
    pub output: u64,
    pub cached: u64,
    pub reasoning: u64,
}

impl TokenStats {
    pub fn total(&self) -> u64 {
        self.input + self.output + self.cached + self.reasoning
    }
}

/// Session statistics for one branch. Mirrors `get_session_stats()` in
/// `agent_session.py`; cost is omitted (no pricing table exists anywhere
/// in the retrieved pack to ground one on — see DESIGN.md).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub user_messages: u64,
    pub assistant_messages: u64,
    pub tool_results: u64,
    pub tool_calls: u64,
    pub total_messages: u64,
    pub tokens: TokenStats,
}

/// Compute [`SessionStats`] over a branch's derived message list.
pub fn compute_session_stats(messages: &[Message]) -> SessionStats {
    let mut stats = SessionStats {
        total_messages: messages.len() as u64,
        ..Default::default()
    };

    for message in messages {
        match message {
            Message::User { .. } => stats.user_messages += 1,
            Message::Tool { .. } => stats.tool_results += 1,
            Message::Assistant { parts, usage, .. } => {
                stats.assistant_messages += 1;
                stats.tool_calls += parts
                    .iter()
                    .filter(|p| matches!(p, AssistantPart::ToolCall(_)))
                    .count() as u64;
                if let Some(usage) = usage {
                    stats.tokens.input += usage.input_tokens as u64;
                    stats.tokens.output += usage.output_tokens as u64;
                    stats.tokens.cached += usage.cached_tokens.unwrap_or(0) as u64;
                    stats.tokens.reasoning += usage.reasoning_tokens.unwrap_or(0) as u64;
                }
            }
            Message::System { .. } | Message::Custom { .. } => {}
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_llm::{stream::Usage, AssistantPart, StopReason, TextPart, ToolCallPart};

    #[test]
    fn counts_roles_and_tool_calls() {
        let messages = vec![
            Message::user("hi", 0),
            Message::Assistant {
                parts: vec![
                    AssistantPart::Text(TextPart { text: "ok".into() }),
                    AssistantPart::ToolCall(ToolCallPart {
                        id: "1".into(),
                        name: "bash".into(),
                        arguments: "{}".into(),
                    }),
                ],
                provider: "anthropic".into(),
                model_id: "m".into(),
                usage: Some(Usage {
                    input_tokens: 10,
                    output_tokens: 5,
                    reasoning_tokens: None,
                    cached_tokens: Some(2),
                }),
                stop_reason: StopReason::ToolUse,
                error_message: None,
                timestamp_ms: 0,
            },
            Message::tool_result("1", "bash", "output", false, 0),
        ];

        let stats = compute_session_stats(&messages);
        assert_eq!(stats.user_messages, 1);
        assert_eq!(stats.assistant_messages, 1);
        assert_eq!(stats.tool_calls, 1);
        assert_eq!(stats.tool_results, 1);
        assert_eq!(stats.tokens.total(), 17);
    }
}
