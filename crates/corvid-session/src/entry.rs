use corvid_llm::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CURRENT_SESSION_VERSION: u32 = 3;

/// The first line of a session file. Not part of [`EntryBody`]: the header
/// carries its own shape (`version`, `cwd`, no `parent_id`) and is always
/// read/written as the file's line 1, never walked as part of the entry tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHeader {
    pub id: String,
    pub version: u32,
    pub timestamp_ms: u64,
    pub cwd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_session: Option<String>,
}

/// A single entry on the branching tree, identified by `id` and linked to
/// its predecessor via `parent_id` (`None` only for the tree root).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub body: EntryBody,
}

/// The type-specific payload of a [`SessionEntry`].
///
/// Grounded in `session_manager.py`'s flat per-entry dicts (`type` plus
/// whatever extra fields that entry type carries). The wire encoding here
/// uses `snake_case` field names throughout rather than the original's
/// mixed `camelCase`/`snake_case` — this is a from-scratch journal format,
/// not a byte-compatible reader for existing Python-written files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryBody {
    Message {
        message: Message,
    },
    Compaction {
        summary: String,
        first_kept_entry_id: String,
        tokens_before: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
        #[serde(default)]
        from_hook: bool,
    },
    BranchSummary {
        from_id: String,
        summary: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
        #[serde(default)]
        from_hook: bool,
    },
    ModelChange {
        provider: String,
        model_id: String,
    },
    ThinkingLevelChange {
        level: String,
    },
    CustomMessage {
        kind: String,
        content: Value,
        display: bool,
    },
    Custom {
        kind: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    SessionInfo {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Label {
        target_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
}

impl EntryBody {
    /// Whether this entry type is an acceptable compaction cut point:
    /// `user`/`assistant`/`tool` messages, `custom`, `branch_summary`, and
    /// prior `compaction` entries all qualify; a lone `tool` result never
    /// does (§4.4 compaction algorithm — "never a tool result" refers to
    /// cutting mid-tool-turn, not the `Message::Tool` variant itself, which
    /// is excluded by `is_valid_cut_point` on the message body below).
    pub fn is_valid_cut_point(&self) -> bool {
        match self {
            EntryBody::Message { message } => !matches!(message, Message::Tool { .. }),
            EntryBody::Custom { .. }
            | EntryBody::BranchSummary { .. }
            | EntryBody::Compaction { .. } => true,
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            EntryBody::Message { .. } => "message",
            EntryBody::Compaction { .. } => "compaction",
            EntryBody::BranchSummary { .. } => "branch_summary",
            EntryBody::ModelChange { .. } => "model_change",
            EntryBody::ThinkingLevelChange { .. } => "thinking_level_change",
            EntryBody::CustomMessage { .. } => "custom_message",
            EntryBody::Custom { .. } => "custom",
            EntryBody::SessionInfo { .. } => "session_info",
            EntryBody::Label { .. } => "label",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_llm::StopReason;

    #[test]
    fn message_entry_round_trips() {
        let entry = SessionEntry {
            id: "abc12345".into(),
            parent_id: None,
            timestamp_ms: 1,
            body: EntryBody::Message {
                message: Message::user("hi", 1),
            },
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: SessionEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "abc12345");
        assert!(matches!(back.body, EntryBody::Message { .. }));
    }

    #[test]
    fn tool_message_is_not_a_cut_point() {
        let body = EntryBody::Message {
            message: Message::tool_result("t1", "read", "ok", false, 1),
        };
        assert!(!body.is_valid_cut_point());
    }

    #[test]
    fn assistant_message_is_a_cut_point() {
        let body = EntryBody::Message {
            message: Message::assistant("hi", "anthropic", "model", StopReason::Stop, 1),
        };
        assert!(body.is_valid_cut_point());
    }
}
