use std::collections::HashMap;

use corvid_llm::Message;

use crate::entry::{EntryBody, SessionEntry};

/// The active model at a given leaf, as recorded by the most recent
/// `model_change` entry or assistant message on the path to root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub provider: String,
    pub model_id: String,
}

/// The LLM-consumable view of a branch, derived on demand from the entry
/// tree. See §3 "Derived Context" / `build_session_context` in
/// `session_manager.py`.
#[derive(Debug, Clone)]
pub struct Context {
    pub messages: Vec<Message>,
    pub thinking_level: String,
    pub model: Option<ModelRef>,
    /// The entry each `messages[i]` was derived from, parallel to
    /// `messages`. Lets a caller that cuts `messages` at some index (e.g.
    /// `corvid-controller`'s compaction cut-point search) recover the
    /// `first_kept_entry_id` a `compaction` entry needs to point at.
    pub source_entry_ids: Vec<String>,
}

/// Walk `leaf_id` to the root via `parent_id` links and derive the ordered
/// message list plus the effective model/thinking level. `by_id` is the
/// full entry map (not just the current branch) so parent lookups succeed
/// regardless of how `entries` was ordered on disk.
pub fn build_session_context(leaf_id: Option<&str>, by_id: &HashMap<String, SessionEntry>) -> Context {
    let Some(leaf_id) = leaf_id else {
        return Context {
            messages: Vec::new(),
            thinking_level: "off".to_string(),
            model: None,
            source_entry_ids: Vec::new(),
        };
    };

    let Some(leaf) = by_id.get(leaf_id) else {
        return Context {
            messages: Vec::new(),
            thinking_level: "off".to_string(),
            model: None,
            source_entry_ids: Vec::new(),
        };
    };

    // Walk leaf -> root, then reverse to root -> leaf order.
    let mut path: Vec<&SessionEntry> = Vec::new();
    let mut current = Some(leaf);
    while let Some(entry) = current {
        path.push(entry);
        current = entry.parent_id.as_deref().and_then(|id| by_id.get(id));
    }
    path.reverse();

    let mut thinking_level = "off".to_string();
    let mut model: Option<ModelRef> = None;
    let mut compaction_idx: Option<usize> = None;

    for (i, entry) in path.iter().enumerate() {
        match &entry.body {
            EntryBody::ThinkingLevelChange { level } => thinking_level = level.clone(),
            EntryBody::ModelChange { provider, model_id } => {
                model = Some(ModelRef {
                    provider: provider.clone(),
                    model_id: model_id.clone(),
                });
            }
            EntryBody::Message {
                message:
                    Message::Assistant {
                        provider, model_id, ..
                    },
            } => {
                if !provider.is_empty() {
                    model = Some(ModelRef {
                        provider: provider.clone(),
                        model_id: model_id.clone(),
                    });
                }
            }
            EntryBody::Compaction { .. } => compaction_idx = Some(i),
            _ => {}
        }
    }

    let mut messages = Vec::new();
    let mut source_entry_ids = Vec::new();
    let append = |messages: &mut Vec<Message>, ids: &mut Vec<String>, entry: &SessionEntry| match &entry.body
    {
        EntryBody::Message { message } => {
            messages.push(message.clone());
            ids.push(entry.id.clone());
        }
        EntryBody::CustomMessage {
            kind,
            content,
            display,
        } => {
            if *display {
                messages.push(Message::Custom {
                    kind_tag: kind.clone(),
                    payload: content.clone(),
                    display_in_ui: *display,
                });
                ids.push(entry.id.clone());
            }
        }
        EntryBody::BranchSummary { summary, .. } => {
            if !summary.is_empty() {
                messages.push(Message::user(
                    format!("[Branch summary: {summary}]"),
                    entry.timestamp_ms,
                ));
                ids.push(entry.id.clone());
            }
        }
        _ => {}
    };

    match compaction_idx {
        Some(idx) => {
            let EntryBody::Compaction {
                summary,
                first_kept_entry_id,
                ..
            } = &path[idx].body
            else {
                unreachable!("compaction_idx only set for Compaction entries")
            };

            messages.push(Message::user(
                format!("[Context compacted. Summary:\n{summary}]"),
                path[idx].timestamp_ms,
            ));
            source_entry_ids.push(path[idx].id.clone());

            let mut found_first_kept = false;
            for entry in &path[..idx] {
                if entry.id == *first_kept_entry_id {
                    found_first_kept = true;
                }
                if found_first_kept {
                    append(&mut messages, &mut source_entry_ids, entry);
                }
            }
            for entry in &path[idx + 1..] {
                append(&mut messages, &mut source_entry_ids, entry);
            }
        }
        None => {
            for entry in &path {
                append(&mut messages, &mut source_entry_ids, entry);
            }
        }
    }

    Context {
        messages,
        thinking_level,
        model,
        source_entry_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryBody;
    use corvid_llm::StopReason;

    fn entry(id: &str, parent: Option<&str>, body: EntryBody) -> SessionEntry {
        SessionEntry {
            id: id.to_string(),
            parent_id: parent.map(str::to_string),
            timestamp_ms: 1,
            body,
        }
    }

    #[test]
    fn empty_leaf_yields_empty_context() {
        let by_id = HashMap::new();
        let ctx = build_session_context(None, &by_id);
        assert!(ctx.messages.is_empty());
        assert_eq!(ctx.thinking_level, "off");
    }

    #[test]
    fn walks_parent_chain_in_root_to_leaf_order() {
        let mut by_id = HashMap::new();
        by_id.insert(
            "a".to_string(),
            entry(
                "a",
                None,
                EntryBody::Message {
                    message: Message::user("first", 1),
                },
            ),
        );
        by_id.insert(
            "b".to_string(),
            entry(
                "b",
                Some("a"),
                EntryBody::Message {
                    message: Message::user("second", 2),
                },
            ),
        );
        let ctx = build_session_context(Some("b"), &by_id);
        assert_eq!(ctx.messages.len(), 2);
        match &ctx.messages[0] {
            Message::User { parts, .. } => {
                let corvid_llm::UserPart::Text(t) = &parts[0] else {
                    panic!("expected text")
                };
                assert_eq!(t.text, "first");
            }
            _ => panic!("expected user"),
        }
    }

    #[test]
    fn compaction_replaces_prefix_with_summary() {
        let mut by_id = HashMap::new();
        by_id.insert(
            "a".to_string(),
            entry(
                "a",
                None,
                EntryBody::Message {
                    message: Message::user("old", 1),
                },
            ),
        );
        by_id.insert(
            "b".to_string(),
            entry(
                "b",
                Some("a"),
                EntryBody::Compaction {
                    summary: "summary text".to_string(),
                    first_kept_entry_id: "a".to_string(),
                    tokens_before: 100,
                    details: None,
                    from_hook: false,
                },
            ),
        );
        by_id.insert(
            "c".to_string(),
            entry(
                "c",
                Some("b"),
                EntryBody::Message {
                    message: Message::assistant("new", "anthropic", "m", StopReason::Stop, 3),
                },
            ),
        );
        let ctx = build_session_context(Some("c"), &by_id);
        // synthetic summary + kept "a" (first_kept_entry_id = a) + "c"
        assert_eq!(ctx.messages.len(), 3);
        assert_eq!(ctx.model, Some(ModelRef { provider: "anthropic".into(), model_id: "m".into() }));
    }
}
