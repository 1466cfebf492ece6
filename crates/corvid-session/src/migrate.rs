use std::collections::HashSet;

use serde_json::Value;

use crate::entry::CURRENT_SESSION_VERSION;
use crate::id::generate_id;

/// Migrations operate on the raw JSON lines (header first, then entries) so
/// that a malformed or pre-`id`/`parent_id` file can still be read and
/// upgraded before it is parsed into [`crate::entry::SessionEntry`]. Mirrors
/// `session_manager.py`'s `migrate_v1_to_v2`/`migrate_v2_to_v3`, which mutate
/// plain dicts in place for the same reason.
pub fn migrate_to_current_version(header: &mut Value, entries: &mut [Value]) -> bool {
    let version = header
        .get("version")
        .and_then(Value::as_u64)
        .unwrap_or(1) as u32;

    if version >= CURRENT_SESSION_VERSION {
        return false;
    }

    if version < 2 {
        migrate_v1_to_v2(header, entries);
    }
    if version < 3 {
        migrate_v2_to_v3(header, entries);
    }

    true
}

/// v1 -> v2: give every entry an `id`/`parent_id`, forming the tree. A v1
/// compaction entry's `first_kept_entry_index` (position in the file) is
/// resolved to the id of the entry at that position.
fn migrate_v1_to_v2(header: &mut Value, entries: &mut [Value]) {
    let mut ids: HashSet<String> = HashSet::new();
    let mut prev_id: Option<String> = None;
    let mut resolved_ids: Vec<String> = Vec::with_capacity(entries.len());

    for entry in entries.iter_mut() {
        let id = generate_id(&ids);
        ids.insert(id.clone());
        if let Value::Object(map) = entry {
            map.insert("id".to_string(), Value::String(id.clone()));
            map.insert(
                "parent_id".to_string(),
                prev_id.clone().map(Value::String).unwrap_or(Value::Null),
            );
        }
        prev_id = Some(id.clone());
        resolved_ids.push(id);
    }

    for entry in entries.iter_mut() {
        let is_compaction = entry.get("type").and_then(Value::as_str) == Some("compaction");
        if !is_compaction {
            continue;
        }
        let idx = entry
            .get("first_kept_entry_index")
            .and_then(Value::as_u64)
            .map(|n| n as usize);
        if let (Some(idx), Value::Object(map)) = (idx, entry) {
            if let Some(target_id) = resolved_ids.get(idx) {
                map.remove("first_kept_entry_index");
                map.insert(
                    "first_kept_entry_id".to_string(),
                    Value::String(target_id.clone()),
                );
            }
        }
    }

    if let Value::Object(map) = header {
        map.insert("version".to_string(), Value::from(2u32));
    }
}

/// v2 -> v3: rename the legacy `hook_message` role to `custom` on any
/// message entry.
fn migrate_v2_to_v3(header: &mut Value, entries: &mut [Value]) {
    for entry in entries.iter_mut() {
        if entry.get("type").and_then(Value::as_str) != Some("message") {
            continue;
        }
        if let Some(message) = entry.get_mut("message") {
            if message.get("role").and_then(Value::as_str) == Some("hook_message") {
                if let Value::Object(map) = message {
                    map.insert("role".to_string(), Value::String("custom".to_string()));
                }
            }
        }
    }

    if let Value::Object(map) = header {
        map.insert("version".to_string(), Value::from(3u32));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn v1_entries_gain_id_and_parent_chain() {
        let mut header = json!({"type": "session", "version": 1});
        let mut entries = vec![
            json!({"type": "message", "message": {"role": "user"}}),
            json!({"type": "message", "message": {"role": "assistant"}}),
        ];
        let changed = migrate_to_current_version(&mut header, &mut entries);
        assert!(changed);
        assert_eq!(header["version"], 3);
        assert!(entries[0]["id"].is_string());
        assert_eq!(entries[1]["parent_id"], entries[0]["id"]);
    }

    #[test]
    fn current_version_is_a_fixed_point() {
        let mut header = json!({"type": "session", "version": 3});
        let mut entries = vec![json!({"type": "message", "id": "a", "message": {"role": "user"}})];
        let before = entries.clone();
        let changed = migrate_to_current_version(&mut header, &mut entries);
        assert!(!changed);
        assert_eq!(entries, before);
    }

    #[test]
    fn hook_message_role_becomes_custom() {
        let mut header = json!({"type": "session", "version": 2});
        let mut entries = vec![json!({
            "type": "message",
            "id": "a",
            "message": {"role": "hook_message"},
        })];
        migrate_to_current_version(&mut header, &mut entries);
        assert_eq!(entries[0]["message"]["role"], "custom");
    }

    #[test]
    fn applying_migrations_twice_equals_once() {
        let mut header = json!({"type": "session", "version": 1});
        let mut entries = vec![json!({"type": "message", "message": {"role": "user"}})];
        migrate_to_current_version(&mut header, &mut entries);
        let once = entries.clone();
        migrate_to_current_version(&mut header, &mut entries);
        assert_eq!(entries, once);
    }
}
