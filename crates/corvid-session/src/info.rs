use std::path::{Path, PathBuf};

use corvid_llm::Message;

use crate::entry::{EntryBody, SessionHeader};
use crate::error::Result;
use crate::file::read_lines;

/// A lightweight summary of a session file, built without deriving a full
/// [`crate::context::Context`] — mirrors `_build_session_info_sync` in
/// `session_manager.py`, which keeps `list`/`list_all` cheap even for large
/// session directories by only scanning for `label`/first-user-message.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: String,
    pub file_path: PathBuf,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub label: Option<String>,
    pub entry_count: usize,
    pub cwd: String,
    pub parent_session: Option<String>,
    pub first_message: String,
}

/// Scan a session file's lines without parsing full entries, looking only
/// for the header, the most recent `label`/`session_info` name, and the
/// first user message's text.
pub fn build_session_info(path: &Path) -> Result<Option<SessionInfo>> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return Ok(None),
    };
    let updated_at_ms = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let lines = read_lines(path)?;
    let mut lines = lines.into_iter();

    let Some(first_line) = lines.next() else {
        return Ok(None);
    };
    let Ok(header) = serde_json::from_str::<SessionHeader>(&first_line) else {
        return Ok(None);
    };

    let mut label: Option<String> = None;
    let mut entry_count = 0usize;
    let mut first_message = String::new();

    for line in lines {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&line) else {
            continue;
        };
        entry_count += 1;
        match value.get("type").and_then(serde_json::Value::as_str) {
            Some("session_info") => {
                if let Some(name) = value.get("name").and_then(serde_json::Value::as_str) {
                    label = Some(name.to_string());
                }
            }
            Some("label") => {
                label = value
                    .get("label")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
                    .or(label);
            }
            Some("message") if first_message.is_empty() => {
                if let Ok(EntryBody::Message {
                    message: Message::User { parts, .. },
                }) = serde_json::from_value::<EntryBody>(value.clone())
                {
                    for part in parts {
                        if let corvid_llm::UserPart::Text(text) = part {
                            first_message = text.text.chars().take(200).collect();
                            break;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(Some(SessionInfo {
        session_id: header.id,
        file_path: path.to_path_buf(),
        created_at_ms: header.timestamp_ms,
        updated_at_ms,
        label,
        entry_count,
        cwd: header.cwd,
        parent_session: header.parent_session,
        first_message,
    }))
}

/// Enumerate `.jsonl` files directly under `dir` and build a [`SessionInfo`]
/// for each, sorted by `updated_at_ms` descending.
pub fn list_sessions_in_dir(dir: &Path) -> Result<Vec<SessionInfo>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut infos = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|source| crate::error::Error::Io {
        path: dir.to_path_buf(),
        source,
    })? {
        let entry = entry.map_err(|source| crate::error::Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        if let Some(info) = build_session_info(&path)? {
            infos.push(info);
        }
    }
    infos.sort_by(|a, b| b.updated_at_ms.cmp(&a.updated_at_ms));
    Ok(infos)
}
