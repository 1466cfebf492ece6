use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::context::{build_session_context, Context};
use crate::entry::{EntryBody, SessionEntry, SessionHeader, CURRENT_SESSION_VERSION};
use crate::error::{Error, Result};
use crate::file;
use crate::id::generate_id;
use crate::info::{list_sessions_in_dir, SessionInfo};
use crate::migrate::migrate_to_current_version;

/// Owns one session's entry list and backing `.jsonl` file, and tracks the
/// current *leaf* (where appends attach). Mirrors `SessionManager` in
/// `session_manager.py`.
pub struct SessionManager {
    session_file: Option<PathBuf>,
    sessions_dir: PathBuf,
    cwd: String,
    header: Option<SessionHeader>,
    entries: Vec<SessionEntry>,
    leaf_id: Option<String>,
}

impl SessionManager {
    fn empty(cwd: String, sessions_dir: PathBuf, session_file: Option<PathBuf>) -> Self {
        Self {
            session_file,
            sessions_dir,
            cwd,
            header: None,
            entries: Vec::new(),
            leaf_id: None,
        }
    }

    // ---------------------------------------------------------------
    // Factories
    // ---------------------------------------------------------------

    /// Create a brand new session file under `sessions_dir` (or the
    /// cwd-derived default).
    pub fn create(cwd: &str, sessions_dir: Option<&Path>, parent_session: Option<&str>) -> Result<Self> {
        let dir = file::resolve_sessions_dir(cwd, sessions_dir);
        std::fs::create_dir_all(&dir).map_err(|source| Error::Io {
            path: dir.clone(),
            source,
        })?;

        let session_id = generate_id(&Default::default());
        let path = dir.join(format!("{session_id}.jsonl"));

        let header = SessionHeader {
            id: session_id,
            version: CURRENT_SESSION_VERSION,
            timestamp_ms: now_ms(),
            cwd: cwd.to_string(),
            parent_session: parent_session.map(str::to_string),
        };

        file::append_line(&path, &serde_json::to_string(&header)?)?;

        let mut mgr = Self::empty(cwd.to_string(), dir, Some(path));
        mgr.header = Some(header);
        Ok(mgr)
    }

    /// Create a session backed by a file under a dedicated `in-memory`
    /// sessions directory, isolated from a project's real history. Still a
    /// real file on disk; this format has no in-process-only mode.
    pub fn in_memory(cwd: Option<&str>) -> Result<Self> {
        let cwd = cwd.map(str::to_string).unwrap_or_else(default_cwd);
        let dir = file::default_sessions_root().join("in-memory");
        Self::create(&cwd, Some(&dir), None)
    }

    /// Open an existing session file, running migrations in place if the
    /// on-disk version is stale.
    pub fn open(path: &Path) -> Result<Self> {
        let lines = file::read_lines(path)?;
        let mut iter = lines.into_iter();
        let Some(first) = iter.next() else {
            return Err(Error::MissingHeader);
        };

        let mut header_value: serde_json::Value = serde_json::from_str(&first)
            .map_err(|source| Error::Malformed { line: 1, source })?;
        let mut entry_values: Vec<serde_json::Value> = Vec::new();
        for (i, line) in iter.enumerate() {
            let value: serde_json::Value = serde_json::from_str(&line)
                .map_err(|source| Error::Malformed { line: i + 2, source })?;
            entry_values.push(value);
        }

        let migrated = migrate_to_current_version(&mut header_value, &mut entry_values);

        let header: SessionHeader = serde_json::from_value(header_value.clone())?;
        let entries: Result<Vec<SessionEntry>> = entry_values
            .iter()
            .map(|v| serde_json::from_value(v.clone()).map_err(Into::into))
            .collect();
        let entries = entries?;

        let sessions_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let cwd = header.cwd.clone();
        let leaf_id = entries.last().map(|e| e.id.clone());

        let mut mgr = Self::empty(cwd, sessions_dir, Some(path.to_path_buf()));
        mgr.header = Some(header);
        mgr.entries = entries;
        mgr.leaf_id = leaf_id;

        if migrated {
            mgr.persist_all(&header_value, &entry_values)?;
            tracing::info!(path = %path.display(), "migrated session file to current version");
        }

        Ok(mgr)
    }

    /// Open the most recently modified session for `cwd`, or create a new
    /// one if none exists.
    pub fn continue_recent(cwd: &str, sessions_dir: Option<&Path>) -> Result<Self> {
        let sessions = Self::list_sync(cwd, sessions_dir)?;
        match sessions.first() {
            Some(info) => Self::open(&info.file_path),
            None => Self::create(cwd, sessions_dir, None),
        }
    }

    /// Copy every entry of `source_path` into a new session file whose
    /// header's `parent_session` points back at it.
    pub fn fork_from(source_path: &Path, target_cwd: &str, sessions_dir: Option<&Path>) -> Result<Self> {
        let source = Self::open(source_path)?;
        let mut target = Self::create(
            target_cwd,
            sessions_dir,
            Some(&source_path.display().to_string()),
        )?;
        for entry in &source.entries {
            target.raw_append(entry.clone())?;
        }
        Ok(target)
    }

    // ---------------------------------------------------------------
    // Listing
    // ---------------------------------------------------------------

    pub fn list_sync(cwd: &str, sessions_dir: Option<&Path>) -> Result<Vec<SessionInfo>> {
        let dir = file::resolve_sessions_dir(cwd, sessions_dir);
        list_sessions_in_dir(&dir)
    }

    /// Union `list_sync` results across every per-cwd directory under the
    /// global sessions root, deduplicated by file path.
    pub fn list_all() -> Result<Vec<SessionInfo>> {
        let root = file::default_sessions_root();
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&root).map_err(|source| Error::Io {
            path: root.clone(),
            source,
        })? {
            let entry = entry.map_err(|source| Error::Io {
                path: root.clone(),
                source,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            for info in list_sessions_in_dir(&entry.path())? {
                if seen.insert(info.file_path.clone()) {
                    out.push(info);
                }
            }
        }
        out.sort_by(|a, b| b.updated_at_ms.cmp(&a.updated_at_ms));
        Ok(out)
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    pub fn session_id(&self) -> &str {
        self.header.as_ref().map(|h| h.id.as_str()).unwrap_or("")
    }

    pub fn session_file(&self) -> Option<&Path> {
        self.session_file.as_deref()
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    pub fn header(&self) -> Option<&SessionHeader> {
        self.header.as_ref()
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &str) -> Option<&SessionEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn leaf_id(&self) -> Option<&str> {
        self.leaf_id.as_deref()
    }

    pub fn set_leaf_id(&mut self, id: Option<String>) {
        self.leaf_id = id;
    }

    /// The active path from root to the current leaf.
    pub fn branch(&self) -> Vec<&SessionEntry> {
        let Some(leaf_id) = &self.leaf_id else {
            return Vec::new();
        };
        let Some(mut current) = self.entry(leaf_id) else {
            return Vec::new();
        };
        let mut path = vec![current];
        while let Some(parent_id) = &current.parent_id {
            let Some(parent) = self.entry(parent_id) else {
                break;
            };
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// The most recently appended `label` entry's text for `entry_id`, if
    /// any label has been set on it.
    pub fn label_for(&self, entry_id: &str) -> Option<String> {
        self.entries
            .iter()
            .filter_map(|e| match &e.body {
                EntryBody::Label { target_id, label } if target_id == entry_id => {
                    Some(label.clone())
                }
                _ => None,
            })
            .last()
            .flatten()
    }

    pub fn build_context(&self, leaf_id: Option<&str>) -> Context {
        let by_id: HashMap<String, SessionEntry> = self
            .entries
            .iter()
            .map(|e| (e.id.clone(), e.clone()))
            .collect();
        build_session_context(leaf_id.or(self.leaf_id.as_deref()), &by_id)
    }

    // ---------------------------------------------------------------
    // Append
    // ---------------------------------------------------------------

    fn existing_ids(&self) -> std::collections::HashSet<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    fn append(&mut self, body: EntryBody) -> Result<String> {
        let id = generate_id(&self.existing_ids());
        let entry = SessionEntry {
            id: id.clone(),
            parent_id: self.leaf_id.clone(),
            timestamp_ms: now_ms(),
            body,
        };
        self.raw_append(entry)?;
        Ok(id)
    }

    fn raw_append(&mut self, entry: SessionEntry) -> Result<()> {
        let path = self.session_file.as_deref().ok_or(Error::NoBackingFile)?;
        let line = serde_json::to_string(&entry)?;
        file::append_line(path, &line).inspect_err(|e| {
            tracing::error!(error = %e, "failed to append session entry; continuing in-memory");
        })?;
        self.leaf_id = Some(entry.id.clone());
        self.entries.push(entry);
        Ok(())
    }

    pub fn append_message(&mut self, message: corvid_llm::Message) -> Result<String> {
        self.append(EntryBody::Message { message })
    }

    pub fn append_model_change(&mut self, provider: impl Into<String>, model_id: impl Into<String>) -> Result<String> {
        self.append(EntryBody::ModelChange {
            provider: provider.into(),
            model_id: model_id.into(),
        })
    }

    pub fn append_thinking_level_change(&mut self, level: impl Into<String>) -> Result<String> {
        self.append(EntryBody::ThinkingLevelChange { level: level.into() })
    }

    pub fn append_compaction(
        &mut self,
        summary: impl Into<String>,
        first_kept_entry_id: impl Into<String>,
        tokens_before: u64,
        details: Option<serde_json::Value>,
        from_hook: bool,
    ) -> Result<String> {
        self.append(EntryBody::Compaction {
            summary: summary.into(),
            first_kept_entry_id: first_kept_entry_id.into(),
            tokens_before,
            details,
            from_hook,
        })
    }

    pub fn append_branch_summary(
        &mut self,
        summary: impl Into<String>,
        from_id: impl Into<String>,
        details: Option<serde_json::Value>,
        from_hook: bool,
    ) -> Result<String> {
        self.append(EntryBody::BranchSummary {
            from_id: from_id.into(),
            summary: summary.into(),
            details,
            from_hook,
        })
    }

    pub fn append_session_info(&mut self, name: Option<String>) -> Result<String> {
        self.append(EntryBody::SessionInfo { name })
    }

    pub fn append_custom_message(
        &mut self,
        kind: impl Into<String>,
        content: serde_json::Value,
        display: bool,
    ) -> Result<String> {
        self.append(EntryBody::CustomMessage {
            kind: kind.into(),
            content,
            display,
        })
    }

    pub fn append_custom(&mut self, kind: impl Into<String>, data: Option<serde_json::Value>) -> Result<String> {
        self.append(EntryBody::Custom {
            kind: kind.into(),
            data,
        })
    }

    pub fn append_label(&mut self, target_id: impl Into<String>, label: Option<String>) -> Result<String> {
        self.append(EntryBody::Label {
            target_id: target_id.into(),
            label,
        })
    }

    /// Move the current leaf to `target_id`, checking out an earlier point
    /// in the tree. Does not rewrite history: the next `append_*` call
    /// links its new entry off `target_id`, diverging the branch in place
    /// (§4.3 "Leaf"). Callers that want the abandoned branch's work
    /// preserved in the derived context should append a `branch_summary`
    /// entry themselves before checking out.
    pub fn checkout(&mut self, target_id: &str) -> Result<()> {
        if self.entry(target_id).is_none() {
            return Err(Error::UnknownEntry(target_id.to_string()));
        }
        self.leaf_id = Some(target_id.to_string());
        Ok(())
    }

    // ---------------------------------------------------------------
    // Internal
    // ---------------------------------------------------------------

    fn persist_all(&self, header: &serde_json::Value, entries: &[serde_json::Value]) -> Result<()> {
        let Some(path) = &self.session_file else {
            return Ok(());
        };
        let mut lines = vec![header.to_string()];
        lines.extend(entries.iter().map(|v| v.to_string()));
        file::rewrite_all(path, &lines)
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn default_cwd() -> String {
    std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| ".".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_order_leaf_and_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = SessionManager::create("/project", Some(dir.path()), None).unwrap();

        mgr.append_message(corvid_llm::Message::user("hello", 1)).unwrap();
        mgr.append_message(corvid_llm::Message::assistant(
            "hi there",
            "anthropic",
            "m",
            corvid_llm::StopReason::Stop,
            2,
        ))
        .unwrap();

        let path = mgr.session_file().unwrap().to_path_buf();
        let ids_before: Vec<String> = mgr.entries().iter().map(|e| e.id.clone()).collect();
        let leaf_before = mgr.leaf_id().map(str::to_string);
        let ctx_before = mgr.build_context(None);

        let reopened = SessionManager::open(&path).unwrap();
        let ids_after: Vec<String> = reopened.entries().iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids_before, ids_after);
        assert_eq!(leaf_before.as_deref(), reopened.leaf_id());

        let ctx_after = reopened.build_context(None);
        assert_eq!(ctx_before.messages.len(), ctx_after.messages.len());
    }

    #[test]
    fn fork_copies_history_and_links_parent_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = SessionManager::create("/project", Some(dir.path()), None).unwrap();
        source.append_message(corvid_llm::Message::user("hi", 1)).unwrap();
        let source_path = source.session_file().unwrap().to_path_buf();

        let forked = SessionManager::fork_from(&source_path, "/project", Some(dir.path())).unwrap();
        assert_eq!(forked.entries().len(), source.entries().len());
        assert_eq!(
            forked.header().unwrap().parent_session.as_deref(),
            Some(source_path.display().to_string().as_str())
        );
        assert_eq!(forked.leaf_id(), source.leaf_id());
    }

    #[test]
    fn checkout_diverges_without_rewriting_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = SessionManager::create("/project", Some(dir.path()), None).unwrap();
        let first = mgr.append_message(corvid_llm::Message::user("a", 1)).unwrap();
        mgr.append_message(corvid_llm::Message::user("b", 2)).unwrap();

        mgr.checkout(&first).unwrap();
        mgr.append_message(corvid_llm::Message::user("c", 3)).unwrap();

        assert_eq!(mgr.entries().len(), 3);
        let branch: Vec<&str> = mgr.branch().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(branch.len(), 2);
        assert_eq!(branch[0], first);
    }
}
