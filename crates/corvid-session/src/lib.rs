//! Append-only JSONL session journal.
//!
//! One file per session; each line after the header is a [`SessionEntry`]
//! linked to its predecessor by `parent_id`, forming a branching tree.
//! [`manager::SessionManager`] owns a single session's entries and the
//! current leaf; [`context::build_session_context`] derives the
//! LLM-consumable message list for any leaf on demand.

mod context;
mod entry;
mod error;
mod file;
mod id;
mod info;
mod manager;
mod migrate;

pub use context::{build_session_context, Context, ModelRef};
pub use entry::{EntryBody, SessionEntry, SessionHeader, CURRENT_SESSION_VERSION};
pub use error::{Error, Result};
pub use file::escape_cwd;
pub use info::SessionInfo;
pub use manager::SessionManager;
