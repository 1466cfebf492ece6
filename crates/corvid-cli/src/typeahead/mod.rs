pub mod commands;
pub mod mentions;
pub mod provider;

pub use commands::Command;
pub use mentions::{FileMentionSource, Mention};
pub use provider::{
    CachedPrefixSource, TypeaheadItem, TypeaheadMatchSet, TypeaheadProvider, TypeaheadSource,
    extract_query_token,
};
