/// Errors from loading, appending to, or listing session journals.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed session entry on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("json error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("session file has no header line")]
    MissingHeader,

    #[error("session file already has a header")]
    DuplicateHeader,

    #[error("no session file is associated with this manager")]
    NoBackingFile,

    #[error("entry {0:?} not found")]
    UnknownEntry(String),

    #[error("exhausted id generation attempts")]
    IdGenerationExhausted,
}

pub type Result<T> = std::result::Result<T, Error>;
