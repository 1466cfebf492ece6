#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    #[error("terminal io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TerminalError>;
