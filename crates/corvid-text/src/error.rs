/// Errors from the text pipeline. Kept intentionally small: most of the
/// pipeline degrades gracefully (an out-of-range slice yields an empty
/// string) rather than erroring, mirroring the reference implementation.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    #[error("invalid wrap width: {0} (must be > 0)")]
    InvalidWrapWidth(usize),
}

pub type Result<T> = std::result::Result<T, TextError>;
