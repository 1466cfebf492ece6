/// Errors surfaced by the session controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("session store: {0}")]
    Session(#[from] corvid_session::Error),

    #[error("agent loop: {0}")]
    Loop(#[from] corvid_core::LoopError),

    #[error("language model: {0}")]
    Llm(#[from] corvid_llm::Error),

    #[error("no api key available for {provider}/{model_id}")]
    NoApiKey { provider: String, model_id: String },

    #[error("no model is currently set")]
    NoModel,

    #[error("summarization failed: {0}")]
    Summarization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
