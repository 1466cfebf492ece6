pub mod error;
pub mod model;
pub mod provider;
pub mod request;
pub mod response;
pub mod stream;

pub use error::Error;
pub use model::{LanguageModel, LanguageModelBackend};
pub use provider::{LanguageModelProvider, LanguageModelProviderBackend};
pub mod describe;

pub use describe::Describe;
pub use request::{
    AssistantPart, GenerateOptions, GenerateRequest, ImagePart, Message, Property, ReasoningPart,
    StopReason, Schema, SystemPart, TextPart, Tool, ToolCallPart, ToolChoice, ToolResultPart,
    UserPart,
};
pub use response::{GenerateResult, Response};
pub use stream::{FinishReason, StreamEvent, Usage};
