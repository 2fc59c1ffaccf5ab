//! Text-generation side of the rollup: the provider seam, the OpenAI
//! chat-completions client, and the prompt/summary logic built on top.

pub mod openai;
pub mod prompt;
pub mod provider;
pub mod summarize;

pub use openai::OpenAiProvider;
pub use provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, Role};
pub use summarize::Summarizer;
