//! # npc-llm
//!
//! Abstraction layer over LLM providers. A provider turns a system prompt, a
//! user turn and optional tool declarations into text plus tool invocations,
//! or fails with a [`ProviderError`] drawn from a small fixed taxonomy.

pub mod error;
pub mod factory;
mod http;
pub mod lmstudio;
pub mod mock;
pub mod ollama;
pub mod provider;

pub use error::{ProviderError, ProviderErrorKind, is_retryable};
pub use factory::new_provider;
pub use lmstudio::LmStudioProvider;
pub use mock::{MockProvider, MockResponse};
pub use ollama::OllamaProvider;
pub use provider::{LlmProvider, LlmRequest, LlmResponse};
