use async_trait::async_trait;
use npc_core::{ToolDeclaration, ToolInvocation};

use crate::error::ProviderError;

/// One provider call: a system prompt, a single user turn and the tools the
/// model may invoke.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub prompt: String,
    /// `None` means no tools are offered. An empty list is normalized to `None`.
    pub tools: Option<Vec<ToolDeclaration>>,
}

impl LlmRequest {
    pub fn new(system_prompt: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
            tools: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = (!tools.is_empty()).then_some(tools);
        self
    }

    /// Tools offered to the model, empty when none.
    pub fn tools(&self) -> &[ToolDeclaration] {
        self.tools.as_deref().unwrap_or_default()
    }
}

/// What the model produced: free text plus zero or more tool invocations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmResponse {
    pub text: String,
    pub tool_uses: Vec<ToolInvocation>,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_uses: Vec::new(),
        }
    }

    pub fn with_tool_use(mut self, invocation: ToolInvocation) -> Self {
        self.tool_uses.push(invocation);
        self
    }
}

/// Trait implemented by each LLM backend (Ollama, LM Studio, mock).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name used in errors and logs, e.g. "ollama".
    fn name(&self) -> &str;

    /// Model identifier this provider sends requests to.
    fn model(&self) -> &str;

    /// Run one inference. Safe to call concurrently.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError>;
}
