use std::time::Duration;

use async_trait::async_trait;
use npc_core::ToolInvocation;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::http;
use crate::provider::*;

/// Ollama provider using the native `/api/chat` endpoint.
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: ChatMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Default, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

impl OllamaProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> npc_core::Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// Default local Ollama instance.
    pub fn local(model: &str) -> npc_core::Result<Self> {
        Self::new("http://127.0.0.1:11434", model, Duration::from_secs(30))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body(&self, request: &LlmRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": http::chat_messages(&request.system_prompt, &request.prompt),
            "stream": false,
        });
        if let Some(tools) = &request.tools {
            body["tools"] = json!(http::function_tools(tools));
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        let body = self.request_body(request);
        let url = format!("{}/api/chat", self.base_url);

        info!(
            url = %url,
            model = %self.model,
            tools = request.tools().len(),
            "sending request to Ollama"
        );
        debug!(body = %body, "Ollama request details");

        let raw = http::send(
            self.client.post(&url).json(&body),
            self.name(),
            &self.model,
        )
        .await?;

        let parsed: ChatResponse = serde_json::from_str(&raw)
            .map_err(|e| http::bad_response(self.name(), &self.model, e))?;

        let tool_uses: Vec<ToolInvocation> = parsed
            .message
            .tool_calls
            .into_iter()
            .map(|call| ToolInvocation::from_value(call.function.name, call.function.arguments))
            .collect();

        info!(
            content_length = parsed.message.content.len(),
            tool_calls = tool_uses.len(),
            done_reason = parsed.done_reason.as_deref().unwrap_or(""),
            prompt_tokens = parsed.prompt_eval_count,
            eval_tokens = parsed.eval_count,
            "received response from Ollama"
        );

        Ok(LlmResponse {
            text: parsed.message.content,
            tool_uses,
        })
    }
}
