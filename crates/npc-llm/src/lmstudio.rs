use std::time::Duration;

use async_trait::async_trait;
use npc_core::ToolInvocation;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::error::ProviderError;
use crate::http;
use crate::provider::*;

/// Key LM Studio accepts when none is configured.
pub const DEFAULT_API_KEY: &str = "lm-studio";

/// LM Studio provider using the OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct LmStudioProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
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
    /// JSON-encoded object.
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

impl LmStudioProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> npc_core::Result<Self> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| DEFAULT_API_KEY.to_string());
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
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

    /// Convert tool calls whose arguments decode to a JSON object. Others are
    /// logged and dropped.
    fn tool_uses(calls: Vec<ToolCall>) -> Vec<ToolInvocation> {
        calls
            .into_iter()
            .filter_map(|call| {
                let raw = if call.function.arguments.trim().is_empty() {
                    "{}"
                } else {
                    call.function.arguments.as_str()
                };
                match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw) {
                    Ok(args) => Some(ToolInvocation::new(call.function.name, args)),
                    Err(e) => {
                        error!(
                            tool = %call.function.name,
                            arguments = %call.function.arguments,
                            error = %e,
                            "failed to parse tool call arguments"
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl LlmProvider for LmStudioProvider {
    fn name(&self) -> &str {
        "lmstudio"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        let body = self.request_body(request);
        let url = format!("{}/v1/chat/completions", self.base_url);

        info!(
            url = %url,
            model = %self.model,
            tools = request.tools().len(),
            "sending request to LM Studio"
        );
        debug!(body = %body, "LM Studio request details");

        let raw = http::send(
            self.client.post(&url).bearer_auth(&self.api_key).json(&body),
            self.name(),
            &self.model,
        )
        .await?;

        let parsed: CompletionResponse = serde_json::from_str(&raw)
            .map_err(|e| http::bad_response(self.name(), &self.model, e))?;

        let total_tokens = parsed.usage.map(|u| u.total_tokens).unwrap_or_default();
        let Some(choice) = parsed.choices.into_iter().next() else {
            warn!(model = %self.model, "LM Studio returned no choices");
            return Err(http::bad_response(self.name(), &self.model, "no choices in response"));
        };

        let text = choice.message.content.unwrap_or_default();
        let tool_uses = Self::tool_uses(choice.message.tool_calls);

        info!(
            content_length = text.len(),
            tool_calls = tool_uses.len(),
            finish_reason = choice.finish_reason.as_deref().unwrap_or(""),
            total_tokens,
            "received response from LM Studio"
        );

        Ok(LlmResponse { text, tool_uses })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    #[test]
    fn test_default_api_key() {
        let p = LmStudioProvider::new("http://h:1234", "m", None, Duration::from_secs(1)).unwrap();
        assert_eq!(p.api_key(), DEFAULT_API_KEY);
        let p = LmStudioProvider::new("http://h:1234", "m", Some(String::new()), Duration::from_secs(1)).unwrap();
        assert_eq!(p.api_key(), DEFAULT_API_KEY);
        let p = LmStudioProvider::new("http://h:1234", "m", Some("sk-1".into()), Duration::from_secs(1)).unwrap();
        assert_eq!(p.api_key(), "sk-1");
    }

    #[test]
    fn test_tool_arguments_decoded_from_string() {
        let uses = LmStudioProvider::tool_uses(vec![
            call("speak", r#"{"message":"hello"}"#),
            call("continue_thinking", ""),
        ]);
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].tool_name, "speak");
        assert_eq!(uses[0].args["message"], "hello");
        assert!(uses[1].args.is_empty());
    }

    #[test]
    fn test_unparsable_arguments_skipped() {
        let uses = LmStudioProvider::tool_uses(vec![
            call("broken", "{not json"),
            call("array", "[1,2]"),
            call("ok", "{}"),
        ]);
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].tool_name, "ok");
    }
}
