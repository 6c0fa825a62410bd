//! Plumbing shared by the HTTP-backed providers.

use std::time::Duration;

use npc_core::ToolDeclaration;
use serde_json::{Value, json};
use tracing::error;

use crate::error::{ProviderError, ProviderErrorKind};

/// A client whose every request is bounded by `timeout`.
pub(crate) fn build_client(timeout: Duration) -> npc_core::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| npc_core::NpcError::Config(format!("failed to build HTTP client: {e}")))
}

/// OpenAI-style function tool list, shared by both wire formats.
pub(crate) fn function_tools(tools: &[ToolDeclaration]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters_schema(),
                }
            })
        })
        .collect()
}

/// The system turn is omitted when the system prompt is empty.
pub(crate) fn chat_messages(system_prompt: &str, prompt: &str) -> Vec<Value> {
    let mut messages = Vec::with_capacity(2);
    if !system_prompt.is_empty() {
        messages.push(json!({ "role": "system", "content": system_prompt }));
    }
    messages.push(json!({ "role": "user", "content": prompt }));
    messages
}

/// Classify a transport failure (no HTTP status received).
pub(crate) fn send_error(provider: &str, model: &str, err: &reqwest::Error) -> ProviderError {
    error!(provider, model, error = %err, "failed to send request");
    if err.is_timeout() {
        ProviderError::new(provider, model, ProviderErrorKind::Timeout, "request timed out")
    } else if err.is_connect() {
        ProviderError::new(
            provider,
            model,
            ProviderErrorKind::Unavailable,
            format!("failed to connect to {provider}"),
        )
    } else {
        ProviderError::new(
            provider,
            model,
            ProviderErrorKind::Other(err.to_string()),
            "request failed",
        )
    }
}

/// Classify a non-success HTTP status.
pub(crate) fn status_error(provider: &str, model: &str, status: u16, body: &str) -> ProviderError {
    error!(provider, model, status_code = status, body, "provider returned non-success status");
    let kind = ProviderErrorKind::from_status(status);
    let message = match kind {
        ProviderErrorKind::BadRequest => "invalid request parameters".to_string(),
        ProviderErrorKind::Unauthorized => "authentication failed".to_string(),
        ProviderErrorKind::ModelNotFound => format!("model '{model}' not found"),
        ProviderErrorKind::RateLimited => "rate limit exceeded".to_string(),
        ProviderErrorKind::Unavailable => format!("{provider} service unavailable"),
        ProviderErrorKind::Timeout => "gateway timeout".to_string(),
        ProviderErrorKind::Other(_) => body.to_string(),
    };
    ProviderError::new(provider, model, kind, message)
}

pub(crate) fn bad_response(provider: &str, model: &str, reason: impl std::fmt::Display) -> ProviderError {
    ProviderError::new(
        provider,
        model,
        ProviderErrorKind::Other(format!("malformed response: {reason}")),
        "invalid response format",
    )
}

/// Send a prepared request and return the raw body of a success response.
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    provider: &str,
    model: &str,
) -> Result<String, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| send_error(provider, model, &e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| send_error(provider, model, &e))?;

    if !status.is_success() {
        return Err(status_error(provider, model, status.as_u16(), &body));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_with_timeout() {
        assert!(build_client(Duration::from_millis(250)).is_ok());
    }

    #[test]
    fn test_chat_messages_skip_empty_system_turn() {
        let messages = chat_messages("", "hello");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }
}
