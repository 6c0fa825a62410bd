//! Mock LLM provider for deterministic testing.
//!
//! Returns queued responses in order without making any HTTP calls.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use npc_core::{ToolArgs, ToolInvocation};
use parking_lot::Mutex;

use crate::error::{ProviderError, ProviderErrorKind};
use crate::provider::*;

/// A mock provider that replays pre-configured responses.
///
/// # Example
/// ```
/// use npc_llm::MockProvider;
/// let provider = MockProvider::new()
///     .with_response("I look around the tavern.");
/// ```
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
    model: String,
}

/// A pre-configured outcome of one `generate` call.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Reply(LlmResponse),
    Fail(ProviderErrorKind),
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            model: "mock-model".to_string(),
        }
    }

    /// Queue a plain text reply.
    pub fn with_response(self, text: &str) -> Self {
        self.with_reply(LlmResponse::text(text))
    }

    /// Queue a reply carrying text and a single tool invocation.
    pub fn with_tool_call(self, text: &str, tool: &str, args: serde_json::Value) -> Self {
        let reply = LlmResponse::text(text).with_tool_use(ToolInvocation::from_value(tool, args));
        self.with_reply(reply)
    }

    /// Queue a fully custom reply.
    pub fn with_reply(self, reply: LlmResponse) -> Self {
        self.responses.lock().push_back(MockResponse::Reply(reply));
        self
    }

    /// Queue a failure of the given kind.
    pub fn with_error(self, kind: ProviderErrorKind) -> Self {
        self.responses.lock().push_back(MockResponse::Fail(kind));
        self
    }

    /// Shared handle to the request log, usable after the provider is moved
    /// behind `Arc<dyn LlmProvider>`.
    pub fn recorded_requests(&self) -> Arc<Mutex<Vec<LlmRequest>>> {
        Arc::clone(&self.requests)
    }

    fn next_response(&self) -> MockResponse {
        self.responses.lock().pop_front().unwrap_or_else(|| {
            MockResponse::Reply(LlmResponse::text("(mock: no more queued responses)"))
        })
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        self.requests.lock().push(request.clone());
        match self.next_response() {
            MockResponse::Reply(reply) => Ok(reply),
            MockResponse::Fail(kind) => Err(ProviderError::new(
                self.name(),
                &self.model,
                kind,
                "mock failure",
            )),
        }
    }
}

/// Convenience for building tool arguments in tests.
pub fn args(value: serde_json::Value) -> ToolArgs {
    match value {
        serde_json::Value::Object(map) => map,
        _ => ToolArgs::new(),
    }
}
