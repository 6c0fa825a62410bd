//! The multi-round inference loop for one NPC tick.
//!
//! Each round renders the perception, asks the provider for a response and
//! runs the returned tool calls in order. If the model called
//! `continue_thinking`, a tool set is present and the depth budget allows,
//! another round runs whose events are the previous round's tool results.

use std::sync::Arc;

use npc_core::{
    CONTINUE_THINKING, Npc, Perception, TickEvent, ToolArgs, ToolInvocation, ToolProvider,
};
use npc_llm::{LlmProvider, LlmRequest, ProviderError};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::prompt;

/// Continuation rounds allowed after the first one.
pub const DEFAULT_MAX_THINKING_DEPTH: u32 = 3;

/// Everything the orchestrator needs for one tick besides the NPC itself.
#[derive(Clone, Default)]
pub struct TickInput {
    pub perception: Perception,
    /// Effective tool set. `None` means the model is offered no tools.
    pub tools: Option<Arc<dyn ToolProvider>>,
    /// Identity passed to tool handlers. Defaults to the NPC's name.
    pub caller_id: Option<String>,
}

impl TickInput {
    pub fn new(perception: Perception) -> Self {
        Self {
            perception,
            tools: None,
            caller_id: None,
        }
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolProvider>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_caller(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }
}

/// One executed tool call as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolReport {
    pub tool_name: String,
    pub args: ToolArgs,
    pub success: bool,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolReport {
    /// The follow-up event fed to the next round.
    fn to_event(&self) -> TickEvent {
        let event_type = if self.success {
            "tool_execution"
        } else {
            "tool_error"
        };
        let mut description = format!("Tool '{}' executed", self.tool_name);
        if !self.response.is_empty() {
            description.push_str(&format!(" - Response: {}", self.response));
        }
        if let Some(err) = &self.error {
            description.push_str(&format!(" - Error: {err}"));
        }
        TickEvent::new(event_type, description)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRound {
    pub round_number: u32,
    pub llm_response: String,
    pub tools_used: Vec<ToolReport>,
    pub success: bool,
}

/// Outcome of a whole tick. Rounds are numbered from 1 without gaps.
#[derive(Debug, Clone, Serialize)]
pub struct TickResult {
    pub rounds: Vec<InferenceRound>,
    /// All round texts, joined. Every round carries an `=== Inference N ===`
    /// header unless the tick was a single round.
    pub llm_response: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// The provider failure that ended the tick, if that is what happened.
    #[serde(skip)]
    pub provider_error: Option<ProviderError>,
}

/// Why a round could not complete.
enum RoundFailure {
    /// Knowledge-graph data is a JSON map, so rendering cannot fail today;
    /// kept so a future section with a fallible encoding ends the tick cleanly.
    Render(String),
    Provider(ProviderError),
}

struct RoundOutput {
    text: String,
    reports: Vec<ToolReport>,
    wants_continue: bool,
    offered_tools: bool,
}

/// Drives ticks against one provider.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    max_depth: u32,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            max_depth: DEFAULT_MAX_THINKING_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Run one tick. Never fails outright: failures land in the result.
    pub async fn act(&self, npc: &Npc, input: TickInput) -> TickResult {
        let caller = input.caller_id.unwrap_or_else(|| npc.name.clone());
        let system_prompt = prompt::system_prompt(npc);
        let tools = input.tools;
        let mut perception = input.perception;

        let mut rounds: Vec<InferenceRound> = Vec::new();
        let mut segments: Vec<String> = Vec::new();
        let mut depth = 0u32;

        loop {
            let output = match self
                .round(npc, &caller, &system_prompt, &perception, tools.as_ref(), depth)
                .await
            {
                Ok(output) => output,
                Err(failure) => return Self::failed(rounds, segments, failure),
            };

            let round_number = depth + 1;
            let continues = output.wants_continue && output.offered_tools && depth < self.max_depth;

            if depth == 0 && !continues {
                segments.push(output.text.clone());
            } else {
                segments.push(format!("=== Inference {round_number} ===\n{}", output.text));
            }

            let events: Vec<TickEvent> = output.reports.iter().map(ToolReport::to_event).collect();
            rounds.push(InferenceRound {
                round_number,
                llm_response: output.text,
                tools_used: output.reports,
                success: true,
            });

            if !continues {
                if output.wants_continue {
                    debug!(npc = %npc.name, depth, "continue_thinking ignored, depth or tools exhausted");
                }
                return TickResult {
                    rounds,
                    llm_response: segments.join("\n"),
                    success: true,
                    error_message: None,
                    provider_error: None,
                };
            }

            info!(npc = %npc.name, current_depth = depth, "NPC continuing thinking");
            perception.events = events;
            depth += 1;
        }
    }

    async fn round(
        &self,
        npc: &Npc,
        caller: &str,
        system_prompt: &str,
        perception: &Perception,
        tools: Option<&Arc<dyn ToolProvider>>,
        depth: u32,
    ) -> Result<RoundOutput, RoundFailure> {
        let user_prompt = prompt::render_user_prompt(perception).map_err(|e| {
            error!(npc = %npc.name, error = %e, "failed to render prompt");
            RoundFailure::Render(e.to_string())
        })?;

        info!(
            npc = %npc.name,
            depth,
            surroundings = perception.surroundings.len(),
            events = perception.events.len(),
            knowledge_graph_nodes = perception.knowledge_graph.nodes.len(),
            knowledge_graph_edges = perception.knowledge_graph.edges.len(),
            "NPC acting for tick"
        );

        let mut request = LlmRequest::new(system_prompt, user_prompt);
        if let Some(tools) = tools {
            request = request.with_tools(tools.tools());
        }
        let offered_tools = request.tools.is_some();

        let response = self.provider.generate(&request).await.map_err(|e| {
            error!(
                npc = %npc.name,
                error = %e,
                retryable = e.is_retryable(),
                "error calling LLM"
            );
            RoundFailure::Provider(e)
        })?;

        let wants_continue = response
            .tool_uses
            .iter()
            .any(|t| t.tool_name == CONTINUE_THINKING);

        let reports = match tools {
            Some(tools) => Self::run_tools(npc, caller, tools.as_ref(), &response.tool_uses).await,
            None => {
                if !response.tool_uses.is_empty() {
                    warn!(
                        npc = %npc.name,
                        calls = response.tool_uses.len(),
                        "model called tools but none were offered"
                    );
                }
                Vec::new()
            }
        };

        Ok(RoundOutput {
            text: response.text,
            reports,
            wants_continue,
            offered_tools,
        })
    }

    /// Execute calls sequentially in the order the model produced them.
    async fn run_tools(
        npc: &Npc,
        caller: &str,
        tools: &dyn ToolProvider,
        calls: &[ToolInvocation],
    ) -> Vec<ToolReport> {
        let mut reports = Vec::with_capacity(calls.len());
        for call in calls {
            info!(npc = %npc.name, tool = %call.tool_name, "NPC using tool");
            let report = match tools.execute(caller, call).await {
                Ok(outcome) => {
                    info!(
                        tool = %call.tool_name,
                        success = outcome.success,
                        message = %outcome.message,
                        "tool execution completed"
                    );
                    ToolReport {
                        tool_name: call.tool_name.clone(),
                        args: call.args.clone(),
                        success: outcome.success,
                        response: outcome.message,
                        data: outcome.data,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(tool = %call.tool_name, error = %e, "tool execution failed");
                    ToolReport {
                        tool_name: call.tool_name.clone(),
                        args: call.args.clone(),
                        success: false,
                        response: e.to_string(),
                        data: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            reports.push(report);
        }
        reports
    }

    fn failed(rounds: Vec<InferenceRound>, segments: Vec<String>, failure: RoundFailure) -> TickResult {
        let (error_message, provider_error) = match failure {
            RoundFailure::Render(message) => (message, None),
            RoundFailure::Provider(e) => (format!("Error calling LLM: {e}"), Some(e)),
        };
        TickResult {
            rounds,
            llm_response: segments.join("\n"),
            success: false,
            error_message: Some(error_message),
            provider_error,
        }
    }
}
