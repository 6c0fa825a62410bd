use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use npc_core::{Result, ToolDeclaration, ToolInvocation, ToolOutcome, ToolProvider};
use serde_json::json;
use tracing::info;

use crate::registry::ToolRegistry;

/// The global registry overlaid with one session's tool declarations.
///
/// Session tools have no local handler: invoking one yields a successful
/// outcome marked for the game engine to carry out. A session declaration
/// shadows a global tool of the same name.
pub struct CombinedRegistry {
    base: Arc<ToolRegistry>,
    session_tools: BTreeMap<String, ToolDeclaration>,
}

impl CombinedRegistry {
    pub fn new(base: Arc<ToolRegistry>, session_tools: Vec<ToolDeclaration>) -> Self {
        let session_tools = session_tools
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();
        Self {
            base,
            session_tools,
        }
    }

    pub fn is_session_tool(&self, name: &str) -> bool {
        self.session_tools.contains_key(name)
    }

    fn deferred(invocation: &ToolInvocation) -> ToolOutcome {
        ToolOutcome::ok(format!(
            "Session tool '{}' called - to be executed by game engine",
            invocation.tool_name
        ))
        .with_data(json!({
            "session_tool": true,
            "tool_name": invocation.tool_name,
            "args": invocation.args,
        }))
    }
}

#[async_trait]
impl ToolProvider for CombinedRegistry {
    fn tools(&self) -> Vec<ToolDeclaration> {
        let mut tools: Vec<ToolDeclaration> = self
            .base
            .tools()
            .into_iter()
            .filter(|t| !self.session_tools.contains_key(&t.name))
            .collect();
        tools.extend(self.session_tools.values().cloned());
        tools
    }

    async fn execute(&self, npc_id: &str, invocation: &ToolInvocation) -> Result<ToolOutcome> {
        if self.is_session_tool(&invocation.tool_name) {
            info!(npc = %npc_id, tool = %invocation.tool_name, "deferring session tool to game engine");
            return Ok(Self::deferred(invocation));
        }
        self.base.execute(npc_id, invocation).await
    }
}
