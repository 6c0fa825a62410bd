use std::sync::Arc;
use std::time::Instant;

use npc_config::NpcConfig;
use npc_llm::LlmProvider;
use npc_runtime::{NpcStore, Orchestrator, ScratchpadStorage, SessionManager, ToolRegistry};
use tracing::info;

/// Shared server state.
pub struct AppState {
    pub npcs: NpcStore,
    /// Global tools: `continue_thinking` plus the scratchpad tools.
    pub registry: Arc<ToolRegistry>,
    pub scratchpad: Arc<ScratchpadStorage>,
    pub sessions: SessionManager,
    pub orchestrator: Orchestrator,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the runtime together and start the session sweeper.
    /// Must be called inside a tokio runtime.
    pub fn build(provider: Arc<dyn LlmProvider>, config: &NpcConfig) -> npc_core::Result<Self> {
        Self::assemble(
            provider,
            config,
            SessionManager::with_sweeper(&config.sessions),
        )
    }

    /// Like [`build`](Self::build) but without a background sweeper.
    pub fn without_sweeper(
        provider: Arc<dyn LlmProvider>,
        config: &NpcConfig,
    ) -> npc_core::Result<Self> {
        Self::assemble(
            provider,
            config,
            SessionManager::new(config.sessions.expiration()),
        )
    }

    fn assemble(
        provider: Arc<dyn LlmProvider>,
        config: &NpcConfig,
        sessions: SessionManager,
    ) -> npc_core::Result<Self> {
        let scratchpad = Arc::new(ScratchpadStorage::new());
        let mut registry = ToolRegistry::new();
        scratchpad.register_tools(&mut registry)?;
        info!(tools = registry.len(), "global tool registry ready");

        let orchestrator =
            Orchestrator::new(provider).with_max_depth(config.orchestrator.max_thinking_depth);

        Ok(Self {
            npcs: NpcStore::new(),
            registry: Arc::new(registry),
            scratchpad,
            sessions,
            orchestrator,
            started_at: Instant::now(),
        })
    }
}
