use std::sync::Arc;

use npc_config::LlmConfig;
use npc_core::{NpcError, Result};
use tracing::info;

use crate::lmstudio::LmStudioProvider;
use crate::ollama::OllamaProvider;
use crate::provider::LlmProvider;

/// Build the provider named by `config.provider` (case-insensitive).
pub fn new_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.to_lowercase().as_str() {
        "ollama" => {
            info!(
                base_url = %config.ollama.base_url,
                model = %config.ollama.model,
                "creating Ollama provider"
            );
            Ok(Arc::new(OllamaProvider::new(
                &config.ollama.base_url,
                &config.ollama.model,
                config.timeout(),
            )?))
        }
        "lmstudio" | "lm-studio" => {
            info!(
                base_url = %config.lmstudio.base_url,
                model = %config.lmstudio.model,
                "creating LM Studio provider"
            );
            Ok(Arc::new(LmStudioProvider::new(
                &config.lmstudio.base_url,
                &config.lmstudio.model,
                config.lmstudio.api_key.clone(),
                config.timeout(),
            )?))
        }
        _ => Err(NpcError::Config(format!(
            "unsupported LLM provider: {}",
            config.provider
        ))),
    }
}
