use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::NpcConfig;

/// Loads the backend configuration and keeps a shared copy for reloads.
pub struct ConfigLoader {
    config: RwLock<NpcConfig>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > NPC_CONFIG env > ./npc.toml > ~/.npc/npc.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("NPC_CONFIG") {
            return PathBuf::from(p);
        }
        let local = PathBuf::from("npc.toml");
        if local.exists() {
            return local;
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".npc")
            .join("npc.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> npc_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            Self::read_file(&config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            NpcConfig::default()
        };

        let config = Self::apply_env_overrides(config, |key| std::env::var(key).ok());
        Self::check(&config)?;

        Ok(Self {
            config: RwLock::new(config),
            config_path,
        })
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> NpcConfig {
        self.config.read().clone()
    }

    /// Path the config was loaded from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides<F>(mut config: NpcConfig, lookup: F) -> NpcConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LLM_PROVIDER") {
            config.llm.provider = v;
        }
        if let Some(v) = lookup("LLM_TIMEOUT") {
            match v.trim_end_matches('s').parse::<u64>() {
                Ok(secs) => config.llm.timeout_secs = secs,
                Err(_) => warn!(value = %v, "ignoring unparsable LLM_TIMEOUT"),
            }
        }
        if let Some(v) = lookup("OLLAMA_BASE_URL") {
            config.llm.ollama.base_url = v;
        }
        if let Some(v) = lookup("OLLAMA_MODEL") {
            config.llm.ollama.model = v;
        }
        if let Some(v) = lookup("LMSTUDIO_BASE_URL") {
            config.llm.lmstudio.base_url = v;
        }
        if let Some(v) = lookup("LMSTUDIO_MODEL") {
            config.llm.lmstudio.model = v;
        }
        // Config file takes priority for the key, env is the fallback.
        if config.llm.lmstudio.api_key.is_none() {
            config.llm.lmstudio.api_key = lookup("LMSTUDIO_API_KEY");
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = lookup("NPC_LISTEN") {
            config.server.listen = v;
        }
        if let Some(v) = lookup("NPC_SOCKET_PATH") {
            config.server.socket_path = Some(PathBuf::from(v));
        }
        config
    }

    /// Reload the config from disk.
    pub fn reload(&self) -> npc_core::Result<()> {
        if !self.config_path.exists() {
            return Err(npc_core::NpcError::Config(format!(
                "config file not found: {}",
                self.config_path.display()
            )));
        }
        let new_config = Self::read_file(&self.config_path)?;
        let new_config = Self::apply_env_overrides(new_config, |key| std::env::var(key).ok());
        Self::check(&new_config)?;
        *self.config.write() = new_config;
        info!("configuration reloaded");
        Ok(())
    }

    fn read_file(path: &Path) -> npc_core::Result<NpcConfig> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str::<NpcConfig>(&raw).map_err(|e| {
            npc_core::NpcError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Validate config: log warnings, fail on errors.
    fn check(config: &NpcConfig) -> npc_core::Result<()> {
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
                Ok(())
            }
            Err(e) => Err(npc_core::NpcError::Config(e)),
        }
    }
}
