//! # npc-config
//!
//! Configuration system for the NPC backend. Reads from `npc.toml` and
//! environment variables, in that precedence order (env wins).

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::NpcConfig;
pub use schema::{
    ConfigWarning, LlmConfig, LmStudioConfig, LoggingConfig, OllamaConfig, OrchestratorConfig,
    ServerConfig, SessionConfig, WarningSeverity,
};
