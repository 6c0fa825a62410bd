use thiserror::Error;

/// Unified error type for the NPC backend.
#[derive(Error, Debug)]
pub enum NpcError {
    // ── Tool errors ────────────────────────────────────────────
    #[error("unknown tool: {0}")]
    ToolNotFound(String),

    #[error("tool {0} already registered")]
    ToolAlreadyRegistered(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("tool execution failed: {tool}: {reason}")]
    ToolExecution { tool: String, reason: String },

    // ── Session / identity errors ──────────────────────────────
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("NPC with ID {0} not found")]
    NpcNotFound(String),

    // ── Prompt errors ──────────────────────────────────────────
    #[error("error rendering {section}: {reason}")]
    Render { section: String, reason: String },

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl NpcError {
    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means the caller asked for something that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            NpcError::ToolNotFound(_) | NpcError::SessionNotFound(_) | NpcError::NpcNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, NpcError>;
