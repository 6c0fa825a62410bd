use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Provider names accepted by `llm.provider`.
pub const SUPPORTED_PROVIDERS: &[&str] = &["ollama", "lmstudio", "lm-studio"];

/// Largest `orchestrator.max_thinking_depth` accepted by validation.
pub const MAX_THINKING_DEPTH_LIMIT: u32 = 16;

/// Root configuration, maps to `npc.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NpcConfig {
    pub llm: LlmConfig,
    pub orchestrator: OrchestratorConfig,
    pub sessions: SessionConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

// ── LLM ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which backend serves completions: "ollama" or "lmstudio".
    pub provider: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
    pub ollama: OllamaConfig,
    pub lmstudio: LmStudioConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            timeout_secs: 30,
            ollama: OllamaConfig::default(),
            lmstudio: LmStudioConfig::default(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Model name of the active provider.
    pub fn active_model(&self) -> &str {
        match self.provider.to_lowercase().as_str() {
            "lmstudio" | "lm-studio" => &self.lmstudio.model,
            _ => &self.ollama.model,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".into(),
            model: "qwen3:1.7b".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LmStudioConfig {
    pub base_url: String,
    pub model: String,
    /// Bearer token; LM Studio accepts any value, "lm-studio" is used when unset.
    pub api_key: Option<String>,
}

impl Default for LmStudioConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:1234".into(),
            model: "qwen/qwen3-1.7b".into(),
            api_key: None,
        }
    }
}

// ── Orchestrator ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Continuation rounds allowed beyond the first one.
    pub max_thinking_depth: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_thinking_depth: 3,
        }
    }
}

// ── Sessions ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is swept.
    pub expiration_secs: u64,
    /// How often the sweeper runs.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_secs: 60 * 60,
            sweep_interval_secs: 5 * 60,
        }
    }
}

impl SessionConfig {
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP listen address.
    pub listen: String,
    /// Serve on this Unix socket instead of TCP when set.
    pub socket_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".into(),
            socket_path: None,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
        };
        write!(f, "{} {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, " ({})", h)?;
        }
        Ok(())
    }
}

impl NpcConfig {
    /// Validate the config and return a list of warnings.
    /// Returns `Err` with all error messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Provider ───
        let provider = self.llm.provider.to_lowercase();
        if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
            warnings.push(ConfigWarning {
                field: "llm.provider".into(),
                message: format!("unsupported LLM provider: {}", self.llm.provider),
                severity: WarningSeverity::Error,
                hint: Some("Use 'ollama' or 'lmstudio'".into()),
            });
        } else if self.llm.active_model().is_empty() {
            warnings.push(ConfigWarning {
                field: format!("llm.{}.model", provider.replace('-', "")),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }

        if self.llm.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "llm.timeout_secs".into(),
                message: "timeout is 0, every request would fail immediately".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 30".into()),
            });
        }

        // ── Orchestrator ───
        let depth = self.orchestrator.max_thinking_depth;
        if depth > MAX_THINKING_DEPTH_LIMIT {
            warnings.push(ConfigWarning {
                field: "orchestrator.max_thinking_depth".into(),
                message: format!("depth {depth} exceeds the limit of {MAX_THINKING_DEPTH_LIMIT}"),
                severity: WarningSeverity::Error,
                hint: Some("The reference configuration uses 3".into()),
            });
        } else if depth > 10 {
            warnings.push(ConfigWarning {
                field: "orchestrator.max_thinking_depth".into(),
                message: format!(
                    "depth {depth} allows {} provider calls per tick",
                    depth.saturating_add(1)
                ),
                severity: WarningSeverity::Warning,
                hint: Some("The reference configuration uses 3".into()),
            });
        }

        // ── Sessions ───
        if self.sessions.expiration_secs == 0 {
            warnings.push(ConfigWarning {
                field: "sessions.expiration_secs".into(),
                message: "sessions would expire immediately".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }
        if self.sessions.sweep_interval_secs == 0 {
            warnings.push(ConfigWarning {
                field: "sessions.sweep_interval_secs".into(),
                message: "sweep interval must be positive".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }

        // ── Logging ───
        if !["pretty", "json"].contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}', using pretty", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: None,
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| w.to_string())
            .collect();
        if !errors.is_empty() {
            return Err(errors.join("; "));
        }

        Ok(warnings)
    }
}
