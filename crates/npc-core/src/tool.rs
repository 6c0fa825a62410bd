use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Name of the built-in sentinel tool that asks for another inference round.
pub const CONTINUE_THINKING: &str = "continue_thinking";

/// Arguments supplied by the model for one tool call.
pub type ToolArgs = Map<String, Value>;

/// JSON type of a declared tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Object => "object",
            ParameterType::Array => "array",
        }
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

/// Description of a tool the model may call. Declarations are data; handlers
/// are bound separately by whoever executes the tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Unique name within an effective tool set, e.g. "write_scratchpad".
    pub name: String,
    /// Human-readable description for the LLM.
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ToolParameter>,
}

impl ToolDeclaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add a parameter (builder style).
    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.parameters.insert(
            name.into(),
            ToolParameter {
                param_type,
                description: description.into(),
                required,
            },
        );
        self
    }

    /// Names of all required parameters, in sorted order.
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|(_, p)| p.required)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// JSON Schema of the parameters object, in the function-calling shape
    /// providers expect.
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|(name, p)| {
                (
                    name.clone(),
                    json!({
                        "type": p.param_type.as_str(),
                        "description": p.description,
                    }),
                )
            })
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_parameters(),
        })
    }
}

/// A request from the LLM to call a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    #[serde(default)]
    pub args: ToolArgs,
}

impl ToolInvocation {
    pub fn new(tool_name: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
        }
    }

    /// Build an invocation from a JSON value; anything but an object yields no arguments.
    pub fn from_value(tool_name: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(tool_name, args)
    }
}

/// The outcome of executing one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub message: String,
    /// Optional structured data for the game engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Anything that can present tool declarations to the model and execute the
/// calls it makes: the global registry, or a registry combined with a session.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// All declarations in this effective tool set.
    fn tools(&self) -> Vec<ToolDeclaration>;

    /// Execute a single invocation on behalf of `npc_id`.
    ///
    /// `Ok` with `success == false` is a tool-level failure the model can read;
    /// `Err` means the call itself was rejected (unknown tool, bad arguments).
    async fn execute(&self, npc_id: &str, invocation: &ToolInvocation)
    -> crate::Result<ToolOutcome>;
}
