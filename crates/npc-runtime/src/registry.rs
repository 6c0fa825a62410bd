//! Global tool registry: declarations bound to local handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use npc_core::{
    CONTINUE_THINKING, NpcError, ParameterType, Result, ToolArgs, ToolDeclaration,
    ToolInvocation, ToolOutcome, ToolProvider,
};
use tracing::debug;

/// Executes one tool on behalf of an NPC.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, npc_id: &str, args: &ToolArgs) -> Result<ToolOutcome>;
}

#[async_trait]
impl<F> ToolHandler for F
where
    F: Fn(&str, &ToolArgs) -> Result<ToolOutcome> + Send + Sync,
{
    async fn call(&self, npc_id: &str, args: &ToolArgs) -> Result<ToolOutcome> {
        self(npc_id, args)
    }
}

struct RegisteredTool {
    declaration: ToolDeclaration,
    handler: Arc<dyn ToolHandler>,
}

/// Append-only set of tools with local handlers.
///
/// Every registry starts with `continue_thinking` registered. Registration
/// happens at startup; afterwards the registry is shared read-only.
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            tools: BTreeMap::new(),
        };
        registry.tools.insert(
            CONTINUE_THINKING.to_string(),
            RegisteredTool {
                declaration: continue_thinking_declaration(),
                handler: Arc::new(continue_thinking),
            },
        );
        registry
    }

    /// Register a tool. Fails if the name is taken; the existing entry is kept.
    pub fn register(
        &mut self,
        declaration: ToolDeclaration,
        handler: impl ToolHandler + 'static,
    ) -> Result<()> {
        if self.tools.contains_key(&declaration.name) {
            return Err(NpcError::ToolAlreadyRegistered(declaration.name));
        }
        debug!(tool = %declaration.name, "registered tool");
        self.tools.insert(
            declaration.name.clone(),
            RegisteredTool {
                declaration,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDeclaration> {
        self.tools.get(name).map(|t| &t.declaration)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations sorted by name.
    pub fn tools(&self) -> Vec<ToolDeclaration> {
        self.tools.values().map(|t| t.declaration.clone()).collect()
    }

    /// Validate and run one invocation.
    ///
    /// Only presence is checked: required parameters must be supplied and no
    /// undeclared argument may appear. Argument values are not type-checked.
    pub async fn execute(&self, npc_id: &str, invocation: &ToolInvocation) -> Result<ToolOutcome> {
        let tool = self
            .tools
            .get(&invocation.tool_name)
            .ok_or_else(|| NpcError::ToolNotFound(invocation.tool_name.clone()))?;

        validate_args(&tool.declaration, &invocation.args)?;
        tool.handler.call(npc_id, &invocation.args).await
    }
}

#[async_trait]
impl ToolProvider for ToolRegistry {
    fn tools(&self) -> Vec<ToolDeclaration> {
        ToolRegistry::tools(self)
    }

    async fn execute(&self, npc_id: &str, invocation: &ToolInvocation) -> Result<ToolOutcome> {
        ToolRegistry::execute(self, npc_id, invocation).await
    }
}

fn validate_args(declaration: &ToolDeclaration, args: &ToolArgs) -> Result<()> {
    for (name, param) in &declaration.parameters {
        if param.required && !args.contains_key(name) {
            return Err(NpcError::invalid_arguments(
                &declaration.name,
                format!("missing required parameter: {name}"),
            ));
        }
    }
    for name in args.keys() {
        if !declaration.parameters.contains_key(name) {
            return Err(NpcError::invalid_arguments(
                &declaration.name,
                format!("unexpected parameter: {name}"),
            ));
        }
    }
    Ok(())
}

fn continue_thinking_declaration() -> ToolDeclaration {
    ToolDeclaration::new(
        CONTINUE_THINKING,
        "Signal that you want to continue thinking and processing after seeing tool results. \
         Use this when you need to analyze tool outputs or make follow-up decisions. You will \
         continue thinking immediately - the only new input will be results of tool calls from \
         the current/previous iteration. Use this sparingly and only in cases when you need to \
         wait for the results of another tool call.",
    )
    .with_parameter(
        "reason",
        ParameterType::String,
        "Brief explanation of why you want to continue thinking",
        false,
    )
}

fn continue_thinking(_npc_id: &str, args: &ToolArgs) -> Result<ToolOutcome> {
    let reason = args
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("No reason provided");
    Ok(ToolOutcome::ok(format!("Continuing thinking: {reason}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn invocation(name: &str, args: serde_json::Value) -> ToolInvocation {
        ToolInvocation::from_value(name, args)
    }

    fn counting_registry(calls: Arc<AtomicUsize>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        let decl = ToolDeclaration::new("remember", "Store a fact")
            .with_parameter("key", ParameterType::String, "fact key", true)
            .with_parameter("note", ParameterType::String, "optional note", false);
        registry
            .register(decl, move |_npc: &str, args: &ToolArgs| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(ToolOutcome::ok(format!("remembered {}", args["key"])))
            })
            .unwrap();
        registry
    }

    #[test]
    fn test_new_has_continue_thinking() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.len(), 1);
        let decl = registry.get(CONTINUE_THINKING).unwrap();
        assert!(!decl.parameters["reason"].required);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        let first = ToolDeclaration::new("wave", "first");
        registry
            .register(first, |_: &str, _: &ToolArgs| Ok(ToolOutcome::ok("one")))
            .unwrap();

        let err = registry
            .register(ToolDeclaration::new("wave", "second"), |_: &str, _: &ToolArgs| {
                Ok(ToolOutcome::ok("two"))
            })
            .unwrap_err();
        assert!(matches!(err, NpcError::ToolAlreadyRegistered(ref n) if n == "wave"));
        assert_eq!(registry.get("wave").unwrap().description, "first");
    }

    #[test]
    fn test_continue_thinking_cannot_be_replaced() {
        let mut registry = ToolRegistry::new();
        let result = registry.register(
            ToolDeclaration::new(CONTINUE_THINKING, "mine"),
            |_: &str, _: &ToolArgs| Ok(ToolOutcome::ok("")),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_continue_thinking_reason() {
        let registry = ToolRegistry::new();
        let out = registry
            .execute("npc", &invocation(CONTINUE_THINKING, json!({"reason": "check memory"})))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.message, "Continuing thinking: check memory");

        let out = registry
            .execute("npc", &invocation(CONTINUE_THINKING, json!({})))
            .await
            .unwrap();
        assert_eq!(out.message, "Continuing thinking: No reason provided");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("npc", &invocation("fly", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, NpcError::ToolNotFound(ref n) if n == "fly"));
        assert_eq!(err.to_string(), "unknown tool: fly");
    }

    #[tokio::test]
    async fn test_missing_required_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(calls.clone());

        let err = registry
            .execute("npc", &invocation("remember", json!({"note": "x"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing required parameter: key"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unexpected_parameter_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(calls.clone());

        let err = registry
            .execute("npc", &invocation("remember", json!({"key": "k", "colour": "red"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unexpected parameter: colour"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_argument_types_not_enforced() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(calls.clone());

        // "key" is declared as a string; a number is still accepted.
        let out = registry
            .execute("npc", &invocation("remember", json!({"key": 42})))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tools_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDeclaration::new("alpha", "a"), |_: &str, _: &ToolArgs| {
                Ok(ToolOutcome::ok(""))
            })
            .unwrap();
        let names: Vec<_> = registry.tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["alpha", CONTINUE_THINKING]);
    }
}
