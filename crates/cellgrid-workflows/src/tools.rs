//! Agent tool registry.
//!
//! Tools are static records keyed by name; filtering by permission or
//! context is a set test. The agent runtime consults the registry to decide
//! which tools a given workflow context may call.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use cellgrid_core::error::{CoreError, CoreResult};

/// What a tool is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolPermission {
    Read,
    Write,
}

/// Executable behind a tool name.
#[async_trait]
pub trait AgentTool: Send + Sync {
    async fn execute(&self, args: serde_json::Value) -> CoreResult<serde_json::Value>;
}

/// A registered tool.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub permission: ToolPermission,
    pub contexts: BTreeSet<String>,
    pub tool: Arc<dyn AgentTool>,
}

/// Name → tool map with permission/context filtering.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; re-registering a name replaces the entry.
    pub fn register(&mut self, spec: ToolSpec) {
        self.tools.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// Tools holding a permission.
    pub fn with_permission(&self, permission: ToolPermission) -> Vec<&ToolSpec> {
        let mut tools: Vec<&ToolSpec> = self
            .tools
            .values()
            .filter(|t| t.permission == permission)
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Tools available in a context.
    pub fn for_context(&self, context: &str) -> Vec<&ToolSpec> {
        let mut tools: Vec<&ToolSpec> = self
            .tools
            .values()
            .filter(|t| t.contexts.contains(context))
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Execute a tool by name, enforcing context membership.
    pub async fn execute(
        &self,
        name: &str,
        context: &str,
        args: serde_json::Value,
    ) -> CoreResult<serde_json::Value> {
        let spec = self
            .tools
            .get(name)
            .ok_or_else(|| CoreError::not_found("tool", name))?;
        if !spec.contexts.contains(context) {
            return Err(CoreError::validation(format!(
                "tool {name} is not available in context {context}"
            )));
        }
        spec.tool.execute(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl AgentTool for Echo {
        async fn execute(&self, args: serde_json::Value) -> CoreResult<serde_json::Value> {
            Ok(args)
        }
    }

    fn spec(name: &str, permission: ToolPermission, contexts: &[&str]) -> ToolSpec {
        ToolSpec {
            name: name.into(),
            description: format!("{name} tool"),
            permission,
            contexts: contexts.iter().map(|c| c.to_string()).collect(),
            tool: Arc::new(Echo),
        }
    }

    #[test]
    fn test_permission_and_context_filters() {
        let mut registry = ToolRegistry::new();
        registry.register(spec("search", ToolPermission::Read, &["qa", "workflow"]));
        registry.register(spec("list_documents", ToolPermission::Read, &["qa"]));
        registry.register(spec("add_document", ToolPermission::Write, &["workflow"]));

        let readers: Vec<&str> = registry
            .with_permission(ToolPermission::Read)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(readers, vec!["list_documents", "search"]);

        let workflow_tools: Vec<&str> = registry
            .for_context("workflow")
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(workflow_tools, vec!["add_document", "search"]);
    }

    #[tokio::test]
    async fn test_execute_enforces_context() {
        let mut registry = ToolRegistry::new();
        registry.register(spec("search", ToolPermission::Read, &["qa"]));

        let out = registry
            .execute("search", "qa", serde_json::json!({"q": "term"}))
            .await
            .unwrap();
        assert_eq!(out["q"], "term");

        let err = registry
            .execute("search", "workflow", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(registry
            .execute("missing", "qa", serde_json::json!({}))
            .await
            .is_err());
    }

    #[test]
    fn test_reregistration_replaces_entry() {
        let mut registry = ToolRegistry::new();
        registry.register(spec("search", ToolPermission::Read, &["qa"]));
        registry.register(spec("search", ToolPermission::Write, &["workflow"]));
        assert_eq!(registry.get("search").unwrap().permission, ToolPermission::Write);
        assert_eq!(registry.with_permission(ToolPermission::Read).len(), 0);
    }
}
