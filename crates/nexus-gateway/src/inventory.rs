//! Snapshot of every tool the gateway knows about and its policy status.

use std::fmt::Write as _;

use nexus_config::Config;
use serde::Serialize;

use crate::dispatcher::Dispatcher;

/// Transport the gateway serves on.
pub const TRANSPORT: &str = "stdio";

/// Server identity plus one row per tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInventory {
    /// Server name.
    pub server: String,
    /// Server version.
    pub version: String,
    /// Transport name.
    pub transport: &'static str,
    /// Whether safe mode is on.
    pub safe_mode: bool,
    /// All tools, denied ones included.
    pub tools: Vec<InventoryEntry>,
}

/// One row of the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    /// Owning module.
    pub module: String,
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// `allowed`, `confirm` or `denied`.
    pub status: &'static str,
}

impl ToolInventory {
    /// Build the inventory from the dispatcher's current view.
    #[must_use]
    pub fn collect(config: &Config, dispatcher: &Dispatcher) -> Self {
        let tools = dispatcher
            .catalog()
            .into_iter()
            .map(|entry| InventoryEntry {
                status: entry.decision.status_label(),
                module: entry.module,
                name: entry.descriptor.name,
                description: entry.descriptor.description,
            })
            .collect();
        Self {
            server: config.server.name.clone(),
            version: config.server.version.clone(),
            transport: TRANSPORT,
            safe_mode: dispatcher.policy().safe_mode(),
            tools,
        }
    }

    /// Plain-text rendering for terminals.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "{} {} (transport: {}, safe mode: {})\n",
            self.server,
            self.version,
            self.transport,
            if self.safe_mode { "on" } else { "off" }
        );
        if self.tools.is_empty() {
            out.push_str("no tools available\n");
            return out;
        }
        let width = self
            .tools
            .iter()
            .map(|t| t.module.len().saturating_add(t.name.len()).saturating_add(1))
            .max()
            .unwrap_or(0);
        for tool in &self.tools {
            let qualified = format!("{}/{}", tool.module, tool.name);
            let _ = writeln!(
                out,
                "  {qualified:<width$}  {:<8}  {}",
                tool.status, tool.description
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nexus_approval::{Policy, StaticConfirmation};
    use nexus_config::PolicySection;

    use super::*;
    use crate::test_support::StubProvider;

    fn inventory(safe_mode: bool) -> ToolInventory {
        let section = PolicySection {
            deny_tools: vec!["k8s_list_pods".to_string()],
            confirm_tools: vec!["docker/*".to_string()],
            ..PolicySection::default()
        };
        let dispatcher = Dispatcher::new(
            vec![
                StubProvider::new("docker").with_tool("docker_get_logs").shared(),
                StubProvider::new("kubernetes")
                    .with_tool("k8s_list_pods")
                    .with_tool("k8s_list_namespaces")
                    .shared(),
            ],
            Policy::new(&section, safe_mode),
            Arc::new(StaticConfirmation::approve()),
        )
        .unwrap();
        ToolInventory::collect(&Config::default(), &dispatcher)
    }

    #[test]
    fn test_statuses() {
        let inventory = inventory(false);
        let statuses: Vec<_> = inventory
            .tools
            .iter()
            .map(|t| (t.name.as_str(), t.status))
            .collect();
        assert_eq!(
            statuses,
            [
                ("docker_get_logs", "confirm"),
                ("k8s_list_pods", "denied"),
                ("k8s_list_namespaces", "allowed"),
            ]
        );
        assert_eq!(inventory.transport, "stdio");
        assert_eq!(inventory.server, "Nexus");
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(inventory(true)).unwrap();
        assert_eq!(value["safe_mode"], true);
        assert_eq!(value["tools"][0]["module"], "docker");
        assert_eq!(value["tools"][0]["status"], "confirm");
    }

    #[test]
    fn test_render_text() {
        let text = inventory(false).render_text();
        assert!(text.starts_with("Nexus v0.0.1 (transport: stdio, safe mode: off)\n"));
        assert!(text.contains("kubernetes/k8s_list_pods"));
        assert!(text.contains("denied"));
    }
}
