// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Read-only discovery resources: configured instances, tool catalog, usage
//! guide, version.

use crate::errors::ToolError;
use crate::registry::InstanceRegistry;
use serde::Serialize;

/// Tools that read or change local DNS configuration.
pub const CATEGORY_CONFIG: &str = "config";

/// Tools that read the query log.
pub const CATEGORY_METRICS: &str = "metrics";

/// One entry of the static tool catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    /// Tool name used with `POST /tools/{name}`
    pub name: &'static str,
    /// Category the tool belongs to
    #[serde(skip)]
    pub category: &'static str,
    /// What the tool does
    pub description: &'static str,
}

/// Every tool the server exposes, grouped by category.
pub const TOOL_CATALOG: &[ToolDescriptor] = &[
    ToolDescriptor {
        name: "list_local_dns",
        category: CATEGORY_CONFIG,
        description: "List local A and CNAME records on all Pi-holes or one `instance`",
    },
    ToolDescriptor {
        name: "add_local_a_record",
        category: CATEGORY_CONFIG,
        description: "Add a local A record `hostname` -> `ip` on all Pi-holes or one `instance`",
    },
    ToolDescriptor {
        name: "add_local_cname_record",
        category: CATEGORY_CONFIG,
        description: "Add a local CNAME record `hostname` -> `target` (optional `ttl`) on all Pi-holes or one `instance`",
    },
    ToolDescriptor {
        name: "remove_local_a_record",
        category: CATEGORY_CONFIG,
        description: "Remove local A records for `hostname`; without `token` returns a preview and token, with `token` deletes the previewed records",
    },
    ToolDescriptor {
        name: "remove_local_cname_record",
        category: CATEGORY_CONFIG,
        description: "Remove local CNAME records for `hostname`; without `token` returns a preview and token, with `token` deletes the previewed records",
    },
    ToolDescriptor {
        name: "list_queries",
        category: CATEGORY_METRICS,
        description: "Recent DNS queries, filterable by `length`, `from`, `until`, `upstream`, `domain`, `client` and `cursor`",
    },
    ToolDescriptor {
        name: "list_query_history",
        category: CATEGORY_METRICS,
        description: "Query activity over time, as used for the dashboard graph",
    },
    ToolDescriptor {
        name: "list_query_suggestions",
        category: CATEGORY_METRICS,
        description: "Suggested filter values for `list_queries`",
    },
];

/// Instance summary without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceSummary {
    /// Instance name
    pub name: String,
    /// Base URL
    pub url: String,
}

/// Tool category with its tool count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    /// Category name
    pub name: &'static str,
    /// Number of tools in the category
    pub tools: usize,
}

/// Look up a tool by name.
#[must_use]
pub fn find_tool(name: &str) -> Option<&'static ToolDescriptor> {
    TOOL_CATALOG.iter().find(|tool| tool.name == name)
}

/// Configured instances in registry order.
#[must_use]
pub fn instances(registry: &InstanceRegistry) -> Vec<InstanceSummary> {
    registry
        .instances()
        .iter()
        .map(|instance| InstanceSummary {
            name: instance.name.clone(),
            url: instance.base_url.to_string(),
        })
        .collect()
}

/// Tool categories in catalog order.
#[must_use]
pub fn categories() -> Vec<CategorySummary> {
    let mut summaries: Vec<CategorySummary> = Vec::new();
    for tool in TOOL_CATALOG {
        match summaries.iter_mut().find(|c| c.name == tool.category) {
            Some(summary) => summary.tools += 1,
            None => summaries.push(CategorySummary {
                name: tool.category,
                tools: 1,
            }),
        }
    }
    summaries
}

/// Tools in one category.
///
/// # Errors
///
/// Returns [`ToolError::UnknownCategory`] if no tool has this category.
pub fn tools(category: &str) -> Result<Vec<ToolDescriptor>, ToolError> {
    let tools: Vec<ToolDescriptor> = TOOL_CATALOG
        .iter()
        .filter(|tool| tool.category == category)
        .copied()
        .collect();

    if tools.is_empty() {
        return Err(ToolError::UnknownCategory {
            category: category.to_string(),
        });
    }
    Ok(tools)
}

/// Markdown guide for agents: the two-step deletion workflow and which tool
/// to use for which request.
#[must_use]
pub const fn guide() -> &'static str {
    include_str!("guide.md")
}

/// Crate version.
#[must_use]
pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod discovery_tests;
