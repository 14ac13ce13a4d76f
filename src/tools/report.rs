//! Catalog validation report
//!
//! Structural invariants are enforced when the catalog loads. This report
//! covers what a loaded catalog can still get wrong: retrieval hints that are
//! missing, and drift between the catalog and the tools the executor serves.

use std::collections::HashSet;

use serde::Serialize;

use super::catalog::ToolCatalog;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub catalog_tool_count: usize,
    pub server_tool_count: Option<usize>,
    pub matched_tools: usize,
    pub missing_from_server: Vec<String>,
    pub missing_from_catalog: Vec<String>,
}

impl CatalogReport {
    /// Build a report, optionally comparing against the executor's tool list
    pub fn build(catalog: &ToolCatalog, server_tools: Option<&[String]>) -> Self {
        let mut report = Self {
            catalog_tool_count: catalog.len(),
            ..Default::default()
        };

        for tool in catalog.all() {
            if tool.keywords.is_empty() {
                report
                    .warnings
                    .push(format!("Tool '{}' has no keywords (improves retrieval)", tool.name));
            }
            if tool.examples.is_empty() {
                report
                    .warnings
                    .push(format!("Tool '{}' has no examples (improves retrieval)", tool.name));
            }
        }

        let Some(server_tools) = server_tools else {
            report.matched_tools = catalog.len();
            return report;
        };

        let server: HashSet<&str> = server_tools.iter().map(String::as_str).collect();
        report.server_tool_count = Some(server.len());

        for name in catalog.names() {
            if server.contains(name.as_str()) {
                report.matched_tools += 1;
            } else {
                report.missing_from_server.push(name);
            }
        }

        let mut extra: Vec<String> = server
            .iter()
            .filter(|name| !catalog.contains(name))
            .map(|name| name.to_string())
            .collect();
        extra.sort();
        report.missing_from_catalog = extra;

        if !report.missing_from_server.is_empty() {
            report.errors.push(format!(
                "Tools in catalog but NOT served by executor: {}",
                report.missing_from_server.join(", ")
            ));
        }
        if !report.missing_from_catalog.is_empty() {
            report.warnings.push(format!(
                "Tools served by executor but NOT in catalog: {}",
                report.missing_from_catalog.join(", ")
            ));
        }

        report
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
