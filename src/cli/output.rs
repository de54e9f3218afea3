//! Output formatting helpers for CLI commands

use crate::intent::ValidationErrors;
use crate::resource::PoolUsage;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// View model for pool display
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolView {
    pub name: String,
    pub scope: String,
    pub kind: String,
    pub description: String,
    pub allocations: usize,
    /// Kept as strings: subnet pools can exceed the range of JSON numbers
    pub used: String,
    pub total: String,
    pub utilization: f64,
}

impl From<&PoolUsage> for PoolView {
    fn from(usage: &PoolUsage) -> Self {
        let utilization = if usage.total == 0 {
            0.0
        } else {
            usage.used as f64 / usage.total as f64 * 100.0
        };
        Self {
            name: usage.pool.name.clone(),
            scope: usage.pool.scope.clone(),
            kind: usage.kind.to_string(),
            description: usage.description.clone(),
            allocations: usage.allocations,
            used: usage.used.to_string(),
            total: usage.total.to_string(),
            utilization,
        }
    }
}

fn colored_utilization(percent: f64) -> String {
    let text = format!("{:.1}%", percent);
    if percent >= 90.0 {
        text.red().to_string()
    } else if percent >= 70.0 {
        text.yellow().to_string()
    } else {
        text.green().to_string()
    }
}

/// Format pools as a table
pub fn format_pools_table(pools: &[PoolView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Pool",
        "Scope",
        "Kind",
        "Allocations",
        "Used",
        "Total",
        "Utilization",
        "Description",
    ]);

    for p in pools {
        table.add_row(vec![
            Cell::new(&p.name),
            Cell::new(&p.scope),
            Cell::new(&p.kind),
            Cell::new(p.allocations),
            Cell::new(&p.used),
            Cell::new(&p.total),
            Cell::new(colored_utilization(p.utilization)),
            Cell::new(&p.description),
        ]);
    }

    table.to_string()
}

/// Format pools as JSON
pub fn format_pools_json(pools: &[PoolView]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({ "pools": pools }))
}

/// Format validation errors as a two-column table
pub fn format_validation_table(errors: &ValidationErrors) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Field", "Problem"]);

    for (field, message) in errors {
        table.add_row(vec![Cell::new(field.red().to_string()), Cell::new(message)]);
    }

    table.to_string()
}

/// Format a validation result as JSON
pub fn format_validation_json(
    target: &str,
    errors: &ValidationErrors,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({
        "target": target,
        "valid": errors.is_empty(),
        "errors": errors,
    }))
}
