//! Validate command implementation

use crate::cli::output::{format_validation_json, format_validation_table};
use crate::cli::ValidateArgs;
use crate::config::NetweaveConfig;
use crate::engine::ReconciliationEngine;
use crate::intent::{HandlerRegistry, Intent};
use crate::platform::{memory::InMemoryNetwork, Platform};
use colored::Colorize;
use std::sync::Arc;

/// Handle `netweave validate` command
///
/// Runs the handler's validation against an in-memory platform; nothing
/// is allocated and no device is contacted. An invalid intent prints its
/// problems and returns an error so the process exits non-zero.
pub fn handle_validate(args: &ValidateArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = NetweaveConfig::load(args.config.as_deref())?.with_env_overrides();
    config.validate()?;

    let content = std::fs::read_to_string(&args.file)?;
    let intent: Intent = serde_json::from_str(&content)?;

    let platform = Platform::in_memory(Arc::new(InMemoryNetwork::new()));
    let engine = ReconciliationEngine::from_config(&config, HandlerRegistry::with_builtin(), platform)?;
    let errors = engine.validate(&intent)?;

    if args.json {
        let output = format_validation_json(&intent.target, &errors)?;
        if errors.is_empty() {
            return Ok(output);
        }
        println!("{}", output);
    } else if errors.is_empty() {
        return Ok(format!(
            "{} {} ({})",
            "✓".green(),
            intent.target,
            intent.intent_type
        ));
    } else {
        println!("{}", format_validation_table(&errors));
    }

    Err(format!("intent '{}' has {} problem(s)", intent.target, errors.len()).into())
}
