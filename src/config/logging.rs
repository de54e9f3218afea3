//! `[logging]` section.
//!
//! Consumed by [`crate::logging::init_tracing`]. `NETWEAVE_LOG_LEVEL` and
//! `NETWEAVE_LOG_FORMAT` override the file; `RUST_LOG` overrides both.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Subscriber output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-line output for an operator terminal
    #[default]
    Pretty,
    /// One JSON object per event, spans flattened in
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    /// Case-insensitive; used for `NETWEAVE_LOG_FORMAT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("pretty") {
            Ok(LogFormat::Pretty)
        } else if s.eq_ignore_ascii_case("json") {
            Ok(LogFormat::Json)
        } else {
            Err(format!("unknown log format '{}', expected pretty or json", s))
        }
    }
}

/// Levels and format of netweave's tracing output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base directive for every target, e.g. `info`
    pub level: String,
    pub format: LogFormat,
    /// Per-module levels keyed by netweave module (`engine`, `resource`,
    /// `handlers`), appended as `netweave::<module>=<level>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_levels: Option<HashMap<String, String>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            component_levels: None,
        }
    }
}
