//! Reconciliation engine configuration

use serde::{Deserialize, Serialize};

/// Reconciliation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of sites deployed in parallel within one intent
    pub deploy_concurrency: usize,
    /// Per-site deploy/remove timeout; a site that exceeds it is reported failed
    pub site_timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deploy_concurrency: 8,
            site_timeout_seconds: 120,
        }
    }
}
