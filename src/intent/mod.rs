//! Intents and the per-intent-type handler contract.
//!
//! An [`Intent`] is the desired state of one target. The behaviour of each
//! intent type lives in an [`IntentHandler`], looked up by name in a
//! [`HandlerRegistry`].

pub mod error;
pub mod handler;
pub mod registry;
pub mod target;

pub use error::IntentError;
pub use handler::{HandlerContext, IntentHandler};
pub use registry::HandlerRegistry;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Persisted house-keeping mapping of network objects created for a target.
pub type Topology = Map<String, Value>;

/// Field → message map; empty means valid.
pub type ValidationErrors = BTreeMap<String, String>;

/// Element id → element name, resolved from the inventory.
pub type SiteNames = BTreeMap<String, String>;

/// Deployment state the platform reports for an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkState {
    #[default]
    Planned,
    Deployed,
    Deleted,
    Misaligned,
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkState::Planned => "planned",
            NetworkState::Deployed => "deployed",
            NetworkState::Deleted => "deleted",
            NetworkState::Misaligned => "misaligned",
        };
        f.write_str(s)
    }
}

/// Desired state of one target.
///
/// ```
/// use netweave::intent::{Intent, NetworkState};
///
/// let json = r#"{
///     "target": "link-42",
///     "intent-type": "ip-link",
///     "config": {"mtu": 9000}
/// }"#;
/// let intent: Intent = serde_json::from_str(json).unwrap();
/// assert_eq!(intent.intent_type_version, 1);
/// assert_eq!(intent.network_state, NetworkState::Planned);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Intent {
    pub target: String,
    pub intent_type: String,
    #[serde(default = "default_version")]
    pub intent_type_version: u32,
    /// Desired configuration; schema owned by the intent type
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub network_state: NetworkState,
    #[serde(default)]
    pub topology: Topology,
}

fn default_version() -> u32 {
    1
}

impl Intent {
    pub fn new(intent_type: impl Into<String>, target: impl Into<String>, config: Value) -> Self {
        Self {
            target: target.into(),
            intent_type: intent_type.into(),
            intent_type_version: default_version(),
            config,
            network_state: NetworkState::Planned,
            topology: Topology::new(),
        }
    }

    pub fn with_state(mut self, network_state: NetworkState) -> Self {
        self.network_state = network_state;
        self
    }

    pub fn is_delete(&self) -> bool {
        self.network_state == NetworkState::Deleted
    }
}

/// Per-element fragment of an intent, derived fresh on every reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Site {
    pub element_id: String,
    pub element_name: String,
    /// Template parameters for this element
    pub params: Value,
}

/// A device object an intent expects to exist, with the attributes it
/// expects it to carry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ManagedObject {
    pub model_path: String,
    pub attributes: Map<String, Value>,
}

impl ManagedObject {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }
}
