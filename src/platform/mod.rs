//! Capabilities injected by the surrounding platform.
//!
//! The core never talks to devices, the inventory or persistence directly.
//! It consumes the traits below, which the platform implements on top of its
//! own protocol clients. [`memory`] provides in-process implementations for
//! tests and offline tooling.

pub mod error;
pub mod memory;

pub use error::DeviceError;

use crate::intent::Topology;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Inventory record of one network element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub element_id: String,
    pub name: String,
    /// Colon-delimited `<family>:<type>:<release>` descriptor
    pub family_type_release: String,
}

impl ElementInfo {
    pub fn new(element_id: &str, name: &str, family_type_release: &str) -> Self {
        Self {
            element_id: element_id.to_string(),
            name: name.to_string(),
            family_type_release: family_type_release.to_string(),
        }
    }

    /// Placeholder used when the inventory cannot resolve an element.
    pub fn unknown(element_id: &str) -> Self {
        Self::new(element_id, element_id, "")
    }
}

/// Read access to live device configuration.
#[async_trait]
pub trait DeviceAccess: Send + Sync + 'static {
    /// Fetch the configuration subtree at `model_path`.
    ///
    /// # Returns
    ///
    /// - `Ok(Value)` with the object's attributes
    /// - `Err(DeviceError::NotFound)` if the object is absent
    /// - `Err(DeviceError::Unavailable)` if the element cannot be reached
    async fn query(&self, element_id: &str, model_path: &str) -> Result<Value, DeviceError>;
}

/// Element lookup by id.
#[async_trait]
pub trait Inventory: Send + Sync + 'static {
    async fn element(&self, element_id: &str) -> Result<ElementInfo, DeviceError>;
}

/// Turns a template identifier plus parameters into device configuration text.
pub trait ConfigRenderer: Send + Sync + 'static {
    fn render(&self, template: &str, site: &Value, global: &Value) -> Result<String, DeviceError>;
}

/// Write access to devices.
#[async_trait]
pub trait ConfigDeployer: Send + Sync + 'static {
    /// Push rendered configuration to an element.
    async fn deploy(&self, element_id: &str, template: &str, config: &str)
        -> Result<(), DeviceError>;

    /// Remove the configuration previously pushed with the same template.
    async fn remove(&self, element_id: &str, template: &str, config: &str)
        -> Result<(), DeviceError>;
}

/// Persistence of the per-target topology (house-keeping) mapping.
#[async_trait]
pub trait TopologyStore: Send + Sync + 'static {
    async fn load(&self, target: &str) -> Result<Option<Topology>, DeviceError>;
    async fn save(&self, target: &str, topology: &Topology) -> Result<(), DeviceError>;
    async fn delete(&self, target: &str) -> Result<(), DeviceError>;
}

/// The full set of capabilities the engine needs from the platform.
#[derive(Clone)]
pub struct Platform {
    pub devices: Arc<dyn DeviceAccess>,
    pub inventory: Arc<dyn Inventory>,
    pub renderer: Arc<dyn ConfigRenderer>,
    pub deployer: Arc<dyn ConfigDeployer>,
    pub topology: Arc<dyn TopologyStore>,
}

impl Platform {
    /// Wire every capability to one in-memory lab network.
    pub fn in_memory(network: Arc<memory::InMemoryNetwork>) -> Self {
        Self {
            devices: network.clone(),
            inventory: network.clone(),
            renderer: Arc::new(memory::JsonRenderer),
            deployer: network.clone(),
            topology: network,
        }
    }
}
