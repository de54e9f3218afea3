//! In-process platform capabilities.
//!
//! `InMemoryNetwork` simulates a small lab network: an inventory, per-element
//! configuration objects addressed by model path, a log of deploy/remove
//! calls and a topology store. Elements can be marked unreachable or
//! configured to reject pushes to exercise failure paths.

use super::{
    ConfigDeployer, ConfigRenderer, DeviceAccess, DeviceError, ElementInfo, Inventory,
    TopologyStore,
};
use crate::intent::Topology;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::{json, Value};

/// Kind of write recorded by [`InMemoryNetwork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployAction {
    Deploy,
    Remove,
}

/// One deploy or remove call received by an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRecord {
    pub action: DeployAction,
    pub template: String,
    pub config: String,
}

#[derive(Default)]
pub struct InMemoryNetwork {
    elements: DashMap<String, ElementInfo>,
    objects: DashMap<(String, String), Value>,
    unreachable: DashSet<String>,
    rejecting: DashSet<String>,
    history: DashMap<String, Vec<DeployRecord>>,
    topology: DashMap<String, Topology>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an element in the inventory.
    pub fn add_element(&self, element_id: &str, name: &str, family_type_release: &str) {
        self.elements.insert(
            element_id.to_string(),
            ElementInfo::new(element_id, name, family_type_release),
        );
    }

    /// Set the live object at `path` on an element.
    pub fn set_object(&self, element_id: &str, path: &str, value: Value) {
        self.objects
            .insert((element_id.to_string(), path.to_string()), value);
    }

    pub fn remove_object(&self, element_id: &str, path: &str) {
        self.objects
            .remove(&(element_id.to_string(), path.to_string()));
    }

    pub fn set_unreachable(&self, element_id: &str, unreachable: bool) {
        if unreachable {
            self.unreachable.insert(element_id.to_string());
        } else {
            self.unreachable.remove(element_id);
        }
    }

    /// Make an element reject every deploy/remove call.
    pub fn set_rejecting(&self, element_id: &str, rejecting: bool) {
        if rejecting {
            self.rejecting.insert(element_id.to_string());
        } else {
            self.rejecting.remove(element_id);
        }
    }

    /// Every deploy/remove call an element received, oldest first.
    pub fn history(&self, element_id: &str) -> Vec<DeployRecord> {
        self.history
            .get(element_id)
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Persisted topology of a target, if any.
    pub fn stored_topology(&self, target: &str) -> Option<Topology> {
        self.topology.get(target).map(|t| t.clone())
    }

    fn check_writable(&self, element_id: &str) -> Result<(), DeviceError> {
        if self.unreachable.contains(element_id) {
            return Err(DeviceError::unavailable(element_id, "no management session"));
        }
        if self.rejecting.contains(element_id) {
            return Err(DeviceError::Rejected {
                element_id: element_id.to_string(),
                reason: "commit failed".to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, element_id: &str, action: DeployAction, template: &str, config: &str) {
        self.history
            .entry(element_id.to_string())
            .or_default()
            .push(DeployRecord {
                action,
                template: template.to_string(),
                config: config.to_string(),
            });
    }
}

#[async_trait]
impl DeviceAccess for InMemoryNetwork {
    async fn query(&self, element_id: &str, model_path: &str) -> Result<Value, DeviceError> {
        if self.unreachable.contains(element_id) {
            return Err(DeviceError::unavailable(element_id, "no management session"));
        }
        self.objects
            .get(&(element_id.to_string(), model_path.to_string()))
            .map(|value| value.clone())
            .ok_or_else(|| DeviceError::not_found(element_id, model_path))
    }
}

#[async_trait]
impl Inventory for InMemoryNetwork {
    async fn element(&self, element_id: &str) -> Result<ElementInfo, DeviceError> {
        self.elements
            .get(element_id)
            .map(|info| info.clone())
            .ok_or_else(|| DeviceError::not_found(element_id, "inventory"))
    }
}

#[async_trait]
impl ConfigDeployer for InMemoryNetwork {
    async fn deploy(
        &self,
        element_id: &str,
        template: &str,
        config: &str,
    ) -> Result<(), DeviceError> {
        self.check_writable(element_id)?;
        self.record(element_id, DeployAction::Deploy, template, config);
        Ok(())
    }

    async fn remove(
        &self,
        element_id: &str,
        template: &str,
        config: &str,
    ) -> Result<(), DeviceError> {
        self.check_writable(element_id)?;
        self.record(element_id, DeployAction::Remove, template, config);
        Ok(())
    }
}

#[async_trait]
impl TopologyStore for InMemoryNetwork {
    async fn load(&self, target: &str) -> Result<Option<Topology>, DeviceError> {
        Ok(self.stored_topology(target))
    }

    async fn save(&self, target: &str, topology: &Topology) -> Result<(), DeviceError> {
        self.topology.insert(target.to_string(), topology.clone());
        Ok(())
    }

    async fn delete(&self, target: &str) -> Result<(), DeviceError> {
        self.topology.remove(target);
        Ok(())
    }
}

/// Renders parameters as a JSON document tagged with the template name.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl ConfigRenderer for JsonRenderer {
    fn render(&self, template: &str, site: &Value, global: &Value) -> Result<String, DeviceError> {
        serde_json::to_string_pretty(&json!({
            "template": template,
            "site": site,
            "global": global,
        }))
        .map_err(|e| DeviceError::Render {
            template: template.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_object_presence() {
        let network = InMemoryNetwork::new();
        network.set_object("ne-1", "/a", json!({"mtu": 1500}));

        assert_eq!(network.query("ne-1", "/a").await.unwrap()["mtu"], 1500);
        assert!(matches!(
            network.query("ne-1", "/b").await,
            Err(DeviceError::NotFound { .. })
        ));

        network.remove_object("ne-1", "/a");
        assert!(network.query("ne-1", "/a").await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_element() {
        let network = InMemoryNetwork::new();
        network.set_object("ne-1", "/a", json!({}));
        network.set_unreachable("ne-1", true);

        assert!(matches!(
            network.query("ne-1", "/a").await,
            Err(DeviceError::Unavailable { .. })
        ));
        assert!(network.deploy("ne-1", "t", "cfg").await.is_err());

        network.set_unreachable("ne-1", false);
        assert!(network.deploy("ne-1", "t", "cfg").await.is_ok());
    }

    #[tokio::test]
    async fn test_deploy_history_and_rejection() {
        let network = InMemoryNetwork::new();
        network.deploy("ne-1", "sros", "a").await.unwrap();
        network.remove("ne-1", "sros", "a").await.unwrap();

        let history = network.history("ne-1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, DeployAction::Deploy);
        assert_eq!(history[1].action, DeployAction::Remove);

        network.set_rejecting("ne-1", true);
        assert!(matches!(
            network.deploy("ne-1", "sros", "b").await,
            Err(DeviceError::Rejected { .. })
        ));
        assert_eq!(network.history("ne-1").len(), 2);
    }

    #[tokio::test]
    async fn test_inventory_lookup() {
        let network = InMemoryNetwork::new();
        network.add_element("ne-1", "pe-paris", "7750 SR:7750 SR-1:24.10.R1");
        assert_eq!(network.element("ne-1").await.unwrap().name, "pe-paris");
        assert!(network.element("ne-2").await.is_err());
    }

    #[tokio::test]
    async fn test_topology_store() {
        let network = InMemoryNetwork::new();
        let mut topology = Topology::new();
        topology.insert("sites".to_string(), json!(["ne-1"]));

        network.save("t1", &topology).await.unwrap();
        assert_eq!(network.load("t1").await.unwrap(), Some(topology));
        network.delete("t1").await.unwrap();
        assert_eq!(network.load("t1").await.unwrap(), None);
    }

    #[test]
    fn test_json_renderer_embeds_template() {
        let rendered = JsonRenderer
            .render("sros", &json!({"a": 1}), &json!({"b": 2}))
            .unwrap();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["template"], "sros");
        assert_eq!(parsed["site"]["a"], 1);
        assert_eq!(parsed["global"]["b"], 2);
    }
}
