//! `l2-service`: a multipoint VLAN service across several elements.
//!
//! Target: `<customer>#<service>#<correlation>`. Every target is its own
//! service instance: it owns one service id, keyed by the whole target, and
//! its own VPLS named `<customer>-<service>-<correlation>`.
//!
//! Config:
//!
//! ```json
//! {
//!   "sites": [
//!     {"ne-id": "ne-1", "port-id": "1/1/5", "vlan": 100},
//!     {"ne-id": "ne-2", "port-id": "1/1/5", "vlan": 100}
//!   ],
//!   "mtu": 1514,
//!   "description": "acme office interconnect"
//! }
//! ```

use crate::intent::target::TargetPath;
use crate::intent::{
    HandlerContext, Intent, IntentError, IntentHandler, ManagedObject, Site, SiteNames, Topology,
    ValidationErrors,
};
use crate::resource::SizeSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

pub const INTENT_TYPE: &str = "l2-service";

const VLAN_RANGE: std::ops::RangeInclusive<u16> = 1..=4094;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ServiceConfig {
    #[serde(default)]
    sites: Vec<AccessPoint>,
    #[serde(default)]
    mtu: Option<u32>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
struct AccessPoint {
    ne_id: String,
    port_id: String,
    vlan: u16,
}

impl AccessPoint {
    fn sap_id(&self) -> String {
        format!("{}:{}", self.port_id, self.vlan)
    }
}

struct ServiceTarget {
    customer: String,
    service: String,
    correlation: String,
}

impl ServiceTarget {
    fn parse(target: &str) -> Result<Self, IntentError> {
        let path = TargetPath::parse_exact(target, 3)?;
        Ok(Self {
            customer: path.segment(0).unwrap_or_default().to_string(),
            service: path.segment(1).unwrap_or_default().to_string(),
            correlation: path.segment(2).unwrap_or_default().to_string(),
        })
    }

    /// Allocation key; one per target.
    fn key(&self) -> String {
        format!("{}#{}#{}", self.customer, self.service, self.correlation)
    }

    fn service_name(&self) -> String {
        format!("{}-{}-{}", self.customer, self.service, self.correlation)
    }
}

fn parse_config(config: &Value) -> Result<ServiceConfig, IntentError> {
    ServiceConfig::deserialize(config).map_err(|e| IntentError::validation("config", e.to_string()))
}

fn vpls_path(service_name: &str) -> String {
    format!("/configure/service/vpls[service-name='{}']", service_name)
}

fn sap_path(service_name: &str, sap_id: &str) -> String {
    format!("{}/sap[sap-id='{}']", vpls_path(service_name), sap_id)
}

/// Element ids in order of first appearance.
fn unique_elements(points: &[AccessPoint]) -> Vec<String> {
    let mut seen = HashSet::new();
    points
        .iter()
        .filter(|p| seen.insert(p.ne_id.as_str()))
        .map(|p| p.ne_id.clone())
        .collect()
}

/// Multipoint L2 service handler.
#[derive(Debug, Clone)]
pub struct L2ServiceHandler {
    pool: String,
    scope: String,
}

impl Default for L2ServiceHandler {
    fn default() -> Self {
        Self {
            pool: "svc-id".to_string(),
            scope: "global".to_string(),
        }
    }
}

impl L2ServiceHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw service ids from another pool.
    pub fn with_pool(mut self, pool: &str, scope: &str) -> Self {
        self.pool = pool.to_string();
        self.scope = scope.to_string();
        self
    }

    fn service_id(&self, ctx: &HandlerContext, key: &str) -> Result<Option<u64>, IntentError> {
        match ctx.resources.get(&self.pool, &self.scope, key) {
            Ok(value) => Ok(value.as_id()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl IntentHandler for L2ServiceHandler {
    fn intent_type(&self) -> &str {
        INTENT_TYPE
    }

    fn get_sites(&self, target: &str, config: &Value) -> Result<Vec<String>, IntentError> {
        ServiceTarget::parse(target)?;
        let config = parse_config(config)?;
        Ok(unique_elements(&config.sites))
    }

    fn get_site_parameters(
        &self,
        ctx: &HandlerContext,
        intent: &Intent,
        site_names: &SiteNames,
    ) -> Result<Vec<Site>, IntentError> {
        let target = ServiceTarget::parse(&intent.target)?;
        let config = parse_config(&intent.config)?;
        let service_id = self.service_id(ctx, &target.key())?;
        let elements = unique_elements(&config.sites);

        let name_of = |element: &str| {
            site_names
                .get(element)
                .cloned()
                .unwrap_or_else(|| element.to_string())
        };

        let sites = elements
            .iter()
            .map(|element| {
                let saps: Vec<Value> = config
                    .sites
                    .iter()
                    .filter(|p| &p.ne_id == element)
                    .map(|p| json!({"port-id": p.port_id, "vlan": p.vlan, "sap-id": p.sap_id()}))
                    .collect();
                let peers: Vec<Value> = elements
                    .iter()
                    .filter(|other| *other != element)
                    .map(|other| json!({"ne-id": other, "ne-name": name_of(other)}))
                    .collect();

                Site {
                    element_id: element.clone(),
                    element_name: name_of(element),
                    params: json!({
                        "customer": target.customer,
                        "service": target.service,
                        "service-name": target.service_name(),
                        "service-id": service_id,
                        "saps": saps,
                        "mtu": config.mtu,
                        "description": config.description,
                        "peers": peers,
                    }),
                }
            })
            .collect();

        Ok(sites)
    }

    fn has_resources(&self) -> bool {
        true
    }

    fn obtain_resources(&self, ctx: &HandlerContext, intent: &Intent) -> Result<(), IntentError> {
        let key = ServiceTarget::parse(&intent.target)?.key();
        let id = ctx
            .resources
            .obtain(&self.pool, &self.scope, SizeSpec::Single, INTENT_TYPE, &key)?;
        tracing::debug!(target_name = %intent.target, service_id = %id, "Service id reserved");
        Ok(())
    }

    fn free_resources(
        &self,
        ctx: &HandlerContext,
        target: &str,
        _config: &Value,
    ) -> Result<(), IntentError> {
        let key = ServiceTarget::parse(target)?.key();
        ctx.resources.release(&self.pool, &self.scope, &key)?;
        Ok(())
    }

    fn get_state(
        &self,
        ctx: &HandlerContext,
        intent: &Intent,
        topology: &Topology,
    ) -> Result<Map<String, Value>, IntentError> {
        let target = ServiceTarget::parse(&intent.target)?;
        let mut state = Map::new();
        state.insert("service".to_string(), json!(target.service_name()));
        state.insert(
            "service-id".to_string(),
            json!(self.service_id(ctx, &target.key())?),
        );
        state.insert("network-state".to_string(), json!(intent.network_state));
        if let Ok(config) = parse_config(&intent.config) {
            state.insert("sites".to_string(), json!(unique_elements(&config.sites)));
            state.insert("sap-count".to_string(), json!(config.sites.len()));
        }
        if let Some(deployed) = topology.get("sites") {
            state.insert("deployed-sites".to_string(), deployed.clone());
        }
        Ok(state)
    }

    fn validate_hook(
        &self,
        _ctx: &HandlerContext,
        intent: &Intent,
        errors: &mut ValidationErrors,
    ) -> Result<(), IntentError> {
        let config = match parse_config(&intent.config) {
            Ok(config) => config,
            Err(IntentError::Validation { field, message }) => {
                errors.insert(field, message);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if config.sites.len() < 2 {
            errors.insert(
                "sites".to_string(),
                format!("at least 2 access points required, got {}", config.sites.len()),
            );
        }

        let mut ports = HashSet::new();
        for (i, point) in config.sites.iter().enumerate() {
            if point.ne_id.trim().is_empty() {
                errors.insert(format!("sites[{}].ne-id", i), "must not be empty".to_string());
            }
            if !VLAN_RANGE.contains(&point.vlan) {
                errors.insert(
                    format!("sites[{}].vlan", i),
                    format!(
                        "{} is outside {}..={}",
                        point.vlan,
                        VLAN_RANGE.start(),
                        VLAN_RANGE.end()
                    ),
                );
            }
            if !ports.insert((point.ne_id.as_str(), point.port_id.as_str(), point.vlan)) {
                errors.insert(
                    "Value inconsistency".to_string(),
                    format!(
                        "{} {} is used twice by this service",
                        point.ne_id,
                        point.sap_id()
                    ),
                );
            }
        }
        Ok(())
    }

    async fn discover(
        &self,
        ctx: &HandlerContext,
        target: &str,
        seed: &Value,
    ) -> Result<Value, IntentError> {
        let service_name = ServiceTarget::parse(target)?.service_name();
        let path = vpls_path(&service_name);
        let elements: Vec<String> = seed
            .get("sites")
            .and_then(Value::as_array)
            .map(|sites| {
                sites
                    .iter()
                    .filter_map(|s| s.get("ne-id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut points = Vec::new();
        let mut mtu = None;
        for element_id in &elements {
            let element = match ctx.inventory.element(element_id).await {
                Ok(element) => element,
                Err(e) => {
                    tracing::warn!(target_name = target, element_id = %element_id, error = %e, "Element not in inventory");
                    continue;
                }
            };
            if !ctx.templates.is_supported(&element.family_type_release) {
                tracing::warn!(
                    target_name = target,
                    element_id = %element_id,
                    family_type_release = %element.family_type_release,
                    "Unrecognized device family, skipping element"
                );
                continue;
            }

            let live = match ctx.devices.query(element_id, &path).await {
                Ok(live) => live,
                Err(e) => {
                    tracing::warn!(target_name = target, element_id = %element_id, error = %e, "Service not readable");
                    continue;
                }
            };
            if mtu.is_none() {
                mtu = live.get("mtu").cloned();
            }
            for sap in live
                .get("saps")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
            {
                // sap-id is `<port>:<vlan>`; ports may contain ':' themselves
                if let Some((port, vlan)) = sap.rsplit_once(':') {
                    if let Ok(vlan) = vlan.parse::<u16>() {
                        points.push(AccessPoint {
                            ne_id: element_id.clone(),
                            port_id: port.to_string(),
                            vlan,
                        });
                    }
                }
            }
        }

        let mut config = Map::new();
        config.insert("sites".to_string(), json!(points));
        if let Some(mtu) = mtu {
            config.insert("mtu".to_string(), mtu);
        }
        Ok(Value::Object(config))
    }

    fn expected_objects(&self, site: &Site) -> Vec<ManagedObject> {
        let Some(service_name) = site.params.get("service-name").and_then(Value::as_str) else {
            return Vec::new();
        };

        let mut vpls = ManagedObject::new(vpls_path(service_name));
        if let Some(id) = site.params.get("service-id").filter(|v| !v.is_null()) {
            vpls = vpls.with_attribute("service-id", id.clone());
        }
        if let Some(mtu) = site.params.get("mtu").filter(|v| !v.is_null()) {
            vpls = vpls.with_attribute("mtu", mtu.clone());
        }

        let mut objects = vec![vpls];
        for sap in site
            .params
            .get("saps")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if let Some(sap_id) = sap.get("sap-id").and_then(Value::as_str) {
                objects.push(ManagedObject::new(sap_path(service_name, sap_id)));
            }
        }
        objects
    }
}
