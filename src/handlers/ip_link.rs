//! `ip-link`: a point-to-point IP link between two network elements.
//!
//! Target: a bare link name (`link-42`) or a path carrying an `id='…'`
//! fragment (`link[id='link-42']`).
//!
//! Config:
//!
//! ```json
//! {
//!   "endpoint-a": {"ne-id": "ne-1", "port-id": "1/1/1"},
//!   "endpoint-b": {"ne-id": "ne-2", "port-id": "1/1/3"},
//!   "mtu": 9000,
//!   "description": "core link"
//! }
//! ```
//!
//! Each target owns one /31 from a subnet pool, keyed by the whole target;
//! endpoint A takes the first address, endpoint B the second.

use crate::intent::target::fragment;
use crate::intent::{
    HandlerContext, Intent, IntentError, IntentHandler, ManagedObject, Site, SiteNames, Topology,
    ValidationErrors,
};
use crate::resource::{ResourceValue, SizeSpec};
use async_trait::async_trait;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const INTENT_TYPE: &str = "ip-link";

const MTU_RANGE: std::ops::RangeInclusive<u32> = 512..=9800;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct LinkConfig {
    endpoint_a: EndpointConfig,
    endpoint_b: EndpointConfig,
    #[serde(default)]
    mtu: Option<u32>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct EndpointConfig {
    ne_id: String,
    port_id: String,
}

/// What one endpoint looks like from either side of the link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
struct EndpointView {
    ne_id: String,
    ne_name: String,
    port_id: String,
    address: Option<String>,
}

fn parse_config(config: &Value) -> Result<LinkConfig, IntentError> {
    LinkConfig::deserialize(config).map_err(|e| IntentError::validation("config", e.to_string()))
}

fn link_name(target: &str) -> Result<String, IntentError> {
    if let Some(id) = fragment(target, "id") {
        if id.is_empty() {
            return Err(IntentError::validation("target", "link id is empty"));
        }
        return Ok(id.to_string());
    }

    let name = target.trim();
    if name.is_empty() || name.contains(['#', '[', ']', '\'']) {
        return Err(IntentError::validation(
            "target",
            format!("'{}' is not a link name", target),
        ));
    }
    Ok(name.to_string())
}

/// `address/prefix` for both ends of a link subnet.
fn endpoint_addresses(subnet: IpNet) -> (Option<String>, Option<String>) {
    let mut hosts = subnet
        .hosts()
        .map(|addr| format!("{}/{}", addr, subnet.prefix_len()));
    (hosts.next(), hosts.next())
}

/// Allocation key of a target: the target itself, once it names a link.
fn allocation_key(target: &str) -> Result<String, IntentError> {
    link_name(target)?;
    Ok(target.trim().to_string())
}

fn interface_path(link: &str) -> String {
    format!(
        "/configure/router[router-name='Base']/interface[interface-name='{}']",
        link
    )
}

/// Point-to-point link handler.
#[derive(Debug, Clone)]
pub struct IpLinkHandler {
    pool: String,
    scope: String,
    prefix: u8,
}

impl Default for IpLinkHandler {
    fn default() -> Self {
        Self {
            pool: "ip-pool".to_string(),
            scope: "global".to_string(),
            prefix: 31,
        }
    }
}

impl IpLinkHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate link subnets from another pool.
    pub fn with_pool(mut self, pool: &str, scope: &str) -> Self {
        self.pool = pool.to_string();
        self.scope = scope.to_string();
        self
    }

    fn link_subnet(&self, ctx: &HandlerContext, target: &str) -> Result<Option<IpNet>, IntentError> {
        let key = allocation_key(target)?;
        match ctx.resources.get(&self.pool, &self.scope, &key) {
            Ok(value) => Ok(value.as_subnet()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl IntentHandler for IpLinkHandler {
    fn intent_type(&self) -> &str {
        INTENT_TYPE
    }

    fn get_sites(&self, target: &str, config: &Value) -> Result<Vec<String>, IntentError> {
        link_name(target)?;
        let config = parse_config(config)?;
        Ok(vec![config.endpoint_a.ne_id, config.endpoint_b.ne_id])
    }

    fn get_site_parameters(
        &self,
        ctx: &HandlerContext,
        intent: &Intent,
        site_names: &SiteNames,
    ) -> Result<Vec<Site>, IntentError> {
        let link = link_name(&intent.target)?;
        let config = parse_config(&intent.config)?;
        let (address_a, address_b) = match self.link_subnet(ctx, &intent.target)? {
            Some(subnet) => endpoint_addresses(subnet),
            None => (None, None),
        };

        let view = |endpoint: &EndpointConfig, address: Option<String>| EndpointView {
            ne_id: endpoint.ne_id.clone(),
            ne_name: site_names
                .get(&endpoint.ne_id)
                .cloned()
                .unwrap_or_else(|| endpoint.ne_id.clone()),
            port_id: endpoint.port_id.clone(),
            address,
        };
        let a = view(&config.endpoint_a, address_a);
        let b = view(&config.endpoint_b, address_b);

        let site = |local: &EndpointView, peer: &EndpointView| -> Result<Site, IntentError> {
            let peer =
                serde_json::to_value(peer).map_err(|e| IntentError::Contract(e.to_string()))?;
            let params = json!({
                "link": link,
                "port-id": local.port_id,
                "local-address": local.address,
                "mtu": config.mtu,
                "description": config.description,
                "peer": peer,
            });
            Ok(Site {
                element_id: local.ne_id.clone(),
                element_name: local.ne_name.clone(),
                params,
            })
        };

        Ok(vec![site(&a, &b)?, site(&b, &a)?])
    }

    fn has_resources(&self) -> bool {
        true
    }

    fn obtain_resources(&self, ctx: &HandlerContext, intent: &Intent) -> Result<(), IntentError> {
        let key = allocation_key(&intent.target)?;
        let subnet = ctx.resources.obtain(
            &self.pool,
            &self.scope,
            SizeSpec::Prefix(self.prefix),
            INTENT_TYPE,
            &key,
        )?;
        tracing::debug!(target_name = %intent.target, %subnet, "Link subnet reserved");
        Ok(())
    }

    fn free_resources(
        &self,
        ctx: &HandlerContext,
        target: &str,
        _config: &Value,
    ) -> Result<(), IntentError> {
        let key = allocation_key(target)?;
        ctx.resources.release(&self.pool, &self.scope, &key)?;
        Ok(())
    }

    fn get_state(
        &self,
        ctx: &HandlerContext,
        intent: &Intent,
        topology: &Topology,
    ) -> Result<Map<String, Value>, IntentError> {
        let link = link_name(&intent.target)?;
        let subnet = self.link_subnet(ctx, &intent.target)?;

        let mut state = Map::new();
        state.insert("link".to_string(), json!(link));
        state.insert(
            "subnet".to_string(),
            subnet.map_or(Value::Null, |s| json!(ResourceValue::Subnet(s).to_string())),
        );
        state.insert("network-state".to_string(), json!(intent.network_state));
        if let Ok(sites) = self.get_sites(&intent.target, &intent.config) {
            state.insert("sites".to_string(), json!(sites));
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

        if config.endpoint_a.ne_id == config.endpoint_b.ne_id {
            errors.insert(
                "Value inconsistency".to_string(),
                format!(
                    "endpoint-a and endpoint-b are both on {}",
                    config.endpoint_a.ne_id
                ),
            );
        }
        for (field, endpoint) in [
            ("endpoint-a", &config.endpoint_a),
            ("endpoint-b", &config.endpoint_b),
        ] {
            if endpoint.ne_id.trim().is_empty() {
                errors.insert(format!("{}.ne-id", field), "must not be empty".to_string());
            }
            if endpoint.port_id.trim().is_empty() {
                errors.insert(format!("{}.port-id", field), "must not be empty".to_string());
            }
        }
        if let Some(mtu) = config.mtu {
            if !MTU_RANGE.contains(&mtu) {
                errors.insert(
                    "mtu".to_string(),
                    format!(
                        "{} is outside {}..={}",
                        mtu,
                        MTU_RANGE.start(),
                        MTU_RANGE.end()
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
        let link = link_name(target)?;
        let path = interface_path(&link);
        let mut config = Map::new();

        for side in ["endpoint-a", "endpoint-b"] {
            let Some(ne_id) = seed
                .get(side)
                .and_then(|e| e.get("ne-id"))
                .and_then(Value::as_str)
            else {
                continue;
            };

            let element = match ctx.inventory.element(ne_id).await {
                Ok(element) => element,
                Err(e) => {
                    tracing::warn!(target_name = target, element_id = ne_id, error = %e, "Element not in inventory");
                    continue;
                }
            };
            if !ctx.templates.is_supported(&element.family_type_release) {
                tracing::warn!(
                    target_name = target,
                    element_id = ne_id,
                    family_type_release = %element.family_type_release,
                    "Unrecognized device family, skipping endpoint"
                );
                continue;
            }

            match ctx.devices.query(ne_id, &path).await {
                Ok(live) => {
                    let mut endpoint = Map::new();
                    endpoint.insert("ne-id".to_string(), json!(ne_id));
                    if let Some(port) = live.get("port") {
                        endpoint.insert("port-id".to_string(), port.clone());
                    }
                    config.insert(side.to_string(), Value::Object(endpoint));
                    for attribute in ["mtu", "description"] {
                        if let Some(value) = live.get(attribute) {
                            config
                                .entry(attribute.to_string())
                                .or_insert_with(|| value.clone());
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(target_name = target, element_id = ne_id, error = %e, "Interface not readable");
                }
            }
        }

        Ok(Value::Object(config))
    }

    fn expected_objects(&self, site: &Site) -> Vec<ManagedObject> {
        let Some(link) = site.params.get("link").and_then(Value::as_str) else {
            return Vec::new();
        };

        let mut interface = ManagedObject::new(interface_path(link));
        for (param, attribute) in [
            ("port-id", "port"),
            ("local-address", "address"),
            ("mtu", "mtu"),
            ("description", "description"),
        ] {
            match site.params.get(param) {
                Some(Value::Null) | None => {}
                Some(value) => interface = interface.with_attribute(attribute, value.clone()),
            }
        }
        vec![interface]
    }
}
