//! Shared fixtures for netweave integration tests.

#![allow(dead_code)]

use netweave::config::NetweaveConfig;
use netweave::engine::ReconciliationEngine;
use netweave::intent::{HandlerRegistry, Intent};
use netweave::platform::memory::InMemoryNetwork;
use netweave::platform::Platform;
use serde_json::{json, Value};
use std::sync::Arc;

/// Configuration used by every scenario: a /18 for link addressing and a
/// small service-id range.
pub const TEST_CONFIG: &str = r#"
[engine]
deploy_concurrency = 4
site_timeout_seconds = 5

[[pools]]
name = "ip-pool"
kind = "subnet"
address_space = "10.0.0.0/18"
description = "links"

[[pools]]
name = "svc-id"
kind = "id"
start = 1000
end = 1002
description = "services"
"#;

pub const SROS: &str = "7750 SR:7750 SR-1:24.10.R1";
pub const SRLINUX: &str = "7220 IXR SRLinux:7220 IXR-D2L:24.3.2";

pub fn test_config() -> NetweaveConfig {
    toml::from_str(TEST_CONFIG).expect("test config parses")
}

/// Three-element lab: two SR OS routers and one SR Linux leaf.
pub fn lab() -> Arc<InMemoryNetwork> {
    let network = Arc::new(InMemoryNetwork::new());
    network.add_element("ne-1", "pe-paris", SROS);
    network.add_element("ne-2", "pe-lyon", SROS);
    network.add_element("ne-3", "leaf-nice", SRLINUX);
    network
}

pub fn engine(network: &Arc<InMemoryNetwork>) -> ReconciliationEngine {
    ReconciliationEngine::from_config(
        &test_config(),
        HandlerRegistry::with_builtin(),
        Platform::in_memory(Arc::clone(network)),
    )
    .expect("engine builds")
}

pub fn link_config(a: (&str, &str), b: (&str, &str)) -> Value {
    json!({
        "endpoint-a": {"ne-id": a.0, "port-id": a.1},
        "endpoint-b": {"ne-id": b.0, "port-id": b.1},
        "mtu": 9000,
    })
}

pub fn link(target: &str) -> Intent {
    Intent::new(
        "ip-link",
        target,
        link_config(("ne-1", "1/1/1"), ("ne-2", "1/1/2")),
    )
}

pub fn l2_service(target: &str) -> Intent {
    Intent::new(
        "l2-service",
        target,
        json!({
            "sites": [
                {"ne-id": "ne-1", "port-id": "1/1/5", "vlan": 100},
                {"ne-id": "ne-3", "port-id": "ethernet-1/5", "vlan": 100},
                {"ne-id": "ne-1", "port-id": "1/1/6", "vlan": 200},
            ],
            "mtu": 1500,
        }),
    )
}

pub fn interface_path(link: &str) -> String {
    format!(
        "/configure/router[router-name='Base']/interface[interface-name='{}']",
        link
    )
}
