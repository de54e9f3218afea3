//! End-to-end reconciliation scenarios against the in-memory lab.

mod common;

use common::*;
use netweave::engine::{EngineError, ReconcileState};
use netweave::intent::{Intent, NetworkState};
use netweave::platform::memory::DeployAction;
use netweave::resource::ResourceValue;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

fn deployed_config(network: &netweave::platform::memory::InMemoryNetwork, ne: &str) -> Value {
    let history = network.history(ne);
    let last = history.last().expect("element received a push");
    serde_json::from_str(&last.config).unwrap()
}

#[tokio::test]
async fn test_first_link_gets_first_slash_31() {
    let network = lab();
    let engine = engine(&network);

    let outcome = engine
        .synchronize(&link("link-1"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.state, ReconcileState::Audited);
    assert_eq!(
        engine.resources().get("ip-pool", "global", "link-1").unwrap(),
        ResourceValue::Subnet("10.0.0.0/31".parse().unwrap())
    );

    let a = deployed_config(&network, "ne-1");
    let b = deployed_config(&network, "ne-2");
    assert_eq!(a["site"]["local-address"], "10.0.0.0/31");
    assert_eq!(b["site"]["local-address"], "10.0.0.1/31");
    assert_eq!(a["site"]["peer"]["address"], "10.0.0.1/31");
    assert_eq!(a["template"], "sros");
}

#[tokio::test]
async fn test_update_keeps_the_same_subnet() {
    let network = lab();
    let engine = engine(&network);
    let cancel = CancellationToken::new();

    engine.synchronize(&link("link-1"), &cancel).await.unwrap();
    let mut updated = link("link-1");
    updated.config["mtu"] = json!(1500);
    engine.synchronize(&updated, &cancel).await.unwrap();

    let usage = engine.resources().usage("ip-pool", "global").unwrap();
    assert_eq!(usage.allocations, 1);
    assert_eq!(deployed_config(&network, "ne-1")["site"]["mtu"], 1500);
    assert_eq!(network.history("ne-1").len(), 2);
}

#[tokio::test]
async fn test_delete_then_recreate_same_target() {
    let network = lab();
    let engine = engine(&network);
    let cancel = CancellationToken::new();

    engine.synchronize(&link("link-1"), &cancel).await.unwrap();
    engine.synchronize(&link("link-2"), &cancel).await.unwrap();

    let removed = engine
        .synchronize(&link("link-1").with_state(NetworkState::Deleted), &cancel)
        .await
        .unwrap();
    assert!(removed.success);
    assert_eq!(engine.state("link-1"), ReconcileState::Removed);
    assert_eq!(
        network.history("ne-1").last().unwrap().action,
        DeployAction::Remove
    );
    assert!(network.stored_topology("link-1").is_none());
    assert!(engine
        .resources()
        .get("ip-pool", "global", "link-1")
        .unwrap_err()
        .is_not_found());

    // Freed block is handed out again without a conflict
    let recreated = engine.synchronize(&link("link-1"), &cancel).await.unwrap();
    assert!(recreated.success);
    assert_eq!(
        engine.resources().get("ip-pool", "global", "link-1").unwrap(),
        ResourceValue::Subnet("10.0.0.0/31".parse().unwrap())
    );
    assert_eq!(
        engine.resources().get("ip-pool", "global", "link-2").unwrap(),
        ResourceValue::Subnet("10.0.0.2/31".parse().unwrap())
    );
}

#[tokio::test]
async fn test_repeated_delete_is_a_no_op() {
    let network = lab();
    let engine = engine(&network);
    let cancel = CancellationToken::new();
    let deleted = link("link-1").with_state(NetworkState::Deleted);

    engine.synchronize(&link("link-1"), &cancel).await.unwrap();
    engine.synchronize(&deleted, &cancel).await.unwrap();
    let pushes = network.history("ne-1").len();

    let again = engine.synchronize(&deleted, &cancel).await.unwrap();
    assert!(again.success);
    assert_eq!(again.state, ReconcileState::Removed);
    assert_eq!(network.history("ne-1").len(), pushes);
}

#[tokio::test]
async fn test_invalid_link_is_rejected_without_side_effects() {
    let network = lab();
    let engine = engine(&network);
    let intent = Intent::new(
        "ip-link",
        "link-bad",
        link_config(("ne-1", "1/1/1"), ("ne-1", "1/1/2")),
    );

    let err = engine
        .synchronize(&intent, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        EngineError::Validation(errors) => assert!(errors.contains_key("Value inconsistency")),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(engine.state("link-bad"), ReconcileState::Idle);
    assert_eq!(
        engine.resources().usage("ip-pool", "global").unwrap().allocations,
        0
    );
    assert!(network.history("ne-1").is_empty());
}

#[tokio::test]
async fn test_unreachable_element_fails_and_retry_recovers() {
    let network = lab();
    let engine = engine(&network);
    let cancel = CancellationToken::new();

    network.set_unreachable("ne-2", true);
    let outcome = engine.synchronize(&link("link-1"), &cancel).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.state, ReconcileState::Failed);
    let failed_site = outcome
        .sites
        .iter()
        .find(|s| s.element_id == "ne-2")
        .unwrap();
    assert!(!failed_site.success);
    assert!(engine.status("link-1").unwrap().last_error.is_some());

    network.set_unreachable("ne-2", false);
    let retry = engine.synchronize(&link("link-1"), &cancel).await.unwrap();
    assert!(retry.success);
    assert_eq!(
        engine.resources().usage("ip-pool", "global").unwrap().allocations,
        1
    );
}

#[tokio::test]
async fn test_l2_service_across_families() {
    let network = lab();
    let engine = engine(&network);

    let outcome = engine
        .synchronize(&l2_service("acme#web#c1"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.success);
    let elements: Vec<_> = outcome.sites.iter().map(|s| s.element_id.as_str()).collect();
    assert_eq!(elements, ["ne-1", "ne-3"]);
    assert_eq!(outcome.sites[0].template, "sros");
    assert_eq!(outcome.sites[1].template, "srlinux");

    let pe = deployed_config(&network, "ne-1");
    assert_eq!(pe["site"]["service-id"], 1000);
    assert_eq!(pe["site"]["saps"].as_array().unwrap().len(), 2);
    assert_eq!(pe["site"]["peers"][0]["ne-name"], "leaf-nice");
}

#[tokio::test]
async fn test_l2_service_pool_exhaustion_fails_the_run() {
    let network = lab();
    let engine = engine(&network);
    let cancel = CancellationToken::new();

    for service in ["a", "b", "c"] {
        let target = format!("acme#{}#c1", service);
        assert!(engine.synchronize(&l2_service(&target), &cancel).await.unwrap().success);
    }

    let result = engine.synchronize(&l2_service("acme#d#c1"), &cancel).await;
    assert!(matches!(
        result,
        Err(EngineError::Intent(_)) | Err(EngineError::Resource(_))
    ));
    assert_eq!(engine.state("acme#d#c1"), ReconcileState::Failed);
}

#[tokio::test]
async fn test_parallel_targets_reconcile_independently() {
    let network = lab();
    let engine = engine(&network);
    let cancel = CancellationToken::new();

    let intent_a = link("link-a");
    let intent_b = link("link-b");
    let intent_c = l2_service("acme#web#c1");
    let (a, b, c) = tokio::join!(
        engine.synchronize(&intent_a, &cancel),
        engine.synchronize(&intent_b, &cancel),
        engine.synchronize(&intent_c, &cancel),
    );
    assert!(a.unwrap().success);
    assert!(b.unwrap().success);
    assert!(c.unwrap().success);

    let subnets: std::collections::HashSet<_> = ["link-a", "link-b"]
        .iter()
        .map(|k| engine.resources().get("ip-pool", "global", k).unwrap())
        .collect();
    assert_eq!(subnets.len(), 2);
}

#[tokio::test]
async fn test_topology_persisted_after_deploy() {
    let network = lab();
    let engine = engine(&network);

    let outcome = engine
        .synchronize(&link("link-1"), &CancellationToken::new())
        .await
        .unwrap();

    let topology = network.stored_topology("link-1").unwrap();
    assert_eq!(topology["intent-type"], "ip-link");
    assert_eq!(topology["run-id"], outcome.run_id.to_string());

    let state = engine.get_state(&link("link-1"), &topology).unwrap();
    assert_eq!(state["subnet"], "10.0.0.0/31");
    assert_eq!(state["reconcile-state"], "audited");
}

#[tokio::test]
async fn test_deleting_one_correlation_keeps_sibling_service_id() {
    let network = lab();
    let engine = engine(&network);
    let cancel = CancellationToken::new();
    let first = l2_service("acme#web#c1");
    let sibling = l2_service("acme#web#c2");

    engine.synchronize(&first, &cancel).await.unwrap();
    engine.synchronize(&sibling, &cancel).await.unwrap();
    let topology = network.stored_topology("acme#web#c2").unwrap();
    let sibling_id = engine.get_state(&sibling, &topology).unwrap()["service-id"].clone();
    assert!(sibling_id.is_u64());

    engine
        .synchronize(&first.clone().with_state(NetworkState::Deleted), &cancel)
        .await
        .unwrap();
    engine
        .synchronize(&l2_service("acme#other#c1"), &cancel)
        .await
        .unwrap();

    let state = engine.get_state(&sibling, &topology).unwrap();
    assert_eq!(state["service-id"], sibling_id);
    assert_eq!(state["reconcile-state"], "audited");
    let other = engine
        .resources()
        .get("svc-id", "global", "acme#other#c1")
        .unwrap();
    assert_ne!(json!(other.as_id()), sibling_id);
}
