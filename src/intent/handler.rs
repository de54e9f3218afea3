//! The per-intent-type handler contract.

use super::{Intent, IntentError, ManagedObject, Site, SiteNames, Topology, ValidationErrors};
use crate::platform::{DeviceAccess, Inventory};
use crate::resource::ResourceAdmin;
use crate::template::TemplateDispatcher;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Shared services a handler may use.
#[derive(Clone)]
pub struct HandlerContext {
    pub resources: Arc<ResourceAdmin>,
    pub templates: Arc<TemplateDispatcher>,
    pub devices: Arc<dyn DeviceAccess>,
    pub inventory: Arc<dyn Inventory>,
}

/// Business logic of one intent type.
///
/// The engine drives a handler through a fixed sequence: validate, obtain
/// resources, derive sites and parameters, deploy, then run the post-sync
/// hook. Deletion derives the same sites, removes them and finally frees
/// the resources.
///
/// # Purity
///
/// `get_sites`, `get_site_parameters`, `get_global_parameters`, `get_state`
/// and `expected_objects` must not mutate pools. They read allocations with
/// `ResourceAdmin::get` and treat a missing allocation as absent data.
/// Only `obtain_resources` and `free_resources` mutate.
///
/// # Object Safety
///
/// Used as `Arc<dyn IntentHandler>`; async methods go through `async_trait`.
#[async_trait]
pub trait IntentHandler: Send + Sync + 'static {
    /// Registry key, e.g. `"ip-link"`.
    fn intent_type(&self) -> &str;

    fn version(&self) -> u32 {
        1
    }

    /// Element ids the intent touches, in a stable order.
    ///
    /// # Errors
    ///
    /// `IntentError::Validation` if the target or config cannot be parsed.
    fn get_sites(&self, target: &str, config: &Value) -> Result<Vec<String>, IntentError>;

    /// One fragment per site, in the order returned by `get_sites`.
    ///
    /// Cross-site references are attached as cloned snapshots of the other
    /// sites' data.
    fn get_site_parameters(
        &self,
        ctx: &HandlerContext,
        intent: &Intent,
        site_names: &SiteNames,
    ) -> Result<Vec<Site>, IntentError>;

    /// Intent-wide template parameters.
    fn get_global_parameters(
        &self,
        _ctx: &HandlerContext,
        intent: &Intent,
    ) -> Result<Value, IntentError> {
        Ok(intent.config.clone())
    }

    /// Whether the engine should run the resource steps for this type.
    fn has_resources(&self) -> bool {
        false
    }

    /// Reserve shared resources. Called on every create and update.
    fn obtain_resources(&self, _ctx: &HandlerContext, _intent: &Intent) -> Result<(), IntentError> {
        Ok(())
    }

    /// Release every resource obtained for `target`. Called once, after the
    /// target was removed from the network.
    fn free_resources(
        &self,
        _ctx: &HandlerContext,
        _target: &str,
        _config: &Value,
    ) -> Result<(), IntentError> {
        Ok(())
    }

    /// Read-only display snapshot.
    fn get_state(
        &self,
        _ctx: &HandlerContext,
        _intent: &Intent,
        _topology: &Topology,
    ) -> Result<Map<String, Value>, IntentError> {
        Ok(Map::new())
    }

    /// Add field → message entries for anything wrong with the intent.
    fn validate_hook(
        &self,
        _ctx: &HandlerContext,
        _intent: &Intent,
        _errors: &mut ValidationErrors,
    ) -> Result<(), IntentError> {
        Ok(())
    }

    /// Runs after a successful deployment or removal.
    async fn post_sync_hook(
        &self,
        _ctx: &HandlerContext,
        _intent: &Intent,
    ) -> Result<(), IntentError> {
        Ok(())
    }

    /// Reconstruct a best-effort config from live devices.
    ///
    /// `seed` carries whatever the caller already knows (typically the
    /// element ids involved). Unrecognized device families and unreachable
    /// elements are skipped with a warning.
    async fn discover(
        &self,
        _ctx: &HandlerContext,
        target: &str,
        _seed: &Value,
    ) -> Result<Value, IntentError> {
        tracing::debug!(
            intent_type = self.intent_type(),
            target_name = target,
            "Discovery not supported"
        );
        Ok(Value::Object(Map::new()))
    }

    /// Device objects the audit expects to find on a site.
    fn expected_objects(&self, _site: &Site) -> Vec<ManagedObject> {
        Vec::new()
    }
}
